pub mod claim_set;
pub mod claims_path;
pub mod credential;
pub mod credential_format;
pub mod credential_query;
pub mod credential_set;
pub mod issues;
pub mod presentation;
pub mod query;
pub mod trusted_authority;
