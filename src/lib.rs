//! This library implements the evaluation engine for [DCQL], the Digital
//! Credentials Query Language of [OID4VP 1.0] Section 6.
//!
//! [DCQL]: <https://openid.net/specs/openid-4-verifiable-presentations-1_0.html#section-6>
//! [OID4VP 1.0]: <https://openid.net/specs/openid-4-verifiable-presentations-1_0.html>
//!
//! Given a [`DcqlQuery`] describing which credentials and claims a verifier
//! wants, and the candidate credentials a wallet holds, the engine determines
//! whether the request can be satisfied and produces a structured,
//! diagnosable match result. The same machinery re-validates the credentials
//! actually handed over in a presentation.
//!
//! # Wallet Usage
//!
//! ```ignore
//! use dcql::core::credential::CredentialRecord;
//! use dcql::core::query::DcqlQuery;
//!
//! let query: DcqlQuery = serde_json::from_value(serde_json::json!({
//!     "credentials": [
//!         {
//!             "id": "mdl",
//!             "format": "mso_mdoc",
//!             "meta": { "doctype_value": "org.iso.18013.5.1.mDL" },
//!             "claims": [
//!                 { "path": ["org.iso.18013.5.1", "given_name"] }
//!             ]
//!         }
//!     ]
//! }))?;
//!
//! let candidates: Vec<CredentialRecord> = wallet.credentials();
//! let result = query.evaluate(&candidates)?;
//! if result.can_be_satisfied() {
//!     // The best match's output is the masked credential to disclose.
//!     let best = result.credential_match("mdl").unwrap().best().unwrap();
//!     present(best.output().unwrap());
//! }
//! ```
//!
//! # Verifier Usage
//!
//! ```ignore
//! use std::collections::BTreeMap;
//!
//! // presented: BTreeMap<String, CredentialRecord>, keyed by the id each
//! // credential was presented under.
//! let result = query.validate_presentation(&presented)?;
//! assert!(result.can_be_satisfied());
//! ```
//!
//! # Evaluation model
//!
//! Evaluation is a pure function of `(query, candidates)`: it reads its
//! inputs, allocates a fresh result, and keeps no state between calls.
//! Malformed queries (duplicate ids, dangling claim set or credential set
//! references) fail fast with a [`QueryError`]; a credential that merely
//! does not match is never an error, but a set of diagnostic issues inside a
//! well-formed result.
//!
//! [`DcqlQuery`]: crate::core::query::DcqlQuery
//! [`QueryError`]: crate::core::query::QueryError

pub mod core;
pub mod utils;
