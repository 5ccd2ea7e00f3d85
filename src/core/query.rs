use std::collections::HashSet;
use std::fmt;

use base64::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use url::Url;

use crate::core::credential_format::CredentialFormat;
use crate::utils::NonEmptyVec;

/// A DCQL query.
///
/// See: <https://openid.net/specs/openid-4-verifiable-presentations-1_0.html#section-6>
///
/// A query is immutable once constructed and may be evaluated any number of
/// times against different credential inputs; evaluation never mutates it.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DcqlQuery {
    credentials: NonEmptyVec<CredentialQuery>,
    #[serde(skip_serializing_if = "Option::is_none")]
    credential_sets: Option<NonEmptyVec<CredentialSetQuery>>,
}

impl DcqlQuery {
    pub fn new(credentials: NonEmptyVec<CredentialQuery>) -> Self {
        Self {
            credentials,
            credential_sets: None,
        }
    }

    pub fn credentials(&self) -> &[CredentialQuery] {
        &self.credentials
    }

    pub fn credential_sets(&self) -> Option<&NonEmptyVec<CredentialSetQuery>> {
        self.credential_sets.as_ref()
    }

    pub fn set_credential_sets(
        &mut self,
        credential_sets: Option<NonEmptyVec<CredentialSetQuery>>,
    ) {
        self.credential_sets = credential_sets;
    }

    /// Returns the credential query with the given id, if any.
    pub fn credential_query(&self, id: &str) -> Option<&CredentialQuery> {
        self.credentials.iter().find(|c| c.id() == id)
    }

    /// Checks the cross-field invariants that the wire shape alone cannot
    /// express: unique credential query ids, claim sets referencing declared
    /// claim ids, credential set options referencing declared credential
    /// query ids, homogeneous claim value literals, and well-formed trusted
    /// authority values.
    ///
    /// Runs automatically at the start of every evaluation; a failure here is
    /// a request-construction bug, not a match failure.
    pub fn validate(&self) -> Result<(), QueryError> {
        let mut ids = HashSet::new();
        for credential in &self.credentials {
            if !ids.insert(credential.id()) {
                return Err(QueryError::DuplicateCredentialQueryId(
                    credential.id().to_string(),
                ));
            }
        }

        for credential in &self.credentials {
            credential.validate()?;
        }

        if let Some(credential_sets) = &self.credential_sets {
            for set in credential_sets {
                for option in set.options() {
                    for id in option.iter() {
                        if !ids.contains(id.as_str()) {
                            return Err(QueryError::UnknownCredentialQueryId(id.clone()));
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

impl TryFrom<Json> for DcqlQuery {
    type Error = serde_json::Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        serde_json::from_value(value)
    }
}

/// A Credential Query object, tagged by the requested credential format.
///
/// See: <https://openid.net/specs/openid-4-verifiable-presentations-1_0.html#section-6.1>
///
/// The format determines the shape of the `meta` constraint and which claims
/// query forms apply, so each format is a distinct variant and the evaluator
/// matches on it exhaustively.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "format")]
pub enum CredentialQuery {
    #[serde(rename = "mso_mdoc")]
    Mdoc(MdocCredentialQuery),
    #[serde(rename = "dc+sd-jwt", alias = "vc+sd-jwt")]
    SdJwtVc(SdJwtVcCredentialQuery),
    #[serde(rename = "jwt_vc_json")]
    JwtVcJson(W3cVcCredentialQuery),
    #[serde(rename = "ldp_vc")]
    LdpVc(W3cVcCredentialQuery),
}

impl CredentialQuery {
    pub fn format(&self) -> CredentialFormat {
        match self {
            Self::Mdoc(_) => CredentialFormat::MsoMdoc,
            Self::SdJwtVc(_) => CredentialFormat::SdJwtVc,
            Self::JwtVcJson(_) => CredentialFormat::JwtVcJson,
            Self::LdpVc(_) => CredentialFormat::LdpVc,
        }
    }

    fn common(&self) -> &CredentialQueryCommon {
        match self {
            Self::Mdoc(q) => &q.common,
            Self::SdJwtVc(q) => &q.common,
            Self::JwtVcJson(q) | Self::LdpVc(q) => &q.common,
        }
    }

    /// A string identifying the Credential in the response.
    /// The value MUST be unique within a DCQL query.
    pub fn id(&self) -> &str {
        &self.common().id
    }

    pub fn claims(&self) -> Option<&NonEmptyVec<ClaimsQuery>> {
        self.common().claims.as_ref()
    }

    pub fn claim_sets(&self) -> Option<&NonEmptyVec<NonEmptyVec<String>>> {
        self.common().claim_sets.as_ref()
    }

    pub fn trusted_authorities(&self) -> Option<&NonEmptyVec<TrustedAuthorityQuery>> {
        self.common().trusted_authorities.as_ref()
    }

    /// Returns `true` if cryptographic holder binding is required.
    /// Defaults to `true` per Section 6.1 if not explicitly set.
    pub fn require_cryptographic_holder_binding(&self) -> bool {
        self.common()
            .require_cryptographic_holder_binding
            .unwrap_or(true)
    }

    /// Returns `true` if multiple Credentials may be returned for this query.
    /// Defaults to `false` per Section 6.1 if not explicitly set.
    pub fn multiple(&self) -> bool {
        self.common().multiple.unwrap_or(false)
    }

    pub(crate) fn validate(&self) -> Result<(), QueryError> {
        let common = self.common();

        let mut claim_ids = HashSet::new();
        if let Some(claims) = &common.claims {
            for claim in claims {
                if !matches!(self, Self::Mdoc(_)) {
                    if let ClaimsQuery::Mdoc(_) = claim {
                        return Err(QueryError::NamespaceFormOutsideMdoc {
                            credential_query_id: common.id.clone(),
                        });
                    }
                }

                if let Some(id) = claim.id() {
                    if !claim_ids.insert(id.to_string()) {
                        return Err(QueryError::DuplicateClaimId {
                            credential_query_id: common.id.clone(),
                            claim_id: id.to_string(),
                        });
                    }
                }

                if let Some(values) = claim.values() {
                    if !homogeneous_literals(values) {
                        return Err(QueryError::MixedClaimValueKinds {
                            credential_query_id: common.id.clone(),
                            claim: claim.label(),
                        });
                    }
                }
            }
        }

        if let Some(claim_sets) = &common.claim_sets {
            let claims = common.claims.as_deref().unwrap_or(&[]);
            if claims.iter().any(|c| c.id().is_none()) {
                return Err(QueryError::ClaimSetsWithoutIds(common.id.clone()));
            }
            for (index, set) in claim_sets.iter().enumerate() {
                for claim_id in set.iter() {
                    if !claim_ids.contains(claim_id) {
                        return Err(QueryError::UnknownClaimId {
                            credential_query_id: common.id.clone(),
                            claim_set_index: index,
                            claim_id: claim_id.clone(),
                        });
                    }
                }
            }
        }

        if let Some(authorities) = &common.trusted_authorities {
            for authority in authorities {
                authority.validate()?;
            }
        }

        Ok(())
    }
}

/// The format-independent part of a Credential Query.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct CredentialQueryCommon {
    id: String,

    /// OPTIONAL. An array of objects that specifies claims in the Credential.
    #[serde(skip_serializing_if = "Option::is_none")]
    claims: Option<NonEmptyVec<ClaimsQuery>>,

    /// OPTIONAL. An array of claim set identifiers for alternative claim
    /// combinations. MUST NOT be present if `claims` is absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    claim_sets: Option<NonEmptyVec<NonEmptyVec<String>>>,

    /// OPTIONAL. An array of objects that specify expected trust frameworks.
    #[serde(skip_serializing_if = "Option::is_none")]
    trusted_authorities: Option<NonEmptyVec<TrustedAuthorityQuery>>,

    /// OPTIONAL. Boolean indicating if the Verifier requires cryptographic
    /// holder binding proof. Defaults to `true` if not present.
    #[serde(skip_serializing_if = "Option::is_none")]
    require_cryptographic_holder_binding: Option<bool>,

    /// OPTIONAL. Boolean indicating if the Wallet may return multiple
    /// Credentials matching this query. Defaults to `false` if not present.
    #[serde(skip_serializing_if = "Option::is_none")]
    multiple: Option<bool>,
}

impl CredentialQueryCommon {
    pub fn new(id: String) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn set_claims(&mut self, claims: Option<NonEmptyVec<ClaimsQuery>>) {
        self.claims = claims;
    }

    pub fn set_claim_sets(&mut self, claim_sets: Option<NonEmptyVec<NonEmptyVec<String>>>) {
        self.claim_sets = claim_sets;
    }

    pub fn set_trusted_authorities(
        &mut self,
        trusted_authorities: Option<NonEmptyVec<TrustedAuthorityQuery>>,
    ) {
        self.trusted_authorities = trusted_authorities;
    }

    pub fn set_require_cryptographic_holder_binding(&mut self, require: Option<bool>) {
        self.require_cryptographic_holder_binding = require;
    }

    pub fn set_multiple(&mut self, multiple: Option<bool>) {
        self.multiple = multiple;
    }
}

/// A Credential Query for an ISO mdoc.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MdocCredentialQuery {
    #[serde(flatten)]
    common: CredentialQueryCommon,
    /// REQUIRED per §6.1, but can be an empty object.
    #[serde(default)]
    meta: MdocMetaQuery,
}

impl MdocCredentialQuery {
    pub fn new(common: CredentialQueryCommon) -> Self {
        Self {
            common,
            meta: MdocMetaQuery::default(),
        }
    }

    pub fn common_mut(&mut self) -> &mut CredentialQueryCommon {
        &mut self.common
    }

    pub fn meta(&self) -> &MdocMetaQuery {
        &self.meta
    }

    pub fn set_meta(&mut self, meta: MdocMetaQuery) {
        self.meta = meta;
    }
}

/// Metadata constraints for an mdoc Credential Query.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct MdocMetaQuery {
    /// OPTIONAL. The required doctype of the mdoc, e.g.
    /// `org.iso.18013.5.1.mDL`.
    #[serde(skip_serializing_if = "Option::is_none")]
    doctype_value: Option<String>,
}

impl MdocMetaQuery {
    pub fn new(doctype_value: Option<String>) -> Self {
        Self { doctype_value }
    }

    pub fn doctype_value(&self) -> Option<&str> {
        self.doctype_value.as_deref()
    }
}

/// A Credential Query for an SD-JWT VC.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SdJwtVcCredentialQuery {
    #[serde(flatten)]
    common: CredentialQueryCommon,
    #[serde(default)]
    meta: SdJwtVcMetaQuery,
}

impl SdJwtVcCredentialQuery {
    pub fn new(common: CredentialQueryCommon) -> Self {
        Self {
            common,
            meta: SdJwtVcMetaQuery::default(),
        }
    }

    pub fn common_mut(&mut self) -> &mut CredentialQueryCommon {
        &mut self.common
    }

    pub fn meta(&self) -> &SdJwtVcMetaQuery {
        &self.meta
    }

    pub fn set_meta(&mut self, meta: SdJwtVcMetaQuery) {
        self.meta = meta;
    }
}

/// Metadata constraints for an SD-JWT VC Credential Query.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct SdJwtVcMetaQuery {
    /// OPTIONAL. The acceptable `vct` values for the credential.
    #[serde(skip_serializing_if = "Option::is_none")]
    vct_values: Option<NonEmptyVec<String>>,
}

impl SdJwtVcMetaQuery {
    pub fn new(vct_values: Option<NonEmptyVec<String>>) -> Self {
        Self { vct_values }
    }

    pub fn vct_values(&self) -> Option<&NonEmptyVec<String>> {
        self.vct_values.as_ref()
    }
}

/// A Credential Query for a W3C VC (`jwt_vc_json` or `ldp_vc`).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct W3cVcCredentialQuery {
    #[serde(flatten)]
    common: CredentialQueryCommon,
    #[serde(default)]
    meta: W3cVcMetaQuery,
}

impl W3cVcCredentialQuery {
    pub fn new(common: CredentialQueryCommon) -> Self {
        Self {
            common,
            meta: W3cVcMetaQuery::default(),
        }
    }

    pub fn common_mut(&mut self) -> &mut CredentialQueryCommon {
        &mut self.common
    }

    pub fn meta(&self) -> &W3cVcMetaQuery {
        &self.meta
    }

    pub fn set_meta(&mut self, meta: W3cVcMetaQuery) {
        self.meta = meta;
    }
}

/// Metadata constraints for a W3C VC Credential Query.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct W3cVcMetaQuery {
    /// OPTIONAL. An array of type value arrays. The credential matches when
    /// every type in at least one of the inner arrays appears among the
    /// credential's declared types.
    #[serde(skip_serializing_if = "Option::is_none")]
    type_values: Option<NonEmptyVec<NonEmptyVec<String>>>,
}

impl W3cVcMetaQuery {
    pub fn new(type_values: Option<NonEmptyVec<NonEmptyVec<String>>>) -> Self {
        Self { type_values }
    }

    pub fn type_values(&self) -> Option<&NonEmptyVec<NonEmptyVec<String>>> {
        self.type_values.as_ref()
    }
}

/// A Claims Query object.
///
/// See: <https://openid.net/specs/openid-4-verifiable-presentations-1_0.html#section-6.3>
///
/// Claims are addressed either by a claims path pointer or, for mdocs, by the
/// `(namespace, claim name)` pair of ISO/IEC 18013-5.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ClaimsQuery {
    Mdoc(MdocClaimsQuery),
    Path(PathClaimsQuery),
}

impl ClaimsQuery {
    /// REQUIRED if `claim_sets` is present in the Credential Query; OPTIONAL
    /// otherwise.
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Mdoc(q) => q.id.as_deref(),
            Self::Path(q) => q.id.as_deref(),
        }
    }

    pub fn values(&self) -> Option<&NonEmptyVec<ClaimValue>> {
        match self {
            Self::Mdoc(q) => q.values.as_ref(),
            Self::Path(q) => q.values.as_ref(),
        }
    }

    pub fn intent_to_retain(&self) -> Option<bool> {
        match self {
            Self::Mdoc(q) => q.intent_to_retain,
            Self::Path(q) => q.intent_to_retain,
        }
    }

    /// A display label for diagnostics: the claim id if present, otherwise
    /// the addressed location.
    pub fn label(&self) -> String {
        if let Some(id) = self.id() {
            return id.to_string();
        }
        match self {
            Self::Mdoc(q) => format!("{}.{}", q.namespace, q.claim_name),
            Self::Path(q) => q
                .path
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("."),
        }
    }
}

/// An mdoc Claims Query in the `(namespace, claim name)` form.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MdocClaimsQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    namespace: String,
    claim_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    values: Option<NonEmptyVec<ClaimValue>>,
    /// OPTIONAL (ISO mdoc specific). Boolean equivalent to the
    /// `IntentToRetain` variable defined in Section 8.3.2.1.2.1 of
    /// ISO.18013-5. Carried through to the wire, not evaluated.
    #[serde(skip_serializing_if = "Option::is_none")]
    intent_to_retain: Option<bool>,
}

impl MdocClaimsQuery {
    pub fn new(namespace: String, claim_name: String) -> Self {
        Self {
            id: None,
            namespace,
            claim_name,
            values: None,
            intent_to_retain: None,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn claim_name(&self) -> &str {
        &self.claim_name
    }

    pub fn set_id(&mut self, id: Option<String>) {
        self.id = id;
    }

    pub fn set_values(&mut self, values: Option<NonEmptyVec<ClaimValue>>) {
        self.values = values;
    }

    pub fn set_intent_to_retain(&mut self, intent_to_retain: Option<bool>) {
        self.intent_to_retain = intent_to_retain;
    }
}

/// A Claims Query addressing a claim by a claims path pointer.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PathClaimsQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    /// REQUIRED. A non-empty array representing a claims path pointer.
    path: NonEmptyVec<ClaimPathSegment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    values: Option<NonEmptyVec<ClaimValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    intent_to_retain: Option<bool>,
}

impl PathClaimsQuery {
    pub fn new(path: NonEmptyVec<ClaimPathSegment>) -> Self {
        Self {
            id: None,
            path,
            values: None,
            intent_to_retain: None,
        }
    }

    pub fn path(&self) -> &[ClaimPathSegment] {
        &self.path
    }

    pub fn set_id(&mut self, id: Option<String>) {
        self.id = id;
    }

    pub fn set_values(&mut self, values: Option<NonEmptyVec<ClaimValue>>) {
        self.values = values;
    }

    pub fn set_intent_to_retain(&mut self, intent_to_retain: Option<bool>) {
        self.intent_to_retain = intent_to_retain;
    }
}

/// One segment of a claims path pointer: an object key, a sequence index, or
/// the wildcard selecting every element of a sequence.
///
/// Serialized per OID4VP §7: a string, a non-negative integer, or `null`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ClaimPathSegment {
    Key(String),
    Wildcard,
    Index(usize),
}

impl fmt::Display for ClaimPathSegment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Wildcard => f.write_str("*"),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

/// A literal a claim value can be required to equal.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ClaimValue {
    String(String),
    Integer(i64),
    Boolean(bool),
}

impl ClaimValue {
    /// Equality against a claim tree value.
    pub fn matches(&self, value: &Json) -> bool {
        match (self, value) {
            (Self::String(s), Json::String(v)) => s == v,
            (Self::Integer(i), Json::Number(n)) => n.as_i64() == Some(*i),
            (Self::Boolean(b), Json::Bool(v)) => b == v,
            _ => false,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Integer(_) => "integer",
            Self::Boolean(_) => "boolean",
        }
    }
}

impl fmt::Display for ClaimValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "\"{s}\""),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Boolean(b) => write!(f, "{b}"),
        }
    }
}

fn homogeneous_literals(values: &NonEmptyVec<ClaimValue>) -> bool {
    let kind = values.first().kind();
    values.iter().all(|v| v.kind() == kind)
}

/// A Trusted Authorities Query object.
///
/// See: <https://openid.net/specs/openid-4-verifiable-presentations-1_0.html#section-6.1.1>
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TrustedAuthorityQuery {
    /// REQUIRED. A string uniquely identifying the type of trust framework.
    #[serde(rename = "type")]
    authority_type: TrustedAuthorityType,

    /// REQUIRED. A non-empty array of strings containing trust
    /// framework-specific identification data.
    values: NonEmptyVec<String>,
}

impl TrustedAuthorityQuery {
    pub fn new(authority_type: TrustedAuthorityType, values: NonEmptyVec<String>) -> Self {
        Self {
            authority_type,
            values,
        }
    }

    pub fn authority_type(&self) -> &TrustedAuthorityType {
        &self.authority_type
    }

    pub fn values(&self) -> &NonEmptyVec<String> {
        &self.values
    }

    fn validate(&self) -> Result<(), QueryError> {
        for value in &self.values {
            match self.authority_type {
                TrustedAuthorityType::Aki => {
                    if BASE64_URL_SAFE_NO_PAD.decode(value).is_err() {
                        return Err(QueryError::InvalidTrustedAuthorityValue {
                            authority_type: self.authority_type.to_string(),
                            value: value.clone(),
                            reason: "not base64url".to_string(),
                        });
                    }
                }
                TrustedAuthorityType::EtsiTl | TrustedAuthorityType::OpenidFederation => {
                    if let Err(e) = Url::parse(value) {
                        return Err(QueryError::InvalidTrustedAuthorityValue {
                            authority_type: self.authority_type.to_string(),
                            value: value.clone(),
                            reason: e.to_string(),
                        });
                    }
                }
                // Unknown frameworks carry opaque identification data.
                TrustedAuthorityType::Other(_) => {}
            }
        }
        Ok(())
    }
}

/// Trusted Authority types.
///
/// See: <https://openid.net/specs/openid-4-verifiable-presentations-1_0.html#section-6.1.1>
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrustedAuthorityType {
    /// Authority Key Identifier: the KeyIdentifier from an X.509
    /// AuthorityKeyIdentifier, encoded as base64url.
    Aki,
    /// ETSI Trusted List: identifier per ETSI TS 119 612.
    EtsiTl,
    /// OpenID Federation Entity Identifier representing a Trust Anchor.
    OpenidFederation,
    /// Other trust framework type not defined in the spec.
    #[serde(untagged)]
    Other(String),
}

impl fmt::Display for TrustedAuthorityType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Aki => f.write_str("aki"),
            Self::EtsiTl => f.write_str("etsi_tl"),
            Self::OpenidFederation => f.write_str("openid_federation"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// A Credential Set Query object.
///
/// See: <https://openid.net/specs/openid-4-verifiable-presentations-1_0.html#section-6.2>
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CredentialSetQuery {
    /// REQUIRED. A non-empty array where each value is a list of Credential
    /// Query identifiers representing one set of Credentials that satisfies
    /// the use case.
    options: NonEmptyVec<NonEmptyVec<String>>,
    /// OPTIONAL. Boolean indicating whether this set of Credentials is
    /// required. Defaults to `true` per §6.2 if not explicitly set.
    #[serde(skip_serializing_if = "Option::is_none")]
    required: Option<bool>,
    /// OPTIONAL. A string, number or object conveying the purpose of the
    /// request to the Wallet. Opaque to the engine.
    #[serde(skip_serializing_if = "Option::is_none")]
    purpose: Option<Json>,
}

impl CredentialSetQuery {
    pub fn new(options: NonEmptyVec<NonEmptyVec<String>>) -> Self {
        Self {
            options,
            required: None,
            purpose: None,
        }
    }

    pub fn options(&self) -> &NonEmptyVec<NonEmptyVec<String>> {
        &self.options
    }

    /// Returns `true` if this credential set is required.
    /// Defaults to `true` per §6.2 if not explicitly set.
    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(true)
    }

    pub fn set_required(&mut self, required: Option<bool>) {
        self.required = required;
    }

    pub fn purpose(&self) -> Option<&Json> {
        self.purpose.as_ref()
    }

    pub fn set_purpose(&mut self, purpose: Option<Json>) {
        self.purpose = purpose;
    }
}

/// Fatal, construction-time errors.
///
/// These indicate a malformed request or presentation rather than a
/// non-matching credential; they abort evaluation without producing a partial
/// result. Non-matches are reported as [`Issues`](crate::core::issues::Issues)
/// inside a result instead.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("duplicate credential query id `{0}`")]
    DuplicateCredentialQueryId(String),

    #[error("duplicate claim id `{claim_id}` in credential query `{credential_query_id}`")]
    DuplicateClaimId {
        credential_query_id: String,
        claim_id: String,
    },

    #[error(
        "claim set {claim_set_index} of credential query `{credential_query_id}` \
         references unknown claim id `{claim_id}`"
    )]
    UnknownClaimId {
        credential_query_id: String,
        claim_set_index: usize,
        claim_id: String,
    },

    #[error("credential query `{0}` declares claim sets but has claims without ids")]
    ClaimSetsWithoutIds(String),

    #[error("credential set option references unknown credential query id `{0}`")]
    UnknownCredentialQueryId(String),

    #[error(
        "claims query `{claim}` in credential query `{credential_query_id}` mixes \
         string, integer and boolean literals"
    )]
    MixedClaimValueKinds {
        credential_query_id: String,
        claim: String,
    },

    #[error(
        "claims query in credential query `{credential_query_id}` uses the namespace \
         form, which only applies to mdoc credentials"
    )]
    NamespaceFormOutsideMdoc { credential_query_id: String },

    #[error("invalid trusted authority value `{value}` for type `{authority_type}`: {reason}")]
    InvalidTrustedAuthorityValue {
        authority_type: String,
        value: String,
        reason: String,
    },

    #[error("presentation record is empty")]
    EmptyPresentation,

    #[error("presented credential id `{0}` does not appear in the query")]
    UnknownPresentationId(String),

    #[error("required credential query `{0}` is not satisfied by the presentation")]
    UnsatisfiedCredentialQuery(String),

    #[error("required credential set {0} has no satisfied option")]
    UnsatisfiedCredentialSet(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn mdl_query_json() -> Json {
        json!({
            "credentials": [
                {
                    "id": "mdl",
                    "format": "mso_mdoc",
                    "meta": {
                        "doctype_value": "org.iso.18013.5.1.mDL"
                    },
                    "claims": [
                        {
                            "namespace": "org.iso.18013.5.1",
                            "claim_name": "given_name",
                            "intent_to_retain": false
                        },
                        {
                            "path": ["org.iso.18013.5.1", "family_name"]
                        }
                    ]
                }
            ],
            "credential_sets": [
                {
                    "options": [["mdl"]],
                    "purpose": "Proof of age"
                }
            ]
        })
    }

    #[test]
    fn de_serialize_query() {
        let value = mdl_query_json();
        let query: DcqlQuery = serde_json::from_value(value.clone()).unwrap();

        let credential = &query.credentials()[0];
        assert_eq!(credential.id(), "mdl");
        assert_eq!(credential.format(), CredentialFormat::MsoMdoc);
        let claims = credential.claims().unwrap();
        assert!(matches!(claims[0], ClaimsQuery::Mdoc(_)));
        assert!(matches!(claims[1], ClaimsQuery::Path(_)));
        assert!(query.credential_sets().unwrap()[0].is_required());

        assert_eq!(value, serde_json::to_value(&query).unwrap());
    }

    #[test]
    fn legacy_sd_jwt_format_alias() {
        let query: DcqlQuery = serde_json::from_value(json!({
            "credentials": [
                {
                    "id": "pid",
                    "format": "vc+sd-jwt",
                    "meta": { "vct_values": ["https://example.com/pid"] }
                }
            ]
        }))
        .unwrap();
        assert_eq!(query.credentials()[0].format(), CredentialFormat::SdJwtVc);
    }

    #[test]
    fn defaults() {
        let query: DcqlQuery = serde_json::from_value(json!({
            "credentials": [
                { "id": "a", "format": "dc+sd-jwt", "meta": {} }
            ]
        }))
        .unwrap();
        let credential = &query.credentials()[0];
        assert!(credential.require_cryptographic_holder_binding());
        assert!(!credential.multiple());
    }

    #[test]
    fn meta_defaults_to_empty_when_absent() {
        let query: DcqlQuery = serde_json::from_value(json!({
            "credentials": [
                { "id": "a", "format": "mso_mdoc" }
            ]
        }))
        .unwrap();
        let CredentialQuery::Mdoc(mdoc) = &query.credentials()[0] else {
            panic!("expected mdoc query");
        };
        assert!(mdoc.meta().doctype_value().is_none());
    }

    #[test]
    fn claim_path_segments_parse_as_string_integer_null() {
        let claim: ClaimsQuery = serde_json::from_value(json!({
            "path": ["degrees", null, "type"]
        }))
        .unwrap();
        let ClaimsQuery::Path(path_query) = claim else {
            panic!("expected path form");
        };
        assert_eq!(
            path_query.path(),
            &[
                ClaimPathSegment::Key("degrees".into()),
                ClaimPathSegment::Wildcard,
                ClaimPathSegment::Key("type".into()),
            ]
        );
    }

    #[test]
    fn duplicate_credential_query_ids_are_fatal() {
        let query: DcqlQuery = serde_json::from_value(json!({
            "credentials": [
                { "id": "a", "format": "mso_mdoc", "meta": {} },
                { "id": "a", "format": "dc+sd-jwt", "meta": {} }
            ]
        }))
        .unwrap();
        assert!(matches!(
            query.validate(),
            Err(QueryError::DuplicateCredentialQueryId(id)) if id == "a"
        ));
    }

    #[test]
    fn dangling_claim_set_reference_is_fatal() {
        let query: DcqlQuery = serde_json::from_value(json!({
            "credentials": [
                {
                    "id": "pid",
                    "format": "dc+sd-jwt",
                    "meta": {},
                    "claims": [
                        { "id": "a", "path": ["given_name"] }
                    ],
                    "claim_sets": [["a", "b"]]
                }
            ]
        }))
        .unwrap();
        assert!(matches!(
            query.validate(),
            Err(QueryError::UnknownClaimId { claim_id, .. }) if claim_id == "b"
        ));
    }

    #[test]
    fn dangling_credential_set_reference_is_fatal() {
        let query: DcqlQuery = serde_json::from_value(json!({
            "credentials": [
                { "id": "a", "format": "mso_mdoc", "meta": {} }
            ],
            "credential_sets": [
                { "options": [["a"], ["b"]] }
            ]
        }))
        .unwrap();
        assert!(matches!(
            query.validate(),
            Err(QueryError::UnknownCredentialQueryId(id)) if id == "b"
        ));
    }

    #[test]
    fn mixed_value_literals_are_fatal() {
        let query: DcqlQuery = serde_json::from_value(json!({
            "credentials": [
                {
                    "id": "pid",
                    "format": "dc+sd-jwt",
                    "meta": {},
                    "claims": [
                        { "path": ["age"], "values": [18, "eighteen"] }
                    ]
                }
            ]
        }))
        .unwrap();
        assert!(matches!(
            query.validate(),
            Err(QueryError::MixedClaimValueKinds { .. })
        ));
    }

    #[test]
    fn namespace_claims_query_outside_mdoc_is_fatal() {
        let query: DcqlQuery = serde_json::from_value(json!({
            "credentials": [
                {
                    "id": "pid",
                    "format": "dc+sd-jwt",
                    "meta": {},
                    "claims": [
                        { "namespace": "org.iso.18013.5.1", "claim_name": "given_name" }
                    ]
                }
            ]
        }))
        .unwrap();
        assert!(matches!(
            query.validate(),
            Err(QueryError::NamespaceFormOutsideMdoc { .. })
        ));
    }

    #[test]
    fn malformed_trusted_authority_values_are_fatal() {
        let query: DcqlQuery = serde_json::from_value(json!({
            "credentials": [
                {
                    "id": "pid",
                    "format": "dc+sd-jwt",
                    "meta": {},
                    "trusted_authorities": [
                        { "type": "openid_federation", "values": ["not a url"] }
                    ]
                }
            ]
        }))
        .unwrap();
        assert!(matches!(
            query.validate(),
            Err(QueryError::InvalidTrustedAuthorityValue { .. })
        ));
    }

    #[test]
    fn trusted_authority_other_type_round_trips() {
        let authority: TrustedAuthorityQuery = serde_json::from_value(json!({
            "type": "custom_framework",
            "values": ["anything goes"]
        }))
        .unwrap();
        assert_eq!(
            authority.authority_type(),
            &TrustedAuthorityType::Other("custom_framework".into())
        );
        assert!(authority.validate().is_ok());
    }
}
