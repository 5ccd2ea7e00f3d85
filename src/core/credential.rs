use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::core::credential_format::CredentialFormat;
use crate::core::query::TrustedAuthorityType;
use crate::utils::NonEmptyVec;

/// A candidate credential held by a wallet, or a credential actually handed
/// over in a presentation.
///
/// Supplied by the credential store collaborator; the engine only reads it.
/// The claim tree is a namespace map for mdocs and a JSON object for the
/// path-addressed formats.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "format")]
pub enum CredentialRecord {
    #[serde(rename = "mso_mdoc")]
    Mdoc(MdocRecord),
    #[serde(rename = "dc+sd-jwt", alias = "vc+sd-jwt")]
    SdJwtVc(SdJwtVcRecord),
    #[serde(rename = "jwt_vc_json")]
    JwtVcJson(W3cVcRecord),
    #[serde(rename = "ldp_vc")]
    LdpVc(W3cVcRecord),
}

impl CredentialRecord {
    pub fn format(&self) -> CredentialFormat {
        match self {
            Self::Mdoc(_) => CredentialFormat::MsoMdoc,
            Self::SdJwtVc(_) => CredentialFormat::SdJwtVc,
            Self::JwtVcJson(_) => CredentialFormat::JwtVcJson,
            Self::LdpVc(_) => CredentialFormat::LdpVc,
        }
    }

    /// The issuing authority the credential declares, if any.
    pub fn authority(&self) -> Option<&AuthorityRecord> {
        match self {
            Self::Mdoc(r) => r.authority.as_ref(),
            Self::SdJwtVc(r) => r.authority.as_ref(),
            Self::JwtVcJson(r) | Self::LdpVc(r) => r.authority.as_ref(),
        }
    }

    /// Whether the credential can be presented with cryptographic holder
    /// binding. Absent means capable.
    pub fn supports_cryptographic_holder_binding(&self) -> bool {
        let raw = match self {
            Self::Mdoc(r) => r.cryptographic_holder_binding,
            Self::SdJwtVc(r) => r.cryptographic_holder_binding,
            Self::JwtVcJson(r) | Self::LdpVc(r) => r.cryptographic_holder_binding,
        };
        raw.unwrap_or(true)
    }

    /// The claim tree of a path-addressed credential, `None` for mdocs.
    pub fn claims(&self) -> Option<&Map<String, Json>> {
        match self {
            Self::Mdoc(_) => None,
            Self::SdJwtVc(r) => Some(&r.claims),
            Self::JwtVcJson(r) | Self::LdpVc(r) => Some(&r.claims),
        }
    }
}

/// An ISO/IEC 18013-5 mdoc candidate.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MdocRecord {
    doctype: String,
    /// Data elements grouped by namespace.
    namespaces: BTreeMap<String, BTreeMap<String, Json>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    authority: Option<AuthorityRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cryptographic_holder_binding: Option<bool>,
}

impl MdocRecord {
    pub fn new(doctype: String, namespaces: BTreeMap<String, BTreeMap<String, Json>>) -> Self {
        Self {
            doctype,
            namespaces,
            authority: None,
            cryptographic_holder_binding: None,
        }
    }

    pub fn doctype(&self) -> &str {
        &self.doctype
    }

    pub fn namespaces(&self) -> &BTreeMap<String, BTreeMap<String, Json>> {
        &self.namespaces
    }

    pub fn set_authority(&mut self, authority: Option<AuthorityRecord>) {
        self.authority = authority;
    }

    pub fn set_cryptographic_holder_binding(&mut self, binding: Option<bool>) {
        self.cryptographic_holder_binding = binding;
    }

    pub(crate) fn masked(&self, namespaces: BTreeMap<String, BTreeMap<String, Json>>) -> Self {
        Self {
            doctype: self.doctype.clone(),
            namespaces,
            authority: self.authority.clone(),
            cryptographic_holder_binding: self.cryptographic_holder_binding,
        }
    }
}

/// An IETF SD-JWT VC candidate.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SdJwtVcRecord {
    vct: String,
    /// The (possibly selectively disclosed) claim tree.
    claims: Map<String, Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    authority: Option<AuthorityRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cryptographic_holder_binding: Option<bool>,
}

impl SdJwtVcRecord {
    pub fn new(vct: String, claims: Map<String, Json>) -> Self {
        Self {
            vct,
            claims,
            authority: None,
            cryptographic_holder_binding: None,
        }
    }

    pub fn vct(&self) -> &str {
        &self.vct
    }

    pub fn claims(&self) -> &Map<String, Json> {
        &self.claims
    }

    pub fn set_authority(&mut self, authority: Option<AuthorityRecord>) {
        self.authority = authority;
    }

    pub fn set_cryptographic_holder_binding(&mut self, binding: Option<bool>) {
        self.cryptographic_holder_binding = binding;
    }

    pub(crate) fn masked(&self, claims: Map<String, Json>) -> Self {
        Self {
            vct: self.vct.clone(),
            claims,
            authority: self.authority.clone(),
            cryptographic_holder_binding: self.cryptographic_holder_binding,
        }
    }
}

/// A W3C VC candidate (`jwt_vc_json` or `ldp_vc`).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct W3cVcRecord {
    /// The credential's declared type array.
    #[serde(rename = "type")]
    types: Vec<String>,
    claims: Map<String, Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    authority: Option<AuthorityRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cryptographic_holder_binding: Option<bool>,
}

impl W3cVcRecord {
    pub fn new(types: Vec<String>, claims: Map<String, Json>) -> Self {
        Self {
            types,
            claims,
            authority: None,
            cryptographic_holder_binding: None,
        }
    }

    pub fn types(&self) -> &[String] {
        &self.types
    }

    pub fn claims(&self) -> &Map<String, Json> {
        &self.claims
    }

    pub fn set_authority(&mut self, authority: Option<AuthorityRecord>) {
        self.authority = authority;
    }

    pub fn set_cryptographic_holder_binding(&mut self, binding: Option<bool>) {
        self.cryptographic_holder_binding = binding;
    }

    pub(crate) fn masked(&self, claims: Map<String, Json>) -> Self {
        Self {
            types: self.types.clone(),
            claims,
            authority: self.authority.clone(),
            cryptographic_holder_binding: self.cryptographic_holder_binding,
        }
    }
}

/// The issuing authority a credential declares: a trust framework type and
/// the identifiers the credential claims under it.
///
/// The engine compares these identifiers against a query's trusted authority
/// constraints; it does not verify the claim cryptographically.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct AuthorityRecord {
    #[serde(rename = "type")]
    authority_type: TrustedAuthorityType,
    values: NonEmptyVec<String>,
}

impl AuthorityRecord {
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
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn de_serialize_mdoc_record() {
        let value = json!({
            "format": "mso_mdoc",
            "doctype": "org.iso.18013.5.1.mDL",
            "namespaces": {
                "org.iso.18013.5.1": {
                    "given_name": "Erika",
                    "age_over_18": true
                }
            },
            "authority": {
                "type": "aki",
                "values": ["s9tIpPmhxdiuNkHMEWNpYim8S8Y"]
            }
        });
        let record: CredentialRecord = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(record.format(), CredentialFormat::MsoMdoc);
        assert_eq!(
            record.authority().unwrap().authority_type(),
            &TrustedAuthorityType::Aki
        );
        assert!(record.supports_cryptographic_holder_binding());
        assert_eq!(value, serde_json::to_value(&record).unwrap());
    }

    #[test]
    fn w3c_record_type_field() {
        let record: CredentialRecord = serde_json::from_value(json!({
            "format": "ldp_vc",
            "type": ["VerifiableCredential", "UniversityDegreeCredential"],
            "claims": { "name": "Arthur Dent" }
        }))
        .unwrap();
        let CredentialRecord::LdpVc(vc) = &record else {
            panic!("expected ldp_vc");
        };
        assert_eq!(vc.types().len(), 2);
        assert_eq!(record.format(), CredentialFormat::LdpVc);
    }

    #[test]
    fn holder_binding_opt_out() {
        let record: CredentialRecord = serde_json::from_value(json!({
            "format": "dc+sd-jwt",
            "vct": "https://example.com/pid",
            "claims": {},
            "cryptographic_holder_binding": false
        }))
        .unwrap();
        assert!(!record.supports_cryptographic_holder_binding());
    }
}
