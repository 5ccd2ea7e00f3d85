use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use tracing::debug;

use crate::core::claim_set::{evaluate_claim_sets, ClaimSetMatch};
use crate::core::claims_path::MatchMode;
use crate::core::credential::CredentialRecord;
use crate::core::issues::Issues;
use crate::core::query::CredentialQuery;
use crate::core::trusted_authority::{evaluate_trusted_authorities, TrustedAuthorityMatch};

/// The outcome of checking a candidate's format, metadata and holder-binding
/// capability against a credential query.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct MetaMatch {
    success: bool,
    #[serde(default, skip_serializing_if = "Issues::is_empty")]
    issues: Issues,
}

impl MetaMatch {
    pub fn success(&self) -> bool {
        self.success
    }

    pub fn issues(&self) -> &Issues {
        &self.issues
    }
}

/// The complete outcome for one candidate credential against one credential
/// query.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CredentialMatch {
    success: bool,
    /// Position of the candidate in the evaluated credential list.
    input_credential_index: usize,
    meta: MetaMatch,
    trusted_authority: TrustedAuthorityMatch,
    claims: ClaimSetMatch,
    /// On success, the masked credential containing exactly the matched
    /// claims; a wallet can present it as-is.
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<CredentialRecord>,
}

impl CredentialMatch {
    pub fn success(&self) -> bool {
        self.success
    }

    pub fn input_credential_index(&self) -> usize {
        self.input_credential_index
    }

    pub fn meta(&self) -> &MetaMatch {
        &self.meta
    }

    pub fn trusted_authority(&self) -> &TrustedAuthorityMatch {
        &self.trusted_authority
    }

    pub fn claims(&self) -> &ClaimSetMatch {
        &self.claims
    }

    pub fn output(&self) -> Option<&CredentialRecord> {
        self.output.as_ref()
    }
}

/// The outcome of one credential query over every candidate credential: the
/// best match plus the full per-candidate trace.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CredentialQueryMatch {
    credential_query_id: String,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    best: Option<CredentialMatch>,
    all: Vec<CredentialMatch>,
}

impl CredentialQueryMatch {
    pub fn credential_query_id(&self) -> &str {
        &self.credential_query_id
    }

    pub fn success(&self) -> bool {
        self.success
    }

    /// The first succeeding candidate with the lowest winning claim-set
    /// index, ties broken by candidate order.
    pub fn best(&self) -> Option<&CredentialMatch> {
        self.best.as_ref()
    }

    /// Every candidate's outcome, in candidate order.
    pub fn all(&self) -> &[CredentialMatch] {
        &self.all
    }
}

/// Evaluates one credential query against every candidate credential.
pub(crate) fn evaluate_credential_query(
    query: &CredentialQuery,
    candidates: &[CredentialRecord],
    mode: MatchMode,
) -> CredentialQueryMatch {
    debug!(
        credential_query_id = query.id(),
        format = %query.format(),
        candidates = candidates.len(),
        "evaluating credential query"
    );

    let all: Vec<CredentialMatch> = candidates
        .iter()
        .enumerate()
        .map(|(index, candidate)| {
            let meta = evaluate_meta(query, candidate);
            let trusted_authority = evaluate_trusted_authorities(
                query.trusted_authorities().map(AsRef::as_ref),
                candidate.authority(),
            );
            let claims = evaluate_claim_sets(query, candidate, mode);
            let success = meta.success() && trusted_authority.success() && claims.success();
            let output = success.then(|| masked_output(candidate, &claims));
            CredentialMatch {
                success,
                input_credential_index: index,
                meta,
                trusted_authority,
                claims,
                output,
            }
        })
        .collect();

    let mut best: Option<&CredentialMatch> = None;
    for candidate in &all {
        if !candidate.success {
            continue;
        }
        let rank = candidate.claims.claim_set_index().unwrap_or(0);
        let improves = match best {
            None => true,
            Some(current) => rank < current.claims.claim_set_index().unwrap_or(0),
        };
        if improves {
            best = Some(candidate);
        }
    }

    if let Some(best) = best {
        debug!(
            credential_query_id = query.id(),
            input_credential_index = best.input_credential_index,
            "credential query satisfied"
        );
    }

    CredentialQueryMatch {
        credential_query_id: query.id().to_string(),
        success: best.is_some(),
        best: best.cloned(),
        all,
    }
}

/// Format, metadata and holder-binding checks for one candidate.
fn evaluate_meta(query: &CredentialQuery, credential: &CredentialRecord) -> MetaMatch {
    let mut issues = Issues::new();

    match (query, credential) {
        (CredentialQuery::Mdoc(q), CredentialRecord::Mdoc(record)) => {
            if let Some(doctype) = q.meta().doctype_value() {
                if doctype != record.doctype() {
                    issues.push(
                        "meta.doctype_value",
                        format!(
                            "expected doctype `{doctype}`, found `{}`",
                            record.doctype()
                        ),
                    );
                }
            }
        }
        (CredentialQuery::SdJwtVc(q), CredentialRecord::SdJwtVc(record)) => {
            if let Some(vct_values) = q.meta().vct_values() {
                if !vct_values.iter().any(|vct| vct == record.vct()) {
                    issues.push(
                        "meta.vct_values",
                        format!("vct `{}` is not one of the accepted values", record.vct()),
                    );
                }
            }
        }
        (CredentialQuery::JwtVcJson(q), CredentialRecord::JwtVcJson(record))
        | (CredentialQuery::LdpVc(q), CredentialRecord::LdpVc(record)) => {
            if let Some(type_values) = q.meta().type_values() {
                let satisfied = type_values
                    .iter()
                    .any(|set| set.iter().all(|t| record.types().contains(t)));
                if !satisfied {
                    issues.push(
                        "meta.type_values",
                        "the credential's types do not include all types of any accepted set",
                    );
                }
            }
        }
        _ => {
            issues.push(
                "format",
                format!(
                    "expected format `{}`, found `{}`",
                    query.format(),
                    credential.format()
                ),
            );
        }
    }

    if query.require_cryptographic_holder_binding()
        && !credential.supports_cryptographic_holder_binding()
    {
        issues.push(
            "require_cryptographic_holder_binding",
            "the credential cannot be presented with cryptographic holder binding",
        );
    }

    MetaMatch {
        success: issues.is_empty(),
        issues,
    }
}

/// Builds the masked credential a wallet would present for a successful
/// match: the candidate's metadata with the claim tree replaced by the
/// winning claim set's merged projection.
fn masked_output(credential: &CredentialRecord, claims: &ClaimSetMatch) -> CredentialRecord {
    let projection = claims.output();
    match credential {
        CredentialRecord::Mdoc(record) => {
            CredentialRecord::Mdoc(record.masked(namespaces_from_projection(projection)))
        }
        CredentialRecord::SdJwtVc(record) => {
            CredentialRecord::SdJwtVc(record.masked(object_from_projection(projection)))
        }
        CredentialRecord::JwtVcJson(record) => {
            CredentialRecord::JwtVcJson(record.masked(object_from_projection(projection)))
        }
        CredentialRecord::LdpVc(record) => {
            CredentialRecord::LdpVc(record.masked(object_from_projection(projection)))
        }
    }
}

fn object_from_projection(projection: Option<&Json>) -> Map<String, Json> {
    match projection {
        Some(Json::Object(map)) => map.clone(),
        _ => Map::new(),
    }
}

fn namespaces_from_projection(
    projection: Option<&Json>,
) -> BTreeMap<String, BTreeMap<String, Json>> {
    let mut namespaces = BTreeMap::new();
    if let Some(Json::Object(map)) = projection {
        for (namespace, elements) in map {
            if let Json::Object(elements) = elements {
                namespaces.insert(
                    namespace.clone(),
                    elements
                        .iter()
                        .map(|(name, value)| (name.clone(), value.clone()))
                        .collect(),
                );
            }
        }
    }
    namespaces
}
