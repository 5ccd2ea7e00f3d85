use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::claim_set::ClaimSetMatch;
use crate::core::claims_path::MatchMode;
use crate::core::credential::CredentialRecord;
use crate::core::credential_query::{evaluate_credential_query, CredentialMatch, MetaMatch};
use crate::core::credential_set::{can_be_satisfied, evaluate_credential_sets, CredentialSetMatch};
use crate::core::query::{DcqlQuery, QueryError};
use crate::core::trusted_authority::TrustedAuthorityMatch;

/// The outcome for one presented credential, keyed in the result by the
/// credential query id it was presented under.
///
/// Mirrors [`CredentialMatch`] without the candidate trace: exactly one
/// credential is presented per id.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PresentationMatch {
    success: bool,
    meta: MetaMatch,
    trusted_authority: TrustedAuthorityMatch,
    claims: ClaimSetMatch,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<CredentialRecord>,
}

impl PresentationMatch {
    pub fn success(&self) -> bool {
        self.success
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

impl From<&CredentialMatch> for PresentationMatch {
    fn from(candidate: &CredentialMatch) -> Self {
        Self {
            success: candidate.success(),
            meta: candidate.meta().clone(),
            trusted_authority: candidate.trusted_authority().clone(),
            claims: candidate.claims().clone(),
            output: candidate.output().cloned(),
        }
    }
}

/// The verifier-facing outcome of validating an actual presentation against
/// the original query.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DcqlPresentationResult {
    can_be_satisfied: bool,
    /// One entry per presented credential, keyed by credential query id.
    presentations: BTreeMap<String, PresentationMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    credential_sets: Option<Vec<CredentialSetMatch>>,
}

impl DcqlPresentationResult {
    pub fn can_be_satisfied(&self) -> bool {
        self.can_be_satisfied
    }

    pub fn presentations(&self) -> &BTreeMap<String, PresentationMatch> {
        &self.presentations
    }

    pub fn presentation(&self, credential_query_id: &str) -> Option<&PresentationMatch> {
        self.presentations.get(credential_query_id)
    }

    pub fn credential_sets(&self) -> Option<&[CredentialSetMatch]> {
        self.credential_sets.as_deref()
    }
}

impl DcqlQuery {
    /// Validates the credentials actually handed over against this query.
    ///
    /// Each presented credential is re-evaluated as the sole candidate for
    /// the id it was presented under, in presentation mode (selective
    /// disclosure may have collapsed arrays to the disclosed element).
    /// Credential set satisfiability is then recomputed from the
    /// presentation-scoped successes.
    ///
    /// Fatal errors: an empty presentation record, or a presented id that
    /// does not appear in the query. A presented credential that merely does
    /// not match is reported in the result, not raised.
    pub fn evaluate_presentation(
        &self,
        presented: &BTreeMap<String, CredentialRecord>,
    ) -> Result<DcqlPresentationResult, QueryError> {
        self.validate()?;
        if presented.is_empty() {
            return Err(QueryError::EmptyPresentation);
        }

        debug!(presented = presented.len(), "validating presentation");

        let mut presentations = BTreeMap::new();
        for (id, credential) in presented {
            let Some(query) = self.credential_query(id) else {
                return Err(QueryError::UnknownPresentationId(id.clone()));
            };
            let outcome = evaluate_credential_query(
                query,
                std::slice::from_ref(credential),
                MatchMode::Presentation,
            );
            presentations.insert(id.clone(), PresentationMatch::from(&outcome.all()[0]));
        }

        let satisfied: HashSet<&str> = presentations
            .iter()
            .filter(|(_, m)| m.success)
            .map(|(id, _)| id.as_str())
            .collect();

        let credential_sets = self
            .credential_sets()
            .map(|sets| evaluate_credential_sets(sets, &satisfied));
        let can_be_satisfied = can_be_satisfied(
            self.credentials().len(),
            &satisfied,
            credential_sets.as_deref(),
        );

        Ok(DcqlPresentationResult {
            can_be_satisfied,
            presentations,
            credential_sets,
        })
    }

    /// Strict variant of [`evaluate_presentation`](Self::evaluate_presentation)
    /// for callers that need a hard accept/reject: any unsatisfied required
    /// credential query or credential set is raised as a [`QueryError`]
    /// instead of being reported in the result.
    pub fn validate_presentation(
        &self,
        presented: &BTreeMap<String, CredentialRecord>,
    ) -> Result<DcqlPresentationResult, QueryError> {
        let result = self.evaluate_presentation(presented)?;

        if let Some(matches) = result.credential_sets() {
            if let Some(index) = matches.iter().position(|m| !m.is_satisfied()) {
                warn!(
                    credential_set = index,
                    "required credential set not satisfied by the presentation"
                );
                return Err(QueryError::UnsatisfiedCredentialSet(index));
            }
        } else if let Some(query) = self
            .credentials()
            .iter()
            .find(|q| !result.presentation(q.id()).is_some_and(PresentationMatch::success))
        {
            warn!(
                credential_query_id = query.id(),
                "credential query not satisfied by the presentation"
            );
            return Err(QueryError::UnsatisfiedCredentialQuery(query.id().to_string()));
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{from_value, json};

    fn pid_query() -> DcqlQuery {
        from_value(json!({
            "credentials": [
                {
                    "id": "pid",
                    "format": "dc+sd-jwt",
                    "meta": { "vct_values": ["https://example.com/pid"] },
                    "claims": [
                        { "path": ["given_name"] },
                        { "path": ["nationalities", 1] }
                    ]
                }
            ]
        }))
        .unwrap()
    }

    fn presented(value: serde_json::Value) -> BTreeMap<String, CredentialRecord> {
        let mut map = BTreeMap::new();
        map.insert("pid".to_string(), from_value(value).unwrap());
        map
    }

    #[test]
    fn valid_presentation_is_accepted() {
        let query = pid_query();
        let presentation = presented(json!({
            "format": "dc+sd-jwt",
            "vct": "https://example.com/pid",
            "claims": {
                "given_name": "Arthur",
                "nationalities": [null, "Betelgeusian"]
            }
        }));

        let result = query.validate_presentation(&presentation).unwrap();
        assert!(result.can_be_satisfied());
        assert!(result.presentation("pid").unwrap().success());
    }

    #[test]
    fn collapsed_array_is_accepted_in_presentation_mode() {
        let query = pid_query();
        let presentation = presented(json!({
            "format": "dc+sd-jwt",
            "vct": "https://example.com/pid",
            "claims": {
                "given_name": "Arthur",
                "nationalities": ["Betelgeusian"]
            }
        }));

        let result = query.evaluate_presentation(&presentation).unwrap();
        assert!(result.can_be_satisfied());
    }

    #[test]
    fn empty_presentation_is_fatal() {
        let query = pid_query();
        let result = query.evaluate_presentation(&BTreeMap::new());
        assert!(matches!(result, Err(QueryError::EmptyPresentation)));
    }

    #[test]
    fn unknown_presented_id_is_fatal() {
        let query = pid_query();
        let mut presentation = presented(json!({
            "format": "dc+sd-jwt",
            "vct": "https://example.com/pid",
            "claims": { "given_name": "Arthur", "nationalities": [null, "x"] }
        }));
        presentation.insert(
            "other".to_string(),
            from_value(json!({
                "format": "dc+sd-jwt",
                "vct": "https://example.com/other",
                "claims": {}
            }))
            .unwrap(),
        );

        let result = query.evaluate_presentation(&presentation);
        assert!(matches!(
            result,
            Err(QueryError::UnknownPresentationId(id)) if id == "other"
        ));
    }

    #[test]
    fn non_matching_presentation_is_a_result_not_an_error() {
        let query = pid_query();
        let presentation = presented(json!({
            "format": "dc+sd-jwt",
            "vct": "https://example.com/pid",
            "claims": { "family_name": "Dent" }
        }));

        let result = query.evaluate_presentation(&presentation).unwrap();
        assert!(!result.can_be_satisfied());
        assert!(!result.presentation("pid").unwrap().success());
    }

    #[test]
    fn strict_validation_raises_on_unsatisfied_query() {
        let query = pid_query();
        let presentation = presented(json!({
            "format": "dc+sd-jwt",
            "vct": "https://example.com/pid",
            "claims": { "family_name": "Dent" }
        }));

        let result = query.validate_presentation(&presentation);
        assert!(matches!(
            result,
            Err(QueryError::UnsatisfiedCredentialQuery(id)) if id == "pid"
        ));
    }

    #[test]
    fn strict_validation_raises_on_unsatisfied_required_set() {
        let query: DcqlQuery = from_value(json!({
            "credentials": [
                { "id": "a", "format": "dc+sd-jwt", "meta": { "vct_values": ["https://example.com/a"] } },
                { "id": "b", "format": "dc+sd-jwt", "meta": { "vct_values": ["https://example.com/b"] } }
            ],
            "credential_sets": [
                { "options": [["a"]] },
                { "options": [["b"]] }
            ]
        }))
        .unwrap();

        let mut presentation = BTreeMap::new();
        presentation.insert(
            "a".to_string(),
            from_value(json!({
                "format": "dc+sd-jwt",
                "vct": "https://example.com/a",
                "claims": {}
            }))
            .unwrap(),
        );

        let result = query.validate_presentation(&presentation);
        assert!(matches!(
            result,
            Err(QueryError::UnsatisfiedCredentialSet(1))
        ));
    }
}
