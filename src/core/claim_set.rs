use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::debug;

use crate::core::claims_path::{
    merge_projections, resolve_claims_query, ClaimsQueryMatch, MatchMode,
};
use crate::core::credential::CredentialRecord;
use crate::core::issues::Issues;
use crate::core::query::CredentialQuery;

/// The outcome of one attempted claim set against one candidate credential.
///
/// Claim indexes refer to positions in the credential query's `claims` list.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ClaimSetAttempt {
    success: bool,
    /// Position in the declared `claim_sets` list; `None` for the implicit
    /// all-claims set used when no claim sets are declared.
    #[serde(skip_serializing_if = "Option::is_none")]
    claim_set_index: Option<usize>,
    valid_claim_indexes: Vec<usize>,
    failed_claim_indexes: Vec<usize>,
    /// The merged projection of every member claims query, when the set
    /// succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<Json>,
    #[serde(default, skip_serializing_if = "Issues::is_empty")]
    issues: Issues,
}

impl ClaimSetAttempt {
    pub fn success(&self) -> bool {
        self.success
    }

    pub fn claim_set_index(&self) -> Option<usize> {
        self.claim_set_index
    }

    pub fn valid_claim_indexes(&self) -> &[usize] {
        &self.valid_claim_indexes
    }

    pub fn failed_claim_indexes(&self) -> &[usize] {
        &self.failed_claim_indexes
    }

    pub fn output(&self) -> Option<&Json> {
        self.output.as_ref()
    }

    pub fn issues(&self) -> &Issues {
        &self.issues
    }
}

/// The best claim-set outcome for one candidate credential, with the full
/// trace of every claim set attempted before (and including) the winner.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ClaimSetMatch {
    success: bool,
    /// The winning claim set's position in the declared `claim_sets` list;
    /// `None` when no claim sets are declared or no set succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    claim_set_index: Option<usize>,
    /// The winner's merged projection.
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<Json>,
    /// On success, the winner's member indexes; on failure, every claim
    /// index that passed in any attempted set.
    valid_claim_indexes: Vec<usize>,
    /// On success, empty; on failure, every claim index that failed in any
    /// attempted set.
    failed_claim_indexes: Vec<usize>,
    /// On failure, the issues of every attempted claim set.
    #[serde(default, skip_serializing_if = "Issues::is_empty")]
    issues: Issues,
    attempts: Vec<ClaimSetAttempt>,
}

impl ClaimSetMatch {
    /// A credential query without claims queries constrains no claims.
    fn trivial() -> Self {
        Self {
            success: true,
            claim_set_index: None,
            output: None,
            valid_claim_indexes: Vec::new(),
            failed_claim_indexes: Vec::new(),
            issues: Issues::new(),
            attempts: Vec::new(),
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn claim_set_index(&self) -> Option<usize> {
        self.claim_set_index
    }

    pub fn output(&self) -> Option<&Json> {
        self.output.as_ref()
    }

    pub fn valid_claim_indexes(&self) -> &[usize] {
        &self.valid_claim_indexes
    }

    pub fn failed_claim_indexes(&self) -> &[usize] {
        &self.failed_claim_indexes
    }

    pub fn issues(&self) -> &Issues {
        &self.issues
    }

    pub fn attempts(&self) -> &[ClaimSetAttempt] {
        &self.attempts
    }
}

/// Finds the first claim set (in declaration order) whose every member
/// claims query resolves against the candidate.
///
/// Claim sets after the winner are not attempted; the trace of every
/// attempted set is retained for diagnostics.
pub(crate) fn evaluate_claim_sets(
    query: &CredentialQuery,
    credential: &CredentialRecord,
    mode: MatchMode,
) -> ClaimSetMatch {
    let Some(claims) = query.claims() else {
        return ClaimSetMatch::trivial();
    };

    let resolved: Vec<ClaimsQueryMatch> = claims
        .iter()
        .map(|claim| resolve_claims_query(claim, credential, mode))
        .collect();

    // The sets to try, as positions into the claims list.
    let sets: Vec<(Option<usize>, Vec<Option<usize>>)> = match query.claim_sets() {
        None => vec![(None, (0..claims.len()).map(Some).collect())],
        Some(claim_sets) => claim_sets
            .iter()
            .enumerate()
            .map(|(index, set)| {
                let members = set
                    .iter()
                    .map(|id| claims.iter().position(|c| c.id() == Some(id)))
                    .collect();
                (Some(index), members)
            })
            .collect(),
    };

    let mut attempts = Vec::with_capacity(sets.len());
    for (claim_set_index, members) in sets {
        let mut valid_claim_indexes = Vec::new();
        let mut failed_claim_indexes = Vec::new();
        let mut issues = Issues::new();
        let mut output: Option<Json> = None;
        let mut complete = true;

        for member in members {
            // Unresolvable ids are rejected by `DcqlQuery::validate` before
            // evaluation starts.
            let Some(claim_index) = member else {
                complete = false;
                continue;
            };
            let outcome = &resolved[claim_index];
            if outcome.success() {
                valid_claim_indexes.push(claim_index);
                if let Some(projection) = outcome.output() {
                    output = Some(match output {
                        None => projection.clone(),
                        Some(merged) => merge_projections(merged, projection),
                    });
                }
            } else {
                failed_claim_indexes.push(claim_index);
                issues.merge(outcome.issues().clone());
            }
        }

        let success = complete && failed_claim_indexes.is_empty();
        attempts.push(ClaimSetAttempt {
            success,
            claim_set_index,
            valid_claim_indexes,
            failed_claim_indexes,
            output: if success { output } else { None },
            issues,
        });

        if success {
            debug!(?claim_set_index, "claim set satisfied");
            break;
        }
    }

    let winner = match attempts.last() {
        Some(attempt) if attempt.success => Some((
            attempt.claim_set_index,
            attempt.output.clone(),
            attempt.valid_claim_indexes.clone(),
        )),
        _ => None,
    };

    match winner {
        Some((claim_set_index, output, valid_claim_indexes)) => ClaimSetMatch {
            success: true,
            claim_set_index,
            output,
            valid_claim_indexes,
            failed_claim_indexes: Vec::new(),
            issues: Issues::new(),
            attempts,
        },
        None => {
            let mut issues = Issues::new();
            let mut valid: BTreeSet<usize> = BTreeSet::new();
            let mut failed: BTreeSet<usize> = BTreeSet::new();
            for attempt in &attempts {
                issues.merge(attempt.issues.clone());
                valid.extend(attempt.valid_claim_indexes.iter().copied());
                failed.extend(attempt.failed_claim_indexes.iter().copied());
            }
            ClaimSetMatch {
                success: false,
                claim_set_index: None,
                output: None,
                valid_claim_indexes: valid.into_iter().collect(),
                failed_claim_indexes: failed.into_iter().collect(),
                issues,
                attempts,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::core::credential::SdJwtVcRecord;
    use crate::core::query::DcqlQuery;

    fn pid_credential(claims: Json) -> CredentialRecord {
        let Json::Object(claims) = claims else {
            panic!("claims fixture must be an object");
        };
        CredentialRecord::SdJwtVc(SdJwtVcRecord::new("https://example.com/pid".into(), claims))
    }

    fn query_with_claim_sets() -> CredentialQuery {
        let query: DcqlQuery = serde_json::from_value(json!({
            "credentials": [
                {
                    "id": "pid",
                    "format": "dc+sd-jwt",
                    "meta": {},
                    "claims": [
                        { "id": "a", "path": ["given_name"] },
                        { "id": "b", "path": ["family_name"] },
                        { "id": "c", "path": ["nickname"] }
                    ],
                    "claim_sets": [["c"], ["a", "b"]]
                }
            ]
        }))
        .unwrap();
        query.credentials()[0].clone()
    }

    #[test]
    fn first_declared_set_wins() {
        let query = query_with_claim_sets();
        let credential = pid_credential(json!({
            "given_name": "Arthur",
            "family_name": "Dent",
            "nickname": "Monkeyman"
        }));

        let result = evaluate_claim_sets(&query, &credential, MatchMode::Record);
        assert!(result.success());
        assert_eq!(result.claim_set_index(), Some(0));
        assert_eq!(result.output().unwrap(), &json!({ "nickname": "Monkeyman" }));
        // Sets after the winner are not attempted.
        assert_eq!(result.attempts().len(), 1);
    }

    #[test]
    fn later_set_wins_when_earlier_fails() {
        let query = query_with_claim_sets();
        let credential = pid_credential(json!({
            "given_name": "Arthur",
            "family_name": "Dent"
        }));

        let result = evaluate_claim_sets(&query, &credential, MatchMode::Record);
        assert!(result.success());
        assert_eq!(result.claim_set_index(), Some(1));
        assert_eq!(result.valid_claim_indexes(), &[0, 1]);
        assert_eq!(
            result.output().unwrap(),
            &json!({ "given_name": "Arthur", "family_name": "Dent" })
        );
        // The failed first attempt is retained for diagnostics.
        assert_eq!(result.attempts().len(), 2);
        assert!(!result.attempts()[0].success());
        assert!(result.attempts()[0].issues().get("nickname").is_some());
    }

    #[test]
    fn failure_aggregates_every_attempted_set() {
        let query = query_with_claim_sets();
        let credential = pid_credential(json!({ "given_name": "Arthur" }));

        let result = evaluate_claim_sets(&query, &credential, MatchMode::Record);
        assert!(!result.success());
        assert_eq!(result.claim_set_index(), None);
        assert_eq!(result.attempts().len(), 2);
        assert!(result.issues().get("nickname").is_some());
        assert!(result.issues().get("family_name").is_some());
        assert_eq!(result.valid_claim_indexes(), &[0]);
        assert_eq!(result.failed_claim_indexes(), &[1, 2]);
    }

    #[test]
    fn implicit_set_requires_every_claim() {
        let query: DcqlQuery = serde_json::from_value(json!({
            "credentials": [
                {
                    "id": "pid",
                    "format": "dc+sd-jwt",
                    "meta": {},
                    "claims": [
                        { "path": ["given_name"] },
                        { "path": ["family_name"] }
                    ]
                }
            ]
        }))
        .unwrap();
        let query = query.credentials()[0].clone();

        let complete = pid_credential(json!({
            "given_name": "Arthur",
            "family_name": "Dent"
        }));
        let result = evaluate_claim_sets(&query, &complete, MatchMode::Record);
        assert!(result.success());
        assert_eq!(result.claim_set_index(), None);
        assert_eq!(
            result.output().unwrap(),
            &json!({ "given_name": "Arthur", "family_name": "Dent" })
        );

        let partial = pid_credential(json!({ "given_name": "Arthur" }));
        let result = evaluate_claim_sets(&query, &partial, MatchMode::Record);
        assert!(!result.success());
        assert_eq!(result.failed_claim_indexes(), &[1]);
    }

    #[test]
    fn no_claims_is_a_trivial_success() {
        let query: DcqlQuery = serde_json::from_value(json!({
            "credentials": [
                { "id": "pid", "format": "dc+sd-jwt", "meta": {} }
            ]
        }))
        .unwrap();
        let query = query.credentials()[0].clone();
        let credential = pid_credential(json!({ "anything": true }));

        let result = evaluate_claim_sets(&query, &credential, MatchMode::Record);
        assert!(result.success());
        assert!(result.attempts().is_empty());
        assert!(result.output().is_none());
    }
}
