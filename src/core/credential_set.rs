use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::{debug, warn};

use crate::core::claims_path::MatchMode;
use crate::core::credential::CredentialRecord;
use crate::core::credential_query::{evaluate_credential_query, CredentialQueryMatch};
use crate::core::query::{CredentialSetQuery, DcqlQuery, QueryError};

/// The outcome of one credential set query.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CredentialSetMatch {
    required: bool,
    /// The options whose every credential query succeeded; absent when none
    /// did.
    #[serde(skip_serializing_if = "Option::is_none")]
    matching_options: Option<Vec<Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    purpose: Option<Json>,
}

impl CredentialSetMatch {
    pub fn required(&self) -> bool {
        self.required
    }

    pub fn matching_options(&self) -> Option<&[Vec<String>]> {
        self.matching_options.as_deref()
    }

    pub fn purpose(&self) -> Option<&Json> {
        self.purpose.as_ref()
    }

    /// A non-required set is informational and never blocks satisfiability.
    pub fn is_satisfied(&self) -> bool {
        !self.required || self.matching_options.is_some()
    }
}

/// The overall outcome of evaluating a DCQL query against a set of candidate
/// credentials.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DcqlQueryResult {
    can_be_satisfied: bool,
    /// One entry per credential query, in query order.
    credential_matches: Vec<CredentialQueryMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    credential_sets: Option<Vec<CredentialSetMatch>>,
}

impl DcqlQueryResult {
    pub fn can_be_satisfied(&self) -> bool {
        self.can_be_satisfied
    }

    pub fn credential_matches(&self) -> &[CredentialQueryMatch] {
        &self.credential_matches
    }

    pub fn credential_match(&self, credential_query_id: &str) -> Option<&CredentialQueryMatch> {
        self.credential_matches
            .iter()
            .find(|m| m.credential_query_id() == credential_query_id)
    }

    pub fn credential_sets(&self) -> Option<&[CredentialSetMatch]> {
        self.credential_sets.as_deref()
    }
}

/// Evaluates every credential set query against the set of credential query
/// ids that succeeded.
pub(crate) fn evaluate_credential_sets(
    sets: &[CredentialSetQuery],
    satisfied: &HashSet<&str>,
) -> Vec<CredentialSetMatch> {
    sets.iter()
        .map(|set| {
            let matching: Vec<Vec<String>> = set
                .options()
                .iter()
                .filter(|option| option.iter().all(|id| satisfied.contains(id.as_str())))
                .map(|option| option.to_vec())
                .collect();
            let matching_options = (!matching.is_empty()).then_some(matching);
            if matching_options.is_none() && set.is_required() {
                warn!("required credential set has no matching option");
            }
            CredentialSetMatch {
                required: set.is_required(),
                matching_options,
                purpose: set.purpose().cloned(),
            }
        })
        .collect()
}

/// Overall satisfiability: with credential sets, every required set needs a
/// matching option; without, every credential query must have succeeded.
pub(crate) fn can_be_satisfied(
    credential_query_count: usize,
    satisfied: &HashSet<&str>,
    credential_sets: Option<&[CredentialSetMatch]>,
) -> bool {
    match credential_sets {
        Some(sets) => sets.iter().all(CredentialSetMatch::is_satisfied),
        None => satisfied.len() == credential_query_count,
    }
}

impl DcqlQuery {
    /// Evaluates this query against the candidate credentials a wallet
    /// holds.
    ///
    /// Pure: the query and the candidates are only read, and repeated calls
    /// with the same inputs produce equal results. Fails fast with a
    /// [`QueryError`] when the query itself is malformed; a non-matching
    /// candidate set is not an error but a result with
    /// `can_be_satisfied == false`.
    pub fn evaluate(
        &self,
        candidates: &[CredentialRecord],
    ) -> Result<DcqlQueryResult, QueryError> {
        self.validate()?;
        debug!(
            credential_queries = self.credentials().len(),
            candidates = candidates.len(),
            "evaluating DCQL query"
        );

        let credential_matches: Vec<CredentialQueryMatch> = self
            .credentials()
            .iter()
            .map(|query| evaluate_credential_query(query, candidates, MatchMode::Record))
            .collect();

        let satisfied: HashSet<&str> = credential_matches
            .iter()
            .filter(|m| m.success())
            .map(|m| m.credential_query_id())
            .collect();

        let credential_sets = self
            .credential_sets()
            .map(|sets| evaluate_credential_sets(sets, &satisfied));
        let can_be_satisfied = can_be_satisfied(
            self.credentials().len(),
            &satisfied,
            credential_sets.as_deref(),
        );

        Ok(DcqlQueryResult {
            can_be_satisfied,
            credential_matches,
            credential_sets,
        })
    }
}
