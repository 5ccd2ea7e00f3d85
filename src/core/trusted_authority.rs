use serde::{Deserialize, Serialize};

use crate::core::credential::AuthorityRecord;
use crate::core::issues::Issues;
use crate::core::query::{TrustedAuthorityQuery, TrustedAuthorityType};

/// The trust framework value under which a credential satisfied a trusted
/// authority query.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TrustedAuthorityOutput {
    #[serde(rename = "type")]
    authority_type: TrustedAuthorityType,
    value: String,
}

impl TrustedAuthorityOutput {
    pub fn authority_type(&self) -> &TrustedAuthorityType {
        &self.authority_type
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// The outcome of matching a credential's declared authority against a
/// query's trusted authority constraints.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TrustedAuthorityMatch {
    success: bool,
    /// Position of the first satisfied query in the `trusted_authorities`
    /// list.
    #[serde(skip_serializing_if = "Option::is_none")]
    authority_query_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<TrustedAuthorityOutput>,
    #[serde(default, skip_serializing_if = "Issues::is_empty")]
    issues: Issues,
}

impl TrustedAuthorityMatch {
    pub fn success(&self) -> bool {
        self.success
    }

    pub fn authority_query_index(&self) -> Option<usize> {
        self.authority_query_index
    }

    pub fn output(&self) -> Option<&TrustedAuthorityOutput> {
        self.output.as_ref()
    }

    pub fn issues(&self) -> &Issues {
        &self.issues
    }
}

/// Matches a credential's declared authority against the query's accepted
/// trust frameworks.
///
/// No queries is a trivial success. Otherwise the queries are tried in
/// order; the first whose type equals the credential's declared type and
/// whose values intersect the credential's values wins. Failures distinguish
/// a missing authority object from a type mismatch from a value mismatch.
pub(crate) fn evaluate_trusted_authorities(
    queries: Option<&[TrustedAuthorityQuery]>,
    authority: Option<&AuthorityRecord>,
) -> TrustedAuthorityMatch {
    let Some(queries) = queries else {
        return TrustedAuthorityMatch {
            success: true,
            authority_query_index: None,
            output: None,
            issues: Issues::new(),
        };
    };

    let Some(authority) = authority else {
        let mut issues = Issues::new();
        for (index, _) in queries.iter().enumerate() {
            issues.push(
                format!("trusted_authorities.{index}"),
                "the credential does not declare an issuing authority",
            );
        }
        return TrustedAuthorityMatch {
            success: false,
            authority_query_index: None,
            output: None,
            issues,
        };
    };

    let mut issues = Issues::new();
    for (index, query) in queries.iter().enumerate() {
        if query.authority_type() != authority.authority_type() {
            issues.push(
                format!("trusted_authorities.{index}"),
                format!(
                    "expected authority type `{}`, found `{}`",
                    query.authority_type(),
                    authority.authority_type()
                ),
            );
            continue;
        }

        match authority
            .values()
            .iter()
            .find(|v| query.values().contains(*v))
        {
            Some(value) => {
                return TrustedAuthorityMatch {
                    success: true,
                    authority_query_index: Some(index),
                    output: Some(TrustedAuthorityOutput {
                        authority_type: authority.authority_type().clone(),
                        value: value.clone(),
                    }),
                    issues: Issues::new(),
                };
            }
            None => {
                issues.push(
                    format!("trusted_authorities.{index}"),
                    format!(
                        "none of the credential's `{}` authority values is accepted",
                        authority.authority_type()
                    ),
                );
            }
        }
    }

    TrustedAuthorityMatch {
        success: false,
        authority_query_index: None,
        output: None,
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{from_value, json};

    fn aki_queries() -> Vec<TrustedAuthorityQuery> {
        vec![from_value(json!({
            "type": "aki",
            "values": ["s9tIpPmhxdiuNkHMEWNpYim8S8Y", "c2FtcGxlLWFraS12YWx1ZQ"]
        }))
        .unwrap()]
    }

    #[test]
    fn no_queries_is_trivially_satisfied() {
        let result = evaluate_trusted_authorities(None, None);
        assert!(result.success());
        assert!(result.output().is_none());
    }

    #[test]
    fn first_intersecting_value_wins() {
        let authority: AuthorityRecord = from_value(json!({
            "type": "aki",
            "values": ["s9tIpPmhxdiuNkHMEWNpYim8S8Y"]
        }))
        .unwrap();

        let result = evaluate_trusted_authorities(Some(&aki_queries()), Some(&authority));
        assert!(result.success());
        assert_eq!(result.authority_query_index(), Some(0));
        assert_eq!(
            result.output().unwrap().value(),
            "s9tIpPmhxdiuNkHMEWNpYim8S8Y"
        );
    }

    #[test]
    fn type_mismatch_is_distinguished_from_value_mismatch() {
        let federation: AuthorityRecord = from_value(json!({
            "type": "openid_federation",
            "values": ["https://trustanchor.example.com"]
        }))
        .unwrap();
        let result = evaluate_trusted_authorities(Some(&aki_queries()), Some(&federation));
        assert!(!result.success());
        let messages = result.issues().get("trusted_authorities.0").unwrap();
        assert!(messages[0].contains("authority type"));

        let wrong_value: AuthorityRecord = from_value(json!({
            "type": "aki",
            "values": ["bm90LWFjY2VwdGVk"]
        }))
        .unwrap();
        let result = evaluate_trusted_authorities(Some(&aki_queries()), Some(&wrong_value));
        assert!(!result.success());
        let messages = result.issues().get("trusted_authorities.0").unwrap();
        assert!(messages[0].contains("authority values"));
    }

    #[test]
    fn absent_authority_object_is_reported_per_query() {
        let result = evaluate_trusted_authorities(Some(&aki_queries()), None);
        assert!(!result.success());
        let messages = result.issues().get("trusted_authorities.0").unwrap();
        assert!(messages[0].contains("does not declare"));
    }
}
