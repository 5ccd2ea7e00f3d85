use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::core::credential::{CredentialRecord, MdocRecord};
use crate::core::issues::Issues;
use crate::core::query::{ClaimPathSegment, ClaimValue, ClaimsQuery, PathClaimsQuery};

/// How strictly claim trees are matched against a claims path.
///
/// `Record` evaluates a full candidate credential. `Presentation` evaluates a
/// credential that has already been selectively disclosed, where an array may
/// have collapsed to its single disclosed element (or a bare scalar); index
/// and wildcard segments then accept that element as standing in for the
/// whole sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Record,
    Presentation,
}

/// The outcome of resolving one claims query against one credential: a
/// masked projection of the claim tree on success, diagnostic issues on
/// failure.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ClaimsQueryMatch {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<Json>,
    #[serde(default, skip_serializing_if = "Issues::is_empty")]
    issues: Issues,
}

impl ClaimsQueryMatch {
    pub(crate) fn succeeded(output: Json) -> Self {
        Self {
            success: true,
            output: Some(output),
            issues: Issues::new(),
        }
    }

    pub(crate) fn failed(issues: Issues) -> Self {
        Self {
            success: false,
            output: None,
            issues,
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    /// The masked projection: everything of the claim tree this query
    /// matched, with unmatched sequence positions held as `null`.
    pub fn output(&self) -> Option<&Json> {
        self.output.as_ref()
    }

    pub fn issues(&self) -> &Issues {
        &self.issues
    }
}

/// Resolves a single claims query against a candidate credential's claim
/// tree.
pub(crate) fn resolve_claims_query(
    query: &ClaimsQuery,
    credential: &CredentialRecord,
    mode: MatchMode,
) -> ClaimsQueryMatch {
    let values: Option<&[ClaimValue]> = query.values().map(AsRef::as_ref);
    let resolved = match (query, credential) {
        (ClaimsQuery::Mdoc(q), CredentialRecord::Mdoc(record)) => {
            resolve_mdoc(q.namespace(), q.claim_name(), values, record)
        }
        (ClaimsQuery::Path(q), CredentialRecord::Mdoc(record)) => match mdoc_path(q.path()) {
            Some((namespace, claim_name)) => resolve_mdoc(namespace, claim_name, values, record),
            None => Err(Issues::single(
                query.label(),
                "mdoc claims are addressed by a [namespace, claim name] path",
            )),
        },
        (ClaimsQuery::Mdoc(q), _) => Err(Issues::single(
            format!("{}.{}", q.namespace(), q.claim_name()),
            "the namespace claims query form only applies to mdoc credentials",
        )),
        (ClaimsQuery::Path(q), CredentialRecord::SdJwtVc(record)) => {
            resolve_path_query(q, values, record.claims(), mode)
        }
        (
            ClaimsQuery::Path(q),
            CredentialRecord::JwtVcJson(record) | CredentialRecord::LdpVc(record),
        ) => resolve_path_query(q, values, record.claims(), mode),
    };

    match resolved {
        Ok(output) => ClaimsQueryMatch::succeeded(output),
        Err(issues) => ClaimsQueryMatch::failed(issues),
    }
}

/// An mdoc path is exactly `[namespace, claim name]`.
fn mdoc_path(path: &[ClaimPathSegment]) -> Option<(&str, &str)> {
    match path {
        [ClaimPathSegment::Key(namespace), ClaimPathSegment::Key(claim_name)] => {
            Some((namespace, claim_name))
        }
        _ => None,
    }
}

/// Two-level direct lookup into an mdoc's namespaces. The claim must be
/// present and non-null; if a value set is given the claim must equal one of
/// its members.
fn resolve_mdoc(
    namespace: &str,
    claim_name: &str,
    values: Option<&[ClaimValue]>,
    record: &MdocRecord,
) -> Result<Json, Issues> {
    let key = format!("{namespace}.{claim_name}");

    let Some(elements) = record.namespaces().get(namespace) else {
        return Err(Issues::single(
            key,
            format!("namespace `{namespace}` is not present in the credential"),
        ));
    };

    let value = match elements.get(claim_name) {
        None | Some(Json::Null) => {
            return Err(Issues::single(
                key,
                format!("claim `{claim_name}` is not present in namespace `{namespace}`"),
            ));
        }
        Some(value) => value,
    };

    if let Some(allowed) = values {
        if !allowed.iter().any(|v| v.matches(value)) {
            return Err(Issues::single(
                key,
                format!(
                    "claim `{claim_name}` in namespace `{namespace}` is expected to be one \
                     of {}, found {value}",
                    display_values(allowed)
                ),
            ));
        }
    }

    let mut claims = Map::new();
    claims.insert(claim_name.to_string(), value.clone());
    let mut namespaces = Map::new();
    namespaces.insert(namespace.to_string(), Json::Object(claims));
    Ok(Json::Object(namespaces))
}

fn resolve_path_query(
    query: &PathClaimsQuery,
    values: Option<&[ClaimValue]>,
    claims: &Map<String, Json>,
    mode: MatchMode,
) -> Result<Json, Issues> {
    // The top of a claim tree is always an object, so the first segment must
    // name a claim.
    let Some((first, rest)) = query.path().split_first() else {
        return Ok(Json::Object(Map::new()));
    };
    let ClaimPathSegment::Key(key) = first else {
        return Err(Issues::single(
            "$",
            format!("the first path segment must be a claim name, found `{first}`"),
        ));
    };

    let mut location = vec![key.clone()];
    let Some(child) = claims.get(key) else {
        return Err(Issues::single(
            location_key(&location),
            format!("claim `{}` is not present", location_key(&location)),
        ));
    };

    let inner = resolve_segments(rest, values, child, mode, &mut location)?;
    let mut object = Map::new();
    object.insert(key.clone(), inner);
    Ok(Json::Object(object))
}

/// Recursive descent over the claim tree, one path segment at a time.
///
/// `location` is the dotted path to `node`, used to key issues.
fn resolve_segments(
    segments: &[ClaimPathSegment],
    values: Option<&[ClaimValue]>,
    node: &Json,
    mode: MatchMode,
    location: &mut Vec<String>,
) -> Result<Json, Issues> {
    let Some((segment, rest)) = segments.split_first() else {
        return match_leaf(values, node, location);
    };

    match segment {
        ClaimPathSegment::Key(key) => {
            let Json::Object(map) = node else {
                return Err(Issues::single(
                    location_key(location),
                    format!(
                        "cannot select claim `{key}`: `{}` is not an object",
                        location_key(location)
                    ),
                ));
            };
            location.push(key.clone());
            let resolved = match map.get(key) {
                Some(child) => resolve_segments(rest, values, child, mode, location),
                None => Err(Issues::single(
                    location_key(location),
                    format!("claim `{}` is not present", location_key(location)),
                )),
            };
            location.pop();
            let inner = resolved?;
            let mut object = Map::new();
            object.insert(key.clone(), inner);
            Ok(Json::Object(object))
        }

        ClaimPathSegment::Index(index) => match node {
            // Presentation mode: a single-element sequence stands in for the
            // one disclosed element, whatever the requested index.
            Json::Array(items) if mode == MatchMode::Presentation && items.len() == 1 => {
                location.push(index.to_string());
                let resolved = resolve_segments(rest, values, &items[0], mode, location);
                location.pop();
                Ok(Json::Array(vec![resolved?]))
            }
            Json::Array(items) => {
                if *index >= items.len() {
                    return Err(Issues::single(
                        location_key(location),
                        format!(
                            "index {index} is out of bounds for sequence `{}` of length {}",
                            location_key(location),
                            items.len()
                        ),
                    ));
                }
                location.push(index.to_string());
                let resolved = resolve_segments(rest, values, &items[*index], mode, location);
                location.pop();
                let element = resolved?;
                let mut output = vec![Json::Null; items.len()];
                output[*index] = element;
                Ok(Json::Array(output))
            }
            // Presentation mode: a bare value stands in for the one
            // disclosed element and keeps its collapsed shape.
            other if mode == MatchMode::Presentation => {
                location.push(index.to_string());
                let resolved = resolve_segments(rest, values, other, mode, location);
                location.pop();
                resolved
            }
            _ => Err(Issues::single(
                location_key(location),
                format!(
                    "expected a sequence at `{}` to select index {index}",
                    location_key(location)
                ),
            )),
        },

        ClaimPathSegment::Wildcard => match node {
            Json::Array(items) => {
                let mut output = Vec::with_capacity(items.len());
                let mut issues = Issues::new();
                let mut matched = 0usize;
                for (i, element) in items.iter().enumerate() {
                    location.push(i.to_string());
                    match resolve_segments(rest, values, element, mode, location) {
                        Ok(value) => {
                            matched += 1;
                            output.push(value);
                        }
                        Err(element_issues) => {
                            issues.merge(element_issues);
                            output.push(Json::Null);
                        }
                    }
                    location.pop();
                }
                if matched == 0 {
                    issues.push(
                        location_key(location),
                        format!(
                            "no element of sequence `{}` matched",
                            location_key(location)
                        ),
                    );
                    return Err(issues);
                }
                Ok(Json::Array(output))
            }
            other if mode == MatchMode::Presentation => {
                resolve_segments(rest, values, other, mode, location)
            }
            _ => Err(Issues::single(
                location_key(location),
                format!(
                    "expected a sequence at `{}` to select every element",
                    location_key(location)
                ),
            )),
        },
    }
}

/// Leaf acceptance: any structurally present value, or equality with one of
/// the allowed literals.
fn match_leaf(
    values: Option<&[ClaimValue]>,
    node: &Json,
    location: &[String],
) -> Result<Json, Issues> {
    let Some(allowed) = values else {
        return Ok(node.clone());
    };
    if allowed.iter().any(|v| v.matches(node)) {
        return Ok(node.clone());
    }
    Err(Issues::single(
        location_key(location),
        format!(
            "claim `{}` is expected to be one of {}, found {node}",
            location_key(location),
            display_values(allowed)
        ),
    ))
}

fn display_values(values: &[ClaimValue]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn location_key(location: &[String]) -> String {
    if location.is_empty() {
        "$".to_string()
    } else {
        location.join(".")
    }
}

/// Merges the projections of two claims queries belonging to one claim set
/// into a combined view of everything disclosed.
///
/// Maps union, recursing into shared keys; sequences merge positionally,
/// preferring non-null elements; a later non-null scalar overwrites an
/// earlier `null` placeholder.
pub(crate) fn merge_projections(a: Json, b: &Json) -> Json {
    match (a, b) {
        (Json::Object(mut a_map), Json::Object(b_map)) => {
            for (key, b_value) in b_map {
                match a_map.remove(key) {
                    Some(a_value) => {
                        a_map.insert(key.clone(), merge_projections(a_value, b_value));
                    }
                    None => {
                        a_map.insert(key.clone(), b_value.clone());
                    }
                }
            }
            Json::Object(a_map)
        }
        (Json::Array(a_items), Json::Array(b_items)) => {
            let len = a_items.len().max(b_items.len());
            let mut a_iter = a_items.into_iter();
            let mut output = Vec::with_capacity(len);
            for i in 0..len {
                let a_value = a_iter.next().unwrap_or(Json::Null);
                let b_value = b_items.get(i).unwrap_or(&Json::Null);
                output.push(merge_projections(a_value, b_value));
            }
            Json::Array(output)
        }
        (a_value, Json::Null) => a_value,
        (_, b_value) => b_value.clone(),
    }
}
