use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Diagnostic issues produced while matching a credential against a query.
///
/// Issues are keyed by the dotted path of the field they concern (for claim
/// issues, the claims path; for metadata issues, the query field name), each
/// mapping to one or more human-readable messages. Issues never abort an
/// evaluation; they are carried inside the result tree so a failed match can
/// be inspected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Issues(BTreeMap<String, Vec<String>>);

impl Issues {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single issue at the given path.
    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        let mut issues = Self::new();
        issues.push(path, message);
        issues
    }

    /// Records a message for a field path.
    pub fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.0.entry(path.into()).or_default().push(message.into());
    }

    /// Folds all issues of `other` into `self`, preserving message order.
    pub fn merge(&mut self, other: Issues) {
        for (path, messages) in other.0 {
            self.0.entry(path).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Messages recorded for the given field path.
    pub fn get(&self, path: &str) -> Option<&[String]> {
        self.0.get(path).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_preserves_existing_messages() {
        let mut a = Issues::single("claims.age", "value mismatch");
        let mut b = Issues::new();
        b.push("claims.age", "not disclosed");
        b.push("format", "unexpected format");
        a.merge(b);

        assert_eq!(a.len(), 2);
        assert_eq!(
            a.get("claims.age").unwrap(),
            &["value mismatch".to_string(), "not disclosed".to_string()][..]
        );
    }

    #[test]
    fn serializes_as_plain_map() {
        let issues = Issues::single("a.b", "missing");
        assert_eq!(
            serde_json::to_value(&issues).unwrap(),
            serde_json::json!({"a.b": ["missing"]})
        );
    }
}
