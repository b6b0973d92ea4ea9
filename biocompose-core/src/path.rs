//! Locations within the shared state tree.
//!
//! A [`StatePath`] is an ordered sequence of string segments.
//! Two ports refer to the same datum exactly when their paths are equal.
//! Paths serialise as JSON arrays of segments but may also be written as
//! `/`-separated strings in hand-authored documents.

use crate::errors::{ComposeError, ComposeResult};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A location in the shared state tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatePath(Vec<String>);

impl StatePath {
    /// Create a path from its segments.
    ///
    /// Returns an error if the path is empty or any segment is blank.
    pub fn new(segments: Vec<String>) -> ComposeResult<Self> {
        if segments.is_empty() || segments.iter().any(|s| s.is_empty()) {
            return Err(ComposeError::MalformedPath(segments.join("/")));
        }
        Ok(Self(segments))
    }

    /// Parse a `/`-separated path string.
    pub fn parse(path: &str) -> ComposeResult<Self> {
        let segments: Vec<String> = path.split('/').map(|s| s.to_string()).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(ComposeError::MalformedPath(path.to_string()));
        }
        Self::new(segments)
    }

    /// Build a single-segment path.
    pub fn root(segment: &str) -> Self {
        Self(vec![segment.to_string()])
    }

    /// Append a segment, yielding a child path.
    pub fn join(&self, segment: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when `self` is an ancestor of `other` or the same path.
    ///
    /// Used to decide whether a write to one path is observable through
    /// a port bound to another.
    pub fn is_prefix_of(&self, other: &StatePath) -> bool {
        other.0.len() >= self.0.len() && self.0.iter().zip(other.0.iter()).all(|(a, b)| a == b)
    }
}

impl fmt::Display for StatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

impl Serialize for StatePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StatePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Segments(Vec<String>),
            Joined(String),
        }

        let path = match Repr::deserialize(deserializer)? {
            Repr::Segments(segments) => StatePath::new(segments),
            Repr::Joined(joined) => StatePath::parse(&joined),
        };
        path.map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let path = StatePath::parse("results/copasi").unwrap();
        assert_eq!(path.segments(), ["results", "copasi"]);
        assert_eq!(path.to_string(), "results/copasi");
    }

    #[test]
    fn rejects_empty_segments() {
        assert!(StatePath::parse("").is_err());
        assert!(StatePath::parse("a//b").is_err());
        assert!(StatePath::new(vec![]).is_err());
    }

    #[test]
    fn prefix_relation() {
        let results = StatePath::root("results");
        let child = results.join("copasi");
        assert!(results.is_prefix_of(&child));
        assert!(results.is_prefix_of(&results));
        assert!(!child.is_prefix_of(&results));
        assert!(!StatePath::root("other").is_prefix_of(&child));
    }

    #[test]
    fn deserialises_both_forms() {
        let from_seq: StatePath = serde_json::from_str(r#"["results", "copasi"]"#).unwrap();
        let from_str: StatePath = serde_json::from_str(r#""results/copasi""#).unwrap();
        assert_eq!(from_seq, from_str);

        let serialised = serde_json::to_string(&from_seq).unwrap();
        assert_eq!(serialised, r#"["results","copasi"]"#);
    }
}
