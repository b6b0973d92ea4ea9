//! The shared state tree.
//!
//! A tree of named slots, each holding either a raw value or a nested tree.
//! The composite owns the tree exclusively for the duration of a run. Steps
//! never hold references into it: inputs are cloned out immediately before
//! each invocation and outputs are written back by the composite afterwards.

use crate::errors::{ComposeError, ComposeResult};
use crate::path::StatePath;
use serde_json::{Map, Value};

/// Process-wide state shared by all steps of a composite.
#[derive(Debug, Clone, Default)]
pub struct StateTree {
    root: Map<String, Value>,
}

impl StateTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the value at a path.
    ///
    /// A path addressing an interior node returns the whole subtree, which is
    /// how a port typed `map[...]` observes every child written below it.
    pub fn get(&self, path: &StatePath) -> Option<&Value> {
        let (first, rest) = path.segments().split_first()?;
        let mut current = self.root.get(first)?;
        for segment in rest {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    pub fn contains(&self, path: &StatePath) -> bool {
        self.get(path).is_some()
    }

    /// Write a value at a path, creating interior nodes as needed.
    ///
    /// Fails if an interior segment is occupied by a raw value, since the
    /// write would silently destroy data another port may be bound to.
    pub fn set(&mut self, path: &StatePath, value: Value) -> ComposeResult<()> {
        let segments = path.segments();
        let mut current = &mut self.root;
        for segment in &segments[..segments.len() - 1] {
            let slot = current
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            current = slot.as_object_mut().ok_or_else(|| {
                ComposeError::Composition(format!(
                    "path {path} traverses {segment:?} which holds a raw value"
                ))
            })?;
        }
        current.insert(segments[segments.len() - 1].clone(), value);
        Ok(())
    }

    /// The whole tree as a JSON value.
    pub fn as_value(&self) -> Value {
        Value::Object(self.root.clone())
    }

    /// Top-level entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.root.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_and_get_nested() {
        let mut tree = StateTree::new();
        let path = StatePath::parse("results/copasi").unwrap();
        tree.set(&path, json!({"time": [0.0]})).unwrap();

        assert_eq!(tree.get(&path).unwrap(), &json!({"time": [0.0]}));
        // Reading the parent returns the subtree
        assert_eq!(
            tree.get(&StatePath::root("results")).unwrap(),
            &json!({"copasi": {"time": [0.0]}})
        );
        assert!(!tree.contains(&StatePath::root("missing")));
    }

    #[test]
    fn overwrite_keeps_siblings() {
        let mut tree = StateTree::new();
        tree.set(&StatePath::parse("results/a").unwrap(), json!(1.0))
            .unwrap();
        tree.set(&StatePath::parse("results/b").unwrap(), json!(2.0))
            .unwrap();
        tree.set(&StatePath::parse("results/a").unwrap(), json!(3.0))
            .unwrap();

        assert_eq!(
            tree.get(&StatePath::root("results")).unwrap(),
            &json!({"a": 3.0, "b": 2.0})
        );
    }

    #[test]
    fn cannot_descend_through_raw_value() {
        let mut tree = StateTree::new();
        tree.set(&StatePath::root("x"), json!(1.0)).unwrap();
        let err = tree
            .set(&StatePath::parse("x/child").unwrap(), json!(2.0))
            .unwrap_err();
        assert!(matches!(err, ComposeError::Composition(_)));
    }
}
