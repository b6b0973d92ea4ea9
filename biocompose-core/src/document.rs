//! Composition documents.
//!
//! A document is the serialisable description of a composite: a `schema`
//! declaring the types of literal state entries, a `state` map holding
//! literals and step records side by side, and an optional `bridge` naming
//! the paths callers read after a run. State entry order is significant and
//! is preserved through (de)serialisation.

use crate::errors::{ComposeError, ComposeResult};
use crate::path::StatePath;
use crate::step::StepConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Marker value distinguishing step records from literal state entries.
pub const STEP_MARKER: &str = "step";

/// A step record inside a document's state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepSpec {
    #[serde(rename = "_type")]
    marker: String,
    /// Address of the step type, e.g. `local:CompareResults`.
    pub address: String,
    #[serde(default, skip_serializing_if = "StepConfig::is_empty")]
    pub config: StepConfig,
    /// Input port name to state path bindings.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, StatePath>,
    /// Output port name to state path bindings.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, StatePath>,
}

impl StepSpec {
    pub fn new(address: &str) -> Self {
        Self {
            marker: STEP_MARKER.to_string(),
            address: address.to_string(),
            config: StepConfig::new(),
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn with_config_value(mut self, key: &str, value: Value) -> Self {
        self.config.insert(key.to_string(), value);
        self
    }

    pub fn with_input(mut self, port: &str, path: StatePath) -> Self {
        self.inputs.insert(port.to_string(), path);
        self
    }

    pub fn with_output(mut self, port: &str, path: StatePath) -> Self {
        self.outputs.insert(port.to_string(), path);
        self
    }
}

/// A composition document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Declared types of literal state entries, keyed by state key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<BTreeMap<String, String>>,
    /// Literal values and step records, in declaration order.
    #[serde(default)]
    pub state: serde_json::Map<String, Value>,
    /// Named result paths surfaced to callers after a run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridge: Option<BTreeMap<String, StatePath>>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the type of a literal state entry.
    pub fn declare(&mut self, key: &str, type_name: &str) -> &mut Self {
        self.schema
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), type_name.to_string());
        self
    }

    pub fn insert_literal(&mut self, key: &str, value: Value) -> &mut Self {
        self.state.insert(key.to_string(), value);
        self
    }

    pub fn insert_step(&mut self, key: &str, spec: StepSpec) -> &mut Self {
        let value = serde_json::to_value(spec).expect("step records should serialise to JSON");
        self.state.insert(key.to_string(), value);
        self
    }

    pub fn insert_bridge(&mut self, name: &str, path: StatePath) -> &mut Self {
        self.bridge
            .get_or_insert_with(BTreeMap::new)
            .insert(name.to_string(), path);
        self
    }

    /// Step records in declaration order.
    ///
    /// Fails with [`ComposeError::DocumentFormat`] when a `_type` marker is
    /// present but the record does not parse as a step.
    pub fn step_specs(&self) -> ComposeResult<Vec<(String, StepSpec)>> {
        let mut specs = Vec::new();
        for (key, value) in &self.state {
            match entry_marker(value) {
                Some(STEP_MARKER) => {
                    let spec: StepSpec = serde_json::from_value(value.clone()).map_err(|err| {
                        ComposeError::DocumentFormat(format!(
                            "state entry '{key}' is not a valid step record: {err}"
                        ))
                    })?;
                    specs.push((key.clone(), spec));
                }
                Some(other) => {
                    return Err(ComposeError::DocumentFormat(format!(
                        "state entry '{key}' has unsupported _type '{other}'"
                    )))
                }
                None => {}
            }
        }
        Ok(specs)
    }

    /// Literal state entries in declaration order.
    pub fn literals(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.state
            .iter()
            .filter(|(_, value)| entry_marker(value).is_none())
    }

    pub fn from_json_str(raw: &str) -> ComposeResult<Self> {
        serde_json::from_str(raw)
            .map_err(|err| ComposeError::DocumentFormat(format!("invalid document JSON: {err}")))
    }

    pub fn to_json_string(&self) -> ComposeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_toml_str(raw: &str) -> ComposeResult<Self> {
        toml::from_str(raw)
            .map_err(|err| ComposeError::DocumentFormat(format!("invalid document TOML: {err}")))
    }

    pub fn to_toml_string(&self) -> ComposeResult<String> {
        toml::to_string_pretty(self).map_err(|err| {
            ComposeError::DocumentFormat(format!("document not expressible as TOML: {err}"))
        })
    }
}

fn entry_marker(value: &Value) -> Option<&str> {
    value.as_object()?.get("_type")?.as_str()
}
