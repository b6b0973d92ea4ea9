//! The step contract.
//!
//! A step is the unit of computation: it declares a configuration schema,
//! typed input and output ports, and a small lifecycle. The composite is the
//! only caller; it guarantees that values handed to [`Step::update`] validate
//! against [`Step::inputs`] and it validates returned values against
//! [`Step::outputs`] before committing them to the state tree.

use crate::errors::{ComposeError, ComposeResult};
use crate::types::TypeRegistry;
use serde_json::Value;
use std::collections::HashMap;

/// Raw configuration of a step, taken verbatim from the document.
pub type StepConfig = serde_json::Map<String, Value>;

/// Values keyed by port name, exchanged between the composite and a step.
pub type PortValues = HashMap<String, Value>;

/// Declared ports of a step: port name to type name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortSchema {
    ports: std::collections::BTreeMap<String, String>,
}

impl PortSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_port(mut self, name: &str, type_name: &str) -> Self {
        self.ports.insert(name.to_string(), type_name.to_string());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.ports.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ports.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.ports.iter()
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

/// A declared configuration key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigField {
    pub name: String,
    pub type_name: String,
    pub required: bool,
}

/// Declared configuration keys of a step type.
///
/// Construction is fail-fast: a step constructor validates its raw
/// configuration against this schema before doing anything else, so a typo in
/// a document fails at composite construction rather than mid-run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSchema {
    fields: Vec<ConfigField>,
}

impl ConfigSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: &str, type_name: &str) -> Self {
        self.fields.push(ConfigField {
            name: name.to_string(),
            type_name: type_name.to_string(),
            required: true,
        });
        self
    }

    pub fn optional(mut self, name: &str, type_name: &str) -> Self {
        self.fields.push(ConfigField {
            name: name.to_string(),
            type_name: type_name.to_string(),
            required: false,
        });
        self
    }

    pub fn fields(&self) -> &[ConfigField] {
        &self.fields
    }

    /// Check a raw configuration against this schema.
    pub fn validate(&self, config: &StepConfig, types: &TypeRegistry) -> ComposeResult<()> {
        for field in &self.fields {
            match config.get(&field.name) {
                None if field.required => {
                    return Err(ComposeError::Configuration(format!(
                        "missing required key {:?}",
                        field.name
                    )));
                }
                None => {}
                Some(value) => {
                    if !types.validate(&field.type_name, value)? {
                        return Err(ComposeError::Configuration(format!(
                            "key {:?} does not conform to {:?}",
                            field.name, field.type_name
                        )));
                    }
                }
            }
        }
        for key in config.keys() {
            if !self.fields.iter().any(|f| &f.name == key) {
                return Err(ComposeError::Configuration(format!(
                    "unrecognised key {key:?}"
                )));
            }
        }
        Ok(())
    }
}

/// A single computation unit with declared ports.
///
/// Lifecycle: the constructor validates configuration, [`Step::initialize`]
/// performs one-time expensive setup (loading a model, caching identifiers)
/// and is called exactly once by the composite builder, then
/// [`Step::update`] may be called repeatedly. Calling `update` before
/// `initialize` is a [`ComposeError::Lifecycle`] error.
pub trait Step: std::fmt::Debug {
    /// The declared configuration keys of this step type.
    fn config_schema(&self) -> ConfigSchema;

    /// Input ports, fixed for the step's lifetime.
    fn inputs(&self) -> PortSchema;

    /// Output ports, fixed for the step's lifetime.
    fn outputs(&self) -> PortSchema;

    /// One-time setup after construction.
    fn initialize(&mut self) -> ComposeResult<()>;

    /// Port values consistent with the freshly initialised internal model.
    ///
    /// Used to seed state paths the document leaves unseeded. The default
    /// provides nothing.
    fn initial_state(&self) -> PortValues {
        PortValues::new()
    }

    /// Perform one unit of work.
    ///
    /// Pure with respect to declared ports, but implementations may advance
    /// internal simulation state as a documented side effect.
    fn update(&mut self, inputs: &PortValues) -> ComposeResult<PortValues>;

    /// The span of simulated time one `update` call covers.
    ///
    /// `None` marks a one-shot step which runs exactly once per composite
    /// run, after all interval steps have reached the target time.
    fn interval(&self) -> Option<f64> {
        None
    }
}

/// Fetch a required float from a schema-validated configuration.
pub fn config_f64(config: &StepConfig, key: &str) -> ComposeResult<f64> {
    config
        .get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| ComposeError::Configuration(format!("missing numeric key {key:?}")))
}

/// Fetch a required string from a schema-validated configuration.
pub fn config_str<'a>(config: &'a StepConfig, key: &str) -> ComposeResult<&'a str> {
    config
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ComposeError::Configuration(format!("missing string key {key:?}")))
}

/// Fetch a required non-negative integer from a schema-validated
/// configuration.
pub fn config_usize(config: &StepConfig, key: &str) -> ComposeResult<usize> {
    config
        .get(key)
        .and_then(Value::as_u64)
        .map(|n| n as usize)
        .ok_or_else(|| ComposeError::Configuration(format!("missing integer key {key:?}")))
}
