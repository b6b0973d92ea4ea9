//! Steady-state adapter.

use crate::engine::{EngineBackend, KineticsEngine};
use crate::steps::{
    apply_overrides, concentration_seed, NumericResult, PORT_RESULT, PORT_SPECIES_CONCENTRATIONS,
    PORT_SPECIES_COUNTS,
};
use biocompose_core::errors::{ComposeError, ComposeResult};
use biocompose_core::step::{
    config_str, ConfigSchema, PortSchema, PortValues, Step, StepConfig,
};
use biocompose_core::types::TypeRegistry;
use serde_json::Value;
use std::fmt;

/// Drives the model to steady state once per run.
///
/// A one-shot step: it runs after every interval step has reached the target
/// time. The `result` port carries a mapping with two tables, `steady_state`
/// holding the converged concentrations and `jacobian` holding the system
/// Jacobian evaluated there.
pub struct SteadyStateStep {
    backend: EngineBackend,
    model_source: String,
    engine: Option<Box<dyn KineticsEngine>>,
}

impl SteadyStateStep {
    pub fn new(backend: EngineBackend, model_source: &str) -> Self {
        Self {
            backend,
            model_source: model_source.to_string(),
            engine: None,
        }
    }

    pub fn from_config(
        config: &StepConfig,
        types: &TypeRegistry,
        backend: EngineBackend,
    ) -> ComposeResult<Box<dyn Step>> {
        let probe = Self::new(backend, "");
        probe.config_schema().validate(config, types)?;
        let model_source = config_str(config, "model_source")?;
        Ok(Box::new(Self::new(backend, model_source)))
    }
}

impl fmt::Debug for SteadyStateStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SteadyStateStep")
            .field("backend", &self.backend)
            .field("model_source", &self.model_source)
            .field("loaded", &self.engine.is_some())
            .finish()
    }
}

impl Step for SteadyStateStep {
    fn config_schema(&self) -> ConfigSchema {
        ConfigSchema::new().required("model_source", "string")
    }

    fn inputs(&self) -> PortSchema {
        PortSchema::new()
            .with_port(PORT_SPECIES_CONCENTRATIONS, "map[float]")
            .with_port(PORT_SPECIES_COUNTS, "map[float]")
    }

    fn outputs(&self) -> PortSchema {
        PortSchema::new().with_port(PORT_RESULT, "numeric_results")
    }

    fn initialize(&mut self) -> ComposeResult<()> {
        self.engine = Some(self.backend.load(&self.model_source)?);
        Ok(())
    }

    fn initial_state(&self) -> PortValues {
        match &self.engine {
            Some(engine) => concentration_seed(engine.as_ref()),
            None => PortValues::new(),
        }
    }

    fn update(&mut self, inputs: &PortValues) -> ComposeResult<PortValues> {
        let engine = self.engine.as_mut().ok_or_else(|| {
            ComposeError::Lifecycle("update called before initialize".to_string())
        })?;
        apply_overrides(engine.as_mut(), inputs);

        let steady = engine.steady_state()?;
        let columns = engine.floating_species_ids();
        let jacobian = engine.jacobian();

        let steady_result = NumericResult {
            time: vec![0.0],
            columns: columns.clone(),
            values: vec![steady],
        };
        let jacobian_result = NumericResult {
            time: Vec::new(),
            columns,
            values: jacobian.outer_iter().map(|row| row.to_vec()).collect(),
        };

        let mut tables = serde_json::Map::new();
        tables.insert(
            "steady_state".to_string(),
            serde_json::to_value(&steady_result)?,
        );
        tables.insert("jacobian".to_string(), serde_json::to_value(&jacobian_result)?);

        let mut outputs = PortValues::new();
        outputs.insert(PORT_RESULT.to_string(), Value::Object(tables));
        Ok(outputs)
    }
}

/// Constructor for the `local:DopriSteadyStateStep` address.
pub(crate) fn dopri_steady_state_from_config(
    config: &StepConfig,
    types: &TypeRegistry,
) -> ComposeResult<Box<dyn Step>> {
    SteadyStateStep::from_config(config, types, EngineBackend::Dopri)
}

/// Constructor for the `local:Rk4SteadyStateStep` address.
pub(crate) fn rk4_steady_state_from_config(
    config: &StepConfig,
    types: &TypeRegistry,
) -> ComposeResult<Box<dyn Step>> {
    SteadyStateStep::from_config(config, types, EngineBackend::Rk4)
}
