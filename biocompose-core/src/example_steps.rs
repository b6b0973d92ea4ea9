//! Small step implementations used in tests and documentation.
//!
//! These exercise the composite without pulling in a simulation engine: a
//! relay that copies a value through, an interval counter that advances a
//! simulated clock, an accumulator that reads its own output back, and a step
//! that always fails.

use crate::errors::{ComposeError, ComposeResult};
use crate::registry::{StepAddress, StepRegistry};
use crate::step::{config_f64, ConfigSchema, PortSchema, PortValues, Step, StepConfig};
use crate::types::TypeRegistry;
use serde_json::Value;

/// Copies its `value` input to its `value` output once per run.
#[derive(Debug, Clone, Default)]
pub struct RelayStep {
    initialized: bool,
}

impl RelayStep {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &StepConfig, types: &TypeRegistry) -> ComposeResult<Box<dyn Step>> {
        let step = Self::new();
        step.config_schema().validate(config, types)?;
        Ok(Box::new(step))
    }
}

impl Step for RelayStep {
    fn config_schema(&self) -> ConfigSchema {
        ConfigSchema::new()
    }

    fn inputs(&self) -> PortSchema {
        PortSchema::new().with_port("value", "any")
    }

    fn outputs(&self) -> PortSchema {
        PortSchema::new().with_port("value", "any")
    }

    fn initialize(&mut self) -> ComposeResult<()> {
        self.initialized = true;
        Ok(())
    }

    fn update(&mut self, inputs: &PortValues) -> ComposeResult<PortValues> {
        ensure_initialized(self.initialized)?;
        Ok(inputs.clone())
    }
}

/// Parameters for [`IntervalCounterStep`].
#[derive(Debug, Clone)]
pub struct IntervalCounterParameters {
    /// Simulated time covered by one invocation.
    pub step_time: f64,
}

/// An interval step that counts its own invocations.
///
/// Each `update` covers `step_time` of simulated time and writes the number
/// of invocations so far to the `count` output.
#[derive(Debug, Clone)]
pub struct IntervalCounterStep {
    parameters: IntervalCounterParameters,
    count: u64,
    initialized: bool,
}

impl IntervalCounterStep {
    pub fn from_parameters(parameters: IntervalCounterParameters) -> Self {
        Self {
            parameters,
            count: 0,
            initialized: false,
        }
    }

    pub fn from_config(config: &StepConfig, types: &TypeRegistry) -> ComposeResult<Box<dyn Step>> {
        let step = Self::from_parameters(IntervalCounterParameters { step_time: 1.0 });
        step.config_schema().validate(config, types)?;
        let step_time = config_f64(config, "step_time")?;
        if step_time <= 0.0 {
            return Err(ComposeError::Configuration(format!(
                "step_time must be positive, got {step_time}"
            )));
        }
        Ok(Box::new(Self::from_parameters(IntervalCounterParameters {
            step_time,
        })))
    }
}

impl Step for IntervalCounterStep {
    fn config_schema(&self) -> ConfigSchema {
        ConfigSchema::new().required("step_time", "float")
    }

    fn inputs(&self) -> PortSchema {
        PortSchema::new()
    }

    fn outputs(&self) -> PortSchema {
        PortSchema::new().with_port("count", "integer")
    }

    fn initialize(&mut self) -> ComposeResult<()> {
        self.initialized = true;
        Ok(())
    }

    fn initial_state(&self) -> PortValues {
        let mut values = PortValues::new();
        values.insert("count".to_string(), Value::from(self.count));
        values
    }

    fn update(&mut self, _inputs: &PortValues) -> ComposeResult<PortValues> {
        ensure_initialized(self.initialized)?;
        self.count += 1;
        let mut outputs = PortValues::new();
        outputs.insert("count".to_string(), Value::from(self.count));
        Ok(outputs)
    }

    fn interval(&self) -> Option<f64> {
        Some(self.parameters.step_time)
    }
}

/// Adds its `increment` input to its `total` input.
///
/// Binding the `total` input and output to the same path makes the step carry
/// a running total across invocations through the state tree.
#[derive(Debug, Clone, Default)]
pub struct AccumulatorStep {
    initialized: bool,
}

impl AccumulatorStep {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &StepConfig, types: &TypeRegistry) -> ComposeResult<Box<dyn Step>> {
        let step = Self::new();
        step.config_schema().validate(config, types)?;
        Ok(Box::new(step))
    }
}

impl Step for AccumulatorStep {
    fn config_schema(&self) -> ConfigSchema {
        ConfigSchema::new()
    }

    fn inputs(&self) -> PortSchema {
        PortSchema::new()
            .with_port("total", "float")
            .with_port("increment", "float")
    }

    fn outputs(&self) -> PortSchema {
        PortSchema::new().with_port("total", "float")
    }

    fn initialize(&mut self) -> ComposeResult<()> {
        self.initialized = true;
        Ok(())
    }

    fn update(&mut self, inputs: &PortValues) -> ComposeResult<PortValues> {
        ensure_initialized(self.initialized)?;
        let total = inputs.get("total").and_then(Value::as_f64).unwrap_or(0.0);
        let increment = inputs
            .get("increment")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let mut outputs = PortValues::new();
        outputs.insert("total".to_string(), Value::from(total + increment));
        Ok(outputs)
    }
}

/// A step whose `update` always fails.
#[derive(Debug, Clone, Default)]
pub struct FailingStep {
    initialized: bool,
}

impl FailingStep {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &StepConfig, types: &TypeRegistry) -> ComposeResult<Box<dyn Step>> {
        let step = Self::new();
        step.config_schema().validate(config, types)?;
        Ok(Box::new(step))
    }
}

impl Step for FailingStep {
    fn config_schema(&self) -> ConfigSchema {
        ConfigSchema::new()
    }

    fn inputs(&self) -> PortSchema {
        PortSchema::new()
    }

    fn outputs(&self) -> PortSchema {
        PortSchema::new().with_port("value", "any")
    }

    fn initialize(&mut self) -> ComposeResult<()> {
        self.initialized = true;
        Ok(())
    }

    fn update(&mut self, _inputs: &PortValues) -> ComposeResult<PortValues> {
        ensure_initialized(self.initialized)?;
        Err(ComposeError::Simulation("injected failure".to_string()))
    }
}

fn ensure_initialized(initialized: bool) -> ComposeResult<()> {
    if initialized {
        Ok(())
    } else {
        Err(ComposeError::Lifecycle(
            "update called before initialize".to_string(),
        ))
    }
}

/// Register the example steps in the `local` namespace.
pub fn register_example_steps(registry: &mut StepRegistry) {
    registry.register(StepAddress::local("Relay"), RelayStep::from_config);
    registry.register(
        StepAddress::local("IntervalCounter"),
        IntervalCounterStep::from_config,
    );
    registry.register(
        StepAddress::local("Accumulator"),
        AccumulatorStep::from_config,
    );
    registry.register(StepAddress::local("Failing"), FailingStep::from_config);
}
