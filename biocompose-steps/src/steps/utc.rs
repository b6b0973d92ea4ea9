//! Uniform time course adapter.

use crate::engine::{EngineBackend, KineticsEngine};
use crate::steps::{
    apply_overrides, concentration_seed, NumericResult, PORT_RESULT, PORT_SPECIES_CONCENTRATIONS,
    PORT_SPECIES_COUNTS,
};
use biocompose_core::errors::{ComposeError, ComposeResult};
use biocompose_core::step::{
    config_f64, config_str, config_usize, ConfigSchema, PortSchema, PortValues, Step, StepConfig,
};
use biocompose_core::types::TypeRegistry;
use std::fmt;

/// Simulates a fixed window of model time per invocation.
///
/// Each `update` applies any species overrides from the input ports, runs the
/// engine over `[0, time]` sampled at `n_points` uniform points and emits the
/// table on the `result` port. The engine keeps its final state, so
/// consecutive invocations stitch into one continuous trajectory.
pub struct UniformTimeCourseStep {
    backend: EngineBackend,
    model_source: String,
    time: f64,
    n_points: usize,
    columns_of_interest: Option<Vec<String>>,
    engine: Option<Box<dyn KineticsEngine>>,
}

impl UniformTimeCourseStep {
    pub fn new(backend: EngineBackend, model_source: &str, time: f64, n_points: usize) -> Self {
        Self {
            backend,
            model_source: model_source.to_string(),
            time,
            n_points,
            columns_of_interest: None,
            engine: None,
        }
    }

    /// Restrict the emitted table to the named columns.
    pub fn with_columns_of_interest(mut self, columns: Vec<String>) -> Self {
        self.columns_of_interest = Some(columns);
        self
    }

    pub fn from_config(
        config: &StepConfig,
        types: &TypeRegistry,
        backend: EngineBackend,
    ) -> ComposeResult<Box<dyn Step>> {
        let probe = Self::new(backend, "", 1.0, 2);
        probe.config_schema().validate(config, types)?;

        let model_source = config_str(config, "model_source")?;
        let time = config_f64(config, "time")?;
        let n_points = config_usize(config, "n_points")?;
        if time <= 0.0 {
            return Err(ComposeError::Configuration(format!(
                "time must be positive, got {time}"
            )));
        }
        if n_points < 2 {
            return Err(ComposeError::Configuration(format!(
                "n_points must be at least 2, got {n_points}"
            )));
        }

        let mut step = Self::new(backend, model_source, time, n_points);
        if let Some(value) = config.get("columns_of_interest") {
            step.columns_of_interest = Some(serde_json::from_value(value.clone())?);
        }
        Ok(Box::new(step))
    }
}

impl fmt::Debug for UniformTimeCourseStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UniformTimeCourseStep")
            .field("backend", &self.backend)
            .field("model_source", &self.model_source)
            .field("time", &self.time)
            .field("n_points", &self.n_points)
            .field("columns_of_interest", &self.columns_of_interest)
            .field("loaded", &self.engine.is_some())
            .finish()
    }
}

impl Step for UniformTimeCourseStep {
    fn config_schema(&self) -> ConfigSchema {
        ConfigSchema::new()
            .required("model_source", "string")
            .required("time", "float")
            .required("n_points", "integer")
            .optional("columns_of_interest", "columns_of_interest")
    }

    fn inputs(&self) -> PortSchema {
        PortSchema::new()
            .with_port(PORT_SPECIES_CONCENTRATIONS, "map[float]")
            .with_port(PORT_SPECIES_COUNTS, "map[float]")
    }

    fn outputs(&self) -> PortSchema {
        PortSchema::new().with_port(PORT_RESULT, "numeric_result")
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
        let trajectory = engine.simulate(0.0, self.time, self.n_points)?;

        let mut result = NumericResult::from(trajectory);
        if let Some(columns) = &self.columns_of_interest {
            result = retain_columns(result, columns);
        }

        let mut outputs = PortValues::new();
        outputs.insert(PORT_RESULT.to_string(), serde_json::to_value(&result)?);
        Ok(outputs)
    }

    fn interval(&self) -> Option<f64> {
        Some(self.time)
    }
}

/// Drop every column not named in `keep`, preserving table order.
fn retain_columns(result: NumericResult, keep: &[String]) -> NumericResult {
    let indices: Vec<usize> = result
        .columns
        .iter()
        .enumerate()
        .filter(|(_, column)| keep.contains(column))
        .map(|(index, _)| index)
        .collect();
    NumericResult {
        time: result.time,
        columns: indices
            .iter()
            .map(|&index| result.columns[index].clone())
            .collect(),
        values: result
            .values
            .iter()
            .map(|row| indices.iter().map(|&index| row[index]).collect())
            .collect(),
    }
}

/// Constructor for the `local:DopriUtcStep` address.
pub(crate) fn dopri_utc_from_config(
    config: &StepConfig,
    types: &TypeRegistry,
) -> ComposeResult<Box<dyn Step>> {
    UniformTimeCourseStep::from_config(config, types, EngineBackend::Dopri)
}

/// Constructor for the `local:Rk4UtcStep` address.
pub(crate) fn rk4_utc_from_config(
    config: &StepConfig,
    types: &TypeRegistry,
) -> ComposeResult<Box<dyn Step>> {
    UniformTimeCourseStep::from_config(config, types, EngineBackend::Rk4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{analytic_chain, write_chain_sbml};
    use is_close::is_close;
    use serde_json::{json, Value};

    fn config(value: Value) -> StepConfig {
        value.as_object().cloned().unwrap()
    }

    fn registered_types() -> TypeRegistry {
        let mut types = TypeRegistry::standard();
        crate::register_types(&mut types);
        types
    }

    fn chain_step(time: f64, n_points: usize) -> (tempfile::TempDir, Box<dyn Step>) {
        let dir = tempfile::tempdir().unwrap();
        let model = write_chain_sbml(dir.path());
        let raw = config(json!({
            "model_source": model.to_str().unwrap(),
            "time": time,
            "n_points": n_points,
        }));
        let mut step = dopri_utc_from_config(&raw, &registered_types()).unwrap();
        step.initialize().unwrap();
        (dir, step)
    }

    fn result_of(outputs: &PortValues) -> NumericResult {
        serde_json::from_value(outputs.get(PORT_RESULT).cloned().unwrap()).unwrap()
    }

    #[test]
    fn emits_a_uniform_table_over_the_window() {
        let (_dir, mut step) = chain_step(10.0, 6);
        assert_eq!(step.interval(), Some(10.0));

        let result = result_of(&step.update(&PortValues::new()).unwrap());
        assert_eq!(result.time.len(), 6);
        assert_eq!(result.time[0], 0.0);
        assert_eq!(result.time[5], 10.0);
        assert!(result.time.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(result.columns, vec!["S1", "S2", "S3"]);

        // Row zero is the untouched initial state.
        assert_eq!(result.values[0], vec![10.0, 0.0, 0.0]);
        for (row, &t) in result.time.iter().enumerate() {
            let (s1, _, _) = analytic_chain(t);
            assert!(is_close!(result.values[row][0], s1, rel_tol = 1e-6));
        }
    }

    #[test]
    fn consecutive_updates_continue_the_trajectory() {
        let (_dir, mut step) = chain_step(5.0, 5);
        let first = result_of(&step.update(&PortValues::new()).unwrap());
        let second = result_of(&step.update(&PortValues::new()).unwrap());

        // The second window starts exactly where the first one ended.
        assert_eq!(second.values[0], first.values[4]);
        let (s1, _, _) = analytic_chain(10.0);
        assert!(is_close!(second.values[4][0], s1, rel_tol = 1e-6));
    }

    #[test]
    fn count_overrides_win_over_concentration_overrides() {
        let (_dir, mut step) = chain_step(1.0, 2);
        let mut inputs = PortValues::new();
        inputs.insert(
            PORT_SPECIES_CONCENTRATIONS.to_string(),
            json!({"S1": 5.0}),
        );
        inputs.insert(PORT_SPECIES_COUNTS.to_string(), json!({"S1": 7.0}));

        let result = result_of(&step.update(&inputs).unwrap());
        assert_eq!(result.values[0][0], 7.0);
    }

    #[test]
    fn unknown_species_overrides_are_skipped() {
        let (_dir, mut step) = chain_step(1.0, 2);
        let mut inputs = PortValues::new();
        inputs.insert(
            PORT_SPECIES_CONCENTRATIONS.to_string(),
            json!({"S1": 5.0, "ghost": 1.0}),
        );

        let result = result_of(&step.update(&inputs).unwrap());
        assert_eq!(result.values[0][0], 5.0);
    }

    #[test]
    fn restricts_output_to_columns_of_interest() {
        let dir = tempfile::tempdir().unwrap();
        let model = write_chain_sbml(dir.path());
        let raw = config(json!({
            "model_source": model.to_str().unwrap(),
            "time": 2.0,
            "n_points": 3,
            "columns_of_interest": ["S3", "S1"],
        }));
        let mut step = dopri_utc_from_config(&raw, &registered_types()).unwrap();
        step.initialize().unwrap();

        let result = result_of(&step.update(&PortValues::new()).unwrap());
        assert_eq!(result.columns, vec!["S1", "S3"]);
        assert_eq!(result.values[0], vec![10.0, 0.0]);
    }

    #[test]
    fn output_conforms_to_the_registered_result_type() {
        let types = registered_types();
        let (_dir, mut step) = chain_step(1.0, 3);
        let outputs = step.update(&PortValues::new()).unwrap();
        let value = outputs.get(PORT_RESULT).unwrap();
        assert!(types.validate("numeric_result", value).unwrap());
    }

    #[test]
    fn initial_state_seeds_both_species_ports() {
        let (_dir, step) = chain_step(1.0, 2);
        let seed = step.initial_state();
        for port in [PORT_SPECIES_CONCENTRATIONS, PORT_SPECIES_COUNTS] {
            let map = seed.get(port).and_then(Value::as_object).unwrap();
            assert_eq!(map.get("S1").and_then(Value::as_f64), Some(10.0));
            assert_eq!(map.get("S3").and_then(Value::as_f64), Some(0.0));
        }
    }

    #[test]
    fn rejects_bad_configurations() {
        let types = registered_types();
        for raw in [
            json!({"model_source": "m.xml", "time": 1.0}),
            json!({"model_source": "m.xml", "time": 1.0, "n_points": 1}),
            json!({"model_source": "m.xml", "time": 0.0, "n_points": 5}),
            json!({"model_source": "m.xml", "time": 1.0, "n_points": 5, "extra": true}),
        ] {
            let err = dopri_utc_from_config(&config(raw), &types).unwrap_err();
            assert!(matches!(err, ComposeError::Configuration(_)));
        }
    }

    #[test]
    fn missing_model_file_fails_initialize() {
        let raw = config(json!({
            "model_source": "/nonexistent/model.xml",
            "time": 1.0,
            "n_points": 2,
        }));
        let mut step = dopri_utc_from_config(&raw, &registered_types()).unwrap();
        assert!(step.initialize().is_err());
    }

    #[test]
    fn update_before_initialize_is_a_lifecycle_error() {
        let raw = config(json!({
            "model_source": "m.xml",
            "time": 1.0,
            "n_points": 2,
        }));
        let mut step = rk4_utc_from_config(&raw, &registered_types()).unwrap();
        let err = step.update(&PortValues::new()).unwrap_err();
        assert!(matches!(err, ComposeError::Lifecycle(_)));
    }
}
