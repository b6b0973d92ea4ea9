//! Pairwise numeric comparison of result tables.

use crate::steps::{NumericResult, PORT_COMPARISON, PORT_RESULTS};
use biocompose_core::errors::{ComposeError, ComposeResult};
use biocompose_core::step::{
    config_f64, ConfigSchema, PortSchema, PortValues, Step, StepConfig,
};
use biocompose_core::types::TypeRegistry;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Largest absolute difference still counted as agreement.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Verdict for one shared column of a result pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnComparison {
    pub column: String,
    pub max_abs_diff: f64,
    pub pass: bool,
}

/// Verdict for one unordered pair of result tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairComparison {
    pub pair: (String, String),
    pub columns: Vec<ColumnComparison>,
    pub pass: bool,
}

/// The comparator's full output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub tolerance: f64,
    pub comparisons: Vec<PairComparison>,
    pub pass: bool,
}

/// Compares every pair of result tables on its `results` port.
///
/// Tables need not share a time grid: for each pair the sparser table is
/// linearly interpolated onto the denser one's grid before columns are
/// compared. Only columns present in both tables take part. A one-shot step,
/// so it observes completed results.
#[derive(Debug, Clone)]
pub struct CompareResultsStep {
    tolerance: f64,
    initialized: bool,
}

impl CompareResultsStep {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            initialized: false,
        }
    }

    pub fn from_config(config: &StepConfig, types: &TypeRegistry) -> ComposeResult<Box<dyn Step>> {
        let step = Self::new(DEFAULT_TOLERANCE);
        step.config_schema().validate(config, types)?;
        let tolerance = match config.get("tolerance") {
            Some(_) => config_f64(config, "tolerance")?,
            None => DEFAULT_TOLERANCE,
        };
        if tolerance <= 0.0 {
            return Err(ComposeError::Configuration(format!(
                "tolerance must be positive, got {tolerance}"
            )));
        }
        Ok(Box::new(Self::new(tolerance)))
    }
}

impl Step for CompareResultsStep {
    fn config_schema(&self) -> ConfigSchema {
        ConfigSchema::new().optional("tolerance", "float")
    }

    fn inputs(&self) -> PortSchema {
        PortSchema::new().with_port(PORT_RESULTS, "map[numeric_result]")
    }

    fn outputs(&self) -> PortSchema {
        PortSchema::new().with_port(PORT_COMPARISON, "comparison_report")
    }

    fn initialize(&mut self) -> ComposeResult<()> {
        self.initialized = true;
        Ok(())
    }

    fn update(&mut self, inputs: &PortValues) -> ComposeResult<PortValues> {
        if !self.initialized {
            return Err(ComposeError::Lifecycle(
                "update called before initialize".to_string(),
            ));
        }
        let results = match inputs.get(PORT_RESULTS) {
            Some(Value::Object(map)) => map,
            _ => return Err(ComposeError::InsufficientResults(0)),
        };
        if results.len() < 2 {
            return Err(ComposeError::InsufficientResults(results.len()));
        }

        let mut series: Vec<(String, NumericResult)> = Vec::with_capacity(results.len());
        for (name, value) in results {
            let result: NumericResult = serde_json::from_value(value.clone())?;
            if result.time.is_empty() {
                return Err(ComposeError::Simulation(format!(
                    "result {name:?} has no rows to compare"
                )));
            }
            series.push((name.clone(), result));
        }

        let mut comparisons = Vec::new();
        for left in 0..series.len() {
            for right in left + 1..series.len() {
                comparisons.push(compare_pair(
                    &series[left],
                    &series[right],
                    self.tolerance,
                ));
            }
        }

        let report = ComparisonReport {
            tolerance: self.tolerance,
            pass: comparisons.iter().all(|pair| pair.pass),
            comparisons,
        };
        let mut outputs = PortValues::new();
        outputs.insert(PORT_COMPARISON.to_string(), serde_json::to_value(&report)?);
        Ok(outputs)
    }
}

fn compare_pair(
    a: &(String, NumericResult),
    b: &(String, NumericResult),
    tolerance: f64,
) -> PairComparison {
    // The denser grid is the reference; the other table gets interpolated.
    let (dense, sparse) = if a.1.time.len() >= b.1.time.len() {
        (&a.1, &b.1)
    } else {
        (&b.1, &a.1)
    };

    let mut columns = Vec::new();
    for column in &dense.columns {
        let Some(dense_values) = dense.column(column) else {
            continue;
        };
        let Some(sparse_values) = sparse.column(column) else {
            continue;
        };
        // Matching grids compare pointwise, without interpolation.
        let max_abs_diff = if dense.time == sparse.time {
            dense_values
                .iter()
                .zip(&sparse_values)
                .map(|(value, other)| (value - other).abs())
                .fold(0.0, f64::max)
        } else {
            dense
                .time
                .iter()
                .zip(&dense_values)
                .map(|(&t, &value)| (value - sample(&sparse.time, &sparse_values, t)).abs())
                .fold(0.0, f64::max)
        };
        columns.push(ColumnComparison {
            column: column.clone(),
            pass: max_abs_diff <= tolerance,
            max_abs_diff,
        });
    }

    PairComparison {
        pair: (a.0.clone(), b.0.clone()),
        pass: columns.iter().all(|column| column.pass),
        columns,
    }
}

/// Linear interpolation with clamping beyond the grid ends.
fn sample(time: &[f64], values: &[f64], t: f64) -> f64 {
    if t <= time[0] {
        return values[0];
    }
    if t >= time[time.len() - 1] {
        return values[values.len() - 1];
    }
    let upper = time.partition_point(|&point| point < t);
    let lower = upper - 1;
    let span = time[upper] - time[lower];
    if span == 0.0 {
        return values[lower];
    }
    let fraction = (t - time[lower]) / span;
    values[lower] + fraction * (values[upper] - values[lower])
}

/// Constructor for the `local:CompareResults` address.
pub(crate) fn compare_from_config(
    config: &StepConfig,
    types: &TypeRegistry,
) -> ComposeResult<Box<dyn Step>> {
    CompareResultsStep::from_config(config, types)
}
