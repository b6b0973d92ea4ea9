//! Step implementations wrapping the kinetics engines.
//!
//! Three step types cover the composition surface: a uniform time course
//! adapter, a steady-state adapter and a pairwise result comparator. The
//! adapters exist once per engine backend under distinct registry addresses.

mod compare;
mod steady_state;
mod utc;

// Public re-exports
pub use compare::{
    ColumnComparison, CompareResultsStep, ComparisonReport, PairComparison, DEFAULT_TOLERANCE,
};
pub use steady_state::SteadyStateStep;
pub use utc::UniformTimeCourseStep;

pub(crate) use compare::compare_from_config;
pub(crate) use steady_state::{dopri_steady_state_from_config, rk4_steady_state_from_config};
pub(crate) use utc::{dopri_utc_from_config, rk4_utc_from_config};

use crate::engine::{KineticsEngine, Trajectory};
use biocompose_core::step::PortValues;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub(crate) const PORT_SPECIES_CONCENTRATIONS: &str = "species_concentrations";
pub(crate) const PORT_SPECIES_COUNTS: &str = "species_counts";
pub(crate) const PORT_RESULT: &str = "result";
pub(crate) const PORT_RESULTS: &str = "results";
pub(crate) const PORT_COMPARISON: &str = "comparison";

/// A time-indexed result table, the common currency of simulation outputs.
///
/// `values` is point-major: `values[i][j]` holds column `j` at `time[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericResult {
    pub time: Vec<f64>,
    pub columns: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl NumericResult {
    /// Extract one column by name.
    ///
    /// `None` when the column is absent or some row is too short to hold it.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let index = self.columns.iter().position(|column| column == name)?;
        self.values
            .iter()
            .map(|row| row.get(index).copied())
            .collect()
    }
}

impl From<Trajectory> for NumericResult {
    fn from(trajectory: Trajectory) -> Self {
        Self {
            time: trajectory.time,
            columns: trajectory.columns,
            values: trajectory
                .values
                .outer_iter()
                .map(|row| row.to_vec())
                .collect(),
        }
    }
}

/// Push port-supplied species values into the engine.
///
/// Concentrations are applied before counts, so a count override for the same
/// species wins. The two coincide numerically because models are loaded into
/// a unit compartment. Unknown species are skipped with a warning rather than
/// failing the run.
pub(crate) fn apply_overrides(engine: &mut dyn KineticsEngine, inputs: &PortValues) {
    for port in [PORT_SPECIES_CONCENTRATIONS, PORT_SPECIES_COUNTS] {
        let Some(Value::Object(map)) = inputs.get(port) else {
            continue;
        };
        for (species, value) in map {
            let Some(concentration) = value.as_f64() else {
                continue;
            };
            if !engine.set_concentration(species, concentration) {
                log::warn!("Skipping override for unknown species {species:?}");
            }
        }
    }
}

/// Port values mirroring the freshly loaded model's species concentrations.
///
/// Both species ports receive the same mapping so that whichever path the
/// document binds gets seeded.
pub(crate) fn concentration_seed(engine: &dyn KineticsEngine) -> PortValues {
    let mut concentrations = serde_json::Map::new();
    for id in engine.species_ids() {
        if let Some(concentration) = engine.concentration(&id) {
            concentrations.insert(id, Value::from(concentration));
        }
    }
    let mut values = PortValues::new();
    values.insert(
        PORT_SPECIES_CONCENTRATIONS.to_string(),
        Value::Object(concentrations.clone()),
    );
    values.insert(PORT_SPECIES_COUNTS.to_string(), Value::Object(concentrations));
    values
}
