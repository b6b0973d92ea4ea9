//! Kinetics engines and concrete simulation steps.
//!
//! This crate supplies the simulation side of [`biocompose_core`]: an
//! SBML-backed mass-action [`engine`], [`steps`] adapting it to the step
//! contract and registration helpers wiring both into a registry pair.
//!
//! ```
//! use biocompose_core::registry::{Core, StepRegistry};
//! use biocompose_core::types::TypeRegistry;
//! use biocompose_steps::{register_steps, register_types};
//!
//! let mut types = TypeRegistry::standard();
//! register_types(&mut types);
//! let mut steps = StepRegistry::new();
//! register_steps(&mut steps);
//! let core = Core::new(types, steps);
//! assert!(core.steps.addresses().contains(&"local:CompareResults".to_string()));
//! ```

pub mod engine;
pub mod steps;

#[cfg(test)]
pub(crate) mod fixtures;

use biocompose_core::registry::{StepAddress, StepRegistry};
use biocompose_core::types::TypeRegistry;

/// Address of the Dormand-Prince uniform time course step.
pub const DOPRI_UTC_ADDRESS: &str = "local:DopriUtcStep";
/// Address of the Runge-Kutta uniform time course step.
pub const RK4_UTC_ADDRESS: &str = "local:Rk4UtcStep";
/// Address of the Dormand-Prince steady-state step.
pub const DOPRI_STEADY_STATE_ADDRESS: &str = "local:DopriSteadyStateStep";
/// Address of the Runge-Kutta steady-state step.
pub const RK4_STEADY_STATE_ADDRESS: &str = "local:Rk4SteadyStateStep";
/// Address of the result comparator step.
pub const COMPARE_RESULTS_ADDRESS: &str = "local:CompareResults";

/// Register the result and comparison types the steps exchange.
pub fn register_types(types: &mut TypeRegistry) {
    types.register_record(
        "numeric_result",
        &[
            ("time", "list[float]"),
            ("columns", "list[string]"),
            ("values", "list[list[float]]"),
        ],
    );
    types.register_alias("numeric_results", "map[numeric_result]");
    types.register_alias("columns_of_interest", "list[string]");
    types.register_record(
        "column_comparison",
        &[
            ("column", "string"),
            ("max_abs_diff", "float"),
            ("pass", "boolean"),
        ],
    );
    types.register_record(
        "pair_comparison",
        &[
            ("pair", "list[string]"),
            ("columns", "list[column_comparison]"),
            ("pass", "boolean"),
        ],
    );
    types.register_record(
        "comparison_report",
        &[
            ("tolerance", "float"),
            ("comparisons", "list[pair_comparison]"),
            ("pass", "boolean"),
        ],
    );
}

/// Register every step type under its `local` address.
pub fn register_steps(registry: &mut StepRegistry) {
    registry.register(
        StepAddress::local("DopriUtcStep"),
        steps::dopri_utc_from_config,
    );
    registry.register(StepAddress::local("Rk4UtcStep"), steps::rk4_utc_from_config);
    registry.register(
        StepAddress::local("DopriSteadyStateStep"),
        steps::dopri_steady_state_from_config,
    );
    registry.register(
        StepAddress::local("Rk4SteadyStateStep"),
        steps::rk4_steady_state_from_config,
    );
    registry.register(
        StepAddress::local("CompareResults"),
        steps::compare_from_config,
    );
}
