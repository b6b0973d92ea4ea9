//! Kinetics engines.
//!
//! A [`KineticsEngine`] owns a loaded model and exposes the operations the
//! adapter steps need: species lookup, concentration overrides, uniform
//! time-course sampling, steady-state solving and the Jacobian. The two
//! bundled engines drive the same mass-action [`ReactionNetwork`] with
//! different steppers, so runs stay self-contained while still exercising two
//! genuinely independent integrations.

mod dopri;
mod network;
mod rk4;
mod sbml;
mod solver;

use biocompose_core::errors::ComposeError;
use ndarray::Array2;
use std::path::Path;
use thiserror::Error;

// Public re-exports
pub use dopri::DopriEngine;
pub use network::{Reaction, ReactionNetwork, Species};
pub use rk4::Rk4Engine;
pub use sbml::{parse_sbml_file, parse_sbml_str};

/// Error type for model loading and numerical failures inside an engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to load model: {0}")]
    ModelLoad(String),
    #[error("Integration failed: {0}")]
    Integration(String),
    #[error("did not converge after {iterations} settling rounds (residual {residual:e})")]
    NonConvergence { iterations: usize, residual: f64 },
}

/// Convenience type for `Result<T, EngineError>`.
pub type EngineResult<T> = Result<T, EngineError>;

impl From<EngineError> for ComposeError {
    fn from(error: EngineError) -> Self {
        match error {
            EngineError::NonConvergence {
                iterations,
                residual,
            } => ComposeError::SteadyStateConvergence {
                iterations,
                residual,
            },
            EngineError::ModelLoad(_) => ComposeError::Configuration(error.to_string()),
            EngineError::Integration(detail) => ComposeError::Simulation(detail),
        }
    }
}

/// A sampled time course of the floating species.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    /// Sample times, strictly increasing.
    pub time: Vec<f64>,
    /// Species identifiers, one per value column.
    pub columns: Vec<String>,
    /// Point-major table: `values[[i, j]]` is column `j` at `time[i]`.
    pub values: Array2<f64>,
}

/// An SBML-capable simulation engine.
///
/// Engines are stateful: [`KineticsEngine::simulate`] leaves the model at the
/// final sampled point so a later call continues where the previous one
/// ended, and [`KineticsEngine::steady_state`] leaves it at the converged
/// point.
pub trait KineticsEngine {
    /// Identifiers of every species in the loaded model.
    fn species_ids(&self) -> Vec<String>;

    /// Identifiers of the species the integrator evolves.
    ///
    /// Boundary species are held constant and excluded here.
    fn floating_species_ids(&self) -> Vec<String>;

    /// Identifiers of every reaction in the loaded model.
    fn reaction_ids(&self) -> Vec<String>;

    /// Current concentration of a species, `None` for an unknown identifier.
    fn concentration(&self, species: &str) -> Option<f64>;

    /// Override the current concentration of a species.
    ///
    /// Returns `false` for an unknown identifier without changing anything.
    fn set_concentration(&mut self, species: &str, value: f64) -> bool;

    /// Sample the trajectory at `n_points` evenly spaced times in
    /// `[start, end]`, inclusive of both ends.
    fn simulate(&mut self, start: f64, end: f64, n_points: usize) -> EngineResult<Trajectory>;

    /// Drive the model to a steady state and return the floating species
    /// concentrations, ordered as [`KineticsEngine::floating_species_ids`].
    fn steady_state(&mut self) -> EngineResult<Vec<f64>>;

    /// The Jacobian of the floating subsystem at the current concentrations.
    fn jacobian(&self) -> Array2<f64>;
}

/// Which of the bundled engines an adapter step drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineBackend {
    Dopri,
    Rk4,
}

impl EngineBackend {
    /// Load an SBML file into a fresh engine of this backend.
    pub fn load(self, model_source: &str) -> EngineResult<Box<dyn KineticsEngine>> {
        let network = parse_sbml_file(Path::new(model_source))?;
        Ok(match self {
            EngineBackend::Dopri => Box::new(DopriEngine::from_network(network)),
            EngineBackend::Rk4 => Box::new(Rk4Engine::from_network(network)),
        })
    }
}
