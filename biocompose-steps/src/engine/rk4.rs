//! Engine backed by a fixed-step fourth-order Runge-Kutta stepper.

use crate::engine::network::ReactionNetwork;
use crate::engine::solver::{OdeEngine, Stepper};
use crate::engine::{sbml, EngineError, EngineResult};
use nalgebra::DVector;
use ode_solvers::Rk4;
use std::path::Path;

/// Fixed steps taken per sub-interval.
const SUBSTEPS: usize = 100;

#[derive(Debug, Clone, Copy, Default)]
pub struct Rk4Stepper;

impl Stepper for Rk4Stepper {
    fn advance(
        &self,
        network: &ReactionNetwork,
        start: f64,
        end: f64,
        y0: DVector<f64>,
    ) -> EngineResult<DVector<f64>> {
        if end <= start {
            return Ok(y0);
        }
        let step_size = (end - start) / SUBSTEPS as f64;
        let mut stepper = Rk4::new(network.clone(), start, y0, end, step_size);
        stepper
            .integrate()
            .map_err(|error| EngineError::Integration(error.to_string()))?;
        let (_, states) = stepper.results().get();
        states
            .last()
            .cloned()
            .ok_or_else(|| EngineError::Integration("stepper recorded no states".to_string()))
    }
}

/// Engine using [`Rk4Stepper`] for every integration.
pub type Rk4Engine = OdeEngine<Rk4Stepper>;

impl Rk4Engine {
    pub fn from_network(network: ReactionNetwork) -> Self {
        OdeEngine::new(network, Rk4Stepper)
    }

    pub fn from_sbml_str(text: &str) -> EngineResult<Self> {
        Ok(Self::from_network(sbml::parse_sbml_str(text)?))
    }

    pub fn from_sbml_file(path: &Path) -> EngineResult<Self> {
        Ok(Self::from_network(sbml::parse_sbml_file(path)?))
    }
}
