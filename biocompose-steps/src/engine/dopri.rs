//! Engine backed by the adaptive Dormand-Prince 5(4) stepper.

use crate::engine::network::ReactionNetwork;
use crate::engine::solver::{OdeEngine, Stepper};
use crate::engine::{sbml, EngineError, EngineResult};
use nalgebra::DVector;
use ode_solvers::Dopri5;
use std::path::Path;

const RELATIVE_TOLERANCE: f64 = 1e-8;
const ABSOLUTE_TOLERANCE: f64 = 1e-10;

/// One adaptive integration per sub-interval, sampled at its endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct DopriStepper;

impl Stepper for DopriStepper {
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
        let mut stepper = Dopri5::new(
            network.clone(),
            start,
            end,
            end - start,
            y0,
            RELATIVE_TOLERANCE,
            ABSOLUTE_TOLERANCE,
        );
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

/// Engine using [`DopriStepper`] for every integration.
pub type DopriEngine = OdeEngine<DopriStepper>;

impl DopriEngine {
    pub fn from_network(network: ReactionNetwork) -> Self {
        OdeEngine::new(network, DopriStepper)
    }

    pub fn from_sbml_str(text: &str) -> EngineResult<Self> {
        Ok(Self::from_network(sbml::parse_sbml_str(text)?))
    }

    pub fn from_sbml_file(path: &Path) -> EngineResult<Self> {
        Ok(Self::from_network(sbml::parse_sbml_file(path)?))
    }
}
