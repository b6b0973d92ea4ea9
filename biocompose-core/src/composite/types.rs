//! Type definitions for the composite module.

use crate::path::StatePath;
use crate::step::Step;
use petgraph::Graph;
use std::fmt;

/// A declared port resolved against the step's schema.
///
/// Bound ports carry the state path from the document; unbound ports keep
/// `None` and are fed the type's zero value on every invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBinding {
    pub port: String,
    pub type_name: String,
    pub path: Option<StatePath>,
}

/// One named step instance together with its wiring and clock.
pub struct StepSlot {
    pub name: String,
    pub address: String,
    pub step: Box<dyn Step>,
    pub inputs: Vec<PortBinding>,
    pub outputs: Vec<PortBinding>,
    /// Simulated time this step has covered so far, for interval steps.
    pub elapsed: f64,
}

impl fmt::Debug for StepSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepSlot")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("elapsed", &self.elapsed)
            .finish()
    }
}

impl fmt::Display for StepSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

/// The step dependency graph.
///
/// Edges point from a producer to a consumer and carry the producer's output
/// path the dependency flows through.
pub type StepGraph = Graph<StepSlot, StatePath>;
