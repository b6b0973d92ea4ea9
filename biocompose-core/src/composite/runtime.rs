//! Composite struct and runtime execution.

use crate::errors::{ComposeError, ComposeResult};
use crate::path::StatePath;
use crate::state::StateTree;
use crate::step::PortValues;
use crate::types::TypeRegistry;
use petgraph::dot::{Config, Dot};
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::types::{PortBinding, StepGraph};

/// Tolerance when comparing an interval step's accumulated time against the
/// run target, so accumulation error never triggers a spurious extra round.
const TIME_EPS: f64 = 1e-9;

/// Lifecycle state of a composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Built,
    Running,
    Completed,
    Failed,
}

/// A set of wired steps driven together to a target simulation time.
///
/// The composite exclusively owns the shared state tree. Immediately before
/// each step invocation it reads the current values at the step's input
/// paths, and immediately after it validates and writes the returned outputs,
/// so each step always observes the most recently written value at each path.
/// Steps never touch the tree directly.
#[derive(Debug)]
pub struct Composite {
    types: TypeRegistry,
    /// A directed graph with steps as nodes and the edges defining the state
    /// paths the steps depend on each other through.
    steps: StepGraph,
    /// Topological execution order, declaration order breaking ties.
    order: Vec<NodeIndex>,
    state: StateTree,
    schema: BTreeMap<String, String>,
    bridge: BTreeMap<String, StatePath>,
    run_state: RunState,
}

impl Composite {
    pub(crate) fn new(
        types: TypeRegistry,
        steps: StepGraph,
        order: Vec<NodeIndex>,
        state: StateTree,
        schema: BTreeMap<String, String>,
        bridge: BTreeMap<String, StatePath>,
    ) -> Self {
        Self {
            types,
            steps,
            order,
            state,
            schema,
            bridge,
            run_state: RunState::Built,
        }
    }

    /// Drive every step to the target simulation time.
    ///
    /// Interval steps run repeatedly in dependency-ordered rounds until each
    /// has covered `target_time` of simulated time; one-shot steps then run
    /// exactly once, observing the completed results. The target is measured
    /// on the composite clock, so a later call with a larger target continues
    /// from where the previous call finished.
    ///
    /// Any step error aborts the whole run and moves the composite to
    /// [`RunState::Failed`], surfacing the originating step's name.
    pub fn run(&mut self, target_time: f64) -> ComposeResult<()> {
        if self.run_state == RunState::Failed {
            return Err(ComposeError::Lifecycle(
                "cannot run a composite whose previous run failed".to_string(),
            ));
        }
        self.run_state = RunState::Running;
        log::debug!("running composite to t = {target_time}");
        match self.execute(target_time) {
            Ok(()) => {
                self.run_state = RunState::Completed;
                Ok(())
            }
            Err(err) => {
                self.run_state = RunState::Failed;
                log::warn!("composite run failed: {err}");
                Err(err)
            }
        }
    }

    fn execute(&mut self, target_time: f64) -> ComposeResult<()> {
        let order = self.order.clone();
        loop {
            let mut advanced = false;
            for &index in &order {
                let Some(interval) = self.steps[index].step.interval() else {
                    continue;
                };
                if self.steps[index].elapsed + TIME_EPS < target_time {
                    self.invoke(index)?;
                    self.steps[index].elapsed += interval;
                    advanced = true;
                }
            }
            if !advanced {
                break;
            }
        }
        for &index in &order {
            if self.steps[index].step.interval().is_none() {
                self.invoke(index)?;
            }
        }
        Ok(())
    }

    /// Invoke a single step: read its inputs, update, write its outputs.
    fn invoke(&mut self, index: NodeIndex) -> ComposeResult<()> {
        let slot = &mut self.steps[index];
        let inputs =
            gather_inputs(&self.state, &self.types, &slot.inputs).map_err(|err| {
                ComposeError::StepFailed {
                    step: slot.name.clone(),
                    source: Box::new(err),
                }
            })?;
        let outputs = slot
            .step
            .update(&inputs)
            .map_err(|err| ComposeError::StepFailed {
                step: slot.name.clone(),
                source: Box::new(err),
            })?;
        write_outputs(&mut self.state, &self.types, &slot.name, &slot.outputs, outputs)
    }

    /// Values at the paths the document marked externally visible.
    ///
    /// Paths holding no value yet are omitted.
    pub fn read_bridge(&self) -> Map<String, Value> {
        let mut values = Map::new();
        for (name, path) in &self.bridge {
            if let Some(value) = self.state.get(path) {
                values.insert(name.clone(), value.clone());
            }
        }
        values
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    /// The shared state tree.
    pub fn state(&self) -> &StateTree {
        &self.state
    }

    /// The document's declared path types.
    pub fn schema(&self) -> &BTreeMap<String, String> {
        &self.schema
    }

    /// Step names in execution order.
    pub fn step_names(&self) -> Vec<&str> {
        self.order
            .iter()
            .map(|&index| self.steps[index].name.as_str())
            .collect()
    }

    /// Simulated time covered so far by the named step, if it is an interval
    /// step.
    pub fn elapsed(&self, name: &str) -> Option<f64> {
        self.steps
            .node_indices()
            .find(|&index| self.steps[index].name == name)
            .filter(|&index| self.steps[index].step.interval().is_some())
            .map(|index| self.steps[index].elapsed)
    }

    /// Create a diagram that represents the step graph.
    ///
    /// Useful for debugging.
    pub fn as_dot(&self) -> Dot<'_, &StepGraph> {
        Dot::with_attr_getters(
            &self.steps,
            &[Config::NodeNoLabel, Config::EdgeNoLabel],
            &|_, er| format!("label = \"{}\"", er.weight()),
            &|_, (_, slot)| format!("label = \"{} ({})\"", slot.name, slot.address),
        )
    }
}

/// Read the current value at each bound input path, defaulting unseeded and
/// unbound ports to the port type's zero value.
fn gather_inputs(
    state: &StateTree,
    types: &TypeRegistry,
    bindings: &[PortBinding],
) -> ComposeResult<PortValues> {
    let mut values = PortValues::new();
    for binding in bindings {
        let value = match binding.path.as_ref().and_then(|path| state.get(path)) {
            Some(value) => types.render(&binding.type_name, value)?,
            None => types.zero_value(&binding.type_name)?,
        };
        values.insert(binding.port.clone(), value);
    }
    Ok(values)
}

/// Validate returned outputs against their declared port types and write the
/// bound ones into the state tree.
fn write_outputs(
    state: &mut StateTree,
    types: &TypeRegistry,
    step_name: &str,
    bindings: &[PortBinding],
    mut outputs: PortValues,
) -> ComposeResult<()> {
    for binding in bindings {
        let Some(value) = outputs.remove(&binding.port) else {
            continue;
        };
        if !types.validate(&binding.type_name, &value)? {
            return Err(ComposeError::PortContractViolation {
                step: step_name.to_string(),
                port: binding.port.clone(),
                detail: format!("value does not conform to '{}'", binding.type_name),
            });
        }
        if let Some(path) = &binding.path {
            state.set(path, value)?;
        }
    }
    if let Some(port) = outputs.into_keys().next() {
        return Err(ComposeError::PortContractViolation {
            step: step_name.to_string(),
            port,
            detail: "port is not declared".to_string(),
        });
    }
    Ok(())
}
