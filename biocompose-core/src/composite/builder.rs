//! Composite builder for constructing runnable composites from documents.

use crate::document::Document;
use crate::errors::{ComposeError, ComposeResult};
use crate::path::StatePath;
use crate::registry::Core;
use crate::state::StateTree;
use crate::step::PortSchema;
use crate::types::TypeRegistry;
use petgraph::Graph;
use std::collections::BTreeMap;

use super::runtime::Composite;
use super::types::{PortBinding, StepGraph, StepSlot};
use super::validation::{ensure_acyclic, execution_order};

/// Build a composite from a document.
///
/// The builder validates the document against the type registry, instantiates
/// and initializes one step per step record, wires every declared port to its
/// state path, derives the dependency graph from overlapping paths, and seeds
/// the state tree. Any unresolved address or schema mismatch fails the build;
/// nothing partially built is left runnable.
pub struct CompositeBuilder<'a> {
    core: &'a Core,
    document: Document,
}

impl<'a> CompositeBuilder<'a> {
    pub fn new(core: &'a Core) -> Self {
        Self {
            core,
            document: Document::new(),
        }
    }

    /// Supply the document describing the composition.
    pub fn with_document(&mut self, document: Document) -> &mut Self {
        self.document = document;
        self
    }

    /// Builds the step graph for the document and creates a concrete composite.
    pub fn build(&self) -> ComposeResult<Composite> {
        let types = &self.core.types;
        let document = &self.document;

        // Every type the schema names must be registered.
        if let Some(schema) = &document.schema {
            for type_name in schema.values() {
                types.check_known(type_name)?;
            }
        }

        let mut graph: StepGraph = Graph::new();
        for (name, spec) in document.step_specs()? {
            let mut step = self
                .core
                .steps
                .create(&spec.address, &spec.config, types)
                .map_err(|err| match err {
                    ComposeError::UnknownStepAddress(address) => {
                        ComposeError::Composition(format!(
                            "step '{name}' references unregistered address '{address}'"
                        ))
                    }
                    ComposeError::MalformedAddress(address) => ComposeError::Composition(format!(
                        "step '{name}' has malformed address '{address}'"
                    )),
                    other => other,
                })?;
            step.initialize()?;

            if let Some(interval) = step.interval() {
                if !(interval > 0.0) {
                    return Err(ComposeError::Composition(format!(
                        "step '{name}' declares a non-positive interval {interval}"
                    )));
                }
            }

            let inputs = resolve_bindings(&name, &step.inputs(), &spec.inputs, types, "input")?;
            let outputs = resolve_bindings(&name, &step.outputs(), &spec.outputs, types, "output")?;

            graph.add_node(StepSlot {
                name,
                address: spec.address,
                step,
                inputs,
                outputs,
                elapsed: 0.0,
            });
        }

        // A consumer depends on a producer when one of its input paths
        // overlaps one of the producer's output paths. Overlap rather than
        // equality so a port bound to a parent path observes writes to any
        // path beneath it.
        let mut edges = Vec::new();
        for producer in graph.node_indices() {
            for output in &graph[producer].outputs {
                let Some(out_path) = &output.path else { continue };
                for consumer in graph.node_indices() {
                    for input in &graph[consumer].inputs {
                        let Some(in_path) = &input.path else { continue };
                        if out_path.is_prefix_of(in_path) || in_path.is_prefix_of(out_path) {
                            edges.push((producer, consumer, out_path.clone()));
                        }
                    }
                }
            }
        }
        for (producer, consumer, path) in edges {
            graph.add_edge(producer, consumer, path);
        }

        ensure_acyclic(&graph)?;
        let order = execution_order(&graph);

        // Seed with document literals, in declaration order.
        let mut state = StateTree::new();
        for (key, value) in document.literals() {
            state.set(&StatePath::root(key), value.clone())?;
        }

        // Seeded values must conform to any type the schema declares for
        // their path. Paths the schema declares but nothing seeds are written
        // later by steps and checked against port types as they are written.
        if let Some(schema) = &document.schema {
            for (key, type_name) in schema {
                let path = StatePath::parse(key)?;
                if let Some(value) = state.get(&path) {
                    if !types.validate(type_name, value)? {
                        return Err(ComposeError::Composition(format!(
                            "state entry '{key}' does not conform to its declared type '{type_name}'"
                        )));
                    }
                }
            }
        }

        // Step-provided initial values fill in still-unseeded bound ports.
        for index in graph.node_indices() {
            let slot = &graph[index];
            let initial = slot.step.initial_state();
            if initial.is_empty() {
                continue;
            }
            for binding in slot.inputs.iter().chain(slot.outputs.iter()) {
                let Some(path) = &binding.path else { continue };
                let Some(value) = initial.get(&binding.port) else {
                    continue;
                };
                if state.contains(path) {
                    continue;
                }
                if !types.validate(&binding.type_name, value)? {
                    return Err(ComposeError::PortContractViolation {
                        step: slot.name.clone(),
                        port: binding.port.clone(),
                        detail: format!(
                            "initial value does not conform to '{}'",
                            binding.type_name
                        ),
                    });
                }
                state.set(path, value.clone())?;
            }
            for port in initial.keys() {
                let declared = slot
                    .inputs
                    .iter()
                    .chain(slot.outputs.iter())
                    .any(|binding| binding.port == *port);
                if !declared {
                    log::warn!(
                        "step '{}' provided an initial value for undeclared port '{}'",
                        slot.name,
                        port
                    );
                }
            }
        }

        let schema = document.schema.clone().unwrap_or_default();
        let bridge = document.bridge.clone().unwrap_or_default();

        log::debug!("built composite with {} steps", graph.node_count());

        Ok(Composite::new(
            types.clone(),
            graph,
            order,
            state,
            schema,
            bridge,
        ))
    }
}

/// Resolve document port bindings against a step's declared port schema.
///
/// Returns one binding per declared port in schema order; ports the document
/// does not bind keep `path = None`. Binding a port the step does not declare
/// is a composition error.
fn resolve_bindings(
    step_name: &str,
    schema: &PortSchema,
    bound: &BTreeMap<String, StatePath>,
    types: &TypeRegistry,
    direction: &str,
) -> ComposeResult<Vec<PortBinding>> {
    for port in bound.keys() {
        if !schema.contains(port) {
            return Err(ComposeError::Composition(format!(
                "step '{step_name}' has no {direction} port '{port}'"
            )));
        }
    }
    let mut bindings = Vec::with_capacity(schema.len());
    for (port, type_name) in schema.iter() {
        types.check_known(type_name)?;
        bindings.push(PortBinding {
            port: port.clone(),
            type_name: type_name.clone(),
            path: bound.get(port).cloned(),
        });
    }
    Ok(bindings)
}
