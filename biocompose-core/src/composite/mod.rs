//! A composite consists of a set of named steps wired through typed ports.
//!
//! The composite owns a shared state tree. Each step's declared input and
//! output ports are bound to paths in that tree by the document; ports whose
//! paths overlap induce a dependency between the steps, and the dependency
//! graph fixes a deterministic execution order (declaration order breaking
//! ties). Running a composite drives interval steps round by round until each
//! has covered the target simulation time, then runs one-shot steps once over
//! the completed results.

mod builder;
mod runtime;
mod types;
mod validation;

#[cfg(test)]
mod tests;

// Public re-exports
pub use builder::CompositeBuilder;
pub use runtime::{Composite, RunState};
