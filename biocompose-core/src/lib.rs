pub mod artifacts;
pub mod composite;
pub mod document;
pub mod example_steps;
pub mod path;
pub mod registry;
pub mod state;
pub mod step;
pub mod types;

pub mod errors;
