//! Engine comparison pipeline for biochemical kinetics models.
//!
//! Ties the workspace together: load a biomodel from a repository, extract
//! its experiment timing from SED-ML, build a document racing two kinetics
//! engines over the experiment, and run it as a composite whose bridge
//! carries the comparison verdict.
//!
//! ```
//! use biocompose::{comparison_document, comparison_engines, UniformTimeCourseSpec};
//! use std::path::Path;
//!
//! let utc = UniformTimeCourseSpec {
//!     initial_time: 0.0,
//!     output_start_time: 0.0,
//!     output_end_time: 10.0,
//!     number_of_points: 10,
//! };
//! let document = comparison_document(
//!     Path::new("models/chain.xml"),
//!     &utc,
//!     &comparison_engines(),
//! );
//! assert_eq!(document.step_specs().unwrap().len(), 3);
//! ```

pub mod biomodels;
pub mod documents;
pub mod errors;
pub mod sedml;

pub use biomodels::{
    load_biomodel, load_biomodels, BiomodelBatch, BiomodelLoadResult, DirectoryRepository,
    FileDescriptor, ModelRepository,
};
pub use documents::{
    biomodel_document, comparison_document, comparison_engines, persist_document, utc_step_spec,
};
pub use errors::{PipelineError, PipelineResult};
pub use sedml::{
    extract_uniform_time_course, parse_sedml_file, parse_sedml_str, SedDocument,
    UniformTimeCourseSpec,
};

use biocompose_core::registry::{Core, StepRegistry};
use biocompose_core::types::TypeRegistry;

/// Registry pair with every standard type and step registered.
pub fn standard_core() -> Core {
    let mut types = TypeRegistry::standard();
    biocompose_steps::register_types(&mut types);
    let mut steps = StepRegistry::new();
    biocompose_steps::register_steps(&mut steps);
    Core::new(types, steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_standard_core_resolves_the_document_addresses() {
        let core = standard_core();
        for (_, address) in comparison_engines() {
            assert!(core.steps.addresses().contains(&address.to_string()));
        }
        assert!(core
            .steps
            .addresses()
            .contains(&"local:CompareResults".to_string()));
        assert!(core.types.check_known("comparison_report").is_ok());
    }
}
