//! Builders for engine comparison documents.

use crate::biomodels::BiomodelLoadResult;
use crate::errors::PipelineResult;
use crate::sedml::UniformTimeCourseSpec;
use biocompose_core::document::{Document, StepSpec};
use biocompose_core::path::StatePath;
use biocompose_steps::{COMPARE_RESULTS_ADDRESS, DOPRI_UTC_ADDRESS, RK4_UTC_ADDRESS};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Engine names and step addresses wired by [`biomodel_document`].
pub fn comparison_engines() -> [(&'static str, &'static str); 2] {
    [("dopri", DOPRI_UTC_ADDRESS), ("rk4", RK4_UTC_ADDRESS)]
}

/// Step record for one engine's uniform time course over an experiment.
pub fn utc_step_spec(
    address: &str,
    model_source: &Path,
    utc: &UniformTimeCourseSpec,
) -> StepSpec {
    StepSpec::new(address)
        .with_config_value(
            "model_source",
            Value::from(model_source.to_string_lossy().into_owned()),
        )
        .with_config_value("time", Value::from(utc.duration()))
        .with_config_value("n_points", Value::from(utc.number_of_points))
}

/// Build a document racing several engines over one experiment.
///
/// Every engine reads the root species override maps, which start out as
/// empty literals users can edit in the persisted document. Each engine
/// writes its table under `results/{name}` and the comparator reads the
/// whole `results` subtree, so adding an engine is one more entry in
/// `engines`. The verdict is bridged out as `comparison_result`.
pub fn comparison_document(
    model_source: &Path,
    utc: &UniformTimeCourseSpec,
    engines: &[(&str, &str)],
) -> Document {
    let results = StatePath::root("results");
    let mut document = Document::new();
    document
        .declare("species_concentrations", "map[float]")
        .declare("species_counts", "map[float]")
        .declare("results", "map[numeric_result]")
        .declare("comparison", "comparison_report")
        .insert_literal("species_concentrations", json!({}))
        .insert_literal("species_counts", json!({}));

    for (name, address) in engines {
        document.insert_step(
            name,
            utc_step_spec(address, model_source, utc)
                .with_input(
                    "species_concentrations",
                    StatePath::root("species_concentrations"),
                )
                .with_input("species_counts", StatePath::root("species_counts"))
                .with_output("result", results.join(name)),
        );
    }

    document.insert_step(
        "compare",
        StepSpec::new(COMPARE_RESULTS_ADDRESS)
            .with_input("results", results)
            .with_output("comparison", StatePath::root("comparison")),
    );
    document.insert_bridge("comparison_result", StatePath::root("comparison"));
    document
}

/// The standard two-engine document for a loaded biomodel.
pub fn biomodel_document(loaded: &BiomodelLoadResult) -> Document {
    comparison_document(&loaded.sbml_path, &loaded.utc, &comparison_engines())
}

/// Write a built document under `work_dir/documents/{id}.json`.
pub fn persist_document(
    work_dir: &Path,
    id: &str,
    document: &Document,
) -> PipelineResult<PathBuf> {
    let dir = work_dir.join("documents");
    fs::create_dir_all(&dir)?;
    let path = dir.join(format!("{id}.json"));
    fs::write(&path, document.to_json_string()?)?;
    log::debug!("Persisted document for {id} to {}", path.display());
    Ok(path)
}
