//! Persisted run artifacts.
//!
//! Every run leaves three JSON files behind: the input document, the declared
//! path types, and the final state tree. Files are keyed by run name and a
//! timestamp so later runs never clobber earlier ones.

use crate::composite::Composite;
use crate::document::Document;
use crate::errors::ComposeResult;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Locations of the three files describing one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArtifacts {
    pub document: PathBuf,
    pub schema: PathBuf,
    pub state: PathBuf,
}

/// Persist a run under `dir`, creating the directory if needed.
pub fn save_run_artifacts(
    dir: &Path,
    run_name: &str,
    document: &Document,
    composite: &Composite,
) -> ComposeResult<RunArtifacts> {
    fs::create_dir_all(dir)?;
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);

    let document_path = dir.join(format!("{run_name}_{timestamp}_document.json"));
    fs::write(&document_path, document.to_json_string()?)?;

    let schema_path = dir.join(format!("{run_name}_{timestamp}_schema.json"));
    fs::write(
        &schema_path,
        serde_json::to_string_pretty(composite.schema())?,
    )?;

    let state_path = dir.join(format!("{run_name}_{timestamp}_state.json"));
    fs::write(
        &state_path,
        serde_json::to_string_pretty(&composite.state().as_value())?,
    )?;

    log::info!("saved run {run_name:?} artifacts to {}", dir.display());

    Ok(RunArtifacts {
        document: document_path,
        schema: schema_path,
        state: state_path,
    })
}
