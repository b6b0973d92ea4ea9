//! SED-ML experiment extraction.
//!
//! Reads the subset of SED-ML needed to drive a uniform time course: the
//! simulation timing attributes and the referenced model sources. Simulations
//! are detected by capability probing rather than by tag name, so documents
//! from different SED-ML levels extract the same way as long as the
//! attributes are present.

use crate::errors::{PipelineError, PipelineResult};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Timing of a uniform time course experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniformTimeCourseSpec {
    pub initial_time: f64,
    pub output_start_time: f64,
    pub output_end_time: f64,
    pub number_of_points: usize,
}

impl UniformTimeCourseSpec {
    /// Simulated time covered by the sampled output window.
    pub fn duration(&self) -> f64 {
        self.output_end_time - self.output_start_time
    }
}

/// The extracted content of one SED-ML document.
#[derive(Debug, Clone, PartialEq)]
pub struct SedDocument {
    simulations: Vec<UniformTimeCourseSpec>,
    model_sources: Vec<String>,
}

impl SedDocument {
    /// Model `source` references in document order.
    pub fn model_sources(&self) -> &[String] {
        &self.model_sources
    }
}

pub fn parse_sedml_file(path: &Path) -> PipelineResult<SedDocument> {
    let text = fs::read_to_string(path)
        .map_err(|error| PipelineError::SedParse(format!("{}: {error}", path.display())))?;
    parse_sedml_str(&text)
}

/// Parse a SED-ML document.
///
/// Only structural XML problems fail here; a well-formed document with no
/// usable simulation parses fine and fails later at extraction.
pub fn parse_sedml_str(text: &str) -> PipelineResult<SedDocument> {
    let doc = Document::parse(text)
        .map_err(|error| PipelineError::SedParse(format!("invalid XML: {error}")))?;

    let mut simulations = Vec::new();
    let mut model_sources = Vec::new();
    for node in doc.descendants().filter(Node::is_element) {
        if let Some(simulation) = probe_uniform_time_course(node) {
            simulations.push(simulation);
        }
        if node.tag_name().name() == "model" {
            if let Some(source) = node.attribute("source") {
                model_sources.push(source.to_string());
            }
        }
    }
    Ok(SedDocument {
        simulations,
        model_sources,
    })
}

/// First simulation in the document with uniform time course timing.
pub fn extract_uniform_time_course(doc: &SedDocument) -> PipelineResult<UniformTimeCourseSpec> {
    doc.simulations
        .first()
        .cloned()
        .ok_or(PipelineError::NoUtcFound)
}

/// Resolve the document's model reference into a usable local file.
///
/// A relative reference is resolved against `base_dir` and used when the
/// resolved file exists. Anything else, a URL, an identifier scheme or a
/// path that does not exist, falls back to `fallback`.
pub fn resolve_model_source(doc: &SedDocument, base_dir: &Path, fallback: &Path) -> PathBuf {
    let Some(source) = doc.model_sources.first() else {
        return fallback.to_path_buf();
    };
    if looks_remote(source) {
        log::debug!(
            "Model source {source:?} is not a local file, using {}",
            fallback.display()
        );
        return fallback.to_path_buf();
    }
    let candidate = base_dir.join(source);
    if candidate.is_file() {
        candidate
    } else {
        log::debug!(
            "Model source {source:?} not found under {}, using {}",
            base_dir.display(),
            fallback.display()
        );
        fallback.to_path_buf()
    }
}

fn looks_remote(source: &str) -> bool {
    ["http://", "https://", "ftp://", "file:", "urn:"]
        .iter()
        .any(|scheme| source.starts_with(scheme))
}

/// A node counts as a uniform time course when it carries all three timing
/// attributes and a point count under either accepted name.
fn probe_uniform_time_course(node: Node) -> Option<UniformTimeCourseSpec> {
    let initial_time = float_attribute(node, "initialTime")?;
    let output_start_time = float_attribute(node, "outputStartTime")?;
    let output_end_time = float_attribute(node, "outputEndTime")?;
    let number_of_points = ["numberOfPoints", "numberOfSteps"]
        .iter()
        .find_map(|name| node.attribute(*name))
        .and_then(|raw| raw.parse().ok())?;
    Some(UniformTimeCourseSpec {
        initial_time,
        output_start_time,
        output_end_time,
        number_of_points,
    })
}

fn float_attribute(node: Node, name: &str) -> Option<f64> {
    node.attribute(name).and_then(|raw| raw.parse().ok())
}
