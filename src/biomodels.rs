//! Biomodel loading.
//!
//! Bridges a model repository to the composition layer: fetch a model's
//! files, extract the experiment timing from its SED-ML, and persist the
//! pair to a stable location a document can reference.

use crate::errors::{PipelineError, PipelineResult};
use crate::sedml::{
    extract_uniform_time_course, parse_sedml_file, resolve_model_source, UniformTimeCourseSpec,
};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// One file in a repository entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub name: String,
}

impl FileDescriptor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

/// A source of biomodel files.
pub trait ModelRepository {
    /// Raw metadata entry for one model id.
    fn get_metadata(&self, id: &str) -> PipelineResult<Value>;

    /// Contents of one file of a model.
    fn get_file(&self, id: &str, file: &FileDescriptor) -> PipelineResult<Vec<u8>>;

    /// Every model id the repository serves.
    fn get_all_identifiers(&self) -> PipelineResult<Vec<String>>;
}

/// Serves a directory tree with one subdirectory per model id.
#[derive(Debug, Clone)]
pub struct DirectoryRepository {
    root: PathBuf,
}

impl DirectoryRepository {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

impl ModelRepository for DirectoryRepository {
    fn get_metadata(&self, id: &str) -> PipelineResult<Value> {
        let dir = self.root.join(id);
        let entries = fs::read_dir(&dir).map_err(|error| {
            PipelineError::Repository(format!("no entry for {id} at {}: {error}", dir.display()))
        })?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(Value::from(names))
    }

    fn get_file(&self, id: &str, file: &FileDescriptor) -> PipelineResult<Vec<u8>> {
        Ok(fs::read(self.root.join(id).join(&file.name))?)
    }

    fn get_all_identifiers(&self) -> PipelineResult<Vec<String>> {
        let entries = fs::read_dir(&self.root).map_err(|error| {
            PipelineError::Repository(format!("cannot list {}: {error}", self.root.display()))
        })?;
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                ids.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Flatten a metadata entry into file descriptors.
///
/// Entries arrive in heterogeneous shapes: a bare list of names, or a
/// mapping carrying the list under a `files`, `main_files` or `model_files`
/// key, with list elements that are names or mappings with a `name` key.
/// The union never propagates past this point.
pub fn normalize_entry(entry: &Value) -> Vec<FileDescriptor> {
    let items = match entry {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => ["files", "main_files", "model_files"]
            .iter()
            .find_map(|key| map.get(*key))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default(),
        _ => &[],
    };

    let mut files = Vec::new();
    for item in items {
        let name = match item {
            Value::String(name) => Some(name.as_str()),
            Value::Object(map) => map.get("name").and_then(Value::as_str),
            _ => None,
        };
        match name {
            Some(name) => files.push(FileDescriptor::new(name)),
            None => log::warn!("Ignoring unrecognised file entry {item}"),
        }
    }
    files
}

/// A loaded biomodel, persisted and ready to simulate.
#[derive(Debug, Clone, PartialEq)]
pub struct BiomodelLoadResult {
    pub biomodel_id: String,
    pub sbml_path: PathBuf,
    pub sedml_path: PathBuf,
    pub utc: UniformTimeCourseSpec,
}

/// Outcome of a batch load.
#[derive(Debug, Default)]
pub struct BiomodelBatch {
    pub loaded: Vec<BiomodelLoadResult>,
    pub failed: Vec<(String, PipelineError)>,
}

/// Fetch one model's experiment and model files.
///
/// The files are staged in a temporary directory for extraction, then
/// persisted to `work_dir/models/{id}/`. The staging directory is gone by
/// the time this returns. Extraction is strict: a model whose SED-ML does
/// not parse or holds no uniform time course fails this load.
pub fn load_biomodel(
    repo: &dyn ModelRepository,
    id: &str,
    work_dir: &Path,
) -> PipelineResult<BiomodelLoadResult> {
    let metadata = repo.get_metadata(id)?;
    let files = normalize_entry(&metadata);
    let sedml = pick_sedml(&files).ok_or_else(|| PipelineError::MissingModelFile {
        id: id.to_string(),
        kind: "SED-ML",
    })?;
    let sbml = pick_sbml(&files, sedml).ok_or_else(|| PipelineError::MissingModelFile {
        id: id.to_string(),
        kind: "SBML",
    })?;

    let staging = tempfile::tempdir()?;
    let staged_sedml = staging.path().join(&sedml.name);
    fs::write(&staged_sedml, repo.get_file(id, sedml)?)?;
    let staged_sbml = staging.path().join(&sbml.name);
    fs::write(&staged_sbml, repo.get_file(id, sbml)?)?;

    let doc = parse_sedml_file(&staged_sedml)?;
    let utc = extract_uniform_time_course(&doc)?;
    let model_source = resolve_model_source(&doc, staging.path(), &staged_sbml);

    let target = work_dir.join("models").join(id);
    fs::create_dir_all(&target)?;
    let sedml_path = target.join(&sedml.name);
    fs::copy(&staged_sedml, &sedml_path)?;
    let model_name = model_source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| sbml.name.clone());
    let sbml_path = target.join(&model_name);
    fs::copy(&model_source, &sbml_path)?;

    log::info!("Loaded biomodel {id} into {}", target.display());
    Ok(BiomodelLoadResult {
        biomodel_id: id.to_string(),
        sbml_path,
        sedml_path,
        utc,
    })
}

/// Load a set of models, isolating per-item failures.
pub fn load_biomodels(
    repo: &dyn ModelRepository,
    ids: &[String],
    work_dir: &Path,
) -> BiomodelBatch {
    let mut batch = BiomodelBatch::default();
    for id in ids {
        match load_biomodel(repo, id, work_dir) {
            Ok(result) => batch.loaded.push(result),
            Err(error) => {
                log::warn!("Skipping biomodel {id}: {error}");
                batch.failed.push((id.clone(), error));
            }
        }
    }
    batch
}

fn pick_sedml(files: &[FileDescriptor]) -> Option<&FileDescriptor> {
    files.iter().find(|file| {
        let lower = file.name.to_lowercase();
        lower.contains("sedml") || lower.contains("sed-ml")
    })
}

/// The first XML file that is not the experiment, preferring names that
/// mention the model.
fn pick_sbml<'a>(
    files: &'a [FileDescriptor],
    sedml: &FileDescriptor,
) -> Option<&'a FileDescriptor> {
    let candidates: Vec<&FileDescriptor> = files
        .iter()
        .filter(|file| file.name != sedml.name)
        .filter(|file| file.name.to_lowercase().ends_with(".xml"))
        .collect();
    candidates
        .iter()
        .find(|file| {
            let lower = file.name.to_lowercase();
            lower.contains("sbml") || lower.contains("model")
        })
        .copied()
        .or_else(|| candidates.first().copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(files: &[FileDescriptor]) -> Vec<&str> {
        files.iter().map(|file| file.name.as_str()).collect()
    }

    #[test]
    fn normalizes_every_entry_shape() {
        let bare = json!(["model.xml", "experiment.sedml"]);
        assert_eq!(
            names(&normalize_entry(&bare)),
            vec!["model.xml", "experiment.sedml"]
        );

        let keyed = json!({"files": [{"name": "model.xml"}, {"name": "experiment.sedml"}]});
        assert_eq!(
            names(&normalize_entry(&keyed)),
            vec!["model.xml", "experiment.sedml"]
        );

        let main_files = json!({"main_files": ["a.xml"], "irrelevant": 3});
        assert_eq!(names(&normalize_entry(&main_files)), vec!["a.xml"]);

        let model_files = json!({"model_files": [{"name": "b.xml"}]});
        assert_eq!(names(&normalize_entry(&model_files)), vec!["b.xml"]);

        assert!(normalize_entry(&json!(17)).is_empty());
        assert!(normalize_entry(&json!({"other": []})).is_empty());
    }

    #[test]
    fn unusable_list_items_are_dropped() {
        let entry = json!(["ok.xml", 3, {"path": "no-name.xml"}]);
        assert_eq!(names(&normalize_entry(&entry)), vec!["ok.xml"]);
    }

    #[test]
    fn picks_experiment_and_model_files() {
        let files = [
            FileDescriptor::new("readme.txt"),
            FileDescriptor::new("BIOMD01.sedml"),
            FileDescriptor::new("curation.xml"),
            FileDescriptor::new("BIOMD01_model.xml"),
        ];
        let sedml = pick_sedml(&files).unwrap();
        assert_eq!(sedml.name, "BIOMD01.sedml");
        assert_eq!(pick_sbml(&files, sedml).unwrap().name, "BIOMD01_model.xml");
    }

    #[test]
    fn falls_back_to_the_first_xml_candidate() {
        let files = [
            FileDescriptor::new("run.sedml"),
            FileDescriptor::new("a.xml"),
            FileDescriptor::new("b.xml"),
        ];
        let sedml = pick_sedml(&files).unwrap();
        assert_eq!(pick_sbml(&files, sedml).unwrap().name, "a.xml");
    }

    #[test]
    fn an_entry_without_an_experiment_has_no_pick() {
        let files = [FileDescriptor::new("model.xml")];
        assert!(pick_sedml(&files).is_none());
    }

    #[test]
    fn a_missing_root_or_model_is_a_repository_error() {
        let scratch = tempfile::tempdir().unwrap();
        let repo = DirectoryRepository::new(&scratch.path().join("absent"));
        assert!(matches!(
            repo.get_all_identifiers().unwrap_err(),
            PipelineError::Repository(_)
        ));

        let repo = DirectoryRepository::new(scratch.path());
        let error = repo.get_metadata("nope").unwrap_err();
        assert!(matches!(error, PipelineError::Repository(message) if message.contains("nope")));
    }
}
