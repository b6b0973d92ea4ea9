//! End-to-end runs of the comparison pipeline.
//!
//! A throwaway repository on disk feeds the loader, the loader feeds the
//! document builder, and the built document runs as a composite whose
//! bridge carries the engine agreement verdict.

use biocompose::{
    biomodel_document, load_biomodel, load_biomodels, persist_document, standard_core,
    DirectoryRepository, ModelRepository, PipelineError, UniformTimeCourseSpec,
};
use biocompose_core::composite::CompositeBuilder;
use biocompose_core::document::{Document, StepSpec};
use biocompose_core::errors::ComposeError;
use biocompose_core::path::StatePath;
use biocompose_steps::steps::{ComparisonReport, NumericResult};
use is_close::is_close;
use std::fs;
use tempfile::TempDir;

/// Linear decay chain S1 -> S2 -> S3 with first-order kinetics.
const CHAIN_SBML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<sbml xmlns="http://www.sbml.org/sbml/level3/version2/core" level="3" version="2">
  <model id="chain">
    <listOfCompartments>
      <compartment id="default" size="1" constant="true"/>
    </listOfCompartments>
    <listOfSpecies>
      <species id="S1" compartment="default" initialConcentration="10"/>
      <species id="S2" compartment="default" initialConcentration="0"/>
      <species id="S3" compartment="default" initialConcentration="0"/>
    </listOfSpecies>
    <listOfReactions>
      <reaction id="r1" reversible="false">
        <listOfReactants>
          <speciesReference species="S1" stoichiometry="1"/>
        </listOfReactants>
        <listOfProducts>
          <speciesReference species="S2" stoichiometry="1"/>
        </listOfProducts>
        <kineticLaw>
          <listOfLocalParameters>
            <localParameter id="k1" value="0.3"/>
          </listOfLocalParameters>
        </kineticLaw>
      </reaction>
      <reaction id="r2" reversible="false">
        <listOfReactants>
          <speciesReference species="S2" stoichiometry="1"/>
        </listOfReactants>
        <listOfProducts>
          <speciesReference species="S3" stoichiometry="1"/>
        </listOfProducts>
        <kineticLaw>
          <listOfLocalParameters>
            <localParameter id="k2" value="0.15"/>
          </listOfLocalParameters>
        </kineticLaw>
      </reaction>
    </listOfReactions>
  </model>
</sbml>
"#;

const CHAIN_SEDML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<sedML xmlns="http://sed-ml.org/sed-ml/level1/version3" level="1" version="3">
  <listOfSimulations>
    <uniformTimeCourse id="sim1" initialTime="0" outputStartTime="0" outputEndTime="10" numberOfPoints="10">
      <algorithm kisaoID="KISAO:0000019"/>
    </uniformTimeCourse>
  </listOfSimulations>
  <listOfModels>
    <model id="model1" language="urn:sedml:language:sbml" source="chain.xml"/>
  </listOfModels>
</sedML>
"#;

const STEADY_ONLY_SEDML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<sedML xmlns="http://sed-ml.org/sed-ml/level1/version3" level="1" version="3">
  <listOfSimulations>
    <steadyState id="sim1">
      <algorithm kisaoID="KISAO:0000407"/>
    </steadyState>
  </listOfSimulations>
  <listOfModels>
    <model id="model1" language="urn:sedml:language:sbml" source="chain.xml"/>
  </listOfModels>
</sedML>
"#;

const CHAIN_FILES: &[(&str, &str)] = &[("chain.xml", CHAIN_SBML), ("chain.sedml", CHAIN_SEDML)];

/// Exact concentrations of the decay chain at time `t`.
fn analytic_chain(t: f64) -> (f64, f64, f64) {
    let s1 = 10.0 * (-0.3 * t).exp();
    let s2 = 20.0 * ((-0.15 * t).exp() - (-0.3 * t).exp());
    let s3 = 10.0 - s1 - s2;
    (s1, s2, s3)
}

/// One subdirectory per model id, holding its files.
fn seeded_repository(models: &[(&str, &[(&str, &str)])]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (id, files) in models {
        let model_dir = dir.path().join(id);
        fs::create_dir_all(&model_dir).unwrap();
        for (name, contents) in *files {
            fs::write(model_dir.join(name), contents).unwrap();
        }
    }
    dir
}

/// Load the chain model into a fresh work directory and build its document.
///
/// The work directory must stay alive while the document runs: the step
/// configs reference the model file persisted inside it.
fn chain_document() -> (TempDir, Document) {
    let repo_dir = seeded_repository(&[("chain", CHAIN_FILES)]);
    let work = tempfile::tempdir().unwrap();
    let repo = DirectoryRepository::new(repo_dir.path());
    let loaded = load_biomodel(&repo, "chain", work.path()).unwrap();
    (work, biomodel_document(&loaded))
}

mod loading {
    use super::*;

    #[test]
    fn stages_and_persists_the_chain_model() {
        let repo_dir = seeded_repository(&[("chain", CHAIN_FILES)]);
        let work = tempfile::tempdir().unwrap();
        let repo = DirectoryRepository::new(repo_dir.path());

        let loaded = load_biomodel(&repo, "chain", work.path()).unwrap();

        assert_eq!(loaded.biomodel_id, "chain");
        assert_eq!(loaded.sbml_path, work.path().join("models/chain/chain.xml"));
        assert_eq!(loaded.sedml_path, work.path().join("models/chain/chain.sedml"));
        assert!(loaded.sbml_path.is_file());
        assert!(loaded.sedml_path.is_file());
        assert_eq!(
            loaded.utc,
            UniformTimeCourseSpec {
                initial_time: 0.0,
                output_start_time: 0.0,
                output_end_time: 10.0,
                number_of_points: 10,
            }
        );
    }

    #[test]
    fn a_model_without_a_time_course_is_rejected() {
        let files: &[(&str, &str)] =
            &[("chain.xml", CHAIN_SBML), ("steady.sedml", STEADY_ONLY_SEDML)];
        let repo_dir = seeded_repository(&[("steady", files)]);
        let work = tempfile::tempdir().unwrap();
        let repo = DirectoryRepository::new(repo_dir.path());

        let err = load_biomodel(&repo, "steady", work.path()).unwrap_err();
        assert!(matches!(err, PipelineError::NoUtcFound));
        // Extraction failed before anything was persisted.
        assert!(!work.path().join("models/steady").exists());
    }

    #[test]
    fn a_model_without_an_experiment_file_is_rejected() {
        let files: &[(&str, &str)] = &[("chain.xml", CHAIN_SBML)];
        let repo_dir = seeded_repository(&[("bare", files)]);
        let work = tempfile::tempdir().unwrap();
        let repo = DirectoryRepository::new(repo_dir.path());

        let err = load_biomodel(&repo, "bare", work.path()).unwrap_err();
        assert!(
            matches!(err, PipelineError::MissingModelFile { ref id, kind } if id == "bare" && kind == "SED-ML")
        );
    }

    #[test]
    fn the_batch_continues_past_broken_models() {
        let broken: &[(&str, &str)] =
            &[("chain.xml", CHAIN_SBML), ("steady.sedml", STEADY_ONLY_SEDML)];
        let repo_dir = seeded_repository(&[("broken", broken), ("chain", CHAIN_FILES)]);
        let work = tempfile::tempdir().unwrap();
        let repo = DirectoryRepository::new(repo_dir.path());

        let ids = repo.get_all_identifiers().unwrap();
        assert_eq!(ids, vec!["broken", "chain"]);

        let batch = load_biomodels(&repo, &ids, work.path());

        // The broken model sorts first, so a single abort would lose "chain".
        assert_eq!(batch.loaded.len(), 1);
        assert_eq!(batch.loaded[0].biomodel_id, "chain");
        assert_eq!(batch.failed.len(), 1);
        assert_eq!(batch.failed[0].0, "broken");
        assert!(matches!(batch.failed[0].1, PipelineError::NoUtcFound));
    }
}

mod running {
    use super::*;

    fn bridge_report(composite: &biocompose_core::composite::Composite) -> ComparisonReport {
        let bridge = composite.read_bridge();
        serde_json::from_value(bridge["comparison_result"].clone()).unwrap()
    }

    #[test]
    fn the_engines_agree_on_the_chain_model() {
        let (_work, document) = chain_document();
        let core = standard_core();
        let mut composite = CompositeBuilder::new(&core)
            .with_document(document)
            .build()
            .unwrap();

        composite.run(10.0).unwrap();

        let report = bridge_report(&composite);
        assert!(report.pass);
        assert_eq!(report.comparisons.len(), 1);
        let pair = &report.comparisons[0];
        assert_eq!(pair.pair, ("dopri".to_string(), "rk4".to_string()));
        for column in &pair.columns {
            assert!(
                column.pass,
                "column {} disagreed by {}",
                column.column, column.max_abs_diff
            );
        }

        // Both engines sampled the experiment window on the same grid, and
        // both track the closed-form solution rather than a shared mistake.
        for engine in ["dopri", "rk4"] {
            let path = StatePath::parse(&format!("results/{engine}")).unwrap();
            let value = composite.state().get(&path).unwrap();
            let table: NumericResult = serde_json::from_value(value.clone()).unwrap();
            assert_eq!(table.columns, vec!["S1", "S2", "S3"]);
            assert_eq!(table.time.len(), 10);
            assert_eq!(table.time[0], 0.0);
            assert_eq!(table.time[9], 10.0);
            assert!(table.time.windows(2).all(|pair| pair[0] < pair[1]));
            for (point, row) in table.time.iter().zip(&table.values) {
                let (s1, s2, s3) = analytic_chain(*point);
                assert!(is_close!(row[0], s1, rel_tol = 1e-5, abs_tol = 1e-8));
                assert!(is_close!(row[1], s2, rel_tol = 1e-5, abs_tol = 1e-8));
                assert!(is_close!(row[2], s3, rel_tol = 1e-5, abs_tol = 1e-8));
            }
        }
    }

    #[test]
    fn a_persisted_document_reloads_and_runs_identically() {
        let (work, document) = chain_document();
        let core = standard_core();

        let path = persist_document(work.path(), "chain", &document).unwrap();
        let reloaded = Document::from_json_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(reloaded, document);

        let mut first = CompositeBuilder::new(&core)
            .with_document(document)
            .build()
            .unwrap();
        let mut second = CompositeBuilder::new(&core)
            .with_document(reloaded)
            .build()
            .unwrap();
        first.run(10.0).unwrap();
        second.run(10.0).unwrap();

        assert_eq!(bridge_report(&first), bridge_report(&second));
    }

    #[test]
    fn an_unregistered_address_fails_composition() {
        let mut document = Document::new();
        document.insert_step("ghost", StepSpec::new("local:NotRegistered"));

        let core = standard_core();
        let err = CompositeBuilder::new(&core)
            .with_document(document)
            .build()
            .unwrap_err();
        assert!(matches!(err, ComposeError::Composition(_)));
    }

    #[test]
    fn runs_leave_their_artifacts_behind() {
        let (_work, document) = chain_document();
        let core = standard_core();
        let mut composite = CompositeBuilder::new(&core)
            .with_document(document.clone())
            .build()
            .unwrap();
        composite.run(10.0).unwrap();

        let out = tempfile::tempdir().unwrap();
        let artifacts =
            biocompose_core::artifacts::save_run_artifacts(out.path(), "chain", &document, &composite)
                .unwrap();

        let state: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&artifacts.state).unwrap()).unwrap();
        assert_eq!(state["comparison"]["pass"], serde_json::Value::Bool(true));
        assert_eq!(state["results"]["dopri"]["time"][9], serde_json::json!(10.0));

        let schema: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&artifacts.schema).unwrap()).unwrap();
        assert_eq!(schema["comparison"], serde_json::json!("comparison_report"));
    }
}
