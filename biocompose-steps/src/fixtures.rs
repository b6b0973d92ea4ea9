//! Shared test fixtures.

use std::fs;
use std::path::{Path, PathBuf};

/// Linear decay chain S1 -> S2 -> S3 with first-order kinetics.
///
/// The closed-form solution is a pair of decaying exponentials, which makes
/// this model the reference point for engine accuracy tests.
pub const CHAIN_SBML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
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

/// Exact concentrations of the decay chain at time `t`.
pub fn analytic_chain(t: f64) -> (f64, f64, f64) {
    let s1 = 10.0 * (-0.3 * t).exp();
    let s2 = 20.0 * ((-0.15 * t).exp() - (-0.3 * t).exp());
    let s3 = 10.0 - s1 - s2;
    (s1, s2, s3)
}

/// Writes the chain model into `dir` and returns the file path.
pub fn write_chain_sbml(dir: &Path) -> PathBuf {
    let path = dir.join("chain.xml");
    fs::write(&path, CHAIN_SBML).unwrap();
    path
}
