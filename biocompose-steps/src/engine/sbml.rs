//! SBML reading.
//!
//! Loads the subset of SBML the mass-action network represents: species with
//! an initial concentration or amount and a boundary condition flag, and
//! reactions with reactant/product stoichiometry plus a single rate constant
//! taken from the kinetic law's parameters. Level 3 `localParameter` and
//! Level 2 `parameter` elements are both accepted. Amounts are read as
//! concentrations in a unit compartment. Tag names are matched without their
//! namespace so documents from any SBML level parse the same way.

use crate::engine::network::{Reaction, ReactionNetwork, Species};
use crate::engine::{EngineError, EngineResult};
use roxmltree::{Document, Node};
use std::collections::HashMap;
use std::path::Path;

/// Read a reaction network from an SBML file.
pub fn parse_sbml_file(path: &Path) -> EngineResult<ReactionNetwork> {
    let text = std::fs::read_to_string(path)
        .map_err(|error| EngineError::ModelLoad(format!("{}: {error}", path.display())))?;
    parse_sbml_str(&text)
}

/// Read a reaction network from SBML text.
pub fn parse_sbml_str(text: &str) -> EngineResult<ReactionNetwork> {
    let document = Document::parse(text)
        .map_err(|error| EngineError::ModelLoad(format!("invalid XML: {error}")))?;
    let root = document.root_element();
    if root.tag_name().name() != "sbml" {
        return Err(EngineError::ModelLoad(format!(
            "expected an <sbml> root element, found <{}>",
            root.tag_name().name()
        )));
    }
    let model = first_element(root, "model")
        .ok_or_else(|| EngineError::ModelLoad("document has no <model> element".to_string()))?;

    let mut species = Vec::new();
    if let Some(list) = first_element(model, "listOfSpecies") {
        for node in elements(list, "species") {
            species.push(read_species(node)?);
        }
    }
    let index: HashMap<&str, usize> = species
        .iter()
        .enumerate()
        .map(|(position, entry)| (entry.id.as_str(), position))
        .collect();

    let mut reactions = Vec::new();
    if let Some(list) = first_element(model, "listOfReactions") {
        for (position, node) in elements(list, "reaction").enumerate() {
            reactions.push(read_reaction(node, position, &index)?);
        }
    }

    ReactionNetwork::new(species, reactions)
}

fn read_species(node: Node) -> EngineResult<Species> {
    let id = node
        .attribute("id")
        .ok_or_else(|| EngineError::ModelLoad("species element without an id".to_string()))?;
    let initial = match float_attribute(node, "initialConcentration")? {
        Some(concentration) => concentration,
        None => float_attribute(node, "initialAmount")?.unwrap_or(0.0),
    };
    Ok(Species {
        id: id.to_string(),
        initial_concentration: initial,
        boundary: node.attribute("boundaryCondition") == Some("true"),
    })
}

fn read_reaction(
    node: Node,
    position: usize,
    index: &HashMap<&str, usize>,
) -> EngineResult<Reaction> {
    let id = node
        .attribute("id")
        .map(str::to_string)
        .unwrap_or_else(|| format!("reaction_{position}"));
    if node.attribute("reversible") == Some("true") {
        log::warn!("Treating reversible reaction {id:?} as irreversible");
    }

    let reactants = read_references(node, "listOfReactants", &id, index)?;
    let products = read_references(node, "listOfProducts", &id, index)?;

    let rate_constant = match first_element(node, "kineticLaw").and_then(rate_parameter) {
        Some(raw) => raw.parse::<f64>().map_err(|_| {
            EngineError::ModelLoad(format!(
                "reaction {id:?} has a non-numeric rate parameter {raw:?}"
            ))
        })?,
        None => {
            log::warn!("Reaction {id:?} has no rate parameter, assuming 1.0");
            1.0
        }
    };

    Ok(Reaction::new(&id, rate_constant, reactants, products))
}

fn read_references(
    reaction: Node,
    list_name: &'static str,
    reaction_id: &str,
    index: &HashMap<&str, usize>,
) -> EngineResult<Vec<(usize, f64)>> {
    let Some(list) = first_element(reaction, list_name) else {
        return Ok(Vec::new());
    };
    let mut references = Vec::new();
    for node in elements(list, "speciesReference") {
        let species = node.attribute("species").ok_or_else(|| {
            EngineError::ModelLoad(format!(
                "reaction {reaction_id:?} has a speciesReference without a species attribute"
            ))
        })?;
        let position = *index.get(species).ok_or_else(|| {
            EngineError::ModelLoad(format!(
                "reaction {reaction_id:?} references unknown species {species:?}"
            ))
        })?;
        let stoichiometry = float_attribute(node, "stoichiometry")?.unwrap_or(1.0);
        references.push((position, stoichiometry));
    }
    Ok(references)
}

/// The first parameter value inside a kinetic law, whichever SBML level
/// spelled it.
fn rate_parameter<'a>(kinetic_law: Node<'a, 'a>) -> Option<&'a str> {
    kinetic_law
        .descendants()
        .filter(|node| {
            node.is_element()
                && matches!(node.tag_name().name(), "localParameter" | "parameter")
        })
        .find_map(|node| node.attribute("value"))
}

fn float_attribute(node: Node, name: &str) -> EngineResult<Option<f64>> {
    match node.attribute(name) {
        None => Ok(None),
        Some(raw) => raw.parse::<f64>().map(Some).map_err(|_| {
            EngineError::ModelLoad(format!("attribute {name}={raw:?} is not a number"))
        }),
    }
}

fn first_element<'a, 'input>(scope: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    scope
        .descendants()
        .find(|node| node.is_element() && node.tag_name().name() == name)
}

fn elements<'a, 'input>(
    scope: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    scope
        .descendants()
        .filter(move |node| node.is_element() && node.tag_name().name() == name)
}
