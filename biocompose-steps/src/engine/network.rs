//! Mass-action reaction networks.
//!
//! The network is the shared model behind both engines: species with initial
//! concentrations, irreversible reactions with a single rate constant, and
//! the derived rate vector, species derivatives and analytic Jacobian.
//! Boundary species participate in rates but are held constant by pinning
//! their derivatives (and Jacobian rows) to zero.

use crate::engine::{EngineError, EngineResult};
use nalgebra::{DMatrix, DVector};
use ode_solvers::System;
use std::collections::{BTreeMap, HashSet};

/// A chemical species.
#[derive(Debug, Clone, PartialEq)]
pub struct Species {
    pub id: String,
    pub initial_concentration: f64,
    /// Held constant by the integrator when set.
    pub boundary: bool,
}

impl Species {
    pub fn new(id: &str, initial_concentration: f64) -> Self {
        Self {
            id: id.to_string(),
            initial_concentration,
            boundary: false,
        }
    }

    /// A species with the boundary condition set.
    pub fn boundary(id: &str, initial_concentration: f64) -> Self {
        Self {
            boundary: true,
            ..Self::new(id, initial_concentration)
        }
    }
}

/// A single irreversible mass-action reaction.
///
/// `reactants` and `products` pair a species index with its stoichiometric
/// coefficient. The rate is `rate_constant * prod(y[i]^s)` over the
/// reactants.
#[derive(Debug, Clone, PartialEq)]
pub struct Reaction {
    pub id: String,
    pub rate_constant: f64,
    pub reactants: Vec<(usize, f64)>,
    pub products: Vec<(usize, f64)>,
}

impl Reaction {
    pub fn new(
        id: &str,
        rate_constant: f64,
        reactants: Vec<(usize, f64)>,
        products: Vec<(usize, f64)>,
    ) -> Self {
        Self {
            id: id.to_string(),
            rate_constant,
            reactants,
            products,
        }
    }
}

/// A mass-action network together with its current concentrations.
#[derive(Debug, Clone)]
pub struct ReactionNetwork {
    species: Vec<Species>,
    reactions: Vec<Reaction>,
    concentrations: DVector<f64>,
}

impl ReactionNetwork {
    /// Build a network, merging duplicate stoichiometry entries and checking
    /// that every reaction references a declared species.
    pub fn new(species: Vec<Species>, mut reactions: Vec<Reaction>) -> EngineResult<Self> {
        let mut seen = HashSet::new();
        for entry in &species {
            if !seen.insert(entry.id.as_str()) {
                return Err(EngineError::ModelLoad(format!(
                    "duplicate species id {:?}",
                    entry.id
                )));
            }
        }
        for reaction in &mut reactions {
            reaction.reactants = merge_pairs(std::mem::take(&mut reaction.reactants));
            reaction.products = merge_pairs(std::mem::take(&mut reaction.products));
            for &(index, _) in reaction.reactants.iter().chain(&reaction.products) {
                if index >= species.len() {
                    return Err(EngineError::ModelLoad(format!(
                        "reaction {:?} references species index {index} out of range",
                        reaction.id
                    )));
                }
            }
        }
        let concentrations =
            DVector::from_iterator(species.len(), species.iter().map(|s| s.initial_concentration));
        Ok(Self {
            species,
            reactions,
            concentrations,
        })
    }

    pub fn species(&self) -> &[Species] {
        &self.species
    }

    pub fn reactions(&self) -> &[Reaction] {
        &self.reactions
    }

    pub fn species_ids(&self) -> Vec<String> {
        self.species.iter().map(|s| s.id.clone()).collect()
    }

    pub fn floating_species_ids(&self) -> Vec<String> {
        self.species
            .iter()
            .filter(|s| !s.boundary)
            .map(|s| s.id.clone())
            .collect()
    }

    pub fn reaction_ids(&self) -> Vec<String> {
        self.reactions.iter().map(|r| r.id.clone()).collect()
    }

    /// Indices of the species the integrator evolves.
    pub fn floating_indices(&self) -> Vec<usize> {
        self.species
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.boundary)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn species_index(&self, id: &str) -> Option<usize> {
        self.species.iter().position(|s| s.id == id)
    }

    pub fn concentration(&self, id: &str) -> Option<f64> {
        self.species_index(id).map(|i| self.concentrations[i])
    }

    /// Override one concentration. Returns `false` for an unknown species.
    pub fn set_concentration(&mut self, id: &str, value: f64) -> bool {
        match self.species_index(id) {
            Some(index) => {
                self.concentrations[index] = value;
                true
            }
            None => false,
        }
    }

    pub fn concentrations(&self) -> &DVector<f64> {
        &self.concentrations
    }

    /// Replace the current concentrations, one entry per species.
    pub fn set_concentrations(&mut self, concentrations: DVector<f64>) {
        debug_assert_eq!(concentrations.len(), self.species.len());
        self.concentrations = concentrations;
    }

    fn rate_of(&self, reaction: &Reaction, y: &DVector<f64>) -> f64 {
        let mut rate = reaction.rate_constant;
        for &(index, stoichiometry) in &reaction.reactants {
            rate *= y[index].powf(stoichiometry);
        }
        rate
    }

    /// The rate of every reaction at the given concentrations.
    pub fn reaction_rates(&self, y: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            self.reactions.len(),
            self.reactions.iter().map(|r| self.rate_of(r, y)),
        )
    }

    /// The species derivative vector at the given concentrations.
    pub fn derivatives(&self, y: &DVector<f64>, dy: &mut DVector<f64>) {
        dy.fill(0.0);
        for reaction in &self.reactions {
            let rate = self.rate_of(reaction, y);
            for &(index, stoichiometry) in &reaction.reactants {
                dy[index] -= stoichiometry * rate;
            }
            for &(index, stoichiometry) in &reaction.products {
                dy[index] += stoichiometry * rate;
            }
        }
        for (index, species) in self.species.iter().enumerate() {
            if species.boundary {
                dy[index] = 0.0;
            }
        }
    }

    /// The analytic Jacobian of the derivative vector.
    ///
    /// Rows of boundary species are zero, matching their pinned derivatives.
    pub fn jacobian(&self, y: &DVector<f64>) -> DMatrix<f64> {
        let n = self.species.len();
        let mut jacobian = DMatrix::zeros(n, n);
        for reaction in &self.reactions {
            for &(column, stoichiometry) in &reaction.reactants {
                let mut partial =
                    reaction.rate_constant * stoichiometry * y[column].powf(stoichiometry - 1.0);
                for &(other, s) in &reaction.reactants {
                    if other != column {
                        partial *= y[other].powf(s);
                    }
                }
                for &(index, s) in &reaction.reactants {
                    jacobian[(index, column)] -= s * partial;
                }
                for &(index, s) in &reaction.products {
                    jacobian[(index, column)] += s * partial;
                }
            }
        }
        for (index, species) in self.species.iter().enumerate() {
            if species.boundary {
                jacobian.row_mut(index).fill(0.0);
            }
        }
        jacobian
    }
}

impl System<f64, DVector<f64>> for ReactionNetwork {
    fn system(&self, _t: f64, y: &DVector<f64>, dy: &mut DVector<f64>) {
        self.derivatives(y, dy);
    }
}

fn merge_pairs(pairs: Vec<(usize, f64)>) -> Vec<(usize, f64)> {
    let mut merged: BTreeMap<usize, f64> = BTreeMap::new();
    for (index, stoichiometry) in pairs {
        *merged.entry(index).or_insert(0.0) += stoichiometry;
    }
    merged.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_species_reaction() -> ReactionNetwork {
        ReactionNetwork::new(
            vec![
                Species::new("A", 3.0),
                Species::new("B", 4.0),
                Species::new("C", 0.0),
            ],
            vec![Reaction::new(
                "r1",
                2.0,
                vec![(0, 1.0), (1, 1.0)],
                vec![(2, 1.0)],
            )],
        )
        .unwrap()
    }

    #[test]
    fn rates_follow_mass_action() {
        let network = two_species_reaction();
        let y = network.concentrations().clone();
        let rates = network.reaction_rates(&y);
        assert_eq!(rates[0], 24.0);

        let mut dy = DVector::zeros(3);
        network.derivatives(&y, &mut dy);
        assert_eq!(dy[0], -24.0);
        assert_eq!(dy[1], -24.0);
        assert_eq!(dy[2], 24.0);
    }

    #[test]
    fn second_order_jacobian() {
        let network = ReactionNetwork::new(
            vec![Species::new("A", 3.0), Species::new("B", 0.0)],
            vec![Reaction::new("dimerise", 0.5, vec![(0, 2.0)], vec![(1, 1.0)])],
        )
        .unwrap();
        let y = network.concentrations().clone();

        let rates = network.reaction_rates(&y);
        assert_eq!(rates[0], 4.5);

        // d(rate)/dA = k * 2A = 3, so dA'/dA = -2 * 3 and dB'/dA = 3
        let jacobian = network.jacobian(&y);
        assert_eq!(jacobian[(0, 0)], -6.0);
        assert_eq!(jacobian[(1, 0)], 3.0);
        assert_eq!(jacobian[(0, 1)], 0.0);
    }

    #[test]
    fn duplicate_stoichiometry_entries_are_merged() {
        let network = ReactionNetwork::new(
            vec![Species::new("A", 3.0), Species::new("B", 0.0)],
            vec![Reaction::new(
                "dimerise",
                0.5,
                vec![(0, 1.0), (0, 1.0)],
                vec![(1, 1.0)],
            )],
        )
        .unwrap();
        let y = network.concentrations().clone();
        assert_eq!(network.reaction_rates(&y)[0], 4.5);
    }

    #[test]
    fn boundary_species_stay_constant() {
        let network = ReactionNetwork::new(
            vec![Species::boundary("feed", 1.0), Species::new("S", 0.0)],
            vec![Reaction::new("inflow", 2.0, vec![(0, 1.0)], vec![(1, 1.0)])],
        )
        .unwrap();
        let y = network.concentrations().clone();

        let mut dy = DVector::zeros(2);
        network.derivatives(&y, &mut dy);
        assert_eq!(dy[0], 0.0);
        assert_eq!(dy[1], 2.0);

        let jacobian = network.jacobian(&y);
        assert_eq!(jacobian[(0, 0)], 0.0);
        assert_eq!(jacobian[(1, 0)], 2.0);

        assert_eq!(network.floating_indices(), vec![1]);
        assert_eq!(network.floating_species_ids(), vec!["S".to_string()]);
    }

    #[test]
    fn rejects_out_of_range_species() {
        let err = ReactionNetwork::new(
            vec![Species::new("A", 1.0)],
            vec![Reaction::new("r", 1.0, vec![(3, 1.0)], vec![])],
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::ModelLoad(_)));
    }

    #[test]
    fn rejects_duplicate_species_ids() {
        let err =
            ReactionNetwork::new(vec![Species::new("A", 1.0), Species::new("A", 2.0)], vec![])
                .unwrap_err();
        assert!(matches!(err, EngineError::ModelLoad(_)));
    }

    #[test]
    fn concentration_overrides() {
        let mut network = two_species_reaction();
        assert_eq!(network.concentration("A"), Some(3.0));
        assert!(network.set_concentration("A", 7.0));
        assert_eq!(network.concentration("A"), Some(7.0));
        assert!(!network.set_concentration("missing", 1.0));
        assert_eq!(network.concentration("missing"), None);
    }
}
