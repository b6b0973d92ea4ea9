//! Shared engine core.
//!
//! [`OdeEngine`] implements [`KineticsEngine`] for any [`Stepper`], so the
//! two bundled engines share the sampling loop and the steady-state search
//! and differ only in how one sub-interval of simulated time is integrated.
//!
//! The steady-state search alternates a damped Newton polish on the floating
//! subsystem with rounds of plain integration. Networks with conserved
//! totals have a singular Jacobian everywhere, so the Newton attempt is
//! allowed to fail and settling by integration carries the search instead.

use crate::engine::network::ReactionNetwork;
use crate::engine::{EngineError, EngineResult, KineticsEngine, Trajectory};
use nalgebra::{DMatrix, DVector};
use ndarray::Array2;

/// Residual below which the derivative vector counts as steady.
const STEADY_RESIDUAL_TOLERANCE: f64 = 1e-9;
/// Simulated time integrated per settling round.
const SETTLE_CHUNK: f64 = 50.0;
/// Settling rounds before the search gives up.
const MAX_SETTLE_ROUNDS: usize = 40;
/// Newton iterations per polish attempt.
const MAX_NEWTON_ITERATIONS: usize = 25;
/// Halvings tried before a Newton update is rejected.
const NEWTON_DAMPING_STAGES: usize = 8;

/// Integration of one sub-interval of simulated time.
pub trait Stepper {
    /// Advance `y0` from `start` to `end`, returning the final state.
    ///
    /// `start == end` returns the state unchanged.
    fn advance(
        &self,
        network: &ReactionNetwork,
        start: f64,
        end: f64,
        y0: DVector<f64>,
    ) -> EngineResult<DVector<f64>>;
}

/// Engine driving a mass-action network with a concrete stepper.
#[derive(Debug)]
pub struct OdeEngine<S> {
    network: ReactionNetwork,
    stepper: S,
}

impl<S: Stepper> OdeEngine<S> {
    pub fn new(network: ReactionNetwork, stepper: S) -> Self {
        Self { network, stepper }
    }

    pub fn network(&self) -> &ReactionNetwork {
        &self.network
    }
}

impl<S: Stepper> KineticsEngine for OdeEngine<S> {
    fn species_ids(&self) -> Vec<String> {
        self.network.species_ids()
    }

    fn floating_species_ids(&self) -> Vec<String> {
        self.network.floating_species_ids()
    }

    fn reaction_ids(&self) -> Vec<String> {
        self.network.reaction_ids()
    }

    fn concentration(&self, species: &str) -> Option<f64> {
        self.network.concentration(species)
    }

    fn set_concentration(&mut self, species: &str, value: f64) -> bool {
        self.network.set_concentration(species, value)
    }

    fn simulate(&mut self, start: f64, end: f64, n_points: usize) -> EngineResult<Trajectory> {
        if n_points < 2 {
            return Err(EngineError::Integration(format!(
                "a time course needs at least two sample points, got {n_points}"
            )));
        }
        if !(end > start) {
            return Err(EngineError::Integration(format!(
                "time course end {end} must lie after its start {start}"
            )));
        }
        let floating = self.network.floating_indices();
        let time = uniform_times(start, end, n_points);
        let mut values = Array2::zeros((n_points, floating.len()));
        let mut y = self.network.concentrations().clone();
        record(&mut values, 0, &y, &floating);
        for point in 1..n_points {
            y = self
                .stepper
                .advance(&self.network, time[point - 1], time[point], y)?;
            record(&mut values, point, &y, &floating);
        }
        // Later calls continue from the final sampled point
        self.network.set_concentrations(y);
        Ok(Trajectory {
            time,
            columns: self.network.floating_species_ids(),
            values,
        })
    }

    fn steady_state(&mut self) -> EngineResult<Vec<f64>> {
        let floating = self.network.floating_indices();
        let mut y = self.network.concentrations().clone();
        let mut residual = max_residual(&self.network, &y, &floating);
        let mut rounds = 0;

        loop {
            if residual <= STEADY_RESIDUAL_TOLERANCE {
                break;
            }
            if let Some((polished, polished_residual)) =
                newton_polish(&self.network, &y, &floating)
            {
                y = polished;
                residual = polished_residual;
                break;
            }
            if rounds >= MAX_SETTLE_ROUNDS {
                return Err(EngineError::NonConvergence {
                    iterations: rounds,
                    residual,
                });
            }
            y = self.stepper.advance(&self.network, 0.0, SETTLE_CHUNK, y)?;
            clamp_negative(&mut y, &floating);
            residual = max_residual(&self.network, &y, &floating);
            rounds += 1;
        }

        self.network.set_concentrations(y.clone());
        Ok(floating.iter().map(|&index| y[index]).collect())
    }

    fn jacobian(&self) -> Array2<f64> {
        let floating = self.network.floating_indices();
        let jacobian = self.network.jacobian(self.network.concentrations());
        Array2::from_shape_fn((floating.len(), floating.len()), |(row, column)| {
            jacobian[(floating[row], floating[column])]
        })
    }
}

/// Evenly spaced sample times with both endpoints exact.
pub(crate) fn uniform_times(start: f64, end: f64, n_points: usize) -> Vec<f64> {
    let span = end - start;
    let intervals = (n_points - 1) as f64;
    let mut times: Vec<f64> = (0..n_points)
        .map(|point| start + span * point as f64 / intervals)
        .collect();
    times[n_points - 1] = end;
    times
}

fn record(values: &mut Array2<f64>, row: usize, y: &DVector<f64>, floating: &[usize]) {
    for (column, &index) in floating.iter().enumerate() {
        values[[row, column]] = y[index];
    }
}

fn max_residual(network: &ReactionNetwork, y: &DVector<f64>, floating: &[usize]) -> f64 {
    let mut dy = DVector::zeros(y.len());
    network.derivatives(y, &mut dy);
    floating
        .iter()
        .map(|&index| dy[index].abs())
        .fold(0.0, f64::max)
}

fn residual_vector(network: &ReactionNetwork, y: &DVector<f64>, floating: &[usize]) -> DVector<f64> {
    let mut dy = DVector::zeros(y.len());
    network.derivatives(y, &mut dy);
    DVector::from_iterator(floating.len(), floating.iter().map(|&index| dy[index]))
}

fn clamp_negative(y: &mut DVector<f64>, floating: &[usize]) {
    for &index in floating {
        if y[index] < 0.0 {
            y[index] = 0.0;
        }
    }
}

/// Damped Newton iteration on the floating subsystem.
///
/// Returns the converged point, or `None` when the Jacobian is singular, an
/// update fails to reduce the residual, or the iteration budget runs out.
/// The caller settles further by integration and tries again.
fn newton_polish(
    network: &ReactionNetwork,
    start: &DVector<f64>,
    floating: &[usize],
) -> Option<(DVector<f64>, f64)> {
    let mut y = start.clone();
    let mut residual = max_residual(network, &y, floating);

    for _ in 0..MAX_NEWTON_ITERATIONS {
        if residual <= STEADY_RESIDUAL_TOLERANCE {
            if floating
                .iter()
                .any(|&index| y[index] < -STEADY_RESIDUAL_TOLERANCE)
            {
                return None;
            }
            clamp_negative(&mut y, floating);
            return Some((y, residual));
        }

        let full = network.jacobian(&y);
        let jacobian = DMatrix::from_fn(floating.len(), floating.len(), |row, column| {
            full[(floating[row], floating[column])]
        });
        let delta = jacobian.lu().solve(&residual_vector(network, &y, floating))?;

        let mut step = 1.0;
        let mut accepted = false;
        for _ in 0..NEWTON_DAMPING_STAGES {
            let mut trial = y.clone();
            for (row, &index) in floating.iter().enumerate() {
                trial[index] -= step * delta[row];
            }
            let trial_residual = max_residual(network, &trial, floating);
            if trial_residual < residual {
                y = trial;
                residual = trial_residual;
                accepted = true;
                break;
            }
            step /= 2.0;
        }
        if !accepted {
            return None;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::network::{Reaction, Species};
    use is_close::is_close;

    #[test]
    fn uniform_times_hit_both_endpoints() {
        let times = uniform_times(0.0, 10.0, 10);
        assert_eq!(times.len(), 10);
        assert_eq!(times[0], 0.0);
        assert_eq!(times[9], 10.0);
        for window in times.windows(2) {
            assert!(window[1] > window[0]);
            assert!(is_close!(window[1] - window[0], 10.0 / 9.0));
        }
    }

    struct NoStepper;

    impl Stepper for NoStepper {
        fn advance(
            &self,
            _network: &ReactionNetwork,
            _start: f64,
            _end: f64,
            _y0: DVector<f64>,
        ) -> EngineResult<DVector<f64>> {
            panic!("the stepper should not be needed");
        }
    }

    #[test]
    fn newton_finds_a_linear_fixed_point_without_settling() {
        // Boundary feed with first-order decay: dS/dt = 1 - 2S has a
        // nonsingular Jacobian, so the Newton polish alone must converge.
        let network = ReactionNetwork::new(
            vec![Species::boundary("feed", 1.0), Species::new("S", 0.0)],
            vec![
                Reaction::new("production", 1.0, vec![(0, 1.0)], vec![(1, 1.0)]),
                Reaction::new("decay", 2.0, vec![(1, 1.0)], vec![]),
            ],
        )
        .unwrap();
        let mut engine = OdeEngine::new(network, NoStepper);

        let steady = engine.steady_state().unwrap();
        assert_eq!(steady.len(), 1);
        assert!(is_close!(steady[0], 0.5));
        assert!(is_close!(engine.concentration("S").unwrap(), 0.5));

        // Already converged, so a second call returns the same point
        let again = engine.steady_state().unwrap();
        assert!(is_close!(again[0], 0.5));

        let jacobian = engine.jacobian();
        assert_eq!(jacobian.dim(), (1, 1));
        assert!(is_close!(jacobian[[0, 0]], -2.0));
    }
}
