//! The simulation capability behind the follicle and hair system.
//!
//! Physics integration belongs to the host. The builder only wires nodes; a host evaluating the
//! resulting graph asks a [`DynamicsSolver`] for the simulated strand.

use nalgebra::Point3;

pub trait DynamicsSolver {
    /// Simulated strand for `rest` at `time`. `rest` is the start-position curve's vertices in
    /// world space; the result must have the same length.
    fn simulate(&self, rest: &[Point3<f64>], time: f64) -> Vec<Point3<f64>>;
}

/// A solver at equilibrium: the simulated strand is the rest strand.
#[derive(Debug, Clone, Copy, Default)]
pub struct RestSolver;

impl DynamicsSolver for RestSolver {
    fn simulate(&self, rest: &[Point3<f64>], _time: f64) -> Vec<Point3<f64>> {
        rest.to_vec()
    }
}
