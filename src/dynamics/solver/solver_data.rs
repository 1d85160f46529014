use crate::dynamics::IntegrationParameters;
use crate::math::{Point, Real, Vector};

/// Timestep metadata shared by every joint solved during one step.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TimeStep {
    /// The timestep length.
    pub dt: Real,
    /// The inverse of the timestep length, or zero if `dt` is zero.
    pub inv_dt: Real,
    /// `dt` divided by the length of the previous timestep.
    pub dt_ratio: Real,
    /// Are the accumulated impulses of the previous step reused?
    pub warm_starting: bool,
    /// Positional error tolerated by the position solver.
    pub linear_slop: Real,
    /// Angular error tolerated by the position solver.
    pub angular_slop: Real,
    /// Maximum angular correction applied by one position iteration.
    pub max_angular_correction: Real,
}

impl TimeStep {
    /// Timestep metadata for the given integration parameters and ratio between the current
    /// and previous timestep lengths.
    pub fn from_params(params: &IntegrationParameters, dt_ratio: Real) -> Self {
        Self {
            dt: params.dt,
            inv_dt: params.inv_dt(),
            dt_ratio,
            warm_starting: params.warm_starting,
            linear_slop: params.linear_slop,
            angular_slop: params.angular_slop,
            max_angular_correction: params.max_angular_correction,
        }
    }
}

impl Default for TimeStep {
    fn default() -> Self {
        Self::from_params(&IntegrationParameters::default(), 1.0)
    }
}

/// The world-space center of mass and unbounded angle of a body during a step.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SolverPosition {
    /// World-space center of mass.
    pub center: Point<Real>,
    /// Unbounded rotation angle.
    pub angle: Real,
}

impl Default for SolverPosition {
    fn default() -> Self {
        Self {
            center: Point::origin(),
            angle: 0.0,
        }
    }
}

/// The velocities of a body during a step.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SolverVelocity {
    /// Linear velocity of the center of mass.
    pub linear: Vector<Real>,
    /// Angular velocity.
    pub angular: Real,
}

impl Default for SolverVelocity {
    fn default() -> Self {
        Self {
            linear: Vector::zeros(),
            angular: 0.0,
        }
    }
}

/// The per-step context lent to each joint.
///
/// `positions` and `velocities` are indexed by the island index of each body.
pub struct SolverData<'a> {
    /// Timestep metadata.
    pub step: TimeStep,
    /// Body positions, indexed by island index.
    pub positions: &'a mut [SolverPosition],
    /// Body velocities, indexed by island index.
    pub velocities: &'a mut [SolverVelocity],
}

impl<'a> SolverData<'a> {
    /// Bundles the step metadata with the position and velocity arrays of an island.
    pub fn new(
        step: TimeStep,
        positions: &'a mut [SolverPosition],
        velocities: &'a mut [SolverVelocity],
    ) -> Self {
        debug_assert_eq!(positions.len(), velocities.len());
        Self {
            step,
            positions,
            velocities,
        }
    }
}
