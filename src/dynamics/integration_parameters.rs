use crate::math::Real;

/// Amount of positional joint error the position solver won't attempt to correct (default: `0.005m`).
pub const LINEAR_SLOP: Real = 0.005;
/// Amount of angular joint error the position solver won't attempt to correct (default: 2 degrees).
pub const ANGULAR_SLOP: Real = 2.0 / 180.0 * std::f64::consts::PI as Real;
/// Maximum angular correction applied by one position iteration (default: 8 degrees).
pub const MAX_ANGULAR_CORRECTION: Real = 8.0 / 180.0 * std::f64::consts::PI as Real;

/// Parameters for a time-step of the physics engine.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct IntegrationParameters {
    /// The timestep length (default: `1.0 / 60.0`).
    pub dt: Real,
    /// Whether the impulses accumulated during the previous timestep are used as the
    /// initial guess of the current one (default: `true`).
    pub warm_starting: bool,
    /// Joint position error below which the position solver considers a joint solved
    /// (default: [`LINEAR_SLOP`]).
    pub linear_slop: Real,
    /// Joint angular error below which the position solver considers a joint limit solved
    /// (default: [`ANGULAR_SLOP`]).
    ///
    /// This is also the half-width under which the lower and upper limits of a revolute joint are
    /// considered equal.
    pub angular_slop: Real,
    /// Maximum angular correction applied to a joint limit by one position iteration
    /// (default: [`MAX_ANGULAR_CORRECTION`]).
    pub max_angular_correction: Real,
    /// The number of velocity iterations run by the joint solver (default: `8`).
    pub num_velocity_iterations: usize,
    /// The maximum number of position iterations run by the joint solver (default: `3`).
    pub num_position_iterations: usize,
}

impl IntegrationParameters {
    /// The inverse of the time-stepping length, i.e. the steps per seconds (Hz).
    ///
    /// This is zero if `self.dt` is zero.
    #[inline(always)]
    pub fn inv_dt(&self) -> Real {
        if self.dt == 0.0 {
            0.0
        } else {
            1.0 / self.dt
        }
    }

    /// Sets the inverse time-stepping length (i.e. the frequency).
    ///
    /// This automatically recompute `self.dt`.
    #[inline]
    pub fn set_inv_dt(&mut self, inv_dt: Real) {
        if inv_dt == 0.0 {
            self.dt = 0.0
        } else {
            self.dt = 1.0 / inv_dt
        }
    }
}

impl Default for IntegrationParameters {
    fn default() -> Self {
        Self {
            dt: 1.0 / 60.0,
            warm_starting: true,
            linear_slop: LINEAR_SLOP,
            angular_slop: ANGULAR_SLOP,
            max_angular_correction: MAX_ANGULAR_CORRECTION,
            num_velocity_iterations: 8,
            num_position_iterations: 3,
        }
    }
}
