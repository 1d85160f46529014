use crate::dynamics::joint::{JointBase, JointConstraint, JointDef, JointError, JointType};
use crate::dynamics::solver::SolverData;
use crate::dynamics::{RigidBodyHandle, RigidBodySet};
use crate::math::{Matrix3, Point, Real, Vector, Vector3};
use crate::utils::{self, WCross, WSolve};

/// The state of the angular limit of a revolute joint.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum LimitState {
    /// The joint angle is strictly between the limits, or the limit is disabled.
    #[default]
    Inactive,
    /// The joint angle reached the lower limit.
    AtLower,
    /// The joint angle reached the upper limit.
    AtUpper,
    /// The lower and upper limits are too close to be distinguished: the joint angle is locked.
    Equal,
}

impl LimitState {
    /// The state of a limit given the current joint angle.
    ///
    /// Bounds closer than `2 * angular_slop` are treated as equal.
    pub fn classify(angle: Real, lower: Real, upper: Real, angular_slop: Real) -> Self {
        if (upper - lower).abs() < 2.0 * angular_slop {
            LimitState::Equal
        } else if angle <= lower {
            LimitState::AtLower
        } else if angle >= upper {
            LimitState::AtUpper
        } else {
            LimitState::Inactive
        }
    }

    /// Moves from `self` to `target`.
    ///
    /// Returns the new state and whether the accumulated angular impulse must be reset.
    pub fn transition(self, target: LimitState) -> (LimitState, bool) {
        let reset = match target {
            LimitState::Inactive => true,
            LimitState::Equal => false,
            LimitState::AtLower | LimitState::AtUpper => self != target,
        };
        (target, reset)
    }

    /// Can a one-sided limit in this state hold the given accumulated angular impulse?
    ///
    /// A lower limit can only push and an upper limit can only pull. A zero impulse is
    /// accepted by both.
    pub(crate) fn accepts_angular_impulse(self, impulse: Real) -> bool {
        match self {
            LimitState::AtLower => impulse >= 0.0,
            LimitState::AtUpper => impulse <= 0.0,
            LimitState::Inactive | LimitState::Equal => true,
        }
    }
}

/// The motor of a revolute joint.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct RevoluteMotor {
    /// Is the motor active?
    pub enabled: bool,
    /// The maximum torque the motor can apply.
    pub max_torque: Real,
    /// The target relative angular velocity.
    pub speed: Real,
}

/// The angular limits of a revolute joint.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct RevoluteLimits {
    /// Are the limits active?
    pub enabled: bool,
    /// The lower joint angle.
    pub lower: Real,
    /// The upper joint angle.
    pub upper: Real,
}

/// Impulses accumulated by a revolute joint, kept from one step to the next.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct RevoluteConstraintState {
    /// The point impulse (`x`, `y`) and the angular limit impulse (`z`).
    pub impulse: Vector3<Real>,
    /// The motor impulse.
    pub motor_impulse: Real,
    /// The current state of the angular limit.
    pub limit_state: LimitState,
}

impl Default for RevoluteConstraintState {
    fn default() -> Self {
        Self {
            impulse: Vector3::zeros(),
            motor_impulse: 0.0,
            limit_state: LimitState::Inactive,
        }
    }
}

/// Per-step data of a revolute joint, recomputed by each `init_velocity_constraints`.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct RevoluteSolverCache {
    /// Island index of the first body.
    pub index1: usize,
    /// Island index of the second body.
    pub index2: usize,
    /// Local center of mass of the first body.
    pub local_center1: Point<Real>,
    /// Local center of mass of the second body.
    pub local_center2: Point<Real>,
    /// World-space offset from the first center of mass to the anchor.
    pub r1: Vector<Real>,
    /// World-space offset from the second center of mass to the anchor.
    pub r2: Vector<Real>,
    /// Effective inverse mass of the first body.
    pub inv_mass1: Real,
    /// Effective inverse mass of the second body.
    pub inv_mass2: Real,
    /// Effective inverse angular inertia of the first body.
    pub inv_inertia1: Real,
    /// Effective inverse angular inertia of the second body.
    pub inv_inertia2: Real,
    /// The effective mass matrix of the point and angle constraints.
    pub mass: Matrix3<Real>,
    /// The effective mass of the motor and angle constraints.
    pub motor_mass: Real,
}

impl RevoluteSolverCache {
    /// Can neither body rotate?
    pub fn fixed_rotation(&self) -> bool {
        self.inv_inertia1 + self.inv_inertia2 == 0.0
    }
}

impl Default for RevoluteSolverCache {
    fn default() -> Self {
        Self {
            index1: 0,
            index2: 0,
            local_center1: Point::origin(),
            local_center2: Point::origin(),
            r1: Vector::zeros(),
            r2: Vector::zeros(),
            inv_mass1: 0.0,
            inv_mass2: 0.0,
            inv_inertia1: 0.0,
            inv_inertia2: 0.0,
            mass: Matrix3::zeros(),
            motor_mass: 0.0,
        }
    }
}

/// The effective mass matrix of a point constraint (upper-left 2x2 block) coupled with an
/// angle constraint (last row and column).
fn effective_mass(
    r1: &Vector<Real>,
    r2: &Vector<Real>,
    inv_mass1: Real,
    inv_mass2: Real,
    inv_inertia1: Real,
    inv_inertia2: Real,
) -> Matrix3<Real> {
    let (i1, i2) = (inv_inertia1, inv_inertia2);
    let m = inv_mass1 + inv_mass2;
    let k11 = m + r1.y * r1.y * i1 + r2.y * r2.y * i2;
    let k12 = -r1.y * r1.x * i1 - r2.y * r2.x * i2;
    let k13 = -r1.y * i1 - r2.y * i2;
    let k22 = m + r1.x * r1.x * i1 + r2.x * r2.x * i2;
    let k23 = r1.x * i1 + r2.x * i2;
    let k33 = i1 + i2;

    Matrix3::new(
        k11, k12, k13, //
        k12, k22, k23, //
        k13, k23, k33,
    )
}

/// The description of a revolute joint, read once when the joint is built.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[must_use = "Builder functions return the updated builder"]
pub struct RevoluteJointDef {
    /// The first attached body.
    pub body1: RigidBodyHandle,
    /// The second attached body.
    pub body2: RigidBodyHandle,
    /// Can the two attached bodies collide with each other?
    pub collide_connected: bool,
    /// The anchor point, in the local frame of the first body origin.
    pub local_anchor1: Point<Real>,
    /// The anchor point, in the local frame of the second body origin.
    pub local_anchor2: Point<Real>,
    /// The angle of the second body relative to the first one when the joint angle is zero.
    pub reference_angle: Real,
    /// Is the angular limit active?
    pub enable_limit: bool,
    /// The lower joint angle.
    pub lower_angle: Real,
    /// The upper joint angle.
    pub upper_angle: Real,
    /// Is the motor active?
    pub enable_motor: bool,
    /// The target relative angular velocity of the motor.
    pub motor_speed: Real,
    /// The maximum torque the motor can apply.
    pub max_motor_torque: Real,
}

impl RevoluteJointDef {
    /// A revolute joint attaching the origins of two bodies, with no limit nor motor.
    pub fn new(body1: RigidBodyHandle, body2: RigidBodyHandle) -> Self {
        Self {
            body1,
            body2,
            collide_connected: false,
            local_anchor1: Point::origin(),
            local_anchor2: Point::origin(),
            reference_angle: 0.0,
            enable_limit: false,
            lower_angle: 0.0,
            upper_angle: 0.0,
            enable_motor: false,
            motor_speed: 0.0,
            max_motor_torque: 0.0,
        }
    }

    /// A revolute joint attaching two bodies at a world-space point.
    ///
    /// The local anchors are computed from the current poses of both bodies, and the
    /// reference angle from their current relative angle.
    pub fn initialize(
        bodies: &RigidBodySet,
        body1: RigidBodyHandle,
        body2: RigidBodyHandle,
        world_anchor: Point<Real>,
    ) -> Result<Self, JointError> {
        let rb1 = bodies
            .get(body1)
            .ok_or(JointError::InvalidBodyHandle(body1))?;
        let rb2 = bodies
            .get(body2)
            .ok_or(JointError::InvalidBodyHandle(body2))?;

        Ok(Self {
            local_anchor1: rb1.position().inverse_transform_point(&world_anchor),
            local_anchor2: rb2.position().inverse_transform_point(&world_anchor),
            reference_angle: rb2.angle() - rb1.angle(),
            ..Self::new(body1, body2)
        })
    }

    /// Sets the anchor on the first body.
    pub fn local_anchor1(mut self, local_anchor1: Point<Real>) -> Self {
        self.local_anchor1 = local_anchor1;
        self
    }

    /// Sets the anchor on the second body.
    pub fn local_anchor2(mut self, local_anchor2: Point<Real>) -> Self {
        self.local_anchor2 = local_anchor2;
        self
    }

    /// Sets the reference angle.
    pub fn reference_angle(mut self, reference_angle: Real) -> Self {
        self.reference_angle = reference_angle;
        self
    }

    /// Enables the angular limit with the given `[lower, upper]` bounds.
    pub fn limits(mut self, limits: [Real; 2]) -> Self {
        self.enable_limit = true;
        self.lower_angle = limits[0];
        self.upper_angle = limits[1];
        self
    }

    /// Enables the motor with the given target speed and maximum torque.
    pub fn motor(mut self, speed: Real, max_torque: Real) -> Self {
        self.enable_motor = true;
        self.motor_speed = speed;
        self.max_motor_torque = max_torque;
        self
    }

    /// Sets whether the attached bodies can collide with each other.
    pub fn contacts_enabled(mut self, enabled: bool) -> Self {
        self.collide_connected = enabled;
        self
    }
}

impl JointDef for RevoluteJointDef {
    fn joint_type(&self) -> JointType {
        JointType::Revolute
    }

    fn body1(&self) -> RigidBodyHandle {
        self.body1
    }

    fn body2(&self) -> RigidBodyHandle {
        self.body2
    }

    fn collide_connected(&self) -> bool {
        self.collide_connected
    }
}

/// A joint that removes the relative translation between two anchors, with an optional
/// motor and optional limits on the relative rotation.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct RevoluteJoint {
    base: JointBase,
    local_anchor1: Point<Real>,
    local_anchor2: Point<Real>,
    reference_angle: Real,
    motor: RevoluteMotor,
    limits: RevoluteLimits,
    state: RevoluteConstraintState,
    cache: RevoluteSolverCache,
}

impl RevoluteJoint {
    /// Builds a revolute joint from its description.
    pub fn new(def: &RevoluteJointDef) -> Self {
        Self {
            base: JointBase {
                body1: def.body1,
                body2: def.body2,
                collide_connected: def.collide_connected,
            },
            local_anchor1: def.local_anchor1,
            local_anchor2: def.local_anchor2,
            reference_angle: def.reference_angle,
            motor: RevoluteMotor {
                enabled: def.enable_motor,
                max_torque: def.max_motor_torque,
                speed: def.motor_speed,
            },
            limits: RevoluteLimits {
                enabled: def.enable_limit,
                lower: def.lower_angle,
                upper: def.upper_angle,
            },
            state: RevoluteConstraintState::default(),
            cache: RevoluteSolverCache::default(),
        }
    }

    /// The anchor, in the local frame of the first body origin.
    pub fn local_anchor1(&self) -> Point<Real> {
        self.local_anchor1
    }

    /// The anchor, in the local frame of the second body origin.
    pub fn local_anchor2(&self) -> Point<Real> {
        self.local_anchor2
    }

    /// The relative angle of the bodies at which the joint angle is zero.
    pub fn reference_angle(&self) -> Real {
        self.reference_angle
    }

    /// The current joint angle.
    pub fn joint_angle(&self, bodies: &RigidBodySet) -> Real {
        bodies[self.base.body2].angle() - bodies[self.base.body1].angle() - self.reference_angle
    }

    /// The current relative angular velocity.
    pub fn joint_speed(&self, bodies: &RigidBodySet) -> Real {
        bodies[self.base.body2].angvel() - bodies[self.base.body1].angvel()
    }

    /// Is the motor active?
    pub fn is_motor_enabled(&self) -> bool {
        self.motor.enabled
    }

    /// Enables or disables the motor.
    pub fn enable_motor(&mut self, bodies: &mut RigidBodySet, enabled: bool) {
        self.wake_up_bodies(bodies);
        self.motor.enabled = enabled;
    }

    /// The target relative angular velocity of the motor.
    pub fn motor_speed(&self) -> Real {
        self.motor.speed
    }

    /// Sets the target relative angular velocity of the motor.
    pub fn set_motor_speed(&mut self, bodies: &mut RigidBodySet, speed: Real) {
        self.wake_up_bodies(bodies);
        self.motor.speed = speed;
    }

    /// The maximum torque the motor can apply.
    pub fn max_motor_torque(&self) -> Real {
        self.motor.max_torque
    }

    /// Sets the maximum torque the motor can apply.
    pub fn set_max_motor_torque(&mut self, bodies: &mut RigidBodySet, max_torque: Real) {
        debug_assert!(max_torque >= 0.0, "the motor torque must be non-negative");
        self.wake_up_bodies(bodies);
        self.motor.max_torque = max_torque;
    }

    /// The torque applied by the motor during the last step.
    pub fn motor_torque(&self, inv_dt: Real) -> Real {
        inv_dt * self.state.motor_impulse
    }

    /// Is the angular limit active?
    pub fn is_limit_enabled(&self) -> bool {
        self.limits.enabled
    }

    /// Enables or disables the angular limit.
    pub fn enable_limit(&mut self, bodies: &mut RigidBodySet, enabled: bool) {
        self.wake_up_bodies(bodies);
        if enabled != self.limits.enabled {
            self.limits.enabled = enabled;
            self.state.impulse.z = 0.0;
        }
    }

    /// The lower joint angle.
    pub fn lower_limit(&self) -> Real {
        self.limits.lower
    }

    /// The upper joint angle.
    pub fn upper_limit(&self) -> Real {
        self.limits.upper
    }

    /// Sets the joint angle limits.
    pub fn set_limits(&mut self, bodies: &mut RigidBodySet, lower: Real, upper: Real) {
        debug_assert!(lower <= upper, "the lower limit must not exceed the upper limit");
        self.wake_up_bodies(bodies);
        if lower != self.limits.lower || upper != self.limits.upper {
            self.limits.lower = lower;
            self.limits.upper = upper;
            self.state.impulse.z = 0.0;
        }
    }

    /// The current state of the angular limit.
    pub fn limit_state(&self) -> LimitState {
        self.state.limit_state
    }

    /// The point impulse (`x`, `y`) and angular limit impulse (`z`) accumulated so far.
    pub fn impulse(&self) -> Vector3<Real> {
        self.state.impulse
    }

    /// The motor impulse accumulated so far.
    pub fn motor_impulse(&self) -> Real {
        self.state.motor_impulse
    }
}

impl JointConstraint for RevoluteJoint {
    fn base(&self) -> &JointBase {
        &self.base
    }

    fn init_velocity_constraints(&mut self, bodies: &RigidBodySet, data: &mut SolverData) {
        let rb1 = &bodies[self.base.body1];
        let rb2 = &bodies[self.base.body2];
        let cache = &mut self.cache;
        let state = &mut self.state;

        cache.index1 = rb1.island_index();
        cache.index2 = rb2.island_index();
        cache.local_center1 = *rb1.local_center_of_mass();
        cache.local_center2 = *rb2.local_center_of_mass();
        cache.inv_mass1 = rb1.effective_inv_mass();
        cache.inv_mass2 = rb2.effective_inv_mass();
        cache.inv_inertia1 = rb1.effective_inv_angular_inertia();
        cache.inv_inertia2 = rb2.effective_inv_angular_inertia();

        let a1 = data.positions[cache.index1].angle;
        let a2 = data.positions[cache.index2].angle;
        let mut v1 = data.velocities[cache.index1].linear;
        let mut w1 = data.velocities[cache.index1].angular;
        let mut v2 = data.velocities[cache.index2].linear;
        let mut w2 = data.velocities[cache.index2].angular;

        let (m1, m2) = (cache.inv_mass1, cache.inv_mass2);
        let (i1, i2) = (cache.inv_inertia1, cache.inv_inertia2);

        cache.r1 = utils::rotation(a1) * (self.local_anchor1 - cache.local_center1);
        cache.r2 = utils::rotation(a2) * (self.local_anchor2 - cache.local_center2);
        cache.mass = effective_mass(&cache.r1, &cache.r2, m1, m2, i1, i2);

        let fixed_rotation = cache.fixed_rotation();
        cache.motor_mass = if i1 + i2 > 0.0 { 1.0 / (i1 + i2) } else { 0.0 };

        if !self.motor.enabled || fixed_rotation {
            state.motor_impulse = 0.0;
        }

        if self.limits.enabled && !fixed_rotation {
            let angle = a2 - a1 - self.reference_angle;
            let target = LimitState::classify(
                angle,
                self.limits.lower,
                self.limits.upper,
                data.step.angular_slop,
            );
            let (limit_state, reset) = state.limit_state.transition(target);
            state.limit_state = limit_state;
            if reset {
                state.impulse.z = 0.0;
            }
        } else {
            state.limit_state = LimitState::Inactive;
        }

        if data.step.warm_starting {
            state.impulse *= data.step.dt_ratio;
            state.motor_impulse *= data.step.dt_ratio;

            let p = state.impulse.xy();
            let ang_impulse = state.motor_impulse + state.impulse.z;

            v1 -= p * m1;
            w1 -= i1 * (cache.r1.gcross(p) + ang_impulse);
            v2 += p * m2;
            w2 += i2 * (cache.r2.gcross(p) + ang_impulse);
        } else {
            state.impulse = Vector3::zeros();
            state.motor_impulse = 0.0;
        }

        data.velocities[cache.index1].linear = v1;
        data.velocities[cache.index1].angular = w1;
        data.velocities[cache.index2].linear = v2;
        data.velocities[cache.index2].angular = w2;
    }

    fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let cache = &self.cache;
        let state = &mut self.state;

        let mut v1 = data.velocities[cache.index1].linear;
        let mut w1 = data.velocities[cache.index1].angular;
        let mut v2 = data.velocities[cache.index2].linear;
        let mut w2 = data.velocities[cache.index2].angular;

        let (m1, m2) = (cache.inv_mass1, cache.inv_mass2);
        let (i1, i2) = (cache.inv_inertia1, cache.inv_inertia2);
        let fixed_rotation = cache.fixed_rotation();

        if self.motor.enabled && state.limit_state != LimitState::Equal && !fixed_rotation {
            let cdot = w2 - w1 - self.motor.speed;
            let impulse = -cache.motor_mass * cdot;
            let old_impulse = state.motor_impulse;
            let max_impulse = data.step.dt * self.motor.max_torque;
            state.motor_impulse = na::clamp(old_impulse + impulse, -max_impulse, max_impulse);
            let impulse = state.motor_impulse - old_impulse;

            w1 -= i1 * impulse;
            w2 += i2 * impulse;
        }

        if self.limits.enabled && state.limit_state != LimitState::Inactive && !fixed_rotation {
            let cdot1 = v2 + w2.gcross(cache.r2) - v1 - w1.gcross(cache.r1);
            let cdot2 = w2 - w1;
            let cdot = Vector3::new(cdot1.x, cdot1.y, cdot2);

            let mut impulse = -cache.mass.solve33(cdot);

            if state
                .limit_state
                .accepts_angular_impulse(state.impulse.z + impulse.z)
            {
                state.impulse += impulse;
            } else {
                impulse = reduced_impulse(&cache.mass, cdot1, &mut state.impulse);
            }

            let p = impulse.xy();
            v1 -= p * m1;
            w1 -= i1 * (cache.r1.gcross(p) + impulse.z);
            v2 += p * m2;
            w2 += i2 * (cache.r2.gcross(p) + impulse.z);
        } else {
            let cdot = v2 + w2.gcross(cache.r2) - v1 - w1.gcross(cache.r1);
            let impulse = cache.mass.solve22(-cdot);

            state.impulse.x += impulse.x;
            state.impulse.y += impulse.y;

            v1 -= impulse * m1;
            w1 -= i1 * cache.r1.gcross(impulse);
            v2 += impulse * m2;
            w2 += i2 * cache.r2.gcross(impulse);
        }

        data.velocities[cache.index1].linear = v1;
        data.velocities[cache.index1].angular = w1;
        data.velocities[cache.index2].linear = v2;
        data.velocities[cache.index2].angular = w2;
    }

    fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let cache = &self.cache;

        let mut c1 = data.positions[cache.index1].center;
        let mut a1 = data.positions[cache.index1].angle;
        let mut c2 = data.positions[cache.index2].center;
        let mut a2 = data.positions[cache.index2].angle;

        let (m1, m2) = (cache.inv_mass1, cache.inv_mass2);
        let (i1, i2) = (cache.inv_inertia1, cache.inv_inertia2);
        let fixed_rotation = cache.fixed_rotation();

        let mut angular_error = 0.0;

        if self.limits.enabled
            && self.state.limit_state != LimitState::Inactive
            && !fixed_rotation
        {
            let angle = a2 - a1 - self.reference_angle;
            let max_correction = data.step.max_angular_correction;
            let slop = data.step.angular_slop;

            let c = match self.state.limit_state {
                LimitState::Equal => {
                    let c = na::clamp(angle - self.limits.lower, -max_correction, max_correction);
                    angular_error = c.abs();
                    c
                }
                LimitState::AtLower => {
                    let c = angle - self.limits.lower;
                    angular_error = -c;
                    na::clamp(c + slop, -max_correction, 0.0)
                }
                LimitState::AtUpper => {
                    let c = angle - self.limits.upper;
                    angular_error = c;
                    na::clamp(c - slop, 0.0, max_correction)
                }
                LimitState::Inactive => 0.0,
            };

            let limit_impulse = -cache.motor_mass * c;
            a1 -= i1 * limit_impulse;
            a2 += i2 * limit_impulse;
        }

        let r1 = utils::rotation(a1) * (self.local_anchor1 - cache.local_center1);
        let r2 = utils::rotation(a2) * (self.local_anchor2 - cache.local_center2);

        let c = (c2 + r2) - (c1 + r1);
        let position_error = c.norm();

        let k = effective_mass(&r1, &r2, m1, m2, i1, i2);
        let impulse = -k.solve22(c);

        c1 -= impulse * m1;
        a1 -= i1 * r1.gcross(impulse);
        c2 += impulse * m2;
        a2 += i2 * r2.gcross(impulse);

        data.positions[cache.index1].center = c1;
        data.positions[cache.index1].angle = a1;
        data.positions[cache.index2].center = c2;
        data.positions[cache.index2].angle = a2;

        position_error <= data.step.linear_slop && angular_error <= data.step.angular_slop
    }

    fn anchor1(&self, bodies: &RigidBodySet) -> Point<Real> {
        bodies[self.base.body1].position() * self.local_anchor1
    }

    fn anchor2(&self, bodies: &RigidBodySet) -> Point<Real> {
        bodies[self.base.body2].position() * self.local_anchor2
    }

    fn reaction_force(&self, inv_dt: Real) -> Vector<Real> {
        self.state.impulse.xy() * inv_dt
    }

    fn reaction_torque(&self, inv_dt: Real) -> Real {
        inv_dt * self.state.impulse.z
    }
}

/// Drops the angular row of a limit that would otherwise pull: only the point constraint is
/// solved, after cancelling the angular impulse accumulated so far.
///
/// Returns the impulse to apply and updates the accumulated one.
fn reduced_impulse(
    mass: &Matrix3<Real>,
    cdot1: Vector<Real>,
    accumulated: &mut Vector3<Real>,
) -> Vector3<Real> {
    let rhs = -cdot1 + Vector::new(mass.m13, mass.m23) * accumulated.z;
    let reduced = mass.solve22(rhs);
    let impulse = Vector3::new(reduced.x, reduced.y, -accumulated.z);
    accumulated.x += reduced.x;
    accumulated.y += reduced.y;
    accumulated.z = 0.0;
    impulse
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dynamics::solver::{SolverPosition, SolverVelocity, TimeStep};
    use crate::dynamics::RigidBodyBuilder;
    use approx::assert_relative_eq;

    fn solver_arrays(bodies: &mut RigidBodySet) -> (Vec<SolverPosition>, Vec<SolverVelocity>) {
        let mut positions = Vec::new();
        let mut velocities = Vec::new();

        for (i, (_, rb)) in bodies.iter_mut().enumerate() {
            rb.island_index = i;
            positions.push(SolverPosition {
                center: rb.center_of_mass(),
                angle: rb.angle(),
            });
            velocities.push(SolverVelocity {
                linear: *rb.linvel(),
                angular: rb.angvel(),
            });
        }

        (positions, velocities)
    }

    // A fixed body at the origin and a dynamic body hanging from it by a unit-length arm.
    fn pendulum(bodies: &mut RigidBodySet, angle: Real) -> RevoluteJointDef {
        let ground = bodies.insert(RigidBodyBuilder::fixed());
        let bob = bodies.insert(
            RigidBodyBuilder::dynamic()
                .translation(Vector::new(angle.cos(), angle.sin()))
                .rotation(angle),
        );
        RevoluteJointDef::new(ground, bob).local_anchor2(Point::new(-1.0, 0.0))
    }

    fn anchor_error(joint: &RevoluteJoint, positions: &[SolverPosition]) -> Real {
        let cache = &joint.cache;
        let p1 = &positions[cache.index1];
        let p2 = &positions[cache.index2];
        let w1 = p1.center + utils::rotation(p1.angle) * (joint.local_anchor1 - cache.local_center1);
        let w2 = p2.center + utils::rotation(p2.angle) * (joint.local_anchor2 - cache.local_center2);
        (w2 - w1).norm()
    }

    #[test]
    fn limit_state_transitions() {
        use LimitState::*;
        let states = [Inactive, AtLower, AtUpper, Equal];

        for from in states {
            assert_eq!(from.transition(Inactive), (Inactive, true));
            assert_eq!(from.transition(Equal), (Equal, false));
            assert_eq!(from.transition(AtLower), (AtLower, from != AtLower));
            assert_eq!(from.transition(AtUpper), (AtUpper, from != AtUpper));
        }
    }

    #[test]
    fn limit_classification() {
        let slop = TimeStep::default().angular_slop;
        assert_eq!(LimitState::classify(-2.0, -1.0, 1.0, slop), LimitState::AtLower);
        assert_eq!(LimitState::classify(2.0, -1.0, 1.0, slop), LimitState::AtUpper);
        assert_eq!(LimitState::classify(0.0, -1.0, 1.0, slop), LimitState::Inactive);
        assert_eq!(LimitState::classify(-1.0, -1.0, 1.0, slop), LimitState::AtLower);
        assert_eq!(LimitState::classify(1.0, -1.0, 1.0, slop), LimitState::AtUpper);
    }

    #[test]
    fn collapsed_limits_are_equal() {
        let slop = TimeStep::default().angular_slop;
        let mut rng = oorandom::Rand32::new(42);

        for _ in 0..100 {
            let angle = (rng.rand_float() as Real - 0.5) * 20.0;
            assert_eq!(LimitState::classify(angle, 0.0, 0.0, slop), LimitState::Equal);

            // Bounds within the slop around the current angle.
            let lower = angle - slop / 2.0;
            let upper = angle + slop / 2.0;
            assert_eq!(LimitState::classify(angle, lower, upper, slop), LimitState::Equal);
        }
    }

    #[test]
    fn limit_state_is_classified_during_init() {
        for (angle, expected) in [
            (-2.0, LimitState::AtLower),
            (2.0, LimitState::AtUpper),
            (0.0, LimitState::Inactive),
        ] {
            let mut bodies = RigidBodySet::new();
            let def = pendulum(&mut bodies, angle).limits([-1.0, 1.0]);
            let mut joint = RevoluteJoint::new(&def);
            let (mut positions, mut velocities) = solver_arrays(&mut bodies);
            let mut data = SolverData::new(TimeStep::default(), &mut positions, &mut velocities);

            joint.init_velocity_constraints(&bodies, &mut data);
            assert_eq!(joint.limit_state(), expected);
            assert_relative_eq!(joint.joint_angle(&bodies), angle);
        }
    }

    #[test]
    fn def_round_trip() {
        let mut bodies = RigidBodySet::new();
        let def = pendulum(&mut bodies, 0.0)
            .limits([-0.5, 0.75])
            .motor(2.0, 10.0)
            .reference_angle(0.25)
            .contacts_enabled(true);
        let joint = RevoluteJoint::new(&def);

        assert!(joint.is_limit_enabled());
        assert_eq!(joint.lower_limit(), -0.5);
        assert_eq!(joint.upper_limit(), 0.75);
        assert!(joint.is_motor_enabled());
        assert_eq!(joint.motor_speed(), 2.0);
        assert_eq!(joint.max_motor_torque(), 10.0);
        assert_eq!(joint.reference_angle(), 0.25);
        assert_eq!(joint.local_anchor2(), Point::new(-1.0, 0.0));
        assert!(joint.collide_connected());
        assert_eq!(joint.body1(), def.body1);
        assert_eq!(joint.body2(), def.body2);
        assert_eq!(joint.limit_state(), LimitState::Inactive);
    }

    #[test]
    fn initialize_from_world_anchor() {
        let mut bodies = RigidBodySet::new();
        let h1 = bodies.insert(
            RigidBodyBuilder::dynamic()
                .translation(Vector::new(1.0, 0.0))
                .rotation(0.5),
        );
        let h2 = bodies.insert(
            RigidBodyBuilder::dynamic()
                .translation(Vector::new(-1.0, 2.0))
                .rotation(-1.0),
        );
        let anchor = Point::new(0.5, 0.5);
        let def = RevoluteJointDef::initialize(&bodies, h1, h2, anchor).unwrap();
        let joint = RevoluteJoint::new(&def);

        assert_relative_eq!(def.reference_angle, -1.5);
        assert_relative_eq!(joint.anchor1(&bodies), anchor, epsilon = 1.0e-5);
        assert_relative_eq!(joint.anchor2(&bodies), anchor, epsilon = 1.0e-5);
        assert_relative_eq!(joint.joint_angle(&bodies), 0.0);

        let invalid = RigidBodyHandle::invalid();
        assert_eq!(
            RevoluteJointDef::initialize(&bodies, h1, invalid, anchor),
            Err(JointError::InvalidBodyHandle(invalid))
        );
    }

    #[test]
    fn resting_bodies_stay_at_rest() {
        let mut bodies = RigidBodySet::new();
        let h1 = bodies.insert(RigidBodyBuilder::dynamic());
        let h2 = bodies.insert(RigidBodyBuilder::dynamic().translation(Vector::new(2.0, 0.0)));
        let def = RevoluteJointDef::initialize(&bodies, h1, h2, Point::new(1.0, 0.0)).unwrap();
        let mut joint = RevoluteJoint::new(&def);
        let (mut positions, mut velocities) = solver_arrays(&mut bodies);
        let mut data = SolverData::new(TimeStep::default(), &mut positions, &mut velocities);

        joint.init_velocity_constraints(&bodies, &mut data);
        for _ in 0..8 {
            joint.solve_velocity_constraints(&mut data);
        }

        assert_eq!(joint.impulse(), Vector3::zeros());
        assert_eq!(joint.motor_impulse(), 0.0);
        for vel in data.velocities.iter() {
            assert_eq!(*vel, SolverVelocity::default());
        }
    }

    #[test]
    fn converged_impulses_leave_velocities_unchanged() {
        for limits in [None, Some([0.0, 0.0])] {
            let mut bodies = RigidBodySet::new();
            let mut def = pendulum(&mut bodies, 0.3);
            if let Some(limits) = limits {
                def = def.limits(limits);
            }
            let mut joint = RevoluteJoint::new(&def);
            let (mut positions, mut velocities) = solver_arrays(&mut bodies);
            velocities[1].linear = Vector::new(0.5, -1.0);
            velocities[1].angular = 0.25;
            let mut data = SolverData::new(TimeStep::default(), &mut positions, &mut velocities);

            joint.init_velocity_constraints(&bodies, &mut data);
            for _ in 0..20 {
                joint.solve_velocity_constraints(&mut data);
            }

            let converged = data.velocities[1];
            let impulse = joint.impulse();
            joint.solve_velocity_constraints(&mut data);

            assert_relative_eq!(data.velocities[1].linear, converged.linear, epsilon = 1.0e-5);
            assert_relative_eq!(data.velocities[1].angular, converged.angular, epsilon = 1.0e-5);
            assert_relative_eq!(joint.impulse(), impulse, epsilon = 1.0e-5);
        }
    }

    #[test]
    fn motor_impulse_is_bounded() {
        let mut rng = oorandom::Rand32::new(7);

        for _ in 0..20 {
            let speed = (rng.rand_float() as Real - 0.5) * 100.0;
            let max_torque = rng.rand_float() as Real * 5.0;
            let mut bodies = RigidBodySet::new();
            let def = pendulum(&mut bodies, 0.0).motor(speed, max_torque);
            let mut joint = RevoluteJoint::new(&def);
            let (mut positions, mut velocities) = solver_arrays(&mut bodies);
            let step = TimeStep::default();
            let mut data = SolverData::new(step, &mut positions, &mut velocities);

            joint.init_velocity_constraints(&bodies, &mut data);
            for _ in 0..8 {
                joint.solve_velocity_constraints(&mut data);
                assert!(joint.motor_impulse().abs() <= max_torque * step.dt + 1.0e-6);
            }
            assert_relative_eq!(
                joint.motor_torque(step.inv_dt),
                joint.motor_impulse() * step.inv_dt
            );
        }
    }

    #[test]
    fn position_error_does_not_increase() {
        let mut rng = oorandom::Rand32::new(1234);

        for _ in 0..20 {
            let mut bodies = RigidBodySet::new();
            let def = pendulum(&mut bodies, 0.0);
            let mut joint = RevoluteJoint::new(&def);
            let (mut positions, mut velocities) = solver_arrays(&mut bodies);
            positions[1].center.x += (rng.rand_float() as Real - 0.5) * 0.2;
            positions[1].center.y += (rng.rand_float() as Real - 0.5) * 0.2;
            positions[1].angle += (rng.rand_float() as Real - 0.5) * 0.4;
            let mut data = SolverData::new(TimeStep::default(), &mut positions, &mut velocities);

            joint.init_velocity_constraints(&bodies, &mut data);
            let mut error = anchor_error(&joint, data.positions);
            let mut converged = false;

            for _ in 0..10 {
                converged = joint.solve_position_constraints(&mut data);
                let new_error = anchor_error(&joint, data.positions);
                assert!(new_error <= error + 1.0e-5);
                error = new_error;
            }

            assert!(converged);
            assert!(error <= data.step.linear_slop);
        }
    }

    #[test]
    fn fixed_rotation_degrades_to_point_constraint() {
        let mut bodies = RigidBodySet::new();
        let ground = bodies.insert(RigidBodyBuilder::fixed());
        let bob = bodies.insert(
            RigidBodyBuilder::dynamic()
                .translation(Vector::new(1.0, 0.0))
                .lock_rotations(),
        );
        let def = RevoluteJointDef::new(ground, bob)
            .local_anchor2(Point::new(-1.0, 0.0))
            .limits([-0.1, 0.1])
            .motor(5.0, 100.0);
        let mut joint = RevoluteJoint::new(&def);
        joint.state.motor_impulse = 3.0;
        joint.state.limit_state = LimitState::AtUpper;

        let (mut positions, mut velocities) = solver_arrays(&mut bodies);
        velocities[1].linear = Vector::new(0.0, -1.0);
        let mut data = SolverData::new(TimeStep::default(), &mut positions, &mut velocities);

        joint.init_velocity_constraints(&bodies, &mut data);
        assert!(joint.cache.fixed_rotation());
        assert_eq!(joint.cache.motor_mass, 0.0);
        assert_eq!(joint.motor_impulse(), 0.0);
        assert_eq!(joint.limit_state(), LimitState::Inactive);

        joint.solve_velocity_constraints(&mut data);
        assert_relative_eq!(data.velocities[1].linear, Vector::zeros(), epsilon = 1.0e-6);
        assert_eq!(data.velocities[1].angular, 0.0);
        assert_relative_eq!(joint.impulse(), Vector3::new(0.0, 1.0, 0.0), epsilon = 1.0e-6);
        assert_eq!(joint.motor_impulse(), 0.0);
    }

    #[test]
    fn disabled_warm_starting_resets_impulses() {
        let mut bodies = RigidBodySet::new();
        let def = pendulum(&mut bodies, 0.0).motor(1.0, 10.0);
        let mut joint = RevoluteJoint::new(&def);
        joint.state.impulse = Vector3::new(1.0, 2.0, 3.0);
        joint.state.motor_impulse = 0.1;

        let (mut positions, mut velocities) = solver_arrays(&mut bodies);
        let step = TimeStep {
            warm_starting: false,
            ..TimeStep::default()
        };
        let mut data = SolverData::new(step, &mut positions, &mut velocities);

        joint.init_velocity_constraints(&bodies, &mut data);
        assert_eq!(joint.impulse(), Vector3::zeros());
        assert_eq!(joint.motor_impulse(), 0.0);
        assert_eq!(data.velocities[1], SolverVelocity::default());
    }

    #[test]
    fn warm_starting_scales_impulses() {
        let mut bodies = RigidBodySet::new();
        let def = pendulum(&mut bodies, 0.0).motor(1.0, 10.0);
        let mut joint = RevoluteJoint::new(&def);
        joint.state.impulse = Vector3::new(0.0, 2.0, 0.0);
        joint.state.motor_impulse = 0.5;

        let (mut positions, mut velocities) = solver_arrays(&mut bodies);
        let step = TimeStep {
            dt_ratio: 0.5,
            ..TimeStep::default()
        };
        let mut data = SolverData::new(step, &mut positions, &mut velocities);

        joint.init_velocity_constraints(&bodies, &mut data);
        assert_relative_eq!(joint.impulse(), Vector3::new(0.0, 1.0, 0.0));
        assert_relative_eq!(joint.motor_impulse(), 0.25);
        // r2 = (-1, 0) so the point impulse also spins the bob.
        assert_relative_eq!(data.velocities[1].linear, Vector::new(0.0, 1.0));
        assert_relative_eq!(data.velocities[1].angular, -1.0 + 0.25);
    }

    #[test]
    fn limit_stops_motor() {
        let mut bodies = RigidBodySet::new();
        let def = pendulum(&mut bodies, 0.15)
            .limits([-0.1, 0.1])
            .motor(10.0, 1000.0);
        let mut joint = RevoluteJoint::new(&def);
        let (mut positions, mut velocities) = solver_arrays(&mut bodies);
        let mut data = SolverData::new(TimeStep::default(), &mut positions, &mut velocities);

        joint.init_velocity_constraints(&bodies, &mut data);
        assert_eq!(joint.limit_state(), LimitState::AtUpper);

        for _ in 0..8 {
            joint.solve_velocity_constraints(&mut data);
        }

        let relative_angvel = data.velocities[1].angular - data.velocities[0].angular;
        assert!(relative_angvel <= 1.0e-4);
        assert!(joint.motor_impulse() > 0.0);
        assert!(joint.impulse().z < 0.0);
        assert!(joint.reaction_torque(data.step.inv_dt) < 0.0);
    }

    fn point_velocity_error(joint: &RevoluteJoint, velocities: &[SolverVelocity]) -> Vector<Real> {
        let cache = &joint.cache;
        let vel1 = &velocities[cache.index1];
        let vel2 = &velocities[cache.index2];
        vel2.linear + vel2.angular.gcross(cache.r2) - vel1.linear - vel1.angular.gcross(cache.r1)
    }

    #[test]
    fn one_sided_limits_accept_zero_impulse() {
        for zero in [0.0, -0.0] {
            assert!(LimitState::AtLower.accepts_angular_impulse(zero));
            assert!(LimitState::AtUpper.accepts_angular_impulse(zero));
        }

        assert!(LimitState::AtLower.accepts_angular_impulse(1.0e-6));
        assert!(!LimitState::AtLower.accepts_angular_impulse(-1.0e-6));
        assert!(LimitState::AtUpper.accepts_angular_impulse(-1.0e-6));
        assert!(!LimitState::AtUpper.accepts_angular_impulse(1.0e-6));
        assert!(LimitState::Equal.accepts_angular_impulse(-1.0));
    }

    #[test]
    fn limits_moving_away_release_their_angular_impulse() {
        // The bob sits past one bound, rotating back inside while the limit still holds an
        // angular impulse from the previous step.
        for (angle, state, angular_impulse, angvel) in [
            (-0.6, LimitState::AtLower, 0.3, 2.0),
            (0.6, LimitState::AtUpper, -0.3, -2.0),
        ] {
            let mut bodies = RigidBodySet::new();
            let def = pendulum(&mut bodies, angle).limits([-0.5, 0.5]);
            let mut joint = RevoluteJoint::new(&def);
            joint.state.limit_state = state;
            joint.state.impulse = Vector3::new(0.0, 0.0, angular_impulse);

            let (mut positions, mut velocities) = solver_arrays(&mut bodies);
            velocities[1].angular = angvel;
            let mut data = SolverData::new(TimeStep::default(), &mut positions, &mut velocities);

            joint.init_velocity_constraints(&bodies, &mut data);
            assert_eq!(joint.limit_state(), state);

            for _ in 0..4 {
                joint.solve_velocity_constraints(&mut data);
                assert_eq!(joint.impulse().z, 0.0);
                assert_relative_eq!(
                    point_velocity_error(&joint, &data.velocities[..]),
                    Vector::zeros(),
                    epsilon = 1.0e-5
                );
            }

            // The limit let go: the bob keeps rotating away from the bound.
            assert!(data.velocities[1].angular * angvel > 0.0);
        }
    }

    #[test]
    fn zero_total_angular_impulse_keeps_the_full_solve() {
        // r2 = (-1, 0) with unit mass properties: the limit block solves exactly and its angular
        // impulse cancels the accumulated one.
        let mut bodies = RigidBodySet::new();
        let def = pendulum(&mut bodies, 0.0).limits([0.0, 1.0]);
        let mut joint = RevoluteJoint::new(&def);
        joint.state.limit_state = LimitState::AtLower;
        joint.state.impulse = Vector3::new(0.0, 0.0, 1.0);

        let (mut positions, mut velocities) = solver_arrays(&mut bodies);
        velocities[1] = SolverVelocity {
            linear: Vector::new(0.0, 0.5),
            angular: -0.5,
        };
        let mut data = SolverData::new(TimeStep::default(), &mut positions, &mut velocities);

        joint.init_velocity_constraints(&bodies, &mut data);
        assert_eq!(joint.limit_state(), LimitState::AtLower);
        assert_eq!(data.velocities[1].angular, 0.5);

        joint.solve_velocity_constraints(&mut data);
        assert_eq!(joint.impulse(), Vector3::new(0.0, -0.5, 0.0));
        assert_eq!(data.velocities[1].linear, Vector::zeros());
        assert_eq!(data.velocities[1].angular, 0.0);
    }

    #[test]
    fn limit_correction_pushes_back_inside() {
        let mut bodies = RigidBodySet::new();
        let def = pendulum(&mut bodies, -0.5).limits([-0.25, 0.25]);
        let mut joint = RevoluteJoint::new(&def);
        let (mut positions, mut velocities) = solver_arrays(&mut bodies);
        let mut data = SolverData::new(TimeStep::default(), &mut positions, &mut velocities);

        joint.init_velocity_constraints(&bodies, &mut data);
        assert_eq!(joint.limit_state(), LimitState::AtLower);

        let initial = data.positions[1].angle;
        assert!(!joint.solve_position_constraints(&mut data));
        assert!(data.positions[1].angle > initial);
        assert!(data.positions[1].angle - initial <= data.step.max_angular_correction + 1.0e-5);
    }

    #[test]
    fn mutators_wake_up_bodies_and_reset_limit_impulse() {
        let mut bodies = RigidBodySet::new();
        let def = pendulum(&mut bodies, 0.0);
        let mut joint = RevoluteJoint::new(&def);
        let (h1, h2) = (joint.body1(), joint.body2());

        let sleep_all = |bodies: &mut RigidBodySet| {
            bodies[h1].sleep();
            bodies[h2].sleep();
        };

        sleep_all(&mut bodies);
        joint.state.impulse = Vector3::new(1.0, 1.0, 1.0);
        joint.enable_limit(&mut bodies, true);
        assert!(!bodies[h1].is_sleeping() && !bodies[h2].is_sleeping());
        assert_eq!(joint.impulse(), Vector3::new(1.0, 1.0, 0.0));

        joint.state.impulse.z = 1.0;
        joint.enable_limit(&mut bodies, true);
        assert_eq!(joint.impulse().z, 1.0);

        joint.set_limits(&mut bodies, 0.0, 0.0);
        assert_eq!(joint.impulse().z, 1.0);
        joint.set_limits(&mut bodies, -0.5, 0.5);
        assert_eq!(joint.impulse().z, 0.0);
        assert_eq!((joint.lower_limit(), joint.upper_limit()), (-0.5, 0.5));

        sleep_all(&mut bodies);
        joint.enable_motor(&mut bodies, true);
        assert!(joint.is_motor_enabled());
        assert!(!bodies[h2].is_sleeping());

        sleep_all(&mut bodies);
        joint.set_motor_speed(&mut bodies, 3.0);
        assert_eq!(joint.motor_speed(), 3.0);
        assert!(!bodies[h2].is_sleeping());

        sleep_all(&mut bodies);
        joint.set_max_motor_torque(&mut bodies, 7.0);
        assert_eq!(joint.max_motor_torque(), 7.0);
        assert!(!bodies[h1].is_sleeping() && !bodies[h2].is_sleeping());
    }

    #[test]
    fn reaction_scales_with_inv_dt() {
        let mut bodies = RigidBodySet::new();
        let def = pendulum(&mut bodies, 0.0);
        let mut joint = RevoluteJoint::new(&def);
        joint.state.impulse = Vector3::new(1.0, 2.0, 3.0);

        assert_relative_eq!(joint.reaction_force(60.0), Vector::new(60.0, 120.0));
        assert_relative_eq!(joint.reaction_torque(60.0), 180.0);
        assert_eq!(joint.reaction_force(0.0), Vector::zeros());
    }
}
