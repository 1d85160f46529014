use crate::math::{AngVector, Isometry, Point, Real, Rotation, Translation, Vector};
use crate::utils;

/// The type of a body, governing the way it is affected by joints and external forces.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum RigidBodyType {
    /// A `Dynamic` body can be affected by all external forces and by its joints.
    Dynamic = 0,
    /// A `Fixed` body cannot be affected by external forces or joints: it has an infinite mass.
    Fixed = 1,
    /// A `KinematicVelocityBased` body moves at the velocity set by the user and is not
    /// affected by its joints.
    KinematicVelocityBased = 2,
}

impl RigidBodyType {
    /// Is this rigid-body fixed (i.e. cannot move)?
    pub fn is_fixed(self) -> bool {
        self == RigidBodyType::Fixed
    }

    /// Is this rigid-body dynamic (i.e. can move and be affected by forces)?
    pub fn is_dynamic(self) -> bool {
        self == RigidBodyType::Dynamic
    }

    /// Is this rigid-body kinematic (i.e. can move but is unaffected by forces)?
    pub fn is_kinematic(self) -> bool {
        self == RigidBodyType::KinematicVelocityBased
    }
}

bitflags::bitflags! {
    #[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
    #[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
    /// Flags affecting the degrees of freedom of a rigid-body seen by the joint solver.
    pub struct LockedAxes: u8 {
        /// Flag indicating that the rigid-body cannot translate along any direction.
        const TRANSLATION_LOCKED = 1 << 0;
        /// Flag indicating that the rigid-body cannot rotate.
        const ROTATION_LOCKED = 1 << 1;
    }
}

/// A rigid body.
///
/// The pose is stored as the translation of the body origin plus an unbounded rotation
/// angle, so that joint angles accumulated over several turns stay continuous.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct RigidBody {
    pub(crate) translation: Vector<Real>,
    pub(crate) angle: Real,
    pub(crate) linvel: Vector<Real>,
    pub(crate) angvel: AngVector<Real>,
    pub(crate) mass: Real,
    pub(crate) angular_inertia: Real,
    pub(crate) local_com: Point<Real>,
    pub(crate) body_type: RigidBodyType,
    pub(crate) locked_axes: LockedAxes,
    pub(crate) sleeping: bool,
    pub(crate) island_index: usize,
}

impl RigidBody {
    /// The type of this rigid-body.
    pub fn body_type(&self) -> RigidBodyType {
        self.body_type
    }

    /// Is this rigid-body dynamic?
    pub fn is_dynamic(&self) -> bool {
        self.body_type.is_dynamic()
    }

    /// Is this rigid-body fixed?
    pub fn is_fixed(&self) -> bool {
        self.body_type.is_fixed()
    }

    /// Is this rigid-body kinematic?
    pub fn is_kinematic(&self) -> bool {
        self.body_type.is_kinematic()
    }

    /// The world-space position of this rigid-body's origin.
    pub fn position(&self) -> Isometry<Real> {
        Isometry::from_parts(Translation::from(self.translation), self.rotation())
    }

    /// The world-space translation of this rigid-body's origin.
    pub fn translation(&self) -> &Vector<Real> {
        &self.translation
    }

    /// The rotation of this rigid-body.
    pub fn rotation(&self) -> Rotation<Real> {
        utils::rotation(self.angle)
    }

    /// The unbounded rotation angle of this rigid-body.
    ///
    /// Unlike `self.rotation().angle()`, this is not wrapped into `[-pi, pi]`.
    pub fn angle(&self) -> Real {
        self.angle
    }

    /// Sets the position of this rigid-body's origin.
    pub fn set_position(&mut self, translation: Vector<Real>, angle: Real, wake_up: bool) {
        self.translation = translation;
        self.angle = angle;
        if wake_up {
            self.wake_up();
        }
    }

    /// The linear velocity of this rigid-body's center of mass.
    pub fn linvel(&self) -> &Vector<Real> {
        &self.linvel
    }

    /// The angular velocity of this rigid-body.
    pub fn angvel(&self) -> Real {
        self.angvel
    }

    /// Sets the linear velocity of this rigid-body's center of mass.
    ///
    /// This has no effect on fixed bodies.
    pub fn set_linvel(&mut self, linvel: Vector<Real>, wake_up: bool) {
        if !self.is_fixed() {
            self.linvel = linvel;
            if wake_up && linvel != Vector::zeros() {
                self.wake_up();
            }
        }
    }

    /// Sets the angular velocity of this rigid-body.
    ///
    /// This has no effect on fixed bodies.
    pub fn set_angvel(&mut self, angvel: Real, wake_up: bool) {
        if !self.is_fixed() {
            self.angvel = angvel;
            if wake_up && angvel != 0.0 {
                self.wake_up();
            }
        }
    }

    /// The mass of this rigid-body.
    pub fn mass(&self) -> Real {
        self.mass
    }

    /// The angular inertia of this rigid-body, about its center of mass.
    pub fn angular_inertia(&self) -> Real {
        self.angular_inertia
    }

    /// The center of mass of this rigid-body, expressed in its local frame.
    pub fn local_center_of_mass(&self) -> &Point<Real> {
        &self.local_com
    }

    /// The world-space center of mass of this rigid-body.
    pub fn center_of_mass(&self) -> Point<Real> {
        Point::from(self.translation) + self.rotation() * self.local_com.coords
    }

    /// The inverse mass seen by the joint solver.
    ///
    /// Zero if this body is not dynamic, if its translations are locked, or if its mass
    /// is not positive.
    pub fn effective_inv_mass(&self) -> Real {
        if !self.is_dynamic() || self.locked_axes.contains(LockedAxes::TRANSLATION_LOCKED) {
            0.0
        } else if self.mass > 0.0 {
            utils::inv(self.mass)
        } else {
            0.0
        }
    }

    /// The inverse angular inertia seen by the joint solver.
    ///
    /// Zero if this body is not dynamic, if its rotations are locked, or if its angular inertia
    /// is not positive.
    pub fn effective_inv_angular_inertia(&self) -> Real {
        if !self.is_dynamic() || self.locked_axes.contains(LockedAxes::ROTATION_LOCKED) {
            0.0
        } else if self.angular_inertia > 0.0 {
            utils::inv(self.angular_inertia)
        } else {
            0.0
        }
    }

    /// The locked degrees of freedom of this rigid-body.
    pub fn locked_axes(&self) -> LockedAxes {
        self.locked_axes
    }

    /// Locks or unlocks the given degrees of freedom of this rigid-body.
    pub fn set_locked_axes(&mut self, locked_axes: LockedAxes, wake_up: bool) {
        if self.locked_axes != locked_axes {
            self.locked_axes = locked_axes;
            if wake_up {
                self.wake_up();
            }
        }
    }

    /// Index of this rigid-body in the arrays of the current stepping context.
    pub fn island_index(&self) -> usize {
        self.island_index
    }

    /// Is this rigid-body sleeping?
    pub fn is_sleeping(&self) -> bool {
        self.sleeping
    }

    /// Wakes up this rigid-body.
    pub fn wake_up(&mut self) {
        self.sleeping = false;
    }

    /// Puts this rigid-body to sleep and sets its velocities to zero.
    pub fn sleep(&mut self) {
        self.sleeping = true;
        self.linvel = Vector::zeros();
        self.angvel = 0.0;
    }

    /// Is this body dynamic and awake?
    pub(crate) fn is_awake_dynamic(&self) -> bool {
        self.is_dynamic() && !self.sleeping
    }
}

/// A builder for rigid-bodies.
#[derive(Clone, Debug, PartialEq)]
#[must_use = "Builder functions return the updated builder"]
pub struct RigidBodyBuilder {
    translation: Vector<Real>,
    angle: Real,
    linvel: Vector<Real>,
    angvel: AngVector<Real>,
    mass: Real,
    angular_inertia: Real,
    local_com: Point<Real>,
    body_type: RigidBodyType,
    locked_axes: LockedAxes,
    sleeping: bool,
}

impl RigidBodyBuilder {
    /// Initialize a new builder for a rigid body which is either fixed, dynamic, or kinematic.
    pub fn new(body_type: RigidBodyType) -> Self {
        Self {
            translation: Vector::zeros(),
            angle: 0.0,
            linvel: Vector::zeros(),
            angvel: 0.0,
            mass: 1.0,
            angular_inertia: 1.0,
            local_com: Point::origin(),
            body_type,
            locked_axes: LockedAxes::empty(),
            sleeping: false,
        }
    }

    /// Initializes the builder of a new fixed rigid body.
    pub fn fixed() -> Self {
        Self::new(RigidBodyType::Fixed)
    }

    /// Initializes the builder of a new dynamic rigid body.
    pub fn dynamic() -> Self {
        Self::new(RigidBodyType::Dynamic)
    }

    /// Initializes the builder of a new velocity-based kinematic rigid body.
    pub fn kinematic_velocity_based() -> Self {
        Self::new(RigidBodyType::KinematicVelocityBased)
    }

    /// Sets the initial translation of the rigid-body origin.
    pub fn translation(mut self, translation: Vector<Real>) -> Self {
        self.translation = translation;
        self
    }

    /// Sets the initial unbounded rotation angle of the rigid-body.
    pub fn rotation(mut self, angle: Real) -> Self {
        self.angle = angle;
        self
    }

    /// Sets the initial linear velocity of the rigid-body's center of mass.
    pub fn linvel(mut self, linvel: Vector<Real>) -> Self {
        self.linvel = linvel;
        self
    }

    /// Sets the initial angular velocity of the rigid-body.
    pub fn angvel(mut self, angvel: Real) -> Self {
        self.angvel = angvel;
        self
    }

    /// Sets the mass of the rigid-body.
    pub fn mass(mut self, mass: Real) -> Self {
        self.mass = mass;
        self
    }

    /// Sets the angular inertia of the rigid-body, about its center of mass.
    pub fn angular_inertia(mut self, angular_inertia: Real) -> Self {
        self.angular_inertia = angular_inertia;
        self
    }

    /// Sets the center of mass of the rigid-body, in its local frame.
    pub fn local_center_of_mass(mut self, local_com: Point<Real>) -> Self {
        self.local_com = local_com;
        self
    }

    /// Sets the locked degrees of freedom of the rigid-body.
    pub fn locked_axes(mut self, locked_axes: LockedAxes) -> Self {
        self.locked_axes = locked_axes;
        self
    }

    /// Prevents the rigid-body from rotating.
    pub fn lock_rotations(mut self) -> Self {
        self.locked_axes.set(LockedAxes::ROTATION_LOCKED, true);
        self
    }

    /// Sets whether the rigid-body starts asleep.
    pub fn sleeping(mut self, sleeping: bool) -> Self {
        self.sleeping = sleeping;
        self
    }

    /// Build a new rigid-body with the parameters configured with this builder.
    pub fn build(&self) -> RigidBody {
        let (linvel, angvel) = if self.body_type.is_fixed() {
            (Vector::zeros(), 0.0)
        } else {
            (self.linvel, self.angvel)
        };

        RigidBody {
            translation: self.translation,
            angle: self.angle,
            linvel,
            angvel,
            mass: self.mass,
            angular_inertia: self.angular_inertia,
            local_com: self.local_com,
            body_type: self.body_type,
            locked_axes: self.locked_axes,
            sleeping: self.sleeping,
            island_index: 0,
        }
    }
}

impl From<RigidBodyBuilder> for RigidBody {
    fn from(val: RigidBodyBuilder) -> RigidBody {
        val.build()
    }
}
