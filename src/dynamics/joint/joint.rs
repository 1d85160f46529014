use crate::dynamics::solver::SolverData;
use crate::dynamics::{RevoluteJoint, RigidBodyHandle, RigidBodySet};
use crate::math::{Point, Real, Vector};

/// The kind of a joint, available on both definitions and constructed joints.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum JointType {
    /// A joint keeping two anchors together while allowing free relative rotation.
    Revolute,
    /// A joint coupling the relative angles of two other joints.
    Gear,
}

/// Data shared by every joint variant.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct JointBase {
    /// The first body attached to the joint.
    pub body1: RigidBodyHandle,
    /// The second body attached to the joint.
    pub body2: RigidBodyHandle,
    /// Can the two attached bodies collide with each other?
    pub collide_connected: bool,
}

/// The configuration of a joint before it is attached to its bodies.
pub trait JointDef {
    /// The kind of joint this definition builds.
    fn joint_type(&self) -> JointType;
    /// The first body attached to the joint.
    fn body1(&self) -> RigidBodyHandle;
    /// The second body attached to the joint.
    fn body2(&self) -> RigidBodyHandle;
    /// Can the two attached bodies collide with each other?
    fn collide_connected(&self) -> bool;
}

/// The solving lifecycle shared by all joints.
///
/// During one step, `init_velocity_constraints` is called once, then
/// `solve_velocity_constraints` once per velocity iteration, then
/// `solve_position_constraints` once per position iteration until it returns `true`.
pub trait JointConstraint {
    /// The data shared by every joint variant.
    fn base(&self) -> &JointBase;

    /// Prepares the velocity constraints of this step and applies the warm-starting impulses.
    fn init_velocity_constraints(&mut self, bodies: &RigidBodySet, data: &mut SolverData);

    /// Runs one sequential impulse iteration.
    fn solve_velocity_constraints(&mut self, data: &mut SolverData);

    /// Runs one position correction iteration.
    ///
    /// Returns `true` if the remaining errors are within the slop tolerances.
    fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool;

    /// The world-space anchor on the first body.
    fn anchor1(&self, bodies: &RigidBodySet) -> Point<Real>;

    /// The world-space anchor on the second body.
    fn anchor2(&self, bodies: &RigidBodySet) -> Point<Real>;

    /// The force applied by this joint on the second body during the last step.
    fn reaction_force(&self, inv_dt: Real) -> Vector<Real>;

    /// The torque applied by this joint on the second body during the last step.
    fn reaction_torque(&self, inv_dt: Real) -> Real;

    /// The first body attached to this joint.
    fn body1(&self) -> RigidBodyHandle {
        self.base().body1
    }

    /// The second body attached to this joint.
    fn body2(&self) -> RigidBodyHandle {
        self.base().body2
    }

    /// Can the two attached bodies collide with each other?
    fn collide_connected(&self) -> bool {
        self.base().collide_connected
    }

    /// Wakes up both bodies attached to this joint.
    fn wake_up_bodies(&self, bodies: &mut RigidBodySet) {
        let base = self.base();
        bodies.wake_up(base.body1);
        bodies.wake_up(base.body2);
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
/// An enum grouping all the possible joints.
pub enum Joint {
    /// A revolute joint.
    Revolute(RevoluteJoint),
}

impl Joint {
    /// The kind of this joint.
    pub fn joint_type(&self) -> JointType {
        match self {
            Joint::Revolute(_) => JointType::Revolute,
        }
    }

    /// Gets a reference to the underlying revolute joint, if `self` is one.
    pub fn as_revolute(&self) -> Option<&RevoluteJoint> {
        match self {
            Joint::Revolute(j) => Some(j),
        }
    }

    /// Gets a mutable reference to the underlying revolute joint, if `self` is one.
    pub fn as_revolute_mut(&mut self) -> Option<&mut RevoluteJoint> {
        match self {
            Joint::Revolute(j) => Some(j),
        }
    }

    fn constraint(&self) -> &dyn JointConstraint {
        match self {
            Joint::Revolute(j) => j,
        }
    }

    fn constraint_mut(&mut self) -> &mut dyn JointConstraint {
        match self {
            Joint::Revolute(j) => j,
        }
    }
}

impl JointConstraint for Joint {
    fn base(&self) -> &JointBase {
        self.constraint().base()
    }

    fn init_velocity_constraints(&mut self, bodies: &RigidBodySet, data: &mut SolverData) {
        self.constraint_mut().init_velocity_constraints(bodies, data)
    }

    fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        self.constraint_mut().solve_velocity_constraints(data)
    }

    fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        self.constraint_mut().solve_position_constraints(data)
    }

    fn anchor1(&self, bodies: &RigidBodySet) -> Point<Real> {
        self.constraint().anchor1(bodies)
    }

    fn anchor2(&self, bodies: &RigidBodySet) -> Point<Real> {
        self.constraint().anchor2(bodies)
    }

    fn reaction_force(&self, inv_dt: Real) -> Vector<Real> {
        self.constraint().reaction_force(inv_dt)
    }

    fn reaction_torque(&self, inv_dt: Real) -> Real {
        self.constraint().reaction_torque(inv_dt)
    }
}

impl From<RevoluteJoint> for Joint {
    fn from(j: RevoluteJoint) -> Self {
        Joint::Revolute(j)
    }
}
