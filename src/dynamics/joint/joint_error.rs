use crate::dynamics::{JointHandle, JointType, RigidBodyHandle};
use crate::math::Real;

/// Errors reported when a joint definition is inconsistent with the bodies or joints it
/// refers to.
#[derive(thiserror::Error, Copy, Clone, Debug, PartialEq)]
pub enum JointError {
    /// The rigid-body handle does not belong to the rigid-body set.
    #[error("the rigid-body handle {0:?} is not part of the rigid-body set")]
    InvalidBodyHandle(RigidBodyHandle),
    /// The joint handle does not belong to the joint set.
    #[error("the joint handle {0:?} is not part of the joint set")]
    InvalidJointHandle(JointHandle),
    /// A gear joint refers to a joint that cannot be geared.
    #[error("the joint {handle:?} of type {joint_type:?} cannot be coupled by a gear joint")]
    IncompatibleGearJoint {
        /// The offending joint.
        handle: JointHandle,
        /// Its type.
        joint_type: JointType,
    },
    /// A gear joint refers to a joint that does not couple one fixed body with one dynamic body.
    #[error("the joint {0:?} must attach exactly one fixed body to one dynamic body")]
    UngroundedGearJoint(JointHandle),
    /// The bodies of a gear joint are not the dynamic bodies of its coupled joints.
    #[error("the body {body:?} is not the dynamic body of the geared joint {joint:?}")]
    GearBodyMismatch {
        /// The geared joint.
        joint: JointHandle,
        /// The body the gear joint expected to be attached to `joint`.
        body: RigidBodyHandle,
    },
    /// The gear ratio is not finite.
    #[error("the gear ratio {0} is not finite")]
    InvalidGearRatio(Real),
}
