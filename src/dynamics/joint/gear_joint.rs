use crate::dynamics::joint::{JointConstraint, JointDef, JointError, JointType};
use crate::dynamics::{JointHandle, JointSet, RigidBodyHandle, RigidBodySet};
use crate::math::Real;

/// The description of a gear joint, coupling the angles of two revolute joints.
///
/// Each geared joint must attach one dynamic body to one fixed body; the gear joint then
/// attaches the two dynamic bodies so that `angle1 + ratio * angle2` stays constant.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct GearJointDef {
    /// The dynamic body of `joint1`.
    pub body1: RigidBodyHandle,
    /// The dynamic body of `joint2`.
    pub body2: RigidBodyHandle,
    /// The first geared joint.
    pub joint1: JointHandle,
    /// The second geared joint.
    pub joint2: JointHandle,
    /// The gear ratio.
    pub ratio: Real,
    /// Can the two attached bodies collide with each other?
    pub collide_connected: bool,
}

impl GearJointDef {
    /// A gear joint coupling `joint1` and `joint2` with a unit ratio.
    pub fn new(
        body1: RigidBodyHandle,
        body2: RigidBodyHandle,
        joint1: JointHandle,
        joint2: JointHandle,
    ) -> Self {
        Self {
            body1,
            body2,
            joint1,
            joint2,
            ratio: 1.0,
            collide_connected: false,
        }
    }

    /// Sets the gear ratio.
    #[must_use]
    pub fn ratio(mut self, ratio: Real) -> Self {
        self.ratio = ratio;
        self
    }

    /// Checks that this definition is consistent with the joints and bodies it refers to.
    pub fn validate(&self, joints: &JointSet, bodies: &RigidBodySet) -> Result<(), JointError> {
        if !self.ratio.is_finite() {
            return Err(JointError::InvalidGearRatio(self.ratio));
        }

        Self::validate_geared(joints, bodies, self.joint1, self.body1)?;
        Self::validate_geared(joints, bodies, self.joint2, self.body2)
    }

    fn validate_geared(
        joints: &JointSet,
        bodies: &RigidBodySet,
        handle: JointHandle,
        body: RigidBodyHandle,
    ) -> Result<(), JointError> {
        let joint = joints
            .get(handle)
            .ok_or(JointError::InvalidJointHandle(handle))?;

        let joint_type = joint.joint_type();
        if joint_type != JointType::Revolute {
            return Err(JointError::IncompatibleGearJoint { handle, joint_type });
        }

        let rb1 = bodies
            .get(joint.body1())
            .ok_or(JointError::InvalidBodyHandle(joint.body1()))?;
        let rb2 = bodies
            .get(joint.body2())
            .ok_or(JointError::InvalidBodyHandle(joint.body2()))?;

        let dynamic_body = match (rb1.body_type(), rb2.body_type()) {
            (t1, t2) if t1.is_fixed() && t2.is_dynamic() => joint.body2(),
            (t1, t2) if t1.is_dynamic() && t2.is_fixed() => joint.body1(),
            _ => return Err(JointError::UngroundedGearJoint(handle)),
        };

        if dynamic_body != body {
            return Err(JointError::GearBodyMismatch {
                joint: handle,
                body,
            });
        }

        Ok(())
    }
}

impl JointDef for GearJointDef {
    fn joint_type(&self) -> JointType {
        JointType::Gear
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
