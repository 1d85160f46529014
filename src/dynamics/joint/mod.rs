pub use self::gear_joint::GearJointDef;
pub use self::joint::{Joint, JointBase, JointConstraint, JointDef, JointType};
pub use self::joint_error::JointError;
pub use self::joint_set::{JointHandle, JointSet};
pub use self::revolute_joint::{
    LimitState, RevoluteConstraintState, RevoluteJoint, RevoluteJointDef, RevoluteLimits,
    RevoluteMotor, RevoluteSolverCache,
};

mod gear_joint;
mod joint;
mod joint_error;
mod joint_set;
mod revolute_joint;
