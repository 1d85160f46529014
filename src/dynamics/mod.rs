//! Structures related to dynamics: bodies, joints, etc.

pub use self::integration_parameters::{
    IntegrationParameters, ANGULAR_SLOP, LINEAR_SLOP, MAX_ANGULAR_CORRECTION,
};
pub use self::joint::*;
pub use self::rigid_body::{LockedAxes, RigidBody, RigidBodyBuilder, RigidBodyType};
pub use self::rigid_body_set::{RigidBodyHandle, RigidBodySet};

mod integration_parameters;
mod joint;
mod rigid_body;
mod rigid_body_set;
pub mod solver;
