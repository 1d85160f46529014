//! # pivot2d
//!
//! `pivot2d` is the joint-constraint core of a 2D rigid-body physics engine. It turns joint
//! definitions into corrective impulses (velocity solver) and positional fix-ups (position
//! solver) using a sequential-impulse method with warm-starting.
//!
//! The main entry points are:
//! - [`RevoluteJoint`](crate::dynamics::RevoluteJoint) and its definition
//!   [`RevoluteJointDef`](crate::dynamics::RevoluteJointDef).
//! - The [`JointConstraint`](crate::dynamics::JointConstraint) lifecycle driven once per step with
//!   a [`SolverData`](crate::dynamics::solver::SolverData).
//! - The [`ScratchPool`](crate::data::ScratchPool) used by stepping contexts to stay
//!   allocation-free once warmed up.

#![deny(bare_trait_objects)]
#![warn(missing_docs)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::module_inception)]

pub extern crate nalgebra as na;
#[cfg(feature = "serde-serialize")]
#[macro_use]
extern crate serde;

/// The string version of pivot2d.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod data;
pub mod dynamics;
pub mod utils;

/// Elementary mathematical entities (vectors, matrices, isometries, etc).
pub mod math {
    /// The scalar type used throughout this crate.
    #[cfg(not(feature = "f64"))]
    pub type Real = f32;
    /// The scalar type used throughout this crate.
    #[cfg(feature = "f64")]
    pub type Real = f64;

    /// The point type.
    pub type Point<N> = na::Point2<N>;
    /// The vector type.
    pub type Vector<N> = na::Vector2<N>;
    /// The 3-components vector type, used for the coupled point + angle impulse.
    pub type Vector3<N> = na::Vector3<N>;
    /// The angular vector type. In 2D this is a plain scalar.
    pub type AngVector<N> = N;
    /// The rotation type.
    pub type Rotation<N> = na::UnitComplex<N>;
    /// The transformation matrix type.
    pub type Isometry<N> = na::Isometry2<N>;
    /// The translation type.
    pub type Translation<N> = na::Translation2<N>;
    /// The 2x2 matrix type.
    pub type Matrix2<N> = na::Matrix2<N>;
    /// The 3x3 matrix type.
    pub type Matrix3<N> = na::Matrix3<N>;
}

/// Prelude containing the common types defined by pivot2d.
pub mod prelude {
    pub use crate::data::*;
    pub use crate::dynamics::solver::*;
    pub use crate::dynamics::*;
    pub use crate::math::*;
    pub use na::{point, vector};
    pub extern crate nalgebra;
}
