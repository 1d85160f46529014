//! Miscellaneous utilities.

use crate::math::{Matrix3, Real, Rotation, Vector, Vector3};

const INV_EPSILON: Real = 1.0e-20;

/// The inverse of `val`, or zero if `val` is too close to zero.
pub(crate) fn inv(val: Real) -> Real {
    if (-INV_EPSILON..=INV_EPSILON).contains(&val) {
        0.0
    } else {
        1.0 / val
    }
}

/// A rotation matrix for the given unbounded angle.
#[inline]
pub(crate) fn rotation(angle: Real) -> Rotation<Real> {
    Rotation::new(angle)
}

/// Generalized cross product for 2D vectors and scalars.
pub(crate) trait WCross<Rhs>: Sized {
    type Result;
    fn gcross(&self, rhs: Rhs) -> Self::Result;
}

impl WCross<Vector<Real>> for Vector<Real> {
    type Result = Real;

    #[inline]
    fn gcross(&self, rhs: Vector<Real>) -> Self::Result {
        self.x * rhs.y - self.y * rhs.x
    }
}

impl WCross<Vector<Real>> for Real {
    type Result = Vector<Real>;

    #[inline]
    fn gcross(&self, rhs: Vector<Real>) -> Self::Result {
        Vector::new(-rhs.y * *self, rhs.x * *self)
    }
}

/// Linear solves on effective-mass matrices.
///
/// Both solves return zero when the system is singular instead of producing
/// non-finite impulses.
pub(crate) trait WSolve {
    /// Solves the system made of the upper-left 2x2 block of `self`.
    fn solve22(&self, rhs: Vector<Real>) -> Vector<Real>;
    /// Solves the full 3x3 system.
    fn solve33(&self, rhs: Vector3<Real>) -> Vector3<Real>;
}

impl WSolve for Matrix3<Real> {
    #[inline]
    fn solve22(&self, rhs: Vector<Real>) -> Vector<Real> {
        let (a11, a12, a21, a22) = (self.m11, self.m12, self.m21, self.m22);
        let mut det = a11 * a22 - a12 * a21;
        if det != 0.0 {
            det = 1.0 / det;
        }
        Vector::new(
            det * (a22 * rhs.x - a12 * rhs.y),
            det * (a11 * rhs.y - a21 * rhs.x),
        )
    }

    #[inline]
    fn solve33(&self, rhs: Vector3<Real>) -> Vector3<Real> {
        let ex = self.column(0).into_owned();
        let ey = self.column(1).into_owned();
        let ez = self.column(2).into_owned();
        let mut det = ex.dot(&ey.cross(&ez));
        if det != 0.0 {
            det = 1.0 / det;
        }
        Vector3::new(
            det * rhs.dot(&ey.cross(&ez)),
            det * ex.dot(&rhs.cross(&ez)),
            det * ex.dot(&ey.cross(&rhs)),
        )
    }
}
