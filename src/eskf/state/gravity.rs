//! A vector of fixed norm living on the 2-sphere.
//!
//! The error state is 2-dimensional: a perturbation `δ` moves the vector
//! along its tangent plane, `v ⊞ δ = Exp(B(v)·δ) · v`, where `B(v)` is an
//! orthonormal basis of that plane.

use nalgebra::{Matrix3x2, RealField, Rotation3, Scalar, Vector2, Vector3};

#[derive(Debug, Clone, PartialEq)]
pub struct S2<T: Scalar> {
    vec: Vector3<T>,
}

/// Standard gravity, in m/s².
pub const STANDARD_GRAVITY: f64 = 9.81;

impl<T: Scalar> S2<T> {
    /// The norm of `vec` is kept by every later perturbation.
    pub const fn new(vec: Vector3<T>) -> Self {
        Self { vec }
    }

    #[inline]
    pub const fn vec(&self) -> &Vector3<T> {
        &self.vec
    }
}

impl<T: RealField> S2<T> {
    /// An orthonormal basis `[b1 b2]` of the plane tangent to the sphere at
    /// this vector, with `b1 × b2` along the vector.
    pub fn tangent_basis(&self) -> Matrix3x2<T> {
        let direction = self.vec.normalize();
        // any axis not (nearly) parallel to `direction`
        let helper = if direction.x.clone().abs() < nalgebra::convert::<f64, T>(0.9) {
            Vector3::x()
        } else {
            Vector3::y()
        };
        let b1 = direction.cross(&helper).normalize();
        let b2 = direction.cross(&b1);
        Matrix3x2::from_columns(&[b1, b2])
    }

    pub fn boxplus(&mut self, delta: &Vector2<T>) {
        let rotation = Rotation3::new(self.tangent_basis() * delta);
        self.vec = rotation * &self.vec;
    }

    /// `∂(v ⊞ δ)/∂δ` at `δ = 0`, which is `-[v]ₓ · B(v)`.
    pub fn boxplus_jacobian(&self) -> Matrix3x2<T> {
        -self.vec.cross_matrix() * self.tangent_basis()
    }
}

impl<T: RealField> Default for S2<T> {
    /// Gravity of standard magnitude pointing down the `z` axis.
    fn default() -> Self {
        Self::new(Vector3::new(
            T::zero(),
            T::zero(),
            -nalgebra::convert::<f64, T>(STANDARD_GRAVITY),
        ))
    }
}
