pub(crate) mod marker;

use std::{
    fmt,
    marker::PhantomData,
    ops::{AddAssign, Deref, DerefMut},
};

use nalgebra::{
    ClosedAddAssign, RealField, Rotation3, Scalar, Storage, U2, U3, Vector, Vector3,
};

use super::{KFState, gravity::S2};

/// A nominal value tagged with the role `M` it plays in a filter state.
///
/// The marker keeps e.g. velocity and position apart at the type level, so
/// each one can be addressed as its own sub-state.
pub struct MarkedState<S, M>(pub S, PhantomData<M>);

impl<S, M> MarkedState<S, M> {
    pub const fn new(inner: S) -> Self {
        Self(inner, PhantomData)
    }
}

impl<S: Default, M> Default for MarkedState<S, M> {
    fn default() -> Self {
        Self(S::default(), PhantomData)
    }
}

impl<S: Clone, M> Clone for MarkedState<S, M> {
    fn clone(&self) -> Self {
        Self(self.0.clone(), PhantomData)
    }
}

impl<S: fmt::Debug, M> fmt::Debug for MarkedState<S, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<S, M> Deref for MarkedState<S, M> {
    type Target = S;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S, M> DerefMut for MarkedState<S, M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

pub type Vector3State<T, M> = MarkedState<Vector3<T>, M>;
pub type Rotation3State<T, M> = MarkedState<Rotation3<T>, M>;
pub type S2State<T, M> = MarkedState<S2<T>, M>;

pub type RotationState<T> = Rotation3State<T, marker::Rotation>;
pub type PositionState<T> = Vector3State<T, marker::Position>;
pub type ExtrinsicRotationState<T> = Rotation3State<T, marker::ExtrinsicRotation>;
pub type ExtrinsicPositionState<T> = Vector3State<T, marker::ExtrinsicPosition>;
pub type VelocityState<T> = Vector3State<T, marker::Velocity>;
pub type GyroBiasState<T> = Vector3State<T, marker::GyroBias>;
pub type AccelBiasState<T> = Vector3State<T, marker::AccelBias>;
pub type GravityState<T> = S2State<T, marker::Gravity>;

impl<T: Scalar, M> KFState for Vector3State<T, M> {
    type Element = T;
    type Dim = U3;
}

impl<T, S, M> AddAssign<Vector<T, U3, S>> for Vector3State<T, M>
where
    T: Scalar + ClosedAddAssign,
    S: Storage<T, U3>,
{
    fn add_assign(&mut self, rhs: Vector<T, U3, S>) {
        self.0 += rhs;
    }
}

impl<T: Scalar, M> KFState for Rotation3State<T, M> {
    type Element = T;
    type Dim = U3;
}

/// Right perturbation: `R ⊞ δ = R · Exp(δ)`.
impl<T, S, M> AddAssign<Vector<T, U3, S>> for Rotation3State<T, M>
where
    T: RealField,
    S: Storage<T, U3>,
{
    fn add_assign(&mut self, rhs: Vector<T, U3, S>) {
        self.0 *= Rotation3::new(rhs.into_owned());
        self.0.renormalize();
    }
}

impl<T: Scalar, M> KFState for S2State<T, M> {
    type Element = T;
    type Dim = U2;
}

impl<T, S, M> AddAssign<Vector<T, U2, S>> for S2State<T, M>
where
    T: RealField,
    S: Storage<T, U2>,
{
    fn add_assign(&mut self, rhs: Vector<T, U2, S>) {
        self.0.boxplus(&rhs.into_owned());
    }
}
