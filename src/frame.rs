pub mod frames;
use std::{
    fmt,
    marker::PhantomData,
    ops::{Deref, DerefMut, Mul},
};

pub use frames::*;
use nalgebra::{IsometryMatrix3, RealField};

/// A value tagged with the frame it is expressed in.
///
/// Transforms are tagged `fn(From) -> To`, so only a point in `From` can be
/// multiplied by them, and only a `To` transform can be chained after them.
pub struct Framed<T, F> {
    inner: T,
    frame: PhantomData<F>,
}

impl<T: Clone, F> Clone for Framed<T, F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            frame: PhantomData,
        }
    }
}

impl<T: Default, F> Default for Framed<T, F> {
    fn default() -> Self {
        Self {
            inner: Default::default(),
            frame: PhantomData,
        }
    }
}

impl<T: fmt::Debug, F> fmt::Debug for Framed<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

impl<T, F> Framed<T, F> {
    pub const fn new(inner: T) -> Self {
        Self {
            inner,
            frame: PhantomData,
        }
    }
    pub fn new_with_frame(inner: T, frame: F) -> Self {
        let _ = frame;
        Self::new(inner)
    }
}

impl<T, F1, F2> Framed<T, fn(F1) -> F2> {
    pub fn new_transform(inner: T, from: F1, to: F2) -> Self {
        let _ = (from, to);
        Self {
            inner,
            frame: PhantomData,
        }
    }
}

impl<T: RealField, F1, F2> Framed<IsometryMatrix3<T>, fn(F1) -> F2> {
    pub fn inverse(&self) -> Framed<IsometryMatrix3<T>, fn(F2) -> F1> {
        Framed::new(self.inner.inverse())
    }
}

impl<T, F> Deref for Framed<T, F> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T, F> DerefMut for Framed<T, F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

/// `point * transform`: moves a value from `F1` into `F2`.
impl<T1, T2, F1, F2> Mul<Framed<T2, fn(F1) -> F2>> for Framed<T1, F1>
where
    T2: Mul<T1>,
{
    type Output = Framed<<T2 as Mul<T1>>::Output, F2>;
    fn mul(self, transform: Framed<T2, fn(F1) -> F2>) -> Self::Output {
        Framed {
            inner: transform.inner * self.inner,
            frame: PhantomData,
        }
    }
}

impl<'a, T1, T2, F1, F2> Mul<&'a Framed<T2, fn(F1) -> F2>> for &'a Framed<T1, F1>
where
    &'a T2: Mul<&'a T1>,
{
    type Output = Framed<<&'a T2 as Mul<&'a T1>>::Output, F2>;
    fn mul(self, transform: &'a Framed<T2, fn(F1) -> F2>) -> Self::Output {
        Framed {
            inner: transform.deref() * self.deref(),
            frame: PhantomData,
        }
    }
}

/// `first * then`: applies `first`, then `then`.
impl<'a, T1, T2, F1, F2, F3> Mul<&'a Framed<T2, fn(F2) -> F3>> for &'a Framed<T1, fn(F1) -> F2>
where
    &'a T2: Mul<&'a T1>,
{
    type Output = Framed<<&'a T2 as Mul<&'a T1>>::Output, fn(F1) -> F3>;
    fn mul(self, then: &'a Framed<T2, fn(F2) -> F3>) -> Self::Output {
        Framed {
            inner: then.deref() * self.deref(),
            frame: PhantomData,
        }
    }
}

impl<T1, T2, F1, F2, F3> Mul<Framed<T2, fn(F2) -> F3>> for Framed<T1, fn(F1) -> F2>
where
    T2: Mul<T1>,
{
    type Output = Framed<<T2 as Mul<T1>>::Output, fn(F1) -> F3>;
    fn mul(self, then: Framed<T2, fn(F2) -> F3>) -> Self::Output {
        Framed {
            inner: then.inner * self.inner,
            frame: PhantomData,
        }
    }
}
