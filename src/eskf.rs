//! Error‑State Kalman Filter.
//!
//! Only the prediction half lives here. The correction step is run by a
//! separate stage which writes [`Eskf::state`] and [`Eskf::cov`] directly,
//! so callers must not interleave it with a running prediction.

use core::ops::{Deref, DerefMut};

use nalgebra::{DefaultAllocator, OMatrix, allocator::Allocator};
use num_traits::{One, Zero};

mod covariance;
pub mod state;
pub use covariance::Covariance;

use state::KFState;

pub struct Eskf<S>
where
    S: KFState,
    DefaultAllocator: Allocator<S::Dim, S::Dim>,
{
    /// The nominal (mean) state.
    pub state: S,
    /// The covariance of the error state, in tangent-space order.
    pub cov: Covariance<S>,
}

/// Advances a filter by `dt` under the input `U`.
///
/// `dt` must not be negative, a zero `dt` leaves the mean untouched.
pub trait StatePredictor<U> {
    type Element;
    type ProcessNoise;

    fn predict(&mut self, input: &U, dt: Self::Element, process_noise: &Self::ProcessNoise);
}

impl<S> Eskf<S>
where
    S: KFState<Element: Zero + One>,
    DefaultAllocator: Allocator<S::Dim, S::Dim>,
{
    /// A filter with unit variance on every error-state component.
    pub fn new(state: S) -> Self {
        Self::new_with_cov(state, Covariance(OMatrix::identity()))
    }
}

impl<S> Eskf<S>
where
    S: KFState,
    DefaultAllocator: Allocator<S::Dim, S::Dim>,
{
    pub const fn new_with_cov(state: S, cov: Covariance<S>) -> Self {
        Self { state, cov }
    }
}

impl<S> Default for Eskf<S>
where
    S: KFState<Element: Zero + One> + Default,
    DefaultAllocator: Allocator<S::Dim, S::Dim>,
{
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S> Clone for Eskf<S>
where
    S: KFState + Clone,
    DefaultAllocator: Allocator<S::Dim, S::Dim>,
{
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            cov: self.cov.clone(),
        }
    }
}

impl<S> Deref for Eskf<S>
where
    S: KFState,
    DefaultAllocator: Allocator<S::Dim, S::Dim>,
{
    type Target = S;

    fn deref(&self) -> &Self::Target {
        &self.state
    }
}

impl<S> DerefMut for Eskf<S>
where
    S: KFState,
    DefaultAllocator: Allocator<S::Dim, S::Dim>,
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.state
    }
}
