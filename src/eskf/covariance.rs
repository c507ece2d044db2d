use crate::eskf::state::{KFState, SubStateOf};
use std::{
    fmt,
    ops::{Deref, DerefMut},
};

use nalgebra::{
    CStride, DefaultAllocator, DimName, MatrixView, MatrixViewMut, OMatrix, RStride,
    allocator::Allocator,
};
use num_traits::{One, Zero};

type OwnedSquareMatrix<T, D> = OMatrix<T, D, D>;
type SquareMatrixViewMut<'a, T, R, C, DS> =
    MatrixViewMut<'a, T, R, C, RStride<T, DS, DS>, CStride<T, DS, DS>>;
type SquareMatrixView<'a, T, R, C, DS> =
    MatrixView<'a, T, R, C, RStride<T, DS, DS>, CStride<T, DS, DS>>;

/// Covariance of the error state of `S`, addressed by sub-state.
///
/// # Overview
/// ```text
///     ├──────────  S  ─────────┤
///      ├──x──┤ ├──y──┤ ├──z──┤
/// ┬   ╭────────────────────────╮
/// │ ┬ │                        │
/// │ x │   xx      xy      xz   │
/// │ ┴ │                        │
///   ┬ │                        │
/// S y │   yx      yy      yz   │
///   ┴ │                        │
/// │ ┬ │                        │
/// │ z │   zx      zy      zz   │
/// │ ┴ │                        │
/// ┴   ╰────────────────────────╯
/// ```
/// `sensitivity::<y, x>()` is the `xy` block: rows of `x`, columns of `y`.
pub struct Covariance<S>(pub OwnedSquareMatrix<S::Element, S::Dim>)
where
    S: KFState,
    DefaultAllocator: Allocator<S::Dim, S::Dim>;

impl<S> Deref for Covariance<S>
where
    S: KFState,
    DefaultAllocator: Allocator<S::Dim, S::Dim>,
{
    type Target = OwnedSquareMatrix<S::Element, S::Dim>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> DerefMut for Covariance<S>
where
    S: KFState,
    DefaultAllocator: Allocator<S::Dim, S::Dim>,
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<S> Clone for Covariance<S>
where
    S: KFState,
    DefaultAllocator: Allocator<S::Dim, S::Dim>,
{
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<S> fmt::Debug for Covariance<S>
where
    S: KFState,
    DefaultAllocator: Allocator<S::Dim, S::Dim>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Covariance").field(&self.0).finish()
    }
}

impl<S> Covariance<S>
where
    S: KFState,
    DefaultAllocator: Allocator<S::Dim, S::Dim>,
{
    /// The block mapping an error in `Src` to an error in `Dst`.
    #[inline]
    pub fn sensitivity_mut<Src, Dst>(
        &mut self,
    ) -> SquareMatrixViewMut<'_, S::Element, Dst::Dim, Src::Dim, S::Dim>
    where
        Src: SubStateOf<S> + ?Sized,
        Dst: SubStateOf<S> + ?Sized,
    {
        self.generic_view_mut(
            (Dst::Offset::dim(), Src::Offset::dim()),
            (Dst::Dim::name(), Src::Dim::name()),
        )
    }

    #[inline]
    pub fn sensitivity<Src, Dst>(
        &self,
    ) -> SquareMatrixView<'_, S::Element, Dst::Dim, Src::Dim, S::Dim>
    where
        Src: SubStateOf<S> + ?Sized,
        Dst: SubStateOf<S> + ?Sized,
    {
        self.generic_view(
            (Dst::Offset::dim(), Src::Offset::dim()),
            (Dst::Dim::name(), Src::Dim::name()),
        )
    }

    #[inline]
    pub fn sub_covariance<Sub>(
        &self,
    ) -> SquareMatrixView<'_, S::Element, Sub::Dim, Sub::Dim, S::Dim>
    where
        Sub: SubStateOf<S> + ?Sized,
    {
        self.sensitivity::<Sub, Sub>()
    }

    #[inline]
    pub fn sub_covariance_mut<Sub>(
        &mut self,
    ) -> SquareMatrixViewMut<'_, S::Element, Sub::Dim, Sub::Dim, S::Dim>
    where
        Sub: SubStateOf<S> + ?Sized,
    {
        self.sensitivity_mut::<Sub, Sub>()
    }
}

impl<S> Covariance<S>
where
    S: KFState<Element: Zero + One>,
    DefaultAllocator: Allocator<S::Dim, S::Dim>,
{
    #[inline]
    pub fn identity() -> Self {
        Self(OMatrix::identity())
    }

    /// Replaces the `Sub` block with `variance * I`.
    pub fn set_sub_variance<Sub>(&mut self, variance: S::Element)
    where
        Sub: SubStateOf<S> + ?Sized,
    {
        let mut block = self.sub_covariance_mut::<Sub>();
        block.fill(S::Element::zero());
        block.fill_diagonal(variance);
    }
}

impl<S> Default for Covariance<S>
where
    S: KFState<Element: Zero>,
    DefaultAllocator: Allocator<S::Dim, S::Dim>,
{
    #[inline]
    fn default() -> Self {
        Self(OMatrix::zeros())
    }
}
