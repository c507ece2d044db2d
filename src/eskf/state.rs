use nalgebra::{DimName, DimNameSum, Scalar};

pub mod common;
pub mod gravity;

pub trait KFState {
    type Element: Scalar;
    /// Dimension of the error state (tangent space), not of the nominal value.
    type Dim: DimName;
}

pub type StateDim<S> = <S as KFState>::Dim;

/// # Overview
/// ```text
/// ├────┬─ Superstate ─┬────┤
///      ├── Substate ──┤
///      │              │
///      Offset         EndOffset
/// ├────╯              │
/// ├───────────────────╯
/// ```
pub trait SubStateOf<Super: KFState>: KFState {
    type Offset: DimName;
}

/// The `Offset` of the `SubState` in the `Super`.
/// See also [`SubStateOf`].
pub type SubStateOffset<S, Super> = <S as SubStateOf<Super>>::Offset;

/// The `Offset` of the end of the `SubState` in the `Super`.
/// See also [`SubStateOf`].
pub type SubStateEndOffset<S, Super> = DimNameSum<<S as SubStateOf<Super>>::Offset, StateDim<S>>;

/// Lays out the sub-states of a composite [`KFState`].
///
/// Implements [`KFState`] for the struct, [`SubStateOf`] for every field type,
/// and `AddAssign` of an error-state vector, which retracts each field by its
/// own slice of the vector.
///
/// # Example
/// ```ignore
/// sub_states! {
///     State<T>: U6 {
///         rotation: RotationState<T> => U0,
///         position: PositionState<T> => U3,
///     }
/// }
/// ```
macro_rules! sub_states {
    (
        $state:ident<$t:ident>: $dim:ty {
            $($field:ident: $sub:ty => $offset:ty),+ $(,)?
        }
    ) => {
        impl<$t: nalgebra::Scalar> $crate::eskf::state::KFState for $state<$t> {
            type Element = $t;
            type Dim = $dim;
        }

        $(
            impl<$t: nalgebra::Scalar> $crate::eskf::state::SubStateOf<$state<$t>> for $sub {
                type Offset = $offset;
            }
        )+

        impl<$t, Rhs> core::ops::AddAssign<nalgebra::Vector<$t, $dim, Rhs>> for $state<$t>
        where
            $t: nalgebra::RealField,
            Rhs: nalgebra::Storage<$t, $dim>,
        {
            fn add_assign(&mut self, rhs: nalgebra::Vector<$t, $dim, Rhs>) {
                use nalgebra::DimName;
                $(
                    self.$field += rhs.rows_generic(
                        <$offset as DimName>::dim(),
                        <$sub as $crate::eskf::state::KFState>::Dim::name(),
                    );
                )+
            }
        }
    };
}

pub(crate) use sub_states;
