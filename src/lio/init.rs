use nalgebra::{RealField, Rotation3, Scalar, Vector3};
use tracing::{info, warn};

use super::{
    State,
    config::{Config, InitCovConfig},
    measurement::{ImuMeasured, StampedImu},
    propagate::Propagator,
};
use crate::{
    eskf::{
        Covariance, Eskf,
        state::{common::*, gravity::S2},
    },
    frame::{IsometryFramed, frames},
    utils::VectorSquareSum,
};

/// Total variance of the specific force, in (m/s²)², above which the
/// platform was probably moving while it was supposed to be still.
const STATIONARY_ACCEL_VARIANCE: f64 = 0.1;

/// Accumulates the stationary samples the state is seeded from.
///
/// Can be [`collect`](std::iter::Iterator::collect)ed from, or
/// [`extend`](Extend::extend)ed by, [`StampedImu`]s.
#[derive(Debug, Clone)]
pub struct ImuInit<T: Scalar> {
    linear: VectorSquareSum<T>,
    angular: VectorSquareSum<T>,
    last: Option<StampedImu<T>>,
}

/// What seeding needs besides the samples themselves.
#[derive(Debug, Clone)]
pub struct InitSettings<T: RealField> {
    pub gravity_align: bool,
    pub gravity: T,
    pub extrinsics: IsometryFramed<T, fn(frames::Lidar) -> frames::Imu>,
    pub cov: Covariance<State<T>>,
}

impl<T: RealField> Default for ImuInit<T> {
    fn default() -> Self {
        Self {
            linear: Default::default(),
            angular: Default::default(),
            last: None,
        }
    }
}

impl<T: RealField> ImuInit<T> {
    pub fn push(&mut self, imu: StampedImu<T>) {
        self.linear.push(&imu.linear);
        self.angular.push(&imu.angular);
        self.last = Some(imu);
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.linear.count()
    }

    /// Seeds biases, extrinsics, gravity, attitude and covariance of `eskf`
    /// from the accumulated samples, and hands over the propagation that
    /// continues from the last of them.
    ///
    /// Returns `None` and leaves `eskf` untouched when nothing was accumulated.
    pub fn seed(
        &self,
        eskf: &mut Eskf<State<T>>,
        settings: &InitSettings<T>,
    ) -> Option<Propagator<T>> {
        let last = self.last.clone()?;
        let (linear, linear_cov) = self.linear.mean();
        let (angular, _) = self.angular.mean();

        let spread = linear_cov.trace();
        if spread > nalgebra::convert::<f64, T>(STATIONARY_ACCEL_VARIANCE) {
            warn!(
                %spread,
                samples = self.count(),
                "specific force varied during initialization, was the platform still?"
            );
        }

        let state = &mut eskf.state;
        state.extrinsic_rotation = ExtrinsicRotationState::new(settings.extrinsics.rotation.clone());
        state.extrinsic_position =
            ExtrinsicPositionState::new(settings.extrinsics.translation.vector.clone());
        state.gyro_bias = GyroBiasState::new(angular.clone());

        if settings.gravity_align {
            let down = -Vector3::z();
            let rotation = Rotation3::rotation_between(&(-&linear).normalize(), &down)
                // upside down: any half turn about a horizontal axis
                .unwrap_or_else(|| Rotation3::from_axis_angle(&Vector3::x_axis(), T::pi()));
            state.rotation = RotationState::new(rotation);
            state.gravity = GravityState::new(S2::new(down * settings.gravity.clone()));
        } else {
            state.rotation = RotationState::new(Rotation3::identity());
            state.gravity = GravityState::new(S2::new(-&linear));
        }
        eskf.cov = settings.cov.clone();

        info!(
            samples = self.count(),
            gyro_bias = ?eskf.gyro_bias.as_slice(),
            gravity = ?eskf.gravity.vec().as_slice(),
            aligned = settings.gravity_align,
            "IMU initialized"
        );

        Some(Propagator::new(last, ImuMeasured::from_parts(linear, angular)))
    }
}

impl<T: RealField> Extend<StampedImu<T>> for ImuInit<T> {
    fn extend<I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = StampedImu<T>>,
    {
        iter.into_iter().for_each(|imu| self.push(imu));
    }
}

impl<T: RealField> FromIterator<StampedImu<T>> for ImuInit<T> {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = StampedImu<T>>,
    {
        let mut init = Self::default();
        init.extend(iter);
        init
    }
}

impl<T: RealField> InitSettings<T> {
    pub fn from_config(config: &Config) -> Self {
        Self {
            gravity_align: config.gravity_align,
            gravity: nalgebra::convert(config.gravity),
            extrinsics: config.extrinsics(),
            cov: (&config.init_cov).into(),
        }
    }
}

/// Unit variance, except for the blocks known well from calibration or
/// from the stationary phase.
impl<T: RealField> From<&InitCovConfig> for Covariance<State<T>> {
    fn from(value: &InitCovConfig) -> Self {
        let mut cov = Self::identity();
        cov.set_sub_variance::<ExtrinsicRotationState<T>>(nalgebra::convert(
            value.extrinsic_rotation,
        ));
        cov.set_sub_variance::<ExtrinsicPositionState<T>>(nalgebra::convert(
            value.extrinsic_translation,
        ));
        cov.set_sub_variance::<GyroBiasState<T>>(nalgebra::convert(value.gyro_bias));
        cov.set_sub_variance::<AccelBiasState<T>>(nalgebra::convert(value.accel_bias));
        cov.set_sub_variance::<GravityState<T>>(nalgebra::convert(value.gravity));
        cov
    }
}
