use std::ops::Deref;

use super::{State, config::ProcessNoiseConfig, measurement::ImuMeasured};
use crate::eskf::{
    Covariance, Eskf, StatePredictor,
    state::{SubStateOffset, common::*},
};

use nalgebra::{DimName, OMatrix, RealField, Rotation3, U12, U23};

/// Covariance of the IMU noise vector `[n_g, n_a, n_bg, n_ba]`.
#[derive(Debug, Clone)]
pub struct ProcessNoise<T: RealField>(pub OMatrix<T, U12, U12>);

impl<T: RealField> ProcessNoise<T> {
    pub const GYRO: usize = 0;
    pub const ACCEL: usize = 3;
    pub const GYRO_BIAS: usize = 6;
    pub const ACCEL_BIAS: usize = 9;

    pub fn new(gyro: T, accel: T, gyro_bias: T, accel_bias: T) -> Self {
        let mut cov = OMatrix::<T, U12, U12>::zeros();
        cov.fixed_view_mut::<3, 3>(Self::GYRO, Self::GYRO)
            .fill_diagonal(gyro);
        cov.fixed_view_mut::<3, 3>(Self::ACCEL, Self::ACCEL)
            .fill_diagonal(accel);
        cov.fixed_view_mut::<3, 3>(Self::GYRO_BIAS, Self::GYRO_BIAS)
            .fill_diagonal(gyro_bias);
        cov.fixed_view_mut::<3, 3>(Self::ACCEL_BIAS, Self::ACCEL_BIAS)
            .fill_diagonal(accel_bias);
        Self(cov)
    }

    #[inline]
    pub fn zeros() -> Self {
        Self(OMatrix::<T, U12, U12>::zeros())
    }
}

impl<T: RealField> Deref for ProcessNoise<T> {
    type Target = OMatrix<T, U12, U12>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: RealField> From<&ProcessNoiseConfig> for ProcessNoise<T> {
    fn from(value: &ProcessNoiseConfig) -> Self {
        Self::new(
            nalgebra::convert(value.gyro),
            nalgebra::convert(value.accel),
            nalgebra::convert(value.gyro_bias),
            nalgebra::convert(value.accel_bias),
        )
    }
}

impl<T> State<T>
where
    T: RealField,
{
    /// Integrates the mean over `dt`, every term evaluated at the state
    /// before the step.
    pub fn predict(&mut self, input: &ImuMeasured<T>, dt: T) {
        let angular = self.unbiased_angular(input);
        let acceleration = self.world_acceleration(input);

        self.position += self.velocity.deref() * dt.clone();
        self.velocity += acceleration * dt.clone();
        self.rotation += angular * dt;
    }
}

impl<T> Eskf<State<T>>
where
    T: RealField,
{
    /// `P = Fx·P·Fxᵀ + Fw·Q·Fwᵀ`, linearized at the state before the step.
    pub fn predict_cov(&mut self, input: &ImuMeasured<T>, dt: T, process_noise: &ProcessNoise<T>) {
        let state = &self.state;
        let rotation = state.rotation.matrix();
        let angular = state.unbiased_angular(input);
        let linear = &input.linear - state.accel_bias.deref();

        let mut fx = Covariance::<State<T>>::identity();

        fx.sub_covariance_mut::<RotationState<T>>()
            .copy_from(Rotation3::new(angular * -dt.clone()).matrix());

        fx.sensitivity_mut::<GyroBiasState<T>, RotationState<T>>()
            .fill_diagonal(-dt.clone());

        fx.sensitivity_mut::<VelocityState<T>, PositionState<T>>()
            .fill_diagonal(dt.clone());

        fx.sensitivity_mut::<RotationState<T>, VelocityState<T>>()
            .copy_from(&(rotation * linear.cross_matrix() * -dt.clone()));

        fx.sensitivity_mut::<AccelBiasState<T>, VelocityState<T>>()
            .copy_from(&(rotation * -dt.clone()));

        fx.sensitivity_mut::<GravityState<T>, VelocityState<T>>()
            .copy_from(&(state.gravity.boxplus_jacobian() * dt.clone()));

        let mut fw = OMatrix::<T, U23, U12>::zeros();

        fw.fixed_view_mut::<3, 3>(
            SubStateOffset::<RotationState<T>, State<T>>::dim(),
            ProcessNoise::<T>::GYRO,
        )
        .fill_diagonal(-dt.clone());

        fw.fixed_view_mut::<3, 3>(
            SubStateOffset::<VelocityState<T>, State<T>>::dim(),
            ProcessNoise::<T>::ACCEL,
        )
        .copy_from(&(rotation * -dt.clone()));

        fw.fixed_view_mut::<3, 3>(
            SubStateOffset::<GyroBiasState<T>, State<T>>::dim(),
            ProcessNoise::<T>::GYRO_BIAS,
        )
        .fill_diagonal(dt.clone());

        fw.fixed_view_mut::<3, 3>(
            SubStateOffset::<AccelBiasState<T>, State<T>>::dim(),
            ProcessNoise::<T>::ACCEL_BIAS,
        )
        .fill_diagonal(dt);

        let mut cov = OMatrix::<T, U23, U23>::zeros();
        cov.quadform_tr(T::one(), &fw, process_noise.deref(), T::zero());
        cov.quadform_tr(T::one(), fx.deref(), self.cov.deref(), T::one());
        *self.cov = cov;
    }
}

impl<T> StatePredictor<ImuMeasured<T>> for Eskf<State<T>>
where
    T: RealField,
{
    type Element = T;
    type ProcessNoise = ProcessNoise<T>;

    fn predict(&mut self, input: &ImuMeasured<T>, dt: T, process_noise: &ProcessNoise<T>) {
        self.predict_cov(input, dt.clone(), process_noise);
        self.state.predict(input, dt);
    }
}
