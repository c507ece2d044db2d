use nalgebra::{
    IsometryMatrix3, RealField, Rotation3, Scalar, Translation3, U0, U3, U6, U9, U12, U15, U18,
    U21, U23, Vector3,
};

use crate::{
    eskf::state::{common::*, gravity::S2, sub_states},
    frame::{Framed, IsometryFramed, frames},
};

use super::measurement::ImuMeasured;

/// The nominal state propagated between two scans.
///
/// # Error state layout
/// ```text
/// ├─ R ─┼─ p ─┼─ R_il ─┼─ p_il ─┼─ v ─┼─ b_g ─┼─ b_a ─┼─ g ─┤
/// 0     3     6        9        12    15      18      21    23
/// ```
#[derive(Debug, Clone)]
pub struct State<T: Scalar> {
    /// Attitude of the IMU in the world frame.
    pub rotation: RotationState<T>,
    pub position: PositionState<T>,

    /// LiDAR to IMU.
    pub extrinsic_rotation: ExtrinsicRotationState<T>,
    pub extrinsic_position: ExtrinsicPositionState<T>,

    pub velocity: VelocityState<T>,

    pub gyro_bias: GyroBiasState<T>,
    pub accel_bias: AccelBiasState<T>,

    pub gravity: GravityState<T>,
}

sub_states! {
    State<T>: U23 {
        rotation: RotationState<T> => U0,
        position: PositionState<T> => U3,
        extrinsic_rotation: ExtrinsicRotationState<T> => U6,
        extrinsic_position: ExtrinsicPositionState<T> => U9,
        velocity: VelocityState<T> => U12,
        gyro_bias: GyroBiasState<T> => U15,
        accel_bias: AccelBiasState<T> => U18,
        gravity: GravityState<T> => U21,
    }
}

impl<T: RealField> Default for State<T> {
    fn default() -> Self {
        Self {
            rotation: RotationState::new(Rotation3::identity()),
            position: PositionState::new(Vector3::zeros()),
            extrinsic_rotation: ExtrinsicRotationState::new(Rotation3::identity()),
            extrinsic_position: ExtrinsicPositionState::new(Vector3::zeros()),
            velocity: VelocityState::new(Vector3::zeros()),
            gyro_bias: GyroBiasState::new(Vector3::zeros()),
            accel_bias: AccelBiasState::new(Vector3::zeros()),
            gravity: GravityState::new(S2::default()),
        }
    }
}

impl<T: RealField> State<T> {
    #[inline]
    pub fn imu_to_world(&self) -> IsometryFramed<T, fn(frames::Imu) -> frames::World> {
        Framed::new(IsometryMatrix3::from_parts(
            Translation3::from(self.position.0.clone()),
            self.rotation.0.clone(),
        ))
    }

    #[inline]
    pub fn lidar_to_imu(&self) -> IsometryFramed<T, fn(frames::Lidar) -> frames::Imu> {
        Framed::new(IsometryMatrix3::from_parts(
            Translation3::from(self.extrinsic_position.0.clone()),
            self.extrinsic_rotation.0.clone(),
        ))
    }

    /// Angular velocity with the gyro bias removed, in the IMU frame.
    #[inline]
    pub fn unbiased_angular(&self, measured: &ImuMeasured<T>) -> Vector3<T> {
        &measured.angular - &*self.gyro_bias
    }

    /// Specific force with the accel bias removed, rotated into the world
    /// frame and with gravity added back: the acceleration of the IMU.
    pub fn world_acceleration(&self, measured: &ImuMeasured<T>) -> Vector3<T> {
        self.rotation.0.clone() * (&measured.linear - &*self.accel_bias) + self.gravity.vec()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::{DimName, SVector};

    use super::*;
    use crate::eskf::state::StateDim;

    type TestT = f64;

    type State = super::State<TestT>;
    type SubStateOffset<S> = crate::eskf::state::SubStateOffset<S, State>;
    type SubStateEndOffset<S> = crate::eskf::state::SubStateEndOffset<S, State>;

    #[test]
    fn test_error_state_impl() {
        assert_eq!(StateDim::<State>::dim(), 23);

        assert_eq!(SubStateOffset::<RotationState<TestT>>::dim(), 0);
        assert_eq!(SubStateEndOffset::<RotationState<TestT>>::dim(), 3);

        assert_eq!(SubStateOffset::<PositionState<TestT>>::dim(), 3);
        assert_eq!(SubStateEndOffset::<PositionState<TestT>>::dim(), 6);

        assert_eq!(SubStateOffset::<ExtrinsicRotationState<TestT>>::dim(), 6);
        assert_eq!(SubStateEndOffset::<ExtrinsicRotationState<TestT>>::dim(), 9);

        assert_eq!(SubStateOffset::<ExtrinsicPositionState<TestT>>::dim(), 9);
        assert_eq!(SubStateEndOffset::<ExtrinsicPositionState<TestT>>::dim(), 12);

        assert_eq!(SubStateOffset::<VelocityState<TestT>>::dim(), 12);
        assert_eq!(SubStateEndOffset::<VelocityState<TestT>>::dim(), 15);

        assert_eq!(SubStateOffset::<GyroBiasState<TestT>>::dim(), 15);
        assert_eq!(SubStateEndOffset::<GyroBiasState<TestT>>::dim(), 18);

        assert_eq!(SubStateOffset::<AccelBiasState<TestT>>::dim(), 18);
        assert_eq!(SubStateEndOffset::<AccelBiasState<TestT>>::dim(), 21);

        assert_eq!(SubStateOffset::<GravityState<TestT>>::dim(), 21);
        assert_eq!(SubStateEndOffset::<GravityState<TestT>>::dim(), 23);
    }

    #[test]
    fn test_retraction_touches_each_block() {
        let mut state = State::default();
        let mut delta = SVector::<TestT, 23>::zeros();
        delta[2] = 0.1; // yaw
        delta[3] = 1.0; // position x
        delta[13] = -2.0; // velocity y
        delta[15] = 0.01; // gyro bias x
        delta[20] = 0.02; // accel bias z

        state += delta;

        assert_relative_eq!(
            state.rotation.matrix(),
            Rotation3::new(Vector3::z() * 0.1).matrix(),
            epsilon = 1e-12
        );
        assert_eq!(*state.position, Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(*state.velocity, Vector3::new(0.0, -2.0, 0.0));
        assert_eq!(*state.gyro_bias, Vector3::new(0.01, 0.0, 0.0));
        assert_eq!(*state.accel_bias, Vector3::new(0.0, 0.0, 0.02));
        assert_eq!(state.gravity.vec(), S2::<TestT>::default().vec());
        assert_eq!(*state.extrinsic_position, Vector3::zeros());
    }

    #[test]
    fn test_world_acceleration_cancels_gravity_at_rest() {
        let state = State::default();
        let measured = ImuMeasured::new(0.0, 0.0, 9.81, 0.0, 0.0, 0.0);
        assert_relative_eq!(
            state.world_acceleration(&measured),
            Vector3::zeros(),
            epsilon = 1e-12
        );
    }
}
