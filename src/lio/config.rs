use nalgebra::{IsometryMatrix3, Matrix3, RealField, Rotation3, Translation3, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    eskf::state::gravity::STANDARD_GRAVITY,
    frame::{Framed, IsometryFramed, frames},
};

/// Static configuration of the IMU processor.
///
/// Field names follow the usual LIO parameter files, so a `common`/`imu`
/// section of one can be deserialized straight into this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Samples to accumulate before the state is seeded.
    pub imu_init_num: usize,

    /// Tilt the initial attitude so the mean specific force points up.
    pub gravity_align: bool,

    /// Gravity magnitude used when `gravity_align` is set.
    pub gravity: f64,

    /// LiDAR to IMU rotation, row-major.
    #[serde(rename = "r_il")]
    pub extrinsic_rotation: [f64; 9],

    /// LiDAR to IMU translation.
    #[serde(rename = "p_il")]
    pub extrinsic_translation: [f64; 3],

    #[serde(flatten)]
    pub process_noise: ProcessNoiseConfig,

    pub init_cov: InitCovConfig,
}

/// Variances of the IMU noise, per axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessNoiseConfig {
    #[serde(rename = "ng")]
    pub gyro: f64,
    #[serde(rename = "na")]
    pub accel: f64,
    #[serde(rename = "nbg")]
    pub gyro_bias: f64,
    #[serde(rename = "nba")]
    pub accel_bias: f64,
}

/// Initial variances of the blocks seeded from calibration or from the
/// stationary phase. Every other block starts at unit variance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitCovConfig {
    pub extrinsic_rotation: f64,
    pub extrinsic_translation: f64,
    pub gyro_bias: f64,
    pub accel_bias: f64,
    pub gravity: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("imu_init_num must be at least 1")]
    NoInitSamples,

    #[error("{name} must be a finite non-negative variance, got {value}")]
    InvalidVariance { name: &'static str, value: f64 },

    #[error("gravity magnitude must be finite and positive, got {0}")]
    InvalidGravity(f64),

    #[error("r_il is not a rotation matrix (error {0:e})")]
    NonOrthonormalRotation(f64),

    #[error("p_il must be finite")]
    NonFiniteTranslation,
}

/// Tolerance on `‖RᵀR − I‖` and `|det R − 1|` for the extrinsic rotation.
const ROTATION_TOLERANCE: f64 = 1e-6;

impl Default for Config {
    fn default() -> Self {
        Self {
            imu_init_num: 20,
            gravity_align: true,
            gravity: STANDARD_GRAVITY,
            extrinsic_rotation: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
            extrinsic_translation: [0.0; 3],
            process_noise: Default::default(),
            init_cov: Default::default(),
        }
    }
}

impl Default for ProcessNoiseConfig {
    fn default() -> Self {
        Self {
            gyro: 0.01,
            accel: 0.01,
            gyro_bias: 0.0001,
            accel_bias: 0.0001,
        }
    }
}

impl Default for InitCovConfig {
    fn default() -> Self {
        Self {
            extrinsic_rotation: 0.00001,
            extrinsic_translation: 0.00001,
            gyro_bias: 0.0001,
            accel_bias: 0.0001,
            gravity: 0.00001,
        }
    }
}

impl Config {
    /// Livox Mid-360: the IMU sits a few centimetres off the LiDAR origin.
    #[inline]
    pub fn with_mid360_extrinsics(self) -> Self {
        Self {
            extrinsic_translation: [-0.011, -0.02329, 0.04412],
            ..self
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.imu_init_num == 0 {
            return Err(ConfigError::NoInitSamples);
        }

        if !self.gravity.is_finite() || self.gravity <= 0.0 {
            return Err(ConfigError::InvalidGravity(self.gravity));
        }

        let ProcessNoiseConfig {
            gyro,
            accel,
            gyro_bias,
            accel_bias,
        } = &self.process_noise;
        let InitCovConfig {
            extrinsic_rotation,
            extrinsic_translation,
            gyro_bias: init_gyro_bias,
            accel_bias: init_accel_bias,
            gravity,
        } = &self.init_cov;

        [
            ("ng", gyro),
            ("na", accel),
            ("nbg", gyro_bias),
            ("nba", accel_bias),
            ("init_cov.extrinsic_rotation", extrinsic_rotation),
            ("init_cov.extrinsic_translation", extrinsic_translation),
            ("init_cov.gyro_bias", init_gyro_bias),
            ("init_cov.accel_bias", init_accel_bias),
            ("init_cov.gravity", gravity),
        ]
        .into_iter()
        .try_for_each(|(name, &value)| {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(ConfigError::InvalidVariance { name, value })
            }
        })?;

        let rotation = Matrix3::from_row_slice(&self.extrinsic_rotation);
        let orthogonality = (rotation.transpose() * rotation - Matrix3::identity()).norm();
        let handedness = (rotation.determinant() - 1.0).abs();
        let error = orthogonality.max(handedness);
        if error.is_nan() || error > ROTATION_TOLERANCE {
            return Err(ConfigError::NonOrthonormalRotation(error));
        }

        if self.extrinsic_translation.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::NonFiniteTranslation);
        }

        Ok(())
    }

    /// The LiDAR to IMU transform. Assumes [`validate`](Self::validate) passed.
    pub fn extrinsics<T: RealField>(&self) -> IsometryFramed<T, fn(frames::Lidar) -> frames::Imu> {
        let rotation = Rotation3::from_matrix_unchecked(
            Matrix3::from_row_slice(&self.extrinsic_rotation).cast::<T>(),
        );
        let translation = Translation3::from(Vector3::from(self.extrinsic_translation).cast::<T>());
        Framed::new(IsometryMatrix3::from_parts(translation, rotation))
    }
}
