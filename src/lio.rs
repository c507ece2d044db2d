//! IMU propagation and scan deskewing for LiDAR-inertial odometry.

pub mod config;
pub mod deskew;
pub mod init;
pub mod measurement;
pub mod predict;
pub mod propagate;
pub mod state;

use nalgebra::RealField;
use tracing::{debug, trace};

use crate::eskf::{Eskf, state::common::PositionState};
pub use config::{Config, ConfigError, InitCovConfig, ProcessNoiseConfig};
pub use deskew::EndPose;
pub use init::{ImuInit, InitSettings};
pub use measurement::{ImuMeasured, Scan, ScanPoint, StampedImu, SyncPackage};
pub use predict::ProcessNoise;
pub use propagate::{PoseCache, PoseSample, Propagator};
pub use state::State;

/// Seeds the estimator from a still start, then propagates it through every
/// [`SyncPackage`] and deskews the package's scan.
///
/// # Input
/// ```text
/// ├── still ──┤├──────── package ────────┤├──────── package ────────┤
///  IMU ┴ ┴ ┴ ┴ ┴ ┴ ┴ ┴ ┴ ┴ ┴ ┴ ┴ ┴ ┴ ┴ ┴ ┴ ┴ ┴ ┴ ┴ ┴ ┴ ┴ ┴ ┴ ┴ ┴
///                │                   │  │                        │
///                ├─────── scan ──────┤  ├───────── scan ─────────┤
///              start                end                         end
/// ```
/// The estimator is borrowed for the duration of each call only, so a
/// correction step can run on it between two packages.
#[derive(Debug, Clone)]
pub struct ImuProcessor<T: RealField> {
    imu_init_num: usize,
    settings: InitSettings<T>,
    process_noise: ProcessNoise<T>,
    stage: Stage<T>,
}

#[derive(Debug, Clone)]
enum Stage<T: RealField> {
    Initializing(ImuInit<T>),
    Propagating(Propagator<T>),
}

impl<T: RealField> ImuProcessor<T> {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            imu_init_num: config.imu_init_num,
            settings: InitSettings::from_config(config),
            process_noise: (&config.process_noise).into(),
            stage: Stage::Initializing(Default::default()),
        })
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        matches!(self.stage, Stage::Propagating(_))
    }

    /// Accumulates `imus` until enough have been seen, then seeds `eskf`.
    ///
    /// Returns whether the estimator is seeded. Once it is, later calls
    /// return `true` and touch nothing.
    pub fn initialize(&mut self, eskf: &mut Eskf<State<T>>, imus: &[StampedImu<T>]) -> bool {
        let init = match &mut self.stage {
            Stage::Propagating(_) => return true,
            Stage::Initializing(init) => init,
        };

        init.extend(imus.iter().cloned());
        if init.count() < self.imu_init_num {
            trace!(
                samples = init.count(),
                needed = self.imu_init_num,
                "waiting for initialization"
            );
            return false;
        }

        match init.seed(eskf, &self.settings) {
            Some(propagator) => {
                self.stage = Stage::Propagating(propagator);
                true
            }
            None => false,
        }
    }

    /// Runs one package: initialization while it is pending, otherwise
    /// propagation through the package followed by deskewing its scan.
    ///
    /// The package that completes initialization is processed as well.
    /// Returns whether the scan was deskewed.
    pub fn process(&mut self, eskf: &mut Eskf<State<T>>, package: &mut SyncPackage<T>) -> bool {
        if !self.initialize(eskf, &package.imus) {
            return false;
        }
        let Stage::Propagating(propagator) = &mut self.stage else {
            return false;
        };

        let SyncPackage { imus, scan } = package;
        scan.sort_by_offset();
        propagator.propagate(
            eskf,
            imus,
            scan.start_time.clone(),
            scan.end_time.clone(),
            &self.process_noise,
        );

        let end_pose = EndPose::capture(&eskf.state);
        let moved = propagator.pose_cache().deskew(&end_pose, &mut scan.points);

        debug!(
            points = scan.points.len(),
            moved,
            scan_end = %scan.end_time,
            position_variance = %eskf.cov.sub_covariance::<PositionState<T>>().trace(),
            "deskewed scan"
        );
        true
    }

    /// The trajectory of the last processed package.
    #[inline]
    pub fn pose_cache(&self) -> Option<&PoseCache<T>> {
        match &self.stage {
            Stage::Initializing(_) => None,
            Stage::Propagating(propagator) => Some(propagator.pose_cache()),
        }
    }
}
