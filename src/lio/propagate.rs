use std::{iter, ops::Deref};

use itertools::Itertools;
use nalgebra::{RealField, Rotation3, Scalar, Vector3};
use tracing::{debug, warn};

use super::{
    State,
    measurement::{ImuMeasured, StampedImu},
    predict::ProcessNoise,
};
use crate::eskf::{Eskf, StatePredictor};

/// The IMU pose right after one integration step.
#[derive(Debug, Clone)]
pub struct PoseSample<T: Scalar> {
    /// Seconds since the scan started.
    pub offset: T,
    /// Acceleration in the world frame, gravity removed.
    pub acc: Vector3<T>,
    /// Unbiased angular velocity in the IMU frame.
    pub angular: Vector3<T>,
    pub velocity: Vector3<T>,
    pub position: Vector3<T>,
    pub rotation: Rotation3<T>,
}

/// The trajectory of one propagation, ascending by offset.
///
/// The first entry is the state the propagation started from, at offset zero.
#[derive(Debug, Clone)]
pub struct PoseCache<T: Scalar>(pub(super) Vec<PoseSample<T>>);

/// Drives the estimator through consecutive batches of IMU samples.
///
/// Carries the last sample of the previous batch, so every pair of
/// consecutive samples is integrated once, and the time up to which the
/// estimator has already been advanced.
#[derive(Debug, Clone)]
pub struct Propagator<T: RealField> {
    anchor: StampedImu<T>,
    last_end_time: T,
    last_input: ImuMeasured<T>,
    pose_cache: PoseCache<T>,
}

impl<T: RealField> PoseSample<T> {
    fn capture(offset: T, acc: Vector3<T>, angular: Vector3<T>, state: &State<T>) -> Self {
        Self {
            offset,
            acc,
            angular,
            velocity: state.velocity.0.clone(),
            position: state.position.0.clone(),
            rotation: state.rotation.0.clone(),
        }
    }
}

impl<T: Scalar> Default for PoseCache<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T: Scalar> Deref for PoseCache<T> {
    type Target = [PoseSample<T>];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: RealField> Propagator<T> {
    /// Continues from `anchor`, which the estimator is already at.
    ///
    /// `input` stands in for the midpoint input until the first pair of
    /// samples has been integrated.
    pub fn new(anchor: StampedImu<T>, input: ImuMeasured<T>) -> Self {
        Self {
            last_end_time: anchor.timestamp.clone(),
            anchor,
            last_input: input,
            pose_cache: Default::default(),
        }
    }

    /// Advances `eskf` through `imus` and on to `scan_end`, rebuilding the
    /// pose cache of the scan that started at `scan_start`.
    ///
    /// The trailing step always runs from the last sample of the window
    /// (`imus`, or the anchor when `imus` is empty) to `scan_end`. When that
    /// sample is older than the previous scan end, as with an empty batch,
    /// the time between them is integrated a second time.
    pub fn propagate(
        &mut self,
        eskf: &mut Eskf<State<T>>,
        imus: &[StampedImu<T>],
        scan_start: T,
        scan_end: T,
        process_noise: &ProcessNoise<T>,
    ) {
        let (acc, angular) = self
            .pose_cache
            .last()
            .map(|pose| (pose.acc.clone(), pose.angular.clone()))
            .unwrap_or_else(|| (Vector3::zeros(), Vector3::zeros()));
        self.pose_cache.0.clear();
        self.pose_cache
            .0
            .push(PoseSample::capture(T::zero(), acc, angular, &eskf.state));

        let mut skipped = 0usize;
        for (head, tail) in iter::once(&self.anchor).chain(imus).tuple_windows() {
            if tail.timestamp < self.last_end_time {
                skipped += 1;
                continue;
            }

            let input = head.measured.midpoint(&tail.measured);
            // only the part after what the last batch already covered
            let start = if head.timestamp < self.last_end_time {
                self.last_end_time.clone()
            } else {
                head.timestamp.clone()
            };
            eskf.predict(&input, tail.timestamp.clone() - start, process_noise);

            let angular = eskf.unbiased_angular(&input);
            let acc = eskf.world_acceleration(&input);
            self.pose_cache.0.push(PoseSample::capture(
                tail.timestamp.clone() - scan_start.clone(),
                acc,
                angular,
                &eskf.state,
            ));
            self.last_input = input;
        }

        let window_end = imus.last().unwrap_or(&self.anchor).timestamp.clone();
        let dt = scan_end.clone() - window_end;
        if dt < T::zero() {
            warn!(%dt, "IMU samples run past the end of the scan, not extrapolating");
        } else {
            eskf.predict(&self.last_input, dt, process_noise);
        }

        if let Some(last) = imus.last() {
            self.anchor = last.clone();
        }
        self.last_end_time = scan_end;

        debug!(
            samples = imus.len(),
            skipped,
            poses = self.pose_cache.len(),
            "propagated through scan"
        );
    }

    #[inline]
    pub fn pose_cache(&self) -> &PoseCache<T> {
        &self.pose_cache
    }
}

#[cfg(test)]
mod tests {
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use nalgebra::Matrix3;

    use super::*;
    use crate::eskf::state::common::VelocityState;

    const G: f64 = 9.81;

    fn at_rest(timestamp: f64) -> StampedImu<f64> {
        StampedImu::new(timestamp, ImuMeasured::new(0.0, 0.0, G, 0.0, 0.0, 0.0))
    }

    fn moving(velocity: Vector3<f64>) -> Eskf<State<f64>> {
        let mut eskf = Eskf::<State<f64>>::default();
        eskf.velocity = VelocityState::new(velocity);
        eskf
    }

    #[test]
    fn test_zero_motion_does_not_drift() {
        let mut eskf = Eskf::<State<f64>>::default();
        let mut propagator = Propagator::new(at_rest(0.0), at_rest(0.0).measured);
        let imus: Vec<_> = (1..=10).map(|i| at_rest(i as f64 * 0.01)).collect();

        propagator.propagate(&mut eskf, &imus, 0.0, 0.1, &ProcessNoise::zeros());

        assert_abs_diff_eq!(*eskf.position, Vector3::zeros(), epsilon = 1e-12);
        assert_abs_diff_eq!(*eskf.velocity, Vector3::zeros(), epsilon = 1e-12);
        assert_relative_eq!(*eskf.rotation.matrix(), Matrix3::identity(), epsilon = 1e-12);

        let cache = propagator.pose_cache();
        assert_eq!(cache.len(), 11);
        assert_eq!(cache[0].offset, 0.0);
        assert!(cache.iter().tuple_windows().all(|(a, b)| a.offset < b.offset));
        assert_relative_eq!(cache[10].offset, 0.1, epsilon = 1e-12);
        cache
            .iter()
            .for_each(|pose| assert_abs_diff_eq!(pose.acc, Vector3::zeros(), epsilon = 1e-12));
    }

    #[test]
    fn test_empty_batch_only_extrapolates() {
        let velocity = Vector3::new(1.0, 0.0, 0.0);
        let mut eskf = moving(velocity);
        let mut propagator = Propagator::new(at_rest(0.0), at_rest(0.0).measured);

        propagator.propagate(&mut eskf, &[], 0.0, 0.05, &ProcessNoise::zeros());

        assert_eq!(propagator.pose_cache().len(), 1);
        assert_relative_eq!(*eskf.position, velocity * 0.05, epsilon = 1e-12);
    }

    #[test]
    fn test_trailing_step_starts_at_window_end() {
        let velocity = Vector3::new(1.0, 0.0, 0.0);
        let mut eskf = moving(velocity);
        let noise = ProcessNoise::zeros();
        let mut propagator = Propagator::new(at_rest(0.0), at_rest(0.0).measured);

        let imus: Vec<_> = (1..=5).map(|i| at_rest(i as f64 * 0.01)).collect();
        propagator.propagate(&mut eskf, &imus, 0.0, 0.06, &noise);
        assert_relative_eq!(*eskf.position, velocity * 0.06, epsilon = 1e-12);

        // nothing new since 0.05, so the step covers 0.05 to 0.08
        propagator.propagate(&mut eskf, &[], 0.06, 0.08, &noise);
        assert_eq!(propagator.pose_cache().len(), 1);
        assert_relative_eq!(*eskf.position, velocity * 0.09, epsilon = 1e-12);
    }

    #[test]
    fn test_overlap_is_integrated_once() {
        let velocity = Vector3::new(0.5, -1.0, 0.2);
        let mut eskf = moving(velocity);
        let noise = ProcessNoise::zeros();
        let mut propagator = Propagator::new(at_rest(0.0), at_rest(0.0).measured);

        let first: Vec<_> = (1..=5).map(|i| at_rest(i as f64 * 0.01)).collect();
        propagator.propagate(&mut eskf, &first, 0.0, 0.06, &noise);
        assert_relative_eq!(*eskf.position, velocity * 0.06, epsilon = 1e-12);

        // 0.055 lies before the last scan end, the pair ending there is skipped
        // and the next one is clipped to start at 0.06
        let second = [at_rest(0.055), at_rest(0.07), at_rest(0.08)];
        propagator.propagate(&mut eskf, &second, 0.06, 0.08, &noise);

        assert_relative_eq!(*eskf.position, velocity * 0.08, epsilon = 1e-12);

        let cache = propagator.pose_cache();
        assert_eq!(cache.len(), 3);
        assert_relative_eq!(cache[0].position, velocity * 0.06, epsilon = 1e-12);
        assert_relative_eq!(cache[1].offset, 0.01, epsilon = 1e-12);
        assert_relative_eq!(cache[1].position, velocity * 0.07, epsilon = 1e-12);
        assert_relative_eq!(cache[2].offset, 0.02, epsilon = 1e-12);
    }

    #[test]
    fn test_samples_past_scan_end_are_not_rewound() {
        let velocity = Vector3::new(0.0, 2.0, 0.0);
        let mut eskf = moving(velocity);
        let mut propagator = Propagator::new(at_rest(0.0), at_rest(0.0).measured);
        let imus: Vec<_> = (1..=10).map(|i| at_rest(i as f64 * 0.01)).collect();

        propagator.propagate(&mut eskf, &imus, 0.0, 0.08, &ProcessNoise::zeros());

        assert_relative_eq!(*eskf.position, velocity * 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_cache_seed_carries_last_rates() {
        let mut eskf = Eskf::<State<f64>>::default();
        let turning = |t: f64| StampedImu::new(t, ImuMeasured::new(0.0, 0.0, G, 0.0, 0.0, 0.3));
        let mut propagator = Propagator::new(turning(0.0), turning(0.0).measured);
        let noise = ProcessNoise::zeros();

        propagator.propagate(&mut eskf, &[turning(0.01), turning(0.02)], 0.0, 0.02, &noise);
        assert_eq!(propagator.pose_cache()[0].angular, Vector3::zeros());

        propagator.propagate(&mut eskf, &[turning(0.03)], 0.02, 0.03, &noise);
        let seed = &propagator.pose_cache()[0];
        assert_relative_eq!(seed.angular, Vector3::new(0.0, 0.0, 0.3), epsilon = 1e-15);
        assert_relative_eq!(
            seed.rotation.angle(),
            0.3 * 0.02,
            epsilon = 1e-12
        );
    }
}
