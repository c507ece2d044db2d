//! Motion compensation of a scan against the pose cache of its propagation.
//!
//! ```text
//!  pose cache   0 ───── 1 ───── 2 ─── … ───── n        (offset →)
//!                head ┘  └ tail
//!  points         ·  · ·   ·  ·  ·     · ·  ·  · ·
//!                 ◄──────────── walked from the last ──
//! ```
//! A point between `head` and `tail` is placed on the trajectory by
//! extrapolating from `head` with the rates integrated over `head..tail`,
//! then re-expressed in the LiDAR frame at the end of the scan.

use nalgebra::{IsometryMatrix3, RealField, Rotation3, Translation3};

use super::{
    State,
    measurement::ScanPoint,
    propagate::{PoseCache, PoseSample},
};
use crate::frame::{Framed, IsometryFramed, LidarPoint, frames};

/// The LiDAR pose at the end of a scan, right after propagation.
#[derive(Debug, Clone)]
pub struct EndPose<T: RealField> {
    lidar_to_imu: IsometryFramed<T, fn(frames::Lidar) -> frames::Imu>,
    world_to_lidar: IsometryFramed<T, fn(frames::World) -> frames::Lidar>,
}

impl<T: RealField> EndPose<T> {
    pub fn capture(state: &State<T>) -> Self {
        let lidar_to_imu = state.lidar_to_imu();
        let world_to_lidar = &state.imu_to_world().inverse() * &lidar_to_imu.inverse();
        Self {
            lidar_to_imu,
            world_to_lidar,
        }
    }

    /// Moves `point`, captured while the IMU was at `imu_to_world`, into the
    /// LiDAR frame of this pose.
    pub fn compensate(
        &self,
        point: &LidarPoint<T>,
        imu_to_world: &IsometryFramed<T, fn(frames::Imu) -> frames::World>,
    ) -> LidarPoint<T> {
        let point = point * &self.lidar_to_imu;
        let point = &point * imu_to_world;
        &point * &self.world_to_lidar
    }
}

impl<T: RealField> PoseSample<T> {
    /// The IMU pose `dt` after this sample, moving with the rates `tail`
    /// recorded for the step that followed it.
    pub fn extrapolate(
        &self,
        tail: &Self,
        dt: T,
    ) -> IsometryFramed<T, fn(frames::Imu) -> frames::World> {
        let half: T = nalgebra::convert(0.5);
        let rotation = &self.rotation * Rotation3::new(&tail.angular * dt.clone());
        let position = &self.position
            + &self.velocity * dt.clone()
            + &tail.acc * (half * dt.clone() * dt);
        Framed::new(IsometryMatrix3::from_parts(
            Translation3::from(position),
            rotation,
        ))
    }
}

impl<T: RealField> PoseCache<T> {
    /// Re-expresses `points` at `end_pose`, in place.
    ///
    /// `points` must be sorted ascending by offset. Points captured at or
    /// before the first pose of the cache are left as they are. Returns how
    /// many points were moved.
    pub fn deskew(&self, end_pose: &EndPose<T>, points: &mut [ScanPoint<T>]) -> usize {
        // points[..remaining] are still to be visited
        let mut remaining = points.len();

        for tail_index in (1..self.len()).rev() {
            let head = &self[tail_index - 1];
            let tail = &self[tail_index];

            while remaining > 0 {
                let point = &mut points[remaining - 1];
                let offset = point.offset();
                if offset <= head.offset {
                    break;
                }
                let imu_to_world = head.extrapolate(tail, offset - head.offset.clone());
                point.point = end_pose.compensate(&point.point, &imu_to_world);
                remaining -= 1;
            }

            if remaining == 0 {
                break;
            }
        }

        points.len() - remaining
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};

    use super::*;
    use crate::eskf::state::common::*;

    fn still_pose(offset: f64, rotation: Rotation3<f64>, position: Vector3<f64>) -> PoseSample<f64> {
        PoseSample {
            offset,
            acc: Vector3::zeros(),
            angular: Vector3::zeros(),
            velocity: Vector3::zeros(),
            position,
            rotation,
        }
    }

    fn state_at(rotation: Rotation3<f64>, position: Vector3<f64>) -> State<f64> {
        State {
            rotation: RotationState::new(rotation),
            position: PositionState::new(position),
            extrinsic_rotation: ExtrinsicRotationState::new(Rotation3::from_euler_angles(
                0.0, 0.0, 0.3,
            )),
            extrinsic_position: ExtrinsicPositionState::new(Vector3::new(-0.011, -0.02329, 0.04412)),
            ..Default::default()
        }
    }

    fn points(offsets_ms: &[f64]) -> Vec<ScanPoint<f64>> {
        offsets_ms
            .iter()
            .enumerate()
            .map(|(i, &offset)| ScanPoint::new(2.0 + i as f64, -1.0, 0.5 * i as f64, offset))
            .collect()
    }

    #[test]
    fn test_identical_poses_leave_points_alone() {
        let rotation = Rotation3::from_euler_angles(0.1, -0.2, 0.7);
        let position = Vector3::new(3.0, -4.0, 1.0);
        let cache = PoseCache(
            (0..=10)
                .map(|i| still_pose(i as f64 * 0.01, rotation, position))
                .collect(),
        );
        let end_pose = EndPose::capture(&state_at(rotation, position));

        let original = points(&[1.0, 12.0, 33.3, 50.0, 99.0, 100.0]);
        let mut scan = original.clone();
        let moved = cache.deskew(&end_pose, &mut scan);

        assert_eq!(moved, scan.len());
        scan.iter().zip(&original).for_each(|(after, before)| {
            assert_relative_eq!(*after.point, *before.point, epsilon = 1e-12);
        });
    }

    #[test]
    fn test_later_points_move_less() {
        // one interval, moving along x at 2 m/s, scan ends at 0.1 s
        let velocity = Vector3::new(2.0, 0.0, 0.0);
        let mut head = still_pose(0.0, Rotation3::identity(), Vector3::zeros());
        head.velocity = velocity;
        let mut tail = still_pose(0.1, Rotation3::identity(), velocity * 0.1);
        tail.velocity = velocity;
        let cache = PoseCache(vec![head, tail]);

        let mut state = state_at(Rotation3::identity(), velocity * 0.1);
        state.extrinsic_rotation = ExtrinsicRotationState::new(Rotation3::identity());
        state.extrinsic_position = ExtrinsicPositionState::new(Vector3::zeros());
        let end_pose = EndPose::capture(&state);

        let original = points(&[20.0, 50.0, 80.0]);
        let mut scan = original.clone();
        assert_eq!(cache.deskew(&end_pose, &mut scan), 3);

        let shifts: Vec<f64> = scan
            .iter()
            .zip(&original)
            .map(|(after, before)| before.point.x - after.point.x)
            .collect();
        assert!(shifts.windows(2).all(|w| w[0] > w[1]));
        scan.iter().zip(&original).for_each(|(after, before)| {
            let expected = *before.point - velocity * (0.1 - before.offset());
            assert_relative_eq!(*after.point, expected, epsilon = 1e-12);
        });
    }

    #[test]
    fn test_rotation_is_extrapolated_from_head() {
        // yawing at 1 rad/s, scan ends with the IMU turned by 0.1 rad
        let mut tail = still_pose(0.1, Rotation3::new(Vector3::z() * 0.1), Vector3::zeros());
        tail.angular = Vector3::z();
        let cache = PoseCache(vec![
            still_pose(0.0, Rotation3::identity(), Vector3::zeros()),
            tail,
        ]);
        let mut state = state_at(Rotation3::new(Vector3::z() * 0.1), Vector3::zeros());
        state.extrinsic_rotation = ExtrinsicRotationState::new(Rotation3::identity());
        state.extrinsic_position = ExtrinsicPositionState::new(Vector3::zeros());
        let end_pose = EndPose::capture(&state);

        let mut scan = vec![ScanPoint::new(1.0, 0.0, 0.0, 40.0)];
        cache.deskew(&end_pose, &mut scan);

        // seen 0.06 rad before the end, so it now lies 0.06 rad clockwise
        let expected = Rotation3::new(Vector3::z() * -0.06) * Point3::new(1.0, 0.0, 0.0);
        assert_relative_eq!(*scan[0].point, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_points_at_first_pose_are_untouched() {
        let velocity = Vector3::new(1.0, 1.0, 0.0);
        let mut head = still_pose(0.0, Rotation3::identity(), Vector3::zeros());
        head.velocity = velocity;
        let cache = PoseCache(vec![
            head,
            still_pose(0.1, Rotation3::identity(), velocity * 0.1),
        ]);
        let end_pose = EndPose::capture(&state_at(Rotation3::identity(), velocity * 0.1));

        let original = points(&[0.0, 0.0, 30.0]);
        let mut scan = original.clone();

        assert_eq!(cache.deskew(&end_pose, &mut scan), 1);
        assert_eq!(*scan[0].point, *original[0].point);
        assert_eq!(*scan[1].point, *original[1].point);
        assert_ne!(*scan[2].point, *original[2].point);
    }

    #[test]
    fn test_degenerate_inputs() {
        let end_pose = EndPose::capture(&State::<f64>::default());

        let cache = PoseCache(vec![
            still_pose(0.0, Rotation3::identity(), Vector3::zeros()),
            still_pose(0.1, Rotation3::identity(), Vector3::zeros()),
        ]);
        assert_eq!(cache.deskew(&end_pose, &mut []), 0);

        let single = PoseCache(vec![still_pose(0.0, Rotation3::identity(), Vector3::zeros())]);
        let mut scan = points(&[10.0, 20.0]);
        assert_eq!(single.deskew(&end_pose, &mut scan), 0);

        assert_eq!(PoseCache::default().deskew(&end_pose, &mut scan), 0);
    }
}
