//! A platform driving a circle inside a ring of landmarks, scanned by a
//! rolling LiDAR. Prints how far the scan points are from where the LiDAR
//! would have seen them at the end of each scan, before and after deskewing.
//!
//! `RUST_LOG=debug cargo run --example fake_scan` shows the processor's own logs.

use imu_deskew::{
    eskf::{Eskf, state::common::VelocityState},
    lio::{Config, ImuMeasured, ImuProcessor, Scan, ScanPoint, StampedImu, SyncPackage},
};
use nalgebra::{Point3, Rotation3, Vector3};
use rand::Rng;
use tracing::info;
use tracing_subscriber::EnvFilter;

const G: f64 = 9.81;
const IMU_PERIOD: f64 = 0.005;
const SCAN_PERIOD: f64 = 0.1;
const SPEED: f64 = 2.0;
const YAW_RATE: f64 = 0.5;

/// IMU pose at `t`, driving a circle counter-clockwise from the origin.
fn true_pose(t: f64) -> (Rotation3<f64>, Vector3<f64>) {
    let yaw = YAW_RATE * t;
    let radius = SPEED / YAW_RATE;
    (
        Rotation3::new(Vector3::z() * yaw),
        Vector3::new(radius * yaw.sin(), radius * (1.0 - yaw.cos()), 0.0),
    )
}

fn seen_from(landmark: &Point3<f64>, t: f64, extrinsic: &Vector3<f64>) -> Point3<f64> {
    let (rotation, position) = true_pose(t);
    rotation.inverse() * (landmark - position) - extrinsic
}

fn noisy(rng: &mut impl Rng, value: Vector3<f64>, bound: f64) -> Vector3<f64> {
    value + Vector3::from_fn(|_, _| rng.random_range(-bound..bound))
}

fn mean_error(scan: &Scan<f64>, landmarks: &[Point3<f64>], extrinsic: &Vector3<f64>) -> f64 {
    let total: f64 = scan
        .points
        .iter()
        .zip(landmarks)
        .map(|(point, landmark)| (*point.point - seen_from(landmark, scan.end_time, extrinsic)).norm())
        .sum();
    total / scan.points.len() as f64
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::default().with_mid360_extrinsics();
    let extrinsic = Vector3::from(config.extrinsic_translation);
    let mut processor = ImuProcessor::<f64>::new(&config).unwrap();
    let mut eskf = Eskf::default();
    let mut rng = rand::rng();

    let landmarks: Vec<_> = (0..360)
        .map(|i| {
            let bearing = (i as f64).to_radians();
            Point3::new(12.0 * bearing.cos(), 12.0 * bearing.sin(), (i % 7) as f64 * 0.3 - 1.0)
        })
        .collect();

    // standing still until t = 0
    let still: Vec<_> = (1 - config.imu_init_num as i64..=0)
        .map(|i| {
            let measured = ImuMeasured::from_parts(
                noisy(&mut rng, Vector3::new(0.0, 0.0, G), 0.02),
                noisy(&mut rng, Vector3::zeros(), 0.002),
            );
            StampedImu::new(i as f64 * IMU_PERIOD, measured)
        })
        .collect();
    assert!(processor.initialize(&mut eskf, &still));
    // what a correction step would have estimated at pull-away
    eskf.velocity = VelocityState::new(Vector3::new(SPEED, 0.0, 0.0));

    // on a circle the body frame sees a constant centripetal pull
    let specific_force = Vector3::new(0.0, SPEED * YAW_RATE, G);
    let samples_per_scan = (SCAN_PERIOD / IMU_PERIOD).round() as usize;

    for scan_index in 0..30 {
        let start = scan_index as f64 * SCAN_PERIOD;
        let first_sample = scan_index * samples_per_scan + 1;

        let imus = (first_sample..first_sample + samples_per_scan)
            .map(|i| {
                let measured = ImuMeasured::from_parts(
                    noisy(&mut rng, specific_force, 0.05),
                    noisy(&mut rng, Vector3::z() * YAW_RATE, 0.002),
                );
                StampedImu::new(i as f64 * IMU_PERIOD, measured)
            })
            .collect();

        let points = landmarks
            .iter()
            .enumerate()
            .map(|(i, landmark)| {
                let offset = i as f64 / landmarks.len() as f64 * SCAN_PERIOD;
                let p = seen_from(landmark, start + offset, &extrinsic);
                ScanPoint::new(p.x, p.y, p.z, offset * 1e3)
            })
            .collect();

        let mut package = SyncPackage::new(imus, Scan::new(points, start, start + SCAN_PERIOD));
        let before = mean_error(&package.scan, &landmarks, &extrinsic);
        processor.process(&mut eskf, &mut package);
        let after = mean_error(&package.scan, &landmarks, &extrinsic);

        info!(
            scan = scan_index,
            before = format_args!("{before:.4}"),
            after = format_args!("{after:.4}"),
            "mean point error (m)"
        );
    }

    info!(position = ?eskf.position.as_slice(), truth = ?true_pose(3.0).1.as_slice(), "final position");
}
