use std::{
    cmp::Ordering,
    ops::{Deref, DerefMut},
};

use nalgebra::{Point3, RealField, Scalar, Vector3};

use crate::frame::LidarPoint;

/// One IMU reading: specific force and angular velocity, both in the IMU frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ImuMeasured<T: Scalar> {
    pub linear: Vector3<T>,
    pub angular: Vector3<T>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StampedImu<T: Scalar> {
    /// Seconds.
    pub timestamp: T,
    pub measured: ImuMeasured<T>,
}

/// A LiDAR return, captured `offset_ms` milliseconds after its scan started.
#[derive(Debug, Clone)]
pub struct ScanPoint<T: Scalar> {
    pub point: LidarPoint<T>,
    pub offset_ms: T,
}

#[derive(Debug, Clone)]
pub struct Scan<T: Scalar> {
    pub points: Vec<ScanPoint<T>>,
    /// Seconds, on the IMU clock.
    pub start_time: T,
    pub end_time: T,
}

/// The IMU samples and the scan they cover, handed over as one unit of work.
#[derive(Debug, Clone)]
pub struct SyncPackage<T: Scalar> {
    pub imus: Vec<StampedImu<T>>,
    pub scan: Scan<T>,
}

impl<T: Scalar> ImuMeasured<T> {
    pub const fn new(ax: T, ay: T, az: T, gx: T, gy: T, gz: T) -> Self {
        Self::from_parts(Vector3::new(ax, ay, az), Vector3::new(gx, gy, gz))
    }

    pub const fn from_parts(linear: Vector3<T>, angular: Vector3<T>) -> Self {
        Self { linear, angular }
    }
}

impl<T: RealField> ImuMeasured<T> {
    /// The average of two readings, used as the input over the interval between them.
    pub fn midpoint(&self, other: &Self) -> Self {
        let half: T = nalgebra::convert(0.5);
        Self {
            linear: (&self.linear + &other.linear) * half.clone(),
            angular: (&self.angular + &other.angular) * half,
        }
    }
}

impl<T: Scalar> StampedImu<T> {
    pub const fn new(timestamp: T, measured: ImuMeasured<T>) -> Self {
        Self {
            timestamp,
            measured,
        }
    }
}

impl<T: Scalar> Deref for StampedImu<T> {
    type Target = ImuMeasured<T>;

    fn deref(&self) -> &Self::Target {
        &self.measured
    }
}

impl<T: Scalar> DerefMut for StampedImu<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.measured
    }
}

impl<T: Scalar> ScanPoint<T> {
    pub fn new(x: T, y: T, z: T, offset_ms: T) -> Self {
        Self {
            point: LidarPoint::new(Point3::new(x, y, z)),
            offset_ms,
        }
    }
}

impl<T: RealField> ScanPoint<T> {
    /// Seconds since the start of the scan.
    #[inline]
    pub fn offset(&self) -> T {
        self.offset_ms.clone() * nalgebra::convert::<f64, T>(1e-3)
    }
}

impl<T: RealField> Scan<T> {
    pub fn new(points: Vec<ScanPoint<T>>, start_time: T, end_time: T) -> Self {
        Self {
            points,
            start_time,
            end_time,
        }
    }

    /// Stable sort by capture offset, as motion compensation requires.
    pub fn sort_by_offset(&mut self) {
        self.points.sort_by(|a, b| {
            a.offset_ms
                .partial_cmp(&b.offset_ms)
                .unwrap_or(Ordering::Equal)
        });
    }
}

impl<T: Scalar> SyncPackage<T> {
    pub fn new(imus: Vec<StampedImu<T>>, scan: Scan<T>) -> Self {
        Self { imus, scan }
    }
}
