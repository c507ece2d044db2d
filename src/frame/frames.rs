use nalgebra::{IsometryMatrix3, Point3};

/// The frame the LiDAR reports its points in.
#[derive(Debug)]
pub struct Lidar;

#[derive(Debug)]
pub struct Imu;

/// The gravity-aligned frame fixed at the start of odometry.
#[derive(Debug)]
pub struct World;

pub type LidarFramed<T> = Framed<T, Lidar>;
pub type ImuFramed<T> = Framed<T, Imu>;
pub type WorldFramed<T> = Framed<T, World>;

pub type IsometryFramed<T, F> = Framed<IsometryMatrix3<T>, F>;

pub type FramedPoint<T, F> = Framed<Point3<T>, F>;
pub type LidarPoint<T> = LidarFramed<Point3<T>>;
pub type ImuPoint<T> = ImuFramed<Point3<T>>;
pub type WorldPoint<T> = WorldFramed<Point3<T>>;

use super::Framed;
