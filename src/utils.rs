use nalgebra::{ComplexField, Matrix3, Scalar, Vector3};
use num_traits::Zero;

/// Running first and second moments of a stream of 3-vectors.
#[derive(Debug, Clone)]
pub struct VectorSquareSum<T: Scalar> {
    count: usize,
    sum: Vector3<T>,
    square_sum: Matrix3<T>,
}

impl<T> VectorSquareSum<T>
where
    T: ComplexField,
{
    pub fn push(&mut self, current: &Vector3<T>) {
        self.count += 1;
        self.sum += current;
        self.square_sum += current * current.transpose();
    }

    /// The mean and the (biased) covariance of everything pushed so far.
    ///
    /// Meaningless while [`count`](Self::count) is zero.
    pub fn mean(&self) -> (Vector3<T>, Matrix3<T>) {
        let count: T = nalgebra::convert(self.count as f64);
        let mean = &self.sum / count.clone();
        let covariance = &self.square_sum / count - &mean * mean.transpose();
        (mean, covariance)
    }
    #[inline(always)]
    pub fn count(&self) -> usize {
        self.count
    }
}

impl<T> Default for VectorSquareSum<T>
where
    T: Scalar + Zero,
{
    fn default() -> Self {
        Self {
            count: 0,
            sum: Vector3::zeros(),
            square_sum: Matrix3::zeros(),
        }
    }
}
