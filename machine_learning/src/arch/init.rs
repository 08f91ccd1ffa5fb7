use ml_core::Float;
use ndarray::{Array, Dimension, ShapeBuilder};
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_distr::StandardNormal;

/// Samples an array of the given shape from `N(0, scale²)`.
///
/// # Arguments
/// * `shape` - The shape of the array.
/// * `scale` - The standard deviation of the samples.
/// * `rng` - A random number generator.
pub fn scaled_normal<Sh, D, R>(shape: Sh, scale: Float, rng: &mut R) -> Array<Float, D>
where
    Sh: ShapeBuilder<Dim = D>,
    D: Dimension,
    R: Rng + ?Sized,
{
    Array::random_using(shape, StandardNormal, rng) * scale
}
