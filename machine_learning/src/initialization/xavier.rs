use ndarray::{Array2, ArrayViewMut2};
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_distr::{Normal, Uniform};

use crate::Result;

/// Fills `value` with samples of `U(-a, a)`, `a = gain * sqrt(6 / (fan_in + fan_out))`.
///
/// The columns of `value` are its inputs and the rows its outputs.
///
/// # Arguments
/// * `value` - The tensor to fill.
/// * `gain` - The scaling factor of the bound.
/// * `rng` - The random source.
///
/// # Returns
/// An error if the resulting bound is not a valid range.
pub fn xavier_uniform<R>(mut value: ArrayViewMut2<f32>, gain: f32, rng: &mut R) -> Result<()>
where
    R: Rng + ?Sized,
{
    if value.is_empty() {
        return Ok(());
    }

    let dim = value.dim();
    let (fan_out, fan_in) = dim;
    let range = gain * (6. / (fan_in + fan_out) as f32).sqrt();
    let distribution = Uniform::new_inclusive(-range, range)?;

    value.assign(&Array2::<f32>::random_using(dim, distribution, rng));
    Ok(())
}

/// Fills `value` with samples of `N(0, s)`, `s = gain * sqrt(2 / (fan_in + fan_out))`.
///
/// # Returns
/// An error if the resulting standard deviation is not finite.
pub fn xavier_normal<R>(mut value: ArrayViewMut2<f32>, gain: f32, rng: &mut R) -> Result<()>
where
    R: Rng + ?Sized,
{
    if value.is_empty() {
        return Ok(());
    }

    let dim = value.dim();
    let (fan_out, fan_in) = dim;
    let std_dev = gain * (2. / (fan_in + fan_out) as f32).sqrt();
    let distribution = Normal::new(0., std_dev)?;

    value.assign(&Array2::<f32>::random_using(dim, distribution, rng));
    Ok(())
}
