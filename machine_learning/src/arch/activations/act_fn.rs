use ndarray::{Array2, ArrayView2, Axis, Zip};
use serde::{Deserialize, Serialize};

/// The activation functions a layer can apply to its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActFn {
    #[default]
    Identity,
    #[serde(rename = "relu")]
    ReLU,
    Sigmoid,
    Tanh,
    /// Normalizes every column into a probability distribution.
    #[serde(rename = "softmax")]
    SoftMax,
}
use ActFn::*;

impl ActFn {
    /// Applies the activation to `x`.
    pub fn forward(&self, x: ArrayView2<f32>) -> Array2<f32> {
        match self {
            Identity => x.to_owned(),
            ReLU => x.mapv(|z| z.max(0.)),
            Sigmoid => x.mapv(|z| 1. / (1. + (-z).exp())),
            Tanh => x.mapv(f32::tanh),
            SoftMax => softmax(x),
        }
    }

    /// Computes the gradient with respect to the input of the activation.
    ///
    /// # Arguments
    /// * `x` - The input the activation was applied to.
    /// * `y` - The output of the activation.
    /// * `gy` - The gradient with respect to `y`.
    pub fn backward(
        &self,
        x: ArrayView2<f32>,
        y: ArrayView2<f32>,
        gy: ArrayView2<f32>,
    ) -> Array2<f32> {
        match self {
            Identity => gy.to_owned(),
            ReLU => Zip::from(&gy)
                .and(&x)
                .map_collect(|&g, &z| if z > 0. { g } else { 0. }),
            Sigmoid => Zip::from(&gy).and(&y).map_collect(|&g, &a| g * a * (1. - a)),
            Tanh => Zip::from(&gy).and(&y).map_collect(|&g, &a| g * (1. - a * a)),
            SoftMax => {
                // Per column: gx = y * (gy - <gy, y>)
                let dots = (&gy * &y).sum_axis(Axis(0));
                let mut gx = gy.to_owned();
                gx -= &dots.insert_axis(Axis(0));
                gx *= &y;
                gx
            }
        }
    }
}

/// Column-wise softmax, shifted by the column maximum to stay finite.
pub(crate) fn softmax(x: ArrayView2<f32>) -> Array2<f32> {
    let mut y = x.to_owned();

    for mut col in y.columns_mut() {
        let max = col.fold(f32::NEG_INFINITY, |m, &z| m.max(z));
        col.mapv_inplace(|z| (z - max).exp());
        let sum = col.sum();
        col.mapv_inplace(|z| z / sum);
    }

    y
}
