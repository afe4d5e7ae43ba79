use ndarray::{Array2, ArrayView2, ArrayViewMut2, Zip};

use super::{Optimizer, check_grad, slot_state};
use crate::Result;

#[derive(Debug, Clone)]
pub struct GradientDescentWithMomentum {
    learning_rate: f32,
    momentum: f32,
    velocity: Vec<Option<Array2<f32>>>,
}

impl GradientDescentWithMomentum {
    /// Creates a new `GradientDescentWithMomentum` optimizer.
    ///
    /// # Arguments
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `momentum` - Hyperparameter to the optimization algorithm.
    ///
    /// # Returns
    /// A new `GradientDescentWithMomentum` instance.
    pub fn new(learning_rate: f32, momentum: f32) -> Self {
        Self {
            learning_rate,
            momentum,
            velocity: Vec::new(),
        }
    }
}

impl Optimizer for GradientDescentWithMomentum {
    fn update_param(
        &mut self,
        slot: usize,
        value: ArrayViewMut2<f32>,
        grad: ArrayView2<f32>,
    ) -> Result<()> {
        check_grad(value.dim(), grad.dim())?;

        let lr = self.learning_rate;
        let mu = self.momentum;
        let velocity = slot_state(&mut self.velocity, slot, value.dim())?;

        Zip::from(value)
            .and(velocity)
            .and(&grad)
            .for_each(|p, v, &g| {
                *v = (mu * *v) + g;
                *p -= lr * *v;
            });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn velocity_builds_up_per_slot() {
        let mut opt = GradientDescentWithMomentum::new(1.0, 0.5);
        let mut a = array![[0.0]];
        let mut b = array![[0.0, 0.0]];

        opt.update_param(0, a.view_mut(), array![[1.0]].view()).unwrap();
        opt.update_param(1, b.view_mut(), array![[2.0, 2.0]].view()).unwrap();
        opt.update_param(0, a.view_mut(), array![[1.0]].view()).unwrap();

        // v = 1 then v = 0.5 + 1
        assert_eq!(a, array![[-2.5]]);
        assert_eq!(b, array![[-2.0, -2.0]]);
    }

    #[test]
    fn slot_with_another_shape_fails() {
        let mut opt = GradientDescentWithMomentum::new(1.0, 0.5);
        let mut a = array![[0.0]];
        let mut b = array![[0.0, 0.0]];

        opt.update_param(0, a.view_mut(), array![[1.0]].view()).unwrap();
        assert!(opt.update_param(0, b.view_mut(), array![[1.0, 1.0]].view()).is_err());
    }
}
