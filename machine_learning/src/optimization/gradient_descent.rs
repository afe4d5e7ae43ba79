use ndarray::{ArrayView2, ArrayViewMut2};

use super::{Optimizer, check_grad};
use crate::Result;

/// Gradient descent optimization algorithm.
#[derive(Debug, Clone, Copy)]
pub struct GradientDescent {
    learning_rate: f32,
}

impl GradientDescent {
    /// Returns a new `GradientDescent`.
    ///
    /// # Arguments
    /// * `learning_rate` - The *length* of the steps taken on `update_param`.
    pub fn new(learning_rate: f32) -> Self {
        Self { learning_rate }
    }
}

impl Optimizer for GradientDescent {
    /// Makes a step in the opposite direction of the gradient, with a length of
    /// `learning_rate`.
    fn update_param(
        &mut self,
        _slot: usize,
        mut value: ArrayViewMut2<f32>,
        grad: ArrayView2<f32>,
    ) -> Result<()> {
        check_grad(value.dim(), grad.dim())?;
        value.scaled_add(-self.learning_rate, &grad);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::arch::{LinearRegression, Model};

    #[test]
    fn step_moves_against_the_gradient_and_clears_it() {
        let mut model = LinearRegression::new(2, 1);
        model.params()[0]
            .accumulate_grad(array![[1.0, -2.0]].view())
            .unwrap();

        let updated = GradientDescent::new(0.5).step(&mut model).unwrap();

        assert_eq!(updated, 1);
        assert_eq!(model.params()[0].value(), array![[-0.5, 1.0]]);
        assert!(!model.params()[0].has_grad());
    }

    #[test]
    fn params_without_gradient_are_skipped() {
        let mut model = LinearRegression::new(2, 1);
        let updated = GradientDescent::new(0.5).step(&mut model).unwrap();

        assert_eq!(updated, 0);
        assert_eq!(model.params()[0].value(), array![[0.0, 0.0]]);
    }
}
