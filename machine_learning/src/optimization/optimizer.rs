use ndarray::{ArrayView2, ArrayViewMut2};

use crate::{Result, arch::Model};

/// Defines the strategy for updating model parameters based on their accumulated gradients.
pub trait Optimizer: Send {
    /// Updates a single parameter.
    ///
    /// # Arguments
    /// * `slot` - The position of the parameter in traversal order, stable across steps.
    /// * `value` - The value to update.
    /// * `grad` - The gradient accumulated for `value`.
    ///
    /// # Returns
    /// An error if the state kept for `slot` doesn't fit `value`.
    fn update_param(
        &mut self,
        slot: usize,
        value: ArrayViewMut2<f32>,
        grad: ArrayView2<f32>,
    ) -> Result<()>;

    /// Called once at the beginning of every step.
    fn begin_step(&mut self) {}

    /// Applies the accumulated gradients of `model` and clears them.
    ///
    /// Parameters without a gradient are left untouched. This needs exclusive access to the
    /// model, so it can't overlap with any graph still reading its parameters.
    ///
    /// # Returns
    /// The amount of parameters updated.
    fn step(&mut self, model: &mut dyn Model) -> Result<usize> {
        self.begin_step();

        let mut slot = 0;
        let mut updated = 0;
        let mut res = Ok(());

        model.for_each_param_mut(&mut |param| {
            let current = slot;
            slot += 1;

            let Some(grad) = param.take_grad() else {
                return;
            };

            if res.is_ok() {
                res = self.update_param(current, param.value_mut(), grad.view());
                updated += 1;
            }
        });

        res.map(|_| updated)
    }
}

impl<O: Optimizer + ?Sized> Optimizer for Box<O> {
    fn update_param(
        &mut self,
        slot: usize,
        value: ArrayViewMut2<f32>,
        grad: ArrayView2<f32>,
    ) -> Result<()> {
        (**self).update_param(slot, value, grad)
    }

    fn begin_step(&mut self) {
        (**self).begin_step()
    }

    fn step(&mut self, model: &mut dyn Model) -> Result<usize> {
        (**self).step(model)
    }
}
