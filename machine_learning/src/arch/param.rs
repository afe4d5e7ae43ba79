use ndarray::{Array2, ArrayView2, ArrayViewMut2};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{MlErr, Result};

/// The role of a parameter inside its layer.
///
/// It is only used to dispatch policies (e.g. initialization), never to compute anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    #[default]
    Undefined,
    Weights,
    Biases,
}

/// A named trainable tensor.
///
/// The value is only writable through `&mut Param`, that is, by whoever owns the model
/// (the optimizer during its step or the initializer). Graphs read it through shared
/// references and write their gradients into the accumulator, which is why it sits
/// behind a lock.
#[derive(Debug)]
pub struct Param {
    name: String,
    kind: ParamKind,
    value: Array2<f32>,
    grad: Mutex<Option<Array2<f32>>>,
}

impl Param {
    /// Creates a new `Param`.
    ///
    /// # Arguments
    /// * `name` - The name of the parameter inside its layer.
    /// * `kind` - The role of the parameter.
    /// * `value` - The initial value, its shape is fixed from now on.
    ///
    /// # Returns
    /// A new `Param` instance.
    pub fn new(name: impl Into<String>, kind: ParamKind, value: Array2<f32>) -> Self {
        Self {
            name: name.into(),
            kind,
            value,
            grad: Mutex::new(None),
        }
    }

    /// Creates a zeroed `Weights` parameter of shape `(rows, cols)`.
    pub fn weights(name: impl Into<String>, rows: usize, cols: usize) -> Self {
        Self::new(name, ParamKind::Weights, Array2::zeros((rows, cols)))
    }

    /// Creates a zeroed `Biases` column of `rows` elements.
    pub fn biases(name: impl Into<String>, rows: usize) -> Self {
        Self::new(name, ParamKind::Biases, Array2::zeros((rows, 1)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ParamKind {
        self.kind
    }

    pub fn shape(&self) -> (usize, usize) {
        self.value.dim()
    }

    /// Returns the amount of scalars held by this parameter.
    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn value(&self) -> ArrayView2<'_, f32> {
        self.value.view()
    }

    /// Gives mutable access to the value. The view can't change its shape.
    pub fn value_mut(&mut self) -> ArrayViewMut2<'_, f32> {
        self.value.view_mut()
    }

    /// Adds `grad` to the gradient accumulator.
    ///
    /// # Arguments
    /// * `grad` - A gradient with the same shape as the value.
    ///
    /// # Returns
    /// A `DimensionMismatch` error if the shapes differ.
    pub fn accumulate_grad(&self, grad: ArrayView2<f32>) -> Result<()> {
        if grad.dim() != self.value.dim() {
            return Err(MlErr::DimensionMismatch {
                op: "accumulate_grad",
                got: grad.dim(),
                expected: self.value.dim(),
            });
        }

        let mut acc = self.grad.lock();
        *acc = Some(match acc.take() {
            Some(acc) => acc + &grad,
            None => grad.to_owned(),
        });

        Ok(())
    }

    /// Returns a copy of the accumulated gradient, if any.
    pub fn grad(&self) -> Option<Array2<f32>> {
        self.grad.lock().clone()
    }

    pub fn has_grad(&self) -> bool {
        self.grad.lock().is_some()
    }

    /// Takes the accumulated gradient out, leaving the accumulator cleared.
    pub fn take_grad(&mut self) -> Option<Array2<f32>> {
        self.grad.get_mut().take()
    }

    /// Clears the gradient accumulator.
    pub fn zero_grad(&self) {
        self.grad.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn gradients_accumulate_until_taken() {
        let mut param = Param::weights("w", 1, 2);

        param.accumulate_grad(array![[1.0, 2.0]].view()).unwrap();
        param.accumulate_grad(array![[0.5, 0.5]].view()).unwrap();
        assert_eq!(param.grad().unwrap(), array![[1.5, 2.5]]);

        assert_eq!(param.take_grad().unwrap(), array![[1.5, 2.5]]);
        assert!(!param.has_grad());
    }

    #[test]
    fn gradient_with_another_shape_is_rejected() {
        let param = Param::biases("b", 3);
        let res = param.accumulate_grad(array![[1.0, 2.0, 3.0]].view());

        assert!(matches!(res, Err(MlErr::DimensionMismatch { .. })));
        assert!(!param.has_grad());
    }

    #[test]
    fn constructors_tag_the_kind() {
        assert_eq!(Param::weights("w", 2, 3).kind(), ParamKind::Weights);
        assert_eq!(Param::biases("b", 2).shape(), (2, 1));
        assert_eq!(
            Param::new("x", ParamKind::default(), Array2::zeros((1, 1))).kind(),
            ParamKind::Undefined
        );
    }
}
