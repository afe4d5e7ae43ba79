use ndarray::{Array2, ArrayView2, ArrayViewMut2, Zip};

use super::{Optimizer, check_grad, slot_state};
use crate::Result;

/// Adam, with bias correction.
///
/// The moment estimates are kept per parameter slot and the bias correction advances on
/// every `begin_step`, which `step` calls before updating any parameter.
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    beta1_t: f32,
    beta2_t: f32,
    v: Vec<Option<Array2<f32>>>,
    s: Vec<Option<Array2<f32>>>,
    epsilon: f32,
}

impl Adam {
    pub const DEFAULT_LEARNING_RATE: f32 = 0.001;
    pub const DEFAULT_BETA1: f32 = 0.9;
    pub const DEFAULT_BETA2: f32 = 0.999;
    pub const DEFAULT_EPSILON: f32 = 1e-8;

    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `beta1`, `beta2`, `epsilon` - Hyperparameters to the optimization algorithm.
    ///
    /// # Returns
    /// A new `Adam` instance.
    pub fn new(learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            beta1_t: 1.,
            beta2_t: 1.,
            v: Vec::new(),
            s: Vec::new(),
            epsilon,
        }
    }
}

impl Default for Adam {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_LEARNING_RATE,
            Self::DEFAULT_BETA1,
            Self::DEFAULT_BETA2,
            Self::DEFAULT_EPSILON,
        )
    }
}

impl Optimizer for Adam {
    fn begin_step(&mut self) {
        self.beta1_t *= self.beta1;
        self.beta2_t *= self.beta2;
    }

    fn update_param(
        &mut self,
        slot: usize,
        value: ArrayViewMut2<f32>,
        grad: ArrayView2<f32>,
    ) -> Result<()> {
        let Self {
            learning_rate: lr,
            beta1: b1,
            beta2: b2,
            epsilon: eps,
            ..
        } = *self;

        check_grad(value.dim(), grad.dim())?;

        let bc1 = 1. - self.beta1_t;
        let bc2 = 1. - self.beta2_t;
        let step_size = lr * (bc2.sqrt() / bc1);

        let v = slot_state(&mut self.v, slot, value.dim())?;
        let s = slot_state(&mut self.s, slot, value.dim())?;

        Zip::from(value)
            .and(&grad)
            .and(v)
            .and(s)
            .for_each(|p, &g, v, s| {
                *v = b1 * *v + (1. - b1) * g;
                *s = b2 * *s + (1. - b2) * g.powi(2);
                *p -= step_size * *v / (s.sqrt() + eps);
            });

        Ok(())
    }
}
