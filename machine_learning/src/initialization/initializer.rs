use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{xavier_normal, xavier_uniform};
use crate::{
    Result,
    arch::{Model, ParamKind, Stack, activations::ActFn},
};

/// Returns the recommended gain of the initialization of a layer followed by `act_fn`.
pub fn gain(act_fn: ActFn) -> f32 {
    match act_fn {
        ActFn::ReLU => 2f32.sqrt(),
        ActFn::Tanh => 5. / 3.,
        ActFn::Sigmoid | ActFn::Identity | ActFn::SoftMax => 1.,
    }
}

/// The random fill applied to the weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitScheme {
    #[default]
    XavierUniform,
    XavierNormal,
}

/// Initializes the weights of a stack, layer by layer.
///
/// Every layer but the last one is initialized with the gain of its own activation, the last
/// one with the gain of `output`, the activation that ends up applied to the output of the
/// whole stack (e.g. the softmax folded into a cross entropy loss). Only `Weights` are
/// filled, every other parameter keeps its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Initializer {
    pub output: ActFn,
    #[serde(default)]
    pub scheme: InitScheme,
}

impl Initializer {
    /// Creates a new `Initializer`.
    ///
    /// # Arguments
    /// * `output` - The activation applied to the output of the stack.
    /// * `scheme` - The random fill applied to the weights.
    pub fn new(output: ActFn, scheme: InitScheme) -> Self {
        Self { output, scheme }
    }

    /// Returns the gain each layer of `stack` gets, in order.
    pub fn gains(&self, stack: &Stack) -> Vec<f32> {
        let last = stack.len().saturating_sub(1);

        stack
            .layers()
            .iter()
            .enumerate()
            .map(|(i, layer)| {
                if i == last {
                    gain(self.output)
                } else {
                    gain(layer.activation().unwrap_or_default())
                }
            })
            .collect()
    }

    /// Fills the weights of every layer of `stack`.
    ///
    /// # Arguments
    /// * `stack` - The stack to initialize.
    /// * `rng` - The random source, the same seed yields the same weights.
    pub fn init<R: Rng + ?Sized>(&self, stack: &mut Stack, rng: &mut R) -> Result<()> {
        let gains = self.gains(stack);

        for (i, (layer, gain)) in stack.layers_mut().iter_mut().zip(gains).enumerate() {
            debug!(layer = i, gain = gain; "initializing layer");

            let mut res = Ok(());
            layer.for_each_param_mut(&mut |param| {
                if res.is_err() || param.kind() != ParamKind::Weights {
                    return;
                }

                res = match self.scheme {
                    InitScheme::XavierUniform => xavier_uniform(param.value_mut(), gain, rng),
                    InitScheme::XavierNormal => xavier_normal(param.value_mut(), gain, rng),
                };
            });
            res?;
        }

        Ok(())
    }
}
