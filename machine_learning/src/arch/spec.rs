use serde::{Deserialize, Serialize};

use super::{
    Layer, Stack,
    activations::ActFn,
    loss::{CrossEntropy, LossFn, Mse},
};
use crate::{MlErr, Result};

/// The specification for the `Layer` enum.
///
/// Dimensions are written as `(input, output)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerSpec {
    LinearRegression {
        dim: (usize, usize),
    },
    Perceptron {
        dim: (usize, usize),
        #[serde(default)]
        act_fn: ActFn,
    },
    Stack {
        layers: Vec<LayerSpec>,
    },
}

impl LayerSpec {
    /// Returns the `(input, output)` dimensions, `None` for an empty stack.
    pub fn dim(&self) -> Option<(usize, usize)> {
        match self {
            LayerSpec::LinearRegression { dim } | LayerSpec::Perceptron { dim, .. } => Some(*dim),
            LayerSpec::Stack { layers } => chain_dim(layers),
        }
    }

    fn build(&self) -> Result<Layer> {
        let layer = match self {
            &LayerSpec::LinearRegression { dim: (i, o) } => Layer::linear_regression(i, o),
            &LayerSpec::Perceptron { dim: (i, o), act_fn } => Layer::perceptron(i, o, act_fn),
            LayerSpec::Stack { layers } => Layer::Stack(build_stack(layers)?),
        };

        Ok(layer)
    }
}

/// The specification for a `Stack`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackSpec {
    pub layers: Vec<LayerSpec>,
}

impl StackSpec {
    /// Builds the stack described by this spec with every parameter set to zero.
    ///
    /// # Returns
    /// The stack or a `StructuralMismatch` error if the output of a layer doesn't match the
    /// input of the next one.
    pub fn build(&self) -> Result<Stack> {
        build_stack(&self.layers)
    }
}

/// The specification for the losses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossFnSpec {
    Mse,
    #[default]
    CrossEntropy,
}

impl LossFnSpec {
    pub fn build(&self) -> Box<dyn LossFn> {
        match self {
            LossFnSpec::Mse => Box::new(Mse::new()),
            LossFnSpec::CrossEntropy => Box::new(CrossEntropy::new()),
        }
    }
}

fn build_stack(specs: &[LayerSpec]) -> Result<Stack> {
    for (i, pair) in specs.windows(2).enumerate() {
        let (Some((_, out)), Some((inp, _))) = (pair[0].dim(), pair[1].dim()) else {
            continue;
        };

        if out != inp {
            return Err(MlErr::StructuralMismatch(format!(
                "layer {i} outputs {out} values but layer {} takes {inp}",
                i + 1
            )));
        }
    }

    let layers = specs.iter().map(LayerSpec::build).collect::<Result<Vec<_>>>()?;
    Ok(Stack::new(layers))
}

fn chain_dim(specs: &[LayerSpec]) -> Option<(usize, usize)> {
    let mut dims = specs.iter().filter_map(LayerSpec::dim);
    let (input, mut output) = dims.next()?;
    for (_, o) in dims {
        output = o;
    }
    Some((input, output))
}
