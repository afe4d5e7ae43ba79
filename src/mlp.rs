//! The multi-layer perceptron trained on MNIST.

use std::{num::NonZeroUsize, path::PathBuf};

use machine_learning::{
    arch::{LayerSpec, LossFnSpec, ProcessorOpt, StackSpec, activations::ActFn},
    initialization::{InitScheme, Initializer},
    optimization::OptimizerSpec,
    training::{CheckpointConfig, TrainerConfig, TrainerSpec},
};

use crate::mnist::{IMAGE_SIZE, NUM_CLASSES};

pub const HIDDEN_SIZE: usize = 100;
pub const INIT_SEED: u64 = 1;
pub const SHUFFLE_SEED: u64 = 743;

const EPOCHS: usize = 20;
const BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(50).unwrap();

/// Returns the model spec of a `784 -> hidden -> 10` perceptron stack.
///
/// The output layer has no activation, the softmax is folded into the cross entropy loss.
pub fn model(hidden: usize) -> StackSpec {
    StackSpec {
        layers: vec![
            LayerSpec::Perceptron {
                dim: (IMAGE_SIZE, hidden),
                act_fn: ActFn::ReLU,
            },
            LayerSpec::Perceptron {
                dim: (hidden, NUM_CLASSES),
                act_fn: ActFn::Identity,
            },
        ],
    }
}

/// Returns the full training setup, saving the model at `model_path` whenever the test
/// accuracy improves. The examples of every batch are forwarded over the rayon pool.
pub fn trainer_spec(model_path: impl Into<PathBuf>) -> TrainerSpec {
    let checkpoint = CheckpointConfig {
        only_on_improvement: true,
        ..CheckpointConfig::new(model_path)
    };

    TrainerSpec {
        model: model(HIDDEN_SIZE),
        init: Initializer::new(ActFn::SoftMax, InitScheme::XavierUniform),
        init_seed: Some(INIT_SEED),
        optimizer: OptimizerSpec::default(),
        loss: LossFnSpec::CrossEntropy,
        training: TrainerConfig {
            epochs: EPOCHS,
            batch_size: BATCH_SIZE,
            shuffle: true,
            seed: Some(SHUFFLE_SEED),
            eval_every: NonZeroUsize::new(1),
            checkpoint: Some(checkpoint),
            options: vec![ProcessorOpt::Concurrent],
            ..Default::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use machine_learning::{
        arch::Model,
        initialization::gain,
        training::TrainerBuilder,
    };

    use super::*;

    #[test]
    fn builds_the_mnist_mlp() {
        let spec = trainer_spec("model.bin");
        let trainer = TrainerBuilder::new().build(&spec).unwrap();
        let model = trainer.model();

        assert_eq!(model.len(), 2);
        assert_eq!(
            model.size(),
            IMAGE_SIZE * HIDDEN_SIZE + HIDDEN_SIZE + HIDDEN_SIZE * NUM_CLASSES + NUM_CLASSES
        );
        assert_eq!(
            spec.init.gains(model),
            [gain(ActFn::ReLU), gain(ActFn::SoftMax)]
        );
        assert_eq!(trainer.config().batch_size.get(), 50);
        assert!(trainer.config().checkpoint.as_ref().unwrap().only_on_improvement);
        assert_eq!(trainer.config().options, [ProcessorOpt::Concurrent]);
    }

    #[test]
    fn same_seed_same_initial_model() {
        let spec = trainer_spec("model.bin");
        let a = TrainerBuilder::new().build(&spec).unwrap();
        let b = TrainerBuilder::new().build(&spec).unwrap();

        for (pa, pb) in a.model().params().iter().zip(b.model().params()) {
            assert_eq!(pa.value(), pb.value());
        }
    }
}
