use log::info;
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use super::{Trainer, TrainerConfig};
use crate::{
    Result,
    arch::{LossFnSpec, Model, Stack, StackSpec, loss::LossFn},
    initialization::Initializer,
    optimization::{Optimizer, OptimizerSpec},
};

/// The specification for the `Trainer` struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerSpec {
    pub model: StackSpec,
    #[serde(default)]
    pub init: Initializer,
    /// The seed used to initialize the model, a random one if missing.
    #[serde(default)]
    pub init_seed: Option<u64>,
    #[serde(default)]
    pub optimizer: OptimizerSpec,
    #[serde(default)]
    pub loss: LossFnSpec,
    #[serde(default)]
    pub training: TrainerConfig,
}

/// A trainer whose components were resolved at runtime.
pub type SpecTrainer = Trainer<Stack, Box<dyn Optimizer>, Box<dyn LossFn>, StdRng>;

/// Builds `Trainer`s given a specification.
#[derive(Debug, Default)]
pub struct TrainerBuilder;

impl TrainerBuilder {
    /// Creates a new `TrainerBuilder`.
    pub fn new() -> Self {
        Self
    }

    /// Builds a new `Trainer` following a spec, with its model already initialized.
    ///
    /// # Arguments
    /// * `spec` - The specification for the trainer.
    pub fn build(&self, spec: &TrainerSpec) -> Result<SpecTrainer> {
        let mut model = spec.model.build()?;
        spec.init.init(&mut model, &mut self.generate_rng(spec.init_seed))?;
        info!(layers = model.len(), params = model.size(); "model built");

        Ok(Trainer::new(
            model,
            spec.optimizer.build(),
            spec.loss.build(),
            self.generate_rng(spec.training.seed),
            spec.training.clone(),
        ))
    }

    fn generate_rng(&self, seed: Option<u64>) -> StdRng {
        match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}
