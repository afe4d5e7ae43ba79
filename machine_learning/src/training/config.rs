use std::{num::NonZeroUsize, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::arch::ProcessorOpt;

const DEFAULT_EPOCHS: usize = 20;
const DEFAULT_BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(50).unwrap();

/// What to do with a batch that fails with a recoverable error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchErrorPolicy {
    /// Log it, clear its gradients and go on with the next batch.
    #[default]
    Skip,
    /// Stop training with the error.
    Abort,
}

/// Where and how often the model is saved while training.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    pub path: PathBuf,
    /// Save every this many epochs.
    #[serde(default = "one")]
    pub every: NonZeroUsize,
    /// Only save when the evaluation of that epoch is the best so far.
    #[serde(default)]
    pub only_on_improvement: bool,
}

impl CheckpointConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            every: one(),
            only_on_improvement: false,
        }
    }
}

/// The configuration of a training run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub epochs: usize,
    pub batch_size: NonZeroUsize,
    /// Visit the training samples in a new random order every epoch.
    pub shuffle: bool,
    /// The seed of the random source used for shuffling, a random one if missing.
    pub seed: Option<u64>,
    /// Evaluate on the held-out set every this many epochs, never if missing.
    pub eval_every: Option<NonZeroUsize>,
    pub checkpoint: Option<CheckpointConfig>,
    pub batch_errors: BatchErrorPolicy,
    /// The options every processor is built with.
    pub options: Vec<ProcessorOpt>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            epochs: DEFAULT_EPOCHS,
            batch_size: DEFAULT_BATCH_SIZE,
            shuffle: true,
            seed: None,
            eval_every: Some(one()),
            checkpoint: None,
            batch_errors: BatchErrorPolicy::default(),
            options: Vec::new(),
        }
    }
}

impl TrainerConfig {
    /// Whether the held-out set should be evaluated at the end of `epoch` (zero based).
    pub fn evaluates_at(&self, epoch: usize) -> bool {
        self.eval_every
            .is_some_and(|every| (epoch + 1) % every.get() == 0)
    }
}

fn one() -> NonZeroUsize {
    NonZeroUsize::MIN
}
