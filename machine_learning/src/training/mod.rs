mod builder;
mod cancel;
mod config;
mod evaluator;
mod report;
mod trainer;

pub use builder::{SpecTrainer, TrainerBuilder, TrainerSpec};
pub use cancel::CancelToken;
pub use config::{BatchErrorPolicy, CheckpointConfig, TrainerConfig};
pub use evaluator::Evaluator;
pub use report::{EpochReport, Metric, TrainingReport};
pub use trainer::Trainer;
