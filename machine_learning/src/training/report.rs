use serde::Serialize;

/// The result of evaluating a model on a held-out set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// The ratio of correctly classified samples, higher is better.
    Accuracy(f32),
    /// The mean loss, lower is better.
    Loss(f32),
}

impl Metric {
    pub fn value(&self) -> f32 {
        match *self {
            Metric::Accuracy(v) | Metric::Loss(v) => v,
        }
    }

    /// Whether this metric is strictly better than `other`. Different kinds never compare.
    pub fn improves_on(&self, other: &Metric) -> bool {
        match (self, other) {
            (Metric::Accuracy(a), Metric::Accuracy(b)) => a > b,
            (Metric::Loss(a), Metric::Loss(b)) => a < b,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpochReport {
    pub epoch: usize,
    /// The mean loss of the batches that succeeded, if any.
    pub loss: Option<f32>,
    pub batches: usize,
    pub skipped: usize,
    pub metric: Option<Metric>,
    pub checkpointed: bool,
}

/// Everything that happened during a training run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrainingReport {
    pub epochs: Vec<EpochReport>,
    pub best: Option<Metric>,
    pub cancelled: bool,
}

impl TrainingReport {
    /// Returns the amount of batches skipped over the whole run.
    pub fn skipped_batches(&self) -> usize {
        self.epochs.iter().map(|epoch| epoch.skipped).sum()
    }

    pub fn last_loss(&self) -> Option<f32> {
        self.epochs.iter().rev().find_map(|epoch| epoch.loss)
    }
}
