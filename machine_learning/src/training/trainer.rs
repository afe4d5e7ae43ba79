use log::{debug, info, warn};
use rand::Rng;

use super::{
    BatchErrorPolicy, CancelToken, EpochReport, Evaluator, Metric, TrainerConfig, TrainingReport,
};
use crate::{
    MlErr, Result,
    arch::{Model, ProcessorOpt, codec, loss::LossFn},
    dataset::{Dataset, Indexed},
    graph::{Graph, Node},
    optimization::Optimizer,
};

/// A model `Trainer`. Contains the relevant components needed for training a model,
/// including the model itself.
///
/// Every batch is processed on a fresh graph. The graph borrows the parameters of the model
/// while it's alive and the optimizer needs them exclusively, so the optimizer step can only
/// run once the graph of its batch is gone.
pub struct Trainer<M, O, L, R>
where
    M: Model,
    O: Optimizer,
    L: LossFn,
    R: Rng,
{
    model: M,
    optimizer: O,
    loss_fn: L,
    rng: R,
    config: TrainerConfig,
    cancel: CancelToken,
    epoch: usize,
    best: Option<Metric>,
}

impl<M, O, L, R> Trainer<M, O, L, R>
where
    M: Model,
    O: Optimizer,
    L: LossFn,
    R: Rng,
{
    /// Returns a new `Trainer`.
    ///
    /// # Arguments
    /// * `model` - The model that will be trained.
    /// * `optimizer` - The optimizer applying the gradients of every batch.
    /// * `loss_fn` - The loss function used to measure the difference between a model's output and the expected one.
    /// * `rng` - The random source used for shuffling.
    /// * `config` - The configuration of the run.
    pub fn new(model: M, optimizer: O, loss_fn: L, rng: R, config: TrainerConfig) -> Self {
        Self {
            model,
            optimizer,
            loss_fn,
            rng,
            config,
            cancel: CancelToken::new(),
            epoch: 0,
            best: None,
        }
    }

    /// Makes the run stop as soon as `cancel` is cancelled.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    /// The amount of epochs completed so far, across every `train` call.
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    /// The best evaluation seen so far, across every `train` call.
    pub fn best(&self) -> Option<Metric> {
        self.best
    }

    /// Trains the model for the configured amount of epochs.
    ///
    /// # Arguments
    /// * `train` - The training set, shuffled in place when configured to.
    /// * `test` - The held-out set, evaluated on the configured cadence.
    ///
    /// # Returns
    /// The report of the run, or the first unrecoverable error. Processor options are
    /// validated before any batch runs.
    pub fn train(&mut self, train: &mut Dataset, test: Option<&Dataset>) -> Result<TrainingReport> {
        self.check_options()?;

        let mut report = TrainingReport {
            best: self.best,
            ..Default::default()
        };

        for epoch in 0..self.config.epochs {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            if self.config.shuffle {
                train.shuffle(&mut self.rng);
            }

            let (mut epoch_report, cancelled) = self.run_epoch(epoch, train)?;
            if cancelled {
                info!(epoch = epoch; "training cancelled");
                report.cancelled = true;
                report.epochs.push(epoch_report);
                break;
            }

            if let Some(test) = test.filter(|_| self.config.evaluates_at(epoch)) {
                let metric = Evaluator::new(&self.loss_fn, &self.config.options)
                    .evaluate(&self.model, test)?;
                epoch_report.metric = Some(metric);
            }

            let improved = match (epoch_report.metric, self.best) {
                (Some(metric), Some(best)) => metric.improves_on(&best),
                (Some(_), None) => true,
                (None, _) => false,
            };
            if improved {
                self.best = epoch_report.metric;
                report.best = self.best;
            }

            epoch_report.checkpointed = self.checkpoint(epoch, improved)?;

            info!(
                epoch = epoch,
                loss:? = epoch_report.loss,
                skipped = epoch_report.skipped,
                metric:? = epoch_report.metric;
                "epoch finished"
            );
            report.epochs.push(epoch_report);
            self.epoch += 1;
        }

        Ok(report)
    }

    /// Runs every batch of one epoch.
    ///
    /// # Returns
    /// The report of the epoch and whether it was cut short by a cancellation.
    fn run_epoch(&mut self, epoch: usize, train: &Dataset) -> Result<(EpochReport, bool)> {
        let mut report = EpochReport {
            epoch,
            loss: None,
            batches: 0,
            skipped: 0,
            metric: None,
            checkpointed: false,
        };
        let mut total_loss = 0.;
        let mut succeeded = 0;

        for (i, batch) in train.batches(self.config.batch_size).enumerate() {
            if self.cancel.is_cancelled() {
                report.loss = (succeeded > 0).then(|| total_loss / succeeded as f32);
                return Ok((report, true));
            }

            report.batches += 1;

            match self.step(&batch) {
                Ok(loss) => {
                    total_loss += loss;
                    succeeded += 1;
                }
                Err(e)
                    if e.is_recoverable() && self.config.batch_errors == BatchErrorPolicy::Skip =>
                {
                    warn!(epoch = epoch, batch = i; "skipping batch: {e}");
                    self.model.zero_grad();
                    report.skipped += 1;
                }
                Err(e) => {
                    self.model.zero_grad();
                    return Err(e);
                }
            }
        }

        if succeeded == 0 {
            return Err(MlErr::NoValidBatches {
                epoch,
                skipped: report.skipped,
            });
        }

        report.loss = Some(total_loss / succeeded as f32);
        Ok((report, false))
    }

    /// Runs a full training step on `batch`: forward, loss, backward and optimizer update.
    ///
    /// # Returns
    /// The mean loss of the batch.
    pub fn step(&mut self, batch: &[Indexed<'_>]) -> Result<f32> {
        let loss = {
            let graph = Graph::new();
            let mut proc = self.model.new_processor(&graph, &self.config.options)?;

            let xs: Vec<Node> = batch
                .iter()
                .map(|(_, sample)| graph.new_vector(sample.x.clone()))
                .collect();

            let ys = if proc.requires_full_seq() || self.fans_out() {
                proc.forward(&xs)?
            } else {
                let mut ys = Vec::with_capacity(xs.len());
                for x in xs {
                    ys.extend(proc.forward(&[x])?);
                }
                ys
            };

            let loss = self.loss_fn.batch_loss(&graph, &ys, batch)?;
            let value = graph.scalar(loss)?;
            if !value.is_finite() {
                return Err(MlErr::NonFiniteLoss(value));
            }

            graph.backward(loss)?;
            debug!(nodes = graph.len(), loss = value; "batch done");
            value
        };

        self.optimizer.step(&mut self.model)?;
        Ok(loss)
    }

    /// Saves the model if `epoch` falls on the checkpoint cadence.
    ///
    /// # Returns
    /// Whether the model was saved.
    fn checkpoint(&self, epoch: usize, improved: bool) -> Result<bool> {
        let Some(checkpoint) = &self.config.checkpoint else {
            return Ok(false);
        };

        if (epoch + 1) % checkpoint.every.get() != 0 || (checkpoint.only_on_improvement && !improved)
        {
            return Ok(false);
        }

        codec::save(&self.model, &checkpoint.path)?;
        info!(epoch = epoch, path:? = checkpoint.path; "checkpoint saved");
        Ok(true)
    }

    fn fans_out(&self) -> bool {
        self.config.options.contains(&ProcessorOpt::Concurrent)
    }

    fn check_options(&self) -> Result<()> {
        let graph = Graph::new();
        self.model.new_processor(&graph, &self.config.options)?;
        Ok(())
    }
}
