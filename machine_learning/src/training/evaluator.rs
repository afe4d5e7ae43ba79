use log::{debug, warn};
use ndarray::Axis;
use rayon::prelude::*;

use super::Metric;
use crate::{
    MlErr, Result,
    arch::{Model, ProcessorOpt, loss::LossFn},
    dataset::{Dataset, Indexed, Label},
    graph::Graph,
};

/// Measures a model on a held-out dataset without touching its parameters.
///
/// Every sample is processed on its own graph, in parallel.
pub struct Evaluator<'a, L: LossFn + ?Sized> {
    loss_fn: &'a L,
    options: &'a [ProcessorOpt],
}

enum Outcome {
    Hit(bool),
    Loss(f32),
}

impl<'a, L: LossFn + ?Sized> Evaluator<'a, L> {
    /// Creates a new `Evaluator`.
    ///
    /// # Arguments
    /// * `loss_fn` - The loss used for samples labelled with values.
    /// * `options` - The options processors are built with.
    pub fn new(loss_fn: &'a L, options: &'a [ProcessorOpt]) -> Self {
        Self { loss_fn, options }
    }

    /// Evaluates `model` on every sample of `dataset`.
    ///
    /// Samples that fail with a recoverable error are left out of the metric.
    ///
    /// # Returns
    /// The accuracy if every sample has a class label, the mean loss otherwise.
    pub fn evaluate(&self, model: &dyn Model, dataset: &Dataset) -> Result<Metric> {
        let samples: Vec<_> = dataset.iter().collect();
        let classify = samples
            .iter()
            .all(|(_, sample)| matches!(sample.label, Label::Class(_)));

        let outcomes: Vec<Outcome> = samples
            .par_iter()
            .map(|&sample| self.evaluate_one(model, sample, classify))
            .filter_map(|outcome| match outcome {
                Err(e) if e.is_recoverable() => {
                    warn!("left a sample out of the evaluation: {e}");
                    None
                }
                other => Some(other),
            })
            .collect::<Result<_>>()?;

        if outcomes.is_empty() {
            return Err(MlErr::DatasetLoad(
                "none of the held-out samples could be evaluated".into(),
            ));
        }

        let n = outcomes.len() as f32;
        let metric = if classify {
            let hits = outcomes
                .iter()
                .filter(|outcome| matches!(outcome, Outcome::Hit(true)))
                .count();
            Metric::Accuracy(hits as f32 / n)
        } else {
            let total: f32 = outcomes
                .iter()
                .map(|outcome| match outcome {
                    Outcome::Loss(loss) => *loss,
                    Outcome::Hit(_) => 0.,
                })
                .sum();
            Metric::Loss(total / n)
        };

        debug!(samples = outcomes.len(), metric:? = metric; "evaluated");
        Ok(metric)
    }

    fn evaluate_one(
        &self,
        model: &dyn Model,
        (index, sample): Indexed<'_>,
        classify: bool,
    ) -> Result<Outcome> {
        let graph = Graph::new();
        let mut proc = model.new_processor(&graph, self.options)?;

        let x = graph.new_vector(sample.x.clone());
        let y = *proc
            .forward(&[x])?
            .first()
            .ok_or(MlErr::MalformedSample {
                index,
                reason: "the model produced no output",
            })?;

        if !classify {
            let loss = self.loss_fn.loss(&graph, y, &sample.label, index)?;
            return Ok(Outcome::Loss(graph.scalar(loss)?));
        }

        let output = graph.value(y)?;
        let predicted = output
            .index_axis(Axis(1), 0)
            .iter()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (i, &v)| {
                if v > best.1 { (i, v) } else { best }
            })
            .0;

        Ok(Outcome::Hit(matches!(sample.label, Label::Class(c) if c == predicted)))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::{
        arch::{LinearRegression, loss::Mse},
        dataset::Sample,
    };

    fn swap() -> LinearRegression {
        let mut model = LinearRegression::new(2, 2);
        model.for_each_param_mut(&mut |w| w.value_mut().assign(&array![[0.0, 1.0], [1.0, 0.0]]));
        model
    }

    #[test]
    fn accuracy_over_class_labels() {
        let dataset = Dataset::new(vec![
            Sample::new(vec![0.0, 1.0], Label::Class(0)),
            Sample::new(vec![1.0, 0.0], Label::Class(1)),
            Sample::new(vec![1.0, 0.0], Label::Class(0)),
            Sample::new(vec![0.0, 1.0], Label::Class(1)),
        ])
        .unwrap();

        let metric = Evaluator::new(&Mse, &[]).evaluate(&swap(), &dataset).unwrap();
        assert_eq!(metric, Metric::Accuracy(0.5));
    }

    #[test]
    fn mean_loss_over_value_labels() {
        let dataset = Dataset::new(vec![
            Sample::new(vec![1.0, 0.0], Label::Values(vec![0.0, 1.0])),
            Sample::new(vec![1.0, 0.0], Label::Values(vec![0.0, 0.0])),
        ])
        .unwrap();

        let metric = Evaluator::new(&Mse, &[]).evaluate(&swap(), &dataset).unwrap();
        assert_eq!(metric, Metric::Loss(0.25));
    }

    #[test]
    fn malformed_samples_are_left_out() {
        let dataset = Dataset::new(vec![
            Sample::new(vec![0.0, 1.0], Label::Class(0)),
            Sample::new(vec![1.0, 0.0, 5.0], Label::Class(0)),
        ])
        .unwrap();

        let metric = Evaluator::new(&Mse, &[]).evaluate(&swap(), &dataset).unwrap();
        assert_eq!(metric, Metric::Accuracy(1.0));
    }

    #[test]
    fn evaluation_leaves_values_and_gradients_alone() {
        let dataset = Dataset::new(vec![
            Sample::new(vec![1.0, 0.0], Label::Values(vec![0.0, 1.0])),
            Sample::new(vec![0.0, 1.0], Label::Class(1)),
        ])
        .unwrap();

        let model = swap();
        let pending = array![[1.0, 2.0], [3.0, 4.0]];
        model.params()[0].accumulate_grad(pending.view()).unwrap();

        Evaluator::new(&Mse, &[]).evaluate(&model, &dataset).unwrap();

        let w = model.params()[0];
        assert_eq!(w.value(), array![[0.0, 1.0], [1.0, 0.0]]);
        assert_eq!(w.grad(), Some(pending));

        let untouched = swap();
        Evaluator::new(&Mse, &[]).evaluate(&untouched, &dataset).unwrap();
        assert!(!untouched.params()[0].has_grad());
    }
}
