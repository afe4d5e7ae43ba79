use crate::{
    MlErr, Result,
    dataset::{Indexed, Label},
    graph::{Graph, Node},
};

/// A loss recorded into a graph so it can be back-propagated.
pub trait LossFn: Send + Sync {
    /// Records the loss of a single prediction.
    ///
    /// # Arguments
    /// * `graph` - The graph `y` belongs to.
    /// * `y` - The prediction.
    /// * `label` - The expected output.
    /// * `index` - The position of the sample in its dataset, used when reporting it.
    ///
    /// # Returns
    /// A `1x1` node or a `MalformedSample` error if `label` can't be used with this loss.
    fn loss(&self, graph: &Graph<'_>, y: Node, label: &Label, index: usize) -> Result<Node>;

    /// Records the mean loss of a batch of predictions.
    ///
    /// # Returns
    /// A `1x1` node or a `DimensionMismatch` error if there isn't exactly one prediction per
    /// sample.
    fn batch_loss(&self, graph: &Graph<'_>, ys: &[Node], samples: &[Indexed<'_>]) -> Result<Node> {
        if ys.len() != samples.len() {
            return Err(MlErr::DimensionMismatch {
                op: "batch_loss",
                got: (ys.len(), 1),
                expected: (samples.len(), 1),
            });
        }

        let losses = ys
            .iter()
            .zip(samples)
            .map(|(&y, &(index, sample))| self.loss(graph, y, &sample.label, index))
            .collect::<Result<Vec<_>>>()?;

        graph.mean(&losses)
    }
}

impl<L: LossFn + ?Sized> LossFn for Box<L> {
    fn loss(&self, graph: &Graph<'_>, y: Node, label: &Label, index: usize) -> Result<Node> {
        (**self).loss(graph, y, label, index)
    }
}
