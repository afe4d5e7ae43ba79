use super::LossFn;
use crate::{
    MlErr, Result,
    dataset::Label,
    graph::{Graph, Node},
};

/// Softmax cross entropy against a class label.
///
/// The softmax is part of the loss, models trained with it should output raw logits.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrossEntropy;

impl CrossEntropy {
    /// Returns a new `CrossEntropy`.
    pub fn new() -> Self {
        Self
    }
}

impl LossFn for CrossEntropy {
    fn loss(&self, graph: &Graph<'_>, y: Node, label: &Label, index: usize) -> Result<Node> {
        let &Label::Class(class) = label else {
            return Err(MlErr::MalformedSample {
                index,
                reason: "cross entropy needs a class label",
            });
        };

        if class >= graph.value(y)?.nrows() {
            return Err(MlErr::MalformedSample {
                index,
                reason: "class out of the output range",
            });
        }

        graph.cross_entropy(y, class)
    }
}
