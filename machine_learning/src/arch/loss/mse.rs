use super::LossFn;
use crate::{
    MlErr, Result,
    dataset::Label,
    graph::{Graph, Node},
};

/// Mean squared error loss function.
///
/// Class labels are compared against their one-hot encoding.
#[derive(Debug, Default, Clone, Copy)]
pub struct Mse;

impl Mse {
    /// Returns a new `Mse`.
    pub fn new() -> Self {
        Self
    }
}

impl LossFn for Mse {
    fn loss(&self, graph: &Graph<'_>, y: Node, label: &Label, index: usize) -> Result<Node> {
        let target = match label {
            Label::Values(values) => values.clone(),
            &Label::Class(class) => {
                let rows = graph.value(y)?.nrows();
                if class >= rows {
                    return Err(MlErr::MalformedSample {
                        index,
                        reason: "class out of the output range",
                    });
                }

                let mut one_hot = vec![0.; rows];
                one_hot[class] = 1.;
                one_hot
            }
        };

        let target = graph.new_vector(target);
        graph.mse(y, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_and_one_hot_targets() {
        let graph: Graph<'_> = Graph::new();
        let y = graph.new_vector(vec![1.0, 0.0]);

        let loss = Mse.loss(&graph, y, &Label::Values(vec![0.0, 0.0]), 0).unwrap();
        assert_eq!(graph.scalar(loss).unwrap(), 0.5);

        let loss = Mse.loss(&graph, y, &Label::Class(0), 0).unwrap();
        assert_eq!(graph.scalar(loss).unwrap(), 0.0);
    }

    #[test]
    fn out_of_range_class_is_a_malformed_sample() {
        let graph: Graph<'_> = Graph::new();
        let y = graph.new_vector(vec![1.0, 0.0]);

        let res = Mse.loss(&graph, y, &Label::Class(2), 9);
        assert!(matches!(res, Err(MlErr::MalformedSample { index: 9, .. })));
    }
}
