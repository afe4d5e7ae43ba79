use ndarray::{Array2, ArrayView2};

use crate::arch::{activations::ActFn, activations::softmax};

use super::engine::NodeData;

/// The operation that produced a node, with the indices of its operands.
#[derive(Debug, Clone)]
pub(super) enum Op {
    /// A constant, gradients stop here.
    Input,
    /// A parameter wrapped from outside the graph.
    Wrap,
    Mul(usize, usize),
    Add(usize, usize),
    Sub(usize, usize),
    Activate(ActFn, usize),
    Sum(Vec<usize>),
    Scale(usize, f32),
    Mse { y: usize, target: usize },
    CrossEntropy { logits: usize, class: usize },
}

impl Op {
    /// Returns whether this operation's output depends on a trainable node.
    pub(super) fn requires_grad(&self, nodes: &[NodeData<'_>]) -> bool {
        let req = |i: usize| nodes[i].requires_grad;

        match self {
            Op::Input => false,
            Op::Wrap => true,
            Op::Mul(a, b) | Op::Add(a, b) | Op::Sub(a, b) => req(*a) || req(*b),
            Op::Activate(_, x) | Op::Scale(x, _) => req(*x),
            Op::Sum(xs) => xs.iter().any(|&x| req(x)),
            Op::Mse { y, target } => req(*y) || req(*target),
            Op::CrossEntropy { logits, .. } => req(*logits),
        }
    }

    /// Applies the chain rule to the node holding this operation.
    ///
    /// # Arguments
    /// * `nodes` - Every node of the graph.
    /// * `out` - The value of the node holding this operation.
    /// * `gy` - The gradient with respect to `out`.
    ///
    /// # Returns
    /// The gradient contribution for each operand.
    pub(super) fn backward(
        &self,
        nodes: &[NodeData<'_>],
        out: ArrayView2<f32>,
        gy: ArrayView2<f32>,
    ) -> Vec<(usize, Array2<f32>)> {
        let val = |i: usize| nodes[i].value();

        match self {
            Op::Input | Op::Wrap => Vec::new(),
            Op::Mul(a, b) => vec![
                (*a, gy.dot(&val(*b).t())),
                (*b, val(*a).t().dot(&gy)),
            ],
            Op::Add(a, b) => vec![(*a, gy.to_owned()), (*b, gy.to_owned())],
            Op::Sub(a, b) => vec![(*a, gy.to_owned()), (*b, gy.mapv(|g| -g))],
            Op::Activate(act_fn, x) => vec![(*x, act_fn.backward(val(*x), out, gy))],
            Op::Sum(xs) => xs.iter().map(|&x| (x, gy.to_owned())).collect(),
            Op::Scale(x, factor) => vec![(*x, gy.mapv(|g| g * factor))],
            Op::Mse { y, target } => {
                let g = gy[[0, 0]];
                let diff = &val(*y) - &val(*target);
                let dy = diff.mapv(|d| d * 2. * g / diff.len() as f32);
                let dt = dy.mapv(|d| -d);
                vec![(*y, dy), (*target, dt)]
            }
            Op::CrossEntropy { logits, class } => {
                let g = gy[[0, 0]];
                let mut dx = softmax(val(*logits));
                dx[[*class, 0]] -= 1.;
                dx.mapv_inplace(|d| d * g);
                vec![(*logits, dx)]
            }
        }
    }
}
