use ndarray::{Array1, Array2, ArrayView2, Axis};
use parking_lot::RwLock;

use super::op::Op;
use crate::{
    MlErr, Result,
    arch::{Param, activations::ActFn},
};

/// A handle to a node of a `Graph`.
///
/// Handles are plain indices, they are only meaningful for the graph that created them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Node(usize);

impl Node {
    pub fn id(&self) -> usize {
        self.0
    }
}

#[derive(Debug)]
enum Value<'p> {
    Owned(Array2<f32>),
    Param(&'p Param),
}

#[derive(Debug)]
pub(super) struct NodeData<'p> {
    value: Value<'p>,
    op: Op,
    grad: Option<Array2<f32>>,
    pub(super) requires_grad: bool,
}

impl NodeData<'_> {
    pub(super) fn value(&self) -> ArrayView2<'_, f32> {
        match &self.value {
            Value::Owned(value) => value.view(),
            Value::Param(param) => param.value(),
        }
    }
}

/// A define-by-run automatic differentiation graph.
///
/// Every operation is evaluated as soon as it's recorded. Since operands always precede
/// the nodes that use them, the reverse creation order is a valid order for the backward
/// pass.
///
/// Parameters enter the graph through `wrap`, which borrows them for `'p`. The model
/// owning them therefore stays immutably borrowed until the graph is dropped, and no
/// optimizer can write into them meanwhile.
///
/// Nodes can be recorded from several threads at once.
#[derive(Debug, Default)]
pub struct Graph<'p> {
    nodes: RwLock<Vec<NodeData<'p>>>,
}

impl<'p> Graph<'p> {
    /// Creates a new empty `Graph`.
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(Vec::new()),
        }
    }

    /// Returns the amount of nodes recorded so far.
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// Exposes `param` as a node without copying its value.
    pub fn wrap(&self, param: &'p Param) -> Node {
        self.push(NodeData {
            value: Value::Param(param),
            op: Op::Wrap,
            grad: None,
            requires_grad: true,
        })
    }

    /// Records a constant.
    pub fn new_constant(&self, value: Array2<f32>) -> Node {
        self.push(NodeData {
            value: Value::Owned(value),
            op: Op::Input,
            grad: None,
            requires_grad: false,
        })
    }

    /// Records a constant column vector.
    pub fn new_vector(&self, values: Vec<f32>) -> Node {
        self.new_constant(Array1::from(values).insert_axis(Axis(1)))
    }

    pub fn new_scalar(&self, value: f32) -> Node {
        self.new_constant(Array2::from_elem((1, 1), value))
    }

    /// Returns a copy of the value of `node`.
    pub fn value(&self, node: Node) -> Result<Array2<f32>> {
        let nodes = self.nodes.read();
        Ok(Self::get(&nodes, node)?.value().to_owned())
    }

    /// Returns the value of a `1x1` node.
    pub fn scalar(&self, node: Node) -> Result<f32> {
        let nodes = self.nodes.read();
        let value = Self::get(&nodes, node)?.value();

        match value.dim() {
            (1, 1) => Ok(value[[0, 0]]),
            dim => Err(MlErr::NotScalar(dim)),
        }
    }

    /// Returns the gradient of `node` computed by the last backward pass, if it got one.
    pub fn grad(&self, node: Node) -> Result<Option<Array2<f32>>> {
        let nodes = self.nodes.read();
        Ok(Self::get(&nodes, node)?.grad.clone())
    }

    /// Matrix product `a · b`.
    pub fn mul(&self, a: Node, b: Node) -> Result<Node> {
        self.record(&[a, b], Op::Mul(a.0, b.0), |vals| {
            let (va, vb) = (vals[0], vals[1]);

            if va.ncols() != vb.nrows() {
                return Err(MlErr::DimensionMismatch {
                    op: "mul",
                    got: vb.dim(),
                    expected: (va.ncols(), vb.ncols()),
                });
            }

            Ok(va.dot(&vb))
        })
    }

    pub fn add(&self, a: Node, b: Node) -> Result<Node> {
        self.record(&[a, b], Op::Add(a.0, b.0), |vals| {
            same_shape("add", vals[0], vals[1])?;
            Ok(&vals[0] + &vals[1])
        })
    }

    pub fn sub(&self, a: Node, b: Node) -> Result<Node> {
        self.record(&[a, b], Op::Sub(a.0, b.0), |vals| {
            same_shape("sub", vals[0], vals[1])?;
            Ok(&vals[0] - &vals[1])
        })
    }

    /// Applies `act_fn` to `x`.
    pub fn activate(&self, act_fn: ActFn, x: Node) -> Result<Node> {
        self.record(&[x], Op::Activate(act_fn, x.0), |vals| {
            Ok(act_fn.forward(vals[0]))
        })
    }

    /// Element-wise sum of equally shaped nodes. The sum of nothing is a `0` constant.
    pub fn sum(&self, xs: &[Node]) -> Result<Node> {
        if xs.is_empty() {
            return Ok(self.new_scalar(0.));
        }

        let ids = xs.iter().map(|x| x.0).collect();
        self.record(xs, Op::Sum(ids), |vals| {
            let mut acc = vals[0].to_owned();
            for val in &vals[1..] {
                same_shape("sum", vals[0], *val)?;
                acc += val;
            }
            Ok(acc)
        })
    }

    /// Multiplies every element of `x` by `factor`.
    pub fn scale(&self, x: Node, factor: f32) -> Result<Node> {
        self.record(&[x], Op::Scale(x.0, factor), |vals| {
            Ok(vals[0].mapv(|v| v * factor))
        })
    }

    /// Element-wise mean of equally shaped nodes.
    pub fn mean(&self, xs: &[Node]) -> Result<Node> {
        let total = self.sum(xs)?;
        self.scale(total, 1. / xs.len().max(1) as f32)
    }

    /// The linear map `w · x`.
    pub fn linear(&self, w: Node, x: Node) -> Result<Node> {
        self.mul(w, x)
    }

    /// The affine map `w · x + b`.
    pub fn affine(&self, w: Node, b: Node, x: Node) -> Result<Node> {
        let wx = self.mul(w, x)?;
        self.add(wx, b)
    }

    /// Mean squared error between `y` and `target`, a `1x1` node.
    pub fn mse(&self, y: Node, target: Node) -> Result<Node> {
        let op = Op::Mse {
            y: y.0,
            target: target.0,
        };

        self.record(&[y, target], op, |vals| {
            same_shape("mse", vals[0], vals[1])?;
            let diff = &vals[0] - &vals[1];
            let loss = diff.mapv(|d| d * d).mean().unwrap_or_default();
            Ok(Array2::from_elem((1, 1), loss))
        })
    }

    /// Cross entropy between the softmax of the `logits` column and the one-hot `class`.
    pub fn cross_entropy(&self, logits: Node, class: usize) -> Result<Node> {
        let op = Op::CrossEntropy {
            logits: logits.0,
            class,
        };

        self.record(&[logits], op, |vals| {
            let (rows, cols) = vals[0].dim();
            if cols != 1 || class >= rows {
                return Err(MlErr::DimensionMismatch {
                    op: "cross_entropy",
                    got: (rows, cols),
                    expected: (rows.max(class + 1), 1),
                });
            }

            let max = vals[0].fold(f32::NEG_INFINITY, |m, &z| m.max(z));
            let log_sum = vals[0].mapv(|z| (z - max).exp()).sum().ln() + max;
            Ok(Array2::from_elem((1, 1), log_sum - vals[0][[class, 0]]))
        })
    }

    /// Back-propagates from the `1x1` node `loss`.
    ///
    /// Gradients of a previous pass are discarded. Every wrapped parameter reached gets
    /// its gradient added to its accumulator.
    pub fn backward(&self, loss: Node) -> Result<()> {
        let mut nodes = self.nodes.write();
        let root = Self::get(&nodes, loss)?;

        if root.value().dim() != (1, 1) {
            return Err(MlErr::NotScalar(root.value().dim()));
        }

        nodes.iter_mut().for_each(|node| node.grad = None);
        nodes[loss.0].grad = Some(Array2::ones((1, 1)));

        for i in (0..=loss.0).rev() {
            let Some(gy) = nodes[i].grad.take() else {
                continue;
            };

            let contributions = nodes[i].op.backward(&nodes, nodes[i].value(), gy.view());

            for (j, g) in contributions {
                if !nodes[j].requires_grad {
                    continue;
                }

                let slot = &mut nodes[j].grad;
                *slot = Some(match slot.take() {
                    Some(acc) => acc + &g,
                    None => g,
                });
            }

            if let Value::Param(param) = nodes[i].value {
                param.accumulate_grad(gy.view())?;
            }

            nodes[i].grad = Some(gy);
        }

        Ok(())
    }

    fn get<'n>(nodes: &'n [NodeData<'p>], node: Node) -> Result<&'n NodeData<'p>> {
        nodes.get(node.0).ok_or(MlErr::UnknownNode(node.0))
    }

    fn push(&self, data: NodeData<'p>) -> Node {
        let mut nodes = self.nodes.write();
        nodes.push(data);
        Node(nodes.len() - 1)
    }

    /// Evaluates `f` over the values of `operands` and records its output under `op`.
    fn record<F>(&self, operands: &[Node], op: Op, f: F) -> Result<Node>
    where
        F: FnOnce(&[ArrayView2<f32>]) -> Result<Array2<f32>>,
    {
        let (value, requires_grad) = {
            let nodes = self.nodes.read();
            let vals = operands
                .iter()
                .map(|&node| Self::get(&nodes, node).map(NodeData::value))
                .collect::<Result<Vec<_>>>()?;

            (f(&vals)?, op.requires_grad(&nodes))
        };

        Ok(self.push(NodeData {
            value: Value::Owned(value),
            op,
            grad: None,
            requires_grad,
        }))
    }
}

fn same_shape(op: &'static str, a: ArrayView2<f32>, b: ArrayView2<f32>) -> Result<()> {
    if a.dim() != b.dim() {
        return Err(MlErr::DimensionMismatch {
            op,
            got: b.dim(),
            expected: a.dim(),
        });
    }

    Ok(())
}
