use super::{Layer, Model, Param, Processor, ProcessorOpt, activations::ActFn};
use crate::{
    Result,
    graph::{Graph, Node},
};

/// A sequential composition of layers: every layer is fed the output of the previous one.
///
/// The order of the layers defines the forward composition, the parameter traversal and the
/// gains used to initialize each layer.
#[derive(Debug, Default)]
pub struct Stack {
    layers: Vec<Layer>,
}

impl Stack {
    /// Creates a new `Stack`.
    ///
    /// # Arguments
    /// * `layers` - The layers the stack is composed of, in forward order.
    ///
    /// # Returns
    /// A new `Stack` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Appends `layer` to the end of the stack.
    pub fn push(&mut self, layer: impl Into<Layer>) {
        self.layers.push(layer.into());
    }
}

impl Model for Stack {
    fn name(&self) -> &'static str {
        "Stack"
    }

    fn for_each_param<'a>(&'a self, visit: &mut dyn FnMut(&'a Param)) {
        for layer in &self.layers {
            layer.for_each_param(visit);
        }
    }

    fn for_each_param_mut(&mut self, visit: &mut dyn FnMut(&mut Param)) {
        for layer in &mut self.layers {
            layer.for_each_param_mut(visit);
        }
    }

    fn new_processor<'g, 'p>(
        &'p self,
        graph: &'g Graph<'p>,
        opts: &[ProcessorOpt],
    ) -> Result<Box<dyn Processor<'p> + 'g>> {
        let children = self
            .layers
            .iter()
            .map(|layer| layer.new_processor(graph, opts))
            .collect::<Result<_>>()?;

        Ok(Box::new(StackProcessor {
            model: self,
            graph,
            children,
        }))
    }

    fn activation(&self) -> Option<ActFn> {
        self.layers.last().and_then(|layer| layer.activation())
    }
}

struct StackProcessor<'g, 'p> {
    model: &'p Stack,
    graph: &'g Graph<'p>,
    children: Vec<Box<dyn Processor<'p> + 'g>>,
}

impl<'p> Processor<'p> for StackProcessor<'_, 'p> {
    fn model(&self) -> &'p dyn Model {
        self.model
    }

    fn graph(&self) -> &Graph<'p> {
        self.graph
    }

    fn requires_full_seq(&self) -> bool {
        self.children.iter().any(|child| child.requires_full_seq())
    }

    fn reset(&mut self) -> Result<()> {
        self.children.iter_mut().try_for_each(|child| child.reset())
    }

    fn forward(&mut self, xs: &[Node]) -> Result<Vec<Node>> {
        let mut ys = xs.to_vec();

        for child in &mut self.children {
            ys = child.forward(&ys)?;
        }

        Ok(ys)
    }
}
