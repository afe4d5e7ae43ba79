use super::{
    LinearRegression, Model, Param, Perceptron, Processor, ProcessorOpt, Stack,
    activations::ActFn,
};
use crate::{Result, graph::Graph};

/// Every model that can be stacked.
#[derive(Debug)]
pub enum Layer {
    LinearRegression(LinearRegression),
    Perceptron(Perceptron),
    Stack(Stack),
}

impl Layer {
    pub fn linear_regression(input: usize, output: usize) -> Self {
        Self::LinearRegression(LinearRegression::new(input, output))
    }

    pub fn perceptron(input: usize, output: usize, act_fn: ActFn) -> Self {
        Self::Perceptron(Perceptron::new(input, output, act_fn))
    }

    fn inner(&self) -> &dyn Model {
        match self {
            Self::LinearRegression(m) => m,
            Self::Perceptron(m) => m,
            Self::Stack(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Model {
        match self {
            Self::LinearRegression(m) => m,
            Self::Perceptron(m) => m,
            Self::Stack(m) => m,
        }
    }
}

impl Model for Layer {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn for_each_param<'a>(&'a self, visit: &mut dyn FnMut(&'a Param)) {
        self.inner().for_each_param(visit)
    }

    fn for_each_param_mut(&mut self, visit: &mut dyn FnMut(&mut Param)) {
        self.inner_mut().for_each_param_mut(visit)
    }

    fn new_processor<'g, 'p>(
        &'p self,
        graph: &'g Graph<'p>,
        opts: &[ProcessorOpt],
    ) -> Result<Box<dyn Processor<'p> + 'g>> {
        self.inner().new_processor(graph, opts)
    }

    fn activation(&self) -> Option<ActFn> {
        self.inner().activation()
    }
}

impl From<LinearRegression> for Layer {
    fn from(model: LinearRegression) -> Self {
        Self::LinearRegression(model)
    }
}

impl From<Perceptron> for Layer {
    fn from(model: Perceptron) -> Self {
        Self::Perceptron(model)
    }
}

impl From<Stack> for Layer {
    fn from(model: Stack) -> Self {
        Self::Stack(model)
    }
}
