use super::{Model, Param, Processor, ProcessorOpt, activations::ActFn, model::fan_out};
use crate::{
    Result,
    graph::{Graph, Node},
};

/// A fully connected layer: `y = act(W · x + b)`.
#[derive(Debug)]
pub struct Perceptron {
    w: Param,
    b: Param,
    act_fn: ActFn,
}

impl Perceptron {
    /// Creates a new `Perceptron`.
    ///
    /// # Arguments
    /// * `input` - The dimension of the inputs.
    /// * `output` - The dimension of the outputs.
    /// * `act_fn` - The activation applied to the affine map.
    ///
    /// # Returns
    /// A new `Perceptron` with every parameter set to zero.
    pub fn new(input: usize, output: usize, act_fn: ActFn) -> Self {
        Self {
            w: Param::weights("w", output, input),
            b: Param::biases("b", output),
            act_fn,
        }
    }

    pub fn input_size(&self) -> usize {
        self.w.shape().1
    }

    pub fn output_size(&self) -> usize {
        self.w.shape().0
    }
}

/// The processing options of a `Perceptron`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerceptronConfig {
    pub concurrent: bool,
    pub full_sequence: bool,
}

impl PerceptronConfig {
    pub fn from_opts(opts: &[ProcessorOpt]) -> Result<Self> {
        let mut config = Self::default();

        for opt in opts {
            match opt {
                ProcessorOpt::Concurrent => config.concurrent = true,
                ProcessorOpt::FullSequence => config.full_sequence = true,
            }
        }

        Ok(config)
    }
}

impl Model for Perceptron {
    fn name(&self) -> &'static str {
        "Perceptron"
    }

    fn for_each_param<'a>(&'a self, visit: &mut dyn FnMut(&'a Param)) {
        visit(&self.w);
        visit(&self.b);
    }

    fn for_each_param_mut(&mut self, visit: &mut dyn FnMut(&mut Param)) {
        visit(&mut self.w);
        visit(&mut self.b);
    }

    fn new_processor<'g, 'p>(
        &'p self,
        graph: &'g Graph<'p>,
        opts: &[ProcessorOpt],
    ) -> Result<Box<dyn Processor<'p> + 'g>> {
        let config = PerceptronConfig::from_opts(opts)?;

        Ok(Box::new(PerceptronProcessor {
            model: self,
            graph,
            w: graph.wrap(&self.w),
            b: graph.wrap(&self.b),
            opts: opts.to_vec(),
            config,
        }))
    }

    fn activation(&self) -> Option<ActFn> {
        Some(self.act_fn)
    }
}

struct PerceptronProcessor<'g, 'p> {
    model: &'p Perceptron,
    graph: &'g Graph<'p>,
    w: Node,
    b: Node,
    opts: Vec<ProcessorOpt>,
    config: PerceptronConfig,
}

impl<'p> Processor<'p> for PerceptronProcessor<'_, 'p> {
    fn model(&self) -> &'p dyn Model {
        self.model
    }

    fn graph(&self) -> &Graph<'p> {
        self.graph
    }

    fn requires_full_seq(&self) -> bool {
        self.config.full_sequence
    }

    fn reset(&mut self) -> Result<()> {
        self.config = PerceptronConfig::from_opts(&self.opts)?;
        self.w = self.graph.wrap(&self.model.w);
        self.b = self.graph.wrap(&self.model.b);
        Ok(())
    }

    fn forward(&mut self, xs: &[Node]) -> Result<Vec<Node>> {
        let (graph, w, b, act_fn) = (self.graph, self.w, self.b, self.model.act_fn);

        fan_out(xs, self.config.concurrent, |x| {
            let z = graph.affine(w, b, x)?;
            match act_fn {
                ActFn::Identity => Ok(z),
                act_fn => graph.activate(act_fn, z),
            }
        })
    }
}
