use std::io::{Read, Write};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{Param, activations::ActFn, codec};
use crate::{
    Result,
    graph::{Graph, Node},
};

/// The options a processor can be built with.
///
/// Each model decides which of them it understands; building a processor with any other
/// option is a configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorOpt {
    /// Record the forward pass of every input in parallel.
    Concurrent,
    /// Ask to be fed whole sequences instead of one input at a time.
    FullSequence,
}

/// A trainable model: a tree of parameters that knows how to process inputs.
///
/// Models own their parameters for their entire life. Computations happen in a
/// `Processor`, a short-lived binding of those parameters into a `Graph`.
pub trait Model: Send + Sync {
    /// The name of the model's variant.
    fn name(&self) -> &'static str;

    /// Visits every parameter, depth first, in a stable order.
    ///
    /// # Arguments
    /// * `visit` - Called once per parameter.
    fn for_each_param<'a>(&'a self, visit: &mut dyn FnMut(&'a Param));

    /// Same as `for_each_param` but with mutable access, in the same order.
    fn for_each_param_mut(&mut self, visit: &mut dyn FnMut(&mut Param));

    /// Builds a processor bound to `graph`, wrapping every parameter of the model.
    ///
    /// # Arguments
    /// * `graph` - The graph the processor will record its operations into.
    /// * `opts` - The options for this processor.
    ///
    /// # Returns
    /// The processor, or a `Configuration` error if any option is unsupported.
    fn new_processor<'g, 'p>(
        &'p self,
        graph: &'g Graph<'p>,
        opts: &[ProcessorOpt],
    ) -> Result<Box<dyn Processor<'p> + 'g>>;

    /// The activation applied to the output of this model, if any.
    fn activation(&self) -> Option<ActFn> {
        None
    }

    /// Collects the parameters in traversal order.
    fn params(&self) -> Vec<&Param> {
        let mut params = Vec::new();
        self.for_each_param(&mut |param| params.push(param));
        params
    }

    /// Returns the amount of scalars held by all the parameters.
    fn size(&self) -> usize {
        let mut size = 0;
        self.for_each_param(&mut |param| size += param.len());
        size
    }

    /// Clears every gradient accumulator.
    fn zero_grad(&self) {
        self.for_each_param(&mut |param| param.zero_grad());
    }

    /// Writes the parameter values into `sink` in traversal order.
    ///
    /// # Returns
    /// The amount of bytes written.
    fn serialize(&self, sink: &mut dyn Write) -> Result<usize> {
        codec::serialize(self, sink)
    }

    /// Restores the parameter values from a stream written by `serialize`.
    ///
    /// # Returns
    /// The amount of bytes read, or a `StructuralMismatch` error if the stream doesn't fit
    /// this model. On error the model is left untouched.
    fn deserialize(&mut self, source: &mut dyn Read) -> Result<usize> {
        codec::deserialize(self, source)
    }
}

/// A model's parameters bound to a specific graph.
///
/// A processor can't outlive its graph and is meant to be thrown away with it.
pub trait Processor<'p>: Send {
    /// The model this processor was built from.
    fn model(&self) -> &'p dyn Model;

    /// The graph this processor records into.
    fn graph(&self) -> &Graph<'p>;

    /// Whether the processor must see an entire sequence before producing any output.
    fn requires_full_seq(&self) -> bool;

    /// Runs the construction-time validation and initialization again.
    fn reset(&mut self) -> Result<()>;

    /// Records the forward computation of every input.
    ///
    /// # Arguments
    /// * `xs` - The input nodes.
    ///
    /// # Returns
    /// One output node per input, in the same order.
    fn forward(&mut self, xs: &[Node]) -> Result<Vec<Node>>;
}

/// Applies `f` to every input, sequentially or over the rayon pool.
pub(crate) fn fan_out<F>(xs: &[Node], concurrent: bool, f: F) -> Result<Vec<Node>>
where
    F: Fn(Node) -> Result<Node> + Send + Sync,
{
    if concurrent {
        xs.par_iter().map(|&x| f(x)).collect()
    } else {
        xs.iter().map(|&x| f(x)).collect()
    }
}
