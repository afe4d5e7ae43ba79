use super::{Model, Param, Processor, ProcessorOpt, model::fan_out};
use crate::{
    MlErr, Result,
    graph::{Graph, Node},
};

/// A linear map `y = W · x` without biases.
#[derive(Debug)]
pub struct LinearRegression {
    w: Param,
}

impl LinearRegression {
    /// Creates a new `LinearRegression`.
    ///
    /// # Arguments
    /// * `input` - The dimension of the inputs.
    /// * `output` - The dimension of the outputs.
    ///
    /// # Returns
    /// A new `LinearRegression` with its weights set to zero.
    pub fn new(input: usize, output: usize) -> Self {
        Self {
            w: Param::weights("w", output, input),
        }
    }

    pub fn input_size(&self) -> usize {
        self.w.shape().1
    }

    pub fn output_size(&self) -> usize {
        self.w.shape().0
    }
}

/// The processing options of a `LinearRegression`. It doesn't take any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinearRegressionConfig;

impl LinearRegressionConfig {
    pub fn from_opts(opts: &[ProcessorOpt]) -> Result<Self> {
        match opts.first() {
            Some(opt) => Err(MlErr::Configuration {
                model: "LinearRegression",
                option: format!("{opt:?}"),
            }),
            None => Ok(Self),
        }
    }
}

impl Model for LinearRegression {
    fn name(&self) -> &'static str {
        "LinearRegression"
    }

    fn for_each_param<'a>(&'a self, visit: &mut dyn FnMut(&'a Param)) {
        visit(&self.w);
    }

    fn for_each_param_mut(&mut self, visit: &mut dyn FnMut(&mut Param)) {
        visit(&mut self.w);
    }

    fn new_processor<'g, 'p>(
        &'p self,
        graph: &'g Graph<'p>,
        opts: &[ProcessorOpt],
    ) -> Result<Box<dyn Processor<'p> + 'g>> {
        LinearRegressionConfig::from_opts(opts)?;

        Ok(Box::new(LinearRegressionProcessor {
            model: self,
            graph,
            w: graph.wrap(&self.w),
            opts: opts.to_vec(),
        }))
    }
}

struct LinearRegressionProcessor<'g, 'p> {
    model: &'p LinearRegression,
    graph: &'g Graph<'p>,
    w: Node,
    opts: Vec<ProcessorOpt>,
}

impl<'p> Processor<'p> for LinearRegressionProcessor<'_, 'p> {
    fn model(&self) -> &'p dyn Model {
        self.model
    }

    fn graph(&self) -> &Graph<'p> {
        self.graph
    }

    fn requires_full_seq(&self) -> bool {
        false
    }

    fn reset(&mut self) -> Result<()> {
        LinearRegressionConfig::from_opts(&self.opts)?;
        self.w = self.graph.wrap(&self.model.w);
        Ok(())
    }

    fn forward(&mut self, xs: &[Node]) -> Result<Vec<Node>> {
        let (graph, w) = (self.graph, self.w);
        fan_out(xs, false, |x| graph.linear(w, x))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn forward_maps_each_input() {
        let mut model = LinearRegression::new(3, 2);
        model.for_each_param_mut(&mut |w| {
            w.value_mut()
                .assign(&array![[1.0, 0.0, 0.0], [0.0, 1.0, 1.0]])
        });

        let graph = Graph::new();
        let mut proc = model.new_processor(&graph, &[]).unwrap();
        let xs = [
            graph.new_vector(vec![1.0, 2.0, 3.0]),
            graph.new_vector(vec![-1.0, 0.0, 4.0]),
        ];

        let ys = proc.forward(&xs).unwrap();
        assert_eq!(ys.len(), 2);
        assert_eq!(graph.value(ys[0]).unwrap(), array![[1.0], [5.0]]);
        assert_eq!(graph.value(ys[1]).unwrap(), array![[-1.0], [4.0]]);
        assert!(!proc.requires_full_seq());
    }

    #[test]
    fn input_of_the_wrong_length_is_a_dimension_mismatch() {
        let model = LinearRegression::new(3, 2);
        let graph = Graph::new();
        let mut proc = model.new_processor(&graph, &[]).unwrap();

        let x = graph.new_vector(vec![0.0; 4]);
        let err = proc.forward(&[x]).unwrap_err();
        assert!(matches!(err, MlErr::DimensionMismatch { .. }));
    }

    #[test]
    fn any_option_is_rejected() {
        let model = LinearRegression::new(3, 2);
        let graph = Graph::new();

        for opt in [ProcessorOpt::Concurrent, ProcessorOpt::FullSequence] {
            let res = model.new_processor(&graph, &[opt]);
            assert!(matches!(
                res,
                Err(MlErr::Configuration {
                    model: "LinearRegression",
                    ..
                })
            ));
        }

        assert!(graph.is_empty());
    }

    #[test]
    fn reset_wraps_the_weights_again() {
        let model = LinearRegression::new(1, 1);
        let graph = Graph::new();
        let mut proc = model.new_processor(&graph, &[]).unwrap();

        proc.reset().unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(proc.model().name(), "LinearRegression");
    }
}
