pub mod activations;
pub mod codec;
mod layer;
mod linear_regression;
pub mod loss;
mod model;
mod param;
mod perceptron;
mod spec;
mod stack;

pub use layer::Layer;
pub use linear_regression::{LinearRegression, LinearRegressionConfig};
pub use model::{Model, Processor, ProcessorOpt};
pub use param::{Param, ParamKind};
pub use perceptron::{Perceptron, PerceptronConfig};
pub use spec::{LayerSpec, LossFnSpec, StackSpec};
pub use stack::Stack;
