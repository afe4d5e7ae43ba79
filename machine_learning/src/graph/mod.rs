mod engine;
mod op;

pub use engine::{Graph, Node};
