mod initializer;
mod xavier;

pub use initializer::{InitScheme, Initializer, gain};
pub use xavier::{xavier_normal, xavier_uniform};
