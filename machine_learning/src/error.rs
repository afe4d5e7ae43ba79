use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    /// A processor was built with options its model does not recognize.
    Configuration {
        model: &'static str,
        option: String,
    },
    /// An operand's shape disagrees with what the operation expects.
    DimensionMismatch {
        op: &'static str,
        got: (usize, usize),
        expected: (usize, usize),
    },
    /// A parameter stream doesn't match the live parameter tree.
    StructuralMismatch(String),
    /// The dataset couldn't be loaded or is unusable.
    DatasetLoad(String),
    /// A sample can't be used with the configured loss.
    MalformedSample {
        index: usize,
        reason: &'static str,
    },
    /// The loss of a batch evaluated to NaN or infinity.
    NonFiniteLoss(f32),
    /// Every batch of an epoch failed.
    NoValidBatches {
        epoch: usize,
        skipped: usize,
    },
    /// A node handle doesn't belong to the graph it was used with.
    UnknownNode(usize),
    /// An operation that requires a single value got a bigger tensor.
    NotScalar((usize, usize)),
    /// An invalid random distribution was requested.
    Distribution(String),
    Io(io::Error),
}

impl MlErr {
    /// Whether a batch that failed with this error can be skipped without aborting the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MlErr::DimensionMismatch { .. } | MlErr::MalformedSample { .. } | MlErr::NonFiniteLoss(_)
        )
    }
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::Configuration { model, option } => {
                write!(f, "invalid processor configuration for {model}: unsupported option {option}")
            }
            MlErr::DimensionMismatch { op, got, expected } => write!(
                f,
                "dimension mismatch in {op}: got {}x{} and expected {}x{}",
                got.0, got.1, expected.0, expected.1
            ),
            MlErr::StructuralMismatch(msg) => write!(f, "structural mismatch: {msg}"),
            MlErr::DatasetLoad(msg) => write!(f, "failed to load dataset: {msg}"),
            MlErr::MalformedSample { index, reason } => {
                write!(f, "malformed sample {index}: {reason}")
            }
            MlErr::NonFiniteLoss(loss) => write!(f, "the loss is not finite: {loss}"),
            MlErr::NoValidBatches { epoch, skipped } => write!(
                f,
                "no valid batches in epoch {epoch}, all {skipped} batches were skipped"
            ),
            MlErr::UnknownNode(id) => write!(f, "node {id} doesn't belong to this graph"),
            MlErr::NotScalar((rows, cols)) => {
                write!(f, "expected a scalar node, got a {rows}x{cols} one")
            }
            MlErr::Distribution(msg) => write!(f, "invalid distribution: {msg}"),
            MlErr::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for MlErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rand_distr::uniform::Error> for MlErr {
    fn from(value: rand_distr::uniform::Error) -> Self {
        Self::Distribution(value.to_string())
    }
}

impl From<rand_distr::NormalError> for MlErr {
    fn from(value: rand_distr::NormalError) -> Self {
        Self::Distribution(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_batch_level_errors_are_recoverable() {
        let dim = MlErr::DimensionMismatch {
            op: "mul",
            got: (4, 1),
            expected: (3, 1),
        };
        assert!(dim.is_recoverable());
        assert!(MlErr::NonFiniteLoss(f32::NAN).is_recoverable());

        let config = MlErr::Configuration {
            model: "LinearRegression",
            option: "Concurrent".into(),
        };
        assert!(!config.is_recoverable());
        assert!(!MlErr::StructuralMismatch("count".into()).is_recoverable());
        assert!(!MlErr::DatasetLoad("missing".into()).is_recoverable());
    }

    #[test]
    fn display_names_the_offending_shapes() {
        let err = MlErr::DimensionMismatch {
            op: "mul",
            got: (4, 1),
            expected: (3, 1),
        };
        assert_eq!(
            err.to_string(),
            "dimension mismatch in mul: got 4x1 and expected 3x1"
        );
    }
}
