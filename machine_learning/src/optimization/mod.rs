mod adam;
mod gradient_descent;
mod gradient_descent_with_momentum;
mod optimizer;
mod spec;

use ndarray::Array2;

pub use adam::Adam;
pub use gradient_descent::GradientDescent;
pub use gradient_descent_with_momentum::GradientDescentWithMomentum;
pub use optimizer::Optimizer;
pub use spec::OptimizerSpec;

use crate::{MlErr, Result};

/// Returns the state kept for `slot`, creating it zeroed on first use.
fn slot_state(
    states: &mut Vec<Option<Array2<f32>>>,
    slot: usize,
    dim: (usize, usize),
) -> Result<&mut Array2<f32>> {
    if states.len() <= slot {
        states.resize(slot + 1, None);
    }

    let state = states[slot].get_or_insert_with(|| Array2::zeros(dim));
    if state.dim() != dim {
        return Err(MlErr::DimensionMismatch {
            op: "optimizer state",
            got: dim,
            expected: state.dim(),
        });
    }

    Ok(state)
}

fn check_grad(value: (usize, usize), grad: (usize, usize)) -> Result<()> {
    if value != grad {
        return Err(MlErr::DimensionMismatch {
            op: "update_param",
            got: grad,
            expected: value,
        });
    }

    Ok(())
}
