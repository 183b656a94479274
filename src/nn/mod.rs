mod activation;
mod layer;
mod loss;
mod matrix;
mod network;
mod registry;

pub mod io;
pub mod optim;

pub use activation::LeakyRelu;
pub use layer::DenseLayer;
pub use loss::{huber_loss, huber_loss_gradient, mse_loss, mse_loss_gradient, regularization_loss};
pub use matrix::Matrix;
pub use network::{Network, NetworkSpec, NnError};
pub use registry::{NetworkHandle, NetworkRegistry, Role};

/// Fail-loud policy for numeric corruption: log the full error, including
/// the offending matrix dump, then abort the tick loop
pub(crate) fn fail_loud(err: NnError) -> ! {
    log::error!("{}", err);
    panic!("fatal numeric instability: {}", err);
}
