//! Connection bookkeeping

mod registry;
mod sweep;

pub use registry::{ConnectionInfo, ConnectionRegistry, RegistrationGuard};
pub use sweep::run_liveness_sweep;
