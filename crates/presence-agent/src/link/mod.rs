//! Connection to the presence server

mod connector;
mod reconnect;
mod session;

pub use connector::{Connector, Transport};
pub use reconnect::ExponentialBackoff;
pub use session::{DisconnectReason, Link};
