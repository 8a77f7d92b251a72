mod error;
mod logger;
mod protocol;
mod session;
mod transport;
mod types;

pub use error::{Error, Result};
pub use session::{discover, DeviceSession, DeviceSessionBuilder};
pub use transport::{exchange, probe, HubTarget, Reply, DEFAULT_TIMEOUT};
pub use types::*;
