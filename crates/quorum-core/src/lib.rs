pub mod bounded;
pub mod capability;
pub mod config;
pub mod error;
pub mod types;

pub use bounded::BoundedLog;
pub use capability::{Capabilities, CapabilityStatus};
pub use config::QuorumConfig;
pub use error::{QuorumError, Result};
pub use types::*;
