//! A3S Forge Core - Foundational Types
//!
//! Error taxonomy, client configuration and the wire types exchanged with
//! the remote build service. Shared by the runtime and the CLI.

pub mod api;
pub mod config;
pub mod error;

// Re-export commonly used types
pub use api::{BuildStatus, ContainerLayer, ContainerStatusResponse, SubmitContainerRequest};
pub use config::{ForgeConfig, LayerLimits, PollConfig, RetryConfig, TowerConfig};
pub use error::{ForgeError, Result};

/// A3S Forge version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
