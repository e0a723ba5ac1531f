//! Domain entities for the connection layer

pub mod context;
pub mod server;
pub mod settings;
pub mod staleness;

pub use context::ConnectionContext;
pub use server::{ConfigError, ServerConfig, TransportConfig, TransportType};
pub use settings::{ConnectionSettings, StalenessPolicy};
pub use staleness::StalenessThresholds;
