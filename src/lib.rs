// Domain errors
pub mod error;

// Configuration
pub mod config;

// Key-value store backends
pub mod store;

// Cached OAuth credentials
pub mod credentials;

// OAuth authorization code flow
pub mod oauth;

// Normalized item model
pub mod item;

// Remote data sources
pub mod connectors;

// HTTP API
pub mod api;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::LinkConfig;
pub use error::{LinkError, LinkResult};
pub use item::{ItemType, NormalizedItem};
