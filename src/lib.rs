// Error taxonomy
pub mod error;

// Fetch tuning loaded from TOML
pub mod config;

// Secret storage for OAuth state and tokens
pub mod credentials;

// OAuth 2.0 authorization-code flow and token lifecycle
pub mod oauth;

// Page traversal, retry and concurrent collection
pub mod fetch;

// Schema-stable result assembly
pub mod assembly;

// Connector-facing fetch operations
pub mod engine;

pub use assembly::{ResourceCollection, ResultAssembler, Schema};
pub use config::FetchConfig;
pub use engine::FetchEngine;
pub use error::{FetchError, Result};
pub use fetch::{FetchLimit, FormatterRegistry, Row};
pub use oauth::{OAuthProviderConfig, TokenManager};
