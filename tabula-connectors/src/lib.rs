//! Tabula connectors - OAuth-protected paginated APIs as schema-stable tables.
//!
//! # Architecture
//!
//! ```text
//! External API (Aircall, ...)
//!          ↓
//!     OAuth (user authorizes, token stored in a SecretStore)
//!          ↓
//! ┌─────────────────────────────────────────┐
//! │       Connector (implements trait)       │
//! │  - Dataset dispatch                      │
//! │  - Per-dataset formatters and schemas    │
//! │  - Joins with auxiliary datasets         │
//! └─────────────────────────────────────────┘
//!          ↓
//! ┌─────────────────────────────────────────┐
//! │       tabula::FetchEngine                │
//! │  - Token refresh                         │
//! │  - Pagination, bounded retry             │
//! │  - Concurrent collection                 │
//! └─────────────────────────────────────────┘
//!          ↓
//!    ResourceCollection (columns + rows)
//! ```
//!
//! # Core Types
//!
//! - [`Connector`] - Trait that all connectors implement
//! - [`OAuthConfig`] - OAuth endpoints and scopes
//! - [`ConnectorStatus`] - Result of a credentials check
//! - [`ResourceCollection`] - Re-exported from tabula (tabular result)

mod connector;
mod types;
pub mod connectors;
pub mod registry;

pub use connector::Connector;
pub use types::{ConnectorStatus, OAuthConfig};

pub use tabula::ResourceCollection;
