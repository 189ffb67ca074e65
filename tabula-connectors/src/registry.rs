//! Connector registry - maps connector names to constructors.

use crate::connectors::aircall::AircallConnector;
use crate::Connector;
use anyhow::{bail, Result};
use std::sync::Arc;
use tabula::credentials::SecretStore;
use tabula::FetchConfig;

/// Names of every connector this crate can build.
pub fn available_connectors() -> &'static [&'static str] {
    &["aircall"]
}

/// Build the connector `name` for `identity`, with OAuth client settings
/// taken from the environment.
pub fn build_connector(
    name: &str,
    identity: &str,
    store: Arc<dyn SecretStore>,
    config: FetchConfig,
) -> Result<Arc<dyn Connector>> {
    match name {
        "aircall" => Ok(Arc::new(AircallConnector::from_env(identity, store, config)?)),
        other => bail!(
            "Unknown connector '{}' (available: {})",
            other,
            available_connectors().join(", ")
        ),
    }
}
