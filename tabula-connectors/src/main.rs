use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tabula::credentials::SqliteSecretStore;
use tabula::FetchConfig;
use tabula_connectors::registry::build_connector;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "tabula-connectors",
    version,
    about = "Fetch OAuth-protected API datasets as tables"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Connector to use
    #[arg(long, default_value = "aircall", global = true)]
    connector: String,

    /// Key under which the connector's OAuth state and token are stored
    #[arg(long, default_value = "default", global = true)]
    identity: String,

    /// Fetch tuning (TOML); defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the provider URL to visit to grant access
    Authorize,
    /// Complete the OAuth flow with the URL the provider redirected to
    Callback {
        /// Full redirect URL, including `code` and `state`
        url: String,
    },
    /// Fetch a dataset and print it as JSON
    Fetch {
        dataset: String,
        /// -1 for all pages, 0 for the empty table, N for at most N pages
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        limit: i64,
    },
    /// Check that credentials are usable
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tabula=info,tabula_connectors=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let fetch_config = match &cli.config {
        Some(path) => FetchConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => FetchConfig::default(),
    };

    let encryption_key = std::env::var("TABULA_ENCRYPTION_KEY")
        .context("TABULA_ENCRYPTION_KEY is required (base64-encoded 32-byte key)")?;
    let secrets_db =
        std::env::var("TABULA_SECRETS_DB").unwrap_or_else(|_| "secrets.db".to_string());

    info!(
        connector = %cli.connector,
        identity = %cli.identity,
        secrets_db = %secrets_db,
        "Configuration loaded"
    );

    let store = Arc::new(
        SqliteSecretStore::new(&secrets_db, &encryption_key)
            .context("Failed to initialize secret store")?,
    );
    let connector = build_connector(&cli.connector, &cli.identity, store, fetch_config)?;

    match cli.command {
        Commands::Authorize => {
            println!("{}", connector.build_authorization_url()?);
        }
        Commands::Callback { url } => {
            connector.retrieve_tokens(&url).await?;
            info!(connector = %cli.connector, "Credentials stored");
        }
        Commands::Fetch { dataset, limit } => {
            let collection = connector.fetch(&dataset, limit).await?;
            println!("{}", serde_json::to_string_pretty(&collection)?);
        }
        Commands::Status => {
            let status = connector.get_status().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}
