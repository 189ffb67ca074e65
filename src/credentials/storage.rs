//! Encrypted secret storage backed by SQLite.
//!
//! Each connector identity maps to one JSON document (OAuth state or token),
//! sealed with AES-256-GCM before it touches the database.

use super::encryption::{Sealed, SecretCipher};
use super::SecretStore;
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::Mutex;

/// SQLite-backed [`SecretStore`].
///
/// # Schema
/// ```sql
/// CREATE TABLE secrets (
///     key TEXT PRIMARY KEY,          -- connector identity
///     document TEXT NOT NULL,        -- encrypted JSON
///     document_nonce TEXT NOT NULL,
///     created_at TEXT NOT NULL,      -- ISO 8601
///     updated_at TEXT NOT NULL       -- ISO 8601
/// );
/// ```
///
/// The connection sits behind a `Mutex`; the store is shared as
/// `Arc<dyn SecretStore>` across connector instances.
pub struct SqliteSecretStore {
    conn: Mutex<Connection>,
    cipher: SecretCipher,
}

impl SqliteSecretStore {
    /// Creates or opens a store.
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite file (`":memory:"` for an ephemeral store)
    /// * `encryption_key` - Base64-encoded 32-byte master key
    pub fn new<P: AsRef<Path>>(db_path: P, encryption_key: &str) -> Result<Self> {
        let cipher =
            SecretCipher::from_base64_key(encryption_key).context("Invalid encryption key")?;

        let conn = Connection::open(db_path).context("Failed to open secrets database")?;
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS secrets (
                key TEXT PRIMARY KEY,
                document TEXT NOT NULL,
                document_nonce TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )
        .context("Failed to create secrets table")?;

        Ok(Self {
            conn: Mutex::new(conn),
            cipher,
        })
    }

    /// Removes the document stored under `key`. Returns whether one existed.
    pub fn delete(&self, key: &str) -> Result<bool> {
        let rows_affected = self
            .conn()?
            .execute("DELETE FROM secrets WHERE key = ?1", params![key])
            .context("Failed to delete secret")?;
        Ok(rows_affected > 0)
    }

    /// Lists every connector identity with a stored document.
    pub fn list_keys(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT key FROM secrets ORDER BY key")
            .context("Failed to prepare query")?;

        let keys = stmt
            .query_map([], |row| row.get(0))
            .context("Failed to execute query")?
            .collect::<Result<Vec<String>, _>>()
            .context("Failed to read results")?;
        Ok(keys)
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("secrets database lock poisoned"))
    }
}

impl SecretStore for SqliteSecretStore {
    fn save(&self, key: &str, value: &Value) -> Result<()> {
        let document = serde_json::to_string(value).context("Failed to serialize secret")?;
        let sealed = self
            .cipher
            .seal(&document)
            .context("Failed to encrypt secret")?;
        let now = Utc::now().to_rfc3339();

        self.conn()?
            .execute(
                r#"
                INSERT INTO secrets (key, document, document_nonce, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(key) DO UPDATE SET
                    document = excluded.document,
                    document_nonce = excluded.document_nonce,
                    updated_at = excluded.updated_at
                "#,
                params![key, sealed.ciphertext, sealed.nonce, now, now],
            )
            .context("Failed to store secret")?;

        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<Value>> {
        let sealed = self
            .conn()?
            .query_row(
                "SELECT document, document_nonce FROM secrets WHERE key = ?1",
                params![key],
                |row| {
                    Ok(Sealed {
                        ciphertext: row.get(0)?,
                        nonce: row.get(1)?,
                    })
                },
            )
            .optional()
            .context("Failed to query secret")?;

        let Some(sealed) = sealed else {
            return Ok(None);
        };

        let document = self
            .cipher
            .open(&sealed)
            .context("Failed to decrypt secret")?;
        let value = serde_json::from_str(&document).context("Stored secret is not valid JSON")?;
        Ok(Some(value))
    }
}
