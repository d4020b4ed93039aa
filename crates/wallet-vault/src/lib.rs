//! Encrypted-at-rest credential store for the checkout wallet.
//!
//! The [`Vault`] wraps a `rusqlite::Connection` and, once unlocked, a
//! passphrase-derived AES-256-GCM key. Every credential value is encrypted
//! before it touches disk and decrypted only on [`Vault::get`].
//!
//! # Schema
//!
//! - `wallet_meta(key PRIMARY KEY, value)` — holds the base64-encoded salt
//!   and a schema version tag, written once by [`Vault::initialize`].
//! - `credentials(id, name UNIQUE, type, encrypted_data, iv, auth_tag,
//!   metadata, created_at, updated_at)` — one row per credential.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use wallet_vault::{Vault, CredentialKind};
//!
//! # fn example() -> wallet_vault::error::Result<()> {
//! let mut vault = Vault::open("data/vault.db")?;
//! vault.initialize(b"my-passphrase")?;
//!
//! vault.add("stripe-key", CredentialKind::ApiKey, "sk-live-...", Default::default())?;
//!
//! let cred = vault.get("stripe-key")?;
//! assert_eq!(cred.value, "sk-live-...");
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod types;

pub use error::{Result, VaultError};
pub use types::{Credential, CredentialKind, CredentialSummary, Metadata};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use zeroize::Zeroizing;

const SCHEMA_VERSION: &str = "1";
const META_KEY_SALT: &str = "salt";
const META_KEY_SCHEMA_VERSION: &str = "schema_version";

/// Encrypted-at-rest credential vault backed by SQLite.
pub struct Vault {
    conn: Connection,
    /// `None` while the vault is locked; set by [`Vault::initialize`] or
    /// [`Vault::unlock`], cleared (and zeroed) by [`Vault::close`].
    key: Option<Zeroizing<[u8; wallet_crypto::KEY_LEN]>>,
}

impl Vault {
    /// Open (or create) a vault database at `path`. The vault starts locked:
    /// call [`Vault::initialize`] or [`Vault::unlock`] before using it.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), "opening vault database");

        let conn = Connection::open(path)?;
        Self::configure_connection(&conn)?;
        let vault = Self { conn, key: None };
        vault.run_migrations()?;

        Ok(vault)
    }

    /// Open an in-memory vault (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure_connection(&conn)?;
        let vault = Self { conn, key: None };
        vault.run_migrations()?;
        Ok(vault)
    }

    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS wallet_meta (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS credentials (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                name           TEXT NOT NULL UNIQUE,
                type           TEXT NOT NULL CHECK(type IN ('api_key','payment_token','oauth_token','secret','certificate')),
                encrypted_data BLOB NOT NULL,
                iv             BLOB NOT NULL,
                auth_tag       BLOB NOT NULL,
                metadata       TEXT NOT NULL DEFAULT '{}',
                created_at     TEXT NOT NULL,
                updated_at     TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    // -- Lifecycle ------------------------------------------------------

    /// Initialize a fresh vault with `passphrase`, generating a random salt.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::AlreadyInitialized`] if a salt row already
    /// exists.
    pub fn initialize(&mut self, passphrase: &[u8]) -> Result<()> {
        if self.read_salt()?.is_some() {
            return Err(VaultError::AlreadyInitialized);
        }

        let salt = wallet_crypto::generate_salt()?;
        let key = wallet_crypto::derive_key(passphrase, &salt)?;

        self.conn.execute(
            "INSERT INTO wallet_meta (key, value) VALUES (?1, ?2)",
            params![META_KEY_SALT, BASE64.encode(salt)],
        )?;
        self.conn.execute(
            "INSERT INTO wallet_meta (key, value) VALUES (?1, ?2)",
            params![META_KEY_SCHEMA_VERSION, SCHEMA_VERSION],
        )?;

        self.key = Some(key);
        tracing::info!("vault initialized");
        Ok(())
    }

    /// Unlock an existing vault with `passphrase`.
    ///
    /// This derives the key but does not verify it — there is no oracle
    /// that a passphrase is wrong until it is used against real ciphertext
    /// (see [`Vault::get`]).
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NotInitialized`] if no salt row exists.
    pub fn unlock(&mut self, passphrase: &[u8]) -> Result<()> {
        let salt = self
            .read_salt()?
            .ok_or(VaultError::NotInitialized)?;

        let key = wallet_crypto::derive_key(passphrase, &salt)?;
        self.key = Some(key);
        tracing::info!("vault unlocked");
        Ok(())
    }

    /// Zero and release the derived key. Subsequent operations fail with
    /// [`VaultError::VaultLocked`] until [`Vault::unlock`] is called again.
    pub fn close(&mut self) {
        self.key = None;
        tracing::info!("vault locked");
    }

    fn read_salt(&self) -> Result<Option<[u8; wallet_crypto::SALT_LEN]>> {
        let encoded: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM wallet_meta WHERE key = ?1",
                params![META_KEY_SALT],
                |row| row.get(0),
            )
            .optional()?;

        let Some(encoded) = encoded else {
            return Ok(None);
        };

        let bytes = BASE64
            .decode(&encoded)
            .map_err(|e| VaultError::Internal(format!("corrupt salt: {e}")))?;
        let salt: [u8; wallet_crypto::SALT_LEN] = bytes
            .try_into()
            .map_err(|_| VaultError::Internal("salt has wrong length".into()))?;
        Ok(Some(salt))
    }

    fn require_key(&self) -> Result<&[u8; wallet_crypto::KEY_LEN]> {
        self.key.as_deref().ok_or(VaultError::VaultLocked)
    }

    // -- Credential CRUD --------------------------------------------------

    /// Store a new credential. Fails if `name` is already taken.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::VaultLocked`] if the vault is locked, or
    /// [`VaultError::CredentialAlreadyExists`] if `name` is taken.
    pub fn add(
        &self,
        name: &str,
        kind: CredentialKind,
        value: &str,
        metadata: Metadata,
    ) -> Result<i64> {
        if name.trim().is_empty() {
            return Err(VaultError::ValidationError("name must not be empty".into()));
        }
        let key = self.require_key()?;

        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM credentials WHERE name = ?1)",
            params![name],
            |row| row.get(0),
        )?;
        if exists {
            return Err(VaultError::CredentialAlreadyExists { name: name.to_string() });
        }

        let sealed = wallet_crypto::encrypt(value.as_bytes(), key)?;
        let (ciphertext, tag) = split_tag(&sealed.ciphertext);
        let metadata_json = serde_json::to_string(&metadata)?;
        let now = Utc::now().to_rfc3339();

        self.conn.execute(
            "INSERT INTO credentials (name, type, encrypted_data, iv, auth_tag, metadata, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![name, kind.as_str(), ciphertext, sealed.nonce.as_slice(), tag, metadata_json, now],
        )?;

        let id = self.conn.last_insert_rowid();
        tracing::info!(name = name, kind = %kind, "added credential");
        Ok(id)
    }

    /// Retrieve and decrypt a credential by name.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::VaultLocked`] if the vault is locked,
    /// [`VaultError::CredentialNotFound`] if no credential with that name
    /// exists, or [`VaultError::AuthenticationFailed`] if the derived key
    /// cannot decrypt the stored ciphertext (wrong passphrase).
    pub fn get(&self, name: &str) -> Result<Credential> {
        let key = self.require_key()?;

        let row = self
            .conn
            .query_row(
                "SELECT id, name, type, encrypted_data, iv, auth_tag, metadata, created_at, updated_at
                 FROM credentials WHERE name = ?1",
                params![name],
                CredentialRow::from_row,
            )
            .optional()?;

        let row = row.ok_or_else(|| VaultError::CredentialNotFound { name: name.to_string() })?;
        row.decrypt(key)
    }

    /// Replace an existing credential's value (and optionally its
    /// metadata), re-encrypting with a fresh nonce.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::CredentialNotFound`] if `name` does not exist.
    pub fn update(&self, name: &str, value: &str, metadata: Option<Metadata>) -> Result<()> {
        let key = self.require_key()?;

        let sealed = wallet_crypto::encrypt(value.as_bytes(), key)?;
        let (ciphertext, tag) = split_tag(&sealed.ciphertext);
        let now = Utc::now().to_rfc3339();

        let rows = if let Some(metadata) = metadata {
            let metadata_json = serde_json::to_string(&metadata)?;
            self.conn.execute(
                "UPDATE credentials SET encrypted_data = ?1, iv = ?2, auth_tag = ?3, metadata = ?4, updated_at = ?5
                 WHERE name = ?6",
                params![ciphertext, sealed.nonce.as_slice(), tag, metadata_json, now, name],
            )?
        } else {
            self.conn.execute(
                "UPDATE credentials SET encrypted_data = ?1, iv = ?2, auth_tag = ?3, updated_at = ?4
                 WHERE name = ?5",
                params![ciphertext, sealed.nonce.as_slice(), tag, now, name],
            )?
        };

        if rows == 0 {
            return Err(VaultError::CredentialNotFound { name: name.to_string() });
        }
        tracing::info!(name = name, "updated credential");
        Ok(())
    }

    /// List all stored credentials without decrypting their values.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::VaultLocked`] if the vault is locked.
    pub fn list(&self) -> Result<Vec<CredentialSummary>> {
        self.require_key()?;

        let mut stmt = self.conn.prepare(
            "SELECT id, name, type, metadata, created_at, updated_at FROM credentials ORDER BY name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(CredentialSummaryRow {
                id: row.get(0)?,
                name: row.get(1)?,
                kind: row.get(2)?,
                metadata: row.get(3)?,
                created_at: row.get(4)?,
                updated_at: row.get(5)?,
            })
        })?;

        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row?.into_summary()?);
        }
        Ok(summaries)
    }

    /// Remove a credential by name.
    ///
    /// Returns `false` (not an error) when no row matched.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::VaultLocked`] if the vault is locked.
    pub fn remove(&self, name: &str) -> Result<bool> {
        self.require_key()?;
        let rows = self
            .conn
            .execute("DELETE FROM credentials WHERE name = ?1", params![name])?;
        if rows > 0 {
            tracing::info!(name = name, "removed credential");
        }
        Ok(rows > 0)
    }
}

fn split_tag(sealed_ciphertext: &[u8]) -> (&[u8], &[u8]) {
    let split_at = sealed_ciphertext.len() - wallet_crypto::TAG_LEN;
    sealed_ciphertext.split_at(split_at)
}

struct CredentialRow {
    id: i64,
    name: String,
    kind: String,
    encrypted_data: Vec<u8>,
    iv: Vec<u8>,
    auth_tag: Vec<u8>,
    metadata: String,
    created_at: String,
    updated_at: String,
}

impl CredentialRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            kind: row.get(2)?,
            encrypted_data: row.get(3)?,
            iv: row.get(4)?,
            auth_tag: row.get(5)?,
            metadata: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn decrypt(self, key: &[u8; wallet_crypto::KEY_LEN]) -> Result<Credential> {
        if self.iv.len() != wallet_crypto::NONCE_LEN_BYTES {
            return Err(VaultError::Internal(format!(
                "stored nonce is {} bytes, expected {}",
                self.iv.len(),
                wallet_crypto::NONCE_LEN_BYTES
            )));
        }
        let mut nonce = [0u8; wallet_crypto::NONCE_LEN_BYTES];
        nonce.copy_from_slice(&self.iv);

        let mut ciphertext = self.encrypted_data;
        ciphertext.extend_from_slice(&self.auth_tag);

        let plaintext = wallet_crypto::decrypt(&nonce, &ciphertext, key)?;
        let value = String::from_utf8(plaintext)
            .map_err(|e| VaultError::Internal(format!("decrypted value is not utf-8: {e}")))?;

        Ok(Credential {
            id: self.id,
            name: self.name,
            kind: CredentialKind::parse(&self.kind).unwrap_or(CredentialKind::Secret),
            value,
            metadata: serde_json::from_str(&self.metadata)?,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        })
    }
}

struct CredentialSummaryRow {
    id: i64,
    name: String,
    kind: String,
    metadata: String,
    created_at: String,
    updated_at: String,
}

impl CredentialSummaryRow {
    fn into_summary(self) -> Result<CredentialSummary> {
        Ok(CredentialSummary {
            id: self.id,
            name: self.name,
            kind: CredentialKind::parse(&self.kind).unwrap_or(CredentialKind::Secret),
            metadata: serde_json::from_str(&self.metadata)?,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        })
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn unlocked_vault() -> Vault {
        let mut vault = Vault::open_in_memory().unwrap();
        vault.initialize(b"test-passphrase").unwrap();
        vault
    }

    #[test]
    fn add_and_get_roundtrip() {
        let vault = unlocked_vault();
        vault
            .add("stripe-key", CredentialKind::ApiKey, "sk-test-abc123", Default::default())
            .unwrap();

        let cred = vault.get("stripe-key").unwrap();
        assert_eq!(cred.value, "sk-test-abc123");
        assert_eq!(cred.kind, CredentialKind::ApiKey);
    }

    #[test]
    fn remove_then_get_is_not_found() {
        let vault = unlocked_vault();
        vault
            .add("github", CredentialKind::OauthToken, "gho_xxx", Default::default())
            .unwrap();

        assert!(vault.remove("github").unwrap());
        assert!(matches!(vault.get("github"), Err(VaultError::CredentialNotFound { .. })));
    }

    #[test]
    fn remove_missing_returns_false_not_error() {
        let vault = unlocked_vault();
        assert!(!vault.remove("nonexistent").unwrap());
    }

    #[test]
    fn duplicate_name_rejected() {
        let vault = unlocked_vault();
        vault.add("dup", CredentialKind::Secret, "v1", Default::default()).unwrap();
        let result = vault.add("dup", CredentialKind::Secret, "v2", Default::default());
        assert!(matches!(result, Err(VaultError::CredentialAlreadyExists { .. })));
    }

    #[test]
    fn list_never_reveals_plaintext() {
        let vault = unlocked_vault();
        vault
            .add("secret-one", CredentialKind::Secret, "super-secret-value", Default::default())
            .unwrap();

        let list = vault.list().unwrap();
        assert_eq!(list.len(), 1);
        let serialized = serde_json::to_string(&list[0]).unwrap();
        assert!(!serialized.contains("super-secret-value"));
    }

    #[test]
    fn operations_before_unlock_fail_locked() {
        let vault = Vault::open_in_memory().unwrap();
        let result = vault.add("x", CredentialKind::Secret, "v", Default::default());
        assert!(matches!(result, Err(VaultError::VaultLocked)));
    }

    #[test]
    fn initialize_twice_fails() {
        let mut vault = Vault::open_in_memory().unwrap();
        vault.initialize(b"pass").unwrap();
        assert!(matches!(vault.initialize(b"pass2"), Err(VaultError::AlreadyInitialized)));
    }

    #[test]
    fn unlock_before_initialize_fails_not_initialized() {
        let mut vault = Vault::open_in_memory().unwrap();
        assert!(matches!(vault.unlock(b"pass"), Err(VaultError::NotInitialized)));
    }

    #[test]
    fn wrong_passphrase_fails_on_get_not_unlock() {
        // unlock() derives a key but performs no verification; the failure
        // must surface lazily, on the first authenticated decryption.
        let mut vault = Vault::open_in_memory().unwrap();
        vault.initialize(b"right-pass").unwrap();
        vault
            .add("k", CredentialKind::ApiKey, "value", Default::default())
            .unwrap();
        vault.close();

        vault.unlock(b"wrong-pass").unwrap(); // succeeds — no oracle
        let result = vault.get("k");
        assert!(matches!(result, Err(VaultError::AuthenticationFailed)));
    }

    #[test]
    fn update_replaces_value() {
        let vault = unlocked_vault();
        vault.add("k", CredentialKind::Secret, "old", Default::default()).unwrap();
        vault.update("k", "new", None).unwrap();
        assert_eq!(vault.get("k").unwrap().value, "new");
    }

    #[test]
    fn update_missing_credential_errors() {
        let vault = unlocked_vault();
        let result = vault.update("nonexistent", "v", None);
        assert!(matches!(result, Err(VaultError::CredentialNotFound { .. })));
    }

    #[test]
    fn close_relocks_vault() {
        let mut vault = unlocked_vault();
        vault.add("k", CredentialKind::Secret, "v", Default::default()).unwrap();
        vault.close();
        assert!(matches!(vault.get("k"), Err(VaultError::VaultLocked)));
    }

    #[test]
    fn metadata_roundtrips() {
        let vault = unlocked_vault();
        let mut metadata = Metadata::new();
        metadata.insert("env".into(), "production".into());
        vault.add("k", CredentialKind::ApiKey, "v", metadata.clone()).unwrap();

        let cred = vault.get("k").unwrap();
        assert_eq!(cred.metadata, metadata);
    }

    #[test]
    fn survives_close_and_reopen_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.db");

        {
            let mut vault = Vault::open(&path).unwrap();
            vault.initialize(b"on-disk-pass").unwrap();
            vault
                .add("stripe-key", CredentialKind::ApiKey, "sk-persisted-value", Default::default())
                .unwrap();
        }

        let mut vault = Vault::open(&path).unwrap();
        vault.unlock(b"on-disk-pass").unwrap();
        assert_eq!(vault.get("stripe-key").unwrap().value, "sk-persisted-value");
    }

    #[test]
    fn reopen_with_wrong_passphrase_fails_on_get() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.db");

        {
            let mut vault = Vault::open(&path).unwrap();
            vault.initialize(b"right-pass").unwrap();
            vault.add("k", CredentialKind::Secret, "v", Default::default()).unwrap();
        }

        let mut vault = Vault::open(&path).unwrap();
        vault.unlock(b"wrong-pass").unwrap();
        assert!(matches!(vault.get("k"), Err(VaultError::AuthenticationFailed)));
    }
}
