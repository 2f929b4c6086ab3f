//! Credential storage for third-party integrations
//!
//! One credential document per (user, provider), written once by the OAuth
//! callback collaborator and read on every augmentation attempt. The answer
//! pipeline never mutates credentials; refresh is out of scope.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use sunday_common::Result;

/// Provider key for Gmail credentials
pub const GMAIL_PROVIDER: &str = "gmail";

/// Third-party access credential
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Build a credential from an OAuth token response
    pub fn from_oauth_tokens(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_in_secs: i64,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at: Utc::now() + Duration::seconds(expires_in_secs),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Per-(user, provider) credential store
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, user_id: Uuid, provider: &str) -> Result<Option<Credential>>;

    async fn put(&self, user_id: Uuid, provider: &str, credential: &Credential) -> Result<()>;
}

/// PostgreSQL credential store.
///
/// Backing table:
/// `integration_credentials(user_id uuid, provider varchar, access_token text,
///  refresh_token text, expires_at timestamptz, PRIMARY KEY (user_id, provider))`
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CredentialStore for PgCredentialStore {
    async fn get(&self, user_id: Uuid, provider: &str) -> Result<Option<Credential>> {
        let credential = sqlx::query_as::<_, Credential>(
            r#"
            SELECT access_token, refresh_token, expires_at
            FROM integration_credentials
            WHERE user_id = $1 AND provider = $2
            "#,
        )
        .bind(user_id)
        .bind(provider)
        .fetch_optional(&self.pool)
        .await?;

        Ok(credential)
    }

    async fn put(&self, user_id: Uuid, provider: &str, credential: &Credential) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO integration_credentials (
                user_id, provider, access_token, refresh_token, expires_at
            )
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, provider) DO UPDATE SET
                access_token = EXCLUDED.access_token,
                refresh_token = EXCLUDED.refresh_token,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(user_id)
        .bind(provider)
        .bind(&credential.access_token)
        .bind(&credential.refresh_token)
        .bind(credential.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// In-memory credential store for tests
#[derive(Default)]
pub struct InMemoryCredentialStore {
    entries: RwLock<HashMap<(Uuid, String), Credential>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get(&self, user_id: Uuid, provider: &str) -> Result<Option<Credential>> {
        let entries = self.entries.read().unwrap();
        Ok(entries.get(&(user_id, provider.to_string())).cloned())
    }

    async fn put(&self, user_id: Uuid, provider: &str, credential: &Credential) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        entries.insert((user_id, provider.to_string()), credential.clone());
        Ok(())
    }
}
