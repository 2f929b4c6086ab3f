//! Thread persistence

use sqlx::types::Json;
use sqlx::PgPool;
use sunday_common::Result;
use sunday_llm::ChatMessage;
use uuid::Uuid;

use crate::domain::entities::{ChatThread, Turn};

/// Persistence seam for chat threads, keyed by `(user_id, thread_id)`
#[async_trait::async_trait]
pub trait ThreadStore: Send + Sync {
    async fn get(&self, user_id: Uuid, thread_id: Uuid) -> Result<Option<ChatThread>>;

    async fn put(&self, user_id: Uuid, thread_id: Uuid, thread: &ChatThread) -> Result<()>;
}

/// PostgreSQL thread store.
///
/// Backing table:
/// `chat_threads(user_id uuid, thread_id uuid, chats jsonb, messages jsonb,
///  created_at timestamptz, PRIMARY KEY (user_id, thread_id))`
#[derive(Clone)]
pub struct PgThreadStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct ThreadRow {
    chats: Json<Vec<Turn>>,
    messages: Json<Vec<ChatMessage>>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl PgThreadStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ThreadStore for PgThreadStore {
    async fn get(&self, user_id: Uuid, thread_id: Uuid) -> Result<Option<ChatThread>> {
        let row = sqlx::query_as::<_, ThreadRow>(
            r#"
            SELECT chats, messages, created_at
            FROM chat_threads
            WHERE user_id = $1 AND thread_id = $2
            "#,
        )
        .bind(user_id)
        .bind(thread_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| ChatThread {
            chats: row.chats.0,
            messages: row.messages.0,
            created_at: row.created_at,
        }))
    }

    async fn put(&self, user_id: Uuid, thread_id: Uuid, thread: &ChatThread) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chat_threads (user_id, thread_id, chats, messages, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, thread_id)
            DO UPDATE SET chats = EXCLUDED.chats, messages = EXCLUDED.messages
            "#,
        )
        .bind(user_id)
        .bind(thread_id)
        .bind(Json(&thread.chats))
        .bind(Json(&thread.messages))
        .bind(thread.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
