use crate::error::{DatabaseError, Result};
use coachdesk_models::{
    ChatMessage, ChatSession, Cursor, ExchangeSession, MessageRole, NewChatExchange, NewChatMessage,
};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct ChatRepository {
    pool: PgPool,
}

impl ChatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ========================================================================
    // SESSIONS
    // ========================================================================

    /// Fetch a session owned by `owner`. Foreign sessions read as missing.
    pub async fn get_session(&self, id: Uuid, owner: &str) -> Result<ChatSession> {
        sqlx::query_as::<_, ChatSession>(
            r#"
            SELECT * FROM chat_sessions
            WHERE id = $1 AND owner_subject = $2
            "#,
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Chat session", &id.to_string()))
    }

    /// Owner's sessions newest first; fetches `limit + 1` rows
    pub async fn list_sessions(
        &self,
        owner: &str,
        cursor: Option<Cursor>,
        limit: u32,
    ) -> Result<Vec<ChatSession>> {
        let fetch = i64::from(limit) + 1;
        let sessions = match cursor {
            None => {
                sqlx::query_as::<_, ChatSession>(
                    r#"
                    SELECT * FROM chat_sessions
                    WHERE owner_subject = $1
                    ORDER BY created_at DESC, id DESC
                    LIMIT $2
                    "#,
                )
                .bind(owner)
                .bind(fetch)
                .fetch_all(&self.pool)
                .await?
            }
            Some(cursor) => {
                sqlx::query_as::<_, ChatSession>(
                    r#"
                    SELECT * FROM chat_sessions
                    WHERE owner_subject = $1 AND (created_at, id) < ($2, $3)
                    ORDER BY created_at DESC, id DESC
                    LIMIT $4
                    "#,
                )
                .bind(owner)
                .bind(cursor.created_at)
                .bind(cursor.id)
                .bind(fetch)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(sessions)
    }

    pub async fn rename_session(&self, id: Uuid, owner: &str, title: &str) -> Result<ChatSession> {
        sqlx::query_as::<_, ChatSession>(
            r#"
            UPDATE chat_sessions
            SET title = $3, updated_at = clock_timestamp()
            WHERE id = $1 AND owner_subject = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(title)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Chat session", &id.to_string()))
    }

    /// Delete a session and, by cascade, its messages
    pub async fn delete_session(&self, id: Uuid, owner: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM chat_sessions
            WHERE id = $1 AND owner_subject = $2
            "#,
        )
        .bind(id)
        .bind(owner)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // MESSAGES
    // ========================================================================

    /// Store one exchange: the session (created, or touched when it
    /// exists), the user message and the reply, in one transaction.
    /// On error nothing is written.
    pub async fn record_exchange(
        &self,
        exchange: &NewChatExchange,
    ) -> Result<(ChatSession, ChatMessage)> {
        let mut tx = self.pool.begin().await?;

        let session = match &exchange.session {
            ExchangeSession::New(new_session) => {
                sqlx::query_as::<_, ChatSession>(
                    r#"
                    INSERT INTO chat_sessions (organization_id, owner_subject, mode, title)
                    VALUES ($1, $2, $3, $4)
                    RETURNING *
                    "#,
                )
                .bind(new_session.organization_id)
                .bind(&new_session.owner_subject)
                .bind(new_session.mode)
                .bind(&new_session.title)
                .fetch_one(&mut *tx)
                .await?
            }
            ExchangeSession::Existing { id, owner_subject } => {
                sqlx::query_as::<_, ChatSession>(
                    r#"
                    UPDATE chat_sessions
                    SET updated_at = clock_timestamp()
                    WHERE id = $1 AND owner_subject = $2
                    RETURNING *
                    "#,
                )
                .bind(id)
                .bind(owner_subject)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| DatabaseError::not_found("Chat session", &id.to_string()))?
            }
        };

        insert_message(
            &mut tx,
            &NewChatMessage {
                session_id: session.id,
                role: MessageRole::User,
                content: exchange.user_content.clone(),
                prompt_tokens: 0,
                completion_tokens: 0,
                correlation_id: exchange.correlation_id.clone(),
            },
        )
        .await?;

        let reply = insert_message(
            &mut tx,
            &NewChatMessage {
                session_id: session.id,
                role: MessageRole::Assistant,
                content: exchange.reply_content.clone(),
                prompt_tokens: exchange.usage.prompt_tokens,
                completion_tokens: exchange.usage.completion_tokens,
                correlation_id: exchange.correlation_id.clone(),
            },
        )
        .await?;

        tx.commit().await?;

        Ok((session, reply))
    }

    /// Session messages oldest first; fetches `limit + 1` rows
    pub async fn list_messages(
        &self,
        session_id: Uuid,
        cursor: Option<Cursor>,
        limit: u32,
    ) -> Result<Vec<ChatMessage>> {
        let fetch = i64::from(limit) + 1;
        let messages = match cursor {
            None => {
                sqlx::query_as::<_, ChatMessage>(
                    r#"
                    SELECT * FROM chat_messages
                    WHERE session_id = $1
                    ORDER BY created_at ASC, id ASC
                    LIMIT $2
                    "#,
                )
                .bind(session_id)
                .bind(fetch)
                .fetch_all(&self.pool)
                .await?
            }
            Some(cursor) => {
                sqlx::query_as::<_, ChatMessage>(
                    r#"
                    SELECT * FROM chat_messages
                    WHERE session_id = $1 AND (created_at, id) > ($2, $3)
                    ORDER BY created_at ASC, id ASC
                    LIMIT $4
                    "#,
                )
                .bind(session_id)
                .bind(cursor.created_at)
                .bind(cursor.id)
                .bind(fetch)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(messages)
    }

    /// The last `count` messages of a session, oldest first
    pub async fn recent_messages(&self, session_id: Uuid, count: i64) -> Result<Vec<ChatMessage>> {
        let mut messages = sqlx::query_as::<_, ChatMessage>(
            r#"
            SELECT * FROM chat_messages
            WHERE session_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(session_id)
        .bind(count)
        .fetch_all(&self.pool)
        .await?;

        messages.reverse();
        Ok(messages)
    }
}

async fn insert_message(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    message: &NewChatMessage,
) -> Result<ChatMessage> {
    let stored = sqlx::query_as::<_, ChatMessage>(
        r#"
        INSERT INTO chat_messages (
            session_id, role, content, prompt_tokens, completion_tokens, correlation_id
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(message.session_id)
    .bind(message.role)
    .bind(&message.content)
    .bind(message.prompt_tokens)
    .bind(message.completion_tokens)
    .bind(&message.correlation_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(stored)
}
