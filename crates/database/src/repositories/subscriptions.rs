use crate::error::Result;
use coachdesk_models::Subscription;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct SubscriptionRepository {
    pool: PgPool,
}

impl SubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Current subscription of an organization.
    ///
    /// Only one active row is expected, but nothing enforces it; the most
    /// recently created active row wins.
    pub async fn get_current(&self, organization_id: Uuid) -> Result<Option<Subscription>> {
        let subscription = sqlx::query_as::<_, Subscription>(
            r#"
            SELECT * FROM subscriptions
            WHERE organization_id = $1
            ORDER BY (status IN ('active', 'trialing')) DESC, created_at DESC
            LIMIT 1
            "#,
        )
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(subscription)
    }
}
