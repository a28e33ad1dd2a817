use crate::error::Result;
use chrono::{Duration, Utc};
use coachdesk_models::{
    LedgerReason, MemberRole, Membership, Organization, OrganizationMember,
    ProvisionOrganization, SubscriptionStatus,
};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct OrganizationRepository {
    pool: PgPool,
}

impl OrganizationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Earliest membership of a subject, joined with its organization
    pub async fn find_membership(&self, subject: &str) -> Result<Option<Membership>> {
        let membership = sqlx::query_as::<_, Membership>(
            r#"
            SELECT m.organization_id, o.name AS organization_name,
                   m.subject, m.role, m.joined_at
            FROM organization_members m
            INNER JOIN organizations o ON o.id = m.organization_id
            WHERE m.subject = $1
            ORDER BY m.joined_at ASC, m.id ASC
            LIMIT 1
            "#,
        )
        .bind(subject)
        .fetch_optional(&self.pool)
        .await?;

        Ok(membership)
    }

    /// Create the organization, admin membership, subscription, wallet and
    /// signup grant for a subject signing in for the first time.
    ///
    /// Serialized per subject with an advisory lock, so concurrent first
    /// requests resolve to a single organization.
    pub async fn provision(
        &self,
        request: &ProvisionOrganization,
        correlation_id: &str,
    ) -> Result<Membership> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&request.subject)
            .execute(&mut *tx)
            .await?;

        let existing = sqlx::query_as::<_, Membership>(
            r#"
            SELECT m.organization_id, o.name AS organization_name,
                   m.subject, m.role, m.joined_at
            FROM organization_members m
            INNER JOIN organizations o ON o.id = m.organization_id
            WHERE m.subject = $1
            ORDER BY m.joined_at ASC, m.id ASC
            LIMIT 1
            "#,
        )
        .bind(&request.subject)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(membership) = existing {
            tx.rollback().await?;
            return Ok(membership);
        }

        let organization = sqlx::query_as::<_, Organization>(
            r#"
            INSERT INTO organizations (name)
            VALUES ($1)
            RETURNING id, name, created_at
            "#,
        )
        .bind(&request.organization_name)
        .fetch_one(&mut *tx)
        .await?;

        let member = sqlx::query_as::<_, OrganizationMember>(
            r#"
            INSERT INTO organization_members (organization_id, subject, role)
            VALUES ($1, $2, $3)
            RETURNING id, organization_id, subject, role, joined_at
            "#,
        )
        .bind(organization.id)
        .bind(&request.subject)
        .bind(MemberRole::Admin)
        .fetch_one(&mut *tx)
        .await?;

        let period_start = Utc::now();
        let period_end = period_start + Duration::days(request.period_days);
        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                organization_id, plan, status, seats, monthly_credits,
                current_period_start, current_period_end
            )
            VALUES ($1, $2, $3, 1, $4, $5, $6)
            "#,
        )
        .bind(organization.id)
        .bind(&request.plan)
        .bind(SubscriptionStatus::Active)
        .bind(request.signup_credits)
        .bind(period_start)
        .bind(period_end)
        .execute(&mut *tx)
        .await?;

        let wallet_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO credit_wallets (organization_id, currency, balance)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(organization.id)
        .bind(&request.currency)
        .bind(request.signup_credits)
        .fetch_one(&mut *tx)
        .await?;

        // The ledger must sum to the balance from the very first row.
        if request.signup_credits > 0 {
            sqlx::query(
                r#"
                INSERT INTO credit_ledger (wallet_id, delta, reason, correlation_id)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(wallet_id)
            .bind(request.signup_credits)
            .bind(LedgerReason::SignupGrant)
            .bind(correlation_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            organization_id = %organization.id,
            subject = %request.subject,
            signup_credits = request.signup_credits,
            "Provisioned organization"
        );

        Ok(Membership {
            organization_id: organization.id,
            organization_name: organization.name,
            subject: member.subject,
            role: member.role,
            joined_at: member.joined_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{provision_request, test_database};

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn test_provision_is_idempotent_per_subject() {
        let db = test_database().await;
        let repo = OrganizationRepository::new(db.pool().clone());
        let request = provision_request(50);

        let first = repo.provision(&request, "req-a").await.unwrap();
        let second = repo.provision(&request, "req-b").await.unwrap();

        assert_eq!(first.organization_id, second.organization_id);
        assert_eq!(first.role, MemberRole::Admin);

        let found = repo.find_membership(&request.subject).await.unwrap().unwrap();
        assert_eq!(found.organization_id, first.organization_id);
        assert_eq!(found.organization_name, "Test workspace");
    }

    #[tokio::test]
    #[ignore]
    async fn test_duplicate_member_maps_to_duplicate_entry() {
        let db = test_database().await;
        let repo = OrganizationRepository::new(db.pool().clone());
        let request = provision_request(0);
        let owner = repo.provision(&request, "req").await.unwrap();

        let again = sqlx::query(
            "INSERT INTO organization_members (organization_id, subject, role) VALUES ($1, $2, $3)",
        )
        .bind(owner.organization_id)
        .bind(&request.subject)
        .bind(MemberRole::Member)
        .execute(db.pool())
        .await
        .map_err(crate::error::DatabaseError::from);
        assert!(matches!(again, Err(crate::error::DatabaseError::DuplicateEntry(_))));
    }
}
