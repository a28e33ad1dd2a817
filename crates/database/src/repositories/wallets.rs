use crate::error::{DatabaseError, Result};
use coachdesk_models::{BalanceChange, CreditWallet, Cursor, LedgerEntry, LedgerReason};
use sqlx::PgPool;
use uuid::Uuid;

/// Outcome of a guarded decrement
#[derive(Debug)]
pub enum ChargeOutcome {
    Charged(BalanceChange),
    Insufficient { balance: i64, required: i64 },
    NoWallet,
}

#[derive(sqlx::FromRow)]
struct WalletHandle {
    id: Uuid,
    organization_id: Uuid,
    balance: i64,
}

#[derive(Clone)]
pub struct WalletRepository {
    pool: PgPool,
}

impl WalletRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_for_organization(
        &self,
        organization_id: Uuid,
        currency: &str,
    ) -> Result<CreditWallet> {
        sqlx::query_as::<_, CreditWallet>(
            r#"
            SELECT * FROM credit_wallets
            WHERE organization_id = $1 AND currency = $2
            "#,
        )
        .bind(organization_id)
        .bind(currency)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Wallet", &organization_id.to_string()))
    }

    /// Debit `amount` from the subject's organization wallet.
    ///
    /// Lookup, balance check, decrement and ledger append run in one
    /// transaction; anything short of commit leaves no trace.
    pub async fn charge(
        &self,
        subject: &str,
        currency: &str,
        amount: i64,
        correlation_id: &str,
    ) -> Result<ChargeOutcome> {
        if amount <= 0 {
            return Err(DatabaseError::InvalidInput(format!(
                "charge amount must be positive, got {}",
                amount
            )));
        }

        let mut tx = self.pool.begin().await?;

        let wallet = sqlx::query_as::<_, WalletHandle>(
            r#"
            SELECT w.id, w.organization_id, w.balance
            FROM credit_wallets w
            INNER JOIN organization_members m ON m.organization_id = w.organization_id
            WHERE m.subject = $1 AND w.currency = $2
            ORDER BY m.joined_at ASC, m.id ASC
            LIMIT 1
            "#,
        )
        .bind(subject)
        .bind(currency)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(wallet) = wallet else {
            tx.rollback().await?;
            return Ok(ChargeOutcome::NoWallet);
        };

        let balance: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE credit_wallets
            SET balance = balance - $2, updated_at = NOW()
            WHERE id = $1 AND balance >= $2
            RETURNING balance
            "#,
        )
        .bind(wallet.id)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(balance) = balance else {
            tx.rollback().await?;
            return Ok(ChargeOutcome::Insufficient {
                balance: wallet.balance,
                required: amount,
            });
        };

        let entry = insert_entry(
            &mut tx,
            wallet.id,
            -amount,
            LedgerReason::ChatUsage,
            None,
            correlation_id,
        )
        .await?;

        tx.commit().await?;

        Ok(ChargeOutcome::Charged(BalanceChange {
            wallet_id: wallet.id,
            organization_id: wallet.organization_id,
            balance,
            entry,
        }))
    }

    /// Credit `amount` to an organization wallet (top-up, refund)
    pub async fn credit(
        &self,
        organization_id: Uuid,
        currency: &str,
        amount: i64,
        reason: LedgerReason,
        note: Option<&str>,
        correlation_id: &str,
    ) -> Result<BalanceChange> {
        if amount <= 0 {
            return Err(DatabaseError::InvalidInput(format!(
                "credit amount must be positive, got {}",
                amount
            )));
        }

        let mut tx = self.pool.begin().await?;

        let wallet = sqlx::query_as::<_, WalletHandle>(
            r#"
            UPDATE credit_wallets
            SET balance = balance + $3, updated_at = NOW()
            WHERE organization_id = $1 AND currency = $2
            RETURNING id, organization_id, balance
            "#,
        )
        .bind(organization_id)
        .bind(currency)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Wallet", &organization_id.to_string()))?;

        let entry = insert_entry(&mut tx, wallet.id, amount, reason, note, correlation_id).await?;

        tx.commit().await?;

        Ok(BalanceChange {
            wallet_id: wallet.id,
            organization_id: wallet.organization_id,
            balance: wallet.balance,
            entry,
        })
    }

    /// Ledger rows newest first, keyset-paged
    pub async fn ledger_page(
        &self,
        wallet_id: Uuid,
        cursor: Option<Cursor>,
        limit: u32,
    ) -> Result<Vec<LedgerEntry>> {
        let fetch = i64::from(limit) + 1;
        let rows = match cursor {
            None => {
                sqlx::query_as::<_, LedgerEntry>(
                    r#"
                    SELECT * FROM credit_ledger
                    WHERE wallet_id = $1
                    ORDER BY created_at DESC, id DESC
                    LIMIT $2
                    "#,
                )
                .bind(wallet_id)
                .bind(fetch)
                .fetch_all(&self.pool)
                .await?
            }
            Some(cursor) => {
                sqlx::query_as::<_, LedgerEntry>(
                    r#"
                    SELECT * FROM credit_ledger
                    WHERE wallet_id = $1 AND (created_at, id) < ($2, $3)
                    ORDER BY created_at DESC, id DESC
                    LIMIT $4
                    "#,
                )
                .bind(wallet_id)
                .bind(cursor.created_at)
                .bind(cursor.id)
                .bind(fetch)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows)
    }

    pub async fn recent_ledger(&self, wallet_id: Uuid, limit: i64) -> Result<Vec<LedgerEntry>> {
        let rows = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT * FROM credit_ledger
            WHERE wallet_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(wallet_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn ledger_sum(&self, wallet_id: Uuid) -> Result<i64> {
        let sum: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(delta), 0)::BIGINT
            FROM credit_ledger
            WHERE wallet_id = $1
            "#,
        )
        .bind(wallet_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(sum)
    }
}

async fn insert_entry(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    wallet_id: Uuid,
    delta: i64,
    reason: LedgerReason,
    note: Option<&str>,
    correlation_id: &str,
) -> Result<LedgerEntry> {
    let entry = sqlx::query_as::<_, LedgerEntry>(
        r#"
        INSERT INTO credit_ledger (wallet_id, delta, reason, note, correlation_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(wallet_id)
    .bind(delta)
    .bind(reason)
    .bind(note)
    .bind(correlation_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::organizations::OrganizationRepository;
    use crate::test_support::{provision_request, test_database, TEST_CURRENCY};

    async fn setup(credits: i64) -> (WalletRepository, String, Uuid) {
        let db = test_database().await;
        let orgs = OrganizationRepository::new(db.pool().clone());
        let request = provision_request(credits);
        let membership = orgs.provision(&request, "signup").await.unwrap();
        (
            WalletRepository::new(db.pool().clone()),
            request.subject,
            membership.organization_id,
        )
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn test_charge_decrements_and_appends_ledger() {
        let (repo, subject, org_id) = setup(10).await;

        let outcome = repo.charge(&subject, TEST_CURRENCY, 3, "req-1").await.unwrap();
        let ChargeOutcome::Charged(change) = outcome else {
            panic!("expected a successful charge");
        };

        assert_eq!(change.balance, 7);
        assert_eq!(change.entry.delta, -3);
        assert_eq!(change.entry.reason, LedgerReason::ChatUsage);
        assert_eq!(change.entry.correlation_id, "req-1");

        let wallet = repo.get_for_organization(org_id, TEST_CURRENCY).await.unwrap();
        assert_eq!(wallet.balance, 7);
        assert_eq!(repo.ledger_sum(wallet.id).await.unwrap(), 7);
    }

    #[tokio::test]
    #[ignore]
    async fn test_insufficient_charge_leaves_no_trace() {
        let (repo, subject, org_id) = setup(2).await;
        let wallet = repo.get_for_organization(org_id, TEST_CURRENCY).await.unwrap();
        let ledger_before = repo.recent_ledger(wallet.id, 100).await.unwrap();

        let outcome = repo.charge(&subject, TEST_CURRENCY, 5, "req-2").await.unwrap();
        assert!(matches!(
            outcome,
            ChargeOutcome::Insufficient { balance: 2, required: 5 }
        ));

        let after = repo.get_for_organization(org_id, TEST_CURRENCY).await.unwrap();
        let ledger_after = repo.recent_ledger(wallet.id, 100).await.unwrap();
        assert_eq!(after.balance, 2);
        assert_eq!(ledger_after.len(), ledger_before.len());
    }

    #[tokio::test]
    #[ignore]
    async fn test_top_up_increases_balance() {
        let (repo, _subject, org_id) = setup(0).await;

        let change = repo
            .credit(org_id, TEST_CURRENCY, 40, LedgerReason::TopUp, Some("invoice 7"), "req-3")
            .await
            .unwrap();

        assert_eq!(change.balance, 40);
        assert_eq!(change.entry.delta, 40);
        assert_eq!(change.entry.note.as_deref(), Some("invoice 7"));
        assert_eq!(repo.recent_ledger(change.wallet_id, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    #[ignore]
    async fn test_unknown_subject_has_no_wallet() {
        let (repo, _subject, _org_id) = setup(5).await;
        let outcome = repo
            .charge("nobody", TEST_CURRENCY, 1, "req-4")
            .await
            .unwrap();
        assert!(matches!(outcome, ChargeOutcome::NoWallet));
    }

    #[tokio::test]
    #[ignore]
    async fn test_ledger_pages_do_not_overlap() {
        let (repo, subject, org_id) = setup(20).await;
        for i in 0..5 {
            repo.charge(&subject, TEST_CURRENCY, 1, &format!("req-{}", i))
                .await
                .unwrap();
        }
        let wallet = repo.get_for_organization(org_id, TEST_CURRENCY).await.unwrap();

        let first = repo.ledger_page(wallet.id, None, 3).await.unwrap();
        assert_eq!(first.len(), 4); // limit + 1 overfetch
        let last = &first[2];
        let cursor = Cursor::new(last.created_at, last.id);

        let second = repo.ledger_page(wallet.id, Some(cursor), 3).await.unwrap();
        let again = repo.ledger_page(wallet.id, Some(cursor), 3).await.unwrap();
        let ids: Vec<Uuid> = second.iter().map(|e| e.id).collect();
        assert_eq!(ids, again.iter().map(|e| e.id).collect::<Vec<_>>());
        assert!(first[..3].iter().all(|e| !ids.contains(&e.id)));
        // 5 charges + signup grant
        assert_eq!(first.len() - 1 + second.len(), 6);
    }
}
