use crate::config::BillingConfig;
use crate::error::{AuthError, Result};
use coachdesk_database::{ChargeOutcome, Database, SubscriptionRepository, WalletRepository};
use coachdesk_models::{
    BalanceChange, BillingOverview, CreditWallet, Cursor, LedgerEntry, LedgerReason, Page,
    Reconciliation, TopUpRequest,
};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

const RECENT_LEDGER_ROWS: i64 = 20;

/// Credit wallet operations: metering chat usage and admin top-ups
pub struct BillingService {
    wallets: WalletRepository,
    subscriptions: SubscriptionRepository,
    config: BillingConfig,
}

impl BillingService {
    pub fn new(db: &Database, config: BillingConfig) -> Self {
        let pool = db.pool().clone();

        Self {
            wallets: WalletRepository::new(pool.clone()),
            subscriptions: SubscriptionRepository::new(pool),
            config,
        }
    }

    pub fn currency(&self) -> &str {
        &self.config.currency
    }

    // ========================================================================
    // METERING
    // ========================================================================

    /// Debit `amount` from the subject's wallet, or fail without side effects
    pub async fn charge(
        &self,
        subject: &str,
        amount: i64,
        correlation_id: &str,
    ) -> Result<BalanceChange> {
        match self
            .wallets
            .charge(subject, &self.config.currency, amount, correlation_id)
            .await?
        {
            ChargeOutcome::Charged(change) => Ok(change),
            ChargeOutcome::Insufficient { balance, required } => {
                info!(
                    subject = %subject,
                    balance,
                    required,
                    correlation_id = %correlation_id,
                    "Charge rejected: insufficient credits"
                );
                Err(AuthError::InsufficientCredits { balance, required })
            }
            ChargeOutcome::NoWallet => Err(AuthError::NotFound(format!(
                "No {} wallet for subject {}",
                self.config.currency, subject
            ))),
        }
    }

    /// Compensate a charge whose work could not be delivered
    pub async fn refund(&self, charge: &BalanceChange, correlation_id: &str) -> Result<BalanceChange> {
        let amount = -charge.entry.delta;
        let change = self
            .wallets
            .credit(
                charge.organization_id,
                &self.config.currency,
                amount,
                LedgerReason::Refund,
                Some("upstream failure"),
                correlation_id,
            )
            .await?;

        warn!(
            organization_id = %charge.organization_id,
            amount,
            correlation_id = %correlation_id,
            "Refunded chat charge"
        );

        Ok(change)
    }

    // ========================================================================
    // ADMIN
    // ========================================================================

    pub async fn top_up(
        &self,
        organization_id: Uuid,
        request: &TopUpRequest,
        correlation_id: &str,
    ) -> Result<BalanceChange> {
        request.validate()?;
        if request.amount > self.config.max_topup {
            return Err(AuthError::InvalidInput(format!(
                "Top-up amount exceeds the maximum of {}",
                self.config.max_topup
            )));
        }

        let note = request.note.as_deref().map(str::trim).filter(|n| !n.is_empty());
        let change = self
            .wallets
            .credit(
                organization_id,
                &self.config.currency,
                request.amount,
                LedgerReason::TopUp,
                note,
                correlation_id,
            )
            .await?;

        info!(
            organization_id = %organization_id,
            amount = request.amount,
            balance = change.balance,
            "Wallet topped up"
        );

        Ok(change)
    }

    pub async fn wallet(&self, organization_id: Uuid) -> Result<CreditWallet> {
        Ok(self
            .wallets
            .get_for_organization(organization_id, &self.config.currency)
            .await?)
    }

    /// Subscription, wallet, recent ledger and the balance/ledger comparison
    pub async fn overview(&self, organization_id: Uuid) -> Result<BillingOverview> {
        let wallet = self.wallet(organization_id).await?;
        let subscription = self.subscriptions.get_current(organization_id).await?;
        let recent_ledger = self.wallets.recent_ledger(wallet.id, RECENT_LEDGER_ROWS).await?;
        let ledger_sum = self.wallets.ledger_sum(wallet.id).await?;

        let reconciliation = Reconciliation::new(wallet.balance, ledger_sum);
        if !reconciliation.reconciled {
            warn!(
                wallet_id = %wallet.id,
                balance = wallet.balance,
                ledger_sum,
                "Wallet balance does not match ledger"
            );
        }

        Ok(BillingOverview {
            organization_id,
            subscription,
            wallet,
            recent_ledger,
            reconciliation,
        })
    }

    pub async fn ledger_page(
        &self,
        organization_id: Uuid,
        cursor: Option<Cursor>,
        limit: u32,
    ) -> Result<Page<LedgerEntry>> {
        let wallet = self.wallet(organization_id).await?;
        let rows = self.wallets.ledger_page(wallet.id, cursor, limit).await?;
        Ok(Page::from_overfetch(rows, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity_service::IdentityService;
    use crate::jwt::Claims;
    use coachdesk_database::DatabaseConfig;

    async fn setup(signup_credits: i64) -> (BillingService, String, Uuid) {
        let db = Database::new(DatabaseConfig::from_env())
            .await
            .expect("Failed to connect to database");
        db.migrate().await.unwrap();

        let config = BillingConfig {
            signup_credits,
            max_topup: 500,
            ..BillingConfig::default()
        };
        let claims = Claims {
            sub: format!("user_{}", Uuid::new_v4()),
            email: None,
            name: None,
            role: None,
            org_role: None,
            org_name: None,
            exp: 0,
            iat: None,
            iss: None,
        };
        let identity = IdentityService::new(&db, config.clone())
            .resolve(&claims, "signup")
            .await
            .unwrap();

        (
            BillingService::new(&db, config),
            claims.sub,
            identity.organization_id,
        )
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn test_charge_then_refund_reconciles() {
        let (billing, subject, org_id) = setup(10).await;

        let charge = billing.charge(&subject, 4, "req-1").await.unwrap();
        assert_eq!(charge.balance, 6);

        let refund = billing.refund(&charge, "req-1").await.unwrap();
        assert_eq!(refund.balance, 10);
        assert_eq!(refund.entry.reason, LedgerReason::Refund);

        let overview = billing.overview(org_id).await.unwrap();
        assert!(overview.reconciliation.reconciled);
        assert_eq!(overview.recent_ledger.len(), 3);
    }

    #[tokio::test]
    #[ignore]
    async fn test_insufficient_credits() {
        let (billing, subject, _org_id) = setup(1).await;
        let result = billing.charge(&subject, 2, "req-2").await;
        assert!(matches!(
            result,
            Err(AuthError::InsufficientCredits { balance: 1, required: 2 })
        ));
    }

    #[tokio::test]
    #[ignore]
    async fn test_top_up_limits() {
        let (billing, _subject, org_id) = setup(0).await;

        let over = TopUpRequest { amount: 501, note: None };
        assert!(matches!(
            billing.top_up(org_id, &over, "req-3").await,
            Err(AuthError::InvalidInput(_))
        ));

        let zero = TopUpRequest { amount: 0, note: None };
        assert!(matches!(
            billing.top_up(org_id, &zero, "req-3").await,
            Err(AuthError::ValidationError(_))
        ));

        let ok = TopUpRequest { amount: 50, note: Some("manual".to_string()) };
        let change = billing.top_up(org_id, &ok, "req-3").await.unwrap();
        assert_eq!(change.balance, 50);
        assert_eq!(billing.wallet(org_id).await.unwrap().balance, 50);
    }
}
