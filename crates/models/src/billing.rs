use crate::pagination::{Cursor, Keyed};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

// ============================================================================
// SUBSCRIPTION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    PastDue,
    Canceled,
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trialing => write!(f, "trialing"),
            Self::Active => write!(f, "active"),
            Self::PastDue => write!(f, "past_due"),
            Self::Canceled => write!(f, "canceled"),
        }
    }
}

/// Plan metadata for an organization. One active row per org by convention.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub plan: String,
    pub status: SubscriptionStatus,
    pub seats: i32,
    pub monthly_credits: i64,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// WALLET & LEDGER
// ============================================================================

/// Per-(organization, currency) integer balance
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CreditWallet {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub currency: String,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Why a ledger row was written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LedgerReason {
    SignupGrant,
    ChatUsage,
    TopUp,
    Refund,
}

impl std::fmt::Display for LedgerReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SignupGrant => write!(f, "signup_grant"),
            Self::ChatUsage => write!(f, "chat_usage"),
            Self::TopUp => write!(f, "top_up"),
            Self::Refund => write!(f, "refund"),
        }
    }
}

/// Append-only balance delta. Rows are never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub delta: i64,
    pub reason: LedgerReason,
    pub note: Option<String>,
    pub correlation_id: String,
    pub created_at: DateTime<Utc>,
}

impl Keyed for LedgerEntry {
    fn cursor(&self) -> Cursor {
        Cursor::new(self.created_at, self.id)
    }
}

/// Result of a successful charge or top-up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceChange {
    pub wallet_id: Uuid,
    pub organization_id: Uuid,
    pub balance: i64,
    pub entry: LedgerEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TopUpRequest {
    #[validate(range(min = 1))]
    pub amount: i64,

    #[validate(length(max = 255))]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reconciliation {
    pub balance: i64,
    pub ledger_sum: i64,
    pub reconciled: bool,
}

impl Reconciliation {
    pub fn new(balance: i64, ledger_sum: i64) -> Self {
        Self {
            balance,
            ledger_sum,
            reconciled: balance == ledger_sum,
        }
    }
}

/// Admin billing dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingOverview {
    pub organization_id: Uuid,
    pub subscription: Option<Subscription>,
    pub wallet: CreditWallet,
    pub recent_ledger: Vec<LedgerEntry>,
    pub reconciliation: Reconciliation,
}
