// Core modules
pub mod billing;
pub mod chat;
pub mod identity;
pub mod metrics;
pub mod organization;
pub mod pagination;
pub mod scorecard;

// Re-export commonly used types
pub use billing::{
    BalanceChange, BillingOverview, CreditWallet, LedgerEntry, LedgerReason,
    Reconciliation, Subscription, SubscriptionStatus, TopUpRequest,
};
pub use chat::{
    derive_title, ChatMessage, ChatMode, ChatOutcome, ChatResponse, ChatSession, ExchangeSession,
    MessageRole, NewChatExchange, NewChatMessage, NewChatSession, RenameSessionRequest,
    SendMessageRequest, TokenUsage,
};
pub use identity::WhoAmI;
pub use metrics::{MetricsBucket, MetricsSnapshot};
pub use organization::{
    MemberRole, Membership, Organization, OrganizationMember, ProvisionOrganization,
};
pub use pagination::{Cursor, CursorError, Keyed, Page, PageQuery};
pub use scorecard::{CriterionScore, Scorecard};
