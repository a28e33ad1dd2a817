use std::env;

/// Wallet and plan defaults applied at provisioning and top-up time
#[derive(Debug, Clone)]
pub struct BillingConfig {
    pub signup_credits: i64,
    pub default_plan: String,
    pub currency: String,
    pub max_topup: i64,
    pub period_days: i64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            signup_credits: 100,
            default_plan: "free".to_string(),
            currency: "credits".to_string(),
            max_topup: 1_000_000,
            period_days: 30,
        }
    }
}

impl BillingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            signup_credits: env::var("BILLING_SIGNUP_CREDITS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &i64| *v >= 0)
                .unwrap_or(defaults.signup_credits),
            default_plan: env::var("BILLING_DEFAULT_PLAN").unwrap_or(defaults.default_plan),
            currency: env::var("BILLING_CURRENCY").unwrap_or(defaults.currency),
            max_topup: env::var("BILLING_MAX_TOPUP")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &i64| *v > 0)
                .unwrap_or(defaults.max_topup),
            period_days: defaults.period_days,
        }
    }
}
