use crate::config::BillingConfig;
use crate::error::Result;
use crate::jwt::Claims;
use coachdesk_database::{Database, OrganizationRepository};
use coachdesk_models::{MemberRole, Membership, ProvisionOrganization};
use tracing::info;
use uuid::Uuid;

const FALLBACK_ORGANIZATION_NAME: &str = "Personal workspace";

/// Verified caller: token claims joined with the organization membership
#[derive(Debug, Clone)]
pub struct Identity {
    pub subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub organization_id: Uuid,
    pub organization_name: String,
    pub role: MemberRole,
}

/// Maps verified token claims onto an organization, provisioning one on
/// a subject's first sign-in
pub struct IdentityService {
    organizations: OrganizationRepository,
    billing: BillingConfig,
}

impl IdentityService {
    pub fn new(db: &Database, billing: BillingConfig) -> Self {
        Self {
            organizations: OrganizationRepository::new(db.pool().clone()),
            billing,
        }
    }

    pub async fn resolve(&self, claims: &Claims, correlation_id: &str) -> Result<Identity> {
        let membership = match self.organizations.find_membership(&claims.sub).await? {
            Some(membership) => membership,
            None => self.provision(claims, correlation_id).await?,
        };

        Ok(Identity {
            subject: claims.sub.clone(),
            email: claims.email.clone(),
            name: claims.name.clone(),
            organization_id: membership.organization_id,
            organization_name: membership.organization_name,
            role: effective_role(claims, membership.role),
        })
    }

    async fn provision(&self, claims: &Claims, correlation_id: &str) -> Result<Membership> {
        let request = ProvisionOrganization {
            subject: claims.sub.clone(),
            organization_name: organization_name(claims),
            plan: self.billing.default_plan.clone(),
            currency: self.billing.currency.clone(),
            signup_credits: self.billing.signup_credits,
            period_days: self.billing.period_days,
        };

        let membership = self.organizations.provision(&request, correlation_id).await?;

        info!(
            subject = %claims.sub,
            organization_id = %membership.organization_id,
            correlation_id = %correlation_id,
            "Provisioned organization on first sign-in"
        );

        Ok(membership)
    }
}

/// Admin if the token says so, otherwise whatever the membership grants
pub fn effective_role(claims: &Claims, membership_role: MemberRole) -> MemberRole {
    if claims.claims_admin() {
        MemberRole::Admin
    } else {
        membership_role
    }
}

/// `org_name` claim, else the email domain, else a generic name
pub fn organization_name(claims: &Claims) -> String {
    if let Some(name) = claims.org_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        return name.to_string();
    }

    claims
        .email
        .as_deref()
        .and_then(|email| email.rsplit_once('@'))
        .map(|(_, domain)| domain.trim())
        .filter(|domain| !domain.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| FALLBACK_ORGANIZATION_NAME.to_string())
}
