use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Organization owning a wallet, a subscription and its members' chats.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Role of an identity subject inside an organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Admin,
    Member,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for MemberRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemberRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            other => Err(format!("unknown member role: {}", other)),
        }
    }
}

/// Link between an identity subject and an organization.
/// Unique per (organization_id, subject).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrganizationMember {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub subject: String,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

/// Membership joined with its organization, as resolved for a request
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Membership {
    pub organization_id: Uuid,
    pub organization_name: String,
    pub subject: String,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

/// Request to provision an organization for a first-time subject
#[derive(Debug, Clone)]
pub struct ProvisionOrganization {
    pub subject: String,
    pub organization_name: String,
    pub plan: String,
    pub currency: String,
    pub signup_credits: i64,
    pub period_days: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_role_parse() {
        assert_eq!("admin".parse::<MemberRole>().unwrap(), MemberRole::Admin);
        assert_eq!(" Member ".parse::<MemberRole>().unwrap(), MemberRole::Member);
        assert!("owner".parse::<MemberRole>().is_err());
    }

    #[test]
    fn test_member_role_serializes_snake_case() {
        let json = serde_json::to_string(&MemberRole::Admin).unwrap();
        assert_eq!(json, "\"admin\"");
        assert!(MemberRole::Admin.is_admin());
        assert!(!MemberRole::Member.is_admin());
    }
}
