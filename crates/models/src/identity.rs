use crate::organization::MemberRole;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// "Who am I" payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhoAmI {
    pub subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub organization_id: Uuid,
    pub organization_name: String,
    pub role: MemberRole,
    pub balance: i64,
    pub currency: String,
}
