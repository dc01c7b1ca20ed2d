use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub user_metadata: Option<serde_json::Value>,
    pub iat: Option<u64>,
}

/// Identity attached to a request by the auth middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    /// The owning identity used to scope appointments and reviews.
    pub fn user_uuid(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.id)
            .map_err(|_| AppError::Auth("Token subject is not a valid user id".to_string()))
    }

    pub fn has_role(&self, roles: &[&str]) -> bool {
        self.role.as_deref().is_some_and(|role| roles.contains(&role))
    }
}
