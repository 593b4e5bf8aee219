//! Tenant context extraction
//!
//! Authentication proper (tokens, sessions, roles) is handled by the edge
//! proxy in front of this service. The proxy injects the authenticated
//! identity as trusted headers; this module only parses them. Handlers still
//! verify tenant membership against `business_members` before touching data.

use crate::db::Repository;
use crate::errors::{AppError, Result};
use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

/// Header carrying the authenticated tenant
pub const TENANT_HEADER: &str = "x-tenant-id";

/// Header carrying the authenticated user
pub const USER_HEADER: &str = "x-user-id";

/// Extracted authentication context available to handlers
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Tenant (business) ID
    pub tenant_id: Uuid,

    /// Authenticated user ID
    pub user_id: Uuid,
}

impl AuthContext {
    /// Verify the user belongs to the tenant they claim.
    pub async fn ensure_member(&self, repo: &Repository) -> Result<()> {
        match repo.find_member(self.tenant_id, self.user_id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::Forbidden {
                message: "user is not a member of this business".to_string(),
            }),
        }
    }
}

fn header_uuid(parts: &Parts, name: &str) -> Result<Uuid> {
    let value = parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized {
            message: format!("missing {} header", name),
        })?;

    Uuid::parse_str(value).map_err(|_| AppError::Unauthorized {
        message: format!("invalid {} header", name),
    })
}

impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        let tenant_id = header_uuid(parts, TENANT_HEADER)?;
        let user_id = header_uuid(parts, USER_HEADER)?;

        Ok(AuthContext { tenant_id, user_id })
    }
}
