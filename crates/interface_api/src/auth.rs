//! Authentication and authorization
//!
//! Bearer tokens carry the caller's organization; every ledger call is
//! scoped to it.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind as JwtErrorKind, DecodingKey, EncodingKey, Header,
    Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use core_kernel::{OrganizationId, UserId};

use crate::error::ApiError;

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Organization the caller acts for
    pub org: Uuid,
    pub roles: Vec<String>,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued at timestamp
    pub iat: i64,
}

impl Claims {
    pub fn organization_id(&self) -> OrganizationId {
        OrganizationId::from_uuid(self.org)
    }

    /// The subject as a user id, when it is a UUID
    pub fn user_id(&self) -> Option<UserId> {
        self.sub.parse().ok()
    }
}

/// Auth errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
}

/// Creates a signed token for `user_id` acting for `org`
pub fn create_token(
    user_id: &str,
    org: OrganizationId,
    roles: Vec<String>,
    secret: &str,
    expiration_secs: u64,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let exp = now + Duration::seconds(expiration_secs as i64);

    let claims = Claims {
        sub: user_id.to_string(),
        org: *org.as_uuid(),
        roles,
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::InvalidToken)
}

/// Validates a JWT token
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        JwtErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })?;

    Ok(token_data.claims)
}

/// Checks if user has required role
pub fn has_role(claims: &Claims, required_role: &str) -> bool {
    claims.roles.iter().any(|r| r == required_role || r == "admin")
}

/// Permission definitions
pub mod permissions {
    pub const LEDGER_READ: &str = "ledger:read";
    pub const LEDGER_WRITE: &str = "ledger:write";
    /// Chart of accounts, accounting config and retention settings
    pub const LEDGER_ADMIN: &str = "ledger:admin";
}

/// The authenticated caller's organization, extracted from the claims the
/// auth middleware stored on the request
#[derive(Debug, Clone)]
pub struct Tenant {
    pub org: OrganizationId,
    pub claims: Claims,
}

impl Tenant {
    /// Fails with `Forbidden` unless the caller holds `permission`
    pub fn require(&self, permission: &'static str) -> Result<(), ApiError> {
        if has_role(&self.claims, permission) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(permission))
        }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Tenant {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts
            .extensions
            .get::<Claims>()
            .cloned()
            .ok_or(ApiError::Unauthorized)?;
        Ok(Tenant {
            org: claims.organization_id(),
            claims,
        })
    }
}
