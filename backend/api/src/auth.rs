//! Request-scoped authentication principal.
//!
//! Token issuance and signature verification live in the upstream auth
//! gateway; by the time a request reaches this service the bearer token's
//! claims payload (base64-encoded JSON) is trusted. This module decodes it
//! into a [`Principal`] that handlers receive as an extractor, so there is
//! no ambient auth state anywhere in the process.
//!
//! For students the subject id is the student record id; for wardens the
//! warden record id. Ownership checks compare against it directly.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;

use crate::errors::{ApiError, Result};
use crate::models::Role;

/// Claims payload carried inside the bearer token.
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub role: Role,
    pub email: String,
}

/// The authenticated caller, passed explicitly into every handler.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: i64,
    pub role: Role,
    pub email: String,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_staff(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Warden)
    }

    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }

    /// Admin or warden.
    pub fn require_staff(&self) -> Result<()> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }

    pub fn require_student(&self) -> Result<()> {
        if self.role == Role::Student {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

/// Decode `Bearer <base64 claims JSON>` into a [`Principal`].
pub fn decode_bearer(header_value: &str) -> Result<Principal> {
    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthorized)?
        .trim();

    let raw = STANDARD
        .decode(token)
        .map_err(|_| ApiError::Unauthorized)?;

    let claims: Claims =
        serde_json::from_slice(&raw).map_err(|_| ApiError::Unauthorized)?;

    Ok(Principal {
        id: claims.sub,
        role: claims.role,
        email: claims.email,
    })
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        decode_bearer(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_for(sub: i64, role: &str, email: &str) -> String {
        let claims = format!(r#"{{"sub":{sub},"role":"{role}","email":"{email}"}}"#);
        format!("Bearer {}", STANDARD.encode(claims))
    }

    #[test]
    fn decodes_valid_token() {
        let principal = decode_bearer(&token_for(7, "warden", "w@hostel.edu")).unwrap();
        assert_eq!(principal.id, 7);
        assert_eq!(principal.role, Role::Warden);
        assert_eq!(principal.email, "w@hostel.edu");
    }

    #[test]
    fn rejects_missing_scheme() {
        assert!(matches!(
            decode_bearer("Basic abcdef"),
            Err(ApiError::Unauthorized)
        ));
    }

    #[test]
    fn rejects_garbage_payload() {
        assert!(matches!(
            decode_bearer("Bearer not-base64!!"),
            Err(ApiError::Unauthorized)
        ));
        let junk = format!("Bearer {}", STANDARD.encode("{\"sub\":1}"));
        assert!(matches!(decode_bearer(&junk), Err(ApiError::Unauthorized)));
    }

    #[test]
    fn rejects_unknown_role() {
        let tok = token_for(1, "superuser", "x@y.com");
        assert!(matches!(decode_bearer(&tok), Err(ApiError::Unauthorized)));
    }

    #[test]
    fn role_gates() {
        let admin = decode_bearer(&token_for(1, "admin", "a@y.com")).unwrap();
        let student = decode_bearer(&token_for(2, "student", "s@y.com")).unwrap();

        assert!(admin.require_staff().is_ok());
        assert!(admin.require_admin().is_ok());
        assert!(student.require_student().is_ok());
        assert!(matches!(student.require_staff(), Err(ApiError::Forbidden)));
        assert!(matches!(student.require_admin(), Err(ApiError::Forbidden)));
    }
}
