use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use storefront_core::{TenantId, UserId};

use crate::Role;

/// JWT claims model (transport-agnostic).
///
/// Timestamps travel as the registered `iat`/`exp` claims (unix seconds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject / user identifier.
    pub sub: UserId,

    /// Tenant context for the token.
    pub tenant_id: TenantId,

    /// RBAC roles granted within the tenant context.
    pub roles: Vec<Role>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,

    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

impl JwtClaims {
    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("malformed token: {0}")]
    Malformed(String),
}

/// Deterministically validate JWT claims against `now`.
///
/// Signature verification happens in [`crate::jwt`]; this only checks the
/// time window.
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn claims_at(iat: DateTime<Utc>, ttl: Duration) -> JwtClaims {
        JwtClaims {
            sub: UserId::new(),
            tenant_id: TenantId::new(),
            roles: vec![Role::CUSTOMER],
            name: None,
            email: None,
            phone: None,
            issued_at: iat,
            expires_at: iat + ttl,
        }
    }

    #[test]
    fn window_is_checked() {
        let iat = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let c = claims_at(iat, Duration::minutes(10));

        assert_eq!(validate_claims(&c, iat - Duration::seconds(1)), Err(TokenValidationError::NotYetValid));
        assert_eq!(validate_claims(&c, iat + Duration::minutes(5)), Ok(()));
        assert_eq!(validate_claims(&c, iat + Duration::minutes(10)), Err(TokenValidationError::Expired));
        assert_eq!(
            validate_claims(&claims_at(iat, Duration::zero()), iat),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }

    #[test]
    fn timestamps_use_registered_claim_names() {
        let iat = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let json = serde_json::to_value(claims_at(iat, Duration::seconds(60))).unwrap();

        assert_eq!(json["iat"], 1_735_689_600i64);
        assert_eq!(json["exp"], 1_735_689_660i64);
        assert!(json.get("email").is_none());
    }
}
