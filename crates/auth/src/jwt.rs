//! Bearer token verification.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};

use crate::{JwtClaims, TokenValidationError, validate_claims};

/// Verifies a raw bearer token and returns its claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError>;
}

/// HMAC-SHA256 validator with a shared secret.
pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // The time window is checked against the caller's clock in `validate_claims`.
        validation.validate_exp = false;
        validation.required_spec_claims = HashSet::new();

        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError> {
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.key, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => TokenValidationError::InvalidSignature,
            _ => TokenValidationError::Malformed(e.to_string()),
        })?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jsonwebtoken::{EncodingKey, Header};
    use storefront_core::{TenantId, UserId};

    use crate::Role;

    fn mint(secret: &str, ttl: Duration) -> (String, JwtClaims) {
        let now = Utc::now();
        let claims = JwtClaims {
            sub: UserId::new(),
            tenant_id: TenantId::new(),
            roles: vec![Role::ADMIN],
            name: Some("Rahim".into()),
            email: Some("rahim@example.com".into()),
            phone: None,
            issued_at: now - Duration::seconds(1),
            expires_at: now + ttl,
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();
        (token, claims)
    }

    #[test]
    fn accepts_token_signed_with_same_secret() {
        let (token, claims) = mint("s3cret", Duration::minutes(5));
        let v = Hs256JwtValidator::new("s3cret");

        let decoded = v.validate(&token, Utc::now()).unwrap();
        assert_eq!(decoded.sub, claims.sub);
        assert_eq!(decoded.tenant_id, claims.tenant_id);
        assert_eq!(decoded.email.as_deref(), Some("rahim@example.com"));
    }

    #[test]
    fn rejects_foreign_signature() {
        let (token, _) = mint("other", Duration::minutes(5));
        let v = Hs256JwtValidator::new("s3cret");

        assert_eq!(v.validate(&token, Utc::now()), Err(TokenValidationError::InvalidSignature));
    }

    #[test]
    fn rejects_expired_and_garbage() {
        let (token, _) = mint("s3cret", Duration::minutes(5));
        let v = Hs256JwtValidator::new("s3cret");

        assert_eq!(
            v.validate(&token, Utc::now() + Duration::minutes(6)),
            Err(TokenValidationError::Expired)
        );
        assert!(matches!(v.validate("not-a-jwt", Utc::now()), Err(TokenValidationError::Malformed(_))));
    }
}
