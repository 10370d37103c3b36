use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use storefront_auth::JwtValidator;
use storefront_core::TenantId;

use crate::app::errors::json_error;
use crate::context::{PrincipalContext, TenantContext};

pub const TENANT_HEADER: &str = "x-tenant-id";

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
    pub default_tenant: TenantId,
}

/// Resolve the tenant (and, with a bearer token, the principal) for every
/// request.
///
/// A presented token must be valid; the tenant then comes from its claims.
/// Anonymous requests use `X-Tenant-Id` or the default tenant.
pub async fn context_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    match extract_bearer(req.headers()) {
        Bearer::Present(token) => {
            let claims = state.jwt.validate(token, Utc::now()).map_err(|e| {
                tracing::debug!(error = %e, "rejected bearer token");
                json_error(StatusCode::UNAUTHORIZED, "unauthorized", "invalid or expired token")
            })?;
            req.extensions_mut().insert(TenantContext::new(claims.tenant_id));
            req.extensions_mut().insert(PrincipalContext::from_claims(&claims));
        }
        Bearer::Malformed => {
            return Err(json_error(StatusCode::UNAUTHORIZED, "unauthorized", "malformed authorization header"));
        }
        Bearer::Absent => {
            let tenant_id = tenant_from_header(req.headers())?.unwrap_or(state.default_tenant);
            req.extensions_mut().insert(TenantContext::new(tenant_id));
        }
    }

    Ok(next.run(req).await)
}

/// Reject requests that did not present a valid token.
pub async fn require_principal(
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    if req.extensions().get::<PrincipalContext>().is_none() {
        return Err(json_error(StatusCode::UNAUTHORIZED, "unauthorized", "authentication required"));
    }
    Ok(next.run(req).await)
}

enum Bearer<'a> {
    Absent,
    Malformed,
    Present(&'a str),
}

fn extract_bearer(headers: &HeaderMap) -> Bearer<'_> {
    let Some(header) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Bearer::Absent;
    };

    let Ok(header) = header.to_str() else {
        return Bearer::Malformed;
    };

    match header.strip_prefix("Bearer ").map(str::trim) {
        Some(token) if !token.is_empty() => Bearer::Present(token),
        _ => Bearer::Malformed,
    }
}

fn tenant_from_header(headers: &HeaderMap) -> Result<Option<TenantId>, Response> {
    let Some(raw) = headers.get(TENANT_HEADER) else {
        return Ok(None);
    };
    raw.to_str()
        .ok()
        .and_then(|s| s.trim().parse::<TenantId>().ok())
        .map(Some)
        .ok_or_else(|| json_error(StatusCode::BAD_REQUEST, "invalid_tenant", "X-Tenant-Id must be a UUID"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_extraction() {
        let mut headers = HeaderMap::new();
        assert!(matches!(extract_bearer(&headers), Bearer::Absent));

        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(matches!(extract_bearer(&headers), Bearer::Malformed));

        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert!(matches!(extract_bearer(&headers), Bearer::Malformed));

        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Bearer tok"));
        assert!(matches!(extract_bearer(&headers), Bearer::Present("tok")));
    }

    #[test]
    fn tenant_header_must_be_a_uuid() {
        let mut headers = HeaderMap::new();
        assert_eq!(tenant_from_header(&headers).ok(), Some(None));

        let tenant = TenantId::new();
        headers.insert(TENANT_HEADER, HeaderValue::from_str(&tenant.to_string()).unwrap());
        assert_eq!(tenant_from_header(&headers).ok(), Some(Some(tenant)));

        headers.insert(TENANT_HEADER, HeaderValue::from_static("acme"));
        assert!(tenant_from_header(&headers).is_err());
    }
}
