use storefront_auth::{JwtClaims, Role};
use storefront_core::{TenantId, UserId};

/// Tenant context for a request.
///
/// Always present: resolved from the token, the `X-Tenant-Id` header, or the
/// configured default tenant.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Principal context for a request (authenticated identity + roles).
///
/// Only inserted when a valid bearer token was presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    user_id: UserId,
    roles: Vec<Role>,
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
}

impl PrincipalContext {
    pub fn new(user_id: UserId, roles: Vec<Role>) -> Self {
        Self {
            user_id,
            roles,
            name: None,
            email: None,
            phone: None,
        }
    }

    pub fn from_claims(claims: &JwtClaims) -> Self {
        Self {
            user_id: claims.sub,
            roles: claims.roles.clone(),
            name: claims.name.clone(),
            email: claims.email.clone(),
            phone: claims.phone.clone(),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    pub fn is_back_office(&self) -> bool {
        self.roles.iter().any(Role::is_back_office)
    }
}
