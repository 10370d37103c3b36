use thiserror::Error;

use storefront_core::{TenantId, UserId};

use crate::{Permission, TenantMembership};

/// A fully resolved principal for authorization decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub active_tenant_id: TenantId,
    pub membership: TenantMembership,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("tenant mismatch")]
    TenantMismatch,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Authorize a principal within its active tenant context.
///
/// - No IO
/// - No panics
/// - Pure policy check
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    if principal.active_tenant_id != principal.membership.tenant_id {
        return Err(AuthzError::TenantMismatch);
    }

    let granted = principal
        .membership
        .permissions
        .iter()
        .any(|p| p.is_wildcard() || p == required);

    if granted {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;

    fn principal(roles: Vec<Role>) -> Principal {
        let tenant = TenantId::new();
        Principal {
            user_id: UserId::new(),
            active_tenant_id: tenant,
            membership: TenantMembership::from_roles(tenant, roles),
        }
    }

    #[test]
    fn admin_is_allowed_everything() {
        let p = principal(vec![Role::ADMIN]);
        assert!(authorize(&p, &Permission::SETTINGS_MANAGE).is_ok());
        assert!(authorize(&p, &Permission::new("anything.at.all")).is_ok());
    }

    #[test]
    fn customer_is_forbidden_from_back_office() {
        let p = principal(vec![Role::CUSTOMER]);
        assert_eq!(
            authorize(&p, &Permission::ORDERS_READ),
            Err(AuthzError::Forbidden("orders.read".into()))
        );
    }

    #[test]
    fn staff_cannot_manage_settings() {
        let p = principal(vec![Role::STAFF]);
        assert!(authorize(&p, &Permission::ORDERS_UPDATE).is_ok());
        assert!(authorize(&p, &Permission::SETTINGS_MANAGE).is_err());
    }

    #[test]
    fn tenant_mismatch_is_rejected_even_for_admin() {
        let mut p = principal(vec![Role::ADMIN]);
        p.active_tenant_id = TenantId::new();
        assert_eq!(authorize(&p, &Permission::ORDERS_READ), Err(AuthzError::TenantMismatch));
    }
}
