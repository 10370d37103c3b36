//! API-side authorization guard.
//!
//! Handlers call this before touching storage; domain crates and infra stay
//! auth-agnostic.

use storefront_auth::{AuthzError, Permission, Principal, TenantMembership, authorize};

use crate::context::{PrincipalContext, TenantContext};

/// Check that the caller holds every permission in `required` within the
/// request's tenant.
pub fn require_permissions(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    required: &[Permission],
) -> Result<(), AuthzError> {
    let principal = Principal {
        user_id: principal.user_id(),
        active_tenant_id: tenant.tenant_id(),
        membership: TenantMembership::from_roles(tenant.tenant_id(), principal.roles().to_vec()),
    };

    for perm in required {
        authorize(&principal, perm)?;
    }

    Ok(())
}

pub fn require_permission(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    required: Permission,
) -> Result<(), AuthzError> {
    require_permissions(tenant, principal, std::slice::from_ref(&required))
}

/// Whether the caller holds at least one of `options`.
pub fn any_permission(tenant: &TenantContext, principal: &PrincipalContext, options: &[Permission]) -> bool {
    options
        .iter()
        .any(|p| require_permissions(tenant, principal, std::slice::from_ref(p)).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_auth::Role;
    use storefront_core::{TenantId, UserId};

    #[test]
    fn admin_passes_every_check() {
        let tenant = TenantContext::new(TenantId::new());
        let admin = PrincipalContext::new(UserId::new(), vec![Role::ADMIN]);
        assert!(require_permission(&tenant, &admin, Permission::SETTINGS_MANAGE).is_ok());
        assert!(require_permissions(&tenant, &admin, &[Permission::ORDERS_READ, Permission::REPORTS_READ]).is_ok());
    }

    #[test]
    fn chef_may_only_touch_the_kitchen() {
        let tenant = TenantContext::new(TenantId::new());
        let chef = PrincipalContext::new(UserId::new(), vec![Role::CHEF]);
        assert!(require_permission(&tenant, &chef, Permission::ORDERS_KITCHEN).is_ok());
        assert_eq!(
            require_permission(&tenant, &chef, Permission::ORDERS_UPDATE),
            Err(AuthzError::Forbidden("orders.update".into()))
        );
        assert!(any_permission(&tenant, &chef, &[Permission::ORDERS_UPDATE, Permission::ORDERS_KITCHEN]));
    }

    #[test]
    fn customers_hold_nothing() {
        let tenant = TenantContext::new(TenantId::new());
        let customer = PrincipalContext::new(UserId::new(), vec![Role::CUSTOMER]);
        assert!(require_permission(&tenant, &customer, Permission::ORDERS_READ).is_err());
    }
}
