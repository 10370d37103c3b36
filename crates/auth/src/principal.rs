use serde::{Deserialize, Serialize};

use storefront_core::TenantId;

/// A principal's membership in a tenant.
///
/// States *which tenant* the principal is acting within and which
/// roles/permissions are granted there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantMembership {
    pub tenant_id: TenantId,
    pub roles: Vec<crate::Role>,
    pub permissions: Vec<crate::Permission>,
}

impl TenantMembership {
    /// Membership whose permissions are derived from the static role policy.
    pub fn from_roles(tenant_id: TenantId, roles: Vec<crate::Role>) -> Self {
        let permissions = crate::permissions_for_roles(&roles);
        Self {
            tenant_id,
            roles,
            permissions,
        }
    }
}
