use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Role;

/// Permission identifier.
///
/// Permissions are opaque strings (e.g. "orders.read"). The wildcard `"*"`
/// grants everything and is only handed to admins.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));

    pub const CATALOG_MANAGE: Permission = Permission(Cow::Borrowed("catalog.manage"));
    pub const ORDERS_READ: Permission = Permission(Cow::Borrowed("orders.read"));
    pub const ORDERS_UPDATE: Permission = Permission(Cow::Borrowed("orders.update"));
    /// Move orders through kitchen states (preparing, ready, served).
    pub const ORDERS_KITCHEN: Permission = Permission(Cow::Borrowed("orders.kitchen"));
    pub const COUPONS_MANAGE: Permission = Permission(Cow::Borrowed("coupons.manage"));
    pub const REVIEWS_MODERATE: Permission = Permission(Cow::Borrowed("reviews.moderate"));
    pub const CUSTOMERS_READ: Permission = Permission(Cow::Borrowed("customers.read"));
    pub const TICKETS_MANAGE: Permission = Permission(Cow::Borrowed("tickets.manage"));
    pub const CONVERSATIONS_READ: Permission = Permission(Cow::Borrowed("conversations.read"));
    pub const SETTINGS_MANAGE: Permission = Permission(Cow::Borrowed("settings.manage"));
    pub const REPORTS_READ: Permission = Permission(Cow::Borrowed("reports.read"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static role → permission policy.
///
/// Unknown roles (and `customer`) contribute nothing.
pub fn permissions_for_roles(roles: &[Role]) -> Vec<Permission> {
    if roles.iter().any(|r| r == &Role::ADMIN) {
        return vec![Permission::WILDCARD];
    }

    let mut granted: Vec<Permission> = Vec::new();
    let mut grant = |p: Permission| {
        if !granted.contains(&p) {
            granted.push(p);
        }
    };

    for role in roles {
        match role.as_str() {
            "staff" => {
                grant(Permission::ORDERS_READ);
                grant(Permission::ORDERS_UPDATE);
                grant(Permission::ORDERS_KITCHEN);
                grant(Permission::TICKETS_MANAGE);
                grant(Permission::CONVERSATIONS_READ);
                grant(Permission::CUSTOMERS_READ);
            }
            "chef" => {
                grant(Permission::ORDERS_READ);
                grant(Permission::ORDERS_KITCHEN);
            }
            _ => {}
        }
    }

    granted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_gets_wildcard() {
        assert_eq!(permissions_for_roles(&[Role::ADMIN]), vec![Permission::WILDCARD]);
    }

    #[test]
    fn customer_gets_nothing() {
        assert!(permissions_for_roles(&[Role::CUSTOMER]).is_empty());
        assert!(permissions_for_roles(&[Role::new("superuser")]).is_empty());
    }

    #[test]
    fn chef_can_read_and_cook_but_not_update_orders() {
        let perms = permissions_for_roles(&[Role::CHEF]);
        assert!(perms.contains(&Permission::ORDERS_READ));
        assert!(perms.contains(&Permission::ORDERS_KITCHEN));
        assert!(!perms.contains(&Permission::ORDERS_UPDATE));
    }

    #[test]
    fn overlapping_roles_do_not_duplicate() {
        let perms = permissions_for_roles(&[Role::STAFF, Role::CHEF]);
        let reads = perms.iter().filter(|p| **p == Permission::ORDERS_READ).count();
        assert_eq!(reads, 1);
    }
}
