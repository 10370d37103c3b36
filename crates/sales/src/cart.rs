use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_catalog::{ProductId, VariantId};
use storefront_core::{DomainError, DomainResult, Money, TenantId, UserId};

use crate::ShippingPolicy;

/// Upper bound for a single cart line.
pub const MAX_LINE_QUANTITY: i64 = 99;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    #[serde(default)]
    pub variant_id: Option<VariantId>,
    pub quantity: i64,
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    fn same_item(&self, product_id: ProductId, variant_id: Option<VariantId>) -> bool {
        self.product_id == product_id && self.variant_id == variant_id
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    pub subtotal: Money,
    pub shipping: Money,
    pub total: Money,
    pub item_count: i64,
}

/// A signed-in customer's cart.
///
/// Stores references only; prices are resolved against the live catalog
/// whenever totals are computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub lines: Vec<CartLine>,
    pub updated_at: DateTime<Utc>,
}

fn ensure_quantity(quantity: i64) -> DomainResult<()> {
    if quantity > MAX_LINE_QUANTITY {
        return Err(DomainError::validation(format!("quantity cannot exceed {MAX_LINE_QUANTITY}")));
    }
    Ok(())
}

impl Cart {
    pub fn new(tenant_id: TenantId, user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            tenant_id,
            user_id,
            lines: Vec::new(),
            updated_at: now,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line(&self, product_id: ProductId, variant_id: Option<VariantId>) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.same_item(product_id, variant_id))
    }

    /// Add `quantity` of an item, merging with an existing line.
    pub fn add(
        &mut self,
        product_id: ProductId,
        variant_id: Option<VariantId>,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        match self.lines.iter_mut().find(|l| l.same_item(product_id, variant_id)) {
            Some(line) => {
                let merged = line.quantity + quantity;
                ensure_quantity(merged)?;
                line.quantity = merged;
            }
            None => {
                ensure_quantity(quantity)?;
                self.lines.push(CartLine {
                    product_id,
                    variant_id,
                    quantity,
                    added_at: now,
                });
            }
        }
        self.updated_at = now;
        Ok(())
    }

    /// Set a line's quantity; zero (or less) removes it.
    pub fn set_quantity(
        &mut self,
        product_id: ProductId,
        variant_id: Option<VariantId>,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if quantity <= 0 {
            return self.remove(product_id, variant_id, now);
        }
        ensure_quantity(quantity)?;

        let line = self
            .lines
            .iter_mut()
            .find(|l| l.same_item(product_id, variant_id))
            .ok_or(DomainError::NotFound)?;
        line.quantity = quantity;
        self.updated_at = now;
        Ok(())
    }

    pub fn remove(&mut self, product_id: ProductId, variant_id: Option<VariantId>, now: DateTime<Utc>) -> DomainResult<()> {
        let before = self.lines.len();
        self.lines.retain(|l| !l.same_item(product_id, variant_id));
        if self.lines.len() == before {
            return Err(DomainError::NotFound);
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn clear(&mut self, now: DateTime<Utc>) {
        self.lines.clear();
        self.updated_at = now;
    }

    /// Totals using `price_of` to resolve unit prices. Lines whose product no
    /// longer resolves are left out.
    pub fn totals<F>(&self, policy: &ShippingPolicy, mut price_of: F) -> CartTotals
    where
        F: FnMut(&CartLine) -> Option<Money>,
    {
        let (subtotal, item_count) = self
            .lines
            .iter()
            .filter_map(|l| price_of(l).map(|p| (p * l.quantity, l.quantity)))
            .fold((Money::ZERO, 0), |(sum, n), (amount, qty)| (sum + amount, n + qty));
        let shipping = policy.default_cost(subtotal);

        CartTotals {
            subtotal,
            shipping,
            total: subtotal + shipping,
            item_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cart() -> Cart {
        Cart::new(TenantId::new(), UserId::new(), Utc::now())
    }

    #[test]
    fn adding_the_same_item_merges_lines() {
        let mut c = cart();
        let p = ProductId::generate();
        let v = VariantId::generate();

        c.add(p, None, 1, Utc::now()).unwrap();
        c.add(p, None, 2, Utc::now()).unwrap();
        c.add(p, Some(v), 1, Utc::now()).unwrap();

        assert_eq!(c.lines.len(), 2);
        assert_eq!(c.line(p, None).unwrap().quantity, 3);
        assert_eq!(c.line(p, Some(v)).unwrap().quantity, 1);
    }

    #[test]
    fn quantity_limits_are_enforced() {
        let mut c = cart();
        let p = ProductId::generate();

        assert!(c.add(p, None, 0, Utc::now()).is_err());
        c.add(p, None, MAX_LINE_QUANTITY, Utc::now()).unwrap();
        assert!(c.add(p, None, 1, Utc::now()).is_err());
        assert_eq!(c.line(p, None).unwrap().quantity, MAX_LINE_QUANTITY);
    }

    #[test]
    fn setting_zero_removes_the_line() {
        let mut c = cart();
        let p = ProductId::generate();
        c.add(p, None, 2, Utc::now()).unwrap();

        c.set_quantity(p, None, 5, Utc::now()).unwrap();
        assert_eq!(c.line(p, None).unwrap().quantity, 5);

        c.set_quantity(p, None, 0, Utc::now()).unwrap();
        assert!(c.is_empty());
        assert_eq!(c.remove(p, None, Utc::now()), Err(DomainError::NotFound));
    }

    #[test]
    fn totals_skip_unknown_products_and_add_shipping() {
        let mut c = cart();
        let known = ProductId::generate();
        let gone = ProductId::generate();
        c.add(known, None, 2, Utc::now()).unwrap();
        c.add(gone, None, 1, Utc::now()).unwrap();

        let totals = c.totals(&ShippingPolicy::default(), |l| {
            (l.product_id == known).then_some(Money::from_major(150))
        });

        assert_eq!(totals.subtotal, Money::from_major(300));
        assert_eq!(totals.shipping, Money::from_major(60));
        assert_eq!(totals.total, Money::from_major(360));
        assert_eq!(totals.item_count, 2);
    }

    #[test]
    fn empty_cart_has_no_shipping() {
        let totals = cart().totals(&ShippingPolicy::default(), |_| None);
        assert_eq!(totals, CartTotals::default());
    }
}
