use serde::{Deserialize, Serialize};

use storefront_core::Money;

use crate::OrderType;

/// Delivery zone derived from the destination city.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryZone {
    InsideCity,
    OutsideCity,
}

/// Delivery pricing rules.
///
/// Built from the store settings; the cart and checkout share one instance
/// so the price shown in the cart is the price charged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingPolicy {
    pub home_city: String,
    pub inside_city_cost: Money,
    pub outside_city_cost: Money,
    /// Orders at or above this subtotal ship free. `None` disables free delivery.
    pub free_delivery_threshold: Option<Money>,
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self {
            home_city: "Dhaka".to_string(),
            inside_city_cost: Money::from_major(60),
            outside_city_cost: Money::from_major(120),
            free_delivery_threshold: None,
        }
    }
}

impl ShippingPolicy {
    pub fn zone_for(&self, city: Option<&str>) -> DeliveryZone {
        match city.map(str::trim) {
            Some(c) if !c.is_empty() && !c.eq_ignore_ascii_case(&self.home_city) => DeliveryZone::OutsideCity,
            _ => DeliveryZone::InsideCity,
        }
    }

    /// Shipping charged for a basket; empty baskets and non-delivery orders are free.
    pub fn cost(&self, subtotal: Money, order_type: OrderType, city: Option<&str>) -> Money {
        if order_type != OrderType::Delivery || !subtotal.is_positive() {
            return Money::ZERO;
        }
        if self.free_delivery_threshold.is_some_and(|t| subtotal >= t) {
            return Money::ZERO;
        }
        match self.zone_for(city) {
            DeliveryZone::InsideCity => self.inside_city_cost,
            DeliveryZone::OutsideCity => self.outside_city_cost,
        }
    }

    /// Estimate before an address is known (home city rate).
    pub fn default_cost(&self, subtotal: Money) -> Money {
        self.cost(subtotal, OrderType::Delivery, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ShippingPolicy {
        ShippingPolicy {
            free_delivery_threshold: Some(Money::from_major(1000)),
            ..ShippingPolicy::default()
        }
    }

    #[test]
    fn zone_follows_city() {
        let p = policy();
        assert_eq!(p.zone_for(Some(" dhaka ")), DeliveryZone::InsideCity);
        assert_eq!(p.zone_for(Some("Chattogram")), DeliveryZone::OutsideCity);
        assert_eq!(p.zone_for(None), DeliveryZone::InsideCity);
    }

    #[test]
    fn cost_depends_on_zone_threshold_and_type() {
        let p = policy();
        let small = Money::from_major(300);

        assert_eq!(p.cost(small, OrderType::Delivery, Some("Dhaka")), Money::from_major(60));
        assert_eq!(p.cost(small, OrderType::Delivery, Some("Sylhet")), Money::from_major(120));
        assert_eq!(p.cost(Money::from_major(1000), OrderType::Delivery, Some("Sylhet")), Money::ZERO);
        assert_eq!(p.cost(small, OrderType::Takeaway, None), Money::ZERO);
        assert_eq!(p.default_cost(Money::ZERO), Money::ZERO);
    }

    #[test]
    fn free_delivery_can_be_disabled() {
        let p = ShippingPolicy::default();
        assert_eq!(p.default_cost(Money::from_major(100_000)), Money::from_major(60));
    }
}
