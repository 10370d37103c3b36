use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use storefront_core::{Currency, DomainError, DomainResult, Money, TenantId, typed_id};

typed_id!(CouponId);

/// Discount rule. Percentages are basis points (10% = 1000).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Discount {
    Percentage(u32),
    Fixed(Money),
}

impl Discount {
    pub fn kind(&self) -> &'static str {
        match self {
            Discount::Percentage(_) => "percentage",
            Discount::Fixed(_) => "fixed",
        }
    }
}

/// Why a coupon cannot be applied, in evaluation order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponRejection {
    #[error("Coupon code is required")]
    CodeRequired,
    #[error("Invalid coupon code")]
    Unknown,
    #[error("This coupon is no longer active")]
    Inactive,
    #[error("This coupon is not yet active")]
    NotStarted,
    #[error("This coupon has expired")]
    Expired,
    #[error("This coupon has reached its usage limit")]
    UsageLimitReached,
    #[error("Minimum order amount is {display}")]
    BelowMinimum { minimum: Money, display: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedDiscount {
    pub discount: Money,
    pub new_total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: CouponId,
    pub tenant_id: TenantId,
    /// Always stored upper-case.
    pub code: String,
    pub description: Option<String>,
    pub discount: Discount,
    pub min_order_amount: Option<Money>,
    pub max_discount: Option<Money>,
    pub usage_limit: Option<u32>,
    pub used_count: u32,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped on every change; checkout commits against the version it read.
    #[serde(default)]
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponDraft {
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
    pub discount: Discount,
    #[serde(default)]
    pub min_order_amount: Option<Money>,
    #[serde(default)]
    pub max_discount: Option<Money>,
    #[serde(default)]
    pub usage_limit: Option<u32>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Canonical lookup form of a user-entered code.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

fn positive(m: Option<Money>) -> Option<Money> {
    m.filter(|m| m.is_positive())
}

impl Coupon {
    pub fn create(tenant_id: TenantId, draft: CouponDraft, now: DateTime<Utc>) -> DomainResult<Self> {
        let code = normalize_code(&draft.code);
        if code.is_empty() {
            return Err(DomainError::required("coupon code"));
        }
        if !code.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
            return Err(DomainError::validation("coupon code may only contain letters, digits, '-' and '_'"));
        }
        match draft.discount {
            Discount::Percentage(bp) if bp == 0 || bp > 10_000 => {
                return Err(DomainError::validation("percentage must be between 0 and 100"));
            }
            Discount::Fixed(m) if !m.is_positive() => {
                return Err(DomainError::validation("fixed discount must be positive"));
            }
            _ => {}
        }
        if let (Some(s), Some(e)) = (draft.starts_at, draft.expires_at) {
            if e <= s {
                return Err(DomainError::validation("expiry must be after the start date"));
            }
        }

        Ok(Self {
            id: CouponId::generate(),
            tenant_id,
            code,
            description: draft.description.filter(|d| !d.trim().is_empty()),
            discount: draft.discount,
            min_order_amount: positive(draft.min_order_amount),
            max_discount: positive(draft.max_discount),
            usage_limit: draft.usage_limit.filter(|l| *l > 0),
            used_count: 0,
            starts_at: draft.starts_at,
            expires_at: draft.expires_at,
            is_active: draft.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    /// Check applicability against a cart total and compute the discount.
    pub fn evaluate(
        &self,
        cart_total: Money,
        now: DateTime<Utc>,
        currency: &Currency,
    ) -> Result<AppliedDiscount, CouponRejection> {
        if !self.is_active {
            return Err(CouponRejection::Inactive);
        }
        if self.starts_at.is_some_and(|s| now < s) {
            return Err(CouponRejection::NotStarted);
        }
        if self.expires_at.is_some_and(|e| now > e) {
            return Err(CouponRejection::Expired);
        }
        if self.usage_limit.is_some_and(|l| self.used_count >= l) {
            return Err(CouponRejection::UsageLimitReached);
        }
        if let Some(minimum) = self.min_order_amount {
            if cart_total < minimum {
                return Err(CouponRejection::BelowMinimum {
                    minimum,
                    display: minimum.display_with(currency),
                });
            }
        }

        let discount = self.discount_for(cart_total);
        Ok(AppliedDiscount {
            discount,
            new_total: cart_total - discount,
        })
    }

    /// Raw discount for `cart_total`, capped by `max_discount` and the total.
    pub fn discount_for(&self, cart_total: Money) -> Money {
        let cart_total = if cart_total.is_negative() { Money::ZERO } else { cart_total };
        let raw = match self.discount {
            Discount::Percentage(bp) => {
                let d = cart_total.percent_bp(bp);
                match self.max_discount {
                    Some(cap) if d > cap => cap,
                    _ => d,
                }
            }
            Discount::Fixed(amount) => amount,
        };
        raw.min(cart_total)
    }

    pub fn record_use(&mut self, now: DateTime<Utc>) {
        self.used_count = self.used_count.saturating_add(1);
        self.touch(now);
    }

    pub fn set_active(&mut self, active: bool, now: DateTime<Utc>) {
        self.is_active = active;
        self.touch(now);
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn draft(discount: Discount) -> CouponDraft {
        CouponDraft {
            code: " welcome10 ".into(),
            description: None,
            discount,
            min_order_amount: None,
            max_discount: None,
            usage_limit: None,
            starts_at: None,
            expires_at: None,
            is_active: None,
        }
    }

    fn coupon(discount: Discount) -> Coupon {
        Coupon::create(TenantId::new(), draft(discount), Utc::now()).unwrap()
    }

    #[test]
    fn create_normalizes_code_and_defaults_active() {
        let c = coupon(Discount::Percentage(1000));
        assert_eq!(c.code, "WELCOME10");
        assert!(c.is_active);
        assert_eq!(c.used_count, 0);
    }

    #[test]
    fn create_rejects_bad_discounts() {
        let t = TenantId::new();
        assert!(Coupon::create(t, draft(Discount::Percentage(0)), Utc::now()).is_err());
        assert!(Coupon::create(t, draft(Discount::Percentage(10_001)), Utc::now()).is_err());
        assert!(Coupon::create(t, draft(Discount::Fixed(Money::ZERO)), Utc::now()).is_err());
    }

    #[test]
    fn percentage_is_capped_by_max_discount() {
        let mut c = coupon(Discount::Percentage(2000));
        let applied = c.evaluate(Money::from_major(1000), Utc::now(), &Currency::BDT).unwrap();
        assert_eq!(applied.discount, Money::from_major(200));
        assert_eq!(applied.new_total, Money::from_major(800));

        c.max_discount = Some(Money::from_major(150));
        let applied = c.evaluate(Money::from_major(1000), Utc::now(), &Currency::BDT).unwrap();
        assert_eq!(applied.discount, Money::from_major(150));
    }

    #[test]
    fn fixed_discount_never_exceeds_total() {
        let c = coupon(Discount::Fixed(Money::from_major(500)));
        let applied = c.evaluate(Money::from_major(300), Utc::now(), &Currency::BDT).unwrap();
        assert_eq!(applied.discount, Money::from_major(300));
        assert_eq!(applied.new_total, Money::ZERO);
    }

    #[test]
    fn rejections_follow_check_order() {
        let now = Utc::now();
        let mut c = coupon(Discount::Percentage(1000));
        c.min_order_amount = Some(Money::from_major(500));
        c.usage_limit = Some(1);
        c.used_count = 1;
        c.expires_at = Some(now - Duration::days(1));
        c.starts_at = Some(now + Duration::days(1));
        c.is_active = false;

        let eval = |c: &Coupon| c.evaluate(Money::from_major(100), now, &Currency::BDT).unwrap_err();

        assert_eq!(eval(&c), CouponRejection::Inactive);
        c.is_active = true;
        assert_eq!(eval(&c), CouponRejection::NotStarted);
        c.starts_at = None;
        assert_eq!(eval(&c), CouponRejection::Expired);
        c.expires_at = None;
        assert_eq!(eval(&c), CouponRejection::UsageLimitReached);
        c.usage_limit = None;
        let below = eval(&c);
        assert_eq!(below.to_string(), "Minimum order amount is BDT 500.00");
    }

    #[test]
    fn record_use_counts_towards_the_limit() {
        let mut c = coupon(Discount::Fixed(Money::from_major(50)));
        c.usage_limit = Some(1);
        assert!(c.evaluate(Money::from_major(100), Utc::now(), &Currency::BDT).is_ok());
        c.record_use(Utc::now());
        assert_eq!(
            c.evaluate(Money::from_major(100), Utc::now(), &Currency::BDT),
            Err(CouponRejection::UsageLimitReached)
        );
    }

    #[test]
    fn every_change_bumps_the_version() {
        let mut c = coupon(Discount::Percentage(1000));
        assert_eq!(c.version, 0);
        c.record_use(Utc::now());
        c.set_active(false, Utc::now());
        assert_eq!(c.version, 2);
        assert_eq!(c.used_count, 1);
    }

    #[test]
    fn discount_serializes_with_type_tag() {
        let json = serde_json::to_value(Discount::Percentage(1500)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "percentage", "value": 1500}));
    }

    proptest! {
        #[test]
        fn discount_never_exceeds_cart_total(
            total in 0i64..10_000_000,
            bp in 1u32..=10_000,
            fixed in 1i64..10_000_000,
            cap in proptest::option::of(1i64..1_000_000),
        ) {
            let total = Money::from_minor(total);
            let mut pct = coupon(Discount::Percentage(bp));
            pct.max_discount = cap.map(Money::from_minor);
            let fix = coupon(Discount::Fixed(Money::from_minor(fixed)));

            for c in [&pct, &fix] {
                let d = c.discount_for(total);
                prop_assert!(d <= total);
                prop_assert!(!d.is_negative());
            }
        }
    }
}
