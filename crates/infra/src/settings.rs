//! Store settings: defaults merged with the overrides an admin saved.

use serde::{Deserialize, Serialize};

use storefront_core::Money;
use storefront_sales::{PaymentMethod, ShippingPolicy};

use crate::config::BrandConfig;

/// Effective settings of one storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSettings {
    pub store_name: String,
    pub store_email: String,
    pub store_phone: String,
    pub store_address: String,
    pub home_city: String,
    pub delivery_inside_city: Money,
    pub delivery_outside_city: Money,
    pub free_delivery_threshold: Money,
    pub enable_free_delivery: bool,
    #[serde(rename = "enableCOD")]
    pub enable_cod: bool,
    pub enable_stripe: bool,
    pub enable_bkash: bool,
    pub notify_new_order: bool,
    pub notify_low_stock: bool,
    pub low_stock_threshold: i64,
    pub opening_time: String,
    pub closing_time: String,
}

impl StoreSettings {
    pub fn defaults(brand: &BrandConfig) -> Self {
        Self {
            store_name: brand.name.clone(),
            store_email: "contact@dcstore.com".to_string(),
            store_phone: brand.phone.clone(),
            store_address: "Dhaka, Bangladesh".to_string(),
            home_city: "Dhaka".to_string(),
            delivery_inside_city: Money::from_major(60),
            delivery_outside_city: Money::from_major(120),
            free_delivery_threshold: Money::from_major(1500),
            enable_free_delivery: true,
            enable_cod: true,
            enable_stripe: true,
            enable_bkash: false,
            notify_new_order: true,
            notify_low_stock: true,
            low_stock_threshold: 5,
            opening_time: "10:00".to_string(),
            closing_time: "22:00".to_string(),
        }
    }

    /// Defaults with `overrides` laid on top.
    pub fn resolve(brand: &BrandConfig, overrides: &SettingsOverrides) -> Self {
        let mut s = Self::defaults(brand);
        overrides.apply_to(&mut s);
        s
    }

    pub fn shipping_policy(&self) -> ShippingPolicy {
        ShippingPolicy {
            home_city: self.home_city.clone(),
            inside_city_cost: self.delivery_inside_city,
            outside_city_cost: self.delivery_outside_city,
            free_delivery_threshold: self.enable_free_delivery.then_some(self.free_delivery_threshold),
        }
    }

    pub fn accepts(&self, method: PaymentMethod) -> bool {
        match method {
            PaymentMethod::Cod => self.enable_cod,
            PaymentMethod::Stripe => self.enable_stripe,
            PaymentMethod::Bkash => self.enable_bkash,
        }
    }

    pub fn payment_methods(&self) -> Vec<String> {
        [PaymentMethod::Cod, PaymentMethod::Stripe, PaymentMethod::Bkash]
            .into_iter()
            .filter(|m| self.accepts(*m))
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

/// Partial settings as saved by an admin. Absent fields keep the default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_inside_city: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_outside_city: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_delivery_threshold: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_free_delivery: Option<bool>,
    #[serde(rename = "enableCOD", skip_serializing_if = "Option::is_none")]
    pub enable_cod: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_stripe: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_bkash: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_new_order: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_low_stock: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_stock_threshold: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opening_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closing_time: Option<String>,
}

/// Copy every field that is set in `$src` onto `$dst`. `@value` targets plain
/// fields, `@option` targets `Option` fields.
macro_rules! overlay {
    (@value $src:expr => $dst:expr; $($field:ident),+ $(,)?) => {
        $(
            if let Some(v) = &$src.$field {
                $dst.$field = v.clone();
            }
        )+
    };
    (@option $src:expr => $dst:expr; $($field:ident),+ $(,)?) => {
        $(
            if let Some(v) = &$src.$field {
                $dst.$field = Some(v.clone());
            }
        )+
    };
}

impl SettingsOverrides {
    fn apply_to(&self, s: &mut StoreSettings) {
        overlay!(
            @value self => s;
            store_name,
            store_email,
            store_phone,
            store_address,
            home_city,
            delivery_inside_city,
            delivery_outside_city,
            free_delivery_threshold,
            enable_free_delivery,
            enable_cod,
            enable_stripe,
            enable_bkash,
            notify_new_order,
            notify_low_stock,
            low_stock_threshold,
            opening_time,
            closing_time,
        );
    }

    /// Fold a newer patch into the saved overrides.
    pub fn merge(&mut self, newer: SettingsOverrides) {
        overlay!(
            @option newer => self;
            store_name,
            store_email,
            store_phone,
            store_address,
            home_city,
            delivery_inside_city,
            delivery_outside_city,
            free_delivery_threshold,
            enable_free_delivery,
            enable_cod,
            enable_stripe,
            enable_bkash,
            notify_new_order,
            notify_low_stock,
            low_stock_threshold,
            opening_time,
            closing_time,
        );
    }

    pub fn validate(&self) -> Result<(), String> {
        let money = [
            ("deliveryInsideCity", self.delivery_inside_city),
            ("deliveryOutsideCity", self.delivery_outside_city),
            ("freeDeliveryThreshold", self.free_delivery_threshold),
        ];
        for (name, value) in money {
            if value.is_some_and(Money::is_negative) {
                return Err(format!("{name} cannot be negative"));
            }
        }
        if self.low_stock_threshold.is_some_and(|t| t < 0) {
            return Err("lowStockThreshold cannot be negative".to_string());
        }
        for (name, value) in [("openingTime", &self.opening_time), ("closingTime", &self.closing_time)] {
            if let Some(t) = value {
                if !is_clock_time(t) {
                    return Err(format!("{name} must be HH:MM"));
                }
            }
        }
        Ok(())
    }
}

fn is_clock_time(raw: &str) -> bool {
    match raw.split_once(':') {
        Some((h, m)) if h.len() == 2 && m.len() == 2 => {
            matches!((h.parse::<u8>(), m.parse::<u8>()), (Ok(h), Ok(m)) if h < 24 && m < 60)
        }
        _ => false,
    }
}
