use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use storefront_catalog::{CategoryId, Product, ProductDetails, ProductFilter, ProductId, ProductSort, StatusFilter, VariantId};
use storefront_core::{DomainError, Money, PageRequest};
use storefront_infra::integrations::{CustomData, UserData};
use storefront_sales::{CartTotals, OrderStatus, PaymentStatus};
use storefront_support::{ChatRole, GuestInfo};

use crate::app::errors::{ApiError, ApiResult};

/// Parse a path identifier, answering 400 on malformed input.
pub fn parse_id<T>(raw: &str, what: &str) -> ApiResult<T>
where
    T: FromStr<Err = DomainError>,
{
    raw.trim()
        .parse()
        .map_err(|_| ApiError::new(axum::http::StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id")))
}

/// Storefront view of a product: everything except back-office fields.
pub fn public_product(product: &Product) -> JsonValue {
    let mut value = serde_json::to_value(product).unwrap_or(JsonValue::Null);
    if let Some(obj) = value.as_object_mut() {
        for hidden in ["costPrice", "tenantId", "version"] {
            obj.remove(hidden);
        }
    }
    value
}

// -------------------------
// Query DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    pub fn request(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    #[serde(alias = "search")]
    pub q: Option<String>,
    /// Category id or slug.
    pub category: Option<String>,
    #[serde(default)]
    pub featured: bool,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub sort: Option<ProductSort>,
    /// Admin listings only; the storefront always shows active products.
    pub status: Option<StatusFilter>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ProductQuery {
    pub fn filter(&self, category_id: Option<CategoryId>) -> ProductFilter {
        ProductFilter {
            query: self.q.clone(),
            category_id,
            featured_only: self.featured,
            status: StatusFilter::Active,
            min_price: self.min_price.map(Money::from_minor),
            max_price: self.max_price.map(Money::from_minor),
            sort: self.sort.unwrap_or_default(),
        }
    }

    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit)
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackQuery {
    pub order_number: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminOrderQuery {
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub q: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CustomerQuery {
    #[serde(alias = "q")]
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    #[serde(alias = "dateFrom")]
    pub from: Option<DateTime<Utc>>,
    #[serde(alias = "dateTo")]
    pub to: Option<DateTime<Utc>>,
    /// Width of the revenue chart.
    pub days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub days: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub session_id: Option<String>,
}

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCouponRequest {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub cart_total: Money,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<ChatTurn>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub guest_info: Option<GuestInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveMessageRequest {
    pub session_id: String,
    #[serde(default)]
    pub guest_info: Option<GuestInfo>,
    pub message: ChatTurn,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentRequest {
    pub amount: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundBody {
    pub transaction_id: String,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub reason: Option<String>,
    /// Order to mark refunded once the provider accepts the refund.
    #[serde(default)]
    pub order_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEventRequest {
    pub event_name: String,
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub user_data: Option<UserData>,
    #[serde(default)]
    pub custom_data: Option<CustomData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCartItemRequest {
    pub product_id: ProductId,
    #[serde(default)]
    pub variant_id: Option<VariantId>,
    #[serde(default = "one")]
    pub quantity: i64,
}

fn one() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartItemRequest {
    pub quantity: i64,
    #[serde(default)]
    pub variant_id: Option<VariantId>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantQuery {
    pub variant_id: Option<VariantId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistRequest {
    pub product_id: ProductId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductBody {
    #[serde(flatten)]
    pub details: ProductDetails,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRequest {
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct StockAdjustRequest {
    pub delta: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPatchRequest {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponToggleRequest {
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewModerationRequest {
    pub is_approved: bool,
}

#[derive(Debug, Deserialize)]
pub struct TicketStatusRequest {
    pub status: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemView {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: i64,
    pub name: String,
    pub variant_name: Option<String>,
    pub slug: String,
    pub unit_price: Money,
    pub line_total: Money,
    pub image: Option<String>,
    pub in_stock: bool,
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    #[serde(flatten)]
    pub totals: CartTotals,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use storefront_catalog::{CreateProduct, ProductCommand};
    use storefront_core::{Aggregate, TenantId};

    #[test]
    fn public_product_hides_cost_price() {
        let id = ProductId::generate();
        let mut product = Product::empty(id);
        let mut details = ProductDetails::new("Kacchi Biryani", Money::from_major(450));
        details.cost_price = Some(Money::from_major(200));
        product
            .execute(&ProductCommand::CreateProduct(CreateProduct {
                tenant_id: TenantId::new(),
                product_id: id,
                details,
                quantity: 4,
                is_active: true,
                occurred_at: Utc::now(),
            }))
            .unwrap();

        let json = public_product(&product);
        assert_eq!(json["name"], "Kacchi Biryani");
        assert_eq!(json["price"], 45_000);
        assert!(json.get("costPrice").is_none());
        assert!(json.get("tenantId").is_none());
    }

    #[test]
    fn malformed_ids_are_rejected() {
        assert!(parse_id::<ProductId>("nope", "product").is_err());
        let id = ProductId::generate();
        assert_eq!(parse_id::<ProductId>(&id.to_string(), "product").unwrap(), id);
    }
}
