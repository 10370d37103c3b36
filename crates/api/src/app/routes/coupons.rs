use axum::{extract::Extension, routing::post, Json, Router};
use chrono::Utc;
use serde_json::{Value as JsonValue, json};

use storefront_infra::Services;
use storefront_infra::store::prelude::*;
use storefront_sales::{CouponRejection, Discount, normalize_code};

use crate::app::dto::ValidateCouponRequest;
use crate::app::errors::ApiResult;
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new().route("/validate", post(validate_coupon))
}

/// Preview a coupon against a cart total. Rejections are answered with
/// `valid: false` and the reason; only a missing code is a 400.
pub async fn validate_coupon(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<ValidateCouponRequest>,
) -> ApiResult<Json<JsonValue>> {
    let code = normalize_code(body.code.as_deref().unwrap_or_default());
    if code.is_empty() {
        return Err(CouponRejection::CodeRequired.into());
    }

    let Some(coupon) = services.store.coupon_by_code(tenant.tenant_id(), &code).await? else {
        return Ok(Json(rejected(&CouponRejection::Unknown)));
    };

    match coupon.evaluate(body.cart_total, Utc::now(), &services.config.brand.currency) {
        Ok(applied) => Ok(Json(json!({
            "valid": true,
            "couponId": coupon.id,
            "code": coupon.code,
            "description": coupon.description,
            "discountType": coupon.discount.kind(),
            "discountValue": match coupon.discount {
                Discount::Percentage(bp) => json!(bp),
                Discount::Fixed(amount) => json!(amount),
            },
            "discount": applied.discount,
            "newTotal": applied.new_total,
        }))),
        Err(rejection) => Ok(Json(rejected(&rejection))),
    }
}

fn rejected(rejection: &CouponRejection) -> JsonValue {
    let mut body = json!({ "valid": false, "error": rejection.to_string() });
    if let CouponRejection::BelowMinimum { minimum, .. } = rejection {
        body["minOrderAmount"] = json!(minimum);
    }
    body
}
