use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use serde_json::{Value as JsonValue, json};

use storefront_core::Page;
use storefront_infra::store::prelude::*;
use storefront_infra::{CheckoutRequest, Services, render_invoice};
use storefront_sales::{Order, OrderId, OrderNumber, UserOrderStats};

use crate::app::dto::{PageQuery, TrackQuery, parse_id};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::common;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/orders", post(place_order))
        .route("/orders/track", get(track_order))
}

/// Routes mounted under `/me`.
pub fn me_router() -> Router {
    Router::new()
        .route("/orders", get(my_orders))
        .route("/orders/stats", get(my_order_stats))
        .route("/orders/:id", get(my_order))
        .route("/orders/:id/invoice", get(my_invoice))
}

/// Checkout for guests and signed-in customers.
pub async fn place_order(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    principal: Option<Extension<PrincipalContext>>,
    Json(body): Json<CheckoutRequest>,
) -> ApiResult<(StatusCode, Json<JsonValue>)> {
    let user_id = principal.map(|Extension(p)| p.user_id());
    let placed = services.checkout.place_order(tenant.tenant_id(), user_id, body).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "orderId": placed.order.id_typed(),
            "orderNumber": placed.order.order_number().map(OrderNumber::as_str),
            "discount": placed.discount,
            "order": placed.order,
        })),
    ))
}

/// Public lookup by order number. When a phone number is given it must
/// match the order's contact phone.
pub async fn track_order(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Query(query): Query<TrackQuery>,
) -> ApiResult<Json<JsonValue>> {
    let raw = query
        .order_number
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("Order number is required"))?;

    let not_found = || ApiError::not_found("Order not found");
    let number = OrderNumber::parse(raw).map_err(|_| not_found())?;
    let order = services
        .store
        .order_by_number(tenant.tenant_id(), &number)
        .await?
        .ok_or_else(not_found)?;

    if let Some(phone) = query.phone.as_deref().filter(|p| !p.trim().is_empty()) {
        if !order.phone_matches(phone) {
            return Err(not_found());
        }
    }

    Ok(Json(json!({ "order": order })))
}

pub async fn my_orders(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Page<Order>>> {
    let orders = services
        .store
        .orders_for_user(tenant.tenant_id(), principal.user_id())
        .await?;
    Ok(Json(page.request().slice(orders)))
}

pub async fn my_order_stats(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<Json<UserOrderStats>> {
    let orders = services
        .store
        .orders_for_user(tenant.tenant_id(), principal.user_id())
        .await?;
    Ok(Json(UserOrderStats::of(&orders)))
}

/// The caller's order; another customer's order answers 404, not 403.
async fn owned_order(
    services: &Services,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    id: &str,
) -> ApiResult<Order> {
    let id: OrderId = parse_id(id, "order")?;
    services
        .store
        .get_order(tenant.tenant_id(), id)
        .await?
        .filter(|o| o.user_id() == Some(principal.user_id()))
        .ok_or_else(|| ApiError::not_found("Order not found"))
}

pub async fn my_order(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<JsonValue>> {
    let order = owned_order(&services, &tenant, &principal, &id).await?;
    Ok(Json(json!({ "order": order })))
}

/// Printable HTML invoice for one of the caller's orders.
pub async fn my_invoice(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Html<String>> {
    let order = owned_order(&services, &tenant, &principal, &id).await?;
    let settings = common::settings(&services, tenant.tenant_id()).await?;
    Ok(Html(render_invoice(&settings.store_name, &settings.store_phone, &order)))
}
