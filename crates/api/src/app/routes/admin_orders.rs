use axum::{
    extract::{Extension, Path, Query},
    routing::get,
    Json, Router,
};
use serde_json::{Value as JsonValue, json};

use storefront_auth::Permission;
use storefront_core::{Page, PageRequest};
use storefront_infra::Services;
use storefront_infra::store::prelude::*;
use storefront_sales::{Order, OrderId, OrderStatus, PaymentStatus};

use crate::app::dto::{AdminOrderQuery, OrderPatchRequest, parse_id};
use crate::app::errors::{ApiError, ApiResult};
use crate::authz::{require_permission, require_permissions};
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/orders", get(list_orders))
        .route("/orders/:id", get(get_order).patch(update_order))
}

fn status_filter<T>(raw: Option<&str>, parse: fn(&str) -> Option<T>, what: &str) -> ApiResult<Option<T>> {
    match raw.map(str::trim).filter(|s| !s.is_empty() && *s != "all") {
        None => Ok(None),
        Some(s) => parse(s)
            .map(Some)
            .ok_or_else(|| ApiError::bad_request(format!("unknown {what} '{s}'"))),
    }
}

fn matches_search(order: &Order, needle: &str) -> bool {
    order
        .order_number()
        .is_some_and(|n| n.as_str().to_lowercase().contains(needle))
        || order.customer().is_some_and(|c| {
            c.name.to_lowercase().contains(needle)
                || c.phone.contains(needle)
                || c.email.as_deref().is_some_and(|e| e.to_lowercase().contains(needle))
        })
}

/// Newest first, optionally narrowed by status, payment status and a
/// free-text match on number or customer.
pub async fn list_orders(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<AdminOrderQuery>,
) -> ApiResult<Json<Page<Order>>> {
    require_permission(&tenant, &principal, Permission::ORDERS_READ)?;
    let status = status_filter(query.status.as_deref(), OrderStatus::parse, "status")?;
    let payment = status_filter(query.payment_status.as_deref(), PaymentStatus::parse, "payment status")?;
    let needle = query.q.as_deref().map(|q| q.trim().to_lowercase()).unwrap_or_default();

    let mut orders: Vec<Order> = services
        .store
        .list_orders(tenant.tenant_id())
        .await?
        .into_iter()
        .filter(|o| status.is_none_or(|s| o.status() == s))
        .filter(|o| payment.is_none_or(|p| o.payment_status() == p))
        .filter(|o| needle.is_empty() || matches_search(o, &needle))
        .collect();
    orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));

    Ok(Json(PageRequest::new(query.page, query.limit).slice(orders)))
}

pub async fn get_order(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<JsonValue>> {
    require_permission(&tenant, &principal, Permission::ORDERS_READ)?;
    let id: OrderId = parse_id(&id, "order")?;
    let order = services
        .store
        .get_order(tenant.tenant_id(), id)
        .await?
        .ok_or_else(|| ApiError::not_found("Order not found"))?;
    Ok(Json(json!({ "order": order })))
}

/// Kitchen-stage moves need only the kitchen permission; everything else
/// needs order update rights. All checks run before any change is applied.
pub async fn update_order(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<OrderPatchRequest>,
) -> ApiResult<Json<JsonValue>> {
    let id: OrderId = parse_id(&id, "order")?;
    let tenant_id = tenant.tenant_id();

    let mut required = Vec::new();
    match body.status {
        Some(status) if status.is_kitchen_stage() => required.push(Permission::ORDERS_KITCHEN),
        Some(_) => required.push(Permission::ORDERS_UPDATE),
        None => {}
    }
    if body.payment_status.is_some() || body.notes.is_some() {
        required.push(Permission::ORDERS_UPDATE);
    }
    if required.is_empty() {
        return Err(ApiError::bad_request("nothing to update"));
    }
    require_permissions(&tenant, &principal, &required)?;

    let mut order = None;
    if let Some(status) = body.status {
        order = Some(services.orders.change_status(tenant_id, id, status).await?);
    }
    if let Some(payment_status) = body.payment_status {
        order = Some(services.orders.change_payment_status(tenant_id, id, payment_status).await?);
    }
    if let Some(notes) = body.notes {
        let notes = Some(notes).filter(|n| !n.trim().is_empty());
        order = Some(services.orders.update_notes(tenant_id, id, notes).await?);
    }
    tracing::info!(order_id = %id, status = ?body.status, payment_status = ?body.payment_status, "order updated");

    Ok(Json(json!({ "success": true, "order": order })))
}
