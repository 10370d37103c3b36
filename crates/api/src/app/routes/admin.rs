//! Back-office routes. Everything here sits behind `require_principal`; each
//! handler checks its own permission.

use std::collections::HashMap;

use axum::{
    extract::{Extension, Path, Query},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::{Value as JsonValue, json};

use storefront_auth::Permission;
use storefront_catalog::{CategoryId, Product, ProductId};
use storefront_core::{PageRequest, UserId};
use storefront_infra::SettingsOverrides;
use storefront_infra::Services;
use storefront_infra::customers::CustomerProfile;
use storefront_infra::store::prelude::*;
use storefront_sales::reports::{self, DashboardStats, ReportSummary};
use storefront_sales::{Order, UserOrderStats};

use crate::app::dto::{CustomerQuery, RangeQuery, ReportQuery, parse_id};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::{admin_catalog, admin_orders, admin_support, common};
use crate::authz::require_permission;
use crate::context::{PrincipalContext, TenantContext};

const DASHBOARD_DAYS: u32 = 7;
const REPORT_DAYS: u32 = 30;
const MAX_REPORT_DAYS: u32 = 365;
const DASHBOARD_LIST: usize = 5;
const TOP_CUSTOMERS: usize = 10;

pub fn router() -> Router {
    Router::new()
        .route("/settings", get(get_settings).put(update_settings))
        .route("/stats", get(dashboard))
        .route("/reports", get(report))
        .route("/customers", get(list_customers))
        .route("/customers/:id", get(customer_detail))
        .merge(admin_catalog::router())
        .merge(admin_orders::router())
        .merge(admin_support::router())
}

pub async fn get_settings(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<Json<JsonValue>> {
    require_permission(&tenant, &principal, Permission::SETTINGS_MANAGE)?;
    let settings = common::settings(&services, tenant.tenant_id()).await?;
    Ok(Json(json!({ "settings": settings })))
}

/// Merge a partial settings document over the stored overrides.
pub async fn update_settings(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(patch): Json<SettingsOverrides>,
) -> ApiResult<Json<JsonValue>> {
    require_permission(&tenant, &principal, Permission::SETTINGS_MANAGE)?;
    let tenant_id = tenant.tenant_id();

    let mut overrides = services.store.get_settings(tenant_id).await?;
    overrides.merge(patch);
    overrides.validate().map_err(ApiError::bad_request)?;
    services.store.save_settings(tenant_id, &overrides).await?;
    tracing::info!(tenant_id = %tenant_id, "store settings updated");

    let settings = common::settings(&services, tenant_id).await?;
    Ok(Json(json!({ "success": true, "settings": settings })))
}

fn low_stock(products: &[Product]) -> Vec<JsonValue> {
    let mut low: Vec<&Product> = products.iter().filter(|p| p.is_active() && p.is_low_stock()).collect();
    low.sort_by_key(|p| p.quantity());
    low.into_iter()
        .take(DASHBOARD_LIST)
        .map(|p| {
            json!({
                "id": p.id_typed(),
                "name": p.name(),
                "slug": p.slug(),
                "quantity": p.quantity(),
                "lowStockThreshold": p.details().low_stock_threshold,
            })
        })
        .collect()
}

pub async fn dashboard(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Json<JsonValue>> {
    require_permission(&tenant, &principal, Permission::REPORTS_READ)?;
    let tenant_id = tenant.tenant_id();
    let now = Utc::now();

    let orders = services.store.list_orders(tenant_id).await?;
    let products = services.store.list_products(tenant_id).await?;
    let profiles = services.store.list_profiles(tenant_id).await?;

    let range = match (query.from, query.to) {
        (None, None) => None,
        (from, to) => Some((from.unwrap_or(chrono::DateTime::<Utc>::MIN_UTC), to.unwrap_or(now))),
    };
    let mut stats = DashboardStats::from_orders(&orders, range, now);
    stats.active_products = products.iter().filter(|p| p.is_active()).count() as u64;
    stats.total_users = profiles.len() as u64;

    let days = query.days.unwrap_or(DASHBOARD_DAYS).clamp(1, MAX_REPORT_DAYS);
    let recent_window: Vec<Order> = in_window(&orders, days, now);

    Ok(Json(json!({
        "stats": stats,
        "recentOrders": reports::recent_orders(&orders, DASHBOARD_LIST),
        "revenueByDay": reports::revenue_series(&orders, days, now),
        "topProducts": reports::top_products(&recent_window, DASHBOARD_LIST),
        "lowStockProducts": low_stock(&products),
    })))
}

fn in_window(orders: &[Order], days: u32, now: chrono::DateTime<Utc>) -> Vec<Order> {
    let start = reports::window_start(now, days);
    orders
        .iter()
        .filter(|o| o.created_at().is_some_and(|at| at >= start))
        .cloned()
        .collect()
}

pub async fn report(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<JsonValue>> {
    require_permission(&tenant, &principal, Permission::REPORTS_READ)?;
    let tenant_id = tenant.tenant_id();
    let now = Utc::now();
    let days = query.days.unwrap_or(REPORT_DAYS).clamp(1, MAX_REPORT_DAYS);
    let start = reports::window_start(now, days);

    let orders = services.store.list_orders(tenant_id).await?;
    let window = in_window(&orders, days, now);

    let category_names: HashMap<CategoryId, String> = services
        .store
        .list_categories(tenant_id)
        .await?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();
    let product_category: HashMap<ProductId, CategoryId> = services
        .store
        .list_products(tenant_id)
        .await?
        .iter()
        .filter_map(|p| p.category_id().map(|c| (p.id_typed(), c)))
        .collect();

    let new_customers = services
        .store
        .list_profiles(tenant_id)
        .await?
        .iter()
        .filter(|p| p.created_at >= start)
        .count() as u64;

    let series = reports::revenue_series(&orders, days, now);
    let summary = ReportSummary::from_series(&series, new_customers);
    let by_category = reports::revenue_by_category(&window, |product_id| {
        product_category
            .get(&product_id)
            .and_then(|c| category_names.get(c))
            .cloned()
    });

    Ok(Json(json!({
        "summary": summary,
        "revenueByDay": series,
        "revenueByCategory": by_category,
        "topCustomers": reports::top_customers(&window, TOP_CUSTOMERS),
        "topProducts": reports::top_products(&window, TOP_CUSTOMERS),
    })))
}

fn matches_search(profile: &CustomerProfile, needle: &str) -> bool {
    [profile.name.as_deref(), profile.email.as_deref(), profile.phone.as_deref()]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(needle))
}

pub async fn list_customers(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<CustomerQuery>,
) -> ApiResult<Json<JsonValue>> {
    require_permission(&tenant, &principal, Permission::CUSTOMERS_READ)?;
    let tenant_id = tenant.tenant_id();

    let needle = query.search.as_deref().map(|s| s.trim().to_lowercase()).unwrap_or_default();
    let mut profiles: Vec<CustomerProfile> = services
        .store
        .list_profiles(tenant_id)
        .await?
        .into_iter()
        .filter(|p| needle.is_empty() || matches_search(p, &needle))
        .collect();
    profiles.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let mut by_user: HashMap<UserId, Vec<Order>> = HashMap::new();
    for order in services.store.list_orders(tenant_id).await? {
        if let Some(user_id) = order.user_id() {
            by_user.entry(user_id).or_default().push(order);
        }
    }

    let page = PageRequest::new(query.page, query.limit).slice(profiles).map(|profile| {
        let stats = by_user
            .get(&profile.user_id)
            .map(|orders| UserOrderStats::of(orders))
            .unwrap_or_default();
        json!({
            "id": profile.user_id,
            "name": profile.name,
            "email": profile.email,
            "phone": profile.phone,
            "createdAt": profile.created_at,
            "orderCount": stats.total_orders,
            "totalSpent": stats.total_spent,
        })
    });

    Ok(Json(json!({
        "customers": page.items,
        "total": page.total,
        "page": page.page,
        "limit": page.limit,
        "totalPages": page.total_pages,
    })))
}

pub async fn customer_detail(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<JsonValue>> {
    require_permission(&tenant, &principal, Permission::CUSTOMERS_READ)?;
    let tenant_id = tenant.tenant_id();
    let user_id: UserId = parse_id(&id, "customer")?;

    let profile = services
        .store
        .get_profile(tenant_id, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Customer not found"))?;
    let mut orders = services.store.orders_for_user(tenant_id, user_id).await?;
    orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
    let addresses = services.store.get_addresses(tenant_id, user_id).await?;

    Ok(Json(json!({
        "customer": profile,
        "addresses": addresses.addresses(),
        "stats": UserOrderStats::of(&orders),
        "orders": reports::recent_orders(&orders, orders.len()),
    })))
}
