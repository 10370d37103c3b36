use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{Value as JsonValue, json};

use storefront_auth::Permission;
use storefront_catalog::category::sort_for_display;
use storefront_catalog::{Category, CategoryDraft, CategoryId, Product, ProductFilter, ReviewId, StatusFilter};
use storefront_core::{Page, TenantId};
use storefront_infra::Services;
use storefront_infra::store::prelude::*;
use storefront_sales::{Coupon, CouponDraft, CouponId};

use crate::app::dto::{
    AvailabilityRequest, CouponToggleRequest, ProductBody, ProductQuery, ReviewModerationRequest, StockAdjustRequest,
    parse_id,
};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::common::{self, CategoryScope, resolve_category};
use crate::authz::require_permission;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route("/products/:id", get(get_product).put(update_product).delete(delete_product))
        .route("/products/:id/availability", patch(set_availability))
        .route("/products/:id/stock", post(adjust_stock))
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/:id", get(get_category).put(update_category).delete(delete_category))
        .route("/coupons", get(list_coupons).post(create_coupon))
        .route("/coupons/:id", patch(toggle_coupon).delete(delete_coupon))
        .route("/reviews", get(list_reviews))
        .route("/reviews/:id", patch(moderate_review).delete(delete_review))
}

fn manage_catalog(tenant: &TenantContext, principal: &PrincipalContext) -> ApiResult<()> {
    Ok(require_permission(tenant, principal, Permission::CATALOG_MANAGE)?)
}

// -------------------------
// Products
// -------------------------

/// Back-office listing: every status unless `status` narrows it.
pub async fn list_products(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<ProductQuery>,
) -> ApiResult<Json<Page<Product>>> {
    manage_catalog(&tenant, &principal)?;
    let tenant_id = tenant.tenant_id();
    let category_id = match resolve_category(&services, tenant_id, query.category.as_deref()).await? {
        CategoryScope::Any => None,
        CategoryScope::Only(id) => Some(id),
        CategoryScope::Unknown => return Ok(Json(query.page_request().slice(Vec::new()))),
    };

    let filter = ProductFilter {
        status: query.status.unwrap_or(StatusFilter::All),
        ..query.filter(category_id)
    };
    let products = filter.apply(services.store.list_products(tenant_id).await?);
    Ok(Json(query.page_request().slice(products)))
}

pub async fn create_product(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<ProductBody>,
) -> ApiResult<(StatusCode, Json<JsonValue>)> {
    manage_catalog(&tenant, &principal)?;
    let product = services
        .catalog
        .create_product(
            tenant.tenant_id(),
            body.details,
            body.quantity.unwrap_or(0),
            body.is_active.unwrap_or(true),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "product": product }))))
}

pub async fn get_product(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<JsonValue>> {
    manage_catalog(&tenant, &principal)?;
    let product = common::product_or_404(&services, tenant.tenant_id(), &id).await?;
    Ok(Json(json!({ "product": product })))
}

/// Replace a product's details. Stock and availability change through
/// their own endpoints; `isActive` in the body is honoured as a shortcut.
pub async fn update_product(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<ProductBody>,
) -> ApiResult<Json<JsonValue>> {
    manage_catalog(&tenant, &principal)?;
    let tenant_id = tenant.tenant_id();
    let id = parse_id(&id, "product")?;

    let mut product = services.catalog.update_product(tenant_id, id, body.details).await?;
    if let Some(active) = body.is_active.filter(|a| *a != product.is_active()) {
        product = services.catalog.set_availability(tenant_id, id, active).await?;
    }
    Ok(Json(json!({ "success": true, "product": product })))
}

pub async fn delete_product(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<JsonValue>> {
    manage_catalog(&tenant, &principal)?;
    services
        .catalog
        .delete_product(tenant.tenant_id(), parse_id(&id, "product")?)
        .await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn set_availability(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<AvailabilityRequest>,
) -> ApiResult<Json<JsonValue>> {
    manage_catalog(&tenant, &principal)?;
    let product = services
        .catalog
        .set_availability(tenant.tenant_id(), parse_id(&id, "product")?, body.is_active)
        .await?;
    Ok(Json(json!({ "success": true, "product": product })))
}

pub async fn adjust_stock(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<StockAdjustRequest>,
) -> ApiResult<Json<JsonValue>> {
    manage_catalog(&tenant, &principal)?;
    let product = services
        .catalog
        .adjust_stock(tenant.tenant_id(), parse_id(&id, "product")?, body.delta)
        .await?;
    Ok(Json(json!({ "success": true, "product": product })))
}

// -------------------------
// Categories
// -------------------------

async fn category_or_404(services: &Services, tenant_id: TenantId, raw: &str) -> ApiResult<Category> {
    let id: CategoryId = parse_id(raw, "category")?;
    services
        .store
        .get_category(tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Category not found"))
}

async fn ensure_category_slug_free(services: &Services, category: &Category) -> ApiResult<()> {
    let taken = services
        .store
        .list_categories(category.tenant_id)
        .await?
        .iter()
        .any(|c| c.slug == category.slug && c.id != category.id);
    if taken {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            "conflict",
            format!("slug '{}' is already in use", category.slug),
        ));
    }
    Ok(())
}

pub async fn list_categories(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<Json<JsonValue>> {
    manage_catalog(&tenant, &principal)?;
    let tenant_id = tenant.tenant_id();
    let mut categories = services.store.list_categories(tenant_id).await?;
    sort_for_display(&mut categories);
    let products = services.store.list_products(tenant_id).await?;

    let rows: Vec<JsonValue> = categories
        .iter()
        .map(|c| {
            let mut row = json!(c);
            row["productCount"] = json!(products.iter().filter(|p| p.category_id() == Some(c.id)).count());
            row
        })
        .collect();
    Ok(Json(json!({ "categories": rows })))
}

pub async fn create_category(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(draft): Json<CategoryDraft>,
) -> ApiResult<(StatusCode, Json<JsonValue>)> {
    manage_catalog(&tenant, &principal)?;
    let category = Category::create(tenant.tenant_id(), draft, Utc::now())?;
    ensure_category_slug_free(&services, &category).await?;
    services.store.save_category(&category).await?;
    tracing::info!(category_id = %category.id, slug = %category.slug, "category created");
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "category": category }))))
}

pub async fn get_category(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<JsonValue>> {
    manage_catalog(&tenant, &principal)?;
    let category = category_or_404(&services, tenant.tenant_id(), &id).await?;
    Ok(Json(json!({ "category": category })))
}

pub async fn update_category(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(draft): Json<CategoryDraft>,
) -> ApiResult<Json<JsonValue>> {
    manage_catalog(&tenant, &principal)?;
    let mut category = category_or_404(&services, tenant.tenant_id(), &id).await?;
    category.update(draft, Utc::now())?;
    ensure_category_slug_free(&services, &category).await?;
    services.store.save_category(&category).await?;
    Ok(Json(json!({ "success": true, "category": category })))
}

/// Products in a deleted category become uncategorized on the storefront.
pub async fn delete_category(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<JsonValue>> {
    manage_catalog(&tenant, &principal)?;
    let id: CategoryId = parse_id(&id, "category")?;
    if !services.store.delete_category(tenant.tenant_id(), id).await? {
        return Err(ApiError::not_found("Category not found"));
    }
    Ok(Json(json!({ "success": true })))
}

// -------------------------
// Coupons
// -------------------------

pub async fn list_coupons(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<Json<JsonValue>> {
    require_permission(&tenant, &principal, Permission::COUPONS_MANAGE)?;
    let mut coupons = services.store.list_coupons(tenant.tenant_id()).await?;
    coupons.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(json!({ "coupons": coupons })))
}

pub async fn create_coupon(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(draft): Json<CouponDraft>,
) -> ApiResult<(StatusCode, Json<JsonValue>)> {
    require_permission(&tenant, &principal, Permission::COUPONS_MANAGE)?;
    let tenant_id = tenant.tenant_id();
    let coupon = Coupon::create(tenant_id, draft, Utc::now())?;
    if services.store.coupon_by_code(tenant_id, &coupon.code).await?.is_some() {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            "conflict",
            format!("coupon code '{}' already exists", coupon.code),
        ));
    }
    services.store.save_coupon(&coupon).await?;
    tracing::info!(coupon_id = %coupon.id, code = %coupon.code, "coupon created");
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "id": coupon.id, "coupon": coupon }))))
}

/// Flip a coupon on or off; an explicit `isActive` sets it instead.
pub async fn toggle_coupon(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<CouponToggleRequest>>,
) -> ApiResult<Json<JsonValue>> {
    require_permission(&tenant, &principal, Permission::COUPONS_MANAGE)?;
    let id: CouponId = parse_id(&id, "coupon")?;
    let mut coupon = services
        .store
        .get_coupon(tenant.tenant_id(), id)
        .await?
        .ok_or_else(|| ApiError::not_found("Coupon not found"))?;

    let active = body
        .and_then(|Json(b)| b.is_active)
        .unwrap_or(!coupon.is_active);
    coupon.set_active(active, Utc::now());
    services.store.save_coupon(&coupon).await?;
    Ok(Json(json!({ "success": true, "coupon": coupon })))
}

pub async fn delete_coupon(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<JsonValue>> {
    require_permission(&tenant, &principal, Permission::COUPONS_MANAGE)?;
    let id: CouponId = parse_id(&id, "coupon")?;
    if !services.store.delete_coupon(tenant.tenant_id(), id).await? {
        return Err(ApiError::not_found("Coupon not found"));
    }
    Ok(Json(json!({ "success": true })))
}

// -------------------------
// Reviews
// -------------------------

/// Newest first, each with the reviewed product's name.
pub async fn list_reviews(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<Json<JsonValue>> {
    require_permission(&tenant, &principal, Permission::REVIEWS_MODERATE)?;
    let tenant_id = tenant.tenant_id();
    let mut reviews = services.store.list_reviews(tenant_id).await?;
    reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let products = services.store.list_products(tenant_id).await?;

    let rows: Vec<JsonValue> = reviews
        .iter()
        .map(|r| {
            let mut row = json!(r);
            row["productName"] = json!(products
                .iter()
                .find(|p| p.id_typed() == r.product_id)
                .map(Product::name));
            row
        })
        .collect();
    Ok(Json(json!({ "reviews": rows })))
}

pub async fn moderate_review(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<ReviewModerationRequest>,
) -> ApiResult<Json<JsonValue>> {
    require_permission(&tenant, &principal, Permission::REVIEWS_MODERATE)?;
    let id: ReviewId = parse_id(&id, "review")?;
    let mut review = services
        .store
        .get_review(tenant.tenant_id(), id)
        .await?
        .ok_or_else(|| ApiError::not_found("Review not found"))?;
    review.set_approved(body.is_approved, Utc::now());
    services.store.save_review(&review).await?;
    Ok(Json(json!({ "success": true, "review": review })))
}

pub async fn delete_review(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<JsonValue>> {
    require_permission(&tenant, &principal, Permission::REVIEWS_MODERATE)?;
    let id: ReviewId = parse_id(&id, "review")?;
    if !services.store.delete_review(tenant.tenant_id(), id).await? {
        return Err(ApiError::not_found("Review not found"));
    }
    Ok(Json(json!({ "success": true })))
}
