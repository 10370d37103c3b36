use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{Value as JsonValue, json};

use storefront_catalog::category::sort_for_display;
use storefront_catalog::{Product, ProductFilter, Review, ReviewDraft, ReviewSummary};
use storefront_core::{Page, TenantId};
use storefront_infra::Services;
use storefront_infra::store::prelude::*;
use storefront_sales::OrderStatus;

use crate::app::dto::{self, PageQuery, ProductQuery, SearchQuery};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::common::{CategoryScope, resolve_category};
use crate::context::{PrincipalContext, TenantContext};

const SEARCH_LIMIT: u32 = 10;
const SEARCH_MAX: u32 = 50;
const RELATED_LIMIT: usize = 4;

pub fn router() -> Router {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/search", get(search_products))
        .route("/products/:slug", get(get_product))
        .route("/products/:slug/reviews", get(product_reviews))
        .route("/categories", get(list_categories))
}

/// Routes mounted under `/me`.
pub fn me_router() -> Router {
    Router::new().route("/reviews", post(submit_review))
}

async fn active_product(services: &Services, tenant_id: TenantId, slug: &str) -> ApiResult<Product> {
    services
        .store
        .product_by_slug(tenant_id, slug)
        .await?
        .filter(Product::is_active)
        .ok_or_else(|| ApiError::not_found("Product not found"))
}

pub async fn list_products(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Query(query): Query<ProductQuery>,
) -> ApiResult<Json<Page<JsonValue>>> {
    let tenant_id = tenant.tenant_id();
    let category_id = match resolve_category(&services, tenant_id, query.category.as_deref()).await? {
        CategoryScope::Any => None,
        CategoryScope::Only(id) => Some(id),
        CategoryScope::Unknown => return Ok(Json(query.page_request().slice(Vec::new()))),
    };

    let products = query.filter(category_id).apply(services.store.list_products(tenant_id).await?);
    Ok(Json(query.page_request().slice(products).map(|p| dto::public_product(&p))))
}

pub async fn search_products(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<JsonValue>> {
    let Some(q) = query.q.map(|q| q.trim().to_string()).filter(|q| !q.is_empty()) else {
        return Ok(Json(json!({ "products": [] })));
    };
    let limit = query.limit.unwrap_or(SEARCH_LIMIT).clamp(1, SEARCH_MAX) as usize;

    let filter = ProductFilter {
        query: Some(q),
        ..ProductFilter::default()
    };
    let products: Vec<JsonValue> = filter
        .apply(services.store.list_products(tenant.tenant_id()).await?)
        .iter()
        .take(limit)
        .map(dto::public_product)
        .collect();

    Ok(Json(json!({ "products": products })))
}

pub async fn get_product(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Path(slug): Path<String>,
) -> ApiResult<Json<JsonValue>> {
    let tenant_id = tenant.tenant_id();
    let product = active_product(&services, tenant_id, &slug).await?;

    let reviews = services.store.reviews_for_product(tenant_id, product.id_typed()).await?;
    let category = match product.category_id() {
        Some(id) => services.store.get_category(tenant_id, id).await?,
        None => None,
    };
    let related: Vec<JsonValue> = match product.category_id() {
        Some(category_id) => ProductFilter {
            category_id: Some(category_id),
            ..ProductFilter::default()
        }
        .apply(services.store.list_products(tenant_id).await?)
        .iter()
        .filter(|p| p.id_typed() != product.id_typed())
        .take(RELATED_LIMIT)
        .map(dto::public_product)
        .collect(),
        None => Vec::new(),
    };

    Ok(Json(json!({
        "product": dto::public_product(&product),
        "category": category,
        "rating": ReviewSummary::of(&reviews),
        "related": related,
    })))
}

pub async fn product_reviews(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Path(slug): Path<String>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<JsonValue>> {
    let tenant_id = tenant.tenant_id();
    let product = active_product(&services, tenant_id, &slug).await?;

    let mut approved: Vec<Review> = services
        .store
        .reviews_for_product(tenant_id, product.id_typed())
        .await?
        .into_iter()
        .filter(|r| r.is_approved)
        .collect();
    approved.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let summary = ReviewSummary::of(&approved);

    Ok(Json(json!({
        "summary": summary,
        "reviews": page.request().slice(approved),
    })))
}

pub async fn list_categories(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
) -> ApiResult<Json<JsonValue>> {
    let mut categories: Vec<_> = services
        .store
        .list_categories(tenant.tenant_id())
        .await?
        .into_iter()
        .filter(|c| c.is_active)
        .collect();
    sort_for_display(&mut categories);
    Ok(Json(json!({ "categories": categories })))
}

/// Submit a review. One per customer and product; verified when the
/// customer has a delivered order containing the product.
pub async fn submit_review(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(draft): Json<ReviewDraft>,
) -> ApiResult<(StatusCode, Json<JsonValue>)> {
    let tenant_id = tenant.tenant_id();
    let user_id = principal.user_id();

    services
        .store
        .get_product(tenant_id, draft.product_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;

    let existing = services.store.reviews_for_product(tenant_id, draft.product_id).await?;
    if existing.iter().any(|r| r.user_id == user_id) {
        return Err(ApiError::bad_request("You have already reviewed this product"));
    }

    let verified = services
        .store
        .orders_for_user(tenant_id, user_id)
        .await?
        .iter()
        .any(|o| o.status() == OrderStatus::Delivered && o.contains_product(draft.product_id));

    let review = Review::submit(
        tenant_id,
        user_id,
        principal.name().map(str::to_string),
        draft,
        verified,
        Utc::now(),
    )?;
    services.store.save_review(&review).await?;
    tracing::info!(review_id = %review.id, verified, "review submitted");

    let message = if verified {
        "Thank you! Your verified review has been submitted for approval."
    } else {
        "Thank you! Your review has been submitted for approval."
    };
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "reviewId": review.id,
            "isVerified": verified,
            "message": message,
        })),
    ))
}
