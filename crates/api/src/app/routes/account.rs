//! Signed-in customer account: profile, address book, preferences and
//! wishlist. Mounted under `/me`.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    routing::{delete, get, patch, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{Value as JsonValue, json};

use storefront_catalog::{Product, ProductId};
use storefront_core::{AggregateId, TenantId};
use storefront_infra::Services;
use storefront_infra::customers::{AddressDraft, CustomerProfile, Preferences, PreferencesPatch, ProfilePatch};
use storefront_infra::store::prelude::*;
use storefront_sales::{OrderNumber, UserOrderStats};

use crate::app::dto::{self, WishlistRequest, parse_id};
use crate::app::errors::{ApiError, ApiResult};
use crate::context::{PrincipalContext, TenantContext};

const RECENT_ORDERS: usize = 5;

pub fn router() -> Router {
    Router::new()
        .route("/profile", get(get_profile).patch(update_profile))
        .route("/addresses", get(list_addresses).post(add_address))
        .route("/addresses/:id", patch(update_address).delete(remove_address))
        .route("/addresses/:id/default", post(set_default_address))
        .route("/preferences", get(get_preferences).patch(update_preferences))
        .route("/wishlist", get(get_wishlist).post(add_to_wishlist))
        .route("/wishlist/:product_id", delete(remove_from_wishlist))
}

/// The stored profile, or one seeded from the token's claims.
async fn profile_or_claims(
    services: &Services,
    tenant_id: TenantId,
    principal: &PrincipalContext,
) -> ApiResult<CustomerProfile> {
    Ok(match services.store.get_profile(tenant_id, principal.user_id()).await? {
        Some(profile) => profile,
        None => CustomerProfile::new(
            tenant_id,
            principal.user_id(),
            principal.name().map(str::to_string),
            principal.email().map(str::to_string),
            principal.phone().map(str::to_string),
            Utc::now(),
        ),
    })
}

pub async fn get_profile(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<Json<JsonValue>> {
    let tenant_id = tenant.tenant_id();
    let profile = profile_or_claims(&services, tenant_id, &principal).await?;
    let mut orders = services.store.orders_for_user(tenant_id, principal.user_id()).await?;
    orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
    let stats = UserOrderStats::of(&orders);
    let wishlist = services.store.get_wishlist(tenant_id, principal.user_id()).await?;
    let addresses = services.store.get_addresses(tenant_id, principal.user_id()).await?;

    let recent: Vec<JsonValue> = orders
        .iter()
        .take(RECENT_ORDERS)
        .map(|o| {
            json!({
                "id": o.id_typed(),
                "orderNumber": o.order_number().map(OrderNumber::as_str),
                "date": o.created_at(),
                "status": o.status(),
                "total": o.total(),
                "items": o.lines().len(),
            })
        })
        .collect();

    let filled = [
        profile.name.is_some(),
        profile.email.is_some(),
        profile.phone.is_some(),
        addresses.default_address().is_some(),
    ];
    let percentage = filled.iter().filter(|f| **f).count() * 100 / filled.len();

    Ok(Json(json!({
        "profile": profile,
        "defaultAddress": addresses.default_address(),
        "stats": {
            "orderCount": stats.total_orders,
            "totalSpent": stats.total_spent,
            "wishlistCount": wishlist.items().len(),
        },
        "recentOrders": recent,
        "profileCompletion": {
            "hasName": filled[0],
            "hasEmail": filled[1],
            "hasPhone": filled[2],
            "hasAddress": filled[3],
            "percentage": percentage,
        },
    })))
}

pub async fn update_profile(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(patch): Json<ProfilePatch>,
) -> ApiResult<Json<JsonValue>> {
    let mut profile = profile_or_claims(&services, tenant.tenant_id(), &principal).await?;
    profile.apply(patch, Utc::now());
    services.store.save_profile(&profile).await?;
    Ok(Json(json!({ "success": true, "profile": profile })))
}

pub async fn list_addresses(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<Json<JsonValue>> {
    let book = services.store.get_addresses(tenant.tenant_id(), principal.user_id()).await?;
    Ok(Json(json!({ "addresses": book.addresses() })))
}

pub async fn add_address(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(draft): Json<AddressDraft>,
) -> ApiResult<(StatusCode, Json<JsonValue>)> {
    let (tenant_id, user_id) = (tenant.tenant_id(), principal.user_id());
    let mut book = services.store.get_addresses(tenant_id, user_id).await?;
    let address = book.add(draft, Utc::now())?.clone();
    services.store.save_addresses(tenant_id, user_id, &book).await?;
    Ok((StatusCode::CREATED, Json(json!({ "address": address }))))
}

pub async fn update_address(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(draft): Json<AddressDraft>,
) -> ApiResult<Json<JsonValue>> {
    let id: AggregateId = parse_id(&id, "address")?;
    let (tenant_id, user_id) = (tenant.tenant_id(), principal.user_id());
    let mut book = services.store.get_addresses(tenant_id, user_id).await?;
    let address = book.update(id, draft, Utc::now())?.clone();
    services.store.save_addresses(tenant_id, user_id, &book).await?;
    Ok(Json(json!({ "address": address })))
}

pub async fn set_default_address(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<JsonValue>> {
    let id: AggregateId = parse_id(&id, "address")?;
    let (tenant_id, user_id) = (tenant.tenant_id(), principal.user_id());
    let mut book = services.store.get_addresses(tenant_id, user_id).await?;
    book.set_default(id, Utc::now())?;
    services.store.save_addresses(tenant_id, user_id, &book).await?;
    Ok(Json(json!({ "addresses": book.addresses() })))
}

pub async fn remove_address(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<JsonValue>> {
    let id: AggregateId = parse_id(&id, "address")?;
    let (tenant_id, user_id) = (tenant.tenant_id(), principal.user_id());
    let mut book = services.store.get_addresses(tenant_id, user_id).await?;
    book.remove(id, Utc::now())?;
    services.store.save_addresses(tenant_id, user_id, &book).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn get_preferences(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<Json<JsonValue>> {
    let preferences: Preferences = services
        .store
        .get_preferences(tenant.tenant_id(), principal.user_id())
        .await?;
    Ok(Json(json!({ "preferences": preferences })))
}

pub async fn update_preferences(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(patch): Json<PreferencesPatch>,
) -> ApiResult<Json<JsonValue>> {
    let (tenant_id, user_id) = (tenant.tenant_id(), principal.user_id());
    let mut preferences = services.store.get_preferences(tenant_id, user_id).await?;
    preferences.apply(patch)?;
    services.store.save_preferences(tenant_id, user_id, &preferences).await?;
    Ok(Json(json!({ "success": true, "preferences": preferences })))
}

/// Wishlist entries joined with their products; entries whose product has
/// been deleted are dropped from the listing.
pub async fn get_wishlist(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<Json<JsonValue>> {
    let tenant_id = tenant.tenant_id();
    let wishlist = services.store.get_wishlist(tenant_id, principal.user_id()).await?;

    let mut items = Vec::with_capacity(wishlist.items().len());
    for item in wishlist.items() {
        let Some(product) = services.store.get_product(tenant_id, item.product_id).await? else {
            continue;
        };
        let mut product_json = dto::public_product(&product);
        product_json["inStock"] = json!(product.has_stock_for(1));
        items.push(json!({
            "productId": item.product_id,
            "createdAt": item.added_at,
            "product": product_json,
        }));
    }

    Ok(Json(json!({ "count": items.len(), "items": items })))
}

pub async fn add_to_wishlist(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<WishlistRequest>,
) -> ApiResult<Json<JsonValue>> {
    let (tenant_id, user_id) = (tenant.tenant_id(), principal.user_id());
    services
        .store
        .get_product(tenant_id, body.product_id)
        .await?
        .filter(Product::is_active)
        .ok_or_else(|| ApiError::not_found("Product not found"))?;

    let mut wishlist = services.store.get_wishlist(tenant_id, user_id).await?;
    wishlist.add(body.product_id, Utc::now())?;
    services.store.save_wishlist(tenant_id, user_id, &wishlist).await?;
    Ok(Json(json!({ "success": true, "message": "Added to wishlist" })))
}

pub async fn remove_from_wishlist(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(product_id): Path<String>,
) -> ApiResult<Json<JsonValue>> {
    let product_id: ProductId = parse_id(&product_id, "product")?;
    let (tenant_id, user_id) = (tenant.tenant_id(), principal.user_id());
    let mut wishlist = services.store.get_wishlist(tenant_id, user_id).await?;
    wishlist.remove(product_id)?;
    services.store.save_wishlist(tenant_id, user_id, &wishlist).await?;
    Ok(Json(json!({ "success": true, "message": "Removed from wishlist" })))
}
