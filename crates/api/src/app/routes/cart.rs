use std::collections::HashMap;

use axum::{
    extract::{Extension, Path, Query},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use storefront_catalog::{Product, ProductId};
use storefront_core::TenantId;
use storefront_infra::Services;
use storefront_infra::store::prelude::*;
use storefront_sales::Cart;

use crate::app::dto::{AddCartItemRequest, CartItemView, CartView, UpdateCartItemRequest, VariantQuery, parse_id};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::common;
use crate::context::{PrincipalContext, TenantContext};

/// Routes mounted under `/me/cart`.
pub fn router() -> Router {
    Router::new()
        .route("/", get(get_cart).delete(clear_cart))
        .route("/items", post(add_item))
        .route("/items/:product_id", patch(update_item).delete(remove_item))
}

async fn load(services: &Services, tenant_id: TenantId, principal: &PrincipalContext) -> ApiResult<Cart> {
    Ok(services
        .store
        .get_cart(tenant_id, principal.user_id())
        .await?
        .unwrap_or_else(|| Cart::new(tenant_id, principal.user_id(), Utc::now())))
}

/// Price the cart against the live catalog. Lines whose product has been
/// removed or deactivated are skipped.
async fn view(services: &Services, tenant_id: TenantId, cart: &Cart) -> ApiResult<CartView> {
    let products: HashMap<ProductId, Product> = services
        .store
        .list_products(tenant_id)
        .await?
        .into_iter()
        .filter(Product::is_active)
        .map(|p| (p.id_typed(), p))
        .collect();
    let policy = common::settings(services, tenant_id).await?.shipping_policy();

    let items = cart
        .lines
        .iter()
        .filter_map(|line| {
            let product = products.get(&line.product_id)?;
            let unit_price = product.unit_price(line.variant_id).ok()?;
            Some(CartItemView {
                product_id: line.product_id,
                variant_id: line.variant_id,
                quantity: line.quantity,
                name: product.name().to_string(),
                variant_name: line
                    .variant_id
                    .and_then(|v| product.variant_name(v))
                    .map(str::to_string),
                slug: product.slug().to_string(),
                unit_price,
                line_total: unit_price * line.quantity,
                image: product.details().featured_image.clone(),
                in_stock: product.has_stock_for(line.quantity),
            })
        })
        .collect();
    let totals = cart.totals(&policy, |line| {
        products
            .get(&line.product_id)
            .and_then(|p| p.unit_price(line.variant_id).ok())
    });

    Ok(CartView { items, totals })
}

pub async fn get_cart(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<Json<CartView>> {
    let cart = load(&services, tenant.tenant_id(), &principal).await?;
    Ok(Json(view(&services, tenant.tenant_id(), &cart).await?))
}

pub async fn add_item(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<AddCartItemRequest>,
) -> ApiResult<Json<CartView>> {
    let tenant_id = tenant.tenant_id();
    let product = services
        .store
        .get_product(tenant_id, body.product_id)
        .await?
        .filter(Product::is_active)
        .ok_or_else(|| ApiError::not_found("Product not found"))?;
    product.unit_price(body.variant_id)?;

    let mut cart = load(&services, tenant_id, &principal).await?;
    let already = cart
        .line(body.product_id, body.variant_id)
        .map_or(0, |l| l.quantity);
    if !product.has_stock_for(already + body.quantity) {
        return Err(ApiError::bad_request(format!("Insufficient stock for {}", product.name())));
    }

    cart.add(body.product_id, body.variant_id, body.quantity, Utc::now())?;
    services.store.save_cart(&cart).await?;
    Ok(Json(view(&services, tenant_id, &cart).await?))
}

/// Set a line's quantity; zero removes the line.
pub async fn update_item(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(product_id): Path<String>,
    Json(body): Json<UpdateCartItemRequest>,
) -> ApiResult<Json<CartView>> {
    let tenant_id = tenant.tenant_id();
    let product_id: ProductId = parse_id(&product_id, "product")?;

    if body.quantity > 0 {
        let product = common::product_or_404(&services, tenant_id, &product_id.to_string()).await?;
        if !product.has_stock_for(body.quantity) {
            return Err(ApiError::bad_request(format!("Insufficient stock for {}", product.name())));
        }
    }

    let mut cart = load(&services, tenant_id, &principal).await?;
    cart.set_quantity(product_id, body.variant_id, body.quantity, Utc::now())?;
    services.store.save_cart(&cart).await?;
    Ok(Json(view(&services, tenant_id, &cart).await?))
}

pub async fn remove_item(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(product_id): Path<String>,
    Query(variant): Query<VariantQuery>,
) -> ApiResult<Json<CartView>> {
    let tenant_id = tenant.tenant_id();
    let product_id: ProductId = parse_id(&product_id, "product")?;

    let mut cart = load(&services, tenant_id, &principal).await?;
    cart.remove(product_id, variant.variant_id, Utc::now())?;
    services.store.save_cart(&cart).await?;
    Ok(Json(view(&services, tenant_id, &cart).await?))
}

pub async fn clear_cart(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<Json<serde_json::Value>> {
    services.store.delete_cart(tenant.tenant_id(), principal.user_id()).await?;
    Ok(Json(json!({ "success": true })))
}
