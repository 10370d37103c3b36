use storefront_catalog::{Category, CategoryId, Product, ProductId};
use storefront_core::TenantId;
use storefront_infra::store::prelude::*;
use storefront_infra::{Services, StoreSettings};

use crate::app::dto::parse_id;
use crate::app::errors::{ApiError, ApiResult};

pub async fn settings(services: &Services, tenant_id: TenantId) -> ApiResult<StoreSettings> {
    let overrides = services.store.get_settings(tenant_id).await?;
    Ok(StoreSettings::resolve(&services.config.brand, &overrides))
}

pub async fn product_or_404(services: &Services, tenant_id: TenantId, raw_id: &str) -> ApiResult<Product> {
    let id: ProductId = parse_id(raw_id, "product")?;
    services
        .store
        .get_product(tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))
}

pub enum CategoryScope {
    Any,
    Only(CategoryId),
    /// The requested category does not exist; the listing is empty.
    Unknown,
}

/// Resolve a `category` query value given as an id or a slug.
pub async fn resolve_category(services: &Services, tenant_id: TenantId, raw: Option<&str>) -> ApiResult<CategoryScope> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(CategoryScope::Any);
    };
    let categories: Vec<Category> = services.store.list_categories(tenant_id).await?;
    let found = match raw.parse::<CategoryId>() {
        Ok(id) => categories.iter().find(|c| c.id == id),
        Err(_) => categories.iter().find(|c| c.slug == raw),
    };
    Ok(found.map_or(CategoryScope::Unknown, |c| CategoryScope::Only(c.id)))
}
