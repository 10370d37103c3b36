//! Back-office menu changes.

use chrono::Utc;
use tracing::instrument;

use storefront_catalog::{
    AdjustStock, CreateProduct, Product, ProductCommand, ProductDetails, ProductEvent, ProductId, SetAvailability,
    UpdateProduct,
};
use storefront_core::{Aggregate, AggregateRoot, DomainError, ExpectedVersion, TenantId};

use crate::error::RepositoryError;
use crate::publish::{SharedBus, publish_committed};
use crate::store::{SharedStore, WriteBatch};

pub struct CatalogAdminService {
    store: SharedStore,
    bus: SharedBus,
}

impl CatalogAdminService {
    pub fn new(store: SharedStore, bus: SharedBus) -> Self {
        Self { store, bus }
    }

    /// Slugs are unique per tenant.
    async fn ensure_slug_free(
        &self,
        tenant_id: TenantId,
        details: &ProductDetails,
        owner: Option<ProductId>,
    ) -> Result<ProductDetails, DomainError> {
        let details = details.clone().normalized()?;
        if let Some(existing) = self.store.product_by_slug(tenant_id, &details.slug).await? {
            if Some(existing.id_typed()) != owner {
                return Err(DomainError::conflict(format!("slug '{}' is already in use", details.slug)));
            }
        }
        Ok(details)
    }

    #[instrument(skip(self, details), fields(tenant_id = %tenant_id), err)]
    pub async fn create_product(
        &self,
        tenant_id: TenantId,
        details: ProductDetails,
        quantity: i64,
        is_active: bool,
    ) -> Result<Product, DomainError> {
        let details = self.ensure_slug_free(tenant_id, &details, None).await?;
        let product_id = ProductId::generate();
        let mut product = Product::empty(product_id);
        let events = product.execute(&ProductCommand::CreateProduct(CreateProduct {
            tenant_id,
            product_id,
            details,
            quantity,
            is_active,
            occurred_at: Utc::now(),
        }))?;

        self.commit(tenant_id, product, 0, &events).await
    }

    #[instrument(skip(self, details), fields(tenant_id = %tenant_id, product_id = %product_id), err)]
    pub async fn update_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        details: ProductDetails,
    ) -> Result<Product, DomainError> {
        let details = self.ensure_slug_free(tenant_id, &details, Some(product_id)).await?;
        let command = ProductCommand::UpdateProduct(UpdateProduct {
            tenant_id,
            product_id,
            details,
            occurred_at: Utc::now(),
        });
        self.apply(tenant_id, product_id, command).await
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_id = %product_id), err)]
    pub async fn set_availability(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        is_active: bool,
    ) -> Result<Product, DomainError> {
        let command = ProductCommand::SetAvailability(SetAvailability {
            tenant_id,
            product_id,
            is_active,
            occurred_at: Utc::now(),
        });
        self.apply(tenant_id, product_id, command).await
    }

    /// Manual stock correction; the result is floored at zero.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_id = %product_id), err)]
    pub async fn adjust_stock(&self, tenant_id: TenantId, product_id: ProductId, delta: i64) -> Result<Product, DomainError> {
        let command = ProductCommand::AdjustStock(AdjustStock {
            tenant_id,
            product_id,
            delta,
            occurred_at: Utc::now(),
        });
        self.apply(tenant_id, product_id, command).await
    }

    /// Placed orders keep their own snapshot of the product, so deletion
    /// does not touch them.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_id = %product_id), err)]
    pub async fn delete_product(&self, tenant_id: TenantId, product_id: ProductId) -> Result<(), DomainError> {
        if !self.store.delete_product(tenant_id, product_id).await? {
            return Err(DomainError::not_found());
        }
        tracing::info!("product deleted");
        Ok(())
    }

    async fn apply(&self, tenant_id: TenantId, product_id: ProductId, command: ProductCommand) -> Result<Product, DomainError> {
        let mut product = self
            .store
            .get_product(tenant_id, product_id)
            .await?
            .ok_or_else(DomainError::not_found)?;
        let version = product.version();
        let events = product.execute(&command)?;
        if events.is_empty() {
            return Ok(product);
        }
        self.commit(tenant_id, product, version, &events).await
    }

    async fn commit(
        &self,
        tenant_id: TenantId,
        product: Product,
        version: u64,
        events: &[ProductEvent],
    ) -> Result<Product, DomainError> {
        self.store
            .commit(WriteBatch::new().product(product.clone(), ExpectedVersion::Exact(version)))
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => DomainError::conflict("product was modified concurrently"),
                other => other.into(),
            })?;
        publish_committed(&self.bus, tenant_id, product.id_typed().0, "catalog.product", version, events);
        Ok(product)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use storefront_core::Money;
    use storefront_events::{EventBus, InMemoryEventBus};

    use crate::store::InMemoryStore;

    fn service() -> (CatalogAdminService, SharedStore, SharedBus) {
        let store: SharedStore = Arc::new(InMemoryStore::new());
        let bus: SharedBus = Arc::new(InMemoryEventBus::new());
        (CatalogAdminService::new(store.clone(), bus.clone()), store, bus)
    }

    #[tokio::test]
    async fn created_products_get_a_slug_and_an_event() {
        let (service, store, bus) = service();
        let sub = bus.subscribe();
        let tenant = TenantId::new();

        let product = service
            .create_product(tenant, ProductDetails::new("Beef Tehari", Money::from_major(320)), 10, true)
            .await
            .unwrap();

        assert_eq!(product.slug(), "beef-tehari");
        let stored = store.get_product(tenant, product.id_typed()).await.unwrap().unwrap();
        assert_eq!(stored.quantity(), 10);
        assert_eq!(sub.try_recv().unwrap().event_type(), "catalog.product.created");
    }

    #[tokio::test]
    async fn duplicate_slugs_are_rejected() {
        let (service, _, _) = service();
        let tenant = TenantId::new();
        let details = ProductDetails::new("Beef Tehari", Money::from_major(320));
        service.create_product(tenant, details.clone(), 1, true).await.unwrap();

        let err = service.create_product(tenant, details, 1, true).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn a_product_may_keep_its_own_slug_on_update() {
        let (service, _, _) = service();
        let tenant = TenantId::new();
        let mut details = ProductDetails::new("Beef Tehari", Money::from_major(320));
        let product = service.create_product(tenant, details.clone(), 1, true).await.unwrap();

        details.price = Money::from_major(350);
        let updated = service.update_product(tenant, product.id_typed(), details).await.unwrap();
        assert_eq!(updated.price(), Money::from_major(350));
    }

    #[tokio::test]
    async fn stock_adjustments_floor_at_zero() {
        let (service, _, _) = service();
        let tenant = TenantId::new();
        let product = service
            .create_product(tenant, ProductDetails::new("Borhani", Money::from_major(80)), 3, true)
            .await
            .unwrap();

        let adjusted = service.adjust_stock(tenant, product.id_typed(), -10).await.unwrap();
        assert_eq!(adjusted.quantity(), 0);
    }

    #[tokio::test]
    async fn deleting_a_missing_product_is_not_found() {
        let (service, _, _) = service();
        let err = service.delete_product(TenantId::new(), ProductId::generate()).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound));
    }
}
