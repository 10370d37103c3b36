//! Back-office order changes.

use chrono::Utc;
use tracing::instrument;

use storefront_catalog::{ProductCommand, ProductEvent, ProductId, ReleaseStock};
use storefront_core::{Aggregate, AggregateRoot, DomainError, ExpectedVersion, TenantId};
use storefront_sales::{
    ChangePaymentStatus, ChangeStatus, Order, OrderCommand, OrderEvent, OrderId, OrderStatus, PaymentStatus,
    UpdateNotes,
};

use crate::error::RepositoryError;
use crate::publish::{SharedBus, publish_committed};
use crate::store::{SharedStore, WriteBatch};

const MAX_ATTEMPTS: usize = 3;

pub struct OrderAdminService {
    store: SharedStore,
    bus: SharedBus,
}

impl OrderAdminService {
    pub fn new(store: SharedStore, bus: SharedBus) -> Self {
        Self { store, bus }
    }

    async fn load(&self, tenant_id: TenantId, order_id: OrderId) -> Result<Order, DomainError> {
        self.store
            .get_order(tenant_id, order_id)
            .await?
            .ok_or_else(DomainError::not_found)
    }

    /// Move an order to `status`. Leaving the active states (cancel/refund)
    /// returns the ordered units to stock exactly once.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, order_id = %order_id), err)]
    pub async fn change_status(
        &self,
        tenant_id: TenantId,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, DomainError> {
        let mut attempt = 1;
        loop {
            match self.try_change_status(tenant_id, order_id, status).await {
                Err(DomainError::Conflict(msg)) if attempt < MAX_ATTEMPTS => {
                    tracing::warn!(attempt, conflict = %msg, "status change lost a concurrent update; retrying");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn try_change_status(
        &self,
        tenant_id: TenantId,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, DomainError> {
        let now = Utc::now();
        let mut order = self.load(tenant_id, order_id).await?;
        let order_version = order.version();
        let events = order.execute(&OrderCommand::ChangeStatus(ChangeStatus {
            tenant_id,
            order_id,
            status,
            occurred_at: now,
        }))?;
        if events.is_empty() {
            return Ok(order);
        }

        let restock = events
            .iter()
            .any(|e| matches!(e, OrderEvent::StatusChanged(c) if c.restock));

        let mut batch = WriteBatch::new().order(order.clone(), ExpectedVersion::Exact(order_version));
        let mut product_events: Vec<(ProductId, u64, Vec<ProductEvent>)> = Vec::new();
        if restock {
            let mut per_product: Vec<(ProductId, i64)> = Vec::new();
            for line in order.lines() {
                match per_product.iter_mut().find(|(id, _)| *id == line.product_id) {
                    Some((_, q)) => *q += line.quantity,
                    None => per_product.push((line.product_id, line.quantity)),
                }
            }
            for (product_id, quantity) in per_product {
                // Products deleted since the order was placed are skipped.
                let Some(mut product) = self.store.get_product(tenant_id, product_id).await? else {
                    tracing::warn!(product_id = %product_id, "restock skipped; product no longer exists");
                    continue;
                };
                let version = product.version();
                let released = product.execute(&ProductCommand::ReleaseStock(ReleaseStock {
                    tenant_id,
                    product_id,
                    quantity,
                    occurred_at: now,
                }))?;
                if released.is_empty() {
                    continue;
                }
                product_events.push((product_id, version, released));
                batch = batch.product(product, ExpectedVersion::Exact(version));
            }
        }

        self.store.commit(batch).await?;
        tracing::info!(to = status.as_str(), restock, "order status changed");

        publish_committed(&self.bus, tenant_id, order_id.0, "sales.order", order_version, &events);
        for (product_id, version, events) in &product_events {
            publish_committed(&self.bus, tenant_id, product_id.0, "catalog.product", *version, events);
        }
        Ok(order)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, order_id = %order_id), err)]
    pub async fn change_payment_status(
        &self,
        tenant_id: TenantId,
        order_id: OrderId,
        payment_status: PaymentStatus,
    ) -> Result<Order, DomainError> {
        let command = OrderCommand::ChangePaymentStatus(ChangePaymentStatus {
            tenant_id,
            order_id,
            payment_status,
            occurred_at: Utc::now(),
        });
        self.apply(tenant_id, order_id, command).await
    }

    /// Record a refund issued at the payment processor. The order moves to
    /// refunded, which returns its stock unless it was already cancelled,
    /// and its payment is marked refunded. Repeating it changes nothing.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, order_id = %order_id), err)]
    pub async fn record_refund(&self, tenant_id: TenantId, order_id: OrderId) -> Result<Order, DomainError> {
        self.change_status(tenant_id, order_id, OrderStatus::Refunded).await?;
        self.change_payment_status(tenant_id, order_id, PaymentStatus::Refunded).await
    }

    #[instrument(skip(self, notes), fields(tenant_id = %tenant_id, order_id = %order_id), err)]
    pub async fn update_notes(
        &self,
        tenant_id: TenantId,
        order_id: OrderId,
        notes: Option<String>,
    ) -> Result<Order, DomainError> {
        let command = OrderCommand::UpdateNotes(UpdateNotes {
            tenant_id,
            order_id,
            notes,
            occurred_at: Utc::now(),
        });
        self.apply(tenant_id, order_id, command).await
    }

    /// load → handle → persist with version check → publish.
    async fn apply(&self, tenant_id: TenantId, order_id: OrderId, command: OrderCommand) -> Result<Order, DomainError> {
        let mut order = self.load(tenant_id, order_id).await?;
        let version = order.version();
        let events = order.execute(&command)?;
        if events.is_empty() {
            return Ok(order);
        }

        self.store
            .commit(WriteBatch::new().order(order.clone(), ExpectedVersion::Exact(version)))
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => DomainError::conflict("order was modified concurrently"),
                other => other.into(),
            })?;
        publish_committed(&self.bus, tenant_id, order_id.0, "sales.order", version, &events);
        Ok(order)
    }
}
