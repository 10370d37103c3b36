//! Store-backed data access for the chat assistant.

use std::collections::HashMap;

use async_trait::async_trait;

use storefront_ai::{AiError, CatalogEntry, MAX_PROMPT_PRODUCTS, OrderReference, OrderSnapshot, ToolBackend};
use storefront_core::{TenantId, UserId};
use storefront_sales::{Order, OrderId, OrderNumber};
use storefront_support::SupportTicket;

use crate::error::{RepoResult, RepositoryError};
use crate::store::SharedStore;

fn backend_error(err: RepositoryError) -> AiError {
    AiError::Backend(err.to_string())
}

pub fn order_snapshot(order: &Order) -> OrderSnapshot {
    OrderSnapshot {
        id: order.id_typed().0,
        order_number: order.order_number().map(|n| n.as_str().to_string()).unwrap_or_default(),
        user_id: order.user_id(),
        status: order.status().as_str().to_string(),
        payment_status: order.payment_status().as_str().to_string(),
        total: order.total(),
        currency: order.currency().clone(),
        item_count: usize::try_from(order.item_count()).unwrap_or(0),
        shipping_city: order.shipping_address().map(|a| a.city.clone()),
        created_at: order.created_at(),
    }
}

#[derive(Clone)]
pub struct StoreToolBackend {
    store: SharedStore,
}

impl StoreToolBackend {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolBackend for StoreToolBackend {
    async fn recent_orders(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<OrderSnapshot>, AiError> {
        let orders = self
            .store
            .orders_for_user(tenant_id, user_id)
            .await
            .map_err(backend_error)?;
        Ok(orders.iter().take(limit).map(order_snapshot).collect())
    }

    async fn find_order(&self, tenant_id: TenantId, reference: OrderReference) -> Result<Option<OrderSnapshot>, AiError> {
        let order = match reference {
            OrderReference::Id(id) => self.store.get_order(tenant_id, OrderId::new(id)).await,
            OrderReference::Number(raw) => match OrderNumber::parse(&raw) {
                Ok(number) => self.store.order_by_number(tenant_id, &number).await,
                Err(_) => return Ok(None),
            },
        }
        .map_err(backend_error)?;
        Ok(order.as_ref().map(order_snapshot))
    }

    async fn save_ticket(&self, ticket: SupportTicket) -> Result<(), AiError> {
        self.store.save_ticket(&ticket).await.map_err(backend_error)
    }
}

/// Active products for the assistant's system prompt, with category names.
pub async fn prompt_catalog(store: &SharedStore, tenant_id: TenantId) -> RepoResult<Vec<CatalogEntry>> {
    let categories: HashMap<_, _> = store
        .list_categories(tenant_id)
        .await?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();

    Ok(store
        .list_products(tenant_id)
        .await?
        .into_iter()
        .filter(|p| p.is_active())
        .take(MAX_PROMPT_PRODUCTS)
        .map(|p| CatalogEntry {
            slug: p.slug().to_string(),
            name: p.name().to_string(),
            price: p.price(),
            category: p
                .category_id()
                .and_then(|id| categories.get(&id).cloned())
                .unwrap_or_else(|| "Menu".to_string()),
            in_stock: p.has_stock_for(1),
            image: p.details().featured_image.clone().or_else(|| p.details().images.first().cloned()),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use storefront_core::{Aggregate, Currency, ExpectedVersion, Money};
    use storefront_sales::{CustomerInfo, OrderCommand, OrderLine, OrderType, PaymentStatus, PlaceOrder};

    use super::*;
    use crate::store::{InMemoryStore, WriteBatch};

    async fn place(store: &SharedStore, tenant: TenantId, user: UserId, number: &str) -> OrderId {
        let id = OrderId::generate();
        let mut order = Order::empty(id);
        order
            .execute(&OrderCommand::PlaceOrder(PlaceOrder {
                tenant_id: tenant,
                order_id: id,
                order_number: OrderNumber::parse(number).unwrap(),
                user_id: Some(user),
                lines: vec![OrderLine {
                    product_id: storefront_catalog::ProductId::generate(),
                    variant_id: None,
                    name: "Borhani".into(),
                    variant_name: None,
                    unit_price: Money::from_major(60),
                    quantity: 3,
                    image: None,
                }],
                discount: Money::ZERO,
                shipping_cost: Money::ZERO,
                currency: Currency::BDT,
                customer: CustomerInfo { name: "Karim".into(), phone: "01800000000".into(), email: None },
                shipping_address: None,
                order_type: OrderType::DineIn,
                payment_method: None,
                payment_status: PaymentStatus::Pending,
                payment_intent_id: None,
                notes: None,
                coupon_code: None,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        store
            .commit(WriteBatch::new().order(order, ExpectedVersion::Exact(0)))
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn finds_orders_by_number_case_insensitively() {
        let store: SharedStore = Arc::new(InMemoryStore::new());
        let tenant = TenantId::new();
        let user = UserId::new();
        let id = place(&store, tenant, user, "DC00000042QWER").await;
        let backend = StoreToolBackend::new(store);

        let found = backend
            .find_order(tenant, OrderReference::Number("dc00000042qwer".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, id.0);
        assert_eq!(found.item_count, 3);
        assert_eq!(found.status, "pending");

        let by_id = backend.find_order(tenant, OrderReference::Id(id.0)).await.unwrap();
        assert!(by_id.is_some());
        let elsewhere = backend.find_order(TenantId::new(), OrderReference::Id(id.0)).await.unwrap();
        assert!(elsewhere.is_none());
    }

    #[tokio::test]
    async fn recent_orders_respects_limit() {
        let store: SharedStore = Arc::new(InMemoryStore::new());
        let tenant = TenantId::new();
        let user = UserId::new();
        for n in ["DC1", "DC2", "DC3"] {
            place(&store, tenant, user, n).await;
        }
        let backend = StoreToolBackend::new(store);

        assert_eq!(backend.recent_orders(tenant, user, 2).await.unwrap().len(), 2);
        assert!(backend.recent_orders(tenant, UserId::new(), 5).await.unwrap().is_empty());
    }
}
