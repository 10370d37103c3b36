//! Order placement.
//!
//! ```text
//! request ─▶ validate ─▶ load settings ─▶ load products + check stock
//!        ─▶ price lines from catalog ─▶ coupon ─▶ PlaceOrder + ReserveStock
//!        ─▶ commit (order, products, coupon) atomically ─▶ publish
//! ```
//!
//! A lost optimistic-concurrency race re-runs the whole pipeline against
//! fresh data, a bounded number of times.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use storefront_catalog::{Product, ProductCommand, ProductId, ReserveStock, VariantId};
use storefront_core::{Aggregate, AggregateRoot, DomainError, ExpectedVersion, Money, TenantId, UserId};
use storefront_sales::{
    Coupon, CouponRejection, CustomerInfo, DeliveryAddress, Order, OrderCommand, OrderId, OrderLine, OrderNumber,
    OrderType, PaymentMethod, PaymentStatus, PlaceOrder, normalize_code,
};

use crate::config::BrandConfig;
use crate::customers::CustomerProfile;
use crate::error::{IntegrationError, RepositoryError};
use crate::integrations::PaymentGateway;
use crate::publish::{SharedBus, publish_committed};
use crate::settings::StoreSettings;
use crate::store::{SharedStore, WriteBatch};

const MAX_ATTEMPTS: usize = 3;
const MAX_ITEM_QUANTITY: i64 = 99;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItem {
    pub product_id: ProductId,
    #[serde(default)]
    pub variant_id: Option<VariantId>,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub items: Vec<CheckoutItem>,
    pub customer: CustomerInfo,
    #[serde(default)]
    pub shipping_address: Option<DeliveryAddress>,
    #[serde(default)]
    pub order_type: OrderType,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    /// Stripe payment intent confirmed by the client before placing the order.
    #[serde(default)]
    pub payment_intent_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("{0}")]
    Validation(String),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("Insufficient stock for {name}")]
    InsufficientStock {
        product_id: ProductId,
        name: String,
        requested: i64,
        available: i64,
    },

    #[error("{0}")]
    Coupon(CouponRejection),

    #[error("payment verification failed: {0}")]
    Payment(IntegrationError),

    #[error(transparent)]
    Domain(DomainError),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<DomainError> for CheckoutError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => CheckoutError::Validation(msg),
            other => CheckoutError::Domain(other),
        }
    }
}

impl From<RepositoryError> for CheckoutError {
    fn from(value: RepositoryError) -> Self {
        CheckoutError::Repository(value)
    }
}

impl CheckoutError {
    fn is_retryable(&self) -> bool {
        matches!(self, CheckoutError::Repository(RepositoryError::Conflict(_)))
    }
}

fn too_many() -> CheckoutError {
    CheckoutError::Validation(format!("Item quantity cannot exceed {MAX_ITEM_QUANTITY}"))
}

/// Quantities merged per (product, variant), in first-seen order.
fn merge_items(items: &[CheckoutItem]) -> Result<Vec<CheckoutItem>, CheckoutError> {
    if items.is_empty() {
        return Err(CheckoutError::Validation("Cart is empty".into()));
    }
    let mut merged: Vec<CheckoutItem> = Vec::with_capacity(items.len());
    for item in items {
        if item.quantity <= 0 {
            return Err(CheckoutError::Validation("Item quantity must be at least 1".into()));
        }
        if item.quantity > MAX_ITEM_QUANTITY {
            return Err(too_many());
        }
        match merged
            .iter_mut()
            .find(|m| m.product_id == item.product_id && m.variant_id == item.variant_id)
        {
            Some(m) => {
                // Both sides are at most MAX_ITEM_QUANTITY, so this cannot overflow.
                m.quantity += item.quantity;
                if m.quantity > MAX_ITEM_QUANTITY {
                    return Err(too_many());
                }
            }
            None => merged.push(item.clone()),
        }
    }
    Ok(merged)
}

fn validate_request(request: &CheckoutRequest) -> Result<(), CheckoutError> {
    if request.customer.name.trim().is_empty() || request.customer.phone.trim().is_empty() {
        return Err(CheckoutError::Validation("Customer name and phone are required".into()));
    }
    if request.order_type == OrderType::Delivery {
        let complete = request
            .shipping_address
            .as_ref()
            .is_some_and(|a| !a.address.trim().is_empty() && !a.city.trim().is_empty());
        if !complete {
            return Err(CheckoutError::Validation("Shipping address is required for delivery".into()));
        }
    }
    Ok(())
}

/// A coupon with one use recorded, committed against the version it was read at.
struct AppliedCoupon {
    coupon: Coupon,
    loaded_version: u64,
    discount: Money,
}

/// Result of a successful checkout.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order: Order,
    pub discount: Money,
}

pub struct CheckoutService {
    store: SharedStore,
    bus: SharedBus,
    payments: Arc<dyn PaymentGateway>,
    brand: BrandConfig,
}

impl CheckoutService {
    pub fn new(store: SharedStore, bus: SharedBus, payments: Arc<dyn PaymentGateway>, brand: BrandConfig) -> Self {
        Self {
            store,
            bus,
            payments,
            brand,
        }
    }

    #[instrument(
        skip_all,
        fields(tenant_id = %tenant_id, items = request.items.len(), guest = user_id.is_none()),
        err
    )]
    pub async fn place_order(
        &self,
        tenant_id: TenantId,
        user_id: Option<UserId>,
        request: CheckoutRequest,
    ) -> Result<PlacedOrder, CheckoutError> {
        validate_request(&request)?;
        let items = merge_items(&request.items)?;

        let settings = StoreSettings::resolve(&self.brand, &self.store.get_settings(tenant_id).await?);
        let method = request.payment_method.unwrap_or_default();
        if !settings.accepts(method) {
            return Err(CheckoutError::Validation(format!(
                "Payment method '{}' is not available",
                method.as_str()
            )));
        }

        let mut attempt = 1;
        loop {
            match self.try_place(tenant_id, user_id, &request, &items, &settings).await {
                Err(e) if e.is_retryable() && attempt < MAX_ATTEMPTS => {
                    tracing::warn!(attempt, error = %e, "checkout lost a concurrent update; retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
                Ok(placed) => {
                    self.after_commit(tenant_id, user_id, &request).await;
                    return Ok(placed);
                }
            }
        }
    }

    async fn load_products(
        &self,
        tenant_id: TenantId,
        items: &[CheckoutItem],
    ) -> Result<HashMap<ProductId, Product>, CheckoutError> {
        let mut products = HashMap::new();
        for item in items {
            if products.contains_key(&item.product_id) {
                continue;
            }
            let product = self
                .store
                .get_product(tenant_id, item.product_id)
                .await?
                .filter(Product::is_active)
                .ok_or(CheckoutError::ProductNotFound(item.product_id))?;
            products.insert(item.product_id, product);
        }

        // Variants of one product share its stock.
        let mut requested: HashMap<ProductId, i64> = HashMap::new();
        for item in items {
            *requested.entry(item.product_id).or_default() += item.quantity;
        }
        for (product_id, quantity) in &requested {
            let product = &products[product_id];
            if !product.has_stock_for(*quantity) {
                return Err(CheckoutError::InsufficientStock {
                    product_id: *product_id,
                    name: product.name().to_string(),
                    requested: *quantity,
                    available: product.quantity(),
                });
            }
        }
        Ok(products)
    }

    /// A succeeded intent marks the order paid only if it was created for
    /// this buyer in the store currency, covers the total and has not paid
    /// for another order. Returns the intent id to bind to the order.
    async fn payment_status(
        &self,
        tenant_id: TenantId,
        user_id: Option<UserId>,
        request: &CheckoutRequest,
        total: Money,
    ) -> Result<(PaymentStatus, Option<String>), CheckoutError> {
        let Some(intent_id) = request.payment_intent_id.as_deref().map(str::trim).filter(|id| !id.is_empty()) else {
            return Ok((PaymentStatus::Pending, None));
        };
        if request.payment_method != Some(PaymentMethod::Stripe) {
            return Ok((PaymentStatus::Pending, None));
        }

        let intent = self.payments.retrieve_intent(intent_id).await.map_err(CheckoutError::Payment)?;
        if !intent.is_succeeded() {
            return Ok((PaymentStatus::Pending, None));
        }
        if !intent.currency.eq_ignore_ascii_case(self.brand.currency.code()) {
            return Err(CheckoutError::Validation("Payment currency does not match the store currency".into()));
        }
        let buyer = user_id.map_or_else(|| "guest".to_string(), |u| u.to_string());
        if intent.metadata.get("userId") != Some(&buyer) {
            return Err(CheckoutError::Validation("Payment was not made by this customer".into()));
        }
        if intent.amount < total.minor() {
            return Err(CheckoutError::Validation("Payment amount does not match the order total".into()));
        }
        if self.store.order_by_payment_intent(tenant_id, &intent.id).await?.is_some() {
            return Err(CheckoutError::Validation("Payment has already been used for another order".into()));
        }
        Ok((PaymentStatus::Paid, Some(intent.id)))
    }

    async fn resolve_coupon(
        &self,
        tenant_id: TenantId,
        code: Option<&str>,
        subtotal: Money,
        now: DateTime<Utc>,
    ) -> Result<Option<AppliedCoupon>, CheckoutError> {
        let Some(code) = code.map(normalize_code).filter(|c| !c.is_empty()) else {
            return Ok(None);
        };
        let mut coupon = self
            .store
            .coupon_by_code(tenant_id, &code)
            .await?
            .ok_or(CheckoutError::Coupon(CouponRejection::Unknown))?;
        let applied = coupon
            .evaluate(subtotal, now, &self.brand.currency)
            .map_err(CheckoutError::Coupon)?;
        let loaded_version = coupon.version;
        coupon.record_use(now);
        Ok(Some(AppliedCoupon {
            coupon,
            loaded_version,
            discount: applied.discount,
        }))
    }

    async fn try_place(
        &self,
        tenant_id: TenantId,
        user_id: Option<UserId>,
        request: &CheckoutRequest,
        items: &[CheckoutItem],
        settings: &StoreSettings,
    ) -> Result<PlacedOrder, CheckoutError> {
        let now = Utc::now();
        let mut products = self.load_products(tenant_id, items).await?;

        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let product = &products[&item.product_id];
            lines.push(OrderLine {
                product_id: item.product_id,
                variant_id: item.variant_id,
                name: product.name().to_string(),
                variant_name: item.variant_id.and_then(|v| product.variant_name(v)).map(str::to_string),
                unit_price: product.unit_price(item.variant_id)?,
                quantity: item.quantity,
                image: product.details().featured_image.clone(),
            });
        }
        let subtotal: Money = lines.iter().map(OrderLine::line_total).sum();

        let city = request.shipping_address.as_ref().map(|a| a.city.as_str());
        let shipping_cost = settings.shipping_policy().cost(subtotal, request.order_type, city);
        let coupon = self
            .resolve_coupon(tenant_id, request.coupon_code.as_deref(), subtotal, now)
            .await?;
        let discount = coupon.as_ref().map(|c| c.discount).unwrap_or(Money::ZERO);
        let (payment_status, payment_intent_id) = self
            .payment_status(tenant_id, user_id, request, subtotal - discount + shipping_cost)
            .await?;

        let order_id = OrderId::generate();
        let mut order = Order::empty(order_id);
        let order_events = order.execute(&OrderCommand::PlaceOrder(PlaceOrder {
            tenant_id,
            order_id,
            order_number: OrderNumber::generate(now, &mut rand::thread_rng()),
            user_id,
            lines,
            discount,
            shipping_cost,
            currency: self.brand.currency.clone(),
            customer: request.customer.clone(),
            shipping_address: request.shipping_address.clone(),
            order_type: request.order_type,
            payment_method: request.payment_method,
            payment_status,
            payment_intent_id,
            notes: request.notes.clone(),
            coupon_code: coupon.as_ref().map(|c| c.coupon.code.clone()),
            occurred_at: now,
        }))?;

        let mut batch = WriteBatch::new().order(order.clone(), ExpectedVersion::Exact(0));
        let mut product_events = Vec::new();
        let mut reserved: HashMap<ProductId, i64> = HashMap::new();
        for item in items {
            *reserved.entry(item.product_id).or_default() += item.quantity;
        }
        for (product_id, quantity) in reserved {
            let Some(mut product) = products.remove(&product_id) else {
                continue;
            };
            let loaded_version = product.version();
            let events = product
                .execute(&ProductCommand::ReserveStock(ReserveStock {
                    tenant_id,
                    product_id,
                    quantity,
                    occurred_at: now,
                }))
                .map_err(|e| match e {
                    DomainError::InvariantViolation(_) => CheckoutError::InsufficientStock {
                        product_id,
                        name: product.name().to_string(),
                        requested: quantity,
                        available: product.quantity(),
                    },
                    other => other.into(),
                })?;
            if events.is_empty() {
                continue;
            }
            if settings.notify_low_stock && product.is_low_stock() {
                tracing::warn!(product_id = %product_id, quantity = product.quantity(), "product stock is low");
            }
            product_events.push((product_id, loaded_version, events));
            batch = batch.product(product, ExpectedVersion::Exact(loaded_version));
        }
        if let Some(applied) = coupon {
            batch = batch.coupon(applied.coupon, ExpectedVersion::Exact(applied.loaded_version));
        }

        self.store.commit(batch).await?;
        tracing::info!(
            order_id = %order_id,
            order_number = %order.order_number().map(OrderNumber::as_str).unwrap_or_default(),
            total = order.total().minor(),
            "order placed"
        );

        publish_committed(&self.bus, tenant_id, order_id.0, "sales.order", 0, &order_events);
        for (product_id, version_before, events) in &product_events {
            publish_committed(&self.bus, tenant_id, product_id.0, "catalog.product", *version_before, events);
        }

        Ok(PlacedOrder { order, discount })
    }

    /// Best-effort follow-ups for signed-in customers.
    async fn after_commit(&self, tenant_id: TenantId, user_id: Option<UserId>, request: &CheckoutRequest) {
        let Some(user_id) = user_id else {
            return;
        };
        if let Err(e) = self.store.delete_cart(tenant_id, user_id).await {
            tracing::warn!(error = %e, "failed to clear cart after checkout");
        }

        let customer = &request.customer;
        let profile = match self.store.get_profile(tenant_id, user_id).await {
            Ok(Some(mut profile)) => {
                if !profile.absorb_contact(Some(&customer.name), customer.email.as_deref(), Some(&customer.phone)) {
                    return;
                }
                profile
            }
            Ok(None) => CustomerProfile::new(
                tenant_id,
                user_id,
                Some(customer.name.clone()),
                customer.email.clone(),
                Some(customer.phone.clone()),
                Utc::now(),
            ),
            Err(e) => {
                tracing::warn!(error = %e, "failed to load customer profile after checkout");
                return;
            }
        };
        if let Err(e) = self.store.save_profile(&profile).await {
            tracing::warn!(error = %e, "failed to update customer profile after checkout");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_catalog::{CreateProduct, ProductDetails};
    use storefront_core::Currency;
    use storefront_events::EventBus;
    use storefront_sales::{CouponDraft, Discount, OrderStatus};

    use async_trait::async_trait;
    use std::collections::BTreeMap;

    use crate::integrations::{CreateIntent, DisabledGateway, PaymentIntent, Refund, RefundRequest};
    use crate::store::InMemoryStore;

    struct Fixture {
        store: SharedStore,
        bus: SharedBus,
        service: CheckoutService,
        tenant: TenantId,
    }

    fn fixture() -> Fixture {
        fixture_with(Arc::new(DisabledGateway))
    }

    fn fixture_with(payments: Arc<dyn PaymentGateway>) -> Fixture {
        let store: SharedStore = Arc::new(InMemoryStore::new());
        let bus: SharedBus = Arc::new(storefront_events::InMemoryEventBus::new());
        let service = CheckoutService::new(store.clone(), bus.clone(), payments, BrandConfig::default());
        Fixture { store, bus, service, tenant: TenantId::new() }
    }

    /// Hands back the same intent for any id.
    struct FixedIntent(PaymentIntent);

    #[async_trait]
    impl PaymentGateway for FixedIntent {
        async fn create_intent(&self, _: CreateIntent) -> Result<PaymentIntent, IntegrationError> {
            Ok(self.0.clone())
        }

        async fn retrieve_intent(&self, _: &str) -> Result<PaymentIntent, IntegrationError> {
            Ok(self.0.clone())
        }

        async fn refund(&self, _: RefundRequest) -> Result<Refund, IntegrationError> {
            Err(IntegrationError::Disabled("stripe"))
        }
    }

    fn succeeded_intent(currency: &str, buyer: &str) -> PaymentIntent {
        PaymentIntent {
            id: "pi_123".into(),
            client_secret: None,
            status: "succeeded".into(),
            amount: 1_000_000,
            currency: currency.into(),
            customer_id: None,
            ephemeral_key: None,
            metadata: BTreeMap::from([("userId".to_string(), buyer.to_string())]),
            created: 0,
        }
    }

    fn stripe_request(product: ProductId) -> CheckoutRequest {
        let mut req = request(vec![(product, 1)]);
        req.payment_method = Some(PaymentMethod::Stripe);
        req.payment_intent_id = Some("pi_123".into());
        req
    }

    async fn seed(f: &Fixture, name: &str, price: i64, quantity: i64) -> ProductId {
        let id = ProductId::generate();
        let mut product = Product::empty(id);
        product
            .execute(&ProductCommand::CreateProduct(CreateProduct {
                tenant_id: f.tenant,
                product_id: id,
                details: ProductDetails::new(name, Money::from_major(price)),
                quantity,
                is_active: true,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        f.store
            .commit(WriteBatch::new().product(product, ExpectedVersion::Exact(0)))
            .await
            .unwrap();
        id
    }

    fn request(items: Vec<(ProductId, i64)>) -> CheckoutRequest {
        CheckoutRequest {
            items: items
                .into_iter()
                .map(|(product_id, quantity)| CheckoutItem { product_id, variant_id: None, quantity })
                .collect(),
            customer: CustomerInfo { name: "Rahim Uddin".into(), phone: "01700000000".into(), email: None },
            shipping_address: Some(DeliveryAddress {
                name: "Rahim".into(),
                phone: "01700000000".into(),
                address: "House 1, Road 2".into(),
                city: "Dhaka".into(),
                instruction: None,
            }),
            order_type: OrderType::Delivery,
            payment_method: None,
            payment_intent_id: None,
            notes: None,
            coupon_code: None,
        }
    }

    #[tokio::test]
    async fn places_order_reserves_stock_and_publishes() {
        let f = fixture();
        let sub = f.bus.subscribe();
        let kacchi = seed(&f, "Kacchi", 400, 10).await;

        let placed = f
            .service
            .place_order(f.tenant, None, request(vec![(kacchi, 2), (kacchi, 1)]))
            .await
            .unwrap();

        let order = placed.order;
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.lines().len(), 1);
        assert_eq!(order.lines()[0].quantity, 3);
        assert_eq!(order.totals().subtotal, Money::from_major(1200));
        assert_eq!(order.totals().shipping_cost, Money::from_major(60));
        assert_eq!(order.currency(), &Currency::BDT);

        let product = f.store.get_product(f.tenant, kacchi).await.unwrap().unwrap();
        assert_eq!(product.quantity(), 7);
        assert!(f.store.get_order(f.tenant, order.id_typed()).await.unwrap().is_some());

        let types: Vec<String> = std::iter::from_fn(|| sub.try_recv().ok()).map(|e| e.event_type().to_string()).collect();
        assert_eq!(types, vec!["sales.order.placed", "catalog.product.stock_changed"]);
    }

    #[tokio::test]
    async fn insufficient_stock_reports_details_and_writes_nothing() {
        let f = fixture();
        let kacchi = seed(&f, "Kacchi", 400, 2).await;

        let err = f.service.place_order(f.tenant, None, request(vec![(kacchi, 3)])).await.unwrap_err();
        match err {
            CheckoutError::InsufficientStock { name, requested, available, .. } => {
                assert_eq!((name.as_str(), requested, available), ("Kacchi", 3, 2));
            }
            other => panic!("expected insufficient stock, got {other:?}"),
        }
        assert!(f.store.list_orders(f.tenant).await.unwrap().is_empty());
        assert_eq!(f.store.get_product(f.tenant, kacchi).await.unwrap().unwrap().quantity(), 2);
    }

    #[tokio::test]
    async fn unknown_and_foreign_products_are_not_found() {
        let f = fixture();
        let missing = ProductId::generate();
        let err = f.service.place_order(f.tenant, None, request(vec![(missing, 1)])).await.unwrap_err();
        assert!(matches!(err, CheckoutError::ProductNotFound(id) if id == missing));

        let kacchi = seed(&f, "Kacchi", 400, 5).await;
        let err = f.service.place_order(TenantId::new(), None, request(vec![(kacchi, 1)])).await.unwrap_err();
        assert!(matches!(err, CheckoutError::ProductNotFound(_)));
    }

    #[tokio::test]
    async fn coupon_discount_is_applied_and_usage_recorded() {
        let f = fixture();
        let kacchi = seed(&f, "Kacchi", 500, 10).await;
        let coupon = Coupon::create(
            f.tenant,
            CouponDraft {
                code: "save10".into(),
                description: None,
                discount: Discount::Percentage(1000),
                min_order_amount: None,
                max_discount: None,
                usage_limit: Some(1),
                starts_at: None,
                expires_at: None,
                is_active: None,
            },
            Utc::now(),
        )
        .unwrap();
        f.store.save_coupon(&coupon).await.unwrap();

        let mut req = request(vec![(kacchi, 2)]);
        req.coupon_code = Some(" Save10 ".into());
        let placed = f.service.place_order(f.tenant, None, req.clone()).await.unwrap();

        assert_eq!(placed.discount, Money::from_major(100));
        assert_eq!(placed.order.coupon_code(), Some("SAVE10"));
        assert_eq!(placed.order.total(), Money::from_major(1000 - 100 + 60));
        let stored = f.store.coupon_by_code(f.tenant, "SAVE10").await.unwrap().unwrap();
        assert_eq!(stored.used_count, 1);

        let err = f.service.place_order(f.tenant, None, req).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Coupon(CouponRejection::UsageLimitReached)));
    }

    #[tokio::test]
    async fn delivery_requires_an_address_but_takeaway_does_not() {
        let f = fixture();
        let kacchi = seed(&f, "Kacchi", 400, 5).await;

        let mut req = request(vec![(kacchi, 1)]);
        req.shipping_address = None;
        let err = f.service.place_order(f.tenant, None, req.clone()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Validation(_)));

        req.order_type = OrderType::Takeaway;
        let placed = f.service.place_order(f.tenant, None, req).await.unwrap();
        assert_eq!(placed.order.totals().shipping_cost, Money::ZERO);
    }

    #[tokio::test]
    async fn signed_in_checkout_fills_the_profile() {
        let f = fixture();
        let kacchi = seed(&f, "Kacchi", 400, 5).await;
        let user = UserId::new();

        f.service.place_order(f.tenant, Some(user), request(vec![(kacchi, 1)])).await.unwrap();

        let profile = f.store.get_profile(f.tenant, user).await.unwrap().unwrap();
        assert_eq!(profile.phone.as_deref(), Some("01700000000"));
        assert_eq!(f.store.orders_for_user(f.tenant, user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn a_paid_intent_pays_for_one_order_only() {
        let f = fixture_with(Arc::new(FixedIntent(succeeded_intent("bdt", "guest"))));
        let kacchi = seed(&f, "Kacchi", 400, 5).await;

        let placed = f.service.place_order(f.tenant, None, stripe_request(kacchi)).await.unwrap();
        assert_eq!(placed.order.payment_status(), PaymentStatus::Paid);
        assert_eq!(placed.order.payment_intent_id(), Some("pi_123"));

        let err = f.service.place_order(f.tenant, None, stripe_request(kacchi)).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Validation(msg) if msg.contains("already been used")));
        assert_eq!(f.store.list_orders(f.tenant).await.unwrap().len(), 1);
        assert_eq!(f.store.get_product(f.tenant, kacchi).await.unwrap().unwrap().quantity(), 4);
    }

    #[tokio::test]
    async fn intent_for_another_buyer_or_currency_is_rejected() {
        let f = fixture_with(Arc::new(FixedIntent(succeeded_intent("bdt", "guest"))));
        let kacchi = seed(&f, "Kacchi", 400, 5).await;
        let err = f
            .service
            .place_order(f.tenant, Some(UserId::new()), stripe_request(kacchi))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Validation(msg) if msg.contains("customer")));

        let f = fixture_with(Arc::new(FixedIntent(succeeded_intent("usd", "guest"))));
        let kacchi = seed(&f, "Kacchi", 400, 5).await;
        let err = f.service.place_order(f.tenant, None, stripe_request(kacchi)).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Validation(msg) if msg.contains("currency")));
        assert!(f.store.list_orders(f.tenant).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn coupon_use_committed_from_a_stale_read_conflicts() {
        let f = fixture();
        let coupon = Coupon::create(
            f.tenant,
            CouponDraft {
                code: "ONCE".into(),
                description: None,
                discount: Discount::Fixed(Money::from_major(50)),
                min_order_amount: None,
                max_discount: None,
                usage_limit: Some(1),
                starts_at: None,
                expires_at: None,
                is_active: None,
            },
            Utc::now(),
        )
        .unwrap();
        f.store.save_coupon(&coupon).await.unwrap();

        // Two checkouts read the unused coupon before either commits.
        let mut first = f.store.coupon_by_code(f.tenant, "ONCE").await.unwrap().unwrap();
        let mut second = first.clone();
        let loaded = first.version;
        first.record_use(Utc::now());
        second.record_use(Utc::now());

        f.store
            .commit(WriteBatch::new().coupon(first, ExpectedVersion::Exact(loaded)))
            .await
            .unwrap();
        let err = f
            .store
            .commit(WriteBatch::new().coupon(second, ExpectedVersion::Exact(loaded)))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert_eq!(f.store.coupon_by_code(f.tenant, "ONCE").await.unwrap().unwrap().used_count, 1);
    }

    #[test]
    fn merge_rejects_oversized_lines_without_overflowing() {
        let product_id = ProductId::generate();
        let huge = CheckoutItem { product_id, variant_id: None, quantity: i64::MAX };
        assert!(matches!(merge_items(&[huge.clone(), huge]), Err(CheckoutError::Validation(_))));

        let sixty = CheckoutItem { product_id, variant_id: None, quantity: 60 };
        assert!(matches!(merge_items(&[sixty.clone(), sixty]), Err(CheckoutError::Validation(_))));
    }

    #[test]
    fn merge_rejects_empty_and_non_positive() {
        assert!(matches!(merge_items(&[]), Err(CheckoutError::Validation(_))));
        let item = CheckoutItem { product_id: ProductId::generate(), variant_id: None, quantity: 0 };
        assert!(matches!(merge_items(&[item]), Err(CheckoutError::Validation(_))));
    }
}
