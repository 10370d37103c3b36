//! Tenant-scoped repositories.
//!
//! Every trait is implemented twice: [`InMemoryStore`] for tests and single
//! process dev runs, [`PostgresStore`] for deployments. Both enforce the same
//! uniqueness rules (slugs, coupon codes, order numbers, one review per user
//! and product) and the same optimistic version checks on products, orders and coupons
//! used at checkout.
//!
//! Aggregates that must change together (an order, the stock it reserved,
//! the coupon it used) go through [`UnitOfWork::commit`] in one
//! [`WriteBatch`].

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;

use storefront_catalog::{Category, CategoryId, Product, ProductId, Review, ReviewId};
use storefront_core::{ExpectedVersion, TenantId, UserId};
use storefront_sales::{Cart, Coupon, CouponId, Order, OrderId, OrderNumber};
use storefront_support::{Conversation, ConversationId, SupportTicket, TicketId};

use crate::customers::{AddressBook, CustomerProfile, Preferences, Wishlist};
use crate::error::RepoResult;
use crate::settings::SettingsOverrides;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Aggregates written atomically. Version expectations refer to the version
/// the caller loaded; a new aggregate expects `Exact(0)`.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub(crate) orders: Vec<(Order, ExpectedVersion)>,
    pub(crate) products: Vec<(Product, ExpectedVersion)>,
    pub(crate) coupons: Vec<(Coupon, ExpectedVersion)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order(mut self, order: Order, expected: ExpectedVersion) -> Self {
        self.orders.push((order, expected));
        self
    }

    pub fn product(mut self, product: Product, expected: ExpectedVersion) -> Self {
        self.products.push((product, expected));
        self
    }

    /// The coupon must already exist; batches never create coupons.
    pub fn coupon(mut self, coupon: Coupon, expected: ExpectedVersion) -> Self {
        self.coupons.push((coupon, expected));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty() && self.products.is_empty() && self.coupons.is_empty()
    }
}

#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Apply every write in the batch or none of them.
    async fn commit(&self, batch: WriteBatch) -> RepoResult<()>;
}

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn list_categories(&self, tenant_id: TenantId) -> RepoResult<Vec<Category>>;
    async fn get_category(&self, tenant_id: TenantId, id: CategoryId) -> RepoResult<Option<Category>>;
    /// Insert or replace; a slug taken by another category is a conflict.
    async fn save_category(&self, category: &Category) -> RepoResult<()>;
    async fn delete_category(&self, tenant_id: TenantId, id: CategoryId) -> RepoResult<bool>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn list_products(&self, tenant_id: TenantId) -> RepoResult<Vec<Product>>;
    async fn get_product(&self, tenant_id: TenantId, id: ProductId) -> RepoResult<Option<Product>>;
    async fn product_by_slug(&self, tenant_id: TenantId, slug: &str) -> RepoResult<Option<Product>>;
    async fn delete_product(&self, tenant_id: TenantId, id: ProductId) -> RepoResult<bool>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Newest first.
    async fn list_orders(&self, tenant_id: TenantId) -> RepoResult<Vec<Order>>;
    async fn get_order(&self, tenant_id: TenantId, id: OrderId) -> RepoResult<Option<Order>>;
    async fn order_by_number(&self, tenant_id: TenantId, number: &OrderNumber) -> RepoResult<Option<Order>>;
    async fn order_by_payment_intent(&self, tenant_id: TenantId, intent_id: &str) -> RepoResult<Option<Order>>;
    /// Newest first.
    async fn orders_for_user(&self, tenant_id: TenantId, user_id: UserId) -> RepoResult<Vec<Order>>;
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn get_cart(&self, tenant_id: TenantId, user_id: UserId) -> RepoResult<Option<Cart>>;
    async fn save_cart(&self, cart: &Cart) -> RepoResult<()>;
    async fn delete_cart(&self, tenant_id: TenantId, user_id: UserId) -> RepoResult<()>;
}

#[async_trait]
pub trait CouponRepository: Send + Sync {
    async fn list_coupons(&self, tenant_id: TenantId) -> RepoResult<Vec<Coupon>>;
    async fn get_coupon(&self, tenant_id: TenantId, id: CouponId) -> RepoResult<Option<Coupon>>;
    /// `code` must already be normalized.
    async fn coupon_by_code(&self, tenant_id: TenantId, code: &str) -> RepoResult<Option<Coupon>>;
    async fn save_coupon(&self, coupon: &Coupon) -> RepoResult<()>;
    async fn delete_coupon(&self, tenant_id: TenantId, id: CouponId) -> RepoResult<bool>;
}

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn list_reviews(&self, tenant_id: TenantId) -> RepoResult<Vec<Review>>;
    async fn reviews_for_product(&self, tenant_id: TenantId, product_id: ProductId) -> RepoResult<Vec<Review>>;
    async fn get_review(&self, tenant_id: TenantId, id: ReviewId) -> RepoResult<Option<Review>>;
    /// A second review by the same user for the same product is a conflict.
    async fn save_review(&self, review: &Review) -> RepoResult<()>;
    async fn delete_review(&self, tenant_id: TenantId, id: ReviewId) -> RepoResult<bool>;
}

#[async_trait]
pub trait TicketRepository: Send + Sync {
    async fn list_tickets(&self, tenant_id: TenantId) -> RepoResult<Vec<SupportTicket>>;
    async fn get_ticket(&self, tenant_id: TenantId, id: TicketId) -> RepoResult<Option<SupportTicket>>;
    async fn save_ticket(&self, ticket: &SupportTicket) -> RepoResult<()>;
}

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Most recently active first.
    async fn list_conversations(&self, tenant_id: TenantId) -> RepoResult<Vec<Conversation>>;
    async fn get_conversation(&self, tenant_id: TenantId, id: ConversationId) -> RepoResult<Option<Conversation>>;
    async fn conversation_by_session(&self, tenant_id: TenantId, session_id: &str)
    -> RepoResult<Option<Conversation>>;
    async fn save_conversation(&self, conversation: &Conversation) -> RepoResult<()>;
}

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn list_profiles(&self, tenant_id: TenantId) -> RepoResult<Vec<CustomerProfile>>;
    async fn get_profile(&self, tenant_id: TenantId, user_id: UserId) -> RepoResult<Option<CustomerProfile>>;
    async fn save_profile(&self, profile: &CustomerProfile) -> RepoResult<()>;

    async fn get_addresses(&self, tenant_id: TenantId, user_id: UserId) -> RepoResult<AddressBook>;
    async fn save_addresses(&self, tenant_id: TenantId, user_id: UserId, book: &AddressBook) -> RepoResult<()>;

    async fn get_preferences(&self, tenant_id: TenantId, user_id: UserId) -> RepoResult<Preferences>;
    async fn save_preferences(&self, tenant_id: TenantId, user_id: UserId, prefs: &Preferences) -> RepoResult<()>;

    async fn get_wishlist(&self, tenant_id: TenantId, user_id: UserId) -> RepoResult<Wishlist>;
    async fn save_wishlist(&self, tenant_id: TenantId, user_id: UserId, wishlist: &Wishlist) -> RepoResult<()>;
}

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get_settings(&self, tenant_id: TenantId) -> RepoResult<SettingsOverrides>;
    async fn save_settings(&self, tenant_id: TenantId, overrides: &SettingsOverrides) -> RepoResult<()>;
}

/// Everything the services need, as one object-safe bundle.
pub trait Store:
    UnitOfWork
    + CategoryRepository
    + ProductRepository
    + OrderRepository
    + CartRepository
    + CouponRepository
    + ReviewRepository
    + TicketRepository
    + ConversationRepository
    + CustomerRepository
    + SettingsRepository
{
}

impl<T> Store for T where
    T: UnitOfWork
        + CategoryRepository
        + ProductRepository
        + OrderRepository
        + CartRepository
        + CouponRepository
        + ReviewRepository
        + TicketRepository
        + ConversationRepository
        + CustomerRepository
        + SettingsRepository
{
}

pub type SharedStore = Arc<dyn Store>;

/// Repository traits, for calling through a [`SharedStore`].
pub mod prelude {
    pub use super::{
        CartRepository, CategoryRepository, ConversationRepository, CouponRepository, CustomerRepository,
        OrderRepository, ProductRepository, ReviewRepository, SettingsRepository, TicketRepository, UnitOfWork,
    };
}

pub(crate) fn require_tenant(tenant_id: Option<TenantId>, what: &str) -> RepoResult<TenantId> {
    tenant_id.ok_or_else(|| crate::error::RepositoryError::Invalid(format!("{what} was never created")))
}

pub(crate) fn check_version(expected: ExpectedVersion, actual: u64, what: &str) -> RepoResult<()> {
    if expected.matches(actual) {
        Ok(())
    } else {
        Err(crate::error::RepositoryError::Conflict(format!(
            "{what} was modified concurrently (expected: {expected:?}, actual: {actual})"
        )))
    }
}
