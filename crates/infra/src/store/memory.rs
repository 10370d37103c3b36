//! In-memory store for tests and single-process dev runs.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use storefront_catalog::{Category, CategoryId, Product, ProductId, Review, ReviewId};
use storefront_core::{AggregateRoot, TenantId, UserId};
use storefront_sales::{Cart, Coupon, CouponId, Order, OrderId, OrderNumber};
use storefront_support::{Conversation, ConversationId, SupportTicket, TicketId};

use super::{
    CartRepository, CategoryRepository, ConversationRepository, CouponRepository, CustomerRepository,
    OrderRepository, ProductRepository, ReviewRepository, SettingsRepository, TicketRepository, UnitOfWork,
    WriteBatch, check_version, require_tenant,
};
use crate::customers::{AddressBook, CustomerProfile, Preferences, Wishlist};
use crate::error::{RepoResult, RepositoryError};
use crate::settings::SettingsOverrides;

fn poisoned() -> RepositoryError {
    RepositoryError::Backend("in-memory store lock poisoned".to_string())
}

/// Tenant-isolated key/value table.
#[derive(Debug)]
struct TenantTable<K, V> {
    inner: RwLock<HashMap<(TenantId, K), V>>,
}

impl<K, V> Default for TenantTable<K, V> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> TenantTable<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    fn read(&self) -> RepoResult<RwLockReadGuard<'_, HashMap<(TenantId, K), V>>> {
        self.inner.read().map_err(|_| poisoned())
    }

    fn write(&self) -> RepoResult<RwLockWriteGuard<'_, HashMap<(TenantId, K), V>>> {
        self.inner.write().map_err(|_| poisoned())
    }

    fn get(&self, tenant_id: TenantId, key: &K) -> RepoResult<Option<V>> {
        Ok(self.read()?.get(&(tenant_id, key.clone())).cloned())
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) -> RepoResult<()> {
        self.write()?.insert((tenant_id, key), value);
        Ok(())
    }

    fn remove(&self, tenant_id: TenantId, key: &K) -> RepoResult<bool> {
        Ok(self.write()?.remove(&(tenant_id, key.clone())).is_some())
    }

    fn list(&self, tenant_id: TenantId) -> RepoResult<Vec<V>> {
        Ok(self
            .read()?
            .iter()
            .filter_map(|((t, _), v)| (*t == tenant_id).then(|| v.clone()))
            .collect())
    }

    fn find(&self, tenant_id: TenantId, pred: impl Fn(&V) -> bool) -> RepoResult<Option<V>> {
        Ok(self
            .read()?
            .iter()
            .find(|((t, _), v)| *t == tenant_id && pred(v))
            .map(|(_, v)| v.clone()))
    }

    /// Insert unless another key of the tenant already holds a clashing value.
    fn upsert_unique(
        &self,
        tenant_id: TenantId,
        key: K,
        value: V,
        clashes: impl Fn(&V) -> bool,
        what: &str,
    ) -> RepoResult<()> {
        let mut map = self.write()?;
        let taken = map.iter().any(|((t, k), v)| *t == tenant_id && *k != key && clashes(v));
        if taken {
            return Err(RepositoryError::Conflict(format!("{what} already exists")));
        }
        map.insert((tenant_id, key), value);
        Ok(())
    }
}

/// Tables written by [`UnitOfWork::commit`], kept under one lock so a batch
/// is observed all at once.
#[derive(Debug, Default)]
struct Ledger {
    products: HashMap<(TenantId, ProductId), Product>,
    orders: HashMap<(TenantId, OrderId), Order>,
    coupons: HashMap<(TenantId, CouponId), Coupon>,
}

impl Ledger {
    fn check_batch(&self, batch: &WriteBatch) -> RepoResult<()> {
        for (product, expected) in &batch.products {
            let tenant_id = require_tenant(product.tenant_id(), "product")?;
            let current = self.products.get(&(tenant_id, product.id_typed()));
            check_version(*expected, current.map_or(0, |p| p.version()), "product")?;
            let slug_taken = self.products.iter().any(|((t, id), p)| {
                *t == tenant_id && *id != product.id_typed() && p.slug() == product.slug()
            });
            if slug_taken {
                return Err(RepositoryError::Conflict(format!("product slug '{}' already exists", product.slug())));
            }
        }

        for (order, expected) in &batch.orders {
            let tenant_id = require_tenant(order.tenant_id(), "order")?;
            let current = self.orders.get(&(tenant_id, order.id_typed()));
            check_version(*expected, current.map_or(0, |o| o.version()), "order")?;
            let number_taken = self.orders.iter().any(|((t, id), o)| {
                *t == tenant_id && *id != order.id_typed() && o.order_number() == order.order_number()
            });
            if number_taken {
                return Err(RepositoryError::Conflict("order number already exists".to_string()));
            }
            if let Some(intent) = order.payment_intent_id() {
                let intent_taken = self.orders.iter().any(|((t, id), o)| {
                    *t == tenant_id && *id != order.id_typed() && o.payment_intent_id() == Some(intent)
                });
                if intent_taken {
                    return Err(RepositoryError::Conflict("payment intent already paid for an order".to_string()));
                }
            }
        }

        for (coupon, expected) in &batch.coupons {
            let stored = self
                .coupons
                .get(&(coupon.tenant_id, coupon.id))
                .ok_or_else(|| RepositoryError::Conflict(format!("coupon '{}' no longer exists", coupon.code)))?;
            check_version(*expected, stored.version, "coupon")?;
            self.check_coupon(coupon)?;
        }
        Ok(())
    }

    fn check_coupon(&self, coupon: &Coupon) -> RepoResult<()> {
        let taken = self
            .coupons
            .iter()
            .any(|((t, id), c)| *t == coupon.tenant_id && *id != coupon.id && c.code == coupon.code);
        if taken {
            return Err(RepositoryError::Conflict(format!("coupon code '{}' already exists", coupon.code)));
        }
        Ok(())
    }
}

fn newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
}

/// Process-local store implementing every repository.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    ledger: RwLock<Ledger>,
    categories: TenantTable<CategoryId, Category>,
    carts: TenantTable<UserId, Cart>,
    reviews: TenantTable<ReviewId, Review>,
    tickets: TenantTable<TicketId, SupportTicket>,
    conversations: TenantTable<ConversationId, Conversation>,
    profiles: TenantTable<UserId, CustomerProfile>,
    addresses: TenantTable<UserId, AddressBook>,
    preferences: TenantTable<UserId, Preferences>,
    wishlists: TenantTable<UserId, Wishlist>,
    settings: TenantTable<(), SettingsOverrides>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ledger(&self) -> RepoResult<RwLockReadGuard<'_, Ledger>> {
        self.ledger.read().map_err(|_| poisoned())
    }

    fn ledger_mut(&self) -> RepoResult<RwLockWriteGuard<'_, Ledger>> {
        self.ledger.write().map_err(|_| poisoned())
    }
}

#[async_trait]
impl UnitOfWork for InMemoryStore {
    async fn commit(&self, batch: WriteBatch) -> RepoResult<()> {
        let mut ledger = self.ledger_mut()?;
        ledger.check_batch(&batch)?;

        for (product, _) in batch.products {
            let tenant_id = require_tenant(product.tenant_id(), "product")?;
            ledger.products.insert((tenant_id, product.id_typed()), product);
        }
        for (order, _) in batch.orders {
            let tenant_id = require_tenant(order.tenant_id(), "order")?;
            ledger.orders.insert((tenant_id, order.id_typed()), order);
        }
        for (coupon, _) in batch.coupons {
            ledger.coupons.insert((coupon.tenant_id, coupon.id), coupon);
        }
        Ok(())
    }
}

#[async_trait]
impl CategoryRepository for InMemoryStore {
    async fn list_categories(&self, tenant_id: TenantId) -> RepoResult<Vec<Category>> {
        self.categories.list(tenant_id)
    }

    async fn get_category(&self, tenant_id: TenantId, id: CategoryId) -> RepoResult<Option<Category>> {
        self.categories.get(tenant_id, &id)
    }

    async fn save_category(&self, category: &Category) -> RepoResult<()> {
        self.categories.upsert_unique(
            category.tenant_id,
            category.id,
            category.clone(),
            |c| c.slug == category.slug,
            "category slug",
        )
    }

    async fn delete_category(&self, tenant_id: TenantId, id: CategoryId) -> RepoResult<bool> {
        self.categories.remove(tenant_id, &id)
    }
}

#[async_trait]
impl ProductRepository for InMemoryStore {
    async fn list_products(&self, tenant_id: TenantId) -> RepoResult<Vec<Product>> {
        Ok(self
            .ledger()?
            .products
            .iter()
            .filter_map(|((t, _), p)| (*t == tenant_id).then(|| p.clone()))
            .collect())
    }

    async fn get_product(&self, tenant_id: TenantId, id: ProductId) -> RepoResult<Option<Product>> {
        Ok(self.ledger()?.products.get(&(tenant_id, id)).cloned())
    }

    async fn product_by_slug(&self, tenant_id: TenantId, slug: &str) -> RepoResult<Option<Product>> {
        Ok(self
            .ledger()?
            .products
            .iter()
            .find(|((t, _), p)| *t == tenant_id && p.slug() == slug)
            .map(|(_, p)| p.clone()))
    }

    async fn delete_product(&self, tenant_id: TenantId, id: ProductId) -> RepoResult<bool> {
        Ok(self.ledger_mut()?.products.remove(&(tenant_id, id)).is_some())
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn list_orders(&self, tenant_id: TenantId) -> RepoResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .ledger()?
            .orders
            .iter()
            .filter_map(|((t, _), o)| (*t == tenant_id).then(|| o.clone()))
            .collect();
        newest_first(&mut orders);
        Ok(orders)
    }

    async fn get_order(&self, tenant_id: TenantId, id: OrderId) -> RepoResult<Option<Order>> {
        Ok(self.ledger()?.orders.get(&(tenant_id, id)).cloned())
    }

    async fn order_by_number(&self, tenant_id: TenantId, number: &OrderNumber) -> RepoResult<Option<Order>> {
        Ok(self
            .ledger()?
            .orders
            .iter()
            .find(|((t, _), o)| *t == tenant_id && o.order_number() == Some(number))
            .map(|(_, o)| o.clone()))
    }

    async fn order_by_payment_intent(&self, tenant_id: TenantId, intent_id: &str) -> RepoResult<Option<Order>> {
        Ok(self
            .ledger()?
            .orders
            .iter()
            .find(|((t, _), o)| *t == tenant_id && o.payment_intent_id() == Some(intent_id))
            .map(|(_, o)| o.clone()))
    }

    async fn orders_for_user(&self, tenant_id: TenantId, user_id: UserId) -> RepoResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .ledger()?
            .orders
            .iter()
            .filter_map(|((t, _), o)| (*t == tenant_id && o.user_id() == Some(user_id)).then(|| o.clone()))
            .collect();
        newest_first(&mut orders);
        Ok(orders)
    }
}

#[async_trait]
impl CartRepository for InMemoryStore {
    async fn get_cart(&self, tenant_id: TenantId, user_id: UserId) -> RepoResult<Option<Cart>> {
        self.carts.get(tenant_id, &user_id)
    }

    async fn save_cart(&self, cart: &Cart) -> RepoResult<()> {
        self.carts.upsert(cart.tenant_id, cart.user_id, cart.clone())
    }

    async fn delete_cart(&self, tenant_id: TenantId, user_id: UserId) -> RepoResult<()> {
        self.carts.remove(tenant_id, &user_id).map(|_| ())
    }
}

#[async_trait]
impl CouponRepository for InMemoryStore {
    async fn list_coupons(&self, tenant_id: TenantId) -> RepoResult<Vec<Coupon>> {
        let mut coupons: Vec<Coupon> = self
            .ledger()?
            .coupons
            .iter()
            .filter_map(|((t, _), c)| (*t == tenant_id).then(|| c.clone()))
            .collect();
        coupons.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(coupons)
    }

    async fn get_coupon(&self, tenant_id: TenantId, id: CouponId) -> RepoResult<Option<Coupon>> {
        Ok(self.ledger()?.coupons.get(&(tenant_id, id)).cloned())
    }

    async fn coupon_by_code(&self, tenant_id: TenantId, code: &str) -> RepoResult<Option<Coupon>> {
        Ok(self
            .ledger()?
            .coupons
            .values()
            .find(|c| c.tenant_id == tenant_id && c.code == code)
            .cloned())
    }

    async fn save_coupon(&self, coupon: &Coupon) -> RepoResult<()> {
        let mut ledger = self.ledger_mut()?;
        ledger.check_coupon(coupon)?;
        ledger.coupons.insert((coupon.tenant_id, coupon.id), coupon.clone());
        Ok(())
    }

    async fn delete_coupon(&self, tenant_id: TenantId, id: CouponId) -> RepoResult<bool> {
        Ok(self.ledger_mut()?.coupons.remove(&(tenant_id, id)).is_some())
    }
}

#[async_trait]
impl ReviewRepository for InMemoryStore {
    async fn list_reviews(&self, tenant_id: TenantId) -> RepoResult<Vec<Review>> {
        let mut reviews = self.reviews.list(tenant_id)?;
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }

    async fn reviews_for_product(&self, tenant_id: TenantId, product_id: ProductId) -> RepoResult<Vec<Review>> {
        let mut reviews = self.list_reviews(tenant_id).await?;
        reviews.retain(|r| r.product_id == product_id);
        Ok(reviews)
    }

    async fn get_review(&self, tenant_id: TenantId, id: ReviewId) -> RepoResult<Option<Review>> {
        self.reviews.get(tenant_id, &id)
    }

    async fn save_review(&self, review: &Review) -> RepoResult<()> {
        self.reviews.upsert_unique(
            review.tenant_id,
            review.id,
            review.clone(),
            |r| r.product_id == review.product_id && r.user_id == review.user_id,
            "review for this product",
        )
    }

    async fn delete_review(&self, tenant_id: TenantId, id: ReviewId) -> RepoResult<bool> {
        self.reviews.remove(tenant_id, &id)
    }
}

#[async_trait]
impl TicketRepository for InMemoryStore {
    async fn list_tickets(&self, tenant_id: TenantId) -> RepoResult<Vec<SupportTicket>> {
        let mut tickets = self.tickets.list(tenant_id)?;
        tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tickets)
    }

    async fn get_ticket(&self, tenant_id: TenantId, id: TicketId) -> RepoResult<Option<SupportTicket>> {
        self.tickets.get(tenant_id, &id)
    }

    async fn save_ticket(&self, ticket: &SupportTicket) -> RepoResult<()> {
        self.tickets.upsert(ticket.tenant_id, ticket.id, ticket.clone())
    }
}

#[async_trait]
impl ConversationRepository for InMemoryStore {
    async fn list_conversations(&self, tenant_id: TenantId) -> RepoResult<Vec<Conversation>> {
        let mut convs = self.conversations.list(tenant_id)?;
        convs.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        Ok(convs)
    }

    async fn get_conversation(&self, tenant_id: TenantId, id: ConversationId) -> RepoResult<Option<Conversation>> {
        self.conversations.get(tenant_id, &id)
    }

    async fn conversation_by_session(
        &self,
        tenant_id: TenantId,
        session_id: &str,
    ) -> RepoResult<Option<Conversation>> {
        self.conversations.find(tenant_id, |c| c.session_id == session_id)
    }

    async fn save_conversation(&self, conversation: &Conversation) -> RepoResult<()> {
        self.conversations.upsert_unique(
            conversation.tenant_id,
            conversation.id,
            conversation.clone(),
            |c| c.session_id == conversation.session_id,
            "conversation for this session",
        )
    }
}

#[async_trait]
impl CustomerRepository for InMemoryStore {
    async fn list_profiles(&self, tenant_id: TenantId) -> RepoResult<Vec<CustomerProfile>> {
        let mut profiles = self.profiles.list(tenant_id)?;
        profiles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(profiles)
    }

    async fn get_profile(&self, tenant_id: TenantId, user_id: UserId) -> RepoResult<Option<CustomerProfile>> {
        self.profiles.get(tenant_id, &user_id)
    }

    async fn save_profile(&self, profile: &CustomerProfile) -> RepoResult<()> {
        self.profiles.upsert(profile.tenant_id, profile.user_id, profile.clone())
    }

    async fn get_addresses(&self, tenant_id: TenantId, user_id: UserId) -> RepoResult<AddressBook> {
        Ok(self.addresses.get(tenant_id, &user_id)?.unwrap_or_default())
    }

    async fn save_addresses(&self, tenant_id: TenantId, user_id: UserId, book: &AddressBook) -> RepoResult<()> {
        self.addresses.upsert(tenant_id, user_id, book.clone())
    }

    async fn get_preferences(&self, tenant_id: TenantId, user_id: UserId) -> RepoResult<Preferences> {
        Ok(self.preferences.get(tenant_id, &user_id)?.unwrap_or_default())
    }

    async fn save_preferences(&self, tenant_id: TenantId, user_id: UserId, prefs: &Preferences) -> RepoResult<()> {
        self.preferences.upsert(tenant_id, user_id, prefs.clone())
    }

    async fn get_wishlist(&self, tenant_id: TenantId, user_id: UserId) -> RepoResult<Wishlist> {
        Ok(self.wishlists.get(tenant_id, &user_id)?.unwrap_or_default())
    }

    async fn save_wishlist(&self, tenant_id: TenantId, user_id: UserId, wishlist: &Wishlist) -> RepoResult<()> {
        self.wishlists.upsert(tenant_id, user_id, wishlist.clone())
    }
}

#[async_trait]
impl SettingsRepository for InMemoryStore {
    async fn get_settings(&self, tenant_id: TenantId) -> RepoResult<SettingsOverrides> {
        Ok(self.settings.get(tenant_id, &())?.unwrap_or_default())
    }

    async fn save_settings(&self, tenant_id: TenantId, overrides: &SettingsOverrides) -> RepoResult<()> {
        self.settings.upsert(tenant_id, (), overrides.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use storefront_catalog::{CategoryDraft, CreateProduct, ProductCommand, ProductDetails, ReserveStock};
    use storefront_core::{Aggregate, ExpectedVersion, Money};

    fn product(tenant_id: TenantId, name: &str, qty: i64) -> Product {
        let id = ProductId::generate();
        let mut p = Product::empty(id);
        p.execute(&ProductCommand::CreateProduct(CreateProduct {
            tenant_id,
            product_id: id,
            details: ProductDetails::new(name, Money::from_major(100)),
            quantity: qty,
            is_active: true,
            occurred_at: Utc::now(),
        }))
        .unwrap();
        p
    }

    #[tokio::test]
    async fn tenants_do_not_see_each_other() {
        let store = InMemoryStore::new();
        let (a, b) = (TenantId::new(), TenantId::new());
        let p = product(a, "Beef Tehari", 3);
        store.commit(WriteBatch::new().product(p.clone(), ExpectedVersion::Exact(0))).await.unwrap();

        assert_eq!(store.list_products(a).await.unwrap().len(), 1);
        assert!(store.list_products(b).await.unwrap().is_empty());
        assert!(store.get_product(b, p.id_typed()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stale_product_version_rejects_the_whole_batch() {
        let store = InMemoryStore::new();
        let t = TenantId::new();
        let original = product(t, "Chicken Roast", 5);
        store.commit(WriteBatch::new().product(original.clone(), ExpectedVersion::Exact(0))).await.unwrap();

        let mut reserved = original.clone();
        reserved
            .execute(&ProductCommand::ReserveStock(ReserveStock {
                tenant_id: t,
                product_id: original.id_typed(),
                quantity: 2,
                occurred_at: Utc::now(),
            }))
            .unwrap();

        let other = product(t, "Borhani", 10);
        let err = store
            .commit(
                WriteBatch::new()
                    .product(other.clone(), ExpectedVersion::Exact(0))
                    .product(reserved, ExpectedVersion::Exact(original.version() + 7)),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert!(store.get_product(t, other.id_typed()).await.unwrap().is_none());
        assert_eq!(store.get_product(t, original.id_typed()).await.unwrap().unwrap().quantity(), 5);
    }

    #[tokio::test]
    async fn duplicate_slugs_conflict() {
        let store = InMemoryStore::new();
        let t = TenantId::new();
        store
            .commit(WriteBatch::new().product(product(t, "Firni", 1), ExpectedVersion::Exact(0)))
            .await
            .unwrap();
        let err = store
            .commit(WriteBatch::new().product(product(t, "Firni", 1), ExpectedVersion::Exact(0)))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let draft = |name: &str| CategoryDraft {
            name: name.to_string(),
            ..Default::default()
        };
        let c1 = Category::create(t, draft("Desserts"), Utc::now()).unwrap();
        let c2 = Category::create(t, draft("Desserts"), Utc::now()).unwrap();
        store.save_category(&c1).await.unwrap();
        assert!(matches!(store.save_category(&c2).await, Err(RepositoryError::Conflict(_))));
        // Re-saving the same category is an update, not a clash.
        store.save_category(&c1).await.unwrap();
    }

    #[tokio::test]
    async fn unsaved_documents_fall_back_to_defaults() {
        let store = InMemoryStore::new();
        let (t, u) = (TenantId::new(), UserId::new());
        assert_eq!(store.get_preferences(t, u).await.unwrap(), Preferences::default());
        assert!(store.get_addresses(t, u).await.unwrap().addresses().is_empty());
        assert_eq!(store.get_settings(t).await.unwrap(), SettingsOverrides::default());
    }
}
