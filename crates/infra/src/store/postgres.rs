//! Postgres-backed store.
//!
//! Rows carry their lookup keys as columns plus the serialized entity in a
//! JSONB `data` column. Every query filters on `tenant_id`, so cross-tenant
//! access is impossible by construction.
//!
//! Uniqueness (slugs, codes, order numbers, one review per user) is enforced
//! by constraints; violations surface as [`RepositoryError::Conflict`].

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use tracing::instrument;

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
use crate::error::{RepoResult, RepositoryError, map_sqlx_error};
use crate::settings::SettingsOverrides;

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

const KIND_PROFILE: &str = "profile";
const KIND_ADDRESSES: &str = "addresses";
const KIND_PREFERENCES: &str = "preferences";
const KIND_WISHLIST: &str = "wishlist";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> RepoResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the embedded migrations.
    pub async fn migrate(&self) -> RepoResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RepositoryError::Backend(format!("migration failed: {e}")))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_optional<T: DeserializeOwned>(&self, operation: &str, query: PgQuery<'_>) -> RepoResult<Option<T>> {
        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        row.map(|r| decode(operation, &r)).transpose()
    }

    async fn fetch_all<T: DeserializeOwned>(&self, operation: &str, query: PgQuery<'_>) -> RepoResult<Vec<T>> {
        let rows = query.fetch_all(&self.pool).await.map_err(|e| map_sqlx_error(operation, e))?;
        rows.iter().map(|r| decode(operation, r)).collect()
    }

    async fn execute(&self, operation: &str, query: PgQuery<'_>) -> RepoResult<u64> {
        let done = query.execute(&self.pool).await.map_err(|e| map_sqlx_error(operation, e))?;
        Ok(done.rows_affected())
    }

    async fn customer_doc<T: DeserializeOwned + Default>(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        kind: &'static str,
    ) -> RepoResult<T> {
        let query = sqlx::query("SELECT data FROM customer_documents WHERE tenant_id = $1 AND user_id = $2 AND kind = $3")
            .bind(tenant_id.as_uuid())
            .bind(user_id.as_uuid())
            .bind(kind);
        Ok(self.fetch_optional(kind, query).await?.unwrap_or_default())
    }

    async fn put_customer_doc<T: Serialize + Sync>(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        kind: &'static str,
        doc: &T,
    ) -> RepoResult<()> {
        let query = sqlx::query(
            r#"
            INSERT INTO customer_documents (tenant_id, user_id, kind, data)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (tenant_id, user_id, kind)
            DO UPDATE SET data = EXCLUDED.data, updated_at = now()
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(kind)
        .bind(encode(doc)?);
        self.execute(kind, query).await.map(|_| ())
    }
}

fn decode<T: DeserializeOwned>(operation: &str, row: &PgRow) -> RepoResult<T> {
    let data: serde_json::Value = row.try_get("data").map_err(|e| map_sqlx_error(operation, e))?;
    Ok(serde_json::from_value(data)?)
}

fn encode<T: Serialize>(value: &T) -> RepoResult<serde_json::Value> {
    Ok(serde_json::to_value(value)?)
}

fn version_column(version: u64) -> RepoResult<i64> {
    i64::try_from(version).map_err(|_| RepositoryError::Invalid(format!("version {version} out of range")))
}

#[async_trait]
impl UnitOfWork for PostgresStore {
    #[instrument(
        skip_all,
        fields(orders = batch.orders.len(), products = batch.products.len(), coupons = batch.coupons.len()),
        err
    )]
    async fn commit(&self, batch: WriteBatch) -> RepoResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("begin", e))?;

        for (product, expected) in &batch.products {
            let tenant_id = require_tenant(product.tenant_id(), "product")?;
            let current: Option<i64> =
                sqlx::query_scalar("SELECT version FROM products WHERE tenant_id = $1 AND id = $2 FOR UPDATE")
                    .bind(tenant_id.as_uuid())
                    .bind(product.id_typed().as_uuid())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("lock_product", e))?;
            check_version(*expected, current.unwrap_or(0) as u64, "product")?;

            sqlx::query(
                r#"
                INSERT INTO products (tenant_id, id, slug, version, is_active, data)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (tenant_id, id) DO UPDATE SET
                    slug = EXCLUDED.slug,
                    version = EXCLUDED.version,
                    is_active = EXCLUDED.is_active,
                    data = EXCLUDED.data,
                    updated_at = now()
                "#,
            )
            .bind(tenant_id.as_uuid())
            .bind(product.id_typed().as_uuid())
            .bind(product.slug())
            .bind(version_column(product.version())?)
            .bind(product.is_active())
            .bind(encode(product)?)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("save_product", e))?;
        }

        for (order, expected) in &batch.orders {
            let tenant_id = require_tenant(order.tenant_id(), "order")?;
            let number = order
                .order_number()
                .ok_or_else(|| RepositoryError::Invalid("order has no number".to_string()))?;
            let current: Option<i64> =
                sqlx::query_scalar("SELECT version FROM orders WHERE tenant_id = $1 AND id = $2 FOR UPDATE")
                    .bind(tenant_id.as_uuid())
                    .bind(order.id_typed().as_uuid())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("lock_order", e))?;
            check_version(*expected, current.unwrap_or(0) as u64, "order")?;

            sqlx::query(
                r#"
                INSERT INTO orders
                    (tenant_id, id, order_number, user_id, status, version, created_at, payment_intent_id, data)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (tenant_id, id) DO UPDATE SET
                    status = EXCLUDED.status,
                    version = EXCLUDED.version,
                    data = EXCLUDED.data
                "#,
            )
            .bind(tenant_id.as_uuid())
            .bind(order.id_typed().as_uuid())
            .bind(number.as_str())
            .bind(order.user_id().map(|u| *u.as_uuid()))
            .bind(order.status().as_str())
            .bind(version_column(order.version())?)
            .bind(order.created_at().unwrap_or_else(chrono::Utc::now))
            .bind(order.payment_intent_id())
            .bind(encode(order)?)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("save_order", e))?;
        }

        for (coupon, expected) in &batch.coupons {
            let current: Option<i64> = sqlx::query_scalar(
                "SELECT COALESCE((data->>'version')::bigint, 0) FROM coupons WHERE tenant_id = $1 AND id = $2 FOR UPDATE",
            )
            .bind(coupon.tenant_id.as_uuid())
            .bind(coupon.id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_coupon", e))?;
            let current =
                current.ok_or_else(|| RepositoryError::Conflict(format!("coupon '{}' no longer exists", coupon.code)))?;
            check_version(*expected, current as u64, "coupon")?;

            upsert_coupon(coupon)?
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("save_coupon", e))?;
        }

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))
    }
}

fn upsert_coupon(coupon: &Coupon) -> RepoResult<PgQuery<'static>> {
    Ok(sqlx::query(
        r#"
        INSERT INTO coupons (tenant_id, id, code, created_at, data)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (tenant_id, id) DO UPDATE SET code = EXCLUDED.code, data = EXCLUDED.data
        "#,
    )
    .bind(*coupon.tenant_id.as_uuid())
    .bind(*coupon.id.as_uuid())
    .bind(coupon.code.clone())
    .bind(coupon.created_at)
    .bind(encode(coupon)?))
}

#[async_trait]
impl CategoryRepository for PostgresStore {
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn list_categories(&self, tenant_id: TenantId) -> RepoResult<Vec<Category>> {
        let q = sqlx::query("SELECT data FROM categories WHERE tenant_id = $1").bind(tenant_id.as_uuid());
        self.fetch_all("list_categories", q).await
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn get_category(&self, tenant_id: TenantId, id: CategoryId) -> RepoResult<Option<Category>> {
        let q = sqlx::query("SELECT data FROM categories WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid());
        self.fetch_optional("get_category", q).await
    }

    #[instrument(skip_all, fields(tenant_id = %category.tenant_id, slug = %category.slug), err)]
    async fn save_category(&self, category: &Category) -> RepoResult<()> {
        let q = sqlx::query(
            r#"
            INSERT INTO categories (tenant_id, id, slug, data) VALUES ($1, $2, $3, $4)
            ON CONFLICT (tenant_id, id) DO UPDATE SET slug = EXCLUDED.slug, data = EXCLUDED.data, updated_at = now()
            "#,
        )
        .bind(category.tenant_id.as_uuid())
        .bind(category.id.as_uuid())
        .bind(&category.slug)
        .bind(encode(category)?);
        self.execute("save_category", q).await.map(|_| ())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn delete_category(&self, tenant_id: TenantId, id: CategoryId) -> RepoResult<bool> {
        let q = sqlx::query("DELETE FROM categories WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid());
        Ok(self.execute("delete_category", q).await? > 0)
    }
}

#[async_trait]
impl ProductRepository for PostgresStore {
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn list_products(&self, tenant_id: TenantId) -> RepoResult<Vec<Product>> {
        let q = sqlx::query("SELECT data FROM products WHERE tenant_id = $1").bind(tenant_id.as_uuid());
        self.fetch_all("list_products", q).await
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn get_product(&self, tenant_id: TenantId, id: ProductId) -> RepoResult<Option<Product>> {
        let q = sqlx::query("SELECT data FROM products WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid());
        self.fetch_optional("get_product", q).await
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn product_by_slug(&self, tenant_id: TenantId, slug: &str) -> RepoResult<Option<Product>> {
        let q = sqlx::query("SELECT data FROM products WHERE tenant_id = $1 AND slug = $2")
            .bind(tenant_id.as_uuid())
            .bind(slug);
        self.fetch_optional("product_by_slug", q).await
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn delete_product(&self, tenant_id: TenantId, id: ProductId) -> RepoResult<bool> {
        let q = sqlx::query("DELETE FROM products WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid());
        Ok(self.execute("delete_product", q).await? > 0)
    }
}

#[async_trait]
impl OrderRepository for PostgresStore {
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn list_orders(&self, tenant_id: TenantId) -> RepoResult<Vec<Order>> {
        let q = sqlx::query("SELECT data FROM orders WHERE tenant_id = $1 ORDER BY created_at DESC")
            .bind(tenant_id.as_uuid());
        self.fetch_all("list_orders", q).await
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn get_order(&self, tenant_id: TenantId, id: OrderId) -> RepoResult<Option<Order>> {
        let q = sqlx::query("SELECT data FROM orders WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid());
        self.fetch_optional("get_order", q).await
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn order_by_number(&self, tenant_id: TenantId, number: &OrderNumber) -> RepoResult<Option<Order>> {
        let q = sqlx::query("SELECT data FROM orders WHERE tenant_id = $1 AND order_number = $2")
            .bind(tenant_id.as_uuid())
            .bind(number.as_str());
        self.fetch_optional("order_by_number", q).await
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn order_by_payment_intent(&self, tenant_id: TenantId, intent_id: &str) -> RepoResult<Option<Order>> {
        let q = sqlx::query("SELECT data FROM orders WHERE tenant_id = $1 AND payment_intent_id = $2")
            .bind(tenant_id.as_uuid())
            .bind(intent_id);
        self.fetch_optional("order_by_payment_intent", q).await
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, user_id = %user_id), err)]
    async fn orders_for_user(&self, tenant_id: TenantId, user_id: UserId) -> RepoResult<Vec<Order>> {
        let q = sqlx::query("SELECT data FROM orders WHERE tenant_id = $1 AND user_id = $2 ORDER BY created_at DESC")
            .bind(tenant_id.as_uuid())
            .bind(user_id.as_uuid());
        self.fetch_all("orders_for_user", q).await
    }
}

#[async_trait]
impl CartRepository for PostgresStore {
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn get_cart(&self, tenant_id: TenantId, user_id: UserId) -> RepoResult<Option<Cart>> {
        let q = sqlx::query("SELECT data FROM carts WHERE tenant_id = $1 AND user_id = $2")
            .bind(tenant_id.as_uuid())
            .bind(user_id.as_uuid());
        self.fetch_optional("get_cart", q).await
    }

    #[instrument(skip_all, fields(tenant_id = %cart.tenant_id), err)]
    async fn save_cart(&self, cart: &Cart) -> RepoResult<()> {
        let q = sqlx::query(
            r#"
            INSERT INTO carts (tenant_id, user_id, data) VALUES ($1, $2, $3)
            ON CONFLICT (tenant_id, user_id) DO UPDATE SET data = EXCLUDED.data, updated_at = now()
            "#,
        )
        .bind(cart.tenant_id.as_uuid())
        .bind(cart.user_id.as_uuid())
        .bind(encode(cart)?);
        self.execute("save_cart", q).await.map(|_| ())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn delete_cart(&self, tenant_id: TenantId, user_id: UserId) -> RepoResult<()> {
        let q = sqlx::query("DELETE FROM carts WHERE tenant_id = $1 AND user_id = $2")
            .bind(tenant_id.as_uuid())
            .bind(user_id.as_uuid());
        self.execute("delete_cart", q).await.map(|_| ())
    }
}

#[async_trait]
impl CouponRepository for PostgresStore {
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn list_coupons(&self, tenant_id: TenantId) -> RepoResult<Vec<Coupon>> {
        let q = sqlx::query("SELECT data FROM coupons WHERE tenant_id = $1 ORDER BY created_at DESC")
            .bind(tenant_id.as_uuid());
        self.fetch_all("list_coupons", q).await
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn get_coupon(&self, tenant_id: TenantId, id: CouponId) -> RepoResult<Option<Coupon>> {
        let q = sqlx::query("SELECT data FROM coupons WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid());
        self.fetch_optional("get_coupon", q).await
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn coupon_by_code(&self, tenant_id: TenantId, code: &str) -> RepoResult<Option<Coupon>> {
        let q = sqlx::query("SELECT data FROM coupons WHERE tenant_id = $1 AND code = $2")
            .bind(tenant_id.as_uuid())
            .bind(code);
        self.fetch_optional("coupon_by_code", q).await
    }

    #[instrument(skip_all, fields(tenant_id = %coupon.tenant_id, code = %coupon.code), err)]
    async fn save_coupon(&self, coupon: &Coupon) -> RepoResult<()> {
        self.execute("save_coupon", upsert_coupon(coupon)?).await.map(|_| ())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn delete_coupon(&self, tenant_id: TenantId, id: CouponId) -> RepoResult<bool> {
        let q = sqlx::query("DELETE FROM coupons WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid());
        Ok(self.execute("delete_coupon", q).await? > 0)
    }
}

#[async_trait]
impl ReviewRepository for PostgresStore {
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn list_reviews(&self, tenant_id: TenantId) -> RepoResult<Vec<Review>> {
        let q = sqlx::query("SELECT data FROM reviews WHERE tenant_id = $1 ORDER BY created_at DESC")
            .bind(tenant_id.as_uuid());
        self.fetch_all("list_reviews", q).await
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn reviews_for_product(&self, tenant_id: TenantId, product_id: ProductId) -> RepoResult<Vec<Review>> {
        let q = sqlx::query(
            "SELECT data FROM reviews WHERE tenant_id = $1 AND product_id = $2 ORDER BY created_at DESC",
        )
        .bind(tenant_id.as_uuid())
        .bind(product_id.as_uuid());
        self.fetch_all("reviews_for_product", q).await
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn get_review(&self, tenant_id: TenantId, id: ReviewId) -> RepoResult<Option<Review>> {
        let q = sqlx::query("SELECT data FROM reviews WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid());
        self.fetch_optional("get_review", q).await
    }

    #[instrument(skip_all, fields(tenant_id = %review.tenant_id), err)]
    async fn save_review(&self, review: &Review) -> RepoResult<()> {
        let q = sqlx::query(
            r#"
            INSERT INTO reviews (tenant_id, id, product_id, user_id, created_at, data)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (tenant_id, id) DO UPDATE SET data = EXCLUDED.data
            "#,
        )
        .bind(review.tenant_id.as_uuid())
        .bind(review.id.as_uuid())
        .bind(review.product_id.as_uuid())
        .bind(review.user_id.as_uuid())
        .bind(review.created_at)
        .bind(encode(review)?);
        self.execute("save_review", q).await.map(|_| ())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn delete_review(&self, tenant_id: TenantId, id: ReviewId) -> RepoResult<bool> {
        let q = sqlx::query("DELETE FROM reviews WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid());
        Ok(self.execute("delete_review", q).await? > 0)
    }
}

#[async_trait]
impl TicketRepository for PostgresStore {
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn list_tickets(&self, tenant_id: TenantId) -> RepoResult<Vec<SupportTicket>> {
        let q = sqlx::query("SELECT data FROM support_tickets WHERE tenant_id = $1 ORDER BY created_at DESC")
            .bind(tenant_id.as_uuid());
        self.fetch_all("list_tickets", q).await
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn get_ticket(&self, tenant_id: TenantId, id: TicketId) -> RepoResult<Option<SupportTicket>> {
        let q = sqlx::query("SELECT data FROM support_tickets WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid());
        self.fetch_optional("get_ticket", q).await
    }

    #[instrument(skip_all, fields(tenant_id = %ticket.tenant_id, ticket = %ticket.ticket_number), err)]
    async fn save_ticket(&self, ticket: &SupportTicket) -> RepoResult<()> {
        let q = sqlx::query(
            r#"
            INSERT INTO support_tickets (tenant_id, id, ticket_number, created_at, data)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (tenant_id, id) DO UPDATE SET data = EXCLUDED.data
            "#,
        )
        .bind(ticket.tenant_id.as_uuid())
        .bind(ticket.id.as_uuid())
        .bind(ticket.ticket_number.as_str())
        .bind(ticket.created_at)
        .bind(encode(ticket)?);
        self.execute("save_ticket", q).await.map(|_| ())
    }
}

#[async_trait]
impl ConversationRepository for PostgresStore {
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn list_conversations(&self, tenant_id: TenantId) -> RepoResult<Vec<Conversation>> {
        let q = sqlx::query("SELECT data FROM conversations WHERE tenant_id = $1 ORDER BY last_message_at DESC")
            .bind(tenant_id.as_uuid());
        self.fetch_all("list_conversations", q).await
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn get_conversation(&self, tenant_id: TenantId, id: ConversationId) -> RepoResult<Option<Conversation>> {
        let q = sqlx::query("SELECT data FROM conversations WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid());
        self.fetch_optional("get_conversation", q).await
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn conversation_by_session(
        &self,
        tenant_id: TenantId,
        session_id: &str,
    ) -> RepoResult<Option<Conversation>> {
        let q = sqlx::query("SELECT data FROM conversations WHERE tenant_id = $1 AND session_id = $2")
            .bind(tenant_id.as_uuid())
            .bind(session_id);
        self.fetch_optional("conversation_by_session", q).await
    }

    #[instrument(skip_all, fields(tenant_id = %conversation.tenant_id), err)]
    async fn save_conversation(&self, conversation: &Conversation) -> RepoResult<()> {
        let q = sqlx::query(
            r#"
            INSERT INTO conversations (tenant_id, id, session_id, last_message_at, data)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (tenant_id, id) DO UPDATE SET
                last_message_at = EXCLUDED.last_message_at,
                data = EXCLUDED.data
            "#,
        )
        .bind(conversation.tenant_id.as_uuid())
        .bind(conversation.id.as_uuid())
        .bind(&conversation.session_id)
        .bind(conversation.last_message_at)
        .bind(encode(conversation)?);
        self.execute("save_conversation", q).await.map(|_| ())
    }
}

#[async_trait]
impl CustomerRepository for PostgresStore {
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn list_profiles(&self, tenant_id: TenantId) -> RepoResult<Vec<CustomerProfile>> {
        let q = sqlx::query(
            "SELECT data FROM customer_documents WHERE tenant_id = $1 AND kind = $2 ORDER BY created_at DESC",
        )
        .bind(tenant_id.as_uuid())
        .bind(KIND_PROFILE);
        self.fetch_all("list_profiles", q).await
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn get_profile(&self, tenant_id: TenantId, user_id: UserId) -> RepoResult<Option<CustomerProfile>> {
        let q = sqlx::query("SELECT data FROM customer_documents WHERE tenant_id = $1 AND user_id = $2 AND kind = $3")
            .bind(tenant_id.as_uuid())
            .bind(user_id.as_uuid())
            .bind(KIND_PROFILE);
        self.fetch_optional("get_profile", q).await
    }

    #[instrument(skip_all, fields(tenant_id = %profile.tenant_id), err)]
    async fn save_profile(&self, profile: &CustomerProfile) -> RepoResult<()> {
        self.put_customer_doc(profile.tenant_id, profile.user_id, KIND_PROFILE, profile).await
    }

    async fn get_addresses(&self, tenant_id: TenantId, user_id: UserId) -> RepoResult<AddressBook> {
        self.customer_doc(tenant_id, user_id, KIND_ADDRESSES).await
    }

    async fn save_addresses(&self, tenant_id: TenantId, user_id: UserId, book: &AddressBook) -> RepoResult<()> {
        self.put_customer_doc(tenant_id, user_id, KIND_ADDRESSES, book).await
    }

    async fn get_preferences(&self, tenant_id: TenantId, user_id: UserId) -> RepoResult<Preferences> {
        self.customer_doc(tenant_id, user_id, KIND_PREFERENCES).await
    }

    async fn save_preferences(&self, tenant_id: TenantId, user_id: UserId, prefs: &Preferences) -> RepoResult<()> {
        self.put_customer_doc(tenant_id, user_id, KIND_PREFERENCES, prefs).await
    }

    async fn get_wishlist(&self, tenant_id: TenantId, user_id: UserId) -> RepoResult<Wishlist> {
        self.customer_doc(tenant_id, user_id, KIND_WISHLIST).await
    }

    async fn save_wishlist(&self, tenant_id: TenantId, user_id: UserId, wishlist: &Wishlist) -> RepoResult<()> {
        self.put_customer_doc(tenant_id, user_id, KIND_WISHLIST, wishlist).await
    }
}

#[async_trait]
impl SettingsRepository for PostgresStore {
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn get_settings(&self, tenant_id: TenantId) -> RepoResult<SettingsOverrides> {
        let q = sqlx::query("SELECT data FROM store_settings WHERE tenant_id = $1").bind(tenant_id.as_uuid());
        Ok(self.fetch_optional("get_settings", q).await?.unwrap_or_default())
    }

    #[instrument(skip(self, overrides), fields(tenant_id = %tenant_id), err)]
    async fn save_settings(&self, tenant_id: TenantId, overrides: &SettingsOverrides) -> RepoResult<()> {
        let q = sqlx::query(
            r#"
            INSERT INTO store_settings (tenant_id, data) VALUES ($1, $2)
            ON CONFLICT (tenant_id) DO UPDATE SET data = EXCLUDED.data, updated_at = now()
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(encode(overrides)?);
        self.execute("save_settings", q).await.map(|_| ())
    }
}
