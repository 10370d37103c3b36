use axum::{Router, middleware::from_fn, routing::get};

use crate::middleware::require_principal;

pub mod account;
pub mod admin;
pub mod admin_catalog;
pub mod admin_orders;
pub mod admin_support;
pub mod analytics;
pub mod cart;
pub mod catalog;
pub mod chat;
pub mod common;
pub mod coupons;
pub mod orders;
pub mod payments;
pub mod system;

/// Router for every tenant-scoped endpoint.
///
/// Storefront routes accept anonymous callers; `/me` and `/admin` require a
/// verified token, and admin handlers check permissions on top.
pub fn router() -> Router {
    let me = Router::new()
        .route("/", get(system::whoami))
        .nest("/cart", cart::router())
        .merge(orders::me_router())
        .merge(account::router())
        .merge(catalog::me_router())
        .route_layer(from_fn(require_principal));

    Router::new()
        .merge(catalog::router())
        .merge(orders::router())
        .nest("/coupons", coupons::router())
        .nest("/chat", chat::router())
        .nest("/payments", payments::router())
        .nest("/analytics", analytics::router())
        .nest("/me", me)
        .nest("/admin", admin::router().route_layer(from_fn(require_principal)))
}
