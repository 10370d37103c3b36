//! Infrastructure layer: configuration, storage, services and third-party
//! integrations.
//!
//! Domain crates stay pure; everything that touches a database, the network
//! or the clock-driven side effects of an order lives here.

pub mod catalog_admin;
pub mod checkout;
pub mod config;
pub mod customers;
pub mod error;
pub mod integrations;
pub mod invoice;
pub mod order_admin;
pub mod publish;
pub mod services;
pub mod settings;
pub mod store;
pub mod tool_backend;
pub mod workers;

pub use catalog_admin::CatalogAdminService;
pub use checkout::{CheckoutError, CheckoutItem, CheckoutRequest, CheckoutService, PlacedOrder};
pub use config::{AppConfig, BrandConfig, ConfigError, StorageConfig};
pub use error::{IntegrationError, RepoResult, RepositoryError};
pub use invoice::render_invoice;
pub use order_admin::OrderAdminService;
pub use publish::{JsonEnvelope, SharedBus};
pub use services::{Assistant, Integrations, Services};
pub use settings::{SettingsOverrides, StoreSettings};
pub use store::{InMemoryStore, PostgresStore, SharedStore, Store, WriteBatch};
pub use tool_backend::{StoreToolBackend, order_snapshot, prompt_catalog};
pub use workers::{EventWorker, Notifier, NotifyError, WorkerHandle};
