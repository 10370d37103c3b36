//! Composition root: turns an [`AppConfig`] into the services the API uses.

use std::io;
use std::sync::Arc;

use tokio::runtime::Handle;

use storefront_ai::{ChatAssistant, LlmClient, StoreProfile};
use storefront_events::InMemoryEventBus;

use crate::catalog_admin::CatalogAdminService;
use crate::checkout::CheckoutService;
use crate::config::{AppConfig, StorageConfig};
use crate::error::RepoResult;
use crate::integrations::{
    ConversionTracker, DisabledGateway, DisabledLlm, DisabledMailer, FacebookCapi, Mailer, NoopTracker,
    OpenRouterClient, PaymentGateway, ResendMailer, StripeGateway,
};
use crate::order_admin::OrderAdminService;
use crate::publish::SharedBus;
use crate::store::{InMemoryStore, PostgresStore, SharedStore};
use crate::tool_backend::StoreToolBackend;
use crate::workers::{Notifier, WorkerHandle};

pub type Assistant = ChatAssistant<dyn LlmClient, StoreToolBackend>;

/// Outbound providers. Missing credentials select the disabled variant.
#[derive(Clone)]
pub struct Integrations {
    pub mailer: Arc<dyn Mailer>,
    pub tracker: Arc<dyn ConversionTracker>,
    pub payments: Arc<dyn PaymentGateway>,
    pub llm: Arc<dyn LlmClient>,
}

impl Integrations {
    pub fn from_config(config: &AppConfig) -> Self {
        let mailer: Arc<dyn Mailer> = match &config.resend {
            Some(resend) => Arc::new(ResendMailer::new(resend)),
            None => {
                tracing::warn!("RESEND_API_KEY not set; order emails are disabled");
                Arc::new(DisabledMailer)
            }
        };
        let tracker: Arc<dyn ConversionTracker> = match &config.facebook {
            Some(facebook) => Arc::new(FacebookCapi::new(facebook)),
            None => Arc::new(NoopTracker),
        };
        let payments: Arc<dyn PaymentGateway> = match &config.stripe {
            Some(stripe) => Arc::new(StripeGateway::new(stripe)),
            None => {
                tracing::warn!("STRIPE_SECRET_KEY not set; card payments are disabled");
                Arc::new(DisabledGateway)
            }
        };
        let llm: Arc<dyn LlmClient> = match &config.openrouter {
            Some(openrouter) => Arc::new(OpenRouterClient::new(openrouter).with_referer(config.brand.url.clone())),
            None => Arc::new(DisabledLlm),
        };
        Self {
            mailer,
            tracker,
            payments,
            llm,
        }
    }

    /// Every provider disabled.
    pub fn disabled() -> Self {
        Self {
            mailer: Arc::new(DisabledMailer),
            tracker: Arc::new(NoopTracker),
            payments: Arc::new(DisabledGateway),
            llm: Arc::new(DisabledLlm),
        }
    }
}

#[derive(Clone)]
pub struct Services {
    pub config: Arc<AppConfig>,
    pub store: SharedStore,
    pub bus: SharedBus,
    pub integrations: Integrations,
    pub checkout: Arc<CheckoutService>,
    pub catalog: Arc<CatalogAdminService>,
    pub orders: Arc<OrderAdminService>,
    pub tools: Arc<StoreToolBackend>,
}

impl Services {
    /// Open the configured store (running migrations for Postgres) and wire
    /// the live integrations.
    pub async fn from_config(config: AppConfig) -> RepoResult<Self> {
        let store: SharedStore = match &config.storage {
            StorageConfig::InMemory => {
                tracing::info!("using in-memory store");
                Arc::new(InMemoryStore::new())
            }
            StorageConfig::Postgres { url, max_connections } => {
                let pg = PostgresStore::connect(url, *max_connections).await?;
                pg.migrate().await?;
                tracing::info!(max_connections, "connected to postgres");
                Arc::new(pg)
            }
        };
        let integrations = Integrations::from_config(&config);
        Ok(Self::assemble(config, store, integrations))
    }

    pub fn assemble(config: AppConfig, store: SharedStore, integrations: Integrations) -> Self {
        let bus: SharedBus = Arc::new(InMemoryEventBus::new());
        let checkout = CheckoutService::new(
            store.clone(),
            bus.clone(),
            integrations.payments.clone(),
            config.brand.clone(),
        );
        let orders = OrderAdminService::new(store.clone(), bus.clone());
        Self {
            checkout: Arc::new(checkout),
            catalog: Arc::new(CatalogAdminService::new(store.clone(), bus.clone())),
            orders: Arc::new(orders),
            tools: Arc::new(StoreToolBackend::new(store.clone())),
            config: Arc::new(config),
            store,
            bus,
            integrations,
        }
    }

    /// Chat assistant configured with the store's public profile.
    pub fn assistant(&self, profile: StoreProfile) -> Assistant {
        ChatAssistant::new(self.integrations.llm.clone(), self.tools.clone(), profile)
    }

    pub fn spawn_notifier(&self, runtime: Handle) -> io::Result<WorkerHandle> {
        Notifier::new(
            self.store.clone(),
            self.integrations.mailer.clone(),
            self.integrations.tracker.clone(),
            self.config.brand.clone(),
        )
        .spawn(&self.bus, runtime)
    }
}
