//! Order notifications: confirmation and status emails plus the server-side
//! `Purchase` conversion.
//!
//! Runs off the bus after the order is committed, so a failing provider never
//! affects the order itself.

use std::io;
use std::sync::Arc;

use thiserror::Error;
use tokio::runtime::Handle;

use storefront_sales::{OrderEvent, OrderPlaced, StatusChanged};

use super::event_worker::{EventWorker, WorkerHandle};
use crate::config::BrandConfig;
use crate::error::{IntegrationError, RepositoryError};
use crate::integrations::mailer::{order_confirmation, status_update};
use crate::integrations::{ConversionEvent, ConversionTracker, Mailer};
use crate::publish::{JsonEnvelope, SharedBus};
use crate::store::SharedStore;

const ORDER_AGGREGATE: &str = "sales.order";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("undecodable {event_type} payload: {source}")]
    Decode {
        event_type: String,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Integration(#[from] IntegrationError),
}

/// Unconfigured providers are not failures.
fn tolerate_disabled(result: Result<String, IntegrationError>) -> Result<Option<String>, IntegrationError> {
    match result {
        Ok(id) => Ok(Some(id)),
        Err(IntegrationError::Disabled(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

#[derive(Clone)]
pub struct Notifier {
    store: SharedStore,
    mailer: Arc<dyn Mailer>,
    tracker: Arc<dyn ConversionTracker>,
    brand: BrandConfig,
}

impl Notifier {
    pub fn new(
        store: SharedStore,
        mailer: Arc<dyn Mailer>,
        tracker: Arc<dyn ConversionTracker>,
        brand: BrandConfig,
    ) -> Self {
        Self {
            store,
            mailer,
            tracker,
            brand,
        }
    }

    /// Subscribe to `bus` and handle events on a dedicated thread, driving
    /// the async providers on `runtime`.
    pub fn spawn(self, bus: &SharedBus, runtime: Handle) -> io::Result<WorkerHandle> {
        EventWorker::spawn("order-notifier", bus.as_ref(), None, move |envelope: JsonEnvelope| {
            runtime.block_on(self.handle(&envelope))
        })
    }

    #[tracing::instrument(
        skip_all,
        fields(tenant_id = %envelope.tenant_id(), event_type = envelope.event_type()),
        err
    )]
    pub async fn handle(&self, envelope: &JsonEnvelope) -> Result<(), NotifyError> {
        if envelope.aggregate_type() != ORDER_AGGREGATE {
            return Ok(());
        }
        let event: OrderEvent = envelope.decode().map_err(|source| NotifyError::Decode {
            event_type: envelope.event_type().to_string(),
            source,
        })?;

        match event {
            OrderEvent::OrderPlaced(placed) => self.order_placed(&placed).await,
            OrderEvent::StatusChanged(changed) => self.status_changed(&changed).await,
            OrderEvent::PaymentStatusChanged(_) | OrderEvent::NotesUpdated(_) => Ok(()),
        }
    }

    async fn order_placed(&self, placed: &OrderPlaced) -> Result<(), NotifyError> {
        let email = match order_confirmation(&self.brand, placed) {
            Some(email) => tolerate_disabled(self.mailer.send(email).await),
            None => Ok(None),
        };
        let conversion = tolerate_disabled(
            self.tracker
                .track(ConversionEvent::purchase(placed, &self.brand.url))
                .await,
        );

        tracing::info!(
            order_number = %placed.order_number,
            email_id = ?email.as_ref().ok().and_then(|e| e.as_deref()),
            event_id = ?conversion.as_ref().ok().and_then(|e| e.as_deref()),
            "order notifications sent"
        );
        // Both were attempted; report the first failure.
        email?;
        conversion?;
        Ok(())
    }

    async fn status_changed(&self, changed: &StatusChanged) -> Result<(), NotifyError> {
        let Some(order) = self.store.get_order(changed.tenant_id, changed.order_id).await? else {
            tracing::warn!(order_id = %changed.order_id, "status changed for an order that no longer exists");
            return Ok(());
        };
        let (Some(customer), Some(number)) = (order.customer(), order.order_number()) else {
            return Ok(());
        };
        let Some(to) = customer.email.as_deref().filter(|e| !e.trim().is_empty()) else {
            return Ok(());
        };

        let email = status_update(&self.brand, to, &customer.name, number.as_str(), changed.to);
        if let Some(id) = tolerate_disabled(self.mailer.send(email).await)? {
            tracing::info!(email_id = %id, status = changed.to.as_str(), "status email sent");
        }
        Ok(())
    }
}
