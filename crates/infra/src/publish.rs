//! Post-commit event publication.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value as JsonValue;

use storefront_core::{AggregateId, TenantId};
use storefront_events::{Event, EventBus, EventEnvelope, InMemoryEventBus};

pub type JsonEnvelope = EventEnvelope<JsonValue>;

pub type SharedBus = Arc<InMemoryEventBus<JsonEnvelope>>;

/// Publish events that were just committed.
///
/// `version_before` is the aggregate version the events were applied on top
/// of. The store is the source of truth, so failures are logged and
/// swallowed.
pub(crate) fn publish_committed<E>(
    bus: &SharedBus,
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    aggregate_type: &str,
    version_before: u64,
    events: &[E],
) where
    E: Event + Serialize,
{
    for (i, event) in events.iter().enumerate() {
        let sequence = version_before + i as u64 + 1;
        let envelope = match JsonEnvelope::from_event(tenant_id, aggregate_id, aggregate_type, sequence, event) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::error!(error = %e, event_type = event.event_type(), "failed to encode event");
                continue;
            }
        };
        if let Err(e) = bus.publish(envelope) {
            tracing::warn!(error = ?e, event_type = event.event_type(), "failed to publish event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use storefront_catalog::ProductId;
    use storefront_catalog::product::{ProductEvent, StockChangeReason, StockChanged};

    #[test]
    fn sequence_numbers_continue_from_the_prior_version() {
        let bus: SharedBus = Arc::new(InMemoryEventBus::new());
        let sub = bus.subscribe();
        let tenant = TenantId::new();
        let product = ProductId::generate();
        let event = |q| {
            ProductEvent::StockChanged(StockChanged {
                tenant_id: tenant,
                product_id: product,
                reason: StockChangeReason::Reserved,
                delta: -1,
                new_quantity: q,
                occurred_at: Utc::now(),
            })
        };

        publish_committed(&bus, tenant, product.0, "catalog.product", 4, &[event(3), event(2)]);

        let first = sub.try_recv().unwrap();
        let second = sub.try_recv().unwrap();
        assert_eq!(first.sequence_number(), 5);
        assert_eq!(second.sequence_number(), 6);
        assert_eq!(first.event_type(), "catalog.product.stock_changed");
        assert_eq!(first.tenant_id(), tenant);
    }
}
