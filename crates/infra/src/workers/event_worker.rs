use std::io;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::warn;

use storefront_core::TenantId;
use storefront_events::{EventBus, Subscription, TenantScoped};

const TICK: Duration = Duration::from_millis(250);

/// Handle to stop and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    name: &'static str,
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Request shutdown and wait for the worker thread to exit.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                warn!(worker = self.name, "worker thread panicked");
            }
        }
    }
}

/// Bus subscriber running on its own thread.
///
/// Messages are handed to `handler` in publish order. Handler failures are
/// logged and the loop moves on; delivery is at-most-once.
#[derive(Debug)]
pub struct EventWorker;

impl EventWorker {
    /// Subscribe to `bus` and spawn the worker thread.
    ///
    /// When `tenant_id` is set, messages for other tenants are skipped.
    pub fn spawn<M, B, H, E>(
        name: &'static str,
        bus: &B,
        tenant_id: Option<TenantId>,
        mut handler: H,
    ) -> io::Result<WorkerHandle>
    where
        M: TenantScoped + Send + 'static,
        B: EventBus<M> + ?Sized,
        H: FnMut(M) -> Result<(), E> + Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let sub: Subscription<M> = bus.subscribe();

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(name, sub, shutdown_rx, tenant_id, &mut handler))?;

        Ok(WorkerHandle {
            name,
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }
}

fn worker_loop<M, H, E>(
    name: &'static str,
    sub: Subscription<M>,
    shutdown_rx: mpsc::Receiver<()>,
    tenant_id: Option<TenantId>,
    handler: &mut H,
) where
    M: TenantScoped,
    H: FnMut(M) -> Result<(), E>,
    E: std::fmt::Display,
{
    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match sub.recv_timeout(TICK) {
            Ok(msg) => {
                if tenant_id.is_some_and(|t| !msg.belongs_to(t)) {
                    continue;
                }
                if let Err(err) = handler(msg) {
                    warn!(worker = name, error = %err, "event worker handler failed");
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
    tracing::debug!(worker = name, "event worker stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use storefront_core::AggregateId;
    use storefront_events::{EventEnvelope, InMemoryEventBus};

    fn envelope(tenant: TenantId, n: u64) -> EventEnvelope<u64> {
        EventEnvelope::new(
            uuid::Uuid::now_v7(),
            tenant,
            AggregateId::new(),
            "test.counter",
            "test.counter.bumped",
            n,
            chrono::Utc::now(),
            n,
        )
    }

    fn wait_for(seen: &Mutex<Vec<u64>>, len: usize) -> Vec<u64> {
        for _ in 0..100 {
            let current = seen.lock().unwrap().clone();
            if current.len() >= len {
                return current;
            }
            thread::sleep(Duration::from_millis(10));
        }
        seen.lock().unwrap().clone()
    }

    #[test]
    fn delivers_in_order_and_filters_tenants() {
        let bus: InMemoryEventBus<EventEnvelope<u64>> = InMemoryEventBus::new();
        let mine = TenantId::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let handle = EventWorker::spawn("test-worker", &bus, Some(mine), move |msg: EventEnvelope<u64>| {
            sink.lock().unwrap().push(*msg.payload());
            Ok::<_, String>(())
        })
        .unwrap();

        bus.publish(envelope(mine, 1)).unwrap();
        bus.publish(envelope(TenantId::new(), 2)).unwrap();
        bus.publish(envelope(mine, 3)).unwrap();

        assert_eq!(wait_for(&seen, 2), vec![1, 3]);
        handle.shutdown();
    }

    #[test]
    fn handler_errors_do_not_stop_the_worker() {
        let bus: InMemoryEventBus<EventEnvelope<u64>> = InMemoryEventBus::new();
        let tenant = TenantId::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let handle = EventWorker::spawn("failing-worker", &bus, None, move |msg: EventEnvelope<u64>| {
            let n = *msg.payload();
            sink.lock().unwrap().push(n);
            if n == 1 { Err("boom".to_string()) } else { Ok(()) }
        })
        .unwrap();

        bus.publish(envelope(tenant, 1)).unwrap();
        bus.publish(envelope(tenant, 2)).unwrap();

        assert_eq!(wait_for(&seen, 2), vec![1, 2]);
        handle.shutdown();
    }
}
