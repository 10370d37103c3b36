//! Background workers fed by the event bus.

pub mod event_worker;
pub mod notifier;

pub use event_worker::{EventWorker, WorkerHandle};
pub use notifier::{Notifier, NotifyError};
