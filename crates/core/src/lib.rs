//! `storefront-core`: domain foundation building blocks.
//!
//! Pure domain primitives shared by every storefront module (no IO, no HTTP,
//! no storage).

pub mod aggregate;
pub mod error;
pub mod id;
pub mod money;
pub mod page;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, TenantId, UserId};
pub use money::{Currency, Money};
pub use page::{Page, PageRequest};
pub use value_object::ValueObject;
