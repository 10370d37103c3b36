//! Catalog domain module.
//!
//! Categories, menu products (with stock), product reviews and catalog
//! search. Deterministic domain logic only (no IO, no HTTP, no storage).

pub mod category;
pub mod product;
pub mod review;
pub mod search;
pub mod slug;

pub use category::{Category, CategoryDraft, CategoryId};
pub use product::{
    AdjustStock, CreateProduct, DietaryInfo, Product, ProductCommand, ProductDetails, ProductEvent, ProductId,
    ProductVariant, ReleaseStock, ReserveStock, SetAvailability, UpdateProduct, VariantId,
};
pub use review::{Review, ReviewDraft, ReviewId, ReviewSummary};
pub use search::{ProductFilter, ProductSort, StatusFilter};
pub use slug::slugify;
