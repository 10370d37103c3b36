//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values
/// (`Money`, `Currency`, an `Address` snapshot). Two value objects with the
/// same values are interchangeable; entities (`Product`, `Order`) are not.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
