//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**; they carry no
/// identity of their own. A roster `Member { user_id, name }` or a derived
/// `Balance` are value objects; a `Trip` is an entity.
///
/// To "modify" a value object, build a new one. Requiring `Clone +
/// PartialEq + Debug` keeps them cheap to copy, comparable by attributes and
/// usable in assertions.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
