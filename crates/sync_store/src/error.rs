//! Store error types.

/// Errors raised when a payload cannot be turned into cached entities.
///
/// A rejected payload leaves the store untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The entity payload was not a JSON object.
    #[error("entity payload is not an object")]
    NotAnObject,

    /// The entity has no positive integer `id` field.
    #[error("entity payload has no valid id")]
    MissingId,

    /// A list payload was neither an array nor an object with a `results` array.
    #[error("list payload has no entity array")]
    InvalidList,
}
