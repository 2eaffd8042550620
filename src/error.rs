//! # Error Types
//!
//! This module defines the error types used throughout the Homie device library,
//! covering node registration failures, configuration problems and inbound
//! command parsing.

/// Reasons a node or device name can be rejected during registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ValidationError {
    /// The name is empty.
    EmptyName,
    /// The name contains `/` and cannot be used as a topic segment.
    IllegalName,
    /// A node with the same name is already registered.
    DuplicateName,
}

/// The primary error enum for the Homie device library.
///
/// Registration-time failures are returned synchronously through `Result`;
/// failures while processing a tick or an inbound command are logged and the
/// affected unit of work is skipped instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HomieError {
    /// A node or device name failed validation.
    Validation(ValidationError),
    /// A configuration entry names a node kind this library does not implement.
    UnsupportedType,
    /// The requested node is not registered.
    NotFound,
    /// An inbound topic does not have the `<root>/<node>/state/set` shape.
    MalformedTopic,
    /// The node registry is at capacity.
    RegistryFull,
    /// A name or topic does not fit its fixed-capacity buffer.
    BufferOverflow,
}

/// Allows `?` to lift validation failures into the library error type.
impl From<ValidationError> for HomieError {
    fn from(err: ValidationError) -> Self {
        HomieError::Validation(err)
    }
}
