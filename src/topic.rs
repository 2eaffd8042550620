//! # Topic Namespace
//!
//! Device identity and the `homie/<id>` namespace derived from it: building
//! full topic strings for outbound publishes and parsing inbound command
//! topics back into node names.

use core::fmt;
use core::fmt::Write;

use heapless::String;

use crate::error::{HomieError, ValidationError};

/// Topic namespace prefix mandated by the Homie convention.
pub const NAMESPACE: &str = "homie";

/// Maximum length of a device identifier in bytes.
pub const MAX_DEVICE_ID: usize = 32;

/// Maximum length for a single topic string.
pub const MAX_TOPIC_LEN: usize = 128;

/// Immutable identity of a device on the bus.
///
/// Holds the configured identifier and the `homie/<id>` root every topic of
/// the device lives under. Built once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    id: String<MAX_DEVICE_ID>,
    root: String<MAX_TOPIC_LEN>,
}

impl DeviceIdentity {
    /// Builds the identity for `id`, validating it the same way node names
    /// are validated: non-empty and free of `/`.
    pub fn new(id: &str) -> Result<Self, HomieError> {
        if id.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if id.contains('/') {
            return Err(ValidationError::IllegalName.into());
        }
        let mut owned = String::new();
        owned.push_str(id).map_err(|_| HomieError::BufferOverflow)?;
        let mut root = String::new();
        write!(root, "{}/{}", NAMESPACE, owned).map_err(|_| HomieError::BufferOverflow)?;
        Ok(Self { id: owned, root })
    }

    /// The configured device identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The topic root `homie/<id>` shared by every topic of this device.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Expands a formatted suffix (including its leading `/`) into a full
    /// topic under the device root.
    pub fn topic(&self, suffix: fmt::Arguments<'_>) -> Result<String<MAX_TOPIC_LEN>, HomieError> {
        let mut topic = String::new();
        write!(topic, "{}{}", self.root, suffix).map_err(|_| HomieError::BufferOverflow)?;
        Ok(topic)
    }

    /// Parses an inbound command topic, returning the target node name.
    ///
    /// Accepts exactly `homie/<id>/<node>/state/set`; anything else fails
    /// with [`HomieError::MalformedTopic`].
    pub fn parse_set_topic<'t>(&self, topic: &'t str) -> Result<&'t str, HomieError> {
        let rest = topic
            .strip_prefix(self.root.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or(HomieError::MalformedTopic)?;

        let mut segments = rest.split('/');
        let name = segments.next().unwrap_or("");
        if name.is_empty() {
            return Err(HomieError::MalformedTopic);
        }
        if segments.next() != Some("state")
            || segments.next() != Some("set")
            || segments.next().is_some()
        {
            return Err(HomieError::MalformedTopic);
        }
        Ok(name)
    }
}
