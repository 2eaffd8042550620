//! Configuration contract for device initialization.
//!
//! The persistent store itself (NVS, flash, compiled-in constants) lives
//! outside this crate; [`ConfigSource`] is the read-only surface
//! [`HomieDevice::from_config`](crate::device::HomieDevice::from_config)
//! populates a device from. [`HomieConfig`] is a ready-made in-memory
//! implementation for firmware that assembles its configuration at startup.

use heapless::{String, Vec};

use crate::error::HomieError;
use crate::node::MAX_NODE_NAME;
use crate::topic::MAX_DEVICE_ID;

/// Update interval used when the configuration does not set one, in seconds.
pub const DEFAULT_UPDATE_INTERVAL: u32 = 60;

// Longest supported kind string is "integer".
const MAX_KIND_NAME: usize = 8;

/// Read-only view of the stored device configuration.
///
/// Node entries carry the kind as the stored string (`"integer"`, `"float"`
/// or `"switch"`); parsing and validation happen during device
/// initialization, where bad entries are logged and skipped.
pub trait ConfigSource {
    /// The configured device identifier.
    fn device_id(&self) -> &str;

    /// The stats-update interval in seconds.
    fn update_interval(&self) -> u32;

    /// Number of configured node entries.
    fn node_count(&self) -> usize;

    /// The `(name, kind)` pair of the entry at `index`, if present.
    fn node(&self, index: usize) -> Option<(&str, &str)>;
}

/// In-memory device configuration.
///
/// # Example
///
/// ```ignore
/// let mut config = HomieConfig::<4>::new("kitchen-node")?;
/// config = config.with_update_interval(30);
/// config.add_node("relay0", "switch")?;
/// config.add_node("temp", "float")?;
///
/// let device = HomieDevice::<4>::from_config(&config)?;
/// ```
#[derive(Debug)]
pub struct HomieConfig<const MAX_NODES: usize> {
    device_id: String<MAX_DEVICE_ID>,
    update_interval_s: u32,
    nodes: Vec<(String<MAX_NODE_NAME>, String<MAX_KIND_NAME>), MAX_NODES>,
}

impl<const MAX_NODES: usize> HomieConfig<MAX_NODES> {
    /// Creates a configuration for `device_id` with the default update
    /// interval and no nodes.
    pub fn new(device_id: &str) -> Result<Self, HomieError> {
        let mut id = String::new();
        id.push_str(device_id)
            .map_err(|_| HomieError::BufferOverflow)?;
        Ok(Self {
            device_id: id,
            update_interval_s: DEFAULT_UPDATE_INTERVAL,
            nodes: Vec::new(),
        })
    }

    /// Sets the stats-update interval in seconds.
    pub fn with_update_interval(mut self, seconds: u32) -> Self {
        self.update_interval_s = seconds;
        self
    }

    /// Appends a node entry.
    ///
    /// The kind string is stored as-is; whether it names a supported kind is
    /// decided when a device loads the configuration.
    pub fn add_node(&mut self, name: &str, kind: &str) -> Result<(), HomieError> {
        let mut owned_name = String::new();
        owned_name
            .push_str(name)
            .map_err(|_| HomieError::BufferOverflow)?;
        let mut owned_kind = String::new();
        owned_kind
            .push_str(kind)
            .map_err(|_| HomieError::BufferOverflow)?;
        self.nodes
            .push((owned_name, owned_kind))
            .map_err(|_| HomieError::RegistryFull)
    }
}

impl<const MAX_NODES: usize> ConfigSource for HomieConfig<MAX_NODES> {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn update_interval(&self) -> u32 {
        self.update_interval_s
    }

    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn node(&self, index: usize) -> Option<(&str, &str)> {
        self.nodes
            .get(index)
            .map(|(name, kind)| (name.as_str(), kind.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_exposes_entries_in_insertion_order() {
        let mut config = HomieConfig::<4>::new("dev1").unwrap().with_update_interval(30);
        config.add_node("relay0", "switch").unwrap();
        config.add_node("temp", "float").unwrap();

        assert_eq!(config.device_id(), "dev1");
        assert_eq!(config.update_interval(), 30);
        assert_eq!(config.node_count(), 2);
        assert_eq!(config.node(0), Some(("relay0", "switch")));
        assert_eq!(config.node(1), Some(("temp", "float")));
        assert_eq!(config.node(2), None);
    }

    #[test]
    fn interval_defaults_when_not_set() {
        let config = HomieConfig::<4>::new("dev1").unwrap();
        assert_eq!(config.update_interval(), DEFAULT_UPDATE_INTERVAL);
    }

    #[test]
    fn config_reports_capacity_errors() {
        let long = "x".repeat(MAX_DEVICE_ID + 1);
        assert_eq!(
            HomieConfig::<4>::new(&long).unwrap_err(),
            HomieError::BufferOverflow
        );

        let mut config = HomieConfig::<1>::new("dev1").unwrap();
        config.add_node("relay0", "switch").unwrap();
        assert_eq!(
            config.add_node("relay1", "switch").unwrap_err(),
            HomieError::RegistryFull
        );

        let long_name = "x".repeat(MAX_NODE_NAME + 1);
        let mut config = HomieConfig::<4>::new("dev1").unwrap();
        assert_eq!(
            config.add_node(&long_name, "switch").unwrap_err(),
            HomieError::BufferOverflow
        );
    }
}
