//! # Homie Device Library for Embedded Systems
//!
//! `homie-device` is a `no_std` compatible implementation of the device side of the
//! [Homie 3.0](https://homieiot.github.io/) MQTT convention, built upon the
//! [Embassy](https://embassy.dev/) async ecosystem.
//!
//! A device is modeled as a tree of addressable nodes (properties). The library
//! publishes a retained description of that tree over a message bus, keeps the
//! published state synchronized with live values, and routes inbound `set`
//! commands back to device logic.
//!
//! ## Core Features
//!
//! - **`no_std` & `no_alloc`:** Designed to run on bare-metal microcontrollers without requiring
//!   a standard library or dynamic memory allocation. Buffers are managed using `heapless`.
//! - **Fully Async:** Built with `async/await` and leverages the Embassy ecosystem for timers
//!   and cross-task channels, ensuring non-blocking operations.
//! - **Rust 2024 Edition:** Uses native `async fn` in traits, removing the need for `async-trait`.
//! - **Bus Agnostic:** A flexible [`BusClient`] trait decouples the device model from the MQTT
//!   client in use; anything that can publish, subscribe and report connection events can
//!   drive a device.
//! - **Retained Description:** The full device tree is announced as retained QoS 1 messages,
//!   so a newly-connecting observer reconstructs complete device state from the broker alone.
//!
//! ## Architecture
//!
//! ### 1. Describe the device
//!
//! Register nodes on a [`HomieDevice`], either directly or from a
//! [`ConfigSource`]:
//!
//! ```ignore
//! let mut device = HomieDevice::<8>::new("kitchen-node", 60)?;
//! let relay = device.register("relay0", NodeKind::Switch, None)?;
//! device.register("temp", NodeKind::Float, Some(read_temperature))?;
//! device.set_state_listener(&relay_driver);
//! ```
//!
//! ### 2. Run it over a bus
//!
//! The [`HomieRuntime`] drives the device from bus events, a refresh ticker
//! and an application value-update channel:
//!
//! ```ignore
//! static UPDATES: ValueUpdateChannel<4> = Channel::new();
//!
//! let mut runtime: HomieRuntime<'_, '_, _, 8, 96, 320, 4> =
//!     HomieRuntime::new(bus, &mut device, UPDATES.receiver());
//! runtime.run().await?;
//! ```
//!
//! On every (re)connect the runtime publishes the full announcement, from
//! `$state = "init"` through the per-node description blocks to
//! `$state = "ready"`, then alternates each tick between refreshing the
//! uptime statistics and sweeping every node's current value. Settable nodes
//! get their `<root>/<name>/state/set` topic subscribed, and inbound
//! commands are routed to the registered [`StateChangeListener`].
//!
//! Other tasks push values through a [`ValuePublisher`] handle without
//! touching the bus:
//!
//! ```ignore
//! let publisher = ValuePublisher::new(UPDATES.sender());
//! publisher.publish(relay, NodeValue::Bool(true)).await;
//! ```

#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod bus;
pub mod config;
pub mod device;
pub mod error;
pub mod node;
pub mod publisher;
pub mod registry;
pub mod runtime;
pub mod schema;
pub mod topic;

// Re-export key types for easier access at the crate root.
pub use bus::{BusClient, BusEvent, BusOutbox, QoS};
pub use config::{ConfigSource, HomieConfig};
pub use device::{DeviceState, HomieDevice};
pub use error::{HomieError, ValidationError};
pub use node::{NodeKind, NodeValue, StateChangeListener, ValueProvider};
pub use publisher::{ValuePublisher, ValueUpdateChannel};
pub use registry::{NodeRef, NodeRegistry};
pub use runtime::HomieRuntime;
pub use topic::DeviceIdentity;
