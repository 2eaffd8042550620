//! # Message Bus Abstraction
//!
//! This module defines the contracts between the device core and the message
//! bus. The bus itself (an MQTT client, a test double, a bridge over UART)
//! lives outside this crate; the runtime drives any implementation of
//! [`BusClient`].
//!
//! # Publishing Pattern
//!
//! The device core is synchronous and never performs async I/O directly.
//! Handlers emit operations into a [`BusOutbox`]; the runtime drains the
//! buffered operations and performs the actual async publishing after the
//! handler returns. This keeps the core free of transport generics and the
//! announcement sequence atomic with respect to ticks and inbound messages.

use heapless::{Deque, String};

use crate::topic::MAX_TOPIC_LEN;

/// Represents the Quality of Service (QoS) levels for bus messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum QoS {
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

/// A single event reported by the bus to the runtime.
///
/// Message data borrows from the client's receive buffer and is only valid
/// until the next call into the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent<'a> {
    /// A session with the broker was (re)established.
    Connected,
    /// The session was lost.
    Disconnected,
    /// An inbound message on a subscribed topic.
    Message {
        /// Full topic the message arrived on.
        topic: &'a str,
        /// Raw payload bytes.
        payload: &'a [u8],
    },
}

/// A trait representing the message-bus client driving a device.
///
/// With the Rust 2024 Edition, this trait uses native `async fn`, removing
/// the need for the `#[async_trait]` macro. Connection establishment and
/// retry policy belong to the implementation; the device core only reacts
/// to the events it reports.
#[allow(async_fn_in_trait)]
pub trait BusClient {
    /// The error type returned by the bus.
    type Error: core::fmt::Debug;

    /// Waits for the next bus event.
    async fn poll(&mut self) -> Result<BusEvent<'_>, Self::Error>;

    /// Publishes a payload to a topic.
    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<(), Self::Error>;

    /// Subscribes to a topic.
    async fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error>;

    /// Whether a broker session is currently established.
    fn is_connected(&self) -> bool;
}

/// Object-safe trait for queuing bus operations.
///
/// Device handlers use this to schedule publishes and subscriptions during
/// synchronous processing. The actual async I/O is done by the runtime after
/// the handler returns.
pub trait BusOutbox {
    /// Queue a message for publishing.
    ///
    /// This is synchronous and returns immediately; all Homie payloads are
    /// UTF-8 text.
    fn publish(&mut self, topic: &str, payload: &str, qos: QoS, retain: bool);

    /// Queue a topic subscription.
    fn subscribe(&mut self, topic: &str);
}

/// An owned bus operation with inline storage for topic and payload.
///
/// This allows the queue to hold operations without requiring the original
/// data to remain borrowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusOp<const PAYLOAD_SIZE: usize> {
    /// A buffered publish.
    Publish {
        /// The topic (stored inline).
        topic: String<MAX_TOPIC_LEN>,
        /// The payload text (stored inline).
        payload: String<PAYLOAD_SIZE>,
        /// Quality of Service level.
        qos: QoS,
        /// Whether the broker should retain the message.
        retain: bool,
    },
    /// A buffered subscription.
    Subscribe {
        /// The topic filter (stored inline).
        topic: String<MAX_TOPIC_LEN>,
    },
}

/// A FIFO queue of bus operations collected during device handlers.
///
/// Announcement order is part of the wire contract, so operations are
/// drained strictly in the order they were queued. Operations that do not
/// fit (queue full, topic or payload over capacity) are dropped with a
/// warning; delivery of what was queued stays with the transport's QoS
/// handling.
///
/// # Type Parameters
///
/// - `CAPACITY`: Maximum number of operations that can be buffered. Must be
///   large enough for one full announcement: 14 device-level operations
///   plus 8 per sensor node and 9 per switch node.
/// - `PAYLOAD_SIZE`: Maximum payload text length.
#[derive(Default)]
pub struct BusQueue<const CAPACITY: usize, const PAYLOAD_SIZE: usize> {
    ops: Deque<BusOp<PAYLOAD_SIZE>, CAPACITY>,
}

impl<const CAPACITY: usize, const PAYLOAD_SIZE: usize> BusQueue<CAPACITY, PAYLOAD_SIZE> {
    /// Creates a new empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns the oldest queued operation.
    pub fn pop_front(&mut self) -> Option<BusOp<PAYLOAD_SIZE>> {
        self.ops.pop_front()
    }

    /// Number of queued operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Checks if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Drops all queued operations.
    pub fn clear(&mut self) {
        self.ops.clear();
    }

    fn push(&mut self, op: BusOp<PAYLOAD_SIZE>) {
        if self.ops.push_back(op).is_err() {
            warn!("bus queue full, dropping operation");
        }
    }
}

impl<const CAPACITY: usize, const PAYLOAD_SIZE: usize> BusOutbox
    for BusQueue<CAPACITY, PAYLOAD_SIZE>
{
    fn publish(&mut self, topic: &str, payload: &str, qos: QoS, retain: bool) {
        let mut topic_str = String::new();
        if topic_str.push_str(topic).is_err() {
            warn!("topic too long, dropping publish: {}", topic);
            return;
        }

        let mut payload_str = String::new();
        if payload_str.push_str(payload).is_err() {
            warn!("payload too long, dropping publish to {}", topic);
            return;
        }

        self.push(BusOp::Publish {
            topic: topic_str,
            payload: payload_str,
            qos,
            retain,
        });
    }

    fn subscribe(&mut self, topic: &str) {
        let mut topic_str = String::new();
        if topic_str.push_str(topic).is_err() {
            warn!("topic too long, dropping subscription: {}", topic);
            return;
        }

        self.push(BusOp::Subscribe { topic: topic_str });
    }
}
