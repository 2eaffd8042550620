//! Value-update channel between application tasks and the runtime.
//!
//! Sensor drivers and other tasks cannot publish to the bus directly; they
//! send [`ValueUpdate`]s through a channel instead. The runtime receives the
//! updates and performs the actual publish to the node's `state` topic while
//! the device is ready.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};

use crate::node::NodeValue;
use crate::registry::NodeRef;

/// A request to publish a new value for a registered node.
///
/// Carries the handle returned by registration rather than the node name, so
/// updates stay `Copy` and free of borrowed data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueUpdate {
    /// Handle of the node the value belongs to.
    pub node: NodeRef,
    /// The new value.
    pub value: NodeValue,
}

pub type ValueUpdateChannel<const UPDATE_DEPTH: usize> =
    Channel<CriticalSectionRawMutex, ValueUpdate, UPDATE_DEPTH>;

pub type ValueUpdateSender<'a, const UPDATE_DEPTH: usize> =
    Sender<'a, CriticalSectionRawMutex, ValueUpdate, UPDATE_DEPTH>;

pub type ValueUpdateReceiver<'a, const UPDATE_DEPTH: usize> =
    Receiver<'a, CriticalSectionRawMutex, ValueUpdate, UPDATE_DEPTH>;

/// A handle that lets application tasks push node values without direct
/// access to the bus.
///
/// The handle wraps a channel sender and can be copied into multiple tasks.
/// The runtime drains the channel and publishes each value to
/// `<root>/<name>/state`; updates arriving while the device is not ready are
/// logged and dropped there.
///
/// # Example
///
/// ```ignore
/// static UPDATES: ValueUpdateChannel<4> = Channel::new();
///
/// let publisher = ValuePublisher::new(UPDATES.sender());
/// publisher.publish(relay, NodeValue::Bool(true)).await;
/// ```
#[derive(Clone, Copy)]
pub struct ValuePublisher<'a, const UPDATE_DEPTH: usize> {
    tx: ValueUpdateSender<'a, UPDATE_DEPTH>,
}

impl<'a, const UPDATE_DEPTH: usize> ValuePublisher<'a, UPDATE_DEPTH> {
    /// Creates a new `ValuePublisher` from a channel sender.
    pub fn new(tx: ValueUpdateSender<'a, UPDATE_DEPTH>) -> Self {
        Self { tx }
    }

    /// Pushes a value update, waiting if the channel is full.
    pub async fn publish(&self, node: NodeRef, value: NodeValue) {
        self.tx.send(ValueUpdate { node, value }).await;
    }

    /// Tries to push a value update without waiting.
    ///
    /// Returns `false` if the channel is full.
    pub fn try_publish(&self, node: NodeRef, value: NodeValue) -> bool {
        self.tx.try_send(ValueUpdate { node, value }).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn updates_arrive_in_push_order() {
        let channel = ValueUpdateChannel::<4>::new();
        let publisher = ValuePublisher::new(channel.sender());

        assert!(publisher.try_publish(NodeRef(0), NodeValue::Integer(1)));
        assert!(publisher.try_publish(NodeRef(1), NodeValue::Bool(true)));

        let rx = channel.receiver();
        assert_eq!(
            rx.try_receive(),
            Ok(ValueUpdate {
                node: NodeRef(0),
                value: NodeValue::Integer(1),
            })
        );
        assert_eq!(
            rx.try_receive(),
            Ok(ValueUpdate {
                node: NodeRef(1),
                value: NodeValue::Bool(true),
            })
        );
        assert!(rx.try_receive().is_err());
    }

    #[test]
    fn try_publish_reports_full_channel() {
        let channel = ValueUpdateChannel::<1>::new();
        let publisher = ValuePublisher::new(channel.sender());

        assert!(publisher.try_publish(NodeRef(0), NodeValue::Float(1.0)));
        assert!(!publisher.try_publish(NodeRef(0), NodeValue::Float(2.0)));

        channel.receiver().try_receive().unwrap();
        assert!(publisher.try_publish(NodeRef(0), NodeValue::Float(3.0)));
    }
}
