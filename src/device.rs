//! # Device Aggregate
//!
//! [`HomieDevice`] owns everything that describes one device: its identity,
//! its node registry, the announcement state machine and the command router.
//! All handlers are synchronous and emit bus operations into a
//! [`BusOutbox`], which keeps the announcement atomic: no tick or inbound
//! message can interleave with it.
//!
//! The handlers are driven by [`crate::runtime::HomieRuntime`], but can be
//! called directly by any single-threaded integration that owns its own
//! event source.

use crate::bus::BusOutbox;
use crate::config::ConfigSource;
use crate::error::HomieError;
use crate::node::{NodeKind, NodeValue, StateChangeListener, StateFn, ValueProvider};
use crate::registry::{NodeRef, NodeRegistry};
use crate::schema;
use crate::topic::DeviceIdentity;

/// Connectivity state of a device as seen by the synchronization engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceState {
    /// No broker session; nothing may be published.
    Disconnected,
    /// A session exists and the retained description is being published.
    Announcing,
    /// The description is complete; ticks and value pushes are active.
    Ready,
}

/// One Homie device: identity, registry, synchronization engine and command
/// router behind a single aggregate.
///
/// `MAX_NODES` caps the registry. The announced `$nodes` manifest has its
/// own fixed buffer ([`schema::MAX_NODES_LIST`], `system` plus eight
/// maximum-length names); a registry whose joined names exceed it announces
/// without the manifest.
///
/// # Example
///
/// ```ignore
/// let mut device = HomieDevice::<8>::new("kitchen-node", 60)?;
/// device.register("relay0", NodeKind::Switch, None)?;
/// device.register("temp", NodeKind::Float, Some(read_temperature))?;
/// device.set_state_listener(&relay_driver);
/// ```
pub struct HomieDevice<'a, const MAX_NODES: usize> {
    identity: DeviceIdentity,
    registry: NodeRegistry<MAX_NODES>,
    interval_s: u32,
    state: DeviceState,
    refresh_full: bool,
    provider: Option<&'a dyn ValueProvider>,
    listener: Option<&'a dyn StateChangeListener>,
}

impl<'a, const MAX_NODES: usize> HomieDevice<'a, MAX_NODES> {
    /// Creates a device with the given identifier and update interval in
    /// seconds. Intervals below one second are raised to one second.
    pub fn new(device_id: &str, update_interval_s: u32) -> Result<Self, HomieError> {
        Ok(Self {
            identity: DeviceIdentity::new(device_id)?,
            registry: NodeRegistry::new(),
            interval_s: update_interval_s.max(1),
            state: DeviceState::Disconnected,
            refresh_full: false,
            provider: None,
            listener: None,
        })
    }

    /// Creates a device from a configuration source, registering every
    /// configured node in order.
    ///
    /// Entries with an unsupported kind or an invalid name are logged and
    /// skipped; an unusable device identifier is a hard error.
    pub fn from_config(config: &dyn ConfigSource) -> Result<Self, HomieError> {
        let mut device = Self::new(config.device_id(), config.update_interval())?;
        for i in 0..config.node_count() {
            let Some((name, kind)) = config.node(i) else {
                continue;
            };
            let kind = match NodeKind::parse(kind) {
                Ok(kind) => kind,
                Err(_) => {
                    error!("node kind is unsupported - {}", kind);
                    continue;
                }
            };
            if let Err(err) = device.register(name, kind, None) {
                warn!("skipping configured node {}: {:?}", name, err);
            }
        }
        Ok(device)
    }

    /// Registers a node and returns a handle for later value pushes.
    pub fn register(
        &mut self,
        name: &str,
        kind: NodeKind,
        provide_state: Option<StateFn>,
    ) -> Result<NodeRef, HomieError> {
        self.registry.register(name, kind, provide_state)
    }

    /// Sets the device-wide fallback value provider, consulted during
    /// refresh sweeps for nodes without their own state function.
    pub fn set_value_provider(&mut self, provider: &'a dyn ValueProvider) {
        self.provider = Some(provider);
    }

    /// Sets the listener invoked for inbound state-change commands.
    pub fn set_state_listener(&mut self, listener: &'a dyn StateChangeListener) {
        self.listener = Some(listener);
    }

    /// The device identity.
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// The node registry.
    pub fn registry(&self) -> &NodeRegistry<MAX_NODES> {
        &self.registry
    }

    /// Current synchronization state.
    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Configured update interval in seconds.
    pub fn update_interval(&self) -> u32 {
        self.interval_s
    }

    /// Handles a (re)established broker session by publishing the full
    /// retained description, finishing with `$state = "ready"`.
    ///
    /// Runs on every connect, so a reconnect refreshes the whole tree.
    pub fn handle_connected(&mut self, uptime_s: u32, out: &mut dyn BusOutbox) {
        info!("bus connected, announcing device {}", self.identity.id());
        self.state = DeviceState::Announcing;
        schema::announce(
            &self.identity,
            &self.registry,
            self.interval_s,
            uptime_s,
            out,
        );
        self.state = DeviceState::Ready;
    }

    /// Handles a lost broker session. Ticks and pushes stay inert until a
    /// reconnect announces the device again.
    pub fn handle_disconnected(&mut self) {
        info!("bus disconnected");
        self.state = DeviceState::Disconnected;
    }

    /// Routes an inbound message to the state-change listener.
    ///
    /// Only `<root>/<node>/state/set` topics for registered nodes reach the
    /// listener; everything else is logged and dropped. The payload maps to
    /// `true` exactly when it is the literal string `true`.
    pub fn handle_message(&mut self, topic: &str, payload: &[u8]) {
        let name = match self.identity.parse_set_topic(topic) {
            Ok(name) => name,
            Err(_) => {
                warn!("ignoring malformed command topic: {}", topic);
                return;
            }
        };
        if self.registry.node_by_name(name).is_err() {
            warn!("dropping command for unknown node: {}", name);
            return;
        }
        let Some(listener) = self.listener else {
            debug!("no state change listener registered, dropping command for {}", name);
            return;
        };
        let on = payload == b"true";
        debug!("state change command for {}: {}", name, on);
        listener.on_state_change(name, on);
    }

    /// Handles one timer tick while `Ready`, alternating between the uptime
    /// pair and a full refresh sweep over every registered node.
    ///
    /// Ticks fire every `interval × 500` milliseconds and every second tick
    /// performs a full sweep. During a sweep, a node's own state function
    /// wins over the device-wide provider; nodes with neither are skipped
    /// without aborting the sweep.
    pub fn handle_tick(&mut self, uptime_s: u32, out: &mut dyn BusOutbox) {
        if self.state != DeviceState::Ready {
            return;
        }

        if self.refresh_full {
            for node in self.registry.iter() {
                let value = match node.state() {
                    Some(value) => value,
                    None => match self.provider {
                        Some(provider) => provider.node_value(node),
                        None => {
                            debug!("no value source for node {}", node.name());
                            continue;
                        }
                    },
                };
                schema::publish_value(&self.identity, node.name(), &value, out);
            }
        } else {
            schema::publish_uptime(&self.identity, uptime_s, out);
        }
        self.refresh_full = !self.refresh_full;
    }

    /// Publishes an application-pushed value for a registered node.
    ///
    /// Dropped with a log entry while the device is not `Ready`.
    pub fn handle_push(&mut self, node: NodeRef, value: NodeValue, out: &mut dyn BusOutbox) {
        if self.state != DeviceState::Ready {
            debug!("device not ready, dropping value update");
            return;
        }
        match self.registry.node_by_index(node.0) {
            Ok(descriptor) => {
                schema::publish_value(&self.identity, descriptor.name(), &value, out)
            }
            Err(_) => warn!("dropping value update for unknown node handle"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::RefCell;

    use crate::bus::{BusOutbox, QoS};
    use crate::config::HomieConfig;
    use crate::error::ValidationError;
    use crate::node::NodeDescriptor;

    #[derive(Default)]
    struct RecordingOutbox {
        publishes: Vec<(std::string::String, std::string::String, QoS, bool)>,
        subscribes: Vec<std::string::String>,
    }

    impl BusOutbox for RecordingOutbox {
        fn publish(&mut self, topic: &str, payload: &str, qos: QoS, retain: bool) {
            self.publishes
                .push((topic.into(), payload.into(), qos, retain));
        }

        fn subscribe(&mut self, topic: &str) {
            self.subscribes.push(topic.into());
        }
    }

    impl RecordingOutbox {
        fn topics(&self) -> Vec<&str> {
            self.publishes.iter().map(|(t, _, _, _)| t.as_str()).collect()
        }
    }

    #[derive(Default)]
    struct RecordingListener {
        calls: RefCell<Vec<(std::string::String, bool)>>,
    }

    impl StateChangeListener for RecordingListener {
        fn on_state_change(&self, node: &str, on: bool) {
            self.calls.borrow_mut().push((node.into(), on));
        }
    }

    struct FixedProvider(NodeValue);

    impl ValueProvider for FixedProvider {
        fn node_value(&self, _node: &NodeDescriptor) -> NodeValue {
            self.0
        }
    }

    fn temp_state() -> NodeValue {
        NodeValue::Float(21.5)
    }

    fn ready_device(device: &mut HomieDevice<'_, 4>) {
        let mut out = RecordingOutbox::default();
        device.handle_connected(0, &mut out);
    }

    #[test]
    fn connect_announces_and_becomes_ready() {
        let mut device = HomieDevice::<4>::new("dev1", 60).unwrap();
        device.register("relay0", NodeKind::Switch, None).unwrap();
        assert_eq!(device.state(), DeviceState::Disconnected);

        let mut out = RecordingOutbox::default();
        device.handle_connected(5, &mut out);

        assert_eq!(device.state(), DeviceState::Ready);
        let first = out.publishes.first().unwrap();
        assert_eq!((first.0.as_str(), first.1.as_str()), ("homie/dev1/$state", "init"));
        let last = out.publishes.last().unwrap();
        assert_eq!((last.0.as_str(), last.1.as_str()), ("homie/dev1/$state", "ready"));
        assert_eq!(out.subscribes, ["homie/dev1/relay0/state/set"]);
    }

    #[test]
    fn reconnect_announces_again() {
        let mut device = HomieDevice::<4>::new("dev1", 60).unwrap();
        let mut out = RecordingOutbox::default();
        device.handle_connected(0, &mut out);
        let first_run = out.publishes.len();

        device.handle_connected(9, &mut out);
        assert_eq!(out.publishes.len(), first_run * 2);
        assert_eq!(device.state(), DeviceState::Ready);
    }

    #[test]
    fn disconnect_leaves_ready_state() {
        let mut device = HomieDevice::<4>::new("dev1", 60).unwrap();
        ready_device(&mut device);

        device.handle_disconnected();
        assert_eq!(device.state(), DeviceState::Disconnected);
    }

    #[test]
    fn ticks_alternate_uptime_and_full_sweep() {
        let mut device = HomieDevice::<4>::new("dev1", 60).unwrap();
        device
            .register("temp", NodeKind::Float, Some(temp_state))
            .unwrap();
        ready_device(&mut device);

        let mut out = RecordingOutbox::default();
        device.handle_tick(10, &mut out);
        assert_eq!(
            out.topics(),
            ["homie/dev1/$stats/uptime", "homie/dev1/system/uptime"]
        );

        let mut out = RecordingOutbox::default();
        device.handle_tick(11, &mut out);
        assert_eq!(out.topics(), ["homie/dev1/temp/state"]);
        assert_eq!(out.publishes[0].1, "21.5");

        let mut out = RecordingOutbox::default();
        device.handle_tick(12, &mut out);
        assert_eq!(
            out.topics(),
            ["homie/dev1/$stats/uptime", "homie/dev1/system/uptime"]
        );
    }

    #[test]
    fn ticks_are_ignored_unless_ready() {
        let mut device = HomieDevice::<4>::new("dev1", 60).unwrap();
        device
            .register("temp", NodeKind::Float, Some(temp_state))
            .unwrap();

        let mut out = RecordingOutbox::default();
        device.handle_tick(10, &mut out);
        assert!(out.publishes.is_empty());

        ready_device(&mut device);
        device.handle_disconnected();
        device.handle_tick(11, &mut out);
        assert!(out.publishes.is_empty());

        // The disconnected ticks must not have advanced the alternation.
        ready_device(&mut device);
        device.handle_tick(12, &mut out);
        assert_eq!(
            out.topics(),
            ["homie/dev1/$stats/uptime", "homie/dev1/system/uptime"]
        );
    }

    #[test]
    fn sweep_skips_nodes_without_any_value_source() {
        let mut device = HomieDevice::<4>::new("dev1", 60).unwrap();
        device.register("bare", NodeKind::Integer, None).unwrap();
        device
            .register("temp", NodeKind::Float, Some(temp_state))
            .unwrap();
        ready_device(&mut device);

        let mut out = RecordingOutbox::default();
        device.handle_tick(0, &mut out); // uptime pair
        let mut out = RecordingOutbox::default();
        device.handle_tick(1, &mut out); // sweep

        assert_eq!(out.topics(), ["homie/dev1/temp/state"]);
    }

    #[test]
    fn sweep_falls_back_to_device_provider() {
        let provider = FixedProvider(NodeValue::Integer(7));
        let mut device = HomieDevice::<4>::new("dev1", 60).unwrap();
        device.register("count", NodeKind::Integer, None).unwrap();
        device.set_value_provider(&provider);
        ready_device(&mut device);

        let mut out = RecordingOutbox::default();
        device.handle_tick(0, &mut out);
        let mut out = RecordingOutbox::default();
        device.handle_tick(1, &mut out);

        assert_eq!(out.topics(), ["homie/dev1/count/state"]);
        assert_eq!(out.publishes[0].1, "7");
    }

    #[test]
    fn node_state_function_wins_over_fallback() {
        let provider = FixedProvider(NodeValue::Float(0.0));
        let mut device = HomieDevice::<4>::new("dev1", 60).unwrap();
        device
            .register("temp", NodeKind::Float, Some(temp_state))
            .unwrap();
        device.set_value_provider(&provider);
        ready_device(&mut device);

        let mut out = RecordingOutbox::default();
        device.handle_tick(0, &mut out);
        let mut out = RecordingOutbox::default();
        device.handle_tick(1, &mut out);

        assert_eq!(out.publishes[0].1, "21.5");
    }

    #[test]
    fn set_command_reaches_listener() {
        let listener = RecordingListener::default();
        let mut device = HomieDevice::<4>::new("dev1", 60).unwrap();
        device.register("relay0", NodeKind::Switch, None).unwrap();
        device.set_state_listener(&listener);
        ready_device(&mut device);

        device.handle_message("homie/dev1/relay0/state/set", b"true");
        device.handle_message("homie/dev1/relay0/state/set", b"false");
        device.handle_message("homie/dev1/relay0/state/set", b"anything");

        assert_eq!(
            *listener.calls.borrow(),
            [
                ("relay0".to_string(), true),
                ("relay0".to_string(), false),
                ("relay0".to_string(), false),
            ]
        );
    }

    #[test]
    fn commands_for_unknown_nodes_are_dropped() {
        let listener = RecordingListener::default();
        let mut device = HomieDevice::<4>::new("dev1", 60).unwrap();
        device.register("relay0", NodeKind::Switch, None).unwrap();
        device.set_state_listener(&listener);

        device.handle_message("homie/dev1/ghost/state/set", b"true");
        assert!(listener.calls.borrow().is_empty());
    }

    #[test]
    fn malformed_topics_are_dropped() {
        let listener = RecordingListener::default();
        let mut device = HomieDevice::<4>::new("dev1", 60).unwrap();
        device.register("relay0", NodeKind::Switch, None).unwrap();
        device.set_state_listener(&listener);

        device.handle_message("homie/dev1/relay0/state", b"true");
        device.handle_message("homie/other/relay0/state/set", b"true");
        assert!(listener.calls.borrow().is_empty());
    }

    #[test]
    fn commands_without_listener_are_safe() {
        let mut device = HomieDevice::<4>::new("dev1", 60).unwrap();
        device.register("relay0", NodeKind::Switch, None).unwrap();
        device.handle_message("homie/dev1/relay0/state/set", b"true");
    }

    #[test]
    fn pushed_values_publish_when_ready() {
        let mut device = HomieDevice::<4>::new("dev1", 60).unwrap();
        let count = device.register("count", NodeKind::Integer, None).unwrap();
        ready_device(&mut device);

        let mut out = RecordingOutbox::default();
        device.handle_push(count, NodeValue::Integer(5), &mut out);

        assert_eq!(out.topics(), ["homie/dev1/count/state"]);
        assert_eq!(out.publishes[0].1, "5");
    }

    #[test]
    fn pushed_values_are_dropped_until_ready() {
        let mut device = HomieDevice::<4>::new("dev1", 60).unwrap();
        let count = device.register("count", NodeKind::Integer, None).unwrap();

        let mut out = RecordingOutbox::default();
        device.handle_push(count, NodeValue::Integer(5), &mut out);
        assert!(out.publishes.is_empty());
    }

    #[test]
    fn interval_is_clamped_to_one_second() {
        let device = HomieDevice::<4>::new("dev1", 0).unwrap();
        assert_eq!(device.update_interval(), 1);
    }

    #[test]
    fn from_config_registers_configured_nodes_in_order() {
        let mut config = HomieConfig::<4>::new("dev1").unwrap().with_update_interval(30);
        config.add_node("relay0", "switch").unwrap();
        config.add_node("temp", "float").unwrap();

        let device = HomieDevice::<4>::from_config(&config).unwrap();
        assert_eq!(device.identity().id(), "dev1");
        assert_eq!(device.update_interval(), 30);
        let names: std::vec::Vec<&str> = device.registry().names().collect();
        assert_eq!(names, ["system", "relay0", "temp"]);
        assert_eq!(
            device.registry().node_by_name("relay0").unwrap().kind(),
            NodeKind::Switch
        );
    }

    #[test]
    fn from_config_skips_unsupported_and_invalid_entries() {
        let mut config = HomieConfig::<8>::new("dev1").unwrap();
        config.add_node("relay0", "switch").unwrap();
        config.add_node("color", "rgb").unwrap();
        config.add_node("relay0", "switch").unwrap();
        config.add_node("temp", "float").unwrap();

        let device = HomieDevice::<8>::from_config(&config).unwrap();
        let names: std::vec::Vec<&str> = device.registry().names().collect();
        assert_eq!(names, ["system", "relay0", "temp"]);
    }

    #[test]
    fn from_config_rejects_bad_device_id() {
        let config = HomieConfig::<4>::new("a/b").unwrap();
        assert_eq!(
            HomieDevice::<4>::from_config(&config).err(),
            Some(HomieError::Validation(ValidationError::IllegalName))
        );
    }
}
