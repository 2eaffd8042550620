//! # Device Description Schema
//!
//! Builds the retained Homie 3.0 description of a device as an ordered
//! sequence of bus operations. The functions here are pure with respect to
//! the bus: they map (identity, registry, interval, uptime) to publishes and
//! subscriptions emitted into a [`BusOutbox`], and the emission order is part
//! of the wire contract. `$state = "init"` always comes first and
//! `$state = "ready"` always comes last, so consumers never act on a
//! half-published description.

use core::fmt;
use core::fmt::Write;

use heapless::String;

use crate::bus::{BusOutbox, QoS};
use crate::node::{NodeDescriptor, NodeValue};
use crate::registry::NodeRegistry;
use crate::topic::DeviceIdentity;

/// Homie convention version announced in `$homie`.
pub const HOMIE_VERSION: &str = "3.0";

/// `$state` payload while the description is being published.
pub const STATE_INIT: &str = "init";

/// `$state` payload once the announcement is complete.
pub const STATE_READY: &str = "ready";

/// Maximum length of the comma-joined `$nodes` list.
///
/// Sized for `system` plus eight nodes with maximum-length names; a longer
/// list drops the `$nodes` publish with a warning.
pub const MAX_NODES_LIST: usize = 288;

// Fits the longest decimal expansion of an f32, with room to spare for
// integers and booleans.
const VALUE_TEXT_LEN: usize = 48;

/// Publishes the full announcement sequence for `registry`.
///
/// `interval_s` is the configured update interval in seconds; the announced
/// `$stats/interval` is twice that. `uptime_s` seeds the first uptime pair.
///
/// The `$nodes` manifest is formatted into a [`MAX_NODES_LIST`]-byte buffer
/// sized for `system` plus eight maximum-length node names; a registry whose
/// joined names exceed it announces without the manifest (that one publish is
/// dropped with a warning, the rest of the sequence is unaffected).
pub fn announce<const MAX_NODES: usize>(
    identity: &DeviceIdentity,
    registry: &NodeRegistry<MAX_NODES>,
    interval_s: u32,
    uptime_s: u32,
    out: &mut dyn BusOutbox,
) {
    emit(identity, out, format_args!("/$state"), STATE_INIT);
    emit(identity, out, format_args!("/$homie"), HOMIE_VERSION);
    emit(identity, out, format_args!("/$name"), identity.id());
    emit_node_list(identity, registry, out);

    let mut interval_text: String<VALUE_TEXT_LEN> = String::new();
    let _ = write!(interval_text, "{}", interval_s.saturating_mul(2));
    emit(identity, out, format_args!("/$stats/interval"), &interval_text);

    emit(identity, out, format_args!("/system/$name"), "system");
    emit(identity, out, format_args!("/system/$type"), "MCU");
    emit(identity, out, format_args!("/system/$properties"), "uptime");
    emit(identity, out, format_args!("/system/uptime"), "0");
    emit(identity, out, format_args!("/system/uptime/$name"), "system uptime");
    emit(identity, out, format_args!("/system/uptime/$datatype"), "float");

    for node in registry.iter() {
        node_block(identity, node, out);
    }

    publish_uptime(identity, uptime_s, out);

    emit(identity, out, format_args!("/$state"), STATE_READY);
}

/// Publishes the description block of one node: its attributes, the `state`
/// property with a placeholder value, and the property attributes. Settable
/// nodes additionally get their command topic subscribed.
pub fn node_block(identity: &DeviceIdentity, node: &NodeDescriptor, out: &mut dyn BusOutbox) {
    let name = node.name();
    let settable = if node.settable() { "true" } else { "false" };

    emit(identity, out, format_args!("/{}/$name", name), name);
    emit(identity, out, format_args!("/{}/$type", name), node.datatype());
    emit(identity, out, format_args!("/{}/$properties", name), "state");
    emit(identity, out, format_args!("/{}/state", name), "0");
    emit(identity, out, format_args!("/{}/state/$name", name), name);
    emit(identity, out, format_args!("/{}/state/$settable", name), settable);
    emit(identity, out, format_args!("/{}/state/$datatype", name), node.datatype());
    emit(identity, out, format_args!("/{}/state/$retained", name), "true");

    if node.settable() {
        match identity.topic(format_args!("/{}/state/set", name)) {
            Ok(topic) => out.subscribe(&topic),
            Err(_) => warn!("command topic over capacity for node {}", name),
        }
    }
}

/// Publishes the uptime pair: the device-level `$stats/uptime` and the
/// `system` node property, both in whole seconds.
pub fn publish_uptime(identity: &DeviceIdentity, uptime_s: u32, out: &mut dyn BusOutbox) {
    let mut text: String<VALUE_TEXT_LEN> = String::new();
    let _ = write!(text, "{}", uptime_s);

    emit(identity, out, format_args!("/$stats/uptime"), &text);
    emit(identity, out, format_args!("/system/uptime"), &text);
}

/// Publishes a node value to its `state` property topic.
pub fn publish_value(
    identity: &DeviceIdentity,
    name: &str,
    value: &NodeValue,
    out: &mut dyn BusOutbox,
) {
    let mut text: String<VALUE_TEXT_LEN> = String::new();
    let _ = write!(text, "{}", value);

    emit(identity, out, format_args!("/{}/state", name), &text);
}

fn emit_node_list<const MAX_NODES: usize>(
    identity: &DeviceIdentity,
    registry: &NodeRegistry<MAX_NODES>,
    out: &mut dyn BusOutbox,
) {
    let mut list: String<MAX_NODES_LIST> = String::new();
    for (i, name) in registry.names().enumerate() {
        let appended = if i == 0 {
            list.push_str(name).is_ok()
        } else {
            list.push(',').is_ok() && list.push_str(name).is_ok()
        };
        if !appended {
            warn!("node list over capacity, dropping $nodes publish");
            return;
        }
    }
    emit(identity, out, format_args!("/$nodes"), &list);
}

// Every description publish is retained at QoS 1 so late subscribers see a
// complete device tree.
fn emit(
    identity: &DeviceIdentity,
    out: &mut dyn BusOutbox,
    suffix: fmt::Arguments<'_>,
    payload: &str,
) {
    match identity.topic(suffix) {
        Ok(topic) => out.publish(&topic, payload, QoS::AtLeastOnce, true),
        Err(_) => warn!("announcement topic over capacity, dropping publish"),
    }
}
