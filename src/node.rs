//! # Node Model
//!
//! Types describing a single published node: its payload kind, the values it
//! carries on the wire and the descriptor stored by the registry, plus the
//! capability traits the device uses to reach application logic.

use core::fmt;

use heapless::String;

use crate::error::{HomieError, ValidationError};

/// Maximum length of a node name in bytes.
pub const MAX_NODE_NAME: usize = 32;

/// Signature of a per-node state provider.
///
/// A plain function pointer, so descriptors can be built from free functions
/// without borrowing application state.
pub type StateFn = fn() -> NodeValue;

/// Payload kind of a node.
///
/// The kind determines the announced `$datatype` and whether the node accepts
/// inbound `set` commands. Only boolean (switch) nodes are settable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NodeKind {
    /// Read-only integer sensor value.
    Integer,
    /// Read-only floating point sensor value.
    Float,
    /// Settable on/off switch.
    Switch,
}

impl NodeKind {
    /// Parses a configuration kind string (`"integer"`, `"float"` or
    /// `"switch"`).
    pub fn parse(s: &str) -> Result<Self, HomieError> {
        match s {
            "integer" => Ok(Self::Integer),
            "float" => Ok(Self::Float),
            "switch" => Ok(Self::Switch),
            _ => Err(HomieError::UnsupportedType),
        }
    }

    /// The Homie payload type name announced as `$datatype` (and as the node
    /// `$type`, which reuses it).
    pub fn datatype(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Switch => "boolean",
        }
    }

    /// Whether nodes of this kind accept inbound `set` commands.
    pub fn settable(&self) -> bool {
        matches!(self, Self::Switch)
    }
}

/// A single node value in one of the supported payload kinds.
///
/// The [`fmt::Display`] impl produces the wire text: decimal integers,
/// floats in canonical decimal form, booleans as the literal strings
/// `true`/`false`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NodeValue {
    /// Integer payload.
    Integer(i32),
    /// Floating point payload.
    Float(f32),
    /// Boolean payload.
    Bool(bool),
}

impl fmt::Display for NodeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeValue::Integer(v) => write!(f, "{}", v),
            NodeValue::Float(v) => write!(f, "{}", v),
            NodeValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

/// Descriptor of one published node.
///
/// The name is validated at construction and used verbatim as a topic
/// segment; the optional state provider supplies the live value during
/// refresh sweeps.
#[derive(Debug, Clone)]
pub struct NodeDescriptor {
    name: String<MAX_NODE_NAME>,
    kind: NodeKind,
    provide_state: Option<StateFn>,
}

impl NodeDescriptor {
    /// Builds a descriptor, validating the name.
    ///
    /// Fails with [`ValidationError::EmptyName`] or
    /// [`ValidationError::IllegalName`] for names unusable as a topic
    /// segment, and with [`HomieError::BufferOverflow`] for names longer
    /// than [`MAX_NODE_NAME`].
    pub fn new(
        name: &str,
        kind: NodeKind,
        provide_state: Option<StateFn>,
    ) -> Result<Self, HomieError> {
        if name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if name.contains('/') {
            return Err(ValidationError::IllegalName.into());
        }
        let mut owned = String::new();
        owned
            .push_str(name)
            .map_err(|_| HomieError::BufferOverflow)?;
        Ok(Self {
            name: owned,
            kind,
            provide_state,
        })
    }

    /// The node name, as it appears in topics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The payload kind.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// The announced `$datatype` of this node.
    pub fn datatype(&self) -> &'static str {
        self.kind.datatype()
    }

    /// Whether this node accepts inbound `set` commands.
    pub fn settable(&self) -> bool {
        self.kind.settable()
    }

    /// Invokes the node's own state provider, when it has one.
    pub fn state(&self) -> Option<NodeValue> {
        self.provide_state.map(|provide| provide())
    }
}

/// Device-wide fallback supplier of node values.
///
/// Consulted during refresh sweeps for every node without a state provider
/// of its own. Implementations receive the descriptor and must return a
/// value for it; a provider that cannot serve a node should not be
/// registered as covering it.
pub trait ValueProvider {
    /// Returns the current value of `node`.
    fn node_value(&self, node: &NodeDescriptor) -> NodeValue;
}

/// Sink for inbound state-change commands.
///
/// Invoked by the command router when a settable node receives a message on
/// its `set` topic.
pub trait StateChangeListener {
    /// Handles a state-change command for the node named `node`.
    ///
    /// `on` is `true` exactly when the command payload was the literal
    /// string `true`.
    fn on_state_change(&self, node: &str, on: bool);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_known_names() {
        assert_eq!(NodeKind::parse("integer"), Ok(NodeKind::Integer));
        assert_eq!(NodeKind::parse("float"), Ok(NodeKind::Float));
        assert_eq!(NodeKind::parse("switch"), Ok(NodeKind::Switch));
    }

    #[test]
    fn kind_rejects_unknown_names() {
        assert_eq!(NodeKind::parse("color"), Err(HomieError::UnsupportedType));
        assert_eq!(NodeKind::parse(""), Err(HomieError::UnsupportedType));
    }

    #[test]
    fn kind_table_maps_datatype_and_settable() {
        assert_eq!(NodeKind::Integer.datatype(), "integer");
        assert_eq!(NodeKind::Float.datatype(), "float");
        assert_eq!(NodeKind::Switch.datatype(), "boolean");

        assert!(!NodeKind::Integer.settable());
        assert!(!NodeKind::Float.settable());
        assert!(NodeKind::Switch.settable());
    }

    #[test]
    fn value_formats_as_wire_text() {
        assert_eq!(format!("{}", NodeValue::Integer(42)), "42");
        assert_eq!(format!("{}", NodeValue::Integer(-7)), "-7");
        assert_eq!(format!("{}", NodeValue::Float(21.5)), "21.5");
        assert_eq!(format!("{}", NodeValue::Float(21.0)), "21");
        assert_eq!(format!("{}", NodeValue::Bool(true)), "true");
        assert_eq!(format!("{}", NodeValue::Bool(false)), "false");
    }

    #[test]
    fn descriptor_validates_names() {
        assert_eq!(
            NodeDescriptor::new("", NodeKind::Integer, None).unwrap_err(),
            HomieError::Validation(ValidationError::EmptyName)
        );
        assert_eq!(
            NodeDescriptor::new("a/b", NodeKind::Integer, None).unwrap_err(),
            HomieError::Validation(ValidationError::IllegalName)
        );
        let long = "x".repeat(MAX_NODE_NAME + 1);
        assert_eq!(
            NodeDescriptor::new(&long, NodeKind::Integer, None).unwrap_err(),
            HomieError::BufferOverflow
        );
    }

    fn fixed_state() -> NodeValue {
        NodeValue::Integer(42)
    }

    #[test]
    fn descriptor_exposes_kind_and_provider() {
        let node = NodeDescriptor::new("temp", NodeKind::Float, None).unwrap();
        assert_eq!(node.name(), "temp");
        assert_eq!(node.kind(), NodeKind::Float);
        assert_eq!(node.datatype(), "float");
        assert!(!node.settable());
        assert_eq!(node.state(), None);

        let node = NodeDescriptor::new("count", NodeKind::Integer, Some(fixed_state)).unwrap();
        assert_eq!(node.state(), Some(NodeValue::Integer(42)));
    }
}
