//! Signal envelope and the closed tagged-union value model
//!
//! Values are reconstructed from the wire by structured constructors only;
//! there is no reflective or source-evaluating path. A value the wire cannot
//! represent is modeled explicitly as [`SignalValue::Unsupported`], which the
//! encoder omits from its parent container.

use std::collections::BTreeMap;
use std::net::SocketAddr;

/// The four signal categories of the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// Classifier output forwarded to the active feedback
    Control,
    /// Operator/GUI commands and parameter updates
    Interaction,
    /// Bulk configuration of the controller itself
    Controller,
    /// Answer to a request, addressed to the original peer
    Reply,
}

impl SignalKind {
    /// Element name identifying this kind on the wire
    pub fn wire_name(&self) -> &'static str {
        match self {
            SignalKind::Control => "control-signal",
            SignalKind::Interaction => "interaction-signal",
            SignalKind::Controller => "fc-signal",
            SignalKind::Reply => "reply-signal",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "control-signal" => Some(SignalKind::Control),
            "interaction-signal" => Some(SignalKind::Interaction),
            "fc-signal" => Some(SignalKind::Controller),
            "reply-signal" => Some(SignalKind::Reply),
            _ => None,
        }
    }
}

/// A recursively typed signal value.
///
/// `Int` and `Long` are distinct wire types and stay distinct here so a
/// round trip reproduces the original tag. `Set`/`FrozenSet` keep encode
/// order; equality is element-wise in that order.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalValue {
    Bool(bool),
    Int(i64),
    Long(i64),
    Float(f64),
    Complex { re: f64, im: f64 },
    Str(String),
    None,
    List(Vec<SignalValue>),
    Tuple(Vec<SignalValue>),
    Set(Vec<SignalValue>),
    FrozenSet(Vec<SignalValue>),
    Dict(BTreeMap<String, SignalValue>),
    /// A value with no wire representation; omitted on encode, never decoded
    Unsupported,
}

impl SignalValue {
    /// The wire type tag, or `None` for unsupported values
    pub fn type_tag(&self) -> Option<&'static str> {
        match self {
            SignalValue::Bool(_) => Some("boolean"),
            SignalValue::Int(_) => Some("integer"),
            SignalValue::Long(_) => Some("long"),
            SignalValue::Float(_) => Some("float"),
            SignalValue::Complex { .. } => Some("complex"),
            SignalValue::Str(_) => Some("string"),
            SignalValue::None => Some("none"),
            SignalValue::List(_) => Some("list"),
            SignalValue::Tuple(_) => Some("tuple"),
            SignalValue::Set(_) => Some("set"),
            SignalValue::FrozenSet(_) => Some("frozenset"),
            SignalValue::Dict(_) => Some("dict"),
            SignalValue::Unsupported => None,
        }
    }
}

impl From<bool> for SignalValue {
    fn from(v: bool) -> Self {
        SignalValue::Bool(v)
    }
}

impl From<i64> for SignalValue {
    fn from(v: i64) -> Self {
        SignalValue::Int(v)
    }
}

impl From<f64> for SignalValue {
    fn from(v: f64) -> Self {
        SignalValue::Float(v)
    }
}

impl From<&str> for SignalValue {
    fn from(v: &str) -> Self {
        SignalValue::Str(v.to_string())
    }
}

impl From<String> for SignalValue {
    fn from(v: String) -> Self {
        SignalValue::Str(v)
    }
}

impl<T: Into<SignalValue>> From<Vec<T>> for SignalValue {
    fn from(v: Vec<T>) -> Self {
        SignalValue::List(v.into_iter().map(Into::into).collect())
    }
}

/// A typed, addressed unit of the wire protocol.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub kind: SignalKind,
    /// Named, recursively typed payload values (deterministic order)
    pub data: BTreeMap<String, SignalValue>,
    /// Ordered command tokens; the first token routes interaction signals
    pub commands: Vec<String>,
    /// Transport metadata, filled in on receive; never serialized
    pub peer: Option<SocketAddr>,
}

impl Signal {
    pub fn new(kind: SignalKind) -> Self {
        Self {
            kind,
            data: BTreeMap::new(),
            commands: Vec::new(),
            peer: None,
        }
    }

    pub fn with_data(mut self, name: impl Into<String>, value: impl Into<SignalValue>) -> Self {
        self.data.insert(name.into(), value.into());
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.commands.push(command.into());
        self
    }

    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    /// The leading command token, if any
    pub fn command(&self) -> Option<&str> {
        self.commands.first().map(String::as_str)
    }
}
