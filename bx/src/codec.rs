//! XML wire codec
//!
//! Encodes a [`Signal`] into a `<bci-signal>` document and decodes it back.
//! Every supported value round-trips with identical type tag and equal
//! value; unsupported values are omitted from their parent container on
//! encode, and unknown or malformed child elements are skipped (logged) on
//! decode. Only a document that cannot be parsed as the envelope at all is a
//! [`DecodingError`].
//!
//! Wire layout:
//!
//! ```xml
//! <?xml version="1.0" encoding="utf-8"?>
//! <bci-signal version="1.0">
//!   <interaction-signal>
//!     <command value="play"/>
//!     <boolean name="practice" value="False"/>
//!     <dict name="palette">
//!       <string name="target" value="red"/>
//!       <list name="burst"><integer value="3"/><integer value="5"/></list>
//!     </dict>
//!   </interaction-signal>
//! </bci-signal>
//! ```

use std::collections::BTreeMap;
use std::fmt::Write;

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;
use tracing::warn;

use crate::value::{Signal, SignalKind, SignalValue};

/// Failure to parse a datagram as the envelope format. The dispatcher treats
/// this as a lost packet: log, drop, no reply, no retry.
#[derive(Debug, Error)]
pub enum DecodingError {
    #[error("malformed xml: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed attribute: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),

    #[error("datagram is not valid utf-8")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("unbalanced document")]
    Unbalanced,

    #[error("empty document")]
    Empty,

    #[error("root element is <{0}>, expected <bci-signal>")]
    UnexpectedRoot(String),

    #[error("missing signal element under <bci-signal>")]
    MissingSignal,

    #[error("unknown signal element <{0}>")]
    UnknownSignalKind(String),
}

/// Canonical boolean tokens. Decoding compares against these explicitly;
/// any other token is rejected rather than guessed at.
const TRUE_TOKEN: &str = "True";
const FALSE_TOKEN: &str = "False";

/// Encodes signals into the wire document
#[derive(Debug, Default, Clone)]
pub struct XmlEncoder;

impl XmlEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Render `signal` as a complete datagram payload. Values of unsupported
    /// type are silently omitted; the peer address is transport metadata and
    /// never serialized.
    pub fn encode_packet(&self, signal: &Signal) -> String {
        let mut xml = String::new();
        let _ = write!(xml, r#"<?xml version="1.0" encoding="utf-8"?>"#);
        let _ = write!(xml, r#"<bci-signal version="1.0">"#);
        let _ = write!(xml, "<{}>", signal.kind.wire_name());
        for command in &signal.commands {
            let _ = write!(xml, r#"<command value="{}"/>"#, escape(command.as_str()));
        }
        for (name, value) in &signal.data {
            write_value(&mut xml, Some(name), value);
        }
        let _ = write!(xml, "</{}>", signal.kind.wire_name());
        let _ = write!(xml, "</bci-signal>");
        xml
    }
}

fn write_value(out: &mut String, name: Option<&str>, value: &SignalValue) {
    let Some(tag) = value.type_tag() else {
        // Unsupported: omitted from the containing element entirely
        return;
    };
    let name_attr = match name {
        Some(n) => format!(r#" name="{}""#, escape(n)),
        None => String::new(),
    };
    match value {
        SignalValue::Bool(b) => {
            let token = if *b { TRUE_TOKEN } else { FALSE_TOKEN };
            let _ = write!(out, r#"<{tag}{name_attr} value="{token}"/>"#);
        }
        SignalValue::Int(i) | SignalValue::Long(i) => {
            let _ = write!(out, r#"<{tag}{name_attr} value="{i}"/>"#);
        }
        SignalValue::Float(f) => {
            let _ = write!(out, r#"<{tag}{name_attr} value="{f}"/>"#);
        }
        SignalValue::Complex { re, im } => {
            let _ = write!(out, r#"<{tag}{name_attr} value="{}"/>"#, format_complex(*re, *im));
        }
        SignalValue::Str(s) => {
            let _ = write!(out, r#"<{tag}{name_attr} value="{}"/>"#, escape(s.as_str()));
        }
        SignalValue::None => {
            let _ = write!(out, "<{tag}{name_attr}/>");
        }
        SignalValue::List(items) | SignalValue::Tuple(items) | SignalValue::Set(items) | SignalValue::FrozenSet(items) => {
            let _ = write!(out, "<{tag}{name_attr}>");
            for item in items {
                write_value(out, None, item);
            }
            let _ = write!(out, "</{tag}>");
        }
        SignalValue::Dict(map) => {
            let _ = write!(out, "<{tag}{name_attr}>");
            for (key, item) in map {
                write_value(out, Some(key), item);
            }
            let _ = write!(out, "</{tag}>");
        }
        SignalValue::Unsupported => unreachable!("unsupported values have no type tag"),
    }
}

fn format_complex(re: f64, im: f64) -> String {
    // f64 Display never uses scientific notation, so the only interior
    // sign is the separator in front of the imaginary part.
    if im.is_sign_negative() {
        format!("{re}-{}j", -im)
    } else {
        format!("{re}+{im}j")
    }
}

/// An element of the parsed document; only the attributes the protocol uses
/// are retained.
#[derive(Debug)]
struct Element {
    tag: String,
    name: Option<String>,
    value: Option<String>,
    children: Vec<Element>,
}

/// Decodes wire documents back into signals
#[derive(Debug, Default, Clone)]
pub struct XmlDecoder;

impl XmlDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode a received datagram. The peer address is left unset; the
    /// transport fills it in.
    pub fn decode_packet(&self, data: &[u8]) -> Result<Signal, DecodingError> {
        self.decode_str(std::str::from_utf8(data)?)
    }

    pub fn decode_str(&self, xml: &str) -> Result<Signal, DecodingError> {
        let root = parse_tree(xml)?;
        if root.tag != "bci-signal" {
            return Err(DecodingError::UnexpectedRoot(root.tag));
        }
        let envelope = root.children.first().ok_or(DecodingError::MissingSignal)?;
        let kind = SignalKind::from_wire(&envelope.tag)
            .ok_or_else(|| DecodingError::UnknownSignalKind(envelope.tag.clone()))?;

        let mut signal = Signal::new(kind);
        for child in &envelope.children {
            if child.tag == "command" {
                match &child.value {
                    Some(token) => signal.commands.push(token.clone()),
                    None => warn!("skipping <command> without value attribute"),
                }
                continue;
            }
            match (&child.name, decode_value(child)) {
                (Some(name), Some(value)) => {
                    signal.data.insert(name.clone(), value);
                }
                (None, _) => warn!(tag = %child.tag, "skipping unnamed data element"),
                (_, None) => warn!(tag = %child.tag, "skipping undecodable data element"),
            }
        }
        Ok(signal)
    }
}

fn parse_tree(xml: &str) -> Result<Element, DecodingError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) => stack.push(element_from(&e)?),
            Event::Empty(e) => {
                let element = element_from(&e)?;
                attach(&mut stack, &mut root, element);
            }
            Event::End(_) => {
                let element = stack.pop().ok_or(DecodingError::Unbalanced)?;
                attach(&mut stack, &mut root, element);
            }
            Event::Eof => break,
            // Text, declarations and comments carry no protocol content
            _ => {}
        }
    }
    if !stack.is_empty() {
        return Err(DecodingError::Unbalanced);
    }
    root.ok_or(DecodingError::Empty)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_none() {
        *root = Some(element);
    }
}

fn element_from(start: &BytesStart<'_>) -> Result<Element, DecodingError> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut name = None;
    let mut value = None;
    for attr in start.attributes() {
        let attr = attr?;
        match attr.key.as_ref() {
            b"name" => name = Some(attr.unescape_value()?.into_owned()),
            b"value" => value = Some(attr.unescape_value()?.into_owned()),
            // "version" and anything else is not used for decoding
            _ => {}
        }
    }
    Ok(Element {
        tag,
        name,
        value,
        children: Vec::new(),
    })
}

/// Reconstruct a value from its element, or `None` if the element cannot be
/// decoded (unknown tag, missing or malformed value attribute). Container
/// children that fail to decode are dropped individually.
fn decode_value(element: &Element) -> Option<SignalValue> {
    match element.tag.as_str() {
        "boolean" => match element.value.as_deref() {
            // Explicit token comparison: "False" is a non-empty string and
            // must still decode to false.
            Some(TRUE_TOKEN) => Some(SignalValue::Bool(true)),
            Some(FALSE_TOKEN) => Some(SignalValue::Bool(false)),
            other => {
                warn!(value = ?other, "boolean with non-canonical token");
                None
            }
        },
        "integer" => parse_attr(element).map(SignalValue::Int),
        "long" => parse_attr(element).map(SignalValue::Long),
        "float" => parse_attr(element).map(SignalValue::Float),
        "complex" => element.value.as_deref().and_then(parse_complex),
        "string" => element.value.clone().map(SignalValue::Str),
        "none" => Some(SignalValue::None),
        "list" => Some(SignalValue::List(decode_items(element))),
        "tuple" => Some(SignalValue::Tuple(decode_items(element))),
        "set" => Some(SignalValue::Set(decode_items(element))),
        "frozenset" => Some(SignalValue::FrozenSet(decode_items(element))),
        "dict" => {
            let mut map = BTreeMap::new();
            for child in &element.children {
                match (&child.name, decode_value(child)) {
                    (Some(name), Some(value)) => {
                        map.insert(name.clone(), value);
                    }
                    _ => warn!(tag = %child.tag, "skipping undecodable dict entry"),
                }
            }
            Some(SignalValue::Dict(map))
        }
        other => {
            warn!(tag = %other, "unknown element tag");
            None
        }
    }
}

fn decode_items(element: &Element) -> Vec<SignalValue> {
    element.children.iter().filter_map(decode_value).collect()
}

fn parse_attr<T: std::str::FromStr>(element: &Element) -> Option<T> {
    let parsed = element.value.as_deref().and_then(|v| v.parse().ok());
    if parsed.is_none() {
        warn!(tag = %element.tag, value = ?element.value, "malformed value attribute");
    }
    parsed
}

fn parse_complex(text: &str) -> Option<SignalValue> {
    let body = text.strip_suffix('j')?;
    // The separator is the first sign after the leading character, which
    // leaves room for a signed real part.
    let split = body[1..].find(['+', '-']).map(|i| i + 1)?;
    let re = body[..split].parse().ok()?;
    let im = body[split..].parse().ok()?;
    Some(SignalValue::Complex { re, im })
}
