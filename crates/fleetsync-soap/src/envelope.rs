//! Decoding of SOAP envelopes that carry a JSON array as element text.
//!
//! The envelope is first converted into a generic [`serde_json::Value`] tree
//! (elements become objects keyed by qualified name, repeated children become
//! arrays, text-only elements become strings, attributes are dropped). The
//! JSON payload is then located at `Envelope/Body/<method>Response/<method>Result`
//! or, failing that, by a bounded depth-first search for the first string leaf
//! that parses as JSON containing an array.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{Map, Value};

use crate::error::EnvelopeError;

/// Maximum element nesting accepted from the upstream document.
pub const MAX_XML_DEPTH: usize = 64;

const TEXT_KEY: &str = "$text";

/// One decoded upstream entity: external field names mapped to their textual
/// values, in the order the source emitted them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    fields: Vec<(String, String)>,
}

impl RawRecord {
    /// Value of `field`, or `None` when the source omitted it or sent `null`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.as_str())
    }

    /// Like [`RawRecord::get`], but treats blank values as absent.
    #[must_use]
    pub fn get_non_blank(&self, field: &str) -> Option<&str> {
        self.get(field).filter(|value| !value.trim().is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn from_json_object(object: &Map<String, Value>) -> Self {
        let fields = object
            .iter()
            .filter_map(|(name, value)| {
                let text = match value {
                    Value::Null => return None,
                    Value::String(s) => s.clone(),
                    Value::Bool(b) => b.to_string(),
                    Value::Number(n) => n.to_string(),
                    nested @ (Value::Array(_) | Value::Object(_)) => nested.to_string(),
                };
                Some((name.clone(), text))
            })
            .collect();
        Self { fields }
    }
}

impl<K, V> FromIterator<(K, V)> for RawRecord
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

/// Decodes the records carried by a SOAP response for `method`.
///
/// # Errors
///
/// Returns an [`EnvelopeError`] when the XML is malformed or nested deeper
/// than [`MAX_XML_DEPTH`], when no JSON payload can be located, or when the
/// payload holds no array.
pub fn try_decode_records(xml: &str, method: &str) -> Result<Vec<RawRecord>, EnvelopeError> {
    let tree = xml_to_tree(xml)?;

    let payload: Value = match exact_payload(&tree, method) {
        Some(text) => serde_json::from_str(text.trim())?,
        None => {
            tracing::debug!(method, "result element not at expected path; searching envelope");
            find_embedded_payload(&tree, 0).ok_or(EnvelopeError::MissingPayload)?
        }
    };

    let items = first_array(&payload, 0).ok_or(EnvelopeError::NoArray)?;

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match item {
            Value::Object(object) => records.push(RawRecord::from_json_object(object)),
            other => {
                tracing::warn!(index, value = %other, "skipping non-object payload element");
            }
        }
    }
    Ok(records)
}

/// Lenient form of [`try_decode_records`]: any decoding failure is logged and
/// yields an empty sequence.
#[must_use]
pub fn decode_records(xml: &str, method: &str) -> Vec<RawRecord> {
    match try_decode_records(xml, method) {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!(method, error = %e, "failed to decode SOAP envelope");
            Vec::new()
        }
    }
}

struct Frame {
    name: String,
    children: Map<String, Value>,
    text: String,
}

impl Frame {
    fn new(name: String) -> Self {
        Self {
            name,
            children: Map::new(),
            text: String::new(),
        }
    }

    fn into_value(self) -> (String, Value) {
        let value = if self.children.is_empty() {
            Value::String(self.text)
        } else {
            let mut children = self.children;
            if !self.text.is_empty() {
                children.insert(TEXT_KEY.to_string(), Value::String(self.text));
            }
            Value::Object(children)
        };
        (self.name, value)
    }
}

fn insert_child(map: &mut Map<String, Value>, name: String, value: Value) {
    match map.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            map.insert(name, value);
        }
    }
}

fn attach(stack: &mut [Frame], root: &mut Map<String, Value>, name: String, value: Value) {
    match stack.last_mut() {
        Some(parent) => insert_child(&mut parent.children, name, value),
        None => insert_child(root, name, value),
    }
}

/// Converts an XML document into a generic tree rooted at an object keyed by
/// the document element's qualified name.
fn xml_to_tree(xml: &str) -> Result<Value, EnvelopeError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut root = Map::new();
    let mut stack: Vec<Frame> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if stack.len() >= MAX_XML_DEPTH {
                    return Err(EnvelopeError::TooDeep {
                        limit: MAX_XML_DEPTH,
                    });
                }
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                stack.push(Frame::new(name));
            }
            Event::Empty(e) => {
                if stack.len() >= MAX_XML_DEPTH {
                    return Err(EnvelopeError::TooDeep {
                        limit: MAX_XML_DEPTH,
                    });
                }
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                attach(&mut stack, &mut root, name, Value::String(String::new()));
            }
            Event::End(_) => {
                if let Some(frame) = stack.pop() {
                    let (name, value) = frame.into_value();
                    attach(&mut stack, &mut root, name, value);
                }
            }
            Event::Text(e) => {
                if let Some(frame) = stack.last_mut() {
                    let text = e
                        .unescape()
                        .map_err(|err| EnvelopeError::Text(err.to_string()))?;
                    frame.text.push_str(&text);
                }
            }
            Event::CData(e) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(EnvelopeError::Unclosed(open.name));
    }
    Ok(Value::Object(root))
}

fn local_name(qualified: &str) -> &str {
    qualified
        .rsplit_once(':')
        .map_or(qualified, |(_, local)| local)
}

fn child_by_local_name<'a>(node: &'a Value, name: &str) -> Option<&'a Value> {
    let child = node
        .as_object()?
        .iter()
        .find(|(key, _)| local_name(key) == name)
        .map(|(_, value)| value)?;
    match child {
        Value::Array(items) => items.first(),
        other => Some(other),
    }
}

fn exact_payload<'a>(tree: &'a Value, method: &str) -> Option<&'a str> {
    let response = format!("{method}Response");
    let result = format!("{method}Result");
    let mut node = tree;
    for name in ["Envelope", "Body", response.as_str(), result.as_str()] {
        node = child_by_local_name(node, name)?;
    }
    node.as_str()
}

fn find_embedded_payload(node: &Value, depth: usize) -> Option<Value> {
    if depth > MAX_XML_DEPTH {
        return None;
    }
    match node {
        Value::String(text) => serde_json::from_str::<Value>(text.trim())
            .ok()
            .filter(|parsed| first_array(parsed, 0).is_some()),
        Value::Object(children) => children
            .values()
            .find_map(|child| find_embedded_payload(child, depth + 1)),
        Value::Array(items) => items
            .iter()
            .find_map(|item| find_embedded_payload(item, depth + 1)),
        _ => None,
    }
}

fn first_array(node: &Value, depth: usize) -> Option<&Vec<Value>> {
    if depth > MAX_XML_DEPTH {
        return None;
    }
    match node {
        Value::Array(items) => Some(items),
        Value::Object(children) => children
            .values()
            .find_map(|child| first_array(child, depth + 1)),
        _ => None,
    }
}

#[cfg(test)]
#[path = "envelope_test.rs"]
mod tests;
