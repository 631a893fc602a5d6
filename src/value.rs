//! AMF value types
//!
//! Both AMF0 and AMF3 share a common value representation. This module
//! provides a unified model that can be serialized to either format.
//!
//! Complex values (dates, byte arrays, XML fragments, vectors, arrays,
//! objects) are held behind shared handles. The handle allocation is the
//! value's identity: reference tables compare handles, not contents, so
//! decoding a back-reference yields a second handle to the same value and
//! encoding the same handle twice emits a back-reference instead of a copy.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};

/// Unified AMF value representation
#[derive(Debug, Clone, PartialEq)]
pub enum AmfValue {
    /// Null value (AMF0: 0x05, AMF3: 0x01)
    Null,

    /// Undefined value (AMF0: 0x06, AMF3: 0x00)
    ///
    /// AMF0 keeps null and undefined distinct; AMF3 collapses both to
    /// `Null` on decode, but the writer can still emit undefined.
    Undefined,

    /// Boolean value (AMF0: 0x01, AMF3: 0x02/0x03)
    Boolean(bool),

    /// 29-bit signed integer (AMF3 only: 0x04)
    ///
    /// Values outside -2^28..2^28-1 are written as doubles; AMF0 has no
    /// integer type at all.
    Integer(i32),

    /// IEEE 754 double-precision floating point (AMF0: 0x00, AMF3: 0x05)
    Double(f64),

    /// UTF-8 string (AMF0: 0x02/0x0C, AMF3: 0x06)
    String(String),

    /// Date as milliseconds since the Unix epoch (AMF0: 0x0B, AMF3: 0x08)
    Date(Arc<Date>),

    /// XML fragment (AMF0: 0x0F, AMF3: 0x07 document / 0x0B element)
    Xml(Arc<Xml>),

    /// Raw byte blob (AMF3 only: 0x0C)
    ByteArray(Arc<ByteArray>),

    /// Typed vector (AMF3 only: 0x0D-0x10)
    Vector(Arc<Vector>),

    /// Array with a dense part and an ordered associative part
    ///
    /// In AMF0 this is a strict array (0x0A), a mixed array (0x08), or a
    /// generic object depending on key composition; in AMF3 it is 0x09.
    Array(Arc<Array>),

    /// Structured record, optionally carrying a wire class name (AMF0:
    /// 0x03/0x10, AMF3: 0x0A)
    Object(Arc<Object>),
}

/// AMF date: epoch milliseconds as a double
///
/// Sub-millisecond precision is not representable on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Date {
    pub millis: f64,
}

impl Date {
    pub fn new(millis: f64) -> Self {
        Self { millis }
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self {
            millis: dt.timestamp_millis() as f64,
        }
    }

    /// Host-native view of the timestamp, `None` for out-of-range values
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        if !self.millis.is_finite() {
            return None;
        }
        Utc.timestamp_millis_opt(self.millis as i64).single()
    }
}

/// XML fragment carried as an opaque canonicalized string
///
/// `document` selects the AMF3 XMLDocument form (0x07) over the XML form
/// (0x0B); AMF0 has only the document tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Xml {
    pub data: String,
    pub document: bool,
}

impl Xml {
    /// Canonicalizes on construction: surrounding whitespace is trimmed
    /// and whitespace runs between tags are collapsed, matching the wire
    /// contract that XML is a string, not a parsed tree.
    pub fn new(data: impl Into<String>, document: bool) -> Self {
        Self {
            data: collapse_between_tags(&data.into()),
            document,
        }
    }
}

fn collapse_between_tags(s: &str) -> String {
    let mut rest = s.trim();
    let mut out = String::with_capacity(rest.len());
    while let Some(pos) = rest.find('>') {
        out.push_str(&rest[..=pos]);
        rest = &rest[pos + 1..];
        let trimmed = rest.trim_start_matches([' ', '\t', '\r', '\n']);
        if trimmed.starts_with('<') {
            rest = trimmed;
        }
    }
    out.push_str(rest);
    out
}

/// Raw byte blob (AMF3 ByteArray)
#[derive(Debug, Clone, PartialEq)]
pub struct ByteArray {
    pub data: Bytes,
}

impl ByteArray {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

/// AMF3 typed vector
#[derive(Debug, Clone, PartialEq)]
pub struct Vector {
    /// Fixed-length flag, carried through unchanged
    pub fixed: bool,
    pub data: VectorData,
}

/// Vector element storage, one variant per wire element kind
///
/// Numeric kinds keep native fixed-width storage; unsigned 32-bit elements
/// stay `u32` so values above `i32::MAX` do not pick up a bogus sign.
#[derive(Debug, Clone, PartialEq)]
pub enum VectorData {
    Int(Vec<i32>),
    UInt(Vec<u32>),
    Double(Vec<f64>),
    Object {
        /// Element class name, informational only
        class_name: String,
        elements: Vec<AmfValue>,
    },
}

impl Vector {
    pub fn len(&self) -> usize {
        match &self.data {
            VectorData::Int(v) => v.len(),
            VectorData::UInt(v) => v.len(),
            VectorData::Double(v) => v.len(),
            VectorData::Object { elements, .. } => elements.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Array with a dense part and an ordered associative part
///
/// Which parts are populated determines the wire encoding; associative keys
/// that are canonical decimal integers take part in the dense/sparse/mixed
/// classification exactly like dense indices.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Array {
    pub dense: Vec<AmfValue>,
    pub assoc: Vec<(String, AmfValue)>,
}

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dense(dense: Vec<AmfValue>) -> Self {
        Self {
            dense,
            assoc: Vec::new(),
        }
    }

    /// Total entry count across both parts
    pub fn len(&self) -> usize {
        self.dense.len() + self.assoc.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dense.is_empty() && self.assoc.is_empty()
    }

    /// Look up an associative entry by key
    pub fn get(&self, key: &str) -> Option<&AmfValue> {
        self.assoc.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: AmfValue) {
        let key = key.into();
        if let Some(slot) = self.assoc.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.assoc.push((key, value));
        }
    }
}

/// Structured record
///
/// An empty or missing class name means the record is anonymous and
/// round-trips without one. Field order is preserved as first observed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Object {
    pub class_name: Option<String>,
    /// Record accepts properties beyond its sealed trait list
    pub dynamic: bool,
    /// Payload is opaque to the generic codec
    pub externalizable: bool,
    pub fields: Vec<(String, AmfValue)>,
    /// Raw payload of an externalizable record the codec cannot interpret
    pub externalized: Option<AmfValue>,
}

impl Object {
    /// Anonymous dynamic record
    pub fn anonymous() -> Self {
        Self {
            dynamic: true,
            ..Self::default()
        }
    }

    /// Sealed record tagged with a wire class name
    pub fn typed(class_name: impl Into<String>) -> Self {
        Self {
            class_name: Some(class_name.into()),
            ..Self::default()
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<AmfValue>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    pub fn is_anonymous(&self) -> bool {
        self.class_name.as_deref().is_none_or(str::is_empty)
    }

    pub fn field(&self, key: &str) -> Option<&AmfValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn set_field(&mut self, key: impl Into<String>, value: AmfValue) {
        let key = key.into();
        if let Some(slot) = self.fields.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.fields.push((key, value));
        }
    }
}

impl AmfValue {
    /// Try to get this value as a string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AmfValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AmfValue::Double(n) => Some(*n),
            AmfValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get this value as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AmfValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            AmfValue::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            AmfValue::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Check if this value is null or undefined
    pub fn is_null_or_undefined(&self) -> bool {
        matches!(self, AmfValue::Null | AmfValue::Undefined)
    }

    /// Get a named entry from an object's fields or an array's
    /// associative part
    pub fn get(&self, key: &str) -> Option<&AmfValue> {
        match self {
            AmfValue::Object(o) => o.field(key),
            AmfValue::Array(a) => a.get(key),
            _ => None,
        }
    }

    /// Get a string property from an object value
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }

    /// Get a number property from an object value
    pub fn get_number(&self, key: &str) -> Option<f64> {
        self.get(key)?.as_number()
    }

    /// Stable identity of a complex value, `None` for scalars
    ///
    /// The pointer is only meaningful while a handle to the value is held;
    /// reference tables keep a clone alive for the duration of the
    /// top-level operation.
    pub(crate) fn identity(&self) -> Option<*const ()> {
        match self {
            AmfValue::Date(rc) => Some(Arc::as_ptr(rc) as *const ()),
            AmfValue::Xml(rc) => Some(Arc::as_ptr(rc) as *const ()),
            AmfValue::ByteArray(rc) => Some(Arc::as_ptr(rc) as *const ()),
            AmfValue::Vector(rc) => Some(Arc::as_ptr(rc) as *const ()),
            AmfValue::Array(rc) => Some(Arc::as_ptr(rc) as *const ()),
            AmfValue::Object(rc) => Some(Arc::as_ptr(rc) as *const ()),
            _ => None,
        }
    }
}

impl Default for AmfValue {
    fn default() -> Self {
        AmfValue::Null
    }
}

impl From<bool> for AmfValue {
    fn from(v: bool) -> Self {
        AmfValue::Boolean(v)
    }
}

impl From<f64> for AmfValue {
    fn from(v: f64) -> Self {
        AmfValue::Double(v)
    }
}

impl From<i32> for AmfValue {
    fn from(v: i32) -> Self {
        AmfValue::Integer(v)
    }
}

impl From<u32> for AmfValue {
    fn from(v: u32) -> Self {
        AmfValue::Double(v as f64)
    }
}

impl From<String> for AmfValue {
    fn from(v: String) -> Self {
        AmfValue::String(v)
    }
}

impl From<&str> for AmfValue {
    fn from(v: &str) -> Self {
        AmfValue::String(v.to_string())
    }
}

impl From<Date> for AmfValue {
    fn from(v: Date) -> Self {
        AmfValue::Date(Arc::new(v))
    }
}

impl From<Xml> for AmfValue {
    fn from(v: Xml) -> Self {
        AmfValue::Xml(Arc::new(v))
    }
}

impl From<ByteArray> for AmfValue {
    fn from(v: ByteArray) -> Self {
        AmfValue::ByteArray(Arc::new(v))
    }
}

impl From<Vector> for AmfValue {
    fn from(v: Vector) -> Self {
        AmfValue::Vector(Arc::new(v))
    }
}

impl From<Array> for AmfValue {
    fn from(v: Array) -> Self {
        AmfValue::Array(Arc::new(v))
    }
}

impl From<Object> for AmfValue {
    fn from(v: Object) -> Self {
        AmfValue::Object(Arc::new(v))
    }
}

impl<V: Into<AmfValue>> From<Vec<V>> for AmfValue {
    fn from(v: Vec<V>) -> Self {
        AmfValue::Array(Arc::new(Array::from_dense(
            v.into_iter().map(|x| x.into()).collect(),
        )))
    }
}

impl<V: Into<AmfValue>> From<HashMap<String, V>> for AmfValue {
    fn from(v: HashMap<String, V>) -> Self {
        let mut obj = Object::anonymous();
        for (k, val) in v {
            obj.fields.push((k, val.into()));
        }
        AmfValue::Object(Arc::new(obj))
    }
}
