//! AMF0/AMF3 serializer
//!
//! The writer is the inverse of the decoder: given a value it determines
//! the wire type tag and encodes it, consulting and populating the same
//! reference-table shapes the decoder builds, so indices stay aligned
//! between peers.
//!
//! A top-level write starts in AMF0. When AVM+ mode is enabled (the
//! envelope enables it for packet version >= 3) scalars still encode as
//! AMF0, while the first complex value emits the 0x11 escape tag and
//! continues in AMF3 — the behavior legacy peers expect.
//!
//! Array values pick one of four AMF0 encodings from their key
//! composition, decided in a single pass over the entries:
//!
//! - dense (consecutive integer keys from 0) — strict array
//! - sparse (integer keys with gaps) — strict array with undefined fillers
//! - mixed (integer and string keys, or any negative key) — mixed array
//! - string keys only — generic object

use std::collections::HashMap;

use bytes::Bytes;

use crate::buffer::ByteWriter;
use crate::constants::*;
use crate::error::{AmfError, Result};
use crate::references::EncoderReferences;
use crate::resolver::is_reserved_field;
use crate::settings::Settings;
use crate::value::{AmfValue, Array, Object, VectorData};

use crate::decoder::parse_index;

/// AMF serializer
pub struct Encoder {
    settings: Settings,
    avm_plus: bool,
    refs: EncoderReferences,
}

impl Encoder {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            avm_plus: false,
            refs: EncoderReferences::new(),
        }
    }

    /// Escape complex values into AMF3 during AMF0 encoding; mirrors the
    /// envelope-level `version >= 3` decision
    pub fn set_avm_plus(&mut self, enabled: bool) {
        self.avm_plus = enabled;
    }

    /// Encode one top-level value, starting in AMF0
    pub fn encode(&mut self, value: &AmfValue) -> Result<Bytes> {
        self.refs.reset();
        let mut out = ByteWriter::new();
        self.write_amf0_value(&mut out, value)?;
        Ok(out.finish())
    }

    /// Encode one top-level value as pure AMF3
    pub fn encode_amf3(&mut self, value: &AmfValue) -> Result<Bytes> {
        self.refs.reset();
        let mut out = ByteWriter::new();
        self.write_amf3_value(&mut out, value)?;
        Ok(out.finish())
    }

    // ========================================================================
    // AMF0
    // ========================================================================

    fn write_amf0_value(&mut self, out: &mut ByteWriter, value: &AmfValue) -> Result<()> {
        match value {
            AmfValue::Null => out.write_u8(AMF0_NULL),
            AmfValue::Undefined => out.write_u8(AMF0_UNDEFINED),
            AmfValue::Boolean(b) => {
                out.write_u8(AMF0_BOOLEAN);
                out.write_bool(*b);
            }
            // AMF0 has no integer type
            AmfValue::Integer(i) => {
                out.write_u8(AMF0_NUMBER);
                out.write_f64(*i as f64);
            }
            AmfValue::Double(d) => {
                if *d > AMF_U32_MAX {
                    // Stringified for peers that cannot hold the value in
                    // a native integer; an interoperability concession,
                    // not an AMF0 requirement
                    self.write_amf0_string(out, &format!("{}", d))?;
                } else {
                    out.write_u8(AMF0_NUMBER);
                    out.write_f64(*d);
                }
            }
            AmfValue::String(s) => self.write_amf0_string(out, s)?,
            AmfValue::Date(d) => {
                out.write_u8(AMF0_DATE);
                out.write_f64(d.millis);
                // Timezone offset, always zero
                out.write_u16(0);
            }
            AmfValue::Xml(_)
            | AmfValue::ByteArray(_)
            | AmfValue::Vector(_)
            | AmfValue::Array(_)
            | AmfValue::Object(_)
                if self.avm_plus =>
            {
                out.write_u8(AMF0_AVMPLUS);
                self.write_amf3_value(out, value)?;
            }
            AmfValue::Xml(x) => {
                out.write_u8(AMF0_XML_DOCUMENT);
                out.write_long_utf(&x.data);
            }
            AmfValue::Array(arr) => self.write_amf0_array(out, value, arr)?,
            AmfValue::Object(obj) => self.write_amf0_object(out, value, obj)?,
            AmfValue::ByteArray(_) => {
                return Err(AmfError::UnsupportedValueShape("byte array in AMF0"));
            }
            AmfValue::Vector(_) => {
                return Err(AmfError::UnsupportedValueShape("vector in AMF0"));
            }
        }
        Ok(())
    }

    fn write_amf0_string(&mut self, out: &mut ByteWriter, s: &str) -> Result<()> {
        if s.len() < AMF_U16_MAX {
            out.write_u8(AMF0_STRING);
            out.write_utf(s)?;
        } else {
            out.write_u8(AMF0_LONG_STRING);
            out.write_long_utf(s);
        }
        Ok(())
    }

    fn write_amf0_object(
        &mut self,
        out: &mut ByteWriter,
        value: &AmfValue,
        obj: &Object,
    ) -> Result<()> {
        if let Some(index) = self.refs.amf0_check(value) {
            out.write_u8(AMF0_REFERENCE);
            out.write_u16(index);
            return Ok(());
        }
        if obj.externalizable {
            return Err(AmfError::UnsupportedValueShape(
                "externalizable record in AMF0",
            ));
        }
        if obj.is_anonymous() {
            out.write_u8(AMF0_OBJECT);
            for (key, val) in &obj.fields {
                if is_reserved_field(key) {
                    continue;
                }
                out.write_utf(key)?;
                self.write_amf0_value(out, val)?;
            }
        } else {
            out.write_u8(AMF0_TYPED_OBJECT);
            out.write_utf(obj.class_name.as_deref().unwrap_or_default())?;
            for (key, val) in &obj.fields {
                // Protected-field convention: the explicit-type marker and
                // control-byte-prefixed keys stay off the wire
                if key.starts_with('\0') || is_reserved_field(key) {
                    continue;
                }
                out.write_utf(key)?;
                self.write_amf0_value(out, val)?;
            }
        }
        out.write_u16(0);
        out.write_u8(AMF0_OBJECT_END);
        Ok(())
    }

    fn write_amf0_array(
        &mut self,
        out: &mut ByteWriter,
        value: &AmfValue,
        arr: &Array,
    ) -> Result<()> {
        if let Some(index) = self.refs.amf0_check(value) {
            out.write_u8(AMF0_REFERENCE);
            out.write_u16(index);
            return Ok(());
        }
        let shape = ArrayShape::of(arr);
        if shape.len == 0 {
            out.write_u8(AMF0_STRICT_ARRAY);
            out.write_u32(0);
            return Ok(());
        }
        if shape.num_count > 0 && (shape.str_count > 0 || shape.has_negative) {
            // Mixed: associative form, dense entries keyed by their index
            out.write_u8(AMF0_MIXED_ARRAY);
            out.write_u32(shape.len as u32);
            for (i, val) in arr.dense.iter().enumerate() {
                out.write_utf(&i.to_string())?;
                self.write_amf0_value(out, val)?;
            }
            for (key, val) in &arr.assoc {
                if is_reserved_field(key) {
                    continue;
                }
                out.write_utf(key)?;
                self.write_amf0_value(out, val)?;
            }
            out.write_u16(0);
            out.write_u8(AMF0_OBJECT_END);
        } else if shape.num_count > 0 {
            // Strict: dense writes every slot, sparse fills gaps with
            // undefined up to the highest index
            let count = shape.max_index + 1;
            if count > u32::MAX as i64 {
                return Err(AmfError::UnsupportedValueShape(
                    "array index beyond 32-bit range",
                ));
            }
            out.write_u8(AMF0_STRICT_ARRAY);
            out.write_u32(count as u32);
            for i in 0..count {
                match shape.by_index.get(&i) {
                    Some(val) => self.write_amf0_value(out, val)?,
                    None => out.write_u8(AMF0_UNDEFINED),
                }
            }
        } else {
            // String keys only: generic object form
            out.write_u8(AMF0_OBJECT);
            for (key, val) in &arr.assoc {
                if is_reserved_field(key) {
                    continue;
                }
                out.write_utf(key)?;
                self.write_amf0_value(out, val)?;
            }
            out.write_u16(0);
            out.write_u8(AMF0_OBJECT_END);
        }
        Ok(())
    }

    // ========================================================================
    // AMF3
    // ========================================================================

    fn write_amf3_value(&mut self, out: &mut ByteWriter, value: &AmfValue) -> Result<()> {
        match value {
            AmfValue::Null => out.write_u8(AMF3_NULL),
            AmfValue::Undefined => out.write_u8(AMF3_UNDEFINED),
            AmfValue::Boolean(b) => {
                out.write_u8(if *b { AMF3_TRUE } else { AMF3_FALSE });
            }
            AmfValue::Integer(i) => {
                if (INT28_MIN..=INT28_MAX).contains(i) {
                    out.write_u8(AMF3_INTEGER);
                    out.write_u29(*i as u32 & U29_MAX)?;
                } else {
                    // Would overflow the 29-bit domain
                    out.write_u8(AMF3_DOUBLE);
                    out.write_f64(*i as f64);
                }
            }
            AmfValue::Double(d) => {
                out.write_u8(AMF3_DOUBLE);
                out.write_f64(*d);
            }
            AmfValue::String(s) => {
                out.write_u8(AMF3_STRING);
                self.write_amf3_string(out, s)?;
            }
            AmfValue::Date(d) => {
                out.write_u8(AMF3_DATE);
                if let Some(index) = self.refs.object_check(value) {
                    out.write_u29(index << 1)?;
                } else {
                    out.write_u29(1)?;
                    out.write_f64(d.millis);
                }
            }
            AmfValue::Xml(x) => {
                out.write_u8(if x.document { AMF3_XML_DOCUMENT } else { AMF3_XML });
                if let Some(index) = self.refs.object_check(value) {
                    out.write_u29(index << 1)?;
                } else {
                    out.write_u29(u29_length_prefix(x.data.len())?)?;
                    out.write_bytes(x.data.as_bytes());
                }
            }
            AmfValue::ByteArray(b) => {
                out.write_u8(AMF3_BYTE_ARRAY);
                if let Some(index) = self.refs.object_check(value) {
                    out.write_u29(index << 1)?;
                } else {
                    out.write_u29(u29_length_prefix(b.data.len())?)?;
                    out.write_bytes(&b.data);
                }
            }
            AmfValue::Vector(vec) => {
                let marker = match &vec.data {
                    VectorData::Int(_) => AMF3_VECTOR_INT,
                    VectorData::UInt(_) => AMF3_VECTOR_UINT,
                    VectorData::Double(_) => AMF3_VECTOR_DOUBLE,
                    VectorData::Object { .. } => AMF3_VECTOR_OBJECT,
                };
                out.write_u8(marker);
                if let Some(index) = self.refs.object_check(value) {
                    out.write_u29(index << 1)?;
                    return Ok(());
                }
                out.write_u29(u29_length_prefix(vec.len())?)?;
                out.write_bool(vec.fixed);
                match &vec.data {
                    VectorData::Int(elements) => {
                        for e in elements {
                            out.write_i32(*e);
                        }
                    }
                    VectorData::UInt(elements) => {
                        for e in elements {
                            out.write_u32(*e);
                        }
                    }
                    VectorData::Double(elements) => {
                        for e in elements {
                            out.write_f64(*e);
                        }
                    }
                    VectorData::Object {
                        class_name,
                        elements,
                    } => {
                        self.write_amf3_string(out, class_name)?;
                        for e in elements {
                            self.write_amf3_value(out, e)?;
                        }
                    }
                }
            }
            AmfValue::Array(arr) => self.write_amf3_array(out, value, arr)?,
            AmfValue::Object(obj) => self.write_amf3_object(out, value, obj)?,
        }
        Ok(())
    }

    /// Marker-less AMF3 string write: empty-string sentinel, string-table
    /// reference, or inline with length prefix
    fn write_amf3_string(&mut self, out: &mut ByteWriter, s: &str) -> Result<()> {
        if s.is_empty() {
            out.write_u8(0x01);
            return Ok(());
        }
        if let Some(index) = self.refs.string_check(s) {
            return out.write_u29(index << 1);
        }
        out.write_u29(u29_length_prefix(s.len())?)?;
        out.write_bytes(s.as_bytes());
        Ok(())
    }

    fn write_amf3_array(
        &mut self,
        out: &mut ByteWriter,
        value: &AmfValue,
        arr: &Array,
    ) -> Result<()> {
        if let Some(index) = self.refs.object_check(value) {
            out.write_u8(AMF3_ARRAY);
            out.write_u29(index << 1)?;
            return Ok(());
        }
        let shape = ArrayShape::of(arr);
        let assoc_count = shape.len - shape.dense_run;
        if self.settings.mixed_array_as_object && assoc_count > 0 {
            // Policy: non-strict non-dense arrays go out as anonymous
            // dynamic records instead of the associative array form
            out.write_u8(AMF3_OBJECT);
            self.refs.traits.register_placeholder();
            out.write_u29(AMF3_TRAIT_INLINE | AMF3_TRAIT_DYNAMIC)?;
            out.write_u8(0x01);
            for (i, val) in arr.dense.iter().enumerate() {
                self.write_amf3_string(out, &i.to_string())?;
                self.write_amf3_value(out, val)?;
            }
            for (key, val) in &arr.assoc {
                self.write_amf3_string(out, key)?;
                self.write_amf3_value(out, val)?;
            }
            out.write_u8(0x01);
            return Ok(());
        }
        out.write_u8(AMF3_ARRAY);
        out.write_u29(u29_length_prefix(shape.dense_run)?)?;
        // Associative part first, then the dense run; the order is fixed
        for (key, val) in &arr.assoc {
            if matches!(parse_index(key), Some(i) if i >= 0 && (i as usize) < shape.dense_run) {
                continue;
            }
            self.write_amf3_string(out, key)?;
            self.write_amf3_value(out, val)?;
        }
        out.write_u8(0x01);
        for i in 0..shape.dense_run {
            let val = if i < arr.dense.len() {
                &arr.dense[i]
            } else {
                shape.by_index[&(i as i64)]
            };
            self.write_amf3_value(out, val)?;
        }
        Ok(())
    }

    fn write_amf3_object(
        &mut self,
        out: &mut ByteWriter,
        value: &AmfValue,
        obj: &Object,
    ) -> Result<()> {
        out.write_u8(AMF3_OBJECT);
        if let Some(index) = self.refs.object_check(value) {
            return out.write_u29(index << 1);
        }

        if obj.is_anonymous() && !obj.externalizable {
            // Anonymous: dynamic record with no sealed members. The trait
            // table still consumes an index so it stays aligned with the
            // table a decoder builds.
            self.refs.traits.register_placeholder();
            out.write_u29(AMF3_TRAIT_INLINE | AMF3_TRAIT_DYNAMIC)?;
            out.write_u8(0x01);
            for (key, val) in &obj.fields {
                if is_reserved_field(key) {
                    continue;
                }
                self.write_amf3_string(out, key)?;
                self.write_amf3_value(out, val)?;
            }
            out.write_u8(0x01);
            return Ok(());
        }

        let class_name = obj.class_name.clone().unwrap_or_default();

        if obj.externalizable {
            match self.refs.traits.reference(&class_name, &[], true) {
                Ok(Some(cached)) => out.write_u29(cached.index << 2 | 1)?,
                Ok(None) => {
                    self.refs.traits.register(&class_name, Vec::new(), false, true);
                    out.write_u29(AMF3_TRAIT_INLINE | AMF3_TRAIT_EXTERNALIZABLE)?;
                    self.write_amf3_string(out, &class_name)?;
                }
                Err(_) => {
                    tracing::warn!(class = %class_name, "trait schema mismatch, re-defining inline");
                    self.refs.traits.register_placeholder();
                    out.write_u29(AMF3_TRAIT_INLINE | AMF3_TRAIT_EXTERNALIZABLE)?;
                    self.write_amf3_string(out, &class_name)?;
                }
            }
            // The externalized payload is the single value that follows
            match &obj.externalized {
                Some(payload) => self.write_amf3_value(out, payload)?,
                None => out.write_u8(AMF3_NULL),
            }
            return Ok(());
        }

        let properties: Vec<String> = obj
            .fields
            .iter()
            .filter(|(key, _)| !key.starts_with('\0') && !is_reserved_field(key))
            .map(|(key, _)| key.clone())
            .collect();

        match self.refs.traits.reference(&class_name, &properties, false) {
            Ok(Some(cached)) => {
                out.write_u29(cached.index << 2 | 1)?;
                self.write_sealed_values(out, obj)?;
                if cached.dynamic {
                    out.write_u8(0x01);
                }
            }
            Ok(None) => {
                self.refs
                    .traits
                    .register(&class_name, properties.clone(), obj.dynamic, false);
                let mut prefix = AMF3_TRAIT_INLINE | (properties.len() as u32) << 4;
                if obj.dynamic {
                    prefix |= AMF3_TRAIT_DYNAMIC;
                }
                out.write_u29(prefix)?;
                self.write_amf3_string(out, &class_name)?;
                for name in &properties {
                    self.write_amf3_string(out, name)?;
                }
                self.write_sealed_values(out, obj)?;
                if obj.dynamic {
                    out.write_u8(0x01);
                }
            }
            Err(_) => {
                // Same class name, different property list: never reuse
                // the mismatched schema. A fresh all-dynamic definition
                // goes out and the cache keeps a placeholder index.
                tracing::warn!(class = %class_name, "trait schema mismatch, re-defining inline");
                self.refs.traits.register_placeholder();
                out.write_u29(AMF3_TRAIT_INLINE | AMF3_TRAIT_DYNAMIC)?;
                self.write_amf3_string(out, &class_name)?;
                for (key, val) in &obj.fields {
                    if key.starts_with('\0') || is_reserved_field(key) {
                        continue;
                    }
                    self.write_amf3_string(out, key)?;
                    self.write_amf3_value(out, val)?;
                }
                out.write_u8(0x01);
            }
        }
        Ok(())
    }

    fn write_sealed_values(&mut self, out: &mut ByteWriter, obj: &Object) -> Result<()> {
        for (key, val) in &obj.fields {
            if key.starts_with('\0') || is_reserved_field(key) {
                continue;
            }
            self.write_amf3_value(out, val)?;
        }
        Ok(())
    }
}

/// Single-pass key classification shared by the AMF0 and AMF3 array paths
struct ArrayShape<'a> {
    len: usize,
    num_count: usize,
    str_count: usize,
    has_negative: bool,
    /// Highest non-negative integer key, -1 when there is none
    max_index: i64,
    /// Length of the contiguous run of integer keys starting at 0
    dense_run: usize,
    by_index: HashMap<i64, &'a AmfValue>,
}

impl<'a> ArrayShape<'a> {
    fn of(arr: &'a Array) -> Self {
        let mut by_index: HashMap<i64, &AmfValue> = HashMap::with_capacity(arr.dense.len());
        let mut num_count = arr.dense.len();
        let mut str_count = 0;
        let mut has_negative = false;
        let mut max_index = arr.dense.len() as i64 - 1;
        for (i, val) in arr.dense.iter().enumerate() {
            by_index.insert(i as i64, val);
        }
        for (key, val) in &arr.assoc {
            match parse_index(key) {
                Some(i) if i >= 0 => {
                    num_count += 1;
                    max_index = max_index.max(i);
                    by_index.insert(i, val);
                }
                Some(_) => {
                    has_negative = true;
                    str_count += 1;
                }
                None => str_count += 1,
            }
        }
        let mut dense_run = arr.dense.len();
        while by_index.contains_key(&(dense_run as i64)) {
            dense_run += 1;
        }
        Self {
            len: arr.len(),
            num_count,
            str_count,
            has_negative,
            max_index,
            dense_run,
            by_index,
        }
    }
}

fn u29_length_prefix(len: usize) -> Result<u32> {
    let prefix = ((len as u64) << 1) | 1;
    if prefix > U29_MAX as u64 {
        return Err(AmfError::IntegerOutOfRange(len as u64));
    }
    Ok(prefix as u32)
}

/// Encode a single value starting in AMF0, with defaults
pub fn encode(value: &AmfValue) -> Result<Bytes> {
    Encoder::new(Settings::default()).encode(value)
}

/// Encode a single value as pure AMF3, with defaults
pub fn encode_amf3(value: &AmfValue) -> Result<Bytes> {
    Encoder::new(Settings::default()).encode_amf3(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{decode, decode_amf3};
    use crate::value::{ByteArray, Date, Vector, Xml};
    use std::sync::Arc;

    fn amf0_roundtrip(value: &AmfValue) -> AmfValue {
        decode(encode(value).unwrap()).unwrap()
    }

    fn amf3_roundtrip(value: &AmfValue) -> AmfValue {
        decode_amf3(encode_amf3(value).unwrap()).unwrap()
    }

    #[test]
    fn test_amf0_number_fixture() {
        let bytes = encode(&AmfValue::Double(42.0)).unwrap();
        assert_eq!(
            bytes.as_ref(),
            &[0x00, 0x40, 0x45, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_amf3_integer_fixture() {
        let bytes = encode_amf3(&AmfValue::Integer(300)).unwrap();
        assert_eq!(bytes.as_ref(), &[0x04, 0x82, 0x2C]);
    }

    #[test]
    fn test_amf3_empty_array_fixture() {
        let bytes = encode_amf3(&Array::new().into()).unwrap();
        assert_eq!(bytes.as_ref(), &[0x09, 0x01, 0x01]);
    }

    #[test]
    fn test_amf0_scalar_roundtrips() {
        for value in [
            AmfValue::Null,
            AmfValue::Undefined,
            AmfValue::Boolean(true),
            AmfValue::Boolean(false),
            AmfValue::Double(0.0),
            AmfValue::Double(-1.5),
            AmfValue::String("".into()),
            AmfValue::String("hello world".into()),
        ] {
            assert_eq!(amf0_roundtrip(&value), value);
        }
    }

    #[test]
    fn test_amf0_integer_becomes_double() {
        // AMF0 has no integer type; the loss is by design
        assert_eq!(amf0_roundtrip(&AmfValue::Integer(7)), AmfValue::Double(7.0));
    }

    #[test]
    fn test_amf0_long_string() {
        let value = AmfValue::String("x".repeat(70_000));
        let bytes = encode(&value).unwrap();
        assert_eq!(bytes[0], AMF0_LONG_STRING);
        assert_eq!(decode(bytes).unwrap(), value);

        // 65535 bytes is already the long form
        let value = AmfValue::String("y".repeat(65_535));
        let bytes = encode(&value).unwrap();
        assert_eq!(bytes[0], AMF0_LONG_STRING);
    }

    #[test]
    fn test_amf0_huge_double_becomes_string() {
        let bytes = encode(&AmfValue::Double(8_589_934_592.0)).unwrap();
        assert_eq!(bytes[0], AMF0_STRING);
        assert_eq!(
            decode(bytes).unwrap(),
            AmfValue::String("8589934592".into())
        );
        // In range stays numeric
        let bytes = encode(&AmfValue::Double(4_294_967_295.0)).unwrap();
        assert_eq!(bytes[0], AMF0_NUMBER);
    }

    #[test]
    fn test_amf0_date_roundtrip() {
        let value: AmfValue = Date::new(1_431_648_000_000.0).into();
        assert_eq!(amf0_roundtrip(&value), value);
    }

    #[test]
    fn test_amf0_xml_roundtrip() {
        let value: AmfValue = Xml::new("<a><b>1</b></a>", false).into();
        assert_eq!(amf0_roundtrip(&value), value);
    }

    #[test]
    fn test_amf0_object_roundtrips() {
        let anon: AmfValue = Object::anonymous()
            .with_field("name", "test")
            .with_field("value", 123.0)
            .into();
        assert_eq!(amf0_roundtrip(&anon), anon);

        let typed: AmfValue = Object::typed("com.example.User")
            .with_field("id", 7.0)
            .with_field("email", "u@example.com")
            .into();
        assert_eq!(amf0_roundtrip(&typed), typed);
    }

    #[test]
    fn test_amf0_array_classification() {
        // {0:a, 1:b, 2:c} -> strict, dense
        let dense: AmfValue = Array::from_dense(vec![1.0.into(), 2.0.into(), 3.0.into()]).into();
        let bytes = encode(&dense).unwrap();
        assert_eq!(bytes[0], AMF0_STRICT_ARRAY);
        assert_eq!(&bytes[1..5], &[0, 0, 0, 3]);
        assert_eq!(decode(bytes).unwrap(), dense);

        // {0:a, 2:c} -> strict, sparse with an undefined filler at 1
        let mut sparse = Array::from_dense(vec![1.0.into()]);
        sparse.assoc.push(("2".into(), 3.0.into()));
        let sparse: AmfValue = sparse.into();
        let bytes = encode(&sparse).unwrap();
        assert_eq!(bytes[0], AMF0_STRICT_ARRAY);
        assert_eq!(&bytes[1..5], &[0, 0, 0, 3]);
        // Element at index 1 is the undefined marker
        assert_eq!(bytes[5 + 9], AMF0_UNDEFINED);
        assert_eq!(decode(bytes).unwrap(), sparse);

        // {0:a, x:b} -> mixed
        let mut mixed = Array::from_dense(vec![1.0.into()]);
        mixed.assoc.push(("x".into(), 2.0.into()));
        let mixed: AmfValue = mixed.into();
        let bytes = encode(&mixed).unwrap();
        assert_eq!(bytes[0], AMF0_MIXED_ARRAY);
        assert_eq!(decode(bytes).unwrap(), mixed);

        // {x:a, y:b} -> generic object
        let mut strings = Array::new();
        strings.assoc.push(("x".into(), 1.0.into()));
        strings.assoc.push(("y".into(), 2.0.into()));
        let bytes = encode(&strings.clone().into()).unwrap();
        assert_eq!(bytes[0], AMF0_OBJECT);
        let decoded = decode(bytes).unwrap();
        let obj = decoded.as_object().unwrap();
        assert_eq!(obj.field("x"), Some(&AmfValue::Double(1.0)));
        assert_eq!(obj.field("y"), Some(&AmfValue::Double(2.0)));

        // Negative keys force the mixed form
        let mut negative = Array::from_dense(vec![1.0.into()]);
        negative.assoc.push(("-1".into(), 2.0.into()));
        let negative: AmfValue = negative.into();
        let bytes = encode(&negative).unwrap();
        assert_eq!(bytes[0], AMF0_MIXED_ARRAY);
        assert_eq!(decode(bytes).unwrap(), negative);
    }

    #[test]
    fn test_amf0_sparse_gap_at_index_zero() {
        let mut sparse = Array::new();
        sparse.assoc.push(("1".into(), 1.0.into()));
        let sparse: AmfValue = sparse.into();
        let bytes = encode(&sparse).unwrap();
        assert_eq!(bytes[0], AMF0_STRICT_ARRAY);
        assert_eq!(&bytes[1..5], &[0, 0, 0, 2]);
        assert_eq!(bytes[5], AMF0_UNDEFINED);
        assert_eq!(decode(bytes).unwrap(), sparse);
    }

    #[test]
    fn test_amf0_reference_identity() {
        let shared: AmfValue = Object::anonymous().with_field("k", 1.0).into();
        let outer: AmfValue =
            Array::from_dense(vec![shared.clone(), shared.clone()]).into();
        let bytes = encode(&outer).unwrap();

        // Second occurrence is a 16-bit reference to table index 1 (the
        // array itself occupies index 0)
        let tail = &bytes[bytes.len() - 3..];
        assert_eq!(tail, &[AMF0_REFERENCE, 0x00, 0x01]);

        let decoded = decode(bytes).unwrap();
        let arr = decoded.as_array().unwrap();
        match (&arr.dense[0], &arr.dense[1]) {
            (AmfValue::Object(a), AmfValue::Object(b)) => assert!(Arc::ptr_eq(a, b)),
            other => panic!("expected two objects, got {:?}", other),
        }
    }

    #[test]
    fn test_amf3_scalar_roundtrips() {
        for value in [
            AmfValue::Null,
            AmfValue::Boolean(true),
            AmfValue::Boolean(false),
            AmfValue::Integer(0),
            AmfValue::Integer(-1),
            AmfValue::Integer(INT28_MAX),
            AmfValue::Integer(INT28_MIN),
            AmfValue::Double(3.25),
            AmfValue::String("".into()),
            AmfValue::String("käse".into()),
        ] {
            assert_eq!(amf3_roundtrip(&value), value);
        }
        // Undefined collapses to null on decode
        assert_eq!(amf3_roundtrip(&AmfValue::Undefined), AmfValue::Null);
    }

    #[test]
    fn test_amf3_integer_overflow_becomes_double() {
        let value = AmfValue::Integer(INT28_MAX + 1);
        let bytes = encode_amf3(&value).unwrap();
        assert_eq!(bytes[0], AMF3_DOUBLE);
        assert_eq!(
            decode_amf3(bytes).unwrap(),
            AmfValue::Double((INT28_MAX + 1) as f64)
        );
    }

    #[test]
    fn test_amf3_string_table() {
        let value: AmfValue = Array::from_dense(vec![
            AmfValue::String("repeat".into()),
            AmfValue::String("repeat".into()),
        ])
        .into();
        let bytes = encode_amf3(&value).unwrap();
        // marker + u29(0x01|...) header + "repeat" inline once, then
        // marker + reference 0x00
        assert_eq!(&bytes[bytes.len() - 2..], &[AMF3_STRING, 0x00]);
        assert_eq!(decode_amf3(bytes).unwrap(), value);
    }

    #[test]
    fn test_amf3_complex_roundtrips() {
        let values: Vec<AmfValue> = vec![
            Date::new(1_431_648_000_000.5).into(),
            Xml::new("<a/>", true).into(),
            Xml::new("<a/>", false).into(),
            ByteArray::new(vec![0u8, 1, 2, 250]).into(),
            Vector {
                fixed: true,
                data: VectorData::Int(vec![i32::MIN, -1, 0, i32::MAX]),
            }
            .into(),
            Vector {
                fixed: false,
                data: VectorData::UInt(vec![0, 1, u32::MAX]),
            }
            .into(),
            Vector {
                fixed: false,
                data: VectorData::Double(vec![0.5, -0.5]),
            }
            .into(),
            Vector {
                fixed: false,
                data: VectorData::Object {
                    class_name: "".into(),
                    elements: vec![Object::anonymous().with_field("a", 1.0).into()],
                },
            }
            .into(),
        ];
        for value in values {
            assert_eq!(amf3_roundtrip(&value), value);
        }
    }

    #[test]
    fn test_amf3_xml_variants_keep_their_tags() {
        let doc: AmfValue = Xml::new("<a/>", true).into();
        assert_eq!(encode_amf3(&doc).unwrap()[0], AMF3_XML_DOCUMENT);
        let element: AmfValue = Xml::new("<a/>", false).into();
        assert_eq!(encode_amf3(&element).unwrap()[0], AMF3_XML);
    }

    #[test]
    fn test_amf3_array_roundtrips() {
        let dense: AmfValue = Array::from_dense(vec![1.into(), 2.into()]).into();
        assert_eq!(amf3_roundtrip(&dense), dense);

        let mut mixed = Array::from_dense(vec![1.into()]);
        mixed.assoc.push(("x".into(), 2.into()));
        let mixed: AmfValue = mixed.into();
        assert_eq!(amf3_roundtrip(&mixed), mixed);

        let mut assoc_only = Array::new();
        assoc_only.assoc.push(("k".into(), AmfValue::Null));
        let assoc_only: AmfValue = assoc_only.into();
        assert_eq!(amf3_roundtrip(&assoc_only), assoc_only);
    }

    #[test]
    fn test_amf3_object_roundtrips() {
        let anon: AmfValue = Object::anonymous()
            .with_field("a", 1.0)
            .with_field("b", "two")
            .into();
        assert_eq!(amf3_roundtrip(&anon), anon);

        let sealed: AmfValue = Object::typed("com.example.Point")
            .with_field("x", 1.0)
            .with_field("y", 2.0)
            .into();
        assert_eq!(amf3_roundtrip(&sealed), sealed);

        let mut dynamic = Object::typed("com.example.Bag");
        dynamic.dynamic = true;
        dynamic.fields.push(("whatever".into(), AmfValue::Null));
        let dynamic: AmfValue = dynamic.into();
        assert_eq!(amf3_roundtrip(&dynamic), dynamic);
    }

    #[test]
    fn test_amf3_externalizable_roundtrip() {
        let mut ext = Object::typed("com.example.Custom");
        ext.externalizable = true;
        ext.externalized = Some(Object::anonymous().with_field("inner", 1.0).into());
        let ext: AmfValue = ext.into();
        assert_eq!(amf3_roundtrip(&ext), ext);
    }

    #[test]
    fn test_amf3_collection_classes_decode_to_payload() {
        let mut coll = Object::typed(ARRAY_COLLECTION_CLASS);
        coll.externalizable = true;
        coll.externalized = Some(Array::from_dense(vec![1.into(), 2.into()]).into());
        let bytes = encode_amf3(&coll.into()).unwrap();
        // The wrapper disappears; the payload is the decoded value
        let decoded = decode_amf3(bytes).unwrap();
        assert_eq!(
            decoded,
            Array::from_dense(vec![1.into(), 2.into()]).into()
        );
    }

    #[test]
    fn test_amf3_trait_cache_reuse() {
        let first: AmfValue = Object::typed("com.example.Point")
            .with_field("x", 1.0)
            .with_field("y", 2.0)
            .into();
        let second: AmfValue = Object::typed("com.example.Point")
            .with_field("x", 3.0)
            .with_field("y", 4.0)
            .into();
        let both: AmfValue = Array::from_dense(vec![first.clone(), second.clone()]).into();
        let bytes = encode_amf3(&both).unwrap();

        // One inline definition, then a compact trait reference: the class
        // name and property names appear exactly once
        let haystack = bytes.as_ref();
        let needle = b"com.example.Point";
        let occurrences = haystack
            .windows(needle.len())
            .filter(|w| w == needle)
            .count();
        assert_eq!(occurrences, 1);

        let decoded = decode_amf3(bytes).unwrap();
        let arr = decoded.as_array().unwrap();
        assert_eq!(arr.dense[0], first);
        assert_eq!(arr.dense[1], second);
    }

    #[test]
    fn test_amf3_trait_mismatch_redefines() {
        let first: AmfValue = Object::typed("com.example.Point")
            .with_field("x", 1.0)
            .into();
        let second: AmfValue = Object::typed("com.example.Point")
            .with_field("x", 2.0)
            .with_field("z", 3.0)
            .into();
        let both: AmfValue = Array::from_dense(vec![first, second]).into();
        let bytes = encode_amf3(&both).unwrap();

        let decoded = decode_amf3(bytes).unwrap();
        let arr = decoded.as_array().unwrap();
        assert_eq!(arr.dense[0].get_number("x"), Some(1.0));
        assert_eq!(arr.dense[1].get_number("x"), Some(2.0));
        assert_eq!(arr.dense[1].get_number("z"), Some(3.0));
    }

    #[test]
    fn test_amf3_reference_identity() {
        let shared: AmfValue = ByteArray::new(vec![1u8, 2, 3]).into();
        let outer: AmfValue = Array::from_dense(vec![shared.clone(), shared]).into();
        let decoded = amf3_roundtrip(&outer);
        let arr = decoded.as_array().unwrap();
        match (&arr.dense[0], &arr.dense[1]) {
            (AmfValue::ByteArray(a), AmfValue::ByteArray(b)) => assert!(Arc::ptr_eq(a, b)),
            other => panic!("expected byte arrays, got {:?}", other),
        }
    }

    #[test]
    fn test_avmplus_escape() {
        let mut encoder = Encoder::new(Settings::default());
        encoder.set_avm_plus(true);

        // Scalars stay AMF0
        let bytes = encoder.encode(&AmfValue::Double(1.0)).unwrap();
        assert_eq!(bytes[0], AMF0_NUMBER);

        // Complex values escape to AMF3 for the rest of the value
        let value: AmfValue = Object::anonymous().with_field("n", 1.0).into();
        let bytes = encoder.encode(&value).unwrap();
        assert_eq!(bytes[0], AMF0_AVMPLUS);
        assert_eq!(bytes[1], AMF3_OBJECT);
        assert_eq!(decode(bytes).unwrap(), value);
    }

    #[test]
    fn test_amf0_unrepresentable_shapes() {
        let blob: AmfValue = ByteArray::new(vec![1u8]).into();
        assert!(matches!(
            encode(&blob),
            Err(AmfError::UnsupportedValueShape(_))
        ));

        let vector: AmfValue = Vector {
            fixed: false,
            data: VectorData::Int(vec![1]),
        }
        .into();
        assert!(matches!(
            encode(&vector),
            Err(AmfError::UnsupportedValueShape(_))
        ));
    }

    #[test]
    fn test_mixed_array_as_object_policy() {
        let mut settings = Settings::default();
        settings.mixed_array_as_object = true;
        let mut encoder = Encoder::new(settings);

        let mut nsnd = Array::from_dense(vec![1.into()]);
        nsnd.assoc.push(("x".into(), 2.into()));
        let bytes = encoder.encode_amf3(&nsnd.into()).unwrap();
        assert_eq!(bytes[0], AMF3_OBJECT);

        let decoded = decode_amf3(bytes).unwrap();
        let obj = decoded.as_object().unwrap();
        assert_eq!(obj.field("0"), Some(&AmfValue::Integer(1)));
        assert_eq!(obj.field("x"), Some(&AmfValue::Integer(2)));

        // A plain dense array is unaffected by the policy
        let dense: AmfValue = Array::from_dense(vec![1.into()]).into();
        let bytes = encoder.encode_amf3(&dense).unwrap();
        assert_eq!(bytes[0], AMF3_ARRAY);
    }

    #[test]
    fn test_explicit_type_field_is_stripped() {
        let value: AmfValue = Object::typed("com.example.User")
            .with_field(REMOTE_CLASS_FIELD, "com.example.User")
            .with_field("id", 1.0)
            .into();
        let decoded = amf3_roundtrip(&value);
        let obj = decoded.as_object().unwrap();
        assert_eq!(obj.class_name.as_deref(), Some("com.example.User"));
        assert!(obj.field(REMOTE_CLASS_FIELD).is_none());
        assert_eq!(obj.field("id"), Some(&AmfValue::Double(1.0)));
    }
}
