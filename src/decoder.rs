//! AMF0/AMF3 deserializer
//!
//! One decoder drives both formats. A top-level read starts in AMF0 (or in
//! AMF3 when pre-selected by the caller, mirroring the envelope-level
//! `version >= 3` decision) and dispatches on the leading type tag; the
//! AMF0 AVM+ tag (0x11) switches the remainder of that one top-level value
//! to AMF3. The mode never leaks between top-level reads.
//!
//! Reference tables are reset at the start of every top-level read, so
//! back-reference indices are scoped to a single header or body value.

use std::sync::Arc;

use bytes::Bytes;

use crate::buffer::ByteReader;
use crate::constants::*;
use crate::error::{AmfError, Result};
use crate::references::DecoderReferences;
use crate::resolver::{DefaultResolver, Resolution, TypeResolver};
use crate::settings::{DateVariant, Settings, XmlVariant};
use crate::traits::TraitInfo;
use crate::value::{AmfValue, Array, ByteArray, Date, Object, Vector, VectorData, Xml};

/// AMF deserializer
pub struct Decoder {
    settings: Settings,
    resolver: Box<dyn TypeResolver>,
    avm_plus: bool,
    refs: DecoderReferences,
}

impl Decoder {
    pub fn new(settings: Settings) -> Self {
        let resolver = Box::new(DefaultResolver::from_settings(&settings));
        Self::with_resolver(settings, resolver)
    }

    /// Decoder with an application-supplied class-name resolver
    pub fn with_resolver(settings: Settings, resolver: Box<dyn TypeResolver>) -> Self {
        Self {
            settings,
            resolver,
            avm_plus: false,
            refs: DecoderReferences::new(),
        }
    }

    /// Read one top-level value, starting in AMF0
    pub fn decode(&mut self, r: &mut ByteReader) -> Result<AmfValue> {
        self.refs.reset();
        self.avm_plus = false;
        self.read_value(r)
    }

    /// Read one top-level value, starting in AMF3
    pub fn decode_amf3(&mut self, r: &mut ByteReader) -> Result<AmfValue> {
        self.refs.reset();
        self.avm_plus = true;
        self.read_value(r)
    }

    fn read_value(&mut self, r: &mut ByteReader) -> Result<AmfValue> {
        let tag = r.read_u8()?;
        if self.avm_plus {
            self.read_amf3_value(r, tag)
        } else {
            self.read_amf0_value(r, tag)
        }
    }

    // ========================================================================
    // AMF0
    // ========================================================================

    fn read_amf0_value(&mut self, r: &mut ByteReader, tag: u8) -> Result<AmfValue> {
        match tag {
            AMF0_AVMPLUS => {
                self.avm_plus = true;
                self.read_value(r)
            }
            AMF0_NUMBER => Ok(AmfValue::Double(r.read_f64()?)),
            AMF0_BOOLEAN => Ok(AmfValue::Boolean(r.read_bool()?)),
            AMF0_STRING => Ok(AmfValue::String(r.read_utf()?)),
            AMF0_LONG_STRING => Ok(AmfValue::String(r.read_long_utf()?)),
            AMF0_NULL => Ok(AmfValue::Null),
            AMF0_UNDEFINED => Ok(AmfValue::Undefined),
            AMF0_OBJECT => self.read_amf0_object(r, String::new()),
            AMF0_TYPED_OBJECT => {
                let class_name = r.read_utf()?;
                self.read_amf0_object(r, class_name)
            }
            AMF0_REFERENCE => {
                let index = r.read_u16()?;
                self.refs.amf0(index)
            }
            AMF0_STRICT_ARRAY => self.read_amf0_strict_array(r),
            AMF0_MIXED_ARRAY => self.read_amf0_mixed_array(r),
            AMF0_DATE => {
                let millis = r.read_f64()?;
                // Timezone offset, always zero on the wire
                r.skip(2)?;
                Ok(self.make_date(millis))
            }
            AMF0_XML_DOCUMENT => {
                let data = r.read_long_utf()?;
                Ok(self.make_xml(data, false))
            }
            AMF0_OBJECT_END => Err(AmfError::UnexpectedTerminator),
            // movieclip, recordset, unsupported, and anything unknown
            other => Err(AmfError::UnsupportedTypeTag(other)),
        }
    }

    fn read_amf0_object(&mut self, r: &mut ByteReader, class_name: String) -> Result<AmfValue> {
        let resolution = self.resolver.resolve(&class_name);
        let index = self.refs.reserve_amf0();
        let mut fields = Vec::new();
        loop {
            let key = r.read_utf()?;
            let tag = r.read_u8()?;
            if tag == AMF0_OBJECT_END {
                break;
            }
            let value = self.read_amf0_value(r, tag)?;
            fields.push((key, value));
        }
        let dynamic = matches!(resolution, Resolution::Record { class_name: None });
        let value = self.finish_record(resolution, dynamic, false, fields, None);
        self.refs.commit_amf0(index, value.clone());
        Ok(value)
    }

    /// Strict array: 32-bit count, then that many values positionally.
    /// An `Undefined` element tag is a gap: the index is skipped, not
    /// materialized. Entries after a gap keep their original index in the
    /// associative part.
    fn read_amf0_strict_array(&mut self, r: &mut ByteReader) -> Result<AmfValue> {
        let len = r.read_u32()? as usize;
        let index = self.refs.reserve_amf0();
        let mut dense = Vec::with_capacity(len.min(1024));
        let mut assoc = Vec::new();
        let mut gap_seen = false;
        for i in 0..len {
            if r.peek_u8(0)? == AMF0_UNDEFINED {
                r.skip(1)?;
                gap_seen = true;
                continue;
            }
            let value = self.read_value(r)?;
            if gap_seen {
                assoc.push((i.to_string(), value));
            } else {
                dense.push(value);
            }
        }
        let value: AmfValue = Array { dense, assoc }.into();
        self.refs.commit_amf0(index, value.clone());
        Ok(value)
    }

    /// Mixed (associative) array: the 32-bit entry count is a hint and is
    /// skipped; pairs are read until the object-end terminator. A run of
    /// consecutive integer keys from zero is hoisted back into the dense
    /// part.
    fn read_amf0_mixed_array(&mut self, r: &mut ByteReader) -> Result<AmfValue> {
        let index = self.refs.reserve_amf0();
        r.skip(4)?;
        let mut dense: Vec<AmfValue> = Vec::new();
        let mut assoc = Vec::new();
        loop {
            let key = r.read_utf()?;
            let tag = r.read_u8()?;
            if tag == AMF0_OBJECT_END {
                break;
            }
            let value = self.read_amf0_value(r, tag)?;
            if assoc.is_empty() && parse_index(&key) == Some(dense.len() as i64) {
                dense.push(value);
            } else {
                assoc.push((key, value));
            }
        }
        let value: AmfValue = Array { dense, assoc }.into();
        self.refs.commit_amf0(index, value.clone());
        Ok(value)
    }

    // ========================================================================
    // AMF3
    // ========================================================================

    fn read_amf3_value(&mut self, r: &mut ByteReader, tag: u8) -> Result<AmfValue> {
        match tag {
            AMF3_UNDEFINED | AMF3_NULL => Ok(AmfValue::Null),
            AMF3_FALSE => Ok(AmfValue::Boolean(false)),
            AMF3_TRUE => Ok(AmfValue::Boolean(true)),
            AMF3_INTEGER => Ok(AmfValue::Integer(r.read_i29()?)),
            AMF3_DOUBLE => Ok(AmfValue::Double(r.read_f64()?)),
            AMF3_STRING => Ok(AmfValue::String(self.read_amf3_string(r)?)),
            AMF3_XML_DOCUMENT => self.read_amf3_xml(r, true),
            AMF3_XML => self.read_amf3_xml(r, false),
            AMF3_DATE => self.read_amf3_date(r),
            AMF3_ARRAY => self.read_amf3_array(r),
            AMF3_OBJECT => self.read_amf3_object(r),
            AMF3_BYTE_ARRAY => self.read_amf3_byte_array(r),
            AMF3_VECTOR_INT | AMF3_VECTOR_UINT | AMF3_VECTOR_DOUBLE | AMF3_VECTOR_OBJECT => {
                self.read_amf3_vector(r, tag)
            }
            // Dictionary is deliberately unsupported: failing fast beats
            // silently dropping keys
            other => Err(AmfError::UnsupportedTypeTag(other)),
        }
    }

    /// String: the low bit of the U29 prefix selects reference vs inline.
    /// The zero-length inline string is the empty-string sentinel and is
    /// never registered; every other string is.
    fn read_amf3_string(&mut self, r: &mut ByteReader) -> Result<String> {
        let prefix = r.read_u29()?;
        if prefix & 1 == 0 {
            return self.refs.string(prefix >> 1);
        }
        let len = (prefix >> 1) as usize;
        if len == 0 {
            return Ok(String::new());
        }
        let bytes = r.read_bytes(len)?;
        let value = String::from_utf8(bytes.to_vec()).map_err(|_| AmfError::InvalidUtf8)?;
        self.refs.push_string(value.clone());
        Ok(value)
    }

    fn read_amf3_date(&mut self, r: &mut ByteReader) -> Result<AmfValue> {
        let prefix = r.read_u29()?;
        if prefix & 1 == 0 {
            return self.refs.object(prefix >> 1);
        }
        let millis = r.read_f64()?;
        let value = self.make_date(millis);
        self.refs.push_object(value.clone());
        Ok(value)
    }

    fn read_amf3_xml(&mut self, r: &mut ByteReader, document: bool) -> Result<AmfValue> {
        let prefix = r.read_u29()?;
        if prefix & 1 == 0 {
            return self.refs.object(prefix >> 1);
        }
        let len = (prefix >> 1) as usize;
        let bytes = r.read_bytes(len)?;
        let data = String::from_utf8(bytes.to_vec()).map_err(|_| AmfError::InvalidUtf8)?;
        let value = self.make_xml(data, document);
        self.refs.push_object(value.clone());
        Ok(value)
    }

    fn read_amf3_byte_array(&mut self, r: &mut ByteReader) -> Result<AmfValue> {
        let prefix = r.read_u29()?;
        if prefix & 1 == 0 {
            return self.refs.object(prefix >> 1);
        }
        let len = (prefix >> 1) as usize;
        let bytes = r.read_bytes(len)?;
        let value: AmfValue = ByteArray::new(bytes).into();
        self.refs.push_object(value.clone());
        Ok(value)
    }

    /// Array: associative pairs terminated by the empty-string sentinel,
    /// then the dense elements. The order is fixed by the wire format.
    fn read_amf3_array(&mut self, r: &mut ByteReader) -> Result<AmfValue> {
        let prefix = r.read_u29()?;
        if prefix & 1 == 0 {
            return self.refs.object(prefix >> 1);
        }
        let len = (prefix >> 1) as usize;
        let index = self.refs.reserve_object();
        let mut assoc = Vec::new();
        loop {
            let key = self.read_amf3_string(r)?;
            if key.is_empty() {
                break;
            }
            let value = self.read_value(r)?;
            assoc.push((key, value));
        }
        let mut dense = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            dense.push(self.read_value(r)?);
        }
        let value: AmfValue = Array { dense, assoc }.into();
        self.refs.commit_object(index, value.clone());
        Ok(value)
    }

    fn read_amf3_object(&mut self, r: &mut ByteReader) -> Result<AmfValue> {
        let prefix = r.read_u29()?;
        if prefix & 1 == 0 {
            return self.refs.object(prefix >> 1);
        }
        let ti = self.read_amf3_traits(r, prefix)?;
        let resolution = self.resolver.resolve(&ti.class_name);
        let index = self.refs.reserve_object();

        if ti.externalizable {
            // For the legacy collection wrappers the externalized payload
            // is the value, not a field of it
            if ti.class_name == ARRAY_COLLECTION_CLASS || ti.class_name == OBJECT_PROXY_CLASS {
                let value = self.read_value(r)?;
                self.refs.commit_object(index, value.clone());
                return Ok(value);
            }
            tracing::debug!(
                class = %ti.class_name,
                "unrecognized externalizable record, attaching raw payload"
            );
            let payload = self.read_value(r)?;
            let value = self.finish_record(resolution, ti.dynamic, true, Vec::new(), Some(payload));
            self.refs.commit_object(index, value.clone());
            return Ok(value);
        }

        let mut fields = Vec::with_capacity(ti.properties.len());
        for name in ti.properties.iter() {
            let value = self.read_value(r)?;
            fields.push((name.clone(), value));
        }
        if ti.dynamic {
            loop {
                let key = self.read_amf3_string(r)?;
                if key.is_empty() {
                    break;
                }
                let value = self.read_value(r)?;
                fields.push((key, value));
            }
        }
        let value = self.finish_record(resolution, ti.dynamic, false, fields, None);
        self.refs.commit_object(index, value.clone());
        Ok(value)
    }

    /// Traits: bits 0-1 of the prefix select trait reference vs inline
    /// definition; an inline definition carries the externalizable and
    /// dynamic flags in bits 2-3 and the sealed property count in bits 4+.
    fn read_amf3_traits(&mut self, r: &mut ByteReader, prefix: u32) -> Result<Arc<TraitInfo>> {
        if prefix & 3 == 1 {
            return self.refs.get_trait(prefix >> 2);
        }
        let externalizable = prefix & AMF3_TRAIT_EXTERNALIZABLE != 0;
        let dynamic = prefix & AMF3_TRAIT_DYNAMIC != 0;
        let count = (prefix >> 4) as usize;
        let class_name = self.read_amf3_string(r)?;
        let mut ti = TraitInfo::new(class_name, dynamic, externalizable);
        for _ in 0..count {
            ti.properties.push(self.read_amf3_string(r)?);
        }
        let ti = Arc::new(ti);
        self.refs.push_trait(ti.clone());
        Ok(ti)
    }

    fn read_amf3_vector(&mut self, r: &mut ByteReader, tag: u8) -> Result<AmfValue> {
        let prefix = r.read_u29()?;
        if prefix & 1 == 0 {
            return self.refs.object(prefix >> 1);
        }
        let len = (prefix >> 1) as usize;
        let fixed = r.read_bool()?;
        let index = self.refs.reserve_object();
        let data = match tag {
            AMF3_VECTOR_INT => {
                let mut elements = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    elements.push(r.read_i32()?);
                }
                VectorData::Int(elements)
            }
            AMF3_VECTOR_UINT => {
                let mut elements = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    elements.push(r.read_u32()?);
                }
                VectorData::UInt(elements)
            }
            AMF3_VECTOR_DOUBLE => {
                let mut elements = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    elements.push(r.read_f64()?);
                }
                VectorData::Double(elements)
            }
            _ => {
                let class_name = self.read_amf3_string(r)?;
                let mut elements = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    elements.push(self.read_value(r)?);
                }
                VectorData::Object {
                    class_name,
                    elements,
                }
            }
        };
        let value: AmfValue = Vector { fixed, data }.into();
        self.refs.commit_object(index, value.clone());
        Ok(value)
    }

    // ========================================================================
    // Shared construction
    // ========================================================================

    fn finish_record(
        &self,
        resolution: Resolution,
        dynamic: bool,
        externalizable: bool,
        fields: Vec<(String, AmfValue)>,
        externalized: Option<AmfValue>,
    ) -> AmfValue {
        match resolution {
            Resolution::Record { class_name } => Object {
                class_name,
                dynamic,
                externalizable,
                fields,
                externalized,
            }
            .into(),
            Resolution::Map { class_name } => {
                let mut assoc = Vec::with_capacity(fields.len() + 2);
                if let Some(name) = class_name {
                    assoc.push((REMOTE_CLASS_FIELD.to_string(), name.into()));
                }
                assoc.extend(fields);
                if let Some(payload) = externalized {
                    assoc.push((EXTERNALIZED_DATA_FIELD.to_string(), payload));
                }
                Array {
                    dense: Vec::new(),
                    assoc,
                }
                .into()
            }
        }
    }

    fn make_date(&self, millis: f64) -> AmfValue {
        let millis = match self.settings.date_variant {
            DateVariant::Raw => millis,
            DateVariant::Utc => Date::new(millis)
                .to_datetime()
                .map(|dt| dt.timestamp_millis() as f64)
                .unwrap_or(millis),
        };
        Date::new(millis).into()
    }

    fn make_xml(&self, data: String, document: bool) -> AmfValue {
        let document = match self.settings.xml_variant {
            XmlVariant::Preserve => document,
            XmlVariant::Document => true,
        };
        Xml::new(data, document).into()
    }
}

/// Parse a key as a canonical decimal integer: an optional minus, no
/// leading zeros (except `"0"` itself). Anything else is a string key.
pub(crate) fn parse_index(key: &str) -> Option<i64> {
    let digits = key.strip_prefix('-').unwrap_or(key);
    if digits.is_empty() || (digits.len() > 1 && digits.starts_with('0')) {
        return None;
    }
    if digits == "0" && key.starts_with('-') {
        return None;
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

/// Decode a single top-level value starting in AMF0, with defaults
pub fn decode(data: impl Into<Bytes>) -> Result<AmfValue> {
    let mut reader = ByteReader::new(data);
    Decoder::new(Settings::default()).decode(&mut reader)
}

/// Decode a single top-level value starting in AMF3, with defaults
pub fn decode_amf3(data: impl Into<Bytes>) -> Result<AmfValue> {
    let mut reader = ByteReader::new(data);
    Decoder::new(Settings::default()).decode_amf3(&mut reader)
}
