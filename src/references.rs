//! Per-top-level reference tables
//!
//! AMF avoids re-encoding repeated data by tracking previously seen values
//! and emitting back-references. AMF0 uses one flat table for arrays and
//! objects; AMF3 uses three independent spaces: strings (value-keyed),
//! objects (identity-keyed, shared by dates, byte arrays, XML, vectors,
//! arrays, and records), and traits (class-name-keyed).
//!
//! Indices are assigned in first-seen order and are only valid within one
//! top-level read or write; both sides reset their tables before every
//! top-level value.
//!
//! The encoder tables carry a capacity ceiling: once full, further distinct
//! values are still written inline but no longer registered. This bounds
//! memory on pathologically large graphs and matches the limit used by
//! interoperating peers, so it must not be raised casually.

use std::collections::HashMap;
use std::sync::Arc;

use crate::constants::MAX_STORED_REFERENCES;
use crate::error::{AmfError, Result};
use crate::traits::TraitInfo;
use crate::value::AmfValue;

/// Decoder-side tables
///
/// Container slots are reserved before the container's body is read and
/// committed afterwards, so a cyclic back-reference resolves to the `Null`
/// placeholder instead of recursing.
pub(crate) struct DecoderReferences {
    objects0: Vec<AmfValue>,
    strings: Vec<String>,
    objects: Vec<AmfValue>,
    traits: Vec<Arc<TraitInfo>>,
}

impl DecoderReferences {
    pub fn new() -> Self {
        Self {
            objects0: Vec::new(),
            strings: Vec::new(),
            objects: Vec::new(),
            traits: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.objects0.clear();
        self.strings.clear();
        self.objects.clear();
        self.traits.clear();
    }

    pub fn reserve_amf0(&mut self) -> usize {
        self.objects0.push(AmfValue::Null);
        self.objects0.len() - 1
    }

    pub fn commit_amf0(&mut self, index: usize, value: AmfValue) {
        self.objects0[index] = value;
    }

    pub fn amf0(&self, index: u16) -> Result<AmfValue> {
        self.objects0
            .get(index as usize)
            .cloned()
            .ok_or(AmfError::UndefinedReference(index as u32))
    }

    pub fn push_string(&mut self, value: String) {
        self.strings.push(value);
    }

    pub fn string(&self, index: u32) -> Result<String> {
        self.strings
            .get(index as usize)
            .cloned()
            .ok_or(AmfError::UndefinedReference(index))
    }

    pub fn reserve_object(&mut self) -> usize {
        self.objects.push(AmfValue::Null);
        self.objects.len() - 1
    }

    /// Register a leaf value that has no body to recurse into
    pub fn push_object(&mut self, value: AmfValue) {
        self.objects.push(value);
    }

    pub fn commit_object(&mut self, index: usize, value: AmfValue) {
        self.objects[index] = value;
    }

    pub fn object(&self, index: u32) -> Result<AmfValue> {
        self.objects
            .get(index as usize)
            .cloned()
            .ok_or(AmfError::UndefinedReference(index))
    }

    pub fn push_trait(&mut self, info: Arc<TraitInfo>) {
        self.traits.push(info);
    }

    pub fn get_trait(&self, index: u32) -> Result<Arc<TraitInfo>> {
        self.traits
            .get(index as usize)
            .cloned()
            .ok_or(AmfError::UndefinedReference(index))
    }
}

/// Encoder-side tables
///
/// Complex values are compared by handle identity, so only the same value
/// instance produces a back-reference; equal but distinct values encode
/// inline. Registration happens before the encoder recurses into a
/// container's members, which turns self-references into back-references
/// instead of unbounded recursion.
pub(crate) struct EncoderReferences {
    objects0: Vec<AmfValue>,
    strings: HashMap<String, u32>,
    objects: Vec<AmfValue>,
    pub traits: TraitCache,
}

impl EncoderReferences {
    pub fn new() -> Self {
        Self {
            objects0: Vec::new(),
            strings: HashMap::new(),
            objects: Vec::new(),
            traits: TraitCache::new(),
        }
    }

    pub fn reset(&mut self) {
        self.objects0.clear();
        self.strings.clear();
        self.objects.clear();
        self.traits.reset();
    }

    /// AMF0 table: existing index for the value's identity, or `None`
    /// after registering it (capacity permitting)
    pub fn amf0_check(&mut self, value: &AmfValue) -> Option<u16> {
        Self::check(&mut self.objects0, value).map(|idx| idx as u16)
    }

    /// AMF3 object table: same contract as [`Self::amf0_check`]
    pub fn object_check(&mut self, value: &AmfValue) -> Option<u32> {
        Self::check(&mut self.objects, value).map(|idx| idx as u32)
    }

    fn check(table: &mut Vec<AmfValue>, value: &AmfValue) -> Option<usize> {
        let id = value.identity()?;
        if let Some(idx) = table.iter().position(|seen| seen.identity() == Some(id)) {
            return Some(idx);
        }
        if table.len() <= MAX_STORED_REFERENCES {
            table.push(value.clone());
        } else {
            tracing::trace!("reference table full, writing value inline");
        }
        None
    }

    /// AMF3 string table: existing index, or `None` after registering
    pub fn string_check(&mut self, value: &str) -> Option<u32> {
        if let Some(&idx) = self.strings.get(value) {
            return Some(idx);
        }
        if self.strings.len() <= MAX_STORED_REFERENCES {
            let idx = self.strings.len() as u32;
            self.strings.insert(value.to_string(), idx);
        }
        None
    }
}

/// Class-name-keyed cache of written trait definitions
///
/// Anonymous records and mismatch redefinitions consume an index without a
/// reusable entry, keeping the writer's indices aligned with the trait
/// table a decoder builds from the same stream.
pub(crate) struct TraitCache {
    by_class: HashMap<String, CachedTrait>,
    count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CachedTrait {
    pub index: u32,
    pub properties: Vec<String>,
    pub dynamic: bool,
    pub externalizable: bool,
}

impl TraitCache {
    pub fn new() -> Self {
        Self {
            by_class: HashMap::new(),
            count: 0,
        }
    }

    pub fn reset(&mut self) {
        self.by_class.clear();
        self.count = 0;
    }

    /// Cached trait for a class, if its property list and externalizable
    /// flag match exactly
    ///
    /// A mismatch is reported as `TraitSchemaMismatch`; the caller recovers
    /// by writing a fresh inline definition, never by reusing the entry.
    pub fn reference(
        &self,
        class_name: &str,
        properties: &[String],
        externalizable: bool,
    ) -> Result<Option<CachedTrait>> {
        match self.by_class.get(class_name) {
            None => Ok(None),
            Some(cached)
                if cached.properties == properties && cached.externalizable == externalizable =>
            {
                Ok(Some(cached.clone()))
            }
            Some(_) => Err(AmfError::TraitSchemaMismatch(class_name.to_string())),
        }
    }

    pub fn register(
        &mut self,
        class_name: &str,
        properties: Vec<String>,
        dynamic: bool,
        externalizable: bool,
    ) {
        let entry = CachedTrait {
            index: self.count,
            properties,
            dynamic,
            externalizable,
        };
        self.by_class.insert(class_name.to_string(), entry);
        self.count += 1;
    }

    /// Consume an index without a reusable entry
    pub fn register_placeholder(&mut self) {
        self.count += 1;
    }
}
