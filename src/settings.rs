//! Codec configuration
//!
//! All options here affect only the in-memory representation or the choice
//! among equivalent wire encodings; none of them changes how a stream is
//! interpreted.

/// Representation of decoded dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateVariant {
    /// Keep the wire value as-is, fractional milliseconds included
    #[default]
    Raw,
    /// Normalize through a UTC calendar timestamp, truncating to whole
    /// milliseconds
    Utc,
}

/// Representation of decoded XML fragments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum XmlVariant {
    /// Keep the document/element distinction as found on the wire
    #[default]
    Preserve,
    /// Canonicalize every fragment to the document variant
    Document,
}

/// Codec options
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Decode structured records into generic associative arrays instead
    /// of records; the wire class name is kept under `_explicitType`.
    /// Records named `flex.messaging.messages.*` always stay records.
    pub decode_object_as_map: bool,

    /// Encode AMF3 arrays that are neither strict nor dense as anonymous
    /// dynamic records instead of the associative array form
    pub mixed_array_as_object: bool,

    pub date_variant: DateVariant,

    pub xml_variant: XmlVariant,
}
