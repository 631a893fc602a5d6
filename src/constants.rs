//! AMF wire-format constants
//!
//! Reference: AMF0 File Format Specification (amf0-file-format-spec.pdf)
//! Reference: AMF3 Specification (amf-file-format-spec.pdf)

// ============================================================================
// AMF0 type markers
// ============================================================================

pub const AMF0_NUMBER: u8 = 0x00;
pub const AMF0_BOOLEAN: u8 = 0x01;
pub const AMF0_STRING: u8 = 0x02;
pub const AMF0_OBJECT: u8 = 0x03;
pub const AMF0_MOVIECLIP: u8 = 0x04;
pub const AMF0_NULL: u8 = 0x05;
pub const AMF0_UNDEFINED: u8 = 0x06;
pub const AMF0_REFERENCE: u8 = 0x07;
pub const AMF0_MIXED_ARRAY: u8 = 0x08;
pub const AMF0_OBJECT_END: u8 = 0x09;
pub const AMF0_STRICT_ARRAY: u8 = 0x0A;
pub const AMF0_DATE: u8 = 0x0B;
pub const AMF0_LONG_STRING: u8 = 0x0C;
pub const AMF0_UNSUPPORTED: u8 = 0x0D;
pub const AMF0_RECORDSET: u8 = 0x0E;
pub const AMF0_XML_DOCUMENT: u8 = 0x0F;
pub const AMF0_TYPED_OBJECT: u8 = 0x10;
/// AVM+ escape: the remainder of the current top-level value is AMF3
pub const AMF0_AVMPLUS: u8 = 0x11;

// ============================================================================
// AMF3 type markers
// ============================================================================

pub const AMF3_UNDEFINED: u8 = 0x00;
pub const AMF3_NULL: u8 = 0x01;
pub const AMF3_FALSE: u8 = 0x02;
pub const AMF3_TRUE: u8 = 0x03;
pub const AMF3_INTEGER: u8 = 0x04;
pub const AMF3_DOUBLE: u8 = 0x05;
pub const AMF3_STRING: u8 = 0x06;
pub const AMF3_XML_DOCUMENT: u8 = 0x07;
pub const AMF3_DATE: u8 = 0x08;
pub const AMF3_ARRAY: u8 = 0x09;
pub const AMF3_OBJECT: u8 = 0x0A;
pub const AMF3_XML: u8 = 0x0B;
pub const AMF3_BYTE_ARRAY: u8 = 0x0C;
pub const AMF3_VECTOR_INT: u8 = 0x0D;
pub const AMF3_VECTOR_UINT: u8 = 0x0E;
pub const AMF3_VECTOR_DOUBLE: u8 = 0x0F;
pub const AMF3_VECTOR_OBJECT: u8 = 0x10;
pub const AMF3_DICTIONARY: u8 = 0x11;

// ============================================================================
// AMF3 trait encoding
//
// The low bits of the U29 prefix of an object select the encoding:
//   bit 0     = 0: object reference, index in bits 1+
//   bits 0-1  = 01: trait reference, index in bits 2+
//   bits 0-1  = 11: inline trait definition
//   bit 2     = externalizable
//   bit 3     = dynamic
//   bits 4+   = sealed property count
// ============================================================================

/// Inline object + inline trait definition bits
pub const AMF3_TRAIT_INLINE: u32 = 0x03;
pub const AMF3_TRAIT_EXTERNALIZABLE: u32 = 0x04;
pub const AMF3_TRAIT_DYNAMIC: u32 = 0x08;

// ============================================================================
// Reserved field names
// ============================================================================

/// Field carrying the wire class name on generic fallback records
pub const REMOTE_CLASS_FIELD: &str = "_explicitType";

/// Field carrying the raw payload of an unrecognized externalizable record
pub const EXTERNALIZED_DATA_FIELD: &str = "_externalizedData";

/// Externalizable collection classes whose payload replaces the record itself
pub const ARRAY_COLLECTION_CLASS: &str = "flex.messaging.io.ArrayCollection";
pub const OBJECT_PROXY_CLASS: &str = "flex.messaging.io.ObjectProxy";

// ============================================================================
// Numeric limits
// ============================================================================

/// Maximum unsigned 29-bit value
pub const U29_MAX: u32 = 0x1FFF_FFFF;

/// AMF3 integer domain (29-bit signed)
pub const INT28_MAX: i32 = 268_435_455;
pub const INT28_MIN: i32 = -268_435_456;

/// AMF0 doubles above this are written as strings for peer compatibility
pub const AMF_U32_MAX: f64 = 4_294_967_295.0;

/// Short-string limit; at this length AMF0 switches to the long-string form
pub const AMF_U16_MAX: usize = 65_535;

/// Reference-table capacity. Once a table holds this many entries further
/// distinct values are written inline without being registered, matching
/// the limit used by interoperating peers.
pub const MAX_STORED_REFERENCES: usize = 1024;
