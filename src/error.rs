//! Error types for AMF encoding and decoding

use std::fmt;

/// Result type alias using the library's error type
pub type Result<T> = std::result::Result<T, AmfError>;

/// AMF encoding/decoding errors
///
/// Every error is terminal for the top-level read or write in progress.
/// Nothing is retried internally and no partial value is returned; after a
/// failure the cursor position is unspecified and must not be reused.
#[derive(Debug, Clone, PartialEq)]
pub enum AmfError {
    /// A read or skip would pass the end of the buffer
    OutOfBounds { needed: usize, remaining: usize },
    /// Unknown type tag, or a tag that is recognized but not supported
    /// (AMF0 movieclip/recordset/unsupported, AMF3 dictionary)
    UnsupportedTypeTag(u8),
    /// Object-end tag encountered outside an open object or array
    UnexpectedTerminator,
    /// String, object, or trait reference index beyond the table size
    UndefinedReference(u32),
    /// Value does not fit the 29-bit variable-length integer encoding
    IntegerOutOfRange(u64),
    /// Cached trait properties diverge from the observed property list
    /// for the same class name; the writer recovers by re-defining inline
    TraitSchemaMismatch(String),
    /// The value has no wire representation in the requested format
    UnsupportedValueShape(&'static str),
    /// String bytes are not valid UTF-8
    InvalidUtf8,
}

impl fmt::Display for AmfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmfError::OutOfBounds { needed, remaining } => {
                write!(
                    f,
                    "Read past end of AMF data: {} bytes needed, {} remaining",
                    needed, remaining
                )
            }
            AmfError::UnsupportedTypeTag(t) => write!(f, "Unsupported AMF type tag: 0x{:02x}", t),
            AmfError::UnexpectedTerminator => {
                write!(f, "Unexpected object end tag in AMF stream")
            }
            AmfError::UndefinedReference(idx) => write!(f, "Undefined AMF reference: {}", idx),
            AmfError::IntegerOutOfRange(v) => {
                write!(f, "Integer out of 29-bit range: {}", v)
            }
            AmfError::TraitSchemaMismatch(class) => {
                write!(f, "Trait schema mismatch for class: {}", class)
            }
            AmfError::UnsupportedValueShape(what) => {
                write!(f, "Value has no wire representation: {}", what)
            }
            AmfError::InvalidUtf8 => write!(f, "Invalid UTF-8 in AMF string"),
        }
    }
}

impl std::error::Error for AmfError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AmfError::OutOfBounds {
            needed: 8,
            remaining: 3,
        };
        assert!(err.to_string().contains("8"));
        assert!(err.to_string().contains("3"));

        let err = AmfError::UnsupportedTypeTag(0x11);
        assert!(err.to_string().contains("0x11"));

        let err = AmfError::UndefinedReference(42);
        assert!(err.to_string().contains("42"));

        let err = AmfError::IntegerOutOfRange(536870912);
        assert!(err.to_string().contains("536870912"));

        let err = AmfError::TraitSchemaMismatch("com.example.User".into());
        assert!(err.to_string().contains("com.example.User"));

        let err = AmfError::UnsupportedValueShape("byte array in AMF0");
        assert!(err.to_string().contains("byte array"));

        assert!(AmfError::UnexpectedTerminator.to_string().contains("end"));
        assert!(AmfError::InvalidUtf8.to_string().contains("UTF-8"));
    }
}
