//! Class-name resolution boundary
//!
//! The codec never instantiates application types itself. When a stream
//! carries a wire class name, the decoder asks a [`TypeResolver`] what
//! shape to materialize; the resolver is supplied by the embedding
//! application, with a default that produces generic records. Resolution
//! must always succeed — an unmapped name falls back to a tagged generic
//! record, never an error.

use crate::constants::REMOTE_CLASS_FIELD;
use crate::settings::Settings;

/// Shape the decoder materializes for a structured record
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Structured record, optionally tagged with the wire class name
    Record { class_name: Option<String> },
    /// Generic associative array; a non-empty class name is kept under
    /// the `_explicitType` key
    Map { class_name: Option<String> },
}

/// Maps a wire class name to a local record shape
pub trait TypeResolver {
    fn resolve(&self, class_name: &str) -> Resolution;
}

/// Default resolution policy
///
/// An empty class name, or the literal `"Object"`, is anonymous. Every
/// other name tags the produced record so it round-trips as typed. In map
/// mode everything except `flex.messaging.messages.*` records becomes an
/// associative array.
#[derive(Debug, Clone, Default)]
pub struct DefaultResolver {
    pub object_as_map: bool,
}

impl DefaultResolver {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            object_as_map: settings.decode_object_as_map,
        }
    }
}

impl TypeResolver for DefaultResolver {
    fn resolve(&self, class_name: &str) -> Resolution {
        let anonymous = class_name.is_empty() || class_name == "Object";
        if self.object_as_map && !class_name.contains("flex.messaging.messages.") {
            return Resolution::Map {
                class_name: (!anonymous).then(|| class_name.to_string()),
            };
        }
        Resolution::Record {
            class_name: (!anonymous).then(|| class_name.to_string()),
        }
    }
}

/// Key the writer strips from emitted property lists; the reciprocal of
/// the tagging performed by map-mode resolution
pub(crate) fn is_reserved_field(key: &str) -> bool {
    key == REMOTE_CLASS_FIELD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_resolution() {
        let resolver = DefaultResolver::default();
        assert_eq!(
            resolver.resolve(""),
            Resolution::Record { class_name: None }
        );
        assert_eq!(
            resolver.resolve("Object"),
            Resolution::Record { class_name: None }
        );
        assert_eq!(
            resolver.resolve("com.example.User"),
            Resolution::Record {
                class_name: Some("com.example.User".into())
            }
        );
    }

    #[test]
    fn test_map_mode() {
        let resolver = DefaultResolver { object_as_map: true };
        assert_eq!(resolver.resolve(""), Resolution::Map { class_name: None });
        assert_eq!(
            resolver.resolve("com.example.User"),
            Resolution::Map {
                class_name: Some("com.example.User".into())
            }
        );
        // Message records stay records even in map mode
        assert_eq!(
            resolver.resolve("flex.messaging.messages.RemotingMessage"),
            Resolution::Record {
                class_name: Some("flex.messaging.messages.RemotingMessage".into())
            }
        );
    }
}
