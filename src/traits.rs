//! Trait schemas for AMF3 structured records
//!
//! AMF3 serialization writes the traits of a class once and then sends
//! only the property values of each further instance of that class in the
//! stream. A trait describes the class name, its flags, and the ordered
//! sealed property list.

/// Cached descriptor of a class's property layout
///
/// Property order is significant: sealed values are written and read
/// positionally, in exactly the order first observed for the class name
/// within one top-level object.
#[derive(Debug, Clone, PartialEq)]
pub struct TraitInfo {
    /// Wire class name, empty for anonymous records
    pub class_name: String,
    pub dynamic: bool,
    pub externalizable: bool,
    pub properties: Vec<String>,
}

impl TraitInfo {
    pub fn new(class_name: impl Into<String>, dynamic: bool, externalizable: bool) -> Self {
        Self {
            class_name: class_name.into(),
            dynamic,
            externalizable,
            properties: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}
