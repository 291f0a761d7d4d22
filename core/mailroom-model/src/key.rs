//! Keys that identify record definitions.
//!
//! Message classes form a dotted hierarchy (`IPM.Note.NDR` inherits from
//! `IPM.Note`, which inherits from `IPM`). Object types and custom types are
//! flat.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between levels of a message class.
pub const MESSAGE_CLASS_SEPARATOR: char = '.';

/// Identifies a record definition in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "key", rename_all = "snake_case")]
pub enum DefinitionKey {
    /// A message class, stored upper-cased so lookups are case-insensitive.
    MessageClass(String),
    /// A numeric MAPI object type.
    ObjectType(u32),
    /// A plugin-defined type with no hierarchy.
    Custom(String),
}

impl DefinitionKey {
    /// Key for a message class. The class is normalized to upper case.
    pub fn message_class(class: &str) -> Self {
        Self::MessageClass(class.to_ascii_uppercase())
    }

    /// Key for a numeric object type.
    pub const fn object_type(code: u32) -> Self {
        Self::ObjectType(code)
    }

    /// Key for a custom type.
    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom(name.into())
    }

    /// The key one level up the hierarchy, if the key itself encodes one.
    ///
    /// Only message classes have an encoded parent: everything before the
    /// last separator, provided the separator is not the first character.
    pub fn parent(&self) -> Option<DefinitionKey> {
        match self {
            Self::MessageClass(class) => match class.rfind(MESSAGE_CLASS_SEPARATOR) {
                Some(idx) if idx > 0 => Some(Self::MessageClass(class[..idx].to_string())),
                _ => None,
            },
            Self::ObjectType(_) | Self::Custom(_) => None,
        }
    }

    /// Whether this key belongs to the message class hierarchy.
    pub fn is_message_class(&self) -> bool {
        matches!(self, Self::MessageClass(_))
    }
}

impl fmt::Display for DefinitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MessageClass(class) => write!(f, "message_class:{class}"),
            Self::ObjectType(code) => write!(f, "object_type:{code}"),
            Self::Custom(name) => write!(f, "custom:{name}"),
        }
    }
}

/// Case-insensitive message class comparison.
///
/// With `base_only`, `expected` also matches any sub-class of itself, so
/// `IPM` matches `IPM.Note` but not `IPMX`.
pub fn message_class_matches(actual: &str, expected: &str, base_only: bool) -> bool {
    if actual.eq_ignore_ascii_case(expected) {
        return true;
    }
    if !base_only || actual.len() <= expected.len() {
        return false;
    }
    let (head, tail) = actual.split_at(expected.len());
    head.eq_ignore_ascii_case(expected) && tail.starts_with(MESSAGE_CLASS_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_strips_last_level() {
        let key = DefinitionKey::message_class("IPM.Note.NDR");
        assert_eq!(key.parent(), Some(DefinitionKey::message_class("IPM.Note")));
    }

    #[test]
    fn top_level_class_has_no_parent() {
        assert_eq!(DefinitionKey::message_class("IPM").parent(), None);
        assert_eq!(DefinitionKey::message_class(".hidden").parent(), None);
    }

    #[test]
    fn flat_keys_have_no_parent() {
        assert_eq!(DefinitionKey::object_type(5).parent(), None);
        assert_eq!(DefinitionKey::custom("files.folder").parent(), None);
    }

    #[test]
    fn base_only_requires_separator_boundary() {
        assert!(message_class_matches("IPM.Note", "ipm", true));
        assert!(!message_class_matches("IPMX.Note", "IPM", true));
        assert!(!message_class_matches("IPM.Note", "IPM", false));
        assert!(message_class_matches("report", "REPORT", false));
    }
}
