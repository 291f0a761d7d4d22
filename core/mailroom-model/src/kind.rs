use crate::{DefinitionKey, Record};

/// Behaviour shared by all records of a definition (the definition's base type).
///
/// Most definitions never set one and inherit [`GenericRecord`] or, below the
/// message class root, [`MessageRecord`].
///
/// Implement this if a family of records needs:
/// - its own notion of a faulty record
/// - post-construction adjustments applied before lifecycle hooks run
pub trait RecordKind: Send + Sync {
    /// Stable name, used in logs and diagnostics.
    fn name(&self) -> &str;

    /// Whether `record` is malformed in a way callers should work around.
    fn is_faulty(&self, record: &Record) -> bool {
        let _ = record;
        false
    }

    /// Called once after field values are applied and before hooks fire.
    fn on_construct(&self, record: &mut Record) {
        let _ = record;
    }
}

/// The fallback kind for definitions that never configured one.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericRecord;

impl RecordKind for GenericRecord {
    fn name(&self) -> &str {
        "record"
    }
}

/// Kind for everything under the message class root.
///
/// A message is faulty when its class is missing or has no parent of its
/// own (`IPM`, `MEMO`, `REPORT`, or garbage such as `xyz`). Such classes are
/// chained straight to the root definition so the record stays usable.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageRecord;

impl RecordKind for MessageRecord {
    fn name(&self) -> &str {
        "message"
    }

    fn is_faulty(&self, record: &Record) -> bool {
        match record.get_str("message_class") {
            None | Some("") => true,
            Some(class) => DefinitionKey::message_class(class).parent().is_none(),
        }
    }
}
