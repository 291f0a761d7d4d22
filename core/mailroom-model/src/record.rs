use crate::definition::ResolvedDefinition;
use crate::key::{message_class_matches, DefinitionKey};
use crate::kind::RecordKind;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Class a faulty message is rewritten to by [`Record::fix_faulty_message`].
pub const FALLBACK_MESSAGE_CLASS: &str = "IPM.Note";

/// How a record comes into existence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordState {
    /// Created locally; gets a phantom id and the definition's creation defaults.
    New,
    /// Hydrated from server data carrying this id.
    Persisted(String),
}

/// Identity of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordId {
    /// Locally generated placeholder (UUID v7), replaced once the server
    /// assigns an id.
    Phantom(Uuid),
    /// Server-assigned id.
    Persisted(String),
}

impl RecordId {
    /// Creates a fresh phantom id.
    #[must_use]
    pub fn phantom() -> Self {
        Self::Phantom(Uuid::now_v7())
    }

    pub fn is_phantom(&self) -> bool {
        matches!(self, Self::Phantom(_))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Phantom(uuid) => write!(f, "phantom-{uuid}"),
            Self::Persisted(id) => f.write_str(id),
        }
    }
}

/// A named, typed set of child records owned by a record.
#[derive(Debug, Clone)]
pub struct SubCollection {
    item_key: DefinitionKey,
    records: Vec<Record>,
}

impl SubCollection {
    pub fn new(item_key: DefinitionKey) -> Self {
        Self {
            item_key,
            records: Vec::new(),
        }
    }

    /// Definition key children of this collection are created with.
    pub fn item_key(&self) -> &DefinitionKey {
        &self.item_key
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Removes the child equal to `record`. Returns whether one was found.
    pub fn remove(&mut self, record: &Record) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r != record);
        self.records.len() != before
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Record> {
        self.records.iter_mut()
    }
}

/// A record instance created from a [`ResolvedDefinition`].
///
/// Field values are JSON. Every change after the last [`commit`](Self::commit)
/// is tracked together with the value it replaced, so the record can report
/// itself dirty and be rolled back with [`reject`](Self::reject).
#[derive(Clone)]
pub struct Record {
    id: RecordId,
    definition: Arc<ResolvedDefinition>,
    values: Map<String, Value>,
    /// Previous value per changed field; `None` when the field was absent.
    modified: BTreeMap<String, Option<Value>>,
    sub_collections: BTreeMap<String, SubCollection>,
}

impl Record {
    pub(crate) fn new(
        id: RecordId,
        definition: Arc<ResolvedDefinition>,
        values: Map<String, Value>,
    ) -> Self {
        let sub_collections = definition
            .sub_collections
            .iter()
            .map(|(name, collection)| (name.clone(), SubCollection::new(collection.item_key.clone())))
            .collect();
        Self {
            id,
            definition,
            values,
            modified: BTreeMap::new(),
            sub_collections,
        }
    }

    pub fn id(&self) -> &RecordId {
        &self.id
    }

    /// True until the server assigned an identity.
    pub fn is_phantom(&self) -> bool {
        self.id.is_phantom()
    }

    /// Key of the definition this record was created from.
    pub fn key(&self) -> &DefinitionKey {
        &self.definition.key
    }

    pub fn definition(&self) -> &Arc<ResolvedDefinition> {
        &self.definition
    }

    /// The base kind of the record's definition.
    pub fn kind(&self) -> &Arc<dyn RecordKind> {
        &self.definition.kind
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.values.get(field).and_then(Value::as_str)
    }

    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.values.get(field).and_then(Value::as_i64)
    }

    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.values.get(field).and_then(Value::as_bool)
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Sets a field. Returns `false` when the value was already current.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        if self.values.get(field) == Some(&value) {
            return false;
        }
        let previous = self.values.insert(field.to_string(), value);
        self.track_change(field, previous);
        true
    }

    /// Removes a field. Returns the removed value.
    pub fn unset(&mut self, field: &str) -> Option<Value> {
        let previous = self.values.remove(field)?;
        self.track_change(field, Some(previous.clone()));
        Some(previous)
    }

    fn track_change(&mut self, field: &str, previous: Option<Value>) {
        match self.modified.get(field) {
            // Back to the committed value: no longer a change.
            Some(original) if original.as_ref() == self.values.get(field) => {
                self.modified.remove(field);
            }
            Some(_) => {}
            None => {
                self.modified.insert(field.to_string(), previous);
            }
        }
    }

    /// Whether any field of this record, or of a record in one of its
    /// sub-collections, changed since the last commit.
    pub fn is_dirty(&self) -> bool {
        !self.modified.is_empty()
            || self
                .sub_collections
                .values()
                .any(|collection| collection.iter().any(Record::is_dirty))
    }

    /// Names of the fields changed since the last commit.
    pub fn modified_fields(&self) -> impl Iterator<Item = &str> {
        self.modified.keys().map(String::as_str)
    }

    /// Accepts all changes.
    pub fn commit(&mut self) {
        self.modified.clear();
        for collection in self.sub_collections.values_mut() {
            for child in collection.iter_mut() {
                child.commit();
            }
        }
    }

    /// Reverts all changes since the last commit, sub-collection records
    /// included.
    pub fn reject(&mut self) {
        for (field, previous) in std::mem::take(&mut self.modified) {
            match previous {
                Some(value) => {
                    self.values.insert(field, value);
                }
                None => {
                    self.values.remove(&field);
                }
            }
        }
        for collection in self.sub_collections.values_mut() {
            for child in collection.iter_mut() {
                child.reject();
            }
        }
    }

    /// Records the server-assigned identity and commits pending changes.
    pub fn mark_persisted(&mut self, id: impl Into<String>) {
        self.id = RecordId::Persisted(id.into());
        self.commit();
    }

    pub fn sub_collection(&self, name: &str) -> Option<&SubCollection> {
        self.sub_collections.get(name)
    }

    pub fn sub_collection_mut(&mut self, name: &str) -> Option<&mut SubCollection> {
        self.sub_collections.get_mut(name)
    }

    /// Names of the owned sub-collections.
    pub fn sub_collection_names(&self) -> impl Iterator<Item = &str> {
        self.sub_collections.keys().map(String::as_str)
    }

    /// Compares `message_class` against any of `classes` (case-insensitive).
    /// With `base_only`, sub-classes match too.
    pub fn is_message_class(&self, classes: &[&str], base_only: bool) -> bool {
        let Some(actual) = self.get_str("message_class") else {
            return false;
        };
        classes
            .iter()
            .any(|expected| message_class_matches(actual, expected, base_only))
    }

    /// Whether the record's kind considers it faulty.
    pub fn is_faulty_message(&self) -> bool {
        self.definition.kind.is_faulty(self)
    }

    /// Rewrites a faulty message to [`FALLBACK_MESSAGE_CLASS`]. The record is
    /// left dirty so the caller can save it. Returns whether it changed.
    pub fn fix_faulty_message(&mut self) -> bool {
        if !self.is_faulty_message() {
            return false;
        }
        self.set("message_class", FALLBACK_MESSAGE_CLASS)
    }
}

/// Records are equal by identity: same server id, or the same phantom.
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("id", &self.id)
            .field("key", &self.definition.key)
            .field("kind", &self.definition.kind.name())
            .field("values", &self.values)
            .field("dirty", &self.is_dirty())
            .field("sub_collections", &self.sub_collections)
            .finish()
    }
}
