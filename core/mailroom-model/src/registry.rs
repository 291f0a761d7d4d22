//! The record definition registry.
//!
//! Definitions are synthesised the first time a key is seen and then live as
//! long as the registry. Nothing here fails: an unknown or malformed key
//! yields a usable, possibly empty definition.

use crate::definition::{
    DefinitionNode, LifecycleEvent, LifecycleHook, ResolvedDefinition, SubCollectionType,
};
use crate::field::FieldDescriptor;
use crate::key::DefinitionKey;
use crate::kind::{GenericRecord, MessageRecord, RecordKind};
use crate::record::{Record, RecordId, RecordState};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Payload field naming the message class.
pub const MESSAGE_CLASS_FIELD: &str = "message_class";
/// Payload field naming the numeric object type.
pub const OBJECT_TYPE_FIELD: &str = "object_type";

/// Configuration for the record registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Message class every parentless class is chained to.
    pub root_message_class: String,
    /// Stamp `message_class`/`object_type` on records of synthesised
    /// definitions, even when the creation data lacks them.
    pub seed_discriminators: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            root_message_class: "IPM".to_string(),
            seed_discriminators: false,
        }
    }
}

/// Owns all record definitions and creates records from them.
pub struct RecordRegistry {
    config: RegistryConfig,
    root: DefinitionKey,
    nodes: HashMap<DefinitionKey, DefinitionNode>,
    /// Resolved definitions; cleared whenever any node changes.
    resolved: HashMap<DefinitionKey, Arc<ResolvedDefinition>>,
    fallback_kind: Arc<dyn RecordKind>,
}

impl RecordRegistry {
    /// Creates a registry with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Creates a registry with a custom configuration. The root message
    /// class starts out with the [`MessageRecord`] kind.
    pub fn with_config(config: RegistryConfig) -> Self {
        let root = DefinitionKey::message_class(&config.root_message_class);
        let mut registry = Self {
            config,
            root,
            nodes: HashMap::new(),
            resolved: HashMap::new(),
            fallback_kind: Arc::new(GenericRecord),
        };
        let root = registry.root.clone();
        registry.set_base_kind(&root, Arc::new(MessageRecord));
        registry
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Key of the message class root.
    pub fn root_key(&self) -> &DefinitionKey {
        &self.root
    }

    /// Number of definitions known so far (configured or synthesised).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, key: &DefinitionKey) -> bool {
        self.nodes.contains_key(key)
    }

    // ── Definition lookup ────────────────────────────────────────

    /// Returns the resolved definition for `key`, synthesising any missing
    /// definitions along its parent chain.
    pub fn definition(&mut self, key: &DefinitionKey) -> Arc<ResolvedDefinition> {
        self.ensure(key);
        self.resolve(key)
    }

    /// The base kind records of `key` are created with.
    pub fn record_kind(&mut self, key: &DefinitionKey) -> Arc<dyn RecordKind> {
        Arc::clone(&self.definition(key).kind)
    }

    fn parent_of(&self, key: &DefinitionKey) -> Option<DefinitionKey> {
        match key.parent() {
            Some(parent) => Some(parent),
            None if key.is_message_class() && *key != self.root => Some(self.root.clone()),
            None => None,
        }
    }

    fn seed_for(&self, key: &DefinitionKey, spelling: Option<&str>) -> Map<String, Value> {
        let mut seed = Map::new();
        if !self.config.seed_discriminators {
            return seed;
        }
        match key {
            DefinitionKey::MessageClass(class) => {
                let class = spelling.unwrap_or(class.as_str());
                seed.insert(MESSAGE_CLASS_FIELD.into(), Value::from(class));
            }
            DefinitionKey::ObjectType(code) => {
                seed.insert(OBJECT_TYPE_FIELD.into(), Value::from(*code));
            }
            DefinitionKey::Custom(_) => {}
        }
        seed
    }

    fn ensure(&mut self, key: &DefinitionKey) {
        self.ensure_spelled(key, None);
    }

    /// Like `ensure`, remembering how the caller spelled a message class so
    /// the seed keeps its original case.
    fn ensure_spelled(&mut self, key: &DefinitionKey, spelling: Option<&str>) {
        if self.nodes.contains_key(key) {
            return;
        }
        let parent = self.parent_of(key);
        if let Some(parent) = &parent {
            self.ensure(parent);
        }
        if key.is_message_class() && key.parent().is_none() && *key != self.root {
            debug!("message class {key} has no parent; chaining to {}", self.root);
        } else {
            trace!("synthesising definition for {key}");
        }
        let seed = self.seed_for(key, spelling);
        self.nodes.insert(key.clone(), DefinitionNode::new(parent, seed));
    }

    fn resolve(&mut self, key: &DefinitionKey) -> Arc<ResolvedDefinition> {
        if let Some(resolved) = self.resolved.get(key) {
            return Arc::clone(resolved);
        }
        let parent_key = self.nodes.get(key).and_then(|node| node.parent.clone());
        let parent = parent_key.map(|p| self.resolve(&p));
        let resolved = match self.nodes.get(key) {
            Some(node) => ResolvedDefinition::resolve(
                key.clone(),
                node,
                parent.as_deref(),
                Arc::clone(&self.fallback_kind),
            ),
            None => ResolvedDefinition::resolve(
                key.clone(),
                &DefinitionNode::default(),
                parent.as_deref(),
                Arc::clone(&self.fallback_kind),
            ),
        };
        let resolved = Arc::new(resolved);
        self.resolved.insert(key.clone(), Arc::clone(&resolved));
        resolved
    }

    fn node_mut(&mut self, key: &DefinitionKey) -> &mut DefinitionNode {
        self.ensure(key);
        // Descendants inherit from this node, so every cached entry is suspect.
        self.resolved.clear();
        self.nodes.entry(key.clone()).or_default()
    }

    // ── Definition configuration ─────────────────────────────────

    /// Sets the kind records of `key` (and of descendants that do not set
    /// their own) are created with. Last writer wins.
    pub fn set_base_kind(&mut self, key: &DefinitionKey, kind: Arc<dyn RecordKind>) {
        self.node_mut(key).kind = Some(kind);
    }

    /// Appends a field to `key`'s own field list.
    pub fn add_field(&mut self, key: &DefinitionKey, field: FieldDescriptor) {
        self.node_mut(key).fields.push(field);
    }

    /// Appends several fields to `key`'s own field list.
    pub fn add_fields<I>(&mut self, key: &DefinitionKey, fields: I)
    where
        I: IntoIterator<Item = FieldDescriptor>,
    {
        self.node_mut(key).fields.extend(fields);
    }

    /// Records a creation default, applied only to new records.
    pub fn add_default_value(&mut self, key: &DefinitionKey, field: &str, value: impl Into<Value>) {
        self.node_mut(key)
            .default_values
            .insert(field.to_string(), value.into());
    }

    /// Declares that records of `key` own a sub-collection called `name`.
    pub fn set_sub_collection(
        &mut self,
        key: &DefinitionKey,
        name: &str,
        collection_type: SubCollectionType,
    ) {
        self.node_mut(key)
            .sub_collections
            .insert(name.to_string(), collection_type);
    }

    /// Appends a hook for `event` on `key`. It also fires for records of
    /// every descendant key, before the descendant's own hooks.
    pub fn add_lifecycle_hook<F>(&mut self, key: &DefinitionKey, event: LifecycleEvent, hook: F)
    where
        F: Fn(&mut Record, Option<&Map<String, Value>>) + Send + Sync + 'static,
    {
        let hook: LifecycleHook = Arc::new(hook);
        self.node_mut(key).hooks.entry(event).or_default().push(hook);
    }

    // ── Record creation ──────────────────────────────────────────

    /// Creates a record of `key`.
    ///
    /// Values are layered, lowest first: field defaults, seed values,
    /// creation defaults (new records only), then `data`. The matching
    /// lifecycle hooks run ancestor-first and the record is committed before
    /// it is returned.
    pub fn create_record(
        &mut self,
        key: &DefinitionKey,
        data: Option<Map<String, Value>>,
        state: RecordState,
    ) -> Record {
        let definition = self.definition(key);
        build_record(definition, data, state)
    }

    /// Creates a record for a message class, keeping the caller's spelling
    /// for the seeded `message_class`.
    pub fn create_by_message_class(
        &mut self,
        message_class: &str,
        data: Option<Map<String, Value>>,
        state: RecordState,
    ) -> Record {
        let key = DefinitionKey::message_class(message_class);
        self.ensure_spelled(&key, Some(message_class));
        self.create_record(&key, data, state)
    }

    pub fn create_by_object_type(
        &mut self,
        object_type: u32,
        data: Option<Map<String, Value>>,
        state: RecordState,
    ) -> Record {
        self.create_record(&DefinitionKey::object_type(object_type), data, state)
    }

    pub fn create_by_custom_type(
        &mut self,
        custom_type: &str,
        data: Option<Map<String, Value>>,
        state: RecordState,
    ) -> Record {
        self.create_record(&DefinitionKey::custom(custom_type), data, state)
    }

    /// Creates a record from a server payload, picking the definition from
    /// its `message_class` or, failing that, its `object_type`. Returns
    /// `None` when the payload carries neither.
    pub fn create_from_payload(
        &mut self,
        payload: &Map<String, Value>,
        state: RecordState,
    ) -> Option<Record> {
        if let Some(class) = payload
            .get(MESSAGE_CLASS_FIELD)
            .and_then(Value::as_str)
            .filter(|class| !class.is_empty())
        {
            let class = class.to_string();
            return Some(self.create_by_message_class(&class, Some(payload.clone()), state));
        }
        let object_type = payload
            .get(OBJECT_TYPE_FIELD)
            .and_then(Value::as_u64)
            .and_then(|code| u32::try_from(code).ok())?;
        Some(self.create_by_object_type(object_type, Some(payload.clone()), state))
    }
}

impl Default for RecordRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn build_record(
    definition: Arc<ResolvedDefinition>,
    data: Option<Map<String, Value>>,
    state: RecordState,
) -> Record {
    let mut values = definition.field_default_values();
    values.extend(definition.seed_values.clone());

    let (id, event) = match state {
        RecordState::New => {
            values.extend(definition.default_values.clone());
            (RecordId::phantom(), LifecycleEvent::CreatePhantom)
        }
        RecordState::Persisted(id) => (RecordId::Persisted(id), LifecycleEvent::CreateRecord),
    };
    if let Some(data) = &data {
        values.extend(data.clone());
    }

    let mut record = Record::new(id, Arc::clone(&definition), values);
    definition.kind.on_construct(&mut record);
    for hook in definition.hooks(event) {
        hook(&mut record, data.as_ref());
    }
    record.commit();
    trace!("created {} record {} ({})", definition.key, record.id(), definition.kind.name());
    record
}
