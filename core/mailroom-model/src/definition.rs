//! Record definitions: the per-key configuration and its resolved form.
//!
//! A [`DefinitionNode`] holds only what was configured on its own key. The
//! registry walks parent links to produce a [`ResolvedDefinition`], which is
//! what records are created from.

use crate::field::FieldDescriptor;
use crate::key::DefinitionKey;
use crate::kind::RecordKind;
use crate::Record;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Lifecycle events fired while records are created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// A new (phantom) record was created.
    CreatePhantom,
    /// A persisted record was hydrated from server data.
    CreateRecord,
}

/// Callback run for a lifecycle event. Receives the record under
/// construction and the data it is being created from.
pub type LifecycleHook = Arc<dyn Fn(&mut Record, Option<&Map<String, Value>>) + Send + Sync>;

/// Declares which definition the children of a sub-collection use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubCollectionType {
    pub item_key: DefinitionKey,
}

impl SubCollectionType {
    pub fn new(item_key: DefinitionKey) -> Self {
        Self { item_key }
    }
}

/// Configuration set directly on one key.
#[derive(Default)]
pub(crate) struct DefinitionNode {
    pub(crate) parent: Option<DefinitionKey>,
    pub(crate) kind: Option<Arc<dyn RecordKind>>,
    pub(crate) fields: Vec<FieldDescriptor>,
    pub(crate) default_values: Map<String, Value>,
    pub(crate) seed_values: Map<String, Value>,
    pub(crate) sub_collections: BTreeMap<String, SubCollectionType>,
    pub(crate) hooks: HashMap<LifecycleEvent, Vec<LifecycleHook>>,
}

impl DefinitionNode {
    pub(crate) fn new(parent: Option<DefinitionKey>, seed_values: Map<String, Value>) -> Self {
        Self {
            parent,
            seed_values,
            ..Default::default()
        }
    }
}

/// A definition with everything inherited from its ancestors merged in.
pub struct ResolvedDefinition {
    pub key: DefinitionKey,
    pub parent: Option<DefinitionKey>,
    /// One descriptor per field name, ancestors' fields first.
    pub fields: Vec<FieldDescriptor>,
    /// Creation defaults, applied only to new records.
    pub default_values: Map<String, Value>,
    /// Discriminator values stamped on every record (when seeding is enabled).
    pub seed_values: Map<String, Value>,
    pub sub_collections: BTreeMap<String, SubCollectionType>,
    pub kind: Arc<dyn RecordKind>,
    /// Hooks per event, ancestors' hooks first.
    pub(crate) hooks: HashMap<LifecycleEvent, Vec<LifecycleHook>>,
}

impl ResolvedDefinition {
    /// Merges `node` on top of its resolved `parent` (or nothing, at a root).
    pub(crate) fn resolve(
        key: DefinitionKey,
        node: &DefinitionNode,
        parent: Option<&ResolvedDefinition>,
        fallback_kind: Arc<dyn RecordKind>,
    ) -> Self {
        let mut fields = parent.map(|p| p.fields.clone()).unwrap_or_default();
        for field in &node.fields {
            match fields.iter_mut().find(|f| f.name == field.name) {
                // Last declaration wins, keeping the original position.
                Some(existing) => *existing = field.clone(),
                None => fields.push(field.clone()),
            }
        }

        let mut default_values = parent.map(|p| p.default_values.clone()).unwrap_or_default();
        default_values.extend(node.default_values.clone());

        let mut seed_values = parent.map(|p| p.seed_values.clone()).unwrap_or_default();
        seed_values.extend(node.seed_values.clone());

        let mut sub_collections = parent.map(|p| p.sub_collections.clone()).unwrap_or_default();
        sub_collections.extend(node.sub_collections.clone());

        let kind = match (&node.kind, parent) {
            (Some(kind), _) => Arc::clone(kind),
            (None, Some(p)) => Arc::clone(&p.kind),
            (None, None) => fallback_kind,
        };

        let mut hooks = parent.map(|p| p.hooks.clone()).unwrap_or_default();
        for (event, own) in &node.hooks {
            hooks.entry(*event).or_default().extend(own.iter().cloned());
        }

        Self {
            key,
            parent: node.parent.clone(),
            fields,
            default_values,
            seed_values,
            sub_collections,
            kind,
            hooks,
        }
    }

    /// Looks up a field descriptor by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Values every record starts with: explicit field defaults.
    pub fn field_default_values(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .filter_map(|f| f.default_value.clone().map(|v| (f.name.clone(), v)))
            .collect()
    }

    /// Hooks registered for `event`, in firing order.
    pub fn hooks(&self, event: LifecycleEvent) -> &[LifecycleHook] {
        self.hooks.get(&event).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl fmt::Debug for ResolvedDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hook_counts: BTreeMap<String, usize> = self
            .hooks
            .iter()
            .map(|(event, hooks)| (format!("{event:?}"), hooks.len()))
            .collect();
        f.debug_struct("ResolvedDefinition")
            .field("key", &self.key)
            .field("parent", &self.parent)
            .field("fields", &self.fields)
            .field("default_values", &self.default_values)
            .field("seed_values", &self.seed_values)
            .field("sub_collections", &self.sub_collections)
            .field("kind", &self.kind.name())
            .field("hooks", &hook_counts)
            .finish()
    }
}
