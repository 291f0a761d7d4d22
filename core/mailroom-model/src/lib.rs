//! Record definitions for Mailroom.
//!
//! Server payloads are typed by a hierarchical key: a dotted message class
//! (`IPM.Note.NDR`), a numeric object type, or a plugin-defined custom type.
//! The [`RecordRegistry`] keeps one definition per key and resolves each
//! against its ancestors:
//! - [`FieldDescriptor`]: fields, inherited and overridable by name
//! - default values applied only to new (phantom) records
//! - [`SubCollectionType`]: named child collections such as recipients
//! - [`RecordKind`]: the base behaviour of the record (e.g. faulty detection)
//! - [`LifecycleEvent`] hooks fired ancestor-first on creation
//!
//! The registry is an ordinary value. Construct one per process (or per
//! test) and pass it where records are created.

mod definition;
mod field;
mod key;
mod kind;
mod record;
mod registry;

pub use definition::{LifecycleEvent, LifecycleHook, ResolvedDefinition, SubCollectionType};
pub use field::{FieldDescriptor, FieldType};
pub use key::{message_class_matches, DefinitionKey, MESSAGE_CLASS_SEPARATOR};
pub use kind::{GenericRecord, MessageRecord, RecordKind};
pub use record::{Record, RecordId, RecordState, SubCollection, FALLBACK_MESSAGE_CLASS};
pub use registry::{RecordRegistry, RegistryConfig, MESSAGE_CLASS_FIELD, OBJECT_TYPE_FIELD};
