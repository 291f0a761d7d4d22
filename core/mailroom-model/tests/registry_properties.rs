//! Property-based tests for definition inheritance.
//!
//! Whatever order fields and defaults are registered in, a definition's
//! effective schema contains everything its ancestors declare.

use mailroom_model::{DefinitionKey, FieldDescriptor, RecordRegistry, RecordState};
use proptest::prelude::*;
use std::collections::HashSet;

fn segment_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z]{1,4}").unwrap()
}

fn class_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(segment_strategy(), 1..5)
}

fn field_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z_]{1,8}").unwrap()
}

/// A registration: (depth along the class, field name).
fn registrations_strategy() -> impl Strategy<Value = Vec<(usize, String)>> {
    prop::collection::vec((0usize..5, field_strategy()), 0..20)
}

fn prefix(segments: &[String], depth: usize) -> DefinitionKey {
    DefinitionKey::message_class(&segments[..depth].join("."))
}

fn field_set(registry: &mut RecordRegistry, key: &DefinitionKey) -> HashSet<String> {
    registry
        .definition(key)
        .fields
        .iter()
        .map(|f| f.name.clone())
        .collect()
}

proptest! {
    /// fields("A.B.C") ⊇ fields("A.B") ⊇ fields("A")
    #[test]
    fn fields_are_closed_under_inheritance(
        segments in class_strategy(),
        registrations in registrations_strategy(),
    ) {
        let mut registry = RecordRegistry::new();
        for (depth, name) in &registrations {
            let depth = 1 + depth % segments.len();
            registry.add_field(&prefix(&segments, depth), FieldDescriptor::auto(name));
        }

        for depth in 1..segments.len() {
            let parent = field_set(&mut registry, &prefix(&segments, depth));
            let child = field_set(&mut registry, &prefix(&segments, depth + 1));
            prop_assert!(child.is_superset(&parent));
        }
    }

    /// Field names are never duplicated in a resolved definition.
    #[test]
    fn resolved_fields_are_unique(
        segments in class_strategy(),
        registrations in registrations_strategy(),
    ) {
        let mut registry = RecordRegistry::new();
        for (depth, name) in &registrations {
            let depth = 1 + depth % segments.len();
            registry.add_field(&prefix(&segments, depth), FieldDescriptor::auto(name));
        }

        let leaf = prefix(&segments, segments.len());
        let def = registry.definition(&leaf);
        let unique: HashSet<&str> = def.fields.iter().map(|f| f.name.as_str()).collect();
        prop_assert_eq!(unique.len(), def.fields.len());
    }

    /// Creation defaults reach new records of every descendant and never
    /// reach persisted ones.
    #[test]
    fn creation_defaults_follow_state(
        segments in class_strategy(),
        depth in 0usize..5,
        name in field_strategy(),
        value in any::<i64>(),
    ) {
        let mut registry = RecordRegistry::new();
        let depth = 1 + depth % segments.len();
        registry.add_default_value(&prefix(&segments, depth), &name, value);

        let leaf = prefix(&segments, segments.len());
        let phantom = registry.create_record(&leaf, None, RecordState::New);
        let stored = registry.create_record(&leaf, None, RecordState::Persisted("e".into()));

        prop_assert_eq!(phantom.get_i64(&name), Some(value));
        prop_assert_eq!(stored.get(&name), None);
    }
}
