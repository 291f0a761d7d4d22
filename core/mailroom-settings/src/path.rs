//! Path handling and operations on the settings value tree.
//!
//! Paths are `/`-separated. Every function here takes a normalized path
//! (see [`normalize`]); the empty path addresses the whole tree.

use crate::protocol::SettingEntry;
use serde_json::{Map, Value};

/// Separator between path segments.
pub const PATH_SEPARATOR: char = '/';

/// Strips leading and trailing separators.
pub fn normalize(path: &str) -> &str {
    path.trim_matches(PATH_SEPARATOR)
}

/// Joins a parent path and a child segment.
pub fn join(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}{PATH_SEPARATOR}{child}")
    }
}

/// Splits a non-empty path into its parent path and last segment.
fn split_last(path: &str) -> (&str, &str) {
    match path.rfind(PATH_SEPARATOR) {
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => ("", path),
    }
}

/// Returns the value at `path`, if any.
pub fn lookup<'a>(tree: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(tree);
    }
    path.split(PATH_SEPARATOR)
        .try_fold(tree, |node, segment| node.as_object()?.get(segment))
}

fn lookup_object_mut<'a>(tree: &'a mut Value, path: &str) -> Option<&'a mut Map<String, Value>> {
    if path.is_empty() {
        return tree.as_object_mut();
    }
    path.split(PATH_SEPARATOR)
        .try_fold(tree, |node, segment| node.as_object_mut()?.get_mut(segment))?
        .as_object_mut()
}

/// Removes the value at `path` and returns every path that disappeared,
/// deepest first, ending with `path` itself. Removing a missing path
/// returns nothing.
pub fn remove(tree: &mut Value, path: &str) -> Vec<String> {
    if path.is_empty() {
        return Vec::new();
    }
    let (parent, name) = split_last(path);
    let Some(removed) = lookup_object_mut(tree, parent).and_then(|obj| obj.remove(name)) else {
        return Vec::new();
    };
    let mut paths = Vec::new();
    collect_removed(path, &removed, &mut paths);
    paths
}

fn collect_removed(path: &str, value: &Value, out: &mut Vec<String>) {
    if let Value::Object(children) = value {
        for (key, child) in children {
            collect_removed(&join(path, key), child, out);
        }
    }
    out.push(path.to_string());
}

/// Writes `value` at `path`, creating (or replacing non-object) parents as
/// needed. Objects are expanded: one value-less entry for each object node,
/// then entries for everything below it.
pub fn apply(tree: &mut Value, path: &str, value: Value) -> Vec<SettingEntry> {
    let mut entries = Vec::new();
    if path.is_empty() {
        return entries;
    }
    apply_into(tree, path, value, &mut entries);
    entries
}

fn apply_into(tree: &mut Value, path: &str, value: Value, out: &mut Vec<SettingEntry>) {
    match value {
        Value::Object(children) => {
            *slot(tree, path) = Value::Object(Map::new());
            out.push(SettingEntry::path(path));
            for (key, child) in children {
                apply_into(tree, &join(path, &key), child, out);
            }
        }
        leaf => {
            *slot(tree, path) = leaf.clone();
            out.push(SettingEntry::value(path, leaf));
        }
    }
}

/// The slot for `path`, with every ancestor forced to be an object.
fn slot<'a>(tree: &'a mut Value, path: &str) -> &'a mut Value {
    let mut node = tree;
    for segment in path.split(PATH_SEPARATOR) {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node = match node {
            Value::Object(map) => map.entry(segment.to_string()).or_insert(Value::Null),
            _ => unreachable!("node was just made an object"),
        };
    }
    node
}

/// Deep-merges `overlay` over `base`: objects merge key by key, anything
/// else in `overlay` replaces what `base` has.
pub fn merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            let mut merged = base.clone();
            for (key, value) in overlay {
                let next = match merged.get(key) {
                    Some(existing) => merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        (_, overlay) => overlay.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_strips_separators() {
        assert_eq!(normalize("/a/b/"), "a/b");
        assert_eq!(normalize("//a//"), "a");
        assert_eq!(normalize("///"), "");
    }

    #[test]
    fn lookup_walks_objects_only() {
        let tree = json!({"a": {"b": [1, 2]}, "n": 3});
        assert_eq!(lookup(&tree, "a/b"), Some(&json!([1, 2])));
        assert_eq!(lookup(&tree, "n/x"), None);
        assert_eq!(lookup(&tree, ""), Some(&tree));
    }

    #[test]
    fn remove_reports_deepest_first() {
        let mut tree = json!({"a": {"b": {"c": 1}, "d": 2}});
        let removed = remove(&mut tree, "a");
        assert_eq!(removed, ["a/b/c", "a/b", "a/d", "a"]);
        assert_eq!(tree, json!({}));
    }

    #[test]
    fn apply_replaces_scalar_parent() {
        let mut tree = json!({"a": 1});
        apply(&mut tree, "a/b", json!(2));
        assert_eq!(tree, json!({"a": {"b": 2}}));
    }

    #[test]
    fn apply_expands_objects() {
        let mut tree = json!({});
        let entries = apply(&mut tree, "x", json!({"y": {"z": true}}));
        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, ["x", "x/y", "x/y/z"]);
        assert_eq!(entries[2].value, Some(json!(true)));
        assert_eq!(entries[0].value, None);
    }

    #[test]
    fn merge_overlays_recursively() {
        let base = json!({"a": {"b": 1, "c": 2}, "d": [1]});
        let overlay = json!({"a": {"b": 9}, "d": [2, 3]});
        assert_eq!(merge(&base, &overlay), json!({"a": {"b": 9, "c": 2}, "d": [2, 3]}));
    }
}
