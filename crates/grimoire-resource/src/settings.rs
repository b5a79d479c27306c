//! Typed accessors over the settings document.
//!
//! Settings live in one reserved resource ([`SETTINGS_PATH`]), a nested
//! object tree addressed by path segments: all but the last segment name
//! nested objects, auto-created on write but never on read. The document
//! is loaded without book discrimination.

use serde_json::{Map, Value};

use crate::store::{ResourceStore, SETTINGS_PATH};

fn get_value<'a>(store: &'a mut ResourceStore, path: &[&str]) -> Option<&'a Value> {
    let id = store.resource_internal(SETTINGS_PATH, false).ok()?;
    let (last, segments) = path.split_last()?;
    let mut current = store.document(id)?.as_object()?;
    for segment in segments {
        current = current.get(*segment)?.as_object()?;
    }
    current.get(*last)
}

fn set_value(store: &mut ResourceStore, value: Value, path: &[&str]) -> Option<()> {
    let id = store.resource_internal(SETTINGS_PATH, false).ok()?;
    let (last, segments) = path.split_last()?;
    let mut current = store.document_mut(id)?.as_object_mut()?;
    for segment in segments {
        current = current
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()?;
    }
    current.insert((*last).to_string(), value);
    Some(())
}

/// Reads a boolean setting.
pub fn get_bool(store: &mut ResourceStore, path: &[&str]) -> Option<bool> {
    get_value(store, path)?.as_bool()
}

/// Reads a boolean setting, falling back to `default`.
pub fn get_bool_or(store: &mut ResourceStore, default: bool, path: &[&str]) -> bool {
    get_bool(store, path).unwrap_or(default)
}

/// Reads an integer setting.
pub fn get_int(store: &mut ResourceStore, path: &[&str]) -> Option<i64> {
    get_value(store, path)?.as_i64()
}

/// Reads an integer setting, falling back to `default`.
pub fn get_int_or(store: &mut ResourceStore, default: i64, path: &[&str]) -> i64 {
    get_int(store, path).unwrap_or(default)
}

/// Reads a string setting.
pub fn get_string(store: &mut ResourceStore, path: &[&str]) -> Option<String> {
    get_value(store, path)?.as_str().map(String::from)
}

/// Reads a string setting, falling back to `default`.
pub fn get_string_or(store: &mut ResourceStore, default: &str, path: &[&str]) -> String {
    get_string(store, path).unwrap_or_else(|| default.to_string())
}

/// Reads an array setting.
pub fn get_array(store: &mut ResourceStore, path: &[&str]) -> Option<Vec<Value>> {
    get_value(store, path)?.as_array().cloned()
}

/// Reads an array setting, falling back to `default`.
pub fn get_array_or(store: &mut ResourceStore, default: Vec<Value>, path: &[&str]) -> Vec<Value> {
    get_array(store, path).unwrap_or(default)
}

/// Writes a boolean setting, creating intermediate objects as needed.
pub fn set_bool(store: &mut ResourceStore, value: bool, path: &[&str]) {
    let _ = set_value(store, Value::Bool(value), path);
}

/// Writes an integer setting, creating intermediate objects as needed.
pub fn set_int(store: &mut ResourceStore, value: i64, path: &[&str]) {
    let _ = set_value(store, Value::from(value), path);
}

/// Writes a string setting, creating intermediate objects as needed.
pub fn set_string(store: &mut ResourceStore, value: &str, path: &[&str]) {
    let _ = set_value(store, Value::from(value), path);
}

/// Writes an array setting, creating intermediate objects as needed.
pub fn set_array(store: &mut ResourceStore, values: Vec<Value>, path: &[&str]) {
    let _ = set_value(store, Value::Array(values), path);
}

#[cfg(test)]
mod tests {
    use super::*;
    use grimoire_common::InstallDirs;
    use serde_json::json;
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, ResourceStore) {
        let dir = tempdir().unwrap();
        let store = ResourceStore::new(InstallDirs::new(dir.path()));
        (dir, store)
    }

    #[test]
    fn test_set_then_get_round_trip() {
        let (_dir, mut store) = store();

        set_bool(&mut store, true, &["general", "autoUpdate"]);
        set_int(&mut store, 3, &["general", "retries"]);
        set_string(&mut store, "de", &["display", "language"]);
        set_array(&mut store, vec![json!("core")], &["general", "books"]);

        assert_eq!(get_bool(&mut store, &["general", "autoUpdate"]), Some(true));
        assert_eq!(get_int(&mut store, &["general", "retries"]), Some(3));
        assert_eq!(
            get_string(&mut store, &["display", "language"]),
            Some("de".to_string())
        );
        assert_eq!(
            get_array(&mut store, &["general", "books"]),
            Some(vec![json!("core")])
        );
    }

    #[test]
    fn test_defaults_for_missing_values() {
        let (_dir, mut store) = store();

        assert_eq!(get_bool(&mut store, &["a", "b"]), None);
        assert!(get_bool_or(&mut store, true, &["a", "b"]));
        assert_eq!(get_int_or(&mut store, 7, &["a", "b"]), 7);
        assert_eq!(get_string_or(&mut store, "x", &["a", "b"]), "x");
    }

    #[test]
    fn test_read_does_not_create_intermediate_objects() {
        let (_dir, mut store) = store();

        assert_eq!(get_bool(&mut store, &["nested", "deep", "flag"]), None);

        let id = store.get_resource(SETTINGS_PATH).unwrap();
        assert!(store.document(id).unwrap().get("nested").is_none());
    }

    #[test]
    fn test_write_creates_intermediate_objects() {
        let (_dir, mut store) = store();

        set_bool(&mut store, true, &["nested", "deep", "flag"]);

        let id = store.get_resource(SETTINGS_PATH).unwrap();
        assert_eq!(
            store.document(id).unwrap(),
            &json!({ "nested": { "deep": { "flag": true } } })
        );
    }

    #[test]
    fn test_settings_write_back_to_shipped_file() {
        let (dir, mut store) = store();
        // A shipped install carries a settings file; only then is the
        // document General-sourced and written back on save.
        let file = dir.path().join("settings/general.json");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, b"{}").unwrap();

        set_int(&mut store, 42, &["general", "answer"]);
        store.save_resources();
        store.discard_changes();

        assert_eq!(get_int(&mut store, &["general", "answer"]), Some(42));
    }

    #[test]
    fn test_non_settings_general_files_are_never_rewritten() {
        let (_dir, mut store) = store();
        let file = store.dirs().general_file("rules/weapons");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, br#"{ "axe": 5 }"#).unwrap();

        let id = store.get_resource("rules/weapons").unwrap();
        *store.document_mut(id).unwrap() = json!({ "axe": 99 });
        store.save_resources();

        let on_disk = std::fs::read_to_string(&file).unwrap();
        assert!(on_disk.contains('5'));
        assert!(!on_disk.contains("99"));
    }
}
