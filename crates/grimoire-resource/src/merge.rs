//! Layer overlay merging.

use serde_json::{Map, Value};

use crate::discriminate::Discriminator;

/// Applies `overlay` onto `base`, key by key.
///
/// Nested objects merge recursively, primitives and lists replace, and an
/// explicit JSON `null` in the overlay deletes the key from the base. Keys
/// absent from the overlay are left untouched.
///
/// When both sides hold a discriminated object at the same key, the book
/// priority list decides: the base entry survives only if its rank is
/// strictly better, otherwise the overlay entry replaces it wholesale.
pub(crate) fn overlay_object(
    base: &mut Map<String, Value>,
    overlay: Map<String, Value>,
    disc: &Discriminator,
) {
    for (key, value) in overlay {
        if value.is_null() {
            base.remove(&key);
            continue;
        }
        match (base.get_mut(&key), value) {
            (Some(Value::Object(base_obj)), Value::Object(overlay_obj)) => {
                if disc.has_priorities() {
                    let base_rank = disc.priority_of(base_obj);
                    let overlay_rank = disc.priority_of(&overlay_obj);
                    if base_rank != overlay_rank {
                        if overlay_rank < base_rank {
                            base.insert(key, Value::Object(overlay_obj));
                        }
                        continue;
                    }
                }
                overlay_object(base_obj, overlay_obj, disc);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn merge(base: Value, overlay: Value, disc: &Discriminator) -> Value {
        let Value::Object(mut base_obj) = base else {
            panic!("base must be an object")
        };
        let Value::Object(overlay_obj) = overlay else {
            panic!("overlay must be an object")
        };
        overlay_object(&mut base_obj, overlay_obj, disc);
        Value::Object(base_obj)
    }

    fn plain() -> Discriminator {
        Discriminator::new("books", None)
    }

    #[test]
    fn test_overlay_sets_and_keeps() {
        let merged = merge(json!({ "a": 0, "b": 2 }), json!({ "a": 1 }), &plain());
        assert_eq!(merged, json!({ "a": 1, "b": 2 }));
    }

    #[test]
    fn test_overlay_null_deletes_key() {
        let merged = merge(json!({ "a": 1, "b": 2 }), json!({ "b": null }), &plain());
        assert_eq!(merged, json!({ "a": 1 }));
    }

    #[test]
    fn test_overlay_merges_nested_objects() {
        let merged = merge(
            json!({ "nested": { "keep": true, "replace": 1 } }),
            json!({ "nested": { "replace": 2, "add": 3 } }),
            &plain(),
        );
        assert_eq!(
            merged,
            json!({ "nested": { "keep": true, "replace": 2, "add": 3 } })
        );
    }

    #[test]
    fn test_overlay_replaces_arrays_wholesale() {
        let merged = merge(json!({ "list": [1, 2, 3] }), json!({ "list": [4] }), &plain());
        assert_eq!(merged, json!({ "list": [4] }));
    }

    #[test]
    fn test_overlay_object_over_primitive() {
        let merged = merge(json!({ "a": 1 }), json!({ "a": { "b": 2 } }), &plain());
        assert_eq!(merged, json!({ "a": { "b": 2 } }));
    }

    #[test]
    fn test_higher_priority_base_entry_survives() {
        let disc = Discriminator::new(
            "books",
            Some(vec!["core".to_string(), "extra".to_string()]),
        );
        let merged = merge(
            json!({ "axe": { "books": { "core": 10 }, "damage": 5 } }),
            json!({ "axe": { "books": { "extra": 3 }, "damage": 7 } }),
            &disc,
        );
        assert_eq!(merged["axe"]["damage"], json!(5));
    }

    #[test]
    fn test_better_overlay_entry_replaces_wholesale() {
        let disc = Discriminator::new(
            "books",
            Some(vec!["core".to_string(), "extra".to_string()]),
        );
        let merged = merge(
            json!({ "axe": { "books": { "extra": 3 }, "damage": 5, "weight": 2 } }),
            json!({ "axe": { "books": { "core": 10 }, "damage": 7 } }),
            &disc,
        );
        assert_eq!(merged["axe"]["damage"], json!(7));
        // Replacement, not a merge: the old entry's extra field is gone.
        assert!(merged["axe"].get("weight").is_none());
    }
}
