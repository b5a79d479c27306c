//! Source-book discrimination.
//!
//! Rules data may tag an entry with the books (and pages) it was printed
//! in, under a configurable field name. The store strips that field out of
//! every freshly acquired document into a side table, keyed by the
//! element's position in the tree, and uses the user's configured book
//! priority list to decide which of two same-keyed entries survives a
//! layer merge. Entries backed exclusively by books the user does not own
//! are dropped entirely.

use std::collections::HashMap;

use serde_json::{Map, Value};

/// Per-document side table: element pointer (`/key/0/sub`) to the book
/// object that was stripped from that element.
pub type DiscriminationTable = HashMap<String, Value>;

/// Priority assigned to entries that carry no book information at all.
/// They lose against any entry from a prioritized book but are never
/// dropped.
pub(crate) const UNDISCRIMINATED: usize = usize::MAX - 1;

/// Extracts and evaluates the discriminating book attribute.
pub(crate) struct Discriminator {
    field: String,
    priorities: Option<Vec<String>>,
}

impl Discriminator {
    pub fn new(field: impl Into<String>, priorities: Option<Vec<String>>) -> Self {
        Self {
            field: field.into(),
            priorities,
        }
    }

    /// Rank of an object entry per the configured book priority list.
    ///
    /// Lower is better. `usize::MAX` means the entry names only books
    /// outside the list; [`UNDISCRIMINATED`] means it names no books.
    pub fn priority_of(&self, entry: &Map<String, Value>) -> usize {
        let Some(priorities) = &self.priorities else {
            return UNDISCRIMINATED;
        };
        let Some(Value::Object(books)) = entry.get(&self.field) else {
            return UNDISCRIMINATED;
        };
        priorities
            .iter()
            .position(|book| books.contains_key(book))
            .unwrap_or(usize::MAX)
    }

    /// Whether priority-based resolution is active at all.
    pub fn has_priorities(&self) -> bool {
        self.priorities.is_some()
    }

    /// Drops object members backed exclusively by books outside the
    /// priority list. No-op when no list is configured.
    pub fn filter_unprioritized(&self, value: &mut Value) {
        if self.priorities.is_none() {
            return;
        }
        match value {
            Value::Object(map) => {
                map.retain(|_, member| match member {
                    Value::Object(entry) => self.priority_of(entry) != usize::MAX,
                    _ => true,
                });
                for member in map.values_mut() {
                    self.filter_unprioritized(member);
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.filter_unprioritized(item);
                }
            }
            _ => {}
        }
    }

    /// Strips the discriminating field from every object element in the
    /// tree, recording the removed book objects into a pointer-keyed side
    /// table.
    pub fn extract(&self, value: &mut Value) -> DiscriminationTable {
        let mut table = DiscriminationTable::new();
        self.extract_into(value, String::new(), &mut table);
        table
    }

    fn extract_into(&self, value: &mut Value, pointer: String, table: &mut DiscriminationTable) {
        match value {
            Value::Object(map) => {
                if matches!(map.get(&self.field), Some(Value::Object(_)))
                    && let Some(books) = map.remove(&self.field)
                {
                    table.insert(pointer.clone(), books);
                }
                for (key, member) in map.iter_mut() {
                    self.extract_into(member, format!("{pointer}/{key}"), table);
                }
            }
            Value::Array(items) => {
                for (index, item) in items.iter_mut().enumerate() {
                    self.extract_into(item, format!("{pointer}/{index}"), table);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn discriminator(priorities: Option<Vec<&str>>) -> Discriminator {
        Discriminator::new(
            "books",
            priorities.map(|list| list.into_iter().map(String::from).collect()),
        )
    }

    #[test]
    fn test_extract_strips_and_records() {
        let disc = discriminator(None);
        let mut doc = json!({
            "axe": { "books": { "core": 12 }, "damage": 5 },
            "list": [ { "books": { "extra": 3 } } ]
        });

        let table = disc.extract(&mut doc);

        assert_eq!(doc["axe"], json!({ "damage": 5 }));
        assert_eq!(doc["list"][0], json!({}));
        assert_eq!(table["/axe"], json!({ "core": 12 }));
        assert_eq!(table["/list/0"], json!({ "extra": 3 }));
    }

    #[test]
    fn test_extract_ignores_non_object_field() {
        let disc = discriminator(None);
        let mut doc = json!({ "entry": { "books": "core" } });

        let table = disc.extract(&mut doc);

        assert_eq!(doc["entry"]["books"], json!("core"));
        assert!(table.is_empty());
    }

    #[test]
    fn test_priority_ranks_by_first_owned_book() {
        let disc = discriminator(Some(vec!["core", "extra"]));
        let core = json!({ "books": { "core": 1 } });
        let extra = json!({ "books": { "extra": 9 } });
        let unknown = json!({ "books": { "homebrew": 2 } });
        let plain = json!({ "damage": 5 });

        assert_eq!(disc.priority_of(core.as_object().unwrap()), 0);
        assert_eq!(disc.priority_of(extra.as_object().unwrap()), 1);
        assert_eq!(disc.priority_of(unknown.as_object().unwrap()), usize::MAX);
        assert_eq!(disc.priority_of(plain.as_object().unwrap()), UNDISCRIMINATED);
    }

    #[test]
    fn test_filter_drops_unowned_entries() {
        let disc = discriminator(Some(vec!["core"]));
        let mut doc = json!({
            "axe": { "books": { "core": 12 } },
            "flail": { "books": { "homebrew": 2 } },
            "fist": { "damage": 1 }
        });

        disc.filter_unprioritized(&mut doc);

        assert!(doc.get("axe").is_some());
        assert!(doc.get("flail").is_none());
        assert!(doc.get("fist").is_some());
    }

    #[test]
    fn test_filter_is_noop_without_priority_list() {
        let disc = discriminator(None);
        let mut doc = json!({ "flail": { "books": { "homebrew": 2 } } });

        disc.filter_unprioritized(&mut doc);

        assert!(doc.get("flail").is_some());
    }
}
