//! Bidirectional dependency index.
//!
//! Tracks which cache keys carry which dependency tags so that a tag can be
//! invalidated without scanning every entry.

use std::collections::{BTreeSet, HashMap, HashSet};

use super::keys::CacheKey;

/// Tracks tag → keys and key → tags mappings.
///
/// Not synchronised on its own; the store mutates it under the same lock as
/// the entry map so that the two never disagree.
#[derive(Debug, Default)]
pub struct DependencyIndex {
    tag_to_keys: HashMap<String, HashSet<CacheKey>>,
    key_to_tags: HashMap<CacheKey, BTreeSet<String>>,
}

impl DependencyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the tags of a freshly inserted entry, replacing any tags the
    /// key carried before.
    pub fn register(&mut self, key: &CacheKey, tags: &BTreeSet<String>) {
        self.unregister(key);
        if tags.is_empty() {
            return;
        }

        for tag in tags {
            self.tag_to_keys
                .entry(tag.clone())
                .or_default()
                .insert(key.clone());
        }
        self.key_to_tags.insert(key.clone(), tags.clone());
    }

    /// Forget a key and drop tags that no longer reference anything.
    pub fn unregister(&mut self, key: &CacheKey) {
        let Some(tags) = self.key_to_tags.remove(key) else {
            return;
        };

        for tag in tags {
            if let Some(keys) = self.tag_to_keys.get_mut(&tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tag_to_keys.remove(&tag);
                }
            }
        }
    }

    /// All keys currently tagged with `tag`.
    pub fn keys_for_tag(&self, tag: &str) -> Vec<CacheKey> {
        self.tag_to_keys
            .get(tag)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.tag_to_keys.clear();
        self.key_to_tags.clear();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn key(name: &str) -> CacheKey {
        CacheKey::derive("query Section { section }", &json!({ "id": name }))
    }

    fn tags(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn register_and_lookup() {
        let mut index = DependencyIndex::new();
        let hero = key("hero");

        index.register(&hero, &tags(&["page:home", "section:hero"]));

        assert_eq!(index.keys_for_tag("page:home"), vec![hero.clone()]);
        assert_eq!(index.keys_for_tag("section:hero"), vec![hero.clone()]);
        assert_eq!(index.key_to_tags[&hero], tags(&["page:home", "section:hero"]));
        assert_eq!(index.tag_to_keys.len(), 2);
    }

    #[test]
    fn unregister_cleans_up_mappings() {
        let mut index = DependencyIndex::new();
        let hero = key("hero");

        index.register(&hero, &tags(&["page:home"]));
        index.unregister(&hero);

        assert!(index.key_to_tags.is_empty());
        assert!(index.tag_to_keys.is_empty());
        assert!(index.keys_for_tag("page:home").is_empty());
    }

    #[test]
    fn reregistering_replaces_previous_tags() {
        let mut index = DependencyIndex::new();
        let hero = key("hero");

        index.register(&hero, &tags(&["page:home"]));
        index.register(&hero, &tags(&["page:about"]));

        assert!(index.keys_for_tag("page:home").is_empty());
        assert_eq!(index.keys_for_tag("page:about"), vec![hero]);
    }

    #[test]
    fn untagged_keys_are_not_tracked() {
        let mut index = DependencyIndex::new();
        index.register(&key("plain"), &BTreeSet::new());
        assert!(index.key_to_tags.is_empty());
    }

    #[test]
    fn shared_tag_keeps_other_keys() {
        let mut index = DependencyIndex::new();
        let hero = key("hero");
        let footer = key("footer");

        index.register(&hero, &tags(&["page:home"]));
        index.register(&footer, &tags(&["page:home"]));
        index.unregister(&hero);

        assert_eq!(index.keys_for_tag("page:home"), vec![footer]);
    }
}
