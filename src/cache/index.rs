//! Secondary indexes over cache keys.
//!
//! [`TagIndex`] maps tags to the keys carrying them (and back) so tag
//! invalidation never scans the store. [`KeyIndex`] keeps keys ordered so
//! glob deletion only visits the range sharing the pattern's literal prefix.
//! Both are owned by the local tier and updated under the same lock as the
//! entries themselves.

use std::collections::{BTreeSet, HashMap, HashSet};

#[derive(Debug)]
struct TaggedKey {
    tags: HashSet<String>,
    expires_at_ms: u64,
}

/// Bidirectional tag ↔ key registry.
///
/// Each key remembers when its entry expires so registrations whose entry
/// only lives in the remote tier can still be swept once stale.
#[derive(Debug, Default)]
pub struct TagIndex {
    tag_to_keys: HashMap<String, HashSet<String>>,
    key_to_tags: HashMap<String, TaggedKey>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `key` under `tags`, replacing any previous registration.
    pub fn register(&mut self, key: &str, tags: &[String], expires_at_ms: u64) {
        self.unregister(key);
        if tags.is_empty() {
            return;
        }

        let tags: HashSet<String> = tags.iter().cloned().collect();
        for tag in &tags {
            self.tag_to_keys
                .entry(tag.clone())
                .or_default()
                .insert(key.to_string());
        }
        self.key_to_tags.insert(
            key.to_string(),
            TaggedKey {
                tags,
                expires_at_ms,
            },
        );
    }

    /// Drop `key` from every tag it was registered under.
    pub fn unregister(&mut self, key: &str) {
        let Some(tagged) = self.key_to_tags.remove(key) else {
            return;
        };
        for tag in tagged.tags {
            if let Some(keys) = self.tag_to_keys.get_mut(&tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tag_to_keys.remove(&tag);
                }
            }
        }
    }

    /// Remove `tag` entirely, returning the keys that carried it. The keys
    /// themselves are fully unregistered: the caller deletes their entries.
    pub fn take_tag(&mut self, tag: &str) -> HashSet<String> {
        let keys = self.tag_to_keys.remove(tag).unwrap_or_default();
        for key in &keys {
            self.unregister(key);
        }
        keys
    }

    pub fn keys_for_tag(&self, tag: &str) -> HashSet<String> {
        self.tag_to_keys.get(tag).cloned().unwrap_or_default()
    }

    pub fn tags_for_key(&self, key: &str) -> HashSet<String> {
        self.key_to_tags
            .get(key)
            .map(|tagged| tagged.tags.clone())
            .unwrap_or_default()
    }

    pub fn contains_tag(&self, tag: &str) -> bool {
        self.tag_to_keys.contains_key(tag)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.key_to_tags.contains_key(key)
    }

    /// Unregister keys whose entry expired at or before `now_ms`.
    pub fn purge_expired(&mut self, now_ms: u64) -> Vec<String> {
        let expired: Vec<String> = self
            .key_to_tags
            .iter()
            .filter(|(_, tagged)| tagged.expires_at_ms <= now_ms)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.unregister(key);
        }
        expired
    }

    pub fn clear(&mut self) {
        self.tag_to_keys.clear();
        self.key_to_tags.clear();
    }

    pub fn tag_count(&self) -> usize {
        self.tag_to_keys.len()
    }

    pub fn key_count(&self) -> usize {
        self.key_to_tags.len()
    }
}

/// Ordered key set answering glob queries.
#[derive(Debug, Default)]
pub struct KeyIndex {
    keys: BTreeSet<String>,
}

impl KeyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str) {
        self.keys.insert(key.to_string());
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.keys.remove(key)
    }

    /// Keys matching `pattern`, where `*` matches any run of characters.
    pub fn matching(&self, pattern: &str) -> Vec<String> {
        let literal = literal_prefix(pattern);
        self.keys
            .range(literal.to_string()..)
            .take_while(|key| key.starts_with(literal))
            .filter(|key| glob_matches(pattern, key))
            .cloned()
            .collect()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

fn literal_prefix(pattern: &str) -> &str {
    match pattern.find('*') {
        Some(index) => &pattern[..index],
        None => pattern,
    }
}

/// Match `candidate` against a glob in which `*` is the only wildcard.
pub fn glob_matches(pattern: &str, candidate: &str) -> bool {
    let mut segments = pattern.split('*');
    let Some(head) = segments.next() else {
        return candidate.is_empty();
    };
    let Some(mut rest) = candidate.strip_prefix(head) else {
        return false;
    };

    let tail: Vec<&str> = segments.collect();
    let Some((last, middle)) = tail.split_last() else {
        // No wildcard at all: exact match.
        return rest.is_empty();
    };

    for segment in middle {
        if segment.is_empty() {
            continue;
        }
        match rest.find(segment) {
            Some(index) => rest = &rest[index + segment.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}
