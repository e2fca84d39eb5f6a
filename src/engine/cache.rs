// ABOUTME: TTL cache of variables produced by chain steps
// ABOUTME: Shared by concurrent ticks; expired entries are purged when next read

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

use crate::processor::Variables;

#[derive(Debug, Clone)]
struct CacheEntry {
    instance_id: String,
    values: Variables,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct StepCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl StepCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `<instance><suffix>_<step>`
    pub fn key(instance_id: &str, key_suffix: &str, step_id: &str) -> String {
        format!("{}{}_{}", instance_id, key_suffix, step_id)
    }

    /// Values stored under `key` if younger than `ttl_minutes`. A stale entry is
    /// removed on the way out. A TTL too large to represent never expires.
    pub fn get_fresh(&self, key: &str, ttl_minutes: i64) -> Option<Variables> {
        let mut entries = self.entries.lock();
        let entry = entries.get(key)?;

        let fresh = match Duration::try_minutes(ttl_minutes) {
            Some(ttl) => Utc::now() - entry.timestamp < ttl,
            None => ttl_minutes > 0,
        };
        if fresh {
            return Some(entry.values.clone());
        }

        debug!("Cache entry {} expired", key);
        entries.remove(key);
        None
    }

    pub fn store(&self, instance_id: &str, key: &str, values: Variables) {
        self.entries.lock().insert(
            key.to_string(),
            CacheEntry {
                instance_id: instance_id.to_string(),
                values,
                timestamp: Utc::now(),
            },
        );
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Drop every entry written on behalf of `instance_id`, across all its targets.
    pub fn clear_instance(&self, instance_id: &str) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.instance_id != instance_id);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Backdate an entry so expiry can be tested without waiting.
    #[cfg(test)]
    pub(crate) fn age_entry(&self, key: &str, by: Duration) {
        if let Some(entry) = self.entries.lock().get_mut(key) {
            entry.timestamp -= by;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> Variables {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_key_layout() {
        assert_eq!(StepCache::key("w", "", "login"), "w_login");
        assert_eq!(StepCache::key("w", ".1", "login"), "w.1_login");
    }

    #[test]
    fn test_fresh_entry_is_returned() {
        let cache = StepCache::new();
        cache.store("w", "w_login", values(&[("token", "abc")]));

        let hit = cache.get_fresh("w_login", 5).unwrap();
        assert_eq!(hit["token"], "abc");
        assert!(cache.get_fresh("w.0_login", 5).is_none());
    }

    #[test]
    fn test_expired_entry_is_purged() {
        let cache = StepCache::new();
        cache.store("w", "w_login", values(&[("token", "abc")]));
        cache.age_entry("w_login", Duration::minutes(6));

        assert!(cache.get_fresh("w_login", 5).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_non_positive_ttl_never_hits() {
        let cache = StepCache::new();
        cache.store("w", "w_login", values(&[("token", "abc")]));
        assert!(cache.get_fresh("w_login", -1).is_none());
    }

    #[test]
    fn test_huge_ttl_never_expires() {
        let cache = StepCache::new();
        cache.store("w", "w_login", values(&[("token", "abc")]));
        cache.age_entry("w_login", Duration::days(365));

        assert!(cache.get_fresh("w_login", 999_999_999_999_999).is_some());
        assert!(cache.get_fresh("w_login", i64::MAX).is_some());
        assert!(cache.get_fresh("w_login", i64::MIN).is_none());
    }

    #[test]
    fn test_clear_instance_only_touches_that_instance() {
        let cache = StepCache::new();
        cache.store("a", "a_s1", Variables::new());
        cache.store("a", "a.0_s1", Variables::new());
        cache.store("a_b", "a_b_s1", Variables::new());
        cache.store("c", "c_s1", Variables::new());

        assert_eq!(cache.clear_instance("a"), 2);
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }
}
