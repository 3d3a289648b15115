use std::collections::HashSet;

use serde::Deserialize;

use crate::shared::{CacheConfig, KeyConfig, SourceConfig, ValidationError};

/// Wiring of caches, bindings and the event source for one assembly run.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AssemblyConfig {
    pub caches: Vec<CacheConfig>,
    /// Applied in order to every event.
    pub bindings: Vec<BindingConfig>,
    pub events: SourceConfig,
    #[serde(default)]
    pub collision_policy: CollisionPolicyConfig,
    /// Worker tasks used for per-row enrichment. `1` enriches on the calling task.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl AssemblyConfig {
    pub const DEFAULT_WORKERS: usize = 1;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.workers == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "assembly.workers".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        let mut names = HashSet::with_capacity(self.caches.len());
        for cache in &self.caches {
            cache.validate()?;
            if !names.insert(cache.name.as_str()) {
                return Err(ValidationError::DuplicateCacheName(cache.name.clone()));
            }
        }

        for cache in &self.caches {
            if let Some(target) = &cache.share_with
                && !names.contains(target.as_str())
            {
                return Err(ValidationError::UnknownCache {
                    referenced_by: format!("caches.{}.share_with", cache.name),
                    cache: target.clone(),
                });
            }
        }

        for (position, binding) in self.bindings.iter().enumerate() {
            binding
                .key
                .validate(&format!("bindings[{position}].key"))?;
            if !names.contains(binding.cache.as_str()) {
                return Err(ValidationError::UnknownCache {
                    referenced_by: format!("bindings[{position}]"),
                    cache: binding.cache.clone(),
                });
            }
        }

        self.events.validate()
    }
}

/// Joins a cache onto events using the given event columns as the lookup key.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BindingConfig {
    pub key: KeyConfig,
    pub cache: String,
}

/// What happens when a cache writes a column the event already carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicyConfig {
    #[default]
    Reject,
    Overwrite,
}

fn default_workers() -> usize {
    AssemblyConfig::DEFAULT_WORKERS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assembly(json: &str) -> AssemblyConfig {
        serde_json::from_str(json).unwrap()
    }

    const EVENTS: &str = r#""events": {"type": "file", "path": "events.csv"}"#;

    #[test]
    fn valid_assembly_passes() {
        let config = assembly(&format!(
            r#"{{
                "caches": [
                    {{"name": "users", "key": "id", "source": {{"type": "file", "path": "users.csv"}}}}
                ],
                "bindings": [{{"key": "user_id", "cache": "users"}}],
                {EVENTS}
            }}"#
        ));

        assert!(config.validate().is_ok());
        assert_eq!(config.collision_policy, CollisionPolicyConfig::Reject);
        assert_eq!(config.workers, AssemblyConfig::DEFAULT_WORKERS);
    }

    #[test]
    fn binding_to_unknown_cache_is_rejected() {
        let config = assembly(&format!(
            r#"{{"caches": [], "bindings": [{{"key": "user_id", "cache": "users"}}], {EVENTS}}}"#
        ));

        assert_eq!(
            config.validate(),
            Err(ValidationError::UnknownCache {
                referenced_by: "bindings[0]".to_string(),
                cache: "users".to_string(),
            })
        );
    }

    #[test]
    fn duplicate_cache_names_are_rejected() {
        let config = assembly(&format!(
            r#"{{
                "caches": [
                    {{"name": "users", "key": "id", "source": {{"type": "file", "path": "a.csv"}}}},
                    {{"name": "users", "key": "id", "source": {{"type": "file", "path": "b.csv"}}}}
                ],
                "bindings": [],
                {EVENTS}
            }}"#
        ));

        assert_eq!(
            config.validate(),
            Err(ValidationError::DuplicateCacheName("users".to_string()))
        );
    }

    #[test]
    fn alias_to_unknown_cache_is_rejected() {
        let config = assembly(&format!(
            r#"{{
                "caches": [{{"name": "viewer", "key": "id", "share_with": "opener"}}],
                "bindings": [],
                {EVENTS}
            }}"#
        ));

        assert!(matches!(
            config.validate(),
            Err(ValidationError::UnknownCache { cache, .. }) if cache == "opener"
        ));
    }
}
