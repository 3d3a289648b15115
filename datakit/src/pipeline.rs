//! Configuration driven wiring of caches, bindings and the event source.

use std::sync::Arc;

use config::shared::{AssemblyConfig, CacheConfig};
use futures::TryStreamExt;
use tracing::info;

use crate::assembler::{Binding, EventAssembler, KeySelector};
use crate::bail;
use crate::cache::{CacheStats, CollisionPolicy, KeyedCache};
use crate::concurrency::build_caches;
use crate::error::{DataKitResult, ErrorKind};
use crate::source::{RowSource, source_from_config};
use crate::types::{ColumnTable, Row};

/// Caches, bindings and event source of one assembly run.
///
/// [`AssemblyPipeline::build`] builds the caches once; later calls reuse them.
#[derive(Debug)]
pub struct AssemblyPipeline {
    pending: Vec<KeyedCache>,
    /// `(alias, target)` cache names, resolved after the build barrier.
    aliases: Vec<(String, String)>,
    bindings: Vec<(KeySelector, String)>,
    events: Arc<dyn RowSource>,
    collision: CollisionPolicy,
    workers: usize,
    caches: Vec<Arc<KeyedCache>>,
    assembler: Option<EventAssembler>,
}

impl AssemblyPipeline {
    pub fn from_config(config: &AssemblyConfig) -> DataKitResult<Self> {
        config.validate()?;

        let mut pending = Vec::with_capacity(config.caches.len());
        let mut aliases = Vec::new();
        for cache in &config.caches {
            if let Some(target) = &cache.share_with {
                aliases.push((cache.name.clone(), target.clone()));
            }
            pending.push(cache_from_config(cache)?);
        }

        let bindings = config
            .bindings
            .iter()
            .map(|binding| (KeySelector::from(binding.key.clone()), binding.cache.clone()))
            .collect();

        Ok(Self {
            pending,
            aliases,
            bindings,
            events: source_from_config("events", &config.events)?,
            collision: config.collision_policy.into(),
            workers: config.workers,
            caches: Vec::new(),
            assembler: None,
        })
    }

    /// Builds all caches, resolves aliases and returns the assembler for the bindings.
    ///
    /// On failure the caches are kept, so a later call reports the same error.
    pub async fn build(&mut self) -> DataKitResult<EventAssembler> {
        if let Some(assembler) = &self.assembler {
            return Ok(assembler.clone());
        }

        let mut caches = std::mem::take(&mut self.pending);
        if let Err(err) = prepare_caches(&mut caches, &self.aliases).await {
            self.pending = caches;
            return Err(err);
        }

        let mut caches: Vec<Arc<KeyedCache>> = caches.into_iter().map(Arc::new).collect();
        let assembler = match self.bind(&caches) {
            Ok(assembler) => assembler,
            Err(err) => {
                // The failed bindings are dropped, so every cache has one owner again.
                self.pending = caches.into_iter().filter_map(Arc::into_inner).collect();
                return Err(err);
            }
        };

        caches.sort_by(|a, b| a.name().cmp(b.name()));
        self.caches = caches;
        self.assembler = Some(assembler.clone());

        Ok(assembler)
    }

    fn bind(&self, caches: &[Arc<KeyedCache>]) -> DataKitResult<EventAssembler> {
        let mut bindings = Vec::with_capacity(self.bindings.len());
        for (selector, name) in &self.bindings {
            let Some(cache) = caches.iter().find(|cache| cache.name() == name) else {
                bail!(
                    ErrorKind::ConfigError,
                    "Binding refers to an unknown cache",
                    format!("cache `{name}`")
                );
            };
            bindings.push(Binding::new(selector.clone(), Arc::clone(cache)));
        }

        EventAssembler::new(bindings, self.collision)
    }

    /// Builds the caches and streams the event source through the assembler.
    pub async fn run(&mut self) -> DataKitResult<ColumnTable> {
        let assembler = self.build().await?;

        let table = if self.workers > 1 {
            let rows: Vec<Row> = self.events.rows().await?.try_collect().await?;
            assembler.assemble_parallel(rows, self.workers).await?
        } else {
            assembler.assemble_source(self.events.as_ref()).await?
        };

        for (name, stats) in self.cache_stats() {
            info!(
                cache = name,
                keys = stats.keys,
                lookups = stats.lookups,
                hits = stats.hits(),
                misses = stats.misses,
                "cache usage"
            );
        }

        Ok(table)
    }

    /// Lookup counters of every cache, by name. Empty before [`AssemblyPipeline::build`].
    pub fn cache_stats(&self) -> Vec<(&str, CacheStats)> {
        self.caches
            .iter()
            .map(|cache| (cache.name(), cache.stats()))
            .collect()
    }
}

fn cache_from_config(config: &CacheConfig) -> DataKitResult<KeyedCache> {
    let key_columns = config.key.columns();
    let cache = match &config.source {
        Some(source) => KeyedCache::new(
            config.name.clone(),
            source_from_config(config.name.clone(), source)?,
            key_columns,
        ),
        None => KeyedCache::alias(config.name.clone(), key_columns),
    };

    let mut cache = cache
        .with_rename(config.rename.clone())
        .with_duplicate_policy(config.aggregate.into())
        .with_key_normalization(config.normalize.into());
    if let Some(suffix) = &config.suffix {
        cache = cache.with_suffix(suffix.clone());
    }

    Ok(cache)
}

async fn prepare_caches(
    caches: &mut [KeyedCache],
    aliases: &[(String, String)],
) -> DataKitResult<()> {
    build_caches(caches).await?;

    for (alias, target) in aliases {
        resolve_alias(caches, alias, target)?;
    }

    Ok(())
}

fn resolve_alias(caches: &mut [KeyedCache], alias: &str, target: &str) -> DataKitResult<()> {
    let position = |name: &str| caches.iter().position(|cache| cache.name() == name);

    let (Some(alias), Some(target)) = (position(alias), position(target)) else {
        bail!(
            ErrorKind::ConfigError,
            "Shared cache is not declared",
            format!("cache `{alias}` shares `{target}`")
        );
    };

    if !caches[target].has_source() {
        bail!(
            ErrorKind::ConfigError,
            "A cache can only share a cache that has its own source",
            format!(
                "cache `{}` shares `{}`",
                caches[alias].name(),
                caches[target].name()
            )
        );
    }

    if alias < target {
        let (left, right) = caches.split_at_mut(target);
        left[alias].share_with(&right[0])
    } else {
        let (left, right) = caches.split_at_mut(alias);
        right[0].share_with(&left[target])
    }
}
