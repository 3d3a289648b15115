use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::StreamExt;
use tracing::{Instrument, debug, info, warn};

use crate::cache::normalize::KeyNormalization;
use crate::cache::policy::{self, DuplicatePolicy};
use crate::error::{DataKitResult, ErrorKind};
use crate::source::RowSource;
use crate::types::{Cell, JoinKey, Row, RowSchema};
use crate::{bail, datakit_error};

/// Immutable index produced by one build, shared between a cache and its aliases.
#[derive(Debug)]
struct CacheIndex {
    entries: HashMap<JoinKey, Vec<Cell>>,
    /// Value column names after renaming, before any suffix.
    value_names: Vec<String>,
    source_rows: u64,
}

#[derive(Debug, Default)]
struct LookupCounters {
    lookups: AtomicU64,
    misses: AtomicU64,
}

/// Snapshot of a cache's lookup counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub keys: usize,
    pub lookups: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.lookups - self.misses
    }
}

/// A lookup table from join keys to the remaining columns of a source.
///
/// A cache is built once from its [`RowSource`] and is read-only afterwards; lookups take
/// `&self` and can run from any number of tasks. Another cache with the same key columns can
/// reuse the built index through [`KeyedCache::share_with`] without reading the source again.
pub struct KeyedCache {
    name: String,
    source: Option<Arc<dyn RowSource>>,
    key_columns: Vec<String>,
    rename: HashMap<String, String>,
    suffix: Option<String>,
    duplicate_policy: DuplicatePolicy,
    normalization: KeyNormalization,
    index: Option<Arc<CacheIndex>>,
    output_names: Vec<String>,
    counters: LookupCounters,
}

impl KeyedCache {
    pub fn new<S, K>(name: impl Into<String>, source: S, key_columns: K) -> Self
    where
        S: RowSource + 'static,
        K: IntoIterator,
        K::Item: Into<String>,
    {
        let mut cache = Self::alias(name, key_columns);
        cache.source = Some(Arc::new(source));
        cache
    }

    /// Creates a cache without a source. It becomes usable once [`KeyedCache::share_with`] has
    /// pointed it at a built cache.
    pub fn alias<K>(name: impl Into<String>, key_columns: K) -> Self
    where
        K: IntoIterator,
        K::Item: Into<String>,
    {
        Self {
            name: name.into(),
            source: None,
            key_columns: key_columns.into_iter().map(Into::into).collect(),
            rename: HashMap::new(),
            suffix: None,
            duplicate_policy: DuplicatePolicy::default(),
            normalization: KeyNormalization::default(),
            index: None,
            output_names: Vec::new(),
            counters: LookupCounters::default(),
        }
    }

    /// Replaces the given source column names in the output.
    pub fn with_rename<I, A, B>(mut self, rename: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        self.rename = rename
            .into_iter()
            .map(|(from, to)| (from.into(), to.into()))
            .collect();
        self
    }

    /// Appends `_{suffix}` to every output column.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    pub fn with_key_normalization(mut self, normalization: KeyNormalization) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn is_built(&self) -> bool {
        self.index.is_some()
    }

    /// Output column names in value order. Empty until the cache is built.
    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            keys: self.index.as_ref().map_or(0, |index| index.entries.len()),
            lookups: self.counters.lookups.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
        }
    }

    /// Reads the whole source and indexes it.
    ///
    /// The first row fixes the column layout; later rows that drift from it fail the build with
    /// [`ErrorKind::MalformedRow`]. A key column absent from the source is a
    /// [`ErrorKind::ConfigError`]. Rebuilding reads the source again from the start.
    pub async fn build(&mut self) -> DataKitResult<()> {
        let Some(source) = self.source.clone() else {
            bail!(
                ErrorKind::ConfigError,
                "Cache has no source to build from",
                format!("cache `{}`", self.name)
            );
        };

        let span = tracing::info_span!("build_cache", cache = self.name, source = source.name());
        let index = self
            .read_index(source.as_ref())
            .instrument(span)
            .await
            .map_err(|err| err.context(format!("cache `{}`", self.name)))?;

        self.output_names = policy::derive_output_names(&index.value_names, self.suffix.as_deref());
        self.index = Some(Arc::new(index));

        Ok(())
    }

    async fn read_index(&self, source: &dyn RowSource) -> DataKitResult<CacheIndex> {
        info!(key = ?self.key_columns, "building cache");

        let mut rows = source.rows().await?;

        let Some(first) = rows.next().await.transpose()? else {
            warn!("cache source produced no rows");
            return Ok(CacheIndex {
                entries: HashMap::new(),
                value_names: Vec::new(),
                source_rows: 0,
            });
        };

        let mut layout = self.layout(&first)?;
        let mut builder = IndexBuilder::new(self.duplicate_policy, self.normalization);
        builder.insert(&layout, first)?;

        while let Some(row) = rows.next().await {
            let row = row?;
            layout.schema.observe(&row)?;
            builder.insert(&layout, row)?;
        }

        info!(
            rows = builder.source_rows,
            keys = builder.entries.len(),
            skipped = builder.skipped,
            "cache built"
        );

        Ok(CacheIndex {
            entries: builder.entries,
            value_names: layout.value_names,
            source_rows: builder.source_rows,
        })
    }

    fn layout(&self, first: &Row) -> DataKitResult<SourceLayout> {
        let schema = RowSchema::from_row(first);

        let mut key_positions = Vec::with_capacity(self.key_columns.len());
        for column in &self.key_columns {
            let Some(position) = schema.index_of(column) else {
                bail!(
                    ErrorKind::ConfigError,
                    "Key column is missing from the cache source",
                    format!(
                        "column `{column}`, source has {}",
                        schema.names().collect::<Vec<_>>().join(", ")
                    )
                );
            };
            key_positions.push(position);
        }

        let (value_positions, value_names) =
            policy::value_columns(schema.names(), &self.key_columns, &self.rename)?;

        Ok(SourceLayout {
            schema,
            key_positions,
            value_positions,
            value_names,
        })
    }

    /// Returns the values stored under `key`, or `None` on a miss.
    ///
    /// Keys are normalized the same way as at build time. A key with a null part is a miss.
    pub fn lookup(&self, key: &JoinKey) -> DataKitResult<Option<&[Cell]>> {
        let Some(index) = &self.index else {
            bail!(
                ErrorKind::CacheNotBuilt,
                "Cache was looked up before it was built",
                format!("cache `{}`", self.name)
            );
        };

        self.counters.lookups.fetch_add(1, Ordering::Relaxed);

        let found = if key.has_null() {
            None
        } else if self.normalization == KeyNormalization::None {
            index.entries.get(key)
        } else {
            index
                .entries
                .get(&self.normalization.normalize(key.clone()))
        };

        if found.is_none() {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
        }

        Ok(found.map(Vec::as_slice))
    }

    /// Makes this cache an alias of `other`'s built index.
    ///
    /// The index and the renamed value names are reused as they are; this cache's own suffix is
    /// then applied, so two aliases of one index can feed distinct output columns. Both caches
    /// must index the same key columns with the same duplicate policy.
    pub fn share_with(&mut self, other: &KeyedCache) -> DataKitResult<()> {
        let Some(index) = &other.index else {
            bail!(
                ErrorKind::CacheNotBuilt,
                "Cannot share a cache that is not built",
                format!("cache `{}` shares `{}`", self.name, other.name)
            );
        };

        if self.key_columns != other.key_columns {
            bail!(
                ErrorKind::ConfigError,
                "Shared caches must use the same key columns",
                format!(
                    "cache `{}` keys on {:?}, `{}` keys on {:?}",
                    self.name, self.key_columns, other.name, other.key_columns
                )
            );
        }

        if self.duplicate_policy != other.duplicate_policy {
            bail!(
                ErrorKind::ConfigError,
                "Shared caches must use the same duplicate policy",
                format!("cache `{}` shares `{}`", self.name, other.name)
            );
        }

        self.normalization = other.normalization;
        self.output_names = policy::derive_output_names(&index.value_names, self.suffix.as_deref());
        self.index = Some(Arc::clone(index));

        debug!(
            cache = self.name,
            shares = other.name,
            keys = index.entries.len(),
            source_rows = index.source_rows,
            "cache shares an existing index"
        );

        Ok(())
    }
}

impl fmt::Debug for KeyedCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedCache")
            .field("name", &self.name)
            .field("source", &self.source.as_ref().map(|source| source.name()))
            .field("key_columns", &self.key_columns)
            .field("suffix", &self.suffix)
            .field("duplicate_policy", &self.duplicate_policy)
            .field("normalization", &self.normalization)
            .field("built", &self.is_built())
            .field("output_names", &self.output_names)
            .finish()
    }
}

/// Positions of key and value columns, resolved from the first source row.
struct SourceLayout {
    schema: RowSchema,
    key_positions: Vec<usize>,
    value_positions: Vec<usize>,
    value_names: Vec<String>,
}

/// Accumulates source rows into index entries.
struct IndexBuilder {
    policy: DuplicatePolicy,
    normalization: KeyNormalization,
    entries: HashMap<JoinKey, Vec<Cell>>,
    /// Rows folded into each running mean.
    counts: HashMap<JoinKey, u64>,
    source_rows: u64,
    skipped: u64,
}

impl IndexBuilder {
    fn new(policy: DuplicatePolicy, normalization: KeyNormalization) -> Self {
        Self {
            policy,
            normalization,
            entries: HashMap::new(),
            counts: HashMap::new(),
            source_rows: 0,
            skipped: 0,
        }
    }

    fn insert(&mut self, layout: &SourceLayout, row: Row) -> DataKitResult<()> {
        self.source_rows += 1;

        let values = row.into_values();
        let key = self
            .normalization
            .normalize(JoinKey::from_values(&values, &layout.key_positions));
        if key.has_null() {
            self.skipped += 1;
            debug!(row = self.source_rows, "skipping source row with a null key");
            return Ok(());
        }

        let values: Vec<Cell> = layout
            .value_positions
            .iter()
            .map(|&position| values[position].clone())
            .collect();

        match self.policy {
            DuplicatePolicy::LastWriteWins => {
                self.entries.insert(key, values);
            }
            DuplicatePolicy::RunningMean => {
                if values.iter().any(Cell::is_null) {
                    self.skipped += 1;
                    return Ok(());
                }
                self.accumulate_mean(key, &values, &layout.value_names)?;
            }
        }

        Ok(())
    }

    /// Folds `values` into the mean stored under `key` as `(n * old + x) / (n + 1)`.
    fn accumulate_mean(
        &mut self,
        key: JoinKey,
        values: &[Cell],
        names: &[String],
    ) -> DataKitResult<()> {
        let mut observed = Vec::with_capacity(values.len());
        for (value, name) in values.iter().zip(names) {
            let Some(number) = value.as_f64() else {
                return Err(datakit_error!(
                    ErrorKind::ConversionError,
                    "Averaged cache column is not numeric",
                    format!("column `{name}` holds {value:?}")
                ));
            };
            observed.push(number);
        }

        let count = self.counts.entry(key.clone()).or_insert(0);
        let n = *count as f64;
        *count += 1;

        match self.entries.get_mut(&key) {
            Some(current) => {
                for (cell, x) in current.iter_mut().zip(observed) {
                    let old = cell.as_f64().unwrap_or_default();
                    *cell = Cell::F64((n * old + x) / (n + 1.0));
                }
            }
            None => {
                self.entries
                    .insert(key, observed.into_iter().map(Cell::F64).collect());
            }
        }

        Ok(())
    }
}
