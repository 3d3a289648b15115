use std::collections::HashMap;
use std::sync::Arc;

use futures::{Stream, TryStreamExt};
use tracing::{Instrument, debug, info};

use crate::assembler::binding::Binding;
use crate::assembler::stream::AssembledStream;
use crate::bail;
use crate::cache::CollisionPolicy;
use crate::error::{DataKitResult, ErrorKind};
use crate::source::RowSource;
use crate::types::{ColumnTable, Row};

/// Applies an ordered list of [`Binding`]s to event rows.
///
/// Bindings run in order on every row, so a later binding may key on columns an earlier one
/// wrote. Every enriched row carries all output columns of all bindings: a miss writes nulls.
/// The assembler holds no per-row state and is cheap to clone, which is how worker tasks share
/// it.
#[derive(Debug, Clone)]
pub struct EventAssembler {
    bindings: Arc<[Binding]>,
    collision: CollisionPolicy,
}

impl EventAssembler {
    /// Creates an assembler after checking every binding against its cache.
    ///
    /// Fails with [`ErrorKind::CacheNotBuilt`] if a cache is not built, and with
    /// [`ErrorKind::ConfigError`] if a selector does not match its cache's key arity or, under
    /// [`CollisionPolicy::Reject`], two bindings write the same column.
    pub fn new(bindings: Vec<Binding>, collision: CollisionPolicy) -> DataKitResult<Self> {
        let mut writers: HashMap<&str, usize> = HashMap::new();

        for (position, binding) in bindings.iter().enumerate() {
            let cache = binding.cache();
            if !cache.is_built() {
                bail!(
                    ErrorKind::CacheNotBuilt,
                    "Binding refers to a cache that is not built",
                    binding_context(position, binding)
                );
            }

            let arity = binding.selector().columns().len();
            if arity != cache.key_columns().len() {
                bail!(
                    ErrorKind::ConfigError,
                    "Key selector does not match the cache key",
                    format!(
                        "{}: selector has {arity} columns, cache keys on {}",
                        binding_context(position, binding),
                        cache.key_columns().len()
                    )
                );
            }

            if collision == CollisionPolicy::Reject {
                for column in binding.written_columns() {
                    if let Some(previous) = writers.insert(column.as_str(), position) {
                        bail!(
                            ErrorKind::ConfigError,
                            "Two bindings write the same column",
                            format!(
                                "column `{column}` written by bindings {previous} and {position}"
                            )
                        );
                    }
                }
            }
        }

        Ok(Self {
            bindings: bindings.into(),
            collision,
        })
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn collision_policy(&self) -> CollisionPolicy {
        self.collision
    }

    /// Enriches one event row with every binding, in order.
    pub fn assemble_one(&self, mut row: Row) -> DataKitResult<Row> {
        for (position, binding) in self.bindings.iter().enumerate() {
            binding
                .apply(&mut row, self.collision)
                .map_err(|err| err.context(binding_context(position, binding)))?;
        }

        Ok(row)
    }

    /// Enriches every row and collects the result column by column, in input order.
    pub fn assemble_all<I>(&self, rows: I) -> DataKitResult<ColumnTable>
    where
        I: IntoIterator<Item = Row>,
    {
        self.iter(rows).collect()
    }

    /// Lazily enriches rows as the returned iterator is advanced.
    pub fn iter<'a, I>(&'a self, rows: I) -> impl Iterator<Item = DataKitResult<Row>> + 'a
    where
        I: IntoIterator<Item = Row>,
        I::IntoIter: 'a,
    {
        rows.into_iter().map(move |row| self.assemble_one(row))
    }

    /// Lazily enriches a stream of rows, e.g. the rows of a [`RowSource`].
    pub fn stream<S>(&self, rows: S) -> AssembledStream<S>
    where
        S: Stream<Item = DataKitResult<Row>>,
    {
        AssembledStream::new(rows, self.clone())
    }

    /// Streams every row of `source` through the assembler into a table.
    pub async fn assemble_source(&self, source: &dyn RowSource) -> DataKitResult<ColumnTable> {
        let span = tracing::info_span!(
            "assemble",
            source = source.name(),
            bindings = self.bindings.len()
        );

        async move {
            let rows = source.rows().await?;
            let table: ColumnTable = self
                .stream(rows)
                .try_fold(ColumnTable::new(), |mut table, row| async move {
                    table.push_row(row);
                    Ok(table)
                })
                .await?;

            info!(
                rows = table.num_rows(),
                columns = table.num_columns(),
                "assembled events"
            );

            Ok(table)
        }
        .instrument(span)
        .await
    }

    /// Enriches `rows` on up to `workers` blocking tasks, keeping input order.
    ///
    /// Rows are split into contiguous chunks, one per worker. The first failing chunk fails the
    /// whole call.
    pub async fn assemble_parallel(
        &self,
        rows: Vec<Row>,
        workers: usize,
    ) -> DataKitResult<ColumnTable> {
        if workers <= 1 || rows.len() <= 1 {
            return self.assemble_all(rows);
        }

        let chunk_size = rows.len().div_ceil(workers);
        let mut rows = rows.into_iter();
        let mut handles = Vec::with_capacity(workers);

        loop {
            let chunk: Vec<Row> = rows.by_ref().take(chunk_size).collect();
            if chunk.is_empty() {
                break;
            }

            let assembler = self.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                chunk
                    .into_iter()
                    .map(|row| assembler.assemble_one(row))
                    .collect::<DataKitResult<Vec<Row>>>()
            }));
        }

        debug!(workers = handles.len(), chunk_size, "enriching events in parallel");

        let mut table = ColumnTable::new();
        for handle in handles {
            for row in handle.await?? {
                table.push_row(row);
            }
        }

        Ok(table)
    }
}

fn binding_context(position: usize, binding: &Binding) -> String {
    format!("binding {position} (cache `{}`)", binding.cache().name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::KeySelector;
    use crate::cache::KeyedCache;
    use crate::source::MemoryRowSource;
    use crate::types::Cell;

    fn row(values: &[(&str, Cell)]) -> Row {
        values.iter().cloned().collect()
    }

    async fn genres() -> Arc<KeyedCache> {
        let source = MemoryRowSource::new(
            "genres",
            vec![
                row(&[("id", Cell::I64(1)), ("genre", Cell::from("x"))]),
                row(&[("id", Cell::I64(2)), ("genre", Cell::from("y"))]),
            ],
        );
        let mut cache = KeyedCache::new("genres", source, ["id"]);
        cache.build().await.unwrap();
        Arc::new(cache)
    }

    #[tokio::test]
    async fn hit_and_miss_have_the_same_columns() {
        let assembler = EventAssembler::new(
            vec![Binding::new("user_id", genres().await)],
            CollisionPolicy::Reject,
        )
        .unwrap();

        let hit = assembler.assemble_one(row(&[("user_id", Cell::I64(1))])).unwrap();
        let miss = assembler.assemble_one(row(&[("user_id", Cell::I64(9))])).unwrap();

        assert_eq!(
            hit,
            row(&[("user_id", Cell::I64(1)), ("genre", Cell::from("x"))])
        );
        assert_eq!(miss, row(&[("user_id", Cell::I64(9)), ("genre", Cell::Null)]));
    }

    #[tokio::test]
    async fn missing_key_column_names_the_binding() {
        let assembler = EventAssembler::new(
            vec![Binding::new("user_id", genres().await)],
            CollisionPolicy::Reject,
        )
        .unwrap();

        let err = assembler
            .assemble_one(row(&[("item_id", Cell::I64(1))]))
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MissingKeyColumn);
        let detail = err.detail().unwrap();
        assert!(detail.contains("binding 0 (cache `genres`)"));
        assert!(detail.contains("user_id"));
    }

    #[tokio::test]
    async fn selector_arity_must_match_cache_key() {
        let err = EventAssembler::new(
            vec![Binding::new(
                KeySelector::composite(["user_id", "day"]),
                genres().await,
            )],
            CollisionPolicy::Reject,
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }

    #[tokio::test]
    async fn unbuilt_cache_is_rejected() {
        let cache = KeyedCache::new("genres", MemoryRowSource::new("genres", vec![]), ["id"]);

        let err = EventAssembler::new(
            vec![Binding::new("user_id", Arc::new(cache))],
            CollisionPolicy::Reject,
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::CacheNotBuilt);
    }

    #[tokio::test]
    async fn overlapping_outputs_follow_collision_policy() {
        let cache = genres().await;
        let bindings = vec![
            Binding::new("opener_id", Arc::clone(&cache)),
            Binding::new("viewer_id", Arc::clone(&cache)),
        ];

        let err = EventAssembler::new(bindings.clone(), CollisionPolicy::Reject).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigError);

        let assembler = EventAssembler::new(bindings, CollisionPolicy::Overwrite).unwrap();
        let merged = assembler
            .assemble_one(row(&[
                ("opener_id", Cell::I64(1)),
                ("viewer_id", Cell::I64(2)),
            ]))
            .unwrap();
        assert_eq!(merged.get("genre"), Some(&Cell::from("y")));
    }

    #[tokio::test]
    async fn event_column_clash_is_rejected() {
        let assembler = EventAssembler::new(
            vec![Binding::new("user_id", genres().await)],
            CollisionPolicy::Reject,
        )
        .unwrap();

        let err = assembler
            .assemble_one(row(&[("user_id", Cell::I64(1)), ("genre", Cell::from("z"))]))
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn parallel_assembly_keeps_input_order() {
        let assembler = EventAssembler::new(
            vec![Binding::new("user_id", genres().await)],
            CollisionPolicy::Reject,
        )
        .unwrap();
        let events: Vec<Row> = (0..25)
            .map(|i| row(&[("user_id", Cell::I64(i % 3))]))
            .collect();

        let sequential = assembler.assemble_all(events.clone()).unwrap();
        let parallel = assembler.assemble_parallel(events, 4).await.unwrap();

        assert_eq!(sequential, parallel);
        assert_eq!(parallel.num_rows(), 25);
    }
}
