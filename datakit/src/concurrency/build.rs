use futures::future::try_join_all;
use tracing::info;

use crate::cache::KeyedCache;
use crate::error::DataKitResult;

/// Builds every cache that owns a source, concurrently.
///
/// Caches without a source are aliases and are skipped; they are resolved with
/// [`KeyedCache::share_with`] once this barrier has returned. The first failing build aborts the
/// others and is returned with the failing cache named in its detail.
pub async fn build_caches(caches: &mut [KeyedCache]) -> DataKitResult<()> {
    let builds: Vec<_> = caches
        .iter_mut()
        .filter(|cache| cache.has_source())
        .map(|cache| cache.build())
        .collect();

    let count = builds.len();
    try_join_all(builds).await?;

    info!(caches = count, "built caches");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::source::MemoryRowSource;
    use crate::types::{Cell, Row};

    fn source(name: &str) -> MemoryRowSource {
        let row: Row = [("id", Cell::I64(1)), ("value", Cell::from(name))]
            .into_iter()
            .collect();
        MemoryRowSource::new(name, vec![row])
    }

    #[tokio::test]
    async fn builds_sourced_caches_and_skips_aliases() {
        let mut caches = vec![
            KeyedCache::new("a", source("a"), ["id"]),
            KeyedCache::new("b", source("b"), ["id"]),
            KeyedCache::alias("c", ["id"]),
        ];

        build_caches(&mut caches).await.unwrap();

        assert!(caches[0].is_built());
        assert!(caches[1].is_built());
        assert!(!caches[2].is_built());
    }

    #[tokio::test]
    async fn failure_names_the_cache() {
        let mut caches = vec![
            KeyedCache::new("a", source("a"), ["id"]),
            KeyedCache::new("broken", source("b"), ["missing"]),
        ];

        let err = build_caches(&mut caches).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConfigError);
        assert!(err.detail().unwrap().contains("cache `broken`"));
    }
}
