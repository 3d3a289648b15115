//! Row sources: finite, restartable-by-reconstruction sequences of [`Row`]s.
//!
//! Every call to [`RowSource::rows`] reopens the underlying resource from the start. The
//! returned stream owns that resource, so dropping it (exhausted, failed or abandoned early)
//! releases the connection or file handle.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use config::shared::SourceConfig;
use futures::Stream;

use crate::error::DataKitResult;
use crate::types::Row;

pub mod client;
pub mod file;
pub mod memory;
pub mod postgres;

pub use file::CsvRowSource;
pub use memory::MemoryRowSource;
pub use postgres::PgRowSource;

/// Stream of rows produced by one pass over a source.
pub type RowStream = Pin<Box<dyn Stream<Item = DataKitResult<Row>> + Send + 'static>>;

/// A source of rows for caches and events.
#[async_trait]
pub trait RowSource: fmt::Debug + Send + Sync {
    /// Name used in logs and error details.
    fn name(&self) -> &str;

    /// Opens the source and streams its rows from the start.
    ///
    /// Fails with a connection or I/O error if the resource cannot be opened. Rows that cannot
    /// be decoded surface as [`crate::error::ErrorKind::MalformedRow`] items in the stream.
    async fn rows(&self) -> DataKitResult<RowStream>;
}

#[async_trait]
impl<S: RowSource + ?Sized> RowSource for Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn rows(&self) -> DataKitResult<RowStream> {
        (**self).rows().await
    }
}

/// Creates the source described by `config`.
pub fn source_from_config(
    name: impl Into<String>,
    config: &SourceConfig,
) -> DataKitResult<Arc<dyn RowSource>> {
    let source: Arc<dyn RowSource> = match config {
        SourceConfig::Postgres(config) => Arc::new(PgRowSource::from_config(name, config)),
        SourceConfig::File(config) => Arc::new(CsvRowSource::from_config(name, config)?),
    };

    Ok(source)
}
