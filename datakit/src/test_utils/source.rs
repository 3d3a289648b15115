use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::stream;

use crate::datakit_error;
use crate::error::{DataKitResult, ErrorKind};
use crate::source::{RowSource, RowStream};
use crate::types::Row;

/// Counts how many times the wrapped source was opened.
#[derive(Debug, Clone)]
pub struct CountingSource<S> {
    inner: S,
    reads: Arc<AtomicUsize>,
}

impl<S> CountingSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of [`RowSource::rows`] calls so far, shared by all clones.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: RowSource> RowSource for CountingSource<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn rows(&self) -> DataKitResult<RowStream> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.rows().await
    }
}

/// Yields its rows, then fails with an error of the given kind.
///
/// With `fail_on_open` the error is returned by [`RowSource::rows`] itself.
#[derive(Debug, Clone)]
pub struct FailingSource {
    name: String,
    rows: Vec<Row>,
    kind: ErrorKind,
    fail_on_open: bool,
}

impl FailingSource {
    pub fn after_rows(name: impl Into<String>, rows: Vec<Row>, kind: ErrorKind) -> Self {
        Self {
            name: name.into(),
            rows,
            kind,
            fail_on_open: false,
        }
    }

    pub fn on_open(name: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
            kind,
            fail_on_open: true,
        }
    }
}

#[async_trait]
impl RowSource for FailingSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn rows(&self) -> DataKitResult<RowStream> {
        let error = datakit_error!(self.kind, "Injected source failure", self.name);
        if self.fail_on_open {
            return Err(error);
        }

        let items = self
            .rows
            .clone()
            .into_iter()
            .map(Ok)
            .chain(std::iter::once(Err(error)));

        Ok(Box::pin(stream::iter(items)))
    }
}
