use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use config::shared::FileSourceConfig;
use futures::Stream;
use pin_project_lite::pin_project;
use tokio::sync::mpsc;
use tracing::debug;

use crate::conversions::text::{FieldKind, column_cell};
use crate::error::{DataKitError, DataKitResult, ErrorKind};
use crate::source::{RowSource, RowStream};
use crate::types::Row;
use crate::{bail, datakit_error};

/// Number of decoded chunks buffered ahead of the consumer.
const CHUNK_BUFFER: usize = 1;

/// Rows of a delimited text file with a header line.
///
/// The file is read on a blocking task in chunks of `chunk_size` records. Rows are yielded one
/// at a time regardless of chunk boundaries. Every record must have as many fields as the
/// header; a shorter or longer record fails the stream with
/// [`ErrorKind::MalformedRow`].
///
/// Each column gets one type, inferred over the first chunk: integers widen to floats and a
/// column with any other mix is text.
#[derive(Debug, Clone)]
pub struct CsvRowSource {
    name: String,
    path: PathBuf,
    chunk_size: usize,
    delimiter: u8,
    columns: Option<Vec<String>>,
    text_columns: HashSet<String>,
}

impl CsvRowSource {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            chunk_size: FileSourceConfig::DEFAULT_CHUNK_SIZE,
            delimiter: FileSourceConfig::DEFAULT_DELIMITER,
            columns: None,
            text_columns: HashSet::new(),
        }
    }

    pub fn from_config(name: impl Into<String>, config: &FileSourceConfig) -> DataKitResult<Self> {
        config.validate()?;

        let mut source = Self::new(name, &config.path)
            .with_chunk_size(config.chunk_size)
            .with_delimiter(config.delimiter_byte()?)
            .with_text_columns(config.text_columns.iter().cloned());
        if let Some(columns) = &config.columns {
            source = source.with_columns(columns.iter().cloned());
        }

        Ok(source)
    }

    /// Records read per chunk. Values below one are raised to one.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Keeps only the named columns, in the given order.
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Columns kept as text, e.g. postcodes with leading zeros.
    pub fn with_text_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.text_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RowSource for CsvRowSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn rows(&self) -> DataKitResult<RowStream> {
        let source = self.clone();
        let reader = tokio::task::spawn_blocking(move || source.open()).await??;

        let (tx, rx) = mpsc::channel(CHUNK_BUFFER);
        tokio::task::spawn_blocking(move || reader.run(tx));

        Ok(Box::pin(ChunkedRowStream {
            rx,
            pending: Vec::new().into_iter(),
        }))
    }
}

impl CsvRowSource {
    fn open(self) -> DataKitResult<ChunkReader> {
        let file = File::open(&self.path).map_err(|err| {
            datakit_error!(
                ErrorKind::SourceIoError,
                "Failed to open delimited file",
                self.path.display(),
                source: err
            )
        })?;

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(false)
            .from_reader(file);

        let header = reader.headers()?.clone();
        let selected = match &self.columns {
            None => header.iter().enumerate().map(|(i, name)| (i, name.to_string())).collect(),
            Some(columns) => {
                let mut selected = Vec::with_capacity(columns.len());
                for column in columns {
                    let Some(index) = header.iter().position(|name| name == column) else {
                        bail!(
                            ErrorKind::ConfigError,
                            "Selected column is missing from the file header",
                            format!("column `{column}` in {}", self.path.display())
                        );
                    };
                    selected.push((index, column.clone()));
                }
                selected
            }
        };

        let kinds = selected
            .iter()
            .map(|(_, name)| {
                if self.text_columns.contains(name) {
                    FieldKind::Text
                } else {
                    FieldKind::Unknown
                }
            })
            .collect();

        Ok(ChunkReader {
            name: self.name,
            reader,
            selected,
            kinds,
            inferred: false,
            chunk_size: self.chunk_size,
        })
    }
}

/// Blocking side of a file pass: decodes records and hands them over in chunks.
struct ChunkReader {
    name: String,
    reader: csv::Reader<File>,
    selected: Vec<(usize, String)>,
    /// Column kinds, fixed from the first chunk.
    kinds: Vec<FieldKind>,
    inferred: bool,
    chunk_size: usize,
}

impl ChunkReader {
    fn run(mut self, tx: mpsc::Sender<DataKitResult<Vec<Row>>>) {
        loop {
            let (records, error) = self.read_chunk();
            let last = error.is_some() || records.len() < self.chunk_size;

            if !self.inferred {
                self.infer_kinds(&records);
            }
            let rows: Vec<Row> = records.iter().map(|record| self.decode(record)).collect();

            // Rows decoded before a bad record are delivered ahead of the error.
            if !rows.is_empty() {
                debug!(source = self.name, rows = rows.len(), "read file chunk");
                if tx.blocking_send(Ok(rows)).is_err() {
                    debug!(source = self.name, "file stream dropped before completion");
                    return;
                }
            }

            if let Some(err) = error {
                let _ = tx.blocking_send(Err(err));
                return;
            }

            if last {
                return;
            }
        }
    }

    fn read_chunk(&mut self) -> (Vec<csv::StringRecord>, Option<DataKitError>) {
        let mut records = Vec::with_capacity(self.chunk_size);
        while records.len() < self.chunk_size {
            let mut record = csv::StringRecord::new();
            match self.reader.read_record(&mut record) {
                Ok(true) => records.push(record),
                Ok(false) => break,
                Err(err) => return (records, Some(err.into())),
            }
        }

        (records, None)
    }

    /// Widens every non-text column over the fields of `records`. Integers widen to floats;
    /// any other mix becomes text.
    fn infer_kinds(&mut self, records: &[csv::StringRecord]) {
        for ((index, _), kind) in self.selected.iter().zip(self.kinds.iter_mut()) {
            if *kind == FieldKind::Text {
                continue;
            }

            *kind = records
                .iter()
                .map(|record| FieldKind::of(record.get(*index).unwrap_or_default()))
                .fold(*kind, FieldKind::widen);
        }

        self.inferred = true;
    }

    fn decode(&self, record: &csv::StringRecord) -> Row {
        let mut row = Row::with_capacity(self.selected.len());
        for ((index, name), kind) in self.selected.iter().zip(&self.kinds) {
            let field = record.get(*index).unwrap_or_default();
            row.set(name.as_str(), column_cell(field, *kind));
        }

        row
    }
}

pin_project! {
    /// Flattens chunks received from the reader task into single rows.
    #[must_use = "streams do nothing unless polled"]
    struct ChunkedRowStream {
        rx: mpsc::Receiver<DataKitResult<Vec<Row>>>,
        pending: std::vec::IntoIter<Row>,
    }
}

impl Stream for ChunkedRowStream {
    type Item = Result<Row, DataKitError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        loop {
            if let Some(row) = this.pending.next() {
                return Poll::Ready(Some(Ok(row)));
            }

            match this.rx.poll_recv(cx) {
                Poll::Ready(Some(Ok(chunk))) => *this.pending = chunk.into_iter(),
                Poll::Ready(Some(Err(err))) => return Poll::Ready(Some(Err(err))),
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
