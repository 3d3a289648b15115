use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;

use crate::error::DataKitResult;
use crate::source::{RowSource, RowStream};
use crate::types::Row;

/// Rows held in memory, replayed from the start on every pass.
#[derive(Debug, Clone)]
pub struct MemoryRowSource {
    name: String,
    rows: Arc<Vec<Row>>,
}

impl MemoryRowSource {
    pub fn new(name: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            rows: Arc::new(rows),
        }
    }
}

#[async_trait]
impl RowSource for MemoryRowSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn rows(&self) -> DataKitResult<RowStream> {
        let rows = Arc::clone(&self.rows);
        let iter = (0..rows.len()).map(move |index| Ok(rows[index].clone()));

        Ok(Box::pin(stream::iter(iter)))
    }
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;

    use super::*;
    use crate::types::Cell;

    #[tokio::test]
    async fn every_pass_starts_from_the_first_row() {
        let source = MemoryRowSource::new(
            "users",
            vec![
                [("id", Cell::I64(1))].into_iter().collect(),
                [("id", Cell::I64(2))].into_iter().collect(),
            ],
        );

        let first: Vec<Row> = source.rows().await.unwrap().try_collect().await.unwrap();
        let second: Vec<Row> = source.rows().await.unwrap().try_collect().await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }
}
