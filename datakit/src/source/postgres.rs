use std::pin::Pin;
use std::task::{Context, Poll};

use ::postgres::query::make_cache_query;
use async_trait::async_trait;
use config::shared::{PgConnectionConfig, PostgresSourceConfig, QueryConfig};
use futures::{Stream, ready};
use pin_project_lite::pin_project;
use tokio_postgres::Client;
use tracing::debug;

use crate::conversions::pg::pg_row_to_row;
use crate::error::{DataKitError, DataKitResult};
use crate::source::client::connect;
use crate::source::{RowSource, RowStream};
use crate::types::{Cell, Row};

/// Rows returned by a parameterized query.
///
/// Every pass opens its own connection and closes it when the returned stream is dropped.
#[derive(Debug, Clone)]
pub struct PgRowSource {
    name: String,
    connection: PgConnectionConfig,
    query: String,
    params: Vec<Cell>,
}

impl PgRowSource {
    pub fn new(
        name: impl Into<String>,
        connection: PgConnectionConfig,
        query: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            connection,
            query: query.into(),
            params: Vec::new(),
        }
    }

    /// Binds positional parameters (`$1`, `$2`, ...) of the query.
    pub fn with_params(mut self, params: Vec<Cell>) -> Self {
        self.params = params;
        self
    }

    /// Builds a source from configuration, generating the query for table descriptions.
    pub fn from_config(name: impl Into<String>, config: &PostgresSourceConfig) -> Self {
        let query = match &config.query {
            QueryConfig::Sql(sql) => sql.clone(),
            QueryConfig::Table(table) => make_cache_query(table),
        };

        Self::new(name, config.connection.clone(), query)
    }

    pub fn query(&self) -> &str {
        &self.query
    }
}

#[async_trait]
impl RowSource for PgRowSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn rows(&self) -> DataKitResult<RowStream> {
        let client = connect(&self.connection).await?;
        let statement = client.prepare(&self.query).await?;
        let rows = client.query_raw(&statement, self.params.iter()).await?;

        debug!(source = self.name, "started postgres query stream");

        Ok(Box::pin(PgRowStream { rows, client }))
    }
}

pin_project! {
    /// Decodes query rows while keeping the connection open.
    ///
    /// Dropping the stream drops the [`Client`], which terminates the connection.
    #[must_use = "streams do nothing unless polled"]
    pub struct PgRowStream {
        #[pin]
        rows: tokio_postgres::RowStream,
        client: Client,
    }
}

impl Stream for PgRowStream {
    type Item = DataKitResult<Row>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        match ready!(this.rows.poll_next(cx)) {
            Some(Ok(row)) => Poll::Ready(Some(pg_row_to_row(&row))),
            Some(Err(err)) => Poll::Ready(Some(Err(DataKitError::from(err)))),
            None => Poll::Ready(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use config::shared::{TableQueryConfig, TlsConfig};

    use super::*;

    fn connection() -> PgConnectionConfig {
        PgConnectionConfig {
            host: "localhost".to_string(),
            port: 5432,
            name: "features".to_string(),
            username: "postgres".to_string(),
            password: None,
            tls: TlsConfig::default(),
        }
    }

    #[test]
    fn table_queries_are_generated() {
        let config = PostgresSourceConfig {
            connection: connection(),
            query: QueryConfig::Table(TableQueryConfig {
                name: "movies".to_string(),
                columns: vec!["id".to_string(), "genre".to_string()],
                filter: Some("genre is not null".to_string()),
                group_by: vec![],
            }),
        };

        let source = PgRowSource::from_config("movies", &config);

        assert_eq!(source.name(), "movies");
        assert_eq!(
            source.query(),
            "select id, genre from movies where genre is not null"
        );
    }

    #[test]
    fn raw_sql_is_kept() {
        let config = PostgresSourceConfig {
            connection: connection(),
            query: QueryConfig::Sql("select 1 as one".to_string()),
        };

        assert_eq!(
            PgRowSource::from_config("one", &config).query(),
            "select 1 as one"
        );
    }
}
