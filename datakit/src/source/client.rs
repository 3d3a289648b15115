use std::io::BufReader;

use config::shared::{IntoConnectOptions, PgConnectionConfig};
use rustls::ClientConfig;
use tokio_postgres::tls::MakeTlsConnect;
use tokio_postgres::{Client, Config, Connection, NoTls, Socket};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{Instrument, debug, error};

use crate::error::DataKitResult;

/// Spawns a task driving a Postgres connection until it terminates.
fn spawn_postgres_connection<T>(connection: Connection<Socket, T::Stream>)
where
    T: MakeTlsConnect<Socket>,
    T::Stream: Send + 'static,
{
    let span = tracing::Span::current();
    let task = async move {
        match connection.await {
            Err(err) => error!("an error occurred during the postgres connection: {}", err),
            Ok(()) => debug!("postgres connection terminated"),
        }
    }
    .instrument(span);

    // The connection ends once its `Client` is dropped, so the handle is not kept.
    tokio::spawn(task);
}

/// Opens a Postgres connection, using TLS when the configuration enables it.
pub async fn connect(config: &PgConnectionConfig) -> DataKitResult<Client> {
    if config.tls.enabled {
        connect_tls(config).await
    } else {
        connect_no_tls(config).await
    }
}

async fn connect_no_tls(pg_connection_config: &PgConnectionConfig) -> DataKitResult<Client> {
    let config: Config = pg_connection_config.with_db();
    let (client, connection) = config.connect(NoTls).await?;
    spawn_postgres_connection::<NoTls>(connection);

    debug!(
        host = pg_connection_config.host,
        dbname = pg_connection_config.name,
        "connected to postgres without tls"
    );

    Ok(client)
}

async fn connect_tls(pg_connection_config: &PgConnectionConfig) -> DataKitResult<Client> {
    let config: Config = pg_connection_config.with_db();

    let mut root_store = rustls::RootCertStore::empty();
    let mut root_certs_reader =
        BufReader::new(pg_connection_config.tls.trusted_root_certs.as_bytes());
    for cert in rustls_pemfile::certs(&mut root_certs_reader) {
        root_store.add(cert?)?;
    }

    let tls_config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    let (client, connection) = config.connect(MakeRustlsConnect::new(tls_config)).await?;
    spawn_postgres_connection::<MakeRustlsConnect>(connection);

    debug!(
        host = pg_connection_config.host,
        dbname = pg_connection_config.name,
        "connected to postgres with tls"
    );

    Ok(client)
}
