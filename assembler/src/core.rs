use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use config::shared::{AssemblerConfig, AssemblyConfig, OutputConfig, SourceConfig};
use datakit::pipeline::AssemblyPipeline;
use datakit::types::ColumnTable;
use tracing::{debug, info};

use crate::error::{AssemblerError, AssemblerResult};

/// Builds the caches, assembles the events and writes the table to the configured output.
pub async fn run_assembler(assembler_config: AssemblerConfig) -> AssemblerResult<()> {
    info!("starting assembler");

    log_config(&assembler_config);

    let mut pipeline = AssemblyPipeline::from_config(&assembler_config.assembly)?;
    let table = pipeline.run().await?;

    let delimiter = assembler_config
        .output
        .delimiter_byte()
        .map_err(AssemblerError::config)?;
    let path = assembler_config.output.path;
    let rows = table.num_rows();
    let columns = table.num_columns();

    write_table(table, path.clone(), delimiter).await?;

    info!(
        path = %path.display(),
        rows,
        columns,
        "assembled table written"
    );

    Ok(())
}

async fn write_table(table: ColumnTable, path: PathBuf, delimiter: u8) -> AssemblerResult<()> {
    tokio::task::spawn_blocking(move || -> AssemblerResult<()> {
        let file = File::create(&path)?;
        table.write_csv(BufWriter::new(file), delimiter)?;
        Ok(())
    })
    .await
    .map_err(|err| AssemblerError::from(std::io::Error::from(err)))?
}

fn log_config(config: &AssemblerConfig) {
    log_assembly_config(&config.assembly);
    log_output_config(&config.output);
}

fn log_assembly_config(config: &AssemblyConfig) {
    for cache in &config.caches {
        debug!(
            cache = cache.name,
            key = ?cache.key.columns(),
            suffix = cache.suffix.as_deref(),
            shares = cache.share_with.as_deref(),
            "using cache config"
        );
    }

    debug!(
        bindings = config.bindings.len(),
        collision_policy = ?config.collision_policy,
        workers = config.workers,
        "using assembly config"
    );

    log_source_config("events", &config.events);
}

fn log_source_config(name: &str, config: &SourceConfig) {
    match config {
        SourceConfig::Postgres(postgres) => {
            debug!(
                source = name,
                host = postgres.connection.host,
                port = postgres.connection.port,
                dbname = postgres.connection.name,
                username = postgres.connection.username,
                tls_enabled = postgres.connection.tls.enabled,
                "using postgres source config"
            )
        }
        SourceConfig::File(file) => {
            debug!(
                source = name,
                path = %file.path.display(),
                chunk_size = file.chunk_size,
                delimiter = file.delimiter,
                "using file source config"
            )
        }
    }
}

fn log_output_config(config: &OutputConfig) {
    debug!(
        path = %config.path.display(),
        delimiter = config.delimiter,
        "using output config"
    );
}
