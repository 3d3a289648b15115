//! Feature assembler binary.
//!
//! Loads the assembly configuration, builds every cache, streams the event source through the
//! configured bindings and writes the resulting wide table as delimited text.

use std::process::ExitCode;

use ::config::shared::AssemblerConfig;
use telemetry::tracing::init_tracing;
use tracing::error;

use crate::config::load_assembler_config;
use crate::core::run_assembler;
use crate::error::{AssemblerError, AssemblerResult};

mod config;
mod core;
mod error;

fn main() -> ExitCode {
    match try_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprint!("{}", err.render_report());
            ExitCode::FAILURE
        }
    }
}

fn try_main() -> AssemblerResult<()> {
    let assembler_config = load_assembler_config()?;

    let _app_span = init_tracing(env!("CARGO_BIN_NAME")).map_err(AssemblerError::config)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(assembler_config))
}

async fn async_main(assembler_config: AssemblerConfig) -> AssemblerResult<()> {
    if let Err(err) = run_assembler(assembler_config).await {
        error!("{err}");
        return Err(err);
    }

    Ok(())
}
