#![cfg(not(tarpaulin_include))]

use faultsheet::app::{self, AppState};
use faultsheet::config::Config;
use faultsheet::sink::{MemoryValues, SpreadsheetSink};
use faultsheet::source::SheetSource;
use std::env;
use std::sync::Arc;

/// Entry point for the upload and records server
///
/// Settings come from the environment (see [`Config::from_env`]). With
/// `--dry-run` uploads are parsed and counted but kept in memory instead of
/// being appended to the spreadsheet.
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    let dry_run = env::args().skip(1).any(|arg| arg == "--dry-run");

    if dry_run {
        log::info!("Dry run: uploads will not reach the spreadsheet");
        let state = AppState {
            sink: SpreadsheetSink::new(config.destinations.clone(), Arc::new(MemoryValues::new())),
            source: SheetSource::new(&config),
        };
        return app::serve(config, state).await;
    }

    app::run(config).await
}
