//! Reset command - write the baseline record.

use busbeacon::record::BusRecord;
use busbeacon::store::RecordStore;
use tracing::info;

use super::common::GlobalOptions;
use crate::error::CliError;
use crate::runner::CliRunner;

/// Run the reset command.
pub fn run(options: &GlobalOptions) -> Result<(), CliError> {
    let runner = CliRunner::new(options)?;
    runner.log_startup("reset");
    let store = runner.create_store()?;
    let path = runner.config().store.path.clone();

    runner.block_on(store.replace(&path, &BusRecord::baseline()))?;

    info!(path = %path, "Shared record reset to baseline");
    println!("Shared record '{}' reset: not sharing, no position, no status.", path);
    Ok(())
}
