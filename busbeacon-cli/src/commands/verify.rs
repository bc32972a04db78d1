//! Verify command - check that the configured database answers.

use busbeacon::store::{RecordStore, StoreBackend};

use super::common::GlobalOptions;
use crate::error::CliError;
use crate::runner::CliRunner;

/// Run the verify command.
pub fn run(options: &GlobalOptions) -> Result<(), CliError> {
    let runner = CliRunner::new(options)?;
    runner.log_startup("verify");
    let store = runner.create_store()?;
    let path = runner.config().store.path.clone();

    match store.as_ref() {
        StoreBackend::Rest(rest) => println!("Database: {}", rest.base_url()),
        StoreBackend::Memory(_) => println!("Database: in-memory (this process only)"),
    }

    let check = runner.block_on(store.verify_connection());
    println!("Connection: {}", check);
    if !check.is_reachable() {
        return Err(CliError::Unreachable(check));
    }

    match runner.block_on(store.read(&path)) {
        Ok(Some(record)) => {
            println!("Record '{}': present (sharing: {})", path, record.is_sharing);
        }
        Ok(None) => println!("Record '{}': not written yet", path),
        Err(e) => println!("Record '{}': not readable ({})", path, e),
    }

    Ok(())
}
