//! Watch command - follow the live bus position.
//!
//! Prints the derived view whenever it changes. The view is also re-derived
//! every second so the "N seconds ago" text stays current.

use std::sync::Arc;
use std::time::Duration;

use busbeacon::consumer::{ConsumerSnapshot, ConsumerView};
use busbeacon::producer::ChannelProvider;
use busbeacon::session::{Role, SessionConfig, SessionController};
use busbeacon::store::{RecordStore, StoreBackend};
use busbeacon::time::{system_clock, Clock, SystemClock};
use tokio::time::MissedTickBehavior;
use tracing::info;

use super::common::{resolve_feed_mode, GlobalOptions, WatchMode};
use crate::error::CliError;
use crate::runner::CliRunner;

const REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Arguments for the watch command.
pub struct WatchArgs {
    pub mode: Option<WatchMode>,
    pub interval_ms: Option<u64>,
    pub once: bool,
}

/// Run the watch command.
pub fn run(options: &GlobalOptions, args: WatchArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(options)?;
    runner.log_startup("watch");
    let store = runner.create_store()?;
    let path = runner.config().store.path.clone();

    if args.once {
        return runner.block_on(print_once(store, &path));
    }

    let config = SessionConfig {
        path,
        feed_mode: resolve_feed_mode(args.mode, args.interval_ms, &runner.config().consumer),
    };
    runner.block_on(follow(store, config))
}

async fn print_once(store: Arc<StoreBackend>, path: &str) -> Result<(), CliError> {
    let record = store.read(path).await?;
    let snapshot = ConsumerSnapshot {
        record,
        connection_error: None,
        received_any: true,
        updates: 1,
    };
    for line in ConsumerView::new(&snapshot, SystemClock.now_millis()).render_lines() {
        println!("{}", line);
    }
    Ok(())
}

async fn follow(store: Arc<StoreBackend>, config: SessionConfig) -> Result<(), CliError> {
    let mut session =
        SessionController::new(store, Arc::new(ChannelProvider::new()), config, system_clock());
    session.select_role(Role::Employee).await?;

    let Some(sync) = session.consumer() else {
        return Ok(());
    };
    println!(
        "Following '{}' ({}). Press Ctrl+C to exit.",
        session.path(),
        sync.mode()
    );
    println!();

    let mut updates = sync.subscribe();
    let mut refresh = tokio::time::interval(REFRESH_INTERVAL);
    refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_lines: Vec<String> = Vec::new();

    loop {
        tokio::select! {
            biased;

            _ = tokio::signal::ctrl_c() => break,

            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }

            _ = refresh.tick() => {}
        }

        let lines = sync.view(SystemClock.now_millis()).render_lines();
        if lines != last_lines {
            println!("--- {} ---", chrono::Local::now().format("%H:%M:%S"));
            for line in &lines {
                println!("{}", line);
            }
            println!();
            last_lines = lines;
        }
    }

    info!("Watch finished");
    session.shutdown().await;
    Ok(())
}
