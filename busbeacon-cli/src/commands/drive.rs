//! Drive command - share this device's position.
//!
//! Enters a producer role and reads operator commands from stdin. Leaving
//! (quit, end of input or Ctrl+C) stops sharing and resets the record.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use busbeacon::producer::{PositionBackend, PositionProvider, ProducerStatus, SharingState};
use busbeacon::session::{Role, SessionConfig, SessionController, SessionError};
use busbeacon::store::StoreBackend;
use busbeacon::time::system_clock;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use super::common::{GlobalOptions, ProducerRole};
use crate::error::CliError;
use crate::runner::CliRunner;

type DriveSession = SessionController<StoreBackend, PositionBackend>;

/// Arguments for the drive command.
pub struct DriveArgs {
    pub role: ProducerRole,
    pub replay: Option<PathBuf>,
    pub no_autostart: bool,
}

/// Operator command typed at the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriveCommand {
    Start,
    Stop,
    Incident(bool),
    Seats(bool),
    Status,
    Retry,
    Help,
    Quit,
}

/// Run the drive command.
pub fn run(options: &GlobalOptions, args: DriveArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(options)?;
    runner.log_startup("drive");
    let store = runner.create_store()?;
    let provider = runner.create_provider(args.replay)?;
    let session_config = runner.config().session_config();

    println!("busbeacon drive v{}", busbeacon::VERSION);
    println!("==================");
    println!();
    println!("Role:     {}", Role::from(args.role));
    println!("Source:   {}", provider.name());
    println!("Record:   {}", session_config.path);
    println!();

    runner.block_on(drive(
        store,
        provider,
        session_config,
        args.role.into(),
        !args.no_autostart,
    ))
}

async fn drive(
    store: Arc<StoreBackend>,
    provider: Arc<PositionBackend>,
    config: SessionConfig,
    role: Role,
    autostart: bool,
) -> Result<(), CliError> {
    let mut session = SessionController::new(store, provider, config, system_clock());

    if let Err(e) = session.initialize().await {
        print_session_error(&e);
    }
    enter_role(&mut session, role, autostart).await;
    print_help();

    let mut input = spawn_stdin_reader();
    let mut status_rx = session.producer().map(|p| p.subscribe());
    let mut last_status = session.producer().map(|p| p.status());

    loop {
        tokio::select! {
            biased;

            _ = tokio::signal::ctrl_c() => {
                println!();
                info!("Interrupted, leaving producer role");
                break;
            }

            line = input.recv() => {
                let Some(line) = line else {
                    break;
                };
                match parse_command(&line) {
                    Ok(Some(DriveCommand::Quit)) => break,
                    Ok(Some(command)) => execute(&mut session, command, autostart).await,
                    Ok(None) => {}
                    Err(message) => println!("{}", message),
                }
                status_rx = session.producer().map(|p| p.subscribe());
            }

            status = next_status(&mut status_rx) => {
                for line in describe_change(last_status.as_ref(), &status) {
                    println!("{}", line);
                }
                last_status = Some(status);
            }
        }
    }

    println!("Stopping and resetting the shared record...");
    match session.reset_role().await {
        Ok(()) => println!("Done."),
        Err(e) => {
            warn!(error = %e, "Reset on exit failed");
            return Err(e.into());
        }
    }
    Ok(())
}

async fn enter_role(session: &mut DriveSession, role: Role, autostart: bool) {
    match session.select_role(role).await {
        Ok(()) => {
            println!("Role {} ready.", role);
            if autostart {
                start_sharing(session);
            } else {
                println!("Type 'start' to begin sharing.");
            }
        }
        Err(e) => print_session_error(&e),
    }
}

async fn execute(session: &mut DriveSession, command: DriveCommand, autostart: bool) {
    if command == DriveCommand::Help {
        print_help();
        return;
    }
    if command == DriveCommand::Retry {
        let role = session.requested_role();
        enter_role(session, role, autostart).await;
        return;
    }

    let Some(producer) = session.producer() else {
        println!("Not connected. Type 'retry' to try again.");
        return;
    };

    match command {
        DriveCommand::Start => start_sharing(session),
        DriveCommand::Stop => match producer.stop().await {
            Ok(()) => println!("Sharing stopped. Last position stays visible to staff."),
            Err(e) => println!("Sharing stopped locally, but the update failed: {}", e),
        },
        DriveCommand::Incident(reported) => {
            producer.report_incident(reported);
            if reported {
                println!("Reported: accident or traffic jam.");
            } else {
                println!("Reported: trip normal.");
            }
        }
        DriveCommand::Seats(available) => {
            producer.report_seat_availability(available);
            if available {
                println!("Reported: seats available.");
            } else {
                println!("Reported: bus full.");
            }
        }
        DriveCommand::Status => {
            for line in status_lines(&producer.status()) {
                println!("{}", line);
            }
        }
        DriveCommand::Help | DriveCommand::Retry | DriveCommand::Quit => {}
    }
}

fn start_sharing(session: &DriveSession) {
    let Some(producer) = session.producer() else {
        return;
    };
    match producer.start() {
        Ok(()) => println!("Sharing started, waiting for a position fix..."),
        Err(e) => {
            println!("Could not start location: {}", e);
            println!("  {}", e.remediation());
        }
    }
}

fn print_session_error(error: &SessionError) {
    println!("{}", error);
    println!("Check your connection and type 'retry'.");
}

fn print_help() {
    println!();
    println!("Commands:");
    println!("  start               Start sharing position");
    println!("  stop                Stop sharing position");
    println!("  incident on|off     Report an accident/traffic jam, or that the trip is normal");
    println!("  seats yes|no        Report whether seats are available");
    println!("  status              Show the current sharing status");
    println!("  retry               Reconnect after an initialization error");
    println!("  quit                Stop sharing, reset the record and exit");
    println!();
}

/// Forward stdin lines from a dedicated thread.
///
/// Blocking reads on a runtime thread would keep the runtime from shutting
/// down, so input gets its own OS thread that dies with the process.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn next_status(rx: &mut Option<watch::Receiver<ProducerStatus>>) -> ProducerStatus {
    match rx {
        Some(rx) => match rx.changed().await {
            Ok(()) => rx.borrow_and_update().clone(),
            Err(_) => std::future::pending().await,
        },
        None => std::future::pending().await,
    }
}

fn parse_command(line: &str) -> Result<Option<DriveCommand>, String> {
    let line = line.trim().to_lowercase();
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let argument = words.next();

    let command = match (verb, argument) {
        ("start", None) => DriveCommand::Start,
        ("stop", None) => DriveCommand::Stop,
        ("status", None) => DriveCommand::Status,
        ("retry", None) => DriveCommand::Retry,
        ("help" | "?", None) => DriveCommand::Help,
        ("quit" | "exit", None) => DriveCommand::Quit,
        ("incident", Some(value)) => DriveCommand::Incident(
            parse_flag(value).ok_or_else(|| "Usage: incident on|off".to_string())?,
        ),
        ("seats", Some(value)) => DriveCommand::Seats(
            parse_flag(value).ok_or_else(|| "Usage: seats yes|no".to_string())?,
        ),
        ("incident", None) => return Err("Usage: incident on|off".to_string()),
        ("seats", None) => return Err("Usage: seats yes|no".to_string()),
        _ => return Err(format!("Unknown command '{}'. Type 'help'.", line)),
    };
    Ok(Some(command))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value {
        "on" | "yes" | "true" | "available" => Some(true),
        "off" | "no" | "false" | "full" => Some(false),
        _ => None,
    }
}

/// Lines worth printing when the producer status changes.
///
/// Location updates alone are silent; state and error transitions are not.
fn describe_change(previous: Option<&ProducerStatus>, current: &ProducerStatus) -> Vec<String> {
    let mut lines = Vec::new();

    if previous.map(|p| p.state) != Some(current.state) {
        match (current.state, &current.location) {
            (SharingState::Sharing, Some(location)) => lines.push(format!(
                "Sharing: first fix at {:.5}, {:.5}",
                location.latitude, location.longitude
            )),
            (state, _) => lines.push(format!("State: {}", state)),
        }
    }

    let previous_geo = previous.and_then(|p| p.geolocation_error.as_ref());
    if previous_geo != current.geolocation_error.as_ref() {
        match &current.geolocation_error {
            Some(e) => {
                lines.push(format!("Location problem: {}", e));
                lines.push(format!("  {}", e.remediation()));
            }
            None => lines.push("Location problem cleared.".to_string()),
        }
    }

    let previous_store = previous.and_then(|p| p.store_error.as_ref());
    if previous_store != current.store_error.as_ref() {
        match &current.store_error {
            Some(e) => lines.push(format!("Update not saved: {}", e)),
            None => lines.push("Updates are being saved again.".to_string()),
        }
    }

    lines
}

fn status_lines(status: &ProducerStatus) -> Vec<String> {
    let mut lines = vec![format!("State: {}", status.state)];

    match &status.location {
        Some(location) => {
            let accuracy = location
                .accuracy
                .map(|a| format!(" (±{:.0} m)", a))
                .unwrap_or_default();
            lines.push(format!(
                "Last position: {:.5}, {:.5}{}",
                location.latitude, location.longitude, accuracy
            ));
        }
        None => lines.push("Last position: none yet".to_string()),
    }

    let trip = &status.additional_status;
    lines.push(format!(
        "Incident: {}",
        match trip.incident_reported {
            Some(true) => "reported",
            Some(false) => "normal",
            None => "not reported",
        }
    ));
    lines.push(format!(
        "Seats: {}",
        match trip.seats_available {
            Some(true) => "available",
            Some(false) => "full",
            None => "not reported",
        }
    ));

    if let Some(e) = &status.geolocation_error {
        lines.push(format!("Location problem: {}", e));
    }
    if let Some(e) = &status.store_error {
        lines.push(format!("Update not saved: {}", e));
    }
    lines.push(format!(
        "Samples shared: {}, failed writes: {}",
        status.samples_accepted, status.writes_failed
    ));

    lines
}
