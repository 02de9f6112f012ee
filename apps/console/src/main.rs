use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console_core::{
    AuditLog, ConsoleSession, DeviceClient, FakeDeviceClient, HttpDeviceClient, LocalIdentity,
    NotificationSink,
};
use futures::StreamExt;
use shared::{
    domain::{SensorSnapshot, Severity},
    protocol::AuditRecord,
};
use storage::{LogQuery, Storage};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    task::JoinSet,
};
use tokio_stream::wrappers::WatchStream;
use tracing::{error, info, warn};

mod config;
mod repl;
mod terminal;

use config::{load_settings, prepare_database_url, Backend, Settings};
use repl::{execute, parse_line, spawn_toggle, Flow, ReplCommand};
use terminal::TerminalSink;

#[derive(Parser, Debug)]
#[command(about = "Operator console for the processing machine")]
struct Cli {
    /// Settings file; defaults to ./console.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides the configured audit database.
    #[arg(long)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start an interactive operator session.
    Run {
        /// Overrides the configured backend (http or fake).
        #[arg(long)]
        backend: Option<Backend>,
    },
    /// List recorded processing cycles, newest first.
    History {
        #[arg(long, default_value_t = 20)]
        limit: u32,
        #[arg(long)]
        operator: Option<String>,
        /// Print records as JSON lines.
        #[arg(long)]
        json: bool,
    },
    /// List device command events.
    Logs {
        /// ALL, INFO, WARNING or ERROR.
        #[arg(long, default_value = "ALL", value_parser = parse_severity_filter)]
        severity: SeverityFilter,
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
}

#[derive(Debug, Clone, Copy)]
struct SeverityFilter(Option<Severity>);

fn parse_severity_filter(raw: &str) -> Result<SeverityFilter, String> {
    if raw.trim().eq_ignore_ascii_case("all") {
        return Ok(SeverityFilter(None));
    }
    raw.parse::<Severity>()
        .map(|severity| SeverityFilter(Some(severity)))
        .map_err(|err| err.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(database_url) = cli.database_url {
        settings.database_url = database_url;
    }

    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    match cli.command {
        Command::Run { backend } => {
            if let Some(backend) = backend {
                settings.backend = backend;
            }
            run_session(&settings, storage).await
        }
        Command::History {
            limit,
            operator,
            json,
        } => print_history(&storage, limit, operator, json).await,
        Command::Logs { severity, limit } => print_logs(&storage, severity, limit).await,
    }
}

async fn run_session(settings: &Settings, storage: Storage) -> Result<()> {
    let client: Arc<dyn DeviceClient> = match settings.backend {
        Backend::Http => Arc::new(
            HttpDeviceClient::new(settings.request_timeout())
                .context("failed to build HTTP client")?,
        ),
        Backend::Fake => Arc::new(FakeDeviceClient::new()),
    };
    let identity = Arc::new(LocalIdentity::new(settings.operators.clone()));
    let audit: Arc<dyn AuditLog> = Arc::new(storage);
    let sink: Arc<dyn NotificationSink> = Arc::new(TerminalSink::stderr());

    let session = ConsoleSession::start(
        settings.session_options()?,
        client,
        audit,
        identity.clone(),
        sink,
    );
    info!(backend = ?settings.backend, "session ready");
    let monitor = tokio::spawn(watch_temperature(session.poller().subscribe()));

    println!("{}", repl::HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut in_flight = JoinSet::new();
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(done) = in_flight.join_next() => {
                match done {
                    Ok(output) => println!("{output}"),
                    Err(error) => warn!(%error, "toggle task ended abnormally"),
                }
                continue;
            }
            line = lines.next_line() => line.context("failed to read stdin")?,
        };
        let Some(line) = line else {
            break;
        };

        let command = match parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };
        let flow = match command {
            ReplCommand::Toggle(actuator) => {
                spawn_toggle(&mut in_flight, session.actuators(), actuator);
                continue;
            }
            command => execute(command, &session, &identity).await,
        };
        match flow {
            Flow::Continue(output) => println!("{output}"),
            Flow::Quit => break,
        }
    }

    session.shutdown().await;
    in_flight.shutdown().await;
    monitor.abort();
    Ok(())
}

/// Logs crossings of the high-temperature threshold as they are published.
async fn watch_temperature(readings: tokio::sync::watch::Receiver<SensorSnapshot>) {
    let mut readings = WatchStream::new(readings);
    let mut high = false;
    while let Some(snapshot) = readings.next().await {
        let now_high = snapshot.is_high_temperature();
        if now_high && !high {
            warn!(temperature = ?snapshot.temperature, "temperature above safe limit");
        } else if high && !now_high {
            info!(temperature = ?snapshot.temperature, "temperature back under limit");
        }
        high = now_high;
    }
}

async fn print_history(
    storage: &Storage,
    limit: u32,
    operator: Option<String>,
    json: bool,
) -> Result<()> {
    let totals = storage.processing_totals(operator.as_deref()).await?;
    let logs = storage
        .list_processing_logs(&LogQuery {
            limit: Some(limit),
            operator_email: operator,
        })
        .await?;

    for event in &logs {
        if json {
            let record = serde_json::to_string(&AuditRecord::from(event))
                .context("failed to encode audit record")?;
            println!("{record}");
        } else {
            println!(
                "{}  {:>3}  {}",
                event.timestamp.to_rfc3339(),
                event.amount,
                event.operator_email
            );
        }
    }
    if !json {
        println!(
            "{} cycle(s), {} unit(s) processed in total",
            totals.cycles, totals.amount
        );
    }
    Ok(())
}

async fn print_logs(storage: &Storage, severity: SeverityFilter, limit: u32) -> Result<()> {
    let events = storage.list_device_events(severity.0, Some(limit)).await?;
    if events.is_empty() {
        println!("no device events");
    }
    for event in events {
        println!(
            "{}  {:<7}  {:<9}  {:<7}  {}  ({})",
            event.timestamp.to_rfc3339(),
            event.severity.as_str(),
            event.outcome.as_str(),
            event.actuator.label(),
            event.message,
            event.operator_email
        );
    }
    Ok(())
}
