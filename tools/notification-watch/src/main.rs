//! notification-watch: follow a member's notifications from the terminal.
//!
//! Opens the push channel for one member, prints arrivals and command notices
//! as they happen, and reads commands from stdin.
//!
//! ## Usage
//!
//! ```bash
//! # SSE against a local backend
//! notification-watch --member 42
//!
//! # WebSocket with a bearer token
//! notification-watch --member 42 --transport websocket \
//!     --stream-url 'wss://api.example.com/member/{member}/notifications' \
//!     --token "$TOKEN"
//! ```

mod command;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{info, warn};

use notification_sync::{
    Notification, NotificationApi, NotificationSession, RecipientId, SessionEvent, SessionId,
    SyncConfig, TransportKind,
};
use notification_telemetry::{encode_metrics, init_telemetry, TelemetryConfig};

use command::{Command, HELP};

/// Follow a member's notifications
#[derive(Parser, Debug)]
#[command(name = "notification-watch")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Member whose notifications to follow
    #[arg(long)]
    member: u64,

    /// REST base URL (overrides NOTIFY_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Push channel URL template containing {member} (overrides NOTIFY_STREAM_URL)
    #[arg(long)]
    stream_url: Option<String>,

    /// Push transport: sse or websocket (overrides NOTIFY_TRANSPORT)
    #[arg(long)]
    transport: Option<TransportKind>,

    /// Bearer token (overrides NOTIFY_AUTH_TOKEN)
    #[arg(long)]
    token: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    fn sync_config(&self) -> SyncConfig {
        let mut config = SyncConfig::from_env();
        if let Some(url) = &self.api_url {
            config.api_base_url = url.clone();
        }
        if let Some(url) = &self.stream_url {
            config.stream_url = url.clone();
        }
        if let Some(kind) = self.transport {
            config.transport = kind;
        }
        if let Some(token) = &self.token {
            config.auth_token = Some(token.clone());
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut telemetry = TelemetryConfig::from_env().with_service_name("notification-watch");
    telemetry.json_logs |= args.json_logs;
    let _telemetry = init_telemetry(telemetry).context("failed to initialize telemetry")?;

    let config = args.sync_config();
    let session_id = SessionId::new(RecipientId(args.member));
    let session = Arc::new(
        NotificationSession::from_config(&config, session_id, Vec::new())
            .context("failed to start notification session")?,
    );
    info!(
        member = args.member,
        transport = %config.transport,
        "Watching notifications (type `help` for commands)"
    );

    let printer = tokio::spawn(print_events(session.subscribe()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match Command::parse(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(command)) => run(&session, command).await,
                    Ok(None) => {}
                    Err(e) => println!("{e}"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    session.shutdown();
    printer.abort();
    Ok(())
}

async fn run(session: &NotificationSession, command: Command) {
    match command {
        Command::List => {
            let items = session.notifications();
            if items.is_empty() {
                println!("(no notifications)");
            }
            for item in &items {
                println!("{}", render(item));
            }
        }
        Command::Status => println!(
            "{} | {} unread of {}",
            session.connection_state(),
            session.unread_count(),
            session.notifications().len()
        ),
        // Outcomes are reported by the notice printer.
        Command::Read(id) => {
            session.mark_as_read(id).await;
        }
        Command::ReadAll => {
            session.mark_all_as_read().await;
        }
        Command::Delete(id) => {
            session.delete_notification(id).await;
        }
        Command::DeleteAll => {
            session.delete_all_notifications().await;
        }
        Command::Accept(id) => {
            session.accept_scout(id).await;
        }
        Command::Reject(id) => {
            session.reject_scout(id).await;
        }
        Command::Metrics => match encode_metrics() {
            Ok(text) => print!("{text}"),
            Err(e) => warn!(error = %e, "Failed to encode metrics"),
        },
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
}

async fn print_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::NotificationArrived(item)) => println!("+ {}", render(&item)),
            Ok(SessionEvent::Notice(notice)) => println!("{notice}"),
            Ok(SessionEvent::ConnectionChanged(state)) => println!("~ {state}"),
            Ok(SessionEvent::StoreChanged { unread_count, total }) => {
                println!("= {unread_count} unread of {total}")
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event printer lagged")
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

fn render(item: &Notification) -> String {
    format!(
        "{} #{:<6} {:<17} {}",
        if item.is_read { " " } else { "*" },
        item.id,
        item.kind.as_str(),
        item.created_at.format("%Y-%m-%d %H:%M"),
    )
}
