use clap::Parser;
use party_core::party_http::{HttpPartyService, PartyService};
use party_core::{MemoryChatRoom, MemoryPartyService, PartyEvent, PartySession, SessionConfig};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "partyd")]
#[command(about = "Party state sync daemon")]
struct Cli {
    /// Session config file.
    #[arg(short, long, default_value = "party.json")]
    config: PathBuf,
    /// Run against an in-memory party service.
    #[arg(long)]
    offline: bool,
    /// Join this party once the session is up.
    #[arg(long)]
    join: Option<String>,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "partyd=debug,party_core=debug,info".into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Read notification JSON, one object per line, from stdin.
fn spawn_stdin_reader(tx: mpsc::Sender<Value>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match serde_json::from_str::<Value>(&line) {
                    Ok(value) => {
                        if tx.send(value).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("[partyd] skipping malformed notification: {}", e),
                },
                Ok(None) => break,
                Err(e) => {
                    warn!("[partyd] stdin closed: {}", e);
                    break;
                }
            }
        }
    });
}

fn spawn_event_logger(mut events: broadcast::Receiver<PartyEvent>) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => info!("[partyd] {}: {:?}", event.name(), event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("[partyd] event log skipped {} events", n)
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = SessionConfig::load(&cli.config).await?;
    info!("=== partyd [user: {}] ===", config.user_id);

    let chat = Arc::new(MemoryChatRoom::new(config.user_id.clone()));
    let (tx, rx) = mpsc::channel(256);
    let service: Arc<dyn PartyService> = if cli.offline {
        info!("Mode: offline, in-memory party service");
        let memory = Arc::new(MemoryPartyService::new());
        let mut notifications = memory.notifications();
        let forward = tx.clone();
        tokio::spawn(async move {
            while let Some(n) = notifications.recv().await {
                if forward.send(n).await.is_err() {
                    break;
                }
            }
        });
        memory
    } else {
        info!("Mode: online, {}", config.service.base_url);
        Arc::new(HttpPartyService::new(config.service.clone())?)
    };
    spawn_stdin_reader(tx);

    let session = PartySession::new(config, service, chat);
    spawn_event_logger(session.subscribe());
    let _reconciler = session.reconciler().spawn(rx);

    let party = session.initialize().await?;
    info!("[partyd] in party {}", party.id());
    if let Some(party_id) = cli.join.as_deref() {
        let party = session.join_party(party_id).await?;
        info!("[partyd] joined party {}", party.id());
    }

    tokio::signal::ctrl_c().await?;
    info!("[partyd] shutting down");
    session.shutdown().await?;
    Ok(())
}
