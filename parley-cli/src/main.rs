use anyhow::{Context, Result, bail};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use colored::*;
use parley::coordinator::{
    Coordinator, CoordinatorConfig, CoordinatorEvent, FileBoard, MemoryRelay, PollingConfig, PollingTransport,
    RtcEngineFactory, Target,
};
use parley::model::{RolePreference, RoomId};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "parley", version, about = "Peer-to-peer data channels over a shared signaling relay")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join a room through a shared board file and chat over data channels.
    Chat {
        #[arg(long, env = "PARLEY_ROOM")]
        room: String,

        /// JSON-lines file every participant can read and append to.
        #[arg(long, env = "PARLEY_BOARD", default_value = "./parley-board.jsonl")]
        board: PathBuf,

        #[arg(long, default_value = "auto")]
        role: RolePreference,

        #[arg(long, default_value_t = 250)]
        poll_ms: u64,

        /// Skip the public STUN server; enough when every peer is on this host.
        #[arg(long)]
        no_stun: bool,
    },

    /// Connect two in-process peers over an in-memory relay and send one message.
    Demo {
        #[arg(long, default_value = "demo")]
        room: String,

        #[arg(long, default_value = "hello from parley")]
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,parley_coordinator=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Commands::Chat {
            room,
            board,
            role,
            poll_ms,
            no_stun,
        } => run_chat(room, board, role, poll_ms, no_stun).await,
        Commands::Demo { room, message } => run_demo(room, message).await,
    }
}

async fn run_chat(room: String, board: PathBuf, role: RolePreference, poll_ms: u64, no_stun: bool) -> Result<()> {
    let room_id = RoomId::new(room).context("invalid room id")?;
    let mut config = CoordinatorConfig::new(room_id)
        .with_role(role)
        .with_release_when_idle(false);
    if no_stun {
        config = config.with_ice_servers(Vec::new());
    }

    let transport = PollingTransport::new(
        Arc::new(FileBoard::new(&board)),
        PollingConfig {
            interval: Duration::from_millis(poll_ms),
            ..Default::default()
        },
    );
    let coordinator = Coordinator::new(config, Arc::new(transport), Arc::new(RtcEngineFactory::new()));
    let mut events = coordinator.subscribe();

    coordinator.start().await.context("failed to start coordinator")?;
    let joined = coordinator.config();
    println!(
        "{} room {} as {} ({:?}, board {})",
        "joined".green().bold(),
        joined.room_id.as_str().bold(),
        coordinator.local_id().short().cyan(),
        joined.role,
        board.display()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line.context("failed to read stdin")? {
                Some(text) if text.trim().is_empty() => {}
                Some(text) => {
                    if let Err(e) = coordinator.send(Target::Broadcast, Bytes::from(text)).await {
                        println!("{} {e}", "!".red().bold());
                    }
                }
                None => break,
            },
            event = events.recv() => match event {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event stream lagged"),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    coordinator.stop().await;
    println!("{}", "left the room".dimmed());
    Ok(())
}

async fn run_demo(room: String, message: String) -> Result<()> {
    let relay = MemoryRelay::new();
    let config = CoordinatorConfig::new(RoomId::new(room).context("invalid room id")?).with_ice_servers(Vec::new());

    let alice = Coordinator::new(config.clone(), Arc::new(relay.clone()), Arc::new(RtcEngineFactory::new()));
    let bob = Coordinator::new(config, Arc::new(relay), Arc::new(RtcEngineFactory::new()));
    let mut alice_events = alice.subscribe();
    let mut bob_events = bob.subscribe();

    alice.start().await?;
    bob.start().await?;
    println!(
        "{} alice={} bob={}",
        "starting".green().bold(),
        alice.local_id().short().cyan(),
        bob.local_id().short().cyan()
    );

    let limit = Duration::from_secs(20);
    let peer = wait_for(&mut alice_events, limit, |event| match event {
        CoordinatorEvent::ChannelOpen { peer_id } => Some(peer_id.clone()),
        _ => None,
    })
    .await
    .context("alice never opened a channel")?;
    wait_for(&mut bob_events, limit, |event| {
        matches!(event, CoordinatorEvent::ChannelOpen { .. }).then_some(())
    })
    .await
    .context("bob never opened a channel")?;

    alice.send(Target::Peer(peer), Bytes::from(message)).await?;
    let received = wait_for(&mut bob_events, limit, |event| match event {
        CoordinatorEvent::Message { data, .. } => Some(data.clone()),
        _ => None,
    })
    .await
    .context("bob never received the message")?;
    println!("{} {}", "bob received:".green().bold(), String::from_utf8_lossy(&received));

    alice.stop().await;
    bob.stop().await;
    Ok(())
}

async fn wait_for<T>(
    events: &mut broadcast::Receiver<CoordinatorEvent>,
    limit: Duration,
    mut pick: impl FnMut(&CoordinatorEvent) -> Option<T>,
) -> Result<T> {
    let waited = tokio::time::timeout(limit, async {
        loop {
            match events.recv().await {
                Ok(event) => {
                    print_event(&event);
                    if let Some(found) = pick(&event) {
                        return Ok(found);
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => bail!("event stream closed"),
            }
        }
    })
    .await;
    waited.context("timed out")?
}

fn print_event(event: &CoordinatorEvent) {
    match event {
        CoordinatorEvent::PeerJoined { peer_id, role } => {
            println!("{} {} ({role})", "+".green().bold(), peer_id.short().cyan())
        }
        CoordinatorEvent::PeerLeft { peer_id } => println!("{} {}", "-".yellow().bold(), peer_id.short().cyan()),
        CoordinatorEvent::StateChanged { .. } => {}
        CoordinatorEvent::Connected { peer_id } => {
            println!("{} {}", "connected".green(), peer_id.short().cyan())
        }
        CoordinatorEvent::Disconnected { peer_id } => {
            println!("{} {}", "disconnected".yellow(), peer_id.short().cyan())
        }
        CoordinatorEvent::Failed { peer_id, reason } => {
            println!("{} {}: {reason}", "failed".red().bold(), peer_id.short().cyan())
        }
        CoordinatorEvent::ChannelOpen { peer_id } => {
            println!("{} {}", "channel open".green(), peer_id.short().cyan())
        }
        CoordinatorEvent::ChannelClosed { peer_id } => {
            println!("{} {}", "channel closed".dimmed(), peer_id.short().cyan())
        }
        CoordinatorEvent::Message { peer_id, data } => {
            println!("{} {}", format!("[{}]", peer_id.short()).cyan(), String::from_utf8_lossy(data))
        }
        CoordinatorEvent::Diagnostic(diagnostic) => println!("{} {diagnostic}", "note".yellow()),
    }
}
