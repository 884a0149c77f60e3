//! Dive Control Terminal
//!
//! Plays the engine over stdin/stdout: each line is a command, each feed
//! event is printed as narration.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dive_control::{
    spawn_engine, EngineConfig, EventKind, RoundStateMachine, Variant, VERSION,
};

#[derive(Parser, Debug)]
#[command(name = "dive-control", version, about = "Round-based crash wager engine")]
struct Args {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// RNG seed (overrides the config file)
    #[arg(long)]
    seed: Option<u64>,

    /// Presentation flow: chart or terminal
    #[arg(long, value_parser = parse_variant)]
    variant: Option<Variant>,
}

fn parse_variant(s: &str) -> Result<Variant, String> {
    match s.to_ascii_lowercase().as_str() {
        "chart" => Ok(Variant::Chart),
        "terminal" => Ok(Variant::Terminal),
        other => Err(format!("unknown variant '{other}' (expected chart or terminal)")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig {
            variant: Variant::Terminal,
            ..EngineConfig::default()
        },
    };
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(variant) = args.variant {
        config.variant = variant;
    }

    info!("Dive Control v{}", VERSION);

    let machine = RoundStateMachine::new(config).context("invalid configuration")?;
    let mut events = machine.subscribe();
    let handle = spawn_engine(machine);
    let client = handle.client();

    // Printer
    let feed = client.feed().clone();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let text = feed.describe(&event);
                    match event.kind {
                        EventKind::Player => {}
                        EventKind::Error | EventKind::Warning => eprintln!("{text}"),
                        _ => println!("{text}"),
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "feed lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Input
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else { break };
                // Rejections are already narrated on the feed
                if let Err(e) = client.send_line(line).await {
                    if matches!(e, dive_control::engine::DriverError::Stopped) {
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    handle.shutdown();
    handle.join().await?;
    printer.abort();
    Ok(())
}
