//! relaynet - headless driver for a network of relaying actors.
//!
//! Loads or builds a network, runs the polling loop that applies delivery
//! reports and usage decay, and logs what happened on each channel.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::Rng;
use relaynet::{parse_graph, Config, Network, NodeId, Position, RelayMode, RunnerConfig};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Simulate a directed graph of message-relaying nodes.
#[derive(Debug, Parser)]
#[command(name = "relaynet")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML file with `[network]` and `[runner]` settings.
    #[arg(long, global = true, env = "RELAYNET_CONFIG")]
    config: Option<PathBuf>,

    /// Milliseconds between ticks of the polling loop.
    #[arg(long, global = true, env = "RELAYNET_TICK_MS")]
    tick_ms: Option<u64>,

    /// Usage removed from every channel on each tick.
    #[arg(long, global = true)]
    decay_step: Option<f64>,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Load a graph file and run it.
    Run {
        file: PathBuf,

        /// Number of ticks to run before stopping.
        #[arg(long, default_value_t = 300)]
        ticks: u64,

        /// Write the network here before stopping.
        #[arg(long)]
        save: Option<PathBuf>,

        /// Message to put on a node's inbound queue at start, as ID=TEXT.
        #[arg(long, value_parser = parse_inject)]
        inject: Vec<(NodeId, String)>,
    },

    /// Run a ring of multicast nodes where node 0 generates messages.
    Demo {
        #[arg(long, default_value_t = 5)]
        nodes: u32,

        /// Send interval of node 0, in milliseconds.
        #[arg(long, default_value_t = 250)]
        interval: u64,

        #[arg(long, default_value_t = 300)]
        ticks: u64,

        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Parse a graph file and print it back in normalized form.
    Check { file: PathBuf },
}

fn parse_inject(s: &str) -> Result<(NodeId, String), String> {
    let (id, text) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ID=TEXT, got {s:?}"))?;
    let id = id
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid node id {id:?}: {e}"))?;
    Ok((NodeId(id), text.to_string()))
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(tick_ms) = cli.tick_ms {
        config.runner.tick_ms = tick_ms;
    }
    if let Some(step) = cli.decay_step {
        config.runner.decay_step = step;
    }
    if config.runner.tick_ms == 0 {
        bail!("tick interval must be positive");
    }

    match cli.command {
        Commands::Run {
            file,
            ticks,
            save,
            inject,
        } => {
            let (mut net, max_id) = Network::load(&file, config.network)
                .await
                .with_context(|| format!("couldn't load {}", file.display()))?;
            info!(nodes = net.len(), max_id = ?max_id.map(|id| id.0), "network ready");
            for (id, text) in inject {
                net.inject(id, text).await?;
            }
            drive(&mut net, &config.runner, ticks, save).await
        }
        Commands::Demo {
            nodes,
            interval,
            ticks,
            save,
        } => {
            let mut net = Network::new(config.network);
            build_ring(&mut net, nodes, interval).await?;
            drive(&mut net, &config.runner, ticks, save).await
        }
        Commands::Check { file } => {
            let input = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("couldn't open {}", file.display()))?;
            let graph = parse_graph(&input).context("couldn't parse network")?;
            let mut net = Network::from_graph(graph, config.network).await?;
            print!("{}", net.to_text());
            net.stop_all_and_wait().await?;
            Ok(())
        }
    }
}

async fn build_ring(net: &mut Network, nodes: u32, interval_ms: u64) -> Result<()> {
    if nodes == 0 {
        bail!("a ring needs at least one node");
    }
    let ids = {
        let mut rng = rand::thread_rng();
        (0..nodes)
            .map(|_| net.spawn(Position::new(rng.gen_range(-400..400), rng.gen_range(-300..300))))
            .collect::<Result<Vec<NodeId>, _>>()?
    };
    for (i, &id) in ids.iter().enumerate() {
        let next = ids[(i + 1) % ids.len()];
        net.add_or_remove_channel(id, next).await?;
        net.set_relay_mode(id, RelayMode::Multicast).await?;
    }
    net.set_send_text(ids[0], "hello ring").await?;
    net.set_send_interval(ids[0], interval_ms).await?;
    Ok(())
}

/// The polling loop: decay, drain reports and terminations, once per tick.
async fn drive(
    net: &mut Network,
    runner: &RunnerConfig,
    ticks: u64,
    save: Option<PathBuf>,
) -> Result<()> {
    let mut timer = tokio::time::interval(Duration::from_millis(runner.tick_ms));
    timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut delivered = 0usize;
    for _ in 0..ticks {
        timer.tick().await;
        let summary = net.tick(runner.decay_step);
        delivered += summary.reports.len();
        for id in summary.terminated {
            warn!(node = %id, "node terminated while running");
        }
    }

    info!(ticks, delivered, "run finished");
    for node in net.nodes() {
        for channel in node.channels() {
            info!(
                src = %node.id,
                dst = %channel.dst,
                usage = channel.usage.value(),
                "channel"
            );
        }
    }

    if let Some(path) = save {
        net.save(&path)
            .with_context(|| format!("couldn't write {}", path.display()))?;
    }

    net.stop_all_and_wait().await?;
    Ok(())
}
