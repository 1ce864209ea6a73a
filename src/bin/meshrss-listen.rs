//! Print the rounds of a listen node as text rows, or discover the mesh behind it.

use anyhow::{Context, bail};
use clap::Parser;
use futures::StreamExt;
use meshrss::providers::ReaderProvider;
use meshrss::{FillForward, ListenConfig, ListenConnection, LinkOrder, Round, sniff};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Serial device node or capture file carrying the listen node's bytes
    source: PathBuf,
    /// YAML description of the mesh
    #[clap(short, long, required_unless_present = "sniff")]
    config: Option<PathBuf>,
    /// Link order to print (f, b, fb or a), overriding the configuration
    #[clap(short, long)]
    order: Option<LinkOrder>,
    /// Carry each link's last reading forward instead of printing 127 for missed links
    #[clap(long)]
    fill_forward: bool,
    /// Replay a capture at one packet per this many milliseconds
    #[clap(long)]
    pace_ms: Option<u64>,
    /// Listen for this many seconds and print a configuration for the mesh heard
    #[clap(long, value_name = "SECS", conflicts_with_all = ["config", "order", "fill_forward"])]
    sniff: Option<u64>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match (args.sniff, args.config.as_ref()) {
        (Some(secs), _) => run_sniff(&args, Duration::from_secs(secs)).await,
        (None, Some(config)) => run_listen(&args, config.clone()).await,
        (None, None) => bail!("either --config or --sniff is required"),
    }
}

async fn open_source(args: &Args, window: Option<usize>) -> anyhow::Result<ReaderProvider<tokio::fs::File>> {
    let mut provider = ReaderProvider::open(&args.source)
        .await
        .with_context(|| format!("opening {}", args.source.display()))?;
    if let Some(window) = window {
        provider = provider.with_window(window);
    }
    if let Some(ms) = args.pace_ms.filter(|&ms| ms > 0) {
        provider = provider.with_pacing(Duration::from_millis(ms));
    }
    Ok(provider)
}

async fn run_sniff(args: &Args, duration: Duration) -> anyhow::Result<()> {
    let mut provider = open_source(args, None).await?;
    let discovery = sniff(&mut provider, duration).await?;
    info!(
        nodes = discovery.nodes.len(),
        channels = discovery.channels.len(),
        "Discovered mesh, channel order below is ascending"
    );

    let config = discovery.to_config()?;
    std::io::stdout().lock().write_all(config.to_yaml_string()?.as_bytes())?;
    Ok(())
}

async fn run_listen(args: &Args, config_path: PathBuf) -> anyhow::Result<()> {
    let mut config = ListenConfig::load(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;
    if let Some(order) = args.order {
        config.selection.order = order;
    }

    let provider = open_source(args, Some(config.framer_window)).await?;
    let connection = match ListenConnection::from_provider(provider, &config) {
        Ok(connection) => connection,
        Err(e) => {
            for hint in e.recovery_suggestions() {
                warn!("{}", hint);
            }
            return Err(e.into());
        }
    };

    let format = connection.timestamp_format();
    let mut fill = args.fill_forward.then(|| FillForward::over_selection(connection.network()));
    let mut stdout = std::io::stdout().lock();
    let mut rounds = connection.rounds();

    while let Some(round) = rounds.next().await {
        let line = match fill.as_mut() {
            None => round.to_line(format),
            Some(fill) => {
                let values = fill.observe_round(&round)?;
                if !fill.complete() {
                    debug!(sequence = round.sequence, "Waiting to hear every link once");
                    continue;
                }
                Round { values, ..(*round).clone() }.to_line(format)
            }
        };
        writeln!(stdout, "{}", line)?;
    }
    stdout.flush()?;

    let stats = connection.stats();
    info!(
        rounds = stats.rounds(),
        decoded = stats.decoded,
        discarded = stats.discarded(),
        framer_overflows = stats.framer_overflows,
        "Byte source finished"
    );
    Ok(())
}
