//! supply-snapshot CLI: compute, watch and policy check.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use supply_snapshot::{
    CacheOptions, LcdClient, LcdConfig, Policy, SnapshotCache, SnapshotComputer,
};
use tracing::{info, warn};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    match cli.command {
        Command::Snapshot(args) => run_snapshot(&cli.chain, args),
        Command::Watch(args) => run_watch(&cli.chain, args),
        Command::CheckPolicy => run_check_policy(&cli.chain),
    }
}

#[derive(Parser)]
#[command(name = "supply-snapshot")]
#[command(author = "gorusys <goru.connector@outlook.com>")]
#[command(about = "Circulating / non-circulating / total supply snapshots from a Cosmos LCD")]
struct Cli {
    #[command(flatten)]
    chain: ChainArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ChainArgs {
    /// LCD (REST) endpoint.
    #[arg(long, global = true, env = "SUPPLY_LCD_URL", default_value = "http://localhost:1317")]
    lcd: String,
    #[arg(long, global = true, env = "SUPPLY_POLICY_PATH", default_value = "policy.json")]
    policy: PathBuf,
    #[arg(long, global = true, env = "SUPPLY_DENOM", default_value = "ulume")]
    denom: String,
    /// Snapshot freshness window in seconds.
    #[arg(long, global = true, env = "SUPPLY_TTL_SECS", default_value_t = 60)]
    ttl_secs: u64,
    /// Per-request LCD timeout in seconds.
    #[arg(long, global = true, env = "SUPPLY_HTTP_TIMEOUT_SECS", default_value_t = 5)]
    timeout_secs: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Compute one snapshot and print it as JSON.
    Snapshot(SnapshotArgs),
    /// Refresh every TTL and log each change of ETag.
    Watch(WatchArgs),
    /// Validate the policy file and print its fingerprint.
    CheckPolicy,
}

#[derive(Args)]
struct SnapshotArgs {
    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct WatchArgs {
    /// Stop after this many polls (runs until Ctrl-C when omitted).
    #[arg(long)]
    iterations: Option<u64>,
}

/// A missing or broken policy file is not fatal: the snapshot still counts escrow
/// and the community pool.
fn load_policy(path: &std::path::Path) -> Policy {
    match Policy::load(path) {
        Ok(p) => {
            info!(path = %path.display(), empty = p.is_empty(), "policy loaded");
            p
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "policy unavailable; using empty policy");
            Policy::default()
        }
    }
}

fn computer(chain: &ChainArgs) -> Result<SnapshotComputer<LcdClient>, Box<dyn std::error::Error>> {
    let lcd = LcdClient::new(LcdConfig {
        base_url: chain.lcd.clone(),
        timeout: Duration::from_secs(chain.timeout_secs.max(1)),
        ..Default::default()
    })?;
    Ok(SnapshotComputer::new(lcd, load_policy(&chain.policy)))
}

fn run_snapshot(chain: &ChainArgs, args: SnapshotArgs) -> Result<(), Box<dyn std::error::Error>> {
    let computer = computer(chain)?;
    let rt = tokio::runtime::Runtime::new()?;
    let snapshot = rt.block_on(computer.compute_snapshot(&chain.denom))?;
    info!(
        requests = computer.source().request_count(),
        skipped = snapshot.skipped.len(),
        policy_etag = computer.policy_etag().unwrap_or("-"),
        "snapshot complete"
    );
    let out = if args.pretty {
        serde_json::to_string_pretty(&snapshot)?
    } else {
        serde_json::to_string(&snapshot)?
    };
    println!("{out}");
    Ok(())
}

fn run_watch(chain: &ChainArgs, args: WatchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let cache = Arc::new(SnapshotCache::new(
        computer(chain)?,
        chain.denom.clone(),
        CacheOptions {
            ttl: Duration::from_secs(chain.ttl_secs),
            ..Default::default()
        },
    ));
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let policy = cache.computer().policy();
        info!(
            denom = cache.denom(),
            modules = policy.module_accounts.len(),
            policy_etag = cache.computer().policy_etag().unwrap_or("-"),
            "watching"
        );
        let refresher = cache.spawn_refresher();
        // Polls sit halfway between refreshes.
        let ttl = cache.ttl();
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + ttl / 2, ttl);
        let mut last_etag: Option<String> = None;
        let mut ticks = 0u64;
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted");
                    break;
                }
            }
            ticks += 1;
            match cache.get() {
                (None, _) => warn!("no snapshot yet"),
                (Some(snapshot), fresh) => {
                    if last_etag.as_deref() != Some(snapshot.etag.as_str()) {
                        info!(
                            height = snapshot.height,
                            etag = %snapshot.etag,
                            total = %snapshot.total,
                            circulating = %snapshot.circulating,
                            non_circulating = %snapshot.non_circulating.sum,
                            skipped = snapshot.skipped.len(),
                            "snapshot changed"
                        );
                        last_etag = Some(snapshot.etag.clone());
                    } else if !fresh {
                        warn!(height = snapshot.height, "serving stale snapshot");
                    }
                }
            }
            if args.iterations.is_some_and(|n| ticks >= n) {
                break;
            }
        }
        refresher.abort();
    });
    Ok(())
}

fn run_check_policy(chain: &ChainArgs) -> Result<(), Box<dyn std::error::Error>> {
    let policy = Policy::load(&chain.policy)?;
    let d = &policy.disclosed_lockups;
    info!(
        modules = policy.module_accounts.len(),
        foundation = d.foundation_genesis.len(),
        bootstraps = d.bootstraps.len(),
        "policy valid"
    );
    println!("{}", policy.fingerprint()?);
    Ok(())
}
