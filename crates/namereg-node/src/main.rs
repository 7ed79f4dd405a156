//! namereg-node: the name registry server binary.
//!
//! Startup sequence:
//!   1. Open (or create) the state database
//!   2. Apply init params if the DB is fresh
//!   3. Start the JSON-RPC 2.0 server
//!   4. Run the writer loop: every mutation is applied here, one at a time

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info, warn};

use namereg_core::Principal;
use namereg_genesis::{apply_init, InitParams};
use namereg_rpc::{RpcServer, RpcServerState, Submission};
use namereg_state::{Clock, RegistryEngine, RegistryQuery, StateDb, SystemClock};

#[derive(Parser, Debug)]
#[command(name = "namereg-node", version, about = "Name registry node for MCP execution units")]
struct Args {
    /// Directory for the persistent state database.
    #[arg(long, default_value = "~/.namereg/data")]
    data_dir: PathBuf,

    /// JSON-RPC listen address.
    #[arg(long, default_value = "127.0.0.1:8646")]
    rpc_addr: SocketAddr,

    /// Path to init params JSON (only read when the database is fresh).
    #[arg(long)]
    init_params: Option<PathBuf>,

    /// Extra initial administrators, base-58 (comma-separated).
    #[arg(long, value_delimiter = ',')]
    admin: Vec<String>,

    /// Capacity of the mutation queue.
    #[arg(long, default_value_t = 512)]
    queue_depth: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,namereg=debug")),
        )
        .init();

    let args = Args::parse();
    info!("namereg node starting");

    // ── State database ────────────────────────────────────────────────────────
    let data_dir = expand_tilde(&args.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;

    let db = Arc::new(StateDb::open(&data_dir).context("opening state database")?);

    // ── Init if fresh ─────────────────────────────────────────────────────────
    if db.is_initialized().context("reading init marker")? {
        info!("existing database found, skipping init");
        if args.init_params.is_some() || !args.admin.is_empty() {
            warn!("--init-params/--admin ignored: database is already initialized");
        }
    } else {
        info!("fresh database, applying init params");
        let params = load_init_params(args.init_params.as_deref(), &args.admin)?;
        apply_init(&db, &params).context("applying init params")?;
    }

    // ── Writer ────────────────────────────────────────────────────────────────
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mut engine = RegistryEngine::new(Arc::clone(&db)).with_clock(Arc::clone(&clock));
    let (sub_sender, mut sub_receiver) = tokio::sync::mpsc::channel::<Submission>(args.queue_depth);

    // ── RPC server ────────────────────────────────────────────────────────────
    let rpc_state = Arc::new(RpcServerState {
        query: RegistryQuery::new(Arc::clone(&db)),
        clock,
        submissions: sub_sender,
    });
    let rpc_handle = RpcServer::new(rpc_state)
        .start(args.rpc_addr)
        .await
        .context("starting RPC server")?;

    // ── Main loop: apply submissions in arrival order ─────────────────────────
    info!(rpc = %args.rpc_addr, "node ready");
    loop {
        tokio::select! {
            sub = sub_receiver.recv() => {
                let Some(sub) = sub else { break };
                let label = sub.command.label();
                let result = engine.execute(sub.caller, sub.command);
                match &result {
                    Ok(receipt) => debug!(caller = %sub.caller, command = label, %receipt, "command applied"),
                    Err(e) => warn!(caller = %sub.caller, command = label, error = %e, "command rejected"),
                }
                // The caller may have gone away; the commit stands either way.
                let _ = sub.reply.send(result);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
        }
    }

    let _ = rpc_handle.stop();
    db.flush().context("flushing state database")?;
    info!("node stopped");
    Ok(())
}

/// Read init params from `path` (if any) and merge in `--admin` principals.
fn load_init_params(path: Option<&Path>, extra_admins: &[String]) -> anyhow::Result<InitParams> {
    let mut params = match path {
        Some(p) => {
            let json = std::fs::read_to_string(p)
                .with_context(|| format!("reading init params from {}", p.display()))?;
            InitParams::from_json(&json).context("parsing init params JSON")?
        }
        None => InitParams::default(),
    };
    for text in extra_admins {
        let admin = Principal::from_b58(text).with_context(|| format!("parsing --admin {text}"))?;
        if !params.admins.contains(&admin) {
            params.admins.push(admin);
        }
    }
    if params.admins.is_empty() {
        anyhow::bail!("a fresh database needs at least one administrator: pass --admin or --init-params");
    }
    Ok(params)
}

/// Expand a leading `~` to the user's home directory (`HOME` or `USERPROFILE`).
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
