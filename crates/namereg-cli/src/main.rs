//! namereg-cli
//!
//! Command-line client for a registry node. Keeps a local identity file and
//! sends queries and mutations over JSON-RPC.
//!
//! Usage:
//!   namereg-cli keygen        [--identity <path>]
//!   namereg-cli init-params   --out <path> [--reserved <name,...>]
//!   namereg-cli register      <name> [--payment-block <n>] [--rpc <url>]
//!   namereg-cli create-season --min-letters <n> --total <n> --price-icp <n> [--max-letters <n>]
//!   namereg-cli gift          <name> --recipient <b58>
//!   namereg-cli transfer      <name> --to <b58>
//!   namereg-cli domain        <name>
//!   namereg-cli seasons
//!   namereg-cli info

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use namereg_core::{
    AdminCreateDomainRequest, AdminGiftRequest, CreateSeasonRequest, Principal, RegistrationMode,
    RegistrationRequest, E8S_PER_ICP, NANOS_PER_SECOND,
};
use namereg_genesis::InitParams;
use namereg_rpc::RpcReceipt;

mod rpc_client;
use rpc_client::RegistryRpcClient;

// ── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "namereg-cli", version, about = "Name registry client")]
struct Args {
    /// Path to the identity file (JSON).
    #[arg(long, global = true, default_value = "~/.namereg/identity.json")]
    identity: PathBuf,

    /// Node RPC endpoint.
    #[arg(long, global = true, default_value = "http://127.0.0.1:8646")]
    rpc: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new identity and save it to the identity file.
    Keygen,

    /// Print the local principal.
    Whoami,

    /// Write an init-params JSON naming the local identity as administrator.
    InitParams {
        #[arg(long)]
        out: PathBuf,
        /// Extra reserved names (comma-separated).
        #[arg(long, value_delimiter = ',')]
        reserved: Vec<String>,
        #[arg(long)]
        endpoint_base: Option<String>,
    },

    // ── Seasons ──────────────────────────────────────────────────────────────
    /// Open a registration season (admin).
    CreateSeason {
        #[arg(long)]
        min_letters: u64,
        #[arg(long)]
        max_letters: Option<u64>,
        /// Capacity of the season.
        #[arg(long)]
        total: u64,
        #[arg(long)]
        price_icp: u64,
    },

    /// Deactivate an active season (admin).
    DeactivateSeason {
        #[arg(long)]
        season: u64,
    },

    /// Add an external address to a season's allow-list (admin).
    AllowAddress {
        #[arg(long)]
        season: u64,
        #[arg(long)]
        address: String,
    },

    /// List all seasons with their stats.
    Seasons,

    /// Show stats for one season (0 = latest).
    Season {
        #[arg(default_value_t = 0)]
        number: u64,
    },

    // ── Domains ──────────────────────────────────────────────────────────────
    /// Register a domain for the local identity.
    Register {
        name: String,
        /// Delegate administrator (base-58). Defaults to the local identity.
        #[arg(long)]
        administrator: Option<String>,
        /// Operator (base-58). Defaults to the local identity.
        #[arg(long)]
        operator: Option<String>,
        /// Ledger block of the fee payment.
        #[arg(long, default_value_t = 0)]
        payment_block: u64,
    },

    /// Create a domain for an allow-listed address (admin).
    AdminCreate {
        name: String,
        #[arg(long)]
        recipient: String,
        #[arg(long)]
        address: String,
    },

    /// Gift a domain (admin).
    Gift {
        name: String,
        #[arg(long)]
        recipient: String,
    },

    Transfer {
        name: String,
        #[arg(long)]
        to: String,
    },

    Renew {
        name: String,
        #[arg(long, default_value_t = 0)]
        payment_block: u64,
    },

    /// Set the custom MCP endpoint; omit `--endpoint` to clear it.
    SetEndpoint {
        name: String,
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Show one domain.
    Domain { name: String },

    /// List domains, optionally only those of one owner.
    Domains {
        #[arg(long)]
        owner: Option<String>,
    },

    /// Search unexpired domains by substring.
    Discover { query: String },

    /// Domains registered at or after a Unix timestamp (seconds).
    Since {
        #[arg(default_value_t = 0)]
        unix_secs: u64,
    },

    /// Registration fee and eligibility of a name for the local identity.
    Check { name: String },

    // ── Registry policy (admin) ──────────────────────────────────────────────
    AddAdmin { principal: String },
    RemoveAdmin { principal: String },
    Reserve { name: String },
    ApproveShort { principal: String },
    RevokeShort { principal: String },
    ShortMode { mode: ShortMode },
    SetBaseFee { e8s: u64 },

    /// Print node and registry info.
    Info,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ShortMode {
    Open,
    Whitelist,
    Closed,
}

impl From<ShortMode> for RegistrationMode {
    fn from(mode: ShortMode) -> Self {
        match mode {
            ShortMode::Open => RegistrationMode::Open,
            ShortMode::Whitelist => RegistrationMode::WhitelistOnly,
            ShortMode::Closed => RegistrationMode::Closed,
        }
    }
}

/// Contents of the identity file.
#[derive(Debug, Serialize, Deserialize)]
struct IdentityFile {
    principal: Principal,
    /// Hex seed the principal was derived from.
    seed: String,
    created_at: DateTime<Utc>,
}

// ── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("warn,namereg_cli=info")
        .init();

    let args = Args::parse();
    let identity = expand_tilde(&args.identity);
    let client = RegistryRpcClient::new(&args.rpc);

    match args.command {
        Command::Keygen => cmd_keygen(&identity),

        Command::Whoami => {
            let me = load_identity(&identity)?;
            println!("{}", me.principal);
            Ok(())
        }

        Command::InitParams { out, reserved, endpoint_base } => {
            let me = load_identity(&identity)?;
            let params = InitParams {
                admins: vec![me.principal],
                reserved_names: reserved,
                endpoint_base,
                ..Default::default()
            };
            let out = expand_tilde(&out);
            std::fs::write(&out, serde_json::to_string_pretty(&params)?)
                .with_context(|| format!("writing init params to {}", out.display()))?;
            println!("Init params written to {}", out.display());
            Ok(())
        }

        Command::CreateSeason { min_letters, max_letters, total, price_icp } => {
            let config = CreateSeasonRequest {
                min_letters,
                max_letters,
                total_allowed: total,
                price_icp,
            };
            submit(&client, &identity, "createSeason", vec![json!(config)]).await
        }

        Command::DeactivateSeason { season } => {
            submit(&client, &identity, "deactivateSeason", vec![json!(season)]).await
        }

        Command::AllowAddress { season, address } => {
            submit(&client, &identity, "addAllowedAddress", vec![json!(season), json!(address)]).await
        }

        Command::Seasons => {
            let seasons = client.get_all_seasons().await?;
            if seasons.is_empty() {
                println!("No seasons yet.");
            }
            for s in seasons {
                let max = s.max_letters.map_or_else(|| "-".to_string(), |m| m.to_string());
                println!(
                    "#{:<4} {:<12} letters {}..{:<4} taken {}/{}  price {} ICP",
                    s.season_id, s.status.to_string(), s.min_letters, max, s.names_taken, s.total_allowed, s.price_icp
                );
            }
            Ok(())
        }

        Command::Season { number } => {
            let Some(stats) = client.get_season_stats_by_number(number).await? else {
                bail!("season {number} not found");
            };
            println!("Season:     {}", stats.season_number);
            println!("Status:     {}", stats.status);
            println!("Taken:      {}/{}", stats.names_taken, stats.names_available);
            println!("Price:      {} ICP", stats.price_icp);
            let addresses = client.get_season_addresses(stats.season_number).await?;
            println!("Allow-list: {} address(es)", addresses.len());
            Ok(())
        }

        Command::Register { name, administrator, operator, payment_block } => {
            let me = load_identity(&identity)?;
            let request = RegistrationRequest {
                domain_name: name,
                administrator: parse_or(administrator.as_deref(), me.principal)?,
                operator: parse_or(operator.as_deref(), me.principal)?,
                payment_block,
            };
            submit_as(&client, &me, "registerDomain", vec![json!(request)]).await
        }

        Command::AdminCreate { name, recipient, address } => {
            let recipient = parse_principal(&recipient)?;
            let request = AdminCreateDomainRequest {
                domain_name: name,
                recipient,
                administrator: recipient,
                operator: recipient,
                recipient_address: address,
            };
            submit(&client, &identity, "adminCreateDomainWithAddress", vec![json!(request)]).await
        }

        Command::Gift { name, recipient } => {
            let recipient = parse_principal(&recipient)?;
            let request = AdminGiftRequest {
                domain_name: name,
                recipient,
                administrator: recipient,
                operator: recipient,
            };
            submit(&client, &identity, "adminGiftDomain", vec![json!(request)]).await
        }

        Command::Transfer { name, to } => {
            parse_principal(&to)?;
            submit(&client, &identity, "transferDomain", vec![json!(name), json!(to)]).await
        }

        Command::Renew { name, payment_block } => {
            submit(&client, &identity, "renewDomain", vec![json!(name), json!(payment_block)]).await
        }

        Command::SetEndpoint { name, endpoint } => {
            submit(&client, &identity, "setCustomMcpEndpoint", vec![json!(name), json!(endpoint)]).await
        }

        Command::Domain { name } => {
            let Some(d) = client.get_domain_info(&name).await? else {
                bail!("domain {name} not found");
            };
            println!("Domain:         {}", d.domain_name);
            println!("Status:         {:?}", d.status);
            println!("Owner:          {}", d.owner);
            println!("Administrator:  {}", d.administrator);
            println!("Operator:       {}", d.operator);
            println!("Execution unit: {}", d.execution_unit);
            println!("Endpoint:       {}", d.mcp_endpoint);
            println!("Season:         {}", d.season_id);
            println!("Registered:     {}", format_nanos(d.registration_time));
            println!("Expires:        {}", format_nanos(d.expiration_time));
            if d.was_gifted {
                println!("Gifted:         yes");
            }
            Ok(())
        }

        Command::Domains { owner } => {
            if let Some(o) = &owner {
                parse_principal(o)?;
            }
            for d in client.list_domains(owner.as_deref()).await? {
                println!("{:<32} {:?}  {}", d.domain_name, d.status, d.owner);
            }
            Ok(())
        }

        Command::Discover { query } => {
            for r in client.discover_domains(&query).await? {
                println!("{:<32} {}", r.domain_name, r.mcp_endpoint);
            }
            Ok(())
        }

        Command::Since { unix_secs } => {
            let since = unix_secs.saturating_mul(NANOS_PER_SECOND);
            for entry in client.get_domains_since(since).await? {
                println!("{}  {}", format_nanos(entry.registration_time), entry.domain_name);
            }
            Ok(())
        }

        Command::Check { name } => {
            let me = load_identity(&identity)?;
            let allowed = client.can_register_domain(&name, &me.principal.to_b58()).await?;
            let fee = client.get_registration_fee(&name).await?;
            println!("Name:      {name}");
            println!("Available: {}", if allowed { "yes" } else { "no" });
            println!("Fee:       {} ICP ({fee} e8s)", fee / E8S_PER_ICP);
            Ok(())
        }

        Command::AddAdmin { principal } => {
            parse_principal(&principal)?;
            submit(&client, &identity, "addAdmin", vec![json!(principal)]).await
        }

        Command::RemoveAdmin { principal } => {
            parse_principal(&principal)?;
            submit(&client, &identity, "removeAdmin", vec![json!(principal)]).await
        }

        Command::Reserve { name } => {
            submit(&client, &identity, "addReservedName", vec![json!(name)]).await
        }

        Command::ApproveShort { principal } => {
            parse_principal(&principal)?;
            submit(&client, &identity, "approveUserForShortNames", vec![json!(principal)]).await
        }

        Command::RevokeShort { principal } => {
            parse_principal(&principal)?;
            submit(&client, &identity, "revokeShortNameApproval", vec![json!(principal)]).await
        }

        Command::ShortMode { mode } => {
            let mode: RegistrationMode = mode.into();
            submit(&client, &identity, "setShortNameMode", vec![json!(mode)]).await
        }

        Command::SetBaseFee { e8s } => {
            submit(&client, &identity, "setBaseFee", vec![json!(e8s)]).await
        }

        Command::Info => {
            let info = client.get_registry_info().await?;
            let admins = client.get_admins().await?;
            println!("Version:        {}", info.version);
            println!("Endpoint base:  {}", info.endpoint_base);
            println!("Domains:        {}", info.domain_count);
            match info.current_season {
                Some(id) => println!("Current season: {id}"),
                None => println!("Current season: none"),
            }
            println!("Node time:      {}", format_nanos(info.now));
            println!("Admins:         {}", admins.join(", "));
            Ok(())
        }
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn cmd_keygen(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        bail!(
            "Identity file {} already exists. Delete it first to generate a new identity.",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let seed: [u8; 32] = rand::random();
    let identity = IdentityFile {
        principal: Principal::derive(&seed),
        seed: hex::encode(seed),
        created_at: Utc::now(),
    };
    let json = serde_json::to_string_pretty(&identity)?;
    std::fs::write(path, &json)
        .with_context(|| format!("writing identity file to {}", path.display()))?;

    println!("Generated new identity.");
    println!("Principal: {}", identity.principal);
    println!("File:      {}", path.display());
    Ok(())
}

async fn submit(client: &RegistryRpcClient, identity: &Path, method: &str, args: Vec<Value>) -> anyhow::Result<()> {
    let me = load_identity(identity)?;
    submit_as(client, &me, method, args).await
}

async fn submit_as(
    client: &RegistryRpcClient,
    me: &IdentityFile,
    method: &str,
    args: Vec<Value>,
) -> anyhow::Result<()> {
    info!(method, caller = %me.principal, "submitting");
    let receipt = client.submit(method, &me.principal.to_b58(), args).await?;
    print_receipt(&receipt);
    Ok(())
}

fn print_receipt(receipt: &RpcReceipt) {
    println!("{}", receipt.message);
    if let Some(unit) = &receipt.execution_unit {
        println!("Execution unit: {unit}");
    }
    if let Some(fee) = receipt.fee_e8s {
        println!("Fee:            {fee} e8s");
    }
    if let Some(exp) = receipt.expiration_time {
        println!("Expires:        {}", format_nanos(exp));
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn load_identity(path: &Path) -> anyhow::Result<IdentityFile> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading identity file {} (run `namereg-cli keygen`)", path.display()))?;
    serde_json::from_str(&json).context("parsing identity file")
}

fn parse_principal(text: &str) -> anyhow::Result<Principal> {
    Principal::from_b58(text).with_context(|| format!("invalid principal {text}"))
}

fn parse_or(text: Option<&str>, fallback: Principal) -> anyhow::Result<Principal> {
    text.map_or(Ok(fallback), parse_principal)
}

fn format_nanos(ts: u64) -> String {
    let secs = (ts / NANOS_PER_SECOND) as i64;
    let nanos = (ts % NANOS_PER_SECOND) as u32;
    DateTime::<Utc>::from_timestamp(secs, nanos)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}

fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
