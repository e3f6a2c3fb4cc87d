pub mod audit;
pub mod maintain;
pub mod routes;
pub mod stats;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "linkmesh")]
#[command(version, about = "Link exchange engine — maintenance, audits and route search")]
pub struct Cli {
    /// Path to the data directory
    #[arg(long, global = true, env = "LINKMESH_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("linkmesh.redb")
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the periodic maintenance passes (settlement, decay,
    /// re-verification, blacklist expiry)
    Maintain(MaintainArgs),
    /// Record counts across the durable sets
    Stats(StatsArgs),
    /// Replay transaction logs against projected balances
    Audit(AuditArgs),
    /// Search routable inventory for a requester
    Routes(RouteArgs),
}

#[derive(Args, Debug)]
pub struct MaintainArgs {
    /// Skip the HTTP re-verification pass (offline deployments)
    #[arg(long)]
    pub skip_reverify: bool,

    /// Reachability probe timeout in seconds
    #[arg(long, env = "LINKMESH_PROBE_TIMEOUT", default_value = "5")]
    pub probe_timeout: u64,
}

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Emit the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct AuditArgs {
    /// Audit a single user instead of every account
    #[arg(long)]
    pub user: Option<Uuid>,

    /// Emit the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct RouteArgs {
    /// Requesting user id
    pub requester: Uuid,

    /// Minimum domain rating of the source page
    #[arg(long)]
    pub min_domain_rating: Option<u32>,

    /// Maximum risk score of the source page
    #[arg(long)]
    pub max_risk: Option<u8>,

    /// Restrict to a niche
    #[arg(long)]
    pub niche: Option<String>,

    /// Restrict to a tier (1-3)
    #[arg(long)]
    pub tier: Option<u8>,
}
