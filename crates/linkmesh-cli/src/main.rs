mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use linkmesh_core::{LinkMesh, MeshConfig};

fn main() -> Result<()> {
    env_logger::init();

    let args = Cli::parse();
    let mesh = LinkMesh::open(args.db_path(), MeshConfig::default())?;

    match &args.command {
        Commands::Maintain(maintain) => cli::maintain::run(&mesh, maintain),
        Commands::Stats(stats) => cli::stats::run(&mesh, stats),
        Commands::Audit(audit) => cli::audit::run(&mesh, audit),
        Commands::Routes(routes) => cli::routes::run(&mesh, routes),
    }
}
