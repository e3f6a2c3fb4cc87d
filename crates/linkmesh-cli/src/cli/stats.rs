use crate::cli::StatsArgs;
use anyhow::Result;
use linkmesh_core::LinkMesh;

pub fn run(mesh: &LinkMesh, args: &StatsArgs) -> Result<()> {
    let stats = mesh.stats()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!();
    println!("Exchange Overview");
    println!("{}", "─".repeat(50));
    println!("Inventory pages  {:>8}", stats.page_count);
    println!("Accounts         {:>8}", stats.account_count);
    println!("Transactions     {:>8}", stats.transaction_count);
    println!("Link edges       {:>8}", stats.edge_count);
    println!("Anchor usages    {:>8}", stats.anchor_usage_count);
    println!("Domain scores    {:>8}", stats.domain_score_count);
    println!("Blacklist pairs  {:>8}", stats.blacklist_count);
    println!("{}", "─".repeat(50));
    println!();

    Ok(())
}
