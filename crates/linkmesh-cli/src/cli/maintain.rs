use crate::cli::MaintainArgs;
use anyhow::Result;
use chrono::Utc;
use linkmesh_core::{HttpProbe, LinkMesh, ReachabilityProbe};
use std::time::Duration;

pub fn run(mesh: &LinkMesh, args: &MaintainArgs) -> Result<()> {
    let probe;
    let probe_ref: Option<&dyn ReachabilityProbe> = if args.skip_reverify {
        None
    } else {
        probe = HttpProbe::with_timeout(Duration::from_secs(args.probe_timeout))?;
        Some(&probe)
    };

    let summary = mesh.run_maintenance(probe_ref, Utc::now())?;

    println!();
    println!("Maintenance Run");
    println!("{}", "─".repeat(50));
    println!("Pending settlement");
    println!("  examined     {:>8}", summary.settlement.examined);
    println!("  converted    {:>8}", summary.settlement.converted.len());
    println!("  clawed back  {:>8}", summary.settlement.clawed_back.len());
    println!("Decay");
    println!("  charged      {:>8}", summary.decay.charged);
    println!("  total        {:>8}", summary.decay.total_decayed);
    if let Some(reverify) = &summary.reverify {
        println!("Re-verification");
        println!("  verified     {:>8}", reverify.verified.len());
        println!("  rejected     {:>8}", reverify.rejected.len());
        println!("  expired      {:>8}", reverify.expired.len());
    }
    println!("Blacklist purged {:>6}", summary.blacklist_purged);

    let error_count = summary.settlement.errors.len()
        + summary.decay.errors.len()
        + summary.reverify.as_ref().map(|r| r.errors.len()).unwrap_or(0);
    if error_count > 0 {
        println!("Errors           {:>6}", error_count);
        for (id, reason) in &summary.settlement.errors {
            println!("  edge {}: {}", id, reason);
        }
        for (user, reason) in &summary.decay.errors {
            println!("  account {}: {}", user, reason);
        }
        if let Some(reverify) = &summary.reverify {
            for (page, reason) in &reverify.errors {
                println!("  page {}: {}", page, reason);
            }
        }
    }
    println!("{}", "─".repeat(50));
    println!();

    Ok(())
}
