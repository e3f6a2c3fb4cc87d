use crate::cli::AuditArgs;
use anyhow::{bail, Result};
use linkmesh_core::LinkMesh;

pub fn run(mesh: &LinkMesh, args: &AuditArgs) -> Result<()> {
    let users = match args.user {
        Some(user) => vec![user],
        None => mesh.accounts()?.into_iter().map(|a| a.user).collect(),
    };

    if args.json {
        let reports = users
            .into_iter()
            .map(|u| mesh.audit(u))
            .collect::<linkmesh_core::Result<Vec<_>>>()?;
        let drifted = reports.iter().filter(|r| !r.consistent).count();
        println!("{}", serde_json::to_string_pretty(&reports)?);
        if drifted > 0 {
            bail!("{} account(s) drifted from their transaction log", drifted);
        }
        return Ok(());
    }

    println!();
    println!("Ledger Audit ({} accounts)", users.len());
    println!("{}", "─".repeat(72));

    let mut drifted = 0;
    for user in users {
        let report = mesh.audit(user)?;
        let verdict = if report.consistent { "ok" } else { "DRIFT" };
        println!(
            "{}  replayed {:>12}  projected {:>12}  {}",
            report.user, report.replayed, report.projected, verdict
        );
        if !report.consistent {
            drifted += 1;
        }
    }
    println!("{}", "─".repeat(72));
    println!();

    if drifted > 0 {
        bail!("{} account(s) drifted from their transaction log", drifted);
    }
    Ok(())
}
