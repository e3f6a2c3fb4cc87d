use crate::cli::RouteArgs;
use anyhow::{bail, Result};
use linkmesh_core::{InventoryFilter, LinkMesh, Tier, UNREACHABLE};

pub fn run(mesh: &LinkMesh, args: &RouteArgs) -> Result<()> {
    let mut filter = InventoryFilter::new();
    if let Some(dr) = args.min_domain_rating {
        filter = filter.with_min_domain_rating(dr);
    }
    if let Some(risk) = args.max_risk {
        filter = filter.with_max_risk_score(risk);
    }
    if let Some(niche) = &args.niche {
        filter = filter.with_niche(niche.clone());
    }
    if let Some(tier) = args.tier {
        match Tier::from_u8(tier) {
            Some(t) => filter = filter.with_tier(t),
            None => bail!("tier must be 1, 2 or 3, got {}", tier),
        }
    }

    let routes = mesh.find_routes(args.requester, filter)?;
    if routes.is_empty() {
        println!("No routable inventory for {}", args.requester);
        return Ok(());
    }

    println!();
    println!("Routes for {}", args.requester);
    println!("{}", "─".repeat(96));
    println!(
        "{:>7}  {:>3}  {:>4}  {:>4}  {:>9}  {}",
        "score", "dr", "qual", "hops", "credits", "page"
    );
    for route in &routes {
        let hops = if route.hop_distance == UNREACHABLE {
            "-".to_string()
        } else {
            route.hop_distance.to_string()
        };
        println!(
            "{:>7.1}  {:>3}  {:>4}  {:>4}  {:>9}  {}",
            route.score,
            route.page.domain_rating,
            route.page.quality_score,
            hops,
            route.page.credits_per_link,
            route.page.page_url
        );
    }
    println!("{}", "─".repeat(96));
    println!();

    Ok(())
}
