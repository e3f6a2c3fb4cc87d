use crate::graph::AdjacencySnapshot;
use crate::types::UserId;
use std::collections::HashSet;

/// Informational diagnostics over a user's neighborhood. Nothing here
/// gates a transaction; the reports feed dashboards and manual review.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternReport {
    pub user: UserId,
    pub neighbor_count: usize,

    /// Neighbors with live links in both directions.
    pub reciprocal_links: usize,

    /// Fraction of possible edges among the user's neighbors that
    /// actually exist (0.0 - 1.0). Dense neighborhoods read as
    /// coordinated linking.
    pub clustering_coefficient: f32,

    /// Heuristic flag for the review queue.
    pub needs_review: bool,
}

/// Neighborhood overlap of two users as a 0-100 risk percentage
/// (Jaccard over undirected live neighbor sets, the two users
/// themselves excluded).
pub fn cluster_risk(snapshot: &AdjacencySnapshot, a: UserId, b: UserId) -> u8 {
    let set_a = neighbor_set(snapshot, a, &[a, b]);
    let set_b = neighbor_set(snapshot, b, &[a, b]);

    if set_a.is_empty() && set_b.is_empty() {
        return 0;
    }

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0;
    }
    ((intersection as f32 / union as f32) * 100.0).round() as u8
}

/// Aggregate reciprocity and clustering for one user's neighborhood.
pub fn detect_patterns(snapshot: &AdjacencySnapshot, user: UserId) -> PatternReport {
    let neighbors: Vec<UserId> = snapshot
        .neighbors(user)
        .map(|s| s.iter().copied().collect())
        .unwrap_or_default();

    let reciprocal_links = neighbors
        .iter()
        .filter(|&&n| snapshot.has_live_edge(user, n) && snapshot.has_live_edge(n, user))
        .count();

    let clustering_coefficient = clustering(snapshot, &neighbors);

    PatternReport {
        user,
        neighbor_count: neighbors.len(),
        reciprocal_links,
        clustering_coefficient,
        needs_review: reciprocal_links > 0 || clustering_coefficient > 0.5,
    }
}

fn neighbor_set(
    snapshot: &AdjacencySnapshot,
    user: UserId,
    excluded: &[UserId],
) -> HashSet<UserId> {
    snapshot
        .neighbors(user)
        .map(|s| {
            s.iter()
                .copied()
                .filter(|n| !excluded.contains(n))
                .collect()
        })
        .unwrap_or_default()
}

fn clustering(snapshot: &AdjacencySnapshot, neighbors: &[UserId]) -> f32 {
    let k = neighbors.len();
    if k < 2 {
        return 0.0;
    }

    let mut present = 0usize;
    for i in 0..k {
        for j in (i + 1)..k {
            let connected = snapshot
                .neighbors(neighbors[i])
                .map(|s| s.contains(&neighbors[j]))
                .unwrap_or(false);
            if connected {
                present += 1;
            }
        }
    }

    let possible = k * (k - 1) / 2;
    present as f32 / possible as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::UNREACHABLE;
    use crate::types::{AnchorType, LinkEdge};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn edge(source: UserId, target: UserId) -> LinkEdge {
        LinkEdge::new(
            source,
            target,
            Uuid::now_v7(),
            "https://example.com/p",
            "example",
            AnchorType::Branded,
            UNREACHABLE,
            dec!(5),
        )
    }

    #[test]
    fn cluster_risk_of_disjoint_neighborhoods_is_zero() {
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        let edges = vec![edge(a, Uuid::now_v7()), edge(b, Uuid::now_v7())];
        let snap = AdjacencySnapshot::build(&edges);
        assert_eq!(cluster_risk(&snap, a, b), 0);
    }

    #[test]
    fn cluster_risk_of_identical_neighborhoods_is_full() {
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        let shared1 = Uuid::now_v7();
        let shared2 = Uuid::now_v7();
        let edges = vec![
            edge(a, shared1),
            edge(a, shared2),
            edge(b, shared1),
            edge(b, shared2),
        ];
        let snap = AdjacencySnapshot::build(&edges);
        assert_eq!(cluster_risk(&snap, a, b), 100);
    }

    #[test]
    fn reciprocal_pairs_are_flagged() {
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        let edges = vec![edge(a, b), edge(b, a)];
        let snap = AdjacencySnapshot::build(&edges);

        let report = detect_patterns(&snap, a);
        assert_eq!(report.reciprocal_links, 1);
        assert!(report.needs_review);
    }

    #[test]
    fn triangle_has_full_clustering() {
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        let c = Uuid::now_v7();
        let edges = vec![edge(a, b), edge(a, c), edge(b, c)];
        let snap = AdjacencySnapshot::build(&edges);

        let report = detect_patterns(&snap, a);
        assert_eq!(report.neighbor_count, 2);
        assert!((report.clustering_coefficient - 1.0).abs() < f32::EPSILON);
        assert!(report.needs_review);
    }

    #[test]
    fn sparse_star_does_not_need_review() {
        let hub = Uuid::now_v7();
        let spokes: Vec<UserId> = (0..4).map(|_| Uuid::now_v7()).collect();
        let edges: Vec<LinkEdge> = spokes.iter().map(|&s| edge(hub, s)).collect();
        let snap = AdjacencySnapshot::build(&edges);

        let report = detect_patterns(&snap, hub);
        assert_eq!(report.neighbor_count, 4);
        assert_eq!(report.reciprocal_links, 0);
        assert_eq!(report.clustering_coefficient, 0.0);
        assert!(!report.needs_review);
    }
}
