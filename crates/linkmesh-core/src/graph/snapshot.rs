use crate::graph::UNREACHABLE;
use crate::types::{LinkEdge, PairKey, UserId};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet, VecDeque};

/// Immutable adjacency view of the exchange graph, built from a single
/// storage read. Route search validates many candidates against one
/// snapshot instead of issuing per-node neighbor queries during BFS.
///
/// Live edges drive reachability; the pair counts, loop footprints and
/// per-day counters also include dead edges, because a removed link does
/// not erase the footprint it created.
#[derive(Debug, Default)]
pub struct AdjacencySnapshot {
    /// Undirected live-edge neighbors, the BFS relation.
    live_neighbors: HashMap<UserId, HashSet<UserId>>,

    /// Directed live edges as (source, target) pairs.
    live_directed: HashSet<(UserId, UserId)>,

    /// Directed edges ever created, including dead ones.
    all_directed: HashSet<(UserId, UserId)>,

    /// Incoming sources per user, over all edges ever created.
    all_incoming: HashMap<UserId, Vec<UserId>>,

    /// Edges ever created per unordered pair.
    pair_counts: HashMap<PairKey, u32>,

    /// Links created in the last 24 h keyed by host.
    created_today: HashMap<UserId, u32>,

    built_at: DateTime<Utc>,
}

impl AdjacencySnapshot {
    /// Build from the full edge set.
    pub fn build(edges: &[LinkEdge]) -> Self {
        let built_at = Utc::now();
        let day_ago = built_at - Duration::hours(24);
        let mut snap = AdjacencySnapshot {
            built_at,
            ..Default::default()
        };

        for edge in edges {
            *snap
                .pair_counts
                .entry(PairKey::new(edge.source, edge.target))
                .or_insert(0) += 1;
            snap.all_directed.insert((edge.source, edge.target));
            snap.all_incoming
                .entry(edge.target)
                .or_default()
                .push(edge.source);
            if edge.created_at >= day_ago {
                *snap.created_today.entry(edge.source).or_insert(0) += 1;
            }

            if edge.is_live {
                snap.live_directed.insert((edge.source, edge.target));
                snap.live_neighbors
                    .entry(edge.source)
                    .or_default()
                    .insert(edge.target);
                snap.live_neighbors
                    .entry(edge.target)
                    .or_default()
                    .insert(edge.source);
            }
        }
        snap
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Undirected live neighbors of a user.
    pub fn neighbors(&self, user: UserId) -> Option<&HashSet<UserId>> {
        self.live_neighbors.get(&user)
    }

    /// Is there a live edge exactly source → target?
    pub fn has_live_edge(&self, source: UserId, target: UserId) -> bool {
        self.live_directed.contains(&(source, target))
    }

    /// Was an edge ever created source → target, live or not?
    pub fn has_any_edge(&self, source: UserId, target: UserId) -> bool {
        self.all_directed.contains(&(source, target))
    }

    /// Users that ever linked to `user`.
    pub fn incoming_sources(&self, user: UserId) -> &[UserId] {
        self.all_incoming
            .get(&user)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Edges ever created between the pair, either direction.
    pub fn pair_count(&self, pair: PairKey) -> u32 {
        self.pair_counts.get(&pair).copied().unwrap_or(0)
    }

    /// Links the host created in the last 24 h.
    pub fn links_created_today(&self, host: UserId) -> u32 {
        self.created_today.get(&host).copied().unwrap_or(0)
    }

    /// Shortest undirected live path between two users, bounded at
    /// `max_depth`. Returns `UNREACHABLE` when no path exists within the
    /// bound. Nodes are marked visited before expansion, and the queue
    /// is never expanded past the depth bound, so cyclic graphs
    /// terminate and large components stay cheap.
    pub fn hop_distance(&self, from: UserId, to: UserId, max_depth: u32) -> u32 {
        if from == to {
            return 0;
        }

        let mut visited: HashSet<UserId> = HashSet::new();
        let mut queue: VecDeque<(UserId, u32)> = VecDeque::new();
        visited.insert(from);
        queue.push_back((from, 0));

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            let Some(neighbors) = self.live_neighbors.get(&current) else {
                continue;
            };
            for &next in neighbors {
                if next == to {
                    return depth + 1;
                }
                if visited.insert(next) {
                    queue.push_back((next, depth + 1));
                }
            }
        }

        UNREACHABLE
    }
}
