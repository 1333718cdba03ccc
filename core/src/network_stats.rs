//! Per-tick social-network statistics over the active subgraph.
//!
//! Arrested members and every edge touching them are left out of the
//! traversal. One breadth-first search per source yields both the
//! geodesic distances and one shortest path per pair (first discovery
//! wins, neighbours visited in ascending id order).
//!
//! Betweenness credits each unordered pair once and scales by
//! 2/((n−1)(n−2)), so it stays in [0, 1]. Tools that walk ordered pairs
//! with the same factor report exactly twice these values.

use crate::{network::Network, types::MemberId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct NetworkStats {
    pub n_components:        usize,
    pub max_component:       usize,
    pub min_ndegree:         f64,
    pub avg_ndegree:         f64,
    pub max_ndegree:         f64,
    pub cen_ndegree:         f64,
    pub min_nbetweenness:    f64,
    pub avg_nbetweenness:    f64,
    pub max_nbetweenness:    f64,
    pub cen_nbetweenness:    f64,
    pub average_path_length: f64,
}

/// Active subgraph as dense indices.
struct ActiveGraph {
    adjacency: Vec<Vec<usize>>,
}

impl ActiveGraph {
    fn of(network: &Network) -> Self {
        let ids = network.active_members(None);
        let index: BTreeMap<MemberId, usize> =
            ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        let adjacency = ids
            .iter()
            .map(|id| {
                network
                    .member(*id)
                    .map(|m| m.partners.iter().filter_map(|p| index.get(p).copied()).collect())
                    .unwrap_or_default()
            })
            .collect();
        Self { adjacency }
    }

    fn len(&self) -> usize {
        self.adjacency.len()
    }

    /// Distances and BFS parents from `source`.
    fn bfs(&self, source: usize) -> (Vec<Option<usize>>, Vec<Option<usize>>) {
        let mut dist = vec![None; self.len()];
        let mut parent = vec![None; self.len()];
        let mut queue = VecDeque::new();
        dist[source] = Some(0);
        queue.push_back(source);
        while let Some(u) = queue.pop_front() {
            let d = dist[u].unwrap_or(0);
            for &v in &self.adjacency[u] {
                if dist[v].is_none() {
                    dist[v] = Some(d + 1);
                    parent[v] = Some(u);
                    queue.push_back(v);
                }
            }
        }
        (dist, parent)
    }

    fn components(&self) -> Vec<usize> {
        let mut seen = vec![false; self.len()];
        let mut sizes = Vec::new();
        for start in 0..self.len() {
            if seen[start] {
                continue;
            }
            let mut size = 0;
            let mut queue = VecDeque::from([start]);
            seen[start] = true;
            while let Some(u) = queue.pop_front() {
                size += 1;
                for &v in &self.adjacency[u] {
                    if !seen[v] {
                        seen[v] = true;
                        queue.push_back(v);
                    }
                }
            }
            sizes.push(size);
        }
        sizes
    }
}

/// min, mean, max and centralisation Σ(max − xᵢ) / ((n−1)(n−2)).
fn summarize(values: &[f64]) -> (f64, f64, f64, f64) {
    let n = values.len();
    if n == 0 {
        return (0.0, 0.0, 0.0, 0.0);
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = values.iter().sum::<f64>() / n as f64;
    let cen = if n > 2 {
        values.iter().map(|v| max - v).sum::<f64>() / ((n - 1) * (n - 2)) as f64
    } else {
        0.0
    };
    (min, mean, max, cen)
}

/// Compute every statistic for the current network. Fewer than two
/// active members yields all zeros.
pub fn compute(network: &Network) -> NetworkStats {
    let graph = ActiveGraph::of(network);
    let n = graph.len();
    if n < 2 {
        return NetworkStats::default();
    }

    let sizes = graph.components();

    let ndegree: Vec<f64> = graph
        .adjacency
        .iter()
        .map(|adj| adj.len() as f64 / (n - 1) as f64)
        .collect();

    let mut through = vec![0u64; n];
    let mut total_distance = 0u64;
    for s in 0..n {
        let (dist, parent) = graph.bfs(s);
        let farthest = dist.iter().flatten().copied().max().unwrap_or(0);

        for t in 0..n {
            if t == s {
                continue;
            }
            total_distance += dist[t].unwrap_or(farthest + 1) as u64;

            // Each unordered pair once: half the ordered-pair count.
            if t > s && dist[t].is_some() {
                let mut node = parent[t];
                while let Some(u) = node {
                    if u == s {
                        break;
                    }
                    through[u] += 1;
                    node = parent[u];
                }
            }
        }
    }

    let norm = if n > 2 { 2.0 / ((n - 1) * (n - 2)) as f64 } else { 0.0 };
    let nbetweenness: Vec<f64> = through.iter().map(|&c| c as f64 * norm).collect();

    let (min_ndegree, avg_ndegree, max_ndegree, cen_ndegree) = summarize(&ndegree);
    let (min_nbetweenness, avg_nbetweenness, max_nbetweenness, cen_nbetweenness) =
        summarize(&nbetweenness);

    NetworkStats {
        n_components: sizes.len(),
        max_component: sizes.iter().copied().max().unwrap_or(0),
        min_ndegree,
        avg_ndegree,
        max_ndegree,
        cen_ndegree,
        min_nbetweenness,
        avg_nbetweenness,
        max_nbetweenness,
        cen_nbetweenness,
        average_path_length: total_distance as f64 / (n * (n - 1)) as f64,
    }
}
