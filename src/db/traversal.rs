//! Bounded-depth weighted traversal over the relationship graph.
//!
//! Breadth-first from the start file across both edge directions; each
//! node is enqueued at most once, relevance decays as
//! `type_weight × 1/distance`, and on multiple paths to the same file the
//! maximum relevance with the minimum distance wins.
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;

type WeightOverrides = HashMap<String, f64>;

use rusqlite::Result;

use super::Db;
use super::relations::EdgeRecord;
use crate::model::{
    GraphEdge, GraphTraversalResult, RelatedComponent, RelationshipGraph, TraversalStats,
};

/// Options for [`Db::related_components`].
#[derive(Debug, Clone)]
pub struct TraversalOptions {
    pub max_depth: usize,
    /// Edge types to expand; `None` expands all.
    pub types: Option<Vec<String>>,
    pub min_relevance_score: f64,
    /// Per-type weight overrides applied at query time; stored edge
    /// weights are used otherwise.
    pub weights: Option<WeightOverrides>,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        Self {
            max_depth: 3,
            types: None,
            min_relevance_score: 0.0,
            weights: None,
        }
    }
}

struct Adjacency {
    /// path -> (neighbor, edge index)
    neighbors: HashMap<String, Vec<(String, usize)>>,
    edges: Vec<EdgeRecord>,
}

fn build_adjacency(edges: Vec<EdgeRecord>) -> Adjacency {
    let mut neighbors: HashMap<String, Vec<(String, usize)>> = HashMap::new();
    for (idx, edge) in edges.iter().enumerate() {
        neighbors
            .entry(edge.from_path.clone())
            .or_default()
            .push((edge.to_path.clone(), idx));
        // Dependents are related components too; walk edges both ways.
        neighbors
            .entry(edge.to_path.clone())
            .or_default()
            .push((edge.from_path.clone(), idx));
    }
    Adjacency { neighbors, edges }
}

impl Db {
    /// Related components reachable from `path`, ranked by relevance.
    pub fn related_components(
        &self,
        path: &str,
        options: &TraversalOptions,
    ) -> Result<Vec<RelatedComponent>> {
        Ok(self.traverse(path, options)?.related_components)
    }

    /// Full traversal: ranked components plus a graph snapshot and stats.
    pub fn traverse(&self, path: &str, options: &TraversalOptions) -> Result<GraphTraversalResult> {
        let started = Instant::now();
        let adjacency = build_adjacency(self.load_edges(options.types.as_deref())?);
        let known_paths: HashSet<String> = self.list_paths()?.into_iter().collect();

        let mut best: HashMap<String, RelatedComponent> = HashMap::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut traversed_edges: HashSet<usize> = HashSet::new();
        let mut stats = TraversalStats::default();

        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        visited.insert(path.to_string());
        queue.push_back((path.to_string(), 0));

        while let Some((node, distance)) = queue.pop_front() {
            if distance >= options.max_depth {
                continue;
            }
            let Some(neighbors) = adjacency.neighbors.get(&node) else {
                continue;
            };

            for (neighbor, edge_idx) in neighbors {
                stats.edges_traversed += 1;
                traversed_edges.insert(*edge_idx);

                if neighbor == path {
                    continue;
                }

                let edge = &adjacency.edges[*edge_idx];
                let next_distance = distance + 1;
                let weight = options
                    .weights
                    .as_ref()
                    .and_then(|w| w.get(&edge.edge_type).copied())
                    .unwrap_or(edge.weight);
                let relevance = weight * (1.0 / next_distance as f64);

                let candidate = RelatedComponent {
                    file_path: neighbor.clone(),
                    component_name: component_name(neighbor),
                    component_type: if known_paths.contains(neighbor) {
                        "file".to_string()
                    } else {
                        "external".to_string()
                    },
                    relationship_type: edge.edge_type.clone(),
                    relevance_score: relevance,
                    distance: next_distance,
                };

                best.entry(neighbor.clone())
                    .and_modify(|existing| {
                        if relevance > existing.relevance_score {
                            existing.relevance_score = relevance;
                            existing.relationship_type = edge.edge_type.clone();
                        }
                        if next_distance < existing.distance {
                            existing.distance = next_distance;
                        }
                    })
                    .or_insert(candidate);

                if visited.insert(neighbor.clone()) {
                    if next_distance > stats.max_depth_reached {
                        stats.max_depth_reached = next_distance;
                    }
                    queue.push_back((neighbor.clone(), next_distance));
                }
            }
        }

        stats.nodes_visited = visited.len();
        stats.elapsed_ms = started.elapsed().as_millis() as u64;

        let mut related: Vec<RelatedComponent> = best
            .into_values()
            .filter(|c| c.relevance_score >= options.min_relevance_score)
            .collect();
        related.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.file_path.cmp(&b.file_path))
        });

        let mut nodes: Vec<String> = visited.into_iter().collect();
        nodes.sort();
        let edges = traversed_edges
            .into_iter()
            .map(|idx| {
                let e = &adjacency.edges[idx];
                GraphEdge {
                    from: e.from_path.clone(),
                    to: e.to_path.clone(),
                    edge_type: e.edge_type.clone(),
                    weight: e.weight,
                }
            })
            .collect();

        Ok(GraphTraversalResult {
            related_components: related,
            graph: RelationshipGraph {
                nodes,
                edges,
                primary_node: path.to_string(),
                max_depth: options.max_depth,
            },
            stats,
        })
    }
}

fn component_name(path: &str) -> String {
    let base = path.rsplit('/').next().unwrap_or(path);
    base.rsplit_once('.')
        .map(|(stem, _)| stem.to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| base.to_string())
}
