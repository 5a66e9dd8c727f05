//! Similarity graph and connected components.
//!
//! Items are addressed by their snapshot index `0..N`. The graph is an
//! adjacency list over that arena; components are found by iterative
//! breadth-first traversal.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::similarity::{cosine_similarity, SimilarityMatrix};

/// Undirected edge between two snapshot indices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityEdge {
    /// Lower index
    pub a: usize,
    /// Higher index
    pub b: usize,
    /// Cosine similarity in [-1.0, 1.0]
    pub score: f64,
}

/// Compute every edge at or above `threshold` directly from the vectors.
pub fn build_edges(vectors: &[Vec<f32>], threshold: f64) -> Vec<SimilarityEdge> {
    let mut edges = Vec::new();
    for i in 0..vectors.len() {
        for j in (i + 1)..vectors.len() {
            let score = cosine_similarity(&vectors[i], &vectors[j]);
            if score >= threshold {
                edges.push(SimilarityEdge { a: i, b: j, score });
            }
        }
    }
    edges
}

/// Edges retained from a precomputed matrix at `threshold`.
pub fn edges_from_matrix(matrix: &SimilarityMatrix, threshold: f64) -> Vec<SimilarityEdge> {
    matrix
        .pairs()
        .filter(|(_, _, score)| *score >= threshold)
        .map(|(a, b, score)| SimilarityEdge { a, b, score })
        .collect()
}

/// Adjacency list over snapshot indices.
#[derive(Debug, Clone)]
pub struct SimilarityGraph {
    adjacency: Vec<Vec<usize>>,
    edge_count: usize,
}

impl SimilarityGraph {
    /// Build a graph of `node_count` nodes from an edge list.
    pub fn from_edges(node_count: usize, edges: &[SimilarityEdge]) -> Self {
        let mut adjacency = vec![Vec::new(); node_count];
        for edge in edges {
            adjacency[edge.a].push(edge.b);
            adjacency[edge.b].push(edge.a);
        }
        Self {
            adjacency,
            edge_count: edges.len(),
        }
    }

    /// Build the graph for `threshold` from a precomputed matrix.
    pub fn from_matrix(matrix: &SimilarityMatrix, threshold: f64) -> Self {
        let mut adjacency = vec![Vec::new(); matrix.len()];
        let mut edge_count = 0;
        for (a, b, score) in matrix.pairs() {
            if score >= threshold {
                adjacency[a].push(b);
                adjacency[b].push(a);
                edge_count += 1;
            }
        }
        Self {
            adjacency,
            edge_count,
        }
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn neighbors(&self, node: usize) -> &[usize] {
        &self.adjacency[node]
    }

    /// Connected components over nodes that have at least one edge.
    ///
    /// Isolated nodes never form a component. Members of each component
    /// are sorted ascending; components come out in order of their lowest
    /// member.
    pub fn connected_components(&self) -> Vec<Vec<usize>> {
        let mut visited = vec![false; self.adjacency.len()];
        let mut components = Vec::new();
        let mut queue = VecDeque::new();

        for start in 0..self.adjacency.len() {
            if visited[start] || self.adjacency[start].is_empty() {
                continue;
            }

            visited[start] = true;
            queue.push_back(start);
            let mut members = Vec::new();

            while let Some(node) = queue.pop_front() {
                members.push(node);
                for &next in &self.adjacency[node] {
                    if !visited[next] {
                        visited[next] = true;
                        queue.push_back(next);
                    }
                }
            }

            members.sort_unstable();
            components.push(members);
        }

        components
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// Unit vectors in the plane at the given angles (radians).
    fn planar(angles: &[f64]) -> Vec<Vec<f32>> {
        angles
            .iter()
            .map(|a| vec![a.cos() as f32, a.sin() as f32])
            .collect()
    }

    /// Four vectors reproducing AB 0.95, CD 0.90 and low cross scores.
    fn scenario_a_vectors() -> Vec<Vec<f32>> {
        // A, B close together; C, D close together; the pairs far apart
        vec![
            vec![1.0, 0.0, 0.0, 0.0],
            vec![0.95, 0.312_25, 0.0, 0.0],
            vec![0.0, 0.0, 1.0, 0.0],
            vec![0.0, 0.0, 0.9, 0.435_89],
        ]
    }

    #[test]
    fn test_scenario_a_two_components() {
        let vectors = scenario_a_vectors();
        let edges = build_edges(&vectors, 0.86);
        let pairs: Vec<(usize, usize)> = edges.iter().map(|e| (e.a, e.b)).collect();
        assert_eq!(pairs, vec![(0, 1), (2, 3)]);

        let graph = SimilarityGraph::from_edges(vectors.len(), &edges);
        assert_eq!(graph.connected_components(), vec![vec![0, 1], vec![2, 3]]);
    }

    #[test]
    fn test_threshold_equal_score_is_included() {
        let vectors = vec![vec![1.0, 0.0], vec![1.0, 0.0]];
        let score = cosine_similarity(&vectors[0], &vectors[1]);
        assert_eq!(build_edges(&vectors, score).len(), 1);
    }

    #[test]
    fn test_isolated_nodes_not_emitted() {
        let vectors = planar(&[0.0, 0.05, 1.5]);
        let graph = SimilarityGraph::from_edges(3, &build_edges(&vectors, 0.9));
        assert_eq!(graph.connected_components(), vec![vec![0, 1]]);
    }

    #[test]
    fn test_transitive_chain_forms_one_component() {
        // 0-1 and 1-2 are close, 0-2 is not
        let vectors = planar(&[0.0, 0.4, 0.8]);
        let edges = build_edges(&vectors, 0.9);
        assert_eq!(edges.len(), 2);
        let graph = SimilarityGraph::from_edges(3, &edges);
        assert_eq!(graph.connected_components(), vec![vec![0, 1, 2]]);
    }

    #[test]
    fn test_edge_sets_shrink_as_threshold_rises() {
        let vectors = planar(&[0.0, 0.1, 0.25, 0.45, 0.7, 1.2, 2.0]);
        let thresholds = [0.5, 0.7, 0.8, 0.9, 0.95, 0.99];
        let sets: Vec<HashSet<(usize, usize)>> = thresholds
            .iter()
            .map(|t| build_edges(&vectors, *t).iter().map(|e| (e.a, e.b)).collect())
            .collect();

        for window in sets.windows(2) {
            assert!(window[1].is_subset(&window[0]));
        }
    }

    #[test]
    fn test_matrix_graph_matches_direct_graph() {
        let vectors = planar(&[0.0, 0.1, 0.25, 0.45, 0.7, 1.2, 2.0]);
        let matrix = SimilarityMatrix::compute(&vectors);
        for threshold in [0.5, 0.8, 0.95] {
            let direct = build_edges(&vectors, threshold);
            assert_eq!(edges_from_matrix(&matrix, threshold), direct);

            let from_matrix = SimilarityGraph::from_matrix(&matrix, threshold);
            let from_edges = SimilarityGraph::from_edges(vectors.len(), &direct);
            assert_eq!(from_matrix.edge_count(), direct.len());
            assert_eq!(
                from_matrix.connected_components(),
                from_edges.connected_components()
            );
        }
    }

    #[test]
    fn test_components_partition_nodes() {
        let vectors = planar(&[0.0, 0.05, 1.0, 1.05, 2.0, 2.05, 3.0]);
        let graph = SimilarityGraph::from_matrix(&SimilarityMatrix::compute(&vectors), 0.99);
        let mut seen = HashSet::new();
        for component in graph.connected_components() {
            for member in component {
                assert!(seen.insert(member), "node {} in two components", member);
            }
        }
        assert_eq!(seen.len(), 6);
    }
}
