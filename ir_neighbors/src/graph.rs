// Copyright (c) 2024 10x Genomics, Inc. All rights reserved.

use petgraph::graph::{NodeIndex, UnGraph};

/// Sparse weighted graph over groups of cells with identical receptor keys.
///
/// Cells are numbered by their position in `cell_ids`, which is sorted.  Each node
/// holds its cells in increasing order, and nodes are ordered by their first
/// cell.  Edges are stored once, as `(i, j, weight)` with `i < j`, sorted.
/// Cells of the same node are implicitly connected with weight 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimilarityGraph {
    cell_ids: Vec<String>,
    nodes: Vec<Vec<usize>>,
    node_of_cell: Vec<usize>,
    edges: Vec<(usize, usize, u32)>,
}

impl SimilarityGraph {
    pub(crate) fn new(
        cell_ids: Vec<String>,
        nodes: Vec<Vec<usize>>,
        mut edges: Vec<(usize, usize, u32)>,
    ) -> Self {
        let mut node_of_cell = vec![0; cell_ids.len()];
        for (n, cells) in nodes.iter().enumerate() {
            for &c in cells {
                node_of_cell[c] = n;
            }
        }
        edges.sort_unstable();
        SimilarityGraph {
            cell_ids,
            nodes,
            node_of_cell,
            edges,
        }
    }

    /// The cells of the graph, sorted.  Cells without receptor chains are not included.
    pub fn cell_ids(&self) -> &[String] {
        &self.cell_ids
    }

    pub fn nodes(&self) -> &[Vec<usize>] {
        &self.nodes
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_of_cell(&self, cell: usize) -> usize {
        self.node_of_cell[cell]
    }

    pub fn edges(&self) -> &[(usize, usize, u32)] {
        &self.edges
    }

    pub fn n_edges(&self) -> usize {
        self.edges.len()
    }

    /// Cell ids of a node.
    pub fn node_cells(&self, node: usize) -> impl Iterator<Item = &str> + '_ {
        self.nodes[node].iter().map(|&c| self.cell_ids[c].as_str())
    }

    /// Neighbors of every node, with edge weights, sorted by node.
    pub fn adjacency(&self) -> Vec<Vec<(usize, u32)>> {
        let mut adj = vec![Vec::new(); self.nodes.len()];
        for &(i, j, w) in &self.edges {
            adj[i].push((j, w));
            adj[j].push((i, w));
        }
        for list in &mut adj {
            list.sort_unstable();
        }
        adj
    }

    /// Expand the graph to cell pairs: every pair within a node at weight 0, plus
    /// every pair across an edge.  Pairs are `(a, b, weight)` with `a < b` in cell
    /// id order, sorted.  Quadratic in node size.
    pub fn cell_edges(&self) -> Vec<(&str, &str, u32)> {
        let mut out = Vec::new();
        for cells in &self.nodes {
            for (k, &a) in cells.iter().enumerate() {
                for &b in &cells[k + 1..] {
                    out.push((a, b, 0));
                }
            }
        }
        for &(i, j, w) in &self.edges {
            for &a in &self.nodes[i] {
                for &b in &self.nodes[j] {
                    out.push((a.min(b), a.max(b), w));
                }
            }
        }
        out.sort_unstable();
        out.into_iter()
            .map(|(a, b, w)| (self.cell_ids[a].as_str(), self.cell_ids[b].as_str(), w))
            .collect()
    }

    /// Export as a petgraph graph.  Node weights are the member cell ids and node
    /// indices follow the node order of this graph.
    pub fn to_petgraph(&self) -> UnGraph<Vec<String>, u32> {
        let mut g = UnGraph::with_capacity(self.nodes.len(), self.edges.len());
        for n in 0..self.nodes.len() {
            g.add_node(self.node_cells(n).map(str::to_string).collect());
        }
        for &(i, j, w) in &self.edges {
            g.add_edge(NodeIndex::new(i), NodeIndex::new(j), w);
        }
        g
    }
}
