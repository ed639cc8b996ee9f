// Copyright (c) 2024 10x Genomics, Inc. All rights reserved.

// Partition the node graph into clusters.

use crate::equiv::EquivRel;
use ir_neighbors::{Partitions, SimilarityGraph};
use log::debug;

/// Clusters of nodes, each sorted, ordered by smallest node.
pub fn cluster_nodes(
    graph: &SimilarityGraph,
    partitions: Partitions,
    n_iterations: usize,
) -> Vec<Vec<usize>> {
    match partitions {
        Partitions::Connected => connected_components(graph),
        Partitions::LabelPropagation => label_propagation(graph, n_iterations),
    }
}

pub fn connected_components(graph: &SimilarityGraph) -> Vec<Vec<usize>> {
    let mut eq = EquivRel::new(graph.n_nodes());
    for &(i, j, _) in graph.edges() {
        eq.join(i, j);
    }
    eq.classes()
}

/// Refine connected components by weighted label propagation.
///
/// Every node starts with its own label.  Nodes are visited in increasing order and
/// adopt the label with the highest score among themselves and their neighbors,
/// where a neighbor m contributes size(m) / (1 + w) for an edge of weight w and the
/// node itself contributes its own size.  Ties go to the smallest label.  Sweeps
/// stop when no label changes or after `n_iterations`.  Clusters are the connected
/// pieces of each label class, so they never span two components.
pub fn label_propagation(graph: &SimilarityGraph, n_iterations: usize) -> Vec<Vec<usize>> {
    let adj = graph.adjacency();
    let sizes: Vec<f64> = graph.nodes().iter().map(|cells| cells.len() as f64).collect();
    let mut labels: Vec<usize> = (0..graph.n_nodes()).collect();

    for sweep in 0..n_iterations {
        let mut changed = 0;
        for n in 0..labels.len() {
            if adj[n].is_empty() {
                continue;
            }
            let mut scores: Vec<(usize, f64)> = Vec::with_capacity(adj[n].len() + 1);
            scores.push((labels[n], sizes[n]));
            for &(m, w) in &adj[n] {
                scores.push((labels[m], sizes[m] / (1.0 + f64::from(w))));
            }
            scores.sort_by_key(|&(label, _)| label);
            let mut best = (labels[n], f64::NEG_INFINITY);
            let mut k = 0;
            while k < scores.len() {
                let label = scores[k].0;
                let mut total = 0.0;
                while k < scores.len() && scores[k].0 == label {
                    total += scores[k].1;
                    k += 1;
                }
                // Labels arrive in increasing order, so strict comparison keeps the
                // smallest label on ties.
                if total > best.1 {
                    best = (label, total);
                }
            }
            if best.0 != labels[n] {
                labels[n] = best.0;
                changed += 1;
            }
        }
        debug!("label propagation sweep {}: {} labels changed", sweep + 1, changed);
        if changed == 0 {
            break;
        }
    }

    let mut eq = EquivRel::new(graph.n_nodes());
    for &(i, j, _) in graph.edges() {
        if labels[i] == labels[j] {
            eq.join(i, j);
        }
    }
    eq.classes()
}
