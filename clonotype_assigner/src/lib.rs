//! clonotype_assigner
// Copyright (c) 2024 10x Genomics, Inc. All rights reserved.
#![deny(missing_docs)]

//! Assign cells to clonotypes.
//!
//! The similarity graph of the cells is partitioned into clusters, either connected
//! components or label propagation communities, and every cluster gets a
//! deterministic label.  Cells without receptor chains get no label.

use ir_neighbors::{
    build_similarity_graph, CancelToken, ClonotypeConfig, ClonotypeError, ConfigurationError,
    SimilarityGraph,
};
use ir_types::{build_profiles, CellReceptorProfile, ChainObservation, RejectedRecord};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

mod cluster;
mod equiv;
mod label;

/// Clonotype assignment of one cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellAssignment {
    /// Clonotype label, None for cells without receptor chains.
    pub clonotype: Option<String>,
    /// The cell carries at least one receptor chain.
    pub has_ir: bool,
}

/// A clonotype and its member cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clonotype {
    /// Label, unique within one result.
    pub label: String,
    /// Sorted cell ids.
    pub cells: Vec<String>,
}

/// Outcome of clonotype definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClonotypeResult {
    /// Every input cell.
    pub assignments: BTreeMap<String, CellAssignment>,
    /// Ordered by decreasing size, then smallest member.
    pub clonotypes: Vec<Clonotype>,
    /// The graph the clonotypes were derived from.
    pub graph: SimilarityGraph,
}

impl ClonotypeResult {
    /// Cell id to clonotype label, cells without a label left out.
    pub fn labels(&self) -> BTreeMap<&str, &str> {
        self.assignments
            .iter()
            .filter_map(|(cell, a)| Some((cell.as_str(), a.clonotype.as_deref()?)))
            .collect()
    }
}

/// Define clonotypes for a set of cell profiles.
///
/// The configuration is validated before any work starts.  With `threads` set, the
/// computation runs on a dedicated thread pool of that size; the result does not
/// depend on it.
pub fn define_clonotypes(
    profiles: &[CellReceptorProfile],
    config: &ClonotypeConfig,
    cancel: &CancelToken,
) -> Result<ClonotypeResult, ClonotypeError> {
    config.validate()?;
    match config.threads {
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| ConfigurationError::ThreadPool {
                    threads,
                    reason: e.to_string(),
                })?;
            pool.install(|| run(profiles, config, cancel))
        }
        None => run(profiles, config, cancel),
    }
}

/// Build profiles from raw chain observations, then define clonotypes.
///
/// Records that cannot be used are returned alongside the result.  Chains flagged
/// non-productive are skipped when `productive_only` is set.
pub fn define_clonotypes_from_observations<'a>(
    cell_ids: impl IntoIterator<Item = &'a str>,
    observations: &[ChainObservation],
    config: &ClonotypeConfig,
    cancel: &CancelToken,
) -> Result<(ClonotypeResult, Vec<RejectedRecord>), ClonotypeError> {
    config.validate()?;
    let set = build_profiles(cell_ids, observations, config.productive_only);
    if !set.rejected.is_empty() {
        info!("{} chain records rejected", set.rejected.len());
    }
    let result = define_clonotypes(&set.profiles, config, cancel)?;
    Ok((result, set.rejected))
}

fn run(
    profiles: &[CellReceptorProfile],
    config: &ClonotypeConfig,
    cancel: &CancelToken,
) -> Result<ClonotypeResult, ClonotypeError> {
    let graph = build_similarity_graph(profiles, config, cancel)?;
    cancel.check()?;

    let clusters: Vec<Vec<String>> =
        cluster::cluster_nodes(&graph, config.partitions, config.n_iterations)
            .into_iter()
            .map(|nodes| {
                let mut cells: Vec<String> = nodes
                    .iter()
                    .flat_map(|&n| graph.node_cells(n).map(str::to_string))
                    .collect();
                cells.sort();
                cells
            })
            .collect();
    let clonotypes: Vec<Clonotype> = label::label_clusters(clusters, config.label_scheme)
        .into_iter()
        .map(|(label, cells)| Clonotype { label, cells })
        .collect();
    info!(
        "{} cells assigned to {} clonotypes",
        graph.cell_ids().len(),
        clonotypes.len()
    );

    let mut assignments: BTreeMap<String, CellAssignment> = profiles
        .iter()
        .map(|p| {
            (
                p.cell_id.clone(),
                CellAssignment {
                    clonotype: None,
                    has_ir: p.has_ir(),
                },
            )
        })
        .collect();
    for clonotype in &clonotypes {
        for cell in &clonotype.cells {
            if let Some(a) = assignments.get_mut(cell) {
                a.clonotype = Some(clonotype.label.clone());
            }
        }
    }

    Ok(ClonotypeResult {
        assignments,
        clonotypes,
        graph,
    })
}
