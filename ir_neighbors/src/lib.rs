//! ir_neighbors
// Copyright (c) 2024 10x Genomics, Inc. All rights reserved.
#![expect(missing_docs)]

//! Similarity graph over cells: which cells have receptors within the distance
//! cutoff of each other, under the configured matching rules.
//!
//! The work is split in three phases, each parallel with rayon:
//! 1. per chain category, validate the distinct CDR3 sequences and find every pair
//!    of sequences within the cutoff ([`SequenceIndex`]);
//! 2. group cells with identical receptor keys into nodes;
//! 3. evaluate the node pairs that share a sequence or a neighboring sequence.

use ir_types::{CellReceptorProfile, ChainCategory};
use itertools::Itertools;
use log::{debug, info};
use rayon::prelude::*;
use std::collections::BTreeMap;

mod cancel;
pub mod config;
mod errors;
mod graph;
mod index;
mod key;

pub use cancel::CancelToken;
pub use config::{
    ClonotypeConfig, ConfigurationError, DualChainPolicy, LabelScheme, Partitions, ReceptorArms,
    ReceptorTypeFilter,
};
pub use errors::ClonotypeError;
pub use graph::SimilarityGraph;
pub use index::{SeqId, SequenceIndex};
pub use key::{ArmKey, KeyEvaluator, ReceptorKey};

/// Number of nodes evaluated between two cancellation checks.
const NODE_BATCH: usize = 512;

/// Build the similarity graph of the cells that carry at least one receptor chain.
///
/// The configuration is validated first.  The result only depends on cell ids and
/// sequence content, not on the input order or on the number of threads.
pub fn build_similarity_graph(
    profiles: &[CellReceptorProfile],
    config: &ClonotypeConfig,
    cancel: &CancelToken,
) -> Result<SimilarityGraph, ClonotypeError> {
    config.validate()?;

    let profiles: Vec<&CellReceptorProfile> = profiles
        .iter()
        .filter(|p| p.has_ir())
        .sorted_by(|a, b| a.cell_id.cmp(&b.cell_id))
        .collect();
    info!(
        "building similarity graph for {} cells with receptor chains",
        profiles.len()
    );

    let calc = config.metric.calculator();
    let mut indexes = Vec::with_capacity(2);
    for category in ChainCategory::all() {
        let cutoff = config.cutoff_for(category);
        let seqs = profiles.iter().flat_map(|p| {
            p.slots(category)
                .chains()
                .iter()
                .take(2)
                .filter_map(|c| c.cdr3(config.sequence_field))
        });
        let index = SequenceIndex::build(
            category,
            seqs,
            config.sequence_field,
            calc.as_ref(),
            cutoff,
            cancel,
        )?;
        debug!(
            "{}: {} unique sequences, {} pairs within cutoff {}",
            category,
            index.len(),
            index.n_neighbor_pairs(),
            cutoff
        );
        indexes.push(index);
    }
    let evaluator = KeyEvaluator {
        config,
        indexes: [&indexes[0], &indexes[1]],
    };

    let nodes = group_nodes(&profiles, &evaluator);
    debug!("{} cells collapse to {} nodes", profiles.len(), nodes.len());
    let edges = node_edges(&nodes, &evaluator, cancel)?;
    info!("similarity graph has {} nodes and {} edges", nodes.len(), edges.len());

    Ok(SimilarityGraph::new(
        profiles.iter().map(|p| p.cell_id.clone()).collect(),
        nodes.into_iter().map(|(_, cells)| cells).collect(),
        edges,
    ))
}

/// Group cells with equal keys.  A key that does not match itself cannot stand for
/// more than one cell, so such cells each get their own node.  Nodes are ordered by
/// their first cell.
fn group_nodes(
    profiles: &[&CellReceptorProfile],
    evaluator: &KeyEvaluator<'_>,
) -> Vec<(ReceptorKey, Vec<usize>)> {
    let keys: Vec<ReceptorKey> = profiles.par_iter().map(|p| evaluator.key(p)).collect();
    let mut groups: BTreeMap<&ReceptorKey, Vec<usize>> = BTreeMap::new();
    for (cell, key) in keys.iter().enumerate() {
        groups.entry(key).or_default().push(cell);
    }
    let mut nodes = Vec::with_capacity(groups.len());
    for (key, cells) in groups {
        if evaluator.evaluate(key, key).is_some() {
            nodes.push((key.clone(), cells));
        } else {
            nodes.extend(cells.into_iter().map(|c| (key.clone(), vec![c])));
        }
    }
    nodes.sort_by_key(|(_, cells)| cells[0]);
    nodes
}

/// Evaluate every candidate node pair.  Two nodes are candidates if, in a compared
/// category, they share a sequence or hold neighboring sequences; every edge needs
/// such a slot pair, so nothing is missed.
fn node_edges(
    nodes: &[(ReceptorKey, Vec<usize>)],
    evaluator: &KeyEvaluator<'_>,
    cancel: &CancelToken,
) -> Result<Vec<(usize, usize, u32)>, ClonotypeError> {
    let categories = evaluator.config.receptor_arms.categories();

    // Per category, sequence id -> nodes.  The slot past the last id collects nodes
    // with a missing primary sequence.
    let postings: Vec<Vec<Vec<usize>>> = categories
        .iter()
        .map(|&category| {
            let index = evaluator.indexes[key::arm_index(category)];
            let missing = index.len();
            let mut posting = vec![Vec::new(); missing + 1];
            for (n, (k, _)) in nodes.iter().enumerate() {
                for id in evaluator.postings(k, category) {
                    posting[id.map_or(missing, |id| id as usize)].push(n);
                }
            }
            posting
        })
        .collect();

    let node_ids: Vec<usize> = (0..nodes.len()).collect();
    let shards: Vec<Vec<(usize, usize, u32)>> = node_ids
        .par_chunks(NODE_BATCH)
        .map(|batch| {
            cancel.check()?;
            let mut shard = Vec::new();
            for &i in batch {
                let key = &nodes[i].0;
                let mut candidates: Vec<usize> = Vec::new();
                for (&category, posting) in categories.iter().zip(&postings) {
                    let index = evaluator.indexes[key::arm_index(category)];
                    for id in evaluator.postings(key, category) {
                        match id {
                            Some(id) => {
                                candidates.extend(&posting[id as usize]);
                                for &(nb, _) in index.neighbors(id) {
                                    candidates.extend(&posting[nb as usize]);
                                }
                            }
                            None => candidates.extend(&posting[index.len()]),
                        }
                    }
                }
                candidates.retain(|&j| j > i);
                candidates.sort_unstable();
                candidates.dedup();
                for j in candidates {
                    if let Some(w) = evaluator.evaluate(key, &nodes[j].0) {
                        shard.push((i, j, w));
                    }
                }
            }
            Ok(shard)
        })
        .collect::<Result<_, ClonotypeError>>()?;

    let mut edges: Vec<_> = shards.into_iter().flatten().collect();
    edges.sort_unstable();
    Ok(edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir_dist::{DistanceMetric, MissingMatchPolicy};
    use ir_types::{build_profiles, ChainObservation};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn obs(cell: &str, locus: &str, cdr3: &str) -> ChainObservation {
        ChainObservation {
            cell_id: cell.to_string(),
            locus: Some(locus.to_string()),
            cdr3_aa: Some(cdr3.to_string()),
            ..Default::default()
        }
    }

    fn profiles(records: &[(&str, &str, &str)]) -> Vec<CellReceptorProfile> {
        let obs: Vec<_> = records
            .iter()
            .map(|&(cell, locus, cdr3)| obs(cell, locus, cdr3))
            .collect();
        let set = build_profiles(std::iter::empty(), &obs, false);
        assert!(set.rejected.is_empty());
        set.profiles
    }

    fn graph(records: &[(&str, &str, &str)], config: &ClonotypeConfig) -> SimilarityGraph {
        build_similarity_graph(&profiles(records), config, &CancelToken::new()).unwrap()
    }

    const CELLS: [(&str, &str, &str); 9] = [
        ("c1", "TRA", "CAVA"),
        ("c1", "TRB", "CASSLGVF"),
        ("c2", "TRA", "CAVA"),
        ("c2", "TRB", "CASSLGVF"),
        ("c3", "TRA", "CAVA"),
        ("c3", "TRB", "CASSLGAF"),
        ("c4", "TRB", "CASSLGVF"),
        ("c5", "TRA", "CAVA"),
        ("c5", "TRB", "CASSLGVFA"),
    ];

    #[test]
    fn test_strict_nodes() {
        let g = graph(&CELLS, &ClonotypeConfig::default());
        assert_eq!(g.cell_ids(), &["c1", "c2", "c3", "c4", "c5"]);
        assert_eq!(g.nodes(), &[vec![0, 1], vec![2], vec![3], vec![4]]);
        assert!(g.edges().is_empty());
    }

    #[test]
    fn test_hamming_edges() {
        let g = graph(&CELLS, &ClonotypeConfig::with_metric(DistanceMetric::Hamming, 1));
        assert_eq!(g.edges(), &[(0, 1, 1)]);
    }

    #[test]
    fn test_levenshtein_edges() {
        let g = graph(
            &CELLS,
            &ClonotypeConfig::with_metric(DistanceMetric::Levenshtein, 1),
        );
        assert_eq!(g.edges(), &[(0, 1, 1), (0, 3, 1)]);
    }

    #[test]
    fn test_any_arm_links_orphan() {
        let config = ClonotypeConfig {
            receptor_arms: ReceptorArms::Any,
            ..Default::default()
        };
        let g = graph(&CELLS, &config);
        // One identical arm is enough: c3 and c5 share the VJ chain of c1 and c2, c4
        // only has their VDJ chain.
        assert_eq!(g.edges(), &[(0, 1, 0), (0, 2, 0), (0, 3, 0), (1, 3, 0)]);
    }

    #[test]
    fn test_ir_negative_cells_are_excluded() {
        let mut p = profiles(&CELLS);
        p.push(CellReceptorProfile::empty("c0"));
        let g = build_similarity_graph(&p, &ClonotypeConfig::default(), &CancelToken::new())
            .unwrap();
        assert!(!g.cell_ids().contains(&"c0".to_string()));
    }

    #[test]
    fn test_missing_sequences() {
        let mut p = profiles(&[("a", "TRA", "CAVA"), ("b", "TRA", "CAVA")]);
        // Both cells also have a VDJ chain without a CDR3.
        let extra = [obs("a", "TRB", ""), obs("b", "TRB", "")];
        for (profile, o) in p.iter_mut().zip(&extra) {
            let mut chains = profile.vj.chains().to_vec();
            chains.push(ir_types::Chain::from_observation(o).unwrap());
            *profile = CellReceptorProfile::from_chains(profile.cell_id.clone(), chains);
        }
        let strict = build_similarity_graph(&p, &ClonotypeConfig::default(), &CancelToken::new())
            .unwrap();
        assert_eq!(strict.nodes(), &[vec![0], vec![1]]);
        assert!(strict.edges().is_empty());

        let config = ClonotypeConfig {
            missing_match_policy: MissingMatchPolicy::MatchIfBothMissing,
            ..Default::default()
        };
        let g = build_similarity_graph(&p, &config, &CancelToken::new()).unwrap();
        assert_eq!(g.nodes(), &[vec![0, 1]]);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let config = ClonotypeConfig::with_metric(DistanceMetric::Levenshtein, 2);
        let mut p = profiles(&CELLS);
        let g1 = build_similarity_graph(&p, &config, &CancelToken::new()).unwrap();
        p.reverse();
        let g2 = build_similarity_graph(&p, &config, &CancelToken::new()).unwrap();
        assert_eq!(g1, g2);
    }

    #[test]
    fn test_invalid_configuration() {
        let config = ClonotypeConfig {
            cutoff: 2,
            ..Default::default()
        };
        let res = build_similarity_graph(&profiles(&CELLS), &config, &CancelToken::new());
        assert!(matches!(res, Err(ClonotypeError::Configuration(_))));
    }

    #[test]
    fn test_invalid_sequence() {
        let res = build_similarity_graph(
            &profiles(&[("a", "TRB", "CASS*F")]),
            &ClonotypeConfig::default(),
            &CancelToken::new(),
        );
        assert!(matches!(res, Err(ClonotypeError::SequenceComparison(_))));
    }

    #[test]
    fn test_cancelled() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let res = build_similarity_graph(&profiles(&CELLS), &ClonotypeConfig::default(), &cancel);
        assert_eq!(res, Err(ClonotypeError::Cancelled));
    }

    fn brute_force_edges(
        p: &[CellReceptorProfile],
        config: &ClonotypeConfig,
    ) -> Vec<(usize, usize, u32)> {
        let g = build_similarity_graph(p, config, &CancelToken::new()).unwrap();
        let calc = config.metric.calculator();
        let mut indexes = Vec::new();
        for category in ChainCategory::all() {
            let seqs = p.iter().flat_map(|p| {
                p.slots(category)
                    .chains()
                    .iter()
                    .filter_map(|c| c.cdr3(config.sequence_field))
            });
            indexes.push(
                SequenceIndex::build(
                    category,
                    seqs,
                    config.sequence_field,
                    calc.as_ref(),
                    config.cutoff_for(category),
                    &CancelToken::new(),
                )
                .unwrap(),
            );
        }
        let ev = KeyEvaluator {
            config,
            indexes: [&indexes[0], &indexes[1]],
        };
        let keys: Vec<_> = g
            .nodes()
            .iter()
            .map(|cells| {
                let id = &g.cell_ids()[cells[0]];
                ev.key(p.iter().find(|p| &p.cell_id == id).unwrap())
            })
            .collect();
        let mut edges = Vec::new();
        for i in 0..keys.len() {
            for j in i + 1..keys.len() {
                if let Some(w) = ev.evaluate(&keys[i], &keys[j]) {
                    edges.push((i, j, w));
                }
            }
        }
        edges
    }

    fn arb_records() -> impl Strategy<Value = Vec<(usize, bool, String)>> {
        prop::collection::vec((0usize..12, any::<bool>(), "[AC]{3,5}"), 1..30)
    }

    fn to_profiles(records: &[(usize, bool, String)]) -> Vec<CellReceptorProfile> {
        let obs: Vec<_> = records
            .iter()
            .map(|(cell, vj, cdr3)| {
                obs(&format!("cell{cell:02}"), if *vj { "TRA" } else { "TRB" }, cdr3)
            })
            .collect();
        build_profiles(std::iter::empty(), &obs, false).profiles
    }

    proptest! {
        #[test]
        fn prop_candidates_match_brute_force(
            records in arb_records(),
            cutoff in 0u32..3,
            any_arm in any::<bool>(),
        ) {
            let p = to_profiles(&records);
            let config = ClonotypeConfig {
                receptor_arms: if any_arm { ReceptorArms::Any } else { ReceptorArms::All },
                ..ClonotypeConfig::with_metric(DistanceMetric::Levenshtein, cutoff)
            };
            let g = build_similarity_graph(&p, &config, &CancelToken::new()).unwrap();
            prop_assert_eq!(g.edges().to_vec(), brute_force_edges(&p, &config));
        }

        #[test]
        fn prop_raising_cutoff_keeps_cell_pairs(
            records in arb_records(),
            cutoff in 0u32..2,
        ) {
            let p = to_profiles(&records);
            let low = ClonotypeConfig::with_metric(DistanceMetric::Hamming, cutoff);
            let high = ClonotypeConfig::with_metric(DistanceMetric::Hamming, cutoff + 1);
            let cancel = CancelToken::new();
            let low = build_similarity_graph(&p, &low, &cancel).unwrap();
            let high = build_similarity_graph(&p, &high, &cancel).unwrap();
            let high_pairs: BTreeMap<_, _> = high
                .cell_edges()
                .into_iter()
                .map(|(a, b, w)| ((a, b), w))
                .collect();
            for (a, b, w) in low.cell_edges() {
                prop_assert_eq!(high_pairs.get(&(a, b)), Some(&w));
            }
        }
    }
}
