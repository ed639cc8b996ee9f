// Copyright (c) 2024 10x Genomics, Inc. All rights reserved.

// Unique CDR3 sequences of one chain category and their neighbors within the cutoff.

use crate::{CancelToken, ClonotypeError};
use ir_dist::{validate_sequence, LengthWindow, SequenceDistance};
use ir_types::{ChainCategory, SequenceField};
use itertools::Itertools;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};

/// Number of query sequences handled between two cancellation checks.
const QUERY_BATCH: usize = 256;

/// Sequence id: position in the sorted list of unique sequences.
pub type SeqId = u32;

pub struct SequenceIndex {
    category: ChainCategory,
    cutoff: u32,
    seqs: Vec<String>,
    ids: HashMap<String, SeqId>,
    /// For every sequence, the other sequences within the cutoff, sorted by id.
    neighbors: Vec<Vec<(SeqId, u32)>>,
}

impl SequenceIndex {
    /// Validate the distinct sequences and compute all pairs within `cutoff`.
    ///
    /// With cutoff 0 only identical sequences can match, which the id comparison
    /// already covers, so no neighbor search is run.
    pub fn build<'a>(
        category: ChainCategory,
        seqs: impl IntoIterator<Item = &'a str>,
        field: SequenceField,
        calc: &dyn SequenceDistance,
        cutoff: u32,
        cancel: &CancelToken,
    ) -> Result<SequenceIndex, ClonotypeError> {
        let seqs: Vec<String> = seqs
            .into_iter()
            .sorted()
            .dedup()
            .map(str::to_string)
            .collect();
        if let Some(err) = seqs
            .par_iter()
            .find_map_first(|s| validate_sequence(s, field).err())
        {
            return Err(err.into());
        }
        cancel.check()?;

        let ids: HashMap<String, SeqId> = seqs
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i as SeqId))
            .collect();
        let mut neighbors = vec![Vec::new(); seqs.len()];
        if cutoff > 0 {
            for (a, b, d) in neighbor_pairs(&seqs, calc, cutoff, cancel)? {
                neighbors[a as usize].push((b, d));
                neighbors[b as usize].push((a, d));
            }
            for list in &mut neighbors {
                list.sort_unstable();
            }
        }
        Ok(SequenceIndex {
            category,
            cutoff,
            seqs,
            ids,
            neighbors,
        })
    }

    pub fn category(&self) -> ChainCategory {
        self.category
    }

    pub fn cutoff(&self) -> u32 {
        self.cutoff
    }

    pub fn len(&self) -> usize {
        self.seqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }

    pub fn id(&self, seq: &str) -> Option<SeqId> {
        self.ids.get(seq).copied()
    }

    pub fn seq(&self, id: SeqId) -> &str {
        &self.seqs[id as usize]
    }

    pub fn neighbors(&self, id: SeqId) -> &[(SeqId, u32)] {
        &self.neighbors[id as usize]
    }

    /// Number of unordered sequence pairs within the cutoff, identity excluded.
    pub fn n_neighbor_pairs(&self) -> usize {
        self.neighbors.iter().map(Vec::len).sum::<usize>() / 2
    }

    /// Distance between two indexed sequences, or None if it exceeds the cutoff.
    pub fn distance(&self, a: SeqId, b: SeqId) -> Option<u32> {
        if a == b {
            return Some(0);
        }
        let list = self.neighbors(a);
        list.binary_search_by_key(&b, |&(id, _)| id)
            .ok()
            .map(|pos| list[pos].1)
    }
}

/// All pairs (a, b, d) with a < b and d <= cutoff, in a canonical order.
fn neighbor_pairs(
    seqs: &[String],
    calc: &dyn SequenceDistance,
    cutoff: u32,
    cancel: &CancelToken,
) -> Result<Vec<(SeqId, SeqId, u32)>, ClonotypeError> {
    let mut by_len: BTreeMap<usize, Vec<SeqId>> = BTreeMap::new();
    for (i, s) in seqs.iter().enumerate() {
        by_len.entry(s.len()).or_default().push(i as SeqId);
    }
    let window = calc.length_window(cutoff);

    let queries: Vec<SeqId> = (0..seqs.len() as SeqId).collect();
    let shards: Vec<Vec<(SeqId, SeqId, u32)>> = queries
        .par_chunks(QUERY_BATCH)
        .map(|batch| {
            cancel.check()?;
            let mut shard = Vec::new();
            for &a in batch {
                let query = seqs[a as usize].as_bytes();
                let len = query.len();
                let (lo, hi) = match window {
                    LengthWindow::Exact => (len, len),
                    LengthWindow::Within(w) => (len.saturating_sub(w as usize), len + w as usize),
                    LengthWindow::Unbounded => (0, usize::MAX),
                };
                for (_, bucket) in by_len.range(lo..=hi) {
                    for &b in bucket.iter().filter(|&&b| b > a) {
                        if let Some(d) = calc.distance(query, seqs[b as usize].as_bytes(), cutoff)
                        {
                            shard.push((a, b, d));
                        }
                    }
                }
            }
            Ok(shard)
        })
        .collect::<Result<_, ClonotypeError>>()?;

    // Shards arrive in batch order, but sort anyway so the result never depends on
    // how the work was split.
    let mut pairs: Vec<_> = shards.into_iter().flatten().collect();
    pairs.sort_unstable();
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir_dist::DistanceMetric;
    use pretty_assertions::assert_eq;

    fn index(seqs: &[&str], metric: DistanceMetric, cutoff: u32) -> SequenceIndex {
        SequenceIndex::build(
            ChainCategory::VDJ,
            seqs.iter().copied(),
            SequenceField::AminoAcid,
            metric.calculator().as_ref(),
            cutoff,
            &CancelToken::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_unique_sorted() {
        let idx = index(&["CASSD", "CASSA", "CASSD"], DistanceMetric::Identity, 0);
        assert_eq!(idx.len(), 2);
        assert_eq!(idx.id("CASSA"), Some(0));
        assert_eq!(idx.seq(1), "CASSD");
        assert_eq!(idx.id("CAS"), None);
        assert_eq!(idx.n_neighbor_pairs(), 0);
        assert_eq!(idx.distance(0, 0), Some(0));
        assert_eq!(idx.distance(0, 1), None);
    }

    #[test]
    fn test_hamming_neighbors() {
        let idx = index(
            &["CASSLGVF", "CASSLGAF", "CASSLGAA", "CASSLGVFA"],
            DistanceMetric::Hamming,
            1,
        );
        let vf = idx.id("CASSLGVF").unwrap();
        let af = idx.id("CASSLGAF").unwrap();
        let aa = idx.id("CASSLGAA").unwrap();
        let vfa = idx.id("CASSLGVFA").unwrap();
        assert_eq!(idx.distance(vf, af), Some(1));
        assert_eq!(idx.distance(af, vf), Some(1));
        assert_eq!(idx.distance(af, aa), Some(1));
        assert_eq!(idx.distance(vf, aa), None);
        assert_eq!(idx.distance(vf, vfa), None);
        assert_eq!(idx.n_neighbor_pairs(), 2);
    }

    #[test]
    fn test_levenshtein_crosses_lengths() {
        let idx = index(&["CASSLGVF", "CASSLGVFA", "CASSLG"], DistanceMetric::Levenshtein, 1);
        let a = idx.id("CASSLGVF").unwrap();
        let b = idx.id("CASSLGVFA").unwrap();
        let c = idx.id("CASSLG").unwrap();
        assert_eq!(idx.distance(a, b), Some(1));
        assert_eq!(idx.distance(a, c), None);
        assert_eq!(idx.neighbors(a), &[(b, 1)]);
    }

    #[test]
    fn test_matches_brute_force() {
        let seqs = [
            "CASSL", "CASSLG", "CASRL", "CAGSL", "CASSLGG", "CSSL", "CASSLE", "CATSLG", "AASSL",
        ];
        for metric in [
            DistanceMetric::Hamming,
            DistanceMetric::Levenshtein,
            DistanceMetric::Alignment,
        ] {
            let cutoff = if metric == DistanceMetric::Alignment { 15 } else { 2 };
            let idx = index(&seqs, metric, cutoff);
            let calc = metric.calculator();
            for a in 0..idx.len() as SeqId {
                for b in 0..idx.len() as SeqId {
                    let expected =
                        calc.distance(idx.seq(a).as_bytes(), idx.seq(b).as_bytes(), cutoff);
                    assert_eq!(idx.distance(a, b), expected, "{metric} {a} {b}");
                }
            }
        }
    }

    #[test]
    fn test_invalid_character() {
        let res = SequenceIndex::build(
            ChainCategory::VJ,
            ["CASS", "CA*S", "CA#S"],
            SequenceField::AminoAcid,
            DistanceMetric::Identity.calculator().as_ref(),
            0,
            &CancelToken::new(),
        );
        match res {
            Err(ClonotypeError::SequenceComparison(err)) => {
                // The first invalid sequence in sorted order is reported.
                assert!(err.to_string().contains("CA#S"), "{err}");
            }
            _ => panic!("expected a sequence comparison error"),
        }
    }

    #[test]
    fn test_cancelled() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let res = SequenceIndex::build(
            ChainCategory::VJ,
            ["CASS", "CASR"],
            SequenceField::AminoAcid,
            DistanceMetric::Hamming.calculator().as_ref(),
            1,
            &cancel,
        );
        assert!(matches!(res, Err(ClonotypeError::Cancelled)));
    }
}
