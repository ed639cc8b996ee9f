//! clonal_expansion
// Copyright (c) 2024 10x Genomics, Inc. All rights reserved.
#![expect(missing_docs)]

//! Aggregations over clonotype assignments: clonotype sizes, per-group expansion
//! summaries, per-cell expansion categories and group abundance tables.
//!
//! Every function is pure.  Labels map cell ids to clonotype labels; cells without
//! a label are simply absent.  Groups map cell ids to an external grouping key such
//! as the sample; cells without a group are left out of per-group results.

use serde::Serialize;
use std::collections::BTreeMap;

mod abundance;
mod expansion;

pub use abundance::{group_abundance, AbundanceRecord, AbundanceTable, Normalization};
pub use expansion::{clonal_expansion, ExpansionBins};

/// Number of cells per clonotype.
pub fn clonotype_sizes<'a>(labels: &BTreeMap<&'a str, &'a str>) -> BTreeMap<&'a str, usize> {
    let mut sizes = BTreeMap::new();
    for &label in labels.values() {
        *sizes.entry(label).or_insert(0) += 1;
    }
    sizes
}

/// Number of cells per clonotype within each group.
pub fn group_clonotype_sizes<'a>(
    labels: &BTreeMap<&'a str, &'a str>,
    groups: &BTreeMap<&'a str, &'a str>,
) -> BTreeMap<&'a str, BTreeMap<&'a str, usize>> {
    let mut sizes: BTreeMap<&str, BTreeMap<&str, usize>> = BTreeMap::new();
    for (cell, &label) in labels {
        if let Some(&group) = groups.get(cell) {
            *sizes.entry(group).or_default().entry(label).or_insert(0) += 1;
        }
    }
    sizes
}

/// Clonotype size statistics of one group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpansionSummary {
    pub n_cells: usize,
    pub n_clonotypes: usize,
    /// Clonotypes with a single cell.
    pub n_singletons: usize,
    /// Clonotypes with more than one cell.
    pub n_expanded: usize,
    /// Clonotype size -> number of clonotypes of that size.
    pub size_distribution: BTreeMap<usize, usize>,
}

impl ExpansionSummary {
    fn from_sizes<'a>(sizes: impl IntoIterator<Item = &'a usize>) -> Self {
        let mut summary = ExpansionSummary::default();
        for &size in sizes {
            summary.n_cells += size;
            summary.n_clonotypes += 1;
            if size == 1 {
                summary.n_singletons += 1;
            } else {
                summary.n_expanded += 1;
            }
            *summary.size_distribution.entry(size).or_insert(0) += 1;
        }
        summary
    }
}

/// Expansion summary of every group.  Clonotypes spanning several groups are
/// counted in each group with the cells they have there.
pub fn expansion_summary<'a>(
    labels: &BTreeMap<&'a str, &'a str>,
    groups: &BTreeMap<&'a str, &'a str>,
) -> BTreeMap<&'a str, ExpansionSummary> {
    group_clonotype_sizes(labels, groups)
        .into_iter()
        .map(|(group, sizes)| (group, ExpansionSummary::from_sizes(sizes.values())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    pub(crate) fn labels() -> BTreeMap<&'static str, &'static str> {
        [
            ("c1", "0"),
            ("c2", "0"),
            ("c3", "0"),
            ("c4", "1"),
            ("c5", "1"),
            ("c6", "2"),
        ]
        .into_iter()
        .collect()
    }

    pub(crate) fn groups() -> BTreeMap<&'static str, &'static str> {
        [
            ("c1", "s1"),
            ("c2", "s1"),
            ("c3", "s2"),
            ("c4", "s2"),
            ("c5", "s2"),
            ("neg", "s1"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_clonotype_sizes() {
        let sizes = clonotype_sizes(&labels());
        assert_eq!(sizes, BTreeMap::from([("0", 3), ("1", 2), ("2", 1)]));
    }

    #[test]
    fn test_group_clonotype_sizes() {
        let sizes = group_clonotype_sizes(&labels(), &groups());
        assert_eq!(sizes["s1"], BTreeMap::from([("0", 2)]));
        assert_eq!(sizes["s2"], BTreeMap::from([("0", 1), ("1", 2)]));
        // c6 has no group.
        assert_eq!(sizes.len(), 2);
    }

    #[test]
    fn test_expansion_summary() {
        let summary = expansion_summary(&labels(), &groups());
        assert_eq!(
            summary["s2"],
            ExpansionSummary {
                n_cells: 3,
                n_clonotypes: 2,
                n_singletons: 1,
                n_expanded: 1,
                size_distribution: BTreeMap::from([(1, 1), (2, 1)]),
            }
        );
        assert_eq!(summary["s1"].n_expanded, 1);
        assert_eq!(summary["s1"].n_singletons, 0);
    }

    #[test]
    fn test_from_clonotype_assignment() {
        use clonotype_assigner::define_clonotypes_from_observations;
        use ir_neighbors::{CancelToken, ClonotypeConfig};
        use ir_types::ChainObservation;

        let chain = |cell: &str, locus: &str, cdr3: &str| ChainObservation {
            cell_id: cell.to_string(),
            locus: Some(locus.to_string()),
            cdr3_aa: Some(cdr3.to_string()),
            ..Default::default()
        };
        let mut obs = Vec::new();
        for cell in ["a1", "a2", "a3", "b1"] {
            obs.push(chain(cell, "TRA", "CAVRDGNNKLIF"));
            obs.push(chain(cell, "TRB", "CASSLGVF"));
        }
        obs.push(chain("c1", "TRB", "CASSPGQF"));
        let (result, _) = define_clonotypes_from_observations(
            ["a1", "a2", "a3", "b1", "c1", "neg"],
            &obs,
            &ClonotypeConfig::default(),
            &CancelToken::new(),
        )
        .unwrap();
        let labels = result.labels();
        let groups = BTreeMap::from([
            ("a1", "s1"),
            ("a2", "s1"),
            ("a3", "s1"),
            ("b1", "s2"),
            ("c1", "s2"),
            ("neg", "s2"),
        ]);

        assert_eq!(clonotype_sizes(&labels), BTreeMap::from([("0", 4), ("1", 1)]));
        let summary = expansion_summary(&labels, &groups);
        assert_eq!(summary["s1"].size_distribution, BTreeMap::from([(3, 1)]));
        assert_eq!(summary["s2"].n_singletons, 2);

        let bins = ExpansionBins::default();
        let expansion = clonal_expansion(&labels, None, &bins);
        assert_eq!(expansion["b1"], "expanded (2-5)");
        assert_eq!(expansion["c1"], "not expanded");
        assert!(!expansion.contains_key("neg"));
        let within = clonal_expansion(&labels, Some(&groups), &bins);
        assert_eq!(within["b1"], "not expanded");

        let records: Vec<AbundanceRecord<'_>> = labels
            .iter()
            .map(|(cell, &label)| AbundanceRecord {
                group: groups.get(cell).copied(),
                target: Some(label),
                normalize_by: None,
            })
            .collect();
        let table = group_abundance(&records, Normalization::ByGroup);
        assert_eq!(table.targets, vec!["0", "1"]);
        assert_eq!(table.get("0", "s1"), Some(1.0));
        assert_eq!(table.get("0", "s2"), Some(0.5));
    }
}
