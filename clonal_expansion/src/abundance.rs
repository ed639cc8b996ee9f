// Copyright (c) 2024 10x Genomics, Inc. All rights reserved.

// How many cells of each target category (typically the clonotype) each group holds.

use itertools::Itertools;
use log::debug;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// One cell.  Cells with a missing group or target are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AbundanceRecord<'a> {
    pub group: Option<&'a str>,
    pub target: Option<&'a str>,
    /// Only used with [`Normalization::ByKey`].
    pub normalize_by: Option<&'a str>,
}

/// How cells are weighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Normalization {
    /// Every cell counts 1.
    #[default]
    None,
    /// A cell counts 1 / (number of cells in its group), giving fractions per group.
    ByGroup,
    /// A cell counts 1 / (number of cells sharing its `normalize_by` key).  Cells
    /// without a key are ignored.
    ByKey,
}

/// Targets in rows, groups in columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AbundanceTable {
    /// Ordered by decreasing weighted total, then name.
    pub targets: Vec<String>,
    /// Ordered by decreasing number of cells, then name.
    pub groups: Vec<String>,
    /// weighted[target][group]
    pub weighted: Vec<Vec<f64>>,
    /// counts[target][group], unweighted.
    pub counts: Vec<Vec<usize>>,
}

impl AbundanceTable {
    pub fn get(&self, target: &str, group: &str) -> Option<f64> {
        let t = self.targets.iter().position(|x| x == target)?;
        let g = self.groups.iter().position(|x| x == group)?;
        Some(self.weighted[t][g])
    }
}

/// Count cells per (target, group), weighted according to `normalization`.
pub fn group_abundance(
    records: &[AbundanceRecord<'_>],
    normalization: Normalization,
) -> AbundanceTable {
    let usable: Vec<(&str, &str, Option<&str>)> = records
        .iter()
        .filter_map(|r| {
            let key = match normalization {
                Normalization::ByKey => Some(r.normalize_by?),
                _ => None,
            };
            Some((r.group?, r.target?, key))
        })
        .collect();
    debug!(
        "group abundance: {} of {} records usable",
        usable.len(),
        records.len()
    );

    let mut scale: BTreeMap<&str, usize> = BTreeMap::new();
    for &(group, _, key) in &usable {
        let k = match normalization {
            Normalization::None => continue,
            Normalization::ByGroup => group,
            Normalization::ByKey => key.unwrap_or_default(),
        };
        *scale.entry(k).or_insert(0) += 1;
    }

    let mut cells: BTreeMap<(&str, &str), (usize, f64)> = BTreeMap::new();
    for &(group, target, key) in &usable {
        let weight = match normalization {
            Normalization::None => 1.0,
            Normalization::ByGroup => 1.0 / scale[group] as f64,
            Normalization::ByKey => 1.0 / scale[key.unwrap_or_default()] as f64,
        };
        let e = cells.entry((target, group)).or_insert((0, 0.0));
        e.0 += 1;
        e.1 += weight;
    }

    let targets: BTreeSet<&str> = cells.keys().map(|&(t, _)| t).collect();
    let groups: BTreeSet<&str> = cells.keys().map(|&(_, g)| g).collect();
    let target_total = |t: &str| -> f64 {
        groups
            .iter()
            .filter_map(|&g| cells.get(&(t, g)))
            .map(|c| c.1)
            .sum()
    };
    let group_total = |g: &str| -> usize {
        targets
            .iter()
            .filter_map(|&t| cells.get(&(t, g)))
            .map(|c| c.0)
            .sum()
    };

    // BTreeSet iteration is sorted, and sorted_by is stable, so names break ties.
    let targets: Vec<&str> = targets
        .iter()
        .copied()
        .sorted_by(|&a, &b| {
            target_total(b)
                .partial_cmp(&target_total(a))
                .unwrap_or(Ordering::Equal)
        })
        .collect();
    let groups: Vec<&str> = groups
        .iter()
        .copied()
        .sorted_by_key(|&g| std::cmp::Reverse(group_total(g)))
        .collect();

    let cell = |t: &str, g: &str| cells.get(&(t, g)).copied().unwrap_or((0, 0.0));
    AbundanceTable {
        weighted: targets
            .iter()
            .map(|&t| groups.iter().map(|&g| cell(t, g).1).collect())
            .collect(),
        counts: targets
            .iter()
            .map(|&t| groups.iter().map(|&g| cell(t, g).0).collect())
            .collect(),
        targets: targets.iter().map(|s| s.to_string()).collect(),
        groups: groups.iter().map(|s| s.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rec<'a>(
        group: Option<&'a str>,
        target: Option<&'a str>,
        key: Option<&'a str>,
    ) -> AbundanceRecord<'a> {
        AbundanceRecord {
            group,
            target,
            normalize_by: key,
        }
    }

    fn records() -> Vec<AbundanceRecord<'static>> {
        vec![
            rec(Some("s1"), Some("ct1"), Some("p1")),
            rec(Some("s1"), Some("ct1"), Some("p1")),
            rec(Some("s1"), Some("ct2"), Some("p1")),
            rec(Some("s2"), Some("ct2"), Some("p2")),
            rec(Some("s3"), Some("ct3"), Some("p2")),
            rec(Some("s3"), Some("ct3"), None),
            rec(None, Some("ct1"), Some("p1")),
            rec(Some("s2"), None, Some("p2")),
        ]
    }

    #[test]
    fn test_counts() {
        let table = group_abundance(&records(), Normalization::None);
        assert_eq!(table.groups, vec!["s1", "s3", "s2"]);
        // Every target has two cells; names break the tie.
        assert_eq!(table.targets, vec!["ct1", "ct2", "ct3"]);
        assert_eq!(table.counts, vec![vec![2, 0, 0], vec![1, 0, 1], vec![0, 2, 0]]);
        assert_eq!(table.get("ct2", "s2"), Some(1.0));
        assert_eq!(table.get("ct9", "s2"), None);
    }

    #[test]
    fn test_fractions_by_group() {
        let table = group_abundance(&records(), Normalization::ByGroup);
        assert_eq!(table.get("ct1", "s1"), Some(2.0 / 3.0));
        assert_eq!(table.get("ct2", "s1"), Some(1.0 / 3.0));
        assert_eq!(table.get("ct2", "s2"), Some(1.0));
        assert_eq!(table.get("ct3", "s3"), Some(1.0));
        // ct2 now has the largest weighted total.
        assert_eq!(table.targets[0], "ct2");
        // Columns are still ordered by raw counts.
        assert_eq!(table.groups, vec!["s1", "s3", "s2"]);
    }

    #[test]
    fn test_fractions_by_key() {
        let table = group_abundance(&records(), Normalization::ByKey);
        // The s3 cell without a key is ignored: p2 has two cells.
        assert_eq!(table.get("ct3", "s3"), Some(0.5));
        assert_eq!(table.get("ct2", "s2"), Some(0.5));
        assert_eq!(table.get("ct1", "s1"), Some(2.0 / 3.0));
        let ct3 = table.targets.iter().position(|t| t == "ct3").unwrap();
        assert_eq!(table.counts[ct3].iter().sum::<usize>(), 1);
    }

    #[test]
    fn test_empty() {
        assert_eq!(group_abundance(&[], Normalization::ByGroup), AbundanceTable::default());
    }
}
