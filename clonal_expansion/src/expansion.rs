// Copyright (c) 2024 10x Genomics, Inc. All rights reserved.

use ir_neighbors::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Clonotype size bins for the per-cell expansion category.
///
/// Boundaries b0 < b1 < ... split sizes into "not expanded" (below b0), one bin per
/// interval [bi, bi+1) and a last open bin from the last boundary on.  The default
/// boundaries [2, 6] give "not expanded", "expanded (2-5)" and "expanded (>5)".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct ExpansionBins {
    boundaries: Vec<usize>,
    names: Vec<String>,
}

impl Default for ExpansionBins {
    fn default() -> Self {
        ExpansionBins::new(vec![2, 6]).expect("default boundaries are valid")
    }
}

impl ExpansionBins {
    /// Boundaries must be strictly increasing and at least 2.
    pub fn new(boundaries: Vec<usize>) -> Result<Self, ConfigurationError> {
        let valid = !boundaries.is_empty()
            && boundaries[0] >= 2
            && boundaries.windows(2).all(|w| w[0] < w[1]);
        if !valid {
            return Err(ConfigurationError::ExpansionBoundaries { boundaries });
        }
        let mut names = vec!["not expanded".to_string()];
        for w in boundaries.windows(2) {
            let (lo, hi) = (w[0], w[1] - 1);
            names.push(if lo == hi {
                format!("expanded ({lo})")
            } else {
                format!("expanded ({lo}-{hi})")
            });
        }
        names.push(format!("expanded (>{})", boundaries[boundaries.len() - 1] - 1));
        Ok(ExpansionBins { boundaries, names })
    }

    pub fn boundaries(&self) -> &[usize] {
        &self.boundaries
    }

    /// All category names, from "not expanded" up.
    pub fn categories(&self) -> &[String] {
        &self.names
    }

    pub fn category(&self, size: usize) -> &str {
        let bin = self.boundaries.partition_point(|&b| b <= size);
        &self.names[bin]
    }
}

impl TryFrom<Vec<usize>> for ExpansionBins {
    type Error = ConfigurationError;

    fn try_from(boundaries: Vec<usize>) -> Result<Self, Self::Error> {
        ExpansionBins::new(boundaries)
    }
}

impl From<ExpansionBins> for Vec<usize> {
    fn from(bins: ExpansionBins) -> Vec<usize> {
        bins.boundaries
    }
}

/// Expansion category of every labeled cell.
///
/// Without `expanded_in`, a cell's clonotype size counts the whole dataset.  With
/// it, only the cells of the same group count, and cells without a group are left
/// out.
pub fn clonal_expansion<'a, 'b>(
    labels: &BTreeMap<&'a str, &'a str>,
    expanded_in: Option<&BTreeMap<&'a str, &'a str>>,
    bins: &'b ExpansionBins,
) -> BTreeMap<&'a str, &'b str> {
    let group_of = |cell: &str| match expanded_in {
        Some(groups) => groups.get(cell).copied().map(Some),
        None => Some(None),
    };
    let mut sizes: BTreeMap<(Option<&str>, &str), usize> = BTreeMap::new();
    for (&cell, &label) in labels {
        if let Some(group) = group_of(cell) {
            *sizes.entry((group, label)).or_insert(0) += 1;
        }
    }
    labels
        .iter()
        .filter_map(|(&cell, &label)| {
            let group = group_of(cell)?;
            Some((cell, bins.category(sizes[&(group, label)])))
        })
        .collect()
}
