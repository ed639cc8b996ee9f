// Copyright (c) 2024 10x Genomics, Inc. All rights reserved.

// Per-cell receptor profiles: chains partitioned by category and ranked by support.

use crate::chain::{Chain, ChainError, ChainObservation};
use crate::{ChainCategory, Locus};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// The ranked chains of one category of one cell.
///
/// Rank 0 is the primary chain, rank 1 the secondary chain.  Anything beyond that is
/// "extra": kept for inspection but never used for clonotype definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSlots {
    chains: Vec<Chain>,
}

impl ChainSlots {
    /// Rank chains by descending support count.  The sort is stable, so equal or
    /// missing counts keep their input order; a missing count ranks below any count.
    fn new(mut chains: Vec<Chain>) -> Self {
        chains.sort_by_key(|c| Reverse(c.support_count));
        ChainSlots { chains }
    }

    pub fn primary(&self) -> Option<&Chain> {
        self.chains.first()
    }

    pub fn secondary(&self) -> Option<&Chain> {
        self.chains.get(1)
    }

    /// Return the chain at `rank` if it takes part in clonotype definition.
    pub fn slot(&self, rank: usize) -> Option<&Chain> {
        if rank < 2 {
            self.chains.get(rank)
        } else {
            None
        }
    }

    /// Chains beyond rank 1.
    pub fn extra(&self) -> &[Chain] {
        self.chains.get(2..).unwrap_or_default()
    }

    /// All chains, ranked.
    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

/// All chains observed in one cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellReceptorProfile {
    pub cell_id: String,
    pub vj: ChainSlots,
    pub vdj: ChainSlots,
}

impl CellReceptorProfile {
    /// Partition validated chains by category and rank them.
    pub fn from_chains(cell_id: impl Into<String>, chains: Vec<Chain>) -> Self {
        let (vj, vdj): (Vec<_>, Vec<_>) = chains
            .into_iter()
            .partition(|c| c.category() == ChainCategory::VJ);
        CellReceptorProfile {
            cell_id: cell_id.into(),
            vj: ChainSlots::new(vj),
            vdj: ChainSlots::new(vdj),
        }
    }

    /// Profile of a cell without any receptor chain.
    pub fn empty(cell_id: impl Into<String>) -> Self {
        Self::from_chains(cell_id, Vec::new())
    }

    pub fn slots(&self, category: ChainCategory) -> &ChainSlots {
        match category {
            ChainCategory::VJ => &self.vj,
            ChainCategory::VDJ => &self.vdj,
        }
    }

    /// False iff the cell carries no chain in either category.
    pub fn has_ir(&self) -> bool {
        !(self.vj.is_empty() && self.vdj.is_empty())
    }

    /// True if either category holds more than two chains.
    pub fn is_multichain(&self) -> bool {
        !self.vj.extra().is_empty() || !self.vdj.extra().is_empty()
    }

    /// True if the category has a primary chain.
    pub fn has_category(&self, category: ChainCategory) -> bool {
        !self.slots(category).is_empty()
    }

    /// Loci of every chain of the cell, extra chains included.
    pub fn loci(&self) -> impl Iterator<Item = Locus> + '_ {
        self.vj
            .chains()
            .iter()
            .chain(self.vdj.chains())
            .map(|c| c.locus)
    }
}

/// Build the profile of a single cell.  Fails on the first invalid or duplicated chain,
/// or on a chain recorded for another cell.
pub fn build_profile(
    cell_id: &str,
    observations: &[ChainObservation],
) -> Result<CellReceptorProfile, ChainError> {
    let mut chains: Vec<Chain> = Vec::with_capacity(observations.len());
    for obs in observations {
        if obs.cell_id != cell_id {
            return Err(ChainError::InvalidChain {
                cell_id: cell_id.to_string(),
                reason: format!("chain belongs to cell {}", obs.cell_id),
            });
        }
        let chain = Chain::from_observation(obs)?;
        if chains.iter().any(|c| c.same_chain(&chain)) {
            return Err(duplicate(cell_id, &chain));
        }
        chains.push(chain);
    }
    Ok(CellReceptorProfile::from_chains(cell_id, chains))
}

fn duplicate(cell_id: &str, chain: &Chain) -> ChainError {
    ChainError::DuplicateChain {
        cell_id: cell_id.to_string(),
        locus: chain.locus,
        cdr3_aa: chain.cdr3_aa.clone(),
        cdr3_nt: chain.cdr3_nt.clone(),
    }
}

/// A record that could not be used, with its position in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    pub index: usize,
    pub error: ChainError,
}

/// Profiles for a whole dataset, sorted by cell id, plus the rejected records.
#[derive(Debug, Clone, Default)]
pub struct ProfileSet {
    pub profiles: Vec<CellReceptorProfile>,
    pub rejected: Vec<RejectedRecord>,
}

impl ProfileSet {
    pub fn n_with_ir(&self) -> usize {
        self.profiles.iter().filter(|p| p.has_ir()).count()
    }
}

/// Group chain observations by cell and build one profile per cell.
///
/// Cells named in `cell_ids` but absent from `observations` get an empty profile
/// (`has_ir = false`).  Invalid and duplicated records are reported in
/// `ProfileSet::rejected` and left out of the profiles; deciding whether that is
/// fatal is up to the caller.  With `productive_only`, chains flagged
/// non-productive are skipped without being reported.
pub fn build_profiles<'a>(
    cell_ids: impl IntoIterator<Item = &'a str>,
    observations: &[ChainObservation],
    productive_only: bool,
) -> ProfileSet {
    let mut per_cell: BTreeMap<String, Vec<Chain>> = cell_ids
        .into_iter()
        .map(|id| (id.to_string(), Vec::new()))
        .collect();
    let mut rejected = Vec::new();
    for (index, obs) in observations.iter().enumerate() {
        let chain = match Chain::from_observation(obs) {
            Ok(chain) => chain,
            Err(error) => {
                rejected.push(RejectedRecord { index, error });
                continue;
            }
        };
        let chains = per_cell.entry(obs.cell_id.clone()).or_default();
        if chains.iter().any(|c| c.same_chain(&chain)) {
            rejected.push(RejectedRecord {
                index,
                error: duplicate(&obs.cell_id, &chain),
            });
            continue;
        }
        if productive_only && !chain.is_productive() {
            continue;
        }
        chains.push(chain);
    }
    ProfileSet {
        profiles: per_cell
            .into_iter()
            .map(|(cell_id, chains)| CellReceptorProfile::from_chains(cell_id, chains))
            .collect(),
        rejected,
    }
}
