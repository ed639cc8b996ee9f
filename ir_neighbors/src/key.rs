// Copyright (c) 2024 10x Genomics, Inc. All rights reserved.

// Receptor identity keys and their pairwise evaluation.
//
// A key holds what clonotype definition looks at: for each chain category, how many
// of the primary and secondary slots hold a chain, and the indexed CDR3 of those
// chains.  Cells with equal keys are interchangeable, so the similarity graph is
// built over keys rather than cells.

use crate::config::{ClonotypeConfig, DualChainPolicy, ReceptorArms, ReceptorTypeFilter};
use crate::index::{SeqId, SequenceIndex};
use ir_dist::MissingMatchPolicy;
use ir_types::{CellReceptorProfile, ChainCategory, ReceptorType};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArmKey {
    /// Number of occupied slots: 0 if the cell has no chain in this category, 2 if
    /// it has a secondary chain that takes part in the comparison.
    pub n_chains: usize,
    /// Primary and secondary sequence.  None for an empty slot or for a chain
    /// without a sequence.
    pub seqs: [Option<SeqId>; 2],
    /// Primary and secondary V gene, only filled in when V genes must match.
    pub v_genes: [Option<String>; 2],
}

impl ArmKey {
    /// The cell has a primary chain in this category, with or without a sequence.
    pub fn is_present(&self) -> bool {
        self.n_chains > 0
    }

    fn slot(&self, rank: usize) -> Slot {
        if rank >= self.n_chains {
            Slot::Empty
        } else {
            match self.seqs[rank] {
                Some(id) => Slot::Sequence(id),
                None => Slot::Unsequenced,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReceptorKey {
    /// Indexed by [`arm_index`].
    pub arms: [ArmKey; 2],
    /// Only filled in when receptor types must match.
    pub receptor_type: Option<ReceptorType>,
}

pub fn arm_index(category: ChainCategory) -> usize {
    match category {
        ChainCategory::VJ => 0,
        ChainCategory::VDJ => 1,
    }
}

/// Content of one primary or secondary slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    /// No chain at this rank.
    Empty,
    /// A chain whose CDR3 is not known.
    Unsequenced,
    Sequence(SeqId),
}

/// Comparison of one arm between two cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArmOutcome {
    BothAbsent,
    OneAbsent,
    Within(u32),
    Exceeds,
}

/// The per-category sequence indexes plus the configuration that drives evaluation.
pub struct KeyEvaluator<'a> {
    pub config: &'a ClonotypeConfig,
    /// Indexed by [`arm_index`].
    pub indexes: [&'a SequenceIndex; 2],
}

impl<'a> KeyEvaluator<'a> {
    fn slots(&self) -> usize {
        match self.config.dual_chain_policy {
            DualChainPolicy::Ignore => 1,
            _ => 2,
        }
    }

    /// Build the key of a cell.  Every sequence must be present in the indexes.
    pub fn key(&self, profile: &CellReceptorProfile) -> ReceptorKey {
        let arm = |category: ChainCategory| {
            let slots = profile.slots(category);
            let index = self.indexes[arm_index(category)];
            let mut key = ArmKey {
                n_chains: slots.len().min(self.slots()),
                seqs: [None, None],
                v_genes: [None, None],
            };
            for rank in 0..key.n_chains {
                if let Some(chain) = slots.slot(rank) {
                    key.seqs[rank] = chain
                        .cdr3(self.config.sequence_field)
                        .and_then(|s| index.id(s));
                    if self.config.same_v_gene {
                        key.v_genes[rank] = chain.v_gene.clone();
                    }
                }
            }
            key
        };
        ReceptorKey {
            arms: [arm(ChainCategory::VJ), arm(ChainCategory::VDJ)],
            receptor_type: (self.config.receptor_type_filter
                == ReceptorTypeFilter::SameReceptorType)
                .then(|| profile.receptor_type()),
        }
    }

    fn passes_filter(&self, a: &ReceptorKey, b: &ReceptorKey) -> bool {
        let present = |k: &ReceptorKey| [k.arms[0].is_present(), k.arms[1].is_present()];
        match self.config.receptor_type_filter {
            ReceptorTypeFilter::None => true,
            ReceptorTypeFilter::SameReceptorType => a.receptor_type == b.receptor_type,
            ReceptorTypeFilter::SameCategories => present(a) == present(b),
            ReceptorTypeFilter::ShareCategory => {
                (a.arms[0].is_present() && b.arms[0].is_present())
                    || (a.arms[1].is_present() && b.arms[1].is_present())
            }
        }
    }

    /// Distance of one slot pairing, V genes included.  Two empty slots match only
    /// if `empty_matches`; two chains without a sequence follow `missing`.
    fn pairing(
        &self,
        index: &SequenceIndex,
        (a, ra): (&ArmKey, usize),
        (b, rb): (&ArmKey, usize),
        empty_matches: bool,
        missing: MissingMatchPolicy,
    ) -> Option<u32> {
        if self.config.same_v_gene && a.v_genes[ra] != b.v_genes[rb] {
            return None;
        }
        match (a.slot(ra), b.slot(rb)) {
            (Slot::Sequence(x), Slot::Sequence(y)) => index.distance(x, y),
            (Slot::Empty, Slot::Empty) => empty_matches.then_some(0),
            (Slot::Unsequenced, Slot::Unsequenced) => {
                (missing == MissingMatchPolicy::MatchIfBothMissing).then_some(0)
            }
            _ => None,
        }
    }

    fn arm(&self, category: ChainCategory, a: &ReceptorKey, b: &ReceptorKey) -> ArmOutcome {
        let i = arm_index(category);
        let (a, b) = (&a.arms[i], &b.arms[i]);
        match (a.is_present(), b.is_present()) {
            (false, false) => return ArmOutcome::BothAbsent,
            (true, false) | (false, true) => return ArmOutcome::OneAbsent,
            (true, true) => {}
        }
        let index = self.indexes[i];
        let missing = self.config.missing_match_policy;
        let d = match self.config.dual_chain_policy {
            DualChainPolicy::Ignore => self.pairing(index, (a, 0), (b, 0), true, missing),
            DualChainPolicy::RequireBothWithinCutoff => self
                .pairing(index, (a, 0), (b, 0), true, missing)
                .zip(self.pairing(index, (a, 1), (b, 1), true, missing))
                .map(|(p, s)| p + s),
            DualChainPolicy::BestOf => {
                // Pairings involving a secondary slot need two sequenced chains.
                let cross = [(0, 1), (1, 0), (1, 1)]
                    .into_iter()
                    .filter_map(|(ra, rb)| {
                        self.pairing(
                            index,
                            (a, ra),
                            (b, rb),
                            false,
                            MissingMatchPolicy::NeverMatch,
                        )
                    });
                self.pairing(index, (a, 0), (b, 0), true, missing)
                    .into_iter()
                    .chain(cross)
                    .min()
            }
        };
        match d {
            Some(d) => ArmOutcome::Within(d),
            None => ArmOutcome::Exceeds,
        }
    }

    /// Edge weight between two keys, or None if they are not connected.
    pub fn evaluate(&self, a: &ReceptorKey, b: &ReceptorKey) -> Option<u32> {
        if !self.passes_filter(a, b) {
            return None;
        }
        match self.config.receptor_arms {
            ReceptorArms::Vj | ReceptorArms::Vdj => {
                let category = self.config.receptor_arms.categories()[0];
                match self.arm(category, a, b) {
                    ArmOutcome::Within(d) => Some(d),
                    _ => None,
                }
            }
            ReceptorArms::All => {
                let mut total: Option<u32> = None;
                for category in ChainCategory::all() {
                    match self.arm(category, a, b) {
                        ArmOutcome::BothAbsent => {}
                        ArmOutcome::Within(d) => total = Some(total.unwrap_or(0) + d),
                        ArmOutcome::OneAbsent | ArmOutcome::Exceeds => return None,
                    }
                }
                total
            }
            ReceptorArms::Any => ChainCategory::all()
                .into_iter()
                .filter_map(|category| match self.arm(category, a, b) {
                    ArmOutcome::Within(d) => Some(d),
                    _ => None,
                })
                .min(),
        }
    }

    /// Sequence ids of a key that can take part in a match, per category.  A primary
    /// chain without a sequence yields `None` when such chains may match.
    pub fn postings(&self, key: &ReceptorKey, category: ChainCategory) -> Vec<Option<SeqId>> {
        let arm = &key.arms[arm_index(category)];
        let mut ids = Vec::with_capacity(2);
        for rank in 0..arm.n_chains {
            match arm.slot(rank) {
                Slot::Sequence(id) => ids.push(Some(id)),
                Slot::Unsequenced
                    if rank == 0
                        && self.config.missing_match_policy
                            == MissingMatchPolicy::MatchIfBothMissing =>
                {
                    ids.push(None)
                }
                _ => {}
            }
        }
        ids
    }
}
