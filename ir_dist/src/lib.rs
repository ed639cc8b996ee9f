//! ir_dist
// Copyright (c) 2024 10x Genomics, Inc. All rights reserved.
#![deny(missing_docs)]

//! Pairwise distances between CDR3 sequences.
//!
//! Every metric follows the same contract: `distance(a, b, cutoff)` returns
//! `Some(d)` with `d <= cutoff`, or `None` if the sequences are further apart
//! than `cutoff`.  "Exceeds cutoff" is a normal result, not an error.  Inputs are
//! expected to have passed [`validate_sequence`]; after that no metric fails.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

mod alignment;
mod alphabet;
mod hamming;
mod levenshtein;

pub use alignment::AlignmentDistance;
pub use alphabet::{validate_sequence, SequenceComparisonError, AMINO_ACIDS, NUCLEOTIDES};
pub use hamming::HammingDistance;
pub use levenshtein::LevenshteinDistance;

/// The distance metrics that can be selected by configuration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DistanceMetric {
    /// Equal sequences only.
    #[default]
    Identity,
    /// Substitutions only, equal lengths only.
    Hamming,
    /// Unit cost edit distance.
    Levenshtein,
    /// BLOSUM62 global alignment; amino acids only.
    Alignment,
}

impl DistanceMetric {
    /// Build the calculator for this metric.
    pub fn calculator(self) -> Box<dyn SequenceDistance> {
        match self {
            DistanceMetric::Identity => Box::new(IdentityDistance),
            DistanceMetric::Hamming => Box::new(HammingDistance),
            DistanceMetric::Levenshtein => Box::new(LevenshteinDistance),
            DistanceMetric::Alignment => Box::new(AlignmentDistance::default()),
        }
    }
}

/// Which sequence lengths can possibly be within a cutoff of a sequence of length L.
/// Used to bucket sequences before calling the distance function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthWindow {
    /// Only sequences of length L.
    Exact,
    /// Sequences of length L-w ..= L+w.
    Within(u32),
    /// No length bound.
    Unbounded,
}

/// A distance between two sequences, honoring a cutoff.
pub trait SequenceDistance: Send + Sync {
    /// Distance between `a` and `b` if it is at most `cutoff`, else None.
    fn distance(&self, a: &[u8], b: &[u8], cutoff: u32) -> Option<u32>;

    /// The length window outside of which `distance` always returns None.
    fn length_window(&self, cutoff: u32) -> LengthWindow;
}

/// Distance 0 for equal sequences; everything else exceeds the cutoff.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityDistance;

impl SequenceDistance for IdentityDistance {
    fn distance(&self, a: &[u8], b: &[u8], _cutoff: u32) -> Option<u32> {
        (a == b).then_some(0)
    }

    fn length_window(&self, _cutoff: u32) -> LengthWindow {
        LengthWindow::Exact
    }
}

/// How two chains that carry no sequence compare.  A sequenced chain never matches
/// one without a sequence.  Slots without any chain are not governed by this policy.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MissingMatchPolicy {
    /// Missing never equals missing.
    #[default]
    NeverMatch,
    /// Two missing sequences are at distance 0.
    MatchIfBothMissing,
}

/// Distance between two possibly absent sequences.
pub fn slot_distance(
    calc: &dyn SequenceDistance,
    a: Option<&[u8]>,
    b: Option<&[u8]>,
    cutoff: u32,
    missing: MissingMatchPolicy,
) -> Option<u32> {
    match (a, b) {
        (Some(a), Some(b)) => calc.distance(a, b, cutoff),
        (None, None) => (missing == MissingMatchPolicy::MatchIfBothMissing).then_some(0),
        _ => None,
    }
}
