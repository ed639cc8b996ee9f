// Copyright (c) 2024 10x Genomics, Inc. All rights reserved.

use crate::{LengthWindow, SequenceDistance};
use bio::alignment::pairwise::Aligner;
use bio::scores::blosum62;

/// Distance derived from a BLOSUM62 global alignment score:
///
///   d(a, b) = min(S(a, a), S(b, b)) - S(a, b)
///
/// where S is the alignment score.  Because BLOSUM62 scores every residue against
/// itself higher than against any other residue, d is zero exactly when a == b.
/// Only meaningful for amino acid sequences.
#[derive(Debug, Clone, Copy)]
pub struct AlignmentDistance {
    /// Score for opening a gap (<= 0).
    pub gap_open: i32,
    /// Score for each gap position (<= 0).
    pub gap_extend: i32,
}

impl Default for AlignmentDistance {
    /// Every gap position costs 11, independent of gap length.
    fn default() -> Self {
        AlignmentDistance {
            gap_open: 0,
            gap_extend: -11,
        }
    }
}

impl AlignmentDistance {
    fn self_score(seq: &[u8]) -> i32 {
        seq.iter().map(|&c| blosum62(c, c)).sum()
    }

    fn gap_score(&self, len: usize) -> i32 {
        if len == 0 {
            0
        } else {
            self.gap_open + self.gap_extend * len as i32
        }
    }

    fn score(&self, a: &[u8], b: &[u8]) -> i32 {
        if a.is_empty() || b.is_empty() {
            return self.gap_score(a.len().max(b.len()));
        }
        let mut aligner =
            Aligner::with_capacity(a.len(), b.len(), self.gap_open, self.gap_extend, blosum62);
        aligner.global(a, b).score
    }
}

impl SequenceDistance for AlignmentDistance {
    fn distance(&self, a: &[u8], b: &[u8], cutoff: u32) -> Option<u32> {
        if a == b {
            return Some(0);
        }
        let best = Self::self_score(a).min(Self::self_score(b));
        let d = (best - self.score(a, b)).max(0) as u32;
        (d <= cutoff).then_some(d)
    }

    fn length_window(&self, _cutoff: u32) -> LengthWindow {
        LengthWindow::Unbounded
    }
}
