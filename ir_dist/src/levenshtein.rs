// Copyright (c) 2024 10x Genomics, Inc. All rights reserved.

use crate::{LengthWindow, SequenceDistance};
use bio::alignment::distance::simd::bounded_levenshtein;

/// Unit cost edit distance.  Pairs whose lengths differ by more than the cutoff are
/// rejected without any alignment work.
#[derive(Debug, Clone, Copy, Default)]
pub struct LevenshteinDistance;

impl SequenceDistance for LevenshteinDistance {
    fn distance(&self, a: &[u8], b: &[u8], cutoff: u32) -> Option<u32> {
        if a.len().abs_diff(b.len()) > cutoff as usize {
            return None;
        }
        bounded_levenshtein(a, b, cutoff)
    }

    fn length_window(&self, cutoff: u32) -> LengthWindow {
        LengthWindow::Within(cutoff)
    }
}
