// Copyright (c) 2024 10x Genomics, Inc. All rights reserved.

use crate::{LengthWindow, SequenceDistance};
use bio::alignment::distance::simd::hamming;

/// Number of mismatching positions.  Sequences of different length are never within
/// any cutoff; they are not truncated or padded.
#[derive(Debug, Clone, Copy, Default)]
pub struct HammingDistance;

impl SequenceDistance for HammingDistance {
    fn distance(&self, a: &[u8], b: &[u8], cutoff: u32) -> Option<u32> {
        if a.len() != b.len() {
            return None;
        }
        let d = hamming(a, b);
        (d <= u64::from(cutoff)).then_some(d as u32)
    }

    fn length_window(&self, _cutoff: u32) -> LengthWindow {
        LengthWindow::Exact
    }
}
