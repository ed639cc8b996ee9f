// Copyright (c) 2024 10x Genomics, Inc. All rights reserved.

use crate::config::ConfigurationError;
use ir_dist::SequenceComparisonError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClonotypeError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    SequenceComparison(#[from] SequenceComparisonError),

    #[error("the clonotype computation was cancelled")]
    Cancelled,
}
