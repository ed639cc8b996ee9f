// Copyright (c) 2024 10x Genomics, Inc. All rights reserved.

// Clonotype definition parameters.  Every tunable is a named field; the struct is
// validated once, before any computation starts.

use anyhow::{Context, Result};
use ir_dist::{DistanceMetric, MissingMatchPolicy};
use ir_types::{ChainCategory, SequenceField};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::Path;
use strum_macros::{Display, EnumString};

/// Which pairs of cells may be compared at all.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReceptorTypeFilter {
    /// No constraint.
    None,
    /// Both cells must have the same receptor type (TCR, BCR, ...).
    SameReceptorType,
    /// Both cells must carry exactly the same chain categories.
    SameCategories,
    /// Both cells must carry at least one common chain category.
    #[default]
    ShareCategory,
}

/// Which receptor arms (chain categories) must match.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReceptorArms {
    /// Only the VJ arm is compared; it must be present in both cells.
    Vj,
    /// Only the VDJ arm is compared; it must be present in both cells.
    Vdj,
    /// Every arm present in either cell must be present in both and match.
    #[default]
    All,
    /// At least one arm present in both cells must match.
    Any,
}

impl ReceptorArms {
    pub fn categories(self) -> &'static [ChainCategory] {
        match self {
            ReceptorArms::Vj => &[ChainCategory::VJ],
            ReceptorArms::Vdj => &[ChainCategory::VDJ],
            ReceptorArms::All | ReceptorArms::Any => &[ChainCategory::VJ, ChainCategory::VDJ],
        }
    }
}

/// How secondary chains enter the distance of an arm.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DualChainPolicy {
    /// Only primary chains are compared.
    Ignore,
    /// Primary against primary and secondary against secondary, each within the
    /// cutoff.  A secondary slot empty in both cells matches.
    #[default]
    RequireBothWithinCutoff,
    /// The best of all primary/secondary pairings counts.  Pairings involving a
    /// secondary slot need a sequenced chain on both sides.
    BestOf,
}

/// How the similarity graph is partitioned into clonotypes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Partitions {
    /// Connected components.
    #[default]
    Connected,
    /// Connected components refined by label propagation.
    LabelPropagation,
}

/// How clonotype labels are derived from cluster membership.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LabelScheme {
    /// Clusters ordered by decreasing size, then smallest member, numbered from 0.
    #[default]
    Index,
    /// The smallest member cell id.
    SmallestMember,
    /// A hash of the sorted member cell ids.
    MemberHash,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("the identity metric does not tolerate mismatches, but cutoff {cutoff} was requested for {category}")]
    IdentityWithCutoff { cutoff: u32, category: ChainCategory },

    #[error("the {metric} metric is not supported for {field} sequences")]
    UnsupportedSequenceField {
        metric: DistanceMetric,
        field: SequenceField,
    },

    #[error("n_iterations must be at least 1")]
    NoIterations,

    #[error("threads must be at least 1 when set")]
    NoThreads,

    #[error("invalid expansion boundaries {boundaries:?}: they must be strictly increasing and at least 2")]
    ExpansionBoundaries { boundaries: Vec<usize> },

    #[error("unable to create a thread pool with {threads} threads: {reason}")]
    ThreadPool { threads: usize, reason: String },
}

/// Clonotype definition parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClonotypeConfig {
    /// Which CDR3 representation drives distance.
    pub sequence_field: SequenceField,
    pub metric: DistanceMetric,
    /// Maximum distance per slot. 0 means clonotypes by identity.
    pub cutoff: u32,
    /// Overrides `cutoff` for the VJ arm.
    pub vj_cutoff: Option<u32>,
    /// Overrides `cutoff` for the VDJ arm.
    pub vdj_cutoff: Option<u32>,
    pub receptor_type_filter: ReceptorTypeFilter,
    pub receptor_arms: ReceptorArms,
    pub missing_match_policy: MissingMatchPolicy,
    pub dual_chain_policy: DualChainPolicy,
    /// Additionally require identical V gene calls on the compared chains.
    pub same_v_gene: bool,
    pub partitions: Partitions,
    /// Maximum number of label propagation sweeps.
    pub n_iterations: usize,
    pub label_scheme: LabelScheme,
    /// Skip chains flagged non-productive when building profiles.
    pub productive_only: bool,
    /// Size of the thread pool; None uses the global rayon pool.
    pub threads: Option<usize>,
}

impl Default for ClonotypeConfig {
    fn default() -> Self {
        ClonotypeConfig {
            sequence_field: SequenceField::AminoAcid,
            metric: DistanceMetric::Identity,
            cutoff: 0,
            vj_cutoff: None,
            vdj_cutoff: None,
            receptor_type_filter: ReceptorTypeFilter::default(),
            receptor_arms: ReceptorArms::default(),
            missing_match_policy: MissingMatchPolicy::default(),
            dual_chain_policy: DualChainPolicy::default(),
            same_v_gene: false,
            partitions: Partitions::default(),
            n_iterations: 5,
            label_scheme: LabelScheme::default(),
            productive_only: false,
            threads: None,
        }
    }
}

macro_rules! warn_non_default {
    ($cfg:ident, $default:ident, $($field:ident),* $(,)?) => {
        $(
            if $cfg.$field != $default.$field {
                warn!("using non-default {} = {:?}", stringify!($field), $cfg.$field);
            }
        )*
    };
}

impl ClonotypeConfig {
    /// Configuration for fuzzy matching with the given metric and cutoff.
    pub fn with_metric(metric: DistanceMetric, cutoff: u32) -> Self {
        ClonotypeConfig {
            metric,
            cutoff,
            ..Default::default()
        }
    }

    /// The cutoff in effect for a chain category.
    pub fn cutoff_for(&self, category: ChainCategory) -> u32 {
        match category {
            ChainCategory::VJ => self.vj_cutoff.unwrap_or(self.cutoff),
            ChainCategory::VDJ => self.vdj_cutoff.unwrap_or(self.cutoff),
        }
    }

    /// True if every cutoff is 0, i.e. clonotypes are defined by sequence identity.
    pub fn is_strict(&self) -> bool {
        ChainCategory::all()
            .into_iter()
            .all(|cat| self.cutoff_for(cat) == 0)
    }

    /// Reject incompatible parameter combinations.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.metric == DistanceMetric::Identity {
            for category in ChainCategory::all() {
                let cutoff = self.cutoff_for(category);
                if cutoff > 0 {
                    return Err(ConfigurationError::IdentityWithCutoff { cutoff, category });
                }
            }
        }
        if self.metric == DistanceMetric::Alignment
            && self.sequence_field == SequenceField::Nucleotide
        {
            return Err(ConfigurationError::UnsupportedSequenceField {
                metric: self.metric,
                field: self.sequence_field,
            });
        }
        if self.n_iterations == 0 {
            return Err(ConfigurationError::NoIterations);
        }
        if self.threads == Some(0) {
            return Err(ConfigurationError::NoThreads);
        }
        Ok(())
    }

    /// Parse and validate a TOML document.  Absent keys take their default value.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: ClonotypeConfig = toml::from_str(s).context("invalid clonotype configuration")?;
        cfg.validate()?;
        cfg.warn_non_defaults();
        Ok(cfg)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| path.display().to_string())?;
        Self::from_toml_str(&s).with_context(|| path.display().to_string())
    }

    /// Log every parameter that differs from its default.
    pub fn warn_non_defaults(&self) {
        let default = ClonotypeConfig::default();
        let cfg = self;
        warn_non_default!(
            cfg,
            default,
            sequence_field,
            metric,
            cutoff,
            vj_cutoff,
            vdj_cutoff,
            receptor_type_filter,
            receptor_arms,
            missing_match_policy,
            dual_chain_policy,
            same_v_gene,
            partitions,
            n_iterations,
            label_scheme,
            productive_only,
            threads,
        );
    }
}
