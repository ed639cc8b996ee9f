// Copyright (c) 2024 10x Genomics, Inc. All rights reserved.

use crate::{ChainCategory, Locus, SequenceField};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One chain as delivered by the upstream annotation pipeline, before
/// validation. This is the external input record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainObservation {
    pub cell_id: String,
    #[serde(default)]
    pub locus: Option<String>,
    #[serde(default)]
    pub cdr3_aa: Option<String>,
    #[serde(default)]
    pub cdr3_nt: Option<String>,
    #[serde(default)]
    pub v_gene: Option<String>,
    #[serde(default)]
    pub d_gene: Option<String>,
    #[serde(default)]
    pub j_gene: Option<String>,
    #[serde(default)]
    pub c_gene: Option<String>,
    #[serde(default)]
    pub support_count: Option<u64>,
    #[serde(default)]
    pub productive: Option<bool>,
}

/// A validated receptor chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    pub locus: Locus,
    pub cdr3_aa: Option<String>,
    pub cdr3_nt: Option<String>,
    pub v_gene: Option<String>,
    pub d_gene: Option<String>,
    pub j_gene: Option<String>,
    pub c_gene: Option<String>,
    pub support_count: Option<u64>,
    pub productive: Option<bool>,
}

/// Errors raised for individual chain records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error("invalid chain for cell {cell_id}: {reason}")]
    InvalidChain { cell_id: String, reason: String },

    #[error("duplicate {locus} chain for cell {cell_id} (cdr3_aa={cdr3_aa:?}, cdr3_nt={cdr3_nt:?})")]
    DuplicateChain {
        cell_id: String,
        locus: Locus,
        cdr3_aa: Option<String>,
        cdr3_nt: Option<String>,
    },
}

impl Chain {
    /// Validate an observation. The locus must be present and one of the known loci.
    pub fn from_observation(obs: &ChainObservation) -> Result<Chain, ChainError> {
        let locus = match obs.locus.as_deref().map(str::trim) {
            None | Some("") => {
                return Err(ChainError::InvalidChain {
                    cell_id: obs.cell_id.clone(),
                    reason: "locus is not set".to_string(),
                })
            }
            Some(s) => Locus::from_str(s).map_err(|reason| ChainError::InvalidChain {
                cell_id: obs.cell_id.clone(),
                reason,
            })?,
        };
        Ok(Chain {
            locus,
            cdr3_aa: non_empty(&obs.cdr3_aa),
            cdr3_nt: non_empty(&obs.cdr3_nt),
            v_gene: non_empty(&obs.v_gene),
            d_gene: non_empty(&obs.d_gene),
            j_gene: non_empty(&obs.j_gene),
            c_gene: non_empty(&obs.c_gene),
            support_count: obs.support_count,
            productive: obs.productive,
        })
    }

    /// Return the chain category implied by the locus.
    pub fn category(&self) -> ChainCategory {
        self.locus.category()
    }

    /// Return the CDR3 in the requested representation.
    pub fn cdr3(&self, field: SequenceField) -> Option<&str> {
        match field {
            SequenceField::AminoAcid => self.cdr3_aa.as_deref(),
            SequenceField::Nucleotide => self.cdr3_nt.as_deref(),
        }
    }

    /// True unless the chain was explicitly flagged non-productive.
    pub fn is_productive(&self) -> bool {
        self.productive.unwrap_or(true)
    }

    /// Two chains of a cell are duplicates if they agree on locus, both CDR3s and the
    /// V and J gene calls.
    pub(crate) fn same_chain(&self, other: &Chain) -> bool {
        self.locus == other.locus
            && self.cdr3_aa == other.cdr3_aa
            && self.cdr3_nt == other.cdr3_nt
            && self.v_gene == other.v_gene
            && self.j_gene == other.j_gene
    }
}

// Upstream tables often encode "not available" as an empty string.
fn non_empty(s: &Option<String>) -> Option<String> {
    s.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(locus: Option<&str>) -> ChainObservation {
        ChainObservation {
            cell_id: "AAACCTG-1".to_string(),
            locus: locus.map(str::to_string),
            cdr3_aa: Some("CASSLGVF".to_string()),
            cdr3_nt: Some(String::new()),
            ..Default::default()
        }
    }

    #[test]
    fn test_unset_locus_is_invalid() {
        for locus in [None, Some(""), Some("  ")] {
            let err = Chain::from_observation(&obs(locus)).unwrap_err();
            assert!(matches!(err, ChainError::InvalidChain { .. }), "{err}");
        }
    }

    #[test]
    fn test_unknown_locus_is_invalid() {
        let err = Chain::from_observation(&obs(Some("TRZ"))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid chain for cell AAACCTG-1: Unknown variant 'TRZ' for Locus. \
             Supported variants are: [TRA, TRB, TRG, TRD, IGH, IGK, IGL]"
        );
    }

    #[test]
    fn test_empty_strings_are_absent() {
        let chain = Chain::from_observation(&obs(Some("TRB"))).unwrap();
        assert_eq!(chain.category(), ChainCategory::VDJ);
        assert_eq!(chain.cdr3(SequenceField::AminoAcid), Some("CASSLGVF"));
        assert_eq!(chain.cdr3(SequenceField::Nucleotide), None);
        assert!(chain.is_productive());
    }

    #[test]
    fn test_observation_from_json() {
        let o: ChainObservation =
            serde_json::from_str(r#"{"cell_id": "c1", "locus": "IGK", "support_count": 3}"#)
                .unwrap();
        assert_eq!(o.locus.as_deref(), Some("IGK"));
        assert_eq!(o.support_count, Some(3));
        assert_eq!(o.cdr3_aa, None);
    }
}
