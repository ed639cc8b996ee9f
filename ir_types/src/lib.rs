//! ir_types
// Copyright (c) 2024 10x Genomics, Inc. All rights reserved.
#![expect(missing_docs)]

//! Chain-level data model for single-cell immune receptor repertoires: loci,
//! chain categories, per-cell receptor profiles and chain QC classification.

use serde::{Deserialize, Serialize};
use std::fmt;

// From https://danielkeep.github.io/tlborm/book/blk-counting.html
macro_rules! replace_expr {
    ($_t:tt $sub:expr) => {
        $sub
    };
}

macro_rules! count_tts {
    ($($tts:tt)*) => {0usize $(+ replace_expr!($tts 1usize))*};
}

macro_rules! make_enum {
    (
        $(#[$meta:meta])*
        name: $name:ident,
        variants:[$( $(#[$vmeta:meta])* ($field:ident, $lit: literal) ,)*],
        const_var_name: $const_var_name:ident,
    ) => {
        /// String names of every variant, in declaration order.
        pub const $const_var_name: [&str; count_tts!($($field)*)] = [
            $($lit,)*
        ];

        $(#[$meta])*
        #[derive(
            Debug,
            Copy,
            Clone,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Serialize,
            Deserialize,
            Hash,
        )]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $lit)]
                $field,
            )*
        }

        impl $name {
            /// All variants, in declaration order.
            pub fn all() -> [Self; count_tts!($($field)*)] {
                [
                    $($name::$field,)*
                ]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", match self {
                    $(
                        $name::$field => $lit,
                    )*
                })
            }
        }

        impl From<$name> for &'static str {
            fn from(src: $name) -> &'static str {
                match src {
                    $(
                        $name::$field => $lit,
                    )*
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $(
                        $lit => Ok($name::$field),
                    )*
                    unknown => Err(
                        format!("Unknown variant '{}' for {}. Supported variants are: [{}]", unknown, stringify!($name), $const_var_name.join(", "))
                    )
                }
            }
        }
    };
}

// Declared after the macros so that make_enum! is in scope for chain_qc.
mod chain;
mod chain_qc;
mod profile;

pub use chain::{Chain, ChainError, ChainObservation};
pub use chain_qc::{ChainPairing, ReceptorSubtype, ReceptorType};
pub use profile::{
    build_profile, build_profiles, CellReceptorProfile, ChainSlots, ProfileSet, RejectedRecord,
};

make_enum! {
    /// The receptor locus a chain was assigned to.
    name: Locus,
    variants: [
        /// T cell receptor alpha.
        (TRA, "TRA"),
        /// T cell receptor beta.
        (TRB, "TRB"),
        /// T cell receptor gamma.
        (TRG, "TRG"),
        /// T cell receptor delta.
        (TRD, "TRD"),
        /// Immunoglobulin heavy.
        (IGH, "IGH"),
        /// Immunoglobulin kappa.
        (IGK, "IGK"),
        /// Immunoglobulin lambda.
        (IGL, "IGL"),
    ],
    const_var_name: LOCI,
}

make_enum! {
    /// Chain category: VJ chains carry no D segment, VDJ chains do.
    name: ChainCategory,
    variants: [
        /// TRA, TRG, IGK, IGL.
        (VJ, "VJ"),
        /// TRB, TRD, IGH.
        (VDJ, "VDJ"),
    ],
    const_var_name: CHAIN_CATEGORIES,
}

make_enum! {
    /// Which CDR3 representation drives comparison.
    name: SequenceField,
    variants: [
        /// CDR3 amino acid sequence.
        (AminoAcid, "amino_acid"),
        /// CDR3 nucleotide sequence.
        (Nucleotide, "nucleotide"),
    ],
    const_var_name: SEQUENCE_FIELDS,
}

impl Locus {
    /// The chain category implied by this locus.
    pub fn category(self) -> ChainCategory {
        match self {
            Locus::TRA | Locus::TRG | Locus::IGK | Locus::IGL => ChainCategory::VJ,
            Locus::TRB | Locus::TRD | Locus::IGH => ChainCategory::VDJ,
        }
    }

    /// True for T cell receptor loci.
    pub fn is_tcr(self) -> bool {
        matches!(self, Locus::TRA | Locus::TRB | Locus::TRG | Locus::TRD)
    }
}

impl Default for SequenceField {
    fn default() -> Self {
        SequenceField::AminoAcid
    }
}
