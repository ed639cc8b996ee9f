// Copyright (c) 2024 10x Genomics, Inc. All rights reserved.

use ir_types::SequenceField;

/// The 20 standard amino acids.
pub const AMINO_ACIDS: &[u8; 20] = b"ACDEFGHIKLMNPQRSTVWY";

/// The four nucleotides.
pub const NUCLEOTIDES: &[u8; 4] = b"ACGT";

/// A sequence contains a character outside of its declared alphabet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SequenceComparisonError {
    /// The character at `position` is not part of the alphabet of `field`.
    #[error("invalid {field} character '{character}' at position {position} of sequence {sequence}")]
    InvalidCharacter {
        /// The offending sequence.
        sequence: String,
        /// The offending character.
        character: char,
        /// Zero-based position of the character.
        position: usize,
        /// The alphabet the sequence was checked against.
        field: SequenceField,
    },
}

/// Check that every character of `seq` belongs to the alphabet of `field`.
pub fn validate_sequence(seq: &str, field: SequenceField) -> Result<(), SequenceComparisonError> {
    let alphabet: &[u8] = match field {
        SequenceField::AminoAcid => AMINO_ACIDS,
        SequenceField::Nucleotide => NUCLEOTIDES,
    };
    match seq.bytes().position(|c| !alphabet.contains(&c)) {
        None => Ok(()),
        Some(position) => Err(SequenceComparisonError::InvalidCharacter {
            sequence: seq.to_string(),
            character: seq[position..].chars().next().unwrap_or('?'),
            position,
            field,
        }),
    }
}
