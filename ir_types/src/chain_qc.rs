// Copyright (c) 2024 10x Genomics, Inc. All rights reserved.

// Chain QC: classify each cell by the loci it carries and by how its chains pair up.

use crate::{CellReceptorProfile, Locus};
use serde::{Deserialize, Serialize};
use std::fmt;

make_enum! {
    /// Broad receptor class of a cell.
    name: ReceptorType,
    variants: [
        (Tcr, "TCR"),
        (Bcr, "BCR"),
        /// Both T and B cell receptor loci were observed.
        (Ambiguous, "ambiguous"),
        (Multichain, "multichain"),
        (NoIr, "no IR"),
    ],
    const_var_name: RECEPTOR_TYPES,
}

make_enum! {
    /// Receptor class refined by the pair of loci observed.
    name: ReceptorSubtype,
    variants: [
        (TraTrb, "TRA+TRB"),
        (TrgTrd, "TRG+TRD"),
        (IghIgk, "IGH+IGK"),
        (IghIgl, "IGH+IGL"),
        /// Heavy chain only; the light chain could be either kappa or lambda.
        (Igh, "IGH"),
        (Ambiguous, "ambiguous"),
        (Multichain, "multichain"),
        (NoIr, "no IR"),
    ],
    const_var_name: RECEPTOR_SUBTYPES,
}

make_enum! {
    /// How the VJ and VDJ chains of a cell pair up.
    name: ChainPairing,
    variants: [
        (NoIr, "no IR"),
        (OrphanVj, "orphan VJ"),
        (OrphanVdj, "orphan VDJ"),
        (SinglePair, "single pair"),
        (ExtraVj, "extra VJ"),
        (ExtraVdj, "extra VDJ"),
        (TwoFullChains, "two full chains"),
        (Multichain, "multichain"),
        (Ambiguous, "ambiguous"),
    ],
    const_var_name: CHAIN_PAIRINGS,
}

impl CellReceptorProfile {
    /// Receptor class from the loci of all chains, extra chains included.
    pub fn receptor_type(&self) -> ReceptorType {
        if !self.has_ir() {
            return ReceptorType::NoIr;
        }
        if self.is_multichain() {
            return ReceptorType::Multichain;
        }
        let (mut tcr, mut bcr) = (false, false);
        for locus in self.loci() {
            if locus.is_tcr() {
                tcr = true;
            } else {
                bcr = true;
            }
        }
        match (tcr, bcr) {
            (true, false) => ReceptorType::Tcr,
            (false, true) => ReceptorType::Bcr,
            _ => ReceptorType::Ambiguous,
        }
    }

    /// Receptor subtype.  A cell is assigned the narrowest pair of loci that
    /// contains everything it carries.
    pub fn receptor_subtype(&self) -> ReceptorSubtype {
        if !self.has_ir() {
            return ReceptorSubtype::NoIr;
        }
        if self.is_multichain() {
            return ReceptorSubtype::Multichain;
        }
        let mut loci: Vec<Locus> = self.loci().collect();
        loci.sort();
        loci.dedup();
        let within = |allowed: &[Locus]| loci.iter().all(|l| allowed.contains(l));
        if within(&[Locus::TRA, Locus::TRB]) {
            ReceptorSubtype::TraTrb
        } else if within(&[Locus::TRG, Locus::TRD]) {
            ReceptorSubtype::TrgTrd
        } else if loci == [Locus::IGH] {
            ReceptorSubtype::Igh
        } else if within(&[Locus::IGH, Locus::IGK]) {
            ReceptorSubtype::IghIgk
        } else if within(&[Locus::IGH, Locus::IGL]) {
            ReceptorSubtype::IghIgl
        } else {
            ReceptorSubtype::Ambiguous
        }
    }

    /// Classify the chain pairing of the cell.
    pub fn chain_pairing(&self) -> ChainPairing {
        if !self.has_ir() {
            return ChainPairing::NoIr;
        }
        if self.is_multichain() {
            return ChainPairing::Multichain;
        }
        if self.receptor_subtype() == ReceptorSubtype::Ambiguous {
            return ChainPairing::Ambiguous;
        }
        let vj = self.vj.len();
        let vdj = self.vdj.len();
        match (vj, vdj) {
            (_, 0) => ChainPairing::OrphanVj,
            (0, _) => ChainPairing::OrphanVdj,
            (1, 1) => ChainPairing::SinglePair,
            (2, 1) => ChainPairing::ExtraVj,
            (1, 2) => ChainPairing::ExtraVdj,
            _ => ChainPairing::TwoFullChains,
        }
    }
}
