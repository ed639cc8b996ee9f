// Copyright (c) 2024 10x Genomics, Inc. All rights reserved.

use ir_neighbors::LabelScheme;
use sha2::{Digest, Sha256};

/// Number of hex digits kept from the member hash.
const HASH_PREFIX_LEN: usize = 16;

/// Order clusters of cell ids by decreasing size, then smallest member, and label
/// them.  Members must be sorted.  Labels depend only on membership.
pub fn label_clusters(
    mut clusters: Vec<Vec<String>>,
    scheme: LabelScheme,
) -> Vec<(String, Vec<String>)> {
    clusters.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a[0].cmp(&b[0])));
    clusters
        .into_iter()
        .enumerate()
        .map(|(i, members)| {
            let label = match scheme {
                LabelScheme::Index => i.to_string(),
                LabelScheme::SmallestMember => members[0].clone(),
                LabelScheme::MemberHash => member_hash(&members),
            };
            (label, members)
        })
        .collect()
}

fn member_hash(members: &[String]) -> String {
    let mut hasher = Sha256::new();
    for m in members {
        hasher.update(m.as_bytes());
        hasher.update(b"\n");
    }
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(HASH_PREFIX_LEN);
    hex
}
