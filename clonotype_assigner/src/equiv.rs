// Copyright (c) 2024 10x Genomics, Inc. All rights reserved.

//! Equivalence relation on 0..n, stored as circular linked lists of members plus a
//! class id per element.  Joining always relabels the smaller class, so n joins
//! cost O(n log n) overall and enumerating a class costs O(size of class).

type ElementId = u32;

pub struct EquivRel {
    /// Next member of the class of i, wrapping around.
    next: Vec<ElementId>,
    /// Class id of i.  Class ids are element ids: class c always contains c.
    class: Vec<ElementId>,
    /// Size of class c, 0 once c has been merged away.
    size: Vec<u32>,
}

impl EquivRel {
    /// n singleton classes.
    pub fn new(n: usize) -> EquivRel {
        EquivRel {
            next: (0..n as ElementId).collect(),
            class: (0..n as ElementId).collect(),
            size: vec![1; n],
        }
    }

    pub fn class_of(&self, a: usize) -> usize {
        self.class[a] as usize
    }

    pub fn class_size(&self, a: usize) -> usize {
        self.size[self.class_of(a)] as usize
    }

    /// Merge the classes of a and b.
    pub fn join(&mut self, a: usize, b: usize) {
        let (a, b) = if self.class_size(a) < self.class_size(b) {
            (b, a)
        } else {
            (a, b)
        };
        let keep = self.class[a];
        let gone = self.class[b];
        if keep == gone {
            return;
        }
        // Splice the two rings, then relabel the members that came from b.
        self.next.swap(a, b);
        let mut x = self.next[a] as usize;
        while self.class[x] != keep {
            self.class[x] = keep;
            x = self.next[x] as usize;
        }
        self.size[keep as usize] += self.size[gone as usize];
        self.size[gone as usize] = 0;
    }

    /// Members of the class of a, in ring order.
    pub fn members(&self, a: usize) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.class_size(a));
        let mut x = a;
        loop {
            out.push(x);
            x = self.next[x] as usize;
            if x == a {
                break;
            }
        }
        out
    }

    /// Every class, members sorted, classes ordered by smallest member.
    pub fn classes(&self) -> Vec<Vec<usize>> {
        let mut out: Vec<Vec<usize>> = self
            .size
            .iter()
            .enumerate()
            .filter(|&(_, &s)| s > 0)
            .map(|(c, _)| {
                let mut m = self.members(c);
                m.sort_unstable();
                m
            })
            .collect();
        out.sort_unstable_by_key(|m| m[0]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_join() {
        let mut e = EquivRel::new(6);
        e.join(0, 3);
        e.join(4, 3);
        e.join(1, 2);
        e.join(2, 1);
        assert_eq!(e.class_size(4), 3);
        assert_eq!(e.class_of(0), e.class_of(4));
        assert_ne!(e.class_of(0), e.class_of(1));
        assert_eq!(e.classes(), vec![vec![0, 3, 4], vec![1, 2], vec![5]]);
    }

    proptest! {
        #[test]
        fn prop_matches_naive_labels(joins in prop::collection::vec((0usize..20, 0usize..20), 0..40)) {
            let mut e = EquivRel::new(20);
            let mut naive: Vec<usize> = (0..20).collect();
            for &(a, b) in &joins {
                e.join(a, b);
                let (from, to) = (naive[a], naive[b]);
                for l in naive.iter_mut() {
                    if *l == from {
                        *l = to;
                    }
                }
            }
            for a in 0..20 {
                for b in 0..20 {
                    prop_assert_eq!(e.class_of(a) == e.class_of(b), naive[a] == naive[b]);
                }
                prop_assert_eq!(e.members(a).len(), e.class_size(a));
            }
        }
    }
}
