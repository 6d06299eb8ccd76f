use crate::{NodeId, F};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Intersection hypothesis as a bitmask; hypothesis `i` is bit `i`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subset(u64);

impl Subset {
    pub fn from_mask(mask: u64) -> Self {
        Subset(mask)
    }

    /// All of `H1..Hn`.
    pub fn full(n: usize) -> Self {
        Subset(full_mask(n))
    }

    pub fn from_indicator(indicator: &[bool]) -> Self {
        Subset(
            indicator
                .iter()
                .enumerate()
                .filter(|(_, &on)| on)
                .fold(0u64, |mask, (i, _)| mask | (1u64 << i)),
        )
    }

    pub fn from_members(members: &[NodeId]) -> Self {
        Subset(members.iter().fold(0u64, |mask, &i| mask | (1u64 << i)))
    }

    pub fn mask(&self) -> u64 {
        self.0
    }

    pub fn contains(&self, i: NodeId) -> bool {
        i < 64 && (self.0 >> i) & 1 == 1
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn is_subset_of(&self, other: &Subset) -> bool {
        self.0 & !other.0 == 0
    }

    /// Members in ascending order.
    pub fn members(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..64).filter(move |&i| self.contains(i))
    }

    /// Hypotheses among `0..n` that are not members.
    pub fn excluded(&self, n: usize) -> impl Iterator<Item = NodeId> + '_ {
        (0..n).filter(move |&i| !self.contains(i))
    }

    /// 0/1 indicator of length `n`.
    pub fn indicator(&self, n: usize) -> Vec<F> {
        (0..n).map(|i| if self.contains(i) { 1.0 } else { 0.0 }).collect()
    }

    /// `H1∩H3` style label.
    pub fn label(&self, names: &[String]) -> String {
        self.members()
            .filter_map(|i| names.get(i).map(String::as_str))
            .collect::<Vec<_>>()
            .join("∩")
    }
}

fn full_mask(n: usize) -> u64 {
    if n >= 64 {
        u64::MAX
    } else {
        (1u64 << n) - 1
    }
}

/// All non-empty subsets of `n` hypotheses, in descending mask order: the
/// full intersection first, `{H1}` last. Row `r` is mask `2^n - 1 - r`.
#[derive(Clone, Debug)]
pub struct SubsetEnumerator {
    next: u64,
}

impl SubsetEnumerator {
    pub fn new(n: usize) -> Self {
        Self { next: full_mask(n) }
    }
}

impl Iterator for SubsetEnumerator {
    type Item = Subset;

    fn next(&mut self) -> Option<Subset> {
        if self.next == 0 {
            return None;
        }
        let s = Subset(self.next);
        self.next -= 1;
        Some(s)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.next as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for SubsetEnumerator {}

/// `(2^n - 1) × n` membership matrix in enumeration order.
pub fn indicator_matrix(n: usize) -> DMatrix<F> {
    let subsets: Vec<Subset> = SubsetEnumerator::new(n).collect();
    DMatrix::from_fn(subsets.len(), n, |r, c| if subsets[r].contains(c) { 1.0 } else { 0.0 })
}
