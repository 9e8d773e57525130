use std::ops::{BitAnd, BitOr};

/// A set of term indices of one [`crate::GoGraph`]
///
/// The indices are kept sorted and unique, which makes unions and
/// intersections linear merges.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct TermSet {
    ids: Vec<u32>,
}

impl TermSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ids: Vec::with_capacity(capacity),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Adds the index, returns `false` if it was present already
    pub fn insert(&mut self, idx: u32) -> bool {
        match self.ids.binary_search(&idx) {
            Ok(_) => false,
            Err(pos) => {
                self.ids.insert(pos, idx);
                true
            }
        }
    }

    pub fn contains(&self, idx: u32) -> bool {
        self.ids.binary_search(&idx).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.ids.iter().copied()
    }

    /// Adds all indices of `other`
    pub fn extend_from(&mut self, other: &TermSet) {
        if other.is_empty() {
            return;
        }
        let merged = &*self | other;
        *self = merged;
    }
}

impl FromIterator<u32> for TermSet {
    fn from_iter<T: IntoIterator<Item = u32>>(iter: T) -> Self {
        let mut ids: Vec<u32> = iter.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        Self { ids }
    }
}

impl BitOr for &TermSet {
    type Output = TermSet;

    fn bitor(self, rhs: &TermSet) -> TermSet {
        let mut ids = Vec::with_capacity(self.len() + rhs.len());
        let mut left = self.ids.iter().peekable();
        let mut right = rhs.ids.iter().peekable();
        loop {
            let next = match (left.peek(), right.peek()) {
                (Some(l), Some(r)) if l < r => left.next(),
                (Some(l), Some(r)) if l > r => right.next(),
                (Some(_), Some(_)) => {
                    right.next();
                    left.next()
                }
                (Some(_), None) => left.next(),
                (None, Some(_)) => right.next(),
                (None, None) => break,
            };
            if let Some(idx) = next {
                ids.push(*idx);
            }
        }
        TermSet { ids }
    }
}

impl BitAnd for &TermSet {
    type Output = TermSet;

    fn bitand(self, rhs: &TermSet) -> TermSet {
        let (large, small) = if self.len() > rhs.len() {
            (self, rhs)
        } else {
            (rhs, self)
        };
        TermSet {
            ids: small
                .ids
                .iter()
                .filter(|idx| large.contains(**idx))
                .copied()
                .collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn insert_keeps_order() {
        let mut set = TermSet::new();
        assert!(set.insert(3));
        assert!(set.insert(1));
        assert!(!set.insert(3));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![1, 3]);
        assert!(set.contains(1));
        assert!(!set.contains(2));
    }

    #[test]
    fn union() {
        let a: TermSet = [1, 2, 3].into_iter().collect();
        let b: TermSet = [2, 4].into_iter().collect();
        assert_eq!((&a | &b).iter().collect::<Vec<_>>(), vec![1, 2, 3, 4]);

        let mut c = TermSet::with_capacity(2);
        c.extend_from(&b);
        c.extend_from(&TermSet::new());
        assert_eq!(c, b);
    }

    #[test]
    fn intersection() {
        let a: TermSet = [1, 2, 3].into_iter().collect();
        let b: TermSet = [5, 4, 2, 1].into_iter().collect();
        assert_eq!((&a & &b).iter().collect::<Vec<_>>(), vec![1, 2]);
    }
}
