use std::collections::HashMap;

use crate::term::internal::GoTermInternal;
use crate::term::GoTermId;

/// Owns all terms of a graph, addressed by a dense `u32` index
#[derive(Debug, Default)]
pub(crate) struct Arena {
    terms: Vec<GoTermInternal>,
    ids: HashMap<GoTermId, u32>,
}

impl Arena {
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Adds the term and returns its index
    ///
    /// Returns `None` if a term with the same id exists or the arena is full
    pub fn insert(&mut self, term: GoTermInternal) -> Option<u32> {
        if self.ids.contains_key(&term.id()) {
            return None;
        }
        let idx = u32::try_from(self.terms.len()).ok()?;
        self.ids.insert(term.id(), idx);
        self.terms.push(term);
        Some(idx)
    }

    /// The index of the term with the primary id `id`
    pub fn index_of(&self, id: GoTermId) -> Option<u32> {
        self.ids.get(&id).copied()
    }

    /// # Panics
    ///
    /// If `idx` is not a valid index of this arena
    pub fn get_unchecked(&self, idx: u32) -> &GoTermInternal {
        &self.terms[idx as usize]
    }

    /// # Panics
    ///
    /// If `idx` is not a valid index of this arena
    pub fn get_unchecked_mut(&mut self, idx: u32) -> &mut GoTermInternal {
        &mut self.terms[idx as usize]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GoTermInternal> {
        self.terms.iter()
    }

    /// All valid indices in ascending order
    pub fn indices(&self) -> std::ops::Range<u32> {
        // insert guarantees that the length fits into u32
        0..u32::try_from(self.terms.len()).unwrap_or(u32::MAX)
    }
}
