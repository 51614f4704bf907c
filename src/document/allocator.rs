//! Candidate id allocation and deduplication.
//!
//! Ids are allocated as `max(existing) + 1`, so they only ever grow within a
//! workspace and gaps are never refilled. Once `u32::MAX` is taken there is
//! nothing left to allocate.

use std::collections::HashSet;

use super::model::{SolutionCandidate, SolutionSpace};

/// Hands out ids for new solution candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateAllocator {
    next: Option<u32>,
}

impl CandidateAllocator {
    /// Start after the highest id in `candidates`.
    pub fn after(candidates: &[SolutionCandidate]) -> Self {
        let max = candidates.iter().map(|c| c.id).max().unwrap_or(0);
        Self { next: max.checked_add(1) }
    }

    /// Start after the highest id in an optional solution space.
    pub fn for_space(space: Option<&SolutionSpace>) -> Self {
        space.map(|s| Self::after(&s.candidates)).unwrap_or(Self { next: Some(1) })
    }

    /// The id the next call to [`allocate`](Self::allocate) returns.
    pub fn peek(&self) -> Option<u32> {
        self.next
    }

    /// Allocate the next id, or `None` once the id space is used up.
    pub fn allocate(&mut self) -> Option<u32> {
        let id = self.next?;
        self.next = id.checked_add(1);
        Some(id)
    }
}

/// Keep only the first occurrence of each candidate id, in stored order.
pub fn dedup_by_id(candidates: Vec<SolutionCandidate>) -> Vec<SolutionCandidate> {
    let mut seen = HashSet::with_capacity(candidates.len());
    candidates.into_iter().filter(|c| seen.insert(c.id)).collect()
}

/// Deduplicate a loaded solution space.
pub fn sanitize(mut space: SolutionSpace) -> SolutionSpace {
    let before = space.candidates.len();
    space.candidates = dedup_by_id(space.candidates);

    let dropped = before - space.candidates.len();
    if dropped > 0 {
        tracing::warn!(dropped, "Dropped solution candidates with duplicate ids");
    }

    space
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: u32, hypothesis: &str) -> SolutionCandidate {
        SolutionCandidate {
            id,
            hypothesis: hypothesis.to_string(),
            model: String::new(),
            reasoning: String::new(),
        }
    }

    #[test]
    fn test_allocator_starts_at_one() {
        let mut alloc = CandidateAllocator::for_space(None);
        assert_eq!(alloc.allocate(), Some(1));
        assert_eq!(alloc.allocate(), Some(2));
    }

    #[test]
    fn test_allocator_uses_max_not_len() {
        let candidates = vec![candidate(2, "a"), candidate(7, "b"), candidate(4, "c")];
        let mut alloc = CandidateAllocator::after(&candidates);
        assert_eq!(alloc.peek(), Some(8));
        assert_eq!(alloc.allocate(), Some(8));
        assert_eq!(alloc.peek(), Some(9));
    }

    #[test]
    fn test_allocator_never_reuses_max_id() {
        let mut alloc = CandidateAllocator::after(&[candidate(u32::MAX, "last")]);
        assert_eq!(alloc.peek(), None);
        assert_eq!(alloc.allocate(), None);

        let mut alloc = CandidateAllocator::after(&[candidate(u32::MAX - 1, "almost")]);
        assert_eq!(alloc.allocate(), Some(u32::MAX));
        assert_eq!(alloc.allocate(), None);
    }

    #[test]
    fn test_allocator_empty_space() {
        let space = SolutionSpace::default();
        assert_eq!(CandidateAllocator::for_space(Some(&space)).peek(), Some(1));
    }

    #[test]
    fn test_dedup_keeps_first_in_order() {
        let candidates = vec![candidate(3, "first"), candidate(3, "dup"), candidate(5, "five")];
        let deduped = dedup_by_id(candidates);
        assert_eq!(deduped.iter().map(|c| c.id).collect::<Vec<_>>(), vec![3, 5]);
        assert_eq!(deduped[0].hypothesis, "first");
    }

    #[test]
    fn test_sanitize_preserves_comparison() {
        let space = SolutionSpace {
            candidates: vec![candidate(1, "a"), candidate(1, "b")],
            comparison: None,
            simplification_feedback: Some("drop the cache".to_string()),
        };
        let clean = sanitize(space);
        assert_eq!(clean.len(), 1);
        assert_eq!(clean.simplification_feedback.as_deref(), Some("drop the cache"));
    }
}
