//! Score-ordered member set
//!
//! Members are kept in two structures: a hash from member to score for O(1)
//! lookups, and a `BTreeSet` of `(score, member)` for rank and range scans.
//! Ties on score are broken by member bytes, which is what makes
//! lexicographic range queries over equal-score sets meaningful.

use ratchet_core::{LexBound, ScoreBound};
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::ops::Bound;

/// Totally ordered score wrapper. NaN never enters a set.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Score(f64);

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// A sorted set of unique members.
#[derive(Debug, Clone, Default)]
pub struct SortedSet {
    scores: FxHashMap<String, f64>,
    order: BTreeSet<(Score, String)>,
}

impl SortedSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Whether the set has no members
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Score of `member`
    pub fn score(&self, member: &str) -> Option<f64> {
        self.scores.get(member).copied()
    }

    /// Insert or update. Returns `true` if the member is new.
    pub fn insert(&mut self, member: &str, score: f64) -> bool {
        match self.scores.insert(member.to_string(), score) {
            Some(old) => {
                self.order.remove(&(Score(old), member.to_string()));
                self.order.insert((Score(score), member.to_string()));
                false
            }
            None => {
                self.order.insert((Score(score), member.to_string()));
                true
            }
        }
    }

    /// Remove `member`. Returns `true` if it was present.
    pub fn remove(&mut self, member: &str) -> bool {
        match self.scores.remove(member) {
            Some(old) => {
                self.order.remove(&(Score(old), member.to_string()));
                true
            }
            None => false,
        }
    }

    /// Add `delta` to the member's score (missing members start at 0).
    pub fn increment(&mut self, member: &str, delta: f64) -> f64 {
        let next = self.score(member).unwrap_or(0.0) + delta;
        self.insert(member, next);
        next
    }

    /// Members in ascending `(score, member)` order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.order.iter().map(|(s, m)| (m.as_str(), s.0))
    }

    /// Inclusive rank range with negative indices counted from the end.
    pub fn range_by_rank(&self, start: i64, stop: i64) -> Vec<(String, f64)> {
        match normalize_ranks(self.len(), start, stop) {
            Some((from, to)) => self
                .order
                .iter()
                .skip(from)
                .take(to - from + 1)
                .map(|(s, m)| (m.clone(), s.0))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Members with `min <= score <= max` (per bound), highest score first.
    pub fn rev_range_by_score(
        &self,
        max: ScoreBound,
        min: ScoreBound,
        limit: Option<usize>,
    ) -> Vec<(String, f64)> {
        self.order
            .iter()
            .rev()
            .filter(|(s, _)| max.admits_from_above(s.0) && min.admits_from_below(s.0))
            .take(limit.unwrap_or(usize::MAX))
            .map(|(s, m)| (m.clone(), s.0))
            .collect()
    }

    /// Members between two lexicographic bounds, in set order.
    ///
    /// When every member shares one score the scan starts at `min` instead
    /// of the front of the set, so cursor-style paging costs O(log n) per page.
    pub fn range_by_lex(&self, min: &LexBound, max: &LexBound, limit: Option<usize>) -> Vec<String> {
        let limit = limit.unwrap_or(usize::MAX);
        match self.uniform_score() {
            Some(score) => {
                let lower = match min {
                    LexBound::Unbounded => Bound::Unbounded,
                    LexBound::Inclusive(m) => Bound::Included((score, m.clone())),
                    LexBound::Exclusive(m) => Bound::Excluded((score, m.clone())),
                };
                self.order
                    .range((lower, Bound::Unbounded))
                    .take_while(|(_, m)| max.admits_from_above(m))
                    .take(limit)
                    .map(|(_, m)| m.clone())
                    .collect()
            }
            None => self
                .order
                .iter()
                .filter(|(_, m)| min.admits_from_below(m) && max.admits_from_above(m))
                .take(limit)
                .map(|(_, m)| m.clone())
                .collect(),
        }
    }

    /// The shared score if the set is non-empty and all scores are equal.
    fn uniform_score(&self) -> Option<Score> {
        let (first, _) = self.order.first()?;
        let (last, _) = self.order.last()?;
        (first == last).then_some(*first)
    }

    /// Remove an inclusive rank range. Returns how many members were removed.
    pub fn remove_range_by_rank(&mut self, start: i64, stop: i64) -> usize {
        let doomed: Vec<String> = self
            .range_by_rank(start, stop)
            .into_iter()
            .map(|(m, _)| m)
            .collect();
        for member in &doomed {
            self.remove(member);
        }
        doomed.len()
    }
}

/// Resolve store-style inclusive ranks against a length.
///
/// Returns `None` when the range selects nothing.
pub(crate) fn normalize_ranks(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len || stop < 0 {
        return None;
    }
    Some((start as usize, stop as usize))
}
