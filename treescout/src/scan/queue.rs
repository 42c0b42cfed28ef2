//! Dual-priority target queue.
//!
//! Two insertion-ordered maps keyed by path. A path lives in at most one
//! tier at a time; inserting re-classifies and drops any previous entry.
//! Targets leave the queue the moment they are dequeued and never persist
//! beyond one scan attempt.

use indexmap::IndexMap;

use crate::tree::ScanTarget;

/// Priority tier of a scan target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    /// User-visible paths, drained first.
    Primary,
    /// Paths matching the ignore policy (dependency trees and similar).
    Deferred,
}

/// Deduplicating two-tier FIFO of scan targets.
#[derive(Debug, Default)]
pub struct TargetQueue {
    primary: IndexMap<String, ScanTarget>,
    deferred: IndexMap<String, ScanTarget>,
}

impl TargetQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a target in the given tier, dropping any previous entry
    /// for the same path from either tier.
    pub fn insert(&mut self, target: ScanTarget, priority: Priority) {
        self.primary.shift_remove(&target.path);
        self.deferred.shift_remove(&target.path);
        match priority {
            Priority::Primary => self.primary.insert(target.path.clone(), target),
            Priority::Deferred => self.deferred.insert(target.path.clone(), target),
        };
    }

    /// Remove a path from whichever tier holds it.
    pub fn remove(&mut self, path: &str) -> bool {
        self.primary.shift_remove(path).is_some() | self.deferred.shift_remove(path).is_some()
    }

    /// Dequeue the next target: the oldest primary entry, falling back to
    /// the oldest deferred entry.
    pub fn pop_next(&mut self) -> Option<(ScanTarget, Priority)> {
        if let Some((_, target)) = self.primary.shift_remove_index(0) {
            return Some((target, Priority::Primary));
        }
        self.deferred
            .shift_remove_index(0)
            .map(|(_, target)| (target, Priority::Deferred))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.primary.contains_key(path) || self.deferred.contains_key(path)
    }

    pub fn primary_len(&self) -> usize {
        self.primary.len()
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    pub fn len(&self) -> usize {
        self.primary.len() + self.deferred.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.deferred.is_empty()
    }

    pub fn clear(&mut self) {
        self.primary.clear();
        self.deferred.clear();
    }
}
