//! Per-member attempt counts.
//!
//! Absence means zero: a member with no entry has a clean record, and
//! clearing a record is just removal. State lives for the process lifetime
//! only; a restart forgives everyone.

use std::collections::HashMap;

use tracing::debug;

use crate::gateway::MemberId;

#[derive(Debug)]
pub struct AttemptLedger {
    counts: HashMap<MemberId, u32>,
}

impl AttemptLedger {
    pub fn new() -> Self {
        Self {
            counts: HashMap::new(),
        }
    }

    /// Current attempt count, zero for unknown members.
    pub fn get(&self, member: MemberId) -> u32 {
        self.counts.get(&member).copied().unwrap_or(0)
    }

    /// Record one more lapsed attempt and return the new count.
    pub fn increment(&mut self, member: MemberId) -> u32 {
        let count = self.counts.entry(member).or_insert(0);
        *count = count.saturating_add(1);
        debug!(member = %member, attempts = *count, "Attempt recorded");
        *count
    }

    /// Wipe a member's record. No-op for members without one.
    pub fn reset(&mut self, member: MemberId) {
        if self.counts.remove(&member).is_some() {
            debug!(member = %member, "Attempt count cleared");
        }
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl Default for AttemptLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_member_has_zero_attempts() {
        let ledger = AttemptLedger::new();
        assert_eq!(ledger.get(MemberId(1)), 0);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_increment_returns_new_count() {
        let mut ledger = AttemptLedger::new();
        assert_eq!(ledger.increment(MemberId(1)), 1);
        assert_eq!(ledger.increment(MemberId(1)), 2);
        assert_eq!(ledger.get(MemberId(1)), 2);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_reset_clears_only_that_member() {
        let mut ledger = AttemptLedger::new();
        ledger.increment(MemberId(1));
        ledger.increment(MemberId(2));

        ledger.reset(MemberId(1));
        assert_eq!(ledger.get(MemberId(1)), 0);
        assert_eq!(ledger.get(MemberId(2)), 1);
    }

    #[test]
    fn test_reset_unknown_member_is_noop() {
        let mut ledger = AttemptLedger::new();
        ledger.reset(MemberId(9));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_count_saturates() {
        let mut ledger = AttemptLedger::new();
        ledger.counts.insert(MemberId(1), u32::MAX);
        assert_eq!(ledger.increment(MemberId(1)), u32::MAX);
    }
}
