// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ephemeral daily rate windows.
//!
//! Counters are held in memory only and reset lazily when the stored day
//! key differs from the current UTC calendar day. Nothing is persisted: a
//! process restart forgets the day's counts, which is acceptable for
//! plan-enforcement and anti-abuse ceilings.
//!
//! Day boundary: UTC, server-side, for every tenant. One consistent reset
//! instant beats per-tenant timezone bookkeeping here.

use chrono::NaiveDate;
use dashmap::DashMap;

#[derive(Debug, Clone, Copy)]
struct DayWindow {
    day: NaiveDate,
    count: u32,
}

/// In-memory daily counters keyed by an arbitrary scope string
/// (`tenant:{id}`, `conversation:{id}`).
#[derive(Default)]
pub struct RateWindows {
    windows: DashMap<String, DayWindow>,
}

impl RateWindows {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take one slot from the window, rolling it over if the day changed.
    ///
    /// Returns `false` without consuming when the window is exhausted.
    /// The DashMap entry guard makes the check-and-increment atomic per key.
    pub fn try_acquire(&self, key: &str, limit: u32, today: NaiveDate) -> bool {
        let mut entry = self
            .windows
            .entry(key.to_string())
            .or_insert(DayWindow { day: today, count: 0 });
        if entry.day != today {
            entry.day = today;
            entry.count = 0;
        }
        if entry.count >= limit {
            return false;
        }
        entry.count += 1;
        true
    }

    /// Return a previously acquired slot (used to roll back the tenant
    /// window when the conversation window rejects).
    pub fn release(&self, key: &str, today: NaiveDate) {
        if let Some(mut entry) = self.windows.get_mut(key)
            && entry.day == today
            && entry.count > 0
        {
            entry.count -= 1;
        }
    }

    /// Current count for a key, zero if absent or from a previous day.
    pub fn count(&self, key: &str, today: NaiveDate) -> u32 {
        self.windows
            .get(key)
            .filter(|w| w.day == today)
            .map(|w| w.count)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn acquire_up_to_limit_then_reject() {
        let windows = RateWindows::new();
        let today = day("2026-02-01");
        for _ in 0..3 {
            assert!(windows.try_acquire("tenant:t1", 3, today));
        }
        assert!(!windows.try_acquire("tenant:t1", 3, today));
        assert_eq!(windows.count("tenant:t1", today), 3);
    }

    #[test]
    fn keys_are_independent() {
        let windows = RateWindows::new();
        let today = day("2026-02-01");
        assert!(windows.try_acquire("tenant:t1", 1, today));
        assert!(!windows.try_acquire("tenant:t1", 1, today));
        assert!(windows.try_acquire("tenant:t2", 1, today));
    }

    #[test]
    fn day_rollover_resets_count() {
        let windows = RateWindows::new();
        let monday = day("2026-02-02");
        let tuesday = day("2026-02-03");
        assert!(windows.try_acquire("conversation:c1", 1, monday));
        assert!(!windows.try_acquire("conversation:c1", 1, monday));
        // Next UTC day: the window resets lazily.
        assert!(windows.try_acquire("conversation:c1", 1, tuesday));
        assert_eq!(windows.count("conversation:c1", tuesday), 1);
    }

    #[test]
    fn release_returns_a_slot() {
        let windows = RateWindows::new();
        let today = day("2026-02-01");
        assert!(windows.try_acquire("tenant:t1", 1, today));
        windows.release("tenant:t1", today);
        assert!(windows.try_acquire("tenant:t1", 1, today));
    }

    #[test]
    fn release_on_empty_window_is_a_noop() {
        let windows = RateWindows::new();
        let today = day("2026-02-01");
        windows.release("tenant:t1", today);
        assert_eq!(windows.count("tenant:t1", today), 0);
    }

    #[test]
    fn count_ignores_stale_days() {
        let windows = RateWindows::new();
        let monday = day("2026-02-02");
        let tuesday = day("2026-02-03");
        windows.try_acquire("tenant:t1", 10, monday);
        assert_eq!(windows.count("tenant:t1", tuesday), 0);
    }
}
