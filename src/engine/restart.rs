//! Conflict-count based restarts following the Luby sequence
//! (1, 1, 2, 1, 1, 2, 4, ...), scaled by a configurable unit. Restarting
//! unwinds to level 0 but keeps learned nogoods and literal activities.

#[derive(Debug)]
pub(crate) struct RestartStrategy {
    unit: u64,
    sequence_index: u64,
    conflicts_since_restart: u64,
}

impl RestartStrategy {
    pub(crate) fn new(unit: u64) -> RestartStrategy {
        RestartStrategy {
            unit: unit.max(1),
            sequence_index: 1,
            conflicts_since_restart: 0,
        }
    }

    /// Registers one conflict; returns true when a restart is due.
    pub(crate) fn on_conflict(&mut self) -> bool {
        self.conflicts_since_restart += 1;
        if self.conflicts_since_restart >= luby(self.sequence_index) * self.unit {
            self.sequence_index += 1;
            self.conflicts_since_restart = 0;
            true
        } else {
            false
        }
    }
}

/// The i-th element (1-based) of the Luby sequence.
fn luby(i: u64) -> u64 {
    let mut k = 1;
    while (1 << (k + 1)) - 1 <= i {
        k += 1;
    }
    if i == (1 << k) - 1 {
        1 << (k - 1)
    } else {
        luby(i - (1 << k) + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::luby;
    use super::RestartStrategy;

    #[test]
    fn luby_prefix() {
        let prefix: Vec<u64> = (1..=15).map(luby).collect();
        assert_eq!(prefix, vec![1, 1, 2, 1, 1, 2, 4, 1, 1, 2, 1, 1, 2, 4, 8]);
    }

    #[test]
    fn restarts_follow_the_scaled_sequence() {
        let mut strategy = RestartStrategy::new(2);
        let restarts: Vec<bool> = (0..6).map(|_| strategy.on_conflict()).collect();
        // Thresholds: 1*2 = 2 conflicts, then 1*2 = 2, then 2*2 = ...
        assert_eq!(restarts, vec![false, true, false, true, false, false]);
    }
}
