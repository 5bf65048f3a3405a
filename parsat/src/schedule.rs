//! Restart scheduling.
//!
//! Restarts follow the Luby sequence scaled by a fixed conflict interval.

mod luby;

use luby::LubySequence;

/// Restart scheduling state.
#[derive(Default)]
pub struct Schedule {
    conflicts: u64,
    next_restart: u64,
    restarts: u64,
    luby: LubySequence,
}

impl Schedule {
    /// Draw the first restart interval.
    pub fn prime(&mut self, scale: u64) {
        debug_assert_eq!(self.conflicts, 0);
        self.next_restart = scale * self.luby.advance();
    }

    /// Record a conflict.
    pub fn on_conflict(&mut self) {
        self.conflicts += 1;
    }

    /// Whether the current restart interval is exhausted.
    pub fn restart_due(&self) -> bool {
        self.conflicts >= self.next_restart
    }

    /// Record a performed restart and draw the next interval.
    pub fn restart_performed(&mut self, scale: u64) {
        self.restarts += 1;
        self.next_restart = self.conflicts + scale * self.luby.advance();
    }

    /// Total number of conflicts so far.
    pub fn conflicts(&self) -> u64 {
        self.conflicts
    }

    /// Total number of restarts so far.
    pub fn restarts(&self) -> u64 {
        self.restarts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intervals_follow_scaled_luby_sequence() {
        let mut schedule = Schedule::default();
        schedule.prime(100);

        let mut intervals = vec![];
        for _ in 0..7 {
            let mut interval = 0;
            while !schedule.restart_due() {
                schedule.on_conflict();
                interval += 1;
            }
            intervals.push(interval);
            schedule.restart_performed(100);
        }

        assert_eq!(intervals, vec![100, 100, 200, 100, 100, 200, 400]);
        assert_eq!(schedule.restarts(), 7);
    }
}
