//! Save bookkeeping for one scene: the save-state machine, the single-flight
//! flush gate and debounce generations. No I/O and no timers live here; the
//! workspace drives these from its tasks.

use crate::canonical::Fingerprint;
use crate::model::SaveState;

/// Single-flight guard. While a flush runs, further requests only set the
/// rerun flag, and the running flush loops exactly once more for them.
#[derive(Debug, Default)]
pub struct FlushGate {
    running: bool,
    rerun: bool,
}

impl FlushGate {
    /// True when the caller should run the flush; false when one is already
    /// running (a follow-up run has been requested instead).
    pub fn enter(&mut self) -> bool {
        if self.running {
            self.rerun = true;
            return false;
        }
        self.running = true;
        true
    }

    /// Called by the runner after each pass. True means run again.
    pub fn leave(&mut self) -> bool {
        if self.rerun {
            self.rerun = false;
            return true;
        }
        self.running = false;
        false
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

/// Tracks the current and last-saved fingerprints and derives `SaveState`.
/// `Saved` holds only while the two are equal.
#[derive(Debug)]
pub struct SaveTracker {
    state: SaveState,
    current: Option<Fingerprint>,
    saved: Option<Fingerprint>,
}

impl Default for SaveTracker {
    fn default() -> Self {
        Self {
            state: SaveState::Idle,
            current: None,
            saved: None,
        }
    }
}

impl SaveTracker {
    /// Document adopted from a copy the remote already holds.
    pub fn adopted_saved(fp: Fingerprint) -> Self {
        Self {
            state: SaveState::Saved,
            current: Some(fp.clone()),
            saved: Some(fp),
        }
    }

    /// Document adopted from local edits the remote has not seen.
    pub fn adopted_pending(current: Fingerprint, saved: Option<Fingerprint>) -> Self {
        let mut t = Self {
            state: SaveState::Pending,
            current: None,
            saved,
        };
        t.record(current);
        t
    }

    pub fn state(&self) -> SaveState {
        self.state
    }

    pub fn saved(&self) -> Option<&Fingerprint> {
        self.saved.as_ref()
    }

    pub fn current(&self) -> Option<&Fingerprint> {
        self.current.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.current.is_some() && self.current != self.saved
    }

    /// Returns true when the new document differs from what the remote holds.
    pub fn record(&mut self, fp: Fingerprint) -> bool {
        self.current = Some(fp);
        if self.is_dirty() {
            if self.state != SaveState::Saving {
                self.state = SaveState::Pending;
            }
            true
        } else {
            if self.state != SaveState::Saving {
                self.state = SaveState::Saved;
            }
            false
        }
    }

    /// The remote is behind the current document even though the fingerprints
    /// agree; forget the saved one so the next flush writes again.
    pub fn mark_unsynced(&mut self) {
        if self.current.is_none() {
            return;
        }
        self.saved = None;
        if self.state != SaveState::Saving {
            self.state = SaveState::Pending;
        }
    }

    pub fn begin_save(&mut self) {
        self.state = SaveState::Saving;
    }

    pub fn save_succeeded(&mut self, flushed: Fingerprint) {
        self.saved = Some(flushed);
        self.state = if self.is_dirty() {
            SaveState::Pending
        } else {
            SaveState::Saved
        };
    }

    /// A failed write leaves the pending change in place for the next trigger.
    pub fn save_failed(&mut self) {
        self.state = SaveState::Error;
    }

    /// Nothing to write: the remote already holds the current document.
    pub fn save_skipped(&mut self) {
        if !self.is_dirty() {
            self.state = SaveState::Saved;
        }
    }
}

/// Debounce bookkeeping. Each schedule supersedes the previous one; a timer
/// only fires if its generation is still current.
#[derive(Debug, Default)]
pub struct Debounce {
    generation: u64,
    watchdog_armed: bool,
}

impl Debounce {
    pub fn schedule(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// True when the caller should start a watchdog timer.
    pub fn arm_watchdog(&mut self) -> bool {
        if self.watchdog_armed {
            return false;
        }
        self.watchdog_armed = true;
        true
    }

    pub fn disarm_watchdog(&mut self) {
        self.watchdog_armed = false;
    }
}

#[cfg(test)]
#[path = "tests/sync_tests.rs"]
mod tests;
