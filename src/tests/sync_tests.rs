use super::*;
use crate::canonical::canonicalize;
use serde_json::json;

fn fp(n: u32) -> Fingerprint {
    canonicalize(&json!({"elements": [], "appState": {"n": n}})).fingerprint
}

#[test]
fn gate_runs_one_flush_at_a_time() {
    let mut gate = FlushGate::default();
    assert!(gate.enter());
    assert!(gate.is_running());
    assert!(!gate.enter());
    assert!(!gate.enter());

    // Two requests while running collapse into one extra pass.
    assert!(gate.leave());
    assert!(gate.is_running());
    assert!(!gate.leave());
    assert!(!gate.is_running());
    assert!(gate.enter());
}

#[test]
fn tracker_moves_through_a_save() {
    let mut t = SaveTracker::default();
    assert_eq!(t.state(), SaveState::Idle);
    assert!(!t.is_dirty());

    assert!(t.record(fp(1)));
    assert_eq!(t.state(), SaveState::Pending);
    t.begin_save();
    assert_eq!(t.state(), SaveState::Saving);
    t.save_succeeded(fp(1));
    assert_eq!(t.state(), SaveState::Saved);
    assert_eq!(t.saved(), Some(&fp(1)));
}

#[test]
fn edit_during_save_stays_pending() {
    let mut t = SaveTracker::default();
    t.record(fp(1));
    t.begin_save();
    assert!(t.record(fp(2)));
    assert_eq!(t.state(), SaveState::Saving);
    t.save_succeeded(fp(1));
    assert_eq!(t.state(), SaveState::Pending);
    assert!(t.is_dirty());
}

#[test]
fn returning_to_saved_document_is_clean() {
    let mut t = SaveTracker::adopted_saved(fp(1));
    assert_eq!(t.state(), SaveState::Saved);
    assert!(t.record(fp(2)));
    assert!(!t.record(fp(1)));
    assert_eq!(t.state(), SaveState::Saved);
}

#[test]
fn failed_save_keeps_change_pending() {
    let mut t = SaveTracker::adopted_pending(fp(2), Some(fp(1)));
    assert_eq!(t.state(), SaveState::Pending);
    t.begin_save();
    t.save_failed();
    assert_eq!(t.state(), SaveState::Error);
    assert!(t.is_dirty());
    assert_eq!(t.current(), Some(&fp(2)));

    t.save_skipped();
    assert_eq!(t.state(), SaveState::Error);
    t.begin_save();
    t.save_succeeded(fp(2));
    assert_eq!(t.state(), SaveState::Saved);
}

#[test]
fn only_latest_debounce_generation_fires() {
    let mut d = Debounce::default();
    let first = d.schedule();
    let second = d.schedule();
    assert!(!d.is_current(first));
    assert!(d.is_current(second));
}

#[test]
fn watchdog_arms_once_until_disarmed() {
    let mut d = Debounce::default();
    assert!(d.arm_watchdog());
    assert!(!d.arm_watchdog());
    d.disarm_watchdog();
    assert!(d.arm_watchdog());
}

#[test]
fn unsynced_copy_is_pending_until_saved_again() {
    let mut t = SaveTracker::adopted_saved(fp(1));
    t.mark_unsynced();
    assert_eq!(t.state(), SaveState::Pending);
    assert!(t.is_dirty());
    assert_eq!(t.saved(), None);

    t.begin_save();
    t.save_succeeded(fp(1));
    assert_eq!(t.state(), SaveState::Saved);

    let mut empty = SaveTracker::default();
    empty.mark_unsynced();
    assert_eq!(empty.state(), SaveState::Idle);
}
