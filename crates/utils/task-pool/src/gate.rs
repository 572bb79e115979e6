use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
struct GateState {
    paused: bool,
    closed: bool,
}

/// Check-in point workers pass before starting each task.
///
/// While paused, `check_in` blocks; work that already passed the gate keeps
/// running. `resume` wakes every blocked worker. `close` wakes them too and
/// makes every later check-in fail, which is how pool shutdown gets workers
/// out of a pause.
#[derive(Debug, Default)]
pub struct PauseGate {
    // mirrors `state.paused || state.closed` for the unlocked fast path
    blocked: AtomicBool,
    state: Mutex<GateState>,
    unpaused: Condvar,
}

/// Returned by [`PauseGate::check_in`] once the gate has been closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateClosed;

impl PauseGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block while paused. `Err(GateClosed)` once the gate is closed.
    pub fn check_in(&self) -> Result<(), GateClosed> {
        if !self.blocked.load(Ordering::Acquire) {
            return Ok(());
        }

        let mut state = self.state.lock();
        while state.paused && !state.closed {
            self.unpaused.wait(&mut state);
        }

        if state.closed {
            Err(GateClosed)
        } else {
            Ok(())
        }
    }

    /// Returns `false` if the gate was already paused.
    pub fn pause(&self) -> bool {
        let mut state = self.state.lock();
        let changed = !state.paused;
        state.paused = true;
        self.blocked.store(true, Ordering::Release);
        changed
    }

    /// Returns `false` if the gate was not paused.
    pub fn resume(&self) -> bool {
        let mut state = self.state.lock();
        if !state.paused {
            return false;
        }
        state.paused = false;
        self.blocked.store(state.closed, Ordering::Release);
        self.unpaused.notify_all();
        true
    }

    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.blocked.store(true, Ordering::Release);
        self.unpaused.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}
