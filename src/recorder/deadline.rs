//! Cancellable deadlines polled by the frame driver

use std::time::Instant;

/// A one-shot deadline
///
/// Nothing fires on its own: the owner polls [`Deadline::fire_if_due`] with
/// the current time. A fired or cancelled deadline stays inert until armed
/// again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline {
    due: Option<Instant>,
}

impl Deadline {
    pub fn at(due: Instant) -> Self {
        Self { due: Some(due) }
    }

    /// Arm (or re-arm) the deadline for `due`
    pub fn arm(&mut self, due: Instant) {
        self.due = Some(due);
    }

    pub fn cancel(&mut self) {
        self.due = None;
    }

    pub fn due(&self) -> Option<Instant> {
        self.due
    }

    pub fn is_armed(&self) -> bool {
        self.due.is_some()
    }

    /// Fire once `now` has reached the due time, disarming the deadline
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.due {
            Some(due) if now >= due => {
                self.due = None;
                true
            }
            _ => false,
        }
    }
}
