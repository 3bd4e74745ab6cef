//! One-shot engine timers as plain deadlines.
//!
//! The engine never spawns anything. Each timer is a deadline owned by the
//! engine: scheduling replaces any pending deadline of the same kind, firing
//! clears it, and cancelling clears it without firing. Whoever drives the
//! engine either sleeps until [`Timers::next_deadline`] or simply lets the
//! next frame poll them.

use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// End of the initial face-detection window after `start_detection`.
    FaceDeadline,
    /// Clears the transient blink indicator.
    BlinkReset,
}

#[derive(Debug, Clone, Default)]
pub struct Timers {
    face_deadline: Option<Instant>,
    blink_reset: Option<Instant>,
}

impl Timers {
    fn slot(&mut self, kind: TimerKind) -> &mut Option<Instant> {
        match kind {
            TimerKind::FaceDeadline => &mut self.face_deadline,
            TimerKind::BlinkReset => &mut self.blink_reset,
        }
    }

    pub fn schedule(&mut self, kind: TimerKind, at: Instant) {
        *self.slot(kind) = Some(at);
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        *self.slot(kind) = None;
    }

    pub fn cancel_all(&mut self) {
        self.face_deadline = None;
        self.blink_reset = None;
    }

    pub fn is_pending(&self, kind: TimerKind) -> bool {
        match kind {
            TimerKind::FaceDeadline => self.face_deadline.is_some(),
            TimerKind::BlinkReset => self.blink_reset.is_some(),
        }
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.face_deadline, self.blink_reset) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Remove and return every timer due at `now`, earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<TimerKind> {
        let mut due: Vec<(Instant, TimerKind)> = Vec::with_capacity(2);
        for kind in [TimerKind::FaceDeadline, TimerKind::BlinkReset] {
            let slot = self.slot(kind);
            if let Some(at) = *slot {
                if at <= now {
                    *slot = None;
                    due.push((at, kind));
                }
            }
        }
        due.sort_by_key(|(at, _)| *at);
        due.into_iter().map(|(_, kind)| kind).collect()
    }
}
