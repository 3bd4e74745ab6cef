use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Per-session frame throttle.
///
/// The detector may deliver frames faster than the liveness protocol needs.
/// A frame is admitted only if at least `min_interval` has passed since the
/// previous admitted frame of the same session; anything sooner is dropped
/// without touching the engine.
pub struct FrameRateLimiter {
    min_interval: Duration,
    last_admitted: HashMap<String, Instant>,
}

impl FrameRateLimiter {
    pub fn new(fps_limit: u32) -> Self {
        Self {
            min_interval: Duration::from_millis(1000 / u64::from(fps_limit.max(1))),
            last_admitted: HashMap::new(),
        }
    }

    /// Return `true` if the session's frame at `now` should be processed.
    pub fn admit(&mut self, session: &str, now: Instant) -> bool {
        match self.last_admitted.get_mut(session) {
            Some(last) if now.saturating_duration_since(*last) < self.min_interval => {
                tracing::trace!(session, "frame dropped by rate limiter");
                false
            }
            Some(last) => {
                *last = now;
                true
            }
            None => {
                self.last_admitted.insert(session.to_string(), now);
                true
            }
        }
    }

    /// Drop bookkeeping for a closed or reset session.
    pub fn forget(&mut self, session: &str) {
        self.last_admitted.remove(session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_frame_is_admitted() {
        let mut rl = FrameRateLimiter::new(15);
        assert!(rl.admit("a", Instant::now()));
    }

    #[test]
    fn test_frames_faster_than_limit_are_dropped() {
        let t0 = Instant::now();
        let mut rl = FrameRateLimiter::new(15); // 66 ms
        assert!(rl.admit("a", t0));
        assert!(!rl.admit("a", t0 + Duration::from_millis(30)));
        assert!(!rl.admit("a", t0 + Duration::from_millis(65)));
        assert!(rl.admit("a", t0 + Duration::from_millis(66)));
    }

    #[test]
    fn test_dropped_frames_do_not_extend_the_interval() {
        let t0 = Instant::now();
        let mut rl = FrameRateLimiter::new(10);
        assert!(rl.admit("a", t0));
        assert!(!rl.admit("a", t0 + Duration::from_millis(90)));
        assert!(rl.admit("a", t0 + Duration::from_millis(100)));
    }

    #[test]
    fn test_independent_per_session() {
        let t0 = Instant::now();
        let mut rl = FrameRateLimiter::new(15);
        assert!(rl.admit("a", t0));
        assert!(rl.admit("b", t0));
        assert!(!rl.admit("a", t0 + Duration::from_millis(10)));
    }

    #[test]
    fn test_forget_clears_history() {
        let t0 = Instant::now();
        let mut rl = FrameRateLimiter::new(15);
        rl.admit("a", t0);
        rl.forget("a");
        assert!(rl.admit("a", t0 + Duration::from_millis(1)));
    }
}
