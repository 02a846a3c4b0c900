use std::time::{Duration, Instant};

/// A restartable one-shot timer.
///
/// Each `restart` pushes the deadline one window past `now`; the timer fires
/// once the clock reaches the deadline with no restart in between.
#[derive(Debug, Clone)]
pub struct Debounce {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn restart(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns true exactly once per armed period, when `now` has reached
    /// the deadline.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Independent debounce timers for additions and removals, so a steady
/// stream of one never holds back publication of the other.
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    additions: Debounce,
    removals: Debounce,
}

impl BatchScheduler {
    pub fn new(window: Duration) -> Self {
        Self {
            additions: Debounce::new(window),
            removals: Debounce::new(window),
        }
    }

    pub fn note_addition(&mut self, now: Instant) {
        self.additions.restart(now);
    }

    pub fn note_removal(&mut self, now: Instant) {
        self.removals.restart(now);
    }

    /// Fires whichever timers are due. True if at least one fired.
    pub fn poll(&mut self, now: Instant) -> bool {
        let added = self.additions.fire(now);
        let removed = self.removals.fire(now);
        added || removed
    }

    pub fn cancel(&mut self) {
        self.additions.cancel();
        self.removals.cancel();
    }

    pub fn is_idle(&self) -> bool {
        !self.additions.is_pending() && !self.removals.is_pending()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.additions.deadline(), self.removals.deadline()) {
            (Some(a), Some(r)) => Some(a.min(r)),
            (a, r) => a.or(r),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(100);

    #[test]
    fn restart_pushes_deadline() {
        let t0 = Instant::now();
        let mut d = Debounce::new(WINDOW);
        d.restart(t0);
        d.restart(t0 + Duration::from_millis(60));
        assert!(!d.fire(t0 + Duration::from_millis(120)));
        assert!(d.fire(t0 + Duration::from_millis(160)));
        assert!(!d.fire(t0 + Duration::from_millis(500)));
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let t0 = Instant::now();
        let mut d = Debounce::new(WINDOW);
        d.restart(t0);
        d.cancel();
        assert!(!d.fire(t0 + Duration::from_secs(1)));
    }

    #[test]
    fn removals_are_not_starved_by_additions() {
        let t0 = Instant::now();
        let mut s = BatchScheduler::new(WINDOW);
        s.note_removal(t0);
        // an addition every 50ms keeps the addition timer from ever firing
        for step in 1..=4u64 {
            s.note_addition(t0 + Duration::from_millis(step * 50));
        }
        assert_eq!(s.next_deadline(), Some(t0 + WINDOW));
        assert!(s.poll(t0 + WINDOW));
        assert!(!s.is_idle());
        assert_eq!(s.next_deadline(), Some(t0 + Duration::from_millis(300)));
    }
}
