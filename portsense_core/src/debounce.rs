//! Counter-based stability detection.
//!
//! The tick on which an observation changes counts as 0; every following
//! tick with the same observation adds one. Callers fire their transition
//! once the count reaches the state's threshold.

/// Plain tick counter for fixed settle waits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickCounter {
    n: u32,
}

impl TickCounter {
    pub fn reset(&mut self) {
        self.n = 0;
    }

    /// Count one tick and return the total since the last reset.
    pub fn advance(&mut self) -> u32 {
        self.n = self.n.saturating_add(1);
        self.n
    }

    pub fn get(&self) -> u32 {
        self.n
    }
}

#[derive(Debug, Clone, Default)]
pub struct Debounce<T> {
    last: Option<T>,
    count: u32,
}

impl<T: PartialEq + Copy> Debounce<T> {
    pub fn new() -> Self {
        Self {
            last: None,
            count: 0,
        }
    }

    /// Record one observation and return how many ticks it has been stable.
    pub fn observe(&mut self, v: T) -> u32 {
        if self.last == Some(v) {
            self.count = self.count.saturating_add(1);
        } else {
            self.last = Some(v);
            self.count = 0;
        }
        self.count
    }

    /// Forget the last observation; the next one starts a fresh count.
    pub fn reset(&mut self) {
        self.last = None;
        self.count = 0;
    }

    pub fn last(&self) -> Option<T> {
        self.last
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}
