// Membrain: Loop Timing Statistics
//
// The engine loop has a tight budget; this keeps an eye on it without
// logging every tick.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub min_ms: u32,
    pub max_ms: u32,
    pub avg_ms: u32,
    pub samples: u32,
}

#[derive(Debug, Clone)]
pub struct TickStats {
    window: u32,
    min_ms: u32,
    max_ms: u32,
    total_ms: u64,
    count: u32,
}

impl TickStats {
    pub fn new(window: u32) -> Self {
        Self {
            window: window.max(1),
            min_ms: u32::MAX,
            max_ms: 0,
            total_ms: 0,
            count: 0,
        }
    }

    /// Record one tick. Returns a summary and starts over once `window`
    /// ticks have been seen.
    pub fn record(&mut self, elapsed_ms: u32) -> Option<TickSummary> {
        self.min_ms = self.min_ms.min(elapsed_ms);
        self.max_ms = self.max_ms.max(elapsed_ms);
        self.total_ms += u64::from(elapsed_ms);
        self.count += 1;

        if self.count < self.window {
            return None;
        }

        let summary = TickSummary {
            min_ms: self.min_ms,
            max_ms: self.max_ms,
            avg_ms: (self.total_ms / u64::from(self.count)) as u32,
            samples: self.count,
        };
        *self = Self::new(self.window);
        Some(summary)
    }
}
