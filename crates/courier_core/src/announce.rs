/// Width of one announcement step, in percent.
pub const ANNOUNCE_STEP: u8 = 25;

/// Throttles upload progress for screen-reader or status-line announcements.
///
/// Raw progress arrives per chunk and would be far too chatty to speak out
/// loud. This keeps one announcement per 25% step crossed, which always
/// includes the jump to 100%.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressAnnouncer {
    last_step: u8,
}

impl ProgressAnnouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the latest percentage; returns it back when it is worth
    /// announcing. Crossing several steps at once announces only once.
    pub fn observe(&mut self, percent: u8) -> Option<u8> {
        let percent = percent.min(100);
        let step = percent / ANNOUNCE_STEP;
        if step > self.last_step {
            self.last_step = step;
            Some(percent)
        } else {
            None
        }
    }

    /// Forgets announcement history, for a submission that restarts.
    pub fn reset(&mut self) {
        self.last_step = 0;
    }
}
