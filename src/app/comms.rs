//! Communication-loss tracking.

/// Change in device reachability worth announcing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommsTransition {
    /// The device stopped answering.
    Lost,
    /// The device answers again after an outage.
    Restored,
}

/// Tracks poll outcomes so each outage is announced once.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommsMonitor {
    lost: bool,
    consecutive_failures: u32,
}

impl CommsMonitor {
    /// Monitor that assumes the device is reachable.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// `true` while an outage is in progress.
    #[must_use]
    pub fn is_lost(&self) -> bool { self.lost }

    /// Unanswered polls since the last answer.
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 { self.consecutive_failures }

    /// Record an answered poll.
    pub fn record_success(&mut self) -> Option<CommsTransition> {
        self.consecutive_failures = 0;
        std::mem::replace(&mut self.lost, false).then_some(CommsTransition::Restored)
    }

    /// Record an unanswered poll.
    pub fn record_failure(&mut self) -> Option<CommsTransition> {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        (!std::mem::replace(&mut self.lost, true)).then_some(CommsTransition::Lost)
    }
}
