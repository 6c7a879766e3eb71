use std::future;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{sleep, sleep_until, Instant, Sleep};

use crate::error::TimeoutPhase;

/// The single pending deadline of a build session.
///
/// Arming replaces whatever deadline was pending.
#[derive(Debug, Default)]
pub struct PhaseTimer {
    pending: Option<(TimeoutPhase, Pin<Box<Sleep>>)>,
}

impl PhaseTimer {
    pub fn new() -> Self {
        PhaseTimer::default()
    }

    pub fn arm(&mut self, phase: TimeoutPhase, after: Duration) {
        self.pending = Some((phase, Box::pin(sleep(after))));
    }

    /// Arm with an absolute deadline
    pub fn arm_at(&mut self, phase: TimeoutPhase, deadline: Instant) {
        self.pending = Some((phase, Box::pin(sleep_until(deadline))));
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn armed(&self) -> Option<TimeoutPhase> {
        self.pending.as_ref().map(|(phase, _)| *phase)
    }

    /// Resolves with the phase once the pending deadline passes.
    /// Never resolves while nothing is armed.
    pub async fn expired(&mut self) -> TimeoutPhase {
        match self.pending.as_mut() {
            Some((phase, deadline)) => {
                deadline.as_mut().await;
                let phase = *phase;
                self.pending = None;
                phase
            }
            None => future::pending().await,
        }
    }
}
