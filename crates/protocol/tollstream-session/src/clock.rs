//! Credit window clock.

use std::time::Duration;

use tokio::time::{sleep_until, Instant};

/// One-shot, re-armable deadline that asks for the next window.
///
/// The clock never fires on its own schedule: the controller arms it after
/// each grant and disarms it before every request, so there is never more
/// than one pending deadline.
#[derive(Debug)]
pub struct CreditClock {
    period: Duration,
    deadline: Option<Instant>,
}

impl CreditClock {
    /// Create a disarmed clock with the given period.
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            deadline: None,
        }
    }

    /// Arm the clock one period from now. Returns `false` if it was
    /// already armed, in which case the existing deadline is kept.
    pub fn arm(&mut self) -> bool {
        if self.deadline.is_some() {
            return false;
        }
        self.deadline = Some(Instant::now() + self.period);
        true
    }

    /// Disarm the clock.
    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    /// Whether a deadline is pending.
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Completes when the deadline passes. Pending forever while disarmed.
    ///
    /// Does not disarm the clock; the caller does that when it acts on
    /// the fire.
    pub async fn fired(&self) {
        match self.deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_arm_never_doubles() {
        let mut clock = CreditClock::new(Duration::from_secs(10));
        assert!(!clock.is_armed());
        assert!(clock.arm());
        let first = clock.deadline;
        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(!clock.arm());
        assert_eq!(clock.deadline, first);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_period() {
        let mut clock = CreditClock::new(Duration::from_secs(10));
        clock.arm();
        let start = Instant::now();
        clock.fired().await;
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarmed_clock_never_fires() {
        let mut clock = CreditClock::new(Duration::from_secs(10));
        clock.arm();
        clock.disarm();
        let fired = tokio::time::timeout(Duration::from_secs(60), clock.fired()).await;
        assert!(fired.is_err());
    }
}
