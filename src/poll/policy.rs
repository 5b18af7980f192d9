use crate::config::MIN_POLL_INTERVAL;
use crate::error::{map_http_status, HttpErrorStatus};
use std::time::Duration;

const RATE_LIMIT_MULTIPLIER: u32 = 4;

/// What a poll tick tells the poller to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Continue,
    /// Back off after a rate limit.
    Slow,
    /// Stop the timer until polled manually, e.g. after an unrecoverable 401.
    Pause,
}

impl PollOutcome {
    /// Outcome for a finished poll request with this HTTP status (0 for transport failures).
    pub fn from_status(success: bool, status: u16) -> Self {
        if success {
            return PollOutcome::Continue;
        }
        match map_http_status(status) {
            HttpErrorStatus::Unauthorized => PollOutcome::Pause,
            HttpErrorStatus::RateLimited => PollOutcome::Slow,
            HttpErrorStatus::Error => PollOutcome::Continue,
        }
    }
}

pub(crate) fn clamp_interval(interval: Duration) -> Duration {
    interval.max(MIN_POLL_INTERVAL)
}

/// Delay before the next automatic tick; `None` pauses the timer.
pub(crate) fn next_delay(interval: Duration, outcome: PollOutcome) -> Option<Duration> {
    let interval = clamp_interval(interval);
    match outcome {
        PollOutcome::Continue => Some(interval),
        PollOutcome::Slow => Some(interval.saturating_mul(RATE_LIMIT_MULTIPLIER)),
        PollOutcome::Pause => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_pauses_and_rate_limit_slows() {
        assert_eq!(PollOutcome::from_status(false, 401), PollOutcome::Pause);
        assert_eq!(PollOutcome::from_status(false, 403), PollOutcome::Pause);
        assert_eq!(PollOutcome::from_status(false, 429), PollOutcome::Slow);
        assert_eq!(PollOutcome::from_status(false, 500), PollOutcome::Continue);
        assert_eq!(PollOutcome::from_status(false, 0), PollOutcome::Continue);
        assert_eq!(PollOutcome::from_status(true, 200), PollOutcome::Continue);
    }

    #[test]
    fn next_delay_is_bounded_below() {
        assert_eq!(
            next_delay(Duration::from_millis(10), PollOutcome::Continue),
            Some(MIN_POLL_INTERVAL)
        );
        assert_eq!(
            next_delay(Duration::from_secs(15), PollOutcome::Slow),
            Some(Duration::from_secs(60))
        );
        assert_eq!(next_delay(Duration::from_secs(15), PollOutcome::Pause), None);
    }
}
