use std::time::Duration;
use tokio::time::Instant;

/// Elapsed recording time built from state transitions.
///
/// Only start/pause/resume instants are recorded, so a throttled or
/// suspended host still reports the true duration.
#[derive(Debug, Default, Clone)]
pub struct SessionTimer {
    accumulated: Duration,
    running_since: Option<Instant>,
}

impl SessionTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start or resume counting. Idempotent while running.
    pub fn resume(&mut self) {
        if self.running_since.is_none() {
            self.running_since = Some(Instant::now());
        }
    }

    /// Freeze the count. Idempotent while paused.
    pub fn pause(&mut self) {
        if let Some(since) = self.running_since.take() {
            self.accumulated += since.elapsed();
        }
    }

    pub fn reset(&mut self) {
        self.accumulated = Duration::ZERO;
        self.running_since = None;
    }

    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    pub fn elapsed(&self) -> Duration {
        match self.running_since {
            Some(since) => self.accumulated + since.elapsed(),
            None => self.accumulated,
        }
    }
}

/// `MM:SS`, or `HH:MM:SS` from one hour on
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_minutes_and_hours() {
        assert_eq!(format_duration(Duration::ZERO), "00:00");
        assert_eq!(format_duration(Duration::from_secs(75)), "01:15");
        assert_eq!(format_duration(Duration::from_millis(3599_900)), "59:59");
        assert_eq!(format_duration(Duration::from_secs(3600)), "01:00:00");
        assert_eq!(format_duration(Duration::from_secs(3 * 3600 + 62)), "03:01:02");
    }

    #[tokio::test(start_paused = true)]
    async fn pauses_contribute_nothing() {
        let mut timer = SessionTimer::new();
        timer.resume();
        tokio::time::advance(Duration::from_secs(4)).await;
        timer.pause();
        tokio::time::advance(Duration::from_secs(100)).await;
        assert_eq!(timer.elapsed(), Duration::from_secs(4));

        timer.resume();
        timer.resume();
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(timer.elapsed(), Duration::from_secs(6));

        timer.reset();
        assert_eq!(timer.elapsed(), Duration::ZERO);
        assert!(!timer.is_running());
    }
}
