use std::time::{Duration, Instant};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_tree::HierarchicalLayer;

const DEFAULT_DIRECTIVE: &str = "tandem=info";

pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));
    let tree = HierarchicalLayer::new(2)
        .with_writer(std::io::stderr)
        .with_targets(true)
        .with_bracketed_fields(true)
        .with_timer(tracing_tree::time::Uptime::default());
    // A second init (tests, replays in-process) keeps the first subscriber.
    let _ = tracing_subscriber::registry().with(filter).with(tree).try_init();
}

/// Lets an action through at most once per interval.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self { Self { interval, last: None } }

    pub fn set_interval(&mut self, interval: Duration) { self.interval = interval; }

    /// Returns true and restarts the interval if enough time has passed.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Remembers the last reported state of a condition so it is logged once per
/// change instead of on every cycle.
#[derive(Debug, Clone, Default)]
pub struct Latch {
    reported: Option<bool>,
}

impl Latch {
    /// Returns true when `value` differs from the last reported value.
    pub fn changed(&mut self, value: bool) -> bool {
        if self.reported == Some(value) {
            return false;
        }
        self.reported = Some(value);
        true
    }

    pub fn get(&self) -> Option<bool> { self.reported }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_limits_rate() {
        let start = Instant::now();
        let mut throttle = Throttle::new(Duration::from_secs(5));
        assert!(throttle.ready(start));
        assert!(!throttle.ready(start + Duration::from_secs(2)));
        assert!(!throttle.ready(start + Duration::from_millis(4999)));
        assert!(throttle.ready(start + Duration::from_secs(5)));
        assert!(!throttle.ready(start + Duration::from_secs(6)));
    }

    #[test]
    fn latch_reports_changes_only() {
        let mut latch = Latch::default();
        assert!(latch.changed(false));
        assert!(!latch.changed(false));
        assert!(latch.changed(true));
        assert!(!latch.changed(true));
        assert_eq!(latch.get(), Some(true));
    }
}
