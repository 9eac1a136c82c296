//! Debounce and suppression for refresh passes.
//!
//! Pure state machine over injected time: the actor loop asks for the next
//! deadline, sleeps until it, and calls [`RefreshScheduler::poll`].

use std::time::{Duration, Instant};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::common::config::TimingSettings;

/// A raw notification that something may need re-evaluating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Trigger {
    FocusChanged,
    WindowMoved,
    WindowResized,
    AppActivated,
}

bitflags! {
    /// The trigger kinds coalesced into one pending refresh.
    #[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
    pub struct TriggerSet: u8 {
        const FOCUS_CHANGED  = 1 << 0;
        const WINDOW_MOVED   = 1 << 1;
        const WINDOW_RESIZED = 1 << 2;
        const APP_ACTIVATED  = 1 << 3;
    }
}

impl From<Trigger> for TriggerSet {
    fn from(trigger: Trigger) -> Self {
        match trigger {
            Trigger::FocusChanged => TriggerSet::FOCUS_CHANGED,
            Trigger::WindowMoved => TriggerSet::WINDOW_MOVED,
            Trigger::WindowResized => TriggerSet::WINDOW_RESIZED,
            Trigger::AppActivated => TriggerSet::APP_ACTIVATED,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RefreshScheduler {
    debounce: Duration,
    suppression: Duration,
    deadline: Option<Instant>,
    pending: TriggerSet,
    suppressed_until: Option<Instant>,
}

impl RefreshScheduler {
    pub fn new(timing: &TimingSettings) -> Self {
        Self {
            debounce: timing.debounce,
            suppression: timing.suppression,
            deadline: None,
            pending: TriggerSet::empty(),
            suppressed_until: None,
        }
    }

    pub fn update_settings(&mut self, timing: &TimingSettings) {
        self.debounce = timing.debounce;
        self.suppression = timing.suppression;
    }

    /// Records a trigger, pushing any pending refresh back to one debounce
    /// interval from `now`. Returns false if the trigger was dropped because
    /// the scheduler is suppressed.
    pub fn trigger(&mut self, trigger: Trigger, now: Instant) -> bool {
        if self.is_suppressed(now) {
            return false;
        }
        self.pending |= TriggerSet::from(trigger);
        self.deadline = Some(now + self.debounce);
        true
    }

    pub fn deadline(&self) -> Option<Instant> { self.deadline }

    pub fn pending(&self) -> TriggerSet { self.pending }

    pub fn is_suppressed(&self, now: Instant) -> bool {
        self.suppressed_until.is_some_and(|until| now < until)
    }

    /// Returns the coalesced triggers once the deadline has passed. A refresh
    /// that comes due while suppressed is dropped.
    pub fn poll(&mut self, now: Instant) -> Option<TriggerSet> {
        let deadline = self.deadline?;
        if now < deadline {
            return None;
        }
        self.deadline = None;
        let pending = std::mem::take(&mut self.pending);
        if self.is_suppressed(now) {
            return None;
        }
        Some(pending)
    }

    /// Starts the suppression window after the engine reordered windows
    /// itself, and drops anything already pending.
    pub fn suppress(&mut self, now: Instant) {
        self.suppressed_until = Some(now + self.suppression);
        self.cancel();
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
        self.pending = TriggerSet::empty();
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn ms(n: u64) -> Duration { Duration::from_millis(n) }

    fn scheduler() -> RefreshScheduler { RefreshScheduler::new(&TimingSettings::default()) }

    #[test]
    fn a_burst_yields_one_refresh() {
        let start = Instant::now();
        let mut s = scheduler();
        assert!(s.trigger(Trigger::FocusChanged, start));
        assert!(s.trigger(Trigger::WindowMoved, start + ms(20)));
        assert!(s.trigger(Trigger::AppActivated, start + ms(40)));
        assert_eq!(s.deadline(), Some(start + ms(100)));

        assert_eq!(s.poll(start + ms(60)), None);
        assert_eq!(
            s.poll(start + ms(100)),
            Some(TriggerSet::FOCUS_CHANGED | TriggerSet::WINDOW_MOVED | TriggerSet::APP_ACTIVATED)
        );
        assert_eq!(s.poll(start + ms(200)), None);
        assert_eq!(s.deadline(), None);
    }

    #[test]
    fn triggers_are_dropped_while_suppressed() {
        let start = Instant::now();
        let mut s = scheduler();
        s.suppress(start);
        assert!(!s.trigger(Trigger::FocusChanged, start + ms(100)));
        assert!(!s.trigger(Trigger::FocusChanged, start + ms(299)));
        assert_eq!(s.deadline(), None);

        assert!(s.trigger(Trigger::FocusChanged, start + ms(300)));
        assert_eq!(s.poll(start + ms(360)), Some(TriggerSet::FOCUS_CHANGED));
    }

    #[test]
    fn suppression_cancels_pending_work() {
        let start = Instant::now();
        let mut s = scheduler();
        s.trigger(Trigger::WindowResized, start);
        s.suppress(start + ms(10));
        assert_eq!(s.pending(), TriggerSet::empty());
        assert_eq!(s.poll(start + ms(100)), None);
    }

    #[test]
    fn settings_apply_to_the_next_trigger() {
        let start = Instant::now();
        let mut s = scheduler();
        let timing = TimingSettings {
            debounce: ms(10),
            ..TimingSettings::default()
        };
        s.update_settings(&timing);
        s.trigger(Trigger::FocusChanged, start);
        assert_eq!(s.deadline(), Some(start + ms(10)));
    }
}
