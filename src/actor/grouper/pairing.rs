//! Automatic pairing on focus changes.

use std::time::Instant;

use tracing::{debug, info};

use crate::layout_engine::Detector;
use crate::model::group_store::{GroupStore, PairDecision, PairReason};
use crate::sys::window_server::{WindowId, WindowSnapshot};

/// The last two distinct focused windows seen across refreshes.
#[derive(Debug, Default, Clone)]
pub struct FocusTracker {
    current: Option<WindowId>,
    previous: Option<WindowId>,
}

impl FocusTracker {
    /// Records the focused window. Returns true when focus moved.
    pub fn observe(&mut self, focused: WindowId) -> bool {
        if self.current == Some(focused) {
            return false;
        }
        self.previous = self.current.replace(focused);
        true
    }

    pub fn current(&self) -> Option<WindowId> { self.current }

    pub fn previous(&self) -> Option<WindowId> { self.previous }
}

/// Decides whether the focused window should be paired, and with which
/// window, then lets the store attempt it.
///
/// Only snapped windows on the focused window's screen are candidates. Two
/// candidates pair unconditionally. With more, the previously focused window
/// breaks the tie if it is snapped itself.
pub fn evaluate(
    store: &mut GroupStore,
    detector: &Detector,
    focused: &WindowSnapshot,
    previous: Option<WindowId>,
    windows: &[WindowSnapshot],
    now: Instant,
) -> PairDecision {
    let decision = decide(store, detector, focused, previous, windows, now);
    log_decision(&decision);
    decision
}

fn decide(
    store: &mut GroupStore,
    detector: &Detector,
    focused: &WindowSnapshot,
    previous: Option<WindowId>,
    windows: &[WindowSnapshot],
    now: Instant,
) -> PairDecision {
    let focused_id = focused.id();
    if detector.snap_side(&focused.frame).is_none() {
        return PairDecision::skipped(focused_id, None, PairReason::FocusedNotSnapped);
    }

    let snapped: Vec<&WindowSnapshot> = windows
        .iter()
        .filter(|w| detector.same_screen(&w.frame, &focused.frame))
        .filter(|w| detector.snap_side(&w.frame).is_some())
        .collect();

    match snapped.len() {
        2 => match snapped.iter().find(|w| w.id() != focused_id) {
            Some(&other) => store.register_pair_if_eligible(focused, other, detector, now),
            None => PairDecision::skipped(focused_id, None, PairReason::NotEnoughSnapped {
                snapped: 1,
            }),
        },
        n if n > 2 => {
            let partner = previous
                .filter(|&id| id != focused_id)
                .and_then(|id| windows.iter().find(|w| w.id() == id))
                .filter(|w| detector.snap_side(&w.frame).is_some());
            match partner {
                Some(partner) => store.register_pair_if_eligible(focused, partner, detector, now),
                None => PairDecision::skipped(focused_id, previous, PairReason::Ambiguous {
                    snapped: n,
                }),
            }
        }
        n => PairDecision::skipped(focused_id, None, PairReason::NotEnoughSnapped { snapped: n }),
    }
}

fn log_decision(decision: &PairDecision) {
    let partner = decision.partner.map(|id| id.to_string());
    if decision.formed {
        info!(
            focused = %decision.focused,
            partner = partner.as_deref().unwrap_or("-"),
            reason = %decision.reason,
            "pair formed"
        );
    } else {
        debug!(
            focused = %decision.focused,
            partner = partner.as_deref().unwrap_or("-"),
            reason = %decision.reason,
            "pair skipped"
        );
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;
    use crate::common::config::{DetectorSettings, StoreSettings};
    use crate::sys::geometry::Rect;
    use crate::sys::screen::Screen;
    use crate::sys::scripted::scripted_window;

    fn detector() -> Detector {
        Detector::new(
            &DetectorSettings::default(),
            vec![Screen::uncovered(1, Rect::new(0.0, 0.0, 1440.0, 900.0))],
        )
    }

    fn window(id: u32, frame: Rect) -> WindowSnapshot {
        scripted_window(Some(id), id as u64, id as i32, "app", frame)
    }

    fn left(id: u32) -> WindowSnapshot { window(id, Rect::new(0.0, 0.0, 720.0, 900.0)) }

    fn right(id: u32) -> WindowSnapshot { window(id, Rect::new(720.0, 0.0, 720.0, 900.0)) }

    #[test]
    fn focus_tracker_remembers_the_previous_window() {
        let mut focus = FocusTracker::default();
        let (a, b) = (left(1).id(), right(2).id());
        assert!(focus.observe(a));
        assert!(!focus.observe(a));
        assert_eq!(focus.previous(), None);
        assert!(focus.observe(b));
        assert_eq!(focus.current(), Some(b));
        assert_eq!(focus.previous(), Some(a));
    }

    #[test]
    fn two_snapped_windows_pair() {
        let now = Instant::now();
        let (a, b) = (left(1), right(2));
        let windows = vec![a.clone(), b.clone()];
        let mut store = GroupStore::new(&StoreSettings::default());
        store.update(&windows, now);

        let decision = evaluate(&mut store, &detector(), &b, Some(a.id()), &windows, now);
        assert!(decision.formed);
        assert_eq!(decision.partner, Some(a.id()));

        // Without any previous focus the pair is still unambiguous.
        let mut store = GroupStore::new(&StoreSettings::default());
        let decision = evaluate(&mut store, &detector(), &a, None, &windows, now);
        assert!(decision.formed);
    }

    #[test]
    fn unsnapped_focus_is_skipped() {
        let now = Instant::now();
        let floating = window(3, Rect::new(300.0, 200.0, 400.0, 300.0));
        let windows = vec![left(1), right(2), floating.clone()];
        let mut store = GroupStore::new(&StoreSettings::default());
        let decision = evaluate(&mut store, &detector(), &floating, None, &windows, now);
        assert_eq!(decision.reason, PairReason::FocusedNotSnapped);
    }

    #[test]
    fn a_lone_snapped_window_is_not_enough() {
        let now = Instant::now();
        let a = left(1);
        let windows = vec![a.clone(), window(2, Rect::new(900.0, 100.0, 300.0, 300.0))];
        let mut store = GroupStore::new(&StoreSettings::default());
        let decision = evaluate(&mut store, &detector(), &a, None, &windows, now);
        assert_eq!(decision.reason, PairReason::NotEnoughSnapped { snapped: 1 });
        assert!(decision.reason.to_string().contains("not enough snapped"));
    }

    #[test]
    fn three_snapped_windows_without_history_are_ambiguous() {
        let now = Instant::now();
        let (a, b, c) = (left(1), right(2), right(3));
        let windows = vec![a.clone(), b, c];
        let mut store = GroupStore::new(&StoreSettings::default());
        store.update(&windows, now);

        let decision = evaluate(&mut store, &detector(), &a, None, &windows, now);
        assert!(!decision.formed);
        assert!(decision.reason.to_string().contains("ambiguous"), "{}", decision.reason);
        assert_eq!(store.group_count(), 0);
    }

    #[test]
    fn previous_focus_breaks_the_tie() {
        let now = Instant::now();
        let (a, b, c) = (left(1), right(2), right(3));
        let windows = vec![a.clone(), b.clone(), c.clone()];
        let mut store = GroupStore::new(&StoreSettings::default());
        store.update(&windows, now);

        let decision = evaluate(&mut store, &detector(), &a, Some(c.id()), &windows, now);
        assert!(decision.formed);
        assert_eq!(store.members(store.group_id(a.id()).unwrap()), vec![a.id(), c.id()]);
        assert_eq!(store.group_id(b.id()), None);
    }

    #[test]
    fn an_unsnapped_previous_focus_does_not_break_the_tie() {
        let now = Instant::now();
        let floating = window(4, Rect::new(300.0, 200.0, 400.0, 300.0));
        let a = left(1);
        let windows = vec![a.clone(), right(2), right(3), floating.clone()];
        let mut store = GroupStore::new(&StoreSettings::default());
        let decision = evaluate(&mut store, &detector(), &a, Some(floating.id()), &windows, now);
        assert_eq!(decision.reason, PairReason::Ambiguous { snapped: 3 });
    }

    #[test]
    fn candidates_on_other_screens_are_ignored() {
        let now = Instant::now();
        let detector = Detector::new(
            &DetectorSettings::default(),
            vec![
                Screen::uncovered(1, Rect::new(0.0, 0.0, 1440.0, 900.0)),
                Screen::uncovered(2, Rect::new(1440.0, 0.0, 1440.0, 900.0)),
            ],
        );
        let (a, b) = (left(1), right(2));
        let elsewhere = window(3, Rect::new(1440.0, 0.0, 720.0, 900.0));
        let windows = vec![a.clone(), b.clone(), elsewhere];
        let mut store = GroupStore::new(&StoreSettings::default());
        let decision = evaluate(&mut store, &detector, &a, None, &windows, now);
        assert!(decision.formed);
        assert_eq!(decision.partner, Some(b.id()));
    }
}
