//! Authoritative window-to-group mapping.
//!
//! Membership lives on the window side: each tracked window optionally points
//! at a group, and a group is just a record that at least two windows point
//! at. Every mutation funnels through [`GroupStore::enforce_minimum`], so a
//! group never survives with fewer than two members. The one exception is a
//! group marked `pending`, which a manual session holds open while it is
//! still collecting windows.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};
use tracing::{debug, trace};

use crate::common::collections::{HashMap, HashSet};
use crate::common::config::StoreSettings;
use crate::layout_engine::{Detector, SnapSide};
use crate::sys::geometry::Rect;
use crate::sys::window_server::{WindowId, WindowSnapshot};

new_key_type! {
    pub struct GroupId;
    struct WindowKey;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GroupOrigin {
    Automatic,
    Manual,
}

#[derive(Debug, Clone)]
struct GroupRecord {
    origin: GroupOrigin,
    formed_at: Instant,
    pending: bool,
}

#[derive(Debug, Clone)]
struct WindowState {
    id: WindowId,
    frame: Rect,
    last_moved: Option<Instant>,
    group: Option<GroupId>,
}

/// What one reconciliation pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Windows seen for the first time.
    pub tracked: usize,
    /// Windows whose frame changed past the move threshold.
    pub moved: usize,
    /// Windows that disappeared.
    pub removed: usize,
    /// Groups dissolved as a consequence.
    pub dissolved: usize,
}

impl UpdateSummary {
    pub fn is_quiet(&self) -> bool { *self == UpdateSummary::default() }
}

/// Why a pairing attempt did or did not bind two windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairReason {
    Formed {
        focused: SnapSide,
        partner: SnapSide,
    },
    SameWindow,
    DifferentScreens,
    NotAdjacent,
    SidesNotOpposite {
        focused: Option<SnapSide>,
        partner: Option<SnapSide>,
    },
    AlreadyPaired,
    FocusedNotSnapped,
    NotEnoughSnapped {
        snapped: usize,
    },
    Ambiguous {
        snapped: usize,
    },
}

impl fmt::Display for PairReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            PairReason::Formed { focused, partner } => {
                write!(f, "paired {focused} half with {partner} half")
            }
            PairReason::SameWindow => write!(f, "focused and previous are the same window"),
            PairReason::DifferentScreens => write!(f, "windows are on different screens"),
            PairReason::NotAdjacent => write!(f, "frames are not adjacent"),
            PairReason::SidesNotOpposite { focused, partner } => write!(
                f,
                "snap sides are not opposite (focused={}, partner={})",
                SnapSide::name(focused),
                SnapSide::name(partner)
            ),
            PairReason::AlreadyPaired => write!(f, "already paired"),
            PairReason::FocusedNotSnapped => write!(f, "focused window is not snapped"),
            PairReason::NotEnoughSnapped { snapped } => {
                write!(f, "not enough snapped windows on screen ({snapped})")
            }
            PairReason::Ambiguous { snapped } => write!(
                f,
                "ambiguous, no usable previous focus ({snapped} snapped windows)"
            ),
        }
    }
}

/// Outcome of one pairing attempt, logged on every focus change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairDecision {
    pub formed: bool,
    pub reason: PairReason,
    pub focused: WindowId,
    pub partner: Option<WindowId>,
    pub group: Option<GroupId>,
}

impl PairDecision {
    pub fn skipped(focused: WindowId, partner: Option<WindowId>, reason: PairReason) -> Self {
        Self {
            formed: false,
            reason,
            focused,
            partner,
            group: None,
        }
    }
}

#[derive(Debug)]
pub struct GroupStore {
    move_threshold: f64,
    windows: SlotMap<WindowKey, WindowState>,
    index: HashMap<WindowId, WindowKey>,
    groups: SlotMap<GroupId, GroupRecord>,
}

impl GroupStore {
    pub fn new(settings: &StoreSettings) -> Self {
        Self {
            move_threshold: settings.move_threshold,
            windows: SlotMap::default(),
            index: HashMap::default(),
            groups: SlotMap::default(),
        }
    }

    pub fn update_settings(&mut self, settings: &StoreSettings) {
        self.move_threshold = settings.move_threshold;
    }

    pub fn tracked_count(&self) -> usize { self.windows.len() }

    pub fn group_count(&self) -> usize { self.groups.len() }

    pub fn is_tracked(&self, id: WindowId) -> bool { self.index.contains_key(&id) }

    pub fn last_moved(&self, id: WindowId) -> Option<Instant> {
        self.index.get(&id).and_then(|&key| self.windows[key].last_moved)
    }

    /// Reconciles tracked state against the latest snapshot set.
    ///
    /// New windows are tracked without a group. A frame change past the move
    /// threshold drops the window out of its group, since the user may have
    /// untiled it. Windows no longer observed are forgotten. Either case can
    /// leave a group with a single member, which dissolves it.
    pub fn update(&mut self, windows: &[WindowSnapshot], now: Instant) -> UpdateSummary {
        let mut summary = UpdateSummary::default();
        let mut seen = HashSet::default();

        for window in windows {
            let id = window.id();
            seen.insert(id);
            let Some(&key) = self.index.get(&id) else {
                self.insert(window);
                summary.tracked += 1;
                continue;
            };
            let state = &mut self.windows[key];
            let moved = state.frame.max_delta(&window.frame) > self.move_threshold;
            state.frame = window.frame;
            if !moved {
                continue;
            }
            state.last_moved = Some(now);
            summary.moved += 1;
            if let Some(group) = state.group.take() {
                debug!(window = %id, frame = %window.frame, "grouped window moved, leaving group");
                summary.dissolved += self.enforce_minimum(group);
            }
        }

        let gone: Vec<WindowKey> = self
            .windows
            .iter()
            .filter(|(_, state)| !seen.contains(&state.id))
            .map(|(key, _)| key)
            .collect();
        for key in gone {
            let Some(state) = self.windows.remove(key) else { continue };
            self.index.remove(&state.id);
            summary.removed += 1;
            trace!(window = %state.id, "window disappeared");
            if let Some(group) = state.group {
                summary.dissolved += self.enforce_minimum(group);
            }
        }

        summary
    }

    /// The focused window's full group as live snapshots, or just the focused
    /// window when it is not part of a group with two live members.
    pub fn group_for(
        &mut self,
        focused: &WindowSnapshot,
        windows: &[WindowSnapshot],
        updated: bool,
        now: Instant,
    ) -> Vec<WindowSnapshot> {
        if !updated {
            self.update(windows, now);
        }
        let Some(group) = self.group_id(focused.id()) else {
            return vec![focused.clone()];
        };
        let members = self.windows_in_group(group, windows);
        if members.len() >= 2 {
            members
        } else {
            vec![focused.clone()]
        }
    }

    /// Every group with at least two live members.
    pub fn groups(&mut self, windows: &[WindowSnapshot], now: Instant) -> Vec<Vec<WindowSnapshot>> {
        self.update(windows, now);
        self.current_groups(windows)
    }

    /// Like [`GroupStore::groups`] without reconciling first.
    pub fn current_groups(&self, windows: &[WindowSnapshot]) -> Vec<Vec<WindowSnapshot>> {
        let mut grouped: Vec<(GroupId, Vec<WindowSnapshot>)> = Vec::new();
        for window in windows {
            let Some(group) = self.group_id(window.id()) else { continue };
            match grouped.iter_mut().find(|(g, _)| *g == group) {
                Some((_, members)) => members.push(window.clone()),
                None => grouped.push((group, vec![window.clone()])),
            }
        }
        grouped
            .into_iter()
            .map(|(_, members)| members)
            .filter(|members| members.len() >= 2)
            .collect()
    }

    /// Binds `focused` and `previous` into a fresh automatic group when they
    /// look like a tiled left/right pair. Rejections leave the store
    /// untouched.
    pub fn register_pair_if_eligible(
        &mut self,
        focused: &WindowSnapshot,
        previous: &WindowSnapshot,
        detector: &Detector,
        now: Instant,
    ) -> PairDecision {
        let focused_id = focused.id();
        let partner_id = previous.id();
        let skip = |reason| PairDecision::skipped(focused_id, Some(partner_id), reason);

        if focused_id == partner_id {
            return skip(PairReason::SameWindow);
        }
        if !detector.same_screen(&focused.frame, &previous.frame) {
            return skip(PairReason::DifferentScreens);
        }
        if !detector.is_adjacent(&focused.frame, &previous.frame) {
            return skip(PairReason::NotAdjacent);
        }
        let focused_side = detector.snap_side(&focused.frame);
        let partner_side = detector.snap_side(&previous.frame);
        let (focused_side, partner_side) = match (focused_side, partner_side) {
            (Some(f), Some(p)) if SnapSide::complements(focused_side, partner_side) => (f, p),
            _ => {
                return skip(PairReason::SidesNotOpposite {
                    focused: focused_side,
                    partner: partner_side,
                });
            }
        };
        if let (Some(a), Some(b)) = (self.group_id(focused_id), self.group_id(partner_id))
            && a == b
            && self.member_count(a) == 2
        {
            return skip(PairReason::AlreadyPaired);
        }

        let focused_key = self.track(focused);
        let partner_key = self.track(previous);
        let mut prior: Vec<GroupId> =
            [focused_key, partner_key].iter().filter_map(|&key| self.windows[key].group).collect();
        prior.dedup();
        for group in prior {
            self.dissolve(group);
        }
        let group = self.create_group(GroupOrigin::Automatic, false, now);
        self.windows[focused_key].group = Some(group);
        self.windows[partner_key].group = Some(group);

        PairDecision {
            formed: true,
            reason: PairReason::Formed {
                focused: focused_side,
                partner: partner_side,
            },
            focused: focused_id,
            partner: Some(partner_id),
            group: Some(group),
        }
    }

    pub fn group_id(&self, id: WindowId) -> Option<GroupId> {
        self.index.get(&id).and_then(|&key| self.windows[key].group)
    }

    pub fn contains_group(&self, group: GroupId) -> bool { self.groups.contains_key(group) }

    pub fn group_origin(&self, group: GroupId) -> Option<GroupOrigin> {
        self.groups.get(group).map(|record| record.origin)
    }

    pub fn group_formed_at(&self, group: GroupId) -> Option<Instant> {
        self.groups.get(group).map(|record| record.formed_at)
    }

    pub fn is_pending(&self, group: GroupId) -> bool {
        self.groups.get(group).is_some_and(|record| record.pending)
    }

    /// Ids of the tracked windows in `group`, sorted.
    pub fn members(&self, group: GroupId) -> Vec<WindowId> {
        let mut members: Vec<WindowId> = self
            .windows
            .values()
            .filter(|state| state.group == Some(group))
            .map(|state| state.id)
            .collect();
        members.sort();
        members
    }

    fn member_count(&self, group: GroupId) -> usize {
        self.windows.values().filter(|state| state.group == Some(group)).count()
    }

    /// Opens a new, empty group. A pending group is exempt from the
    /// two-member rule until [`GroupStore::seal`] is called.
    pub fn create_group(&mut self, origin: GroupOrigin, pending: bool, now: Instant) -> GroupId {
        self.groups.insert(GroupRecord {
            origin,
            formed_at: now,
            pending,
        })
    }

    /// The window's current group, or a fresh pending manual group holding
    /// just this window.
    pub fn ensure_group(&mut self, window: &WindowSnapshot, now: Instant) -> GroupId {
        let key = self.track(window);
        if let Some(group) = self.windows[key].group {
            return group;
        }
        let group = self.create_group(GroupOrigin::Manual, true, now);
        self.windows[key].group = Some(group);
        group
    }

    /// Moves an already tracked window into `group`. Returns false if either
    /// is unknown.
    pub fn add_window(&mut self, id: WindowId, group: GroupId) -> bool {
        let Some(&key) = self.index.get(&id) else { return false };
        self.reassign(key, group)
    }

    /// Moves a window into `group`, tracking it first if needed.
    pub fn assign_window(&mut self, window: &WindowSnapshot, group: GroupId) -> bool {
        if !self.contains_group(group) {
            return false;
        }
        let key = self.track(window);
        self.reassign(key, group)
    }

    /// Ends the pending state of a group and applies the two-member rule.
    /// Returns whether the group survived.
    pub fn seal(&mut self, group: GroupId) -> bool {
        let Some(record) = self.groups.get_mut(group) else { return false };
        record.pending = false;
        self.enforce_minimum(group);
        self.contains_group(group)
    }

    /// Live snapshots of the members of `group`, in snapshot order.
    pub fn windows_in_group(&self, group: GroupId, from: &[WindowSnapshot]) -> Vec<WindowSnapshot> {
        from.iter()
            .filter(|window| self.group_id(window.id()) == Some(group))
            .cloned()
            .collect()
    }

    /// Checks that every group is referenced consistently and that only
    /// pending groups have fewer than two members.
    pub fn check_invariants(&self) -> Result<(), String> {
        for (key, state) in &self.windows {
            if self.index.get(&state.id) != Some(&key) {
                return Err(format!("index out of sync for {}", state.id));
            }
            if let Some(group) = state.group
                && !self.groups.contains_key(group)
            {
                return Err(format!("{} points at dissolved group {group:?}", state.id));
            }
        }
        if self.index.len() != self.windows.len() {
            return Err("index has stale entries".to_string());
        }
        for (group, record) in &self.groups {
            let count = self.member_count(group);
            if !record.pending && count < 2 {
                return Err(format!("group {group:?} has {count} member(s)"));
            }
        }
        Ok(())
    }

    fn insert(&mut self, window: &WindowSnapshot) -> WindowKey {
        let id = window.id();
        let key = self.windows.insert(WindowState {
            id,
            frame: window.frame,
            last_moved: None,
            group: None,
        });
        self.index.insert(id, key);
        key
    }

    fn track(&mut self, window: &WindowSnapshot) -> WindowKey {
        match self.index.get(&window.id()) {
            Some(&key) => key,
            None => self.insert(window),
        }
    }

    fn reassign(&mut self, key: WindowKey, group: GroupId) -> bool {
        if !self.groups.contains_key(group) {
            return false;
        }
        let previous = self.windows[key].group.replace(group);
        if let Some(previous) = previous
            && previous != group
        {
            self.enforce_minimum(previous);
        }
        true
    }

    /// Dissolves `group` if it is no longer pending and has fewer than two
    /// members. Returns the number of groups dissolved.
    fn enforce_minimum(&mut self, group: GroupId) -> usize {
        let Some(record) = self.groups.get(group) else { return 0 };
        if record.pending {
            return 0;
        }
        let members: Vec<WindowKey> = self
            .windows
            .iter()
            .filter(|(_, state)| state.group == Some(group))
            .map(|(key, _)| key)
            .collect();
        if members.len() >= 2 {
            return 0;
        }
        self.dissolve(group);
        1
    }

    /// Clears every member of `group` and drops its record.
    fn dissolve(&mut self, group: GroupId) {
        for state in self.windows.values_mut() {
            if state.group == Some(group) {
                state.group = None;
            }
        }
        if let Some(record) = self.groups.remove(group) {
            debug!(?group, origin = %record.origin, "group dissolved");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;
    use crate::common::collections::BTreeMap;
    use crate::common::config::DetectorSettings;
    use crate::sys::screen::Screen;
    use crate::sys::scripted::scripted_window;

    fn detector() -> Detector {
        Detector::new(
            &DetectorSettings::default(),
            vec![Screen::uncovered(1, Rect::new(0.0, 0.0, 1440.0, 900.0))],
        )
    }

    fn store() -> GroupStore { GroupStore::new(&StoreSettings::default()) }

    fn left(id: u32) -> WindowSnapshot {
        scripted_window(Some(id), id as u64, id as i32, "left", Rect::new(0.0, 0.0, 720.0, 900.0))
    }

    fn right(id: u32) -> WindowSnapshot {
        scripted_window(
            Some(id),
            id as u64,
            id as i32,
            "right",
            Rect::new(720.0, 0.0, 720.0, 900.0),
        )
    }

    fn ids(windows: &[WindowSnapshot]) -> Vec<WindowId> {
        let mut ids: Vec<WindowId> = windows.iter().map(WindowSnapshot::id).collect();
        ids.sort();
        ids
    }

    fn memberships(store: &GroupStore) -> BTreeMap<WindowId, Option<GroupId>> {
        store.windows.values().map(|state| (state.id, state.group)).collect()
    }

    #[test]
    fn pairing_binds_both_windows() {
        let now = Instant::now();
        let (a, b) = (left(1), right(2));
        let windows = vec![a.clone(), b.clone()];
        let mut store = store();
        store.update(&windows, now);

        let decision = store.register_pair_if_eligible(&b, &a, &detector(), now);
        assert!(decision.formed, "{}", decision.reason);
        assert_eq!(
            decision.reason,
            PairReason::Formed {
                focused: SnapSide::Right,
                partner: SnapSide::Left
            }
        );

        let expected = ids(&windows);
        assert_eq!(ids(&store.group_for(&a, &windows, true, now)), expected);
        assert_eq!(ids(&store.group_for(&b, &windows, true, now)), expected);
        assert_eq!(store.groups(&windows, now).len(), 1);
        store.check_invariants().unwrap();
    }

    #[test]
    fn rejections_do_not_mutate() {
        let now = Instant::now();
        let d = detector();
        let a = left(1);
        let b = right(2);
        let floating =
            scripted_window(Some(3), 3, 3, "float", Rect::new(400.0, 200.0, 500.0, 400.0));
        let other_left =
            scripted_window(Some(4), 4, 4, "left2", Rect::new(0.0, 0.0, 720.0, 900.0));
        let windows = vec![a.clone(), b.clone(), floating.clone(), other_left.clone()];
        let mut store = store();
        store.update(&windows, now);
        assert!(store.register_pair_if_eligible(&a, &b, &d, now).formed);
        let before = memberships(&store);
        let groups_before = store.group_count();

        let attempts = [
            (store.register_pair_if_eligible(&a, &a, &d, now), PairReason::SameWindow),
            (store.register_pair_if_eligible(&floating, &b, &d, now), PairReason::NotAdjacent),
            (
                store.register_pair_if_eligible(&other_left, &a, &d, now),
                PairReason::NotAdjacent,
            ),
            (store.register_pair_if_eligible(&b, &a, &d, now), PairReason::AlreadyPaired),
        ];
        for (decision, reason) in attempts {
            assert!(!decision.formed);
            assert_eq!(decision.reason, reason);
            assert_eq!(decision.group, None);
        }
        assert_eq!(memberships(&store), before);
        assert_eq!(store.group_count(), groups_before);
    }

    #[test]
    fn unsnapped_neighbours_never_pair() {
        let now = Instant::now();
        let d = detector();
        // A narrow window beside a left half touches it but is not snapped.
        let top = scripted_window(Some(1), 1, 1, "a", Rect::new(0.0, 0.0, 720.0, 900.0));
        let beside = scripted_window(Some(2), 2, 2, "b", Rect::new(720.0, 0.0, 300.0, 900.0));
        let mut store = store();
        store.update(&[top.clone(), beside.clone()], now);

        let decision = store.register_pair_if_eligible(&top, &beside, &d, now);
        assert_eq!(
            decision.reason,
            PairReason::SidesNotOpposite {
                focused: Some(SnapSide::Left),
                partner: None
            }
        );
        assert!(decision.reason.to_string().contains("focused=left, partner=none"));
        assert_eq!(store.group_count(), 0);
    }

    #[test]
    fn windows_on_different_screens_never_pair() {
        let now = Instant::now();
        let d = Detector::new(
            &DetectorSettings::default(),
            vec![
                Screen::uncovered(1, Rect::new(0.0, 0.0, 1440.0, 900.0)),
                Screen::uncovered(2, Rect::new(1440.0, 0.0, 1440.0, 900.0)),
            ],
        );
        let a = right(1);
        let b = scripted_window(Some(2), 2, 2, "b", Rect::new(1440.0, 0.0, 720.0, 900.0));
        let mut store = store();
        let decision = store.register_pair_if_eligible(&a, &b, &d, now);
        assert_eq!(decision.reason, PairReason::DifferentScreens);
        assert_eq!(store.tracked_count(), 0);
    }

    #[test]
    fn repairing_dissolves_the_old_partner() {
        let now = Instant::now();
        let d = detector();
        let (a, b) = (left(1), right(2));
        let c = right(3);
        let windows = vec![a.clone(), b.clone(), c.clone()];
        let mut store = store();
        store.update(&windows, now);

        assert!(store.register_pair_if_eligible(&a, &b, &d, now).formed);
        let decision = store.register_pair_if_eligible(&c, &a, &d, now);
        assert!(decision.formed);

        assert_eq!(store.group_id(b.id()), None);
        assert_eq!(ids(&store.group_for(&b, &windows, true, now)), vec![b.id()]);
        assert_eq!(ids(&store.group_for(&a, &windows, true, now)), ids(&[a, c]));
        assert_eq!(store.group_count(), 1);
        store.check_invariants().unwrap();
    }

    #[test]
    fn pairing_dissolves_a_larger_prior_group() {
        let now = Instant::now();
        let (a, b) = (left(1), right(2));
        let x = scripted_window(Some(3), 3, 3, "x", Rect::new(100.0, 100.0, 300.0, 300.0));
        let y = scripted_window(Some(4), 4, 4, "y", Rect::new(500.0, 100.0, 300.0, 300.0));
        let windows = vec![a.clone(), b.clone(), x.clone(), y.clone()];
        let mut store = store();
        store.update(&windows, now);

        let manual = store.ensure_group(&a, now);
        assert!(store.assign_window(&x, manual));
        assert!(store.assign_window(&y, manual));
        assert!(store.seal(manual));

        let decision = store.register_pair_if_eligible(&a, &b, &detector(), now);
        assert!(decision.formed, "{}", decision.reason);
        assert!(!store.contains_group(manual));
        assert_eq!(store.group_id(x.id()), None);
        assert_eq!(store.group_id(y.id()), None);
        assert_eq!(store.groups(&windows, now).len(), 1);
        store.check_invariants().unwrap();
    }

    #[test]
    fn update_is_idempotent() {
        let now = Instant::now();
        let (a, b) = (left(1), right(2));
        let windows = vec![a.clone(), b.clone()];
        let mut store = store();

        let first = store.update(&windows, now);
        assert_eq!(first.tracked, 2);
        store.register_pair_if_eligible(&a, &b, &detector(), now);
        let before = memberships(&store);

        let second = store.update(&windows, now + Duration::from_secs(1));
        assert!(second.is_quiet(), "{second:?}");
        assert_eq!(memberships(&store), before);
    }

    #[test]
    fn moving_a_member_breaks_the_group() {
        let now = Instant::now();
        let (a, b) = (left(1), right(2));
        let mut store = store();
        store.update(&[a.clone(), b.clone()], now);
        store.register_pair_if_eligible(&b, &a, &detector(), now);

        let mut shrunk = a.clone();
        shrunk.frame = Rect::new(0.0, 0.0, 700.0, 900.0);
        let later = now + Duration::from_millis(500);
        let summary = store.update(&[shrunk, b.clone()], later);

        assert_eq!(summary.moved, 1);
        assert_eq!(summary.dissolved, 1);
        assert_eq!(store.group_id(a.id()), None);
        assert_eq!(store.group_id(b.id()), None);
        assert_eq!(store.last_moved(a.id()), Some(later));
        store.check_invariants().unwrap();
    }

    #[test]
    fn small_drift_keeps_the_group() {
        let now = Instant::now();
        let (a, b) = (left(1), right(2));
        let mut store = store();
        store.update(&[a.clone(), b.clone()], now);
        store.register_pair_if_eligible(&b, &a, &detector(), now);

        let mut nudged = a.clone();
        nudged.frame = Rect::new(3.0, 0.0, 716.0, 900.0);
        let summary = store.update(&[nudged, b.clone()], now);
        assert!(summary.is_quiet());
        assert!(store.group_id(a.id()).is_some());
    }

    #[test]
    fn closing_a_member_dissolves_the_pair() {
        let now = Instant::now();
        let (a, b) = (left(1), right(2));
        let mut store = store();
        store.update(&[a.clone(), b.clone()], now);
        store.register_pair_if_eligible(&b, &a, &detector(), now);

        let summary = store.update(&[b.clone()], now);
        assert_eq!(summary.removed, 1);
        assert_eq!(summary.dissolved, 1);
        assert!(!store.is_tracked(a.id()));
        assert_eq!(store.group_id(b.id()), None);
        assert_eq!(store.group_count(), 0);
    }

    #[test]
    fn three_member_groups_survive_one_departure() {
        let now = Instant::now();
        let (a, b, c) = (left(1), right(2), right(3));
        let windows = vec![a.clone(), b.clone(), c.clone()];
        let mut store = store();
        store.update(&windows, now);

        let group = store.ensure_group(&a, now);
        assert!(store.assign_window(&b, group));
        assert!(store.assign_window(&c, group));
        assert!(store.seal(group));

        store.update(&[a.clone(), b.clone()], now);
        assert_eq!(store.members(group), vec![a.id(), b.id()]);
        store.check_invariants().unwrap();
    }

    #[test]
    fn pending_groups_wait_for_seal() {
        let now = Instant::now();
        let a = left(1);
        let mut store = store();

        let group = store.ensure_group(&a, now);
        assert!(store.is_pending(group));
        assert_eq!(store.group_origin(group), Some(GroupOrigin::Manual));
        assert_eq!(store.ensure_group(&a, now), group);
        store.check_invariants().unwrap();

        // A singleton is never reported as a group.
        assert!(store.current_groups(&[a.clone()]).is_empty());
        assert_eq!(store.group_for(&a, &[a.clone()], true, now).len(), 1);

        assert!(!store.seal(group));
        assert_eq!(store.group_id(a.id()), None);
        store.check_invariants().unwrap();
    }

    #[test]
    fn reassignment_dissolves_the_previous_group() {
        let now = Instant::now();
        let (a, b, c) = (left(1), right(2), right(3));
        let mut store = store();
        store.update(&[a.clone(), b.clone(), c.clone()], now);
        let first = store.register_pair_if_eligible(&a, &b, &detector(), now).group.unwrap();

        let second = store.create_group(GroupOrigin::Manual, true, now);
        assert!(store.add_window(c.id(), second));
        assert!(store.add_window(b.id(), second));
        // Idempotent.
        assert!(store.add_window(b.id(), second));
        assert!(store.seal(second));

        assert!(!store.contains_group(first));
        assert_eq!(store.group_id(a.id()), None);
        assert_eq!(store.members(second), vec![b.id(), c.id()]);
        store.check_invariants().unwrap();
    }

    #[test]
    fn unknown_windows_and_groups_are_rejected() {
        let now = Instant::now();
        let a = left(1);
        let mut store = store();
        let group = store.create_group(GroupOrigin::Manual, true, now);
        assert!(!store.add_window(a.id(), group));

        store.seal(group);
        assert!(!store.assign_window(&a, group));
        assert!(!store.is_tracked(a.id()));
    }
}
