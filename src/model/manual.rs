//! User-driven grouping: collect windows one focus at a time, then bind them.
//!
//! Identity resolution is not always reliable, so every added window is
//! remembered under all of its keys and each key type is matched on its own
//! when the session finishes.

use std::time::Instant;

use tracing::{debug, info};

use crate::common::collections::BTreeSet;
use crate::model::group_store::{GroupId, GroupOrigin, GroupStore};
use crate::sys::window_server::{ElementId, Fingerprint, WindowServerId, WindowSnapshot};

#[derive(Debug, Default)]
pub struct ManualSession {
    active: bool,
    target: Option<GroupId>,
    server_ids: BTreeSet<WindowServerId>,
    element_ids: BTreeSet<ElementId>,
    fingerprints: Vec<Fingerprint>,
    added: usize,
}

/// What finishing a session produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Finished {
    /// Distinct windows added during the session.
    pub identities: usize,
    /// Live members of the resulting group. Empty when nothing was grouped.
    pub members: Vec<WindowSnapshot>,
}

impl ManualSession {
    pub fn is_active(&self) -> bool { self.active }

    pub fn target(&self) -> Option<GroupId> { self.target }

    pub fn added(&self) -> usize { self.added }

    /// Starts a clean session, discarding anything left from a previous one.
    pub fn start(&mut self) {
        *self = ManualSession::default();
        self.active = true;
        info!("manual grouping session started");
    }

    /// Flips the session on or off. Turning it off keeps whatever was already
    /// assigned and lets the store drop a group that ended up too small.
    /// Returns the new state.
    pub fn toggle(&mut self, store: &mut GroupStore) -> bool {
        if self.active {
            self.cancel(store);
        } else {
            self.start();
        }
        self.active
    }

    /// Adds the focused window to the session's group. Returns the number of
    /// distinct windows added so far, or `None` if no session is active.
    pub fn add_focused(
        &mut self,
        store: &mut GroupStore,
        focused: &WindowSnapshot,
        now: Instant,
    ) -> Option<usize> {
        if !self.active {
            return None;
        }

        let mut fresh = self.element_ids.insert(focused.element_id);
        if let Some(server_id) = focused.server_id {
            fresh &= self.server_ids.insert(server_id);
        }
        self.fingerprints.push(focused.fingerprint());
        if fresh {
            self.added += 1;
        }

        match self.target.filter(|&group| store.contains_group(group)) {
            Some(group) => {
                store.assign_window(focused, group);
            }
            None => {
                let group = store.ensure_group(focused, now);
                self.target = Some(group);
            }
        }

        debug!(window = %focused.id(), count = self.added, "added window to manual session");
        Some(self.added)
    }

    /// Binds every window matching a recorded identity into the target group
    /// and ends the session. Returns `None` if no session was active.
    pub fn finish(
        &mut self,
        store: &mut GroupStore,
        windows: &[WindowSnapshot],
        now: Instant,
    ) -> Option<Finished> {
        if !self.active {
            return None;
        }
        let identities = self.added;

        if identities < 2 {
            info!(identities, "manual session finished with fewer than two windows");
            self.cancel(store);
            return Some(Finished {
                identities,
                members: Vec::new(),
            });
        }

        let group = match self.target.filter(|&group| store.contains_group(group)) {
            Some(group) => group,
            None => store.create_group(GroupOrigin::Manual, true, now),
        };
        for window in windows.iter().filter(|w| self.recorded(w)) {
            store.assign_window(window, group);
        }
        let members = if store.seal(group) {
            store.windows_in_group(group, windows)
        } else {
            Vec::new()
        };
        info!(
            identities,
            members = members.len(),
            "manual session finished"
        );

        *self = ManualSession::default();
        Some(Finished { identities, members })
    }

    /// Ends the session without materializing its identities.
    pub fn cancel(&mut self, store: &mut GroupStore) {
        if let Some(group) = self.target {
            store.seal(group);
        }
        *self = ManualSession::default();
        info!("manual grouping session ended");
    }

    fn recorded(&self, window: &WindowSnapshot) -> bool {
        window.server_id.is_some_and(|id| self.server_ids.contains(&id))
            || self.element_ids.contains(&window.element_id)
            || self.fingerprints.iter().any(|fp| fp.matches(window))
    }
}
