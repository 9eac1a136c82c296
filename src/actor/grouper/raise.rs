//! Bringing a group to the front.

use tracing::{debug, warn};

use crate::sys::SysError;
use crate::sys::window_server::{WindowSnapshot, WindowSystem};

#[derive(Debug, Default)]
pub struct Raiser {
    non_activating: bool,
    warned_unsupported: bool,
}

impl Raiser {
    pub fn new(non_activating: bool) -> Self {
        Self {
            non_activating,
            warned_unsupported: false,
        }
    }

    pub fn set_non_activating(&mut self, enabled: bool) {
        if self.non_activating != enabled {
            self.non_activating = enabled;
            self.warned_unsupported = false;
        }
    }

    /// Raises every member other than `focused`, then activates `focused` so
    /// it ends up frontmost. Failures on individual windows are logged and
    /// skipped. Returns the number of windows successfully ordered.
    pub fn raise_group<S: WindowSystem>(
        &mut self,
        system: &S,
        members: &[WindowSnapshot],
        focused: &WindowSnapshot,
    ) -> usize {
        let focused_id = focused.id();
        let mut raised = 0;
        for window in members.iter().filter(|w| w.id() != focused_id) {
            match self.raise_one(system, window) {
                Ok(()) => raised += 1,
                Err(e) => warn!(window = %window.id(), error = %e, "failed to raise group member"),
            }
        }
        match system.activate_and_raise(focused.handle, true) {
            Ok(()) => raised += 1,
            Err(e) => warn!(window = %focused_id, error = %e, "failed to activate focused window"),
        }
        debug!(focused = %focused_id, members = members.len(), raised, "raised group");
        raised
    }

    fn raise_one<S: WindowSystem>(
        &mut self,
        system: &S,
        window: &WindowSnapshot,
    ) -> Result<(), SysError> {
        if !self.non_activating {
            return system.raise(window.handle);
        }
        match system.raise_without_activating(window.handle) {
            Err(SysError::Unsupported(what)) => {
                if !self.warned_unsupported {
                    warn!("{what} is not available, falling back to a normal raise");
                    self.warned_unsupported = true;
                }
                system.raise(window.handle)
            }
            result => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;
    use crate::sys::geometry::Rect;
    use crate::sys::screen::Screen;
    use crate::sys::scripted::{RaiseCall, ScriptedWindows, scripted_window};
    use crate::sys::window_server::WindowHandle;

    fn setup() -> (ScriptedWindows, Vec<WindowSnapshot>) {
        let system =
            ScriptedWindows::new(vec![Screen::uncovered(1, Rect::new(0.0, 0.0, 1440.0, 900.0))]);
        let windows = vec![
            scripted_window(Some(1), 1, 10, "A", Rect::new(0.0, 0.0, 720.0, 900.0)),
            scripted_window(Some(2), 2, 20, "B", Rect::new(720.0, 0.0, 720.0, 900.0)),
            scripted_window(Some(3), 3, 30, "C", Rect::new(720.0, 0.0, 720.0, 450.0)),
        ];
        system.set_windows(windows.clone());
        (system, windows)
    }

    #[test]
    fn others_first_then_focused() {
        let (system, windows) = setup();
        let mut raiser = Raiser::new(false);
        assert_eq!(raiser.raise_group(&system, &windows, &windows[1]), 3);
        assert_eq!(
            system.take_calls(),
            vec![
                RaiseCall::Raise(WindowHandle(1)),
                RaiseCall::Raise(WindowHandle(3)),
                RaiseCall::ActivateAndRaise {
                    handle: WindowHandle(2),
                    bring_app_to_front: true
                },
            ]
        );
    }

    #[test]
    fn non_activating_raise_falls_back_when_unsupported() {
        let (system, windows) = setup();
        let mut raiser = Raiser::new(true);
        raiser.raise_group(&system, &windows[..2], &windows[0]);
        assert_eq!(system.take_calls()[0], RaiseCall::Raise(WindowHandle(2)));
        assert!(raiser.warned_unsupported);

        system.set_non_activating_supported(true);
        raiser.raise_group(&system, &windows[..2], &windows[0]);
        assert_eq!(system.take_calls()[0], RaiseCall::RaiseWithoutActivating(WindowHandle(2)));
    }

    #[test]
    fn closed_members_are_skipped() {
        let (system, windows) = setup();
        system.close(windows[2].id());
        let mut raiser = Raiser::new(false);
        assert_eq!(raiser.raise_group(&system, &windows, &windows[0]), 2);
        assert_eq!(system.take_calls().len(), 2);
    }
}
