//! An in-memory [`WindowSystem`] driven by tests and replay scripts.
//!
//! The state lives behind a shared lock so the driver can keep mutating the
//! world while the grouper owns its own clone.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::error::SysError;
use super::geometry::Rect;
use super::screen::Screen;
use super::window_server::{
    ElementId, FocusedWindow, WindowHandle, WindowId, WindowServerId, WindowSnapshot,
    WindowSystem, pid_t,
};

/// A front-ordering request observed by the scripted system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaiseCall {
    Raise(WindowHandle),
    ActivateAndRaise {
        handle: WindowHandle,
        bring_app_to_front: bool,
    },
    RaiseWithoutActivating(WindowHandle),
}

#[derive(Debug)]
struct State {
    trusted: bool,
    non_activating_supported: bool,
    screens: Vec<Screen>,
    windows: Vec<WindowSnapshot>,
    hidden: Vec<WindowSnapshot>,
    focused: Option<FocusedWindow>,
    calls: Vec<RaiseCall>,
}

#[derive(Clone, Debug)]
pub struct ScriptedWindows(Arc<Mutex<State>>);

/// Builds a snapshot whose handle mirrors its element id.
pub fn scripted_window(
    server_id: Option<u32>,
    element_id: u64,
    pid: pid_t,
    app_name: &str,
    frame: Rect,
) -> WindowSnapshot {
    WindowSnapshot {
        server_id: server_id.map(WindowServerId::new),
        element_id: ElementId(element_id),
        pid,
        app_name: app_name.to_string(),
        frame,
        handle: WindowHandle(element_id),
    }
}

impl ScriptedWindows {
    pub fn new(screens: Vec<Screen>) -> Self {
        Self(Arc::new(Mutex::new(State {
            trusted: true,
            non_activating_supported: false,
            screens,
            windows: Vec::new(),
            hidden: Vec::new(),
            focused: None,
            calls: Vec::new(),
        })))
    }

    pub fn set_trusted(&self, trusted: bool) { self.0.lock().trusted = trusted; }

    pub fn set_non_activating_supported(&self, supported: bool) {
        self.0.lock().non_activating_supported = supported;
    }

    pub fn set_windows(&self, windows: Vec<WindowSnapshot>) { self.0.lock().windows = windows; }

    /// Windows that only show up when off-screen windows are requested.
    pub fn set_hidden_windows(&self, windows: Vec<WindowSnapshot>) {
        self.0.lock().hidden = windows;
    }

    pub fn set_frame(&self, id: WindowId, frame: Rect) -> bool {
        let mut state = self.0.lock();
        match state.windows.iter_mut().find(|w| w.id() == id) {
            Some(window) => {
                window.frame = frame;
                true
            }
            None => false,
        }
    }

    pub fn close(&self, id: WindowId) -> bool {
        let mut state = self.0.lock();
        let before = state.windows.len();
        state.windows.retain(|w| w.id() != id);
        if state.focused.as_ref().is_some_and(|f| focused_matches(f, id)) {
            state.focused = None;
        }
        state.windows.len() != before
    }

    /// Focuses a known window, reporting every identity key for it.
    pub fn focus(&self, id: WindowId) -> bool {
        let mut state = self.0.lock();
        let Some(window) = state.windows.iter().find(|w| w.id() == id) else {
            return false;
        };
        state.focused = Some(FocusedWindow::of(window));
        true
    }

    /// Reports focus exactly as given, for exercising identity fallbacks.
    pub fn set_focused(&self, focused: Option<FocusedWindow>) { self.0.lock().focused = focused; }

    pub fn take_calls(&self) -> Vec<RaiseCall> { std::mem::take(&mut self.0.lock().calls) }
}

fn focused_matches(focused: &FocusedWindow, id: WindowId) -> bool {
    match id {
        WindowId::Server(server_id) => focused.server_id == Some(server_id),
        WindowId::Element(element_id) => focused.element_id == Some(element_id),
    }
}

impl WindowSystem for ScriptedWindows {
    fn is_trusted(&self) -> bool { self.0.lock().trusted }

    fn screens(&self) -> Vec<Screen> { self.0.lock().screens.clone() }

    fn visible_windows(&self, include_off_screen: bool) -> Result<Vec<WindowSnapshot>, SysError> {
        let state = self.0.lock();
        if !state.trusted {
            return Err(SysError::PermissionDenied);
        }
        let mut windows = state.windows.clone();
        if include_off_screen {
            windows.extend(state.hidden.iter().cloned());
        }
        Ok(windows)
    }

    fn focused_window(&self) -> Option<FocusedWindow> { self.0.lock().focused.clone() }

    fn raise(&self, handle: WindowHandle) -> Result<(), SysError> {
        let mut state = self.0.lock();
        if !state.windows.iter().any(|w| w.handle == handle) {
            return Err(SysError::WindowGone(handle));
        }
        state.calls.push(RaiseCall::Raise(handle));
        Ok(())
    }

    fn activate_and_raise(
        &self,
        handle: WindowHandle,
        bring_app_to_front: bool,
    ) -> Result<(), SysError> {
        let mut state = self.0.lock();
        let Some(window) = state.windows.iter().find(|w| w.handle == handle) else {
            return Err(SysError::WindowGone(handle));
        };
        let focused = FocusedWindow::of(window);
        state.focused = Some(focused);
        state.calls.push(RaiseCall::ActivateAndRaise { handle, bring_app_to_front });
        Ok(())
    }

    fn raise_without_activating(&self, handle: WindowHandle) -> Result<(), SysError> {
        let mut state = self.0.lock();
        if !state.non_activating_supported {
            return Err(SysError::Unsupported("raise without activating"));
        }
        if !state.windows.iter().any(|w| w.handle == handle) {
            return Err(SysError::WindowGone(handle));
        }
        state.calls.push(RaiseCall::RaiseWithoutActivating(handle));
        Ok(())
    }

    fn raw_window_list(&self) -> Result<Vec<String>, SysError> {
        let state = self.0.lock();
        Ok(state
            .windows
            .iter()
            .chain(state.hidden.iter())
            .map(|w| {
                format!(
                    "number={:?} element={} pid={} owner={:?} bounds={}",
                    w.server_id.map(u32::from),
                    w.element_id.0,
                    w.pid,
                    w.app_name,
                    w.frame
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activation_moves_focus() {
        let system = ScriptedWindows::new(vec![Screen::uncovered(
            1,
            Rect::new(0.0, 0.0, 1440.0, 900.0),
        )]);
        let a = scripted_window(Some(1), 1, 10, "A", Rect::new(0.0, 0.0, 720.0, 900.0));
        let b = scripted_window(Some(2), 2, 20, "B", Rect::new(720.0, 0.0, 720.0, 900.0));
        system.set_windows(vec![a.clone(), b.clone()]);
        system.focus(a.id());

        system.activate_and_raise(b.handle, true).unwrap();
        assert_eq!(
            system.focused_window().and_then(|f| f.server_id),
            Some(WindowServerId(2))
        );
        assert_eq!(system.take_calls().len(), 1);
        assert!(system.take_calls().is_empty());
    }

    #[test]
    fn hidden_windows_require_opt_in() {
        let system = ScriptedWindows::new(vec![]);
        system.set_hidden_windows(vec![scripted_window(
            None,
            5,
            10,
            "A",
            Rect::new(0.0, 0.0, 10.0, 10.0),
        )]);
        assert!(system.visible_windows(false).unwrap().is_empty());
        assert_eq!(system.visible_windows(true).unwrap().len(), 1);
    }

    #[test]
    fn untrusted_systems_refuse_enumeration() {
        let system = ScriptedWindows::new(vec![]);
        system.set_trusted(false);
        assert_eq!(system.visible_windows(false), Err(SysError::PermissionDenied));
    }
}
