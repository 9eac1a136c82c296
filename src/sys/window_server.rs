//! Window identity and the windowing collaborator interface.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::SysError;
use super::geometry::Rect;
use super::screen::Screen;

#[allow(non_camel_case_types)]
pub type pid_t = i32;

/// Frames of the same process within this distance on every axis are treated
/// as the same window when no identifier resolves.
pub const FINGERPRINT_TOLERANCE: f64 = 20.0;

/// Native window number assigned by the window server.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WindowServerId(pub u32);

impl WindowServerId {
    #[inline]
    pub fn new(id: u32) -> Self { Self(id) }
}

impl From<WindowServerId> for u32 {
    #[inline]
    fn from(id: WindowServerId) -> Self { id.0 }
}

/// Stable per-element identity for windows whose native number is unknown.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ElementId(pub u64);

/// Opaque token used only to issue raise/activate requests.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WindowHandle(pub u64);

/// The identity a window is tracked under, in order of preference.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowId {
    Server(WindowServerId),
    Element(ElementId),
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowId::Server(id) => write!(f, "ws:{}", id.0),
            WindowId::Element(id) => write!(f, "el:{:x}", id.0),
        }
    }
}

/// One observed window for one refresh. Replaced wholesale every refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSnapshot {
    pub server_id: Option<WindowServerId>,
    pub element_id: ElementId,
    pub pid: pid_t,
    pub app_name: String,
    pub frame: Rect,
    pub handle: WindowHandle,
}

impl WindowSnapshot {
    pub fn id(&self) -> WindowId {
        match self.server_id {
            Some(id) => WindowId::Server(id),
            None => WindowId::Element(self.element_id),
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint {
            pid: self.pid,
            frame: self.frame,
        }
    }
}

/// What the collaborator knows about the focused window. Any of the keys may
/// be missing, which is why it has to be resolved against a snapshot set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusedWindow {
    pub server_id: Option<WindowServerId>,
    pub element_id: Option<ElementId>,
    pub pid: pid_t,
    pub frame: Option<Rect>,
}

impl FocusedWindow {
    pub fn of(window: &WindowSnapshot) -> Self {
        Self {
            server_id: window.server_id,
            element_id: Some(window.element_id),
            pid: window.pid,
            frame: Some(window.frame),
        }
    }

    pub fn fingerprint(&self) -> Option<Fingerprint> {
        self.frame.map(|frame| Fingerprint { pid: self.pid, frame })
    }
}

/// Owner and geometry of a window, used as the identity of last resort.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub pid: pid_t,
    pub frame: Rect,
}

impl Fingerprint {
    pub fn matches(&self, window: &WindowSnapshot) -> bool {
        self.pid == window.pid && self.frame.max_delta(&window.frame) <= FINGERPRINT_TOLERANCE
    }
}

/// Which key resolved a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum MatchedBy {
    ServerId,
    ElementId,
    Geometry,
}

/// Finds the snapshot for the focused window: native window number first,
/// then element identity, then the nearest same-process frame within
/// [`FINGERPRINT_TOLERANCE`].
pub fn resolve_focused<'a>(
    focused: &FocusedWindow,
    windows: &'a [WindowSnapshot],
) -> Option<(&'a WindowSnapshot, MatchedBy)> {
    if let Some(server_id) = focused.server_id
        && let Some(window) = windows.iter().find(|w| w.server_id == Some(server_id))
    {
        return Some((window, MatchedBy::ServerId));
    }
    if let Some(element_id) = focused.element_id
        && let Some(window) = windows.iter().find(|w| w.element_id == element_id)
    {
        return Some((window, MatchedBy::ElementId));
    }
    let fingerprint = focused.fingerprint()?;
    windows
        .iter()
        .filter(|w| fingerprint.matches(w))
        .min_by(|a, b| {
            let da = fingerprint.frame.total_delta(&a.frame);
            let db = fingerprint.frame.total_delta(&b.frame);
            da.total_cmp(&db)
        })
        .map(|w| (w, MatchedBy::Geometry))
}

/// The operating system's windowing capabilities, as consumed by the engine.
///
/// Implementations are expected to return promptly or fail fast.
pub trait WindowSystem: Send + 'static {
    /// Whether accessibility access has been granted. Grouping pauses while
    /// this is false.
    fn is_trusted(&self) -> bool { true }

    fn screens(&self) -> Vec<Screen>;

    fn visible_windows(&self, include_off_screen: bool) -> Result<Vec<WindowSnapshot>, SysError>;

    fn focused_window(&self) -> Option<FocusedWindow>;

    fn raise(&self, handle: WindowHandle) -> Result<(), SysError>;

    fn activate_and_raise(
        &self,
        handle: WindowHandle,
        bring_app_to_front: bool,
    ) -> Result<(), SysError>;

    /// Optional capability. The default reports it as unavailable.
    fn raise_without_activating(&self, _handle: WindowHandle) -> Result<(), SysError> {
        Err(SysError::Unsupported("raise without activating"))
    }

    /// Unfiltered window list straight from the window server, for dumps.
    fn raw_window_list(&self) -> Result<Vec<String>, SysError> {
        Err(SysError::Unsupported("raw window list"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(server: Option<u32>, element: u64, pid: pid_t, frame: Rect) -> WindowSnapshot {
        WindowSnapshot {
            server_id: server.map(WindowServerId::new),
            element_id: ElementId(element),
            pid,
            app_name: format!("app{pid}"),
            frame,
            handle: WindowHandle(element),
        }
    }

    #[test]
    fn ids_prefer_the_window_number() {
        let a = window(Some(7), 70, 1, Rect::new(0.0, 0.0, 10.0, 10.0));
        let b = window(None, 71, 1, Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(a.id(), WindowId::Server(WindowServerId(7)));
        assert_eq!(b.id(), WindowId::Element(ElementId(71)));
        assert_eq!(a.id().to_string(), "ws:7");
        assert_eq!(b.id().to_string(), "el:47");
    }

    #[test]
    fn resolution_follows_the_fallback_chain() {
        let windows = vec![
            window(Some(1), 10, 100, Rect::new(0.0, 0.0, 720.0, 900.0)),
            window(None, 11, 100, Rect::new(720.0, 0.0, 720.0, 900.0)),
            window(None, 12, 200, Rect::new(720.0, 0.0, 720.0, 900.0)),
        ];

        let by_server = FocusedWindow {
            server_id: Some(WindowServerId(1)),
            element_id: Some(ElementId(11)),
            pid: 100,
            frame: None,
        };
        let (w, how) = resolve_focused(&by_server, &windows).unwrap();
        assert_eq!(w.element_id, ElementId(10));
        assert_eq!(how, MatchedBy::ServerId);

        let by_element = FocusedWindow {
            server_id: Some(WindowServerId(99)),
            element_id: Some(ElementId(11)),
            pid: 100,
            frame: None,
        };
        let (w, how) = resolve_focused(&by_element, &windows).unwrap();
        assert_eq!(w.element_id, ElementId(11));
        assert_eq!(how, MatchedBy::ElementId);

        let by_geometry = FocusedWindow {
            server_id: None,
            element_id: None,
            pid: 200,
            frame: Some(Rect::new(725.0, 3.0, 715.0, 897.0)),
        };
        let (w, how) = resolve_focused(&by_geometry, &windows).unwrap();
        assert_eq!(w.element_id, ElementId(12));
        assert_eq!(how, MatchedBy::Geometry);
    }

    #[test]
    fn resolution_gives_up_when_nothing_is_close() {
        let windows = vec![window(Some(1), 10, 100, Rect::new(0.0, 0.0, 720.0, 900.0))];
        let far = FocusedWindow {
            server_id: None,
            element_id: None,
            pid: 100,
            frame: Some(Rect::new(300.0, 0.0, 720.0, 900.0)),
        };
        assert!(resolve_focused(&far, &windows).is_none());
    }
}
