use thiserror::Error;

use super::window_server::WindowHandle;

/// Failures reported by the windowing collaborator.
///
/// None of these are fatal to the grouping engine; callers log them and skip
/// the current cycle or fall back to a weaker operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SysError {
    #[error("capability unavailable: {0}")]
    Unsupported(&'static str),
    #[error("accessibility permission not granted")]
    PermissionDenied,
    #[error("window {0:?} no longer exists")]
    WindowGone(WindowHandle),
    #[error("window system call failed: {0}")]
    Failed(String),
}
