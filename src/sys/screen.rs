use serde::{Deserialize, Serialize};

use super::geometry::Rect;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ScreenId(pub u32);

/// A display as reported by the windowing collaborator.
///
/// `visible_frame` excludes the menu bar and dock; snapping is judged against
/// it, while screen assignment uses the full `frame`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Screen {
    pub id: ScreenId,
    pub frame: Rect,
    pub visible_frame: Rect,
}

impl Screen {
    pub fn new(id: u32, frame: Rect, visible_frame: Rect) -> Self {
        Self {
            id: ScreenId(id),
            frame,
            visible_frame,
        }
    }

    /// A screen without any reserved area.
    pub fn uncovered(id: u32, frame: Rect) -> Self { Self::new(id, frame, frame) }
}

/// Returns the index of the screen containing the center of `frame`.
pub fn screen_index_of(screens: &[Screen], frame: &Rect) -> Option<usize> {
    let center = frame.mid();
    screens.iter().position(|screen| screen.frame.contains(center))
}
