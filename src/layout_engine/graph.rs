use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// The half of a screen a window is tiled against.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SnapSide {
    Left,
    Right,
}

impl SnapSide {
    pub fn opposite(self) -> SnapSide {
        match self {
            SnapSide::Left => SnapSide::Right,
            SnapSide::Right => SnapSide::Left,
        }
    }

    /// `"left"`, `"right"`, or `"none"` for an unsnapped window.
    pub fn name(side: Option<SnapSide>) -> &'static str { side.map_or("none", Into::into) }

    /// Only a left/right combination pairs automatically; a missing side
    /// never does.
    pub fn complements(a: Option<SnapSide>, b: Option<SnapSide>) -> bool {
        matches!((a, b), (Some(a), Some(b)) if a.opposite() == b)
    }
}
