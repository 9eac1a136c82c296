//! Geometric classification of window rectangles.
//!
//! Everything here is a pure function of the current frames, the configured
//! tolerances and the screen list. No state is carried between refreshes.

use super::graph::{Orientation, SnapSide};
use crate::common::config::DetectorSettings;
use crate::sys::geometry::Rect;
use crate::sys::screen::{self, Screen};
use crate::sys::window_server::WindowSnapshot;

/// Snapped windows cover at least this much of the visible height.
const SNAP_MIN_HEIGHT_RATIO: f64 = 0.8;
/// Snapped windows cover between these fractions of the visible width.
const SNAP_MIN_WIDTH_RATIO: f64 = 0.35;
const SNAP_MAX_WIDTH_RATIO: f64 = 0.7;
/// Floor for the distance between a snapped edge and the screen edge.
const SNAP_MIN_EDGE_SLACK: f64 = 12.0;

#[derive(Debug, Clone)]
pub struct Detector {
    edge_tolerance: f64,
    min_overlap_ratio: f64,
    screens: Vec<Screen>,
}

impl Detector {
    pub fn new(settings: &DetectorSettings, screens: Vec<Screen>) -> Self {
        Self {
            edge_tolerance: settings.edge_tolerance,
            min_overlap_ratio: settings.min_overlap_ratio,
            screens,
        }
    }

    pub fn update_settings(&mut self, settings: &DetectorSettings) {
        self.edge_tolerance = settings.edge_tolerance;
        self.min_overlap_ratio = settings.min_overlap_ratio;
    }

    pub fn set_screens(&mut self, screens: Vec<Screen>) { self.screens = screens; }

    pub fn screens(&self) -> &[Screen] { &self.screens }

    pub fn edge_tolerance(&self) -> f64 { self.edge_tolerance }

    pub fn min_overlap_ratio(&self) -> f64 { self.min_overlap_ratio }

    /// Index of the screen containing the center of `frame`.
    pub fn screen_index_of(&self, frame: &Rect) -> Option<usize> {
        screen::screen_index_of(&self.screens, frame)
    }

    pub fn same_screen(&self, a: &Rect, b: &Rect) -> bool {
        match (self.screen_index_of(a), self.screen_index_of(b)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Which edge two rectangles share, if they are tiled neighbours.
    ///
    /// `Horizontal` means they sit side by side (a vertical edge touches),
    /// `Vertical` means one is stacked above the other. Screens are not
    /// considered; callers restrict comparisons to same-screen pairs.
    pub fn adjacency(&self, a: &Rect, b: &Rect) -> Option<Orientation> {
        let tol = self.edge_tolerance;
        let overlap_x = a.overlap_x(b);
        let overlap_y = a.overlap_y(b);

        // Overlapping in both directions means stacked, not tiled.
        if overlap_x > tol && overlap_y > tol {
            return None;
        }

        let min_height = a.height().min(b.height());
        let x_edges_touch =
            (a.max_x() - b.min_x()).abs() <= tol || (b.max_x() - a.min_x()).abs() <= tol;
        if overlap_y >= self.min_overlap_ratio * min_height && x_edges_touch {
            return Some(Orientation::Horizontal);
        }

        let min_width = a.width().min(b.width());
        let y_edges_touch =
            (a.max_y() - b.min_y()).abs() <= tol || (b.max_y() - a.min_y()).abs() <= tol;
        if overlap_x >= self.min_overlap_ratio * min_width && y_edges_touch {
            return Some(Orientation::Vertical);
        }

        None
    }

    pub fn is_adjacent(&self, a: &Rect, b: &Rect) -> bool { self.adjacency(a, b).is_some() }

    /// Classifies a window tiled against the left or right half of its
    /// screen's visible area. This looks at the window alone.
    pub fn snap_side(&self, frame: &Rect) -> Option<SnapSide> {
        let screen = &self.screens[self.screen_index_of(frame)?];
        let visible = &screen.visible_frame;
        if visible.width() <= 0.0 || visible.height() <= 0.0 {
            return None;
        }

        if frame.height() < SNAP_MIN_HEIGHT_RATIO * visible.height() {
            return None;
        }
        let width_ratio = frame.width() / visible.width();
        if !(SNAP_MIN_WIDTH_RATIO..=SNAP_MAX_WIDTH_RATIO).contains(&width_ratio) {
            return None;
        }

        let slack = SNAP_MIN_EDGE_SLACK.max(2.0 * self.edge_tolerance);
        if (frame.min_x() - visible.min_x()).abs() <= slack {
            Some(SnapSide::Left)
        } else if (frame.max_x() - visible.max_x()).abs() <= slack {
            Some(SnapSide::Right)
        } else {
            None
        }
    }

    /// The connected cluster of same-screen neighbours around `focused`.
    /// The focused window is always the first element.
    pub fn adjacent_windows<'a>(
        &self,
        focused: &'a WindowSnapshot,
        candidates: &'a [WindowSnapshot],
    ) -> Vec<&'a WindowSnapshot> {
        let focused_id = focused.id();
        let nodes: Vec<&WindowSnapshot> = std::iter::once(focused)
            .chain(candidates.iter().filter(|w| w.id() != focused_id))
            .collect();
        let mut visited = vec![false; nodes.len()];
        self.component(0, &nodes, &mut visited)
            .into_iter()
            .map(|i| nodes[i])
            .collect()
    }

    /// Every connected cluster among `candidates`, singletons included.
    pub fn adjacency_groups<'a>(
        &self,
        candidates: &'a [WindowSnapshot],
    ) -> Vec<Vec<&'a WindowSnapshot>> {
        let nodes: Vec<&WindowSnapshot> = candidates.iter().collect();
        let mut visited = vec![false; nodes.len()];
        let mut groups = Vec::new();
        for seed in 0..nodes.len() {
            if visited[seed] {
                continue;
            }
            let members = self.component(seed, &nodes, &mut visited);
            groups.push(members.into_iter().map(|i| nodes[i]).collect());
        }
        groups
    }

    fn component(&self, seed: usize, nodes: &[&WindowSnapshot], visited: &mut [bool]) -> Vec<usize> {
        let screens: Vec<Option<usize>> =
            nodes.iter().map(|w| self.screen_index_of(&w.frame)).collect();
        let mut stack = vec![seed];
        let mut members = Vec::new();
        visited[seed] = true;
        while let Some(i) = stack.pop() {
            members.push(i);
            let Some(screen) = screens[i] else { continue };
            for j in 0..nodes.len() {
                if visited[j] || screens[j] != Some(screen) {
                    continue;
                }
                if self.is_adjacent(&nodes[i].frame, &nodes[j].frame) {
                    visited[j] = true;
                    stack.push(j);
                }
            }
        }
        members
    }
}
