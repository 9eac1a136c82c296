//! Human-readable dumps of what the engine currently sees.
//!
//! Nothing here mutates state; the actor logs the lines and hands them back
//! to whoever asked.

use std::time::Instant;

use crate::layout_engine::{Detector, SnapSide};
use crate::model::group_store::GroupStore;
use crate::sys::window_server::{FocusedWindow, WindowSnapshot, resolve_focused};

pub fn describe_window(window: &WindowSnapshot, detector: &Detector, store: &GroupStore) -> String {
    let screen = detector
        .screen_index_of(&window.frame)
        .map_or_else(|| "-".to_string(), |i| i.to_string());
    let group = store
        .group_id(window.id())
        .map_or_else(|| "-".to_string(), |g| format!("{g:?}"));
    format!(
        "{} pid={} app={:?} frame={} screen={} side={} group={}",
        window.id(),
        window.pid,
        window.app_name,
        window.frame,
        screen,
        SnapSide::name(detector.snap_side(&window.frame)),
        group
    )
}

pub fn visible_windows(
    windows: &[WindowSnapshot],
    detector: &Detector,
    store: &GroupStore,
) -> Vec<String> {
    let mut lines = vec![format!("{} visible window(s)", windows.len())];
    lines.extend(windows.iter().map(|w| describe_window(w, detector, store)));
    lines
}

/// How the focused window resolves against the snapshot set, and what it is
/// adjacent and grouped with.
pub fn focused_context(
    focused: Option<&FocusedWindow>,
    windows: &[WindowSnapshot],
    detector: &Detector,
    store: &GroupStore,
    now: Instant,
) -> Vec<String> {
    let Some(focused) = focused else {
        return vec!["no focused window".to_string()];
    };
    let mut lines = vec![format!(
        "focused: server_id={:?} element_id={:?} pid={} frame={}",
        focused.server_id.map(u32::from),
        focused.element_id.map(|e| e.0),
        focused.pid,
        focused.frame.map_or_else(|| "-".to_string(), |f| f.to_string())
    )];
    let Some((window, matched_by)) = resolve_focused(focused, windows) else {
        lines.push("focused window did not match any visible window".to_string());
        return lines;
    };
    lines.push(format!("resolved by {matched_by}: {}", describe_window(window, detector, store)));

    let others: Vec<WindowSnapshot> =
        windows.iter().filter(|w| w.id() != window.id()).cloned().collect();
    for neighbour in detector.adjacent_windows(window, &others).into_iter().skip(1) {
        lines.push(format!("adjacent: {}", describe_window(neighbour, detector, store)));
    }
    if let Some(group) = store.group_id(window.id()) {
        let members: Vec<String> = store.members(group).iter().map(|m| m.to_string()).collect();
        let age = store
            .group_formed_at(group)
            .map_or_else(|| "-".to_string(), |at| format!("{:?}", now.saturating_duration_since(at)));
        lines.push(format!(
            "group {group:?} ({}, formed {age} ago): {}",
            store.group_origin(group).map_or_else(|| "-".to_string(), |o| o.to_string()),
            members.join(", ")
        ));
    }
    lines
}

/// Why the current focus/window data looks wrong, if it does.
pub fn anomaly(focused: Option<&FocusedWindow>, windows: &[WindowSnapshot]) -> Option<&'static str> {
    match focused {
        Some(_) if windows.is_empty() => Some("focus reported but no visible windows"),
        Some(focused) if resolve_focused(focused, windows).is_none() => {
            Some("focused window is not among the visible windows")
        }
        _ => None,
    }
}
