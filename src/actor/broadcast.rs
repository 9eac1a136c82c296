use serde::{Deserialize, Serialize};

use crate::sys::window_server::{WindowId, WindowSnapshot};

/// Notifications for UI collaborators, such as a transient overlay that
/// highlights a group when it comes to the front.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
pub enum BroadcastEvent {
    GroupRaised { members: Vec<WindowSnapshot> },
    GroupsChanged { groups: Vec<Vec<WindowId>> },
}

pub type BroadcastSender = crate::actor::Sender<BroadcastEvent>;
pub type BroadcastReceiver = crate::actor::Receiver<BroadcastEvent>;
