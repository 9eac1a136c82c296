pub mod group_store;
pub mod manual;

pub use group_store::{GroupId, GroupOrigin, GroupStore, PairDecision, PairReason, UpdateSummary};
pub use manual::ManualSession;
