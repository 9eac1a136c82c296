//! Hash collections with a fast non-cryptographic hasher.
//!
//! Keys in this crate are small integers and slotmap keys, so SipHash buys
//! nothing.

pub use std::collections::{BTreeMap, BTreeSet};

pub type HashMap<K, V> = rustc_hash::FxHashMap<K, V>;
pub type HashSet<T> = rustc_hash::FxHashSet<T>;
