//! Typed, observable preferences over pluggable key-value backends.
//!
//! A [`PrefStore`] wraps one backend collection (any [`KvAdapter`]) and
//! hands out typed [`Pref`] handles — boolean, integer, long, float,
//! string, string-set, and caller-defined enumerations — each bound to a
//! string key and a default value. Reads fall back to the default while the
//! key is unset; writes go through the backend's batched edit. Every store
//! holds exactly one subscription to the backend's changed-key feed and
//! fans change notifications out to the handles whose key matches,
//! including changes made externally through other handles to the same
//! collection.
//!
//! The [`MemoryKv`] backend ships in this crate; persistent backends live
//! in their own adapter crates.

pub mod error;
pub mod kv;
pub mod memory;
pub mod pref;
pub mod prelude;
pub mod store;

mod codec;

pub use error::{Error, PrefResult};
pub use kv::{KvAdapter, KvEdit, Value};
pub use memory::MemoryKv;
pub use pref::{CallbackId, Pref};
pub use store::PrefStore;

// vim: ts=4
