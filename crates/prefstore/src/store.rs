//! Preference Store Facade
//!
//! A [`PrefStore`] wraps one backend collection: it is the factory for typed
//! [`Pref`] handles, owns the registry of live handles, and holds the single
//! subscription to the backend's changed-key feed, fanning each event out to
//! the handles whose key matches.

use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

use crate::codec::{
	BoolCodec, EnumCodec, FloatCodec, IntCodec, LongCodec, StringCodec, StringSetCodec, ValueCodec,
};
use crate::kv::KvAdapter;
use crate::pref::{Pref, PrefEntry};
use crate::prelude::*;

type Registry = Arc<RwLock<Vec<Arc<dyn PrefEntry>>>>;

/// Facade over one named preference collection.
///
/// Exactly one changed-key subscription exists per store, no matter how many
/// handles are created. Calling a factory method twice with the same key
/// yields two independent handles observing the same underlying key; this is
/// deliberate, not deduplicated.
pub struct PrefStore {
	kv: Arc<dyn KvAdapter>,
	children: Registry,
	destroyed: AtomicBool,
	fanout: tokio::task::JoinHandle<()>,
}

impl PrefStore {
	/// Wrap a backend collection. Must be called inside a tokio runtime:
	/// the store spawns its fan-out task here.
	pub fn new(kv: Arc<dyn KvAdapter>) -> Self {
		let children: Registry = Arc::new(RwLock::new(Vec::new()));
		let fanout = Self::spawn_fanout(kv.watch(), Arc::clone(&children));
		Self { kv, children, destroyed: AtomicBool::new(false), fanout }
	}

	/// Consume the backend's changed-key feed and notify matching handles.
	fn spawn_fanout(
		mut rx: broadcast::Receiver<Box<str>>,
		children: Registry,
	) -> tokio::task::JoinHandle<()> {
		tokio::spawn(async move {
			loop {
				match rx.recv().await {
					Ok(key) => {
						// Snapshot matching handles, invoke outside the lock
						let matching: Vec<Arc<dyn PrefEntry>> = children
							.read()
							.iter()
							.filter(|child| child.key() == key.as_ref())
							.map(Arc::clone)
							.collect();
						for child in matching {
							child.notify_changed();
						}
					}
					Err(broadcast::error::RecvError::Lagged(n)) => {
						warn!("change feed lagged, missed {} events", n);
						continue;
					}
					Err(broadcast::error::RecvError::Closed) => break,
				}
			}
		})
	}

	fn ensure_live(&self) -> PrefResult<()> {
		if self.destroyed.load(Ordering::Acquire) {
			return Err(Error::Destroyed);
		}
		Ok(())
	}

	fn register<T: Clone + Send + Sync + 'static>(
		&self,
		key: Box<str>,
		default: T,
		codec: Box<dyn ValueCodec<T>>,
	) -> PrefResult<Pref<T>> {
		self.ensure_live()?;
		let pref = Pref::new(Arc::clone(&self.kv), key, default, codec);
		self.children.write().push(pref.entry());
		debug!(key = %pref.key(), "pref registered");
		Ok(pref)
	}

	/// A boolean preference.
	pub fn boolean(&self, key: impl Into<Box<str>>, default: bool) -> PrefResult<Pref<bool>> {
		self.register(key.into(), default, Box::new(BoolCodec))
	}

	/// A 32-bit integer preference.
	pub fn integer(&self, key: impl Into<Box<str>>, default: i32) -> PrefResult<Pref<i32>> {
		self.register(key.into(), default, Box::new(IntCodec))
	}

	/// A 64-bit integer preference.
	pub fn long(&self, key: impl Into<Box<str>>, default: i64) -> PrefResult<Pref<i64>> {
		self.register(key.into(), default, Box::new(LongCodec))
	}

	/// A float preference.
	pub fn float(&self, key: impl Into<Box<str>>, default: f32) -> PrefResult<Pref<f32>> {
		self.register(key.into(), default, Box::new(FloatCodec))
	}

	/// A string preference.
	pub fn string(
		&self,
		key: impl Into<Box<str>>,
		default: impl Into<String>,
	) -> PrefResult<Pref<String>> {
		self.register(key.into(), default.into(), Box::new(StringCodec))
	}

	/// A string-set preference. Values compare by set equality; insertion
	/// order is not preserved.
	pub fn string_set(
		&self,
		key: impl Into<Box<str>>,
		default: HashSet<String>,
	) -> PrefResult<Pref<HashSet<String>>> {
		self.register(key.into(), default, Box::new(StringSetCodec))
	}

	/// An enumeration preference, persisted as the backend's string type.
	///
	/// `decode` must fail for strings outside the caller's mapping — the
	/// failure surfaces from `get()` instead of being replaced by the
	/// default. `encode` must be a left-inverse of `decode`:
	/// `decode(&encode(x))` yields `x` for every valid `x`.
	pub fn enumeration<T, D, E>(
		&self,
		key: impl Into<Box<str>>,
		default: T,
		decode: D,
		encode: E,
	) -> PrefResult<Pref<T>>
	where
		T: Clone + Send + Sync + 'static,
		D: Fn(&str) -> PrefResult<T> + Send + Sync + 'static,
		E: Fn(&T) -> String + Send + Sync + 'static,
	{
		let codec = EnumCodec::new(&default, decode, encode);
		self.register(key.into(), default, Box::new(codec))
	}

	/// Remove every key in the collection. Live handles are not destroyed;
	/// each removed key produces a change notification from the backend.
	pub async fn clear(&self) -> PrefResult<()> {
		self.ensure_live()?;
		self.kv.clear().await
	}

	/// The raw backend handle, for callers that need to bypass the typed
	/// layer.
	pub fn kv(&self) -> Arc<dyn KvAdapter> {
		Arc::clone(&self.kv)
	}

	/// Tear the store down: drop the changed-key subscription, destroy every
	/// child handle exactly once, empty the registry. Idempotent; any other
	/// method fails with [`Error::Destroyed`] afterwards.
	pub fn destroy(&self) {
		if self.destroyed.swap(true, Ordering::AcqRel) {
			return;
		}
		self.fanout.abort();
		let children: Vec<Arc<dyn PrefEntry>> = self.children.write().drain(..).collect();
		for child in &children {
			child.destroy();
		}
		debug!(children = children.len(), "pref store destroyed");
	}
}

impl Drop for PrefStore {
	fn drop(&mut self) {
		// Only the fan-out task is reclaimed here; handles stay usable for
		// reads and writes without a live store, they just stop receiving
		// notifications. Cascading destruction is destroy()'s job.
		self.fanout.abort();
	}
}

impl fmt::Debug for PrefStore {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("PrefStore")
			.field("kv", &self.kv)
			.field("children", &self.children.read().len())
			.field("destroyed", &self.destroyed.load(Ordering::Acquire))
			.finish_non_exhaustive()
	}
}

// vim: ts=4
