//! Preference Handles
//!
//! A [`Pref`] represents one typed (key, default) slot in a backend
//! collection. The handle never caches the committed value: every read goes
//! back to the backend, so external writes are always visible.
//!
//! Change delivery is callback-based: the owning [`PrefStore`] fans each
//! changed-key event out to the handles whose key matches, and each handle
//! runs its registered callbacks in registration order. [`Pref::observe`]
//! layers a stream view on top of the same registry.
//!
//! [`PrefStore`]: crate::store::PrefStore

use async_stream::stream;
use futures_core::Stream;
use parking_lot::Mutex;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::codec::ValueCodec;
use crate::kv::KvAdapter;
use crate::prelude::*;

/// Token identifying a registered callback.
///
/// Returned by [`Pref::add_on_changed`] / [`Pref::add_on_destroyed`] and
/// consumed by the matching remove method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

type Callback = Arc<dyn Fn() + Send + Sync>;

/// Type-erased registry view of a handle, held by the owning store for
/// fan-out and cascade destroy.
pub(crate) trait PrefEntry: Send + Sync {
	fn key(&self) -> &str;

	/// Run every on-changed callback. No-op on a destroyed handle.
	fn notify_changed(&self);

	fn destroy(&self);
}

struct PrefInner<T> {
	kv: Arc<dyn KvAdapter>,
	key: Box<str>,
	default: T,
	codec: Box<dyn ValueCodec<T>>,
	/// get/set exclusion on this handle; held across the backend await
	rw: tokio::sync::Mutex<()>,
	on_changed: Mutex<Vec<(CallbackId, Callback)>>,
	on_destroyed: Mutex<Vec<(CallbackId, Callback)>>,
	next_callback: AtomicU64,
	destroyed: AtomicBool,
}

impl<T> PrefInner<T> {
	fn register(&self, list: &Mutex<Vec<(CallbackId, Callback)>>, callback: Callback) -> CallbackId {
		let id = CallbackId(self.next_callback.fetch_add(1, Ordering::Relaxed));
		list.lock().push((id, callback));
		id
	}

	fn destroy(&self) {
		if self.destroyed.swap(true, Ordering::AcqRel) {
			return;
		}
		self.on_changed.lock().clear();
		// Snapshot under the lock, invoke outside it
		let fired: Vec<Callback> =
			self.on_destroyed.lock().drain(..).map(|(_, callback)| callback).collect();
		for callback in fired {
			callback();
		}
		debug!(key = %self.key, "pref destroyed");
	}
}

impl<T: Send + Sync> PrefEntry for PrefInner<T> {
	fn key(&self) -> &str {
		&self.key
	}

	fn notify_changed(&self) {
		if self.destroyed.load(Ordering::Acquire) {
			return;
		}
		let callbacks: Vec<Callback> =
			self.on_changed.lock().iter().map(|(_, callback)| Arc::clone(callback)).collect();
		for callback in callbacks {
			callback();
		}
	}

	fn destroy(&self) {
		PrefInner::destroy(self);
	}
}

/// A single typed preference slot.
///
/// Cheap to clone; clones share one callback registry and one destroyed
/// flag. Two handles obtained from two separate factory calls for the same
/// key stay fully independent — there is no per-key deduplication.
pub struct Pref<T> {
	inner: Arc<PrefInner<T>>,
}

impl<T> Clone for Pref<T> {
	fn clone(&self) -> Self {
		Self { inner: Arc::clone(&self.inner) }
	}
}

impl<T> fmt::Debug for Pref<T> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("Pref")
			.field("key", &self.inner.key)
			.field("destroyed", &self.inner.destroyed.load(Ordering::Acquire))
			.finish_non_exhaustive()
	}
}

impl<T> Pref<T> {
	/// The handle's fixed key.
	pub fn key(&self) -> &str {
		&self.inner.key
	}

	/// The fixed default supplied at creation.
	pub fn default_value(&self) -> &T {
		&self.inner.default
	}

	fn ensure_live(&self) -> PrefResult<()> {
		if self.inner.destroyed.load(Ordering::Acquire) {
			return Err(Error::Destroyed);
		}
		Ok(())
	}

	/// Register a callback invoked whenever this handle's key changes in the
	/// backend. Callbacks take no arguments; re-read via [`Pref::get`].
	pub fn add_on_changed(
		&self,
		callback: impl Fn() + Send + Sync + 'static,
	) -> PrefResult<CallbackId> {
		self.ensure_live()?;
		Ok(self.inner.register(&self.inner.on_changed, Arc::new(callback)))
	}

	/// Unregister a callback added with [`Pref::add_on_changed`].
	pub fn remove_on_changed(&self, id: CallbackId) -> PrefResult<()> {
		self.ensure_live()?;
		self.inner.on_changed.lock().retain(|(cb_id, _)| *cb_id != id);
		Ok(())
	}

	/// Register a callback fired exactly once when the handle is destroyed.
	pub fn add_on_destroyed(
		&self,
		callback: impl Fn() + Send + Sync + 'static,
	) -> PrefResult<CallbackId> {
		self.ensure_live()?;
		Ok(self.inner.register(&self.inner.on_destroyed, Arc::new(callback)))
	}

	/// Unregister a callback added with [`Pref::add_on_destroyed`].
	pub fn remove_on_destroyed(&self, id: CallbackId) -> PrefResult<()> {
		self.ensure_live()?;
		self.inner.on_destroyed.lock().retain(|(cb_id, _)| *cb_id != id);
		Ok(())
	}

	/// Destroy the handle: clear on-changed registrations and fire each
	/// on-destroyed callback exactly once. Idempotent; the persisted value
	/// is untouched. Any other method fails with [`Error::Destroyed`]
	/// afterwards.
	pub fn destroy(&self) {
		self.inner.destroy();
	}
}

impl<T: Clone + Send + Sync + 'static> Pref<T> {
	pub(crate) fn new(
		kv: Arc<dyn KvAdapter>,
		key: Box<str>,
		default: T,
		codec: Box<dyn ValueCodec<T>>,
	) -> Self {
		Self {
			inner: Arc::new(PrefInner {
				kv,
				key,
				default,
				codec,
				rw: tokio::sync::Mutex::new(()),
				on_changed: Mutex::new(Vec::new()),
				on_destroyed: Mutex::new(Vec::new()),
				next_callback: AtomicU64::new(0),
				destroyed: AtomicBool::new(false),
			}),
		}
	}

	pub(crate) fn entry(&self) -> Arc<dyn PrefEntry> {
		Arc::clone(&self.inner) as Arc<dyn PrefEntry>
	}

	/// The current value: the default when the key is absent, otherwise
	/// exactly what the codec reads from the backend.
	pub async fn get(&self) -> PrefResult<T> {
		self.ensure_live()?;
		let _guard = self.inner.rw.lock().await;
		if !self.inner.kv.contains(&self.inner.key).await? {
			return Ok(self.inner.default.clone());
		}
		self.inner.codec.read(&self.inner.key, &*self.inner.kv).await
	}

	/// Write a new value through an edit batch. Commit is fire-and-forget
	/// beyond the returned result.
	pub async fn set(&self, value: T) -> PrefResult<()> {
		self.ensure_live()?;
		let _guard = self.inner.rw.lock().await;
		let mut edit = self.inner.kv.edit().await?;
		self.inner.codec.write(&self.inner.key, &value, edit.as_mut());
		edit.apply().await
	}

	/// Whether the backend currently holds a value for this key. The
	/// default never counts as set.
	pub async fn is_set(&self) -> PrefResult<bool> {
		self.ensure_live()?;
		self.inner.kv.contains(&self.inner.key).await
	}

	/// Remove any stored value; subsequent [`Pref::get`] returns the default.
	pub async fn delete(&self) -> PrefResult<()> {
		self.ensure_live()?;
		let _guard = self.inner.rw.lock().await;
		let mut edit = self.inner.kv.edit().await?;
		edit.remove(&self.inner.key);
		edit.apply().await
	}

	/// Stream view of this preference.
	///
	/// Yields the current value immediately, then a fresh read per change to
	/// this key, and completes when the handle is destroyed. Built over the
	/// on-changed registry, so the owning store's single backend
	/// subscription stays the only one. Dropping the stream unregisters it.
	pub fn observe(&self) -> PrefResult<Pin<Box<dyn Stream<Item = PrefResult<T>> + Send>>> {
		self.ensure_live()?;
		let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<()>();
		// Register before the initial read so a change landing in between
		// is not lost
		let id = self.add_on_changed(move || {
			let _ = tx.send(());
		})?;
		let pref = self.clone();
		let stream = stream! {
			let _guard = ObserveGuard { pref: pref.clone(), id };
			yield pref.get().await;
			// destroy() drops the registered callback, closing the channel
			while rx.recv().await.is_some() {
				if pref.ensure_live().is_err() {
					break;
				}
				yield pref.get().await;
			}
		};
		Ok(Box::pin(stream))
	}
}

struct ObserveGuard<T> {
	pref: Pref<T>,
	id: CallbackId,
}

impl<T> Drop for ObserveGuard<T> {
	fn drop(&mut self) {
		let _ = self.pref.remove_on_changed(self.id);
	}
}

// vim: ts=4
