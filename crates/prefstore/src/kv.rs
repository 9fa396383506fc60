//! Key-Value Backend Adapter
//!
//! Trait and types for pluggable key-value backends that hold one typed
//! value per string key.
//!
//! Read operations (typed get-with-default, contains) work directly on the
//! adapter. Write operations go through a [`KvEdit`] batch with an explicit
//! apply, so a backend can commit several staged puts and removes at once.
//!
//! Each adapter implementation provides its own constructor handling
//! backend-specific initialization (file path, channel capacity, etc.).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Debug;
use tokio::sync::broadcast;

use crate::prelude::*;

/// A typed value as stored by a backend.
///
/// Backends persist values in whatever encoding suits them, but the type
/// system they expose is this one: a typed read against a key holding a
/// different kind fails with [`Error::TypeMismatch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Value {
	Bool(bool),
	Int(i32),
	Long(i64),
	Float(f32),
	Str(Box<str>),
	StrSet(HashSet<String>),
}

impl Value {
	/// Human-readable kind tag, used in type-mismatch errors.
	pub fn kind(&self) -> &'static str {
		match self {
			Value::Bool(_) => "bool",
			Value::Int(_) => "int",
			Value::Long(_) => "long",
			Value::Float(_) => "float",
			Value::Str(_) => "string",
			Value::StrSet(_) => "string set",
		}
	}
}

/// Batched edit for atomic write operations.
///
/// Puts and removes are staged synchronously; nothing is visible to readers
/// until [`KvEdit::apply`] commits the batch. Commit semantics are
/// fire-and-forget from the caller's point of view: `apply` reports whether
/// the batch was accepted, and no further completion signal exists.
#[async_trait]
pub trait KvEdit: Send {
	/// Stage a boolean put.
	fn put_bool(&mut self, key: &str, value: bool);

	/// Stage a 32-bit integer put.
	fn put_int(&mut self, key: &str, value: i32);

	/// Stage a 64-bit integer put.
	fn put_long(&mut self, key: &str, value: i64);

	/// Stage a float put.
	fn put_float(&mut self, key: &str, value: f32);

	/// Stage a string put.
	fn put_string(&mut self, key: &str, value: &str);

	/// Stage a string-set put.
	fn put_string_set(&mut self, key: &str, value: &HashSet<String>);

	/// Stage a key removal.
	fn remove(&mut self, key: &str);

	/// Commit the staged batch. A second call is a no-op.
	///
	/// After a successful apply the backend must emit one watch event per
	/// staged key, after the mutation is visible to readers.
	async fn apply(&mut self) -> PrefResult<()>;
}

/// Key-Value Backend Adapter trait.
///
/// Unified interface for preference backends. Provides typed reads with a
/// caller-supplied fallback, batched writes, and a changed-key feed.
#[async_trait]
pub trait KvAdapter: Debug + Send + Sync {
	/// Read a boolean, falling back to `default` when the key is absent.
	async fn get_bool(&self, key: &str, default: bool) -> PrefResult<bool>;

	/// Read a 32-bit integer, falling back to `default` when the key is absent.
	async fn get_int(&self, key: &str, default: i32) -> PrefResult<i32>;

	/// Read a 64-bit integer, falling back to `default` when the key is absent.
	async fn get_long(&self, key: &str, default: i64) -> PrefResult<i64>;

	/// Read a float, falling back to `default` when the key is absent.
	async fn get_float(&self, key: &str, default: f32) -> PrefResult<f32>;

	/// Read a string, falling back to `default` when the key is absent.
	async fn get_string(&self, key: &str, default: &str) -> PrefResult<String>;

	/// Read a string set, falling back to `default` when the key is absent.
	async fn get_string_set(
		&self,
		key: &str,
		default: &HashSet<String>,
	) -> PrefResult<HashSet<String>>;

	/// Check whether the key currently holds a value.
	async fn contains(&self, key: &str) -> PrefResult<bool>;

	/// Begin a new edit batch for write operations.
	async fn edit(&self) -> PrefResult<Box<dyn KvEdit>>;

	/// Remove every key in the collection, emitting one watch event per
	/// removed key.
	async fn clear(&self) -> PrefResult<()>;

	/// Subscribe to the changed-key feed.
	///
	/// The backend sends the key of every mutated or removed value — writes
	/// made through this adapter handle and writes made externally through
	/// any other handle to the same collection. An event delivered after an
	/// `apply` has been observed reflects that write or a later one.
	fn watch(&self) -> broadcast::Receiver<Box<str>>;
}

// vim: ts=4
