//! In-memory backend
//!
//! [`MemoryKv`] keeps the whole collection in a `HashMap` behind an async
//! `RwLock` and broadcasts changed keys on a `tokio::sync::broadcast`
//! channel. It is the reference [`KvAdapter`] implementation: useful as an
//! embeddable default and as the backend for tests that need direct access
//! to the raw store.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

use crate::kv::{KvAdapter, KvEdit, Value};
use crate::prelude::*;

const DEFAULT_CHANGE_CAPACITY: usize = 64;

type Map = Arc<RwLock<HashMap<Box<str>, Value>>>;

/// In-memory key-value backend with a changed-key feed.
#[derive(Debug)]
pub struct MemoryKv {
	map: Map,
	change_tx: broadcast::Sender<Box<str>>,
}

impl MemoryKv {
	/// Create an empty collection with the default change-feed capacity.
	pub fn new() -> Self {
		Self::with_capacity(DEFAULT_CHANGE_CAPACITY)
	}

	/// Create an empty collection with a custom change-feed capacity.
	/// Slow watchers lag (and are skipped past) once the buffer fills.
	pub fn with_capacity(capacity: usize) -> Self {
		let (change_tx, _) = broadcast::channel(capacity);
		Self { map: Arc::new(RwLock::new(HashMap::new())), change_tx }
	}

	async fn read(&self, key: &str) -> Option<Value> {
		self.map.read().await.get(key).cloned()
	}
}

impl Default for MemoryKv {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl KvAdapter for MemoryKv {
	async fn get_bool(&self, key: &str, default: bool) -> PrefResult<bool> {
		match self.read(key).await {
			None => Ok(default),
			Some(Value::Bool(v)) => Ok(v),
			Some(other) => Err(Error::TypeMismatch {
				key: key.into(),
				expected: "bool",
				found: other.kind(),
			}),
		}
	}

	async fn get_int(&self, key: &str, default: i32) -> PrefResult<i32> {
		match self.read(key).await {
			None => Ok(default),
			Some(Value::Int(v)) => Ok(v),
			Some(other) => Err(Error::TypeMismatch {
				key: key.into(),
				expected: "int",
				found: other.kind(),
			}),
		}
	}

	async fn get_long(&self, key: &str, default: i64) -> PrefResult<i64> {
		match self.read(key).await {
			None => Ok(default),
			Some(Value::Long(v)) => Ok(v),
			Some(other) => Err(Error::TypeMismatch {
				key: key.into(),
				expected: "long",
				found: other.kind(),
			}),
		}
	}

	async fn get_float(&self, key: &str, default: f32) -> PrefResult<f32> {
		match self.read(key).await {
			None => Ok(default),
			Some(Value::Float(v)) => Ok(v),
			Some(other) => Err(Error::TypeMismatch {
				key: key.into(),
				expected: "float",
				found: other.kind(),
			}),
		}
	}

	async fn get_string(&self, key: &str, default: &str) -> PrefResult<String> {
		match self.read(key).await {
			None => Ok(default.to_string()),
			Some(Value::Str(v)) => Ok(v.into()),
			Some(other) => Err(Error::TypeMismatch {
				key: key.into(),
				expected: "string",
				found: other.kind(),
			}),
		}
	}

	async fn get_string_set(
		&self,
		key: &str,
		default: &HashSet<String>,
	) -> PrefResult<HashSet<String>> {
		match self.read(key).await {
			None => Ok(default.clone()),
			Some(Value::StrSet(v)) => Ok(v),
			Some(other) => Err(Error::TypeMismatch {
				key: key.into(),
				expected: "string set",
				found: other.kind(),
			}),
		}
	}

	async fn contains(&self, key: &str) -> PrefResult<bool> {
		Ok(self.map.read().await.contains_key(key))
	}

	async fn edit(&self) -> PrefResult<Box<dyn KvEdit>> {
		Ok(Box::new(MemoryEdit {
			map: Arc::clone(&self.map),
			change_tx: self.change_tx.clone(),
			ops: Vec::new(),
			applied: false,
		}))
	}

	async fn clear(&self) -> PrefResult<()> {
		let removed: Vec<Box<str>> = {
			let mut map = self.map.write().await;
			map.drain().map(|(key, _)| key).collect()
		};
		// Write lock is dropped here — broadcast without holding it
		for key in removed {
			let _ = self.change_tx.send(key);
		}
		Ok(())
	}

	fn watch(&self) -> broadcast::Receiver<Box<str>> {
		self.change_tx.subscribe()
	}
}

/// Staged puts and removes, applied under one write lock.
struct MemoryEdit {
	map: Map,
	change_tx: broadcast::Sender<Box<str>>,
	ops: Vec<(Box<str>, Option<Value>)>,
	applied: bool,
}

impl MemoryEdit {
	fn stage(&mut self, key: &str, value: Value) {
		self.ops.push((key.into(), Some(value)));
	}
}

#[async_trait]
impl KvEdit for MemoryEdit {
	fn put_bool(&mut self, key: &str, value: bool) {
		self.stage(key, Value::Bool(value));
	}

	fn put_int(&mut self, key: &str, value: i32) {
		self.stage(key, Value::Int(value));
	}

	fn put_long(&mut self, key: &str, value: i64) {
		self.stage(key, Value::Long(value));
	}

	fn put_float(&mut self, key: &str, value: f32) {
		self.stage(key, Value::Float(value));
	}

	fn put_string(&mut self, key: &str, value: &str) {
		self.stage(key, Value::Str(value.into()));
	}

	fn put_string_set(&mut self, key: &str, value: &HashSet<String>) {
		self.stage(key, Value::StrSet(value.clone()));
	}

	fn remove(&mut self, key: &str) {
		self.ops.push((key.into(), None));
	}

	async fn apply(&mut self) -> PrefResult<()> {
		if self.applied {
			return Ok(());
		}
		self.applied = true;

		let ops: Vec<(Box<str>, Option<Value>)> = self.ops.drain(..).collect();
		let mut changed = Vec::with_capacity(ops.len());
		{
			let mut map = self.map.write().await;
			for (key, op) in ops {
				match op {
					Some(value) => {
						map.insert(key.clone(), value);
						changed.push(key);
					}
					None => {
						if map.remove(&key).is_some() {
							changed.push(key);
						}
					}
				}
			}
		}
		// All mutations are visible before the first event goes out
		for key in changed {
			let _ = self.change_tx.send(key);
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_get_with_default() {
		let kv = MemoryKv::new();

		assert!(!kv.contains("missing").await.unwrap());
		assert_eq!(kv.get_int("missing", 7).await.unwrap(), 7);
		assert_eq!(kv.get_string("missing", "fallback").await.unwrap(), "fallback");
	}

	#[tokio::test]
	async fn test_edit_roundtrip() {
		let kv = MemoryKv::new();

		let mut edit = kv.edit().await.unwrap();
		edit.put_bool("flag", true);
		edit.put_long("big", i64::MIN);
		edit.apply().await.unwrap();

		assert!(kv.get_bool("flag", false).await.unwrap());
		assert_eq!(kv.get_long("big", 0).await.unwrap(), i64::MIN);
	}

	#[tokio::test]
	async fn test_staged_writes_invisible_until_apply() {
		let kv = MemoryKv::new();

		let mut edit = kv.edit().await.unwrap();
		edit.put_int("pending", 1);
		assert!(!kv.contains("pending").await.unwrap());

		edit.apply().await.unwrap();
		assert!(kv.contains("pending").await.unwrap());
	}

	#[tokio::test]
	async fn test_type_mismatch() {
		let kv = MemoryKv::new();

		let mut edit = kv.edit().await.unwrap();
		edit.put_string("name", "alice");
		edit.apply().await.unwrap();

		let err = kv.get_int("name", 0).await.unwrap_err();
		assert!(matches!(err, Error::TypeMismatch { .. }));
	}

	#[tokio::test]
	async fn test_watch_reports_changed_keys() {
		let kv = MemoryKv::new();
		let mut rx = kv.watch();

		let mut edit = kv.edit().await.unwrap();
		edit.put_int("a", 1);
		edit.put_int("b", 2);
		edit.apply().await.unwrap();

		assert_eq!(rx.recv().await.unwrap().as_ref(), "a");
		assert_eq!(rx.recv().await.unwrap().as_ref(), "b");
	}

	#[tokio::test]
	async fn test_remove_absent_key_is_silent() {
		let kv = MemoryKv::new();
		let mut rx = kv.watch();

		let mut edit = kv.edit().await.unwrap();
		edit.remove("ghost");
		edit.put_int("real", 1);
		edit.apply().await.unwrap();

		// Only the put is reported
		assert_eq!(rx.recv().await.unwrap().as_ref(), "real");
	}

	#[tokio::test]
	async fn test_clear_reports_every_key() {
		let kv = MemoryKv::new();

		let mut edit = kv.edit().await.unwrap();
		edit.put_int("a", 1);
		edit.put_int("b", 2);
		edit.apply().await.unwrap();

		let mut rx = kv.watch();
		kv.clear().await.unwrap();

		let mut cleared = vec![
			rx.recv().await.unwrap(),
			rx.recv().await.unwrap(),
		];
		cleared.sort();
		assert_eq!(cleared, vec!["a".into(), "b".into()]);
		assert!(!kv.contains("a").await.unwrap());
	}
}

// vim: ts=4
