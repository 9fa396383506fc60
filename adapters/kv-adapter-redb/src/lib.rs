#![forbid(unsafe_code)]

//! redb-backed [`KvAdapter`] for prefstore.
//!
//! Stores the whole preference collection in a single redb file: one table
//! mapping key strings to JSON-encoded [`Value`]s. Blocking redb work runs
//! on `tokio::task::spawn_blocking`; the changed-key feed is a
//! `tokio::sync::broadcast` channel fed after each committed write, so
//! every mutation — including ones made through another `RedbKv` edit on
//! the same instance — reaches the watchers.

mod edit;
mod error;

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

pub use edit::RedbEdit;
pub use error::Error;

use prefstore::prelude::*;
use prefstore::{Error as PrefError, KvAdapter, KvEdit, Value};

/// Preference storage table
const TABLE_PREFS: redb::TableDefinition<&str, &str> = redb::TableDefinition::new("prefs");

/// Backend configuration options
#[derive(Debug, Clone)]
pub struct RedbKvConfig {
	/// Broadcast channel capacity for the changed-key feed
	pub broadcast_capacity: usize,
}

impl Default for RedbKvConfig {
	fn default() -> Self {
		Self { broadcast_capacity: 1000 }
	}
}

/// redb-based implementation of [`KvAdapter`].
#[derive(Debug)]
pub struct RedbKv {
	db: Arc<redb::Database>,
	change_tx: broadcast::Sender<Box<str>>,
}

impl RedbKv {
	/// Open (or create) the database file at `path`.
	pub async fn new(path: impl Into<PathBuf>, config: RedbKvConfig) -> PrefResult<Self> {
		let path = path.into();
		let db = tokio::task::spawn_blocking(move || -> Result<redb::Database, Error> {
			let db = if path.exists() {
				redb::Database::open(&path).map_err(error::from_redb)?
			} else {
				redb::Database::create(&path).map_err(error::from_redb)?
			};

			// Make sure the table exists before the first read transaction
			let tx = db.begin_write().map_err(error::from_redb)?;
			let _ = tx.open_table(TABLE_PREFS).map_err(error::from_redb)?;
			tx.commit().map_err(error::from_redb)?;

			Ok(db)
		})
		.await
		.map_err(Error::from)??;

		let (change_tx, _) = broadcast::channel(config.broadcast_capacity);
		debug!("opened redb preference store");

		Ok(Self { db: Arc::new(db), change_tx })
	}

	async fn read_value(&self, key: &str) -> PrefResult<Option<Value>> {
		let db = Arc::clone(&self.db);
		let key = key.to_string();

		let value = tokio::task::spawn_blocking(move || -> Result<Option<Value>, Error> {
			use redb::ReadableDatabase;

			let tx = db.begin_read().map_err(error::from_redb)?;
			let table = tx.open_table(TABLE_PREFS).map_err(error::from_redb)?;

			match table.get(key.as_str()).map_err(error::from_redb)? {
				Some(raw) => Ok(Some(serde_json::from_str(raw.value())?)),
				None => Ok(None),
			}
		})
		.await
		.map_err(Error::from)??;

		Ok(value)
	}

	fn mismatch(key: &str, expected: &'static str, found: &Value) -> PrefError {
		PrefError::TypeMismatch { key: key.into(), expected, found: found.kind() }
	}
}

#[async_trait]
impl KvAdapter for RedbKv {
	async fn get_bool(&self, key: &str, default: bool) -> PrefResult<bool> {
		match self.read_value(key).await? {
			None => Ok(default),
			Some(Value::Bool(v)) => Ok(v),
			Some(other) => Err(Self::mismatch(key, "bool", &other)),
		}
	}

	async fn get_int(&self, key: &str, default: i32) -> PrefResult<i32> {
		match self.read_value(key).await? {
			None => Ok(default),
			Some(Value::Int(v)) => Ok(v),
			Some(other) => Err(Self::mismatch(key, "int", &other)),
		}
	}

	async fn get_long(&self, key: &str, default: i64) -> PrefResult<i64> {
		match self.read_value(key).await? {
			None => Ok(default),
			Some(Value::Long(v)) => Ok(v),
			Some(other) => Err(Self::mismatch(key, "long", &other)),
		}
	}

	async fn get_float(&self, key: &str, default: f32) -> PrefResult<f32> {
		match self.read_value(key).await? {
			None => Ok(default),
			Some(Value::Float(v)) => Ok(v),
			Some(other) => Err(Self::mismatch(key, "float", &other)),
		}
	}

	async fn get_string(&self, key: &str, default: &str) -> PrefResult<String> {
		match self.read_value(key).await? {
			None => Ok(default.to_string()),
			Some(Value::Str(v)) => Ok(v.into()),
			Some(other) => Err(Self::mismatch(key, "string", &other)),
		}
	}

	async fn get_string_set(
		&self,
		key: &str,
		default: &HashSet<String>,
	) -> PrefResult<HashSet<String>> {
		match self.read_value(key).await? {
			None => Ok(default.clone()),
			Some(Value::StrSet(v)) => Ok(v),
			Some(other) => Err(Self::mismatch(key, "string set", &other)),
		}
	}

	async fn contains(&self, key: &str) -> PrefResult<bool> {
		let db = Arc::clone(&self.db);
		let key = key.to_string();

		let present = tokio::task::spawn_blocking(move || -> Result<bool, Error> {
			use redb::ReadableDatabase;

			let tx = db.begin_read().map_err(error::from_redb)?;
			let table = tx.open_table(TABLE_PREFS).map_err(error::from_redb)?;

			Ok(table.get(key.as_str()).map_err(error::from_redb)?.is_some())
		})
		.await
		.map_err(Error::from)??;

		Ok(present)
	}

	async fn edit(&self) -> PrefResult<Box<dyn KvEdit>> {
		Ok(Box::new(RedbEdit::new(Arc::clone(&self.db), self.change_tx.clone())))
	}

	async fn clear(&self) -> PrefResult<()> {
		let db = Arc::clone(&self.db);

		let removed = tokio::task::spawn_blocking(move || -> Result<Vec<Box<str>>, Error> {
			use redb::ReadableTable;

			let tx = db.begin_write().map_err(error::from_redb)?;
			let removed = {
				let mut table = tx.open_table(TABLE_PREFS).map_err(error::from_redb)?;

				let mut keys: Vec<Box<str>> = Vec::new();
				for item in table.iter().map_err(error::from_redb)? {
					let (key, _) = item.map_err(error::from_redb)?;
					keys.push(Box::from(key.value()));
				}

				for key in &keys {
					table.remove(key.as_ref()).map_err(error::from_redb)?;
				}
				keys
			};
			tx.commit().map_err(error::from_redb)?;

			Ok(removed)
		})
		.await
		.map_err(Error::from)??;

		for key in removed {
			let _ = self.change_tx.send(key);
		}
		Ok(())
	}

	fn watch(&self) -> broadcast::Receiver<Box<str>> {
		self.change_tx.subscribe()
	}
}

// vim: ts=4
