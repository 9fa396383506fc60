use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;

use prefstore::prelude::*;
use prefstore::{KvEdit, Value};

use crate::{TABLE_PREFS, error};

/// Edit batch for the redb backend.
///
/// Puts and removes are staged in memory and applied in a single redb write
/// transaction; changed keys are broadcast only after the commit succeeds,
/// so a notification never precedes the visibility of its write.
pub struct RedbEdit {
	db: Arc<redb::Database>,
	change_tx: broadcast::Sender<Box<str>>,
	ops: Vec<(Box<str>, Option<Value>)>,
	applied: bool,
}

impl RedbEdit {
	pub(crate) fn new(db: Arc<redb::Database>, change_tx: broadcast::Sender<Box<str>>) -> Self {
		Self { db, change_tx, ops: Vec::new(), applied: false }
	}

	fn stage(&mut self, key: &str, value: Value) {
		self.ops.push((key.into(), Some(value)));
	}
}

#[async_trait]
impl KvEdit for RedbEdit {
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
		if ops.is_empty() {
			return Ok(());
		}

		let db = Arc::clone(&self.db);
		let changed = tokio::task::spawn_blocking(
			move || -> Result<Vec<Box<str>>, error::Error> {
				let tx = db.begin_write().map_err(error::from_redb)?;
				let mut changed = Vec::with_capacity(ops.len());
				{
					let mut table = tx.open_table(TABLE_PREFS).map_err(error::from_redb)?;
					for (key, op) in ops {
						match op {
							Some(value) => {
								let json = serde_json::to_string(&value)?;
								table
									.insert(key.as_ref(), json.as_str())
									.map_err(error::from_redb)?;
								changed.push(key);
							}
							None => {
								if table.remove(key.as_ref()).map_err(error::from_redb)?.is_some()
								{
									changed.push(key);
								}
							}
						}
					}
				}
				tx.commit().map_err(error::from_redb)?;
				Ok(changed)
			},
		)
		.await
		.map_err(error::Error::from)??;

		// The commit is visible before the first event goes out
		for key in changed {
			let _ = self.change_tx.send(key);
		}
		Ok(())
	}
}

// vim: ts=4
