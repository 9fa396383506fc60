use prefstore::{Error, KvAdapter, PrefStore};
use prefstore_kv_adapter_redb::{RedbKv, RedbKvConfig};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

/// Helper to create a temporary backend for testing
async fn create_kv() -> (RedbKv, TempDir) {
	let temp_dir = TempDir::new().expect("Failed to create temp directory");
	let path = temp_dir.path().join("prefs.redb");

	let kv = RedbKv::new(path, RedbKvConfig::default())
		.await
		.expect("Failed to open database");

	(kv, temp_dir)
}

#[tokio::test]
async fn test_get_with_default() {
	let (kv, _temp) = create_kv().await;

	assert!(!kv.contains("missing").await.unwrap());
	assert_eq!(kv.get_int("missing", 42).await.unwrap(), 42);
	assert_eq!(kv.get_string("missing", "fallback").await.unwrap(), "fallback");
	assert!(kv.get_bool("missing", true).await.unwrap());
}

#[tokio::test]
async fn test_roundtrip_all_types() {
	let (kv, _temp) = create_kv().await;

	let tags: HashSet<String> = ["red", "green"].iter().map(|s| (*s).to_string()).collect();

	let mut edit = kv.edit().await.unwrap();
	edit.put_bool("flag", true);
	edit.put_int("count", i32::MIN);
	edit.put_long("big", i64::MAX);
	edit.put_float("ratio", -1.5);
	edit.put_string("name", "alice");
	edit.put_string_set("tags", &tags);
	edit.apply().await.unwrap();

	assert!(kv.get_bool("flag", false).await.unwrap());
	assert_eq!(kv.get_int("count", 0).await.unwrap(), i32::MIN);
	assert_eq!(kv.get_long("big", 0).await.unwrap(), i64::MAX);
	assert_eq!(kv.get_float("ratio", 0.0).await.unwrap(), -1.5);
	assert_eq!(kv.get_string("name", "").await.unwrap(), "alice");
	assert_eq!(kv.get_string_set("tags", &HashSet::new()).await.unwrap(), tags);
}

#[tokio::test]
async fn test_staged_writes_invisible_until_apply() {
	let (kv, _temp) = create_kv().await;

	let mut edit = kv.edit().await.unwrap();
	edit.put_int("pending", 1);

	assert!(!kv.contains("pending").await.unwrap());

	edit.apply().await.unwrap();
	assert!(kv.contains("pending").await.unwrap());
	assert_eq!(kv.get_int("pending", 0).await.unwrap(), 1);
}

#[tokio::test]
async fn test_remove() {
	let (kv, _temp) = create_kv().await;

	let mut edit = kv.edit().await.unwrap();
	edit.put_string("gone", "soon");
	edit.apply().await.unwrap();
	assert!(kv.contains("gone").await.unwrap());

	let mut edit = kv.edit().await.unwrap();
	edit.remove("gone");
	edit.apply().await.unwrap();

	assert!(!kv.contains("gone").await.unwrap());
	assert_eq!(kv.get_string("gone", "default").await.unwrap(), "default");
}

#[tokio::test]
async fn test_type_mismatch() {
	let (kv, _temp) = create_kv().await;

	let mut edit = kv.edit().await.unwrap();
	edit.put_string("name", "alice");
	edit.apply().await.unwrap();

	let err = kv.get_long("name", 0).await.unwrap_err();
	assert!(matches!(err, Error::TypeMismatch { .. }));
}

#[tokio::test]
async fn test_watch_reports_committed_keys() {
	let (kv, _temp) = create_kv().await;
	let mut rx = kv.watch();

	let mut edit = kv.edit().await.unwrap();
	edit.put_int("a", 1);
	edit.put_int("b", 2);
	edit.remove("never_existed");
	edit.apply().await.unwrap();

	// Puts are reported in batch order; the no-op remove is silent
	assert_eq!(rx.recv().await.unwrap().as_ref(), "a");
	assert_eq!(rx.recv().await.unwrap().as_ref(), "b");
	assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_clear_removes_and_reports_every_key() {
	let (kv, _temp) = create_kv().await;

	let mut edit = kv.edit().await.unwrap();
	edit.put_int("a", 1);
	edit.put_int("b", 2);
	edit.apply().await.unwrap();

	let mut rx = kv.watch();
	kv.clear().await.unwrap();

	let mut cleared = vec![rx.recv().await.unwrap(), rx.recv().await.unwrap()];
	cleared.sort();
	assert_eq!(cleared, vec!["a".into(), "b".into()]);
	assert!(!kv.contains("a").await.unwrap());
	assert!(!kv.contains("b").await.unwrap());
}

#[tokio::test]
async fn test_values_persist_across_reopen() {
	let temp_dir = TempDir::new().expect("Failed to create temp directory");
	let path = temp_dir.path().join("prefs.redb");

	{
		let kv = RedbKv::new(path.clone(), RedbKvConfig::default())
			.await
			.expect("Failed to open database");
		let mut edit = kv.edit().await.unwrap();
		edit.put_string("persisted", "still here");
		edit.put_long("big", i64::MIN);
		edit.apply().await.unwrap();
	}

	let kv = RedbKv::new(path, RedbKvConfig::default())
		.await
		.expect("Failed to reopen database");

	assert_eq!(kv.get_string("persisted", "").await.unwrap(), "still here");
	assert_eq!(kv.get_long("big", 0).await.unwrap(), i64::MIN);
}

#[tokio::test]
async fn test_pref_store_over_redb() {
	let (kv, _temp) = create_kv().await;
	let store = PrefStore::new(Arc::new(kv) as Arc<dyn KvAdapter>);

	let counter = store.integer("counter", 0).expect("Failed to create pref");
	let hits = Arc::new(AtomicUsize::new(0));
	let hit_counter = Arc::clone(&hits);
	counter
		.add_on_changed(move || {
			hit_counter.fetch_add(1, Ordering::SeqCst);
		})
		.unwrap();

	assert_eq!(counter.get().await.unwrap(), 0);
	counter.set(5).await.unwrap();
	assert_eq!(counter.get().await.unwrap(), 5);
	assert!(counter.is_set().await.unwrap());

	// Change delivery runs on the store's fan-out task
	let mut delivered = false;
	for _ in 0..200 {
		if hits.load(Ordering::SeqCst) == 1 {
			delivered = true;
			break;
		}
		tokio::time::sleep(Duration::from_millis(5)).await;
	}
	assert!(delivered);

	counter.delete().await.unwrap();
	assert_eq!(counter.get().await.unwrap(), 0);
	assert!(!counter.is_set().await.unwrap());
}

// vim: ts=4
