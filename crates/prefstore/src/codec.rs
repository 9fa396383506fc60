//! Per-type read/write strategies
//!
//! A [`ValueCodec`] knows how to read one value type from a backend and how
//! to stage it into an edit batch. The handle decides *whether* to read (it
//! returns its default when the key is absent), so codecs read with the
//! type's zero value as the backend-level fallback.

use async_trait::async_trait;
use std::collections::HashSet;
use std::marker::PhantomData;

use crate::kv::{KvAdapter, KvEdit};
use crate::prelude::*;

#[async_trait]
pub(crate) trait ValueCodec<T>: Send + Sync {
	async fn read(&self, key: &str, kv: &dyn KvAdapter) -> PrefResult<T>;

	fn write(&self, key: &str, value: &T, edit: &mut dyn KvEdit);
}

pub(crate) struct BoolCodec;

#[async_trait]
impl ValueCodec<bool> for BoolCodec {
	async fn read(&self, key: &str, kv: &dyn KvAdapter) -> PrefResult<bool> {
		kv.get_bool(key, false).await
	}

	fn write(&self, key: &str, value: &bool, edit: &mut dyn KvEdit) {
		edit.put_bool(key, *value);
	}
}

pub(crate) struct IntCodec;

#[async_trait]
impl ValueCodec<i32> for IntCodec {
	async fn read(&self, key: &str, kv: &dyn KvAdapter) -> PrefResult<i32> {
		kv.get_int(key, 0).await
	}

	fn write(&self, key: &str, value: &i32, edit: &mut dyn KvEdit) {
		edit.put_int(key, *value);
	}
}

pub(crate) struct LongCodec;

#[async_trait]
impl ValueCodec<i64> for LongCodec {
	async fn read(&self, key: &str, kv: &dyn KvAdapter) -> PrefResult<i64> {
		kv.get_long(key, 0).await
	}

	fn write(&self, key: &str, value: &i64, edit: &mut dyn KvEdit) {
		edit.put_long(key, *value);
	}
}

pub(crate) struct FloatCodec;

#[async_trait]
impl ValueCodec<f32> for FloatCodec {
	async fn read(&self, key: &str, kv: &dyn KvAdapter) -> PrefResult<f32> {
		kv.get_float(key, 0.0).await
	}

	fn write(&self, key: &str, value: &f32, edit: &mut dyn KvEdit) {
		edit.put_float(key, *value);
	}
}

pub(crate) struct StringCodec;

#[async_trait]
impl ValueCodec<String> for StringCodec {
	async fn read(&self, key: &str, kv: &dyn KvAdapter) -> PrefResult<String> {
		kv.get_string(key, "").await
	}

	fn write(&self, key: &str, value: &String, edit: &mut dyn KvEdit) {
		edit.put_string(key, value);
	}
}

pub(crate) struct StringSetCodec;

#[async_trait]
impl ValueCodec<HashSet<String>> for StringSetCodec {
	async fn read(&self, key: &str, kv: &dyn KvAdapter) -> PrefResult<HashSet<String>> {
		kv.get_string_set(key, &HashSet::new()).await
	}

	fn write(&self, key: &str, value: &HashSet<String>, edit: &mut dyn KvEdit) {
		edit.put_string_set(key, value);
	}
}

/// Codec for caller-defined enumerations, persisted as the backend's string
/// type.
///
/// `decode` runs eagerly on every read and its failure propagates to the
/// caller — a stored string outside the caller's mapping must surface, not
/// silently become the default. The encoded default is used as the
/// backend-level fallback so `decode` always sees a string the caller's
/// `encode` could have produced.
pub(crate) struct EnumCodec<T, D, E> {
	encoded_default: Box<str>,
	decode: D,
	encode: E,
	_marker: PhantomData<fn() -> T>,
}

impl<T, D, E> EnumCodec<T, D, E>
where
	D: Fn(&str) -> PrefResult<T>,
	E: Fn(&T) -> String,
{
	pub(crate) fn new(default: &T, decode: D, encode: E) -> Self {
		let encoded_default = encode(default).into();
		Self { encoded_default, decode, encode, _marker: PhantomData }
	}
}

#[async_trait]
impl<T, D, E> ValueCodec<T> for EnumCodec<T, D, E>
where
	T: Send + Sync,
	D: Fn(&str) -> PrefResult<T> + Send + Sync,
	E: Fn(&T) -> String + Send + Sync,
{
	async fn read(&self, key: &str, kv: &dyn KvAdapter) -> PrefResult<T> {
		let raw = kv.get_string(key, &self.encoded_default).await?;
		(self.decode)(&raw)
	}

	fn write(&self, key: &str, value: &T, edit: &mut dyn KvEdit) {
		edit.put_string(key, &(self.encode)(value));
	}
}

// vim: ts=4
