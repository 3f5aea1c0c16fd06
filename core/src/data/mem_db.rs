use std::{
	collections::HashMap,
	sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};
use tracing::{error, warn};

use super::{Database, RecordKey};

type Records = HashMap<String, String>;

/// In-memory store keeping records as JSON, keyed by `space::key`.
/// Lock poisoning is ignored, a panicked writer leaves the last complete map behind.
#[derive(Clone, Default)]
pub struct MemoryDB {
	records: Arc<RwLock<Records>>,
}

fn record_key<T: RecordKey>(key: &T) -> String {
	match key.space() {
		Some(space) => format!("{space}::{}", key.key()),
		None => key.key(),
	}
}

impl MemoryDB {
	fn read(&self) -> RwLockReadGuard<'_, Records> {
		self.records.read().unwrap_or_else(PoisonError::into_inner)
	}

	fn write(&self) -> RwLockWriteGuard<'_, Records> {
		self.records.write().unwrap_or_else(PoisonError::into_inner)
	}
}

impl Database for MemoryDB {
	fn put<T: RecordKey>(&self, key: T, value: T::Type) {
		let record_key = record_key(&key);
		match serde_json::to_string(&value) {
			Ok(encoded) => {
				self.write().insert(record_key, encoded);
			},
			Err(error) => error!(key = %record_key, %error, "Cannot encode record, skipping write"),
		}
	}

	fn get<T: RecordKey>(&self, key: T) -> Option<T::Type> {
		let record_key = record_key(&key);
		let records = self.read();
		let encoded = records.get(&record_key)?;
		serde_json::from_str(encoded)
			.map_err(|error| warn!(key = %record_key, %error, "Cannot decode stored record"))
			.ok()
	}

	fn delete<T: RecordKey>(&self, key: T) {
		self.write().remove(&record_key(&key));
	}
}
