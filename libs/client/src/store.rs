//! Key-value stores the tracker persists its session in

use std::collections::HashMap;
use std::path::PathBuf;

use parking_lot::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
	#[error("store io error -- {0}")]
	Io(#[from] std::io::Error),
	#[error("store serialization error -- {0}")]
	Serde(#[from] serde_json::Error),
}

/// String values stored by key
pub trait SessionStore: Send + Sync {
	/// Get the value stored under `key`
	///
	/// # Errors
	/// Errors if the backing storage can not be read
	fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

	/// Store `value` under `key`, replacing any previous value
	///
	/// # Errors
	/// Errors if the backing storage can not be written
	fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

	/// Remove whatever is stored under `key`
	///
	/// # Errors
	/// Errors if the backing storage can not be written
	fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// A [`SessionStore`] that lives as long as the process
#[derive(Debug, Default)]
pub struct MemoryStore {
	values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
	#[must_use]
	pub fn new() -> Self { Self::default() }
}

impl SessionStore for MemoryStore {
	fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
		Ok(self.values.lock().get(key).cloned())
	}

	fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
		self.values.lock().insert(key.to_string(), value);

		Ok(())
	}

	fn remove(&self, key: &str) -> Result<(), StoreError> {
		self.values.lock().remove(key);

		Ok(())
	}
}

/// A [`SessionStore`] backed by a single JSON object on disk
#[derive(Debug)]
pub struct FileStore {
	path: PathBuf,
	lock: Mutex<()>,
}

impl FileStore {
	#[must_use]
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into(), lock: Mutex::new(()) }
	}

	fn read(&self) -> Result<HashMap<String, String>, StoreError> {
		match std::fs::read_to_string(&self.path) {
			Ok(contents) => Ok(serde_json::from_str(&contents)?),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				Ok(HashMap::new())
			},
			Err(e) => Err(e.into()),
		}
	}

	fn write(&self, values: &HashMap<String, String>) -> Result<(), StoreError> {
		let contents = serde_json::to_string_pretty(values)?;

		std::fs::write(&self.path, contents)?;

		Ok(())
	}
}

impl SessionStore for FileStore {
	fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
		let _guard = self.lock.lock();

		Ok(self.read()?.remove(key))
	}

	fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
		let _guard = self.lock.lock();

		let mut values = self.read()?;
		values.insert(key.to_string(), value);

		self.write(&values)
	}

	fn remove(&self, key: &str) -> Result<(), StoreError> {
		let _guard = self.lock.lock();

		let mut values = self.read()?;

		if values.remove(key).is_some() {
			self.write(&values)?;
		}

		Ok(())
	}
}
