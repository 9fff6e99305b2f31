//! Generic async key/value persistence contract.
//!
//! Used for small flags such as the grace-day marker. The merge algorithm
//! never goes through it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use crate::error::{CoreError, Result};

pub trait KeyValueStore {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>>;

    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<()>>;

    fn remove(&self, key: &str) -> impl Future<Output = Result<()>>;
}

/// In-process store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.values
            .lock()
            .map_err(|_| CoreError::Custom("key/value store poisoned".into()))
    }
}

impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}
