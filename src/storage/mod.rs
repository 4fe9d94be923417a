//!  Persistence is organized through [KeyValueStorage].
//!  The basic idea is:
//!   - Values are JSON documents addressed by a string key.
//!   - `get` returns only the keys that exist, missing keys are simply absent.
//!   - `set` merges the given keys into what is already stored and leaves other keys alone.
//!
//!  [file_storage::FileStorage] keeps all keys in a single JSON file in the application directory.

pub mod file_storage;

use std::{future::Future, ops::Deref};

use anyhow::Result;
use serde_json::{Map, Value};

/// Key-value pairs exchanged with a [KeyValueStorage].
pub type StoredValues = Map<String, Value>;

/// Interface for abstracting a key-value store.
pub trait KeyValueStorage {
    /// Reads the requested keys. Keys that were never written are left out of the result.
    fn get(&self, keys: &[&str]) -> impl Future<Output = Result<StoredValues>>;

    /// Writes every key in `values`, overwriting previous values for those keys only.
    fn set(&self, values: StoredValues) -> impl Future<Output = Result<()>>;
}

impl<T: Deref> KeyValueStorage for T
where
    T::Target: KeyValueStorage,
{
    fn get(&self, keys: &[&str]) -> impl Future<Output = Result<StoredValues>> {
        self.deref().get(keys)
    }

    fn set(&self, values: StoredValues) -> impl Future<Output = Result<()>> {
        self.deref().set(values)
    }
}
