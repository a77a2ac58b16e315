//! Durable key-value backends for the paired-device table

use heapless::{FnvIndexMap, String, Vec};

use crate::constants::{MAX_DEVICES, MAX_STORAGE_KEY_LENGTH, RECORD_BLOB_SIZE};

/// Raw error code reported by a storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StorageError(pub i32);

/// Durable key-value area holding the paired-device table
///
/// Modelled after flash key-value stores: writes are staged and become durable
/// together on [`DeviceStorage::commit`]. Flash-backed implementations keep the
/// keys in their own namespace, conventionally
/// [`STORAGE_NAMESPACE`](crate::constants::STORAGE_NAMESPACE).
pub trait DeviceStorage {
    /// Read the value stored under `key` into `buf`
    ///
    /// Returns `Ok(None)` when the key does not exist, otherwise the value length.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the value cannot be read or does not fit `buf`.
    fn read(&mut self, key: &str, buf: &mut [u8]) -> Result<Option<usize>, StorageError>;

    /// Stage `value` under `key`
    ///
    /// # Errors
    ///
    /// Returns the backend error if the value cannot be staged.
    fn write(&mut self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Stage removal of `key`; a missing key is not an error
    ///
    /// # Errors
    ///
    /// Returns the backend error if the removal cannot be staged.
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;

    /// Stage removal of every key in the area
    ///
    /// # Errors
    ///
    /// Returns the backend error if the area cannot be erased.
    fn erase_all(&mut self) -> Result<(), StorageError>;

    /// Make all staged changes durable at once
    ///
    /// # Errors
    ///
    /// Returns the backend error if the commit fails; staged changes are then dropped.
    fn commit(&mut self) -> Result<(), StorageError>;
}

/// Maximum number of keys a [`MemoryStorage`] holds (count key plus one per record)
pub const MEMORY_STORAGE_KEYS: usize = 16;

type Key = String<MAX_STORAGE_KEY_LENGTH>;
type Value = Vec<u8, RECORD_BLOB_SIZE>;

/// Error returned by [`MemoryStorage`] when a value does not fit
pub const MEMORY_STORAGE_FULL: StorageError = StorageError(-1);

/// Error returned by [`MemoryStorage`] while write failures are injected
pub const MEMORY_STORAGE_WRITE_FAILED: StorageError = StorageError(-2);

/// Error returned by [`MemoryStorage`] while read failures are injected
pub const MEMORY_STORAGE_READ_FAILED: StorageError = StorageError(-3);

/// RAM-backed [`DeviceStorage`] with staged commits
///
/// Used on boards without a flash key-value area and by tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    committed: FnvIndexMap<Key, Value, MEMORY_STORAGE_KEYS>,
    /// `None` stages a removal
    staged: FnvIndexMap<Key, Option<Value>, MEMORY_STORAGE_KEYS>,
    erase_pending: bool,
    fail_writes: bool,
    fail_reads: bool,
    commits: u32,
}

const _: () = assert!(MEMORY_STORAGE_KEYS > MAX_DEVICES);

impl MemoryStorage {
    /// Create an empty storage area
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `write` and `commit` fail, or succeed again
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Make every subsequent `read` fail, or succeed again
    pub fn set_fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    /// Committed value under `key`, ignoring staged changes
    #[must_use]
    pub fn committed(&self, key: &str) -> Option<&[u8]> {
        let key = Key::try_from(key).ok()?;
        self.committed.get(&key).map(Vec::as_slice)
    }

    /// Number of committed keys
    #[must_use]
    pub fn committed_len(&self) -> usize {
        self.committed.len()
    }

    /// Number of successful commits so far
    #[must_use]
    pub fn commits(&self) -> u32 {
        self.commits
    }

    fn stage(&mut self, key: &str, value: Option<Value>) -> Result<(), StorageError> {
        let key = Key::try_from(key).map_err(|()| MEMORY_STORAGE_FULL)?;
        self.staged
            .insert(key, value)
            .map(|_| ())
            .map_err(|_| MEMORY_STORAGE_FULL)
    }

    fn discard_staged(&mut self) {
        self.staged.clear();
        self.erase_pending = false;
    }
}

impl DeviceStorage for MemoryStorage {
    fn read(&mut self, key: &str, buf: &mut [u8]) -> Result<Option<usize>, StorageError> {
        if self.fail_reads {
            return Err(MEMORY_STORAGE_READ_FAILED);
        }
        let Ok(key) = Key::try_from(key) else {
            return Ok(None);
        };
        let Some(value) = self.committed.get(&key) else {
            return Ok(None);
        };
        let target = buf.get_mut(..value.len()).ok_or(MEMORY_STORAGE_FULL)?;
        target.copy_from_slice(value);
        Ok(Some(value.len()))
    }

    fn write(&mut self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(MEMORY_STORAGE_WRITE_FAILED);
        }
        let value = Value::from_slice(value).map_err(|()| MEMORY_STORAGE_FULL)?;
        self.stage(key, Some(value))
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(MEMORY_STORAGE_WRITE_FAILED);
        }
        self.stage(key, None)
    }

    fn erase_all(&mut self) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(MEMORY_STORAGE_WRITE_FAILED);
        }
        self.staged.clear();
        self.erase_pending = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        if self.fail_writes {
            self.discard_staged();
            return Err(MEMORY_STORAGE_WRITE_FAILED);
        }

        // Apply onto a copy so a full map leaves the committed state untouched
        let mut next = if self.erase_pending {
            FnvIndexMap::new()
        } else {
            self.committed.clone()
        };
        for (key, value) in &self.staged {
            let Some(value) = value else {
                next.remove(key);
                continue;
            };
            if next.insert(key.clone(), value.clone()).is_err() {
                self.discard_staged();
                return Err(MEMORY_STORAGE_FULL);
            }
        }

        self.committed = next;
        self.discard_staged();
        self.commits += 1;
        Ok(())
    }
}
