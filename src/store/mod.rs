//! Paired-device store
//!
//! Bounded table of previously seen devices, persisted to a [`DeviceStorage`]
//! backend. The in-memory table is authoritative: failed durable writes are logged
//! and the next successful persist brings the backend back in sync.
//!
//! ```rust
//! use callbird::store::{MemoryStorage, PairedDeviceStore};
//! use callbird::{BluetoothAddress, ClassOfDevice};
//!
//! let mut store = PairedDeviceStore::open(MemoryStorage::new());
//! let headset = BluetoothAddress::new([0x20, 0x74, 0xCF, 0x11, 0x22, 0x33]);
//! store
//!     .add_or_update(headset, "OpenMove", ClassOfDevice::from_raw(0x0024_0404), true, 100)
//!     .unwrap();
//!
//! assert_eq!(store.best_reconnect_candidate().map(|r| r.address), Some(headset));
//! ```

mod record;
mod storage;

pub use record::{DeviceRecord, RecordBlob, sanitize_name};
pub use storage::{
    DeviceStorage, MEMORY_STORAGE_FULL, MEMORY_STORAGE_KEYS, MEMORY_STORAGE_READ_FAILED,
    MEMORY_STORAGE_WRITE_FAILED, MemoryStorage, StorageError,
};

use core::fmt::Write;

use heapless::{String, Vec};

use crate::constants::{
    MAX_DEVICES, MAX_STORAGE_KEY_LENGTH, PLACEHOLDER_CLASS_OF_DEVICE, PLACEHOLDER_DEVICE_NAME,
    RECORD_BLOB_SIZE, STORAGE_KEY_COUNT, STORAGE_KEY_DEVICE_PREFIX,
};
use crate::{AgError, BluetoothAddress, ClassOfDevice, Timestamp};

/// Durable, bounded table of previously seen devices
pub struct PairedDeviceStore<S: DeviceStorage> {
    storage: S,
    records: Vec<DeviceRecord, MAX_DEVICES>,
}

impl<S: DeviceStorage> PairedDeviceStore<S> {
    /// Load the table from `storage`
    ///
    /// A missing count key means no devices were stored yet. Read failures are
    /// logged and yield an empty table.
    pub fn open(mut storage: S) -> Self {
        let records = match Self::load(&mut storage) {
            Ok(records) => records,
            Err(e) => {
                error!("[STORE] Failed to load paired devices: {:?}", e);
                Vec::new()
            }
        };
        info!("[STORE] Loaded {} paired devices", records.len());

        Self { storage, records }
    }

    fn load(storage: &mut S) -> Result<Vec<DeviceRecord, MAX_DEVICES>, StorageError> {
        let mut records = Vec::new();

        let mut count_bytes = [0u8; 4];
        let Some(len) = storage.read(STORAGE_KEY_COUNT, &mut count_bytes)? else {
            debug!("[STORE] No stored device table");
            return Ok(records);
        };
        if len != count_bytes.len() {
            warn!("[STORE] Malformed device count ({} bytes)", len);
            return Ok(records);
        }

        let mut count = u32::from_le_bytes(count_bytes) as usize;
        if count > MAX_DEVICES {
            warn!(
                "[STORE] Stored count {} exceeds capacity, clamping to {}",
                count, MAX_DEVICES
            );
            count = MAX_DEVICES;
        }

        let mut blob = [0u8; RECORD_BLOB_SIZE];
        for index in 0..count {
            let key = device_key(index);
            let Some(len) = storage.read(&key, &mut blob)? else {
                warn!("[STORE] Missing record {}", index);
                continue;
            };
            match DeviceRecord::from_blob(&blob[..len]) {
                Some(record) if !records.iter().any(|r| r.address == record.address) => {
                    // Bounded by the clamped count
                    let _ = records.push(record);
                }
                Some(_) => warn!("[STORE] Duplicate record {} skipped", index),
                None => warn!("[STORE] Corrupt record {} skipped", index),
            }
        }

        Ok(records)
    }

    /// Insert a new record or refresh the existing one with the same address
    ///
    /// Refreshing updates name, class, capability and timestamp and increments the
    /// connection count. The table is persisted afterwards.
    ///
    /// # Errors
    ///
    /// Returns `AgError::CapacityExceeded` if `address` is new and the table is full.
    pub fn add_or_update(
        &mut self,
        address: BluetoothAddress,
        name: &str,
        class_of_device: ClassOfDevice,
        is_hf_capable: bool,
        now: Timestamp,
    ) -> Result<(), AgError> {
        if let Some(record) = self.find_mut(&address) {
            record.name = sanitize_name(name);
            record.class_of_device = class_of_device;
            record.is_hf_capable = is_hf_capable;
            record.last_connected_at = now;
            record.connection_count = record.connection_count.saturating_add(1);
            debug!(
                "[STORE] Updated {} (count {})",
                address.format_hex().as_str(),
                record.connection_count
            );
        } else {
            let record = DeviceRecord::new(address, name, class_of_device, is_hf_capable, now);
            self.records.push(record).map_err(|_| {
                warn!(
                    "[STORE] Table full, not adding {}",
                    address.format_hex().as_str()
                );
                AgError::CapacityExceeded
            })?;
            info!("[STORE] Added {}", address.format_hex().as_str());
        }

        self.persist();
        Ok(())
    }

    /// Record a successful HFP connection with `address`
    ///
    /// Unknown peers are added under a placeholder hands-free name and class.
    ///
    /// # Errors
    ///
    /// Returns `AgError::CapacityExceeded` if `address` is new and the table is full.
    pub fn record_connection(
        &mut self,
        address: BluetoothAddress,
        now: Timestamp,
    ) -> Result<(), AgError> {
        let Some(record) = self.find_mut(&address) else {
            return self.add_or_update(
                address,
                PLACEHOLDER_DEVICE_NAME,
                ClassOfDevice::from_raw(PLACEHOLDER_CLASS_OF_DEVICE),
                true,
                now,
            );
        };

        record.last_connected_at = now;
        record.connection_count = record.connection_count.saturating_add(1);
        record.is_hf_capable = true;
        debug!(
            "[STORE] Connection to {} recorded (count {})",
            address.format_hex().as_str(),
            record.connection_count
        );

        self.persist();
        Ok(())
    }

    /// Delete the record for `address`
    ///
    /// # Errors
    ///
    /// Returns `AgError::NotFound` if no record has this address.
    pub fn remove(&mut self, address: &BluetoothAddress) -> Result<(), AgError> {
        let index = self
            .records
            .iter()
            .position(|r| r.address == *address)
            .ok_or(AgError::NotFound)?;
        self.records.remove(index);
        info!("[STORE] Removed {}", address.format_hex().as_str());

        self.persist();
        Ok(())
    }

    /// Find the record for `address`
    #[must_use]
    pub fn find(&self, address: &BluetoothAddress) -> Option<&DeviceRecord> {
        self.records.iter().find(|r| r.address == *address)
    }

    fn find_mut(&mut self, address: &BluetoothAddress) -> Option<&mut DeviceRecord> {
        self.records.iter_mut().find(|r| r.address == *address)
    }

    /// Number of stored records
    #[must_use]
    pub fn count(&self) -> usize {
        self.records.len()
    }

    /// Whether the table holds no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Up to `max` records in insertion order
    #[must_use]
    pub fn list(&self, max: usize) -> Vec<DeviceRecord, MAX_DEVICES> {
        self.records.iter().take(max).cloned().collect()
    }

    /// Iterate over all records in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.records.iter()
    }

    /// The HF-capable record connected most recently
    ///
    /// On equal timestamps the record inserted first wins.
    #[must_use]
    pub fn best_reconnect_candidate(&self) -> Option<&DeviceRecord> {
        let mut best: Option<&DeviceRecord> = None;
        for record in self.records.iter().filter(|r| r.is_hf_capable) {
            if best.is_none_or(|b| record.last_connected_at > b.last_connected_at) {
                best = Some(record);
            }
        }
        best
    }

    /// Empty the table and erase the durable area
    pub fn clear_all(&mut self) {
        self.records.clear();
        let result = self
            .storage
            .erase_all()
            .and_then(|()| self.storage.commit());
        match result {
            Ok(()) => info!("[STORE] All paired devices cleared"),
            Err(e) => error!("[STORE] Failed to erase paired devices: {:?}", e),
        }
    }

    /// Log every stored record
    pub fn log_table(&self) {
        info!("[STORE] === Paired devices ({}) ===", self.records.len());
        for (index, record) in self.records.iter().enumerate() {
            info!(
                "[STORE] {}: {} '{}' cod={:#x} ({}) hf={} last={} count={}",
                index,
                record.address.format_hex().as_str(),
                record.name.as_str(),
                record.class_of_device.raw(),
                record.class_of_device.description(),
                record.is_hf_capable,
                record.last_connected_at,
                record.connection_count
            );
        }
    }

    /// The storage backend
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Write the whole table and commit it
    fn persist(&mut self) {
        if let Err(e) = self.write_table() {
            warn!(
                "[STORE] Failed to persist paired devices, keeping in-memory table: {:?}",
                e
            );
        }
    }

    fn write_table(&mut self) -> Result<(), StorageError> {
        for (index, record) in self.records.iter().enumerate() {
            self.storage.write(&device_key(index), &record.to_blob())?;
        }
        for index in self.records.len()..MAX_DEVICES {
            self.storage.remove(&device_key(index))?;
        }
        // Bounded by MAX_DEVICES
        let count = u32::try_from(self.records.len()).unwrap_or(u32::MAX);
        self.storage.write(STORAGE_KEY_COUNT, &count.to_le_bytes())?;
        self.storage.commit()
    }
}

/// Storage key of the record at `index` (`dev_0`, `dev_1`, ...)
fn device_key(index: usize) -> String<MAX_STORAGE_KEY_LENGTH> {
    let mut key = String::new();
    // Prefix plus at most two digits always fits
    let _ = write!(key, "{STORAGE_KEY_DEVICE_PREFIX}{index}");
    key
}
