//! Paired device record and its fixed-size storage blob
//!
//! Blob layout (little-endian):
//!
//! | Offset | Size | Field |
//! |---|---|---|
//! | 0 | 1 | version |
//! | 1 | 6 | address |
//! | 7 | 1 | name length |
//! | 8 | 63 | name bytes (zero padded) |
//! | 71 | 3 | class of device |
//! | 74 | 1 | flags (bit 0: HF capable) |
//! | 75 | 8 | last connected timestamp |
//! | 83 | 4 | connection count |
//! | 87 | 1 | reserved |

use heapless::String;

use crate::constants::{MAX_DEVICE_NAME_LENGTH, RECORD_BLOB_SIZE, RECORD_BLOB_VERSION};
use crate::{BluetoothAddress, ClassOfDevice, Timestamp};

const ADDRESS_OFFSET: usize = 1;
const NAME_LEN_OFFSET: usize = 7;
const NAME_OFFSET: usize = 8;
const CLASS_OFFSET: usize = NAME_OFFSET + MAX_DEVICE_NAME_LENGTH;
const FLAGS_OFFSET: usize = CLASS_OFFSET + 3;
const TIMESTAMP_OFFSET: usize = FLAGS_OFFSET + 1;
const COUNT_OFFSET: usize = TIMESTAMP_OFFSET + 8;

const FLAG_HF_CAPABLE: u8 = 0x01;

/// Fixed-size serialized form of a [`DeviceRecord`]
pub type RecordBlob = [u8; RECORD_BLOB_SIZE];

/// One previously seen device
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceRecord {
    /// Bluetooth device address, unique across the table
    pub address: BluetoothAddress,
    /// Sanitized human-readable name
    pub name: String<MAX_DEVICE_NAME_LENGTH>,
    /// Class of Device advertised by the peer
    pub class_of_device: ClassOfDevice,
    /// Whether the peer is expected to speak HFP
    pub is_hf_capable: bool,
    /// Time of the most recent sighting or successful connection
    pub last_connected_at: Timestamp,
    /// Number of sightings and connections recorded
    pub connection_count: u32,
}

impl DeviceRecord {
    /// Create a fresh record with a connection count of one
    #[must_use]
    pub fn new(
        address: BluetoothAddress,
        name: &str,
        class_of_device: ClassOfDevice,
        is_hf_capable: bool,
        now: Timestamp,
    ) -> Self {
        Self {
            address,
            name: sanitize_name(name),
            class_of_device,
            is_hf_capable,
            last_connected_at: now,
            connection_count: 1,
        }
    }

    /// Serialize into the fixed-size storage blob
    #[must_use]
    pub fn to_blob(&self) -> RecordBlob {
        let mut blob = [0u8; RECORD_BLOB_SIZE];
        blob[0] = RECORD_BLOB_VERSION;
        blob[ADDRESS_OFFSET..NAME_LEN_OFFSET].copy_from_slice(self.address.as_bytes());

        let name = self.name.as_bytes();
        // Bounded by MAX_DEVICE_NAME_LENGTH
        blob[NAME_LEN_OFFSET] = u8::try_from(name.len()).unwrap_or(0);
        blob[NAME_OFFSET..NAME_OFFSET + name.len()].copy_from_slice(name);

        blob[CLASS_OFFSET..FLAGS_OFFSET].copy_from_slice(&self.class_of_device.to_le_bytes());
        blob[FLAGS_OFFSET] = if self.is_hf_capable { FLAG_HF_CAPABLE } else { 0 };
        blob[TIMESTAMP_OFFSET..COUNT_OFFSET].copy_from_slice(&self.last_connected_at.to_le_bytes());
        blob[COUNT_OFFSET..COUNT_OFFSET + 4].copy_from_slice(&self.connection_count.to_le_bytes());
        blob
    }

    /// Deserialize a storage blob
    ///
    /// Returns `None` for blobs of the wrong size or version, or with a name that
    /// is not valid UTF-8.
    #[must_use]
    pub fn from_blob(blob: &[u8]) -> Option<Self> {
        if blob.len() != RECORD_BLOB_SIZE || blob[0] != RECORD_BLOB_VERSION {
            return None;
        }

        let address = BluetoothAddress::try_from(&blob[ADDRESS_OFFSET..NAME_LEN_OFFSET]).ok()?;
        let name_len = usize::from(blob[NAME_LEN_OFFSET]);
        if name_len > MAX_DEVICE_NAME_LENGTH {
            return None;
        }
        let name = core::str::from_utf8(&blob[NAME_OFFSET..NAME_OFFSET + name_len]).ok()?;

        let class_of_device = ClassOfDevice::from_le_bytes(
            blob[CLASS_OFFSET..FLAGS_OFFSET].try_into().ok()?,
        );
        let last_connected_at =
            Timestamp::from_le_bytes(blob[TIMESTAMP_OFFSET..COUNT_OFFSET].try_into().ok()?);
        let connection_count =
            u32::from_le_bytes(blob[COUNT_OFFSET..COUNT_OFFSET + 4].try_into().ok()?);

        Some(Self {
            address,
            name: sanitize_name(name),
            class_of_device,
            is_hf_capable: blob[FLAGS_OFFSET] & FLAG_HF_CAPABLE != 0,
            last_connected_at,
            connection_count,
        })
    }
}

/// Drop control characters and truncate to `MAX_DEVICE_NAME_LENGTH` bytes on a
/// character boundary
#[must_use]
pub fn sanitize_name(name: &str) -> String<MAX_DEVICE_NAME_LENGTH> {
    let mut sanitized = String::new();
    for c in name.chars().filter(|c| !c.is_control()) {
        if sanitized.push(c).is_err() {
            break;
        }
    }
    sanitized
}
