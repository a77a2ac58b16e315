//! `Callbird` Constants
//!
//! Fixed policy values, protocol limits and storage layout parameters used
//! throughout the crate.

use embassy_time::Duration;

/// `BD_ADDR` length in bytes
pub const BD_ADDR_LENGTH: usize = 6;

/// Maximum number of records kept by the paired-device store
pub const MAX_DEVICES: usize = 10;

/// Maximum stored device name length in bytes
pub const MAX_DEVICE_NAME_LENGTH: usize = 63;

/// Consecutive failed connect attempts before the orchestrator gives up
pub const MAX_ATTEMPTS: u8 = 5;

/// Delay between reconnect attempts and the cool-down after a failure
pub const RETRY_INTERVAL: Duration = Duration::from_secs(10);

/// Default inquiry duration in 1.28s units (8 * 1.28s = ~10 seconds)
pub const DEFAULT_INQUIRY_LENGTH: u8 = 8;

/// Unlimited number of inquiry responses
pub const UNLIMITED_RESPONSES: u8 = 0;

/// Default settle time between cancelling an inquiry and issuing the SLC connect
pub const DEFAULT_CONNECT_DELAY: Duration = Duration::from_secs(1);

/// Default period of the heartbeat observer
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Default period of the link statistics reporter
pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(10);

/// Name of the headset searched for when nothing else is configured
pub const DEFAULT_TARGET_NAME: &str = "OpenMove by AfterShokz";

/// Operator name reported in answer to `AT+COPS?`
pub const DEFAULT_OPERATOR_NAME: &str = "Callbird";

/// Maximum operator name length in bytes
pub const MAX_OPERATOR_NAME_LENGTH: usize = 16;

/// Maximum length of an unknown AT command kept for logging
pub const MAX_AT_COMMAND_LENGTH: usize = 32;

/// Name stored for peers first seen through an incoming HFP connection
pub const PLACEHOLDER_DEVICE_NAME: &str = "HF Device";

/// Class of Device stored for peers first seen through an HFP connection
/// (Audio/Video major class, hands-free minor class, audio service bit)
pub const PLACEHOLDER_CLASS_OF_DEVICE: u32 = 0x0020_0408;

/// Storage namespace of the paired-device table
pub const STORAGE_NAMESPACE: &str = "paired_dev";

/// Storage key holding the record count
pub const STORAGE_KEY_COUNT: &str = "count";

/// Storage key prefix of the per-record blobs (`dev_0`, `dev_1`, ...)
pub const STORAGE_KEY_DEVICE_PREFIX: &str = "dev_";

/// Maximum storage key length in bytes
pub const MAX_STORAGE_KEY_LENGTH: usize = 15;

/// Size of one serialized device record
pub const RECORD_BLOB_SIZE: usize = 88;

/// Version tag written in front of every record blob
pub const RECORD_BLOB_VERSION: u8 = 1;

/// Depth of the event queue feeding the processor
pub const EVENT_QUEUE_DEPTH: usize = 16;

/// Maximum number of actions produced by a single event
pub const MAX_ACTIONS: usize = 8;
