#![no_std]
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![allow(clippy::too_many_lines)]

#[macro_use]
mod fmt;

mod address;
pub mod api;
mod class_of_device;
pub mod constants;
pub mod discovery;
pub mod event;
pub mod hfp;
mod host;
pub mod processor;
pub mod reconnect;
pub mod stack;
mod stats;
pub mod store;

use crate::constants::{
    DEFAULT_CONNECT_DELAY, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_INQUIRY_LENGTH,
    DEFAULT_OPERATOR_NAME, DEFAULT_STATS_INTERVAL, DEFAULT_TARGET_NAME, MAX_DEVICE_NAME_LENGTH,
    MAX_OPERATOR_NAME_LENGTH, UNLIMITED_RESPONSES,
};
use embassy_time::Duration;
use heapless::String;

pub use address::BluetoothAddress;
pub use class_of_device::{ClassOfDevice, MajorDeviceClass};
pub use host::AgHost;
pub use stats::LinkStats;

/// Seconds reported by a [`Clock`], used for `last_connected_at` bookkeeping
pub type Timestamp = u64;

/// Source of the timestamps stored with paired devices
///
/// Boards with an RTC or network time should return wall-clock seconds so the
/// reconnect ordering survives restarts. [`processor::UptimeClock`] is the fallback.
pub trait Clock {
    /// Current time in seconds
    fn now_secs(&self) -> Timestamp;
}

/// Audio gateway errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AgError {
    /// The paired-device table is full and the address is not in it
    CapacityExceeded,
    /// No record or peer matches the given address
    NotFound,
    /// Invalid parameter provided (e.g., malformed address)
    InvalidParameter,
    /// Another operation of the same type is already in progress
    AlreadyInProgress,
    /// Invalid state for the requested operation
    InvalidState,
    /// The durable store could not be read or written
    StorageFailure,
    /// The radio/profile stack refused a command
    StackRejected,
}

impl core::fmt::Display for AgError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let message = match self {
            Self::CapacityExceeded => "paired device table is full",
            Self::NotFound => "device not found",
            Self::InvalidParameter => "invalid parameter",
            Self::AlreadyInProgress => "operation already in progress",
            Self::InvalidState => "invalid state for operation",
            Self::StorageFailure => "durable storage failure",
            Self::StackRejected => "command rejected by the Bluetooth stack",
        };
        f.write_str(message)
    }
}

/// Options for configuring an [`AgHost`]
///
/// # Examples
///
/// ```rust
/// use callbird::AgOptions;
/// use embassy_time::Duration;
///
/// let options = AgOptions {
///     connect_delay: Duration::from_millis(500),
///     pair_on_boot: false,
///     ..AgOptions::with_target_name("My Headset").unwrap()
/// };
/// assert_eq!(options.target_name.as_str(), "My Headset");
/// ```
#[derive(Debug, Clone)]
pub struct AgOptions {
    /// Substring matched against advertised names during discovery
    pub target_name: String<MAX_DEVICE_NAME_LENGTH>,
    /// Inquiry duration in 1.28s units (1-48)
    pub inquiry_length: u8,
    /// Maximum number of inquiry responses, 0 for unlimited
    pub num_responses: u8,
    /// Settle time between finding the candidate and issuing the SLC connect
    pub connect_delay: Duration,
    /// Period of the heartbeat observer
    pub heartbeat_interval: Duration,
    /// Period of the link statistics reporter
    pub stats_interval: Duration,
    /// Search for the target name at boot when no reconnect candidate is stored
    pub pair_on_boot: bool,
    /// Let the heartbeat re-request the audio link while the SLC is up without audio
    pub audio_keepalive: bool,
    /// Operator name reported to the headset
    pub operator_name: String<MAX_OPERATOR_NAME_LENGTH>,
}

impl AgOptions {
    /// Default options searching for a different headset name
    ///
    /// # Errors
    ///
    /// Returns `AgError::InvalidParameter` if the name is empty or longer than
    /// `MAX_DEVICE_NAME_LENGTH` bytes.
    pub fn with_target_name(name: &str) -> Result<Self, AgError> {
        if name.is_empty() {
            return Err(AgError::InvalidParameter);
        }
        let target_name = String::try_from(name).map_err(|()| AgError::InvalidParameter)?;
        Ok(Self {
            target_name,
            ..Self::default()
        })
    }
}

impl Default for AgOptions {
    fn default() -> Self {
        let mut target_name = String::new();
        let _ = target_name.push_str(DEFAULT_TARGET_NAME);
        let mut operator_name = String::new();
        let _ = operator_name.push_str(DEFAULT_OPERATOR_NAME);

        Self {
            target_name,
            inquiry_length: DEFAULT_INQUIRY_LENGTH,
            num_responses: UNLIMITED_RESPONSES,
            connect_delay: DEFAULT_CONNECT_DELAY,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            stats_interval: DEFAULT_STATS_INTERVAL,
            pair_on_boot: true,
            audio_keepalive: true,
            operator_name,
        }
    }
}

/// Read-only view of the connection state, published after every processed event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusSnapshot {
    /// Auto-reconnect state
    pub state: reconnect::ReconnectState,
    /// Peer currently pursued or connected
    pub peer: Option<BluetoothAddress>,
    /// Consecutive failed connect attempts
    pub attempt_count: u8,
    /// HFP service level connection state
    pub slc_state: hfp::SlcState,
    /// Audio link state
    pub audio_state: hfp::AudioState,
    /// Speaker gain last reported by the headset (0-15)
    pub speaker_volume: Option<u8>,
    /// Microphone gain last reported by the headset (0-15)
    pub microphone_volume: Option<u8>,
}

impl StatusSnapshot {
    /// Snapshot of a host that has not processed any event
    pub const INITIAL: Self = Self {
        state: reconnect::ReconnectState::Idle,
        peer: None,
        attempt_count: 0,
        slc_state: hfp::SlcState::Disconnected,
        audio_state: hfp::AudioState::Disconnected,
        speaker_volume: None,
        microphone_volume: None,
    };

    /// Codec of the active audio link, if any
    #[must_use]
    pub fn codec(&self) -> Option<hfp::Codec> {
        self.audio_state.codec()
    }
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self::INITIAL
    }
}
