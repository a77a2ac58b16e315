//! Hands-Free Profile (HFP) Audio Gateway adapter
//!
//! The adapter tracks the service level connection (SLC) and the audio link of the
//! single connected headset, answers the queries the HFP specification requires
//! an Audio Gateway to answer and reports connection outcomes upwards.
//!
//! ## Service level connection
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> SlcConnected -> Disconnecting -> Disconnected
//! ```
//!
//! Only `SlcConnected` and `Disconnected` have side effects; the intermediate
//! states are tracked for the status snapshot.
//!
//! ## Audio link
//!
//! The audio (SCO) link is reported independently of the SLC state. The codec is
//! negotiated by the stack: CVSD (narrowband, 8 kHz) or mSBC (wideband, 16 kHz).

mod adapter;
pub mod indicators;

pub use adapter::{HfpAdapter, HfpNotification, HfpOutput};
pub use indicators::{IndicatorReport, IndicatorUpdate, Indicators};

/// Service level connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlcState {
    /// No link with the headset
    Disconnected,
    /// RFCOMM link being set up
    Connecting,
    /// RFCOMM link up, HFP negotiation pending
    Connected,
    /// Service level connection established
    SlcConnected,
    /// Link being torn down
    Disconnecting,
}

impl SlcState {
    /// Convert the stack's raw connection state code
    ///
    /// Returns `None` for unknown codes.
    #[must_use]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Disconnected),
            1 => Some(Self::Connecting),
            2 => Some(Self::Connected),
            3 => Some(Self::SlcConnected),
            4 => Some(Self::Disconnecting),
            _ => None,
        }
    }

    /// Human-readable name for logging
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::SlcConnected => "SLC Connected",
            Self::Disconnecting => "Disconnecting",
        }
    }
}

/// Voice codec of an audio link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Codec {
    /// Narrowband CVSD, 8 kHz
    Cvsd,
    /// Wideband mSBC, 16 kHz
    Msbc,
}

impl Codec {
    /// Whether this is the wideband codec
    #[must_use]
    pub const fn is_wideband(&self) -> bool {
        matches!(self, Self::Msbc)
    }

    /// Sample rate in Hz
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        match self {
            Self::Cvsd => 8_000,
            Self::Msbc => 16_000,
        }
    }

    /// Codec name for logging
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cvsd => "CVSD",
            Self::Msbc => "mSBC",
        }
    }
}

/// Audio (SCO) link state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AudioState {
    /// No audio link
    Disconnected,
    /// Audio link being set up
    Connecting,
    /// Audio link up with the negotiated codec
    Connected(Codec),
}

impl AudioState {
    /// Convert the stack's raw audio state code
    ///
    /// Codes 2 and 3 are a connected link with CVSD and mSBC respectively.
    #[must_use]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Disconnected),
            1 => Some(Self::Connecting),
            2 => Some(Self::Connected(Codec::Cvsd)),
            3 => Some(Self::Connected(Codec::Msbc)),
            _ => None,
        }
    }

    /// Codec of a connected link
    #[must_use]
    pub const fn codec(&self) -> Option<Codec> {
        match self {
            Self::Connected(codec) => Some(*codec),
            _ => None,
        }
    }

    /// Whether an audio link is up
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }

    /// Human-readable name for logging
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Connected(Codec::Cvsd) => "Connected (CVSD)",
            Self::Connected(Codec::Msbc) => "Connected (mSBC)",
        }
    }
}

/// Gain reported in a volume control event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VolumeTarget {
    /// Speaker gain (`AT+VGS`)
    Speaker,
    /// Microphone gain (`AT+VGM`)
    Microphone,
}

impl VolumeTarget {
    /// Convert the stack's raw volume type code
    #[must_use]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Speaker),
            1 => Some(Self::Microphone),
            _ => None,
        }
    }
}

/// Highest gain value of `AT+VGS` and `AT+VGM`
pub const MAX_GAIN: u8 = 15;
