//! Class of Device (`CoD`) parsing
//!
//! The Class of Device is a 24-bit field that consists of:
//! - Major Service Classes (bits 23-13): 11 bits indicating supported services
//! - Major Device Class (bits 12-8): 5 bits identifying device category
//! - Minor Device Class (bits 7-2): 6 bits for device subcategory
//! - Format Type (bits 1-0): 2 bits (always 0b00)
//!
//! The audio gateway only cares whether a peer is likely to speak HFP, which is
//! inferred from the Audio/Video major class.
//!
//! ```rust
//! use callbird::{ClassOfDevice, MajorDeviceClass};
//!
//! let cod = ClassOfDevice::from_raw(0x0020_0404);
//! assert_eq!(cod.major_device_class(), MajorDeviceClass::AudioVideo);
//! assert!(cod.is_audio_video());
//! assert_eq!(cod.description(), "Wearable headset device");
//! ```

/// Class of Device (`CoD`) indicating device type and capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClassOfDevice {
    raw: u32,
}

impl ClassOfDevice {
    /// Create a `ClassOfDevice` from raw 24-bit value
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self {
            raw: raw & 0xFF_FFFF,
        }
    }

    /// Parse the 3-byte little-endian over-the-air representation
    #[must_use]
    pub const fn from_le_bytes(bytes: [u8; 3]) -> Self {
        Self::from_raw(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]))
    }

    /// The 3-byte little-endian representation
    #[must_use]
    pub const fn to_le_bytes(&self) -> [u8; 3] {
        let bytes = self.raw.to_le_bytes();
        [bytes[0], bytes[1], bytes[2]]
    }

    /// Get the raw 24-bit value
    #[must_use]
    pub const fn raw(&self) -> u32 {
        self.raw
    }

    /// Get the Major Device Class (bits 12-8)
    #[must_use]
    pub fn major_device_class(&self) -> MajorDeviceClass {
        let major = (self.raw >> 8) & 0x1F;
        MajorDeviceClass::from_raw(major as u8)
    }

    /// Get the Minor Device Class (bits 7-2)
    #[must_use]
    pub const fn minor_device_class(&self) -> u8 {
        ((self.raw >> 2) & 0x3F) as u8
    }

    /// Whether the major class is Audio/Video, the category headsets and
    /// hands-free units advertise
    #[must_use]
    pub fn is_audio_video(&self) -> bool {
        self.major_device_class() == MajorDeviceClass::AudioVideo
    }

    /// Name of the minor class where one is known, else of the major class
    #[must_use]
    pub fn description(&self) -> &'static str {
        let major = self.major_device_class();
        major
            .minor_class_description(self.minor_device_class())
            .unwrap_or_else(|| major.description())
    }
}

/// Major Device Class enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MajorDeviceClass {
    /// Miscellaneous devices
    Miscellaneous,
    /// Computer devices (desktop, server, laptop, etc.)
    Computer,
    /// Phone devices (cellular, cordless, smartphone, etc.)
    Phone,
    /// LAN/Network Access Point devices
    LanNetworkAccessPoint,
    /// Audio/Video devices (headsets, hands-free units, speakers, etc.)
    AudioVideo,
    /// Peripheral devices (keyboard, mouse, etc.)
    Peripheral,
    /// Imaging devices (display, camera, scanner, printer)
    Imaging,
    /// Wearable devices (watch, glasses, etc.)
    Wearable,
    /// Toy devices
    Toy,
    /// Health devices
    Health,
    /// Uncategorized devices
    Uncategorized,
    /// Reserved or unknown device class
    Reserved(u8),
}

impl MajorDeviceClass {
    /// Create `MajorDeviceClass` from raw 5-bit value
    #[must_use]
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0x00 => Self::Miscellaneous,
            0x01 => Self::Computer,
            0x02 => Self::Phone,
            0x03 => Self::LanNetworkAccessPoint,
            0x04 => Self::AudioVideo,
            0x05 => Self::Peripheral,
            0x06 => Self::Imaging,
            0x07 => Self::Wearable,
            0x08 => Self::Toy,
            0x09 => Self::Health,
            0x1F => Self::Uncategorized,
            other => Self::Reserved(other),
        }
    }

    /// Get human-readable description
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Miscellaneous => "Miscellaneous",
            Self::Computer => "Computer",
            Self::Phone => "Phone",
            Self::LanNetworkAccessPoint => "LAN/Network Access Point",
            Self::AudioVideo => "Audio/Video",
            Self::Peripheral => "Peripheral",
            Self::Imaging => "Imaging",
            Self::Wearable => "Wearable",
            Self::Toy => "Toy",
            Self::Health => "Health",
            Self::Uncategorized => "Uncategorized",
            Self::Reserved(_) => "Reserved",
        }
    }

    /// Minor class description; only the Audio/Video subclasses are named
    #[must_use]
    pub fn minor_class_description(&self, minor: u8) -> Option<&'static str> {
        match self {
            Self::AudioVideo => match minor {
                0x00 => Some("Uncategorized"),
                0x01 => Some("Wearable headset device"),
                0x02 => Some("Hands-free device"),
                0x04 => Some("Microphone"),
                0x05 => Some("Loudspeaker"),
                0x06 => Some("Headphones"),
                0x07 => Some("Portable audio"),
                0x08 => Some("Car audio"),
                0x0A => Some("HiFi audio device"),
                _ => None,
            },
            _ => None,
        }
    }
}
