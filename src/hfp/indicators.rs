//! HFP Audio Gateway indicators
//!
//! Each indicator is its own type and can only hold the values the HFP
//! specification allows, so a `+CIND` response or `+CIEV` report can never carry
//! an out-of-range value.
//!
//! ```rust
//! use callbird::hfp::Indicators;
//!
//! // Idle phone with service, good signal and full battery
//! assert_eq!(Indicators::default().values(), [0, 0, 1, 4, 0, 5, 0]);
//! ```

use heapless::Vec;

/// Number of AG indicators, in `+CIND` order
pub const INDICATOR_COUNT: usize = 7;

/// Call status (`call`, 0-1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CallStatus {
    /// No call in progress
    #[default]
    NoCall,
    /// At least one call is active
    Active,
}

/// Call setup status (`callsetup`, 0-3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CallSetup {
    /// No call being set up
    #[default]
    Idle,
    /// Incoming call
    Incoming,
    /// Outgoing call being dialled
    Outgoing,
    /// Remote party being alerted
    Alerting,
}

/// Network service availability (`service`, 0-1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ServiceAvailability {
    /// No home or roaming network
    Unavailable,
    /// Network available
    #[default]
    Available,
}

/// Roaming status (`roam`, 0-1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RoamStatus {
    /// Registered on the home network
    #[default]
    Home,
    /// Roaming
    Roaming,
}

/// Held call status (`callheld`, 0-2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CallHeld {
    /// No calls held
    #[default]
    None,
    /// A call is held and another is active
    HeldAndActive,
    /// A call is held and none is active
    HeldOnly,
}

/// Signal strength (`signal`, 0-5)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SignalStrength(u8);

/// Battery charge level (`battchg`, 0-5)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BatteryLevel(u8);

impl SignalStrength {
    /// Highest signal level
    pub const MAX: u8 = 5;

    /// Create a signal level, `None` if above [`Self::MAX`]
    #[must_use]
    pub const fn new(level: u8) -> Option<Self> {
        if level <= Self::MAX {
            Some(Self(level))
        } else {
            None
        }
    }

    /// The level as sent on the wire
    #[must_use]
    pub const fn value(&self) -> u8 {
        self.0
    }
}

impl Default for SignalStrength {
    fn default() -> Self {
        Self(4)
    }
}

impl BatteryLevel {
    /// Highest battery level
    pub const MAX: u8 = 5;

    /// Create a battery level, `None` if above [`Self::MAX`]
    #[must_use]
    pub const fn new(level: u8) -> Option<Self> {
        if level <= Self::MAX {
            Some(Self(level))
        } else {
            None
        }
    }

    /// The level as sent on the wire
    #[must_use]
    pub const fn value(&self) -> u8 {
        self.0
    }
}

impl Default for BatteryLevel {
    fn default() -> Self {
        Self(Self::MAX)
    }
}

impl CallStatus {
    /// Wire value
    #[must_use]
    pub const fn value(&self) -> u8 {
        match self {
            Self::NoCall => 0,
            Self::Active => 1,
        }
    }
}

impl CallSetup {
    /// Wire value
    #[must_use]
    pub const fn value(&self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Incoming => 1,
            Self::Outgoing => 2,
            Self::Alerting => 3,
        }
    }
}

impl ServiceAvailability {
    /// Wire value
    #[must_use]
    pub const fn value(&self) -> u8 {
        match self {
            Self::Unavailable => 0,
            Self::Available => 1,
        }
    }
}

impl RoamStatus {
    /// Wire value
    #[must_use]
    pub const fn value(&self) -> u8 {
        match self {
            Self::Home => 0,
            Self::Roaming => 1,
        }
    }
}

impl CallHeld {
    /// Wire value
    #[must_use]
    pub const fn value(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::HeldAndActive => 1,
            Self::HeldOnly => 2,
        }
    }
}

/// Indicator positions as announced in `+CIND: (...)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IndicatorKind {
    /// `call`
    Call,
    /// `callsetup`
    CallSetup,
    /// `service`
    Service,
    /// `signal`
    Signal,
    /// `roam`
    Roam,
    /// `battchg`
    Battery,
    /// `callheld`
    CallHeld,
}

impl IndicatorKind {
    /// One-based index used in `+CIEV` reports
    #[must_use]
    pub const fn index(&self) -> u8 {
        match self {
            Self::Call => 1,
            Self::CallSetup => 2,
            Self::Service => 3,
            Self::Signal => 4,
            Self::Roam => 5,
            Self::Battery => 6,
            Self::CallHeld => 7,
        }
    }

    /// Indicator name as announced to the headset
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::CallSetup => "callsetup",
            Self::Service => "service",
            Self::Signal => "signal",
            Self::Roam => "roam",
            Self::Battery => "battchg",
            Self::CallHeld => "callheld",
        }
    }
}

/// New value for one indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IndicatorUpdate {
    /// Call status changed
    Call(CallStatus),
    /// Call setup status changed
    CallSetup(CallSetup),
    /// Network service changed
    Service(ServiceAvailability),
    /// Signal strength changed
    Signal(SignalStrength),
    /// Roaming status changed
    Roam(RoamStatus),
    /// Battery level changed
    Battery(BatteryLevel),
    /// Held call status changed
    CallHeld(CallHeld),
}

/// A single `+CIEV` report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IndicatorReport {
    /// Indicator being reported
    pub kind: IndicatorKind,
    /// New value, always within the indicator's range
    pub value: u8,
}

/// The indicators pushed to the headset on change
const REPORTED_KINDS: [IndicatorKind; 5] = [
    IndicatorKind::Call,
    IndicatorKind::CallSetup,
    IndicatorKind::Service,
    IndicatorKind::Signal,
    IndicatorKind::Battery,
];

/// Current values of all AG indicators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Indicators {
    /// `call`
    pub call: CallStatus,
    /// `callsetup`
    pub call_setup: CallSetup,
    /// `service`
    pub service: ServiceAvailability,
    /// `signal`
    pub signal: SignalStrength,
    /// `roam`
    pub roam: RoamStatus,
    /// `battchg`
    pub battery: BatteryLevel,
    /// `callheld`
    pub call_held: CallHeld,
}

impl Indicators {
    /// Apply an update, returning whether the value changed
    pub fn apply(&mut self, update: IndicatorUpdate) -> bool {
        let before = *self;
        match update {
            IndicatorUpdate::Call(v) => self.call = v,
            IndicatorUpdate::CallSetup(v) => self.call_setup = v,
            IndicatorUpdate::Service(v) => self.service = v,
            IndicatorUpdate::Signal(v) => self.signal = v,
            IndicatorUpdate::Roam(v) => self.roam = v,
            IndicatorUpdate::Battery(v) => self.battery = v,
            IndicatorUpdate::CallHeld(v) => self.call_held = v,
        }
        before != *self
    }

    /// Wire value of one indicator
    #[must_use]
    pub const fn value(&self, kind: IndicatorKind) -> u8 {
        match kind {
            IndicatorKind::Call => self.call.value(),
            IndicatorKind::CallSetup => self.call_setup.value(),
            IndicatorKind::Service => self.service.value(),
            IndicatorKind::Signal => self.signal.value(),
            IndicatorKind::Roam => self.roam.value(),
            IndicatorKind::Battery => self.battery.value(),
            IndicatorKind::CallHeld => self.call_held.value(),
        }
    }

    /// All values in `+CIND` order
    #[must_use]
    pub const fn values(&self) -> [u8; INDICATOR_COUNT] {
        [
            self.call.value(),
            self.call_setup.value(),
            self.service.value(),
            self.signal.value(),
            self.roam.value(),
            self.battery.value(),
            self.call_held.value(),
        ]
    }

    /// Reports for the call, call setup, service, signal and battery indicators
    /// whose value differs from `reported`
    #[must_use]
    pub fn changes_since(&self, reported: &Self) -> Vec<IndicatorReport, 5> {
        REPORTED_KINDS
            .iter()
            .filter(|kind| self.value(**kind) != reported.value(**kind))
            .map(|kind| IndicatorReport {
                kind: *kind,
                value: self.value(*kind),
            })
            .collect()
    }
}
