//! Messages consumed and produced by the [`AgHost`](crate::AgHost)
//!
//! Everything that can change the gateway's state arrives as an [`Event`] on the
//! single event queue. Processing an event yields a bounded list of [`Action`]s
//! that the processor executes: stack commands and timer changes.

use embassy_time::Duration;
use heapless::{String, Vec};

use crate::BluetoothAddress;
use crate::constants::{MAX_ACTIONS, MAX_OPERATOR_NAME_LENGTH};
use crate::hfp::{IndicatorReport, IndicatorUpdate, Indicators};
use crate::stack::{StackError, StackEvent};

/// Timers owned by the processor, one deadline slot each
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerId {
    /// Reconnect retry and cool-down timer
    Retry,
    /// Settle delay between cancelling the inquiry and connecting
    ConnectDelay,
    /// Periodic status observer
    Heartbeat,
    /// Periodic link statistics report
    StatsReport,
}

impl TimerId {
    /// All timers, in slot order
    pub const ALL: [Self; 4] = [
        Self::Retry,
        Self::ConnectDelay,
        Self::Heartbeat,
        Self::StatsReport,
    ];

    /// Slot index of this timer
    #[must_use]
    pub const fn slot(&self) -> usize {
        match self {
            Self::Retry => 0,
            Self::ConnectDelay => 1,
            Self::Heartbeat => 2,
            Self::StatsReport => 3,
        }
    }

    /// Timer name for logging
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Retry => "retry",
            Self::ConnectDelay => "connect delay",
            Self::Heartbeat => "heartbeat",
            Self::StatsReport => "stats report",
        }
    }
}

/// Input to the host
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// The stack is up; start the periodic timers and look for a headset
    Boot,
    /// Start auto-reconnect
    StartReconnect,
    /// Stop auto-reconnect
    StopReconnect,
    /// Event from the radio/profile stack
    Stack(StackEvent),
    /// A timer deadline passed
    TimerFired(TimerId),
    /// The stack refused a command issued by the host
    CommandRejected {
        /// The refused command
        command: StackCommand,
        /// Stack status
        error: StackError,
    },
    /// The application changed a phone indicator
    SetIndicator(IndicatorUpdate),
    /// Console test stimulus; logs the audio link state
    TestStimulus,
}

/// Command for the radio/profile stack, see [`AgStack`](crate::stack::AgStack)
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StackCommand {
    /// Start an inquiry
    StartInquiry {
        /// Duration in 1.28 s units
        inquiry_length: u8,
        /// Response limit, 0 for unlimited
        num_responses: u8,
    },
    /// Cancel the running inquiry
    CancelInquiry,
    /// Open the service level connection
    SlcConnect(BluetoothAddress),
    /// Open the audio link
    AudioConnect(BluetoothAddress),
    /// Answer `AT+CIND?`
    CindResponse {
        /// Remote device
        peer: BluetoothAddress,
        /// Current indicator values
        indicators: Indicators,
    },
    /// Send a `+CIEV` report
    ReportIndicator {
        /// Remote device
        peer: BluetoothAddress,
        /// Changed indicator
        report: IndicatorReport,
    },
    /// Acknowledge an unknown AT command
    AckUnknownAt(BluetoothAddress),
    /// Answer `AT+COPS?`
    OperatorResponse {
        /// Remote device
        peer: BluetoothAddress,
        /// Operator name
        name: String<MAX_OPERATOR_NAME_LENGTH>,
    },
    /// Terminate the `AT+CLCC` listing
    CurrentCallsDone(BluetoothAddress),
    /// Answer `AT+CNUM`
    SubscriberInfoDone(BluetoothAddress),
}

/// Output of the host, executed in order by the processor
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    /// Issue a stack command
    Stack(StackCommand),
    /// Arm a timer, replacing a pending deadline
    ArmTimer(TimerId, Duration),
    /// Clear a timer
    CancelTimer(TimerId),
}

/// Actions produced by one event
pub type Actions = Vec<Action, MAX_ACTIONS>;
