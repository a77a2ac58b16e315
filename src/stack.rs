//! Boundary to the Bluetooth radio/profile stack
//!
//! The stack is driven through the [`AgStack`] trait and reports back through
//! [`StackEvent`]s posted into the event queue (see [`crate::api::EventSender`]).
//! Stack callbacks typically convert their raw payloads with
//! [`SlcState::from_raw`] and friends and post the result; unknown codes are
//! forwarded as [`StackEvent::Unrecognized`].

use heapless::String;

use crate::BluetoothAddress;
use crate::constants::MAX_AT_COMMAND_LENGTH;
use crate::discovery::Sighting;
use crate::event::StackCommand;
use crate::hfp::{AudioState, IndicatorReport, Indicators, SlcState, VolumeTarget};

/// Error status returned by the stack for a refused command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StackError(pub i32);

/// Commands the audio gateway issues to the radio/profile stack
///
/// All calls are fire-and-forget: `Ok` means the stack accepted the request, the
/// outcome arrives later as a [`StackEvent`]. Implementations must not block.
pub trait AgStack {
    /// Start an inquiry of `inquiry_length` x 1.28 s, `num_responses` 0 for unlimited
    ///
    /// # Errors
    ///
    /// Returns the stack status if the inquiry cannot be started.
    fn start_inquiry(&mut self, inquiry_length: u8, num_responses: u8) -> Result<(), StackError>;

    /// Cancel the running inquiry
    ///
    /// # Errors
    ///
    /// Returns the stack status if the cancel request is refused.
    fn cancel_inquiry(&mut self) -> Result<(), StackError>;

    /// Open the HFP service level connection to `peer`
    ///
    /// # Errors
    ///
    /// Returns the stack status if the connect request is refused.
    fn slc_connect(&mut self, peer: BluetoothAddress) -> Result<(), StackError>;

    /// Open the audio link to `peer`
    ///
    /// # Errors
    ///
    /// Returns the stack status if the request is refused.
    fn audio_connect(&mut self, peer: BluetoothAddress) -> Result<(), StackError>;

    /// Answer `AT+CIND?`
    ///
    /// # Errors
    ///
    /// Returns the stack status if the response cannot be sent.
    fn cind_response(
        &mut self,
        peer: BluetoothAddress,
        indicators: &Indicators,
    ) -> Result<(), StackError>;

    /// Send an unsolicited `+CIEV` indicator report
    ///
    /// # Errors
    ///
    /// Returns the stack status if the report cannot be sent.
    fn report_indicator(
        &mut self,
        peer: BluetoothAddress,
        report: IndicatorReport,
    ) -> Result<(), StackError>;

    /// Acknowledge an AT command the gateway does not implement
    ///
    /// # Errors
    ///
    /// Returns the stack status if the acknowledgement cannot be sent.
    fn ack_unknown_at(&mut self, peer: BluetoothAddress) -> Result<(), StackError>;

    /// Answer `AT+COPS?` with the operator name
    ///
    /// # Errors
    ///
    /// Returns the stack status if the response cannot be sent.
    fn operator_response(
        &mut self,
        peer: BluetoothAddress,
        name: &str,
    ) -> Result<(), StackError>;

    /// Terminate the `AT+CLCC` listing
    ///
    /// # Errors
    ///
    /// Returns the stack status if the response cannot be sent.
    fn current_calls_done(&mut self, peer: BluetoothAddress) -> Result<(), StackError>;

    /// Answer `AT+CNUM` without subscriber numbers
    ///
    /// # Errors
    ///
    /// Returns the stack status if the response cannot be sent.
    fn subscriber_info_done(&mut self, peer: BluetoothAddress) -> Result<(), StackError>;
}

/// Events delivered by the radio/profile stack
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StackEvent {
    /// A device answered the inquiry
    DiscoveryResult(Sighting),
    /// The inquiry ended, by timeout or cancel
    DiscoveryStopped,
    /// Service level connection state changed
    ConnectionState {
        /// Remote device
        peer: BluetoothAddress,
        /// New state
        state: SlcState,
    },
    /// Audio link state changed
    AudioState {
        /// Remote device
        peer: BluetoothAddress,
        /// New state
        state: AudioState,
    },
    /// Headset sent `AT+CIND?`
    CindQuery {
        /// Remote device
        peer: BluetoothAddress,
    },
    /// Headset asked for current indicator values
    IndicatorRefreshRequest {
        /// Remote device
        peer: BluetoothAddress,
    },
    /// Headset sent an AT command the stack does not handle
    UnknownAt {
        /// Remote device
        peer: BluetoothAddress,
        /// Command text, truncated
        command: String<MAX_AT_COMMAND_LENGTH>,
    },
    /// Headset reported a gain change
    VolumeControl {
        /// Remote device
        peer: BluetoothAddress,
        /// Speaker or microphone
        target: VolumeTarget,
        /// Raw gain value
        gain: u8,
    },
    /// Headset sent `AT+COPS?`
    OperatorQuery {
        /// Remote device
        peer: BluetoothAddress,
    },
    /// Headset sent `AT+CLCC`
    CurrentCallsQuery {
        /// Remote device
        peer: BluetoothAddress,
    },
    /// Headset sent `AT+CNUM`
    SubscriberNumberQuery {
        /// Remote device
        peer: BluetoothAddress,
    },
    /// Event or state code the boundary could not convert
    Unrecognized(u16),
}

/// Truncate an AT command on a character boundary
#[must_use]
pub fn at_command(text: &str) -> String<MAX_AT_COMMAND_LENGTH> {
    let mut command = String::new();
    for c in text.chars() {
        if command.push(c).is_err() {
            break;
        }
    }
    command
}

impl StackCommand {
    /// Issue this command to `stack`
    ///
    /// # Errors
    ///
    /// Returns the stack status if the command is refused.
    pub fn execute<S: AgStack>(&self, stack: &mut S) -> Result<(), StackError> {
        match self {
            Self::StartInquiry {
                inquiry_length,
                num_responses,
            } => stack.start_inquiry(*inquiry_length, *num_responses),
            Self::CancelInquiry => stack.cancel_inquiry(),
            Self::SlcConnect(peer) => stack.slc_connect(*peer),
            Self::AudioConnect(peer) => stack.audio_connect(*peer),
            Self::CindResponse { peer, indicators } => stack.cind_response(*peer, indicators),
            Self::ReportIndicator { peer, report } => stack.report_indicator(*peer, *report),
            Self::AckUnknownAt(peer) => stack.ack_unknown_at(*peer),
            Self::OperatorResponse { peer, name } => stack.operator_response(*peer, name),
            Self::CurrentCallsDone(peer) => stack.current_calls_done(*peer),
            Self::SubscriberInfoDone(peer) => stack.subscriber_info_done(*peer),
        }
    }
}
