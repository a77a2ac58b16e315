use heapless::{String, Vec};

use super::indicators::{IndicatorUpdate, Indicators};
use super::{AudioState, MAX_GAIN, SlcState, VolumeTarget};
use crate::constants::{MAX_ACTIONS, MAX_OPERATOR_NAME_LENGTH};
use crate::event::StackCommand;
use crate::stack::StackEvent;
use crate::stats::LinkStats;
use crate::store::{DeviceStorage, PairedDeviceStore};
use crate::{AgError, AgOptions, BluetoothAddress, Timestamp};

/// Connection outcome reported to the auto-reconnect orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HfpNotification {
    /// The service level connection with the peer is up
    SlcEstablished(BluetoothAddress),
    /// The link is gone, by explicit close, loss or a failed connect
    LinkLost,
}

/// Result of handling one stack event
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HfpOutput {
    /// Commands for the stack, in order
    pub commands: Vec<StackCommand, MAX_ACTIONS>,
    /// Notification for the orchestrator
    pub notification: Option<HfpNotification>,
}

impl HfpOutput {
    fn command(command: StackCommand) -> Self {
        let mut output = Self::default();
        // Empty vector has room
        let _ = output.commands.push(command);
        output
    }
}

/// HFP Audio Gateway state for the single connected headset
#[derive(Debug)]
pub struct HfpAdapter {
    slc_state: SlcState,
    audio_state: AudioState,
    peer: Option<BluetoothAddress>,
    indicators: Indicators,
    /// Values the headset was last told about
    reported: Indicators,
    speaker_volume: Option<u8>,
    microphone_volume: Option<u8>,
    operator_name: String<MAX_OPERATOR_NAME_LENGTH>,
}

impl HfpAdapter {
    /// Create a disconnected adapter
    #[must_use]
    pub fn new(options: &AgOptions) -> Self {
        Self {
            slc_state: SlcState::Disconnected,
            audio_state: AudioState::Disconnected,
            peer: None,
            indicators: Indicators::default(),
            reported: Indicators::default(),
            speaker_volume: None,
            microphone_volume: None,
            operator_name: options.operator_name.clone(),
        }
    }

    /// Service level connection state
    #[must_use]
    pub fn slc_state(&self) -> SlcState {
        self.slc_state
    }

    /// Audio link state
    #[must_use]
    pub fn audio_state(&self) -> AudioState {
        self.audio_state
    }

    /// The tracked headset
    #[must_use]
    pub fn peer(&self) -> Option<BluetoothAddress> {
        self.peer
    }

    /// Current indicator values
    #[must_use]
    pub fn indicators(&self) -> &Indicators {
        &self.indicators
    }

    /// Last reported speaker gain
    #[must_use]
    pub fn speaker_volume(&self) -> Option<u8> {
        self.speaker_volume
    }

    /// Last reported microphone gain
    #[must_use]
    pub fn microphone_volume(&self) -> Option<u8> {
        self.microphone_volume
    }

    /// Whether the service level connection is up
    #[must_use]
    pub fn is_slc_connected(&self) -> bool {
        self.slc_state == SlcState::SlcConnected
    }

    /// Whether any link with a headset exists or is being set up
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.slc_state != SlcState::Disconnected
    }

    /// Start connecting to `peer`
    ///
    /// # Errors
    ///
    /// Returns `AgError::InvalidState` if a link already exists or is being set up.
    pub fn request_connect(&mut self, peer: BluetoothAddress) -> Result<StackCommand, AgError> {
        if self.is_busy() {
            warn!(
                "[HFP] Connect to {} refused, link is {}",
                peer.format_hex().as_str(),
                self.slc_state.as_str()
            );
            return Err(AgError::InvalidState);
        }

        info!("[HFP] Connecting to {}", peer.format_hex().as_str());
        self.peer = Some(peer);
        self.slc_state = SlcState::Connecting;
        Ok(StackCommand::SlcConnect(peer))
    }

    /// The stack refused the connect request for `peer`
    pub fn on_connect_rejected(&mut self, peer: BluetoothAddress) -> Option<HfpNotification> {
        if self.peer != Some(peer) || self.slc_state != SlcState::Connecting {
            return None;
        }
        warn!("[HFP] Connect to {} rejected", peer.format_hex().as_str());
        self.peer = None;
        self.slc_state = SlcState::Disconnected;
        Some(HfpNotification::LinkLost)
    }

    /// Audio connect request for the tracked headset, if the SLC is up without audio
    #[must_use]
    pub fn request_audio(&self) -> Option<StackCommand> {
        match (self.slc_state, self.audio_state, self.peer) {
            (SlcState::SlcConnected, AudioState::Disconnected, Some(peer)) => {
                Some(StackCommand::AudioConnect(peer))
            }
            _ => None,
        }
    }

    /// Change a phone indicator
    ///
    /// While the SLC is up, changed call, call setup, service, signal and battery
    /// values are reported to the headset.
    pub fn set_indicator(&mut self, update: IndicatorUpdate, stats: &mut LinkStats) -> HfpOutput {
        if !self.indicators.apply(update) {
            return HfpOutput::default();
        }
        debug!("[HFP] Indicator update {:?}", update);

        match self.peer {
            Some(peer) if self.is_slc_connected() => self.push_changes(peer, stats),
            _ => HfpOutput::default(),
        }
    }

    /// Handle a protocol event from the stack
    ///
    /// Discovery events are not handled here and produce no output.
    pub fn handle<S: DeviceStorage>(
        &mut self,
        event: &StackEvent,
        store: &mut PairedDeviceStore<S>,
        stats: &mut LinkStats,
        now: Timestamp,
    ) -> HfpOutput {
        match event {
            StackEvent::ConnectionState { peer, state } => {
                self.on_connection_state(*peer, *state, store, stats, now)
            }
            StackEvent::AudioState { peer, state } => {
                self.on_audio_state(*peer, *state, stats);
                HfpOutput::default()
            }
            StackEvent::CindQuery { peer } => {
                debug!("[HFP] CIND query");
                if self.peer == Some(*peer) {
                    self.reported = self.indicators;
                }
                HfpOutput::command(StackCommand::CindResponse {
                    peer: *peer,
                    indicators: self.indicators,
                })
            }
            StackEvent::IndicatorRefreshRequest { peer } => {
                if self.peer == Some(*peer) {
                    self.push_changes(*peer, stats)
                } else {
                    warn!("[HFP] Indicator request from untracked peer");
                    HfpOutput::default()
                }
            }
            StackEvent::UnknownAt { peer, command } => {
                info!("[HFP] Acknowledging unknown AT command '{}'", command.as_str());
                stats.unknown_at_acked();
                HfpOutput::command(StackCommand::AckUnknownAt(*peer))
            }
            StackEvent::VolumeControl { target, gain, .. } => {
                self.on_volume(*target, *gain);
                HfpOutput::default()
            }
            StackEvent::OperatorQuery { peer } => {
                HfpOutput::command(StackCommand::OperatorResponse {
                    peer: *peer,
                    name: self.operator_name.clone(),
                })
            }
            StackEvent::CurrentCallsQuery { peer } => {
                HfpOutput::command(StackCommand::CurrentCallsDone(*peer))
            }
            StackEvent::SubscriberNumberQuery { peer } => {
                HfpOutput::command(StackCommand::SubscriberInfoDone(*peer))
            }
            StackEvent::Unrecognized(code) => {
                warn!("[HFP] Unhandled stack event code {}", code);
                HfpOutput::default()
            }
            StackEvent::DiscoveryResult(_) | StackEvent::DiscoveryStopped => HfpOutput::default(),
        }
    }

    fn on_connection_state<S: DeviceStorage>(
        &mut self,
        peer: BluetoothAddress,
        state: SlcState,
        store: &mut PairedDeviceStore<S>,
        stats: &mut LinkStats,
        now: Timestamp,
    ) -> HfpOutput {
        if self.peer.is_some_and(|tracked| tracked != peer) {
            warn!(
                "[HFP] Ignoring {} from second peer {}",
                state.as_str(),
                peer.format_hex().as_str()
            );
            return HfpOutput::default();
        }
        if state == self.slc_state {
            debug!("[HFP] Already {}", state.as_str());
            return HfpOutput::default();
        }

        info!(
            "[HFP] Connection {} -> {} ({})",
            self.slc_state.as_str(),
            state.as_str(),
            peer.format_hex().as_str()
        );
        let previous = self.slc_state;
        self.slc_state = state;

        let mut output = HfpOutput::default();
        match state {
            SlcState::SlcConnected => {
                self.peer = Some(peer);
                // The SLC setup exchanged the current indicator values
                self.reported = self.indicators;
                stats.slc_established();
                if let Err(e) = store.record_connection(peer, now) {
                    warn!("[HFP] Could not record connection: {}", e);
                }
                if let Some(command) = self.request_audio() {
                    let _ = output.commands.push(command);
                }
                output.notification = Some(HfpNotification::SlcEstablished(peer));
            }
            SlcState::Disconnected => {
                if matches!(previous, SlcState::SlcConnected | SlcState::Disconnecting) {
                    stats.link_lost();
                }
                if self.audio_state.is_connected() {
                    stats.audio_disconnected();
                }
                self.peer = None;
                self.audio_state = AudioState::Disconnected;
                self.speaker_volume = None;
                self.microphone_volume = None;
                output.notification = Some(HfpNotification::LinkLost);
            }
            SlcState::Connecting | SlcState::Connected | SlcState::Disconnecting => {
                self.peer = Some(peer);
            }
        }
        output
    }

    fn on_audio_state(&mut self, peer: BluetoothAddress, state: AudioState, stats: &mut LinkStats) {
        if self.peer != Some(peer) {
            warn!(
                "[HFP] Ignoring audio {} from untracked peer {}",
                state.as_str(),
                peer.format_hex().as_str()
            );
            return;
        }
        if state == self.audio_state {
            return;
        }

        info!(
            "[HFP] Audio {} -> {}",
            self.audio_state.as_str(),
            state.as_str()
        );
        match state {
            AudioState::Connected(codec) => {
                stats.audio_connected(codec);
                info!(
                    "[HFP] Audio link up, {} at {} Hz",
                    codec.as_str(),
                    codec.sample_rate()
                );
            }
            AudioState::Disconnected if self.audio_state.is_connected() => {
                stats.audio_disconnected();
            }
            AudioState::Disconnected | AudioState::Connecting => {}
        }
        self.audio_state = state;
    }

    fn on_volume(&mut self, target: VolumeTarget, gain: u8) {
        if gain > MAX_GAIN {
            warn!("[HFP] Ignoring out of range gain {}", gain);
            return;
        }
        debug!("[HFP] Volume {:?} = {}", target, gain);
        match target {
            VolumeTarget::Speaker => self.speaker_volume = Some(gain),
            VolumeTarget::Microphone => self.microphone_volume = Some(gain),
        }
    }

    fn push_changes(&mut self, peer: BluetoothAddress, stats: &mut LinkStats) -> HfpOutput {
        let mut output = HfpOutput::default();
        for report in self.indicators.changes_since(&self.reported) {
            debug!(
                "[HFP] CIEV {} = {}",
                report.kind.as_str(),
                report.value
            );
            stats.indicator_reported();
            // At most five reports
            let _ = output
                .commands
                .push(StackCommand::ReportIndicator { peer, report });
        }
        self.reported = self.indicators;
        output
    }

    /// Log the audio link state
    pub fn log_audio_status(&self) {
        match self.audio_state {
            AudioState::Connected(codec) => info!(
                "[HFP] Audio status: connected, {} at {} Hz",
                codec.as_str(),
                codec.sample_rate()
            ),
            state => info!("[HFP] Audio status: {}", state.as_str()),
        }
    }
}
