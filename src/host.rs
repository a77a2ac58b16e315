//! Audio Gateway host - the single owned context of the connection core
//!
//! `AgHost` bundles the paired-device store, the discovery controller, the HFP
//! adapter, the auto-reconnect orchestrator and the link statistics. It is owned
//! by exactly one worker (see [`crate::processor::run`]) which applies every
//! [`Event`] to it in order, so none of its state needs locking.
//!
//! ## Event Flow
//!
//! 1. Stack callbacks, timers and the application post [`Event`]s
//! 2. [`AgHost::process_event`] updates the components
//! 3. Component outputs are routed: discovery outcomes and HFP notifications go
//!    to the orchestrator, whose directives become stack commands and timers
//! 4. The resulting [`Action`]s are returned for the processor to execute
//!
//! ## Usage
//!
//! ```rust
//! use callbird::event::{Action, Event, StackCommand, TimerId};
//! use callbird::store::{MemoryStorage, PairedDeviceStore};
//! use callbird::{AgHost, AgOptions};
//!
//! let store = PairedDeviceStore::open(MemoryStorage::new());
//! let mut host = AgHost::new(AgOptions::default(), store);
//!
//! // Nothing stored yet: boot searches for the configured headset name
//! let actions = host.process_event(Event::Boot, 0);
//! assert!(actions.iter().any(|a| matches!(
//!     a,
//!     Action::Stack(StackCommand::StartInquiry { .. })
//! )));
//! assert!(actions.contains(&Action::ArmTimer(TimerId::Heartbeat, host.options().heartbeat_interval)));
//! ```

mod stack_event_processor;
mod timer_processor;

use crate::constants::RETRY_INTERVAL;
use crate::discovery::{DiscoveryController, DiscoveryEvent};
use crate::event::{Action, Actions, Event, StackCommand, TimerId};
use crate::hfp::{HfpAdapter, HfpNotification};
use crate::reconnect::{Directive, ReconnectOrchestrator, ReconnectState};
use crate::stats::LinkStats;
use crate::store::{DeviceStorage, PairedDeviceStore};
use crate::{AgOptions, BluetoothAddress, StatusSnapshot, Timestamp};

/// The connection core of the Audio Gateway
pub struct AgHost<S: DeviceStorage> {
    options: AgOptions,
    store: PairedDeviceStore<S>,
    discovery: DiscoveryController,
    hfp: HfpAdapter,
    reconnect: ReconnectOrchestrator,
    stats: LinkStats,
    /// Candidate waiting for the connect settle delay
    pending_connect: Option<BluetoothAddress>,
}

impl<S: DeviceStorage> AgHost<S> {
    /// Create a host around an opened store
    #[must_use]
    pub fn new(options: AgOptions, store: PairedDeviceStore<S>) -> Self {
        Self {
            discovery: DiscoveryController::new(&options),
            hfp: HfpAdapter::new(&options),
            reconnect: ReconnectOrchestrator::new(),
            stats: LinkStats::default(),
            pending_connect: None,
            options,
            store,
        }
    }

    /// Apply one event and return the actions to execute, in order
    ///
    /// `now` is the current [`Clock`](crate::Clock) time, stored with sightings
    /// and connections.
    pub fn process_event(&mut self, event: Event, now: Timestamp) -> Actions {
        let mut actions = Actions::new();
        match event {
            Event::Boot => self.boot(&mut actions),
            Event::StartReconnect => {
                let candidate = self.best_candidate();
                let directives = self.reconnect.start(candidate);
                self.apply_directives(&directives, &mut actions);
            }
            Event::StopReconnect => {
                self.pending_connect = None;
                push_action(&mut actions, Action::CancelTimer(TimerId::ConnectDelay));
                let directives = self.reconnect.stop();
                self.apply_directives(&directives, &mut actions);
            }
            Event::Stack(event) => self.process_stack_event(&event, now, &mut actions),
            Event::TimerFired(timer) => self.process_timer(timer, &mut actions),
            Event::CommandRejected { command, error } => {
                warn!("[HOST] Stack rejected {:?}: {:?}", command, error);
                self.command_rejected(&command, &mut actions);
            }
            Event::SetIndicator(update) => {
                let output = self.hfp.set_indicator(update, &mut self.stats);
                for command in output.commands {
                    push_action(&mut actions, Action::Stack(command));
                }
            }
            Event::TestStimulus => {
                info!("[HOST] Test stimulus");
                self.hfp.log_audio_status();
                self.log_status();
            }
        }
        actions
    }

    /// Read-only view of the connection state
    #[must_use]
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            state: self.reconnect.state(),
            peer: self.hfp.peer().or(self.reconnect.target()),
            attempt_count: self.reconnect.attempt_count(),
            slc_state: self.hfp.slc_state(),
            audio_state: self.hfp.audio_state(),
            speaker_volume: self.hfp.speaker_volume(),
            microphone_volume: self.hfp.microphone_volume(),
        }
    }

    /// Host configuration
    #[must_use]
    pub fn options(&self) -> &AgOptions {
        &self.options
    }

    /// The paired-device store
    #[must_use]
    pub fn store(&self) -> &PairedDeviceStore<S> {
        &self.store
    }

    /// The paired-device store, for removing or clearing records
    pub fn store_mut(&mut self) -> &mut PairedDeviceStore<S> {
        &mut self.store
    }

    /// Link statistics since boot
    #[must_use]
    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// Log the status snapshot
    pub fn log_status(&self) {
        let snapshot = self.snapshot();
        info!(
            "[HOST] state={} attempts={} slc={} audio={}",
            snapshot.state.as_str(),
            snapshot.attempt_count,
            snapshot.slc_state.as_str(),
            snapshot.audio_state.as_str()
        );
        if let Some(peer) = snapshot.peer {
            info!("[HOST] peer={}", peer.format_hex().as_str());
        }
    }

    fn boot(&mut self, actions: &mut Actions) {
        info!("[HOST] Boot");
        self.store.log_table();
        push_action(
            actions,
            Action::ArmTimer(TimerId::Heartbeat, self.options.heartbeat_interval),
        );
        push_action(
            actions,
            Action::ArmTimer(TimerId::StatsReport, self.options.stats_interval),
        );

        let directives = match self.best_candidate() {
            Some(candidate) => self.reconnect.start(Some(candidate)),
            None if self.options.pair_on_boot => self.reconnect.pair_new_device(),
            None => {
                info!("[HOST] No paired headset, waiting for an incoming connection");
                return;
            }
        };
        self.apply_directives(&directives, actions);
    }

    fn best_candidate(&self) -> Option<BluetoothAddress> {
        self.store.best_reconnect_candidate().map(|r| r.address)
    }

    fn link_busy(&self) -> bool {
        self.reconnect.is_link_busy() || self.hfp.is_busy()
    }

    fn apply_directives(&mut self, directives: &[Directive], actions: &mut Actions) {
        for directive in directives {
            match *directive {
                Directive::StartDiscovery => {
                    self.discovery.set_target_address(self.reconnect.target());
                    match self.discovery.start(self.link_busy()) {
                        Ok(command) => push_action(actions, Action::Stack(command)),
                        Err(e) => {
                            warn!("[HOST] Discovery not started: {}", e);
                            let directives = self.reconnect.on_discovery_complete();
                            self.apply_directives(&directives, actions);
                        }
                    }
                }
                Directive::Connect(address) => {
                    self.pending_connect = Some(address);
                    if self.options.connect_delay.as_ticks() == 0 {
                        self.connect_pending(actions);
                    } else {
                        push_action(
                            actions,
                            Action::ArmTimer(TimerId::ConnectDelay, self.options.connect_delay),
                        );
                    }
                }
                Directive::ArmRetryTimer => {
                    push_action(actions, Action::ArmTimer(TimerId::Retry, RETRY_INTERVAL));
                }
                Directive::CancelRetryTimer => {
                    push_action(actions, Action::CancelTimer(TimerId::Retry));
                }
            }
        }
    }

    /// Issue the connect request for the pending candidate
    fn connect_pending(&mut self, actions: &mut Actions) {
        let Some(address) = self.pending_connect.take() else {
            return;
        };
        if self.reconnect.state() != ReconnectState::Connecting {
            debug!(
                "[HOST] Dropping connect to {}, orchestrator is {}",
                address.format_hex().as_str(),
                self.reconnect.state().as_str()
            );
            return;
        }
        match self.hfp.request_connect(address) {
            Ok(command) => push_action(actions, Action::Stack(command)),
            // The link that is already being set up reports its own outcome
            Err(e) => warn!("[HOST] Connect request dropped: {}", e),
        }
    }

    /// Forget the pending candidate and disarm its settle timer
    fn drop_pending_connect(&mut self, actions: &mut Actions) {
        if self.pending_connect.take().is_some() {
            push_action(actions, Action::CancelTimer(TimerId::ConnectDelay));
        }
    }

    fn route_discovery_event(&mut self, event: DiscoveryEvent, actions: &mut Actions) {
        let directives = match event {
            DiscoveryEvent::CandidateFound(address) => self.reconnect.on_candidate_found(address),
            DiscoveryEvent::Complete => self.reconnect.on_discovery_complete(),
        };
        self.apply_directives(&directives, actions);
    }

    fn route_hfp_notification(&mut self, notification: HfpNotification, actions: &mut Actions) {
        let directives = match notification {
            HfpNotification::SlcEstablished(address) => {
                self.drop_pending_connect(actions);
                self.reconnect.on_slc_established(address)
            }
            HfpNotification::LinkLost => {
                self.drop_pending_connect(actions);
                self.reconnect.on_link_lost()
            }
        };
        self.apply_directives(&directives, actions);
    }

    fn command_rejected(&mut self, command: &StackCommand, actions: &mut Actions) {
        match command {
            StackCommand::StartInquiry { .. } => {
                if let Some(event) = self.discovery.on_start_rejected() {
                    self.route_discovery_event(event, actions);
                }
            }
            StackCommand::CancelInquiry => self.discovery.on_cancel_rejected(),
            StackCommand::SlcConnect(address) => {
                if let Some(notification) = self.hfp.on_connect_rejected(*address) {
                    self.route_hfp_notification(notification, actions);
                }
            }
            // Answers and reports are best effort; the heartbeat retries audio
            StackCommand::AudioConnect(_)
            | StackCommand::CindResponse { .. }
            | StackCommand::ReportIndicator { .. }
            | StackCommand::AckUnknownAt(_)
            | StackCommand::OperatorResponse { .. }
            | StackCommand::CurrentCallsDone(_)
            | StackCommand::SubscriberInfoDone(_) => {}
        }
    }
}

fn push_action(actions: &mut Actions, action: Action) {
    if let Err(action) = actions.push(action) {
        error!("[HOST] Action queue full, dropping {:?}", action);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClassOfDevice;
    use crate::discovery::Sighting;
    use crate::hfp::indicators::CallSetup;
    use crate::hfp::{AudioState, Codec, IndicatorUpdate, SlcState};
    use crate::stack::{StackError, StackEvent};
    use crate::store::MemoryStorage;
    use embassy_time::Duration;

    const OPENMOVE: BluetoothAddress =
        BluetoothAddress([0x20, 0x74, 0xCF, 0x11, 0x22, 0x33]);

    fn host() -> AgHost<MemoryStorage> {
        AgHost::new(
            AgOptions::default(),
            PairedDeviceStore::open(MemoryStorage::new()),
        )
    }

    fn stack(host: &mut AgHost<MemoryStorage>, event: StackEvent) -> Actions {
        host.process_event(Event::Stack(event), 1_000)
    }

    fn openmove_sighting() -> Sighting {
        Sighting::new(
            OPENMOVE,
            Some("OpenMove by AfterShokz"),
            ClassOfDevice::from_raw(0x0024_0404),
        )
    }

    fn connection(state: SlcState) -> StackEvent {
        StackEvent::ConnectionState {
            peer: OPENMOVE,
            state,
        }
    }

    fn stack_commands(actions: &Actions) -> impl Iterator<Item = &StackCommand> {
        actions.iter().filter_map(|a| match a {
            Action::Stack(command) => Some(command),
            _ => None,
        })
    }

    /// Host that found the headset once and is now idle after losing it
    fn host_with_paired_headset() -> AgHost<MemoryStorage> {
        let mut store = PairedDeviceStore::open(MemoryStorage::new());
        store
            .add_or_update(
                OPENMOVE,
                "OpenMove by AfterShokz",
                ClassOfDevice::from_raw(0x0024_0404),
                true,
                500,
            )
            .unwrap();
        AgHost::new(AgOptions::default(), store)
    }

    #[test]
    fn test_openmove_scenario() {
        let mut host = host();
        host.process_event(Event::Boot, 0);
        assert_eq!(host.snapshot().state, ReconnectState::Searching);

        // Match: recorded, inquiry cancelled, connect scheduled
        let actions = stack(&mut host, StackEvent::DiscoveryResult(openmove_sighting()));
        assert_eq!(
            actions.as_slice(),
            &[
                Action::Stack(StackCommand::CancelInquiry),
                Action::ArmTimer(TimerId::ConnectDelay, Duration::from_secs(1)),
            ]
        );
        assert_eq!(host.snapshot().state, ReconnectState::Connecting);
        assert_eq!(host.store().count(), 1);
        assert_eq!(host.store().find(&OPENMOVE).unwrap().connection_count, 1);

        assert!(stack(&mut host, StackEvent::DiscoveryStopped).is_empty());

        let actions = host.process_event(Event::TimerFired(TimerId::ConnectDelay), 1_001);
        assert_eq!(
            actions.as_slice(),
            &[Action::Stack(StackCommand::SlcConnect(OPENMOVE))]
        );

        stack(&mut host, connection(SlcState::Connecting));
        stack(&mut host, connection(SlcState::Connected));
        let actions = stack(&mut host, connection(SlcState::SlcConnected));
        assert_eq!(
            actions.as_slice(),
            &[
                Action::Stack(StackCommand::AudioConnect(OPENMOVE)),
                Action::CancelTimer(TimerId::Retry),
            ]
        );

        let snapshot = host.snapshot();
        assert_eq!(snapshot.state, ReconnectState::Connected);
        assert_eq!(snapshot.attempt_count, 0);
        assert_eq!(snapshot.peer, Some(OPENMOVE));
        assert_eq!(snapshot.slc_state, SlcState::SlcConnected);

        let record = host.store().find(&OPENMOVE).unwrap();
        assert_eq!(record.connection_count, 2);
        assert_eq!(record.last_connected_at, 1_000);

        stack(
            &mut host,
            StackEvent::AudioState {
                peer: OPENMOVE,
                state: AudioState::Connected(Codec::Msbc),
            },
        );
        assert_eq!(host.snapshot().codec(), Some(Codec::Msbc));
    }

    #[test]
    fn test_five_failures_scenario() {
        let mut host = host_with_paired_headset();
        host.process_event(Event::Boot, 0);
        assert_eq!(host.snapshot().state, ReconnectState::Searching);

        for attempt in 1..=5u8 {
            stack(&mut host, StackEvent::DiscoveryResult(openmove_sighting()));
            stack(&mut host, StackEvent::DiscoveryStopped);
            host.process_event(Event::TimerFired(TimerId::ConnectDelay), 0);
            let actions = stack(&mut host, connection(SlcState::Disconnected));
            assert_eq!(
                actions.as_slice(),
                &[Action::ArmTimer(TimerId::Retry, RETRY_INTERVAL)]
            );

            if attempt < 5 {
                assert_eq!(host.snapshot().state, ReconnectState::Idle);
                assert_eq!(host.snapshot().attempt_count, attempt);
                let actions = host.process_event(Event::TimerFired(TimerId::Retry), 0);
                assert!(matches!(
                    actions.as_slice(),
                    [Action::Stack(StackCommand::StartInquiry { .. })]
                ));
            }
        }
        assert_eq!(host.snapshot().state, ReconnectState::Failed);

        let actions = host.process_event(Event::TimerFired(TimerId::Retry), 0);
        assert_eq!(
            actions.as_slice(),
            &[Action::ArmTimer(TimerId::Retry, RETRY_INTERVAL)]
        );
        assert_eq!(host.snapshot().state, ReconnectState::Idle);
        assert_eq!(host.snapshot().attempt_count, 0);
    }

    #[test]
    fn test_link_loss_during_connect_delay() {
        let mut host = host_with_paired_headset();
        host.process_event(Event::Boot, 0);
        stack(&mut host, StackEvent::DiscoveryResult(openmove_sighting()));
        stack(&mut host, StackEvent::DiscoveryStopped);

        // The headset starts a link on its own and drops it before the delay ends
        assert!(stack(&mut host, connection(SlcState::Connecting)).is_empty());
        let actions = stack(&mut host, connection(SlcState::Disconnected));
        assert_eq!(
            actions.as_slice(),
            &[
                Action::CancelTimer(TimerId::ConnectDelay),
                Action::ArmTimer(TimerId::Retry, RETRY_INTERVAL),
            ]
        );
        assert_eq!(host.snapshot().state, ReconnectState::Idle);
        assert_eq!(host.snapshot().attempt_count, 1);

        // A delay expiry already in flight connects nothing
        assert!(
            host.process_event(Event::TimerFired(TimerId::ConnectDelay), 0)
                .is_empty()
        );
        assert_eq!(host.snapshot().slc_state, SlcState::Disconnected);

        let actions = host.process_event(Event::TimerFired(TimerId::Retry), 0);
        assert!(matches!(
            actions.as_slice(),
            [Action::Stack(StackCommand::StartInquiry { .. })]
        ));
        assert_eq!(host.snapshot().state, ReconnectState::Searching);
        assert_eq!(host.snapshot().attempt_count, 1);
    }

    #[test]
    fn test_retry_while_inquiry_cancel_pending() {
        let mut host = host_with_paired_headset();
        host.process_event(Event::Boot, 0);
        stack(&mut host, StackEvent::DiscoveryResult(openmove_sighting()));

        // The link fails before the inquiry cancel completes
        stack(&mut host, connection(SlcState::Connecting));
        stack(&mut host, connection(SlcState::Disconnected));
        assert_eq!(host.snapshot().state, ReconnectState::Idle);

        // The inquiry is still winding down: the retry finds nothing to start
        let actions = host.process_event(Event::TimerFired(TimerId::Retry), 0);
        assert_eq!(
            actions.as_slice(),
            &[Action::ArmTimer(TimerId::Retry, RETRY_INTERVAL)]
        );
        assert_eq!(host.snapshot().state, ReconnectState::Idle);
        assert_eq!(host.snapshot().attempt_count, 1);

        assert!(stack(&mut host, StackEvent::DiscoveryStopped).is_empty());
        let actions = host.process_event(Event::TimerFired(TimerId::Retry), 0);
        assert!(matches!(
            actions.as_slice(),
            [Action::Stack(StackCommand::StartInquiry { .. })]
        ));
        assert_eq!(host.snapshot().state, ReconnectState::Searching);
    }

    #[test]
    fn test_placeholder_named_headset_is_found_by_address() {
        let mut store = PairedDeviceStore::open(MemoryStorage::new());
        store.record_connection(OPENMOVE, 500).unwrap();
        let mut host = AgHost::new(AgOptions::default(), store);
        host.process_event(Event::Boot, 0);
        assert_eq!(host.snapshot().state, ReconnectState::Searching);

        let stranger = Sighting::new(
            BluetoothAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]),
            Some("Kitchen Speaker"),
            ClassOfDevice::from_raw(0x0024_0414),
        );
        assert!(stack(&mut host, StackEvent::DiscoveryResult(stranger)).is_empty());

        // The headset answers without a name and with an unhelpful class
        let sighting = Sighting::new(OPENMOVE, None, ClassOfDevice::from_raw(0x0010_010C));
        let actions = stack(&mut host, StackEvent::DiscoveryResult(sighting));
        assert_eq!(
            actions.as_slice(),
            &[
                Action::Stack(StackCommand::CancelInquiry),
                Action::ArmTimer(TimerId::ConnectDelay, Duration::from_secs(1)),
            ]
        );
        assert_eq!(host.snapshot().state, ReconnectState::Connecting);

        let record = host.store().find(&OPENMOVE).unwrap();
        assert_eq!(record.name.as_str(), "HF Device");
        assert!(record.is_hf_capable);
        assert_eq!(host.store().count(), 1);
    }

    #[test]
    fn test_new_pairing_matches_by_name_only() {
        let mut host = host();
        host.process_event(Event::Boot, 0);

        let unnamed = Sighting::new(OPENMOVE, None, ClassOfDevice::from_raw(0x0024_0404));
        assert!(stack(&mut host, StackEvent::DiscoveryResult(unnamed)).is_empty());
        assert_eq!(host.snapshot().state, ReconnectState::Searching);
        assert_eq!(host.store().count(), 0);
    }

    #[test]
    fn test_boot_without_candidate() {
        let options = AgOptions {
            pair_on_boot: false,
            ..AgOptions::default()
        };
        let mut host = AgHost::new(options, PairedDeviceStore::open(MemoryStorage::new()));
        let actions = host.process_event(Event::Boot, 0);
        assert_eq!(stack_commands(&actions).count(), 0);
        assert_eq!(host.snapshot().state, ReconnectState::Idle);

        // start() without a candidate is a no-op
        assert!(host.process_event(Event::StartReconnect, 0).is_empty());
        assert_eq!(host.snapshot().state, ReconnectState::Idle);
    }

    #[test]
    fn test_boot_with_candidate_searches() {
        let mut host = host_with_paired_headset();
        let actions = host.process_event(Event::Boot, 0);
        assert!(stack_commands(&actions).any(|c| matches!(c, StackCommand::StartInquiry { .. })));
        assert_eq!(host.snapshot().peer, Some(OPENMOVE));
    }

    #[test]
    fn test_scan_without_match_arms_retry() {
        let mut host = host_with_paired_headset();
        host.process_event(Event::Boot, 0);
        let actions = stack(&mut host, StackEvent::DiscoveryStopped);
        assert_eq!(
            actions.as_slice(),
            &[Action::ArmTimer(TimerId::Retry, RETRY_INTERVAL)]
        );
        assert_eq!(host.snapshot().state, ReconnectState::Idle);
    }

    #[test]
    fn test_rejected_inquiry_folds_into_retry() {
        let mut host = host_with_paired_headset();
        host.process_event(Event::Boot, 0);
        let actions = host.process_event(
            Event::CommandRejected {
                command: StackCommand::StartInquiry {
                    inquiry_length: 8,
                    num_responses: 0,
                },
                error: StackError(-1),
            },
            0,
        );
        assert_eq!(
            actions.as_slice(),
            &[Action::ArmTimer(TimerId::Retry, RETRY_INTERVAL)]
        );
        assert_eq!(host.snapshot().state, ReconnectState::Idle);

        // The next retry can scan again
        let actions = host.process_event(Event::TimerFired(TimerId::Retry), 0);
        assert_eq!(stack_commands(&actions).count(), 1);
    }

    #[test]
    fn test_rejected_connect_counts_as_failure() {
        let mut host = host_with_paired_headset();
        host.process_event(Event::Boot, 0);
        stack(&mut host, StackEvent::DiscoveryResult(openmove_sighting()));
        host.process_event(Event::TimerFired(TimerId::ConnectDelay), 0);

        let actions = host.process_event(
            Event::CommandRejected {
                command: StackCommand::SlcConnect(OPENMOVE),
                error: StackError(-1),
            },
            0,
        );
        assert_eq!(
            actions.as_slice(),
            &[Action::ArmTimer(TimerId::Retry, RETRY_INTERVAL)]
        );
        assert_eq!(host.snapshot().attempt_count, 1);
        assert_eq!(host.snapshot().slc_state, SlcState::Disconnected);
    }

    #[test]
    fn test_zero_connect_delay_connects_immediately() {
        let options = AgOptions {
            connect_delay: Duration::from_ticks(0),
            ..AgOptions::default()
        };
        let mut host = AgHost::new(options, PairedDeviceStore::open(MemoryStorage::new()));
        host.process_event(Event::Boot, 0);
        let actions = stack(&mut host, StackEvent::DiscoveryResult(openmove_sighting()));
        assert_eq!(
            actions.as_slice(),
            &[
                Action::Stack(StackCommand::CancelInquiry),
                Action::Stack(StackCommand::SlcConnect(OPENMOVE)),
            ]
        );
    }

    #[test]
    fn test_discovery_blocked_while_headset_connects() {
        let mut host = host_with_paired_headset();

        // Headset starts connecting on its own while the orchestrator is idle
        stack(&mut host, connection(SlcState::Connecting));
        let actions = host.process_event(Event::StartReconnect, 0);
        assert_eq!(
            actions.as_slice(),
            &[
                Action::CancelTimer(TimerId::Retry),
                Action::ArmTimer(TimerId::Retry, RETRY_INTERVAL),
            ]
        );
        assert_eq!(host.snapshot().state, ReconnectState::Idle);

        // The headset finishes and the orchestrator follows
        stack(&mut host, connection(SlcState::SlcConnected));
        assert_eq!(host.snapshot().state, ReconnectState::Connected);
    }

    #[test]
    fn test_link_loss_rediscovers() {
        let mut host = host_with_paired_headset();
        stack(&mut host, connection(SlcState::SlcConnected));
        assert_eq!(host.snapshot().state, ReconnectState::Connected);

        let actions = stack(&mut host, connection(SlcState::Disconnected));
        assert_eq!(
            actions.as_slice(),
            &[Action::ArmTimer(TimerId::Retry, RETRY_INTERVAL)]
        );
        assert_eq!(host.stats().link_losses, 1);

        let actions = host.process_event(Event::TimerFired(TimerId::Retry), 0);
        assert_eq!(host.snapshot().state, ReconnectState::Searching);
        assert_eq!(stack_commands(&actions).count(), 1);
    }

    #[test]
    fn test_stop_cancels_timers() {
        let mut host = host_with_paired_headset();
        host.process_event(Event::Boot, 0);
        stack(&mut host, StackEvent::DiscoveryResult(openmove_sighting()));

        let actions = host.process_event(Event::StopReconnect, 0);
        assert_eq!(
            actions.as_slice(),
            &[
                Action::CancelTimer(TimerId::ConnectDelay),
                Action::CancelTimer(TimerId::Retry),
            ]
        );
        assert_eq!(host.snapshot().state, ReconnectState::Idle);

        // A late delay expiry does not connect
        let actions = host.process_event(Event::TimerFired(TimerId::ConnectDelay), 0);
        assert!(actions.is_empty());
    }

    #[test]
    fn test_indicator_updates_reach_the_headset() {
        let mut host = host_with_paired_headset();
        stack(&mut host, connection(SlcState::SlcConnected));

        let actions = host.process_event(
            Event::SetIndicator(IndicatorUpdate::CallSetup(CallSetup::Incoming)),
            0,
        );
        assert_eq!(stack_commands(&actions).count(), 1);
        assert_eq!(host.stats().indicator_reports, 1);
    }

    #[test]
    fn test_test_stimulus_mutates_nothing() {
        let mut host = host_with_paired_headset();
        let before = host.snapshot();
        assert!(host.process_event(Event::TestStimulus, 0).is_empty());
        assert_eq!(host.snapshot(), before);
    }
}
