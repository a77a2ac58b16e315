//! Auto-reconnect orchestrator
//!
//! Top-level state machine sequencing discovery, connect, retry and give-up.
//!
//! | From | Trigger | To | Directive |
//! |---|---|---|---|
//! | Idle | `start()` with a candidate | Searching | start discovery |
//! | Searching | candidate found | Connecting | connect |
//! | Searching | scan ended without candidate | Idle | arm retry timer |
//! | Connecting | SLC established | Connected | cancel retry timer |
//! | Connecting | failure, attempts below limit | Idle | arm retry timer |
//! | Connecting | failure, limit reached | Failed | arm retry timer |
//! | Connected | link lost | Idle | arm retry timer |
//! | Failed | retry timer | Idle | arm retry timer |
//! | Idle | retry timer | Searching | start discovery |
//!
//! The orchestrator only decides; the host turns [`Directive`]s into stack
//! commands and timer actions.

use heapless::Vec;

use crate::BluetoothAddress;
use crate::constants::MAX_ATTEMPTS;

/// Auto-reconnect state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReconnectState {
    /// Waiting for `start()` or the retry timer
    #[default]
    Idle,
    /// Inquiry running to reconfirm the headset is around
    Searching,
    /// Connect request issued
    Connecting,
    /// Service level connection up
    Connected,
    /// Attempt limit reached, cooling down
    Failed,
}

impl ReconnectState {
    /// State name for logging
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Searching => "Searching",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Failed => "Failed",
        }
    }
}

/// Request from the orchestrator to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Directive {
    /// Run an inquiry scan
    StartDiscovery,
    /// Connect to the headset
    Connect(BluetoothAddress),
    /// Arm the retry timer, replacing a pending one
    ArmRetryTimer,
    /// Cancel the retry timer
    CancelRetryTimer,
}

/// Directives produced by one transition
pub type Directives = Vec<Directive, 2>;

/// The connection session state machine
#[derive(Debug, Default)]
pub struct ReconnectOrchestrator {
    state: ReconnectState,
    target: Option<BluetoothAddress>,
    attempt_count: u8,
}

impl ReconnectOrchestrator {
    /// Create an idle orchestrator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> ReconnectState {
        self.state
    }

    /// Headset pursued or connected
    #[must_use]
    pub fn target(&self) -> Option<BluetoothAddress> {
        self.target
    }

    /// Consecutive failed connect attempts since the last success
    #[must_use]
    pub fn attempt_count(&self) -> u8 {
        self.attempt_count
    }

    /// Whether a connect request is in flight or a headset is connected
    #[must_use]
    pub fn is_link_busy(&self) -> bool {
        matches!(
            self.state,
            ReconnectState::Connecting | ReconnectState::Connected
        )
    }

    fn transition(&mut self, to: ReconnectState) {
        if self.state != to {
            info!(
                "[RECONNECT] {} -> {} (attempts {})",
                self.state.as_str(),
                to.as_str(),
                self.attempt_count
            );
        }
        self.state = to;
    }

    fn directives(items: &[Directive]) -> Directives {
        // Callers pass at most two directives
        Vec::from_slice(items).unwrap_or_default()
    }

    /// Start reconnecting to `candidate`, the store's best reconnect candidate
    ///
    /// A no-op unless idle and a candidate exists.
    pub fn start(&mut self, candidate: Option<BluetoothAddress>) -> Directives {
        if self.state != ReconnectState::Idle {
            warn!(
                "[RECONNECT] Already running, state {}",
                self.state.as_str()
            );
            return Directives::new();
        }
        let Some(candidate) = candidate else {
            info!("[RECONNECT] No reconnect candidate stored");
            return Directives::new();
        };

        info!(
            "[RECONNECT] Reconnecting to {}",
            candidate.format_hex().as_str()
        );
        self.target = Some(candidate);
        self.transition(ReconnectState::Searching);
        Self::directives(&[Directive::CancelRetryTimer, Directive::StartDiscovery])
    }

    /// Search for a headset that was never connected before
    pub fn pair_new_device(&mut self) -> Directives {
        if self.state != ReconnectState::Idle {
            warn!(
                "[RECONNECT] Cannot pair while {}",
                self.state.as_str()
            );
            return Directives::new();
        }

        info!("[RECONNECT] Searching for a new headset");
        self.target = None;
        self.transition(ReconnectState::Searching);
        Self::directives(&[Directive::CancelRetryTimer, Directive::StartDiscovery])
    }

    /// Stop reconnecting and forget the attempt count
    pub fn stop(&mut self) -> Directives {
        info!("[RECONNECT] Stopping auto-reconnect");
        self.attempt_count = 0;
        self.transition(ReconnectState::Idle);
        Self::directives(&[Directive::CancelRetryTimer])
    }

    /// Discovery found the headset
    pub fn on_candidate_found(&mut self, address: BluetoothAddress) -> Directives {
        if self.state != ReconnectState::Searching {
            debug!(
                "[RECONNECT] Ignoring candidate while {}",
                self.state.as_str()
            );
            return Directives::new();
        }

        self.target = Some(address);
        self.transition(ReconnectState::Connecting);
        Self::directives(&[Directive::Connect(address)])
    }

    /// Discovery ended without finding the headset, or could not run
    pub fn on_discovery_complete(&mut self) -> Directives {
        if self.state != ReconnectState::Searching {
            return Directives::new();
        }

        self.transition(ReconnectState::Idle);
        Self::directives(&[Directive::ArmRetryTimer])
    }

    /// The service level connection with `address` is up
    ///
    /// Also accepted outside `Connecting` for connections the headset initiated.
    pub fn on_slc_established(&mut self, address: BluetoothAddress) -> Directives {
        if self.state == ReconnectState::Connected {
            return Directives::new();
        }

        self.target = Some(address);
        self.attempt_count = 0;
        self.transition(ReconnectState::Connected);
        Self::directives(&[Directive::CancelRetryTimer])
    }

    /// The link is gone or the connect attempt failed
    pub fn on_link_lost(&mut self) -> Directives {
        match self.state {
            ReconnectState::Connecting => {
                self.attempt_count = self.attempt_count.saturating_add(1);
                warn!(
                    "[RECONNECT] Connection failed, attempt {}/{}",
                    self.attempt_count, MAX_ATTEMPTS
                );
                if self.attempt_count >= MAX_ATTEMPTS {
                    error!("[RECONNECT] Max reconnection attempts reached, cooling down");
                    self.attempt_count = 0;
                    self.transition(ReconnectState::Failed);
                } else {
                    self.transition(ReconnectState::Idle);
                }
                Self::directives(&[Directive::ArmRetryTimer])
            }
            ReconnectState::Connected => {
                info!("[RECONNECT] Connection lost, rediscovering after delay");
                self.transition(ReconnectState::Idle);
                Self::directives(&[Directive::ArmRetryTimer])
            }
            ReconnectState::Idle | ReconnectState::Searching | ReconnectState::Failed => {
                debug!(
                    "[RECONNECT] Ignoring link loss while {}",
                    self.state.as_str()
                );
                Directives::new()
            }
        }
    }

    /// The retry timer fired
    pub fn on_retry_timer(&mut self) -> Directives {
        match self.state {
            ReconnectState::Idle => {
                self.transition(ReconnectState::Searching);
                Self::directives(&[Directive::StartDiscovery])
            }
            ReconnectState::Failed => {
                self.transition(ReconnectState::Idle);
                Self::directives(&[Directive::ArmRetryTimer])
            }
            ReconnectState::Searching | ReconnectState::Connecting | ReconnectState::Connected => {
                debug!(
                    "[RECONNECT] Stale retry timer while {}",
                    self.state.as_str()
                );
                Directives::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADSET: BluetoothAddress = BluetoothAddress([0x20, 0x74, 0xCF, 0x11, 0x22, 0x33]);

    /// Drive one failed cycle starting from Idle with a pending retry timer
    fn fail_once(orchestrator: &mut ReconnectOrchestrator) -> Directives {
        assert_eq!(
            orchestrator.on_retry_timer().as_slice(),
            &[Directive::StartDiscovery]
        );
        assert_eq!(
            orchestrator.on_candidate_found(HEADSET).as_slice(),
            &[Directive::Connect(HEADSET)]
        );
        orchestrator.on_link_lost()
    }

    fn searching() -> ReconnectOrchestrator {
        let mut orchestrator = ReconnectOrchestrator::new();
        orchestrator.start(Some(HEADSET));
        orchestrator
    }

    #[test]
    fn test_start_with_candidate() {
        let mut orchestrator = ReconnectOrchestrator::new();
        let directives = orchestrator.start(Some(HEADSET));
        assert_eq!(
            directives.as_slice(),
            &[Directive::CancelRetryTimer, Directive::StartDiscovery]
        );
        assert_eq!(orchestrator.state(), ReconnectState::Searching);
        assert_eq!(orchestrator.target(), Some(HEADSET));
    }

    #[test]
    fn test_start_without_candidate_is_noop() {
        let mut orchestrator = ReconnectOrchestrator::new();
        assert!(orchestrator.start(None).is_empty());
        assert_eq!(orchestrator.state(), ReconnectState::Idle);
    }

    #[test]
    fn test_start_while_running_is_noop() {
        let mut orchestrator = searching();
        assert!(orchestrator.start(Some(HEADSET)).is_empty());
        assert_eq!(orchestrator.state(), ReconnectState::Searching);
    }

    #[test]
    fn test_no_candidate_arms_retry() {
        let mut orchestrator = searching();
        assert_eq!(
            orchestrator.on_discovery_complete().as_slice(),
            &[Directive::ArmRetryTimer]
        );
        assert_eq!(orchestrator.state(), ReconnectState::Idle);
        assert_eq!(orchestrator.attempt_count(), 0);
    }

    #[test]
    fn test_success_resets_attempts() {
        let mut orchestrator = searching();
        orchestrator.on_candidate_found(HEADSET);
        orchestrator.on_link_lost();
        assert_eq!(orchestrator.attempt_count(), 1);

        orchestrator.on_retry_timer();
        orchestrator.on_candidate_found(HEADSET);
        assert!(orchestrator.is_link_busy());
        assert_eq!(
            orchestrator.on_slc_established(HEADSET).as_slice(),
            &[Directive::CancelRetryTimer]
        );
        assert_eq!(orchestrator.state(), ReconnectState::Connected);
        assert_eq!(orchestrator.attempt_count(), 0);
    }

    #[test]
    fn test_failed_after_exactly_max_attempts() {
        let mut orchestrator = searching();
        orchestrator.on_candidate_found(HEADSET);

        for attempt in 1..MAX_ATTEMPTS {
            assert_eq!(
                orchestrator.on_link_lost().as_slice(),
                &[Directive::ArmRetryTimer]
            );
            assert_eq!(orchestrator.state(), ReconnectState::Idle);
            assert_eq!(orchestrator.attempt_count(), attempt);

            assert_eq!(
                orchestrator.on_retry_timer().as_slice(),
                &[Directive::StartDiscovery]
            );
            orchestrator.on_candidate_found(HEADSET);
        }

        assert_eq!(
            orchestrator.on_link_lost().as_slice(),
            &[Directive::ArmRetryTimer]
        );
        assert_eq!(orchestrator.state(), ReconnectState::Failed);
        assert_eq!(orchestrator.attempt_count(), 0);

        // Cool-down ends in Idle with another retry pending
        assert_eq!(
            orchestrator.on_retry_timer().as_slice(),
            &[Directive::ArmRetryTimer]
        );
        assert_eq!(orchestrator.state(), ReconnectState::Idle);
        assert_eq!(orchestrator.attempt_count(), 0);

        // And the cycle starts over
        assert_eq!(
            orchestrator.on_retry_timer().as_slice(),
            &[Directive::StartDiscovery]
        );
        assert_eq!(orchestrator.state(), ReconnectState::Searching);
    }

    #[test]
    fn test_never_failed_before_max_attempts() {
        // Every failure count below the limit, interrupted by a success
        for failures in 0..MAX_ATTEMPTS {
            let mut orchestrator = searching();
            orchestrator.on_candidate_found(HEADSET);
            orchestrator.on_link_lost();
            for _ in 1..failures {
                fail_once(&mut orchestrator);
            }
            assert_ne!(orchestrator.state(), ReconnectState::Failed);

            orchestrator.on_retry_timer();
            orchestrator.on_candidate_found(HEADSET);
            orchestrator.on_slc_established(HEADSET);
            for _ in 1..MAX_ATTEMPTS {
                orchestrator.on_link_lost();
                fail_once(&mut orchestrator);
                assert_ne!(orchestrator.state(), ReconnectState::Failed);
            }
        }
    }

    #[test]
    fn test_link_loss_after_connect_rediscovers() {
        let mut orchestrator = searching();
        orchestrator.on_candidate_found(HEADSET);
        orchestrator.on_slc_established(HEADSET);

        assert_eq!(
            orchestrator.on_link_lost().as_slice(),
            &[Directive::ArmRetryTimer]
        );
        assert_eq!(orchestrator.state(), ReconnectState::Idle);
        assert_eq!(orchestrator.attempt_count(), 0);
        assert_eq!(
            orchestrator.on_retry_timer().as_slice(),
            &[Directive::StartDiscovery]
        );
    }

    #[test]
    fn test_incoming_connection_enters_connected() {
        let mut orchestrator = ReconnectOrchestrator::new();
        assert_eq!(
            orchestrator.on_slc_established(HEADSET).as_slice(),
            &[Directive::CancelRetryTimer]
        );
        assert_eq!(orchestrator.state(), ReconnectState::Connected);
        assert!(orchestrator.on_slc_established(HEADSET).is_empty());
    }

    #[test]
    fn test_stop_cancels_and_resets() {
        let mut orchestrator = searching();
        orchestrator.on_candidate_found(HEADSET);
        orchestrator.on_link_lost();
        assert_eq!(
            orchestrator.stop().as_slice(),
            &[Directive::CancelRetryTimer]
        );
        assert_eq!(orchestrator.state(), ReconnectState::Idle);
        assert_eq!(orchestrator.attempt_count(), 0);
    }

    #[test]
    fn test_pair_new_device() {
        let mut orchestrator = ReconnectOrchestrator::new();
        assert_eq!(
            orchestrator.pair_new_device().as_slice(),
            &[Directive::CancelRetryTimer, Directive::StartDiscovery]
        );
        assert_eq!(orchestrator.state(), ReconnectState::Searching);
        assert_eq!(orchestrator.target(), None);
        assert!(orchestrator.pair_new_device().is_empty());
    }

    #[test]
    fn test_stray_events_are_ignored() {
        let mut orchestrator = ReconnectOrchestrator::new();
        assert!(orchestrator.on_candidate_found(HEADSET).is_empty());
        assert!(orchestrator.on_discovery_complete().is_empty());
        assert!(orchestrator.on_link_lost().is_empty());
        assert_eq!(orchestrator.state(), ReconnectState::Idle);

        let mut orchestrator = searching();
        assert!(orchestrator.on_retry_timer().is_empty());
        assert_eq!(orchestrator.state(), ReconnectState::Searching);
    }
}
