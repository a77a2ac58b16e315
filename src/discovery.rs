//! Discovery controller
//!
//! Runs inquiry scans and turns the raw sightings into at most one candidate per
//! scan: the first device whose advertised name contains the target name, or
//! whose address is the headset being reconnected. Only one inquiry is active at
//! a time, and none runs while a connection attempt is in flight or a headset is
//! connected.

use bt_hci::param::BdAddr;
use heapless::String;

use crate::constants::MAX_DEVICE_NAME_LENGTH;
use crate::event::StackCommand;
use crate::store::{DeviceStorage, PairedDeviceStore, sanitize_name};
use crate::{AgError, AgOptions, BluetoothAddress, ClassOfDevice, Timestamp};

/// EIR data type: shortened local name
const EIR_SHORTENED_LOCAL_NAME: u8 = 0x08;
/// EIR data type: complete local name
const EIR_COMPLETE_LOCAL_NAME: u8 = 0x09;

/// One device answering an inquiry
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Sighting {
    /// Device address
    pub address: BluetoothAddress,
    /// Advertised name, if the response carried one
    pub name: Option<String<MAX_DEVICE_NAME_LENGTH>>,
    /// Advertised Class of Device
    pub class_of_device: ClassOfDevice,
}

impl Sighting {
    /// Create a sighting with an already decoded name
    #[must_use]
    pub fn new(
        address: BluetoothAddress,
        name: Option<&str>,
        class_of_device: ClassOfDevice,
    ) -> Self {
        Self {
            address,
            name: name.map(sanitize_name),
            class_of_device,
        }
    }

    /// Create a sighting from extended inquiry response data
    ///
    /// The complete local name is preferred over the shortened one. Malformed
    /// structures end parsing; names that are not UTF-8 are dropped.
    #[must_use]
    pub fn from_eir(
        address: BluetoothAddress,
        class_of_device: ClassOfDevice,
        eir: &[u8],
    ) -> Self {
        let name = eir_field(eir, EIR_COMPLETE_LOCAL_NAME)
            .or_else(|| eir_field(eir, EIR_SHORTENED_LOCAL_NAME))
            .and_then(|bytes| core::str::from_utf8(bytes).ok());
        Self::new(address, name, class_of_device)
    }

    /// Create a sighting from the fields of an HCI extended inquiry result
    ///
    /// `class_of_device` is the 3-byte little-endian field as received.
    #[must_use]
    pub fn from_inquiry_result(
        bd_addr: BdAddr,
        class_of_device: [u8; 3],
        eir: &[u8],
    ) -> Self {
        Self::from_eir(
            bd_addr.into(),
            ClassOfDevice::from_le_bytes(class_of_device),
            eir,
        )
    }

    /// Whether this is `target_address` or the advertised name contains `target_name`
    #[must_use]
    pub fn matches(&self, target_name: &str, target_address: Option<BluetoothAddress>) -> bool {
        if target_address == Some(self.address) {
            return true;
        }
        !target_name.is_empty()
            && self
                .name
                .as_ref()
                .is_some_and(|name| name.as_str().contains(target_name))
    }
}

/// Find the payload of the first EIR structure of type `data_type`
fn eir_field(eir: &[u8], data_type: u8) -> Option<&[u8]> {
    let mut rest = eir;
    while let Some((&len, tail)) = rest.split_first() {
        let len = usize::from(len);
        if len == 0 || len > tail.len() {
            return None;
        }
        let (structure, next) = tail.split_at(len);
        if structure[0] == data_type {
            return Some(&structure[1..]);
        }
        rest = next;
    }
    None
}

/// Outcome of a scan reported to the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiscoveryEvent {
    /// A device matching the target name was found
    CandidateFound(BluetoothAddress),
    /// The scan ended without a match
    Complete,
}

/// Result of feeding a sighting to the controller
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiscoveryOutput {
    /// Notification for the orchestrator
    pub event: Option<DiscoveryEvent>,
    /// Command for the stack
    pub command: Option<StackCommand>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum ScanState {
    Idle,
    Scanning,
    /// A candidate was found and the inquiry cancel is pending
    Cancelling(BluetoothAddress),
}

/// Inquiry scan driver and name filter
#[derive(Debug)]
pub struct DiscoveryController {
    target_name: String<MAX_DEVICE_NAME_LENGTH>,
    target_address: Option<BluetoothAddress>,
    inquiry_length: u8,
    num_responses: u8,
    state: ScanState,
}

impl DiscoveryController {
    /// Create a controller with the inquiry parameters of `options`
    #[must_use]
    pub fn new(options: &AgOptions) -> Self {
        Self {
            target_name: options.target_name.clone(),
            target_address: None,
            inquiry_length: options.inquiry_length,
            num_responses: options.num_responses,
            state: ScanState::Idle,
        }
    }

    /// Change the name substring to search for
    ///
    /// # Errors
    ///
    /// Returns `AgError::InvalidParameter` if the name is empty or too long.
    pub fn set_target_name(&mut self, name: &str) -> Result<(), AgError> {
        if name.is_empty() {
            return Err(AgError::InvalidParameter);
        }
        self.target_name = String::try_from(name).map_err(|()| AgError::InvalidParameter)?;
        info!("[DISCOVERY] Target name set to '{}'", self.target_name.as_str());
        Ok(())
    }

    /// The name substring searched for
    #[must_use]
    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// Also accept sightings of `address`, whatever name they advertise
    ///
    /// Used for the stored headset being reconnected, whose record may carry a
    /// placeholder name.
    pub fn set_target_address(&mut self, address: Option<BluetoothAddress>) {
        self.target_address = address;
    }

    /// The address accepted besides the name match
    #[must_use]
    pub fn target_address(&self) -> Option<BluetoothAddress> {
        self.target_address
    }

    /// Whether an inquiry is running or being cancelled
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state != ScanState::Idle
    }

    /// Begin an inquiry scan
    ///
    /// `link_busy` is true while a connection attempt is in flight or a headset
    /// is connected.
    ///
    /// # Errors
    ///
    /// Returns `AgError::InvalidState` if the link is busy and
    /// `AgError::AlreadyInProgress` if an inquiry is already active.
    pub fn start(&mut self, link_busy: bool) -> Result<StackCommand, AgError> {
        if link_busy {
            warn!("[DISCOVERY] Connection in progress, not starting inquiry");
            return Err(AgError::InvalidState);
        }
        if self.is_active() {
            warn!("[DISCOVERY] Inquiry already active");
            return Err(AgError::AlreadyInProgress);
        }

        info!(
            "[DISCOVERY] Starting inquiry for '{}' ({} x 1.28s)",
            self.target_name.as_str(),
            self.inquiry_length
        );
        self.state = ScanState::Scanning;
        Ok(StackCommand::StartInquiry {
            inquiry_length: self.inquiry_length,
            num_responses: self.num_responses,
        })
    }

    /// Handle one inquiry response
    ///
    /// The first match of a scan is recorded in `store`, the inquiry is cancelled
    /// and the candidate is reported. Everything else is only logged.
    pub fn on_sighting<S: DeviceStorage>(
        &mut self,
        sighting: &Sighting,
        store: &mut PairedDeviceStore<S>,
        now: Timestamp,
    ) -> DiscoveryOutput {
        debug!(
            "[DISCOVERY] Device found: {} '{}' ({})",
            sighting.address.format_hex().as_str(),
            sighting.name.as_ref().map_or("", |n| n.as_str()),
            sighting.class_of_device.description()
        );

        if self.state != ScanState::Scanning
            || !sighting.matches(&self.target_name, self.target_address)
        {
            return DiscoveryOutput::default();
        }

        info!(
            "[DISCOVERY] Target device found: {}",
            sighting.address.format_hex().as_str()
        );
        let known = store.find(&sighting.address);
        // A headset that once held an SLC stays HF-capable, and keeps its name
        // when the response carries none
        let is_hf_capable = sighting.class_of_device.is_audio_video()
            || known.is_some_and(|record| record.is_hf_capable);
        let name = match (&sighting.name, known) {
            (Some(name), _) => name.clone(),
            (None, Some(record)) => record.name.clone(),
            (None, None) => String::new(),
        };
        if let Err(e) = store.add_or_update(
            sighting.address,
            &name,
            sighting.class_of_device,
            is_hf_capable,
            now,
        ) {
            warn!("[DISCOVERY] Could not record sighting: {}", e);
        }

        self.state = ScanState::Cancelling(sighting.address);
        DiscoveryOutput {
            event: Some(DiscoveryEvent::CandidateFound(sighting.address)),
            command: Some(StackCommand::CancelInquiry),
        }
    }

    /// Handle the end of the inquiry
    pub fn on_inquiry_stopped(&mut self) -> Option<DiscoveryEvent> {
        let state = self.state;
        self.state = ScanState::Idle;
        match state {
            ScanState::Scanning => {
                info!("[DISCOVERY] Inquiry complete, target not found");
                Some(DiscoveryEvent::Complete)
            }
            ScanState::Cancelling(address) => {
                debug!(
                    "[DISCOVERY] Inquiry cancelled after finding {}",
                    address.format_hex().as_str()
                );
                None
            }
            ScanState::Idle => {
                debug!("[DISCOVERY] Ignoring inquiry stop without active scan");
                None
            }
        }
    }

    /// Handle the stack refusing to start the inquiry
    pub fn on_start_rejected(&mut self) -> Option<DiscoveryEvent> {
        if self.state != ScanState::Scanning {
            return None;
        }
        warn!("[DISCOVERY] Inquiry start rejected by stack");
        self.state = ScanState::Idle;
        Some(DiscoveryEvent::Complete)
    }

    /// Handle the stack refusing to cancel the inquiry
    ///
    /// The inquiry then runs to its timeout; the candidate stays reported.
    pub fn on_cancel_rejected(&self) {
        warn!("[DISCOVERY] Inquiry cancel rejected, waiting for timeout");
    }
}

impl Default for DiscoveryController {
    fn default() -> Self {
        Self::new(&AgOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_TARGET_NAME;
    use crate::store::MemoryStorage;

    const OPENMOVE: BluetoothAddress = BluetoothAddress([0x20, 0x74, 0xCF, 0x11, 0x22, 0x33]);
    const OTHER: BluetoothAddress = BluetoothAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);

    fn headset_class() -> ClassOfDevice {
        ClassOfDevice::from_raw(0x0024_0404)
    }

    fn store() -> PairedDeviceStore<MemoryStorage> {
        PairedDeviceStore::open(MemoryStorage::new())
    }

    #[test]
    fn test_start_issues_inquiry() {
        let mut discovery = DiscoveryController::default();
        assert!(!discovery.is_active());

        let command = discovery.start(false).unwrap();
        assert_eq!(
            command,
            StackCommand::StartInquiry {
                inquiry_length: 8,
                num_responses: 0
            }
        );
        assert!(discovery.is_active());
    }

    #[test]
    fn test_start_is_exclusive() {
        let mut discovery = DiscoveryController::default();
        assert_eq!(discovery.start(true), Err(AgError::InvalidState));
        assert!(!discovery.is_active());

        discovery.start(false).unwrap();
        assert_eq!(discovery.start(false), Err(AgError::AlreadyInProgress));
    }

    #[test]
    fn test_match_records_cancels_and_reports_once() {
        let mut discovery = DiscoveryController::default();
        let mut store = store();
        discovery.start(false).unwrap();

        let noise = Sighting::new(OTHER, Some("Kitchen Speaker"), headset_class());
        assert_eq!(
            discovery.on_sighting(&noise, &mut store, 10),
            DiscoveryOutput::default()
        );

        let target = Sighting::new(OPENMOVE, Some("OpenMove by AfterShokz"), headset_class());
        let output = discovery.on_sighting(&target, &mut store, 10);
        assert_eq!(
            output.event,
            Some(DiscoveryEvent::CandidateFound(OPENMOVE))
        );
        assert_eq!(output.command, Some(StackCommand::CancelInquiry));

        let record = store.find(&OPENMOVE).unwrap();
        assert!(record.is_hf_capable);
        assert_eq!(record.name.as_str(), "OpenMove by AfterShokz");
        assert_eq!(store.count(), 1);

        // Repeated responses in the same scan are ignored
        assert_eq!(
            discovery.on_sighting(&target, &mut store, 11),
            DiscoveryOutput::default()
        );
        assert_eq!(store.find(&OPENMOVE).unwrap().connection_count, 1);

        // The cancel completes without a second notification
        assert_eq!(discovery.on_inquiry_stopped(), None);
        assert!(!discovery.is_active());
    }

    #[test]
    fn test_substring_match_and_capability_inference() {
        let mut discovery = DiscoveryController::default();
        discovery.set_target_name("OpenMove").unwrap();
        let mut store = store();
        discovery.start(false).unwrap();

        let laptop = ClassOfDevice::from_raw(0x0010_010C);
        let sighting = Sighting::new(OPENMOVE, Some("My OpenMove 2"), laptop);
        let output = discovery.on_sighting(&sighting, &mut store, 1);
        assert!(output.event.is_some());
        assert!(!store.find(&OPENMOVE).unwrap().is_hf_capable);
    }

    #[test]
    fn test_nameless_sightings_never_match() {
        let mut discovery = DiscoveryController::default();
        let mut store = store();
        discovery.start(false).unwrap();

        let sighting = Sighting::new(OPENMOVE, None, headset_class());
        assert_eq!(
            discovery.on_sighting(&sighting, &mut store, 1),
            DiscoveryOutput::default()
        );
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_target_address_matches_without_name() {
        let mut discovery = DiscoveryController::default();
        let mut store = store();
        store.record_connection(OPENMOVE, 5).unwrap();
        discovery.set_target_address(Some(OPENMOVE));
        discovery.start(false).unwrap();

        let other = Sighting::new(OTHER, None, headset_class());
        assert_eq!(
            discovery.on_sighting(&other, &mut store, 10),
            DiscoveryOutput::default()
        );

        let laptop = ClassOfDevice::from_raw(0x0010_010C);
        let output = discovery.on_sighting(&Sighting::new(OPENMOVE, None, laptop), &mut store, 10);
        assert_eq!(
            output.event,
            Some(DiscoveryEvent::CandidateFound(OPENMOVE))
        );

        let record = store.find(&OPENMOVE).unwrap();
        assert_eq!(record.name.as_str(), "HF Device");
        assert!(record.is_hf_capable);
        assert_eq!(record.class_of_device, laptop);
    }

    #[test]
    fn test_matches() {
        let named = Sighting::new(OTHER, Some("OpenMove by AfterShokz"), headset_class());
        assert!(named.matches("OpenMove", None));
        assert!(!named.matches("", None));
        assert!(named.matches("", Some(OTHER)));
        assert!(!named.matches("Shokz Pro", Some(OPENMOVE)));
    }

    #[test]
    fn test_sightings_outside_scan_are_ignored() {
        let mut discovery = DiscoveryController::default();
        let mut store = store();
        let target = Sighting::new(OPENMOVE, Some("OpenMove by AfterShokz"), headset_class());
        assert_eq!(
            discovery.on_sighting(&target, &mut store, 1),
            DiscoveryOutput::default()
        );
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_scan_without_match_completes() {
        let mut discovery = DiscoveryController::default();
        discovery.start(false).unwrap();
        assert_eq!(discovery.on_inquiry_stopped(), Some(DiscoveryEvent::Complete));
        assert_eq!(discovery.on_inquiry_stopped(), None);

        // A new scan can start once the previous one ended
        assert!(discovery.start(false).is_ok());
    }

    #[test]
    fn test_rejected_start_completes() {
        let mut discovery = DiscoveryController::default();
        discovery.start(false).unwrap();
        assert_eq!(discovery.on_start_rejected(), Some(DiscoveryEvent::Complete));
        assert!(!discovery.is_active());
        assert_eq!(discovery.on_start_rejected(), None);
    }

    #[test]
    fn test_set_target_name_validation() {
        let mut discovery = DiscoveryController::default();
        assert_eq!(discovery.target_name(), DEFAULT_TARGET_NAME);
        assert_eq!(
            discovery.set_target_name(""),
            Err(AgError::InvalidParameter)
        );
        discovery.set_target_name("Shokz").unwrap();
        assert_eq!(discovery.target_name(), "Shokz");
    }

    #[test]
    fn test_from_eir_complete_name() {
        let mut eir = [0u8; 32];
        // Flags, then complete local name
        eir[..3].copy_from_slice(&[0x02, 0x01, 0x06]);
        eir[3] = 9;
        eir[4] = EIR_COMPLETE_LOCAL_NAME;
        eir[5..13].copy_from_slice(b"OpenMove");

        let sighting = Sighting::from_eir(OPENMOVE, headset_class(), &eir);
        assert_eq!(sighting.name.as_ref().map(|n| n.as_str()), Some("OpenMove"));
    }

    #[test]
    fn test_from_eir_falls_back_to_shortened_name() {
        let eir = [0x05, EIR_SHORTENED_LOCAL_NAME, b'O', b'p', b'e', b'n'];
        let sighting = Sighting::from_eir(OPENMOVE, headset_class(), &eir);
        assert_eq!(sighting.name.as_ref().map(|n| n.as_str()), Some("Open"));
    }

    #[test]
    fn test_from_inquiry_result() {
        let eir = [0x09, EIR_COMPLETE_LOCAL_NAME, b'O', b'p', b'e', b'n', b'M', b'o', b'v', b'e'];
        let sighting = Sighting::from_inquiry_result(
            BdAddr::new([0x20, 0x74, 0xCF, 0x11, 0x22, 0x33]),
            [0x04, 0x04, 0x24],
            &eir,
        );
        assert_eq!(sighting.address, OPENMOVE);
        assert_eq!(sighting.class_of_device, headset_class());
        assert!(sighting.class_of_device.is_audio_video());
        assert!(sighting.matches("OpenMove", None));
    }

    #[test]
    fn test_from_eir_malformed() {
        // Length runs past the end of the data
        let eir = [0x10, EIR_COMPLETE_LOCAL_NAME, b'O'];
        assert_eq!(Sighting::from_eir(OPENMOVE, headset_class(), &eir).name, None);

        let eir = [0x03, EIR_COMPLETE_LOCAL_NAME, 0xFF, 0xFE];
        assert_eq!(Sighting::from_eir(OPENMOVE, headset_class(), &eir).name, None);

        assert_eq!(Sighting::from_eir(OPENMOVE, headset_class(), &[]).name, None);
    }
}
