//! Link statistics

use crate::hfp::Codec;

/// Counters about the HFP and audio links since boot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkStats {
    /// Audio links established
    pub sco_connections: u32,
    /// Audio links closed
    pub sco_disconnections: u32,
    /// Audio links that came up with a different codec than the previous one
    pub codec_switches: u32,
    /// Whether the active or last audio link used mSBC
    pub wideband_active: bool,
    /// Whether an audio link is up
    pub audio_active: bool,
    /// `+CIEV` reports pushed to the headset
    pub indicator_reports: u32,
    /// Unknown AT commands acknowledged
    pub unknown_at_acks: u32,
    /// Service level connections established
    pub slc_establishments: u32,
    /// Service level connections lost
    pub link_losses: u32,
    last_codec: Option<Codec>,
}

impl LinkStats {
    pub(crate) fn audio_connected(&mut self, codec: Codec) {
        self.sco_connections = self.sco_connections.saturating_add(1);
        self.audio_active = true;
        if self.last_codec.is_some_and(|last| last != codec) {
            self.codec_switches = self.codec_switches.saturating_add(1);
            info!("[STATS] Codec changed to {}", codec.as_str());
        }
        self.last_codec = Some(codec);
        self.wideband_active = codec.is_wideband();
    }

    pub(crate) fn audio_disconnected(&mut self) {
        self.sco_disconnections = self.sco_disconnections.saturating_add(1);
        self.audio_active = false;
    }

    pub(crate) fn indicator_reported(&mut self) {
        self.indicator_reports = self.indicator_reports.saturating_add(1);
    }

    pub(crate) fn unknown_at_acked(&mut self) {
        self.unknown_at_acks = self.unknown_at_acks.saturating_add(1);
    }

    pub(crate) fn slc_established(&mut self) {
        self.slc_establishments = self.slc_establishments.saturating_add(1);
    }

    pub(crate) fn link_lost(&mut self) {
        self.link_losses = self.link_losses.saturating_add(1);
    }

    /// Log all counters
    pub fn log(&self) {
        info!("[STATS] === Link statistics ===");
        info!("[STATS] SCO connections: {}", self.sco_connections);
        info!("[STATS] SCO disconnections: {}", self.sco_disconnections);
        info!("[STATS] Codec switches: {}", self.codec_switches);
        info!("[STATS] mSBC active: {}", self.wideband_active);
        info!("[STATS] SCO active: {}", self.audio_active);
        info!("[STATS] Indicator reports: {}", self.indicator_reports);
        info!("[STATS] Unknown AT acks: {}", self.unknown_at_acks);
        info!(
            "[STATS] SLC established/lost: {}/{}",
            self.slc_establishments, self.link_losses
        );
    }
}
