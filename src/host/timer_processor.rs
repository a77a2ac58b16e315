use super::push_action;
use crate::event::{Action, Actions, TimerId};
use crate::store::DeviceStorage;
use crate::AgHost;

impl<S: DeviceStorage> AgHost<S> {
    /// Process an expired timer
    pub(crate) fn process_timer(&mut self, timer: TimerId, actions: &mut Actions) {
        trace!("[HOST] Timer fired: {}", timer.as_str());
        match timer {
            TimerId::Retry => {
                let directives = self.reconnect.on_retry_timer();
                self.apply_directives(&directives, actions);
            }
            TimerId::ConnectDelay => self.connect_pending(actions),
            TimerId::Heartbeat => {
                self.log_status();
                if self.options.audio_keepalive
                    && let Some(command) = self.hfp.request_audio()
                {
                    info!("[HOST] SLC up without audio, requesting audio link");
                    push_action(actions, Action::Stack(command));
                }
                push_action(
                    actions,
                    Action::ArmTimer(TimerId::Heartbeat, self.options.heartbeat_interval),
                );
            }
            TimerId::StatsReport => {
                self.stats.log();
                push_action(
                    actions,
                    Action::ArmTimer(TimerId::StatsReport, self.options.stats_interval),
                );
            }
        }
    }
}
