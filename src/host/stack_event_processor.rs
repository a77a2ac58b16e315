use super::push_action;
use crate::event::{Action, Actions};
use crate::stack::StackEvent;
use crate::store::DeviceStorage;
use crate::{AgHost, Timestamp};

impl<S: DeviceStorage> AgHost<S> {
    /// Process an event reported by the radio/profile stack
    pub(crate) fn process_stack_event(
        &mut self,
        event: &StackEvent,
        now: Timestamp,
        actions: &mut Actions,
    ) {
        match event {
            StackEvent::DiscoveryResult(sighting) => {
                let output = self.discovery.on_sighting(sighting, &mut self.store, now);
                if let Some(command) = output.command {
                    push_action(actions, Action::Stack(command));
                }
                if let Some(event) = output.event {
                    self.route_discovery_event(event, actions);
                }
            }
            StackEvent::DiscoveryStopped => {
                if let Some(event) = self.discovery.on_inquiry_stopped() {
                    self.route_discovery_event(event, actions);
                }
            }
            _ => {
                let output = self
                    .hfp
                    .handle(event, &mut self.store, &mut self.stats, now);
                for command in output.commands {
                    push_action(actions, Action::Stack(command));
                }
                if let Some(notification) = output.notification {
                    self.route_hfp_notification(notification, actions);
                }
            }
        }
    }
}
