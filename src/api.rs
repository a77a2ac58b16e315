//! `Callbird` API
//!
//! Handles for talking to the processor from the outside. Stack callbacks use an
//! [`EventSender`] to post [`StackEvent`]s without blocking; the application or a
//! console uses an [`AgClient`] to control auto-reconnect and read the status.
//!
//! # Usage
//!
//! ```rust
//! use callbird::api::{AgClient, EventSender};
//! use callbird::event::Event;
//! use callbird::processor::{EventChannel, StatusCell};
//! use callbird::stack::StackEvent;
//! use callbird::StatusSnapshot;
//! use core::cell::Cell;
//! use embassy_sync::blocking_mutex::{Mutex, raw::NoopRawMutex};
//!
//! let events: EventChannel<NoopRawMutex, 4> = EventChannel::new();
//! let status: StatusCell<NoopRawMutex> = Mutex::new(Cell::new(StatusSnapshot::INITIAL));
//!
//! // From a stack callback
//! let sender = EventSender::new(&events);
//! assert!(sender.post_stack(StackEvent::DiscoveryStopped));
//!
//! // From the application
//! let client = AgClient::new(&events, &status);
//! embassy_futures::block_on(client.start_reconnect());
//! assert_eq!(client.status(), StatusSnapshot::INITIAL);
//! assert_eq!(events.len(), 2);
//! ```

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::TrySendError;

use crate::StatusSnapshot;
use crate::event::Event;
use crate::hfp::IndicatorUpdate;
use crate::processor::{EventChannel, StatusCell};
use crate::stack::StackEvent;

/// Posts events into the processor's queue
pub struct EventSender<'a, M: RawMutex, const N: usize> {
    channel: &'a EventChannel<M, N>,
}

impl<M: RawMutex, const N: usize> Clone for EventSender<'_, M, N> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M: RawMutex, const N: usize> Copy for EventSender<'_, M, N> {}

impl<'a, M: RawMutex, const N: usize> EventSender<'a, M, N> {
    /// Create a sender for `channel`
    #[must_use]
    pub const fn new(channel: &'a EventChannel<M, N>) -> Self {
        Self { channel }
    }

    /// Queue `event` without waiting
    ///
    /// Returns `false` if the queue is full; the event is dropped and logged.
    pub fn post(&self, event: Event) -> bool {
        match self.channel.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                error!("[API] Event queue full, dropping {:?}", event);
                false
            }
        }
    }

    /// Queue a stack event without waiting, see [`EventSender::post`]
    pub fn post_stack(&self, event: StackEvent) -> bool {
        self.post(Event::Stack(event))
    }

    /// Queue `event`, waiting for room
    pub async fn send(&self, event: Event) {
        self.channel.send(event).await;
    }
}

/// Application handle: control auto-reconnect and read the status
pub struct AgClient<'a, M: RawMutex, const N: usize> {
    sender: EventSender<'a, M, N>,
    status: &'a StatusCell<M>,
}

impl<'a, M: RawMutex, const N: usize> AgClient<'a, M, N> {
    /// Create a client for the processor serving `channel` and publishing into `status`
    #[must_use]
    pub const fn new(channel: &'a EventChannel<M, N>, status: &'a StatusCell<M>) -> Self {
        Self {
            sender: EventSender::new(channel),
            status,
        }
    }

    /// Latest published status snapshot
    #[must_use]
    pub fn status(&self) -> StatusSnapshot {
        self.status.lock(core::cell::Cell::get)
    }

    /// Start auto-reconnect towards the best stored candidate
    pub async fn start_reconnect(&self) {
        self.sender.send(Event::StartReconnect).await;
    }

    /// Stop auto-reconnect and reset the attempt counter
    pub async fn stop_reconnect(&self) {
        self.sender.send(Event::StopReconnect).await;
    }

    /// Log the audio and connection state; changes nothing
    pub async fn test_stimulus(&self) {
        self.sender.send(Event::TestStimulus).await;
    }

    /// Change a phone indicator reported to the headset
    pub async fn set_indicator(&self, update: IndicatorUpdate) {
        self.sender.send(Event::SetIndicator(update)).await;
    }

    /// Sender for the same queue, for stack callbacks
    #[must_use]
    pub fn sender(&self) -> EventSender<'a, M, N> {
        self.sender
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hfp::indicators::BatteryLevel;
    use core::cell::Cell;
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::Mutex;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    #[test]
    fn test_post_drops_when_full() {
        let events: EventChannel<NoopRawMutex, 2> = EventChannel::new();
        let sender = EventSender::new(&events);

        assert!(sender.post(Event::StartReconnect));
        assert!(sender.post_stack(StackEvent::DiscoveryStopped));
        assert!(!sender.post(Event::StopReconnect));

        assert_eq!(events.try_receive(), Ok(Event::StartReconnect));
        assert_eq!(
            events.try_receive(),
            Ok(Event::Stack(StackEvent::DiscoveryStopped))
        );
        assert!(events.try_receive().is_err());
    }

    #[test]
    fn test_client_posts_in_order() {
        let events: EventChannel<NoopRawMutex, 4> = EventChannel::new();
        let status: StatusCell<NoopRawMutex> = Mutex::new(Cell::new(StatusSnapshot::INITIAL));
        let client = AgClient::new(&events, &status);

        block_on(async {
            client.start_reconnect().await;
            client.test_stimulus().await;
            client
                .set_indicator(IndicatorUpdate::Battery(BatteryLevel::new(2).unwrap()))
                .await;
            client.stop_reconnect().await;
        });

        assert_eq!(events.try_receive(), Ok(Event::StartReconnect));
        assert_eq!(events.try_receive(), Ok(Event::TestStimulus));
        assert!(matches!(
            events.try_receive(),
            Ok(Event::SetIndicator(IndicatorUpdate::Battery(_)))
        ));
        assert_eq!(events.try_receive(), Ok(Event::StopReconnect));
    }

    #[test]
    fn test_client_reads_published_status() {
        let events: EventChannel<NoopRawMutex, 1> = EventChannel::new();
        let status: StatusCell<NoopRawMutex> = Mutex::new(Cell::new(StatusSnapshot::INITIAL));
        let client = AgClient::new(&events, &status);

        let published = StatusSnapshot {
            attempt_count: 3,
            ..StatusSnapshot::INITIAL
        };
        status.lock(|cell| cell.set(published));
        assert_eq!(client.status().attempt_count, 3);

        // The sender shares the client's queue
        assert!(client.sender().post(Event::TestStimulus));
        assert_eq!(events.len(), 1);
    }
}
