//! Processor - the single worker applying events to the [`AgHost`]
//!
//! Stack callbacks, the application and the console post [`Event`]s into an
//! [`EventChannel`]. The processor owns the host and the stack handle, waits for
//! either the next event or the earliest timer deadline, applies the event and
//! executes the resulting [`Action`]s. After every event the status snapshot is
//! published into a [`StatusCell`] readable from any context.
//!
//! # Usage
//!
//! ```rust,ignore
//! use callbird::constants::EVENT_QUEUE_DEPTH;
//! use callbird::processor::{self, EventChannel, StatusCell, UptimeClock};
//! use callbird::store::PairedDeviceStore;
//! use callbird::{AgHost, AgOptions, StatusSnapshot};
//! use embassy_sync::blocking_mutex::{Mutex, raw::CriticalSectionRawMutex};
//! use core::cell::Cell;
//!
//! static EVENTS: EventChannel<CriticalSectionRawMutex, EVENT_QUEUE_DEPTH> = EventChannel::new();
//! static STATUS: StatusCell<CriticalSectionRawMutex> =
//!     Mutex::new(Cell::new(StatusSnapshot::INITIAL));
//!
//! #[embassy_executor::task]
//! async fn gateway(stack: &'static mut BoardStack, storage: BoardStorage) -> ! {
//!     let host = AgHost::new(AgOptions::default(), PairedDeviceStore::open(storage));
//!     processor::run(host, stack, &UptimeClock, &EVENTS, &STATUS).await
//! }
//! ```
//!
//! # Timers
//!
//! Timers are deadlines held by the processor, one slot per [`TimerId`]. Arming
//! a timer replaces its pending deadline, cancelling clears it. A fired timer is
//! delivered as [`Event::TimerFired`] like any other event.

use core::cell::Cell;

use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Instant, Timer};
use heapless::Deque;

use crate::constants::MAX_ACTIONS;
use crate::event::{Action, Event, TimerId};
use crate::stack::AgStack;
use crate::store::DeviceStorage;
use crate::{AgHost, Clock, StatusSnapshot, Timestamp};

/// Bounded queue of events feeding the processor
pub type EventChannel<M, const N: usize> = Channel<M, Event, N>;

/// Published status snapshot
pub type StatusCell<M> = Mutex<M, Cell<StatusSnapshot>>;

/// [`Clock`] counting seconds since boot
///
/// Use it on boards without a wall clock; reconnect ordering then only holds
/// within one power cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct UptimeClock;

impl Clock for UptimeClock {
    fn now_secs(&self) -> Timestamp {
        Instant::now().as_secs()
    }
}

/// Timer deadlines, one slot per [`TimerId`]
#[derive(Debug, Clone, Default)]
pub struct Deadlines {
    slots: [Option<Instant>; TimerId::ALL.len()],
}

impl Deadlines {
    /// No timer armed
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: [None; TimerId::ALL.len()],
        }
    }

    /// Arm `timer` to fire at `deadline`, replacing a pending deadline
    pub fn arm(&mut self, timer: TimerId, deadline: Instant) {
        self.slots[timer.slot()] = Some(deadline);
    }

    /// Disarm `timer`
    pub fn cancel(&mut self, timer: TimerId) {
        self.slots[timer.slot()] = None;
    }

    /// Pending deadline of `timer`
    #[must_use]
    pub fn deadline(&self, timer: TimerId) -> Option<Instant> {
        self.slots[timer.slot()]
    }

    /// The timer due first and its deadline
    ///
    /// Equal deadlines fire in slot order.
    #[must_use]
    pub fn earliest(&self) -> Option<(TimerId, Instant)> {
        TimerId::ALL
            .iter()
            .filter_map(|timer| self.deadline(*timer).map(|at| (*timer, at)))
            .fold(None, |earliest, (timer, at)| match earliest {
                Some((_, best)) if best <= at => earliest,
                _ => Some((timer, at)),
            })
    }
}

/// Apply `event` and execute the resulting actions
///
/// Commands refused by the stack are fed back as [`Event::CommandRejected`]
/// before this returns. Timer deadlines are computed from `now`.
pub fn dispatch<S: DeviceStorage, St: AgStack>(
    host: &mut AgHost<S>,
    stack: &mut St,
    timers: &mut Deadlines,
    event: Event,
    now: Instant,
    timestamp: Timestamp,
) {
    let mut pending: Deque<Event, MAX_ACTIONS> = Deque::new();
    let mut next = Some(event);

    while let Some(event) = next {
        trace!("[PROCESSOR] Event: {:?}", event);
        for action in host.process_event(event, timestamp) {
            match action {
                Action::Stack(command) => {
                    debug!("[PROCESSOR] Stack command: {:?}", command);
                    if let Err(error) = command.execute(stack) {
                        let rejected = Event::CommandRejected { command, error };
                        if let Err(event) = pending.push_back(rejected) {
                            error!("[PROCESSOR] Dropping follow-up event {:?}", event);
                        }
                    }
                }
                Action::ArmTimer(timer, after) => {
                    let deadline = now.checked_add(after).unwrap_or(Instant::MAX);
                    debug!(
                        "[PROCESSOR] Arming {} timer for {} ms",
                        timer.as_str(),
                        after.as_millis()
                    );
                    timers.arm(timer, deadline);
                }
                Action::CancelTimer(timer) => timers.cancel(timer),
            }
        }
        next = pending.pop_front();
    }
}

/// Run the processor loop
///
/// Applies [`Event::Boot`] first, then serves `events` and the timers forever.
pub async fn run<M, S, St, C, const N: usize>(
    mut host: AgHost<S>,
    stack: &mut St,
    clock: &C,
    events: &EventChannel<M, N>,
    status: &StatusCell<M>,
) -> !
where
    M: RawMutex,
    S: DeviceStorage,
    St: AgStack,
    C: Clock,
{
    let receiver = events.receiver();
    let mut timers = Deadlines::new();

    info!("[PROCESSOR] Audio gateway processor started");
    dispatch(
        &mut host,
        stack,
        &mut timers,
        Event::Boot,
        Instant::now(),
        clock.now_secs(),
    );
    status.lock(|cell| cell.set(host.snapshot()));

    loop {
        let event = match timers.earliest() {
            Some((timer, deadline)) => {
                match select(receiver.receive(), Timer::at(deadline)).await {
                    Either::First(event) => event,
                    Either::Second(()) => {
                        timers.cancel(timer);
                        Event::TimerFired(timer)
                    }
                }
            }
            None => receiver.receive().await,
        };

        dispatch(
            &mut host,
            stack,
            &mut timers,
            event,
            Instant::now(),
            clock.now_secs(),
        );
        status.lock(|cell| cell.set(host.snapshot()));
    }
}
