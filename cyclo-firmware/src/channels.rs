//! Inter-task communication channels
//!
//! Defines the static channels used for communication between Embassy tasks
//! and the [`ChannelRouter`] that feeds them from the program engine.

use defmt::*;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embassy_time::Instant;

use cyclo_core::{Event, EventSink};

/// Channel capacity for sequencer messages
const SEQUENCER_CHANNEL_SIZE: usize = 32;

/// Channel capacity for UI notifications
const UI_CHANNEL_SIZE: usize = 16;

/// Start/stop/step messages for the sequencer task
pub static SEQUENCER_CHANNEL: Channel<CriticalSectionRawMutex, Event, SEQUENCER_CHANNEL_SIZE> =
    Channel::new();

/// Contact, counter and console notifications for the UI task
pub static UI_CHANNEL: Channel<CriticalSectionRawMutex, Event, UI_CHANNEL_SIZE> = Channel::new();

/// One-shot timer control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCommand {
    /// Post `SequenceNext { epoch }` at `deadline`
    Start { deadline: Instant, epoch: u32 },
    /// Cancel the pending expiry
    Stop,
}

/// Timer command signal (updated by the sequencer)
pub static TIMER_CMD: Signal<CriticalSectionRawMutex, TimerCommand> = Signal::new();

/// Wiring reported by the NO/NC sampler, true for normally-open
pub static WIRING: Signal<CriticalSectionRawMutex, bool> = Signal::new();

/// Routes each engine event to the queue of the task that consumes it
///
/// Never blocks: an event that does not fit is dropped with a warning.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelRouter;

impl EventSink for ChannelRouter {
    fn publish(&self, event: Event) {
        if event.is_for_sequencer() && SEQUENCER_CHANNEL.try_send(event).is_err() {
            warn!("Sequencer channel full, dropping {:?}", event);
        }
        if event.is_for_ui() && UI_CHANNEL.try_send(event).is_err() {
            warn!("UI channel full, dropping {:?}", event);
        }
    }
}
