//! Test doubles shared by the unit tests

use core::cell::RefCell;

use cyclo_hal::OutputPin;
use heapless::Vec;

use crate::sequencer::{SequenceTimer, Ticks};
use crate::state::{Event, EventSink};

/// Relay pin that records its level
#[derive(Default)]
pub struct MockPin {
    high: bool,
    pub writes: usize,
}

impl MockPin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputPin for MockPin {
    fn set_high(&mut self) {
        self.high = true;
        self.writes += 1;
    }

    fn set_low(&mut self) {
        self.high = false;
        self.writes += 1;
    }

    fn is_set_high(&self) -> bool {
        self.high
    }
}

/// Sink that keeps every published event
#[derive(Default)]
pub struct RecordingSink {
    events: RefCell<Vec<Event, 128>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything recorded so far
    pub fn take(&self) -> Vec<Event, 128> {
        core::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn count(&self, event: Event) -> usize {
        self.events.borrow().iter().filter(|&&e| e == event).count()
    }

    pub fn contains(&self, event: Event) -> bool {
        self.count(event) > 0
    }

    /// Remove and return the first recorded sequencer event
    pub fn pop_sequencer_event(&self) -> Option<Event> {
        let mut events = self.events.borrow_mut();
        let index = events.iter().position(Event::is_for_sequencer)?;
        Some(events.remove(index))
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: Event) {
        self.events.borrow_mut().push(event).ok();
    }
}

/// Timer driven by hand from the test
#[derive(Default)]
pub struct ManualTimer {
    armed: Option<(Ticks, u32)>,
    elapsed: Ticks,
    pub starts: usize,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Duration and epoch of the pending expiry
    pub fn armed(&self) -> Option<(Ticks, u32)> {
        self.armed
    }

    /// Let `ms` pass without expiring
    pub fn advance(&mut self, ms: Ticks) {
        self.elapsed = self.elapsed.saturating_add(ms);
    }

    /// Expire the timer, returning the event the hardware would post
    pub fn fire(&mut self) -> Option<Event> {
        let (_, epoch) = self.armed.take()?;
        self.elapsed = 0;
        Some(Event::SequenceNext { epoch })
    }
}

impl SequenceTimer for ManualTimer {
    fn start(&mut self, duration_ms: Ticks, epoch: u32) {
        self.armed = Some((duration_ms, epoch));
        self.elapsed = 0;
        self.starts += 1;
    }

    fn stop(&mut self) {
        self.armed = None;
        self.elapsed = 0;
    }

    fn remaining_ms(&self) -> Ticks {
        self.armed
            .map_or(0, |(duration, _)| duration.saturating_sub(self.elapsed))
    }
}
