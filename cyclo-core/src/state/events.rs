//! Engine events and the sink they are published to

/// Events exchanged between the engine's workers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    // Contact events
    /// The derived open/closed state of the contact changed
    ContactUpdate,
    /// The NO/NC wiring of the contact changed
    NoNcUpdate,

    // Sequencer events
    /// The loop counter changed
    CounterUpdate,
    /// Start the active program, from the first step or from where it paused
    StartProgram { from_start: bool },
    /// Pause the active program
    StopProgram,
    /// The active program ran out of steps
    ProgramIsStopped,
    /// A step delay elapsed; ignored unless `epoch` is the current one
    SequenceNext { epoch: u32 },
    /// Liveness probe
    CheckHealth,

    // Console events
    /// A program was typed on the console, it now owns the relay
    UsbConnected,
    /// The console released the relay
    UsbDisconnected,
}

impl Event {
    /// Events consumed by the sequencer worker
    pub fn is_for_sequencer(&self) -> bool {
        matches!(
            self,
            Event::StartProgram { .. }
                | Event::StopProgram
                | Event::SequenceNext { .. }
                | Event::CheckHealth
        )
    }

    /// Events consumed by the user interface worker
    pub fn is_for_ui(&self) -> bool {
        matches!(
            self,
            Event::ContactUpdate
                | Event::NoNcUpdate
                | Event::CounterUpdate
                | Event::ProgramIsStopped
                | Event::UsbConnected
                | Event::UsbDisconnected
        )
    }
}

/// Destination for published events
///
/// Implementations must not block; the firmware routes each event into
/// the bounded queue of the worker that consumes it.
pub trait EventSink {
    fn publish(&self, event: Event);
}

impl<T: EventSink + ?Sized> EventSink for &T {
    fn publish(&self, event: Event) {
        T::publish(self, event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_event_has_a_consumer() {
        let events = [
            Event::ContactUpdate,
            Event::NoNcUpdate,
            Event::CounterUpdate,
            Event::StartProgram { from_start: true },
            Event::StopProgram,
            Event::ProgramIsStopped,
            Event::SequenceNext { epoch: 7 },
            Event::CheckHealth,
            Event::UsbConnected,
            Event::UsbDisconnected,
        ];

        for event in events {
            assert!(
                event.is_for_sequencer() != event.is_for_ui(),
                "{:?} must go to exactly one worker",
                event
            );
        }
    }

    #[test]
    fn test_sequencer_events() {
        assert!(Event::SequenceNext { epoch: 0 }.is_for_sequencer());
        assert!(Event::StartProgram { from_start: false }.is_for_sequencer());
        assert!(!Event::ProgramIsStopped.is_for_sequencer());
    }
}
