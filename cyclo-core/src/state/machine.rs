//! Program state machine

use super::events::Event;

/// What the active program is doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProgramState {
    /// Nothing playing
    #[default]
    Stopped,
    /// Playback suspended, can be resumed
    Paused,
    /// Playback in progress
    Running,
    /// The console owns the relay
    UsbControlled,
}

impl ProgramState {
    /// Check if a program is loaded and not finished
    pub fn is_active(&self) -> bool {
        matches!(self, ProgramState::Running | ProgramState::Paused)
    }

    /// Process an event and return the next state
    pub fn transition(self, event: Event) -> Self {
        use Event::*;
        use ProgramState::*;

        match (self, event) {
            // The console takes over from any state
            (_, UsbConnected) => UsbControlled,
            (UsbControlled, UsbDisconnected) => Stopped,
            (UsbControlled, _) => UsbControlled,

            (Stopped | Paused | Running, StartProgram { .. }) => Running,
            (Running, StopProgram) => Paused,
            (Running | Paused, ProgramIsStopped) => Stopped,

            // All other combinations: no transition
            (state, _) => state,
        }
    }
}
