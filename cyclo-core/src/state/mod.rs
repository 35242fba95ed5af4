//! Program state and the events that drive it
//!
//! Every event published by the engine passes through
//! [`ProgramState::transition`] before it is handed to subscribers, so the
//! state shown to the user always reflects the last event seen.

pub mod events;
pub mod machine;

pub use events::{Event, EventSink};
pub use machine::ProgramState;
