//! Embassy async tasks
//!
//! Each task runs independently and communicates via channels/signals.

pub mod console;
pub mod health;
pub mod nonc;
pub mod sequencer;
pub mod timer;
pub mod ui;

pub use console::console_task;
pub use health::health_task;
pub use nonc::{nonc_sampler_task, wiring_task};
pub use sequencer::sequencer_task;
pub use timer::timer_task;
pub use ui::ui_task;
