//! Sequencer step timer
//!
//! [`EmbassyTimer`] is the sequencer's handle: it records the deadline and
//! forwards start/stop requests to [`timer_task`], which waits for the
//! deadline and posts `SequenceNext` back to the sequencer.

use defmt::*;
use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Instant, Timer};

use cyclo_core::sequencer::{SequenceTimer, Ticks};
use cyclo_core::Event;

use crate::channels::{TimerCommand, SEQUENCER_CHANNEL, TIMER_CMD};

/// Sequencer side of the step timer
pub struct EmbassyTimer {
    deadline: Option<Instant>,
}

impl EmbassyTimer {
    pub const fn new() -> Self {
        Self { deadline: None }
    }
}

impl SequenceTimer for EmbassyTimer {
    fn start(&mut self, duration_ms: Ticks, epoch: u32) {
        let deadline = Instant::now() + Duration::from_millis(duration_ms as u64);
        self.deadline = Some(deadline);
        TIMER_CMD.signal(TimerCommand::Start { deadline, epoch });
    }

    fn stop(&mut self) {
        self.deadline = None;
        TIMER_CMD.signal(TimerCommand::Stop);
    }

    fn remaining_ms(&self) -> Ticks {
        match self.deadline {
            Some(deadline) => deadline
                .checked_duration_since(Instant::now())
                .map(|left| left.as_millis().min(Ticks::MAX as u64) as Ticks)
                .unwrap_or(0),
            None => 0,
        }
    }
}

/// Timer task - one pending expiry at a time, the latest command wins
#[embassy_executor::task]
pub async fn timer_task() {
    info!("Timer task started");

    let mut pending: Option<(Instant, u32)> = None;

    loop {
        let command = match pending {
            None => TIMER_CMD.wait().await,
            Some((deadline, epoch)) => match select(Timer::at(deadline), TIMER_CMD.wait()).await {
                Either::First(()) => {
                    trace!("Step timer expired, epoch {}", epoch);
                    pending = None;
                    SEQUENCER_CHANNEL.send(Event::SequenceNext { epoch }).await;
                    continue;
                }
                Either::Second(command) => command,
            },
        };

        pending = match command {
            TimerCommand::Start { deadline, epoch } => Some((deadline, epoch)),
            TimerCommand::Stop => None,
        };
    }
}
