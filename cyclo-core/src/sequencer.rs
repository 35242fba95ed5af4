//! Program sequencer
//!
//! Plays the active program one step at a time. The sequencer never
//! waits: after each step it arms a one-shot timer, and the timer's expiry
//! comes back as an [`Event::SequenceNext`] message.
//!
//! Every arming is tagged with an epoch. Pausing bumps the epoch, so an
//! expiry that was already queued when the pause arrived carries a stale
//! epoch and is dropped instead of advancing the program twice.
//!
//! Pause and resume only act on a change of state: a second stop keeps the
//! time captured by the first, and a resume while running is ignored. A
//! resume with nothing left to play reports the program as stopped.
//!
//! A loop step does not recurse into the next step. It posts a
//! `SequenceNext` for the current epoch and returns, which keeps stack
//! usage flat no matter how many times the program loops.

use crate::contact::ContactState;
use crate::program::{CommandKind, Program};
use crate::state::Event;

/// Time in milliseconds
pub type Ticks = u32;

/// One-shot timer that posts [`Event::SequenceNext`] on expiry
pub trait SequenceTimer {
    /// Arm the timer, replacing any pending expiry
    ///
    /// On expiry the implementation must deliver
    /// `Event::SequenceNext { epoch }` to the sequencer.
    fn start(&mut self, duration_ms: Ticks, epoch: u32);

    /// Cancel the pending expiry, if any
    fn stop(&mut self);

    /// Time left before the pending expiry, 0 if none
    fn remaining_ms(&self) -> Ticks;
}

/// What the sequencer needs from the program manager
pub trait SequencerHost {
    /// Copy of the program to play
    fn active_program(&self) -> Program;

    fn counter(&self) -> Option<u32>;

    fn set_counter(&self, counter: Option<u32>);

    fn drive_contact(&self, state: ContactState);

    fn publish(&self, event: Event);
}

/// Playback state of the local program copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Playback {
    /// Nothing started, or the program ran off its end
    Idle,
    Running,
    Paused,
}

/// Epoch-guarded step player
pub struct Sequencer<'a, H, T> {
    host: &'a H,
    timer: T,
    epoch: u32,
    ticks_left: Ticks,
    playback: Playback,
    program: Program,
}

impl<'a, H: SequencerHost, T: SequenceTimer> Sequencer<'a, H, T> {
    pub fn new(host: &'a H, timer: T) -> Self {
        Self {
            host,
            timer,
            epoch: 0,
            ticks_left: 0,
            playback: Playback::Idle,
            program: Program::new(),
        }
    }

    /// Current timer epoch
    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Time that was left on the timer when playback was paused
    pub fn ticks_left(&self) -> Ticks {
        self.ticks_left
    }

    pub fn playback(&self) -> Playback {
        self.playback
    }

    /// The program being played
    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn host(&self) -> &'a H {
        self.host
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }

    /// Process one message
    ///
    /// Events other than the sequencer's own are ignored.
    pub fn handle(&mut self, event: Event) {
        match event {
            Event::StartProgram { from_start: true } => self.restart(),
            Event::StartProgram { from_start: false } => self.resume(),
            Event::StopProgram => self.pause(),
            Event::SequenceNext { epoch } if epoch == self.epoch => self.execute_next(),
            Event::SequenceNext { .. } => {}
            Event::CheckHealth => {}
            _ => {}
        }
    }

    fn restart(&mut self) {
        self.host.set_counter(Some(0));
        self.host.publish(Event::CounterUpdate);

        self.program = self.host.active_program();
        self.program.start();
        self.ticks_left = 0;
        self.playback = Playback::Running;

        self.execute_next();
    }

    fn resume(&mut self) {
        match self.playback {
            Playback::Running => return,
            Playback::Idle => {
                self.host.publish(Event::ProgramIsStopped);
                return;
            }
            Playback::Paused => self.playback = Playback::Running,
        }

        if self.ticks_left > 0 {
            self.timer.start(self.ticks_left, self.epoch);
            self.ticks_left = 0;
        } else {
            self.execute_next();
        }
    }

    fn pause(&mut self) {
        if self.playback != Playback::Running {
            return;
        }
        self.playback = Playback::Paused;

        self.ticks_left = self.timer.remaining_ms();
        self.epoch = self.epoch.wrapping_add(1);
        self.timer.stop();
    }

    fn execute_next(&mut self) {
        let Some(command) = self.program.iterate() else {
            self.playback = Playback::Idle;
            self.host.publish(Event::ProgramIsStopped);
            return;
        };

        match command.kind {
            CommandKind::Open => self.host.drive_contact(ContactState::Open),
            CommandKind::Close => self.host.drive_contact(ContactState::Close),
            CommandKind::Delay => {}
            CommandKind::Loop => {
                self.program.start();
                let counter = self.host.counter().unwrap_or(0).saturating_add(1);
                self.host.set_counter(Some(counter));
                self.host.publish(Event::CounterUpdate);
                self.host.publish(Event::SequenceNext { epoch: self.epoch });
                return;
            }
        }

        self.epoch = self.epoch.wrapping_add(1);
        self.timer.start(command.delay_ms, self.epoch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse, Parsed};
    use crate::state::ProgramState;
    use crate::store::{ProgramManager, STORE_SIZE};
    use crate::testing::{ManualTimer, MockPin, RecordingSink};
    use cyclo_hal::RamEeprom;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    type TestManager = ProgramManager<NoopRawMutex, RamEeprom<STORE_SIZE>, MockPin, RecordingSink>;

    fn manager() -> TestManager {
        ProgramManager::new(RamEeprom::new(), MockPin::new(), RecordingSink::new())
    }

    fn program(line: &str) -> Program {
        match parse(line) {
            Ok(Parsed::Program(p)) => p,
            other => panic!("bad program {:?}", other),
        }
    }

    /// Deliver queued sequencer events until none are left
    fn pump(sequencer: &mut Sequencer<'_, TestManager, ManualTimer>, host: &TestManager) {
        while let Some(event) = host.events().pop_sequencer_event() {
            sequencer.handle(event);
        }
    }

    /// Let the armed timer expire and process the result
    fn expire(sequencer: &mut Sequencer<'_, TestManager, ManualTimer>, host: &TestManager) {
        let event = sequencer.timer_mut().fire().expect("timer not armed");
        sequencer.handle(event);
        pump(sequencer, host);
    }

    #[test]
    fn test_start_executes_first_step() {
        let host = manager();
        let mut seq = Sequencer::new(&host, ManualTimer::new());

        host.load_program(&program("c 2s o 3s"));
        pump(&mut seq, &host);

        assert!(!host.contact_is_open());
        assert_eq!(host.counter(), Some(0));
        assert_eq!(seq.timer().armed(), Some((2_000, seq.epoch())));
        assert_eq!(host.state(), ProgramState::Running);
    }

    #[test]
    fn test_plays_to_the_end() {
        let host = manager();
        let mut seq = Sequencer::new(&host, ManualTimer::new());

        host.load_program(&program("c 2s o 3s"));
        pump(&mut seq, &host);

        expire(&mut seq, &host);
        assert!(host.contact_is_open());
        assert_eq!(seq.timer().armed(), Some((3_000, seq.epoch())));

        expire(&mut seq, &host);
        assert!(host.events().contains(Event::ProgramIsStopped));
        assert_eq!(host.state(), ProgramState::Stopped);
        assert_eq!(seq.timer().armed(), None);
    }

    #[test]
    fn test_loop_restarts_and_counts() {
        let host = manager();
        let mut seq = Sequencer::new(&host, ManualTimer::new());

        host.load_program(&program("c 1s o 1s *"));
        pump(&mut seq, &host);

        expire(&mut seq, &host); // open
        expire(&mut seq, &host); // loop, then close again
        assert_eq!(host.counter(), Some(1));
        assert!(!host.contact_is_open());
        assert_eq!(seq.program().cursor(), 1);

        expire(&mut seq, &host);
        expire(&mut seq, &host);
        assert_eq!(host.counter(), Some(2));
        assert_eq!(host.events().count(Event::CounterUpdate), 3);
    }

    #[test]
    fn test_stale_expiries_after_pause_are_ignored() {
        let host = manager();
        let mut seq = Sequencer::new(&host, ManualTimer::new());

        host.load_program(&program("o 5s c 5s"));
        pump(&mut seq, &host);
        let armed_epoch = seq.epoch();
        assert_eq!(seq.program().cursor(), 1);

        seq.timer_mut().advance(2_000);
        host.stop();
        pump(&mut seq, &host);
        assert_eq!(seq.ticks_left(), 3_000);
        assert_eq!(seq.timer().armed(), None);
        assert_eq!(host.state(), ProgramState::Paused);

        seq.handle(Event::SequenceNext { epoch: armed_epoch });
        seq.handle(Event::SequenceNext { epoch: armed_epoch });
        assert_eq!(seq.program().cursor(), 1);
        assert!(host.contact_is_open());

        host.resume();
        pump(&mut seq, &host);
        assert_eq!(seq.program().cursor(), 1);
        assert_eq!(seq.timer().armed(), Some((3_000, seq.epoch())));
        assert_eq!(host.state(), ProgramState::Running);

        expire(&mut seq, &host);
        assert_eq!(seq.program().cursor(), 2);
        assert!(!host.contact_is_open());
    }

    #[test]
    fn test_resume_without_remaining_time_advances() {
        let host = manager();
        let mut seq = Sequencer::new(&host, ManualTimer::new());

        host.load_program(&program("o 5s c 5s"));
        pump(&mut seq, &host);

        seq.timer_mut().advance(5_000);
        host.stop();
        pump(&mut seq, &host);
        assert_eq!(seq.ticks_left(), 0);

        host.resume();
        pump(&mut seq, &host);
        assert_eq!(seq.program().cursor(), 2);
        assert!(!host.contact_is_open());
    }

    #[test]
    fn test_second_stop_keeps_remaining_time() {
        let host = manager();
        let mut seq = Sequencer::new(&host, ManualTimer::new());

        host.load_program(&program("o 5s c 5s"));
        pump(&mut seq, &host);

        seq.timer_mut().advance(1_000);
        host.stop();
        host.stop();
        pump(&mut seq, &host);
        assert_eq!(seq.playback(), Playback::Paused);
        assert_eq!(seq.ticks_left(), 4_000);

        host.resume();
        pump(&mut seq, &host);
        assert_eq!(seq.program().cursor(), 1);
        assert!(host.contact_is_open());
        assert_eq!(seq.timer().armed(), Some((4_000, seq.epoch())));
    }

    #[test]
    fn test_resume_while_running_is_ignored() {
        let host = manager();
        let mut seq = Sequencer::new(&host, ManualTimer::new());

        host.load_program(&program("o 5s c 5s"));
        pump(&mut seq, &host);
        let armed = seq.timer().armed();

        host.resume();
        pump(&mut seq, &host);
        assert_eq!(seq.program().cursor(), 1);
        assert!(host.contact_is_open());
        assert_eq!(seq.timer().armed(), armed);
        assert_eq!(seq.timer().starts, 1);
    }

    #[test]
    fn test_resume_after_the_end_stays_stopped() {
        let host = manager();
        let mut seq = Sequencer::new(&host, ManualTimer::new());

        host.load_program(&program("o"));
        pump(&mut seq, &host);
        expire(&mut seq, &host);
        assert_eq!(seq.playback(), Playback::Idle);

        host.stop();
        host.resume();
        pump(&mut seq, &host);
        assert_eq!(host.state(), ProgramState::Stopped);
        assert_eq!(host.events().count(Event::ProgramIsStopped), 2);
        assert_eq!(seq.timer().armed(), None);
    }

    #[test]
    fn test_delay_step_only_waits() {
        let host = manager();
        let mut seq = Sequencer::new(&host, ManualTimer::new());
        let open = host.contact_is_open();

        host.load_program(&program("5s o 2s c"));
        pump(&mut seq, &host);
        assert_eq!(seq.program().cursor(), 1);
        assert_eq!(seq.timer().armed(), Some((5_000, seq.epoch())));
        assert_eq!(host.relay_writes(), 0);
        assert_eq!(host.contact_is_open(), open);
        assert!(!host.events().contains(Event::ContactUpdate));

        expire(&mut seq, &host);
        assert_eq!(seq.timer().armed(), Some((2_000, seq.epoch())));
        assert_eq!(host.relay_writes(), 1);
        assert!(host.contact_is_open());
        assert_eq!(host.events().count(Event::ContactUpdate), 1);
    }

    #[test]
    fn test_zero_delay_still_arms_timer() {
        let host = manager();
        let mut seq = Sequencer::new(&host, ManualTimer::new());

        host.load_program(&program("o"));
        pump(&mut seq, &host);
        assert_eq!(seq.timer().armed(), Some((0, seq.epoch())));

        expire(&mut seq, &host);
        assert!(host.events().contains(Event::ProgramIsStopped));
    }

    #[test]
    fn test_empty_program_stops_immediately() {
        let host = manager();
        let mut seq = Sequencer::new(&host, ManualTimer::new());

        seq.handle(Event::StartProgram { from_start: true });
        assert!(host.events().contains(Event::ProgramIsStopped));
        assert_eq!(seq.timer().starts, 0);
    }

    #[test]
    fn test_restart_takes_fresh_copy() {
        let host = manager();
        let mut seq = Sequencer::new(&host, ManualTimer::new());

        host.load_program(&program("o 5s c 5s"));
        pump(&mut seq, &host);
        expire(&mut seq, &host);

        host.load_program(&program("c 1M o 1M *"));
        pump(&mut seq, &host);
        assert_eq!(seq.program(), &program("c 1M o 1M *"));
        assert_eq!(seq.program().cursor(), 1);
        assert_eq!(host.counter(), Some(0));
    }

    #[test]
    fn test_health_check_is_a_no_op() {
        let host = manager();
        let mut seq = Sequencer::new(&host, ManualTimer::new());
        let epoch = seq.epoch();

        seq.handle(Event::CheckHealth);
        seq.handle(Event::ContactUpdate);
        assert_eq!(seq.epoch(), epoch);
        assert!(host.events().take().is_empty());
    }
}
