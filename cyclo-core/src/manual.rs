//! Manual program
//!
//! Slot 0 holds a program the front panel edits as four numbers: how long
//! the contact stays closed ("on") and how long it stays open ("off"), each
//! in minutes and seconds. It is stored as ordinary program text so the
//! console can list and run it like any other slot.

use core::fmt::Write;

use cyclo_hal::{ByteStore, OutputPin, StoreError};
use embassy_sync::blocking_mutex::raw::RawMutex;
use heapless::String;

use crate::program::{CommandKind, Program, MS_PER_SECOND};
use crate::state::EventSink;
use crate::store::{ProgramManager, MANUAL_SLOT, TEXT_LEN};

/// Largest minute value the panel can enter
pub const MAX_MINUTES: u8 = 99;
/// Largest second value the panel can enter
pub const MAX_SECONDS: u8 = 59;

/// One of the four editable numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ManualField {
    OnMinutes,
    OnSeconds,
    OffMinutes,
    OffSeconds,
}

impl ManualField {
    /// Editing order on the panel
    pub fn next(self) -> Option<Self> {
        match self {
            ManualField::OnMinutes => Some(ManualField::OnSeconds),
            ManualField::OnSeconds => Some(ManualField::OffMinutes),
            ManualField::OffMinutes => Some(ManualField::OffSeconds),
            ManualField::OffSeconds => None,
        }
    }

    fn max(self) -> u8 {
        match self {
            ManualField::OnMinutes | ManualField::OffMinutes => MAX_MINUTES,
            ManualField::OnSeconds | ManualField::OffSeconds => MAX_SECONDS,
        }
    }
}

/// On/off times of the manual program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ManualProgram {
    pub on_min: u8,
    pub on_sec: u8,
    pub off_min: u8,
    pub off_sec: u8,
}

impl Default for ManualProgram {
    /// Closed for a minute, open for five seconds
    fn default() -> Self {
        Self {
            on_min: 1,
            on_sec: 0,
            off_min: 0,
            off_sec: 5,
        }
    }
}

/// Split milliseconds into whole minutes and seconds, dropping the rest
fn to_min_sec(ms: u32) -> (u8, u8) {
    let seconds = ms / MS_PER_SECOND;
    let minutes = (seconds / 60).min(MAX_MINUTES as u32) as u8;
    (minutes, (seconds % 60) as u8)
}

impl ManualProgram {
    /// Extract on/off times from a close-then-open program
    pub fn from_program(program: &Program) -> Option<Self> {
        match program.steps() {
            [close, open, ..]
                if close.kind == CommandKind::Close && open.kind == CommandKind::Open =>
            {
                let (on_min, on_sec) = to_min_sec(close.delay_ms);
                let (off_min, off_sec) = to_min_sec(open.delay_ms);
                Some(Self {
                    on_min,
                    on_sec,
                    off_min,
                    off_sec,
                })
            }
            _ => None,
        }
    }

    /// Read the manual program from slot 0, or the default if it does not
    /// have the expected shape
    pub fn load<M, S, P, E>(manager: &ProgramManager<M, S, P, E>) -> Self
    where
        M: RawMutex,
        S: ByteStore,
        P: OutputPin,
        E: EventSink,
    {
        manager
            .program_text(MANUAL_SLOT)
            .and_then(|text| match crate::parser::parse(&text) {
                Ok(crate::parser::Parsed::Program(program)) => Self::from_program(&program),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn get(&self, field: ManualField) -> u8 {
        match field {
            ManualField::OnMinutes => self.on_min,
            ManualField::OnSeconds => self.on_sec,
            ManualField::OffMinutes => self.off_min,
            ManualField::OffSeconds => self.off_sec,
        }
    }

    fn field_mut(&mut self, field: ManualField) -> &mut u8 {
        match field {
            ManualField::OnMinutes => &mut self.on_min,
            ManualField::OnSeconds => &mut self.on_sec,
            ManualField::OffMinutes => &mut self.off_min,
            ManualField::OffSeconds => &mut self.off_sec,
        }
    }

    /// Increase a field, stopping at its maximum
    pub fn increment(&mut self, field: ManualField) {
        let value = self.field_mut(field);
        if *value < field.max() {
            *value += 1;
        }
    }

    /// Decrease a field, stopping at zero
    pub fn decrement(&mut self, field: ManualField) {
        let value = self.field_mut(field);
        *value = value.saturating_sub(1);
    }

    /// Program text, e.g. `c 01M 00s o 00M 05s *`
    pub fn to_text(&self) -> String<TEXT_LEN> {
        let mut text = String::new();
        // 21 characters at most, always fits
        let _ = write!(
            text,
            "c {:02}M {:02}s o {:02}M {:02}s *",
            self.on_min, self.on_sec, self.off_min, self.off_sec
        );
        text
    }

    /// Write to slot 0 and start it
    pub fn store<M, S, P, E>(&self, manager: &ProgramManager<M, S, P, E>) -> Result<(), StoreError>
    where
        M: RawMutex,
        S: ByteStore,
        P: OutputPin,
        E: EventSink,
    {
        manager.write_pgm_at(MANUAL_SLOT, &self.to_text())?;
        manager.load(MANUAL_SLOT);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::Command;
    use crate::store::STORE_SIZE;
    use crate::testing::{MockPin, RecordingSink};
    use cyclo_hal::RamEeprom;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    type TestManager = ProgramManager<NoopRawMutex, RamEeprom<STORE_SIZE>, MockPin, RecordingSink>;

    fn manager() -> TestManager {
        ProgramManager::new(RamEeprom::new(), MockPin::new(), RecordingSink::new())
    }

    #[test]
    fn test_default_matches_stored_default() {
        let m = manager();
        assert_eq!(ManualProgram::load(&m), ManualProgram::default());
    }

    #[test]
    fn test_text_format() {
        let manual = ManualProgram {
            on_min: 2,
            on_sec: 30,
            off_min: 0,
            off_sec: 7,
        };
        assert_eq!(manual.to_text().as_str(), "c 02M 30s o 00M 07s *");
    }

    #[test]
    fn test_store_and_reload() {
        let m = manager();
        let manual = ManualProgram {
            on_min: 10,
            on_sec: 5,
            off_min: 1,
            off_sec: 0,
        };
        manual.store(&m).unwrap();

        assert_eq!(
            m.active_program().steps(),
            &[Command::close(605_000), Command::open(60_000), Command::looped()]
        );
        assert_eq!(ManualProgram::load(&m), manual);
    }

    #[test]
    fn test_from_program_drops_milliseconds() {
        let program = Program::from_steps(&[Command::close(61_999), Command::open(500)]).unwrap();
        let manual = ManualProgram::from_program(&program).unwrap();
        assert_eq!((manual.on_min, manual.on_sec), (1, 1));
        assert_eq!((manual.off_min, manual.off_sec), (0, 0));
    }

    #[test]
    fn test_unexpected_shape() {
        assert!(ManualProgram::from_program(&Program::fail_safe()).is_none());

        let m = manager();
        m.write_pgm_at(MANUAL_SLOT, "o 1 c 1 *").unwrap();
        assert_eq!(ManualProgram::load(&m), ManualProgram::default());
    }

    #[test]
    fn test_field_limits() {
        let mut manual = ManualProgram {
            on_min: MAX_MINUTES,
            on_sec: MAX_SECONDS,
            off_min: 0,
            off_sec: 0,
        };
        manual.increment(ManualField::OnMinutes);
        manual.increment(ManualField::OnSeconds);
        manual.decrement(ManualField::OffMinutes);
        assert_eq!(manual.get(ManualField::OnMinutes), MAX_MINUTES);
        assert_eq!(manual.get(ManualField::OnSeconds), MAX_SECONDS);
        assert_eq!(manual.get(ManualField::OffMinutes), 0);

        manual.increment(ManualField::OffSeconds);
        assert_eq!(manual.off_sec, 1);
    }

    #[test]
    fn test_field_order() {
        let mut field = ManualField::OnMinutes;
        let mut visited = 1;
        while let Some(next) = field.next() {
            field = next;
            visited += 1;
        }
        assert_eq!(visited, 4);
        assert_eq!(field, ManualField::OffSeconds);
    }
}
