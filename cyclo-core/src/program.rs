//! Program model
//!
//! A program is a short ordered list of relay steps. Every step carries the
//! time to wait after it has been executed. A trailing loop step restarts
//! the program from the first step.

use core::fmt;

use heapless::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum number of steps in a program
pub const MAX_STEPS: usize = 12;

/// Milliseconds per hour
pub const MS_PER_HOUR: u32 = 3_600_000;
/// Milliseconds per minute
pub const MS_PER_MINUTE: u32 = 60_000;
/// Milliseconds per second
pub const MS_PER_SECOND: u32 = 1_000;

/// What a step does to the contact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CommandKind {
    /// Open the contact
    Open,
    /// Close the contact
    Close,
    /// Leave the contact alone, only wait
    Delay,
    /// Restart from the first step
    Loop,
}

/// A single program step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Command {
    pub kind: CommandKind,
    /// Wait after executing this step, in milliseconds
    pub delay_ms: u32,
}

impl Command {
    pub const fn new(kind: CommandKind, delay_ms: u32) -> Self {
        Self { kind, delay_ms }
    }

    pub const fn open(delay_ms: u32) -> Self {
        Self::new(CommandKind::Open, delay_ms)
    }

    pub const fn close(delay_ms: u32) -> Self {
        Self::new(CommandKind::Close, delay_ms)
    }

    pub const fn delay(delay_ms: u32) -> Self {
        Self::new(CommandKind::Delay, delay_ms)
    }

    pub const fn looped() -> Self {
        Self::new(CommandKind::Loop, 0)
    }
}

/// An ordered list of steps with a playback cursor
///
/// Equality ignores the cursor.
#[derive(Debug, Clone, Default)]
pub struct Program {
    steps: Vec<Command, MAX_STEPS>,
    cursor: usize,
}

impl Program {
    /// Create an empty program
    pub const fn new() -> Self {
        Self {
            steps: Vec::new(),
            cursor: 0,
        }
    }

    /// Build a program from a list of steps
    ///
    /// Returns `None` if there are more than [`MAX_STEPS`] steps.
    pub fn from_steps(steps: &[Command]) -> Option<Self> {
        Some(Self {
            steps: Vec::from_slice(steps).ok()?,
            cursor: 0,
        })
    }

    /// Program run when nothing valid could be loaded: open for a
    /// minute, close for five seconds, forever
    pub fn fail_safe() -> Self {
        Self::from_steps(&[
            Command::open(MS_PER_MINUTE),
            Command::close(5 * MS_PER_SECOND),
            Command::looped(),
        ])
        .unwrap_or_default()
    }

    pub fn steps(&self) -> &[Command] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.steps.is_full()
    }

    /// Whether the program ends with a loop step
    pub fn is_looped(&self) -> bool {
        matches!(self.steps.last(), Some(c) if c.kind == CommandKind::Loop)
    }

    pub fn last(&self) -> Option<&Command> {
        self.steps.last()
    }

    pub(crate) fn last_mut(&mut self) -> Option<&mut Command> {
        self.steps.last_mut()
    }

    pub(crate) fn push(&mut self, command: Command) -> Result<(), Command> {
        self.steps.push(command)
    }

    pub fn clear(&mut self) {
        self.steps.clear();
        self.cursor = 0;
    }

    /// Rewind the cursor to the first step
    pub fn start(&mut self) {
        self.cursor = 0;
    }

    /// Return the step under the cursor and advance past it
    ///
    /// Returns `None` once the last step has been returned; the cursor never
    /// wraps on its own.
    pub fn iterate(&mut self) -> Option<Command> {
        let command = self.steps.get(self.cursor).copied()?;
        self.cursor += 1;
        Some(command)
    }

    /// Index of the next step [`iterate`](Self::iterate) will return
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

impl PartialEq for Program {
    fn eq(&self, other: &Self) -> bool {
        self.steps == other.steps
    }
}

impl Eq for Program {}

#[cfg(feature = "defmt")]
impl defmt::Format for Program {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Program({=[?]})", self.steps.as_slice())
    }
}

/// Write a delay using the largest unit that represents it exactly
fn write_delay(f: &mut fmt::Formatter<'_>, ms: u32) -> fmt::Result {
    match ms {
        0 => f.write_str("0s"),
        ms if ms % MS_PER_HOUR == 0 => write!(f, "{}H", ms / MS_PER_HOUR),
        ms if ms % MS_PER_MINUTE == 0 => write!(f, "{}M", ms / MS_PER_MINUTE),
        ms if ms % MS_PER_SECOND == 0 => write!(f, "{}s", ms / MS_PER_SECOND),
        ms => write!(f, "{}m", ms),
    }
}

/// Renders the program in the console language, e.g. `c 1M o 5s *`
impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match step.kind {
                CommandKind::Open | CommandKind::Close => {
                    f.write_str(if step.kind == CommandKind::Open { "o" } else { "c" })?;
                    if step.delay_ms > 0 {
                        f.write_str(" ")?;
                        write_delay(f, step.delay_ms)?;
                    }
                }
                CommandKind::Delay => write_delay(f, step.delay_ms)?,
                CommandKind::Loop => f.write_str("*")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::fmt::Write;
    use heapless::String;

    fn render(program: &Program) -> String<96> {
        let mut out = String::new();
        write!(out, "{}", program).unwrap();
        out
    }

    #[test]
    fn test_iterate_walks_steps_then_stops() {
        let mut program =
            Program::from_steps(&[Command::close(10), Command::open(20)]).unwrap();

        assert_eq!(program.iterate(), Some(Command::close(10)));
        assert_eq!(program.iterate(), Some(Command::open(20)));
        assert_eq!(program.iterate(), None);
        assert_eq!(program.iterate(), None);
        assert_eq!(program.cursor(), 2);
    }

    #[test]
    fn test_start_rewinds() {
        let mut program = Program::fail_safe();
        program.iterate();
        program.iterate();
        program.start();
        assert_eq!(program.iterate(), Some(Command::open(MS_PER_MINUTE)));
    }

    #[test]
    fn test_equality_ignores_cursor() {
        let a = Program::fail_safe();
        let mut b = Program::fail_safe();
        b.iterate();
        assert_eq!(a, b);
    }

    #[test]
    fn test_from_steps_rejects_too_many() {
        let steps = [Command::close(1); MAX_STEPS + 1];
        assert!(Program::from_steps(&steps).is_none());
        assert!(Program::from_steps(&steps[..MAX_STEPS]).unwrap().is_full());
    }

    #[test]
    fn test_fail_safe_shape() {
        let program = Program::fail_safe();
        assert_eq!(program.len(), 3);
        assert!(program.is_looped());
        assert_eq!(render(&program).as_str(), "o 1M c 5s *");
    }

    #[test]
    fn test_display_picks_exact_units() {
        let program = Program::from_steps(&[
            Command::delay(2 * MS_PER_HOUR),
            Command::close(90 * MS_PER_SECOND),
            Command::open(1500),
            Command::close(0),
        ])
        .unwrap();
        assert_eq!(render(&program).as_str(), "2H c 90s o 1500m c");
    }
}
