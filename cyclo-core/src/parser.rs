//! Console line parser
//!
//! Turns a line of text into either a [`Program`] or an interactive
//! command. Tokens are separated by spaces or commas.
//!
//! ```text
//! c 1M o 5s *        close, wait 1 minute, open, wait 5 s, loop
//! o 1 500m c 1H 30M  delays accumulate onto the previous step
//! run 3 | r 3 | 3    run program 3
//! save 2 | delete 2  store/erase the last program in slot 2
//! auto 1             start program 1 at power-up
//! help | list | quit
//! ```
//!
//! Keywords match on any case-insensitive prefix, so `o`, `cl` and `OPEN`
//! are all accepted.

use heapless::String;

use crate::program::{
    Command, CommandKind, Program, MS_PER_HOUR, MS_PER_MINUTE, MS_PER_SECOND,
};

/// Maximum length of an error message, longer messages are truncated
pub const MAX_ERROR_LEN: usize = 48;

/// Delay forced between two contact changes when none was given
pub const MIN_STEP_DELAY_MS: u32 = 1_000;

/// Delay unit suffixes and their value in milliseconds
const UNITS: [(&str, u32); 5] = [
    ("H", MS_PER_HOUR),
    ("M", MS_PER_MINUTE),
    ("s", MS_PER_SECOND),
    ("m", 1),
    ("", MS_PER_SECOND),
];

/// Parse error with the character offset of the offending token
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ParseError {
    pub message: String<MAX_ERROR_LEN>,
    /// Offset in characters from the start of the line
    pub offset: usize,
}

/// Successful parse result
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parsed {
    /// Blank line
    Nothing,
    Program(Program),
    Help,
    List,
    Quit,
    Save(u8),
    Delete(u8),
    Run(u8),
    Autostart(u8),
}

/// Commands that take a program number argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotCommand {
    Save,
    Delete,
    Run,
    Autostart,
}

impl SlotCommand {
    fn with_slot(self, slot: u8) -> Parsed {
        match self {
            SlotCommand::Save => Parsed::Save(slot),
            SlotCommand::Delete => Parsed::Delete(slot),
            SlotCommand::Run => Parsed::Run(slot),
            SlotCommand::Autostart => Parsed::Autostart(slot),
        }
    }
}

/// What the next token may be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Anything,
    Nothing,
    Slot(SlotCommand),
}

/// Parse a console line
pub fn parse(line: &str) -> Result<Parsed, ParseError> {
    Parser::new(line).run()
}

/// Case-insensitive check that `token` is a prefix of `keyword`
fn is_prefix_of(token: &str, keyword: &str) -> bool {
    token.len() <= keyword.len()
        && keyword.as_bytes()[..token.len()].eq_ignore_ascii_case(token.as_bytes())
}

/// Concatenate `parts`, dropping whatever does not fit
fn message(parts: &[&str]) -> String<MAX_ERROR_LEN> {
    let mut msg = String::new();
    for c in parts.iter().flat_map(|part| part.chars()) {
        if msg.push(c).is_err() {
            break;
        }
    }
    msg
}

struct Parser<'a> {
    line: &'a str,
    program: Program,
    /// Bare single digit seen on the line, for the `3` => `run 3` shortcut
    candidate: Option<u8>,
    /// Offset of the token that created a leading delay step
    delay_offset: usize,
}

impl<'a> Parser<'a> {
    fn new(line: &'a str) -> Self {
        Self {
            line,
            program: Program::new(),
            candidate: None,
            delay_offset: 0,
        }
    }

    /// Character offset of `part`, which must be a sub-slice of the line
    fn offset_of(&self, part: &str) -> usize {
        let start = (part.as_ptr() as usize).saturating_sub(self.line.as_ptr() as usize);
        self.line
            .get(..start)
            .map_or(0, |before| before.chars().count())
    }

    fn error_at(&self, part: &str, parts: &[&str]) -> ParseError {
        ParseError {
            message: message(parts),
            offset: self.offset_of(part),
        }
    }

    fn unexpected(&self, token: &str) -> ParseError {
        self.error_at(token, &["Unexpected: '", token, "'"])
    }

    fn run(mut self) -> Result<Parsed, ParseError> {
        let mut result = None;
        let mut expect = Expect::Anything;
        let line = self.line;

        for token in line
            .split(|c| c == ' ' || c == ',')
            .filter(|t| !t.is_empty())
        {
            match expect {
                Expect::Nothing => {
                    return Err(self.error_at(token, &["Unexpected extra arg(s): '", token, "'"]));
                }
                Expect::Slot(command) => {
                    result = Some(command.with_slot(self.slot_number(token)?));
                    expect = Expect::Nothing;
                    continue;
                }
                Expect::Anything => {}
            }

            if let Some(delay) = self.delay(token)? {
                self.add_delay(delay, token)?;
                continue;
            }

            if is_prefix_of(token, "open") {
                self.insert(CommandKind::Open, token)?;
            } else if is_prefix_of(token, "close") {
                self.insert(CommandKind::Close, token)?;
            } else if token == "*" {
                self.insert(CommandKind::Loop, token)?;
            } else if !self.program.is_empty() {
                return Err(self.unexpected(token));
            } else {
                expect = if is_prefix_of(token, "help") {
                    result = Some(Parsed::Help);
                    Expect::Nothing
                } else if is_prefix_of(token, "list") {
                    result = Some(Parsed::List);
                    Expect::Nothing
                } else if is_prefix_of(token, "quit") {
                    result = Some(Parsed::Quit);
                    Expect::Nothing
                } else if is_prefix_of(token, "auto") {
                    Expect::Slot(SlotCommand::Autostart)
                } else if is_prefix_of(token, "save") {
                    Expect::Slot(SlotCommand::Save)
                } else if is_prefix_of(token, "run") {
                    Expect::Slot(SlotCommand::Run)
                } else if is_prefix_of(token, "delete") {
                    Expect::Slot(SlotCommand::Delete)
                } else {
                    return Err(self.unexpected(token));
                };
            }
        }

        if let Expect::Slot(_) = expect {
            return Err(self.error_at(&self.line[self.line.len()..], &["Expecting a program number"]));
        }

        if let Some(parsed) = result {
            return Ok(parsed);
        }

        let lone_delay = matches!(
            self.program.steps(),
            [only] if only.kind == CommandKind::Delay
        );

        if self.program.is_empty() {
            Ok(Parsed::Nothing)
        } else if !lone_delay {
            Ok(Parsed::Program(self.program))
        } else if let Some(slot) = self.candidate {
            Ok(Parsed::Run(slot))
        } else {
            Err(ParseError {
                message: message(&["A delay must be followed by 'open' or 'close'"]),
                offset: self.delay_offset,
            })
        }
    }

    /// Parse a delay token such as `5`, `250m` or `1H`
    ///
    /// Returns `Ok(None)` if the token does not start with a digit.
    fn delay(&mut self, token: &str) -> Result<Option<u32>, ParseError> {
        let digits = token.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            return Ok(None);
        }

        let (number, unit) = token.split_at(digits);
        let number: u32 = number
            .parse()
            .map_err(|_| self.error_at(token, &["Number too large: '", token, "'"]))?;

        if number < 10 && unit.is_empty() {
            self.candidate = Some(number as u8);
        }

        let scale = UNITS
            .iter()
            .find(|(suffix, _)| *suffix == unit)
            .map(|&(_, scale)| scale)
            .ok_or_else(|| self.error_at(unit, &["Invalid unit: '", unit, "'"]))?;

        number
            .checked_mul(scale)
            .map(Some)
            .ok_or_else(|| self.error_at(token, &["Delay too long: '", token, "'"]))
    }

    fn add_delay(&mut self, delay: u32, token: &str) -> Result<(), ParseError> {
        let offset = self.offset_of(token);
        if self.program.is_looped() {
            return Err(self.error_at(token, &["No commands allowed past *"]));
        }
        match self.program.last_mut() {
            Some(last) => {
                last.delay_ms = last.delay_ms.checked_add(delay).ok_or_else(|| ParseError {
                    message: message(&["Delay too long: '", token, "'"]),
                    offset,
                })?;
            }
            None => {
                self.delay_offset = offset;
                self.insert(CommandKind::Delay, token)?;
                if let Some(step) = self.program.last_mut() {
                    step.delay_ms = delay;
                }
            }
        }
        Ok(())
    }

    /// Append a step, enforcing capacity, loop placement and the minimum
    /// delay between contact changes
    fn insert(&mut self, kind: CommandKind, token: &str) -> Result<(), ParseError> {
        if self.program.is_full() {
            return Err(self.error_at(token, &["Too many items"]));
        }
        if self.program.is_looped() {
            return Err(self.error_at(token, &["No commands allowed past *"]));
        }
        if self.program.is_empty() && kind == CommandKind::Loop {
            return Err(self.error_at(token, &["Loop not allowed as first action"]));
        }

        if kind != CommandKind::Delay {
            if let Some(last) = self.program.last_mut() {
                if last.delay_ms == 0 {
                    last.delay_ms = MIN_STEP_DELAY_MS;
                }
            }
        }

        self.program
            .push(Command::new(kind, 0))
            .map_err(|_| self.error_at(token, &["Too many items"]))
    }

    fn slot_number(&self, token: &str) -> Result<u8, ParseError> {
        match token.as_bytes() {
            [digit @ b'0'..=b'9'] => Ok(digit - b'0'),
            _ => Err(self.error_at(token, &["Expecting a program number. Got '", token, "'"])),
        }
    }
}
