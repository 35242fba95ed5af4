//! Console command processing
//!
//! Runs one line typed on the serial console against the program manager
//! and writes the reply. Line editing and the transport are the caller's
//! business; this module only sees complete lines and a
//! [`core::fmt::Write`] sink.
//!
//! Typing a program puts the device in USB mode: the console owns the relay
//! until `quit`, which also stops the program it was playing.

use core::fmt::{self, Write};

use cyclo_hal::{ByteStore, OutputPin};
use embassy_sync::blocking_mutex::raw::RawMutex;
use heapless::String;

use crate::parser::{parse, ParseError, Parsed};
use crate::state::{Event, EventSink};
use crate::store::{ProgramManager, MANUAL_SLOT, TEXT_LEN};

/// Longest line the console accepts
pub const MAX_LINE_LEN: usize = 80;

/// Prompt printed before each line
pub const PROMPT: &str = "> ";

/// Greeting printed when a terminal first connects
pub const BANNER: &str = "# Welcome to Cyclo! Type 'help' for help.\r\n";

const HELP: &str = "\
# Programs are a list of steps, separated by spaces or commas:\r\n\
#   o[pen] [delay]     open the contact, then wait\r\n\
#   c[lose] [delay]    close the contact, then wait\r\n\
#   *                  restart from the first step (last step only)\r\n\
# Delays are <n>[H|M|s|m] (hours, minutes, seconds, ms), default s.\r\n\
# Example: c 1M o 5s *\r\n\
# Commands:\r\n\
#   r[un] <n>          run program n (or just type n)\r\n\
#   s[ave] <n>         save the last program typed in slot n (1-9)\r\n\
#   d[elete] <n>       delete program n (1-9)\r\n\
#   a[uto] <n>         run program n at power-up\r\n\
#   l[ist]             list the stored programs\r\n\
#   q[uit]             hand the relay back to the front panel\r\n\
#   h[elp]             this text\r\n";

/// Console session state
pub struct Console {
    /// Text of the last program typed, kept verbatim for `save`
    last_program: String<MAX_LINE_LEN>,
    usb_mode: bool,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    pub const fn new() -> Self {
        Self {
            last_program: String::new(),
            usb_mode: false,
        }
    }

    /// Whether the console currently owns the relay
    pub fn usb_mode(&self) -> bool {
        self.usb_mode
    }

    /// Text that `save` would store
    pub fn last_program(&self) -> &str {
        &self.last_program
    }

    /// Process one line
    pub fn process<M, S, P, E, W>(
        &mut self,
        line: &str,
        manager: &ProgramManager<M, S, P, E>,
        out: &mut W,
    ) -> fmt::Result
    where
        M: RawMutex,
        S: ByteStore,
        P: OutputPin,
        E: EventSink,
        W: Write,
    {
        let parsed = match parse(line) {
            Ok(parsed) => parsed,
            Err(error) => return show_error(out, &error),
        };

        match parsed {
            Parsed::Nothing => Ok(()),
            Parsed::Program(program) => {
                if !self.usb_mode {
                    self.usb_mode = true;
                    manager.publish(Event::UsbConnected);
                }
                manager.load_program(&program);

                self.last_program.clear();
                if self.last_program.push_str(line.trim()).is_err() {
                    return print_error(out, "Program too long to save");
                }
                Ok(())
            }
            Parsed::Help => out.write_str(HELP),
            Parsed::List => {
                manager.scan();
                show_list(manager, out)
            }
            Parsed::Quit => {
                if self.usb_mode {
                    manager.stop();
                }
                self.usb_mode = false;
                manager.publish(Event::UsbDisconnected);
                Ok(())
            }
            Parsed::Delete(MANUAL_SLOT) => print_error(out, "Program 0 cannot be deleted"),
            Parsed::Delete(slot) => match manager.erase(slot) {
                Ok(()) => Ok(()),
                Err(_) => print_error(out, "Storage error"),
            },
            Parsed::Run(slot) => {
                if !manager.is_occupied(slot) {
                    return no_such_program(out, slot);
                }
                manager.load(slot);
                manager.set_selected(Some(slot));
                match manager.set_lastused(Some(slot)) {
                    Ok(()) => Ok(()),
                    Err(_) => print_error(out, "Storage error"),
                }
            }
            Parsed::Save(MANUAL_SLOT) => print_error(out, "Program 0 is set from the front panel"),
            Parsed::Save(slot) => {
                if self.last_program.is_empty() {
                    return print_error(out, "No valid program to save");
                }
                if self.last_program.len() > TEXT_LEN {
                    return print_error(out, "Program too long to save");
                }
                match manager.write_pgm_at(slot, &self.last_program) {
                    Ok(()) => Ok(()),
                    Err(_) => print_error(out, "Storage error"),
                }
            }
            Parsed::Autostart(slot) => {
                if !manager.is_occupied(slot) {
                    return no_such_program(out, slot);
                }
                match manager.set_autostart(Some(slot)) {
                    Ok(()) => Ok(()),
                    Err(_) => print_error(out, "Storage error"),
                }
            }
        }
    }
}

/// Caret under the offending character, then the message
///
/// The caret lines up with the input when the prompt is [`PROMPT`].
fn show_error(out: &mut impl Write, error: &ParseError) -> fmt::Result {
    out.write_char('#')?;
    for _ in 0..=error.offset {
        out.write_char(' ')?;
    }
    out.write_str("^\r\n")?;
    print_error(out, &error.message)
}

fn print_error(out: &mut impl Write, message: &str) -> fmt::Result {
    write!(out, "# {}\r\n", message)
}

fn no_such_program(out: &mut impl Write, slot: u8) -> fmt::Result {
    write!(out, "# Program {} does not exist\r\n", slot)
}

/// One line per stored program, flagged `A` for autostart and `L` for
/// last used
fn show_list<M, S, P, E>(manager: &ProgramManager<M, S, P, E>, out: &mut impl Write) -> fmt::Result
where
    M: RawMutex,
    S: ByteStore,
    P: OutputPin,
    E: EventSink,
{
    let auto_start = manager.auto_start();
    let last_used = manager.last_used();

    for slot in manager.occupancy().iter() {
        let text = manager.program_text(slot).unwrap_or_default();
        write!(
            out,
            "  {}:{}{}  {}\r\n",
            slot,
            if auto_start == Some(slot) { 'A' } else { ' ' },
            if last_used == Some(slot) { 'L' } else { ' ' },
            text
        )?;
    }
    Ok(())
}
