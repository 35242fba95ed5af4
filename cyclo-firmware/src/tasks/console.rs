//! Serial console task
//!
//! Collects characters from the UART into lines, echoing as it goes, and
//! hands each complete line to the [`Console`].

use defmt::*;
use embassy_rp::uart::{BufferedUartRx, BufferedUartTx};
use embedded_io_async::{Read, Write};
use heapless::String;

use cyclo_core::console::{Console, BANNER, MAX_LINE_LEN, PROMPT};

use crate::Manager;

/// Buffer size for UART receive
const RX_BUF_SIZE: usize = 32;

/// Room for the longest reply (help text or a full program list)
const REPLY_LEN: usize = 1024;

const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7F;

/// What a received byte did to the line being edited
enum Edit {
    /// Echo these bytes
    Echo(&'static [u8]),
    /// Echo the byte itself
    EchoByte(u8),
    /// The line is complete
    Submit,
    /// Nothing to echo
    Ignore,
}

/// Minimal line editor: printable ASCII, backspace, CR/LF
struct LineEditor {
    line: String<MAX_LINE_LEN>,
    after_cr: bool,
}

impl LineEditor {
    const fn new() -> Self {
        Self {
            line: String::new(),
            after_cr: false,
        }
    }

    fn feed(&mut self, byte: u8) -> Edit {
        let after_cr = core::mem::replace(&mut self.after_cr, byte == b'\r');
        match byte {
            // CR LF ends one line, not two
            b'\n' if after_cr => Edit::Ignore,
            b'\r' | b'\n' => Edit::Submit,
            BACKSPACE | DELETE => {
                if self.line.pop().is_some() {
                    Edit::Echo(b"\x08 \x08")
                } else {
                    Edit::Ignore
                }
            }
            0x20..=0x7E => {
                if self.line.push(byte as char).is_ok() {
                    Edit::EchoByte(byte)
                } else {
                    Edit::Echo(b"\x07")
                }
            }
            _ => Edit::Ignore,
        }
    }
}

/// Console task - line editing and command processing
#[embassy_executor::task]
pub async fn console_task(
    manager: &'static Manager,
    mut rx: BufferedUartRx,
    mut tx: BufferedUartTx,
    banner: bool,
) {
    info!("Console task started");

    let mut console = Console::new();
    let mut editor = LineEditor::new();
    let mut buf = [0u8; RX_BUF_SIZE];

    if banner {
        send(&mut tx, BANNER.as_bytes()).await;
    }
    send(&mut tx, PROMPT.as_bytes()).await;

    loop {
        let n = match rx.read(&mut buf).await {
            Ok(n) => n,
            Err(e) => {
                warn!("UART read error: {:?}", e);
                continue;
            }
        };

        for &byte in &buf[..n] {
            match editor.feed(byte) {
                Edit::Echo(bytes) => send(&mut tx, bytes).await,
                Edit::EchoByte(byte) => send(&mut tx, &[byte]).await,
                Edit::Ignore => {}
                Edit::Submit => {
                    send(&mut tx, b"\r\n").await;

                    let mut reply: String<REPLY_LEN> = String::new();
                    debug!("Console: {}", editor.line.as_str());
                    if console.process(&editor.line, manager, &mut reply).is_err() {
                        warn!("Console reply truncated");
                    }
                    editor.line.clear();

                    send(&mut tx, reply.as_bytes()).await;
                    send(&mut tx, PROMPT.as_bytes()).await;
                }
            }
        }
    }
}

async fn send(tx: &mut BufferedUartTx, bytes: &[u8]) {
    if let Err(e) = tx.write_all(bytes).await {
        warn!("UART write error: {:?}", e);
    }
}
