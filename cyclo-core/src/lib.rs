//! Board-agnostic program engine for the relay cycler firmware
//!
//! This crate contains all application logic that does not depend on
//! specific hardware implementations:
//!
//! - Program model and the text parser that produces it
//! - Contact (relay with NO/NC polarity)
//! - CRC-protected program store and its manager
//! - Epoch-guarded sequencer
//! - Console command processing
//! - Board configuration

#![no_std]
#![deny(unsafe_code)]

pub mod config;
pub mod console;
pub mod contact;
pub mod manual;
pub mod parser;
pub mod program;
pub mod sequencer;
pub mod state;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use state::{Event, EventSink, ProgramState};
