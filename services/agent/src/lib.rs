//! Console agent library crate.
//!
//! Configuration, terminal presentation, audio recording and the client
//! tools used by the `agent` binary, which is a thin wrapper around this
//! library.

pub mod audio;
pub mod config;
pub mod console;
pub mod tools;
