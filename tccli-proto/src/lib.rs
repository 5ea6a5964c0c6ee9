//! Protocol definitions for the `tccli` line-oriented chat wire format.
//!
//! Everything here is synchronous and free of I/O: the client crate feeds
//! bytes in and writes the encoded commands out.

pub mod command;
pub mod framer;
pub mod line;
pub mod message;
