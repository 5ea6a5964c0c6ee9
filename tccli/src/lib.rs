//! `tccli` — terminal client for Twitch-style IRC chat rooms over TLS.

pub mod config;
pub mod console;
pub mod display;
pub mod session;
pub mod transport;
