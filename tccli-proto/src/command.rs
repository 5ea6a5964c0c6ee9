//! Outbound protocol commands.
//!
//! Every command the client ever writes is a [`Command`] value; its
//! [`Display`](std::fmt::Display) form is the wire text without the
//! terminator and [`Command::encode`] appends `\r\n`.

use std::fmt;

/// A client-to-server command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// `PASS <credential>` — first handshake command.
    Pass(&'a str),
    /// `NICK <user>`.
    Nick(&'a str),
    /// `USER <user> <host> : <user>`.
    User {
        /// Account name, used for both the user and real-name fields.
        user: &'a str,
        /// Host the client connected to.
        host: &'a str,
    },
    /// `JOIN <room>`.
    Join(&'a str),
    /// `PART <room>`.
    Part(&'a str),
    /// `PRIVMSG <target> :<text>`.
    Privmsg {
        /// Room the message is addressed to.
        target: &'a str,
        /// User-authored text.
        text: &'a str,
    },
    /// `PONG <payload>` — reply to a keep-alive probe.
    Pong(&'a str),
}

impl Command<'_> {
    /// Wire bytes for this command, terminated by `\r\n`.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        format!("{self}\r\n").into_bytes()
    }
}

impl fmt::Display for Command<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass(credential) => write!(f, "PASS {credential}"),
            Self::Nick(user) => write!(f, "NICK {user}"),
            Self::User { user, host } => write!(f, "USER {user} {host} : {user}"),
            Self::Join(room) => write!(f, "JOIN {room}"),
            Self::Part(room) => write!(f, "PART {room}"),
            Self::Privmsg { target, text } => {
                // An embedded CR or LF would end the line early and let the
                // remainder be parsed as a separate command.
                write!(f, "PRIVMSG {target} :")?;
                for c in text.chars() {
                    let c = if matches!(c, '\r' | '\n') { ' ' } else { c };
                    write!(f, "{c}")?;
                }
                Ok(())
            }
            Self::Pong(payload) if payload.is_empty() => write!(f, "PONG"),
            Self::Pong(payload) => write!(f, "PONG {payload}"),
        }
    }
}
