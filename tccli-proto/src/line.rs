//! Classification of inbound protocol lines.
//!
//! The session only hands application chat lines to its handlers. Keep-alive
//! probes are answered, and server notices and echoes of the client's own
//! traffic are dropped. Matching is plain string comparison against the
//! server name and the lowercased account name.

/// Server identity used by Twitch chat for its own notices.
pub const DEFAULT_SERVER_NAME: &str = "tmi.twitch.tv";

/// Prefix that marks a keep-alive probe.
pub const KEEP_ALIVE_PREFIX: &str = "PING";

/// What the session should do with an inbound line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    /// Bare terminator with no content.
    Empty,
    /// Keep-alive probe; reply with `PONG <payload>`.
    KeepAlive {
        /// Text following `PING`, leading spaces removed.
        payload: &'a str,
    },
    /// Notice from the server itself.
    Housekeeping,
    /// The server echoing the connected user's own traffic.
    SelfEcho,
    /// Anything else: forwarded to handlers.
    Application,
}

/// Per-connection line classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineFilter {
    server_token: String,
    user_server_token: String,
    self_prefix: String,
}

impl LineFilter {
    /// Build the filter for `user` connected to a server named `server_name`.
    #[must_use]
    pub fn new(user: &str, server_name: &str) -> Self {
        let user = user.to_lowercase();
        Self {
            server_token: format!(":{server_name}"),
            user_server_token: format!(":{user}.{server_name}"),
            self_prefix: format!(":{user}"),
        }
    }

    /// Classify one line (terminator already removed).
    #[must_use]
    pub fn classify<'a>(&self, line: &'a str) -> LineKind<'a> {
        if line.is_empty() {
            return LineKind::Empty;
        }
        if let Some(rest) = line.strip_prefix(KEEP_ALIVE_PREFIX) {
            return LineKind::KeepAlive {
                payload: rest.trim_start_matches(' '),
            };
        }

        let first_token = line.split_whitespace().next().unwrap_or_default();
        if first_token == self.server_token || first_token == self.user_server_token {
            return LineKind::Housekeeping;
        }

        let sender = line.split('!').next().unwrap_or_default();
        if sender == self.self_prefix {
            return LineKind::SelfEcho;
        }

        LineKind::Application
    }
}
