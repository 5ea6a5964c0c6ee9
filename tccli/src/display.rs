//! Rendering of inbound lines for the terminal.

use chrono::{Local, NaiveTime};

use tccli_proto::message::ChatLine;

/// Timestamp format used when timestamps are enabled.
const TIMESTAMP_FORMAT: &str = "%H:%M:%S";

/// Turns raw application lines into `nick: text` output.
#[derive(Debug, Clone)]
pub struct LineFormatter {
    room: String,
    timestamps: bool,
}

impl LineFormatter {
    /// Formatter for lines posted to `room`.
    pub fn new(room: impl Into<String>, timestamps: bool) -> Self {
        Self {
            room: room.into(),
            timestamps,
        }
    }

    /// Render `raw` using the local wall clock for the timestamp.
    #[must_use]
    pub fn render(&self, raw: &str) -> String {
        self.render_at(raw, Local::now().time())
    }

    /// Render `raw` as if received at `now`.
    ///
    /// Room chat lines become `nick: text`; anything else is shown as is.
    #[must_use]
    pub fn render_at(&self, raw: &str, now: NaiveTime) -> String {
        let body = ChatLine::parse(raw, &self.room).map_or_else(
            || raw.to_owned(),
            |line| format!("{}: {}", line.sender, line.text),
        );
        if self.timestamps {
            format!("[{}] {body}", now.format(TIMESTAMP_FORMAT))
        } else {
            body
        }
    }
}
