//! Interpretation of lines typed at the console.

/// Console words that end the session.
pub const QUIT_COMMANDS: [&str; 2] = ["!quit", "!exit"];

/// What a typed line asks the client to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input<'a> {
    /// Leave the room and exit.
    Quit,
    /// Post the text to the room.
    Message(&'a str),
    /// Nothing to do (blank line, or spectating).
    Ignore,
}

impl<'a> Input<'a> {
    /// Classify one typed line. In spectate mode only quit commands act.
    #[must_use]
    pub fn parse(line: &'a str, spectate: bool) -> Self {
        let trimmed = line.trim();
        if QUIT_COMMANDS.contains(&trimmed) {
            Self::Quit
        } else if spectate || trimmed.is_empty() {
            Self::Ignore
        } else {
            Self::Message(line)
        }
    }
}
