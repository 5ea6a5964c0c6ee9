//! Extraction of sender and text from room chat lines for display.

/// Borrowed view of a room chat line such as
/// `:alice!alice@alice.tmi.twitch.tv PRIVMSG #room :hi`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatLine<'a> {
    /// Nickname of the sender (between the leading `:` and the first `!`).
    pub sender: &'a str,
    /// Message text (after `<room> :`).
    pub text: &'a str,
}

impl<'a> ChatLine<'a> {
    /// Parse `raw` as a chat line addressed to `room`.
    ///
    /// Returns `None` when the line has no `:nick!` prefix or does not carry
    /// text for `room`.
    #[must_use]
    pub fn parse(raw: &'a str, room: &str) -> Option<Self> {
        let (prefix, rest) = raw.strip_prefix(':')?.split_once(' ')?;
        let (sender, _) = prefix.split_once('!')?;
        let needle = format!("{room} :");
        let start = rest.find(&needle)? + needle.len();
        Some(Self {
            sender,
            text: &rest[start..],
        })
    }
}
