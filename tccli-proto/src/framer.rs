//! Line framing for the `\r\n`-delimited chat protocol.
//!
//! The transport hands over arbitrary byte chunks; [`LineFramer`] collects
//! them and yields complete protocol lines. Text decoding happens once a line
//! is complete, so neither the terminator nor a multi-byte character can be
//! broken by the position of a chunk boundary.

/// Two-byte terminator that ends every protocol line.
pub const LINE_TERMINATOR: &[u8; 2] = b"\r\n";

/// Default upper bound on a single buffered line (bytes, terminator excluded).
pub const DEFAULT_MAX_LINE_LEN: usize = 64 * 1024;

/// Errors produced while splitting the byte stream into lines.
///
/// Both variants mean the peer is not speaking the protocol; callers are
/// expected to tear the session down rather than resynchronize.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FramingError {
    /// A complete line was not valid UTF-8.
    #[error("line is not valid UTF-8 (valid up to byte {valid_up_to})")]
    InvalidUtf8 {
        /// Length of the longest valid UTF-8 prefix of the line.
        valid_up_to: usize,
    },

    /// More than the allowed number of bytes arrived without a terminator.
    #[error("line exceeds {max} bytes")]
    LineTooLong {
        /// The configured limit.
        max: usize,
    },
}

/// Accumulates raw bytes and splits them into protocol lines.
///
/// # Example
///
/// ```
/// use tccli_proto::framer::LineFramer;
///
/// let mut framer = LineFramer::new();
/// framer.feed(b"PING :tmi.example\r");
/// assert_eq!(framer.next_line().unwrap(), None);
/// framer.feed(b"\n");
/// assert_eq!(framer.next_line().unwrap().as_deref(), Some("PING :tmi.example"));
/// ```
#[derive(Debug, Clone)]
pub struct LineFramer {
    buf: Vec<u8>,
    /// Bytes at the front of `buf` already known not to start a terminator.
    scanned: usize,
    max_line_len: usize,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineFramer {
    /// Create an empty framer with [`DEFAULT_MAX_LINE_LEN`].
    #[must_use]
    pub const fn new() -> Self {
        Self::with_max_line_len(DEFAULT_MAX_LINE_LEN)
    }

    /// Create an empty framer that rejects lines longer than `max_line_len`.
    #[must_use]
    pub const fn with_max_line_len(max_line_len: usize) -> Self {
        Self {
            buf: Vec::new(),
            scanned: 0,
            max_line_len,
        }
    }

    /// Append freshly received bytes.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of bytes buffered but not yet returned as part of a line.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Take the next complete line out of the buffer.
    ///
    /// Returns `Ok(None)` when no terminator has arrived yet; the caller
    /// should read more bytes and [`feed`](Self::feed) them.
    ///
    /// # Errors
    ///
    /// - [`FramingError::InvalidUtf8`] if the completed line is not UTF-8.
    /// - [`FramingError::LineTooLong`] if a line (complete or pending) is
    ///   longer than the configured limit.
    pub fn next_line(&mut self) -> Result<Option<String>, FramingError> {
        let Some(end) = self.find_terminator() else {
            self.scanned = self.buf.len().saturating_sub(1);
            // A trailing `\r` may be the first half of the terminator.
            let pending = self.buf.len() - usize::from(self.buf.ends_with(b"\r"));
            if pending > self.max_line_len {
                return Err(FramingError::LineTooLong {
                    max: self.max_line_len,
                });
            }
            return Ok(None);
        };

        if end > self.max_line_len {
            return Err(FramingError::LineTooLong {
                max: self.max_line_len,
            });
        }

        let mut line: Vec<u8> = self.buf.drain(..end + LINE_TERMINATOR.len()).collect();
        line.truncate(end);
        self.scanned = 0;

        String::from_utf8(line)
            .map(Some)
            .map_err(|e| FramingError::InvalidUtf8 {
                valid_up_to: e.utf8_error().valid_up_to(),
            })
    }

    fn find_terminator(&self) -> Option<usize> {
        self.buf[self.scanned..]
            .windows(LINE_TERMINATOR.len())
            .position(|w| w == LINE_TERMINATOR)
            .map(|pos| pos + self.scanned)
    }
}
