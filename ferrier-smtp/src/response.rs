use crate::error::{ClientError, Result};

/// A complete SMTP reply, possibly spanning several lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Three-digit reply code.
    pub code: u16,
    /// Text of each reply line, in order.
    pub lines: Vec<String>,
}

/// One parsed reply line: code, continuation marker, text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReplyLine {
    pub code: u16,
    pub is_last: bool,
    pub text: String,
}

impl Response {
    #[must_use]
    pub const fn new(code: u16, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// The reply text joined into a single string.
    #[must_use]
    pub fn message(&self) -> String {
        self.lines.join(" ")
    }

    /// 2xx reply.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code >= 200 && self.code < 300
    }

    /// 3xx reply, e.g. `354` after `DATA`.
    #[must_use]
    pub const fn is_intermediate(&self) -> bool {
        self.code >= 300 && self.code < 400
    }

    /// 4xx reply; the condition is transient and worth retrying.
    #[must_use]
    pub const fn is_transient_error(&self) -> bool {
        self.code >= 400 && self.code < 500
    }

    /// 5xx reply.
    #[must_use]
    pub const fn is_permanent_error(&self) -> bool {
        self.code >= 500 && self.code < 600
    }

    /// Parse one reply line, e.g. `250-PIPELINING` or `250 OK`.
    pub(crate) fn parse_line(line: &str) -> Result<ReplyLine> {
        let line = line.trim_end_matches(['\r', '\n']);

        if line.len() < 3 {
            return Err(ClientError::Parse(format!("reply line too short: {line:?}")));
        }

        // get() rather than indexing: a multi-byte character spanning the
        // code boundary must be a parse error, not a panic.
        let code = line
            .get(..3)
            .and_then(|digits| digits.parse::<u16>().ok())
            .ok_or_else(|| ClientError::Parse(format!("invalid reply code in {line:?}")))?;

        let (is_last, text) = match line.as_bytes().get(3) {
            None => (true, ""),
            Some(b' ') => (true, &line[4..]),
            Some(b'-') => (false, &line[4..]),
            Some(_) => {
                return Err(ClientError::Parse(format!(
                    "invalid continuation marker in {line:?}"
                )));
            }
        };

        Ok(ReplyLine {
            code,
            is_last,
            text: text.to_string(),
        })
    }
}
