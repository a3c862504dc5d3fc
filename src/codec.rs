//! The parenthesized wire protocol: incremental parsing of inbound bytes
//! and construction of outbound messages.
//!
//! Inbound grammar (each line is one complete top-level form):
//! ```text
//! (cjoin(<name>))
//! (cchat(<recipients>)(<message>))
//! (cstat)
//! ```
//! Outbound grammar:
//! ```text
//! (sjoin(<name>)(<namelist>)(<minplayers>,<lobbytime>,<timeout>))
//! (sstat(<triple>,<triple>,...))
//! (schat(<sender>)(<text>))
//! (snovac)
//! (strike(<n>)(<reason>))
//! ```

/// Inclusive byte cap on a single top-level form, outer parens included.
pub const MAX_MSG: usize = 480;
/// Chat text is truncated to this many bytes before transmission.
pub const CHAT_SIZE: usize = 80;
/// Bytes read from the socket per wakeup (mirrors the original `BUFSIZE`).
pub const READ_BUF: usize = 610;

/// A fully parsed inbound message. The `cchat(SERVER)(...)` sub-grammar used
/// to drive the game engine is *not* decoded here — the engine owns that,
/// since its shape depends on which phase is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Join { name: String },
    Chat { recipients: String, text: String },
    Stat,
}

/// Result of attempting to parse exactly one top-level form from the front
/// of a residual byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// A complete, well-formed message; `consumed` bytes should be drained
    /// from the front of the buffer.
    Message { message: ClientMessage, consumed: usize },
    /// The buffer does not yet hold a complete form; wait for more bytes.
    NeedMore,
    /// The buffer's prefix cannot be extended into a valid form.
    Malformed,
    /// A top-level form would exceed [`MAX_MSG`] bytes before completing.
    TooLong,
}

/// Attempt to parse a single top-level form from the start of `buf`.
///
/// Callers drive a loop: on [`ParseOutcome::Message`] drain `consumed` bytes
/// and call again; on [`ParseOutcome::Malformed`] or [`ParseOutcome::TooLong`]
/// hand off to the strike manager (which puts the connection into resync)
/// and stop calling until resync has located the next `(c`; on
/// [`ParseOutcome::NeedMore`] stop and wait for more bytes to arrive.
pub fn parse_one(buf: &[u8]) -> ParseOutcome {
    match buf.first() {
        None => return ParseOutcome::NeedMore,
        Some(b'(') => {}
        Some(_) => return ParseOutcome::Malformed,
    }
    match buf.get(1) {
        None => return ParseOutcome::NeedMore,
        Some(b'c') => {}
        Some(_) => return ParseOutcome::Malformed,
    }
    match buf.get(2) {
        None => ParseOutcome::NeedMore,
        Some(b'c') => parse_chat(buf),
        Some(b'j') => parse_join(buf),
        Some(b's') => parse_stat(buf),
        Some(_) => ParseOutcome::Malformed,
    }
}

/// Matches a literal byte sequence starting at `start`. `None` on mismatch,
/// `Some(None)` if the buffer ran out mid-match (need more bytes), `Some(Some(end))`
/// on a full match, where `end` is the index just past the literal.
fn match_literal(buf: &[u8], start: usize, literal: &[u8]) -> LiteralMatch {
    for (k, &want) in literal.iter().enumerate() {
        match buf.get(start + k) {
            None => return LiteralMatch::NeedMore,
            Some(&got) if got == want => continue,
            Some(_) => return LiteralMatch::Mismatch,
        }
    }
    LiteralMatch::Matched(start + literal.len())
}

enum LiteralMatch {
    Matched(usize),
    NeedMore,
    Mismatch,
}

/// Scans forward from `start` for the first byte in `stop_at`, bounding the
/// *cumulative* position (from the start of the top-level form at index 0)
/// at [`MAX_MSG`].
fn scan_until(buf: &[u8], start: usize, stop_at: &[u8]) -> ScanResult {
    let mut i = start;
    loop {
        if i >= MAX_MSG {
            return ScanResult::TooLong;
        }
        match buf.get(i) {
            None => return ScanResult::NeedMore,
            Some(b) if stop_at.contains(b) => return ScanResult::Found(i),
            Some(_) => i += 1,
        }
    }
}

enum ScanResult {
    Found(usize),
    NeedMore,
    TooLong,
}

fn parse_join(buf: &[u8]) -> ParseOutcome {
    let after_kw = match match_literal(buf, 2, b"join(") {
        LiteralMatch::Matched(end) => end,
        LiteralMatch::NeedMore => return ParseOutcome::NeedMore,
        LiteralMatch::Mismatch => return ParseOutcome::Malformed,
    };
    let name_end = match scan_until(buf, after_kw, b")") {
        ScanResult::Found(idx) => idx,
        ScanResult::NeedMore => return ParseOutcome::NeedMore,
        ScanResult::TooLong => return ParseOutcome::TooLong,
    };
    // name_end points at the ')' closing the name field; one more ')' must
    // follow immediately to close the outer form.
    match buf.get(name_end + 1) {
        None => ParseOutcome::NeedMore,
        Some(b')') => {
            let name = String::from_utf8_lossy(&buf[after_kw..name_end]).into_owned();
            ParseOutcome::Message { message: ClientMessage::Join { name }, consumed: name_end + 2 }
        }
        Some(_) => ParseOutcome::Malformed,
    }
}

fn parse_stat(buf: &[u8]) -> ParseOutcome {
    match match_literal(buf, 2, b"stat)") {
        LiteralMatch::Matched(end) => {
            ParseOutcome::Message { message: ClientMessage::Stat, consumed: end }
        }
        LiteralMatch::NeedMore => ParseOutcome::NeedMore,
        LiteralMatch::Mismatch => ParseOutcome::Malformed,
    }
}

fn parse_chat(buf: &[u8]) -> ParseOutcome {
    let after_kw = match match_literal(buf, 2, b"chat(") {
        LiteralMatch::Matched(end) => end,
        LiteralMatch::NeedMore => return ParseOutcome::NeedMore,
        LiteralMatch::Mismatch => return ParseOutcome::Malformed,
    };
    let recipients_end = match scan_until(buf, after_kw, b")") {
        ScanResult::Found(idx) => idx,
        ScanResult::NeedMore => return ParseOutcome::NeedMore,
        ScanResult::TooLong => return ParseOutcome::TooLong,
    };
    let after_recipients = match buf.get(recipients_end + 1) {
        None => return ParseOutcome::NeedMore,
        Some(b'(') => recipients_end + 2,
        Some(_) => return ParseOutcome::Malformed,
    };
    let message_end = match scan_until(buf, after_recipients, b")") {
        ScanResult::Found(idx) => idx,
        ScanResult::NeedMore => return ParseOutcome::NeedMore,
        ScanResult::TooLong => return ParseOutcome::TooLong,
    };
    match buf.get(message_end + 1) {
        None => ParseOutcome::NeedMore,
        Some(b')') => {
            let recipients = String::from_utf8_lossy(&buf[after_kw..recipients_end]).into_owned();
            let text = String::from_utf8_lossy(&buf[after_recipients..message_end]).into_owned();
            ParseOutcome::Message {
                message: ClientMessage::Chat { recipients, text },
                consumed: message_end + 2,
            }
        }
        Some(_) => ParseOutcome::Malformed,
    }
}

/// Scans `residual` for the next `(c` sequence and drops everything before
/// it, returning `true` if one was found (resync complete) and `false` if
/// the whole buffer was consumed without a match (stay in resync, wait for
/// more bytes).
pub fn resync(residual: &mut Vec<u8>) -> bool {
    let pos = residual.windows(2).position(|w| w == b"(c");
    match pos {
        Some(idx) => {
            residual.drain(0..idx);
            true
        }
        None => {
            residual.clear();
            false
        }
    }
}

/// Truncates chat text to [`CHAT_SIZE`] bytes and strips `(` characters, as
/// the original server does before broadcasting a `cchat` payload.
pub fn sanitize_chat_text(raw: &str) -> String {
    let truncated: &str = match raw.char_indices().nth(CHAT_SIZE) {
        Some((byte_idx, _)) => &raw[..byte_idx],
        None => raw,
    };
    truncated.chars().filter(|&c| c != '(').collect()
}

/// Drops any byte outside the printable-ASCII range, per the ingress filter.
pub fn filter_printable(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().copied().filter(|&b| (0x20..=0x7e).contains(&b)).collect()
}

// ---- Outbound message builders -------------------------------------------

pub fn sjoin(name: &str, namelist: &str, min_players: u32, lobby_time: u32, timeout: u32) -> Vec<u8> {
    format!("(sjoin({name})({namelist})({min_players},{lobby_time},{timeout}))").into_bytes()
}

pub fn sstat(triples: &str) -> Vec<u8> {
    format!("(sstat({triples}))").into_bytes()
}

pub fn schat(sender: &str, text: &str) -> Vec<u8> {
    format!("(schat({sender})({text}))").into_bytes()
}

pub fn snovac() -> Vec<u8> {
    b"(snovac)".to_vec()
}

pub fn strike_message(n: u32, reason: &str) -> Vec<u8> {
    format!("(strike({n})({reason}))").into_bytes()
}
