//! mbox reading and writing.
//!
//! Reading goes through `mail-parser`'s mbox iterator. Writing produces the
//! classic `mboxo` layout that `git am` consumes: a `From ` separator line,
//! the message with body lines starting `From ` escaped as `>From `, and a
//! blank line.

use std::io::{self, Cursor, Write};

use chrono::DateTime;
use mail_builder::encoders::quoted_printable::quoted_printable_encode;
use mail_parser::mailbox::mbox::MessageIterator;
use tracing::warn;

use super::MailMessage;
use crate::error::MailError;

/// Separator text used when a message carries no envelope of its own.
pub const DEFAULT_ENVELOPE: &str = "MAILER-DAEMON Thu Jan  1 00:00:00 1970";

/// Splits an mbox stream into parsed messages.
///
/// Entries that are not parseable as messages are skipped with a warning.
pub fn split(bytes: &[u8]) -> Result<Vec<MailMessage>, MailError> {
    let mut messages = Vec::new();
    for (index, entry) in MessageIterator::new(Cursor::new(bytes)).enumerate() {
        let entry = entry.map_err(|_| MailError::Parse(format!("malformed mbox entry {index}")))?;
        let envelope = envelope_line(entry.from(), entry.internal_date());
        match MailMessage::parse(entry.unwrap_contents(), Some(envelope)) {
            Ok(message) => messages.push(message),
            Err(e) => warn!(index, error = %e, "Skipping unparseable mbox entry"),
        }
    }
    Ok(messages)
}

fn envelope_line(sender: &str, timestamp: u64) -> String {
    let sender = match sender.trim() {
        "" => "MAILER-DAEMON",
        sender => sender,
    };
    let date = i64::try_from(timestamp)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_default();
    format!("{sender} {}", date.format("%a %b %e %H:%M:%S %Y"))
}

/// Writes messages in mbox format.
#[derive(Debug)]
pub struct MboxWriter<W: Write> {
    out: W,
}

impl<W: Write> MboxWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Appends one message. `envelope` is the separator text after `From `.
    pub fn write_message(&mut self, envelope: Option<&str>, contents: &[u8]) -> io::Result<()> {
        writeln!(self.out, "From {}", envelope.unwrap_or(DEFAULT_ENVELOPE))?;
        for line in contents.split_inclusive(|&b| b == b'\n') {
            if line.starts_with(b"From ") {
                self.out.write_all(b">")?;
            }
            self.out.write_all(line)?;
        }
        if !contents.is_empty() && !contents.ends_with(b"\n") {
            writeln!(self.out)?;
        }
        writeln!(self.out)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Re-encodes a single-part text message as UTF-8 quoted-printable.
///
/// Content headers are replaced; all other headers keep their order.
/// Multipart messages and messages without a plain-text body are returned
/// unchanged.
pub fn recode_quoted_printable(message: &MailMessage) -> io::Result<Vec<u8>> {
    if message.is_multipart() || message.body().is_empty() {
        return Ok(message.raw().to_vec());
    }

    let mut out = Vec::with_capacity(message.raw().len());
    let mut has_mime_version = false;
    let mut dropping = false;
    for line in header_block(message.raw()).split_inclusive(|&b| b == b'\n') {
        let continuation = matches!(line.first(), Some(b' ' | b'\t'));
        if !continuation {
            let name = header_name(line);
            dropping = name.eq_ignore_ascii_case(b"content-type")
                || name.eq_ignore_ascii_case(b"content-transfer-encoding");
            has_mime_version |= name.eq_ignore_ascii_case(b"mime-version");
        }
        if !dropping {
            out.extend_from_slice(trim_line_end(line));
            out.push(b'\n');
        }
    }
    if !has_mime_version {
        out.extend_from_slice(b"MIME-Version: 1.0\n");
    }
    out.extend_from_slice(b"Content-Type: text/plain; charset=\"utf-8\"\n");
    out.extend_from_slice(b"Content-Transfer-Encoding: quoted-printable\n\n");

    let mut encoded = Vec::with_capacity(message.body().len());
    quoted_printable_encode(message.body().as_bytes(), &mut encoded, false, true)?;
    for line in encoded.split_inclusive(|&b| b == b'\n') {
        out.extend_from_slice(trim_line_end(line));
        out.push(b'\n');
    }
    Ok(out)
}

/// Header lines up to (not including) the first empty line.
fn header_block(raw: &[u8]) -> &[u8] {
    let mut end = 0;
    for line in raw.split_inclusive(|&b| b == b'\n') {
        if trim_line_end(line).is_empty() {
            return &raw[..end];
        }
        end += line.len();
    }
    raw
}

fn header_name(line: &[u8]) -> &[u8] {
    let end = line.iter().position(|&b| b == b':').unwrap_or(line.len());
    line[..end].trim_ascii()
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
