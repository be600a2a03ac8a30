//! STOMP 1.2 text frames.
//!
//! A frame is a command line, `name:value` header lines, an empty line and a
//! body terminated by NUL. Bare EOLs between frames are heart-beats.

use std::borrow::Cow;
use std::fmt;

use anyhow::Result;

use crate::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    // Client frames
    Connect,
    Stomp,
    Send,
    Subscribe,
    Unsubscribe,
    Ack,
    Nack,
    Begin,
    Commit,
    Abort,
    Disconnect,
    // Server frames
    Connected,
    Message,
    Receipt,
    Error,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Stomp => "STOMP",
            Self::Send => "SEND",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Ack => "ACK",
            Self::Nack => "NACK",
            Self::Begin => "BEGIN",
            Self::Commit => "COMMIT",
            Self::Abort => "ABORT",
            Self::Disconnect => "DISCONNECT",
            Self::Connected => "CONNECTED",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let command = match value {
            "CONNECT" => Self::Connect,
            "STOMP" => Self::Stomp,
            "SEND" => Self::Send,
            "SUBSCRIBE" => Self::Subscribe,
            "UNSUBSCRIBE" => Self::Unsubscribe,
            "ACK" => Self::Ack,
            "NACK" => Self::Nack,
            "BEGIN" => Self::Begin,
            "COMMIT" => Self::Commit,
            "ABORT" => Self::Abort,
            "DISCONNECT" => Self::Disconnect,
            "CONNECTED" => Self::Connected,
            "MESSAGE" => Self::Message,
            "RECEIPT" => Self::Receipt,
            "ERROR" => Self::Error,
            _ => return None,
        };
        Some(command)
    }

    /// CONNECT and CONNECTED headers are sent verbatim.
    fn escapes_headers(&self) -> bool {
        !matches!(self, Self::Connect | Self::Stomp | Self::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of a header. Repeated headers keep their first occurrence.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Serialize to wire format: COMMAND, headers, blank line, body, NUL
    pub fn to_wire_format(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(self.body.len() + 64);

        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }
}

/// Parse every frame contained in one websocket text message.
///
/// Heart-beat EOLs before, between and after frames are skipped, so a
/// message made only of EOLs yields an empty list.
pub fn parse_frames(text: &str) -> Result<Vec<Frame>> {
    let mut frames = Vec::new();
    let mut rest = text;

    loop {
        rest = rest.trim_start_matches(['\r', '\n']);
        if rest.is_empty() {
            break;
        }

        let (frame, remaining) = parse_frame(rest)?;
        frames.push(frame);
        rest = remaining;
    }

    Ok(frames)
}

fn parse_frame(input: &str) -> Result<(Frame, &str)> {
    let (command_line, mut rest) = split_line(input).ok_or(ParseError::MissingTerminator)?;
    let command = Command::parse(command_line)
        .ok_or_else(|| ParseError::UnknownCommand(command_line.to_string()))?;
    let unescape = command.escapes_headers();

    let mut headers = Vec::new();
    loop {
        let (line, remaining) = split_line(rest).ok_or(ParseError::MissingTerminator)?;
        rest = remaining;
        if line.is_empty() {
            break;
        }

        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| ParseError::InvalidFormat(format!("malformed header line: {line}")))?;

        if unescape {
            headers.push((unescape_header(name)?, unescape_header(value)?));
        } else {
            headers.push((name.to_string(), value.to_string()));
        }
    }

    let content_length = headers
        .iter()
        .find(|(name, _)| name == "content-length")
        .map(|(_, value)| value.clone());

    let (body, rest) = match content_length {
        Some(raw) => {
            let length: usize = raw
                .trim()
                .parse()
                .map_err(|_| ParseError::InvalidContentLength(raw.clone()))?;
            let body = rest
                .get(..length)
                .ok_or_else(|| ParseError::InvalidContentLength(raw.clone()))?;
            let after = rest[length..]
                .strip_prefix('\0')
                .ok_or(ParseError::MissingTerminator)?;
            (body, after)
        }
        None => {
            let end = rest.find('\0').ok_or(ParseError::MissingTerminator)?;
            (&rest[..end], &rest[end + 1..])
        }
    };

    let frame = Frame {
        command,
        headers,
        body: body.to_string(),
    };
    Ok((frame, rest))
}

/// Split off one line, accepting both LF and CRLF endings
fn split_line(input: &str) -> Option<(&str, &str)> {
    let end = input.find('\n')?;
    let line = &input[..end];
    let line = line.strip_suffix('\r').unwrap_or(line);
    Some((line, &input[end + 1..]))
}

fn escape_header(value: &str) -> Cow<'_, str> {
    if !value.contains(['\\', '\n', '\r', ':']) {
        return Cow::Borrowed(value);
    }

    let mut out = String::with_capacity(value.len() + 4);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}

fn unescape_header(value: &str) -> Result<String, ParseError> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            _ => return Err(ParseError::InvalidEscape(value.to_string())),
        }
    }

    Ok(out)
}
