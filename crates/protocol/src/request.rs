//! Control-channel requests.
//!
//! Two encodings are accepted on the same port and told apart by the first
//! byte of the payload.
//!
//! # Legacy text framing
//!
//! ```text
//! [...]PORTSTART:<decimal port>PORTEND[...]                              LIST
//! [...]PORTSTART:<decimal port>PORTEND[...]FILENAME:<name>FILENAMEEND[...]  GET
//! ```
//!
//! The command is whichever of `LIST` or `GET` occurs anywhere in the
//! payload, `LIST` taking precedence when both do. Anything after the first
//! NUL byte is ignored. This grammar is a fixed contract with existing
//! clients, so a filename containing `LIST` turns a retrieval into a listing.
//!
//! # Versioned frame
//!
//! ```text
//! [1 byte: 0xF7 magic][1 byte: version 0x02][1 byte: tag 0=UNKNOWN 1=LIST 2=GET]
//! [2 bytes BE: reply port][1 byte: name_len][name_len bytes: filename UTF-8]
//! ```

use crate::constants::{
    CMD_GET, CMD_LIST, CMD_MARKER, CMD_UNKNOWN, FILENAME_END, FILENAME_START, FRAME_HEADER_LEN,
    FRAME_MAGIC, FRAME_VERSION, LEGACY_PAD, LEGACY_PADDED_LEN, MAX_FILENAME_LEN, PORT_END,
    PORT_START,
};
use crate::error::ProtocolError;

const TAG_UNKNOWN: u8 = 0;
const TAG_LIST: u8 = 1;
const TAG_GET: u8 = 2;

/// Command carried by a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    List,
    Get,
    Unknown,
}

impl Command {
    fn tag(self) -> u8 {
        match self {
            Command::Unknown => TAG_UNKNOWN,
            Command::List => TAG_LIST,
            Command::Get => TAG_GET,
        }
    }

    fn legacy_word(self) -> &'static str {
        match self {
            Command::List => "LIST",
            Command::Get => "GET",
            Command::Unknown => CMD_UNKNOWN,
        }
    }
}

/// Encoding used when a client writes a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WireFormat {
    /// Marker-delimited text understood by every server version.
    Legacy,
    /// Tagged binary frame.
    #[default]
    Versioned,
}

/// A decoded request. The filename is present exactly when the command is
/// [`Command::Get`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    command: Command,
    reply_port: u16,
    filename: Option<String>,
}

impl Request {
    /// Builds a listing request.
    pub fn list(reply_port: u16) -> Result<Self, ProtocolError> {
        Ok(Self {
            command: Command::List,
            reply_port: check_port(reply_port)?,
            filename: None,
        })
    }

    /// Builds a retrieval request for `filename`.
    pub fn get(reply_port: u16, filename: impl Into<String>) -> Result<Self, ProtocolError> {
        let filename = filename.into();
        check_filename(filename.as_bytes())?;
        Ok(Self {
            command: Command::Get,
            reply_port: check_port(reply_port)?,
            filename: Some(filename),
        })
    }

    /// Builds a request the server will answer with its usage error.
    pub fn unknown(reply_port: u16) -> Result<Self, ProtocolError> {
        Ok(Self {
            command: Command::Unknown,
            reply_port: check_port(reply_port)?,
            filename: None,
        })
    }

    pub fn command(&self) -> Command {
        self.command
    }

    /// Port the client listens on for the data connection.
    pub fn reply_port(&self) -> u16 {
        self.reply_port
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Encodes the request in the given wire format.
    pub fn encode(&self, format: WireFormat) -> Vec<u8> {
        match format {
            WireFormat::Legacy => encode_legacy_request(self),
            WireFormat::Versioned => encode_frame(self),
        }
    }
}

/// Whether a buffered payload holds a whole request yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Complete,
    Incomplete,
}

/// Reports whether `buf` holds a complete request.
///
/// Versioned frames are complete once the header and the filename it
/// announces have arrived. Legacy payloads carry no length: they are
/// complete at the NUL terminator, or earlier once the port and a command
/// (plus the filename for `GET`) are all present. An unknown command without
/// a terminator never completes; the caller decides what to do on EOF, size
/// cap or deadline.
pub fn frame_status(buf: &[u8]) -> FrameStatus {
    let complete = match buf.first() {
        None => false,
        Some(&FRAME_MAGIC) => {
            buf.len() >= FRAME_HEADER_LEN
                && buf.len() >= FRAME_HEADER_LEN + buf[FRAME_HEADER_LEN - 1] as usize
        }
        Some(_) => buf.contains(&0) || legacy_markers_present(buf),
    };
    if complete {
        FrameStatus::Complete
    } else {
        FrameStatus::Incomplete
    }
}

fn legacy_markers_present(buf: &[u8]) -> bool {
    if between(buf, PORT_START, PORT_END).is_none() {
        return false;
    }
    contains(buf, CMD_LIST)
        || (contains(buf, CMD_GET) && between(buf, FILENAME_START, FILENAME_END).is_some())
}

/// Decodes a raw control-channel payload.
pub fn decode_request(raw: &[u8]) -> Result<Request, ProtocolError> {
    match raw.first() {
        Some(&FRAME_MAGIC) => decode_frame(raw),
        Some(_) => decode_legacy(raw),
        None => Err(ProtocolError::MalformedRequest("empty request".into())),
    }
}

fn decode_legacy(raw: &[u8]) -> Result<Request, ProtocolError> {
    let payload = match raw.iter().position(|&b| b == 0) {
        Some(nul) => &raw[..nul],
        None => raw,
    };

    let port_digits = between(payload, PORT_START, PORT_END)
        .ok_or_else(|| ProtocolError::MalformedRequest("missing reply port markers".into()))?;
    let reply_port = parse_port(port_digits)?;

    // LIST is checked first; a payload containing both is a listing.
    if contains(payload, CMD_LIST) {
        return Request::list(reply_port);
    }
    if !contains(payload, CMD_GET) {
        return Request::unknown(reply_port);
    }

    let name = between(payload, FILENAME_START, FILENAME_END)
        .ok_or_else(|| ProtocolError::MalformedRequest("missing filename markers".into()))?;
    check_filename(name)?;
    // Names that are not UTF-8 are unsupported in both encodings.
    let filename = std::str::from_utf8(name)
        .map_err(|e| ProtocolError::MalformedRequest(format!("filename is not UTF-8: {e}")))?;

    Request::get(reply_port, filename)
}

fn decode_frame(raw: &[u8]) -> Result<Request, ProtocolError> {
    if raw.len() < FRAME_HEADER_LEN {
        return Err(ProtocolError::MalformedRequest(format!(
            "truncated frame header: {} bytes",
            raw.len()
        )));
    }
    let version = raw[1];
    if version != FRAME_VERSION {
        return Err(ProtocolError::MalformedRequest(format!(
            "unsupported frame version {version}"
        )));
    }

    let tag = raw[2];
    let reply_port = u16::from_be_bytes([raw[3], raw[4]]);
    let name_len = raw[5] as usize;
    let name = raw
        .get(FRAME_HEADER_LEN..FRAME_HEADER_LEN + name_len)
        .ok_or_else(|| {
            ProtocolError::MalformedRequest(format!(
                "truncated filename: expected {name_len} bytes, got {}",
                raw.len() - FRAME_HEADER_LEN
            ))
        })?;

    match tag {
        TAG_LIST if name.is_empty() => Request::list(reply_port),
        TAG_GET => {
            check_filename(name)?;
            let filename = std::str::from_utf8(name).map_err(|e| {
                ProtocolError::MalformedRequest(format!("filename is not UTF-8: {e}"))
            })?;
            Request::get(reply_port, filename)
        }
        TAG_LIST => Err(ProtocolError::MalformedRequest(
            "listing request carries a filename".into(),
        )),
        _ if !name.is_empty() => Err(ProtocolError::MalformedRequest(format!(
            "tag {tag} carries a filename"
        ))),
        _ => Request::unknown(reply_port),
    }
}

/// Encodes a request the way the legacy client did: markers, the command
/// word, `#` padding up to 99 bytes and a trailing NUL.
pub fn encode_legacy_request(request: &Request) -> Vec<u8> {
    let mut text = format!(
        "PORTSTART:{}PORTEND{CMD_MARKER}{}",
        request.reply_port,
        request.command.legacy_word()
    );
    if let Some(name) = &request.filename {
        text.push_str("FILENAME:");
        text.push_str(name);
        text.push_str("FILENAMEEND");
    }

    let mut out = text.into_bytes();
    if out.len() < LEGACY_PADDED_LEN {
        out.resize(LEGACY_PADDED_LEN, LEGACY_PAD);
    }
    out.push(0);
    out
}

/// Encodes a request as a versioned frame.
pub fn encode_frame(request: &Request) -> Vec<u8> {
    let name = request.filename.as_deref().unwrap_or_default().as_bytes();
    let mut out = Vec::with_capacity(FRAME_HEADER_LEN + name.len());
    out.push(FRAME_MAGIC);
    out.push(FRAME_VERSION);
    out.push(request.command.tag());
    out.extend_from_slice(&request.reply_port.to_be_bytes());
    // Bounded by MAX_FILENAME_LEN at construction.
    out.push(name.len() as u8);
    out.extend_from_slice(name);
    out
}

fn check_port(port: u16) -> Result<u16, ProtocolError> {
    if port == 0 {
        return Err(ProtocolError::MalformedRequest("reply port is zero".into()));
    }
    Ok(port)
}

fn check_filename(name: &[u8]) -> Result<(), ProtocolError> {
    if name.is_empty() {
        return Err(ProtocolError::MalformedRequest("empty filename".into()));
    }
    if name.len() > MAX_FILENAME_LEN {
        return Err(ProtocolError::MalformedRequest(format!(
            "filename too long: {} bytes (max {MAX_FILENAME_LEN})",
            name.len()
        )));
    }
    Ok(())
}

fn parse_port(digits: &[u8]) -> Result<u16, ProtocolError> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(ProtocolError::MalformedRequest(format!(
            "reply port is not decimal: {:?}",
            String::from_utf8_lossy(digits)
        )));
    }
    // Leading zeros are tolerated, so strip them before the length check.
    let significant = match digits.iter().position(|&d| d != b'0') {
        Some(first) => &digits[first..],
        None => &digits[digits.len() - 1..],
    };
    if significant.len() > 5 {
        return Err(ProtocolError::MalformedRequest(format!(
            "reply port out of range: {}",
            String::from_utf8_lossy(digits)
        )));
    }
    let value = significant
        .iter()
        .fold(0u32, |acc, d| acc * 10 + u32::from(d - b'0'));
    let port = u16::try_from(value).map_err(|_| {
        ProtocolError::MalformedRequest(format!("reply port out of range: {value}"))
    })?;
    check_port(port)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    find(haystack, needle).is_some()
}

/// Bytes between the first `start` marker and the first `end` marker that
/// follows it.
fn between<'a>(payload: &'a [u8], start: &[u8], end: &[u8]) -> Option<&'a [u8]> {
    let from = find(payload, start)? + start.len();
    let len = find(&payload[from..], end)?;
    Some(&payload[from..from + len])
}
