//! Marker literals and limits shared by the server and the client.

/// Opens the decimal reply port in a legacy request.
pub const PORT_START: &[u8] = b"PORTSTART:";

/// Closes the decimal reply port in a legacy request.
pub const PORT_END: &[u8] = b"PORTEND";

/// Opens the filename in a legacy retrieval request.
pub const FILENAME_START: &[u8] = b"FILENAME:";

/// Closes the filename in a legacy retrieval request.
pub const FILENAME_END: &[u8] = b"FILENAMEEND";

/// Precedes the command word in requests built by the legacy client.
pub const CMD_MARKER: &str = "CMD:";

/// Command words searched for in a legacy request.
pub const CMD_LIST: &[u8] = b"LIST";
pub const CMD_GET: &[u8] = b"GET";
pub const CMD_UNKNOWN: &str = "UNKNOWN";

/// Maximum filename length in bytes.
pub const MAX_FILENAME_LEN: usize = 254;

/// Upper bound on a request payload. Reading stops once this many bytes
/// have arrived, whether or not the frame looks complete.
pub const MAX_REQUEST_LEN: usize = 512;

/// Legacy clients pad requests with `#` up to this length, then append NUL.
pub const LEGACY_PADDED_LEN: usize = 99;

/// Padding byte used by legacy clients.
pub const LEGACY_PAD: u8 = b'#';

/// First byte of a versioned request frame. Never valid as the first byte
/// of a legacy text request.
pub const FRAME_MAGIC: u8 = 0xF7;

/// Current versioned frame version.
pub const FRAME_VERSION: u8 = 0x02;

/// Fixed header size of a versioned frame: magic, version, tag, port (2),
/// name length.
pub const FRAME_HEADER_LEN: usize = 6;

/// Reply: request accepted, data connection follows.
pub const REPLY_CONTINUE: &str = "CONTINUE";

/// Reply: requested file found, bytes follow on the data channel.
pub const REPLY_SENDING: &str = "SENDING";

/// Prefix of every error reply.
pub const REPLY_ERROR_PREFIX: &str = "ERROR: ";

/// Reply for an unrecognized command.
pub const USAGE_ERROR: &str = "ERROR: Invalid command. Try -l (list) or -g <FILENAME> (get)\n";

/// Reply for a request the server could not decode.
pub const MALFORMED_ERROR: &str = "ERROR: Malformed request.\n";

/// Number of bytes needed to tell replies apart (`CONTI`, `SENDI`, `ERROR`).
pub const REPLY_PREFIX_LEN: usize = 5;
