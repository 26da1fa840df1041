//! Error types for the HTTP/2 engine.

use thiserror::Error;

use crate::frame::FrameType;

/// Main error type for all engine operations.
///
/// Connection-fatal conditions (preface mismatch, framing violations,
/// duplicate streams) abort the connection loop; stream-scoped conditions
/// (content-length accounting) surface to the outbound caller after an
/// RST_STREAM has been sent. `Closed` is not a failure: the connection loop
/// maps it to a quiet exit.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport reported end-of-stream before the expected byte count.
    #[error("connection closed")]
    Closed,

    /// Server role: the bytes read at connection start were not the
    /// client preface.
    #[error("expected client preface, got {0:?}")]
    InvalidPreface(Vec<u8>),

    /// Frame header carried a type code outside RFC 7540.
    #[error("unknown frame type 0x{0:02x}")]
    UnknownFrameType(u8),

    /// Frame type not valid on stream 0 (only SETTINGS and WINDOW_UPDATE are).
    #[error("invalid frame type {0:?} for stream 0")]
    InvalidConnectionFrame(FrameType),

    /// Frame type not handled by the stream state machine.
    #[error("invalid frame type {0:?} for stream {1}")]
    InvalidStreamFrame(FrameType, u32),

    /// Server role: inbound HEADERS for a stream id already open or
    /// already used by a completed stream.
    #[error("already have stream {0}")]
    DuplicateStream(u32),

    /// Frame for a non-zero stream id with no matching stream.
    #[error("no such stream {0}")]
    UnknownStream(u32),

    /// HEADERS frame without END_HEADERS; continuation is unsupported.
    #[error("continuation frames not supported")]
    ContinuationUnsupported,

    /// Header block exceeded the configured maximum size.
    #[error("header block too large ({size} bytes, max {max})")]
    HeaderBlockTooLarge { size: usize, max: usize },

    /// Inbound header block was missing a required pseudo-header.
    #[error("missing required pseudo-header {0}")]
    MissingPseudoHeader(&'static str),

    /// Client role: the `:status` pseudo-header was not a valid status code.
    #[error("invalid :status value {0:?}")]
    InvalidStatus(String),

    /// HPACK encode/decode failure.
    #[error("hpack error: {0}")]
    Hpack(String),

    /// Outbound `Content-Length` header was not a valid integer.
    #[error("invalid Content-Length value {0:?}")]
    InvalidContentLength(String),

    /// Tried to write more data than the declared Content-Length.
    #[error("tried to write more data than Content-Length")]
    ContentLengthOverrun,

    /// Finished the stream with declared bytes still undelivered.
    #[error("tried to write {0} bytes less than Content-Length")]
    ContentLengthShortfall(i64),

    /// `read_response` called with a delegate other than the one attached
    /// at stream creation.
    #[error("cannot change delegate")]
    DelegateMismatch,
}

/// Result type alias using the engine error.
pub type Result<T> = std::result::Result<T, Error>;
