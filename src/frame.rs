//! HTTP/2 frame codec: the 9-byte frame header plus payload.
//!
//! Pure framing only. Frame *semantics* (what HEADERS or SETTINGS mean)
//! live in [`crate::connection`] and [`crate::stream`].
//!
//! Reference: RFC 7540 (HTTP/2)

use crate::error::{Error, Result};
use crate::transport::TransportRead;

/// HTTP/2 frame flags
pub mod flags {
    pub const END_STREAM: u8 = 0x1;
    pub const ACK: u8 = 0x1;
    pub const END_HEADERS: u8 = 0x4;
    pub const PADDED: u8 = 0x8;
    pub const PRIORITY: u8 = 0x20;
}

/// HTTP/2 SETTINGS identifiers (RFC 7540 Section 6.5.2)
pub mod settings_id {
    pub const HEADER_TABLE_SIZE: u16 = 0x1;
    pub const ENABLE_PUSH: u16 = 0x2;
    pub const MAX_CONCURRENT_STREAMS: u16 = 0x3;
    pub const INITIAL_WINDOW_SIZE: u16 = 0x4;
    pub const MAX_FRAME_SIZE: u16 = 0x5;
    pub const MAX_HEADER_LIST_SIZE: u16 = 0x6;
}

/// HTTP/2 error codes (RFC 7540 Section 7)
pub mod error_code {
    pub const NO_ERROR: u32 = 0x0;
    pub const PROTOCOL_ERROR: u32 = 0x1;
    pub const INTERNAL_ERROR: u32 = 0x2;
    pub const FLOW_CONTROL_ERROR: u32 = 0x3;
    pub const STREAM_CLOSED: u32 = 0x5;
    pub const FRAME_SIZE_ERROR: u32 = 0x6;
    pub const REFUSED_STREAM: u32 = 0x7;
    pub const CANCEL: u32 = 0x8;
    pub const COMPRESSION_ERROR: u32 = 0x9;
}

/// The HTTP/2 connection preface (24 bytes), written by clients and
/// required verbatim by servers before any framed traffic.
pub const CLIENT_PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// Size of the fixed frame header.
pub const FRAME_HEADER_LEN: usize = 9;

/// HTTP/2 frame types (RFC 7540 Section 6).
///
/// Type codes outside this set fail header decoding with
/// [`Error::UnknownFrameType`] rather than passing through silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Data = 0x0,
    Headers = 0x1,
    Priority = 0x2,
    RstStream = 0x3,
    Settings = 0x4,
    PushPromise = 0x5,
    Ping = 0x6,
    GoAway = 0x7,
    WindowUpdate = 0x8,
    Continuation = 0x9,
}

impl TryFrom<u8> for FrameType {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0x0 => Ok(FrameType::Data),
            0x1 => Ok(FrameType::Headers),
            0x2 => Ok(FrameType::Priority),
            0x3 => Ok(FrameType::RstStream),
            0x4 => Ok(FrameType::Settings),
            0x5 => Ok(FrameType::PushPromise),
            0x6 => Ok(FrameType::Ping),
            0x7 => Ok(FrameType::GoAway),
            0x8 => Ok(FrameType::WindowUpdate),
            0x9 => Ok(FrameType::Continuation),
            other => Err(Error::UnknownFrameType(other)),
        }
    }
}

/// A parsed HTTP/2 frame header (9 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub length: u32, // 24 bits
    pub frame_type: FrameType,
    pub flags: u8,
    pub stream_id: u32, // 31 bits (high bit reserved)
}

impl FrameHeader {
    /// Parse a 9-byte frame header. The reserved top bit of the stream id
    /// is masked off before returning.
    pub fn parse(data: &[u8; FRAME_HEADER_LEN]) -> Result<Self> {
        let length = ((data[0] as u32) << 16) | ((data[1] as u32) << 8) | (data[2] as u32);
        let frame_type = FrameType::try_from(data[3])?;
        let flags = data[4];
        let stream_id = u32::from_be_bytes([data[5], data[6], data[7], data[8]]) & 0x7fff_ffff;

        Ok(Self {
            length,
            frame_type,
            flags,
            stream_id,
        })
    }
}

/// An immutable HTTP/2 frame: type + flags + stream id + payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub frame_type: FrameType,
    pub flags: u8,
    pub stream_id: u32,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(frame_type: FrameType, flags: u8, stream_id: u32, payload: Vec<u8>) -> Self {
        Self {
            frame_type,
            flags,
            stream_id,
            payload,
        }
    }

    /// Check if END_STREAM flag is set
    pub fn is_end_stream(&self) -> bool {
        self.flags & flags::END_STREAM != 0
    }

    /// Check if END_HEADERS flag is set
    pub fn is_end_headers(&self) -> bool {
        self.flags & flags::END_HEADERS != 0
    }

    /// Encode the frame: 3-byte big-endian length, type, flags, 4-byte
    /// stream id with bit 31 fixed to zero, then the payload verbatim.
    ///
    /// Caller must guarantee the payload fits in 24 bits and the stream id
    /// in 31 bits; there is no error recovery here.
    pub fn encode(&self) -> Vec<u8> {
        debug_assert!(self.payload.len() < (1 << 24));
        debug_assert!(self.stream_id < (1 << 31));
        let length = self.payload.len() as u32;
        let mut buf = Vec::with_capacity(FRAME_HEADER_LEN + self.payload.len());
        buf.push((length >> 16) as u8);
        buf.push((length >> 8) as u8);
        buf.push(length as u8);
        buf.push(self.frame_type as u8);
        buf.push(self.flags);
        buf.extend_from_slice(&(self.stream_id & 0x7fff_ffff).to_be_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Read one frame from the transport: exactly 9 header bytes, then
    /// exactly the declared payload length.
    ///
    /// A short read at any point surfaces as [`Error::Closed`] from the
    /// transport, never as a generic I/O error.
    pub fn read_from(transport: &mut dyn TransportRead) -> Result<Frame> {
        let mut header_bytes = [0u8; FRAME_HEADER_LEN];
        transport.read_exact(&mut header_bytes)?;
        let header = FrameHeader::parse(&header_bytes)?;
        let mut payload = vec![0u8; header.length as usize];
        transport.read_exact(&mut payload)?;
        Ok(Frame {
            frame_type: header.frame_type,
            flags: header.flags,
            stream_id: header.stream_id,
            payload,
        })
    }
}
