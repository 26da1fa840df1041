//! h2-engine: A minimal HTTP/2 connection and stream engine
//!
//! This crate implements the connection- and stream-level core of an HTTP/2
//! endpoint: reading and writing the binary frame format, multiplexing many
//! logical streams over one transport, and driving each stream through its
//! header/data lifecycle while delegating to an application-supplied handler.
//! It is synchronous by design: one blocking read loop per connection, with
//! no async runtime dependency (no tokio).
//!
//! # Features
//!
//! - **Frame codec**: the 9-byte RFC 7540 frame header plus payload, for
//!   DATA, HEADERS, SETTINGS, RST_STREAM and WINDOW_UPDATE
//! - **Preface handshake**: client preface written/verified, initial
//!   SETTINGS exchanged and acknowledged
//! - **Stream multiplexing**: per-stream state machines driven by a single
//!   read/dispatch loop, odd/even id allocation by role
//! - **HPACK**: header compression via fluke-hpack, one encoder and one
//!   decoder per connection
//! - **Content-length enforcement**: overrun and shortfall detected on the
//!   outbound path, with RST_STREAM sent on any write failure
//!
//! # Quick Start
//!
//! ```no_run
//! use std::net::TcpStream;
//! use h2_engine::{Connection, NoServerRequests, Params};
//!
//! let socket = TcpStream::connect("example.com:443")?;
//! let mut conn = Connection::new(socket, true, Params::default())?;
//!
//! // The loop owns the read path; give it a thread.
//! let settings_written = conn.initial_settings_written();
//! std::thread::spawn(move || conn.run(&mut NoServerRequests));
//! settings_written.wait();
//! # Ok::<(), h2_engine::Error>(())
//! ```
//!
//! # Architecture
//!
//! A [`Connection`] owns the transport's read half and a writer lock shared
//! with every [`Stream`] handle. The read loop parses one frame at a time
//! and dispatches it: stream id 0 to the connection-level handler, anything
//! else to the matching stream (created on the fly for inbound HEADERS on a
//! server). Streams call the application back through [`StreamDelegate`]
//! and emit their own frames through the shared writer.
//!
//! It does NOT provide:
//! - TLS (use rustls or similar underneath the transport seam)
//! - CONTINUATION frames, PRIORITY semantics, or flow-control accounting
//! - An HTTP request/response API (you supply the delegates)

pub mod connection;
pub mod delegate;
pub mod error;
pub mod frame;
pub mod hpack;
pub mod http;
pub mod signal;
pub mod stream;
pub mod transport;

pub use connection::{Connection, Params};
pub use delegate::{ConnectionDelegate, NoServerRequests, SharedDelegate, StreamDelegate};
pub use error::{Error, Result};
pub use frame::{
    error_code, flags, settings_id, Frame, FrameHeader, FrameType, CLIENT_PREFACE,
    FRAME_HEADER_LEN,
};
pub use hpack::{Header, HpackDecoder, HpackEncoder};
pub use http::{reason_phrase, StartLine, HTTP_VERSION};
pub use signal::Signal;
pub use stream::Stream;
pub use transport::{Transport, TransportRead, TransportWrite};
