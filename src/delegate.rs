//! Application-facing delegate traits.
//!
//! The engine parses frames and drives each stream's lifecycle; the
//! application supplies a [`StreamDelegate`] per stream to receive parsed
//! headers and body chunks. A server additionally supplies a
//! [`ConnectionDelegate`] that starts a new request handler whenever an
//! inbound HEADERS frame opens a stream.
//!
//! Transparent body decompression is not built in: implement it as a
//! decorator that wraps another `StreamDelegate` and inflates inside
//! `data_received`.

use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::hpack::Header;
use crate::http::StartLine;
use crate::stream::Stream;

/// Per-stream application callbacks, invoked from the connection's
/// read loop.
pub trait StreamDelegate: Send {
    /// A complete header block arrived: start line plus ordered headers.
    fn headers_received(&mut self, start_line: &StartLine, headers: &[Header]);

    /// One DATA frame's payload.
    fn data_received(&mut self, chunk: &[u8]);

    /// The peer finished its sending side (END_STREAM seen).
    fn finish(&mut self);

    /// The stream ended abruptly (RST_STREAM, or a stream-level failure)
    /// before any END_STREAM was seen.
    fn on_connection_close(&mut self);
}

/// Delegates are shared between the application and the stream table, and
/// the read loop may run on a different thread than outbound writers.
pub type SharedDelegate = Arc<Mutex<dyn StreamDelegate>>;

/// Server-side connection callbacks.
pub trait ConnectionDelegate: Send {
    /// An inbound HEADERS frame opened `stream`; return the delegate that
    /// will handle the request. The stream handle is already wired to the
    /// connection's writer, so the delegate may respond from any thread.
    fn start_request(&mut self, stream: &Stream) -> Result<SharedDelegate>;
}

/// Connection delegate for client connections, which never receive
/// peer-initiated streams (server push is disabled in our SETTINGS).
pub struct NoServerRequests;

impl ConnectionDelegate for NoServerRequests {
    fn start_request(&mut self, stream: &Stream) -> Result<SharedDelegate> {
        Err(crate::error::Error::UnknownStream(stream.id()))
    }
}
