//! Per-stream state machine.
//!
//! A [`Stream`] is one logical request/response exchange multiplexed over a
//! shared connection. The inbound side is driven by the connection's read
//! loop ([`Stream::handle_frame`]); the outbound side (`write_headers`,
//! `write`, `finish`, `reset`) may be called from any thread and goes
//! through the connection's writer lock.
//!
//! Every outbound operation follows a reset-on-error policy: if the write
//! fails for any reason, an RST_STREAM is sent for this stream before the
//! error propagates to the caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::warn;

use crate::connection::FrameWriter;
use crate::delegate::SharedDelegate;
use crate::error::{Error, Result};
use crate::frame::{flags, Frame, FrameType};
use crate::hpack::{find_header, Header, HpackDecoder, HpackEncoder};
use crate::http::StartLine;
use crate::signal::Signal;

/// What the connection should do with the stream table entry after a
/// frame has been dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StreamStatus {
    Open,
    /// Inbound side is done (END_STREAM, RST_STREAM, or stream failure);
    /// remove the table entry. Outbound writes through existing handles
    /// keep working.
    Closed,
}

struct StreamInner {
    id: u32,
    is_client: bool,
    writer: Arc<Mutex<FrameWriter>>,
    encoder: Arc<Mutex<HpackEncoder>>,
    delegate: Mutex<Option<SharedDelegate>>,
    finished: Signal,
    /// True between headers_received and END_STREAM; decides whether an
    /// RST_STREAM is forwarded as an abrupt-close notice.
    need_delegate_close: AtomicBool,
    /// Declared Content-Length minus bytes written so far. None when no
    /// length is being tracked.
    expected_content_remaining: Mutex<Option<i64>>,
    /// Server role: method of the request this stream carries, captured
    /// from inbound pseudo-headers (HEAD responses must have no body).
    request_method: Mutex<Option<String>>,
}

/// Cheap-to-clone handle to one stream. The connection's table and the
/// application hold clones of the same handle.
#[derive(Clone)]
pub struct Stream {
    inner: Arc<StreamInner>,
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("id", &self.inner.id)
            .field("is_client", &self.inner.is_client)
            .finish()
    }
}

impl Stream {
    pub(crate) fn new(
        id: u32,
        is_client: bool,
        writer: Arc<Mutex<FrameWriter>>,
        encoder: Arc<Mutex<HpackEncoder>>,
    ) -> Self {
        Self {
            inner: Arc::new(StreamInner {
                id,
                is_client,
                writer,
                encoder,
                delegate: Mutex::new(None),
                finished: Signal::new(),
                need_delegate_close: AtomicBool::new(false),
                expected_content_remaining: Mutex::new(None),
                request_method: Mutex::new(None),
            }),
        }
    }

    pub fn id(&self) -> u32 {
        self.inner.id
    }

    pub(crate) fn set_delegate(&self, delegate: SharedDelegate) {
        *lock(&self.inner.delegate) = Some(delegate);
    }

    fn delegate(&self) -> Result<SharedDelegate> {
        lock(&self.inner.delegate)
            .clone()
            .ok_or(Error::UnknownStream(self.inner.id))
    }

    /// The stream's completion signal: fires when the inbound side ends,
    /// normally or abruptly. Only the delegate attached at creation may
    /// ask for it.
    pub fn read_response(&self, delegate: &SharedDelegate) -> Result<Signal> {
        let attached = self.delegate()?;
        if !Arc::ptr_eq(&attached, delegate) {
            return Err(Error::DelegateMismatch);
        }
        Ok(self.inner.finished.clone())
    }

    /// The completion signal without the delegate-identity check of
    /// [`read_response`]. Fires on normal completion and on reset alike;
    /// delegate callbacks tell the two apart.
    ///
    /// [`read_response`]: Stream::read_response
    pub fn completion(&self) -> Signal {
        self.inner.finished.clone()
    }

    // ------------------------------------------------------------------
    // Inbound: driven by the connection's read loop
    // ------------------------------------------------------------------

    /// Dispatch one inbound frame. HEADERS, DATA and RST_STREAM are the
    /// only types a stream handles; anything else is a protocol violation
    /// that aborts the connection loop.
    pub(crate) fn handle_frame(
        &self,
        frame: &Frame,
        decoder: &mut HpackDecoder,
        max_header_size: usize,
    ) -> Result<StreamStatus> {
        match frame.frame_type {
            FrameType::Headers => self.handle_headers_frame(frame, decoder, max_header_size),
            FrameType::Data => self.handle_data_frame(frame),
            FrameType::RstStream => self.handle_rst_stream_frame(),
            other => Err(Error::InvalidStreamFrame(other, self.inner.id)),
        }
    }

    fn handle_headers_frame(
        &self,
        frame: &Frame,
        decoder: &mut HpackDecoder,
        max_header_size: usize,
    ) -> Result<StreamStatus> {
        if !frame.is_end_headers() {
            return Err(Error::ContinuationUnsupported);
        }
        let mut data = frame.payload.as_slice();
        if data.len() > max_header_size {
            // Fail the stream explicitly rather than leaving the delegate
            // waiting on a frame that was dropped.
            let err = Error::HeaderBlockTooLarge {
                size: data.len(),
                max: max_header_size,
            };
            warn!("stream {}: {}", self.inner.id, err);
            let _ = self.reset();
            if let Ok(delegate) = self.delegate() {
                lock(&delegate).on_connection_close();
            }
            self.inner.finished.set();
            return Ok(StreamStatus::Closed);
        }
        if frame.flags & flags::PRIORITY != 0 {
            // Stream dependency (4 bytes) + weight (1 byte); values discarded.
            if data.len() < 5 {
                return Err(Error::InvalidStreamFrame(FrameType::Headers, self.inner.id));
            }
            data = &data[5..];
        }

        let mut pseudo = Vec::new();
        let mut headers = Vec::new();
        for header in decoder.decode(data)? {
            if header.is_pseudo() {
                pseudo.push(header);
            } else {
                headers.push(header);
            }
        }

        let start_line = if self.inner.is_client {
            let status = find_header(&pseudo, ":status")
                .ok_or(Error::MissingPseudoHeader(":status"))?;
            let status: u16 = status
                .parse()
                .map_err(|_| Error::InvalidStatus(status.to_string()))?;
            StartLine::response(status)
        } else {
            let method = find_header(&pseudo, ":method")
                .ok_or(Error::MissingPseudoHeader(":method"))?;
            let path = find_header(&pseudo, ":path")
                .ok_or(Error::MissingPseudoHeader(":path"))?;
            *lock(&self.inner.request_method) = Some(method.to_string());
            StartLine::request(method, path)
        };

        self.inner.need_delegate_close.store(true, Ordering::SeqCst);
        let delegate = self.delegate()?;
        lock(&delegate).headers_received(&start_line, &headers);
        if frame.is_end_stream() {
            self.inner.need_delegate_close.store(false, Ordering::SeqCst);
            lock(&delegate).finish();
            self.inner.finished.set();
            return Ok(StreamStatus::Closed);
        }
        Ok(StreamStatus::Open)
    }

    fn handle_data_frame(&self, frame: &Frame) -> Result<StreamStatus> {
        let delegate = self.delegate()?;
        lock(&delegate).data_received(&frame.payload);
        if frame.is_end_stream() {
            self.inner.need_delegate_close.store(false, Ordering::SeqCst);
            lock(&delegate).finish();
            self.inner.finished.set();
            return Ok(StreamStatus::Closed);
        }
        Ok(StreamStatus::Open)
    }

    fn handle_rst_stream_frame(&self) -> Result<StreamStatus> {
        if self.inner.need_delegate_close.swap(false, Ordering::SeqCst) {
            let delegate = self.delegate()?;
            lock(&delegate).on_connection_close();
        }
        self.inner.finished.set();
        Ok(StreamStatus::Closed)
    }

    // ------------------------------------------------------------------
    // Outbound: callable from any thread
    // ------------------------------------------------------------------

    /// Attempt `f`; on failure send RST_STREAM for this stream, then
    /// return the original error.
    fn reset_on_error<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        match f() {
            Ok(v) => Ok(v),
            Err(e) => {
                let _ = self.reset();
                Err(e)
            }
        }
    }

    /// Emit the HEADERS frame (END_HEADERS set) for this stream, then
    /// write `chunk` if given.
    ///
    /// Client role emits `:method`, `:scheme` (always https) and `:path`;
    /// server role emits `:status`. Regular header names are lower-cased.
    /// A `Content-Length` header starts byte accounting that [`write`] and
    /// [`finish`] enforce; a server responding to HEAD or with 304 tracks
    /// an expected length of zero.
    ///
    /// Every emitted header, `:path` included, is eligible for HPACK
    /// dynamic-table indexing; there is no never-index marking, so avoid
    /// placing secrets in paths or header values.
    ///
    /// [`write`]: Stream::write
    /// [`finish`]: Stream::finish
    pub fn write_headers(
        &self,
        start_line: &StartLine,
        headers: &[Header],
        chunk: Option<&[u8]>,
    ) -> Result<()> {
        self.reset_on_error(|| {
            *lock(&self.inner.expected_content_remaining) =
                self.expected_content_length(start_line, headers)?;

            let mut header_list = Vec::with_capacity(headers.len() + 3);
            match start_line {
                StartLine::Request { method, path } => {
                    header_list.push(Header::new(":method", method.clone()));
                    header_list.push(Header::new(":scheme", "https"));
                    header_list.push(Header::new(":path", path.clone()));
                }
                StartLine::Response { status, .. } => {
                    header_list.push(Header::new(":status", status.to_string()));
                }
            }
            for h in headers {
                header_list.push(Header::new(h.name.to_ascii_lowercase(), h.value.clone()));
            }

            // Writer lock held across encode and write: HPACK table order
            // must match wire order.
            {
                let mut writer = lock(&self.inner.writer);
                let data = lock(&self.inner.encoder).encode(&header_list);
                writer.write_frame(&Frame::new(
                    FrameType::Headers,
                    flags::END_HEADERS,
                    self.inner.id,
                    data,
                ))?;
            }

            if let Some(chunk) = chunk {
                self.write_chunk(chunk)?;
            }
            Ok(())
        })
    }

    fn expected_content_length(
        &self,
        start_line: &StartLine,
        headers: &[Header],
    ) -> Result<Option<i64>> {
        if !self.inner.is_client {
            let responding_to_head = lock(&self.inner.request_method)
                .as_deref()
                .is_some_and(|m| m == "HEAD");
            let not_modified = matches!(start_line, StartLine::Response { status: 304, .. });
            if responding_to_head || not_modified {
                return Ok(Some(0));
            }
        }
        match find_header(headers, "content-length") {
            Some(value) => {
                let n: i64 = value
                    .parse()
                    .map_err(|_| Error::InvalidContentLength(value.to_string()))?;
                Ok(Some(n))
            }
            None => Ok(None),
        }
    }

    /// Write one body chunk as a DATA frame (no flags). An empty chunk is
    /// a no-op. Fails before sending anything if the chunk would exceed
    /// the declared Content-Length.
    pub fn write(&self, chunk: &[u8]) -> Result<()> {
        self.reset_on_error(|| self.write_chunk(chunk))
    }

    fn write_chunk(&self, chunk: &[u8]) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        {
            let mut remaining = lock(&self.inner.expected_content_remaining);
            if let Some(n) = remaining.as_mut() {
                *n -= chunk.len() as i64;
                if *n < 0 {
                    return Err(Error::ContentLengthOverrun);
                }
            }
        }
        lock(&self.inner.writer).write_frame(&Frame::new(
            FrameType::Data,
            0,
            self.inner.id,
            chunk.to_vec(),
        ))
    }

    /// Finish the sending side: an empty DATA frame with END_STREAM set.
    /// Fails if declared Content-Length bytes are still undelivered.
    pub fn finish(&self) -> Result<()> {
        self.reset_on_error(|| {
            if let Some(n) = *lock(&self.inner.expected_content_remaining) {
                if n != 0 {
                    return Err(Error::ContentLengthShortfall(n));
                }
            }
            lock(&self.inner.writer).write_frame(&Frame::new(
                FrameType::Data,
                flags::END_STREAM,
                self.inner.id,
                Vec::new(),
            ))
        })
    }

    /// Abruptly terminate the stream: RST_STREAM with a NO_ERROR payload.
    pub fn reset(&self) -> Result<()> {
        lock(&self.inner.writer).write_frame(&Frame::new(
            FrameType::RstStream,
            0,
            self.inner.id,
            vec![0, 0, 0, 0],
        ))
    }
}

/// Poison-tolerant lock: a panicked holder does not invalidate protocol
/// state that the reset path still needs.
fn lock<T: ?Sized>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
