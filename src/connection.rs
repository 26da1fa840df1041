//! Connection-level engine: preface handshake, the frame read/dispatch
//! loop, SETTINGS handling, and the stream table.
//!
//! One connection owns one transport and exactly one read path. [`run`]
//! blocks until the peer closes or a fatal protocol error occurs; give
//! each connection its own thread. The only suspension points are the
//! transport reads (preface, frame header, frame payload), so stream
//! dispatch is interleaved at frame granularity but never concurrent and
//! the stream table and HPACK decoder need no locking of their own.
//!
//! Outbound writes go through a single writer lock shared with every
//! stream handle, which serializes HEADERS encoding against the frame
//! write (the HPACK encoder's dynamic table is order-sensitive). There is
//! no flow-control accounting on DATA writes.
//!
//! [`run`]: Connection::run

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::debug;

use crate::delegate::ConnectionDelegate;
use crate::error::{Error, Result};
use crate::frame::{flags, settings_id, Frame, FrameType, CLIENT_PREFACE};
use crate::hpack::{HpackDecoder, HpackEncoder};
use crate::signal::Signal;
use crate::stream::{Stream, StreamStatus};
use crate::transport::{Transport, TransportRead, TransportWrite};

/// Tunable connection parameters.
#[derive(Debug, Clone)]
pub struct Params {
    /// Maximum accepted inbound header-block size in bytes. A HEADERS
    /// frame over this limit fails its stream.
    pub max_header_size: usize,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            max_header_size: 65536,
        }
    }
}

/// Serialized frame writer shared between the connection and its streams.
pub(crate) struct FrameWriter {
    out: Box<dyn TransportWrite>,
}

impl FrameWriter {
    fn new(out: Box<dyn TransportWrite>) -> Self {
        Self { out }
    }

    pub(crate) fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        debug!(
            "sending frame {:?} flags={:#x} stream={} len={}",
            frame.frame_type,
            frame.flags,
            frame.stream_id,
            frame.payload.len()
        );
        self.out.write_all(&frame.encode())
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.out.write_all(data)
    }

    fn close(&mut self) {
        self.out.close();
    }
}

/// One HTTP/2 connection over one transport.
pub struct Connection {
    is_client: bool,
    params: Params,
    reader: Box<dyn TransportRead>,
    writer: Arc<Mutex<FrameWriter>>,
    decoder: HpackDecoder,
    encoder: Arc<Mutex<HpackEncoder>>,
    streams: HashMap<u32, Stream>,
    next_stream_id: u32,
    /// Highest peer-initiated stream id accepted so far. Table entries are
    /// dropped on completion, so this is what enforces strictly increasing
    /// inbound ids.
    max_peer_stream_id: u32,
    initial_settings_written: Signal,
}

impl Connection {
    /// Wrap a transport. Clients allocate odd stream ids starting at 1,
    /// servers even ids starting at 2.
    pub fn new<T: Transport>(transport: T, is_client: bool, params: Params) -> Result<Self> {
        let (reader, writer) = transport.split()?;
        Ok(Self {
            is_client,
            params,
            reader: Box::new(reader),
            writer: Arc::new(Mutex::new(FrameWriter::new(Box::new(writer)))),
            decoder: HpackDecoder::new(),
            encoder: Arc::new(Mutex::new(HpackEncoder::new())),
            streams: HashMap::new(),
            next_stream_id: if is_client { 1 } else { 2 },
            max_peer_stream_id: 0,
            initial_settings_written: Signal::new(),
        })
    }

    pub fn is_client(&self) -> bool {
        self.is_client
    }

    /// One-shot signal that fires once the handshake has written our
    /// initial SETTINGS frame. Waitable from any thread.
    pub fn initial_settings_written(&self) -> Signal {
        self.initial_settings_written.clone()
    }

    /// Allocate the next locally initiated stream. Ids increase by 2 per
    /// call and keep the connection's parity.
    pub fn create_stream(&mut self, delegate: crate::delegate::SharedDelegate) -> Stream {
        let stream = Stream::new(
            self.next_stream_id,
            self.is_client,
            self.writer.clone(),
            self.encoder.clone(),
        );
        stream.set_delegate(delegate);
        self.next_stream_id += 2;
        self.streams.insert(stream.id(), stream.clone());
        stream
    }

    /// Perform the preface handshake, then read and dispatch frames until
    /// the peer closes (Ok) or a fatal error occurs (transport closed,
    /// error returned).
    ///
    /// `delegate` is consulted only on a server connection, when an
    /// inbound HEADERS frame opens a new stream; clients can pass
    /// [`NoServerRequests`].
    ///
    /// [`NoServerRequests`]: crate::delegate::NoServerRequests
    pub fn run(&mut self, delegate: &mut dyn ConnectionDelegate) -> Result<()> {
        match self.conn_loop(delegate) {
            Ok(()) | Err(Error::Closed) => Ok(()),
            Err(e) => {
                lock(&self.writer).close();
                Err(e)
            }
        }
    }

    fn conn_loop(&mut self, delegate: &mut dyn ConnectionDelegate) -> Result<()> {
        if self.is_client {
            lock(&self.writer).write_raw(CLIENT_PREFACE)?;
        } else {
            let mut preface = vec![0u8; CLIENT_PREFACE.len()];
            self.reader.read_exact(&mut preface)?;
            if preface != CLIENT_PREFACE {
                return Err(Error::InvalidPreface(preface));
            }
        }
        lock(&self.writer).write_frame(&self.settings_frame())?;
        self.initial_settings_written.set();

        loop {
            let frame = Frame::read_from(self.reader.as_mut())?;
            debug!(
                "got frame {:?} flags={:#x} stream={} len={}",
                frame.frame_type,
                frame.flags,
                frame.stream_id,
                frame.payload.len()
            );
            if frame.stream_id == 0 {
                self.handle_connection_frame(&frame)?;
            } else if !self.is_client && frame.frame_type == FrameType::Headers {
                // A completed stream's table entry is gone, but its id is
                // still spent: our outbound side may be mid-response on it.
                if self.streams.contains_key(&frame.stream_id)
                    || frame.stream_id <= self.max_peer_stream_id
                {
                    return Err(Error::DuplicateStream(frame.stream_id));
                }
                self.max_peer_stream_id = frame.stream_id;
                let stream = Stream::new(
                    frame.stream_id,
                    self.is_client,
                    self.writer.clone(),
                    self.encoder.clone(),
                );
                stream.set_delegate(delegate.start_request(&stream)?);
                self.streams.insert(frame.stream_id, stream.clone());
                self.dispatch(&stream, &frame)?;
            } else {
                match self.streams.get(&frame.stream_id).cloned() {
                    Some(stream) => self.dispatch(&stream, &frame)?,
                    // The table entry is dropped once a stream completes;
                    // a late RST_STREAM for it is a legal no-op.
                    None if frame.frame_type == FrameType::RstStream => {
                        debug!("ignoring RST_STREAM for completed stream {}", frame.stream_id);
                    }
                    None => return Err(Error::UnknownStream(frame.stream_id)),
                }
            }
        }
    }

    fn dispatch(&mut self, stream: &Stream, frame: &Frame) -> Result<()> {
        let status = stream.handle_frame(frame, &mut self.decoder, self.params.max_header_size)?;
        if status == StreamStatus::Closed {
            self.streams.remove(&frame.stream_id);
        }
        Ok(())
    }

    /// Stream-0 frames: SETTINGS and WINDOW_UPDATE only.
    fn handle_connection_frame(&mut self, frame: &Frame) -> Result<()> {
        match frame.frame_type {
            FrameType::Settings => self.handle_settings_frame(frame),
            // Flow control is not accounted; credit updates are accepted
            // and discarded.
            FrameType::WindowUpdate => Ok(()),
            other => Err(Error::InvalidConnectionFrame(other)),
        }
    }

    /// Our initial SETTINGS: clients disable server push, servers send an
    /// empty payload.
    fn settings_frame(&self) -> Frame {
        let payload = if self.is_client {
            let mut payload = Vec::with_capacity(6);
            payload.extend_from_slice(&settings_id::ENABLE_PUSH.to_be_bytes());
            payload.extend_from_slice(&0u32.to_be_bytes());
            payload
        } else {
            Vec::new()
        };
        Frame::new(FrameType::Settings, 0, 0, payload)
    }

    fn settings_ack_frame(&self) -> Frame {
        Frame::new(FrameType::Settings, flags::ACK, 0, Vec::new())
    }

    /// Received setting values are acknowledged but not applied; an ACK
    /// from the peer is ignored.
    fn handle_settings_frame(&mut self, frame: &Frame) -> Result<()> {
        if frame.flags & flags::ACK != 0 {
            return Ok(());
        }
        lock(&self.writer).write_frame(&self.settings_ack_frame())
    }
}

fn lock(writer: &Mutex<FrameWriter>) -> std::sync::MutexGuard<'_, FrameWriter> {
    writer.lock().unwrap_or_else(|e| e.into_inner())
}
