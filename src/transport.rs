//! The byte-stream transport seam.
//!
//! The engine only needs a reliable, ordered, bidirectional byte channel
//! with read-exact and write-all operations and a closed signal. The
//! connection loop owns the read half; the write half is shared with
//! streams behind the connection's writer lock.
//!
//! `std::net::TcpStream` implements the seam directly (the write half is a
//! `try_clone` of the socket). [`mem::pair`] provides an in-memory duplex
//! pipe for tests and in-process use.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};

use crate::error::{Error, Result};

/// Read half of a transport. Exactly one owner: the connection loop.
pub trait TransportRead: Send {
    /// Fill `buf` completely, or fail.
    ///
    /// End-of-stream before `buf` is full must surface as [`Error::Closed`],
    /// a condition the connection loop treats as graceful shutdown.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()>;
}

/// Write half of a transport.
pub trait TransportWrite: Send {
    fn write_all(&mut self, buf: &[u8]) -> Result<()>;

    /// Close the transport. Idempotent; later writes fail with
    /// [`Error::Closed`] or an I/O error.
    fn close(&mut self);
}

/// A transport that can be split into independent read and write halves.
pub trait Transport {
    type Read: TransportRead + 'static;
    type Write: TransportWrite + 'static;

    fn split(self) -> Result<(Self::Read, Self::Write)>;
}

fn map_eof(err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::UnexpectedEof
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::BrokenPipe => Error::Closed,
        _ => Error::Io(err),
    }
}

impl TransportRead for TcpStream {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        Read::read_exact(self, buf).map_err(map_eof)
    }
}

impl TransportWrite for TcpStream {
    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        Write::write_all(self, buf).map_err(map_eof)
    }

    fn close(&mut self) {
        let _ = self.shutdown(Shutdown::Both);
    }
}

impl Transport for TcpStream {
    type Read = TcpStream;
    type Write = TcpStream;

    fn split(self) -> Result<(Self::Read, Self::Write)> {
        let write = self.try_clone()?;
        Ok((self, write))
    }
}

pub mod mem {
    //! In-memory duplex pipe: two connected transport ends.

    use std::collections::VecDeque;
    use std::sync::{Arc, Condvar, Mutex};

    use super::{Transport, TransportRead, TransportWrite};
    use crate::error::{Error, Result};

    #[derive(Default)]
    struct ChannelState {
        buf: VecDeque<u8>,
        closed: bool,
    }

    /// One direction of byte flow.
    #[derive(Default)]
    struct Channel {
        state: Mutex<ChannelState>,
        readable: Condvar,
    }

    impl Channel {
        fn write_all(&self, data: &[u8]) -> Result<()> {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if state.closed {
                return Err(Error::Closed);
            }
            state.buf.extend(data);
            self.readable.notify_all();
            Ok(())
        }

        fn read_exact(&self, buf: &mut [u8]) -> Result<()> {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            while state.buf.len() < buf.len() {
                if state.closed {
                    return Err(Error::Closed);
                }
                state = self
                    .readable
                    .wait(state)
                    .unwrap_or_else(|e| e.into_inner());
            }
            for slot in buf.iter_mut() {
                // VecDeque is long enough: checked above.
                *slot = state.buf.pop_front().unwrap_or_default();
            }
            Ok(())
        }

        fn close(&self) {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.closed = true;
            self.readable.notify_all();
        }
    }

    /// Read half of one pipe end.
    pub struct PipeReader {
        incoming: Arc<Channel>,
    }

    /// Write half of one pipe end. Closes its direction on drop so the
    /// peer's read loop observes end-of-stream.
    pub struct PipeWriter {
        outgoing: Arc<Channel>,
    }

    /// One end of an in-memory duplex pipe.
    pub struct PipeTransport {
        incoming: Arc<Channel>,
        outgoing: Arc<Channel>,
    }

    impl TransportRead for PipeReader {
        fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
            self.incoming.read_exact(buf)
        }
    }

    impl TransportWrite for PipeWriter {
        fn write_all(&mut self, buf: &[u8]) -> Result<()> {
            self.outgoing.write_all(buf)
        }

        fn close(&mut self) {
            self.outgoing.close();
        }
    }

    impl Drop for PipeWriter {
        fn drop(&mut self) {
            self.outgoing.close();
        }
    }

    impl Transport for PipeTransport {
        type Read = PipeReader;
        type Write = PipeWriter;

        fn split(self) -> Result<(Self::Read, Self::Write)> {
            Ok((
                PipeReader {
                    incoming: self.incoming,
                },
                PipeWriter {
                    outgoing: self.outgoing,
                },
            ))
        }
    }

    /// Create a connected pair of in-memory transports. Bytes written to
    /// one end are read from the other, in order.
    pub fn pair() -> (PipeTransport, PipeTransport) {
        let a_to_b = Arc::new(Channel::default());
        let b_to_a = Arc::new(Channel::default());
        (
            PipeTransport {
                incoming: b_to_a.clone(),
                outgoing: a_to_b.clone(),
            },
            PipeTransport {
                incoming: a_to_b,
                outgoing: b_to_a,
            },
        )
    }
}
