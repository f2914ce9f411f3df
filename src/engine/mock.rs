//! Scripted in-memory engine for unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::rc::Rc;

use super::{EngineStatus, TlsSession};
use crate::error::FatalKind;
use crate::net::connection::Socket;

/// Event injected in place of the next engine attempt.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Hiccup {
    WantRead,
    WantWrite,
    Fatal(FatalKind),
}

impl Hiccup {
    fn status<T>(self) -> EngineStatus<T> {
        match self {
            Hiccup::WantRead => EngineStatus::WantRead,
            Hiccup::WantWrite => EngineStatus::WantWrite,
            Hiccup::Fatal(kind) => EngineStatus::Fatal(kind, "injected failure".to_string()),
        }
    }
}

#[derive(Debug, Default)]
struct PipeState {
    bytes: VecDeque<u8>,
    closed: bool,
}

#[derive(Debug, Default, Clone)]
pub(crate) struct Pipe(Rc<RefCell<PipeState>>);

/// Plaintext moves straight through shared pipes; no records involved.
#[derive(Debug)]
pub(crate) struct ScriptedSession {
    hiccups: VecDeque<Hiccup>,
    handshaking: bool,
    outbound: Pipe,
    inbound: Pipe,
    max_chunk: usize,
}

impl ScriptedSession {
    pub(crate) fn new(outbound: Pipe, inbound: Pipe) -> Self {
        Self {
            hiccups: VecDeque::new(),
            handshaking: true,
            outbound,
            inbound,
            max_chunk: usize::MAX,
        }
    }

    /// Two sessions wired to each other.
    pub(crate) fn pair() -> (Self, Self) {
        let a_to_b = Pipe::default();
        let b_to_a = Pipe::default();
        (
            Self::new(a_to_b.clone(), b_to_a.clone()),
            Self::new(b_to_a, a_to_b),
        )
    }

    pub(crate) fn with_max_chunk(mut self, max_chunk: usize) -> Self {
        self.max_chunk = max_chunk.max(1);
        self
    }

    pub(crate) fn inject(&mut self, hiccup: Hiccup) {
        self.hiccups.push_back(hiccup);
    }

    pub(crate) fn pending_hiccups(&self) -> usize {
        self.hiccups.len()
    }
}

impl TlsSession for ScriptedSession {
    fn handshake_attempt<T: Read + Write>(&mut self, _io: &mut T) -> EngineStatus<()> {
        if let Some(h) = self.hiccups.pop_front() {
            return h.status();
        }
        self.handshaking = false;
        EngineStatus::Progress(())
    }

    fn write_attempt<T: Read + Write>(&mut self, _io: &mut T, buf: &[u8]) -> EngineStatus<usize> {
        if let Some(h) = self.hiccups.pop_front() {
            return h.status();
        }
        let mut out = self.outbound.0.borrow_mut();
        if out.closed {
            return EngineStatus::Fatal(FatalKind::PeerReset, "pipe closed".to_string());
        }
        let n = buf.len().min(self.max_chunk);
        out.bytes.extend(&buf[..n]);
        EngineStatus::Progress(n)
    }

    fn read_attempt<T: Read + Write>(&mut self, _io: &mut T, buf: &mut [u8]) -> EngineStatus<usize> {
        if let Some(h) = self.hiccups.pop_front() {
            return h.status();
        }
        let mut inbound = self.inbound.0.borrow_mut();
        if inbound.bytes.is_empty() {
            if inbound.closed {
                return EngineStatus::Fatal(FatalKind::PeerReset, "peer closed".to_string());
            }
            return EngineStatus::WantRead;
        }
        let n = buf.len().min(self.max_chunk).min(inbound.bytes.len());
        for (slot, byte) in buf.iter_mut().zip(inbound.bytes.drain(..n)) {
            *slot = byte;
        }
        EngineStatus::Progress(n)
    }

    fn shutdown<T: Read + Write>(&mut self, _io: &mut T) {
        self.outbound.0.borrow_mut().closed = true;
    }

    fn is_handshaking(&self) -> bool {
        self.handshaking
    }
}

/// Socket backed by one end of a Unix socket pair so `poll` sees a real fd.
#[derive(Debug)]
pub(crate) struct MockSocket {
    stream: UnixStream,
}

impl MockSocket {
    /// Returns the socket and the peer end used to make it readable.
    pub(crate) fn pair() -> (Self, UnixStream) {
        let (ours, theirs) = UnixStream::pair().expect("socketpair");
        (Self { stream: ours }, theirs)
    }
}

impl Read for MockSocket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for MockSocket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl AsRawFd for MockSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}

impl Socket for MockSocket {
    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        self.stream.set_nonblocking(nonblocking)
    }
}
