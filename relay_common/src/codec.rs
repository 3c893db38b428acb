//! Whole-record I/O over byte streams.
//!
//! Each call moves exactly one [`Message`]. Partial reads and writes are
//! accumulated until the full 576-byte image has been transferred, and
//! `EINTR` is retried. Nothing is buffered between calls.
//!
//! Failures are reported, never escalated: the caller owning the stream
//! decides whether a failure ends a session or only one operation.

use crate::consts::MESSAGE_SIZE;
use crate::message::Message;
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use std::io::{self, ErrorKind, Read, Write};
use std::os::fd::AsFd;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors produced while moving a record over a stream.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Peer closed the stream before any byte of the record arrived.
    #[error("Connection closed by peer")]
    Closed,

    /// Peer closed the stream in the middle of a record.
    #[error("Connection closed mid-record after {received} bytes")]
    Truncated {
        /// Bytes received before the stream ended
        received: usize,
    },

    /// A full record arrived but failed validation.
    #[error("Received invalid message record")]
    Invalid,

    /// No data became readable within the requested timeout.
    #[error("Timed out waiting for a message")]
    TimedOut,

    /// IO error
    #[error("IO error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: io::Error,
    },
}

impl CodecError {
    /// `true` when the error means the peer is gone.
    pub fn is_disconnect(&self) -> bool {
        match self {
            CodecError::Closed | CodecError::Truncated { .. } => true,
            CodecError::Io { source } => matches!(
                source.kind(),
                ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::BrokenPipe
                    | ErrorKind::UnexpectedEof
                    | ErrorKind::NotConnected
            ),
            CodecError::Invalid | CodecError::TimedOut => false,
        }
    }
}

/// Send the byte image of `msg`.
pub fn write_message<W: Write>(stream: &mut W, msg: &Message) -> Result<(), CodecError> {
    let bytes = msg.to_bytes();
    let mut sent = 0;

    while sent < MESSAGE_SIZE {
        match stream.write(&bytes[sent..]) {
            Ok(0) => {
                debug!("Connection closed while sending");
                return Err(CodecError::Closed);
            }
            Ok(n) => sent += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    stream.flush()?;
    Ok(())
}

/// Receive one record, blocking until it is complete.
///
/// Fails with [`CodecError::Closed`] on a clean end of stream,
/// [`CodecError::Truncated`] if the stream ends mid-record and
/// [`CodecError::Invalid`] if the assembled record is not valid.
pub fn read_message<R: Read>(stream: &mut R) -> Result<Message, CodecError> {
    let mut buf = [0u8; MESSAGE_SIZE];
    let mut received = 0;

    while received < MESSAGE_SIZE {
        match stream.read(&mut buf[received..]) {
            Ok(0) if received == 0 => return Err(CodecError::Closed),
            Ok(0) => {
                warn!(received, "Connection closed during receive");
                return Err(CodecError::Truncated { received });
            }
            Ok(n) => received += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    let msg = Message::from_bytes(&buf);
    if !msg.is_valid() {
        warn!("Received invalid message");
        return Err(CodecError::Invalid);
    }
    Ok(msg)
}

/// Like [`read_message`], but first waits up to `timeout` for the stream to
/// become readable. `None` blocks indefinitely.
///
/// The timeout bounds the wait for the first byte only; once data is
/// flowing the rest of the record is read to completion.
pub fn read_message_timeout<S: Read + AsFd>(
    stream: &mut S,
    timeout: Option<Duration>,
) -> Result<Message, CodecError> {
    if let Some(timeout) = timeout {
        wait_readable(&*stream, timeout)?;
    }
    read_message(stream)
}

/// Block until `fd` is readable, hung up, or `timeout` elapses.
pub fn wait_readable<F: AsFd>(fd: &F, timeout: Duration) -> Result<(), CodecError> {
    let deadline = Instant::now() + timeout;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let millis = remaining.as_micros().div_ceil(1000);
        let slice = PollTimeout::from(u16::try_from(millis).unwrap_or(u16::MAX));
        let mut fds = [PollFd::new(fd.as_fd(), PollFlags::POLLIN)];

        match poll(&mut fds, slice) {
            Ok(0) => {
                if Instant::now() >= deadline {
                    return Err(CodecError::TimedOut);
                }
            }
            Ok(_) => return Ok(()),
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(io::Error::from(e).into()),
        }
    }
}
