//! Background read-ahead with a per-read timeout.
//!
//! A dedicated thread reads fixed-size chunks from the inner reader into a
//! bounded channel. The consumer waits at most `timeout` for each chunk, so a
//! stalled network mount fails the run instead of hanging it.

use std::fmt;
use std::io::{self, Read};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};

/// Payload of the `TimedOut` I/O error returned by [`ReadAhead`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadTimeout {
    /// The timeout that elapsed.
    pub timeout_ms: u64,
}

impl fmt::Display for ReadTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no data within {}ms", self.timeout_ms)
    }
}

impl std::error::Error for ReadTimeout {}

/// A `Read` adapter fed by a background reader thread.
pub struct ReadAhead {
    rx: Receiver<io::Result<Vec<u8>>>,
    current: Vec<u8>,
    pos: usize,
    timeout: Option<Duration>,
    eof: bool,
}

impl ReadAhead {
    /// Starts reading `inner` on a background thread.
    ///
    /// At most `depth` chunks of `chunk_size` bytes are buffered ahead of the
    /// consumer. The thread exits at end of input, on error, or once the
    /// `ReadAhead` is dropped and its next send fails.
    ///
    /// # Errors
    /// Returns the error from spawning the thread.
    pub fn spawn<R>(
        mut inner: R,
        chunk_size: usize,
        depth: usize,
        timeout: Option<Duration>,
    ) -> io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let chunk_size = chunk_size.max(1);
        let (tx, rx) = bounded::<io::Result<Vec<u8>>>(depth.max(1));

        thread::Builder::new()
            .name("seatmap-read-ahead".to_string())
            .spawn(move || loop {
                let mut chunk = vec![0u8; chunk_size];
                match inner.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => {
                        chunk.truncate(n);
                        if tx.send(Ok(chunk)).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        break;
                    }
                }
            })?;

        Ok(Self {
            rx,
            current: Vec::new(),
            pos: 0,
            timeout,
            eof: false,
        })
    }

    fn next_chunk(&mut self) -> io::Result<bool> {
        let received = match self.timeout {
            Some(timeout) => self.rx.recv_timeout(timeout).map_err(|e| match e {
                RecvTimeoutError::Timeout => Some(timeout),
                RecvTimeoutError::Disconnected => None,
            }),
            None => self.rx.recv().map_err(|_| None),
        };

        match received {
            Ok(Ok(chunk)) => {
                self.current = chunk;
                self.pos = 0;
                Ok(true)
            }
            Ok(Err(e)) => Err(e),
            Err(None) => {
                self.eof = true;
                Ok(false)
            }
            Err(Some(timeout)) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                ReadTimeout {
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                },
            )),
        }
    }
}

impl Read for ReadAhead {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pos >= self.current.len() {
            if self.eof || !self.next_chunk()? {
                return Ok(0);
            }
        }
        let n = buf.len().min(self.current.len() - self.pos);
        buf[..n].copy_from_slice(&self.current[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
