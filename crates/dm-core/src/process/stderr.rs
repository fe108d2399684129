//! Bounded stderr capture.

use std::collections::VecDeque;
use std::io::Read;

/// Tail buffer holding at most `limit` bytes of a process's stderr.
///
/// When full, the oldest bytes are dropped; the most recent output is what
/// explains a failure.
#[derive(Debug)]
pub struct StderrTail {
    buf: VecDeque<u8>,
    limit: usize,
    truncated: bool,
}

impl StderrTail {
    pub fn new(limit: usize) -> Self {
        StderrTail {
            buf: VecDeque::with_capacity(limit.min(8192)),
            limit,
            truncated: false,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        let bytes = if bytes.len() > self.limit {
            self.truncated = true;
            self.buf.clear();
            &bytes[bytes.len() - self.limit..]
        } else {
            bytes
        };
        let overflow = (self.buf.len() + bytes.len()).saturating_sub(self.limit);
        if overflow > 0 {
            self.truncated = true;
            self.buf.drain(..overflow);
        }
        self.buf.extend(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// Lossy UTF-8 view of the retained bytes.
    pub fn contents(&self) -> String {
        let (a, b) = self.buf.as_slices();
        let mut bytes = Vec::with_capacity(a.len() + b.len());
        bytes.extend_from_slice(a);
        bytes.extend_from_slice(b);
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Read everything currently available from a non-blocking stream.
    ///
    /// Returns `Ok(true)` once the stream reached EOF.
    pub fn drain_from<R: Read>(&mut self, stream: &mut R) -> std::io::Result<bool> {
        let mut chunk = [0u8; 8192];
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => return Ok(true),
                Ok(n) => self.push(&chunk[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(false),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

/// Put a pipe into non-blocking mode so polls never stall on it.
#[cfg(unix)]
pub(crate) fn set_nonblocking<F: std::os::unix::io::AsRawFd>(stream: &F) -> std::io::Result<()> {
    let fd = stream.as_raw_fd();

    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(std::io::Error::last_os_error());
    }
    if flags & libc::O_NONBLOCK == 0 {
        let result = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
        if result < 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    Ok(())
}
