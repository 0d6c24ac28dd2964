use std::io::{Read, Write};
use std::net::Shutdown;

use crate::error::Result;

/// A connected stream to the usbmux daemon — implements Read + Write.
///
/// On Unix, this wraps a Unix domain socket stream.
/// On Windows, this wraps a loopback TCP stream.
pub struct MuxStream {
    inner: MuxStreamInner,
}

enum MuxStreamInner {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
    #[cfg(windows)]
    Tcp(std::net::TcpStream),
}

impl Read for MuxStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            MuxStreamInner::Unix(stream) => stream.read(buf),
            #[cfg(windows)]
            MuxStreamInner::Tcp(stream) => stream.read(buf),
        }
    }
}

impl Write for MuxStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            MuxStreamInner::Unix(stream) => stream.write(buf),
            #[cfg(windows)]
            MuxStreamInner::Tcp(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            MuxStreamInner::Unix(stream) => stream.flush(),
            #[cfg(windows)]
            MuxStreamInner::Tcp(stream) => stream.flush(),
        }
    }
}

impl MuxStream {
    /// Create a MuxStream from a Unix domain socket stream.
    #[cfg(unix)]
    pub(crate) fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: MuxStreamInner::Unix(stream),
        }
    }

    /// Create a MuxStream from a loopback TCP stream.
    #[cfg(windows)]
    pub(crate) fn from_tcp(stream: std::net::TcpStream) -> Self {
        Self {
            inner: MuxStreamInner::Tcp(stream),
        }
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            MuxStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            #[cfg(windows)]
            MuxStreamInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            MuxStreamInner::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            #[cfg(windows)]
            MuxStreamInner::Tcp(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    ///
    /// Clones share the underlying socket, including its timeouts.
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            #[cfg(unix)]
            MuxStreamInner::Unix(stream) => {
                let cloned = stream.try_clone()?;
                Ok(Self::from_unix(cloned))
            }
            #[cfg(windows)]
            MuxStreamInner::Tcp(stream) => {
                let cloned = stream.try_clone()?;
                Ok(Self::from_tcp(cloned))
            }
        }
    }

    /// Shut down one or both directions of the connection.
    pub fn shutdown(&self, how: Shutdown) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            MuxStreamInner::Unix(stream) => stream.shutdown(how).map_err(Into::into),
            #[cfg(windows)]
            MuxStreamInner::Tcp(stream) => stream.shutdown(how).map_err(Into::into),
        }
    }
}

impl std::fmt::Debug for MuxStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            #[cfg(unix)]
            MuxStreamInner::Unix(_) => f.debug_struct("MuxStream").field("type", &"unix").finish(),
            #[cfg(windows)]
            MuxStreamInner::Tcp(_) => f.debug_struct("MuxStream").field("type", &"tcp").finish(),
        }
    }
}
