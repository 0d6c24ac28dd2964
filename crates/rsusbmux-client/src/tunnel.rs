use std::io::{Read, Write};
use std::net::Shutdown;

use bytes::{Buf, BytesMut};
use rsusbmux_transport::MuxStream;

use crate::error::Result;

/// An open tunnel to a TCP port on an attached device.
///
/// After the Connect handshake succeeds the daemon stops framing: every byte
/// on the connection belongs to the application. Bytes the handshake frame
/// reader had already buffered when the success result was decoded are
/// carried over here and served before any further socket reads, so nothing
/// that arrived alongside the result is lost or re-framed.
pub struct DeviceTunnel {
    residual: BytesMut,
    read_half: MuxStream,
    write_half: MuxStream,
}

impl DeviceTunnel {
    pub(crate) fn from_parts(
        read_half: MuxStream,
        residual: BytesMut,
        write_half: MuxStream,
    ) -> Self {
        Self {
            residual,
            read_half,
            write_half,
        }
    }

    /// Split into independently owned read and write halves.
    pub fn into_split(self) -> (TunnelReader, TunnelWriter) {
        (
            TunnelReader {
                residual: self.residual,
                stream: self.read_half,
            },
            TunnelWriter {
                stream: self.write_half,
            },
        )
    }

    /// Shut down both directions of the underlying connection.
    pub fn shutdown(&self) -> Result<()> {
        self.read_half.shutdown(Shutdown::Both).map_err(Into::into)
    }
}

impl Read for DeviceTunnel {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        read_residual_first(&mut self.residual, &mut self.read_half, buf)
    }
}

impl Write for DeviceTunnel {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.write_half.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.write_half.flush()
    }
}

impl std::fmt::Debug for DeviceTunnel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceTunnel")
            .field("residual", &self.residual.len())
            .finish()
    }
}

/// Read half of a split [`DeviceTunnel`].
pub struct TunnelReader {
    residual: BytesMut,
    stream: MuxStream,
}

impl Read for TunnelReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        read_residual_first(&mut self.residual, &mut self.stream, buf)
    }
}

/// Write half of a split [`DeviceTunnel`].
pub struct TunnelWriter {
    stream: MuxStream,
}

impl Write for TunnelWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.stream.flush()
    }
}

impl TunnelWriter {
    /// Signal EOF to the device side without touching the read half.
    pub fn shutdown_write(&self) -> Result<()> {
        self.stream.shutdown(Shutdown::Write).map_err(Into::into)
    }
}

fn read_residual_first(
    residual: &mut BytesMut,
    stream: &mut MuxStream,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    if !residual.is_empty() {
        let n = residual.len().min(buf.len());
        buf[..n].copy_from_slice(&residual[..n]);
        residual.advance(n);
        return Ok(n);
    }
    stream.read(buf)
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::net::UnixListener;
    use std::path::PathBuf;

    use rsusbmux_transport::MuxEndpoint;

    use super::*;

    fn connected_pair(tag: &str) -> (MuxStream, std::os::unix::net::UnixStream, PathBuf) {
        let dir = std::env::temp_dir().join(format!(
            "rsusbmux-tunnel-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        let sock_path = dir.join("muxd.sock");
        let listener = UnixListener::bind(&sock_path).unwrap();

        let path_clone = sock_path.clone();
        let connector =
            std::thread::spawn(move || MuxEndpoint::new(path_clone, 0).connect().unwrap());
        let (daemon_side, _addr) = listener.accept().unwrap();
        let client_side = connector.join().unwrap();

        (client_side, daemon_side, dir)
    }

    #[test]
    fn residual_bytes_come_first() {
        let (client, mut daemon, dir) = connected_pair("residual");
        let write_half = client.try_clone().unwrap();

        let mut tunnel =
            DeviceTunnel::from_parts(client, BytesMut::from(&b"buffered-"[..]), write_half);
        daemon.write_all(b"live").unwrap();

        let mut out = [0u8; 13];
        tunnel.read_exact(&mut out).unwrap();
        assert_eq!(&out, b"buffered-live");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn short_destination_buffer_drains_residual_incrementally() {
        let (client, _daemon, dir) = connected_pair("short-buf");
        let write_half = client.try_clone().unwrap();

        let mut tunnel =
            DeviceTunnel::from_parts(client, BytesMut::from(&b"abcdef"[..]), write_half);

        let mut out = [0u8; 4];
        assert_eq!(tunnel.read(&mut out).unwrap(), 4);
        assert_eq!(&out, b"abcd");
        assert_eq!(tunnel.read(&mut out).unwrap(), 2);
        assert_eq!(&out[..2], b"ef");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn writes_reach_the_daemon_side() {
        let (client, mut daemon, dir) = connected_pair("write");
        let write_half = client.try_clone().unwrap();

        let mut tunnel = DeviceTunnel::from_parts(client, BytesMut::new(), write_half);
        tunnel.write_all(b"ping").unwrap();
        tunnel.flush().unwrap();

        let mut buf = [0u8; 4];
        std::io::Read::read_exact(&mut daemon, &mut buf).unwrap();
        assert_eq!(&buf, b"ping");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn split_halves_work_independently() {
        let (client, mut daemon, dir) = connected_pair("split");
        let write_half = client.try_clone().unwrap();

        let tunnel = DeviceTunnel::from_parts(client, BytesMut::from(&b"head"[..]), write_half);
        let (mut reader, mut writer) = tunnel.into_split();

        writer.write_all(b"up").unwrap();
        let mut buf = [0u8; 2];
        std::io::Read::read_exact(&mut daemon, &mut buf).unwrap();
        assert_eq!(&buf, b"up");

        daemon.write_all(b"-tail").unwrap();
        let mut out = [0u8; 9];
        reader.read_exact(&mut out).unwrap();
        assert_eq!(&out, b"head-tail");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
