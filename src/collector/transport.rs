//! Request/response over PowerDNS control sockets.
//!
//! The authoritative server listens on a `SOCK_STREAM` UNIX socket: the
//! command is sent NUL-terminated and the reply is read until the server
//! closes the connection.
//!
//! The recursor listens on a `SOCK_DGRAM` UNIX socket and answers to the
//! sender's address, so the requester must be bound to a path the recursor
//! can write to. All datagram requests share one local path, guarded by
//! [`LocalSocket`].

use std::borrow::Cow;
use std::fs::{self, Permissions};
use std::io::{self, Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::{UnixDatagram, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use tracing::{debug, warn};

/// Size of a single receive.
pub const RECV_BUFFER_SIZE: usize = 4096;

/// Default local bind path for datagram requests.
pub const DEFAULT_LOCAL_SOCKET: &str = "/var/run/pdnsstat-powerdns";

/// Socket type used to reach a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Stream,
    Datagram,
}

/// Error type for transport failures. Each variant names the failed step.
#[derive(Debug)]
pub enum TransportError {
    /// Setting a socket option (read/write timeout) failed.
    Socket(io::Error),
    /// Removing a stale local socket file failed.
    Unlink(io::Error),
    /// Creating or binding the local datagram socket failed.
    Bind(io::Error),
    Chmod(io::Error),
    Connect(io::Error),
    Send(io::Error),
    Recv(io::Error),
    /// A previous datagram request panicked while holding the local socket.
    LockPoisoned,
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Socket(e) => write!(f, "socket option failed: {}", e),
            TransportError::Unlink(e) => write!(f, "unlink failed: {}", e),
            TransportError::Bind(e) => write!(f, "bind failed: {}", e),
            TransportError::Chmod(e) => write!(f, "chmod failed: {}", e),
            TransportError::Connect(e) => write!(f, "connect failed: {}", e),
            TransportError::Send(e) => write!(f, "send failed: {}", e),
            TransportError::Recv(e) => write!(f, "recv failed: {}", e),
            TransportError::LockPoisoned => write!(f, "local socket lock poisoned"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Complete reply read from a control socket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    data: Vec<u8>,
}

impl Reply {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Reply as text, up to the first NUL byte.
    pub fn text(&self) -> Cow<'_, str> {
        let end = self
            .data
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.data.len());
        String::from_utf8_lossy(&self.data[..end])
    }
}

/// Local bind path for datagram requests.
///
/// Holding the lock serializes the unlink/bind/request/unlink sequence, so
/// concurrent requests never race on the shared path.
#[derive(Debug)]
pub struct LocalSocket {
    path: PathBuf,
    lock: Mutex<()>,
}

impl LocalSocket {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for LocalSocket {
    fn default() -> Self {
        Self::new(DEFAULT_LOCAL_SOCKET)
    }
}

/// Removes the local socket file when dropped.
struct UnlinkGuard<'a> {
    path: &'a Path,
}

impl Drop for UnlinkGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(self.path)
            && e.kind() != io::ErrorKind::NotFound
        {
            warn!("failed to remove {}: {}", self.path.display(), e);
        }
    }
}

/// Sends `command` to `socket` over the given transport and returns the reply.
pub fn fetch(
    kind: TransportKind,
    socket: &Path,
    command: &str,
    local: &LocalSocket,
    timeout: Option<Duration>,
) -> Result<Reply, TransportError> {
    match kind {
        TransportKind::Datagram => fetch_datagram(socket, command, local, timeout),
        TransportKind::Stream => fetch_stream(socket, command, timeout),
    }
}

/// Datagram request: the reply must fit into one receive.
pub fn fetch_datagram(
    socket: &Path,
    command: &str,
    local: &LocalSocket,
    timeout: Option<Duration>,
) -> Result<Reply, TransportError> {
    let _held = local.lock.lock().map_err(|_| TransportError::LockPoisoned)?;
    let local_path = local.path();

    match fs::remove_file(local_path) {
        Ok(()) => debug!("removed stale local socket {}", local_path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(TransportError::Unlink(e)),
    }

    let _unlink = UnlinkGuard { path: local_path };

    let sock = UnixDatagram::bind(local_path).map_err(TransportError::Bind)?;
    // The recursor runs as a different user and must be able to answer.
    fs::set_permissions(local_path, Permissions::from_mode(0o666))
        .map_err(TransportError::Chmod)?;
    sock.connect(socket).map_err(TransportError::Connect)?;
    sock.set_read_timeout(timeout)
        .map_err(TransportError::Socket)?;
    sock.set_write_timeout(timeout)
        .map_err(TransportError::Socket)?;

    sock.send(command.as_bytes()).map_err(TransportError::Send)?;

    let mut buf = [0u8; RECV_BUFFER_SIZE];
    let n = loop {
        match sock.recv(&mut buf) {
            Ok(n) => break n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(TransportError::Recv(e)),
        }
    };

    debug!("received {} bytes from {}", n, socket.display());
    Ok(Reply::new(buf[..n].to_vec()))
}

/// Stream request: the command goes out NUL-terminated, the reply is read
/// until the server closes the connection.
pub fn fetch_stream(
    socket: &Path,
    command: &str,
    timeout: Option<Duration>,
) -> Result<Reply, TransportError> {
    let mut stream = UnixStream::connect(socket).map_err(TransportError::Connect)?;
    stream
        .set_read_timeout(timeout)
        .map_err(TransportError::Socket)?;
    stream
        .set_write_timeout(timeout)
        .map_err(TransportError::Socket)?;

    let mut request = Vec::with_capacity(command.len() + 1);
    request.extend_from_slice(command.as_bytes());
    request.push(0);
    stream.write_all(&request).map_err(TransportError::Send)?;

    let mut data = Vec::new();
    let mut buf = [0u8; RECV_BUFFER_SIZE];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => data.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(TransportError::Recv(e)),
        }
    }

    debug!("received {} bytes from {}", data.len(), socket.display());
    Ok(Reply::new(data))
}
