//! TCP listener implementation.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use socket2::{Domain, Protocol, SockRef, Socket, TcpKeepalive, Type};
use tokio::net::{TcpListener as TokioTcpListener, TcpStream};

/// Pending-connection backlog passed to `listen(2)`.
pub const DEFAULT_BACKLOG: i32 = 1024;

/// A TCP listener that tunes each accepted stream.
pub struct TcpListener {
    inner: TokioTcpListener,
}

impl TcpListener {
    /// Create a new TCP listener bound to the given address.
    ///
    /// Port 0 picks a free port; see [`local_addr`](Self::local_addr).
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let std_listener = create_listener(addr, DEFAULT_BACKLOG)?;
        let inner = TokioTcpListener::from_std(std_listener)?;
        Ok(Self { inner })
    }

    /// Accept a connection with TCP_NODELAY and keepalive applied.
    pub async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        let (stream, addr) = self.inner.accept().await?;

        // Set TCP_NODELAY for lower latency
        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(error = %e, "Failed to set TCP_NODELAY");
        }

        let keepalive = TcpKeepalive::new()
            .with_time(Duration::from_secs(5))
            .with_interval(Duration::from_secs(1))
            .with_retries(3);
        if let Err(e) = SockRef::from(&stream).set_tcp_keepalive(&keepalive) {
            tracing::warn!(error = %e, "Failed to set TCP keepalive");
        }

        Ok((stream, addr))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}

fn create_listener(addr: SocketAddr, backlog: i32) -> io::Result<std::net::TcpListener> {
    let domain = if addr.is_ipv6() {
        Domain::IPV6
    } else {
        Domain::IPV4
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;

    Ok(socket.into())
}
