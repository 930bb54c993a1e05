//! Passive TCP socket setup
//!
//! Binding and listening are split so the daemonizer can run on an already
//! bound socket before `listen` is ever called.

use crate::config::ServerSettings;
use crate::{ReplayLogError, Result};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use tracing::debug;

/// A bound, not yet listening, stream socket
#[derive(Debug)]
pub struct BoundSocket {
    socket: Socket,
    local_addr: SocketAddr,
}

/// Resolve the configured passive address
pub fn resolve(settings: &ServerSettings) -> Result<SocketAddr> {
    let host = settings.bind_address.as_str();
    let mut candidates = (host, settings.port).to_socket_addrs().map_err(|e| {
        ReplayLogError::Resolve(format!("{}:{}: {}", host, settings.port, e))
    })?;

    candidates.next().ok_or_else(|| {
        ReplayLogError::Resolve(format!("{}:{} resolved to no addresses", host, settings.port))
    })
}

/// Create a stream socket with address reuse and bind it
pub fn bind(settings: &ServerSettings) -> Result<BoundSocket> {
    let addr = resolve(settings)?;

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(|e| ReplayLogError::Socket(format!("socket creation failed: {}", e)))?;
    socket
        .set_reuse_address(true)
        .map_err(|e| ReplayLogError::Socket(format!("setsockopt SO_REUSEADDR failed: {}", e)))?;
    socket
        .bind(&addr.into())
        .map_err(|e| ReplayLogError::Socket(format!("bind {} failed: {}", addr, e)))?;

    // Port 0 is only known after bind.
    let local_addr = socket
        .local_addr()
        .ok()
        .and_then(|local| local.as_socket())
        .unwrap_or(addr);

    debug!(%local_addr, "Socket bound");
    Ok(BoundSocket { socket, local_addr })
}

impl BoundSocket {
    /// Address the socket is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Start listening and hand the descriptor over as a std listener
    pub fn listen(self, backlog: u32) -> Result<TcpListener> {
        let backlog = i32::try_from(backlog).unwrap_or(i32::MAX);
        self.socket
            .listen(backlog)
            .map_err(|e| ReplayLogError::Socket(format!("listen failed: {}", e)))?;
        Ok(self.socket.into())
    }
}
