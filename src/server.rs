//! TCP listener.
//!
//! Binds the configured address and hands every accepted connection to
//! its own handler task. The accept loop never serves requests itself.

use crate::config::Config;
use crate::handler::{Handler, Settings};
use crate::source::DataFiles;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Owns the listening socket and the accept loop.
pub struct Listener {
    listener: TcpListener,
    handler: Arc<Handler>,
}

impl Listener {
    /// Bind and start listening on `config.listen`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(config: &Config) -> io::Result<Self> {
        let addr: SocketAddr = config
            .listen
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let listener = create_listener(addr, config.backlog)?;
        let handler = Handler::new(
            Settings::from(config),
            DataFiles::new(config.lists_path.clone(), config.values_path.clone()),
        );

        Ok(Self::from_parts(TcpListener::from_std(listener)?, handler))
    }

    /// Wrap an already listening socket.
    pub fn from_parts(listener: TcpListener, handler: Handler) -> Self {
        Self {
            listener,
            handler: Arc::new(handler),
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever.
    pub async fn run(self) {
        if let Ok(addr) = self.listener.local_addr() {
            info!(address = %addr, "Server listening");
        }

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    info!(peer = %peer, "Accepted connection");

                    let handler = Arc::clone(&self.handler);
                    tokio::spawn(async move {
                        handler.run(stream, peer).await;
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}

/// Create a listening socket with SO_REUSEADDR.
fn create_listener(addr: SocketAddr, backlog: i32) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;

    Ok(socket.into())
}
