use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use hyper::client::conn::{self, SendRequest};
use hyper::{Body, Request, Response};
use tokio::net::{TcpSocket, TcpStream};

use crate::config::PoolConfig;
use crate::connection::{Connect, PoolableConnection};

#[derive(Debug, Clone, Default)]
/// Establishes HTTP/1 sessions against view endpoints.
///
/// Socket tuning and the connect deadline come from the pool's
/// [`PoolConfig`]; the HTTP wire mechanics themselves are hyper's problem.
pub struct HttpConnector;

#[async_trait]
impl Connect for HttpConnector {
    type Connection = HttpConnection;

    async fn connect(
        &self,
        addr: SocketAddr,
        config: &PoolConfig,
    ) -> io::Result<Self::Connection> {
        let stream = open_stream(addr, config).await?;

        let (send_request, connection) = conn::handshake(stream)
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

        // Drives the session until the peer hangs up or the handle drops.
        tokio::spawn(async move {
            if let Err(error) = connection.await {
                debug!(addr = %addr, error = %error, "http session ended with error");
            }
        });

        Ok(HttpConnection {
            send_request,
            remote_addr: addr,
            exchange_timeout: config.idle_read_timeout,
        })
    }
}

async fn open_stream(addr: SocketAddr, config: &PoolConfig) -> io::Result<TcpStream> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_recv_buffer_size(config.socket_buffer_size as u32)?;
    socket.set_send_buffer_size(config.socket_buffer_size as u32)?;
    socket.set_keepalive(config.tcp_keepalive)?;

    let stream = tokio::time::timeout(config.connect_timeout, socket.connect(addr))
        .await
        .map_err(|_| {
            io::Error::new(io::ErrorKind::TimedOut, "connect attempt timed out")
        })??;
    stream.set_nodelay(config.tcp_nodelay)?;

    Ok(stream)
}

/// One persistent HTTP/1 session to a view endpoint.
pub struct HttpConnection {
    send_request: SendRequest<Body>,
    remote_addr: SocketAddr,
    exchange_timeout: Duration,
}

impl HttpConnection {
    #[inline]
    /// The address of the remote endpoint.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Perform one request/response exchange on this session.
    ///
    /// The exchange is bounded by the configured read timeout; on timeout
    /// the session should be considered poisoned and released so the pool
    /// can discard it.
    pub async fn send(&mut self, request: Request<Body>) -> io::Result<Response<Body>> {
        let exchange = self.send_request.send_request(request);
        match tokio::time::timeout(self.exchange_timeout, exchange).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(error)) => Err(io::Error::new(io::ErrorKind::Other, error)),
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "view request timed out",
            )),
        }
    }
}

impl PoolableConnection for HttpConnection {
    fn is_open(&self) -> bool {
        !self.send_request.is_closed()
    }
}
