//! One outbound connection to the server.
//!
//! A [`Connection`] owns its stream exclusively. Writes loop until the whole
//! frame is out; reads accumulate bytes in a [`LineBuffer`] until one reply is
//! complete, so short reads and replies split across segments are handled.
//!
//! # Example
//!
//! ```ignore
//! use agency_client::transport::{Connector, TcpConnector};
//!
//! let connector = TcpConnector::new("127.0.0.1:12345");
//! let mut conn = connector.connect().await?;
//! conn.send(b"end|1\n").await?;
//! let reply = conn.recv().await?;
//! conn.close().await?;
//! ```

use std::future::Future;
use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{ClientError, Result};
use crate::protocol::{LineBuffer, Reply};

/// Size of the stack buffer used for each socket read.
const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Opens fresh connections to the server.
///
/// The session opens one connection per batch, so the connector is asked
/// for a new one every time.
pub trait Connector {
    /// Stream type of the connections produced.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    /// Open one connection. Failure is [`ClientError::Connect`].
    fn connect(&self) -> impl Future<Output = Result<Connection<Self::Stream>>> + Send;
}

/// TCP connector for a fixed server address.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: String,
}

impl TcpConnector {
    /// Create a connector for `addr` (`host:port`).
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self) -> Result<Connection<TcpStream>> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|source| ClientError::Connect {
                addr: self.addr.clone(),
                source,
            })?;
        tracing::debug!(addr = %self.addr, "connected");
        Ok(Connection::new(stream, self.addr.clone()))
    }
}

/// A connected stream plus its reply buffer.
pub struct Connection<S> {
    stream: S,
    buffer: LineBuffer,
    peer: String,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    /// Wrap a connected stream.
    pub fn new(stream: S, peer: impl Into<String>) -> Self {
        Self {
            stream,
            buffer: LineBuffer::new(),
            peer: peer.into(),
        }
    }

    /// Write the whole buffer.
    ///
    /// Loops over short writes. A failure after part of the buffer went out
    /// is reported the same way as a failure before anything was written;
    /// there is no rollback.
    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut written = 0;
        while written < data.len() {
            match self.stream.write(&data[written..]).await {
                Ok(0) => {
                    return Err(ClientError::Send(io::Error::new(
                        io::ErrorKind::WriteZero,
                        format!("wrote {} of {} bytes", written, data.len()),
                    )))
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ClientError::Send(e)),
            }
        }
        self.stream.flush().await.map_err(ClientError::Send)?;
        Ok(())
    }

    /// Block until one complete reply arrives and decode it.
    pub async fn recv(&mut self) -> Result<Reply> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];

        loop {
            if let Some(line) = self.buffer.next_reply()? {
                tracing::trace!(peer = %self.peer, line = %line, "reply line");
                return Reply::decode(&line);
            }

            let n = self
                .stream
                .read(&mut chunk)
                .await
                .map_err(ClientError::Receive)?;
            if n == 0 {
                return Err(ClientError::ConnectionClosed);
            }
            self.buffer.extend(&chunk[..n]);
        }
    }

    /// Shut down the write half and release the stream.
    ///
    /// Consumes the connection, so it cannot be closed twice or used again.
    pub async fn close(mut self) -> Result<()> {
        self.stream.shutdown().await.map_err(ClientError::Send)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_send_writes_whole_frame() {
        let (client, mut server) = duplex(1024);
        let mut conn = Connection::new(client, "duplex");

        conn.send(b"end|1\n").await.unwrap();

        let mut buf = [0u8; 6];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"end|1\n");
    }

    #[tokio::test]
    async fn test_send_loops_over_short_writes() {
        // Pipe capacity far below the frame size forces partial writes.
        let (client, mut server) = duplex(7);
        let mut conn = Connection::new(client, "duplex");
        let payload = vec![b'x'; 1000];

        let reader = tokio::spawn(async move {
            let mut received = Vec::new();
            let mut buf = [0u8; 3];
            while received.len() < 1000 {
                let n = server.read(&mut buf).await.unwrap();
                received.extend_from_slice(&buf[..n]);
            }
            received
        });

        conn.send(&payload).await.unwrap();
        assert_eq!(reader.await.unwrap(), payload);
    }

    #[tokio::test]
    async fn test_send_after_peer_dropped_fails() {
        let (client, server) = duplex(64);
        drop(server);
        let mut conn = Connection::new(client, "duplex");

        let err = conn.send(b"win|1\n").await.unwrap_err();
        assert!(err.is_transport());
        assert!(matches!(err, ClientError::Send(_)));
    }

    #[tokio::test]
    async fn test_recv_decodes_reply() {
        let (client, mut server) = duplex(64);
        let mut conn = Connection::new(client, "duplex");

        server.write_all(b"|ack 8\n").await.unwrap();
        assert_eq!(conn.recv().await.unwrap(), Reply::Ack(8));
    }

    #[tokio::test]
    async fn test_recv_joins_split_reply() {
        let (client, mut server) = duplex(64);
        let mut conn = Connection::new(client, "duplex");

        let writer = tokio::spawn(async move {
            server.write_all(b"|").await.unwrap();
            server.write_all(b"\nwin 5 12 7\n").await.unwrap();
            server
        });

        assert_eq!(
            conn.recv().await.unwrap(),
            Reply::Winners(vec!["5".into(), "12".into(), "7".into()])
        );
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_recv_keeps_following_replies_buffered() {
        let (client, mut server) = duplex(64);
        let mut conn = Connection::new(client, "duplex");

        server.write_all(b"|win\n|win 3\n").await.unwrap();
        assert_eq!(conn.recv().await.unwrap(), Reply::Winners(vec![]));
        assert_eq!(conn.recv().await.unwrap(), Reply::Winners(vec!["3".into()]));
    }

    #[tokio::test]
    async fn test_recv_on_closed_peer() {
        let (client, mut server) = duplex(64);
        let mut conn = Connection::new(client, "duplex");

        server.write_all(b"|ack").await.unwrap();
        drop(server);

        assert!(matches!(
            conn.recv().await.unwrap_err(),
            ClientError::ConnectionClosed
        ));
    }

    #[tokio::test]
    async fn test_recv_invalid_ack() {
        let (client, mut server) = duplex(64);
        let mut conn = Connection::new(client, "duplex");

        server.write_all(b"|ack many\n").await.unwrap();
        assert!(matches!(
            conn.recv().await.unwrap_err(),
            ClientError::InvalidAck(_)
        ));
    }

    #[tokio::test]
    async fn test_close_shuts_down_write_half() {
        let (client, mut server) = duplex(64);
        let conn = Connection::new(client, "duplex");

        conn.close().await.unwrap();

        let mut buf = Vec::new();
        let n = server.read_to_end(&mut buf).await.unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_tcp_connect_failure() {
        // Bind then drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = TcpConnector::new(addr.clone()).connect().await;
        match result {
            Err(ClientError::Connect { addr: a, .. }) => assert_eq!(a, addr),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("connect should fail"),
        }
    }
}
