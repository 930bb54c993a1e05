//! Client for sending a payload to a ReplayLog server and collecting the replay

use crate::{ReplayLogError, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::time::{timeout, Duration};

/// Default time allowed for connecting and for the full replay
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// One connection to the server; each connection carries a single exchange
pub struct ReplayClient {
    stream: TcpStream,
    timeout: Duration,
}

impl ReplayClient {
    /// Connect with the default timeout
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        Self::connect_with_timeout(addr, DEFAULT_TIMEOUT).await
    }

    /// Connect, failing if the server does not accept within `limit`
    pub async fn connect_with_timeout<A: ToSocketAddrs>(addr: A, limit: Duration) -> Result<Self> {
        let stream = timeout(limit, TcpStream::connect(addr))
            .await
            .map_err(|_| ReplayLogError::Connection("Connection timeout".to_string()))?
            .map_err(|e| ReplayLogError::Connection(format!("Failed to connect: {}", e)))?;

        Ok(Self {
            stream,
            timeout: limit,
        })
    }

    /// Send `payload` and return everything the server replays.
    ///
    /// The payload should contain a newline, otherwise the server keeps
    /// waiting and this call times out.
    pub async fn send(mut self, payload: &[u8]) -> Result<Vec<u8>> {
        self.stream.write_all(payload).await?;
        self.stream.flush().await?;
        self.read_reply().await
    }

    /// Send `payload`, close the write half, and return whatever comes back.
    ///
    /// Without a newline in `payload` the server logs the bytes and replies
    /// with nothing.
    pub async fn send_and_close(mut self, payload: &[u8]) -> Result<Vec<u8>> {
        self.stream.write_all(payload).await?;
        self.stream.shutdown().await?;
        self.read_reply().await
    }

    async fn read_reply(mut self) -> Result<Vec<u8>> {
        let mut reply = Vec::new();
        timeout(self.timeout, self.stream.read_to_end(&mut reply))
            .await
            .map_err(|_| ReplayLogError::Connection("Timed out waiting for replay".to_string()))??;
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_refused_is_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = ReplayClient::connect(addr).await.err().unwrap();
        assert!(matches!(err, ReplayLogError::Connection(_)));
    }

    #[tokio::test]
    async fn test_send_reads_until_server_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 6];
            stream.read_exact(&mut buf).await.unwrap();
            stream.write_all(b"earlier\n").await.unwrap();
            stream.write_all(&buf).await.unwrap();
        });

        let client = ReplayClient::connect(addr).await.unwrap();
        let reply = client.send(b"hello\n").await.unwrap();
        server.await.unwrap();

        assert_eq!(reply, b"earlier\nhello\n");
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;
            drop(stream);
        });

        let client = ReplayClient::connect_with_timeout(addr, Duration::from_millis(100))
            .await
            .unwrap();
        let err = client.send(b"hello\n").await.unwrap_err();
        assert!(matches!(err, ReplayLogError::Connection(_)));
        server.await.unwrap();
    }
}
