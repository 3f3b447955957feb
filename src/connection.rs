use crate::error::{DeviceError, Result};
use crate::protocol::Request;
use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Largest response read per request; the device's replies always fit
pub const READ_BUFFER_SIZE: usize = 1024;

/// Sent after every command line; the device's line reader only
/// picks up the command once more bytes arrive.
const FLUSH_NUDGE: &[u8] = b" ";

/// Low-level one-shot TCP exchange with the device
///
/// Every request opens a fresh connection, writes one command line,
/// reads a single buffer and closes. The stream is dropped on every
/// exit path, which closes the socket.
#[derive(Debug, Clone)]
pub struct Connection {
    host: String,
    port: u16,
    timeout: Duration,
}

impl Connection {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Send a request and wait for the response chunk
    pub async fn send_request(&self, request: &Request) -> Result<String> {
        let mut stream = self.open_and_send(request).await?;
        self.read_reply(&mut stream).await
    }

    /// Send a request without requiring a response (fire and forget)
    ///
    /// The reply is still read and handed back when one arrives, but a
    /// missing or late reply is only logged.
    pub async fn send_only(&self, request: &Request) -> Result<Option<String>> {
        let mut stream = self.open_and_send(request).await?;

        match self.read_reply(&mut stream).await {
            Ok(reply) => Ok(Some(reply)),
            Err(e) => {
                tracing::debug!("No reply to {:?}: {}", request.method, e);
                Ok(None)
            }
        }
    }

    async fn open_and_send(&self, request: &Request) -> Result<TcpStream> {
        let line = request.to_line()?;
        tracing::debug!("Connecting to {}:{}", self.host, self.port);

        let mut stream = match timeout(
            self.timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(DeviceError::ConnectFailed(e)),
            Err(_) => return Err(DeviceError::Timeout),
        };

        tracing::debug!("Sending: {}", line.trim_end());

        let write = async {
            stream.write_all(line.as_bytes()).await?;
            stream.write_all(FLUSH_NUDGE).await?;
            stream.flush().await
        };

        let sent = timeout(self.timeout, write).await;
        match sent {
            Ok(Ok(())) => Ok(stream),
            Ok(Err(e)) => Err(DeviceError::SendFailed(e)),
            Err(_) => Err(DeviceError::Timeout),
        }
    }

    async fn read_reply(&self, stream: &mut TcpStream) -> Result<String> {
        let mut buffer = [0u8; READ_BUFFER_SIZE];

        let n = match timeout(self.timeout, stream.read(&mut buffer)).await {
            Ok(Ok(0)) => return Err(DeviceError::ClosedByPeer),
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                return Err(match e.kind() {
                    ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::BrokenPipe => DeviceError::ClosedByPeer,
                    _ => DeviceError::Io(e),
                })
            }
            Err(_) => return Err(DeviceError::Timeout),
        };

        Ok(String::from_utf8_lossy(&buffer[..n]).into_owned())
    }
}
