//! Trait abstraction for the byte transport to enable testing

use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Size of one transport read
pub const RX_CHUNK_SIZE: usize = 256;

/// Trait for the command channel's byte transport
#[async_trait]
pub trait Transport: Send {
    /// Wait up to `timeout` for received bytes
    ///
    /// Returns `Ok(None)` when nothing arrived or no peer is attached.
    async fn recv_bytes(&mut self, timeout: Duration) -> io::Result<Option<Vec<u8>>>;

    /// Send bytes to the peer; silently dropped when no peer is attached
    async fn send_bytes(&mut self, data: &[u8]) -> io::Result<()>;

    /// Whether a peer is currently attached
    fn is_connected(&self) -> bool;
}

/// Read errors after which the stream is still usable
fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Transport over any async byte stream (serial port, pipe, socket)
///
/// End-of-stream marks the peer as detached.
pub struct StreamTransport<S> {
    stream: S,
    connected: bool,
}

impl<S> StreamTransport<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            connected: true,
        }
    }
}

#[async_trait]
impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn recv_bytes(&mut self, timeout: Duration) -> io::Result<Option<Vec<u8>>> {
        if !self.connected {
            return Ok(None);
        }

        let mut buf = [0u8; RX_CHUNK_SIZE];
        match tokio::time::timeout(timeout, self.stream.read(&mut buf)).await {
            Err(_) => Ok(None),
            Ok(Ok(0)) => {
                info!("Transport peer detached");
                self.connected = false;
                Ok(None)
            }
            Ok(Ok(n)) => Ok(Some(buf[..n].to_vec())),
            Ok(Err(e)) => {
                if !is_transient(&e) {
                    warn!("Transport read failed, detaching peer: {}", e);
                    self.connected = false;
                }
                Err(e)
            }
        }
    }

    async fn send_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        if !self.connected {
            debug!("Dropping {} bytes, no peer attached", data.len());
            return Ok(());
        }

        self.stream.write_all(data).await?;
        self.stream.flush().await
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Mock transport for testing
    #[derive(Clone)]
    pub struct MockTransport {
        pub incoming: Arc<Mutex<VecDeque<Vec<u8>>>>,
        pub written_data: Arc<Mutex<Vec<Vec<u8>>>>,
        pub connected: Arc<Mutex<bool>>,
        pub write_error: Arc<Mutex<Option<io::ErrorKind>>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self {
                incoming: Arc::new(Mutex::new(VecDeque::new())),
                written_data: Arc::new(Mutex::new(Vec::new())),
                connected: Arc::new(Mutex::new(true)),
                write_error: Arc::new(Mutex::new(None)),
            }
        }

        pub fn queue_input(&self, data: &[u8]) {
            self.incoming.lock().unwrap().push_back(data.to_vec());
        }

        pub fn get_written_data(&self) -> Vec<Vec<u8>> {
            self.written_data.lock().unwrap().clone()
        }

        /// Everything written so far, concatenated as text
        pub fn written_text(&self) -> String {
            let chunks = self.get_written_data();
            String::from_utf8(chunks.concat()).unwrap()
        }

        pub fn set_connected(&self, connected: bool) {
            *self.connected.lock().unwrap() = connected;
        }

        pub fn set_write_error(&self, error: io::ErrorKind) {
            *self.write_error.lock().unwrap() = Some(error);
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn recv_bytes(&mut self, _timeout: Duration) -> io::Result<Option<Vec<u8>>> {
            if !self.is_connected() {
                return Ok(None);
            }
            Ok(self.incoming.lock().unwrap().pop_front())
        }

        async fn send_bytes(&mut self, data: &[u8]) -> io::Result<()> {
            if !self.is_connected() {
                return Ok(());
            }
            if let Some(error) = *self.write_error.lock().unwrap() {
                return Err(io::Error::new(error, "Mock write error"));
            }
            self.written_data.lock().unwrap().push(data.to_vec());
            Ok(())
        }

        fn is_connected(&self) -> bool {
            *self.connected.lock().unwrap()
        }
    }
}
