//! One FTP session seen as a file system.

use crate::client::FtpClient;
use crate::error::FtpResult;
use crate::types::FtpConnectionConfig;
use ferry_file::{FileSystem, LockRegistry};
use tokio::net::TcpStream;

/// A connected client plus the lock registry shared by its pool.
#[derive(Debug)]
pub struct FtpFileSystem {
    client: FtpClient,
    registry: LockRegistry,
    default_encoding: Option<String>,
}

impl FtpFileSystem {
    pub async fn connect(
        config: FtpConnectionConfig,
        registry: LockRegistry,
        default_encoding: Option<String>,
    ) -> FtpResult<Self> {
        let client = FtpClient::connect(config).await?;
        Ok(Self {
            client,
            registry,
            default_encoding,
        })
    }

    pub fn client(&self) -> &FtpClient {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut FtpClient {
        &mut self.client
    }

    /// Start `RETR path`. [`await_command_completion`](Self::await_command_completion)
    /// must follow once the stream is finished.
    pub async fn retrieve_file_content(&mut self, path: &str) -> FtpResult<TcpStream> {
        self.client.retrieve_file_stream(path).await
    }

    pub async fn await_command_completion(&mut self) -> FtpResult<()> {
        self.client.complete_pending_command().await
    }

    /// Whether the session can be handed to another operation.
    pub fn is_reusable(&self) -> bool {
        self.client.is_connected() && !self.client.has_pending_command()
    }

    pub async fn disconnect(&mut self) {
        if let Err(e) = self.client.quit().await {
            log::debug!("[{}] quit failed: {}", self.client.id, e);
        }
    }
}

impl FileSystem for FtpFileSystem {
    fn lock_registry(&self) -> &LockRegistry {
        &self.registry
    }

    fn default_encoding(&self) -> Option<&str> {
        self.default_encoding.as_deref()
    }
}
