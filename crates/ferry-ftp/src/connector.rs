//! FTP connector: runs commands on pooled sessions.

use crate::command::{FtpListCommand, FtpReadCommand};
use crate::pool::{spawn_pool_maintenance, FtpConnectionPool};
use crate::types::{FtpConnectionConfig, PoolConfig, PoolStats};
use ferry_file::{
    AttributesPredicate, FileConnector, FileError, FileMessage, FileResult, ListCommand,
    LockRegistry, ReadCommand,
};

#[derive(Debug)]
pub struct FtpConnector {
    name: String,
    pool: FtpConnectionPool,
}

impl FtpConnector {
    pub fn new(name: impl Into<String>, pool: FtpConnectionPool) -> Self {
        Self {
            name: name.into(),
            pool,
        }
    }

    /// Connector with its own pool and lock registry. Starts the pool's
    /// maintenance task, so it must be called inside a tokio runtime.
    pub fn connect(
        name: impl Into<String>,
        config: FtpConnectionConfig,
        pool_config: PoolConfig,
        default_encoding: Option<String>,
    ) -> Self {
        let pool = FtpConnectionPool::with_registry(config, pool_config, LockRegistry::new())
            .with_encoding(default_encoding);
        spawn_pool_maintenance(pool.clone());
        Self::new(name, pool)
    }

    pub fn pool(&self) -> &FtpConnectionPool {
        &self.pool
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub async fn shutdown(&self) {
        self.pool.close().await;
    }

    async fn checkout(&self) -> FileResult<crate::pool::ConnectionHandle> {
        self.pool.get_connection().await.map_err(|e| {
            FileError::connection_unavailable(format!(
                "Could not obtain connection to {}",
                self.pool.config().address()
            ))
            .with_source(e)
        })
    }
}

#[async_trait::async_trait]
impl FileConnector for FtpConnector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self, path: &str, lock: bool) -> FileResult<FileMessage> {
        let mut handle = self.checkout().await?;
        let result = FtpReadCommand::new(handle.connection(), &self.pool)
            .read(path, lock)
            .await;
        handle.release();
        result
    }

    async fn list(
        &self,
        directory: &str,
        recursive: bool,
        matcher: &dyn AttributesPredicate,
    ) -> FileResult<Vec<FileMessage>> {
        let mut handle = self.checkout().await?;
        let result = FtpListCommand::new(handle.connection(), &self.pool)
            .list(directory, recursive, matcher)
            .await;
        handle.release();
        result
    }
}
