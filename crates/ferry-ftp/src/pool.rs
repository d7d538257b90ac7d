//! Connection pool: hands out FTP sessions for exclusive use.
//!
//! A checked-out session lives in a [`ConnectionHandle`]. Releasing the
//! handle returns a healthy session to the idle list; dropping it without a
//! release discards the session. Idle reaping and keepalive NOOPs run from
//! [`spawn_pool_maintenance`].

use crate::error::{FtpError, FtpResult};
use crate::file_system::FtpFileSystem;
use crate::types::{FtpConnectionConfig, PoolConfig, PoolStats};
use ferry_file::LockRegistry;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::time::{self, Duration};

struct IdleConnection {
    conn: FtpFileSystem,
    since: Instant,
}

struct PoolInner {
    config: FtpConnectionConfig,
    pool_config: PoolConfig,
    registry: LockRegistry,
    default_encoding: Option<String>,
    idle: Mutex<Vec<IdleConnection>>,
    /// Present when `max_connections` is non-zero.
    limiter: Option<Arc<Semaphore>>,
    closed: AtomicBool,
    checked_out: AtomicUsize,
    created: AtomicU64,
    releases: AtomicU64,
    discarded: AtomicU64,
}

/// Thread-safe pool of FTP sessions sharing one lock registry.
#[derive(Clone)]
pub struct FtpConnectionPool {
    inner: Arc<PoolInner>,
}

impl std::fmt::Debug for FtpConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FtpConnectionPool")
            .field("host", &self.inner.config.address())
            .field("stats", &self.stats())
            .finish()
    }
}

impl FtpConnectionPool {
    pub fn new(config: FtpConnectionConfig, pool_config: PoolConfig) -> Self {
        Self::with_registry(config, pool_config, LockRegistry::new())
    }

    pub fn with_registry(
        config: FtpConnectionConfig,
        pool_config: PoolConfig,
        registry: LockRegistry,
    ) -> Self {
        let limiter = (pool_config.max_connections > 0)
            .then(|| Arc::new(Semaphore::new(pool_config.max_connections)));
        Self {
            inner: Arc::new(PoolInner {
                config,
                pool_config,
                registry,
                default_encoding: None,
                idle: Mutex::new(Vec::new()),
                limiter,
                closed: AtomicBool::new(false),
                checked_out: AtomicUsize::new(0),
                created: AtomicU64::new(0),
                releases: AtomicU64::new(0),
                discarded: AtomicU64::new(0),
            }),
        }
    }

    /// Charset reported for text content read through this pool. Must be
    /// set before the pool is shared.
    pub fn with_encoding(mut self, encoding: Option<String>) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.default_encoding = encoding;
        } else {
            log::warn!("pool already shared; default encoding left unchanged");
        }
        self
    }

    pub fn registry(&self) -> &LockRegistry {
        &self.inner.registry
    }

    pub fn config(&self) -> &FtpConnectionConfig {
        &self.inner.config
    }

    /// Check out a session, reusing an idle one when possible. Waits while
    /// `max_connections` sessions are checked out.
    pub async fn get_connection(&self) -> FtpResult<ConnectionHandle> {
        self.ensure_open()?;
        let permit = match &self.inner.limiter {
            Some(limiter) => Some(
                limiter
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| FtpError::disconnected("Connection pool is closed"))?,
            ),
            None => None,
        };
        self.checkout(permit).await
    }

    /// Like [`get_connection`](Self::get_connection), but fails instead of
    /// waiting when all `max_connections` sessions are checked out.
    pub async fn try_get_connection(&self) -> FtpResult<ConnectionHandle> {
        self.ensure_open()?;
        let permit = match &self.inner.limiter {
            Some(limiter) => match limiter.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(TryAcquireError::NoPermits) => {
                    return Err(FtpError::connection_failed(format!(
                        "Connection pool exhausted: all {} connections are in use",
                        self.inner.pool_config.max_connections
                    )))
                }
                Err(TryAcquireError::Closed) => {
                    return Err(FtpError::disconnected("Connection pool is closed"))
                }
            },
            None => None,
        };
        self.checkout(permit).await
    }

    fn ensure_open(&self) -> FtpResult<()> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(FtpError::disconnected("Connection pool is closed"));
        }
        Ok(())
    }

    async fn checkout(&self, permit: Option<OwnedSemaphorePermit>) -> FtpResult<ConnectionHandle> {
        let conn = match self.take_idle() {
            Some(conn) => {
                log::trace!("reusing pooled connection {}", conn.client().id);
                conn
            }
            None => {
                let conn = FtpFileSystem::connect(
                    self.inner.config.clone(),
                    self.inner.registry.clone(),
                    self.inner.default_encoding.clone(),
                )
                .await?;
                self.inner.created.fetch_add(1, Ordering::Relaxed);
                log::debug!("opened pooled connection {} to {}", conn.client().id, self.inner.config.address());
                conn
            }
        };

        self.inner.checked_out.fetch_add(1, Ordering::AcqRel);
        Ok(ConnectionHandle {
            conn,
            guard: ReleaseGuard {
                pool: self.clone(),
                _permit: permit,
                armed: true,
            },
        })
    }

    fn idle_list(&self) -> std::sync::MutexGuard<'_, Vec<IdleConnection>> {
        self.inner.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_idle(&self) -> Option<FtpFileSystem> {
        let mut idle = self.idle_list();
        while let Some(entry) = idle.pop() {
            if entry.conn.is_reusable() {
                return Some(entry.conn);
            }
            self.inner.discarded.fetch_add(1, Ordering::Relaxed);
        }
        None
    }

    fn return_connection(&self, conn: FtpFileSystem) {
        self.inner.checked_out.fetch_sub(1, Ordering::AcqRel);
        self.inner.releases.fetch_add(1, Ordering::Relaxed);
        if self.inner.closed.load(Ordering::Acquire) || !conn.is_reusable() {
            log::debug!("discarding connection {}", conn.client().id);
            self.inner.discarded.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.idle_list().push(IdleConnection {
            conn,
            since: Instant::now(),
        });
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            idle: self.idle_list().len(),
            checked_out: self.inner.checked_out.load(Ordering::Acquire),
            max_connections: self.inner.pool_config.max_connections,
            created: self.inner.created.load(Ordering::Relaxed),
            releases: self.inner.releases.load(Ordering::Relaxed),
            discarded: self.inner.discarded.load(Ordering::Relaxed),
        }
    }

    /// Close idle sessions unused for longer than `idle_timeout_sec`.
    /// Returns how many were closed.
    pub async fn reap_idle(&self) -> usize {
        let max_idle = Duration::from_secs(self.inner.pool_config.idle_timeout_sec);
        let stale: Vec<IdleConnection> = {
            let mut idle = self.idle_list();
            let (stale, fresh): (Vec<_>, Vec<_>) =
                idle.drain(..).partition(|e| e.since.elapsed() >= max_idle);
            *idle = fresh;
            stale
        };

        let count = stale.len();
        for mut entry in stale {
            entry.conn.disconnect().await;
        }
        if count > 0 {
            log::info!("FTP pool: reaped {} idle connections", count);
        }
        count
    }

    /// Send NOOP on every idle session, dropping those that fail.
    pub async fn keepalive_idle(&self) {
        let entries: Vec<IdleConnection> = self.idle_list().drain(..).collect();
        let mut alive = Vec::with_capacity(entries.len());
        for mut entry in entries {
            match entry.conn.client_mut().noop().await {
                Ok(()) => alive.push(entry),
                Err(e) => {
                    log::debug!("keepalive failed on {}: {}", entry.conn.client().id, e);
                    self.inner.discarded.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        self.idle_list().extend(alive);
    }

    /// Refuse further checkouts and disconnect idle sessions. Sessions still
    /// checked out are discarded when released.
    pub async fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        if let Some(limiter) = &self.inner.limiter {
            limiter.close();
        }
        let entries: Vec<IdleConnection> = self.idle_list().drain(..).collect();
        for mut entry in entries {
            entry.conn.disconnect().await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

// ─── Checkout handle ─────────────────────────────────────────────────

/// Exclusive use of one pooled session.
pub struct ConnectionHandle {
    conn: FtpFileSystem,
    guard: ReleaseGuard,
}

struct ReleaseGuard {
    pool: FtpConnectionPool,
    _permit: Option<OwnedSemaphorePermit>,
    armed: bool,
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        if self.armed {
            log::warn!("pooled connection dropped without release; discarding it");
            let inner = &self.pool.inner;
            inner.checked_out.fetch_sub(1, Ordering::AcqRel);
            inner.discarded.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("connection", &self.conn)
            .finish()
    }
}

impl ConnectionHandle {
    pub fn connection(&mut self) -> &mut FtpFileSystem {
        &mut self.conn
    }

    /// Give the session back to the pool.
    pub fn release(self) {
        let ConnectionHandle { conn, mut guard } = self;
        guard.armed = false;
        guard.pool.return_connection(conn);
    }
}

/// Spawn a background task that periodically reaps idle connections and
/// sends keepalive NOOPs. `None` when maintenance is disabled.
pub fn spawn_pool_maintenance(pool: FtpConnectionPool) -> Option<tokio::task::JoinHandle<()>> {
    let interval_secs = pool.inner.pool_config.maintenance_interval_sec;
    if interval_secs == 0 {
        return None;
    }
    Some(tokio::spawn(async move {
        let mut ticker = time::interval(Duration::from_secs(interval_secs));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if pool.is_closed() {
                break;
            }
            pool.reap_idle().await;
            pool.keepalive_idle().await;
        }
    }))
}
