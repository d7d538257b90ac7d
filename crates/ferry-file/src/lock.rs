//! Advisory per-path locks.
//!
//! A [`LockRegistry`] is the process-wide table of held paths for one
//! connector. Every [`RegistryLock`] it hands out moves through
//! `Unlocked → Locked → Released`; `Released` is terminal and releasing twice
//! is a no-op.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::Notify;
use uuid::Uuid;

/// Exclusive access token for one path.
pub trait PathLock: Send + Sync + fmt::Debug {
    fn path(&self) -> &str;

    /// Try to take the lock. Returns `true` if this lock now holds the path.
    fn try_lock(&self) -> bool;

    fn is_locked(&self) -> bool;

    /// Give the path up. Safe to call any number of times.
    fn release(&self);
}

/// Placeholder used for unlocked reads. Never holds anything.
#[derive(Debug, Clone, Default)]
pub struct NullPathLock {
    path: String,
}

impl NullPathLock {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl PathLock for NullPathLock {
    fn path(&self) -> &str {
        &self.path
    }

    fn try_lock(&self) -> bool {
        true
    }

    fn is_locked(&self) -> bool {
        false
    }

    fn release(&self) {}
}

// ─── Registry ────────────────────────────────────────────────────────

struct RegistryInner {
    held: StdMutex<HashMap<String, Uuid>>,
    released: Notify,
}

/// Table of currently held paths, shared by the commands of one connector.
#[derive(Clone)]
pub struct LockRegistry {
    inner: Arc<RegistryInner>,
}

impl Default for LockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LockRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockRegistry")
            .field("held", &self.held_count())
            .finish()
    }
}

impl LockRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                held: StdMutex::new(HashMap::new()),
                released: Notify::new(),
            }),
        }
    }

    pub fn is_locked(&self, path: &str) -> bool {
        self.held().contains_key(path)
    }

    pub fn held_count(&self) -> usize {
        self.held().len()
    }

    /// An unlocked token for `path`; call [`PathLock::try_lock`] to take it.
    pub fn new_lock(&self, path: impl Into<String>) -> RegistryLock {
        RegistryLock {
            path: path.into(),
            id: Uuid::new_v4(),
            registry: self.clone(),
            state: StdMutex::new(LockState::Unlocked),
        }
    }

    /// Take `path` if nobody holds it.
    pub fn try_lock(&self, path: impl Into<String>) -> Option<RegistryLock> {
        let lock = self.new_lock(path);
        if lock.try_lock() {
            Some(lock)
        } else {
            None
        }
    }

    /// Take `path`, waiting for the current holder to release it.
    pub async fn lock(&self, path: impl Into<String>) -> RegistryLock {
        let lock = self.new_lock(path);
        loop {
            let notified = self.inner.released.notified();
            tokio::pin!(notified);
            // Register before checking so a release in between is not lost.
            notified.as_mut().enable();
            if lock.try_lock() {
                return lock;
            }
            log::debug!("waiting for lock on '{}'", lock.path);
            notified.await;
        }
    }

    fn held(&self) -> std::sync::MutexGuard<'_, HashMap<String, Uuid>> {
        self.inner.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn acquire(&self, path: &str, id: Uuid) -> bool {
        let mut held = self.held();
        match held.get(path) {
            Some(owner) => *owner == id,
            None => {
                held.insert(path.to_string(), id);
                true
            }
        }
    }

    fn free(&self, path: &str, id: Uuid) {
        let removed = {
            let mut held = self.held();
            if held.get(path) == Some(&id) {
                held.remove(path);
                true
            } else {
                false
            }
        };
        if removed {
            log::trace!("released lock on '{}'", path);
            self.inner.released.notify_waiters();
        }
    }
}

// ─── Registry-backed lock ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockState {
    Unlocked,
    Locked,
    Released,
}

/// A lock backed by a [`LockRegistry`]. Dropping it releases the path.
pub struct RegistryLock {
    path: String,
    id: Uuid,
    registry: LockRegistry,
    state: StdMutex<LockState>,
}

impl fmt::Debug for RegistryLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryLock")
            .field("path", &self.path)
            .field("state", &*self.state())
            .finish()
    }
}

impl RegistryLock {
    fn state(&self) -> std::sync::MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_released(&self) -> bool {
        *self.state() == LockState::Released
    }
}

impl PathLock for RegistryLock {
    fn path(&self) -> &str {
        &self.path
    }

    fn try_lock(&self) -> bool {
        let mut state = self.state();
        match *state {
            LockState::Locked => true,
            LockState::Released => false,
            LockState::Unlocked => {
                if self.registry.acquire(&self.path, self.id) {
                    *state = LockState::Locked;
                    log::trace!("locked '{}'", self.path);
                    true
                } else {
                    false
                }
            }
        }
    }

    fn is_locked(&self) -> bool {
        *self.state() == LockState::Locked
    }

    fn release(&self) {
        let mut state = self.state();
        if *state == LockState::Locked {
            self.registry.free(&self.path, self.id);
        }
        *state = LockState::Released;
    }
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        self.release();
    }
}
