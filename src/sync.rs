//! Change detection for a savegame shared with another process.
//!
//! [`WatchHandle`] is the std-only half the engine holds; it marks the
//! process's own writes so they are not reported back as remote changes.
//! [`LedgerWatcher`] polls the file from a tokio task.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

/// Cheap identity of a file version: length and modification time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    len: u64,
    modified: Option<SystemTime>,
}

impl Fingerprint {
    /// `None` if the file does not exist (or cannot be inspected).
    pub fn of(path: &Path) -> Option<Self> {
        let meta = fs::metadata(path).ok()?;
        Some(Self {
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

/// Shared between the engine and the watcher task.
#[derive(Debug, Clone)]
pub struct WatchHandle {
    path: PathBuf,
    suppress: Arc<AtomicBool>,
    known: Arc<Mutex<Option<Fingerprint>>>,
}

impl WatchHandle {
    /// Handle for `path`; the file's current state counts as already seen.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let known = Fingerprint::of(&path);
        Self {
            path,
            suppress: Arc::new(AtomicBool::new(false)),
            known: Arc::new(Mutex::new(known)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Suppress change reports until the guard is dropped. The store the
    /// handle is attached to records its own writes as known while it still
    /// holds the file lock; anything written after that is reported.
    pub fn quiet(&self) -> QuietGuard<'_> {
        self.suppress.store(true, Ordering::SeqCst);
        QuietGuard { handle: self }
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppress.load(Ordering::SeqCst)
    }

    pub fn known(&self) -> Option<Fingerprint> {
        self.known.lock().ok().and_then(|k| *k)
    }

    pub fn remember(&self, fingerprint: Option<Fingerprint>) {
        if let Ok(mut known) = self.known.lock() {
            *known = fingerprint;
        }
    }

    /// File differs from the last known state.
    pub fn changed(&self) -> bool {
        Fingerprint::of(&self.path) != self.known()
    }
}

/// See [`WatchHandle::quiet`].
pub struct QuietGuard<'a> {
    handle: &'a WatchHandle,
}

impl Drop for QuietGuard<'_> {
    fn drop(&mut self) {
        self.handle.suppress.store(false, Ordering::SeqCst);
    }
}

#[cfg(feature = "runtime")]
pub use self::watcher::{LedgerChanged, LedgerWatcher};

#[cfg(feature = "runtime")]
mod watcher {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;
    use tokio::time::{interval, Duration, Instant, MissedTickBehavior};

    use super::{Fingerprint, WatchHandle};

    /// The savegame was modified by someone else.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct LedgerChanged(pub PathBuf);

    /// Background task polling a savegame for external modifications.
    pub struct LedgerWatcher {
        shutdown: Arc<AtomicBool>,
        task: Option<JoinHandle<()>>,
    }

    impl LedgerWatcher {
        /// Start polling every `poll`. A change is reported once the file has
        /// kept the same fingerprint for `debounce`, so a burst of writes
        /// yields a single notification.
        pub fn spawn(
            handle: WatchHandle,
            poll: Duration,
            debounce: Duration,
        ) -> (Self, mpsc::Receiver<LedgerChanged>) {
            let (tx, rx) = mpsc::channel(8);
            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = shutdown.clone();
            let task = tokio::spawn(async move {
                let mut ticker = interval(poll);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                let mut pending: Option<(Option<Fingerprint>, Instant)> = None;
                loop {
                    ticker.tick().await;
                    if flag.load(Ordering::SeqCst) {
                        break;
                    }
                    if handle.is_suppressed() {
                        pending = None;
                        continue;
                    }
                    let current = Fingerprint::of(handle.path());
                    if current == handle.known() {
                        pending = None;
                        continue;
                    }
                    match pending {
                        Some((seen, since)) if seen == current => {
                            if since.elapsed() < debounce {
                                continue;
                            }
                            pending = None;
                            handle.remember(current);
                            log::debug!("savegame {} changed", handle.path().display());
                            if tx
                                .send(LedgerChanged(handle.path().to_path_buf()))
                                .await
                                .is_err()
                            {
                                break;
                            }
                        }
                        _ => pending = Some((current, Instant::now())),
                    }
                }
                log::debug!("watcher for {} stopped", handle.path().display());
            });
            (
                Self {
                    shutdown,
                    task: Some(task),
                },
                rx,
            )
        }

        /// Stop polling. Notifications already delivered stay valid.
        pub fn close(&mut self) {
            self.shutdown.store(true, Ordering::SeqCst);
            if let Some(task) = self.task.take() {
                task.abort();
            }
        }

        pub fn is_closed(&self) -> bool {
            self.shutdown.load(Ordering::SeqCst)
        }
    }

    impl Drop for LedgerWatcher {
        fn drop(&mut self) {
            self.close();
        }
    }
}
