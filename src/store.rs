//! Where a ledger lives between appends.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use fs2::FileExt;

use crate::sync::{Fingerprint, WatchHandle};

/// Produces the text to store from the currently stored text.
pub type Rewrite<'a> = dyn FnMut(Option<&str>) -> io::Result<String> + 'a;

/// Backing storage for the ledger text.
pub trait LedgerStore: Send {
    /// Current ledger text, `None` if nothing has been stored yet.
    fn load(&self) -> io::Result<Option<String>>;
    /// Replace the stored text with `text`.
    fn store(&mut self, text: &str) -> io::Result<()>;
    /// Read, rewrite and store without letting another writer in between.
    ///
    /// The default is only as atomic as `load` followed by `store`; shared
    /// stores override it.
    fn update(&mut self, rewrite: &mut Rewrite<'_>) -> io::Result<()> {
        let current = self.load()?;
        let text = rewrite(current.as_deref())?;
        self.store(&text)
    }
    /// Report own writes to `handle` so its watcher skips them.
    fn attach_watch(&mut self, _handle: WatchHandle) {}
    /// File backing this store, if any.
    fn location(&self) -> Option<&Path> {
        None
    }
}

/// Releases an fs2 lock on every exit path.
struct LockGuard<'a>(&'a File);

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(self.0) {
            log::warn!("failed to release savegame lock: {}", e);
        }
    }
}

/// Savegame file shared with the other player's process.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    watch: Option<WatchHandle>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            watch: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_for_write(&self) -> io::Result<File> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
    }

    /// Overwrite `file`, which must be exclusively locked by the caller.
    fn write_locked(&self, file: &File, text: &str) -> io::Result<()> {
        file.set_len(0)?;
        let mut out = file;
        out.seek(SeekFrom::Start(0))?;
        out.write_all(text.as_bytes())?;
        out.flush()?;
        file.sync_all()?;
        // still under the lock, so this is our write and nobody else's
        if let Some(watch) = &self.watch {
            watch.remember(Fingerprint::of(&self.path));
        }
        log::debug!("stored {} bytes to {}", text.len(), self.path.display());
        Ok(())
    }
}

impl LedgerStore for FileStore {
    fn load(&self) -> io::Result<Option<String>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        FileExt::lock_shared(&file)?;
        let _guard = LockGuard(&file);
        let mut text = String::new();
        (&file).read_to_string(&mut text)?;
        Ok(Some(text))
    }

    fn store(&mut self, text: &str) -> io::Result<()> {
        let file = self.open_for_write()?;
        FileExt::lock_exclusive(&file)?;
        let _guard = LockGuard(&file);
        self.write_locked(&file, text)
    }

    fn update(&mut self, rewrite: &mut Rewrite<'_>) -> io::Result<()> {
        let file = self.open_for_write()?;
        FileExt::lock_exclusive(&file)?;
        let _guard = LockGuard(&file);
        let mut current = String::new();
        (&file).read_to_string(&mut current)?;
        // a file created by this open holds nothing yet
        let stored = (!current.is_empty()).then_some(current.as_str());
        let text = rewrite(stored)?;
        self.write_locked(&file, &text)
    }

    fn attach_watch(&mut self, handle: WatchHandle) {
        self.watch = Some(handle);
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// In-process ledger text. Clones share the same text, so two engines can
/// play against each other without touching the disk.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    text: Arc<Mutex<Option<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(text: &str) -> Self {
        Self {
            text: Arc::new(Mutex::new(Some(text.to_string()))),
        }
    }

    /// Snapshot of the stored text.
    pub fn contents(&self) -> Option<String> {
        self.text.lock().ok().and_then(|t| t.clone())
    }
}

fn poisoned() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "memory store lock poisoned")
}

impl LedgerStore for MemoryStore {
    fn load(&self) -> io::Result<Option<String>> {
        Ok(self.text.lock().map_err(|_| poisoned())?.clone())
    }

    fn store(&mut self, text: &str) -> io::Result<()> {
        *self.text.lock().map_err(|_| poisoned())? = Some(text.to_string());
        Ok(())
    }

    fn update(&mut self, rewrite: &mut Rewrite<'_>) -> io::Result<()> {
        let mut stored = self.text.lock().map_err(|_| poisoned())?;
        let text = rewrite(stored.as_deref())?;
        *stored = Some(text);
        Ok(())
    }
}
