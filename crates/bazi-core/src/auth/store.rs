//! Durable credential storage shared by every instance ("tab") of one origin.
//!
//! An `Origin` owns the notification channel. Each store handle belongs to a
//! tab; `set` and `clear` announce themselves to the other tabs of the same
//! origin, never to the tab that made the change.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, warn};

use super::Credential;

/// Session file name in the cache directory
const SESSION_FILE: &str = "session.json";

/// Buffered store notifications per subscriber.
/// A subscriber that falls further behind gets a single resync instead.
const NOTIFY_CAPACITY: usize = 16;

/// Identifies one client instance attached to an origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TabId(u64);

impl std::fmt::Display for TabId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tab-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    Set,
    Cleared,
    /// Notifications were dropped; the receiver must re-read the store
    Resync,
}

/// A change to the stored credential made by some other tab
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreEvent {
    /// Tab that made the change. `None` for a resync or a change made by
    /// another process.
    pub origin: Option<TabId>,
    pub change: StoreChange,
}

/// Persistence for the single session credential.
///
/// Implementations store the credential as one atomic record and publish a
/// `StoreEvent` to sibling tabs after every successful mutation.
pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Result<Option<Credential>>;
    fn set(&self, credential: &Credential) -> Result<()>;
    fn clear(&self) -> Result<()>;

    /// Change notifications originating from other tabs
    fn subscribe(&self) -> StoreSubscription;

    fn tab(&self) -> TabId;
}

// ============================================================================
// Origin
// ============================================================================

struct OriginInner {
    events: broadcast::Sender<StoreEvent>,
    next_tab: AtomicU64,
}

/// Shared notification channel for all tabs of one client.
/// Clone is cheap and refers to the same origin.
#[derive(Clone)]
pub struct Origin {
    inner: Arc<OriginInner>,
}

impl Origin {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(NOTIFY_CAPACITY);
        Self {
            inner: Arc::new(OriginInner {
                events,
                next_tab: AtomicU64::new(1),
            }),
        }
    }

    pub(super) fn next_tab(&self) -> TabId {
        TabId(self.inner.next_tab.fetch_add(1, Ordering::Relaxed))
    }

    pub(super) fn publish(&self, tab: TabId, change: StoreChange) {
        // No receivers just means no other tab is listening
        let receivers = self
            .inner
            .events
            .send(StoreEvent {
                origin: Some(tab),
                change,
            })
            .unwrap_or(0);
        debug!(%tab, ?change, receivers, "Store change published");
    }

    /// Announce a change made outside this process
    pub(super) fn publish_external(&self, change: StoreChange) {
        let receivers = self
            .inner
            .events
            .send(StoreEvent {
                origin: None,
                change,
            })
            .unwrap_or(0);
        debug!(?change, receivers, "External store change published");
    }

    pub(super) fn subscribe(&self, tab: TabId) -> StoreSubscription {
        StoreSubscription {
            tab,
            rx: self.inner.events.subscribe(),
        }
    }
}

impl Default for Origin {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end of a tab's store notifications
pub struct StoreSubscription {
    tab: TabId,
    rx: broadcast::Receiver<StoreEvent>,
}

impl StoreSubscription {
    pub fn tab(&self) -> TabId {
        self.tab
    }

    /// Wait for the next change made by another tab.
    /// Returns `None` once every store handle of the origin is gone.
    pub async fn recv(&mut self) -> Option<StoreEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.origin == Some(self.tab) => continue,
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(missed)) => {
                    warn!(tab = %self.tab, missed, "Store notifications dropped, resyncing");
                    return Some(Self::resync());
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of `recv` for polling loops
    pub fn try_recv(&mut self) -> Option<StoreEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if event.origin == Some(self.tab) => continue,
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(missed)) => {
                    warn!(tab = %self.tab, missed, "Store notifications dropped, resyncing");
                    return Some(Self::resync());
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    fn resync() -> StoreEvent {
        StoreEvent {
            origin: None,
            change: StoreChange::Resync,
        }
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

/// Process-local store. Tabs opened from the same store share one slot.
#[derive(Clone)]
pub struct MemoryCredentialStore {
    origin: Origin,
    tab: TabId,
    slot: Arc<Mutex<Option<Credential>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        let origin = Origin::new();
        Self {
            tab: origin.next_tab(),
            origin,
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// A sibling tab sharing this store's contents and notifications
    pub fn open_tab(&self) -> Self {
        Self {
            origin: self.origin.clone(),
            tab: self.origin.next_tab(),
            slot: Arc::clone(&self.slot),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Credential>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Result<Option<Credential>> {
        Ok(self.slot().clone())
    }

    fn set(&self, credential: &Credential) -> Result<()> {
        *self.slot() = Some(credential.clone());
        self.origin.publish(self.tab, StoreChange::Set);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let removed = self.slot().take();
        if removed.is_some() {
            self.origin.publish(self.tab, StoreChange::Cleared);
        }
        Ok(())
    }

    fn subscribe(&self) -> StoreSubscription {
        self.origin.subscribe(self.tab)
    }

    fn tab(&self) -> TabId {
        self.tab
    }
}

// ============================================================================
// File backend
// ============================================================================

/// Session persisted as a single JSON file, replaced atomically on write.
///
/// Tabs opened from one handle notify each other directly. Writes by other
/// processes are picked up by a watcher on the session directory and
/// published with no origin tab.
pub struct FileCredentialStore {
    origin: Origin,
    tab: TabId,
    path: PathBuf,
    shared: Arc<FileShared>,
}

/// State shared by every tab of one file store
struct FileShared {
    /// Raw contents this process last wrote or saw, `None` for no file
    last_seen: Arc<Mutex<Option<String>>>,
    /// Dropped with the last tab, which stops the watch
    _watcher: Option<RecommendedWatcher>,
}

impl FileCredentialStore {
    /// Open the session file in `dir`. If the directory cannot be watched,
    /// changes from other processes are still seen on the next read.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let origin = Origin::new();
        let path = dir.as_ref().join(SESSION_FILE);
        let last_seen = Arc::new(Mutex::new(read_session_file(&path).ok().flatten()));

        let watcher = match watch_session_file(&path, origin.clone(), Arc::clone(&last_seen)) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot watch session file");
                None
            }
        };

        Self {
            tab: origin.next_tab(),
            origin,
            path,
            shared: Arc::new(FileShared {
                last_seen,
                _watcher: watcher,
            }),
        }
    }

    pub fn open_tab(&self) -> Self {
        Self {
            origin: self.origin.clone(),
            tab: self.origin.next_tab(),
            path: self.path.clone(),
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Per-process temp file so concurrent writers never share one
    fn temp_path(&self) -> PathBuf {
        self.path
            .with_extension(format!("json.{}.tmp", std::process::id()))
    }

    fn last_seen(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.shared
            .last_seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Result<Option<Credential>> {
        let Some(contents) = read_session_file(&self.path)? else {
            return Ok(None);
        };
        let credential: Credential =
            serde_json::from_str(&contents).context("Failed to parse session file")?;
        Ok(Some(credential))
    }

    fn set(&self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create session directory")?;
        }
        let contents = serde_json::to_string_pretty(credential)?;
        let temp = self.temp_path();

        // Held across the write so the watcher sees our own change as known
        let mut last_seen = self.last_seen();
        std::fs::write(&temp, &contents).context("Failed to write session file")?;
        std::fs::rename(&temp, &self.path).context("Failed to replace session file")?;
        *last_seen = Some(contents);
        drop(last_seen);

        self.origin.publish(self.tab, StoreChange::Set);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut last_seen = self.last_seen();
        let removed = match std::fs::remove_file(&self.path) {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e).context("Failed to remove session file"),
        };
        *last_seen = None;
        drop(last_seen);

        if removed {
            self.origin.publish(self.tab, StoreChange::Cleared);
        }
        Ok(())
    }

    fn subscribe(&self) -> StoreSubscription {
        self.origin.subscribe(self.tab)
    }

    fn tab(&self) -> TabId {
        self.tab
    }
}

/// Contents of the session file, `None` if it does not exist
fn read_session_file(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).context("Failed to read session file"),
    }
}

/// Watch the directory holding `path` and publish changes this process did not make
fn watch_session_file(
    path: &Path,
    origin: Origin,
    last_seen: Arc<Mutex<Option<String>>>,
) -> Result<RecommendedWatcher> {
    let dir = path
        .parent()
        .context("Session file has no parent directory")?
        .to_path_buf();
    std::fs::create_dir_all(&dir).context("Failed to create session directory")?;

    let file_name = path.file_name().map(|n| n.to_os_string());
    let watched = path.to_path_buf();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        let event = match res {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Session file watch error");
                return;
            }
        };
        if !event
            .paths
            .iter()
            .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name)
        {
            return;
        }

        let mut last_seen = last_seen.lock().unwrap_or_else(|e| e.into_inner());
        let current = match read_session_file(&watched) {
            Ok(current) => current,
            Err(e) => {
                debug!(error = %e, "Session file changed but could not be read");
                return;
            }
        };
        if *last_seen == current {
            return;
        }
        let change = if current.is_some() {
            StoreChange::Set
        } else {
            StoreChange::Cleared
        };
        *last_seen = current;
        drop(last_seen);
        origin.publish_external(change);
    })
    .context("Failed to create session file watcher")?;

    watcher
        .watch(&dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch {}", dir.display()))?;
    Ok(watcher)
}
