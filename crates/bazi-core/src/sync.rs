//! Keeps one client instance in step with its sibling tabs.
//!
//! When another tab logs in or out, this tab's store subscription fires.
//! `CrossTabSync` re-evaluates the session and tells its listeners. There is
//! no locking between tabs: if two tabs write at once, the last write wins.

use std::sync::Arc;

use tracing::debug;

use crate::auth::{SessionManager, SessionState, StoreEvent, StoreSubscription};

type Listener = Box<dyn Fn(&SessionState) + Send + Sync>;

pub struct CrossTabSync {
    session: Arc<SessionManager>,
    subscription: StoreSubscription,
    listeners: Vec<Listener>,
}

impl CrossTabSync {
    pub fn new(session: Arc<SessionManager>) -> Self {
        let subscription = session.subscribe_store();
        Self {
            session,
            subscription,
            listeners: Vec::new(),
        }
    }

    /// Register a callback invoked with the re-evaluated session state
    pub fn on_change<F>(&mut self, callback: F)
    where
        F: Fn(&SessionState) + Send + Sync + 'static,
    {
        self.listeners.push(Box::new(callback));
    }

    /// React to one store change from another tab
    pub fn handle(&self, event: &StoreEvent) -> SessionState {
        let state = self.session.state();
        debug!(
            origin = ?event.origin,
            change = ?event.change,
            authenticated = state.is_authenticated(),
            "Session changed in another tab"
        );
        for listener in &self.listeners {
            listener(&state);
        }
        state
    }

    /// Drain pending notifications without waiting.
    /// Several queued changes collapse into one re-evaluation.
    pub fn poll(&mut self) -> Option<SessionState> {
        let mut latest = None;
        while let Some(event) = self.subscription.try_recv() {
            latest = Some(event);
        }
        latest.map(|event| self.handle(&event))
    }

    /// Handle notifications until the origin goes away
    pub async fn run(mut self) {
        while let Some(event) = self.subscription.recv().await {
            self.handle(&event);
        }
        debug!("Cross-tab sync stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Credential, CredentialStore, MemoryCredentialStore};
    use crate::testing::{sample_user, FakeAuthenticator};
    use std::sync::Mutex;

    fn two_tabs() -> (Arc<SessionManager>, Arc<SessionManager>) {
        let store_a = MemoryCredentialStore::new();
        let store_b = store_a.open_tab();
        (
            Arc::new(SessionManager::with_system_clock(store_a)),
            Arc::new(SessionManager::with_system_clock(store_b)),
        )
    }

    fn recording(sync: &mut CrossTabSync) -> Arc<Mutex<Vec<SessionState>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        sync.on_change(move |state| sink.lock().unwrap().push(state.clone()));
        seen
    }

    #[tokio::test]
    async fn test_logout_in_other_tab_reaches_listener() {
        let (tab_a, tab_b) = two_tabs();
        tab_a
            .login(&FakeAuthenticator::accepting("tok"), "lin@example.com", "secret1")
            .await
            .unwrap();

        let mut sync = CrossTabSync::new(Arc::clone(&tab_b));
        let seen = recording(&mut sync);
        assert!(tab_b.is_authenticated());

        tab_a.logout();

        assert_eq!(sync.poll(), Some(SessionState::Anonymous));
        assert_eq!(*seen.lock().unwrap(), vec![SessionState::Anonymous]);
        assert!(!tab_b.is_authenticated());
    }

    #[tokio::test]
    async fn test_login_in_other_tab_reaches_listener() {
        let (tab_a, tab_b) = two_tabs();
        let mut sync = CrossTabSync::new(Arc::clone(&tab_b));
        let seen = recording(&mut sync);

        tab_a
            .login(&FakeAuthenticator::accepting("tok"), "lin@example.com", "secret1")
            .await
            .unwrap();

        assert_eq!(
            sync.poll(),
            Some(SessionState::Authenticated(Some(sample_user())))
        );
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_own_writes_are_ignored() {
        let (_tab_a, tab_b) = two_tabs();
        let mut sync = CrossTabSync::new(Arc::clone(&tab_b));
        let seen = recording(&mut sync);

        tab_b.logout();
        assert_eq!(sync.poll(), None);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_queued_changes_collapse() {
        let store_a = MemoryCredentialStore::new();
        let tab_b = Arc::new(SessionManager::with_system_clock(store_a.open_tab()));
        let mut sync = CrossTabSync::new(Arc::clone(&tab_b));
        let seen = recording(&mut sync);

        let credential = Credential::issue("tok".into(), None, chrono::Utc::now());
        store_a.set(&credential).unwrap();
        store_a.clear().unwrap();
        store_a.set(&credential).unwrap();

        assert_eq!(sync.poll(), Some(SessionState::Authenticated(None)));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_run_loop_delivers_changes() {
        let (tab_a, tab_b) = two_tabs();
        tab_a
            .login(&FakeAuthenticator::accepting("tok"), "lin@example.com", "secret1")
            .await
            .unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut sync = CrossTabSync::new(Arc::clone(&tab_b));
        sync.on_change(move |state| {
            let _ = tx.send(state.clone());
        });
        let handle = tokio::spawn(sync.run());

        tab_a.logout();

        assert_eq!(rx.recv().await, Some(SessionState::Anonymous));
        handle.abort();
    }
}
