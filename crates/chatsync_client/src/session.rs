//! Client session lifecycle.
//!
//! A session owns everything scoped to one logged-in user: the store
//! handle, the listener registries and the connection manager. Sessions
//! are created at login and consumed at logout; nothing here is process
//! global, so multiple sessions can coexist in one process.

use crate::error::ClientResult;
use crate::groups::{GroupSync, PageFetcher};
use crate::read_state::{ConnAcker, ReadStateTracker};
use chatsync_conn::{ConnConfig, ConnManager, Dialer};
use chatsync_engine::Notifier;
use chatsync_store::{GroupStore, ReadStore, VersionStore};
use std::sync::Arc;
use tracing::info;

/// One logged-in user's client state.
pub struct ClientSession<S, D: Dialer> {
    login_user_id: String,
    store: Arc<S>,
    notifier: Arc<Notifier>,
    conn: Arc<ConnManager<D>>,
}

impl<S, D: Dialer> ClientSession<S, D> {
    /// Logs in: builds the session state and establishes the connection.
    pub fn login(config: ConnConfig, store: Arc<S>, dialer: D) -> ClientResult<Self> {
        let login_user_id = config.user_id.clone();
        let conn = Arc::new(ConnManager::new(config, dialer));
        conn.connect(&format!("login-{login_user_id}"))?;
        info!(user_id = %login_user_id, "session established");
        Ok(Self {
            login_user_id,
            store,
            notifier: Arc::new(Notifier::new()),
            conn,
        })
    }

    /// The logged-in user.
    pub fn login_user_id(&self) -> &str {
        &self.login_user_id
    }

    /// The session's listener registries.
    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }

    /// The session's connection manager.
    pub fn conn(&self) -> &Arc<ConnManager<D>> {
        &self.conn
    }

    /// The session's store handle.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Logs out: closes the connection and drops the listener registries.
    pub fn logout(self) -> ClientResult<()> {
        self.conn.close()?;
        info!(user_id = %self.login_user_id, "session closed");
        Ok(())
    }
}

impl<S, D> ClientSession<S, D>
where
    S: ReadStore,
    D: Dialer,
{
    /// A read-state tracker acknowledging through this session's connection.
    pub fn read_tracker(&self) -> ReadStateTracker<S, ConnAcker<D>> {
        let acker = ConnAcker::new(Arc::clone(&self.conn), &self.login_user_id);
        ReadStateTracker::new(
            Arc::clone(&self.store),
            acker,
            Arc::clone(&self.notifier),
            &self.login_user_id,
        )
    }
}

impl<S, D> ClientSession<S, D>
where
    S: GroupStore + ReadStore + VersionStore + 'static,
    D: Dialer,
{
    /// A group syncer fetching pages through `fetcher`.
    pub fn group_sync<F: PageFetcher + 'static>(&self, fetcher: Arc<F>) -> GroupSync<S, F> {
        GroupSync::new(
            Arc::clone(&self.store),
            fetcher,
            Arc::clone(&self.notifier),
            &self.login_user_id,
        )
    }
}
