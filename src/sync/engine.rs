//! Sync Engine
//!
//! One task owns the local model, the cache, the session and the save
//! scheduler, and reacts to three queues: commands from [`SyncHandle`],
//! push events from the server, and completions of the network requests it
//! spawned. Nothing else mutates the snapshot, so ordering between local
//! edits, saves and refetches is decided in exactly one place.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

use super::channel::{FetchReason, Reaction, RemoteChangeChannel, RemoteEvent};
use super::error::{SyncError, SyncResult};
use super::scheduler::{PersistenceScheduler, SaveDecision, SyncPhase, DEFAULT_DEBOUNCE};
use super::session::{Session, SessionStore};
use crate::cache::{CacheStore, KeyValueStore};
use crate::model::{Identity, LocalModel, Snapshot};
use crate::remote::{
    ApiError, AuthResponse, Credentials, DashboardApi, DataResponse, SaveRequest, SystemMode,
};

/// Runtime configuration of the engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Quiet period before edits are saved
    pub debounce: Duration,
    /// Identity whose changes every session refetches
    pub privileged_identity: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            privileged_identity: super::channel::DEFAULT_PRIVILEGED_IDENTITY.to_string(),
        }
    }
}

/// Result of a save request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Debounced; the save happens later
    Scheduled,
    /// The server acknowledged the snapshot
    Saved,
    /// The server already had this snapshot; nothing was sent
    Unchanged,
}

/// Point-in-time view of the engine
#[derive(Debug, Clone, PartialEq)]
pub struct SyncStatus {
    pub phase: SyncPhase,
    pub identity: Identity,
    pub mode: SystemMode,
    pub version: u64,
    pub push_connected: bool,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl SyncStatus {
    pub fn is_saving(&self) -> bool {
        matches!(self.phase, SyncPhase::Saving { .. })
    }
}

type Mutation = Box<dyn FnOnce(&mut Snapshot) + Send>;
type Reply<T> = oneshot::Sender<SyncResult<T>>;

enum Command {
    Mutate(Mutation),
    ScheduleSave {
        immediate: bool,
        new_password: Option<String>,
        reply: Option<Reply<SaveOutcome>>,
    },
    Snapshot(oneshot::Sender<Snapshot>),
    Status(oneshot::Sender<SyncStatus>),
    Authenticate {
        credentials: Credentials,
        register: bool,
        reply: Reply<()>,
    },
    Logout(Reply<()>),
    Refresh(Reply<()>),
    Shutdown(oneshot::Sender<()>),
}

enum Completion {
    Saved(Result<(), ApiError>),
    Fetched {
        seq: u64,
        edits: u64,
        reason: FetchReason,
        guarded: bool,
        result: Result<DataResponse, ApiError>,
    },
    Authenticated {
        result: Result<AuthResponse, ApiError>,
        reply: Reply<()>,
    },
}

/// The reconciliation loop
pub struct SyncEngine {
    api: Arc<dyn DashboardApi>,
    model: LocalModel,
    cache: CacheStore,
    sessions: SessionStore,
    session: Session,
    scheduler: PersistenceScheduler,
    channel: RemoteChangeChannel,
    commands: mpsc::UnboundedReceiver<Command>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    token_tx: watch::Sender<Option<String>>,
    save_waiters: Vec<Reply<SaveOutcome>>,
    flush_requested: bool,
    pending_password: Option<String>,
    fetch_seq: u64,
    fetch_waiters: Vec<Reply<()>>,
    unguarded_fetch: bool,
    last_saved_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    stop_requested: Option<oneshot::Sender<()>>,
}

impl SyncEngine {
    /// Create an engine over `api` and the key-value store `kv`, resuming a
    /// persisted session if there is one
    pub fn new(
        api: Arc<dyn DashboardApi>,
        kv: Arc<dyn KeyValueStore>,
        config: EngineConfig,
    ) -> (Self, SyncHandle) {
        let sessions = SessionStore::new(Arc::clone(&kv));
        let session = Session::restore(sessions.load());
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (token_tx, _) = watch::channel(session.token.clone());

        let engine = Self {
            api,
            model: LocalModel::new(),
            cache: CacheStore::new(kv),
            sessions,
            session,
            scheduler: PersistenceScheduler::new(config.debounce),
            channel: RemoteChangeChannel::new(config.privileged_identity),
            commands,
            completions_tx,
            completions_rx,
            token_tx,
            save_waiters: Vec::new(),
            flush_requested: false,
            pending_password: None,
            fetch_seq: 0,
            fetch_waiters: Vec::new(),
            unguarded_fetch: false,
            last_saved_at: None,
            last_error: None,
            stop_requested: None,
        };

        (engine, SyncHandle { commands: commands_tx })
    }

    /// Id this client announces to the server
    pub fn session_id(&self) -> &str {
        &self.session.session_id
    }

    /// Current session token, updated on login, logout and expiry
    pub fn token_watch(&self) -> watch::Receiver<Option<String>> {
        self.token_tx.subscribe()
    }

    /// Run until shutdown or until every [`SyncHandle`] is dropped.
    ///
    /// `remote` carries push events; a closed channel simply means no push
    /// updates.
    pub async fn run(mut self, mut remote: mpsc::Receiver<RemoteEvent>) {
        self.bootstrap();
        let mut remote_open = true;

        loop {
            let deadline = self.scheduler.deadline();

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                event = remote.recv(), if remote_open => match event {
                    Some(event) => self.handle_remote(event),
                    None => remote_open = false,
                },
                Some(completion) = self.completions_rx.recv() => self.handle_completion(completion),
                _ = sleep_until(deadline) => self.start_save(),
            }

            if self.stop_requested.is_some() {
                break;
            }
        }

        self.drain().await;
        if let Some(reply) = self.stop_requested.take() {
            let _ = reply.send(());
        }
        tracing::info!("Sync engine stopped");
    }

    /// Show whatever the cache holds for this identity, then fetch
    fn bootstrap(&mut self) {
        if let Some(cached) = self.cache.load(&self.session.identity) {
            tracing::info!(identity = %self.session.identity, "Showing cached dashboard");
            self.model.replace_snapshot(cached);
        }
        self.start_fetch(FetchReason::ColdStart, None);
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Mutate(mutation) => {
                self.model.apply_local_mutation(mutation);
                self.write_through();
            }
            Command::ScheduleSave {
                immediate: false,
                reply,
                ..
            } => {
                self.scheduler.schedule(Instant::now());
                if let Some(reply) = reply {
                    let _ = reply.send(Ok(SaveOutcome::Scheduled));
                }
            }
            Command::ScheduleSave {
                immediate: true,
                new_password,
                reply,
            } => {
                if new_password.is_some() {
                    self.pending_password = new_password;
                }
                self.save_waiters.extend(reply);
                if self.scheduler.is_saving() {
                    self.flush_requested = true;
                } else {
                    self.start_save();
                }
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.model.snapshot().clone());
            }
            Command::Status(reply) => {
                let _ = reply.send(self.status());
            }
            Command::Authenticate {
                credentials,
                register,
                reply,
            } => {
                let api = Arc::clone(&self.api);
                let tx = self.completions_tx.clone();
                tokio::spawn(async move {
                    let result = if register {
                        api.register(&credentials).await
                    } else {
                        api.login(&credentials).await
                    };
                    let _ = tx.send(Completion::Authenticated { result, reply });
                });
            }
            Command::Logout(reply) => {
                tracing::info!(identity = %self.session.identity, "Signing out");
                self.reload_as_guest(FetchReason::Logout, Some(reply));
            }
            Command::Refresh(reply) => self.start_fetch(FetchReason::Manual, Some(reply)),
            Command::Shutdown(reply) => self.stop_requested = Some(reply),
        }
    }

    fn handle_remote(&mut self, event: RemoteEvent) {
        let busy = self.scheduler.is_busy();
        match self.channel.on_event(event, busy, &self.session) {
            Reaction::Ignore(reason) => tracing::debug!(?reason, "Push event ignored"),
            Reaction::Refetch(reason) => self.start_fetch(reason, None),
            Reaction::Deferred => tracing::debug!("Reconnect refetch deferred until save settles"),
            Reaction::ForceLogout => {
                tracing::info!("System mode changed by another session, signing out");
                self.reload_as_guest(FetchReason::ModeChanged, None);
            }
            Reaction::ApplyWidgetData { widget_id, data } => {
                if self.model.apply_widget_data(&widget_id, data) {
                    self.write_through();
                } else {
                    tracing::debug!(widget_id = %widget_id, "Update for unknown widget dropped");
                }
            }
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Saved(result) => self.on_saved(result),
            Completion::Fetched {
                seq,
                edits,
                reason,
                guarded,
                result,
            } => {
                if seq != self.fetch_seq {
                    tracing::debug!(?reason, seq, "Dropping superseded fetch");
                    return;
                }
                self.unguarded_fetch = false;
                let waiters = std::mem::take(&mut self.fetch_waiters);
                let outcome = self.on_fetched(edits, reason, guarded, result);
                for waiter in waiters {
                    let _ = waiter.send(outcome.clone());
                }
            }
            Completion::Authenticated { result, reply } => match result {
                Ok(auth) => {
                    tracing::info!(username = %auth.username, "Signed in");
                    self.scheduler.reset();
                    self.session.sign_in(&auth);
                    self.persist_session();
                    if let Some(cached) = self.cache.load(&self.session.identity) {
                        self.model.replace_snapshot(cached);
                    }
                    self.start_fetch(FetchReason::Login, Some(reply));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Authentication failed");
                    let _ = reply.send(Err(e.into()));
                }
            },
        }
    }

    // ============================================
    // Saving
    // ============================================

    fn start_save(&mut self) {
        if !self.session.can_save() {
            self.scheduler.cancel();
            tracing::debug!(identity = %self.session.identity, "Not signed in, edits stay local");
            self.settle_waiters(Err(SyncError::NotSignedIn));
            return;
        }

        let force = self.pending_password.is_some();
        match self.scheduler.begin_save(self.model.snapshot(), force) {
            Ok(SaveDecision::Send(pending)) => {
                tracing::debug!(
                    fingerprint = pending.fingerprint,
                    version = self.model.version(),
                    "Saving snapshot"
                );
                let request = SaveRequest {
                    snapshot: pending.snapshot,
                    new_password: self.pending_password.take(),
                };
                let api = Arc::clone(&self.api);
                let auth = self.session.auth_context();
                let tx = self.completions_tx.clone();
                tokio::spawn(async move {
                    let result = api.save(&auth, &request).await;
                    let _ = tx.send(Completion::Saved(result));
                });
            }
            Ok(SaveDecision::Skip) => {
                tracing::debug!("Snapshot unchanged since last save");
                self.settle_waiters(Ok(SaveOutcome::Unchanged));
                self.on_idle();
            }
            Ok(SaveDecision::Busy) => self.flush_requested = true,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize snapshot");
                self.scheduler.cancel();
                self.settle_waiters(Err(e.into()));
            }
        }
    }

    fn on_saved(&mut self, result: Result<(), ApiError>) {
        let now = Instant::now();
        let outcome = match result {
            Ok(()) => {
                self.scheduler.finish_save(true, now);
                self.last_saved_at = Some(Utc::now());
                self.last_error = None;
                self.write_through();
                tracing::debug!(version = self.model.version(), "Snapshot saved");
                Ok(SaveOutcome::Saved)
            }
            Err(ApiError::Unauthorized) => {
                self.scheduler.finish_save(false, now);
                tracing::warn!("Save rejected, session expired");
                self.expire_session();
                Err(SyncError::Unauthorized)
            }
            Err(e) => {
                self.scheduler.finish_save(false, now);
                tracing::warn!(error = %e, "Save failed, next change will retry");
                self.last_error = Some(e.to_string());
                Err(e.into())
            }
        };

        if std::mem::take(&mut self.flush_requested) && outcome.is_ok() {
            // Callers waiting on an immediate save need the newest state
            self.start_save();
            return;
        }

        self.settle_waiters(outcome);
        self.on_idle();
    }

    fn settle_waiters(&mut self, outcome: SyncResult<SaveOutcome>) {
        for waiter in self.save_waiters.drain(..) {
            let _ = waiter.send(outcome.clone());
        }
    }

    /// Run work postponed until no save is pending
    fn on_idle(&mut self) {
        if self.scheduler.is_busy() {
            return;
        }
        if self.channel.take_deferred() {
            self.start_fetch(FetchReason::Reconnect, None);
        }
    }

    /// Send whatever is pending and wait for in-flight saves
    async fn drain(&mut self) {
        if self.scheduler.deadline().is_some() {
            self.start_save();
        }
        while self.scheduler.is_saving() {
            match self.completions_rx.recv().await {
                Some(completion) => self.handle_completion(completion),
                None => break,
            }
            if self.scheduler.deadline().is_some() {
                self.start_save();
            }
        }
    }

    // ============================================
    // Fetching
    // ============================================

    /// Start a fetch that supersedes any fetch in flight. Callers waiting on
    /// the older fetch are answered by this one, and a fetch that replaces
    /// an unguarded one is unguarded too.
    fn start_fetch(&mut self, reason: FetchReason, reply: Option<Reply<()>>) {
        self.fetch_seq += 1;
        let seq = self.fetch_seq;
        let guarded = reason.is_guarded() && !self.unguarded_fetch;
        self.unguarded_fetch = !guarded;
        self.fetch_waiters.extend(reply);
        let edits = self.model.local_edits();
        let api = Arc::clone(&self.api);
        let auth = self.session.auth_context();
        let tx = self.completions_tx.clone();

        tracing::debug!(?reason, seq, guarded, "Fetching dashboard data");
        tokio::spawn(async move {
            let result = api.fetch_data(&auth).await;
            let _ = tx.send(Completion::Fetched {
                seq,
                edits,
                reason,
                guarded,
                result,
            });
        });
    }

    fn on_fetched(
        &mut self,
        edits: u64,
        reason: FetchReason,
        guarded: bool,
        result: Result<DataResponse, ApiError>,
    ) -> SyncResult<()> {
        match result {
            Ok(data) => {
                if guarded
                    && (self.model.local_edits() != edits || self.scheduler.is_busy())
                {
                    tracing::debug!(?reason, "Discarding refetch, local edits pending");
                    return Ok(());
                }
                self.adopt(data, reason);
                Ok(())
            }
            Err(ApiError::Unauthorized) => {
                tracing::warn!(?reason, "Fetch rejected, session expired");
                self.expire_session();
                Err(SyncError::Unauthorized)
            }
            Err(e) => {
                tracing::warn!(?reason, error = %e, "Fetch failed, keeping local snapshot");
                self.last_error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Replace the local model with server data
    fn adopt(&mut self, data: DataResponse, reason: FetchReason) {
        let DataResponse {
            snapshot,
            username,
            is_admin,
            mode,
        } = data;

        if self.session.adopt_server_view(username, is_admin, mode) {
            tracing::info!("Stored session is no longer valid, continuing as guest");
        }
        self.persist_session();

        if let Err(e) = self.scheduler.set_baseline(&snapshot) {
            tracing::warn!(error = %e, "Failed to fingerprint fetched snapshot");
        }
        let report = self.model.replace_snapshot(snapshot);
        self.write_through();

        tracing::info!(
            ?reason,
            identity = %self.session.identity,
            widgets = self.model.snapshot().widgets.len(),
            "Dashboard data loaded"
        );

        // Push repairs back so other sessions stop seeing the damage
        if !report.is_clean() && self.session.can_save() {
            self.scheduler.schedule(Instant::now());
        }
    }

    // ============================================
    // Session
    // ============================================

    /// Sign out and show public data until the fetch returns
    fn reload_as_guest(&mut self, reason: FetchReason, reply: Option<Reply<()>>) {
        self.session.sign_out();
        self.persist_session();
        self.scheduler.reset();

        let public = self.cache.load(&Identity::Guest).unwrap_or_default();
        self.model.replace_snapshot(public);
        self.start_fetch(reason, reply);
    }

    /// The server rejected our token; no retry of the failed request
    fn expire_session(&mut self) {
        if self.session.token.is_some() {
            self.reload_as_guest(FetchReason::SessionExpired, None);
        } else {
            self.session.sign_out();
            self.scheduler.reset();
        }
    }

    fn persist_session(&mut self) {
        if let Err(e) = self.sessions.store(&self.session) {
            tracing::warn!(error = %e, "Failed to persist session");
        }
        self.token_tx.send_if_modified(|token| {
            if *token == self.session.token {
                false
            } else {
                token.clone_from(&self.session.token);
                true
            }
        });
    }

    fn write_through(&self) {
        if let Err(e) = self.cache.save(self.model.snapshot(), &self.session.identity) {
            tracing::warn!(error = %e, "Failed to update snapshot cache");
        }
    }

    fn status(&self) -> SyncStatus {
        SyncStatus {
            phase: self.scheduler.phase(),
            identity: self.session.identity.clone(),
            mode: self.session.mode,
            version: self.model.version(),
            push_connected: self.channel.is_connected(),
            last_saved_at: self.last_saved_at,
            last_error: self.last_error.clone(),
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Cloneable front end of a running [`SyncEngine`]
#[derive(Clone)]
pub struct SyncHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl SyncHandle {
    fn send(&self, command: Command) -> SyncResult<()> {
        self.commands
            .send(command)
            .map_err(|_| SyncError::EngineStopped)
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> SyncResult<T> {
        let (tx, rx) = oneshot::channel();
        self.send(build(tx))?;
        rx.await.map_err(|_| SyncError::EngineStopped)
    }

    /// Apply an edit to the local model without scheduling a save
    pub fn apply_mutation<F>(&self, mutate: F) -> SyncResult<()>
    where
        F: FnOnce(&mut Snapshot) + Send + 'static,
    {
        self.send(Command::Mutate(Box::new(mutate)))
    }

    /// Apply an edit and schedule a debounced save
    pub fn update<F>(&self, mutate: F) -> SyncResult<()>
    where
        F: FnOnce(&mut Snapshot) + Send + 'static,
    {
        self.apply_mutation(mutate)?;
        self.send(Command::ScheduleSave {
            immediate: false,
            new_password: None,
            reply: None,
        })
    }

    /// Schedule a save. With `immediate` the debounce is bypassed and the
    /// call returns once the server has the current state.
    pub async fn schedule_save(&self, immediate: bool) -> SyncResult<SaveOutcome> {
        if !immediate {
            self.send(Command::ScheduleSave {
                immediate: false,
                new_password: None,
                reply: None,
            })?;
            return Ok(SaveOutcome::Scheduled);
        }

        self.request(|reply| Command::ScheduleSave {
            immediate: true,
            new_password: None,
            reply: Some(reply),
        })
        .await?
    }

    /// Save immediately, changing the account password along the way
    pub async fn change_password(&self, new_password: impl Into<String>) -> SyncResult<()> {
        let new_password = Some(new_password.into());
        self.request(|reply| Command::ScheduleSave {
            immediate: true,
            new_password,
            reply: Some(reply),
        })
        .await??;
        Ok(())
    }

    /// Current local snapshot
    pub async fn snapshot(&self) -> SyncResult<Snapshot> {
        self.request(Command::Snapshot).await
    }

    pub async fn status(&self) -> SyncResult<SyncStatus> {
        self.request(Command::Status).await
    }

    /// Sign in and load the user's dashboard
    pub async fn login(
        &self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> SyncResult<()> {
        self.authenticate(username.into(), password.into(), false).await
    }

    /// Create an account, sign in and load its dashboard
    pub async fn register(
        &self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> SyncResult<()> {
        self.authenticate(username.into(), password.into(), true).await
    }

    async fn authenticate(
        &self,
        username: String,
        password: String,
        register: bool,
    ) -> SyncResult<()> {
        let credentials = Credentials { username, password };
        self.request(|reply| Command::Authenticate {
            credentials,
            register,
            reply,
        })
        .await?
    }

    /// Flush pending edits, then sign out and load the public dashboard
    pub async fn logout(&self) -> SyncResult<()> {
        match self.schedule_save(true).await {
            Ok(_) | Err(SyncError::NotSignedIn) | Err(SyncError::Unauthorized) => {}
            Err(e) => tracing::warn!(error = %e, "Could not flush edits before logout"),
        }
        self.request(Command::Logout).await?
    }

    /// Refetch from the server, replacing the local model
    pub async fn refresh(&self) -> SyncResult<()> {
        self.request(Command::Refresh).await?
    }

    /// Flush pending edits and return the snapshot as pretty JSON
    pub async fn export(&self) -> SyncResult<String> {
        match self.schedule_save(true).await {
            Ok(_) | Err(SyncError::NotSignedIn) => {}
            Err(e) => return Err(e),
        }
        let snapshot = self.snapshot().await?;
        Ok(serde_json::to_string_pretty(&snapshot)?)
    }

    /// Flush pending edits and stop the engine
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.request(Command::Shutdown).await
    }
}
