use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use super::collaborators::{AuthCollaborator, Navigator};
use super::guard::{GuardEffect, GuardEvent, RouteGuard};
use super::model::{AccessDecision, AllowList, Profile, RoleLookup, SessionState};
use super::role::RoleResolver;

/// Drives a [`RouteGuard`] from live inputs and carries out its effects.
///
/// Inputs are the session view and the page allow-list (both `watch`
/// channels). Role lookups run as spawned tasks and report back tagged with
/// their subject, so a result that arrives after the session moved on is
/// discarded by the guard.
pub struct GuardRunner {
    guard: RouteGuard,
    session_rx: watch::Receiver<SessionState>,
    allow_list_rx: watch::Receiver<AllowList>,
    lookup_tx: mpsc::UnboundedSender<(String, RoleLookup)>,
    lookup_rx: mpsc::UnboundedReceiver<(String, RoleLookup)>,
    roles: Arc<RoleResolver>,
    auth: Arc<dyn AuthCollaborator>,
    navigator: Arc<dyn Navigator>,
    decision_tx: watch::Sender<AccessDecision>,
    primed: bool,
    sessions_open: bool,
    allow_list_open: bool,
}

impl GuardRunner {
    pub fn new(
        session_rx: watch::Receiver<SessionState>,
        allow_list_rx: watch::Receiver<AllowList>,
        roles: Arc<RoleResolver>,
        auth: Arc<dyn AuthCollaborator>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let guard = RouteGuard::new(allow_list_rx.borrow().clone());
        let (lookup_tx, lookup_rx) = mpsc::unbounded_channel();
        let (decision_tx, _) = watch::channel(AccessDecision::Pending);

        Self {
            guard,
            session_rx,
            allow_list_rx,
            lookup_tx,
            lookup_rx,
            roles,
            auth,
            navigator,
            decision_tx,
            primed: false,
            sessions_open: true,
            allow_list_open: true,
        }
    }

    /// Decision updates, for render code that shows a spinner while pending.
    #[allow(dead_code)]
    pub fn decisions(&self) -> watch::Receiver<AccessDecision> {
        self.decision_tx.subscribe()
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.guard.profile()
    }

    /// Apply any input that is already waiting, then process events until
    /// the decision leaves `Pending`.
    ///
    /// Returns `Pending` only if every input closed while still undecided.
    pub async fn settle(&mut self) -> AccessDecision {
        self.prime().await;
        self.drain_ready().await;
        while self.guard.decision().is_pending() {
            if !self.step().await {
                break;
            }
        }
        self.guard.decision().clone()
    }

    /// Process events until both the session and the allow-list inputs close.
    #[allow(dead_code)]
    pub async fn run(mut self) {
        self.prime().await;
        while self.step().await {}
        tracing::debug!("Guard inputs closed, runner stopping");
    }

    async fn prime(&mut self) {
        if self.primed {
            return;
        }
        self.primed = true;
        let allow_list = self.allow_list_rx.borrow_and_update().clone();
        self.apply(GuardEvent::AllowListChanged(allow_list)).await;
        let session = self.session_rx.borrow_and_update().clone();
        self.apply(GuardEvent::SessionChanged(session)).await;
    }

    async fn drain_ready(&mut self) {
        loop {
            if self.sessions_open && self.session_rx.has_changed().unwrap_or(false) {
                let session = self.session_rx.borrow_and_update().clone();
                self.apply(GuardEvent::SessionChanged(session)).await;
            } else if self.allow_list_open && self.allow_list_rx.has_changed().unwrap_or(false) {
                let allow_list = self.allow_list_rx.borrow_and_update().clone();
                self.apply(GuardEvent::AllowListChanged(allow_list)).await;
            } else {
                break;
            }
        }
    }

    /// Wait for the next input and apply it. False once nothing can change
    /// the guard any more.
    async fn step(&mut self) -> bool {
        if !self.sessions_open && !self.allow_list_open {
            return false;
        }

        tokio::select! {
            changed = self.session_rx.changed(), if self.sessions_open => {
                match changed {
                    Ok(()) => {
                        let session = self.session_rx.borrow_and_update().clone();
                        self.apply(GuardEvent::SessionChanged(session)).await;
                    }
                    Err(_) => self.sessions_open = false,
                }
            }
            changed = self.allow_list_rx.changed(), if self.allow_list_open => {
                match changed {
                    Ok(()) => {
                        let allow_list = self.allow_list_rx.borrow_and_update().clone();
                        self.apply(GuardEvent::AllowListChanged(allow_list)).await;
                    }
                    Err(_) => self.allow_list_open = false,
                }
            }
            Some((subject, lookup)) = self.lookup_rx.recv() => {
                self.apply(GuardEvent::RoleResolved { subject, lookup }).await;
            }
        }
        true
    }

    async fn apply(&mut self, event: GuardEvent) {
        let effects = self.guard.handle(event);
        for effect in effects {
            self.execute(effect).await;
        }
        let decision = self.guard.decision().clone();
        self.decision_tx.send_if_modified(|current| {
            if *current == decision {
                false
            } else {
                *current = decision;
                true
            }
        });
    }

    async fn execute(&self, effect: GuardEffect) {
        match effect {
            GuardEffect::StartRoleLookup { subject } => {
                let roles = Arc::clone(&self.roles);
                let tx = self.lookup_tx.clone();
                tokio::spawn(async move {
                    let lookup = roles.resolve(&subject).await;
                    // The runner may be gone already; nothing to report to.
                    let _ = tx.send((subject, lookup));
                });
            }
            GuardEffect::SignOut { subject } => {
                tracing::warn!("Signing out subject {} with no usable profile", subject);
                if let Err(e) = self.auth.sign_out().await {
                    tracing::error!("Failed to sign out subject {}: {}", subject, e);
                }
            }
            GuardEffect::Replace(path) => self.navigator.replace(&path),
        }
    }
}
