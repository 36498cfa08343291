use std::time::Duration;
use tokio::sync::watch;

use super::collaborators::AuthCollaborator;
use super::model::SessionState;

/// Read-only view of the auth collaborator's session.
///
/// The view never stays `Loading` for longer than `init_timeout`: if the
/// collaborator has not reported by then, the view reads `Absent` so the guard
/// can redirect to sign-in. A late report from the collaborator still comes
/// through.
pub struct SessionResolver {
    rx: watch::Receiver<SessionState>,
}

impl SessionResolver {
    /// Subscribe to `auth` and start forwarding. Must be called inside a
    /// tokio runtime.
    pub fn spawn(auth: &dyn AuthCollaborator, init_timeout: Duration) -> Self {
        let mut upstream = auth.subscribe();
        let initial = upstream.borrow_and_update().clone();
        let (tx, rx) = watch::channel(initial);

        tokio::spawn(async move {
            loop {
                let current = upstream.borrow_and_update().clone();
                publish(&tx, current.clone());
                if tx.is_closed() {
                    break;
                }

                let changed = if current.is_loading() {
                    match tokio::time::timeout(init_timeout, upstream.changed()).await {
                        Ok(changed) => changed,
                        Err(_) => {
                            tracing::warn!(
                                "Auth provider still loading after {:?}, treating session as absent",
                                init_timeout
                            );
                            publish(&tx, SessionState::Absent);
                            upstream.changed().await
                        }
                    }
                } else {
                    upstream.changed().await
                };

                if changed.is_err() {
                    if tx.borrow().is_loading() {
                        tracing::warn!("Auth provider went away before reporting a session");
                        publish(&tx, SessionState::Absent);
                    }
                    break;
                }
            }
        });

        Self { rx }
    }

    #[cfg(test)]
    pub fn current(&self) -> SessionState {
        self.rx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.rx.clone()
    }
}

fn publish(tx: &watch::Sender<SessionState>, next: SessionState) {
    tx.send_if_modified(|state| {
        if *state == next {
            false
        } else {
            *state = next;
            true
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::test_helpers::FakeAuth;

    #[tokio::test(start_paused = true)]
    async fn test_stuck_loading_resolves_to_absent() {
        let auth = FakeAuth::new(SessionState::Loading);
        let resolver = SessionResolver::spawn(&auth, Duration::from_secs(5));
        let mut rx = resolver.watch();

        assert_eq!(resolver.current(), SessionState::Loading);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), SessionState::Absent);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_session_is_still_forwarded() {
        let auth = FakeAuth::new(SessionState::Loading);
        let resolver = SessionResolver::spawn(&auth, Duration::from_secs(5));
        let mut rx = resolver.watch();

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), SessionState::Absent);

        auth.set(SessionState::Present("u1".to_string()));
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), SessionState::Present("u1".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_resolving_in_time_is_forwarded() {
        let auth = FakeAuth::new(SessionState::Loading);
        let resolver = SessionResolver::spawn(&auth, Duration::from_secs(5));
        let mut rx = resolver.watch();

        tokio::time::sleep(Duration::from_secs(1)).await;
        auth.set(SessionState::Present("u1".to_string()));
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), SessionState::Present("u1".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_dropped_while_loading_resolves_to_absent() {
        let auth = FakeAuth::new(SessionState::Loading);
        let resolver = SessionResolver::spawn(&auth, Duration::from_secs(60));
        let mut rx = resolver.watch();
        drop(auth);

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), SessionState::Absent);
    }
}
