use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use super::collaborators::LocationTracker;
use super::model::{AccessDecision, AllowList, Profile, Role, SessionState};
use super::policy::{default_route, NavItem, RoutePolicy};
use super::role::RoleResolver;
use super::runner::GuardRunner;
use super::session::SessionResolver;
use crate::core::error::{AppError, Result};
use crate::features::auth::{RequestSession, RevocationList};

/// Settled guard outcome for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub decision: AccessDecision,
    /// Caller's profile, present only when access was granted.
    pub profile: Option<Profile>,
}

impl Evaluation {
    /// Granted profile, or the denial as an error.
    pub fn into_profile(self) -> Result<Profile> {
        match (self.decision, self.profile) {
            (AccessDecision::Granted, Some(profile)) => Ok(profile),
            (AccessDecision::Denied { reason, redirect_to }, _) => {
                Err(AppError::AccessDenied { reason, redirect_to })
            }
            (decision, _) => Err(AppError::Internal(format!(
                "guard did not settle: {:?}",
                decision
            ))),
        }
    }
}

/// Where a signed-in caller should go next.
#[derive(Debug, Clone, PartialEq)]
pub struct Landing {
    pub redirect_to: String,
    pub decision: AccessDecision,
    pub profile: Option<Profile>,
}

/// Runs the route guard for HTTP requests.
///
/// Each evaluation wires a fresh guard to the request's session; sign-out
/// effects revoke the subject's tokens through the shared revocation list.
pub struct AccessService {
    policy: Arc<RoutePolicy>,
    roles: Arc<RoleResolver>,
    revocations: Arc<RevocationList>,
    session_init_timeout: Duration,
}

impl AccessService {
    pub fn new(
        policy: Arc<RoutePolicy>,
        roles: Arc<RoleResolver>,
        revocations: Arc<RevocationList>,
        session_init_timeout: Duration,
    ) -> Self {
        Self {
            policy,
            roles,
            revocations,
            session_init_timeout,
        }
    }

    pub fn policy(&self) -> &RoutePolicy {
        &self.policy
    }

    pub async fn evaluate(&self, session: SessionState, allow_list: AllowList) -> Evaluation {
        let auth = Arc::new(RequestSession::new(session, self.revocations.clone()));
        let sessions = SessionResolver::spawn(auth.as_ref(), self.session_init_timeout);
        let (_allow_tx, allow_rx) = watch::channel(allow_list);
        let navigator = Arc::new(LocationTracker::new());

        let mut runner = GuardRunner::new(
            sessions.watch(),
            allow_rx,
            self.roles.clone(),
            auth,
            navigator,
        );
        let decision = runner.settle().await;
        let profile = runner.profile().cloned();

        Evaluation { decision, profile }
    }

    /// Guard decision for a console page. Paths the policy does not know are
    /// `NotFound`.
    pub async fn check_page(&self, session: SessionState, path: &str) -> Result<Evaluation> {
        let allow_list = self
            .policy
            .allow_list_for(path)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("No console page at {}", path)))?;

        Ok(self.evaluate(session, allow_list).await)
    }

    /// Post-sign-in routing: a signed-in user with a profile goes to their
    /// role's landing page, everyone else to wherever the guard sends them.
    pub async fn landing(&self, session: SessionState) -> Landing {
        let Evaluation { decision, profile } = self.evaluate(session, AllowList::all()).await;

        let redirect_to = match (&decision, &profile) {
            (AccessDecision::Granted, Some(profile)) => default_route(profile.role).to_string(),
            (AccessDecision::Denied { redirect_to, .. }, _) => redirect_to.clone(),
            _ => super::policy::SIGN_IN_ROUTE.to_string(),
        };

        Landing {
            redirect_to,
            decision,
            profile,
        }
    }

    pub fn navigation(&self, role: Role) -> &[NavItem] {
        self.policy.navigation_for(role)
    }
}
