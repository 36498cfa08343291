//! Route guard state machine.
//!
//! The guard owns no I/O. Callers feed it [`GuardEvent`]s and carry out the
//! [`GuardEffect`]s it returns; [`super::runner::GuardRunner`] does that over
//! tokio channels, tests do it by hand.
//!
//! ```text
//! Pending --session loading--------------------> Pending
//! Pending --session absent---------------------> Denied(sign-in)
//! Pending --session present(s)-----------------> Pending + StartRoleLookup(s)
//! Pending --lookup(s) not found / failed-------> Denied(sign-in) + SignOut(s)
//! Pending --lookup(s) role in allow-list-------> Granted
//! Pending --lookup(s) role not in allow-list---> Denied(default route of role)
//! any     --subject or allow-list change-------> Pending, re-run
//! ```

use super::model::{AccessDecision, AllowList, DenyReason, Profile, RoleLookup, SessionState};
use super::policy::{default_route, SIGN_IN_ROUTE};

#[derive(Debug, Clone, PartialEq)]
pub enum GuardEvent {
    SessionChanged(SessionState),
    AllowListChanged(AllowList),
    /// Result of a lookup, tagged with the subject it was issued for.
    RoleResolved { subject: String, lookup: RoleLookup },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardEffect {
    StartRoleLookup { subject: String },
    SignOut { subject: String },
    Replace(String),
}

#[derive(Debug, Clone)]
pub struct RouteGuard {
    allow_list: AllowList,
    session: SessionState,
    lookup_in_flight: Option<String>,
    decision: AccessDecision,
    profile: Option<Profile>,
}

impl RouteGuard {
    /// A guard for a page with the given allow-list. The session starts out
    /// `Loading` until the first `SessionChanged`.
    pub fn new(allow_list: AllowList) -> Self {
        Self {
            allow_list,
            session: SessionState::Loading,
            lookup_in_flight: None,
            decision: AccessDecision::Pending,
            profile: None,
        }
    }

    pub fn decision(&self) -> &AccessDecision {
        &self.decision
    }

    /// Profile behind a `Granted` decision.
    pub fn profile(&self) -> Option<&Profile> {
        match self.decision {
            AccessDecision::Granted => self.profile.as_ref(),
            _ => None,
        }
    }

    pub fn handle(&mut self, event: GuardEvent) -> Vec<GuardEffect> {
        match event {
            GuardEvent::SessionChanged(session) => {
                if session == self.session {
                    return Vec::new();
                }
                self.session = session;
                self.restart()
            }
            GuardEvent::AllowListChanged(allow_list) => {
                if allow_list == self.allow_list {
                    return Vec::new();
                }
                self.allow_list = allow_list;
                self.restart()
            }
            GuardEvent::RoleResolved { subject, lookup } => self.on_role_resolved(subject, lookup),
        }
    }

    /// Back to `Pending` and start over from the current inputs.
    fn restart(&mut self) -> Vec<GuardEffect> {
        self.decision = AccessDecision::Pending;
        self.profile = None;
        self.lookup_in_flight = None;

        match self.session.clone() {
            SessionState::Loading => Vec::new(),
            SessionState::Absent => self.deny(DenyReason::SessionAbsent, SIGN_IN_ROUTE.to_string()),
            SessionState::Present(subject) => {
                self.lookup_in_flight = Some(subject.clone());
                vec![GuardEffect::StartRoleLookup { subject }]
            }
        }
    }

    fn on_role_resolved(&mut self, subject: String, lookup: RoleLookup) -> Vec<GuardEffect> {
        let current = self.session.subject() == Some(subject.as_str())
            && self.lookup_in_flight.as_deref() == Some(subject.as_str());
        if !current {
            tracing::debug!("Discarding stale role lookup for subject {}", subject);
            return Vec::new();
        }
        self.lookup_in_flight = None;

        match lookup {
            RoleLookup::Found(profile) if self.allow_list.contains(profile.role) => {
                tracing::debug!("Access granted to subject {} as {}", subject, profile.role);
                self.decision = AccessDecision::Granted;
                self.profile = Some(profile);
                Vec::new()
            }
            RoleLookup::Found(profile) => {
                let role = profile.role;
                self.deny(DenyReason::RoleNotAllowed(role), default_route(role).to_string())
            }
            RoleLookup::NotFound => {
                let mut effects = vec![GuardEffect::SignOut { subject }];
                effects.extend(self.deny(DenyReason::ProfileNotFound, SIGN_IN_ROUTE.to_string()));
                effects
            }
            RoleLookup::Failed(error) => {
                tracing::warn!(
                    "Denying subject {} after failed profile lookup: {}",
                    subject,
                    error
                );
                let mut effects = vec![GuardEffect::SignOut { subject }];
                effects.extend(self.deny(DenyReason::LookupFailed, SIGN_IN_ROUTE.to_string()));
                effects
            }
        }
    }

    fn deny(&mut self, reason: DenyReason, redirect_to: String) -> Vec<GuardEffect> {
        tracing::debug!("Access denied ({}), redirecting to {}", reason, redirect_to);
        self.decision = AccessDecision::Denied {
            reason,
            redirect_to: redirect_to.clone(),
        };
        vec![GuardEffect::Replace(redirect_to)]
    }
}
