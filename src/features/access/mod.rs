//! Role-based access control for the console.
//!
//! The pieces, bottom-up:
//!
//! - [`session::SessionResolver`] turns the auth provider's session stream
//!   into a view that never stays loading past a timeout.
//! - [`role::RoleResolver`] reads `users/{subject}` once and classifies the
//!   result as found, not found or failed.
//! - [`guard::RouteGuard`] is a pure state machine from session, allow-list
//!   and lookup events to a decision plus effects (start lookup, sign out,
//!   navigate).
//! - [`runner::GuardRunner`] drives a guard from live channels and carries
//!   out its effects.
//! - [`policy::RoutePolicy`] maps console pages to allow-lists and roles to
//!   their landing page and navigation.
//! - [`AccessService`] settles a guard per HTTP request.
//!
//! ## Endpoints
//!
//! | Method | Endpoint | Access | Description |
//! |--------|----------|--------|-------------|
//! | GET | `/api/access/landing` | Session | Post-sign-in redirect target |
//! | GET | `/api/access/check?path=` | Session | Decision for a console page |
//! | GET | `/api/access/navigation` | Any role | Sidebar entries for the caller |

pub mod collaborators;
pub mod dtos;
pub mod guard;
pub mod handlers;
pub mod model;
pub mod policy;
pub mod role;
pub mod routes;
pub mod runner;
pub mod service;
pub mod session;

pub use service::AccessService;
