//! Console user profiles.
//!
//! Profiles live in the `users` document collection, keyed by the identity
//! provider's subject id. The role stored here is what the route guard reads.
//!
//! ## Endpoints
//!
//! | Method | Endpoint | Access | Description |
//! |--------|----------|--------|-------------|
//! | GET | `/api/users/me` | Any role | Own profile and landing route |
//! | GET | `/api/users` | Students page | List profiles, filter by role |
//! | GET | `/api/users/{id}` | Students page | One profile |
//! | POST | `/api/users` | Admin | Provision a profile |
//! | PATCH | `/api/users/{id}` | Admin | Merge-patch a profile |
//! | DELETE | `/api/users/{id}` | Admin | Delete a profile and revoke its sessions |

pub mod dtos;
pub mod handlers;
pub mod routes;
pub mod services;

pub use services::UserService;
