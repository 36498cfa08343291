mod jwks;
mod revocation;
mod session;
mod validator;

pub use jwks::JwksClient;
pub use revocation::RevocationList;
pub use session::{session_from_headers, RequestSession};
pub use validator::JwtValidator;
