pub mod errors;
pub mod logging;

pub use errors::{AuthError, AuthErrorKind, AuthResult};
pub use logging::{init_tracing, LogFormat};
