//! Infrastructure Layer
//!
//! Repository implementations (PostgreSQL, in-memory) and clients for the
//! outside world (OpenID Connect providers, e-mail).

pub mod email;
pub mod memory;
pub mod oauth;
pub mod postgres;

pub use email::{EmailKind, LoggingEmailSender, RecordingEmailSender};
pub use memory::InMemoryAuthRepository;
pub use oauth::{OidcProvider, providers_from_config};
pub use postgres::PgAuthRepository;
