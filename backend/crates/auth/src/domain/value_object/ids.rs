//! Identifier aliases shared with the kernel

pub use kernel::id::{AuditEventId, EphemeralTokenId, RefreshSessionId, UserId};
