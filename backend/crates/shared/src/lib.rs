//! Shared Kernel - Domain-crossing minimal core
//!
//! - Unified error type ([`error::app_error::AppError`]) and its HTTP rendering
//! - Typed UUID identifiers ([`id::Id`])
//!
//! Only vocabulary with the same meaning in every crate belongs here.

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
pub mod id;
