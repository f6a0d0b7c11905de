//! Value Object Module

pub mod email;
pub mod full_name;
pub mod identity;
pub mod ids;
pub mod user_role;
