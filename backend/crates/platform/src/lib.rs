//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Cryptographic utilities (random tokens, SHA-256, Base64url)
//! - Password hashing (Argon2id) and strength policy
//! - Client metadata and bearer token extraction
//! - Environment configuration helpers

pub mod client;
pub mod config;
pub mod crypto;
pub mod password;
