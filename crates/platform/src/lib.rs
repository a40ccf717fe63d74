//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations for the auth client:
//! - Password strength policy (NIST SP 800-63B subset, client-side only)
//! - Durable namespaced JSON storage for cached client state
//! - Bounded retry/backoff policy
//! - PKCE material for the OAuth redirect flow

pub mod password;
pub mod pkce;
pub mod retry;
pub mod storage;
