//! Value Object Module

pub mod email;
pub mod provider;
pub mod role;
