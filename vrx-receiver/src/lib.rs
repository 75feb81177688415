//! Receiver-side library: configuration and the session orchestrator.

pub mod config;
pub mod session;
