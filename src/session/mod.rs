//! SSH connection pooling and command execution (C2/C3).
//!
//! This module owns the lifecycle of one authenticated SSH session per configured
//! node: dialing, running commands (optionally under sudo), opening an SFTP
//! sub-channel for file transfer, and filtering the pool down to a subset of nodes
//! for a single invocation.
//!
//! # Main components
//!
//! - [`pool::ConnectionPool`] - dials every configured node once, keyed by name
//! - [`connection::Connection`] - one node's authenticated session
//! - [`filter::ExecFilter`] - include/exclude narrowing applied to a pool
//! - [`security::ConnectionSecurityOptions`] - SSH algorithm preference + host-key policy

pub mod connection;
pub mod filter;
pub mod pool;
pub mod security;
