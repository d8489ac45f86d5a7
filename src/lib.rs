//! # picl - parallel multi-host command executor and telemetry dashboard
//!
//! `picl` drives a fleet of small Linux hosts (archetypally single-board computers on a
//! LAN) from one operator workstation. It lets an operator run the same shell command on
//! many nodes in parallel, push or pull files, replicate a file from one node to the
//! rest of the fleet, bootstrap SSH public-key access, and poll each node for
//! system-health telemetry rendered in a terminal dashboard.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use picl::config::ClusterConfig;
//! use picl::session::pool::ConnectionPool;
//! use picl::session::filter::ExecFilter;
//! use picl::executor;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = ClusterConfig::load("default")?;
//!     let pool = ConnectionPool::dial_all(&cfg.hosts).await;
//!     let filter = ExecFilter::default();
//!     executor::exec(&pool, "uname -a", &filter).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Main components
//!
//! - [`session::pool::ConnectionPool`] - dials and holds one SSH connection per node
//! - [`session::connection::Connection`] - one authenticated session, `exec`/`exec_sudo`/SFTP
//! - [`executor`] - fans a shell command out across a filtered connection set
//! - [`transfer`] - push / pull / replicate / remove over SFTP
//! - [`bootstrap`] - installs the operator's public key into `authorized_keys`
//! - [`telemetry`] - HTTP polling client, cancellable pipeline, pluggable display handlers
//! - [`config`] - cluster config loading (optionally AES-GCM encrypted)
//! - [`crypto`] - the AES-GCM/PBKDF2 cryptor used for `encrypt-config`/`decrypt-config`
//! - [`error`] - the error kinds every fan-out verb can return

pub mod bootstrap;
pub mod config;
pub mod crypto;
pub mod error;
pub mod executor;
pub mod logging;
pub mod node;
pub mod output;
pub mod session;
pub mod telemetry;
pub mod transfer;
