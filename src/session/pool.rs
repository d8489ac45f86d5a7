//! Connection pool: one dialed [`Connection`] per configured node (C3).

use log::warn;

use crate::error::PiclError;
use crate::node::Node;

use super::connection::Connection;
use super::filter::ExecFilter;
use super::security::ConnectionSecurityOptions;

/// Every node dialed successfully from a cluster config, in configured order.
///
/// Dialing is immutable and one-shot: there is no reconnect-on-demand or TTL-based
/// eviction, unlike a long-lived session cache. A node whose dial fails is logged and
/// skipped rather than failing the whole pool, mirroring the original source's
/// best-effort fleet connect.
pub struct ConnectionPool {
    connections: Vec<Connection>,
}

impl ConnectionPool {
    /// Dials every node in `nodes` against the default (secure, known_hosts-checking)
    /// security profile, in order, skipping (and logging) any that fail.
    pub async fn dial_all(nodes: &[Node]) -> Self {
        Self::dial_all_with_security(nodes, &ConnectionSecurityOptions::default()).await
    }

    /// As [`Self::dial_all`], but against an explicit security profile — used by tests
    /// that need to skip host-key verification against an ephemeral test server.
    pub async fn dial_all_with_security(
        nodes: &[Node],
        security: &ConnectionSecurityOptions,
    ) -> Self {
        let mut connections = Vec::with_capacity(nodes.len());
        for node in nodes {
            let name = node.name.clone();
            match Connection::dial(node.clone(), security).await {
                Ok(conn) => connections.push(conn),
                Err(err) => warn!("skipping node '{name}': {err}"),
            }
        }
        Self { connections }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Applies `filter` to this pool, returning the subset of connections it selects
    /// while preserving the pool's configured order.
    pub fn filter<'a>(&'a self, filter: &ExecFilter) -> Result<Vec<&'a Connection>, PiclError> {
        filter.validate()?;
        Ok(self
            .connections
            .iter()
            .filter(|conn| filter.matches(conn.name()))
            .collect())
    }

    pub async fn close_all(&self) {
        for conn in &self.connections {
            conn.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pool_reports_empty() {
        let pool = ConnectionPool {
            connections: Vec::new(),
        };
        assert!(pool.is_empty());
        assert_eq!(pool.len(), 0);
    }
}
