//! Command Executor (C4): fans a shell command out across a filtered connection set.

use std::io::IsTerminal;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::join_all;
use log::warn;
use tokio::io::AsyncReadExt;

use crate::error::PiclError;
use crate::output::TaggedWriter;
use crate::session::connection::Connection;
use crate::session::filter::ExecFilter;
use crate::session::pool::ConnectionPool;

/// Runs `command` on every connection `filter` selects, in parallel, and returns
/// [`PiclError::AggregateFailure`] if any target failed. An empty filtered set is
/// logged and treated as success, per §4.4. If local stdin is piped (not a tty), its
/// full contents are forwarded to every target's remote stdin.
pub async fn exec(pool: &ConnectionPool, command: &str, filter: &ExecFilter) -> Result<(), PiclError> {
    let stdin = read_piped_stdin().await?;
    run(pool, command, filter, false, stdin).await
}

/// As [`exec`], but runs the command under `sudo -S` with the node's configured
/// password piped to stdin.
pub async fn exec_sudo(pool: &ConnectionPool, command: &str, filter: &ExecFilter) -> Result<(), PiclError> {
    run(pool, command, filter, true, None).await
}

/// Reads all of local stdin when it is piped rather than an interactive terminal.
/// A tty is never drained, since that would hang the command waiting on a human.
async fn read_piped_stdin() -> Result<Option<Vec<u8>>, PiclError> {
    if std::io::stdin().is_terminal() {
        return Ok(None);
    }
    let mut buf = Vec::new();
    tokio::io::stdin().read_to_end(&mut buf).await.map_err(PiclError::from)?;
    Ok(Some(buf))
}

async fn run(
    pool: &ConnectionPool,
    command: &str,
    filter: &ExecFilter,
    sudo: bool,
    stdin: Option<Vec<u8>>,
) -> Result<(), PiclError> {
    let targets = pool.filter(filter)?;
    if targets.is_empty() {
        warn!("no nodes matched the filter; nothing to execute");
        return Ok(());
    }

    let total = targets.len();
    let failed = AtomicUsize::new(0);

    join_all(
        targets
            .into_iter()
            .map(|conn| run_one(conn, command, sudo, stdin.as_deref(), &failed)),
    )
    .await;

    PiclError::from_failures(failed.load(Ordering::Relaxed), total)
}

async fn run_one(conn: &Connection, command: &str, sudo: bool, stdin: Option<&[u8]>, failed: &AtomicUsize) {
    let name = conn.name().to_string();
    let color = conn.node().color();
    let mut out = TaggedWriter::new(&name, color, std::io::stdout());
    let mut err = TaggedWriter::new(&name, color, std::io::stderr());

    let outcome = if sudo {
        conn.exec_sudo(command, &mut out, &mut err).await
    } else {
        conn.exec(command, stdin, &mut out, &mut err).await
    };

    let ok = matches!(&outcome, Ok(o) if o.success());
    if !ok {
        match &outcome {
            Err(err) => warn!("command failed on {name}: {err}"),
            Ok(_) => warn!("command exited non-zero on {name}"),
        }
        failed.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_filtered_set_succeeds_without_running_anything() {
        let pool = ConnectionPool::dial_all(&[]).await;
        let filter = ExecFilter::new().include(["nonexistent".to_string()]);
        let result = exec(&pool, "true", &filter).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn duplicate_filter_is_rejected_before_dispatch() {
        let pool = ConnectionPool::dial_all(&[]).await;
        let filter = ExecFilter::new()
            .include(["a".to_string()])
            .exclude(["b".to_string()]);
        let result = exec(&pool, "true", &filter).await;
        assert!(matches!(result, Err(PiclError::DuplicateFilter)));
    }
}
