//! File Transfer (C5): push, pull, replicate, and remove over SFTP.

use std::path::Path;

use futures::future::join_all;
use log::warn;
use russh_sftp::client::SftpSession;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

use crate::error::PiclError;
use crate::session::connection::Connection;
use crate::session::filter::{CopyOptions, DuplicatePolicy};
use crate::session::pool::ConnectionPool;

/// Reads `local_path` into memory and delegates to [`push_data`].
pub async fn push(
    pool: &ConnectionPool,
    local_path: &Path,
    remote_dest: &str,
    opts: &CopyOptions,
) -> Result<(), PiclError> {
    let bytes = tokio::fs::read(local_path)
        .await
        .map_err(|_| PiclError::FileNotFound(local_path.display().to_string()))?;
    push_data(pool, &bytes, remote_dest, opts).await
}

/// Writes `bytes` to `remote_dest` on every filtered connection, routing through a
/// temporary path and `sudo mv` when `opts.filter.with_sudo` is set.
pub async fn push_data(
    pool: &ConnectionPool,
    bytes: &[u8],
    remote_dest: &str,
    opts: &CopyOptions,
) -> Result<(), PiclError> {
    let targets = pool.filter(&opts.filter)?;
    if targets.is_empty() {
        warn!("no nodes matched the filter; nothing to push");
        return Ok(());
    }
    let total = targets.len();

    let results = join_all(
        targets
            .into_iter()
            .map(|conn| push_one(conn, bytes, remote_dest, opts)),
    )
    .await;

    let failed = results.into_iter().filter(|r| r.is_err()).count();
    PiclError::from_failures(failed, total)
}

async fn push_one(
    conn: &Connection,
    bytes: &[u8],
    remote_dest: &str,
    opts: &CopyOptions,
) -> Result<(), PiclError> {
    let with_sudo = opts.filter.with_sudo;
    let remote_path = if with_sudo {
        format!("/tmp/{}", Uuid::new_v4())
    } else {
        remote_dest.to_string()
    };

    let sftp = conn.open_sftp().await?;
    if let Err(e) = write_file(&sftp, &remote_path, bytes, opts.duplicate_policy).await {
        return match e {
            PushSkip::AlreadyExists => Ok(()),
            PushSkip::Err(err) => Err(err),
        };
    }

    if with_sudo {
        let mv = format!("mv {remote_path} {remote_dest}");
        let mut out = sink();
        let mut err = sink();
        let mv_result = conn.exec_sudo(&mv, &mut out, &mut err).await;
        let rm = format!("rm -f {remote_path}");
        if let Err(rm_err) = conn.exec(&rm, None, &mut sink(), &mut sink()).await {
            warn!("best-effort cleanup of {remote_path} on {} failed: {rm_err}", conn.name());
        }
        let outcome = mv_result?;
        if !outcome.success() {
            return Err(PiclError::ExecError {
                node: conn.name().to_string(),
                command: mv,
                status: outcome.exit_status.to_string(),
            });
        }
    }

    Ok(())
}

enum PushSkip {
    AlreadyExists,
    Err(PiclError),
}

impl From<PiclError> for PushSkip {
    fn from(e: PiclError) -> Self {
        PushSkip::Err(e)
    }
}

async fn write_file(
    sftp: &SftpSession,
    remote_path: &str,
    bytes: &[u8],
    policy: DuplicatePolicy,
) -> Result<(), PushSkip> {
    let exists = sftp.metadata(remote_path).await.is_ok();
    if exists {
        match policy {
            DuplicatePolicy::Ignore => return Err(PushSkip::AlreadyExists),
            DuplicatePolicy::Replace => {
                sftp.remove_file(remote_path).await.map_err(PiclError::from)?;
            }
        }
    }

    if let Some(parent) = parent_dir(remote_path) {
        mkdir_p(sftp, &parent).await.map_err(PiclError::from)?;
    }

    let mut file = sftp.create(remote_path).await.map_err(PiclError::from)?;
    file.write_all(bytes).await.map_err(PiclError::from)?;
    file.shutdown().await.map_err(PiclError::from)?;
    Ok(())
}

/// Pulls `remote_path` from `source_node` down to `local_path`. Unlike push/replicate
/// this does not fan out; it targets exactly one named node.
pub async fn pull(
    pool: &ConnectionPool,
    source_node: &str,
    remote_path: &str,
    local_path: &Path,
) -> Result<(), PiclError> {
    let all = pool.filter(&Default::default())?;
    let conn = all
        .into_iter()
        .find(|c| c.name() == source_node)
        .ok_or_else(|| PiclError::InvalidNode(source_node.to_string()))?;

    let sftp = conn.open_sftp().await?;
    let mut remote_file = sftp.open(remote_path).await.map_err(PiclError::from)?;
    let mut buf = Vec::new();
    remote_file.read_to_end(&mut buf).await.map_err(PiclError::from)?;
    tokio::fs::write(local_path, &buf).await.map_err(PiclError::from)?;
    Ok(())
}

/// Copies `remote_dest` from `source_node` to every other filtered connection.
pub async fn replicate(
    pool: &ConnectionPool,
    source_node: &str,
    remote_dest: &str,
    opts: &CopyOptions,
) -> Result<(), PiclError> {
    let all = pool.filter(&Default::default())?;
    let source = all
        .iter()
        .find(|c| c.name() == source_node)
        .ok_or_else(|| PiclError::InvalidNode(source_node.to_string()))?;

    let source_sftp = source.open_sftp().await?;
    source_sftp
        .metadata(remote_dest)
        .await
        .map_err(|_| PiclError::FileNotFound(remote_dest.to_string()))?;

    let mut bytes = Vec::new();
    let mut source_file = source_sftp.open(remote_dest).await.map_err(PiclError::from)?;
    source_file.read_to_end(&mut bytes).await.map_err(PiclError::from)?;

    let targets = pool.filter(&opts.filter)?;
    let targets: Vec<&Connection> = targets
        .into_iter()
        .filter(|c| c.name() != source_node)
        .collect();
    if targets.is_empty() {
        warn!("no replication targets after excluding the source node");
        return Ok(());
    }
    let total = targets.len();

    let results = join_all(
        targets
            .into_iter()
            .map(|conn| push_one(conn, &bytes, remote_dest, opts)),
    )
    .await;

    let failed = results.into_iter().filter(|r| r.is_err()).count();
    PiclError::from_failures(failed, total)
}

/// Deletes `remote_path` on every filtered connection; a missing file is not an error.
pub async fn remove(
    pool: &ConnectionPool,
    remote_path: &str,
    filter: &crate::session::filter::ExecFilter,
) -> Result<(), PiclError> {
    let targets = pool.filter(filter)?;
    if targets.is_empty() {
        warn!("no nodes matched the filter; nothing to remove");
        return Ok(());
    }
    let total = targets.len();

    let results = join_all(targets.into_iter().map(|conn| remove_one(conn, remote_path))).await;
    let failed = results.into_iter().filter(|r| r.is_err()).count();
    PiclError::from_failures(failed, total)
}

async fn remove_one(conn: &Connection, remote_path: &str) -> Result<(), PiclError> {
    let sftp = conn.open_sftp().await?;
    if sftp.metadata(remote_path).await.is_err() {
        return Ok(());
    }
    sftp.remove_file(remote_path).await.map_err(PiclError::from)
}

pub(crate) async fn mkdir_p(sftp: &SftpSession, dir: &str) -> Result<(), PiclError> {
    if dir.is_empty() || dir == "/" {
        return Ok(());
    }
    let mut built = String::new();
    for part in dir.split('/').filter(|p| !p.is_empty()) {
        built.push('/');
        built.push_str(part);
        if sftp.metadata(&built).await.is_ok() {
            continue;
        }
        if let Err(e) = sftp.create_dir(&built).await {
            if sftp.metadata(&built).await.is_err() {
                return Err(PiclError::from(e));
            }
        }
    }
    Ok(())
}

fn parent_dir(path: &str) -> Option<String> {
    let idx = path.rfind('/')?;
    if idx == 0 {
        Some("/".to_string())
    } else {
        Some(path[..idx].to_string())
    }
}

fn sink() -> crate::output::TaggedWriter<std::io::Sink> {
    crate::output::TaggedWriter::new("", crate::node::Color::White, std::io::sink())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_dir_of_nested_path() {
        assert_eq!(parent_dir("/home/pi/.ssh/authorized_keys").as_deref(), Some("/home/pi/.ssh"));
    }

    #[test]
    fn parent_dir_of_top_level_path() {
        assert_eq!(parent_dir("/foo").as_deref(), Some("/".to_string()).as_deref());
    }

    #[test]
    fn parent_dir_of_relative_path_is_none() {
        assert_eq!(parent_dir("foo"), None);
    }
}
