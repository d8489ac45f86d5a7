//! Identity Bootstrap (C6): installs the operator's public key into every node's
//! `authorized_keys`.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use futures::future::join_all;
use log::{info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::PiclError;
use crate::session::connection::Connection;
use crate::session::pool::ConnectionPool;
use crate::transfer::mkdir_p;

/// One parsed row of an `authorized_keys` file, per RFC 4253's whitespace-separated
/// options/key-type/key/comment layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedKeysRow {
    pub options: String,
    pub key_type: String,
    pub key: String,
    pub comment: String,
}

const KNOWN_KEY_TYPES: &[&str] = &[
    "ssh-rsa",
    "ssh-dss",
    "ssh-ed25519",
    "ecdsa-sha",
    "sk-ecdsa-sha",
    "sk-ssh-ed25519",
];

fn starts_with_key(part: &str) -> bool {
    KNOWN_KEY_TYPES.iter().any(|prefix| part.starts_with(prefix))
}

/// Parses one non-blank, non-comment line of an `authorized_keys` file. Always returns
/// the parsed row, even on the `options`-present branch.
pub fn parse_authorized_keys_line(line: &str) -> Option<AuthorizedKeysRow> {
    let trimmed = line.trim();
    let parts: Vec<&str> = trimmed.split_whitespace().collect();
    if parts.is_empty() {
        return None;
    }

    let mut idx = 0;
    let options = if starts_with_key(parts[0]) {
        String::new()
    } else {
        let opt = parts.get(idx)?.to_string();
        idx += 1;
        opt
    };

    let key_type = parts.get(idx)?.to_string();
    idx += 1;
    let key = parts.get(idx)?.to_string();
    idx += 1;
    let comment = parts.get(idx).map(|s| s.to_string()).unwrap_or_default();

    Some(AuthorizedKeysRow {
        options,
        key_type,
        key,
        comment,
    })
}

fn format_row(row: &AuthorizedKeysRow) -> String {
    if row.options.is_empty() {
        format!("{} {} {}", row.key_type, row.key, row.comment)
            .trim_end()
            .to_string()
    } else {
        format!("{} {} {} {}", row.options, row.key_type, row.key, row.comment)
            .trim_end()
            .to_string()
    }
}

/// Reads the operator's public key, falling back from `id_rsa.pub` to `id_ed25519.pub`.
pub async fn read_public_key() -> Result<AuthorizedKeysRow, PiclError> {
    let home = dirs::home_dir()
        .ok_or_else(|| PiclError::ConfigError("could not determine home directory".to_string()))?;
    let ssh_dir = home.join(".ssh");

    let rsa_pub = ssh_dir.join("id_rsa.pub");
    let path = if rsa_pub.is_file() {
        rsa_pub
    } else {
        ssh_dir.join("id_ed25519.pub")
    };

    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|_| PiclError::FileNotFound(path.display().to_string()))?;

    parse_authorized_keys_line(content.trim())
        .ok_or_else(|| PiclError::ConfigError(format!("malformed public key in {}", path.display())))
}

/// Installs `pub_key` into every connection's `authorized_keys`, in parallel, and
/// returns [`PiclError::AggregateFailure`] if any node failed.
pub async fn copy_id(pool: &ConnectionPool) -> Result<(), PiclError> {
    let pub_key = read_public_key().await?;
    let all = pool.filter(&Default::default())?;
    if all.is_empty() {
        warn!("no nodes in pool; nothing to bootstrap");
        return Ok(());
    }
    let total = all.len();

    let results = join_all(all.into_iter().map(|conn| copy_id_one(conn, &pub_key))).await;
    let failed = results.into_iter().filter(|r| r.is_err()).count();
    PiclError::from_failures(failed, total)
}

async fn copy_id_one(conn: &Connection, pub_key: &AuthorizedKeysRow) -> Result<(), PiclError> {
    let name = conn.name();
    let user = conn.node().user();
    let authz_path = format!("/home/{user}/.ssh/authorized_keys");

    let sftp = conn.open_sftp().await?;

    let mut rows = Vec::new();
    match sftp.open(&authz_path).await {
        Ok(mut file) => {
            let mut content = String::new();
            file.read_to_string(&mut content).await.map_err(PiclError::from)?;
            for line in content.lines() {
                let trimmed = line.trim();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    continue;
                }
                if let Some(row) = parse_authorized_keys_line(trimmed) {
                    rows.push(row);
                }
            }
        }
        Err(_) => {}
    }

    if rows.iter().any(|r| r.key_type == pub_key.key_type && r.key == pub_key.key) {
        info!("{name}: public key already present in authorized_keys");
        return Ok(());
    }

    let backup_path = if rows.is_empty() {
        None
    } else {
        let suffix = timestamp_suffix();
        let backup = format!("{authz_path}_{suffix}");
        let backup_cmd = format!("cp {authz_path} {backup}");
        let mut out = sink();
        let mut err = sink();
        let outcome = conn.exec(&backup_cmd, None, &mut out, &mut err).await?;
        if !outcome.success() {
            return Err(PiclError::ExecError {
                node: name.to_string(),
                command: backup_cmd,
                status: outcome.exit_status.to_string(),
            });
        }
        Some(backup)
    };

    rows.push(pub_key.clone());
    let write_result = write_authorized_keys(conn, &authz_path, &rows).await;

    if let Err(err) = write_result {
        if let Some(backup) = backup_path {
            restore_backup(conn, &authz_path, &backup).await;
        }
        return Err(err);
    }

    match verify_connection(conn).await {
        Ok(()) => info!("{name}: connection successfully verified"),
        Err(err) => warn!("{name}: connection verification failed: {err}"),
    }

    Ok(())
}

async fn write_authorized_keys(
    conn: &Connection,
    authz_path: &str,
    rows: &[AuthorizedKeysRow],
) -> Result<(), PiclError> {
    let sftp = conn.open_sftp().await?;
    if let Some(parent) = Path::new(authz_path).parent().and_then(|p| p.to_str()) {
        mkdir_p(&sftp, parent).await?;
    }
    let mut file = sftp.create(authz_path).await.map_err(PiclError::from)?;
    let body = rows
        .iter()
        .map(format_row)
        .collect::<Vec<_>>()
        .join("\n")
        + "\n";
    file.write_all(body.as_bytes()).await.map_err(PiclError::from)?;
    file.shutdown().await.map_err(PiclError::from)?;
    Ok(())
}

async fn restore_backup(conn: &Connection, authz_path: &str, backup: &str) {
    let name = conn.name().to_string();
    let rm = format!("rm -rf {authz_path}");
    if let Err(e) = conn.exec(&rm, None, &mut sink(), &mut sink()).await {
        warn!("{name}: failed to remove incomplete authorized_keys: {e}");
        return;
    }
    let mv = format!("mv {backup} {authz_path}");
    if let Err(e) = conn.exec(&mv, None, &mut sink(), &mut sink()).await {
        warn!("{name}: failed to restore authorized_keys backup: {e}");
    }
}

async fn verify_connection(conn: &Connection) -> Result<(), PiclError> {
    use crate::node::AuthMethod;
    use crate::session::security::ConnectionSecurityOptions;

    let mut node = conn.node().clone();
    node.executer.auth_method = AuthMethod::PublicKey;
    let verify_conn = Connection::dial(node, &ConnectionSecurityOptions::default()).await?;
    verify_conn.close().await;
    Ok(())
}

/// Formats the current UTC time as `YYYYMMDD_HHMMSS`, matching the original source's
/// backup-file suffix, without pulling in a date/time crate the teacher never needed.
fn timestamp_suffix() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let (y, m, d) = civil_from_unix_days((secs / 86_400) as i64);
    let rem = secs % 86_400;
    let (h, min, s) = (rem / 3600, (rem % 3600) / 60, rem % 60);
    format!("{y:04}{m:02}{d:02}_{h:02}{min:02}{s:02}")
}

/// Howard Hinnant's `civil_from_days`, adapted to take days since the Unix epoch.
fn civil_from_unix_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

fn sink() -> crate::output::TaggedWriter<std::io::Sink> {
    crate::output::TaggedWriter::new("", crate::node::Color::White, std::io::sink())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_line_without_options() {
        let row = parse_authorized_keys_line("ssh-ed25519 AAAAB3 user@host").unwrap();
        assert_eq!(row.options, "");
        assert_eq!(row.key_type, "ssh-ed25519");
        assert_eq!(row.key, "AAAAB3");
        assert_eq!(row.comment, "user@host");
    }

    #[test]
    fn parses_line_with_options() {
        let row = parse_authorized_keys_line("no-pty ssh-rsa AAAAB3 note").unwrap();
        assert_eq!(row.options, "no-pty");
        assert_eq!(row.key_type, "ssh-rsa");
        assert_eq!(row.key, "AAAAB3");
        assert_eq!(row.comment, "note");
    }

    #[test]
    fn parses_line_without_comment() {
        let row = parse_authorized_keys_line("ssh-ed25519 AAAAB3").unwrap();
        assert_eq!(row.comment, "");
    }

    #[test]
    fn blank_line_parses_to_none() {
        assert!(parse_authorized_keys_line("").is_none());
        assert!(parse_authorized_keys_line("   ").is_none());
    }

    #[test]
    fn format_row_round_trips_without_options() {
        let row = AuthorizedKeysRow {
            options: String::new(),
            key_type: "ssh-ed25519".into(),
            key: "AAAAB3".into(),
            comment: "user@host".into(),
        };
        assert_eq!(format_row(&row), "ssh-ed25519 AAAAB3 user@host");
    }

    #[test]
    fn civil_from_unix_days_matches_known_dates() {
        assert_eq!(civil_from_unix_days(0), (1970, 1, 1));
        assert_eq!(civil_from_unix_days(19_716), (2023, 12, 25));
    }
}
