//! One authenticated SSH session to a single node (C2).

use std::io::Write;
use std::path::PathBuf;

use async_ssh2_tokio::{AuthMethod as SshAuthMethod, Client, Config, ServerCheckMethod};
use log::debug;
use russh::ChannelMsg;
use russh_sftp::client::SftpSession;

use crate::error::PiclError;
use crate::node::{AuthMethod, Node};
use crate::output::TaggedWriter;

use super::security::ConnectionSecurityOptions;

/// Outcome of a single remote command execution.
pub struct ExecOutcome {
    pub exit_status: u32,
}

impl ExecOutcome {
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}

/// One node's authenticated SSH session, dialed once and reused for every command or
/// file-transfer operation directed at it for the lifetime of the invocation.
pub struct Connection {
    node: Node,
    client: Client,
}

impl Connection {
    /// Dials `node`, authenticating with its configured method.
    pub async fn dial(node: Node, security: &ConnectionSecurityOptions) -> Result<Self, PiclError> {
        let node = node.with_defaults();
        let auth = match node.auth_method() {
            AuthMethod::Password => SshAuthMethod::with_password(node.password()),
            AuthMethod::PublicKey => {
                let key_path = private_key_path(&node)?;
                SshAuthMethod::with_key_file(key_path, None)
            }
        };

        let config = Config {
            preferred: security.preferred(),
            inactivity_timeout: Some(std::time::Duration::from_secs(60)),
            ..Default::default()
        };

        let client = Client::connect_with_config(
            (node.host.as_str(), node.port()),
            node.user(),
            auth,
            security.server_check.clone(),
            config,
        )
        .await
        .map_err(|e| PiclError::NetworkError(node.name.clone(), e.to_string()))?;

        debug!("{} dialed", node.describe());
        Ok(Self { node, client })
    }

    pub fn name(&self) -> &str {
        &self.node.name
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Runs `command` as the authenticated user, streaming stdout/stderr through a pair
    /// of [`TaggedWriter`]s as it arrives. `stdin`, if given, is piped to the remote
    /// command's stdin before the channel is closed for writing.
    pub async fn exec<O: Write, E: Write>(
        &self,
        command: &str,
        stdin: Option<&[u8]>,
        out: &mut TaggedWriter<O>,
        err: &mut TaggedWriter<E>,
    ) -> Result<ExecOutcome, PiclError> {
        self.run_channel(command, out, err, stdin.map(|b| b.to_vec())).await
    }

    /// Runs `command` under `sudo -S`, feeding the node's configured password on stdin
    /// the way an interactive sudo prompt expects it.
    pub async fn exec_sudo<O: Write, E: Write>(
        &self,
        command: &str,
        out: &mut TaggedWriter<O>,
        err: &mut TaggedWriter<E>,
    ) -> Result<ExecOutcome, PiclError> {
        let sudo_command = format!("sudo -S {command}");
        let stdin = format!("{}\n", self.node.password()).into_bytes();
        self.run_channel(&sudo_command, out, err, Some(stdin)).await
    }

    async fn run_channel<O: Write, E: Write>(
        &self,
        command: &str,
        out: &mut TaggedWriter<O>,
        err: &mut TaggedWriter<E>,
        stdin: Option<Vec<u8>>,
    ) -> Result<ExecOutcome, PiclError> {
        let mut channel = self
            .client
            .get_channel()
            .await
            .map_err(|e| PiclError::NetworkError(self.node.name.clone(), e.to_string()))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| PiclError::ExecError {
                node: self.node.name.clone(),
                command: command.to_string(),
                status: e.to_string(),
            })?;

        if let Some(data) = stdin {
            channel
                .data(data.as_slice())
                .await
                .map_err(|e| PiclError::ExecError {
                    node: self.node.name.clone(),
                    command: command.to_string(),
                    status: e.to_string(),
                })?;
            let _ = channel.eof().await;
        }

        let mut exit_status = 0u32;
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => {
                    let _ = out.write_all(data);
                }
                ChannelMsg::ExtendedData { ref data, ext: 1 } => {
                    let _ = err.write_all(data);
                }
                ChannelMsg::ExitStatus { exit_status: status } => {
                    exit_status = status;
                }
                ChannelMsg::Eof | ChannelMsg::Close => break,
                _ => {}
            }
        }
        let _ = out.finish();
        let _ = err.finish();

        Ok(ExecOutcome { exit_status })
    }

    /// Opens an SFTP sub-channel over this session, used by the file-transfer module.
    pub async fn open_sftp(&self) -> Result<SftpSession, PiclError> {
        let channel = self
            .client
            .get_channel()
            .await
            .map_err(|e| PiclError::NetworkError(self.node.name.clone(), e.to_string()))?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| PiclError::NetworkError(self.node.name.clone(), e.to_string()))?;
        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(PiclError::from)?;
        Ok(sftp)
    }

    pub async fn close(&self) {
        let _ = self.client.disconnect().await;
    }
}

/// Resolves which private key file to authenticate with, in the same order the original
/// source's `GetPrivateKeyFileContent` used: an explicit `keyFile` relative to
/// `~/.ssh`, else `~/.ssh/id_rsa` if it exists, else `~/.ssh/id_ed25519`.
fn private_key_path(node: &Node) -> Result<PathBuf, PiclError> {
    let home = dirs::home_dir().ok_or_else(|| {
        PiclError::ConfigError("could not determine home directory".to_string())
    })?;
    let ssh_dir = home.join(".ssh");

    if let Some(key_file) = node.key_file() {
        return Ok(ssh_dir.join(key_file));
    }

    let rsa = ssh_dir.join("id_rsa");
    if rsa.is_file() {
        return Ok(rsa);
    }
    Ok(ssh_dir.join("id_ed25519"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ExecuterConfig;

    fn sample_node() -> Node {
        Node {
            name: "n1".into(),
            host: "127.0.0.1".into(),
            executer: ExecuterConfig {
                ssh_port: 22,
                user_name: "pi".into(),
                ..ExecuterConfig::default()
            },
            agent: None,
        }
    }

    #[test]
    fn explicit_key_file_is_resolved_under_ssh_dir() {
        let mut node = sample_node();
        node.executer.key_file = Some("custom_key".to_string());
        let path = private_key_path(&node).unwrap();
        assert!(path.ends_with(".ssh/custom_key"));
    }

    #[test]
    fn missing_key_file_falls_back_to_id_ed25519_when_id_rsa_absent() {
        let node = sample_node();
        let path = private_key_path(&node).unwrap();
        assert!(path.ends_with(".ssh/id_rsa") || path.ends_with(".ssh/id_ed25519"));
    }

    #[test]
    fn exec_outcome_success_checks_zero_status() {
        assert!(ExecOutcome { exit_status: 0 }.success());
        assert!(!ExecOutcome { exit_status: 1 }.success());
    }
}
