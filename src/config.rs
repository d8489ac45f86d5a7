//! Cluster Config loading (C10): the single entry point every subcommand depends on.

use serde::{Deserialize, Serialize};

use crate::crypto::Cryptor;
use crate::error::PiclError;
use crate::node::Node;

const DEFAULT_CONFIG_NAME: &str = "default";

/// Environment variable consulted for a config-encryption password, since the CLI
/// parser itself (subcommand wiring, interactive prompting) is out of scope here.
pub const CONFIG_PASSWORD_ENV: &str = "PICL_CONFIG_PASSWORD";

/// Monitor TUI sizing and target-architecture hint, carried verbatim from the config
/// document through to the `mon` binary.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MonitorConfig {
    #[serde(default)]
    pub height: u16,
    #[serde(default)]
    pub width: u16,
    #[serde(default, rename = "goArch")]
    pub go_arch: String,
}

/// One fully-loaded cluster config: a name, an optional shared sudo password, monitor
/// display sizing, and the fleet's host list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub name: String,
    #[serde(default, rename = "sudoPass")]
    pub sudo_pass: String,
    #[serde(default)]
    pub monitor: MonitorConfig,
    pub hosts: Vec<Node>,
}

impl ClusterConfig {
    /// Resolves `~/.picl/{name}.config.json`, falling back to the `.enc` sibling when the
    /// plaintext file is absent. `name` defaults to `"default"`, overridable by the
    /// caller (a CLI `--config` flag) or the `PICL_CONFIG` environment variable.
    pub fn load(name: &str) -> Result<ClusterConfig, PiclError> {
        Self::load_from_dir(name, &config_dir()?)
    }

    /// The guts of [`Self::load`], parameterized on the config directory so tests can
    /// point it at a temporary directory instead of the real `~/.picl`.
    fn load_from_dir(name: &str, dir: &std::path::Path) -> Result<ClusterConfig, PiclError> {
        let name = resolve_name(name);
        let plain_path = dir.join(format!("{name}.config.json"));
        let encrypted_path = dir.join(format!("{name}.config.json.enc"));

        let body = if plain_path.is_file() {
            std::fs::read(&plain_path)?
        } else if encrypted_path.is_file() {
            let password = std::env::var(CONFIG_PASSWORD_ENV).map_err(|_| {
                PiclError::ConfigError(format!(
                    "{} is encrypted; set {CONFIG_PASSWORD_ENV} to decrypt it",
                    encrypted_path.display()
                ))
            })?;
            let encrypted = std::fs::read(&encrypted_path)?;
            Cryptor::new(password).decrypt(&encrypted)?
        } else {
            return Err(PiclError::FileNotFound(plain_path.display().to_string()));
        };

        let config: ClusterConfig = serde_json::from_slice(&body)?;
        Ok(config.with_defaults())
    }

    fn with_defaults(mut self) -> Self {
        self.hosts = self.hosts.into_iter().map(Node::with_defaults).collect();
        self
    }
}

/// `name` as passed by the caller, unless empty, in which case `PICL_CONFIG` or
/// `"default"` is used.
fn resolve_name(name: &str) -> String {
    if !name.is_empty() {
        return name.to_string();
    }
    std::env::var("PICL_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_NAME.to_string())
}

fn config_dir() -> Result<std::path::PathBuf, PiclError> {
    let home = dirs::home_dir()
        .ok_or_else(|| PiclError::ConfigError("could not determine home directory".to_string()))?;
    Ok(home.join(".picl"))
}

/// The plaintext and encrypted file paths for a config name, for callers that need to
/// move between the two (`encrypt-config`/`decrypt-config`) rather than just loading.
pub fn config_paths(name: &str) -> Result<(std::path::PathBuf, std::path::PathBuf), PiclError> {
    let name = resolve_name(name);
    let dir = config_dir()?;
    Ok((
        dir.join(format!("{name}.config.json")),
        dir.join(format!("{name}.config.json.enc")),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_full_config_document_shape() {
        let json = r#"{
            "name": "default",
            "sudoPass": "s3cret",
            "monitor": { "height": 20, "width": 80, "goArch": "arm64" },
            "hosts": [
                { "name": "pi1", "host": "10.0.0.2",
                  "executer": { "sshPort": 22, "userName": "pi", "password": "",
                                "keyFile": null, "authMethod": "PublicKey", "color": "blue" },
                  "agent": { "port": 8000, "protocol": "http", "authData": null } }
            ]
        }"#;
        let config: ClusterConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.name, "default");
        assert_eq!(config.sudo_pass, "s3cret");
        assert_eq!(config.monitor.go_arch, "arm64");
        assert_eq!(config.hosts.len(), 1);
        assert_eq!(config.hosts[0].port(), 22);
    }

    #[test]
    fn missing_optional_fields_fall_back_to_defaults() {
        let json = r#"{ "name": "minimal", "hosts": [ { "name": "n1", "host": "10.0.0.1" } ] }"#;
        let config: ClusterConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.sudo_pass, "");
        assert_eq!(config.monitor.height, 0);
        assert!(config.hosts[0].agent.is_none());
    }

    #[test]
    fn resolve_name_prefers_explicit_argument() {
        assert_eq!(resolve_name("staging"), "staging");
    }

    #[test]
    fn load_reports_file_not_found_for_unknown_config() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClusterConfig::load_from_dir("missing", dir.path()).unwrap_err();
        assert!(matches!(err, PiclError::FileNotFound(_)));
    }

    #[test]
    fn load_from_dir_reads_a_plaintext_config() {
        let dir = tempfile::tempdir().unwrap();
        let json = r#"{ "name": "staging", "hosts": [ { "name": "n1", "host": "10.0.0.1" } ] }"#;
        std::fs::write(dir.path().join("staging.config.json"), json).unwrap();

        let config = ClusterConfig::load_from_dir("staging", dir.path()).unwrap();
        assert_eq!(config.name, "staging");
        assert_eq!(config.hosts[0].name, "n1");
    }

    #[test]
    fn load_from_dir_decrypts_an_encrypted_config_using_the_env_password() {
        let dir = tempfile::tempdir().unwrap();
        let json = r#"{ "name": "vault", "hosts": [ { "name": "n1", "host": "10.0.0.1" } ] }"#;
        let cryptor = Cryptor::new("hunter2");
        let encrypted = cryptor.encrypt(json.as_bytes()).unwrap();
        std::fs::write(dir.path().join("vault.config.json.enc"), encrypted).unwrap();

        // SAFETY(test): no other test in this process reads or writes this variable.
        unsafe { std::env::set_var(CONFIG_PASSWORD_ENV, "hunter2") };
        let result = ClusterConfig::load_from_dir("vault", dir.path());
        unsafe { std::env::remove_var(CONFIG_PASSWORD_ENV) };

        let config = result.unwrap();
        assert_eq!(config.name, "vault");
    }
}
