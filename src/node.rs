//! Node configuration: one entry in a cluster config's host list.

use serde::{Deserialize, Serialize};

/// Terminal color used to tag a node's output in the Tagged Output Writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
}

impl Color {
    /// Parses a palette name, falling back to `White` for anything unrecognized —
    /// matching the original source's behavior of never rejecting a node over a typo'd
    /// color name.
    pub fn parse(name: &str) -> Color {
        match name.to_ascii_lowercase().as_str() {
            "red" => Color::Red,
            "green" => Color::Green,
            "yellow" => Color::Yellow,
            "blue" => Color::Blue,
            "magenta" => Color::Magenta,
            "cyan" => Color::Cyan,
            _ => Color::White,
        }
    }
}

/// SSH authentication method for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AuthMethod {
    #[default]
    PublicKey,
    Password,
}

/// The SSH-facing half of a node's configuration, nested under `executer` in the
/// cluster config JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuterConfig {
    #[serde(default, rename = "sshPort")]
    pub ssh_port: u16,
    #[serde(default, rename = "userName")]
    pub user_name: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, rename = "keyFile")]
    pub key_file: Option<String>,
    #[serde(default, rename = "authMethod")]
    pub auth_method: AuthMethod,
    #[serde(default)]
    pub color: Option<String>,
}

impl Default for ExecuterConfig {
    fn default() -> Self {
        Self {
            ssh_port: 0,
            user_name: String::new(),
            password: String::new(),
            key_file: None,
            auth_method: AuthMethod::PublicKey,
            color: None,
        }
    }
}

/// One remote host in a cluster config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub host: String,
    #[serde(default)]
    pub executer: ExecuterConfig,
    #[serde(default)]
    pub agent: Option<AgentConfig>,
}

/// Per-node telemetry agent reachability, consumed by [`crate::telemetry`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_port")]
    pub port: u16,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default, rename = "authData")]
    pub auth_data: Option<AgentAuthData>,
}

fn default_agent_port() -> u16 {
    8000
}

fn default_protocol() -> String {
    "http".to_string()
}

/// Credentials used to log in to a node's telemetry agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentAuthData {
    #[serde(rename = "authType")]
    pub auth_type: String,
    pub data: serde_json::Value,
}

impl Node {
    /// Fills in the same defaults the original source's `FillDefaults` applies: port 22
    /// when unset, the OS user when the config omits one, and `PublicKey` auth.
    pub fn with_defaults(mut self) -> Self {
        if self.executer.ssh_port == 0 {
            self.executer.ssh_port = 22;
        }
        if self.executer.user_name.is_empty() {
            self.executer.user_name = current_os_user();
        }
        self
    }

    pub fn port(&self) -> u16 {
        self.executer.ssh_port
    }

    pub fn user(&self) -> &str {
        &self.executer.user_name
    }

    pub fn password(&self) -> &str {
        &self.executer.password
    }

    pub fn key_file(&self) -> Option<&str> {
        self.executer.key_file.as_deref()
    }

    pub fn auth_method(&self) -> AuthMethod {
        self.executer.auth_method
    }

    /// The node's palette color, defaulting to white when unset or unrecognized.
    pub fn color(&self) -> Color {
        self.executer
            .color
            .as_deref()
            .map(Color::parse)
            .unwrap_or(Color::White)
    }

    /// A short human-readable description, e.g. `[PublicKey] pi@10.0.0.2:22`.
    pub fn describe(&self) -> String {
        format!(
            "[{:?}] {}@{}:{}",
            self.executer.auth_method, self.executer.user_name, self.host, self.executer.ssh_port
        )
    }

    /// The base URL of this node's telemetry agent, or `None` if it has none configured.
    pub fn agent_base_url(&self) -> Option<String> {
        let agent = self.agent.as_ref()?;
        Some(format!("{}://{}:{}", agent.protocol, self.host, agent.port))
    }
}

fn current_os_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "root".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_node() -> Node {
        Node {
            name: "n1".into(),
            host: "10.0.0.1".into(),
            executer: ExecuterConfig::default(),
            agent: None,
        }
    }

    #[test]
    fn unknown_color_falls_back_to_white() {
        assert_eq!(Color::parse("chartreuse"), Color::White);
        assert_eq!(Color::parse("Red"), Color::Red);
    }

    #[test]
    fn defaults_fill_port_and_user() {
        let node = sample_node().with_defaults();
        assert_eq!(node.port(), 22);
        assert!(!node.user().is_empty());
    }

    #[test]
    fn agent_base_url_uses_configured_protocol_and_port() {
        let mut node = sample_node();
        node.agent = Some(AgentConfig {
            port: 9000,
            protocol: "https".into(),
            auth_data: None,
        });
        assert_eq!(node.agent_base_url().unwrap(), "https://10.0.0.1:9000");
    }

    #[test]
    fn deserializes_nested_executer_shape_from_config_json() {
        let json = r#"{
            "name": "n1",
            "host": "10.0.0.1",
            "executer": { "sshPort": 22, "userName": "pi", "password": "",
                          "keyFile": null, "authMethod": "PublicKey", "color": "blue" }
        }"#;
        let node: Node = serde_json::from_str(json).unwrap();
        assert_eq!(node.port(), 22);
        assert_eq!(node.color(), Color::Blue);
        assert!(node.agent.is_none());
    }
}
