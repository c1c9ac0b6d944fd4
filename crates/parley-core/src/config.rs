use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{anyhow, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_HOST: &str = "192.168.0.234:1010";

/// Sent when neither the environment nor the config file provides a token.
/// Local OpenAI-compatible servers accept any bearer value.
pub const DEFAULT_API_TOKEN: &str = "sk-no-key-required";

pub const API_TOKEN_ENV: &str = "PARLEY_API_TOKEN";

const COMPLETIONS_PATH: &str = "/v1/chat/completions";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "http" => Some(Protocol::Http),
            "https" => Some(Protocol::Https),
            _ => None,
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            Protocol::Http => Protocol::Https,
            Protocol::Https => Protocol::Http,
        }
    }
}

/// Where chat completions are sent. Persisted as `config.json`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host_and_port: String,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    /// Token taken from the environment at startup. Wins over `api_token`
    /// and is never written back to disk.
    #[serde(skip)]
    pub token_override: Option<String>,
}

impl ServerConfig {
    pub fn new() -> Self {
        Self {
            host_and_port: DEFAULT_HOST.to_string(),
            protocol: Protocol::Http,
            api_token: None,
            token_override: None,
        }
    }

    /// Applies `PARLEY_API_TOKEN` when it is set and non-empty.
    pub fn with_env_token(mut self, token: Option<String>) -> Self {
        self.token_override = token.filter(|token| !token.trim().is_empty());
        self
    }

    /// `{protocol}://{host_and_port}/v1/chat/completions`
    pub fn endpoint_url(&self) -> String {
        format!(
            "{}://{}{}",
            self.protocol.as_str(),
            self.host_and_port,
            COMPLETIONS_PATH
        )
    }

    /// Token for the `Authorization` header.
    pub fn bearer_token(&self) -> &str {
        self.token_override
            .as_deref()
            .or(self.api_token.as_deref())
            .unwrap_or(DEFAULT_API_TOKEN)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn open_default() -> Result<Self> {
        Ok(Self::at(Self::get_config_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file means defaults.
    pub fn load(&self) -> Result<ServerConfig> {
        if !self.path.exists() {
            return Ok(ServerConfig::new());
        }

        let config_content = fs::read_to_string(&self.path)?;
        let config: ServerConfig = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self, config: &ServerConfig) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, config_content)?;
        Ok(())
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("parley").join("config.json"))
    }
}

/// Checks a `host:port` pair typed into the settings screen.
///
/// The host is a dotted IPv4 address or a DNS name; the port is 1..=65535.
pub fn validate_host(host_and_port: &str) -> bool {
    let Some((host, port)) = host_and_port.split_once(':') else {
        return false;
    };

    if port.contains(':') {
        return false;
    }

    match port.parse::<u32>() {
        Ok(port) if (1..=65535).contains(&port) => {}
        _ => return false,
    }

    is_ip_address(host) || is_domain(host)
}

fn is_ip_address(host: &str) -> bool {
    let octets: Vec<&str> = host.split('.').collect();
    octets.len() == 4 && octets.iter().all(|octet| octet.parse::<u8>().is_ok())
}

fn is_domain(host: &str) -> bool {
    static DOMAIN: OnceLock<Regex> = OnceLock::new();
    DOMAIN
        .get_or_init(|| {
            Regex::new(
                r"^[a-zA-Z0-9]([a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])?(\.([a-zA-Z0-9]([a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])?))*$",
            )
            .expect("domain pattern is valid")
        })
        .is_match(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_lan_server() {
        let config = ServerConfig::new();
        assert_eq!(
            config.endpoint_url(),
            "http://192.168.0.234:1010/v1/chat/completions"
        );
    }

    #[test]
    fn endpoint_follows_protocol() {
        let config = ServerConfig {
            host_and_port: "example.ngrok.io:443".to_string(),
            protocol: Protocol::Https,
            ..ServerConfig::new()
        };
        assert_eq!(
            config.endpoint_url(),
            "https://example.ngrok.io:443/v1/chat/completions"
        );
    }

    #[test]
    fn protocol_parsing() {
        assert_eq!(Protocol::from_str("HTTPS"), Some(Protocol::Https));
        assert_eq!(Protocol::from_str("http"), Some(Protocol::Http));
        assert_eq!(Protocol::from_str("ftp"), None);
        assert_eq!(Protocol::Http.toggle(), Protocol::Https);
    }

    #[test]
    fn store_round_trip_and_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at(dir.path().join("parley").join("config.json"));
        assert_eq!(store.load().unwrap(), ServerConfig::new());

        let config = ServerConfig {
            host_and_port: "10.0.0.5:8080".to_string(),
            protocol: Protocol::Https,
            api_token: Some("secret".to_string()),
            token_override: None,
        };
        store.save(&config).unwrap();
        assert_eq!(store.load().unwrap(), config);
    }

    #[test]
    fn bearer_token_falls_back_to_placeholder() {
        let config = ServerConfig::new();
        assert_eq!(config.bearer_token(), DEFAULT_API_TOKEN);
        assert_eq!(config.bearer_token(), "sk-no-key-required");
    }

    #[test]
    fn bearer_token_precedence() {
        let stored = ServerConfig {
            api_token: Some("from-file".to_string()),
            ..ServerConfig::new()
        };
        assert_eq!(stored.bearer_token(), "from-file");

        let overridden = stored.clone().with_env_token(Some("from-env".to_string()));
        assert_eq!(overridden.bearer_token(), "from-env");

        let blank = stored.with_env_token(Some("  ".to_string()));
        assert_eq!(blank.bearer_token(), "from-file");
    }

    #[test]
    fn env_token_is_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at(dir.path().join("config.json"));
        let config = ServerConfig::new().with_env_token(Some("from-env".to_string()));
        store.save(&config).unwrap();

        let on_disk = std::fs::read_to_string(store.path()).unwrap();
        assert!(!on_disk.contains("from-env"));
        let loaded = store.load().unwrap();
        assert_eq!(loaded.token_override, None);
        assert_eq!(loaded.bearer_token(), DEFAULT_API_TOKEN);
    }

    #[test]
    fn protocol_is_optional_on_disk() {
        let config: ServerConfig =
            serde_json::from_str(r#"{"host_and_port": "localhost:1234"}"#).unwrap();
        assert_eq!(config.protocol, Protocol::Http);
        assert_eq!(config.api_token, None);
    }

    #[test]
    fn accepts_ip_and_domain_hosts() {
        assert!(validate_host("192.168.1.100:8080"));
        assert!(validate_host("example.ngrok.io:80"));
        assert!(validate_host("28e91d456350.ngrok-free.app:80"));
        assert!(validate_host("localhost:11434"));
    }

    #[test]
    fn rejects_bad_hosts() {
        assert!(!validate_host("192.168.1.100"));
        assert!(!validate_host("192.168.1.100:0"));
        assert!(!validate_host("192.168.1.100:70000"));
        assert!(!validate_host("bad_host:80"));
        assert!(!validate_host("-leading.dash:80"));
        assert!(!validate_host("a:b:c"));
        assert!(!validate_host(":8080"));
    }
}
