//! Configuration management for the beagle service.

use std::{collections::HashSet, net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use beagle_delivery::{ClientConfig, DispatcherConfig, Target};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "beagle.toml";
const ENV_PREFIX: &str = "BEAGLE_";

/// Complete service configuration with defaults, file, and environment
/// overrides.
///
/// Configuration is loaded in priority order:
/// 1. Environment variables prefixed with `BEAGLE_` (highest priority)
/// 2. Configuration file (`beagle.toml`)
/// 3. Built-in defaults (lowest priority)
///
/// Targets are usually declared in the file:
///
/// ```toml
/// [[targets]]
/// name = "front-door"
/// key = "f7826da6-4fa2-4e98-8024-bc5b71e0893e-1-2"
///
/// [[targets.subscribers]]
/// name = "ops"
/// endpoint = { name = "ops-hook", method = "POST", url = "https://hooks.example.com/beagle" }
/// ```
///
/// # Example
///
/// ```no_run
/// use beagle_api::Config;
///
/// let config = Config::load().expect("Failed to load configuration");
///
/// println!("Server will bind to {}:{}", config.host, config.port);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server
    /// Inspection API bind address.
    ///
    /// Environment variable: `BEAGLE_HOST`
    #[serde(default = "default_host")]
    pub host: String,
    /// Inspection API bind port.
    ///
    /// Environment variable: `BEAGLE_PORT`
    #[serde(default = "default_port")]
    pub port: u16,
    /// Inspection API request timeout in seconds.
    ///
    /// Environment variable: `BEAGLE_REQUEST_TIMEOUT`
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    // Dispatch
    /// Number of concurrent dispatch workers.
    ///
    /// Environment variable: `BEAGLE_WORKER_COUNT`
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Messages that may wait for a worker before new ones are rejected.
    ///
    /// Environment variable: `BEAGLE_QUEUE_CAPACITY`
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Seconds to wait for queued messages on shutdown.
    ///
    /// Environment variable: `BEAGLE_SHUTDOWN_TIMEOUT`
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,

    // Client
    /// HTTP timeout for subscriber calls in seconds.
    ///
    /// Environment variable: `BEAGLE_DELIVERY_TIMEOUT_SECONDS`
    #[serde(default = "default_delivery_timeout")]
    pub delivery_timeout_seconds: u64,
    /// User agent for subscriber calls.
    ///
    /// Environment variable: `BEAGLE_USER_AGENT`
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Whether subscriber TLS certificates are verified.
    ///
    /// Environment variable: `BEAGLE_VERIFY_TLS`
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,

    // Logging
    /// Log filter used when `RUST_LOG` is not set.
    ///
    /// Environment variable: `BEAGLE_LOG_LEVEL`
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // Targets
    /// Tracked peripherals and their subscribers.
    #[serde(default)]
    pub targets: Vec<Target>,
}

impl Config {
    /// Load configuration from defaults, config file, and environment variable
    /// overrides, then validate it.
    pub fn load() -> Result<Self> {
        Self::from_figment(Self::figment())
    }

    /// Layered provider used by [`Config::load`].
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Extracts and validates a configuration from `figment`.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Convert to the dispatcher configuration.
    pub fn to_dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            worker_count: self.worker_count,
            queue_capacity: self.queue_capacity,
            shutdown_timeout: Duration::from_secs(self.shutdown_timeout),
            client_config: self.to_client_config(),
        }
    }

    /// Convert to client configuration.
    pub fn to_client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: Duration::from_secs(self.delivery_timeout_seconds),
            user_agent: self.user_agent.clone(),
            verify_tls: self.verify_tls,
            ..ClientConfig::default()
        }
    }

    /// Parse server socket address from host and port configuration.
    pub fn parse_server_addr(&self) -> Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.host, self.port);
        SocketAddr::from_str(&addr_str).context("Invalid server address")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("port must be greater than 0");
        }

        if self.worker_count == 0 {
            anyhow::bail!("worker_count must be greater than 0");
        }

        if self.queue_capacity == 0 {
            anyhow::bail!("queue_capacity must be greater than 0");
        }

        if self.delivery_timeout_seconds == 0 {
            anyhow::bail!("delivery_timeout_seconds must be greater than 0");
        }

        let mut keys = HashSet::new();
        for target in &self.targets {
            if target.key.trim().is_empty() {
                anyhow::bail!("target {:?} has an empty key", target.name);
            }
            if !keys.insert(target.key.as_str()) {
                anyhow::bail!("duplicate target key {:?}", target.key);
            }
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout: default_request_timeout(),
            worker_count: default_worker_count(),
            queue_capacity: default_queue_capacity(),
            shutdown_timeout: default_shutdown_timeout(),
            delivery_timeout_seconds: default_delivery_timeout(),
            user_agent: default_user_agent(),
            verify_tls: default_verify_tls(),
            log_level: default_log_level(),
            targets: Vec::new(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_worker_count() -> usize {
    beagle_delivery::DEFAULT_WORKER_COUNT
}

fn default_queue_capacity() -> usize {
    beagle_delivery::DEFAULT_QUEUE_CAPACITY
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_delivery_timeout() -> u64 {
    beagle_delivery::DEFAULT_TIMEOUT_SECONDS
}

fn default_user_agent() -> String {
    ClientConfig::default().user_agent
}

fn default_verify_tls() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    fn load() -> figment::error::Result<Config> {
        Config::load().map_err(|e| format!("{e:#}").into())
    }

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.port, 8080);
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.queue_capacity, 256);
        assert!(config.targets.is_empty());
    }

    #[test]
    fn loads_without_file_or_env() {
        Jail::expect_with(|_jail| {
            let config = load()?;
            assert_eq!(config.host, "127.0.0.1");
            assert_eq!(config.log_level, "info");
            Ok(())
        });
    }

    #[test]
    fn file_then_env_override_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "beagle.toml",
                r#"
                port = 9000
                worker_count = 8
                user_agent = "from-file"

                [[targets]]
                name = "front-door"
                key = "U1-1-2"

                [[targets.subscribers]]
                name = "ops"
                endpoint = { name = "ops-hook", method = "POST", url = "http://hooks.local/ops", headers = { "X-Api-Key" = "secret" } }

                [[targets.subscribers]]
                name = "silent"
                "#,
            )?;
            jail.set_env("BEAGLE_PORT", "9090");
            jail.set_env("BEAGLE_QUEUE_CAPACITY", "16");

            let config = load()?;

            assert_eq!(config.port, 9090);
            assert_eq!(config.worker_count, 8);
            assert_eq!(config.queue_capacity, 16);
            assert_eq!(config.user_agent, "from-file");

            let target = &config.targets[0];
            assert_eq!(target.name, "front-door");
            assert_eq!(target.subscribers.len(), 2);

            let endpoint = target.subscribers[0].endpoint.as_ref().unwrap();
            assert_eq!(endpoint.method, "POST");
            assert_eq!(endpoint.headers.get("X-Api-Key").map(String::as_str), Some("secret"));
            assert!(target.subscribers[1].endpoint.is_none());
            Ok(())
        });
    }

    #[test]
    fn invalid_values_are_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("BEAGLE_WORKER_COUNT", "0");
            assert!(Config::load().is_err());
            Ok(())
        });

        let mut config = Config::default();
        config.port = 0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.queue_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn duplicate_target_keys_are_rejected() {
        let target = Target { name: "a".into(), key: "k".into(), subscribers: vec![] };
        let config = Config {
            targets: vec![target.clone(), Target { name: "b".into(), ..target }],
            ..Config::default()
        };

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate target key"));
    }

    #[test]
    fn converts_to_dispatcher_config() {
        let config = Config {
            worker_count: 2,
            queue_capacity: 32,
            shutdown_timeout: 5,
            delivery_timeout_seconds: 7,
            verify_tls: false,
            ..Config::default()
        };

        let dispatcher = config.to_dispatcher_config();
        assert_eq!(dispatcher.worker_count, 2);
        assert_eq!(dispatcher.queue_capacity, 32);
        assert_eq!(dispatcher.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(dispatcher.client_config.timeout, Duration::from_secs(7));
        assert!(!dispatcher.client_config.verify_tls);
        assert_eq!(dispatcher.client_config.user_agent, "Beagle-Notifier/1.0");
    }

    #[test]
    fn socket_address_parsing() {
        let config = Config { host: "127.0.0.1".to_string(), port: 9000, ..Config::default() };

        let addr = config.parse_server_addr().expect("Should parse socket address");

        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 9000);
    }
}
