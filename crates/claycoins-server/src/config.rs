use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};

use claycoins_engine::EngineConfig;
use claycoins_gateway::GatewayConfig;

/// Process configuration, read from `CLAYCOINS_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub engine: EngineConfig,
    pub gateway: GatewayConfig,
    /// Usernames promoted to admin at startup.
    pub admins: Vec<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let host = var("CLAYCOINS_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse_or(&var, "CLAYCOINS_PORT", 8080)?;
        let db_path = PathBuf::from(var("CLAYCOINS_DB_PATH").unwrap_or_else(|| "claycoins.db".into()));

        let defaults = EngineConfig::default();
        let db_timeout_ms: u64 = parse_or(
            &var,
            "CLAYCOINS_DB_TIMEOUT_MS",
            defaults.db_timeout.as_millis() as u64,
        )?;
        let subscriber_buffer: usize =
            parse_or(&var, "CLAYCOINS_SUBSCRIBER_BUFFER", defaults.subscriber_buffer)?;

        let heartbeat_secs: u64 = parse_or(
            &var,
            "CLAYCOINS_HEARTBEAT_SECS",
            GatewayConfig::default().heartbeat_interval.as_secs(),
        )?;
        if heartbeat_secs == 0 {
            bail!("CLAYCOINS_HEARTBEAT_SECS must be at least 1");
        }

        let admins = var("CLAYCOINS_ADMINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            host,
            port,
            db_path,
            engine: EngineConfig {
                db_timeout: Duration::from_millis(db_timeout_ms),
                subscriber_buffer,
            },
            gateway: GatewayConfig {
                heartbeat_interval: Duration::from_secs(heartbeat_secs),
            },
            admins,
        })
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a number, got {:?}", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = from(&[]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.db_path, PathBuf::from("claycoins.db"));
        assert_eq!(config.engine.db_timeout, Duration::from_secs(5));
        assert_eq!(config.engine.subscriber_buffer, 256);
        assert_eq!(config.gateway.heartbeat_interval, Duration::from_secs(15));
        assert!(config.admins.is_empty());
    }

    #[test]
    fn overrides() {
        let config = from(&[
            ("CLAYCOINS_PORT", "9000"),
            ("CLAYCOINS_DB_TIMEOUT_MS", "250"),
            ("CLAYCOINS_SUBSCRIBER_BUFFER", "16"),
            ("CLAYCOINS_HEARTBEAT_SECS", "30"),
            ("CLAYCOINS_ADMINS", " clay, ,mod "),
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.engine.db_timeout, Duration::from_millis(250));
        assert_eq!(config.engine.subscriber_buffer, 16);
        assert_eq!(config.gateway.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.admins, vec!["clay", "mod"]);
    }

    #[test]
    fn bad_numbers_fail_startup() {
        assert!(from(&[("CLAYCOINS_PORT", "eighty")]).is_err());
        assert!(from(&[("CLAYCOINS_DB_TIMEOUT_MS", "-1")]).is_err());
        assert!(from(&[("CLAYCOINS_HEARTBEAT_SECS", "0")]).is_err());
    }
}
