use crate::shared::error::{flatten_errors, MonitorError};
use config::{Config as ConfigSource, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

const MAX_INTERVAL: Duration = Duration::from_secs(60 * 60);
const MAX_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub monitor: MonitorConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Monitored builder endpoints, `name=url`.
    pub builders: Vec<String>,
    /// Interval at which to query builders for their status.
    #[serde(with = "humantime_duration")]
    pub interval: Duration,
    /// Known peer IPs, `label=ip`, used to annotate external-peer logs.
    pub peers: Vec<String>,
    /// Per-call deadline for builder RPC queries.
    #[serde(with = "humantime_duration")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// `host:port` for the healthcheck/metrics server to listen on.
    pub listen_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    /// Load configuration from the optional `builder-monitor` config file and
    /// `BMON_`-prefixed environment (`BMON_MONITOR__INTERVAL=10s`). CLI flags
    /// are layered on top by the caller.
    pub fn load() -> Result<Self, MonitorError> {
        let source = ConfigSource::builder()
            .add_source(File::with_name("builder-monitor").required(false))
            .add_source(
                Environment::with_prefix("BMON")
                    .prefix_separator("_")
                    .separator("__")
                    .ignore_empty(true),
            )
            .build()?;

        Ok(source.try_deserialize()?)
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        let errs = [
            self.monitor.validate(),
            self.server.validate(),
            self.logging.validate(),
        ]
        .into_iter()
        .filter_map(Result::err)
        .collect();

        match flatten_errors(errs) {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<(), MonitorError> {
        let mut errs = Vec::new();

        for builder in &self.builders {
            if let Err(err) = parse_builder(builder) {
                errs.push(err);
            }
        }

        if self.interval.is_zero() || self.interval > MAX_INTERVAL {
            errs.push(MonitorError::Config(format!(
                "invalid monitoring interval (must be non-zero and up to 1h): {}",
                humantime::format_duration(self.interval)
            )));
        }

        if let Err(err) = self.peer_labels() {
            errs.push(err);
        }

        if self.timeout.is_zero() || self.timeout > MAX_TIMEOUT {
            errs.push(MonitorError::Config(format!(
                "invalid monitoring timeout (must be non-zero and up to 1m): {}",
                humantime::format_duration(self.timeout)
            )));
        }
        if self.timeout >= self.interval {
            errs.push(MonitorError::Config(format!(
                "invalid monitoring timeout (must be less than the interval): {} >= {}",
                humantime::format_duration(self.timeout),
                humantime::format_duration(self.interval)
            )));
        }

        match flatten_errors(errs) {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    /// The parsed `name -> url` builder bindings.
    pub fn builder_endpoints(&self) -> Result<Vec<(String, String)>, MonitorError> {
        self.builders.iter().map(|b| parse_builder(b)).collect()
    }

    /// The parsed `ip -> label` map for peer cross-referencing.
    pub fn peer_labels(&self) -> Result<HashMap<IpAddr, String>, MonitorError> {
        let mut labels = HashMap::with_capacity(self.peers.len());
        for peer in &self.peers {
            let (label, ip) = peer.split_once('=').ok_or_else(|| {
                MonitorError::Config(format!(
                    "invalid peer (must be `label=ip`): {}",
                    peer
                ))
            })?;
            let label = label.trim();
            if label.is_empty() {
                return Err(MonitorError::Config(format!(
                    "invalid peer: {}: empty label",
                    peer
                )));
            }
            let ip: IpAddr = ip.trim().parse().map_err(|_| {
                MonitorError::Config(format!("invalid peer: {}: invalid ip address", peer))
            })?;
            if labels.insert(ip, label.to_string()).is_some() {
                return Err(MonitorError::Config(format!(
                    "invalid peer: {}: duplicate ip",
                    peer
                )));
            }
        }
        Ok(labels)
    }
}

fn parse_builder(builder: &str) -> Result<(String, String), MonitorError> {
    let (name, url) = builder.trim().split_once('=').ok_or_else(|| {
        MonitorError::Config(format!(
            "invalid builder (must be `name=url`): {}",
            builder
        ))
    })?;

    let name = name.trim();
    if name.is_empty() {
        return Err(MonitorError::Config(format!(
            "invalid builder: {}: empty name",
            builder
        )));
    }

    let url = url.trim();
    if let Err(err) = reqwest::Url::parse(url) {
        return Err(MonitorError::Config(format!(
            "invalid builder: {}: invalid url: {}",
            builder, err
        )));
    }

    Ok((name.to_string(), url.to_string()))
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), MonitorError> {
        self.listen_address
            .parse::<SocketAddr>()
            .map(|_| ())
            .map_err(|_| {
                MonitorError::Config(format!(
                    "invalid server listen address (must be `host:port`): {}",
                    self.listen_address
                ))
            })
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), MonitorError> {
        let mut errs = Vec::new();

        if self.level.parse::<tracing::Level>().is_err() {
            errs.push(MonitorError::Config(format!(
                "invalid log level: {}",
                self.level
            )));
        }
        if self.format != "text" && self.format != "json" {
            errs.push(MonitorError::Config(format!(
                "invalid log format (must be `text` or `json`): {}",
                self.format
            )));
        }

        match flatten_errors(errs) {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            builders: Vec::new(),
            interval: Duration::from_secs(5),
            peers: Vec::new(),
            timeout: Duration::from_millis(500),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:8080".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&humantime::format_duration(*d).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_builder_endpoints() {
        let mut cfg = MonitorConfig::default();
        cfg.builders = vec![
            "alpha=http://10.0.0.1:8545".to_string(),
            " beta = http://10.0.0.2:8545 ".to_string(),
        ];

        assert!(cfg.validate().is_ok());
        let endpoints = cfg.builder_endpoints().unwrap();
        assert_eq!(endpoints[0], ("alpha".to_string(), "http://10.0.0.1:8545".to_string()));
        assert_eq!(endpoints[1].0, "beta");
    }

    #[test]
    fn test_builder_rejects_missing_separator() {
        let mut cfg = MonitorConfig::default();
        cfg.builders = vec!["alpha".to_string()];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_builder_rejects_empty_name() {
        let mut cfg = MonitorConfig::default();
        cfg.builders = vec!["=http://10.0.0.1:8545".to_string()];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_interval_bounds() {
        let mut cfg = MonitorConfig::default();
        cfg.interval = Duration::ZERO;
        assert!(cfg.validate().is_err());

        cfg.interval = Duration::from_secs(2 * 60 * 60);
        assert!(cfg.validate().is_err());

        cfg.interval = Duration::from_secs(60 * 60);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_timeout_bounds() {
        let mut cfg = MonitorConfig::default();

        cfg.timeout = Duration::ZERO;
        assert!(cfg.validate().is_err());

        cfg.timeout = Duration::from_secs(90);
        assert!(cfg.validate().is_err());

        // not below the interval
        cfg.timeout = Duration::from_secs(5);
        assert!(cfg.validate().is_err());

        cfg.timeout = Duration::from_millis(500);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_peer_labels() {
        let mut cfg = MonitorConfig::default();
        cfg.peers = vec!["relay=10.1.2.3".to_string(), "probe=2001:db8::1".to_string()];

        let labels = cfg.peer_labels().unwrap();
        assert_eq!(labels[&"10.1.2.3".parse::<IpAddr>().unwrap()], "relay");
        assert_eq!(labels[&"2001:db8::1".parse::<IpAddr>().unwrap()], "probe");
    }

    #[test]
    fn test_peer_rejects_bad_ip_and_duplicates() {
        let mut cfg = MonitorConfig::default();
        cfg.peers = vec!["relay=300.0.0.1".to_string()];
        assert!(cfg.peer_labels().is_err());

        cfg.peers = vec!["a=10.0.0.1".to_string(), "b=10.0.0.1".to_string()];
        assert!(cfg.peer_labels().is_err());
    }

    #[test]
    fn test_listen_address() {
        let mut cfg = ServerConfig::default();
        assert!(cfg.validate().is_ok());

        cfg.listen_address = "nonsense".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validation_aggregates_errors() {
        let mut cfg = Config::default();
        cfg.monitor.interval = Duration::ZERO;
        cfg.server.listen_address = "nonsense".to_string();

        let err = cfg.validate().unwrap_err();
        let display = format!("{}", err);
        assert!(display.contains("interval"));
        assert!(display.contains("listen address"));
    }

    #[test]
    fn test_duration_serde_roundtrip() {
        let cfg = MonitorConfig::default();
        let raw = serde_json::to_string(&cfg).unwrap();
        assert!(raw.contains("500ms"));

        let back: MonitorConfig = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.timeout, Duration::from_millis(500));
        assert_eq!(back.interval, Duration::from_secs(5));
    }
}
