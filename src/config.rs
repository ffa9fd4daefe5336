// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// Bridge configuration: option table, defaults, builder and file loading

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ParadoxError, Result};
use crate::labels::LabelEncoding;
use crate::storage::{ElementType, Limits};

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV: &str = "PARADOX_BRIDGE_CONFIG";

/// How the panel is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionType {
    #[default]
    Serial,
    #[serde(rename = "IP", alias = "Ip", alias = "ip")]
    Ip,
}

/// Every option the bridge understands, named as in the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub connection_type: ConnectionType,

    #[serde(default = "default_serial_port")]
    pub serial_port: String,
    #[serde(default = "default_serial_baud")]
    pub serial_baud: u32,

    #[serde(default = "default_ip_host")]
    pub ip_connection_host: String,
    #[serde(default = "default_ip_port")]
    pub ip_connection_port: u16,
    #[serde(default = "default_ip_password")]
    pub ip_connection_password: String,
    /// Plain serial-over-TCP, no IP-module envelope.
    #[serde(default)]
    pub ip_connection_bare: bool,
    #[serde(default)]
    pub ip_connection_siteid: Option<String>,
    #[serde(default)]
    pub ip_connection_email: Option<String>,
    #[serde(default)]
    pub ip_connection_panel_serial: Option<String>,

    /// PC password (EVO installer code), up to four digits.
    #[serde(default = "default_password")]
    pub password: Option<String>,

    /// Seconds between status polls.
    #[serde(default = "default_keep_alive_interval")]
    pub keep_alive_interval: f64,
    /// Seconds to wait for each reply.
    #[serde(default = "default_io_timeout")]
    pub io_timeout: f64,
    #[serde(default = "default_io_retries")]
    pub io_retries: u32,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay: f64,
    #[serde(default = "default_max_poll_failures")]
    pub max_consecutive_poll_failures: u32,
    #[serde(default = "default_stun_refresh_interval")]
    pub stun_refresh_interval: f64,

    #[serde(default)]
    pub label_encoding: LabelEncoding,
    /// Seconds between label re-reads; `0` disables.
    #[serde(default = "default_label_refresh_interval")]
    pub label_refresh_interval: f64,

    /// Per-type id allow-lists, e.g. `zone = [1, 2, 3]`.
    #[serde(default)]
    pub limits: BTreeMap<String, Vec<u32>>,

    #[serde(default)]
    pub sync_time: bool,
    /// IANA zone the panel clock runs in; host local time when absent.
    #[serde(default)]
    pub sync_time_timezone: Option<String>,
    /// Seconds of drift tolerated before the panel clock is set.
    #[serde(default = "default_sync_time_min_drift")]
    pub sync_time_min_drift: f64,

    #[serde(default = "default_output_pulse_duration")]
    pub output_pulse_duration: f64,

    #[serde(default = "default_true")]
    pub push_power_update_without_change: bool,
    #[serde(default)]
    pub push_update_without_change: bool,

    #[serde(default)]
    pub logging_dump_packets: bool,
    #[serde(default)]
    pub logging_dump_messages: bool,
    #[serde(default)]
    pub logging_dump_status: bool,
    #[serde(default)]
    pub logging_dump_events: bool,

    #[serde(default = "default_mqtt_host")]
    pub mqtt_host: String,
    #[serde(default = "default_mqtt_port")]
    pub mqtt_port: u16,
    #[serde(default)]
    pub mqtt_username: Option<String>,
    #[serde(default)]
    pub mqtt_password: Option<String>,
    #[serde(default = "default_mqtt_client_id")]
    pub mqtt_client_id: String,
    #[serde(default = "default_mqtt_base_topic")]
    pub mqtt_base_topic: String,
    #[serde(default = "default_mqtt_keepalive")]
    pub mqtt_keepalive: u64,
    #[serde(default = "default_true")]
    pub mqtt_retain: bool,
}

fn default_serial_port() -> String {
    "/dev/ttyS1".to_string()
}
fn default_serial_baud() -> u32 {
    9600
}
fn default_ip_host() -> String {
    "127.0.0.1".to_string()
}
fn default_ip_port() -> u16 {
    10000
}
fn default_ip_password() -> String {
    "paradox".to_string()
}
fn default_password() -> Option<String> {
    Some("0000".to_string())
}
fn default_keep_alive_interval() -> f64 {
    10.0
}
fn default_io_timeout() -> f64 {
    0.5
}
fn default_io_retries() -> u32 {
    5
}
fn default_reconnect_delay() -> f64 {
    5.0
}
fn default_max_poll_failures() -> u32 {
    3
}
fn default_stun_refresh_interval() -> f64 {
    500.0
}
fn default_label_refresh_interval() -> f64 {
    15.0 * 60.0
}
fn default_sync_time_min_drift() -> f64 {
    120.0
}
fn default_output_pulse_duration() -> f64 {
    1.0
}
fn default_true() -> bool {
    true
}
fn default_mqtt_host() -> String {
    "127.0.0.1".to_string()
}
fn default_mqtt_port() -> u16 {
    1883
}
fn default_mqtt_client_id() -> String {
    "paradox2mqtt".to_string()
}
fn default_mqtt_base_topic() -> String {
    "paradox".to_string()
}
fn default_mqtt_keepalive() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection_type: ConnectionType::default(),
            serial_port: default_serial_port(),
            serial_baud: default_serial_baud(),
            ip_connection_host: default_ip_host(),
            ip_connection_port: default_ip_port(),
            ip_connection_password: default_ip_password(),
            ip_connection_bare: false,
            ip_connection_siteid: None,
            ip_connection_email: None,
            ip_connection_panel_serial: None,
            password: default_password(),
            keep_alive_interval: default_keep_alive_interval(),
            io_timeout: default_io_timeout(),
            io_retries: default_io_retries(),
            reconnect_delay: default_reconnect_delay(),
            max_consecutive_poll_failures: default_max_poll_failures(),
            stun_refresh_interval: default_stun_refresh_interval(),
            label_encoding: LabelEncoding::default(),
            label_refresh_interval: default_label_refresh_interval(),
            limits: BTreeMap::new(),
            sync_time: false,
            sync_time_timezone: None,
            sync_time_min_drift: default_sync_time_min_drift(),
            output_pulse_duration: default_output_pulse_duration(),
            push_power_update_without_change: true,
            push_update_without_change: false,
            logging_dump_packets: false,
            logging_dump_messages: false,
            logging_dump_status: false,
            logging_dump_events: false,
            mqtt_host: default_mqtt_host(),
            mqtt_port: default_mqtt_port(),
            mqtt_username: None,
            mqtt_password: None,
            mqtt_client_id: default_mqtt_client_id(),
            mqtt_base_topic: default_mqtt_base_topic(),
            mqtt_keepalive: default_mqtt_keepalive(),
            mqtt_retain: true,
        }
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_default()
}

fn config_error(reason: impl Into<String>) -> ParadoxError {
    ParadoxError::Config { reason: reason.into() }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Load a `.toml` or `.json` file and validate it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| config_error(format!("cannot read {}: {}", path.display(), e)))?;
        let config: Config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&text)
                .map_err(|e| config_error(format!("{}: {}", path.display(), e)))?,
            Some("toml") => {
                toml::from_str(&text).map_err(|e| config_error(format!("{}: {}", path.display(), e)))?
            }
            other => {
                return Err(config_error(format!(
                    "unsupported configuration format {:?} for {}",
                    other.unwrap_or(""),
                    path.display()
                )))
            }
        };
        config.validate()?;
        debug!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// First configuration file found: `$PARADOX_BRIDGE_CONFIG`, then the well-known paths.
    pub fn locate() -> Option<PathBuf> {
        if let Some(explicit) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(explicit));
        }
        Self::search_paths().into_iter().find(|p| p.is_file())
    }

    pub fn search_paths() -> Vec<PathBuf> {
        let mut dirs = vec![PathBuf::from("/etc/paradox-bridge")];
        if let Some(home) = std::env::var_os("HOME") {
            dirs.push(PathBuf::from(home).join(".local/etc"));
        }
        dirs.push(PathBuf::from("."));
        dirs.iter()
            .flat_map(|dir| ["paradox.toml", "paradox.json"].map(|name| dir.join(name)))
            .collect()
    }

    /// Reject option combinations the session cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.keep_alive_interval <= 0.0 || !self.keep_alive_interval.is_finite() {
            return Err(config_error("KEEP_ALIVE_INTERVAL must be positive"));
        }
        if self.io_timeout <= 0.0 || !self.io_timeout.is_finite() {
            return Err(config_error("IO_TIMEOUT must be positive"));
        }
        if self.output_pulse_duration < 0.0 {
            return Err(config_error("OUTPUT_PULSE_DURATION must not be negative"));
        }
        if self.max_consecutive_poll_failures == 0 {
            return Err(config_error("MAX_CONSECUTIVE_POLL_FAILURES must be at least 1"));
        }
        if let Some(password) = self.password.as_deref() {
            crate::family::encode_password(Some(password))?;
        }
        match self.connection_type {
            ConnectionType::Serial if self.serial_port.is_empty() => {
                return Err(config_error("SERIAL_PORT is required for a serial connection"));
            }
            ConnectionType::Ip if self.ip_connection_siteid.is_some() && self.ip_connection_email.is_none() => {
                return Err(config_error("IP_CONNECTION_EMAIL is required with IP_CONNECTION_SITEID"));
            }
            _ => {}
        }
        self.limits()?;
        self.timezone()?;
        Ok(())
    }

    pub fn limits(&self) -> Result<Limits> {
        let mut limits = BTreeMap::new();
        for (ty, ids) in &self.limits {
            let ty: ElementType = ty.parse()?;
            limits.insert(ty, ids.clone());
        }
        Ok(Limits::new(limits))
    }

    pub fn timezone(&self) -> Result<Option<Tz>> {
        self.sync_time_timezone
            .as_deref()
            .map(|name| {
                name.parse::<Tz>()
                    .map_err(|e| config_error(format!("SYNC_TIME_TIMEZONE {:?}: {}", name, e)))
            })
            .transpose()
    }

    pub fn keep_alive_interval(&self) -> Duration {
        seconds(self.keep_alive_interval)
    }

    pub fn io_timeout(&self) -> Duration {
        seconds(self.io_timeout)
    }

    pub fn reconnect_delay(&self) -> Duration {
        seconds(self.reconnect_delay)
    }

    pub fn stun_refresh_interval(&self) -> Duration {
        seconds(self.stun_refresh_interval)
    }

    /// `None` when periodic label refresh is disabled.
    pub fn label_refresh_interval(&self) -> Option<Duration> {
        (self.label_refresh_interval > 0.0).then(|| seconds(self.label_refresh_interval))
    }

    pub fn sync_time_min_drift(&self) -> Duration {
        seconds(self.sync_time_min_drift)
    }

    pub fn output_pulse_duration(&self) -> Duration {
        seconds(self.output_pulse_duration)
    }

    /// Whether the remote rendezvous path is configured.
    pub fn uses_site_rendezvous(&self) -> bool {
        self.connection_type == ConnectionType::Ip && self.ip_connection_siteid.is_some()
    }
}

/// Builder for [`Config`].
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serial(mut self, port: impl Into<String>, baud: u32) -> Self {
        self.config.connection_type = ConnectionType::Serial;
        self.config.serial_port = port.into();
        self.config.serial_baud = baud;
        self
    }

    pub fn ip(mut self, host: impl Into<String>, port: u16) -> Self {
        self.config.connection_type = ConnectionType::Ip;
        self.config.ip_connection_host = host.into();
        self.config.ip_connection_port = port;
        self
    }

    pub fn ip_password(mut self, password: impl Into<String>) -> Self {
        self.config.ip_connection_password = password.into();
        self
    }

    pub fn bare(mut self, bare: bool) -> Self {
        self.config.ip_connection_bare = bare;
        self
    }

    pub fn site(mut self, site_id: impl Into<String>, email: impl Into<String>) -> Self {
        self.config.connection_type = ConnectionType::Ip;
        self.config.ip_connection_siteid = Some(site_id.into());
        self.config.ip_connection_email = Some(email.into());
        self
    }

    pub fn panel_serial(mut self, serial: impl Into<String>) -> Self {
        self.config.ip_connection_panel_serial = Some(serial.into());
        self
    }

    pub fn password(mut self, password: Option<&str>) -> Self {
        self.config.password = password.map(str::to_string);
        self
    }

    pub fn keep_alive_interval(mut self, secs: f64) -> Self {
        self.config.keep_alive_interval = secs;
        self
    }

    pub fn io_timeout(mut self, secs: f64) -> Self {
        self.config.io_timeout = secs;
        self
    }

    pub fn io_retries(mut self, retries: u32) -> Self {
        self.config.io_retries = retries;
        self
    }

    pub fn label_encoding(mut self, encoding: LabelEncoding) -> Self {
        self.config.label_encoding = encoding;
        self
    }

    pub fn label_refresh_interval(mut self, secs: f64) -> Self {
        self.config.label_refresh_interval = secs;
        self
    }

    pub fn limit(mut self, ty: ElementType, ids: impl IntoIterator<Item = u32>) -> Self {
        self.config
            .limits
            .insert(ty.as_str().to_string(), ids.into_iter().collect());
        self
    }

    pub fn sync_time(mut self, enabled: bool, timezone: Option<&str>) -> Self {
        self.config.sync_time = enabled;
        self.config.sync_time_timezone = timezone.map(str::to_string);
        self
    }

    pub fn output_pulse_duration(mut self, secs: f64) -> Self {
        self.config.output_pulse_duration = secs;
        self
    }

    pub fn push_update_without_change(mut self, enabled: bool) -> Self {
        self.config.push_update_without_change = enabled;
        self
    }

    pub fn dump_packets(mut self, enabled: bool) -> Self {
        self.config.logging_dump_packets = enabled;
        self
    }

    pub fn mqtt(mut self, host: impl Into<String>, port: u16) -> Self {
        self.config.mqtt_host = host.into();
        self.config.mqtt_port = port;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
