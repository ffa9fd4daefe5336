// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// MQTT bridge

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use rumqttc::{AsyncClient, Event, LastWill, MqttOptions, Packet, QoS};
use serde::Serialize;
use serde_json::Value;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use paradox_bridge::constants::MAX_RECONNECT_DELAY;
use paradox_bridge::{BusMessage, BusReceiver, Change, Config, Paradox, ParadoxError, RunState};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "paradox2mqtt")]
#[command(about = "Bridge between a Paradox alarm panel and MQTT")]
struct Cli {
    /// Path to the configuration file (.toml or .json). Searched in the
    /// usual locations when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn load_config(cli: &Cli) -> Result<(PathBuf, Config)> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::locate().context("No configuration file found (set PARADOX_BRIDGE_CONFIG or pass --config)")?,
    };
    let config = Config::load(&path).with_context(|| format!("Failed to load {}", path.display()))?;
    Ok((path, config))
}

// ---------------------------------------------------------------------------
// Topics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Topics {
    base: String,
}

impl Topics {
    fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    fn availability(&self) -> String {
        format!("{}/interface/availability", self.base)
    }

    fn run_state(&self) -> String {
        format!("{}/interface/run_state", self.base)
    }

    fn panel(&self) -> String {
        format!("{}/interface/panel", self.base)
    }

    fn labels(&self) -> String {
        format!("{}/definitions/labels", self.base)
    }

    fn state(&self, change: &Change) -> String {
        format!(
            "{}/states/{}/{}/{}",
            self.base, change.element_type, change.key, change.property
        )
    }

    fn events(&self) -> String {
        format!("{}/events/raw", self.base)
    }

    fn notification(&self, level: &str) -> String {
        format!("{}/notifications/{}", self.base, level)
    }

    fn control_filter(&self) -> String {
        format!("{}/control/+/+", self.base)
    }

    fn control_result(&self) -> String {
        format!("{}/control/result", self.base)
    }

    /// `(type, key)` of a control topic, `None` for anything else.
    fn parse_control<'a>(&self, topic: &'a str) -> Option<(&'a str, &'a str)> {
        let rest = topic.strip_prefix(self.base.as_str())?.strip_prefix("/control/")?;
        let (ty, key) = rest.split_once('/')?;
        if ty.is_empty() || key.is_empty() || key.contains('/') {
            return None;
        }
        Some((ty, key))
    }
}

/// MQTT payload for an attribute value: strings bare, everything else as JSON.
fn state_payload(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// MQTT JSON types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct MqttCmdAck<'a> {
    now: i64,
    topic: &'a str,
    command: &'a str,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn publish_json(client: &AsyncClient, topic: &str, payload: &impl Serialize, retain: bool) {
    match serde_json::to_string(payload) {
        Ok(json) => {
            if let Err(e) = client.publish(topic, QoS::AtLeastOnce, retain, json).await {
                error!("Failed to publish to {topic}: {e}");
            }
        }
        Err(e) => error!("Failed to serialize MQTT payload: {e}"),
    }
}

async fn publish_text(client: &AsyncClient, topic: &str, payload: String, retain: bool) {
    if let Err(e) = client.publish(topic, QoS::AtLeastOnce, retain, payload).await {
        error!("Failed to publish to {topic}: {e}");
    }
}

async fn publish_run_state(client: &AsyncClient, topics: &Topics, state: RunState) {
    publish_text(client, &topics.run_state(), state.to_string(), true).await;
    let availability = if state == RunState::Run { "online" } else { "offline" };
    publish_text(client, &topics.availability(), availability.to_string(), true).await;
}

async fn publish_cmd_ack(client: &AsyncClient, topics: &Topics, topic: &str, command: &str, result: &paradox_bridge::Result<bool>) {
    let msg = MqttCmdAck {
        now: Utc::now().timestamp_millis(),
        topic,
        command,
        success: matches!(result, Ok(true)),
        error: result.as_ref().err().map(|e| e.to_string()),
    };
    publish_json(client, &topics.control_result(), &msg, false).await;
}

/// Exponential backoff from `base`, capped.
fn reconnect_backoff(base: Duration, attempt: u32) -> Duration {
    let factor = 1u32 << attempt.saturating_sub(1).min(6);
    (base * factor).min(MAX_RECONNECT_DELAY)
}

// ---------------------------------------------------------------------------
// Bus → MQTT
// ---------------------------------------------------------------------------

async fn forward_bus(mut rx: BusReceiver, client: AsyncClient, topics: Topics, retain: bool) {
    loop {
        match rx.recv().await {
            Ok(BusMessage::Change(change)) => {
                let topic = topics.state(&change);
                debug!("{topic} = {}", change.new_value);
                publish_text(&client, &topic, state_payload(&change.new_value), retain).await;
            }
            Ok(BusMessage::Event(event)) => {
                publish_json(&client, &topics.events(), &event, false).await;
            }
            Ok(BusMessage::RunState(state)) => {
                publish_run_state(&client, &topics, state).await;
            }
            Ok(BusMessage::PanelDetected(info)) => {
                info!("Panel {} firmware {} serial {}", info.model, info.firmware, info.serial_number);
                publish_json(&client, &topics.panel(), &info, true).await;
            }
            Ok(BusMessage::LabelsLoaded(labels)) => {
                publish_json(&client, &topics.labels(), &labels, true).await;
            }
            Ok(BusMessage::Notification(notification)) => {
                let topic = topics.notification(notification.level.as_str());
                publish_json(&client, &topic, &notification, false).await;
            }
            Ok(_) => {}
            Err(RecvError::Lagged(n)) => {
                warn!("Bus receiver lagged, missed {n} messages");
            }
            Err(RecvError::Closed) => {
                debug!("Bus closed");
                break;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MQTT command handler
// ---------------------------------------------------------------------------

async fn exec_command(paradox: &Paradox, ty: &str, key: &str, command: &str) -> paradox_bridge::Result<bool> {
    match ty {
        "zone" | "zones" => paradox.control_zone(key, command).await,
        "partition" | "partitions" => paradox.control_partition(key, command).await,
        "pgm" | "pgms" | "output" | "outputs" => paradox.control_output(key, command).await,
        "door" | "doors" => paradox.control_door(key, command).await,
        "panic" => {
            // `<type>` or `<type>:<user id>`
            let (panic_type, user) = command.split_once(':').unwrap_or((command, "0"));
            let Ok(user) = user.trim().parse::<u16>() else {
                warn!("Invalid panic user id in {command:?}");
                return Ok(false);
            };
            paradox.send_panic(key, panic_type.trim(), user).await
        }
        other => {
            warn!("Unknown control type: {other}");
            Ok(false)
        }
    }
}

async fn handle_command(
    current: &Mutex<Option<Paradox>>,
    client: &AsyncClient,
    topics: &Topics,
    topic: &str,
    ty: &str,
    key: &str,
    command: &str,
) {
    let paradox = current.lock().await.clone();
    let result = match paradox {
        Some(paradox) => exec_command(&paradox, ty, key, command).await,
        None => Err(ParadoxError::NotConnected),
    };
    match &result {
        Ok(true) => info!("{ty} {key} {command}: success"),
        Ok(false) => warn!("{ty} {key} {command}: not executed"),
        Err(e) => error!("{ty} {key} {command} failed: {e}"),
    }
    publish_cmd_ack(client, topics, topic, command, &result).await;
}

// ---------------------------------------------------------------------------
// Panel session
// ---------------------------------------------------------------------------

/// Keep a panel session alive, reconnecting with backoff until a fatal error.
async fn panel_session(
    config: Config,
    current: Arc<Mutex<Option<Paradox>>>,
    client: AsyncClient,
    topics: Topics,
) -> Result<()> {
    let mut attempt: u32 = 0;
    loop {
        if attempt > 0 {
            let delay = reconnect_backoff(config.reconnect_delay(), attempt);
            warn!("Reconnecting to panel in {:.1}s (attempt {attempt})", delay.as_secs_f64());
            sleep(delay).await;
        }
        attempt += 1;

        let paradox = Paradox::new(config.clone()).context("Invalid configuration")?;
        let forward = tokio::spawn(forward_bus(
            paradox.subscribe(),
            client.clone(),
            topics.clone(),
            config.mqtt_retain,
        ));
        *current.lock().await = Some(paradox.clone());

        let outcome = match paradox.connect().await {
            Ok(()) => {
                attempt = 0;
                info!("Panel session running");
                paradox.run().await
            }
            Err(e) => Err(e),
        };

        *current.lock().await = None;
        // Let the last run-state transition reach MQTT before dropping the forwarder.
        sleep(Duration::from_millis(100)).await;
        forward.abort();
        publish_run_state(&client, &topics, paradox.run_state()).await;

        match outcome {
            Ok(()) => return Ok(()),
            Err(e) if e.is_fatal() => {
                return Err(e).context("Panel rejected the session, not retrying");
            }
            Err(e) => warn!("Panel session ended: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// MQTT event loop
// ---------------------------------------------------------------------------

fn mqtt_options(config: &Config, topics: &Topics) -> MqttOptions {
    let mut opts = MqttOptions::new(&config.mqtt_client_id, &config.mqtt_host, config.mqtt_port);
    opts.set_keep_alive(Duration::from_secs(config.mqtt_keepalive.max(5)));
    if let Some(username) = &config.mqtt_username {
        opts.set_credentials(username, config.mqtt_password.as_deref().unwrap_or_default());
    }
    opts.set_last_will(LastWill::new(topics.availability(), "offline", QoS::AtLeastOnce, true));
    opts
}

fn spawn_mqtt_loop(
    mut eventloop: rumqttc::EventLoop,
    client: AsyncClient,
    topics: Topics,
    current: Arc<Mutex<Option<Paradox>>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let filter = topics.control_filter();
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    // rumqttc does not resubscribe after a broker reconnect.
                    info!("MQTT: connected, subscribing to {filter}");
                    if let Err(e) = client.subscribe(&filter, QoS::AtLeastOnce).await {
                        error!("Failed to subscribe to {filter}: {e}");
                    }
                }
                Ok(Event::Incoming(Packet::Publish(msg))) => {
                    let Some((ty, key)) = topics.parse_control(&msg.topic) else {
                        continue;
                    };
                    let command = String::from_utf8_lossy(&msg.payload).trim().to_string();
                    info!("MQTT command received: {} {command}", msg.topic);
                    let (ty, key) = (ty.to_string(), key.to_string());
                    let (client, topics, current) = (client.clone(), topics.clone(), Arc::clone(&current));
                    // Commands can wait on the panel; the event loop must keep polling.
                    tokio::spawn(async move {
                        handle_command(&current, &client, &topics, &msg.topic, &ty, &key, &command).await;
                    });
                }
                Ok(_) => {}
                Err(e) => {
                    error!("MQTT event loop error: {e}");
                    sleep(Duration::from_secs(1)).await;
                }
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity (e.g. RUST_LOG=debug or RUST_LOG=paradox_bridge=trace).
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // systemd journal already adds timestamps
    if std::env::var_os("JOURNAL_STREAM").is_some() {
        tracing_subscriber::fmt().without_time().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let cli = Cli::parse();
    let (config_path, mut config) = load_config(&cli)?;

    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    loop {
        let topics = Topics::new(&config.mqtt_base_topic);
        let (client, eventloop) = AsyncClient::new(mqtt_options(&config, &topics), 256);
        let current: Arc<Mutex<Option<Paradox>>> = Arc::new(Mutex::new(None));

        let mqtt_handle = spawn_mqtt_loop(eventloop, client.clone(), topics.clone(), Arc::clone(&current));
        let mut session_handle = tokio::spawn(panel_session(
            config.clone(),
            Arc::clone(&current),
            client.clone(),
            topics.clone(),
        ));

        info!("MQTT bridge running. Send SIGHUP to restart, SIGINT/SIGTERM to stop.");
        let restart = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down...");
                false
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
                false
            }
            _ = sighup.recv() => {
                info!("Received SIGHUP, reloading config and restarting connections...");
                true
            }
            finished = &mut session_handle => {
                mqtt_handle.abort();
                return match finished {
                    Ok(result) => result,
                    Err(e) => Err(e).context("Panel session task failed"),
                };
            }
        };

        if let Some(paradox) = current.lock().await.take() {
            paradox.disconnect().await;
        }
        session_handle.abort();
        publish_text(&client, &topics.availability(), "offline".to_string(), true).await;
        if let Err(e) = client.disconnect().await {
            debug!("MQTT disconnect: {e}");
        }
        // Give the event loop a moment to flush the last publishes.
        sleep(Duration::from_millis(200)).await;
        mqtt_handle.abort();

        if !restart {
            break;
        }

        // Keep the previous config on failure
        info!("Reloading config from {}", config_path.display());
        match Config::load(&config_path) {
            Ok(new_config) => {
                config = new_config;
                info!("Config reloaded successfully");
            }
            Err(e) => warn!("Failed to reload config, keeping previous: {e}"),
        }
        info!("Reconnecting...");
    }

    info!("Shutdown complete");
    Ok(())
}
