// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// Session engine: lifecycle, memory loading, status polling and the command surface

use std::str::FromStr;
use std::sync::{Arc, Weak};

use chrono::{Local, NaiveDateTime, Utc};
use chrono_tz::Tz;
use futures::future::join_all;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, watch, Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::comm::CommCore;
use crate::config::Config;
use crate::devices::{DoorCommand, PanicType, PartitionCommand, PgmCommand, ZoneCommand};
use crate::error::{PanelErrorCode, ParadoxError, Result};
use crate::event::{bus_channel, BusMessage, BusReceiver, BusSender, Notification, PanelInfo, RunState};
use crate::family::{Body, EepromData, Message, Panel, RawEvent, ReadEeprom, Request};
use crate::handler::{HandlerId, ReplyExpected};
use crate::live_event::{self, LabelProvider};
use crate::status::{self, deep_merge};
use crate::storage::{Change, Element, ElementType, Limits, Selector, Storage};
use crate::transport::SiteRendezvous;

const BUS_CAPACITY: usize = 1024;
const LABEL_READ_ATTEMPTS: u32 = 3;
const PANEL_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

struct Inner {
    config: Config,
    limits: Limits,
    timezone: Option<Tz>,
    comm: CommCore,
    storage: RwLock<Storage>,
    bus: BusSender,
    run_state: watch::Sender<RunState>,
    panel_info: RwLock<Option<PanelInfo>>,
    refresh: Notify,
    busy: Mutex<()>,
    rendezvous: Option<Arc<dyn SiteRendezvous>>,
    handlers: Mutex<Vec<(HandlerId, JoinHandle<()>)>>,
}

/// A session with one Paradox panel.
///
/// `Paradox` is a cheap handle; clones share the same session. The usual
/// lifecycle is [`connect`](Paradox::connect), then [`run`](Paradox::run) on a
/// task of its own, while interfaces [`subscribe`](Paradox::subscribe) to the
/// bus and issue `control_*` commands.
///
/// # Example
///
/// ```no_run
/// use paradox_bridge::{BusMessage, Config, Paradox};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = Config::builder()
///         .ip("192.168.1.50", 10000)
///         .ip_password("paradox")
///         .password(Some("0000"))
///         .build();
///
///     let paradox = Paradox::new(config)?;
///     let mut bus = paradox.subscribe();
///     paradox.connect().await?;
///
///     let runner = paradox.clone();
///     tokio::spawn(async move { runner.run().await });
///
///     paradox.control_partition("1", "arm").await?;
///     while let Ok(message) = bus.recv().await {
///         if let BusMessage::Event(event) = message {
///             println!("{}", event);
///         }
///     }
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Paradox {
    inner: Arc<Inner>,
}

impl Paradox {
    pub fn new(config: Config) -> Result<Self> {
        Self::build(config, None)
    }

    /// Session that reaches the panel through a remote site broker.
    pub fn with_rendezvous(config: Config, rendezvous: Arc<dyn SiteRendezvous>) -> Result<Self> {
        Self::build(config, Some(rendezvous))
    }

    fn build(config: Config, rendezvous: Option<Arc<dyn SiteRendezvous>>) -> Result<Self> {
        let limits = config.limits()?;
        let timezone = config.timezone()?;
        let storage = Storage::new(
            config.push_power_update_without_change,
            config.push_update_without_change,
        );
        let (bus, _) = bus_channel(BUS_CAPACITY);
        let (run_state, _) = watch::channel(RunState::Stop);
        Ok(Self {
            inner: Arc::new(Inner {
                comm: CommCore::new(config.clone()),
                config,
                limits,
                timezone,
                storage: RwLock::new(storage),
                bus,
                run_state,
                panel_info: RwLock::new(None),
                refresh: Notify::new(),
                busy: Mutex::new(()),
                rendezvous,
                handlers: Mutex::new(Vec::new()),
            }),
        })
    }

    fn upgrade(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Receive every bus message published from now on.
    pub fn subscribe(&self) -> BusReceiver {
        self.inner.bus.subscribe()
    }

    pub fn run_state(&self) -> RunState {
        *self.inner.run_state.borrow()
    }

    pub fn watch_run_state(&self) -> watch::Receiver<RunState> {
        self.inner.run_state.subscribe()
    }

    /// Family codec in use; `Generic` until the handshake identified the panel.
    pub fn panel(&self) -> Panel {
        self.inner.comm.panel()
    }

    pub async fn panel_info(&self) -> Option<PanelInfo> {
        self.inner.panel_info.read().await.clone()
    }

    /// Every element with its current attributes.
    pub async fn snapshot(&self) -> Value {
        self.inner.storage.read().await.snapshot()
    }

    pub async fn labels(&self) -> Value {
        self.inner.storage.read().await.labels_snapshot()
    }

    /// One element looked up by id, id string or key.
    pub async fn element(&self, ty: ElementType, needle: &str) -> Option<Element> {
        let storage = self.inner.storage.read().await;
        storage.container(ty)?.lookup(needle).cloned()
    }

    fn publish(&self, message: BusMessage) {
        // No subscribers is fine.
        let _ = self.inner.bus.send(message);
    }

    /// Publish a free-form notification on the bus.
    pub fn notify(&self, notification: Notification) {
        self.publish(BusMessage::Notification(notification));
    }

    fn set_run_state(&self, state: RunState) {
        let previous = self.inner.run_state.send_replace(state);
        if previous != state {
            info!("Run state {} -> {}", previous, state);
            self.publish(BusMessage::RunState(state));
        }
    }

    // ----------------------------------------------------------------
    // Lifecycle
    // ----------------------------------------------------------------

    /// Open the link, log in and load the panel memory.
    ///
    /// On success the session is in `RUN`; any failure leaves it in `ERROR`
    /// with the link closed. [`ParadoxError::is_fatal`] tells whether retrying
    /// with the same settings makes sense.
    pub async fn connect(&self) -> Result<()> {
        self.set_run_state(RunState::Init);
        let result = async {
            self.inner.comm.connect(self.inner.rendezvous.clone()).await?;
            self.start_handlers().await;
            self.full_connect().await
        }
        .await;
        if let Err(e) = &result {
            error!("Connect failed: {}", e);
            self.stop_handlers().await;
            self.inner.comm.disconnect().await;
            self.set_run_state(RunState::Error);
        }
        result
    }

    /// Handshake and memory load over an already open link.
    async fn full_connect(&self) -> Result<()> {
        let handshake = self
            .inner
            .comm
            .handshake(self.inner.config.password.as_deref())
            .await?;
        *self.inner.panel_info.write().await = Some(handshake.info.clone());
        self.publish(BusMessage::PanelDetected(handshake.info));
        self.set_run_state(RunState::Connected);
        self.publish(BusMessage::Connected);

        self.load_memory().await?;
        self.set_run_state(RunState::Run);
        self.request_status_refresh();
        Ok(())
    }

    /// Send `CloseConnection` and drop the link.
    pub async fn disconnect(&self) {
        info!("Disconnecting from panel");
        self.set_run_state(RunState::Stop);
        self.stop_handlers().await;
        self.inner.comm.disconnect().await;
    }

    /// Hand the link to a pass-through client; polling stops, the link stays open.
    pub async fn pause(&self) -> Result<()> {
        self.ensure_running()?;
        self.inner.comm.registry().set_ignore_if_no_handlers(true).await;
        self.set_run_state(RunState::Pause);
        Ok(())
    }

    /// Take the link back after [`pause`](Paradox::pause); the panel is logged in again.
    pub async fn resume(&self) -> Result<()> {
        let state = self.run_state();
        if state != RunState::Pause {
            return Err(ParadoxError::NotRunning {
                state: state.to_string(),
            });
        }
        self.inner.comm.registry().set_ignore_if_no_handlers(false).await;
        self.set_run_state(RunState::Init);
        if let Err(e) = self.full_connect().await {
            error!("Resume failed: {}", e);
            self.set_run_state(RunState::Error);
            return Err(e);
        }
        Ok(())
    }

    /// Wake the main loop for an immediate status poll.
    pub fn request_status_refresh(&self) {
        self.inner.refresh.notify_one();
    }

    // ----------------------------------------------------------------
    // Main loop
    // ----------------------------------------------------------------

    /// Poll the panel until the session stops.
    ///
    /// Returns `Ok(())` after [`disconnect`](Paradox::disconnect) and an
    /// error when communication with the panel was lost.
    pub async fn run(&self) -> Result<()> {
        let mut state_rx = self.inner.run_state.subscribe();
        let max_failures = self.inner.config.max_consecutive_poll_failures.max(1);
        let mut failures = 0u32;
        let mut labels_loaded = Instant::now();

        loop {
            let state = *state_rx.borrow_and_update();
            match state {
                RunState::Run => {}
                RunState::Stop => return Ok(()),
                RunState::Error => {
                    return Err(ParadoxError::NotRunning {
                        state: state.to_string(),
                    })
                }
                RunState::Init | RunState::Connected | RunState::Pause => {
                    if state_rx.changed().await.is_err() {
                        return Ok(());
                    }
                    continue;
                }
            }

            if !self.inner.comm.is_connected() {
                error!("Connection to panel lost");
                self.stop_handlers().await;
                self.set_run_state(RunState::Error);
                return Err(ParadoxError::NotConnected);
            }

            match self.refresh_status().await {
                Ok(()) => {
                    failures = 0;
                    self.sync_time().await;
                }
                Err(e) => {
                    failures += 1;
                    warn!("Status poll failed ({}/{}): {}", failures, max_failures, e);
                    if failures >= max_failures {
                        error!("Lost communication with panel after {} failed polls", failures);
                        self.stop_handlers().await;
                        self.inner.comm.disconnect().await;
                        self.set_run_state(RunState::Error);
                        return Err(e);
                    }
                }
            }

            if let Some(every) = self.inner.config.label_refresh_interval() {
                if labels_loaded.elapsed() >= every {
                    labels_loaded = Instant::now();
                    if let Err(e) = self.load_labels().await {
                        warn!("Label refresh failed: {}", e);
                    }
                }
            }

            tokio::select! {
                _ = sleep(self.inner.config.keep_alive_interval()) => {}
                _ = self.inner.refresh.notified() => debug!("Status refresh requested"),
                _ = self.inner.comm.connection_lost() => {}
                _ = state_rx.changed() => {}
            }
        }
    }

    /// Read every status block, merge them and project the result.
    async fn refresh_status(&self) -> Result<()> {
        let panel = self.panel();
        let requests = panel.status_requests();
        let raw = {
            let _busy = self.inner.busy.lock().await;
            let replies = join_all(requests.iter().map(|r| self.read_memory(*r))).await;
            let mut raw = Map::new();
            for reply in replies {
                let reply = reply.map_err(|e| ParadoxError::StatusRequest { reason: e.to_string() })?;
                match panel.parse_status(&reply) {
                    Some(block) => deep_merge(&mut raw, block),
                    None => debug!("No status layout for block {:#x}", reply.address),
                }
            }
            raw
        };
        self.apply_status(raw).await;
        Ok(())
    }

    async fn apply_status(&self, raw: Map<String, Value>) {
        if self.inner.config.logging_dump_status {
            debug!(?raw, "Raw status");
        }
        let changes = {
            let mut storage = self.inner.storage.write().await;
            status::project(&mut storage, &raw, &self.inner.limits)
        };
        self.publish_changes(changes).await;

        let snapshot = {
            let mut storage = self.inner.storage.write().await;
            storage.mark_initial_done();
            storage.snapshot()
        };
        self.publish(BusMessage::StatusUpdate(snapshot));
    }

    /// Publish each change, followed by the event it implies (if any).
    async fn publish_changes(&self, changes: Vec<Change>) {
        if changes.is_empty() {
            return;
        }
        let storage = self.inner.storage.read().await;
        for change in changes {
            let event = live_event::change_event(&change, &storage);
            self.publish(BusMessage::Change(change));
            if let Some(event) = event {
                if self.inner.config.logging_dump_events {
                    debug!("Change event: {:?}", event);
                }
                self.publish(BusMessage::Event(event));
            }
        }
    }

    fn host_time(&self) -> NaiveDateTime {
        match &self.inner.timezone {
            Some(tz) => Utc::now().with_timezone(tz).naive_local(),
            None => Local::now().naive_local(),
        }
    }

    /// Set the panel clock when it drifted too far from the host.
    async fn sync_time(&self) {
        if !self.inner.config.sync_time {
            return;
        }
        let panel_time = {
            let storage = self.inner.storage.read().await;
            storage
                .system()
                .and_then(|s| s.get("date"))
                .and_then(|d| d.get("time"))
                .and_then(Value::as_str)
                .and_then(|t| NaiveDateTime::parse_from_str(t, PANEL_TIME_FORMAT).ok())
        };
        let Some(panel_time) = panel_time else {
            return;
        };
        let now = self.host_time();
        let drift = (now - panel_time).num_seconds().unsigned_abs();
        if Duration::from_secs(drift) <= self.inner.config.sync_time_min_drift() {
            return;
        }
        info!("Panel clock is {}s off, setting it to {}", drift, now.format(PANEL_TIME_FORMAT));
        if let Err(e) = self.inner.comm.request(&Request::SetTimeDate(now)).await {
            warn!("Time sync failed: {}", e);
        }
    }

    // ----------------------------------------------------------------
    // Memory
    // ----------------------------------------------------------------

    async fn read_memory(&self, request: ReadEeprom) -> Result<EepromData> {
        let expected = ReplyExpected::predicate(move |m| {
            matches!(&m.body, Body::ReadEepromResponse(data) if data.answers(&request))
        });
        let reply = self
            .inner
            .comm
            .send_wait(Some(&Request::ReadEeprom(request)), Some(expected))
            .await?;
        match reply.map(|m| m.body) {
            Some(Body::ReadEepromResponse(data)) => Ok(data),
            other => Err(ParadoxError::parse(format!(
                "unexpected reply to read of {:#x}: {:?}",
                request.address, other
            ))),
        }
    }

    async fn read_with_retries(&self, request: ReadEeprom) -> Result<EepromData> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.read_memory(request).await {
                Err(e) if e.is_retryable() && attempt < LABEL_READ_ATTEMPTS => {
                    warn!("Read of {:#x} failed (attempt {}): {}", request.address, attempt, e);
                }
                result => return result,
            }
        }
    }

    async fn load_memory(&self) -> Result<()> {
        self.inner.storage.write().await.clear();
        self.load_labels().await?;
        self.load_definitions().await?;
        Ok(())
    }

    /// Read every label region allowed by `LIMITS` into storage.
    async fn load_labels(&self) -> Result<()> {
        let panel = self.panel();
        let encoding = self.inner.config.label_encoding;
        info!("Loading labels");
        for region in panel.label_regions() {
            let ids = self.inner.limits.ids(region.ty, region.count);
            let mut labels = Vec::with_capacity(ids.len());
            let mut unread = Vec::new();
            for id in ids {
                match self.read_with_retries(panel.label_request(&region, id)).await {
                    Ok(reply) => labels.push((id, panel.decode_label(&region, &reply, encoding))),
                    Err(e) => {
                        warn!("Could not read label of {} {}: {}", region.ty, id, e);
                        unread.push(id);
                    }
                }
            }
            let mut storage = self.inner.storage.write().await;
            // Unread elements keep their current label, or get the default one.
            labels.extend(
                unread
                    .into_iter()
                    .filter(|id| storage.get(region.ty, *id).is_none())
                    .map(|id| (id, String::new())),
            );
            if !labels.is_empty() {
                storage.set_labels(region.ty, labels);
            }
        }
        let labels = self.inner.storage.read().await.labels_snapshot();
        self.publish(BusMessage::LabelsLoaded(labels));
        Ok(())
    }

    /// Read element definitions; disabled elements are dropped from storage.
    async fn load_definitions(&self) -> Result<()> {
        let panel = self.panel();
        let requests = panel.definition_requests();
        if requests.is_empty() {
            return Ok(());
        }
        let mut definitions = Map::new();
        for request in requests {
            let reply = match self.read_with_retries(request).await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!("Could not read definitions at {:#x}: {}", request.address, e);
                    continue;
                }
            };
            if let Some(parsed) = panel.parse_definitions(&reply) {
                deep_merge(&mut definitions, parsed);
            }
        }

        {
            let mut storage = self.inner.storage.write().await;
            for (type_name, per_id) in &definitions {
                let (Ok(ty), Value::Object(per_id)) = (type_name.parse::<ElementType>(), per_id) else {
                    continue;
                };
                for (id, attrs) in per_id {
                    let (Ok(id), Value::Object(attrs)) = (id.parse::<u32>(), attrs) else {
                        continue;
                    };
                    if storage.get(ty, id).is_none() {
                        continue;
                    }
                    if attrs.get("enabled").and_then(Value::as_bool) == Some(false) {
                        debug!("{} {} is disabled, removing", ty, id);
                        storage.remove(ty, id);
                        continue;
                    }
                    let attrs: Map<String, Value> = attrs
                        .iter()
                        .filter(|(k, _)| k.as_str() != "enabled")
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect();
                    // Definitions are part of the baseline, not runtime changes.
                    storage.update_container_object(ty, id, attrs);
                }
            }
        }
        self.publish(BusMessage::DefinitionsLoaded(Value::Object(definitions)));
        Ok(())
    }

    // ----------------------------------------------------------------
    // Unsolicited messages
    // ----------------------------------------------------------------

    async fn start_handlers(&self) {
        self.stop_handlers().await;
        let registry = self.inner.comm.registry();
        let mut handlers = self.inner.handlers.lock().await;

        let (id, mut events) = registry.register_persistent("live_events", Message::is_live_event).await;
        let weak = Arc::downgrade(&self.inner);
        let task = tokio::spawn(async move {
            while let Some(message) = events.recv().await {
                let Some(paradox) = Paradox::upgrade(&weak) else { break };
                if let Body::LiveEvent(raw) = &message.body {
                    paradox.handle_live_event(raw).await;
                }
            }
        });
        handlers.push((id, task));

        let (id, mut errors) = registry.register_persistent("errors", Message::is_error).await;
        let weak = Arc::downgrade(&self.inner);
        let task = tokio::spawn(async move {
            while let Some(message) = errors.recv().await {
                let Some(paradox) = Paradox::upgrade(&weak) else { break };
                if let Body::Error { code } = message.body {
                    paradox.handle_error(code).await;
                }
            }
        });
        handlers.push((id, task));
    }

    async fn stop_handlers(&self) {
        let registry = self.inner.comm.registry();
        let handlers: Vec<_> = self.inner.handlers.lock().await.drain(..).collect();
        for (id, task) in handlers {
            registry.remove(id).await;
            task.abort();
        }
    }

    async fn handle_live_event(&self, raw: &RawEvent) {
        let panel = self.panel();
        let event = {
            let storage = self.inner.storage.read().await;
            let provider: LabelProvider<'_> = &|ty: ElementType, id: u32| storage.get(ty, id).map(|e| e.label.clone());
            live_event::resolve(panel.event_map(), raw, self.inner.config.label_encoding, Some(provider)).map(
                |mut event| {
                    let key = event
                        .id
                        .and_then(|id| storage.get(event.element_type, id))
                        .map(|e| e.key.clone());
                    event.key = key;
                    event
                },
            )
        };
        let Some(event) = event else {
            return;
        };
        if self.inner.config.logging_dump_events {
            debug!("Live event: {:?}", event);
        }
        info!("{}", event);

        if let (false, Some(id)) = (event.change.is_empty(), event.id) {
            let changes = {
                let mut storage = self.inner.storage.write().await;
                if storage.get(event.element_type, id).is_some() {
                    let mut changes = storage.update_container_object(event.element_type, id, event.change.clone());
                    if event.element_type == ElementType::Partition {
                        changes.extend(status::refresh_partition_states(&mut storage));
                    }
                    changes
                } else {
                    Vec::new()
                }
            };
            self.publish_changes(changes).await;
        }
        self.publish(BusMessage::Event(event));
    }

    async fn handle_error(&self, code: u8) {
        match PanelErrorCode::from_code(code) {
            Some(PanelErrorCode::PanelNotConnected) => {
                warn!("Panel reports the session is not connected, disconnecting");
                self.inner.comm.disconnect().await;
                self.request_status_refresh();
            }
            Some(code) => warn!("Panel error: {}", code),
            None => warn!("Unknown panel error 0x{:02x}", code),
        }
    }

    // ----------------------------------------------------------------
    // Commands
    // ----------------------------------------------------------------

    fn ensure_running(&self) -> Result<()> {
        match self.run_state() {
            RunState::Run => Ok(()),
            state => {
                warn!("Command rejected, session is {}", state);
                Err(ParadoxError::NotRunning {
                    state: state.to_string(),
                })
            }
        }
    }

    async fn select(&self, ty: ElementType, selector: Selector) -> Vec<u32> {
        let ids = self
            .inner
            .storage
            .read()
            .await
            .select(ty, &selector, &self.inner.limits);
        if ids.is_empty() {
            warn!("No {} matches {:?}", ty, selector);
        }
        ids
    }

    /// Send the requests one by one, then ask for a status refresh.
    ///
    /// An unsupported command yields `Ok(false)`.
    async fn execute(&self, requests: Result<Vec<Request>>) -> Result<bool> {
        let requests = match requests {
            Ok(requests) => requests,
            Err(e @ ParadoxError::Mapping { .. }) => {
                warn!("{}", e);
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        let result = async {
            let _busy = self.inner.busy.lock().await;
            for request in &requests {
                let reply = self.inner.comm.request(request).await?;
                debug!("{} answered by {}", request.name(), reply.name());
            }
            Ok(true)
        }
        .await;
        self.request_status_refresh();
        result
    }

    /// `bypass`, `clear_bypass` or `clear_alarm_memory` on the selected zones.
    pub async fn control_zone(&self, selector: impl Into<Selector>, command: &str) -> Result<bool> {
        self.ensure_running()?;
        let Some(command) = parse_command::<ZoneCommand>(command) else {
            return Ok(false);
        };
        let panel = self.panel();
        let mut ids = self.select(ElementType::Zone, selector.into()).await;
        if ids.is_empty() {
            return Ok(false);
        }
        // Spectra/Magellan bypass toggles, so only zones not yet in the target state are sent.
        if let (Panel::SpecMag(_), Some(target)) = (panel, command.target_bypass()) {
            let storage = self.inner.storage.read().await;
            ids.retain(|id| {
                storage
                    .get(ElementType::Zone, *id)
                    .is_some_and(|zone| zone.get_bool("bypassed") != target)
            });
            if ids.is_empty() {
                debug!("Zones already {}", command.as_str());
                return Ok(true);
            }
        }
        info!("Zone {} on {:?}", command.as_str(), ids);
        self.execute(panel.zone_requests(&ids, command)).await
    }

    /// Arm or disarm the selected partitions.
    pub async fn control_partition(&self, selector: impl Into<Selector>, command: &str) -> Result<bool> {
        self.ensure_running()?;
        let Some(command) = parse_command::<PartitionCommand>(command) else {
            return Ok(false);
        };
        let ids = self.select(ElementType::Partition, selector.into()).await;
        if ids.is_empty() {
            return Ok(false);
        }
        info!("Partition {} on {:?}", command.as_str(), ids);
        self.execute(self.panel().partition_requests(&ids, command)).await
    }

    /// Switch the selected PGM outputs; `pulse` is on, wait, off.
    pub async fn control_output(&self, selector: impl Into<Selector>, command: &str) -> Result<bool> {
        self.ensure_running()?;
        let Some(command) = parse_command::<PgmCommand>(command) else {
            return Ok(false);
        };
        let panel = self.panel();
        let ids = self.select(ElementType::Pgm, selector.into()).await;
        if ids.is_empty() {
            return Ok(false);
        }
        info!("Output {} on {:?}", command.as_str(), ids);
        if command != PgmCommand::Pulse {
            return self.execute(panel.pgm_requests(&ids, command)).await;
        }
        if !self.execute(panel.pgm_requests(&ids, PgmCommand::On)).await? {
            return Ok(false);
        }
        sleep(self.inner.config.output_pulse_duration()).await;
        self.execute(panel.pgm_requests(&ids, PgmCommand::Off)).await
    }

    /// Lock or unlock the selected doors (EVO only).
    pub async fn control_door(&self, selector: impl Into<Selector>, command: &str) -> Result<bool> {
        self.ensure_running()?;
        let Some(command) = parse_command::<DoorCommand>(command) else {
            return Ok(false);
        };
        let ids = self.select(ElementType::Door, selector.into()).await;
        if ids.is_empty() {
            return Ok(false);
        }
        info!("Door {} on {:?}", command.as_str(), ids);
        self.execute(self.panel().door_requests(&ids, command)).await
    }

    /// Raise a panic alarm in the selected partitions (EVO only).
    pub async fn send_panic(&self, selector: impl Into<Selector>, panic_type: &str, user_id: u16) -> Result<bool> {
        self.ensure_running()?;
        let Some(panic_type) = parse_command::<PanicType>(panic_type) else {
            return Ok(false);
        };
        let ids = self.select(ElementType::Partition, selector.into()).await;
        if ids.is_empty() {
            return Ok(false);
        }
        warn!("Sending {:?} panic to partitions {:?} as user {}", panic_type, ids, user_id);
        let request = self.panel().panic_request(&ids, panic_type, user_id);
        self.execute(request.map(|r| vec![r])).await
    }

    // ----------------------------------------------------------------
    // Pass-through
    // ----------------------------------------------------------------

    /// Receive every raw inbound frame until [`remove_handler`](Paradox::remove_handler).
    pub async fn register_raw_handler(&self) -> (HandlerId, mpsc::UnboundedReceiver<Vec<u8>>) {
        self.inner.comm.registry().register_raw().await
    }

    pub async fn remove_handler(&self, id: HandlerId) {
        self.inner.comm.registry().remove(id).await;
    }

    /// Write raw bytes to the panel without waiting for a reply.
    pub async fn write_raw(&self, bytes: &[u8]) -> Result<()> {
        self.inner.comm.write_raw(bytes).await
    }
}

fn parse_command<C: FromStr<Err = ParadoxError>>(command: &str) -> Option<C> {
    match command.parse() {
        Ok(command) => Some(command),
        Err(e) => {
            warn!("{}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ProductId;
    use crate::event::EventKind;
    use crate::family::Direction;
    use serde_json::json;

    fn unhex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    fn drain(bus: &mut BusReceiver) -> Vec<BusMessage> {
        let mut out = Vec::new();
        while let Ok(message) = bus.try_recv() {
            out.push(message);
        }
        out
    }

    async fn with_partitions() -> Paradox {
        let paradox = Paradox::new(Config::default()).unwrap();
        paradox.inner.comm.set_panel(Panel::SpecMag(ProductId::Sp6000));
        paradox.inner.storage.write().await.set_labels(
            ElementType::Partition,
            [(1, "Ground floor".to_string()), (2, "Upstairs".to_string())],
        );
        paradox
    }

    #[tokio::test]
    async fn test_commands_need_running_session() {
        let paradox = Paradox::new(Config::default()).unwrap();
        assert_eq!(paradox.run_state(), RunState::Stop);
        let err = paradox.control_partition("1", "arm").await.unwrap_err();
        assert!(matches!(err, ParadoxError::NotRunning { .. }));
        assert!(matches!(paradox.resume().await, Err(ParadoxError::NotRunning { .. })));
        assert!(matches!(paradox.pause().await, Err(ParadoxError::NotRunning { .. })));
    }

    #[tokio::test]
    async fn test_unknown_command_is_rejected_without_sending() {
        let paradox = with_partitions().await;
        paradox.set_run_state(RunState::Run);
        assert!(!paradox.control_partition("1", "explode").await.unwrap());
        assert!(!paradox.control_partition("Cellar", "arm").await.unwrap());
    }

    #[tokio::test]
    async fn test_status_changes_then_events_then_update() {
        let paradox = with_partitions().await;
        let mut bus = paradox.subscribe();

        let idle = json!({"partition_status": {"1": {"arm": false}, "2": {"arm": false}}});
        paradox.apply_status(idle.as_object().cloned().unwrap()).await;
        drain(&mut bus);

        let arming = json!({"partition_status": {"1": {"arm": true, "exit_delay": true}}});
        paradox.apply_status(arming.as_object().cloned().unwrap()).await;
        let messages = drain(&mut bus);

        let position = |pred: &dyn Fn(&BusMessage) -> bool| messages.iter().position(pred).unwrap();
        let change = position(&|m| {
            matches!(m, BusMessage::Change(c) if c.key == "Ground_floor" && c.property == "current_state" && c.new_value == json!("arming"))
        });
        let event = position(&|m| {
            matches!(m, BusMessage::Event(e) if e.kind == EventKind::Change && e.message == "Partition Ground floor is arming")
        });
        let update = position(&|m| matches!(m, BusMessage::StatusUpdate(_)));
        assert!(change < event && event < update);

        let partition = paradox.element(ElementType::Partition, "1").await.unwrap();
        assert_eq!(partition.get("target_state"), Some(&json!("armed_away")));

        // Same status again: nothing changes.
        paradox.apply_status(arming.as_object().cloned().unwrap()).await;
        let messages = drain(&mut bus);
        assert!(messages.iter().all(|m| !matches!(m, BusMessage::Change(_))));
        assert!(matches!(messages.last(), Some(BusMessage::StatusUpdate(_))));
    }

    #[tokio::test]
    async fn test_status_dump_does_not_disturb_projection() {
        let config = Config {
            logging_dump_status: true,
            ..Config::default()
        };
        let paradox = Paradox::new(config).unwrap();
        paradox
            .inner
            .storage
            .write()
            .await
            .set_labels(ElementType::Partition, [(1, "Ground floor".to_string())]);
        let status = json!({"partition_status": {"1": {"arm": true, "arm_stay": true}}});
        paradox.apply_status(status.as_object().cloned().unwrap()).await;
        let partition = paradox.element(ElementType::Partition, "1").await.unwrap();
        assert_eq!(partition.get("current_state"), Some(&json!("armed_home")));
    }

    #[tokio::test]
    async fn test_live_event_applies_change_and_publishes() {
        let paradox = Paradox::new(Config::default()).unwrap();
        paradox.inner.comm.set_panel(Panel::Evo192);
        paradox
            .inner
            .storage
            .write()
            .await
            .set_labels(ElementType::Zone, [(1, "Office".to_string())]);
        let mut bus = paradox.subscribe();

        let frame = unhex("e2ff1cc414130b010f2c1801030000000000024f66666963652020202020202020202000d9");
        let message = Panel::Evo192.parse_message(&frame, Direction::FromPanel).unwrap();
        let Body::LiveEvent(raw) = message.body else {
            panic!("expected a live event");
        };
        paradox.handle_live_event(&raw).await;

        let zone = paradox.element(ElementType::Zone, "Office").await.unwrap();
        assert!(zone.get_bool("presently_in_alarm"));

        let messages = drain(&mut bus);
        assert!(messages.iter().any(|m| {
            matches!(m, BusMessage::Change(c) if c.property == "presently_in_alarm" && c.new_value == json!(true))
        }));
        let Some(BusMessage::Event(event)) = messages.last() else {
            panic!("live event must be published last");
        };
        assert_eq!(event.kind, EventKind::Live);
        assert_eq!(event.message, "Zone Office in alarm");
        assert_eq!(event.key.as_deref(), Some("Office"));
        assert!(event.has_tag("alarm"));
    }

    #[tokio::test]
    async fn test_run_state_transitions_are_published_once() {
        let paradox = Paradox::new(Config::default()).unwrap();
        let mut bus = paradox.subscribe();
        paradox.set_run_state(RunState::Init);
        paradox.set_run_state(RunState::Init);
        paradox.set_run_state(RunState::Error);
        let states: Vec<RunState> = drain(&mut bus)
            .into_iter()
            .filter_map(|m| match m {
                BusMessage::RunState(s) => Some(s),
                _ => None,
            })
            .collect();
        assert_eq!(states, vec![RunState::Init, RunState::Error]);
    }

    #[tokio::test]
    async fn test_connect_failure_ends_in_error_state() {
        let config = Config::builder().ip("127.0.0.1", 1).bare(true).build();
        let paradox = Paradox::new(config).unwrap();
        let err = paradox.connect().await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(paradox.run_state(), RunState::Error);
    }
}
