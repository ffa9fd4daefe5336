// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// Connection ownership, inbound dispatch and request/response serialization

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, trace, warn};

use crate::config::Config;
use crate::error::{PanelErrorCode, ParadoxError, Result};
use crate::event::PanelInfo;
use crate::family::common::SOURCE_ID;
use crate::family::{Body, Direction, InitiateResponse, Message, Panel, Request, StartCommunicationResponse};
use crate::handler::{HandlerRegistry, ReplyExpected};
use crate::protocol::frame::hex;
use crate::transport::{Connection, Inbound, SiteRendezvous};

/// Outcome of the panel login.
#[derive(Debug, Clone)]
pub struct Handshake {
    pub panel: Panel,
    pub info: PanelInfo,
    pub initiate: Option<InitiateResponse>,
    pub start: StartCommunicationResponse,
}

/// Owns the panel link and serializes every request/response exchange.
///
/// A single dispatcher task decodes inbound frames with the current
/// [`Panel`] codec and hands them to the [`HandlerRegistry`]. Callers go
/// through [`CommCore::send_wait`], which holds the request lock from the
/// write until the matching reply (or the final timeout).
pub struct CommCore {
    config: Config,
    connection: Mutex<Option<Connection>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    panel: watch::Sender<Panel>,
    registry: HandlerRegistry,
    request_lock: Mutex<()>,
    connected: Arc<AtomicBool>,
    connection_lost: Arc<Notify>,
}

impl CommCore {
    pub fn new(config: Config) -> Self {
        let (panel, _) = watch::channel(Panel::Generic);
        Self {
            config,
            connection: Mutex::new(None),
            dispatcher: Mutex::new(None),
            panel,
            registry: HandlerRegistry::new(),
            request_lock: Mutex::new(()),
            connected: Arc::new(AtomicBool::new(false)),
            connection_lost: Arc::new(Notify::new()),
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn panel(&self) -> Panel {
        *self.panel.borrow()
    }

    pub fn set_panel(&self, panel: Panel) {
        if self.panel.send_replace(panel) != panel {
            debug!("Codec switched to {}", panel);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Resolves once the link drops after [`CommCore::connect`].
    pub async fn connection_lost(&self) {
        self.connection_lost.notified().await;
    }

    /// Open the configured link and start dispatching inbound frames.
    pub async fn connect(&self, rendezvous: Option<Arc<dyn SiteRendezvous>>) -> Result<()> {
        self.close().await;
        let (connection, inbound) = Connection::open(&self.config, rendezvous).await?;
        self.attach(connection, inbound).await;
        Ok(())
    }

    pub(crate) async fn attach(&self, connection: Connection, inbound: Inbound) {
        self.set_panel(Panel::Generic);
        *self.connection.lock().await = Some(connection);
        self.connected.store(true, Ordering::SeqCst);
        let task = spawn_dispatcher(
            inbound,
            self.registry.clone(),
            self.panel.subscribe(),
            self.connected.clone(),
            self.connection_lost.clone(),
            self.config.logging_dump_messages,
        );
        if let Some(previous) = self.dispatcher.lock().await.replace(task) {
            previous.abort();
        }
    }

    /// Send `CloseConnection` (best effort) and drop the link.
    pub async fn disconnect(&self) {
        if self.is_connected() && self.panel() != Panel::Generic {
            if let Err(e) = self.send_wait(Some(&Request::CloseConnection), None).await {
                debug!("CloseConnection not sent: {}", e);
            }
        }
        self.close().await;
    }

    async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(mut connection) = self.connection.lock().await.take() {
            info!("Closing {}", connection.description());
            connection.close();
        }
        if let Some(task) = self.dispatcher.lock().await.take() {
            task.abort();
        }
        self.registry.cancel_pending().await;
    }

    /// Write raw bytes to the panel, bypassing the request lock.
    pub async fn write_raw(&self, bytes: &[u8]) -> Result<()> {
        match self.connection.lock().await.as_ref() {
            Some(connection) => connection.write(bytes).await,
            None => Err(ParadoxError::NotConnected),
        }
    }

    /// Send `request` (if any) and wait for a reply matching `expected` (if any).
    ///
    /// Timeouts are retried with the same frame up to `IO_RETRIES` times. A
    /// panel error message answering the request is returned as an error.
    pub async fn send_wait(&self, request: Option<&Request>, expected: Option<ReplyExpected>) -> Result<Option<Message>> {
        let _guard = self.request_lock.lock().await;
        let frame = request.map(|r| self.panel().build(r)).transpose()?;
        let name = request.map(Request::name).unwrap_or("wait");
        if self.config.logging_dump_messages {
            if let Some(request) = request {
                debug!("PC -> A {:?}", request);
            }
        }

        let attempts = self.config.io_retries.max(1);
        for attempt in 1..=attempts {
            let pending = match &expected {
                Some(expected) => Some(self.registry.register_future(expected.clone()).await),
                None => None,
            };
            if let Some(frame) = &frame {
                if let Err(e) = self.write_raw(frame).await {
                    if let Some((id, _)) = pending {
                        self.registry.remove(id).await;
                    }
                    return Err(e);
                }
            }
            let Some((id, rx)) = pending else {
                return Ok(None);
            };
            match timeout(self.config.io_timeout(), rx).await {
                Ok(Ok(reply)) => return reply_or_error(reply).map(Some),
                Ok(Err(_)) => return Err(ParadoxError::NotConnected),
                Err(_) => {
                    self.registry.remove(id).await;
                    if frame.is_none() {
                        break;
                    }
                    debug!("{} timed out (attempt {}/{})", name, attempt, attempts);
                }
            }
        }
        Err(ParadoxError::Timeout {
            request: name.to_string(),
        })
    }

    /// Send a request and require a reply.
    pub async fn request(&self, request: &Request) -> Result<Message> {
        let expected = request
            .reply_commands()
            .map(ReplyExpected::Commands)
            .ok_or_else(|| ParadoxError::mapping(request.name(), "reply"))?;
        self.send_wait(Some(request), Some(expected))
            .await?
            .ok_or(ParadoxError::ChannelClosed)
    }

    /// Wait for an unsolicited message without sending anything.
    pub async fn wait_for_message(&self, expected: ReplyExpected, wait: Duration) -> Result<Message> {
        self.registry.wait_until_complete(expected, wait).await
    }

    /// Initiate, start and initialize communication, selecting the family codec.
    pub async fn handshake(&self, password: Option<&str>) -> Result<Handshake> {
        self.set_panel(Panel::Generic);

        let initiate = match self.handshake_step(&Request::InitiateCommunication, "InitiateCommunication").await? {
            Body::InitiateResponse(initiate) => Some(initiate),
            other => {
                warn!("Unexpected InitiateCommunication reply {:?}", other);
                None
            }
        };
        if let Some(initiate) = &initiate {
            debug!(
                "Panel application v{} serial {}",
                initiate.application,
                initiate.serial_hex()
            );
        }

        let start_request = Request::StartCommunication {
            source_id: SOURCE_ID,
            user_id: 0,
        };
        let start = match self.handshake_step(&start_request, "StartCommunication").await? {
            Body::StartCommunicationResponse(start) => start,
            _ => return Err(ParadoxError::PanelNotDetected),
        };
        let panel = Panel::from_product_id(start.product_id)?;
        info!("Found panel {} firmware {}", panel, start.firmware);
        self.set_panel(panel);

        let init = panel.initialize_request(&start, initiate.as_ref(), password)?;
        match self.handshake_step(&init, "InitializeCommunication").await? {
            Body::InitializeCommunicationResponse => info!("Authentication accepted"),
            Body::StartCommunicationResponse(_) => return Err(ParadoxError::AuthenticationFailed),
            other => {
                return Err(ParadoxError::parse(format!(
                    "unexpected InitializeCommunication reply {:?}",
                    other
                )))
            }
        }

        let info = PanelInfo {
            product_id: start.product_id,
            model: panel.name().to_string(),
            firmware: start.firmware.to_string(),
            serial_number: initiate.as_ref().map(|i| i.serial_hex()).unwrap_or_default(),
            panel_id: start.panel_id,
        };
        Ok(Handshake {
            panel,
            info,
            initiate,
            start,
        })
    }

    async fn handshake_step(&self, request: &Request, step: &'static str) -> Result<Body> {
        match self.request(request).await {
            Ok(reply) => Ok(reply.body),
            Err(ParadoxError::Timeout { .. }) => Err(ParadoxError::HandshakeTimeout { step }),
            Err(e) => Err(e),
        }
    }
}

/// Map a panel error reply onto the error taxonomy.
fn reply_or_error(reply: Message) -> Result<Message> {
    match reply.body {
        Body::Error { code } => match PanelErrorCode::from_code(code) {
            Some(code) => Err(code.into()),
            None => Err(ParadoxError::parse(format!("unknown panel error 0x{:02x}", code))),
        },
        _ => Ok(reply),
    }
}

fn spawn_dispatcher(
    mut inbound: Inbound,
    registry: HandlerRegistry,
    panel: watch::Receiver<Panel>,
    connected: Arc<AtomicBool>,
    connection_lost: Arc<Notify>,
    dump_messages: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = inbound.recv().await {
            registry.dispatch_raw(&frame).await;
            let codec = *panel.borrow();
            match codec.parse_message(&frame, Direction::FromPanel) {
                Some(message) => {
                    if dump_messages {
                        debug!("PC <- A {:?}", message);
                    }
                    registry.dispatch(&message).await;
                }
                None => trace!("Unparsed frame for {}: {}", codec, hex(&frame)),
            }
        }
        if connected.swap(false, Ordering::SeqCst) {
            error!("Connection to panel lost");
            registry.cancel_pending().await;
            connection_lost.notify_one();
        }
    })
}
