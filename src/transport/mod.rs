// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// Panel links: serial port, bare TCP, local IP module and remote site

pub mod rendezvous;
pub mod serial;
pub mod tcp;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tokio_util::codec::{Decoder, Framed};
use tracing::{debug, error, info, trace, warn};

use crate::config::{Config, ConnectionType};
use crate::constants::CONNECT_RETRIES;
use crate::error::{ParadoxError, Result};
use crate::protocol::ip::MessageType;
use crate::protocol::{IpCodec, IpMessage, SerialFrameCodec};

pub use rendezvous::{SiteInfo, SiteModule, SiteRendezvous};

/// Deframed serial frames coming from the panel.
pub type Inbound = mpsc::Receiver<Bytes>;

const CHANNEL_DEPTH: usize = 64;
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// State shared by a link's tasks.
#[derive(Debug, Clone)]
pub(crate) struct LinkState {
    pub connected: Arc<AtomicBool>,
    pub shutdown: Arc<Notify>,
}

impl LinkState {
    pub(crate) fn new() -> Self {
        Self {
            connected: Arc::new(AtomicBool::new(true)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn lost(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

/// An open link to the panel carrying serial frames in both directions.
///
/// Whatever the medium, callers write whole serial frames and read deframed
/// serial frames from the [`Inbound`] receiver returned by [`Connection::open`].
/// The receiver closes when the link is lost.
pub struct Connection {
    description: String,
    outbound: mpsc::Sender<Vec<u8>>,
    state: LinkState,
    tasks: Vec<JoinHandle<()>>,
}

impl Connection {
    /// Open the configured link, retrying transient failures.
    pub async fn open(config: &Config, rendezvous: Option<Arc<dyn SiteRendezvous>>) -> Result<(Self, Inbound)> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match Self::open_once(config, rendezvous.clone()).await {
                Ok(opened) => {
                    info!("Connected via {}", opened.0.description);
                    return Ok(opened);
                }
                Err(e) if e.is_fatal() || attempt >= CONNECT_RETRIES => {
                    error!("Connect attempt {}/{} failed: {}", attempt, CONNECT_RETRIES, e);
                    return Err(e);
                }
                Err(e) => {
                    error!("Connect attempt {}/{} failed: {}", attempt, CONNECT_RETRIES, e);
                    sleep(CONNECT_RETRY_DELAY * attempt).await;
                }
            }
        }
    }

    async fn open_once(config: &Config, rendezvous: Option<Arc<dyn SiteRendezvous>>) -> Result<(Self, Inbound)> {
        match config.connection_type {
            ConnectionType::Serial => serial::open(config),
            ConnectionType::Ip if config.uses_site_rendezvous() => {
                let rendezvous = rendezvous.ok_or_else(|| ParadoxError::Config {
                    reason: "IP_CONNECTION_SITEID is set but no site rendezvous client was supplied".into(),
                })?;
                tcp::open_site(config, rendezvous).await
            }
            ConnectionType::Ip if config.ip_connection_bare => tcp::open_bare(config).await,
            ConnectionType::Ip => tcp::open_ip_module(config).await,
        }
    }

    pub(crate) fn from_parts(
        description: String,
        outbound: mpsc::Sender<Vec<u8>>,
        state: LinkState,
        tasks: Vec<JoinHandle<()>>,
    ) -> Self {
        Self {
            description,
            outbound,
            state,
            tasks,
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }

    /// Queue one serial frame for the panel.
    pub async fn write(&self, frame: &[u8]) -> Result<()> {
        if !self.is_connected() {
            return Err(ParadoxError::NotConnected);
        }
        self.outbound
            .send(frame.to_vec())
            .await
            .map_err(|_| ParadoxError::NotConnected)
    }

    /// Stop the link tasks; the inbound receiver closes shortly after.
    pub fn close(&mut self) {
        if self.is_connected() {
            debug!("Closing {}", self.description);
        }
        self.state.lost();
        self.state.shutdown.notify_one();
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

/// Reader/writer tasks for a byte stream carrying plain serial frames.
pub(crate) fn spawn_serial_stream<S>(
    framed: Framed<S, SerialFrameCodec>,
    state: LinkState,
) -> (Vec<JoinHandle<()>>, mpsc::Sender<Vec<u8>>, Inbound)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut sink, mut stream) = framed.split();
    let (in_tx, in_rx) = mpsc::channel(CHANNEL_DEPTH);
    let (out_tx, mut out_rx) = mpsc::channel::<Vec<u8>>(CHANNEL_DEPTH);

    let reader_state = state.clone();
    let reader = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = reader_state.shutdown.notified() => break,
                item = stream.next() => match item {
                    Some(Ok(frame)) => {
                        if in_tx.send(frame).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        warn!("Link read failed: {}", e);
                        break;
                    }
                    None => {
                        debug!("Link closed by peer");
                        break;
                    }
                },
            }
        }
        reader_state.lost();
    });

    let writer = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if let Err(e) = sink.send(Bytes::from(frame)).await {
                error!("Link write failed: {}", e);
                state.lost();
                state.shutdown.notify_one();
                break;
            }
        }
    });

    (vec![reader, writer], out_tx, in_rx)
}

/// Reader/writer tasks for an IP-module stream; frames travel as pass-through envelopes.
pub(crate) fn spawn_ip_stream<S>(
    framed: Framed<S, IpCodec>,
    state: LinkState,
    dump_packets: bool,
) -> (Vec<JoinHandle<()>>, mpsc::Sender<Vec<u8>>, Inbound)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut sink, mut stream) = framed.split();
    let (in_tx, in_rx) = mpsc::channel(CHANNEL_DEPTH);
    let (out_tx, mut out_rx) = mpsc::channel::<Vec<u8>>(CHANNEL_DEPTH);

    let reader_state = state.clone();
    let reader = tokio::spawn(async move {
        let mut deframer = SerialFrameCodec::new().with_packet_dump(dump_packets);
        let mut buf = BytesMut::new();
        loop {
            let message = tokio::select! {
                _ = reader_state.shutdown.notified() => break,
                item = stream.next() => match item {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        warn!("IP link read failed: {}", e);
                        break;
                    }
                    None => {
                        debug!("IP link closed by peer");
                        break;
                    }
                },
            };
            if message.message_type != MessageType::SerialPassthroughResponse {
                trace!("Ignoring IP message type {:?} command 0x{:02x}", message.message_type, message.command);
                continue;
            }
            buf.extend_from_slice(&message.payload);
            let mut closed = false;
            while let Ok(Some(frame)) = deframer.decode(&mut buf) {
                if in_tx.send(frame).await.is_err() {
                    closed = true;
                    break;
                }
            }
            if closed {
                break;
            }
        }
        reader_state.lost();
    });

    let writer = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if let Err(e) = sink.send(IpMessage::passthrough(frame)).await {
                error!("IP link write failed: {}", e);
                state.lost();
                state.shutdown.notify_one();
                break;
            }
        }
    });

    (vec![reader, writer], out_tx, in_rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::with_checksum;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn frame(first: u8) -> Vec<u8> {
        let mut body = vec![0u8; 36];
        body[0] = first;
        with_checksum(body)
    }

    #[tokio::test]
    async fn test_serial_stream_roundtrip() {
        let (client, mut panel) = tokio::io::duplex(1024);
        let state = LinkState::new();
        let (tasks, outbound, mut inbound) =
            spawn_serial_stream(Framed::new(client, SerialFrameCodec::new()), state.clone());
        let mut connection = Connection::from_parts("duplex".into(), outbound, state, tasks);

        connection.write(&frame(0x72)).await.unwrap();
        let mut received = vec![0u8; 37];
        panel.read_exact(&mut received).await.unwrap();
        assert_eq!(received, frame(0x72));

        // Leading garbage is skipped by the deframer.
        let mut reply = vec![0x99, 0x01];
        reply.extend(frame(0x42));
        panel.write_all(&reply).await.unwrap();
        assert_eq!(inbound.recv().await.unwrap().to_vec(), frame(0x42));

        connection.close();
        assert!(!connection.is_connected());
        assert!(matches!(connection.write(&frame(0x72)).await, Err(ParadoxError::NotConnected)));
    }

    #[tokio::test]
    async fn test_peer_close_marks_link_lost() {
        let (client, panel) = tokio::io::duplex(64);
        let state = LinkState::new();
        let (tasks, outbound, mut inbound) =
            spawn_serial_stream(Framed::new(client, SerialFrameCodec::new()), state.clone());
        let connection = Connection::from_parts("duplex".into(), outbound, state, tasks);
        drop(panel);
        assert!(inbound.recv().await.is_none());
        assert!(!connection.is_connected());
    }
}
