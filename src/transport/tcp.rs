// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// TCP links: bare serial tunnel and the IP-module envelope handshake

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tokio_util::codec::Framed;
use tracing::{debug, info};

use crate::config::Config;
use crate::constants::ip::{
    COMMAND_CONNECT, COMMAND_KEEP_ALIVE, COMMAND_TOGGLE_KEEP_ALIVE, COMMAND_UPLOAD_DOWNLOAD_CONNECTION,
    TOGGLE_KEEP_ALIVE_PAYLOAD,
};
use crate::error::{ParadoxError, Result};
use crate::protocol::ip::ConnectResponse;
use crate::protocol::{IpCodec, IpMessage, SerialFrameCodec, SessionKey};

use super::rendezvous::{spawn_refresh, SiteRendezvous};
use super::{spawn_ip_stream, spawn_serial_stream, Connection, Inbound, LinkState};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// IP-module handshake replies can be slow on older firmware.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

async fn connect_tcp(host: &str, port: u16) -> Result<TcpStream> {
    let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port)))
        .await
        .map_err(|_| ParadoxError::TransportUnavailable {
            reason: format!("connect to {}:{} timed out", host, port),
        })?
        .map_err(|e| ParadoxError::TransportUnavailable {
            reason: format!("{}:{}: {}", host, port, e),
        })?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Serial frames over plain TCP, no envelope.
pub async fn open_bare(config: &Config) -> Result<(Connection, Inbound)> {
    let stream = connect_tcp(&config.ip_connection_host, config.ip_connection_port).await?;
    let codec = SerialFrameCodec::new().with_packet_dump(config.logging_dump_packets);
    let state = LinkState::new();
    let (tasks, outbound, inbound) = spawn_serial_stream(Framed::new(stream, codec), state.clone());
    let description = format!(
        "bare TCP {}:{}",
        config.ip_connection_host, config.ip_connection_port
    );
    Ok((Connection::from_parts(description, outbound, state, tasks), inbound))
}

/// Local IP module: TCP, handshake, then encrypted pass-through.
pub async fn open_ip_module(config: &Config) -> Result<(Connection, Inbound)> {
    let stream = connect_tcp(&config.ip_connection_host, config.ip_connection_port).await?;
    let description = format!(
        "IP module {}:{}",
        config.ip_connection_host, config.ip_connection_port
    );
    let framed = handshake(stream, &config.ip_connection_password, config.logging_dump_packets).await?;
    let state = LinkState::new();
    let (tasks, outbound, inbound) = spawn_ip_stream(framed, state.clone(), config.logging_dump_packets);
    Ok((Connection::from_parts(description, outbound, state, tasks), inbound))
}

/// Remote panel through the site broker, then as a local IP module.
pub async fn open_site(config: &Config, rendezvous: Arc<dyn SiteRendezvous>) -> Result<(Connection, Inbound)> {
    let site_id = config.ip_connection_siteid.as_deref().unwrap_or_default();
    let email = config.ip_connection_email.as_deref().unwrap_or_default();
    let info = rendezvous.site_info(site_id, email).await?;
    let module = info
        .select_module(config.ip_connection_panel_serial.as_deref())?
        .clone();
    info!("Site {}: using module for panel {} via {}", site_id, module.panel_serial, module.xoraddr);

    let stream = rendezvous.connect(&module).await?;
    let framed = handshake(stream, &config.ip_connection_password, config.logging_dump_packets).await?;
    let state = LinkState::new();
    let (mut tasks, outbound, inbound) = spawn_ip_stream(framed, state.clone(), config.logging_dump_packets);
    tasks.push(spawn_refresh(rendezvous, config.stun_refresh_interval(), state.clone()));
    let description = format!("site {} panel {}", site_id, module.panel_serial);
    Ok((Connection::from_parts(description, outbound, state, tasks), inbound))
}

async fn exchange<S>(
    framed: &mut Framed<S, IpCodec>,
    request: IpMessage,
    step: &'static str,
) -> Result<IpMessage>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    framed.send(request).await?;
    match timeout(HANDSHAKE_TIMEOUT, framed.next()).await {
        Ok(Some(reply)) => reply,
        Ok(None) => Err(ParadoxError::ConnectToIpModuleFailed {
            reason: format!("connection closed during {}", step),
        }),
        Err(_) => Err(ParadoxError::HandshakeTimeout { step }),
    }
}

/// Run the IP-module login and return the stream keyed with the session key.
///
/// `connect` is encrypted with the password; the module answers with the
/// session key used from then on, followed by the keep-alive setup exchange.
pub async fn handshake<S>(stream: S, password: &str, dump_packets: bool) -> Result<Framed<S, IpCodec>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let key = SessionKey::new(password.as_bytes());
    let mut framed = Framed::new(stream, IpCodec::new(key.clone()).with_packet_dump(dump_packets));

    let reply = exchange(&mut framed, IpMessage::request(COMMAND_CONNECT, password.as_bytes()), "connect").await?;
    let response = ConnectResponse::parse(&reply.payload)?;
    response.check()?;
    key.set(response.key);
    info!(
        "IP module v{}.{} (hw {:#06x}) accepted login",
        response.ip_firmware_major, response.ip_firmware_minor, response.hardware_version
    );

    exchange(&mut framed, IpMessage::request(COMMAND_KEEP_ALIVE, vec![0u8; 4]), "keep_alive").await?;
    exchange(
        &mut framed,
        IpMessage::request(COMMAND_UPLOAD_DOWNLOAD_CONNECTION, Vec::new()),
        "upload_download_connection",
    )
    .await?;
    exchange(
        &mut framed,
        IpMessage::request(COMMAND_TOGGLE_KEEP_ALIVE, TOGGLE_KEEP_ALIVE_PAYLOAD.to_vec()),
        "toggle_keep_alive",
    )
    .await?;
    debug!("IP module session ready");
    Ok(framed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ip::{LoginStatus, MessageType};

    fn response(command: u8, payload: Vec<u8>) -> IpMessage {
        IpMessage::request(command, payload).with_message_type(MessageType::IpResponse)
    }

    fn connect_reply(status: LoginStatus) -> IpMessage {
        let payload = ConnectResponse {
            login_status: status,
            key: *b"0123456789abcdef",
            hardware_version: 0x0102,
            ip_firmware_major: 4,
            ip_firmware_minor: 40,
            ip_module_serial: [0x71, 0x00, 0x00, 0x01],
        };
        response(COMMAND_CONNECT, payload.to_bytes())
    }

    /// Plays the module side: answers each request in turn.
    async fn module(stream: tokio::io::DuplexStream, status: LoginStatus) {
        let key = SessionKey::new(&b"paradox"[..]);
        let mut framed = Framed::new(stream, IpCodec::new(key.clone()));
        let Some(Ok(connect)) = framed.next().await else { return };
        assert_eq!(connect.command, COMMAND_CONNECT);
        assert_eq!(connect.payload, b"paradox");
        framed.send(connect_reply(status)).await.unwrap();
        if status != LoginStatus::Success {
            return;
        }
        key.set(&b"0123456789abcdef"[..]);
        for expected in [COMMAND_KEEP_ALIVE, COMMAND_UPLOAD_DOWNLOAD_CONNECTION, COMMAND_TOGGLE_KEEP_ALIVE] {
            let Some(Ok(request)) = framed.next().await else { return };
            assert_eq!(request.command, expected);
            framed.send(response(expected, vec![0x00])).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_handshake_adopts_session_key() {
        let (client, server) = tokio::io::duplex(4096);
        let server = tokio::spawn(module(server, LoginStatus::Success));
        let framed = handshake(client, "paradox", false).await.unwrap();
        assert_eq!(framed.codec().key().get(), b"0123456789abcdef".to_vec());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_handshake_rejects_bad_password() {
        let (client, server) = tokio::io::duplex(4096);
        let server = tokio::spawn(module(server, LoginStatus::InvalidPassword));
        let err = handshake(client, "paradox", false).await.err().unwrap();
        assert!(matches!(err, ParadoxError::InvalidIpPassword));
        assert!(err.is_fatal());
        server.await.unwrap();
    }
}
