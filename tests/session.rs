// Session scenarios against an in-process fake panel on 127.0.0.1
//
// The Spectra fake speaks bare TCP (serial frames, no envelope); the IP-module
// fake answers the envelope login.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration};
use tokio_util::codec::Framed;

use paradox_bridge::constants::ip::COMMAND_CONNECT;
use paradox_bridge::family::{InitiateResponse, StartCommunicationResponse, Version};
use paradox_bridge::protocol::ip::{ConnectResponse, LoginStatus};
use paradox_bridge::protocol::{with_checksum, IpCodec, IpMessage, MessageType, SessionKey};
use paradox_bridge::{BusMessage, BusReceiver, Config, ElementType, EventKind, Paradox, ParadoxError, RunState};

const SP6000: u8 = 22;
const WAIT: Duration = Duration::from_secs(10);

fn blank(first: u8) -> Vec<u8> {
    let mut body = vec![0u8; 36];
    body[0] = first;
    body
}

fn label(text: &str) -> Vec<u8> {
    let mut data = vec![b' '; 32];
    data[..text.len()].copy_from_slice(text.as_bytes());
    data
}

/// State of the fake Spectra panel, shared with the test for assertions.
#[derive(Default)]
struct SpectraState {
    actions: Vec<Vec<u8>>,
    armed: bool,
    polls_since_arm: u32,
    /// Reads per wire address.
    reads: HashMap<u16, u32>,
    /// Replies still to be sent with a wrong address, per wire address.
    misaddressed: HashMap<u16, u32>,
}

fn initiate_reply() -> Vec<u8> {
    InitiateResponse {
        message_center: 2,
        protocol_id: 1,
        protocol: Version { version: 1, revision: 0, build: 0 },
        family_id: 0x21,
        product_id: SP6000,
        talker: 0,
        application: Version { version: 7, revision: 5, build: 12 },
        serial_number: [0x05, 0x01, 0x02, 0x03],
        hardware: (0, 0),
        bootloader: [0; 6],
        processor_id: 0,
        encryption_id: 0,
        label: *b"SP6000  ",
    }
    .to_frame()
}

fn start_reply() -> Vec<u8> {
    StartCommunicationResponse {
        product_id: SP6000,
        firmware: Version { version: 7, revision: 5, build: 12 },
        panel_id: 0x1234,
        transceiver: [0; 7],
    }
    .to_frame()
}

/// Memory contents served for `ReadEEPROM`, by wire address.
fn memory(state: &mut SpectraState, wire_address: u16) -> Vec<u8> {
    let labels: HashMap<u16, &str> = [(0x0010, "Front door"), (0x0310, "Ground floor"), (0x0320, "Upstairs")].into();
    if let Some(text) = labels.get(&wire_address) {
        return label(text);
    }
    let mut data = vec![0u8; 32];
    // RAM block 3: four status bytes per partition.
    if wire_address == 0x8003 && state.armed {
        data[0] = 0x01;
        if state.polls_since_arm == 0 {
            data[1] = 0x02;
        }
        state.polls_since_arm += 1;
    }
    data
}

async fn spectra_panel(mut socket: TcpStream, state: Arc<Mutex<SpectraState>>) {
    let mut frame = [0u8; 37];
    while socket.read_exact(&mut frame).await.is_ok() {
        let reply = match frame[0] {
            0x72 => Some(initiate_reply()),
            0x5F => Some(start_reply()),
            0x00 => Some(with_checksum(blank(0x10))),
            0x50 => {
                let address = u16::from_be_bytes([frame[2], frame[3]]);
                let mut s = state.lock().unwrap();
                *s.reads.entry(address).or_default() += 1;
                let misaddress = match s.misaddressed.get_mut(&address) {
                    Some(left) if *left > 0 => {
                        *left -= 1;
                        true
                    }
                    _ => false,
                };
                let reply_address = if misaddress { address.wrapping_add(0x10) } else { address };
                let mut body = blank(0x52);
                body[2..4].copy_from_slice(&reply_address.to_be_bytes());
                let data = memory(&mut s, reply_address);
                body[4..36].copy_from_slice(&data);
                Some(with_checksum(body))
            }
            0x40 => {
                let mut s = state.lock().unwrap();
                s.actions.push(frame.to_vec());
                if frame[2] == 0x04 {
                    s.armed = true;
                    s.polls_since_arm = 0;
                }
                let mut body = blank(0x42);
                body[2] = frame[2];
                Some(with_checksum(body))
            }
            _ => None,
        };
        if let Some(reply) = reply {
            if socket.write_all(&reply).await.is_err() {
                break;
            }
        }
    }
}

/// Serve one connection of the fake Spectra panel; returns the port.
async fn spawn_spectra(state: Arc<Mutex<SpectraState>>) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        spectra_panel(socket, state).await;
    });
    port
}

fn spectra_config(port: u16) -> paradox_bridge::ConfigBuilder {
    Config::builder()
        .ip("127.0.0.1", port)
        .bare(true)
        .password(Some("0000"))
        .keep_alive_interval(0.2)
        .io_timeout(2.0)
        .limit(ElementType::Zone, [1])
        .limit(ElementType::Partition, [1, 2])
        .limit(ElementType::Pgm, [])
        .limit(ElementType::User, [])
        .limit(ElementType::BusModule, [])
}

async fn next_matching(bus: &mut BusReceiver, mut pred: impl FnMut(&BusMessage) -> bool) -> Vec<BusMessage> {
    let mut seen = Vec::new();
    timeout(WAIT, async {
        loop {
            let message = bus.recv().await.unwrap();
            let done = pred(&message);
            seen.push(message);
            if done {
                break;
            }
        }
    })
    .await
    .expect("bus message not seen in time");
    seen
}

fn is_partition_state(message: &BusMessage, state: &str) -> bool {
    matches!(message, BusMessage::Change(c)
        if c.element_type == ElementType::Partition
            && c.key == "Ground_floor"
            && c.property == "current_state"
            && c.new_value == json!(state))
}

#[tokio::test]
async fn spectra_arm_partition_end_to_end() {
    let state = Arc::new(Mutex::new(SpectraState::default()));
    let port = spawn_spectra(Arc::clone(&state)).await;

    let paradox = Paradox::new(spectra_config(port).build()).unwrap();
    let mut bus = paradox.subscribe();
    paradox.connect().await.unwrap();
    assert_eq!(paradox.run_state(), RunState::Run);
    assert_eq!(paradox.panel_info().await.unwrap().serial_number, "05010203");
    assert_eq!(paradox.element(ElementType::Zone, "1").await.unwrap().key, "Front_door");

    let runner = paradox.clone();
    let run = tokio::spawn(async move { runner.run().await });

    // Baseline status: both partitions disarmed.
    next_matching(&mut bus, |m| matches!(m, BusMessage::StatusUpdate(_))).await;
    let partition = paradox.element(ElementType::Partition, "Ground_floor").await.unwrap();
    assert_eq!(partition.get("current_state"), Some(&json!("disarmed")));

    assert!(paradox.control_partition("1", "arm").await.unwrap());

    let seen = next_matching(&mut bus, |m| is_partition_state(m, "armed_away")).await;
    let arming = seen.iter().position(|m| is_partition_state(m, "arming")).unwrap();
    let arming_event = seen
        .iter()
        .position(|m| matches!(m, BusMessage::Event(e) if e.kind == EventKind::Change && e.message == "Partition Ground floor is arming"))
        .unwrap();
    assert!(arming < arming_event);
    // `armed_away` is the last message collected.
    assert!(arming_event < seen.len() - 1);

    {
        let s = state.lock().unwrap();
        assert_eq!(s.actions.len(), 1);
        assert_eq!(&s.actions[0][..4], &[0x40, 0x00, 0x04, 0x00]);
    }
    let upstairs = paradox.element(ElementType::Partition, "2").await.unwrap();
    assert_eq!(upstairs.get("current_state"), Some(&json!("disarmed")));

    paradox.disconnect().await;
    assert_eq!(paradox.run_state(), RunState::Stop);
    assert!(timeout(WAIT, run).await.unwrap().unwrap().is_ok());
}

#[tokio::test]
async fn unreadable_label_leaves_element_with_default_label() {
    let state = Arc::new(Mutex::new(SpectraState::default()));
    state.lock().unwrap().misaddressed.insert(0x0010, u32::MAX);
    let port = spawn_spectra(Arc::clone(&state)).await;

    let config = spectra_config(port).io_timeout(0.3).io_retries(1).build();
    let paradox = Paradox::new(config).unwrap();
    timeout(WAIT, paradox.connect()).await.unwrap().unwrap();
    assert_eq!(paradox.run_state(), RunState::Run);

    let zone = paradox.element(ElementType::Zone, "1").await.unwrap();
    assert_eq!(zone.key, "Zone_1");
    assert_eq!(zone.label, "Zone 1");
    assert_eq!(paradox.element(ElementType::Partition, "1").await.unwrap().key, "Ground_floor");
    assert_eq!(state.lock().unwrap().reads[&0x0010], 3);

    paradox.disconnect().await;
}

#[tokio::test]
async fn misaddressed_label_reply_is_read_again() {
    let state = Arc::new(Mutex::new(SpectraState::default()));
    state.lock().unwrap().misaddressed.insert(0x0010, 1);
    let port = spawn_spectra(Arc::clone(&state)).await;

    let config = spectra_config(port).io_timeout(0.3).io_retries(1).build();
    let paradox = Paradox::new(config).unwrap();
    timeout(WAIT, paradox.connect()).await.unwrap().unwrap();
    assert_eq!(paradox.run_state(), RunState::Run);

    let zone = paradox.element(ElementType::Zone, "Front_door").await.unwrap();
    assert_eq!(zone.id, 1);
    assert_eq!(zone.label, "Front door");
    assert_eq!(state.lock().unwrap().reads[&0x0010], 2);

    paradox.disconnect().await;
}

#[tokio::test]
async fn ip_module_rejects_password() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut framed = Framed::new(socket, IpCodec::new(SessionKey::new(&b"wrong"[..])));
        let Some(Ok(connect)) = framed.next().await else { return };
        assert_eq!(connect.command, COMMAND_CONNECT);
        let payload = ConnectResponse {
            login_status: LoginStatus::InvalidPassword,
            key: [0; 16],
            hardware_version: 0x0102,
            ip_firmware_major: 4,
            ip_firmware_minor: 40,
            ip_module_serial: [0x71, 0x00, 0x00, 0x01],
        };
        let reply = IpMessage::request(COMMAND_CONNECT, payload.to_bytes()).with_message_type(MessageType::IpResponse);
        framed.send(reply).await.unwrap();
        // Keep the socket open until the client gives up.
        let _ = framed.next().await;
    });

    let config = Config::builder()
        .ip("127.0.0.1", port)
        .ip_password("wrong")
        .build();
    let paradox = Paradox::new(config).unwrap();
    let mut states = paradox.watch_run_state();

    let err = timeout(WAIT, paradox.connect()).await.unwrap().unwrap_err();
    assert!(matches!(err, ParadoxError::InvalidIpPassword));
    assert!(err.is_fatal());
    assert_eq!(*states.borrow_and_update(), RunState::Error);
    assert!(matches!(
        paradox.control_partition("1", "arm").await,
        Err(ParadoxError::NotRunning { .. })
    ));
}
