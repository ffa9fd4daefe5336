// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// Serial port link

use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::Ordering;

use bytes::BytesMut;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tokio_util::codec::Decoder;
use tracing::{debug, error};

use crate::config::Config;
use crate::error::Result;
use crate::protocol::frame::hex;
use crate::protocol::SerialFrameCodec;

use super::{Connection, Inbound, LinkState, CHANNEL_DEPTH};

const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Open the configured serial device.
///
/// The port is blocking, so reads and writes run on blocking threads that
/// exchange frames with the async side over channels.
pub fn open(config: &Config) -> Result<(Connection, Inbound)> {
    debug!("Opening {} at {} baud", config.serial_port, config.serial_baud);
    let mut writer = serialport::new(&config.serial_port, config.serial_baud)
        .timeout(READ_TIMEOUT)
        .open()?;
    let mut reader = writer.try_clone()?;

    let state = LinkState::new();
    let dump_packets = config.logging_dump_packets;
    let (in_tx, in_rx) = mpsc::channel(CHANNEL_DEPTH);
    let (out_tx, mut out_rx) = mpsc::channel::<Vec<u8>>(CHANNEL_DEPTH);

    let reader_state = state.clone();
    let read_task = tokio::task::spawn_blocking(move || {
        let mut codec = SerialFrameCodec::new().with_packet_dump(dump_packets);
        let mut buf = BytesMut::with_capacity(256);
        let mut chunk = [0u8; 256];
        while reader_state.connected.load(Ordering::SeqCst) {
            match reader.read(&mut chunk) {
                Ok(0) => continue,
                Ok(n) => {
                    buf.extend_from_slice(&chunk[..n]);
                    while let Ok(Some(frame)) = codec.decode(&mut buf) {
                        if in_tx.blocking_send(frame).is_err() {
                            reader_state.lost();
                            return;
                        }
                    }
                }
                Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!("Serial read failed: {}", e);
                    break;
                }
            }
        }
        reader_state.lost();
    });

    let writer_state = state.clone();
    let write_task = tokio::task::spawn_blocking(move || {
        while let Some(frame) = out_rx.blocking_recv() {
            if dump_packets {
                debug!("PC -> A {}", hex(&frame));
            }
            if let Err(e) = writer.write_all(&frame).and_then(|_| writer.flush()) {
                error!("Serial write failed: {}", e);
                writer_state.lost();
                break;
            }
        }
    });

    let connection = Connection::from_parts(
        format!("serial {}", config.serial_port),
        out_tx,
        state,
        vec![read_task, write_task],
    );
    Ok((connection, in_rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParadoxError;

    #[tokio::test]
    async fn test_missing_device_is_serial_error() {
        let config = Config::builder().serial("/dev/does-not-exist-paradox", 9600).build();
        let err = open(&config).err().unwrap();
        assert!(matches!(err, ParadoxError::Serial(_)));
        assert!(err.is_retryable());
    }
}
