// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// Wire framing: serial frames and the IP-module envelope

pub mod frame;
pub mod ip;

pub use frame::{checksum, frame_length, verify_checksum, with_checksum, SerialFrameCodec};
pub use ip::{IpCodec, IpHeader, IpMessage, MessageType, SessionKey};
