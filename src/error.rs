// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// Error taxonomy for the Paradox session engine

use std::fmt;

/// Error codes reported by the panel in an `ErrorMessage` frame (command nibble 0x7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelErrorCode {
    RequestedCommandFailed,
    InvalidUserCode,
    PartitionInCodeLockout,
    PanelWillDisconnect,
    PanelNotConnected,
    PanelAlreadyConnected,
    InvalidPcPassword,
    WinloadOnPhoneLine,
    InvalidModuleAddress,
    CannotWriteInRam,
    UpgradeRequestFail,
    RecordNumberOutOfRange,
    InvalidRecordType,
    MultibusNotSupported,
    IncorrectNumberOfUsers,
    InvalidLabelNumber,
}

impl PanelErrorCode {
    /// Decode the error byte of an `ErrorMessage`.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Self::RequestedCommandFailed),
            0x01 => Some(Self::InvalidUserCode),
            0x02 => Some(Self::PartitionInCodeLockout),
            0x05 => Some(Self::PanelWillDisconnect),
            0x10 => Some(Self::PanelNotConnected),
            0x11 => Some(Self::PanelAlreadyConnected),
            0x12 => Some(Self::InvalidPcPassword),
            0x13 => Some(Self::WinloadOnPhoneLine),
            0x14 => Some(Self::InvalidModuleAddress),
            0x15 => Some(Self::CannotWriteInRam),
            0x16 => Some(Self::UpgradeRequestFail),
            0x17 => Some(Self::RecordNumberOutOfRange),
            0x19 => Some(Self::InvalidRecordType),
            0x1A => Some(Self::MultibusNotSupported),
            0x1B => Some(Self::IncorrectNumberOfUsers),
            0x1C => Some(Self::InvalidLabelNumber),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::RequestedCommandFailed => 0x00,
            Self::InvalidUserCode => 0x01,
            Self::PartitionInCodeLockout => 0x02,
            Self::PanelWillDisconnect => 0x05,
            Self::PanelNotConnected => 0x10,
            Self::PanelAlreadyConnected => 0x11,
            Self::InvalidPcPassword => 0x12,
            Self::WinloadOnPhoneLine => 0x13,
            Self::InvalidModuleAddress => 0x14,
            Self::CannotWriteInRam => 0x15,
            Self::UpgradeRequestFail => 0x16,
            Self::RecordNumberOutOfRange => 0x17,
            Self::InvalidRecordType => 0x19,
            Self::MultibusNotSupported => 0x1A,
            Self::IncorrectNumberOfUsers => 0x1B,
            Self::InvalidLabelNumber => 0x1C,
        }
    }

    /// The snake_case name used in logs and notifications.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestedCommandFailed => "requested_command_failed",
            Self::InvalidUserCode => "invalid_user_code",
            Self::PartitionInCodeLockout => "partition_in_code_lockout",
            Self::PanelWillDisconnect => "panel_will_disconnect",
            Self::PanelNotConnected => "panel_not_connected",
            Self::PanelAlreadyConnected => "panel_already_connected",
            Self::InvalidPcPassword => "invalid_pc_password",
            Self::WinloadOnPhoneLine => "winload_on_phone_line",
            Self::InvalidModuleAddress => "invalid_module_address",
            Self::CannotWriteInRam => "cannot_write_in_ram",
            Self::UpgradeRequestFail => "upgrade_request_fail",
            Self::RecordNumberOutOfRange => "record_number_out_of_range",
            Self::InvalidRecordType => "invalid_record_type",
            Self::MultibusNotSupported => "multibus_not_supported",
            Self::IncorrectNumberOfUsers => "incorrect_number_of_users",
            Self::InvalidLabelNumber => "invalid_label_number",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::RequestedCommandFailed => "Requested command failed",
            Self::InvalidUserCode => "Invalid user code",
            Self::PartitionInCodeLockout => "Partition in code lockout",
            Self::PanelWillDisconnect => "Panel will disconnect",
            Self::PanelNotConnected => "Panel not connected",
            Self::PanelAlreadyConnected => "Panel already connected",
            Self::InvalidPcPassword => "Invalid PC password",
            Self::WinloadOnPhoneLine => "Winload on phone line",
            Self::InvalidModuleAddress => "Invalid module address",
            Self::CannotWriteInRam => "Cannot write in RAM",
            Self::UpgradeRequestFail => "Upgrade request failed",
            Self::RecordNumberOutOfRange => "Record number out of range",
            Self::InvalidRecordType => "Invalid record type",
            Self::MultibusNotSupported => "Multibus not supported",
            Self::IncorrectNumberOfUsers => "Incorrect number of users",
            Self::InvalidLabelNumber => "Invalid label number",
        }
    }
}

impl fmt::Display for PanelErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.as_str(), self.description())
    }
}

/// All errors that can occur in the paradox-bridge library.
#[derive(Debug, thiserror::Error)]
pub enum ParadoxError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("Configuration error: {reason}")]
    Config { reason: String },

    #[error("Transport unavailable: {reason}")]
    TransportUnavailable { reason: String },

    #[error("Not connected")]
    NotConnected,

    #[error("Timeout during handshake step: {step}")]
    HandshakeTimeout { step: &'static str },

    #[error("Timeout waiting for reply to {request}")]
    Timeout { request: String },

    #[error("Panel rejected the PC password or user code")]
    AuthenticationFailed,

    #[error("IP module rejected the password")]
    InvalidIpPassword,

    #[error("Failed to connect to IP module: {reason}")]
    ConnectToIpModuleFailed { reason: String },

    #[error("Panel not detected")]
    PanelNotDetected,

    #[error("Partition in code lockout")]
    CodeLockout,

    #[error("Status request failed: {reason}")]
    StatusRequest { reason: String },

    #[error("Checksum mismatch")]
    Checksum,

    #[error("Parse error: {details}")]
    Parse { details: String },

    #[error("Cannot map command '{command}' for {element}")]
    Mapping { command: String, element: String },

    #[error("Message already handled")]
    AlreadyHandled,

    #[error("STUN session refresh failed: {reason}")]
    StunSessionRefreshFailed { reason: String },

    #[error("Panel error: {0}")]
    PanelError(PanelErrorCode),

    #[error("Session not running (state: {state})")]
    NotRunning { state: String },

    #[error("Channel closed")]
    ChannelClosed,
}

impl ParadoxError {
    /// Whether this error is transient and the connection should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ParadoxError::Io(_)
                | ParadoxError::Serial(_)
                | ParadoxError::TransportUnavailable { .. }
                | ParadoxError::NotConnected
                | ParadoxError::HandshakeTimeout { .. }
                | ParadoxError::Timeout { .. }
                | ParadoxError::ConnectToIpModuleFailed { .. }
                | ParadoxError::StatusRequest { .. }
                | ParadoxError::StunSessionRefreshFailed { .. }
                | ParadoxError::ChannelClosed
        )
    }

    /// Errors after which reconnecting with the same settings cannot succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ParadoxError::AuthenticationFailed
                | ParadoxError::InvalidIpPassword
                | ParadoxError::PanelNotDetected
                | ParadoxError::CodeLockout
                | ParadoxError::Config { .. }
        )
    }

    pub(crate) fn parse(details: impl Into<String>) -> Self {
        ParadoxError::Parse { details: details.into() }
    }

    pub(crate) fn mapping(command: impl Into<String>, element: impl Into<String>) -> Self {
        ParadoxError::Mapping {
            command: command.into(),
            element: element.into(),
        }
    }
}

impl From<PanelErrorCode> for ParadoxError {
    fn from(code: PanelErrorCode) -> Self {
        match code {
            PanelErrorCode::InvalidPcPassword => ParadoxError::AuthenticationFailed,
            PanelErrorCode::PartitionInCodeLockout => ParadoxError::CodeLockout,
            other => ParadoxError::PanelError(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ParadoxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panel_error_code_roundtrip() {
        for code in 0u8..=0x1F {
            if let Some(parsed) = PanelErrorCode::from_code(code) {
                assert_eq!(parsed.code(), code);
            }
        }
        assert_eq!(PanelErrorCode::from_code(0x03), None);
        assert_eq!(PanelErrorCode::from_code(0x12), Some(PanelErrorCode::InvalidPcPassword));
    }

    #[test]
    fn test_panel_error_conversion() {
        assert!(matches!(
            ParadoxError::from(PanelErrorCode::InvalidPcPassword),
            ParadoxError::AuthenticationFailed
        ));
        assert!(matches!(
            ParadoxError::from(PanelErrorCode::PartitionInCodeLockout),
            ParadoxError::CodeLockout
        ));
        assert!(matches!(
            ParadoxError::from(PanelErrorCode::InvalidUserCode),
            ParadoxError::PanelError(PanelErrorCode::InvalidUserCode)
        ));
    }

    #[test]
    fn test_retryable_and_fatal() {
        assert!(ParadoxError::NotConnected.is_retryable());
        assert!(ParadoxError::HandshakeTimeout { step: "initiate" }.is_retryable());
        assert!(!ParadoxError::InvalidIpPassword.is_retryable());
        assert!(ParadoxError::InvalidIpPassword.is_fatal());
        assert!(ParadoxError::CodeLockout.is_fatal());
        assert!(!ParadoxError::Checksum.is_fatal());
    }

    #[test]
    fn test_display() {
        let e = ParadoxError::PanelError(PanelErrorCode::InvalidUserCode);
        assert_eq!(e.to_string(), "Panel error: invalid_user_code: Invalid user code");
    }
}
