// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// Access-control doors (EVO only)

use std::str::FromStr;

use serde_json::{Map, Value};

use crate::error::ParadoxError;

pub fn template() -> Map<String, Value> {
    super::flags(&["open", "left_open", "forced_open"])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorCommand {
    Unlock,
    Lock,
}

impl DoorCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unlock => "unlock",
            Self::Lock => "lock",
        }
    }
}

impl FromStr for DoorCommand {
    type Err = ParadoxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unlock" | "open" => Ok(Self::Unlock),
            "lock" | "close" => Ok(Self::Lock),
            other => Err(ParadoxError::mapping(other, "door")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_door_command_aliases() {
        assert_eq!("open".parse::<DoorCommand>().unwrap(), DoorCommand::Unlock);
        assert_eq!("lock".parse::<DoorCommand>().unwrap(), DoorCommand::Lock);
        assert!("kick".parse::<DoorCommand>().is_err());
    }
}
