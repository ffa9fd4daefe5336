// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// Static event-map tables: major code → rendering rules

use crate::event::EventLevel;
use crate::storage::ElementType;

/// Rendering rules for one major event code.
///
/// When `sub` is non-empty the minor code selects an override and the
/// event's element id is the partition; otherwise the minor code is the id.
#[derive(Debug, Clone, Copy)]
pub struct EventEntry {
    pub ty: ElementType,
    pub level: EventLevel,
    pub tags: &'static [&'static str],
    pub message: &'static str,
    /// Template used when no label provider is installed.
    pub unlabelled: Option<&'static str>,
    pub change: &'static [(&'static str, bool)],
    pub sub: &'static [(u16, EventOverride)],
}

impl EventEntry {
    pub const fn new(ty: ElementType, level: EventLevel, message: &'static str) -> Self {
        Self {
            ty,
            level,
            tags: &[],
            message,
            unlabelled: None,
            change: &[],
            sub: &[],
        }
    }

    pub const fn tags(self, tags: &'static [&'static str]) -> Self {
        Self { tags, ..self }
    }

    pub const fn change(self, change: &'static [(&'static str, bool)]) -> Self {
        Self { change, ..self }
    }

    pub const fn unlabelled(self, template: &'static str) -> Self {
        Self {
            unlabelled: Some(template),
            ..self
        }
    }

    pub const fn sub(self, sub: &'static [(u16, EventOverride)]) -> Self {
        Self { sub, ..self }
    }

    /// Merge the override selected by `minor` (if any) over this entry.
    pub fn resolve(&self, minor: u16) -> ResolvedEntry {
        let mut resolved = ResolvedEntry {
            ty: self.ty,
            level: self.level,
            tags: self.tags.to_vec(),
            message: self.message,
            unlabelled: self.unlabelled,
            change: self.change.to_vec(),
            id_from_partition: !self.sub.is_empty(),
        };
        let Some((_, over)) = self.sub.iter().find(|(code, _)| *code == minor) else {
            return resolved;
        };
        if let Some(ty) = over.ty {
            resolved.ty = ty;
        }
        if let Some(level) = over.level {
            resolved.level = level;
        }
        for tag in over.tags {
            if !resolved.tags.contains(tag) {
                resolved.tags.push(tag);
            }
        }
        if let Some(message) = over.message {
            resolved.message = message;
            resolved.unlabelled = over.unlabelled;
        }
        for (prop, value) in over.change {
            match resolved.change.iter_mut().find(|(p, _)| p == prop) {
                Some(existing) => existing.1 = *value,
                None => resolved.change.push((prop, *value)),
            }
        }
        resolved
    }
}

/// Fields a minor code overrides; unset fields inherit from the major entry.
#[derive(Debug, Clone, Copy)]
pub struct EventOverride {
    pub ty: Option<ElementType>,
    pub level: Option<EventLevel>,
    pub tags: &'static [&'static str],
    pub message: Option<&'static str>,
    pub unlabelled: Option<&'static str>,
    pub change: &'static [(&'static str, bool)],
}

impl EventOverride {
    pub const fn message(message: &'static str) -> Self {
        Self {
            ty: None,
            level: None,
            tags: &[],
            message: Some(message),
            unlabelled: None,
            change: &[],
        }
    }

    pub const fn level(self, level: EventLevel) -> Self {
        Self {
            level: Some(level),
            ..self
        }
    }

    pub const fn of_type(self, ty: ElementType) -> Self {
        Self { ty: Some(ty), ..self }
    }

    pub const fn tags(self, tags: &'static [&'static str]) -> Self {
        Self { tags, ..self }
    }

    pub const fn change(self, change: &'static [(&'static str, bool)]) -> Self {
        Self { change, ..self }
    }

    pub const fn unlabelled(self, template: &'static str) -> Self {
        Self {
            unlabelled: Some(template),
            ..self
        }
    }
}

/// An entry with its minor override applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEntry {
    pub ty: ElementType,
    pub level: EventLevel,
    pub tags: Vec<&'static str>,
    pub message: &'static str,
    pub unlabelled: Option<&'static str>,
    pub change: Vec<(&'static str, bool)>,
    pub id_from_partition: bool,
}

pub type EventMap = &'static [(u8, EventEntry)];

pub fn lookup(map: EventMap, major: u8) -> Option<&'static EventEntry> {
    map.iter().find(|(code, _)| *code == major).map(|(_, entry)| entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARMING_SUB: &[(u16, EventOverride)] = &[
        (1, EventOverride::message("Alarm in @partition").level(EventLevel::Critical).tags(&["alarm"])),
        (2, EventOverride::message("Ready @partition").change(&[("ready", false), ("armed", true)])),
    ];

    const ARMING: EventEntry = EventEntry::new(ElementType::Partition, EventLevel::Info, "Partition @partition status")
        .tags(&["partition"])
        .change(&[("ready", true)])
        .sub(ARMING_SUB);

    #[test]
    fn test_resolve_without_override() {
        let r = ARMING.resolve(9);
        assert_eq!(r.message, "Partition @partition status");
        assert!(r.id_from_partition);
        assert_eq!(r.level, EventLevel::Info);
    }

    #[test]
    fn test_resolve_merges_override() {
        let r = ARMING.resolve(1);
        assert_eq!(r.level, EventLevel::Critical);
        assert_eq!(r.tags, vec!["partition", "alarm"]);

        let r = ARMING.resolve(2);
        assert_eq!(r.change, vec![("ready", false), ("armed", true)]);
    }

    #[test]
    fn test_plain_entry_uses_minor_as_id() {
        let entry = EventEntry::new(ElementType::Zone, EventLevel::Info, "Zone {label} open");
        assert!(!entry.resolve(3).id_from_partition);
    }
}
