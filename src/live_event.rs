// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// Live event resolution and change-derived events

use chrono::{Local, NaiveDateTime};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::event::{Event, EventKind, EventLevel};
use crate::family::event_map::{lookup, EventMap};
use crate::family::RawEvent;
use crate::labels::LabelEncoding;
use crate::storage::{Change, ElementType, Storage};

/// Looks up the label of an element: `(type, id) -> label`.
pub type LabelProvider<'a> = &'a dyn Fn(ElementType, u32) -> Option<String>;

/// Render a panel live event with the family's event map.
///
/// Returns `None` (after a warning) when the major code is not in the map.
pub fn resolve(
    map: EventMap,
    raw: &RawEvent,
    encoding: LabelEncoding,
    provider: Option<LabelProvider<'_>>,
) -> Option<Event> {
    let Some(entry) = lookup(map, raw.major) else {
        warn!(
            "Unknown live event major={} minor={} partition={}",
            raw.major, raw.minor, raw.partition
        );
        return None;
    };
    let resolved = entry.resolve(raw.minor);
    let partition = raw.partition as u32;
    let id = if resolved.id_from_partition {
        partition
    } else {
        raw.minor as u32
    };

    let mut label = encoding.decode(&raw.label);
    if label.is_empty() {
        label = provider
            .and_then(|p| p(resolved.ty, id))
            .unwrap_or_else(|| default_label(resolved.ty, id));
    }

    let template = match (provider, resolved.unlabelled) {
        (None, Some(unlabelled)) => unlabelled,
        _ => resolved.message,
    };
    let ctx = Context {
        ty: resolved.ty,
        id,
        partition,
        minor: raw.minor,
        major: raw.major,
        label: &label,
        provider,
    };
    let message = format_template(template, &ctx);

    let change: Map<String, Value> = resolved
        .change
        .iter()
        .map(|(prop, value)| (prop.to_string(), Value::Bool(*value)))
        .collect();

    Some(Event {
        kind: EventKind::Live,
        level: resolved.level,
        tags: resolved.tags.iter().map(|t| t.to_string()).collect(),
        element_type: resolved.ty,
        id: Some(id),
        key: None,
        label,
        message,
        change,
        partition: Some(partition),
        major: Some(raw.major),
        minor: Some(raw.minor),
        timestamp: raw.timestamp.unwrap_or_else(now),
    })
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn default_label(ty: ElementType, id: u32) -> String {
    format!("[{}:{}]", ty, id)
}

struct Context<'a> {
    ty: ElementType,
    id: u32,
    partition: u32,
    minor: u16,
    major: u8,
    label: &'a str,
    provider: Option<LabelProvider<'a>>,
}

impl Context<'_> {
    fn field(&self, name: &str) -> Option<String> {
        match name {
            "label" => Some(self.label.to_string()),
            "id" => Some(self.id.to_string()),
            "partition" => Some(self.partition.to_string()),
            "minor" => Some(self.minor.to_string()),
            "major" => Some(self.major.to_string()),
            "type" => Some(self.ty.to_string()),
            _ => None,
        }
    }

    fn numeric_field(&self, name: &str) -> Option<u32> {
        match name {
            "id" => Some(self.id),
            "partition" => Some(self.partition),
            "minor" => Some(self.minor as u32),
            "major" => Some(self.major as u32),
            _ => None,
        }
    }

    /// `@type` / `@type:#field`: label of another element referenced by the event.
    fn reference(&self, ty: ElementType, field: Option<&str>) -> String {
        let source = match field {
            Some(field) => self.numeric_field(field),
            None if ty == self.ty => Some(self.id),
            None => Some(self.partition),
        };
        let Some(source) = source else {
            return format!("[{}:?]", ty);
        };
        self.provider
            .and_then(|p| p(ty, source))
            .unwrap_or_else(|| default_label(ty, source))
    }
}

fn format_template(template: &str, ctx: &Context<'_>) -> String {
    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;
    while let Some(pos) = rest.find(['{', '@']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let consumed = if tail.starts_with('{') {
            format_field(tail, ctx, &mut out)
        } else {
            format_reference(tail, ctx, &mut out)
        };
        rest = &tail[consumed..];
    }
    out.push_str(rest);
    out
}

/// Expand `{name}` at the start of `tail`; returns bytes consumed.
fn format_field(tail: &str, ctx: &Context<'_>, out: &mut String) -> usize {
    if let Some(end) = tail.find('}') {
        if let Some(value) = ctx.field(&tail[1..end]) {
            out.push_str(&value);
            return end + 1;
        }
    }
    out.push('{');
    1
}

/// Expand `@type[:#field]` at the start of `tail`; returns bytes consumed.
fn format_reference(tail: &str, ctx: &Context<'_>, out: &mut String) -> usize {
    let name_len = tail[1..]
        .find(|c: char| !(c.is_ascii_lowercase() || c == '-'))
        .unwrap_or(tail.len() - 1);
    let name = &tail[1..1 + name_len];
    let Some(ty) = ElementType::from_prefix(name) else {
        out.push('@');
        return 1;
    };
    let mut consumed = 1 + name_len;
    let mut field = None;
    if let Some(after) = tail[consumed..].strip_prefix(":#") {
        let field_len = after
            .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .unwrap_or(after.len());
        if field_len > 0 {
            field = Some(&after[..field_len]);
            consumed += 2 + field_len;
        }
    }
    out.push_str(&ctx.reference(ty, field));
    consumed
}

struct ChangeRule {
    ty: ElementType,
    property: &'static str,
    set: (&'static str, EventLevel),
    cleared: (&'static str, EventLevel),
    tags: &'static [&'static str],
}

const CHANGE_RULES: &[ChangeRule] = &[
    ChangeRule {
        ty: ElementType::Zone,
        property: "open",
        set: ("Zone {label} open", EventLevel::Debug),
        cleared: ("Zone {label} closed", EventLevel::Debug),
        tags: &[],
    },
    ChangeRule {
        ty: ElementType::Zone,
        property: "tamper",
        set: ("Zone {label} tampered", EventLevel::Warn),
        cleared: ("Zone {label} tamper restored", EventLevel::Info),
        tags: &["tamper"],
    },
    ChangeRule {
        ty: ElementType::Zone,
        property: "bypassed",
        set: ("Zone {label} bypassed", EventLevel::Info),
        cleared: ("Zone {label} bypass cleared", EventLevel::Info),
        tags: &["bypass"],
    },
    ChangeRule {
        ty: ElementType::Zone,
        property: "presently_in_alarm",
        set: ("Zone {label} in alarm", EventLevel::Critical),
        cleared: ("Zone {label} alarm restored", EventLevel::Info),
        tags: &["alarm"],
    },
    ChangeRule {
        ty: ElementType::Pgm,
        property: "on",
        set: ("Output {label} on", EventLevel::Info),
        cleared: ("Output {label} off", EventLevel::Info),
        tags: &[],
    },
    ChangeRule {
        ty: ElementType::Door,
        property: "open",
        set: ("Door {label} open", EventLevel::Info),
        cleared: ("Door {label} closed", EventLevel::Info),
        tags: &[],
    },
];

/// Derive an event from a published change, for the properties that have one.
///
/// Initial changes (the baseline after connect) never produce events.
pub fn change_event(change: &Change, storage: &Storage) -> Option<Event> {
    if change.initial {
        return None;
    }
    let element = storage
        .container(change.element_type)
        .and_then(|c| c.get_by_key(&change.key));
    let label = element
        .map(|e| e.label.clone())
        .unwrap_or_else(|| change.key.clone());

    let (message, level, tags) = match (change.element_type, change.property.as_str()) {
        (ElementType::Partition, "current_state") => {
            let state = change.new_value.as_str()?;
            let triggered = state == "triggered";
            (
                format!("Partition {} is {}", label, state),
                if triggered { EventLevel::Critical } else { EventLevel::Info },
                if triggered { vec!["alarm".to_string()] } else { Vec::new() },
            )
        }
        (ElementType::System, flag) if change.key == "troubles" && flag != "trouble" => {
            let active = change.new_value.as_bool()?;
            let name = flag.trim_end_matches("_trouble").replace('_', " ");
            if active {
                (format!("Trouble: {}", name), EventLevel::Warn, vec!["trouble".to_string()])
            } else {
                (format!("Trouble restored: {}", name), EventLevel::Info, vec!["trouble".to_string()])
            }
        }
        (ty, property) => {
            let rule = CHANGE_RULES
                .iter()
                .find(|r| r.ty == ty && r.property == property)?;
            let (template, level) = if change.new_value.as_bool()? {
                rule.set
            } else {
                rule.cleared
            };
            (
                template.replace("{label}", &label),
                level,
                rule.tags.iter().map(|t| t.to_string()).collect(),
            )
        }
    };
    debug!("Change event: {}", message);

    Some(Event {
        kind: EventKind::Change,
        level,
        tags,
        element_type: change.element_type,
        id: element.map(|e| e.id),
        key: Some(change.key.clone()),
        label,
        message,
        change: Map::from_iter([(change.property.clone(), change.new_value.clone())]),
        partition: None,
        major: None,
        minor: None,
        timestamp: now(),
    })
}
