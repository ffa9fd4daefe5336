// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// Declarative RAM status block layouts

use serde_json::{json, Map, Value};
use tracing::trace;

use crate::devices::{PartitionStatusFlags, ZoneStatusFlags};

use super::common::decode_date;

/// One field of a RAM status block, in wire order.
#[derive(Debug, Clone, Copy)]
pub enum Field {
    Skip(usize),
    /// Trouble bits, eight names per byte, MSB first. Empty names are unused bits.
    Troubles(&'static [&'static str]),
    /// Panel clock; `seconds` adds a seventh byte.
    Date { seconds: bool },
    /// `vdc`, `battery`, `dc` raw bytes.
    Power,
    /// RF noise floor.
    Rf,
    /// One bit per element, LSB first.
    Bits { key: &'static str, count: u32 },
    /// One byte per element.
    Bytes { key: &'static str, count: u32 },
    /// One zone status byte per zone, starting at `first`.
    ZoneStatus { first: u32, count: u32 },
    /// Four partition status bytes per partition.
    PartitionStatus { count: u32 },
    /// Like `Bits` but numbering starts at `first`.
    BitsFrom { key: &'static str, first: u32, count: u32 },
}

impl Field {
    pub fn width(&self) -> usize {
        match self {
            Field::Skip(n) => *n,
            Field::Troubles(names) => names.len().div_ceil(8),
            Field::Date { seconds } => 6 + usize::from(*seconds),
            Field::Power => 3,
            Field::Rf => 1,
            Field::Bits { count, .. } | Field::BitsFrom { count, .. } => (*count as usize).div_ceil(8),
            Field::Bytes { count, .. } | Field::ZoneStatus { count, .. } => *count as usize,
            Field::PartitionStatus { count } => *count as usize * 4,
        }
    }
}

/// Total byte width of a layout.
pub fn layout_width(fields: &[Field]) -> usize {
    fields.iter().map(Field::width).sum()
}

fn bits(key: &str, data: &[u8], first: u32, count: u32) -> (String, Value) {
    let per_id: Map<String, Value> = (0..count)
        .map(|i| {
            let byte = data[(i / 8) as usize];
            ((first + i).to_string(), Value::Bool(byte & (1 << (i % 8)) != 0))
        })
        .collect();
    (key.to_string(), Value::Object(per_id))
}

/// Decode one RAM block into raw status keys (`zone_open`, `troubles`, …).
///
/// A block shorter than its layout is decoded up to the last complete field.
pub fn parse_block(fields: &[Field], data: &[u8]) -> Map<String, Value> {
    let mut out = Map::new();
    let mut offset = 0usize;
    for field in fields {
        let width = field.width();
        let Some(chunk) = data.get(offset..offset + width) else {
            trace!("Block truncated at offset {} ({} bytes)", offset, data.len());
            break;
        };
        offset += width;
        match *field {
            Field::Skip(_) => {}
            Field::Troubles(names) => {
                let troubles: Map<String, Value> = names
                    .iter()
                    .enumerate()
                    .filter(|(_, name)| !name.is_empty())
                    .map(|(i, name)| {
                        let set = chunk[i / 8] & (0x80 >> (i % 8)) != 0;
                        (name.to_string(), Value::Bool(set))
                    })
                    .collect();
                out.insert("troubles".into(), Value::Object(troubles));
            }
            Field::Date { .. } => {
                if let Some(dt) = decode_date(chunk) {
                    out.insert(
                        "date".into(),
                        json!({
                            "time": dt.format("%Y-%m-%dT%H:%M:%S").to_string(),
                            "weekday": chrono::Datelike::weekday(&dt).number_from_monday(),
                        }),
                    );
                }
            }
            Field::Power => {
                out.insert(
                    "power".into(),
                    json!({"vdc": chunk[0], "battery": chunk[1], "dc": chunk[2]}),
                );
            }
            Field::Rf => {
                out.insert("rf".into(), json!({"noise_floor": chunk[0]}));
            }
            Field::Bits { key, count } => {
                let (k, v) = bits(key, chunk, 1, count);
                out.insert(k, v);
            }
            Field::BitsFrom { key, first, count } => {
                let (k, v) = bits(key, chunk, first, count);
                out.insert(k, v);
            }
            Field::Bytes { key, count } => {
                let per_id: Map<String, Value> = (0..count as usize)
                    .map(|i| ((i + 1).to_string(), Value::from(chunk[i])))
                    .collect();
                out.insert(key.to_string(), Value::Object(per_id));
            }
            Field::ZoneStatus { first, count } => {
                let per_id: Map<String, Value> = (0..count as usize)
                    .map(|i| {
                        let attrs = ZoneStatusFlags::from_byte(chunk[i]).to_attributes();
                        ((first as usize + i).to_string(), Value::Object(attrs))
                    })
                    .collect();
                out.insert("zone_status".into(), Value::Object(per_id));
            }
            Field::PartitionStatus { count } => {
                let per_id: Map<String, Value> = chunk
                    .chunks_exact(4)
                    .take(count as usize)
                    .enumerate()
                    .filter_map(|(i, b)| {
                        let raw: [u8; 4] = b.try_into().ok()?;
                        let attrs = PartitionStatusFlags::from_bytes(raw).to_attributes();
                        Some(((i + 1).to_string(), Value::Object(attrs)))
                    })
                    .collect();
                out.insert("partition_status".into(), Value::Object(per_id));
            }
        }
    }
    out
}
