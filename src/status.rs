// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// Raw status projection onto storage

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::devices::derive_state;
use crate::storage::{Change, ElementType, Limits, Storage, SYSTEM_ID};

/// Split a raw status key into its target container and attribute.
///
/// `zone_open` → `(Zone, "open")`, `system` → `(System, "system")`;
/// keys without a known prefix (`troubles`, `power`) belong to the system record.
fn split_key(key: &str) -> (ElementType, String) {
    if let Some((prefix, rest)) = key.split_once('_') {
        if let Some(ty) = ElementType::from_prefix(prefix) {
            let attr = if rest.is_empty() { prefix } else { rest };
            return (ty, attr.to_string());
        }
    }
    match ElementType::from_prefix(key) {
        Some(ty) => (ty, key.to_string()),
        None => (ElementType::System, key.to_string()),
    }
}

fn is_id_keyed(map: &Map<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|k| k.parse::<u32>().is_ok())
}

/// Deep-merge `src` into `dst`; maps merge, everything else is overwritten.
pub fn deep_merge(dst: &mut Map<String, Value>, src: Map<String, Value>) {
    for (k, v) in src {
        match (dst.get_mut(&k), v) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => deep_merge(existing, incoming),
            (_, v) => {
                dst.insert(k, v);
            }
        }
    }
}

/// Apply one merged raw status to `storage` and return every resulting change.
///
/// Partition `current_state`/`target_state` are recomputed afterwards.
pub fn project(storage: &mut Storage, raw: &Map<String, Value>, limits: &Limits) -> Vec<Change> {
    let mut changes = Vec::new();
    for (key, value) in raw {
        let (ty, attr) = split_key(key);
        if ty == ElementType::System {
            apply_system(storage, &attr, value, &mut changes);
        } else {
            apply_elements(storage, ty, &attr, value, limits, &mut changes);
        }
    }
    changes.extend(refresh_partition_states(storage));
    changes
}

fn apply_elements(
    storage: &mut Storage,
    ty: ElementType,
    attr: &str,
    value: &Value,
    limits: &Limits,
    changes: &mut Vec<Change>,
) {
    let Value::Object(per_id) = value else {
        debug!("Ignoring scalar status {}_{} = {}", ty, attr, value);
        return;
    };
    if !is_id_keyed(per_id) {
        debug!("Ignoring non id-keyed status {}_{}", ty, attr);
        return;
    }
    for (id, inner) in per_id {
        let Ok(id) = id.parse::<u32>() else { continue };
        if !limits.allows(ty, id) {
            continue;
        }
        let attrs = match inner {
            Value::Object(map) => map.clone(),
            scalar => Map::from_iter([(attr.to_string(), scalar.clone())]),
        };
        if storage.get(ty, id).is_none() {
            trace!("No {} {} for status {}", ty, id, attr);
            continue;
        }
        changes.extend(storage.update_container_object(ty, id, attrs));
    }
}

fn apply_system(storage: &mut Storage, attr: &str, value: &Value, changes: &mut Vec<Change>) {
    match (attr, value) {
        ("system", Value::Object(map)) => {
            for (k, v) in map {
                apply_system(storage, k, v, changes);
            }
        }
        ("troubles", Value::Object(flags)) => {
            let mut troubles = flags.clone();
            let any = flags
                .iter()
                .filter(|(k, _)| k.as_str() != "trouble")
                .any(|(_, v)| v.as_bool().unwrap_or(false));
            troubles.insert("trouble".into(), Value::Bool(any));
            let attrs = Map::from_iter([("troubles".to_string(), Value::Object(troubles))]);
            changes.extend(storage.update_container_object(ElementType::System, SYSTEM_ID, attrs));
        }
        (attr, value) => {
            let attrs = Map::from_iter([(attr.to_string(), value.clone())]);
            changes.extend(storage.update_container_object(ElementType::System, SYSTEM_ID, attrs));
        }
    }
}

/// Recompute the derived arming state of every partition.
pub fn refresh_partition_states(storage: &mut Storage) -> Vec<Change> {
    let ids = storage
        .container(ElementType::Partition)
        .map(|c| c.ids())
        .unwrap_or_default();
    let mut changes = Vec::new();
    for id in ids {
        let Some(partition) = storage.get(ElementType::Partition, id) else { continue };
        let (current, target) = derive_state(&partition.attributes);
        let attrs = Map::from_iter([
            ("current_state".to_string(), Value::from(current.as_str())),
            ("target_state".to_string(), Value::from(target.as_str())),
        ]);
        changes.extend(storage.update_container_object(ElementType::Partition, id, attrs));
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn raw(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    fn storage() -> Storage {
        let mut storage = Storage::default();
        storage.set_labels(
            ElementType::Partition,
            vec![(1, "House".to_string()), (2, "Garage".to_string())],
        );
        storage.set_labels(
            ElementType::Zone,
            vec![(1, "Front".to_string()), (2, "Back".to_string())],
        );
        storage
    }

    fn state(storage: &Storage, id: u32) -> (String, String) {
        let p = storage.get(ElementType::Partition, id).unwrap();
        (
            p.get("current_state").unwrap().as_str().unwrap().to_string(),
            p.get("target_state").unwrap().as_str().unwrap().to_string(),
        )
    }

    #[test]
    fn test_split_key() {
        assert_eq!(split_key("zone_open"), (ElementType::Zone, "open".into()));
        assert_eq!(split_key("bus-module_trouble"), (ElementType::BusModule, "trouble".into()));
        assert_eq!(split_key("pgm_signal_strength"), (ElementType::Pgm, "signal_strength".into()));
        assert_eq!(split_key("system"), (ElementType::System, "system".into()));
        assert_eq!(split_key("troubles"), (ElementType::System, "troubles".into()));
        assert_eq!(split_key("power"), (ElementType::System, "power".into()));
    }

    #[test]
    fn test_armed_home() {
        let mut storage = storage();
        project(
            &mut storage,
            &raw(json!({"partition_status": {"1": {"arm": true, "arm_stay": true}}})),
            &Limits::default(),
        );
        assert_eq!(state(&storage, 1), ("armed_home".into(), "armed_home".into()));
        assert_eq!(state(&storage, 2), ("disarmed".into(), "disarmed".into()));
    }

    #[test]
    fn test_arming_targets_away() {
        let mut storage = storage();
        project(
            &mut storage,
            &raw(json!({"partition_status": {"1": {"arm": true, "exit_delay": true}}})),
            &Limits::default(),
        );
        assert_eq!(state(&storage, 1), ("arming".into(), "armed_away".into()));
    }

    #[test]
    fn test_triggered() {
        let mut storage = storage();
        project(
            &mut storage,
            &raw(json!({"partition_status": {"1": {"fire_alarm": true, "arm": true}}})),
            &Limits::default(),
        );
        assert_eq!(state(&storage, 1).0, "triggered");
    }

    #[test]
    fn test_identical_status_is_quiet() {
        let mut storage = storage();
        let status = raw(json!({
            "zone_open": {"1": true, "2": false},
            "zone_status": {"1": {"bypassed": true}},
            "partition_status": {"1": {"arm": true}},
            "troubles": {"ac_trouble": true, "battery_failure": false},
            "power": {"vdc": 16.2, "battery": 13.4, "dc": 13.6},
        }));
        let first = project(&mut storage, &status, &Limits::default());
        assert!(!first.is_empty());
        let second = project(&mut storage, &status, &Limits::default());
        assert!(second.is_empty(), "unexpected changes: {second:?}");
    }

    #[test]
    fn test_scalar_wrap_and_inner_merge() {
        let mut storage = storage();
        let changes = project(
            &mut storage,
            &raw(json!({"zone_open": {"2": true}, "zone_status": {"2": {"bypassed": true}}})),
            &Limits::default(),
        );
        let zone = storage.get(ElementType::Zone, 2).unwrap();
        assert!(zone.get_bool("open"));
        assert!(zone.get_bool("bypassed"));
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.key == "Back"));
    }

    #[test]
    fn test_troubles_summary() {
        let mut storage = storage();
        let changes = project(
            &mut storage,
            &raw(json!({"troubles": {"ac_trouble": true, "bell_absent": false}})),
            &Limits::default(),
        );
        let system = storage.system().unwrap();
        assert_eq!(system.get("troubles").unwrap()["trouble"], json!(true));
        assert!(changes.iter().any(|c| c.key == "troubles" && c.property == "trouble"));
    }

    #[test]
    fn test_system_key_recurses() {
        let mut storage = storage();
        project(
            &mut storage,
            &raw(json!({"system": {"date": {"time": "2026-10-16T12:00:00", "weekday": 5}}})),
            &Limits::default(),
        );
        let system = storage.system().unwrap();
        assert_eq!(system.get("date").unwrap()["weekday"], json!(5));
    }

    #[test]
    fn test_limits_drop_records() {
        let mut storage = storage();
        let limits = Limits::new(BTreeMap::from([(ElementType::Zone, vec![1])]));
        let changes = project(
            &mut storage,
            &raw(json!({"zone_open": {"1": true, "2": true}})),
            &limits,
        );
        assert_eq!(changes.len(), 1);
        assert!(!storage.get(ElementType::Zone, 2).unwrap().get_bool("open"));
    }

    #[test]
    fn test_unknown_ids_ignored() {
        let mut storage = storage();
        let changes = project(&mut storage, &raw(json!({"zone_open": {"9": true}})), &Limits::default());
        assert!(changes.is_empty());
    }

    #[test]
    fn test_deep_merge() {
        let mut a = raw(json!({"zone_open": {"1": true}, "power": {"vdc": 1.0}}));
        deep_merge(&mut a, raw(json!({"zone_open": {"2": false}, "power": 3})));
        assert_eq!(Value::Object(a), json!({"zone_open": {"1": true, "2": false}, "power": 3}));
    }
}
