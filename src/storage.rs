// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// Element containers and change emission

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::devices;
use crate::error::ParadoxError;
use crate::labels::sanitize_key;

/// Element containers kept by [`Storage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementType {
    Zone,
    Partition,
    Pgm,
    User,
    BusModule,
    Repeater,
    Keypad,
    Door,
    System,
    KeySwitch,
}

impl ElementType {
    pub const ALL: [ElementType; 10] = [
        ElementType::Zone,
        ElementType::Partition,
        ElementType::Pgm,
        ElementType::User,
        ElementType::BusModule,
        ElementType::Repeater,
        ElementType::Keypad,
        ElementType::Door,
        ElementType::System,
        ElementType::KeySwitch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zone => "zone",
            Self::Partition => "partition",
            Self::Pgm => "pgm",
            Self::User => "user",
            Self::BusModule => "bus-module",
            Self::Repeater => "repeater",
            Self::Keypad => "keypad",
            Self::Door => "door",
            Self::System => "system",
            Self::KeySwitch => "key-switch",
        }
    }

    /// Match the prefix of a raw status key (`zone_open` → `zone`).
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|ty| ty.as_str() == prefix)
    }

    /// Human label used when the panel has none.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Zone => "Zone",
            Self::Partition => "Partition",
            Self::Pgm => "Output",
            Self::User => "User",
            Self::BusModule => "Module",
            Self::Repeater => "Repeater",
            Self::Keypad => "Keypad",
            Self::Door => "Door",
            Self::System => "System",
            Self::KeySwitch => "Key switch",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = ParadoxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_ascii_lowercase().replace('_', "-");
        Self::from_prefix(&normalized).ok_or_else(|| ParadoxError::Config {
            reason: format!("unknown element type '{s}'"),
        })
    }
}

/// Per-type id allow-lists. An absent type is unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Limits(BTreeMap<ElementType, Vec<u32>>);

impl Limits {
    pub fn new(limits: BTreeMap<ElementType, Vec<u32>>) -> Self {
        Self(limits)
    }

    pub fn get(&self, ty: ElementType) -> Option<&[u32]> {
        self.0.get(&ty).map(Vec::as_slice)
    }

    pub fn allows(&self, ty: ElementType, id: u32) -> bool {
        self.get(ty).is_none_or(|ids| ids.contains(&id))
    }

    /// Ids from `1..=max` allowed for `ty`.
    pub fn ids(&self, ty: ElementType, max: u32) -> Vec<u32> {
        (1..=max).filter(|id| self.allows(ty, *id)).collect()
    }
}

/// One addressable panel entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: u32,
    pub key: String,
    pub label: String,
    pub attributes: Map<String, Value>,
}

impl Element {
    pub fn get(&self, attr: &str) -> Option<&Value> {
        self.attributes.get(attr)
    }

    pub fn get_bool(&self, attr: &str) -> bool {
        self.get(attr).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Public view of the record; `_`-prefixed attributes are left out.
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("id".into(), Value::from(self.id));
        out.insert("key".into(), Value::from(self.key.clone()));
        out.insert("label".into(), Value::from(self.label.clone()));
        for (k, v) in &self.attributes {
            if !k.starts_with('_') {
                out.insert(k.clone(), v.clone());
            }
        }
        Value::Object(out)
    }
}

/// How a command addresses elements of one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    All,
    Id(u32),
    Key(String),
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Selector::All;
        }
        match s.parse::<u32>() {
            Ok(0) => Selector::All,
            Ok(id) => Selector::Id(id),
            Err(_) => Selector::Key(s.to_string()),
        }
    }
}

impl From<u32> for Selector {
    fn from(id: u32) -> Self {
        if id == 0 {
            Selector::All
        } else {
            Selector::Id(id)
        }
    }
}

/// Elements of one type, indexed by id and by key.
#[derive(Debug, Clone, Default)]
pub struct Container {
    elements: BTreeMap<u32, Element>,
    keys: HashMap<String, u32>,
}

impl Container {
    pub fn get(&self, id: u32) -> Option<&Element> {
        self.elements.get(&id)
    }

    pub fn get_by_key(&self, key: &str) -> Option<&Element> {
        self.keys.get(key).and_then(|id| self.elements.get(id))
    }

    /// Resolve an id, an id string or a key. Ids win over all-digit keys.
    pub fn lookup(&self, needle: &str) -> Option<&Element> {
        match needle.parse::<u32>() {
            Ok(id) => self.get(id).or_else(|| self.get_by_key(needle)),
            Err(_) => self.get_by_key(needle),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.elements.values()
    }

    pub fn ids(&self) -> Vec<u32> {
        self.elements.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    fn get_mut(&mut self, id: u32) -> Option<&mut Element> {
        self.elements.get_mut(&id)
    }

    /// Insert or relabel; attributes of an existing record are kept.
    fn upsert(&mut self, ty: ElementType, id: u32, label: &str) {
        let label = if label.is_empty() {
            format!("{} {}", ty.title(), id)
        } else {
            label.to_string()
        };
        if let Some(old) = self.elements.get(&id) {
            if old.label == label {
                return;
            }
            let old_key = old.key.clone();
            self.keys.remove(&old_key);
        }
        let key = self.unique_key(ty, id, &label);
        self.keys.insert(key.clone(), id);
        match self.elements.get_mut(&id) {
            Some(element) => {
                element.key = key;
                element.label = label;
            }
            None => {
                self.elements.insert(
                    id,
                    Element {
                        id,
                        key,
                        label,
                        attributes: devices::template(ty),
                    },
                );
            }
        }
    }

    fn unique_key(&self, ty: ElementType, id: u32, label: &str) -> String {
        let mut key = sanitize_key(label);
        if key.is_empty() {
            key = format!("{}_{}", sanitize_key(ty.as_str()), id);
        }
        match self.keys.get(&key) {
            Some(existing) if *existing != id => format!("{key}_{id}"),
            _ => key,
        }
    }

    fn remove(&mut self, id: u32) -> Option<Element> {
        let element = self.elements.remove(&id)?;
        self.keys.remove(&element.key);
        Some(element)
    }
}

/// One attribute that took a new value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change {
    #[serde(rename = "type")]
    pub element_type: ElementType,
    pub key: String,
    pub property: String,
    #[serde(rename = "value")]
    pub new_value: Value,
    pub old_value: Option<Value>,
    pub initial: bool,
}

/// All element containers of one session.
#[derive(Debug)]
pub struct Storage {
    containers: BTreeMap<ElementType, Container>,
    push_power_update_without_change: bool,
    push_update_without_change: bool,
    initial: bool,
}

pub const SYSTEM_ID: u32 = 1;

impl Default for Storage {
    fn default() -> Self {
        Self::new(false, false)
    }
}

impl Storage {
    pub fn new(push_power_update_without_change: bool, push_update_without_change: bool) -> Self {
        let mut storage = Self {
            containers: BTreeMap::new(),
            push_power_update_without_change,
            push_update_without_change,
            initial: true,
        };
        storage.clear();
        storage
    }

    /// Drop every record; the `system` record is recreated from its template.
    pub fn clear(&mut self) {
        self.containers = ElementType::ALL
            .iter()
            .map(|ty| (*ty, Container::default()))
            .collect();
        let system = Element {
            id: SYSTEM_ID,
            key: "system".into(),
            label: "System".into(),
            attributes: devices::template(ElementType::System),
        };
        let container = self.container_mut(ElementType::System);
        container.keys.insert(system.key.clone(), SYSTEM_ID);
        container.elements.insert(SYSTEM_ID, system);
        self.initial = true;
    }

    pub fn container(&self, ty: ElementType) -> Option<&Container> {
        self.containers.get(&ty)
    }

    fn container_mut(&mut self, ty: ElementType) -> &mut Container {
        self.containers.entry(ty).or_default()
    }

    pub fn get(&self, ty: ElementType, id: u32) -> Option<&Element> {
        self.container(ty)?.get(id)
    }

    pub fn system(&self) -> Option<&Element> {
        self.get(ElementType::System, SYSTEM_ID)
    }

    /// Create or relabel the records of one type from `(id, label)` pairs.
    pub fn set_labels(&mut self, ty: ElementType, labels: impl IntoIterator<Item = (u32, String)>) {
        let container = self.container_mut(ty);
        for (id, label) in labels {
            container.upsert(ty, id, &label);
        }
        debug!("{} {} label(s) stored", container.len(), ty);
    }

    pub fn remove(&mut self, ty: ElementType, id: u32) -> Option<Element> {
        self.container_mut(ty).remove(id)
    }

    /// Changes emitted from now on are no longer marked `initial`.
    pub fn mark_initial_done(&mut self) {
        self.initial = false;
    }

    pub fn is_initial(&self) -> bool {
        self.initial
    }

    /// Merge `attrs` into one record and return the resulting changes.
    ///
    /// Nested maps of the `system` record are compared leaf by leaf and
    /// reported with the sub-map name as the change key.
    pub fn update_container_object(
        &mut self,
        ty: ElementType,
        id: u32,
        attrs: Map<String, Value>,
    ) -> Vec<Change> {
        let push_all = self.push_update_without_change;
        let push_power = self.push_power_update_without_change;
        let initial = self.initial;

        let Some(element) = self.container_mut(ty).get_mut(id) else {
            warn!("{} {} not found, ignoring update {:?}", ty, id, attrs.keys().collect::<Vec<_>>());
            return Vec::new();
        };

        let mut changes = Vec::new();
        for (attr, value) in attrs {
            if attr.starts_with('_') {
                element.attributes.insert(attr, value);
                continue;
            }
            if ty == ElementType::System {
                if let Value::Object(leaves) = value {
                    let force = push_all || (push_power && attr == "power");
                    let entry = element
                        .attributes
                        .entry(attr.clone())
                        .or_insert_with(|| Value::Object(Map::new()));
                    if !entry.is_object() {
                        *entry = Value::Object(Map::new());
                    }
                    if let Value::Object(current) = entry {
                        for (leaf, new_value) in leaves {
                            let old_value = current.get(&leaf).cloned();
                            if force || old_value.as_ref() != Some(&new_value) {
                                current.insert(leaf.clone(), new_value.clone());
                                if !leaf.starts_with('_') {
                                    changes.push(Change {
                                        element_type: ty,
                                        key: attr.clone(),
                                        property: leaf,
                                        new_value,
                                        old_value,
                                        initial,
                                    });
                                }
                            }
                        }
                    }
                    continue;
                }
            }
            let old_value = element.attributes.get(&attr).cloned();
            if push_all || old_value.as_ref() != Some(&value) {
                element.attributes.insert(attr.clone(), value.clone());
                changes.push(Change {
                    element_type: ty,
                    key: element.key.clone(),
                    property: attr,
                    new_value: value,
                    old_value,
                    initial,
                });
            }
        }
        changes
    }

    /// Ids addressed by `selector`, honouring `limits` for `All`.
    pub fn select(&self, ty: ElementType, selector: &Selector, limits: &Limits) -> Vec<u32> {
        let Some(container) = self.container(ty) else {
            return Vec::new();
        };
        match selector {
            Selector::All => container
                .ids()
                .into_iter()
                .filter(|id| limits.allows(ty, *id))
                .collect(),
            Selector::Id(id) => container.lookup(&id.to_string()).map(|e| vec![e.id]).unwrap_or_default(),
            Selector::Key(key) => container.get_by_key(key).map(|e| vec![e.id]).unwrap_or_default(),
        }
    }

    /// `{type: {id: {id, key, label}}}` for every non-empty container.
    pub fn labels_snapshot(&self) -> Value {
        let mut out = Map::new();
        for (ty, container) in &self.containers {
            if container.is_empty() {
                continue;
            }
            let records: Map<String, Value> = container
                .iter()
                .map(|e| {
                    let mut record = Map::new();
                    record.insert("id".into(), Value::from(e.id));
                    record.insert("key".into(), Value::from(e.key.clone()));
                    record.insert("label".into(), Value::from(e.label.clone()));
                    (e.id.to_string(), Value::Object(record))
                })
                .collect();
            out.insert(ty.as_str().to_string(), Value::Object(records));
        }
        Value::Object(out)
    }

    /// Full public view of every record.
    pub fn snapshot(&self) -> Value {
        let mut out = Map::new();
        for (ty, container) in &self.containers {
            if container.is_empty() {
                continue;
            }
            let records: Map<String, Value> = container
                .iter()
                .map(|e| (e.id.to_string(), e.to_json()))
                .collect();
            out.insert(ty.as_str().to_string(), Value::Object(records));
        }
        Value::Object(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    fn storage_with_zones() -> Storage {
        let mut storage = Storage::default();
        storage.set_labels(
            ElementType::Zone,
            vec![(1, "Front Door".to_string()), (2, "Office".to_string()), (3, "Office".to_string())],
        );
        storage
    }

    #[test]
    fn test_element_type_names() {
        assert_eq!(ElementType::BusModule.as_str(), "bus-module");
        assert_eq!(ElementType::from_prefix("key-switch"), Some(ElementType::KeySwitch));
        assert_eq!("bus_module".parse::<ElementType>().unwrap(), ElementType::BusModule);
        assert!("widget".parse::<ElementType>().is_err());
        assert_eq!(serde_json::to_value(ElementType::BusModule).unwrap(), json!("bus-module"));
    }

    #[test]
    fn test_keys_are_unique() {
        let storage = storage_with_zones();
        let zones = storage.container(ElementType::Zone).unwrap();
        assert_eq!(zones.get(1).unwrap().key, "Front_Door");
        assert_eq!(zones.get(2).unwrap().key, "Office");
        assert_eq!(zones.get(3).unwrap().key, "Office_3");
    }

    #[test]
    fn test_lookup_by_id_string_and_key_agree() {
        let storage = storage_with_zones();
        let zones = storage.container(ElementType::Zone).unwrap();
        let by_id = zones.get(2).unwrap();
        assert_eq!(zones.lookup("2").unwrap(), by_id);
        assert_eq!(zones.lookup("Office").unwrap(), by_id);
        assert_eq!(zones.get_by_key("Office").unwrap(), by_id);
    }

    #[test]
    fn test_all_digit_key_is_reachable() {
        let mut storage = Storage::default();
        storage.set_labels(ElementType::Zone, vec![(1, "7".to_string()), (2, "Office".to_string())]);
        let zones = storage.container(ElementType::Zone).unwrap();
        assert_eq!(zones.lookup("7").unwrap().id, 1);
        assert_eq!(zones.lookup("2").unwrap().id, 2);
        assert!(zones.lookup("9").is_none());
        assert_eq!(storage.select(ElementType::Zone, &Selector::from("7"), &Limits::default()), vec![1]);
    }

    #[test]
    fn test_empty_label_gets_default() {
        let mut storage = Storage::default();
        storage.set_labels(ElementType::Partition, vec![(2, String::new())]);
        let p = storage.get(ElementType::Partition, 2).unwrap();
        assert_eq!(p.label, "Partition 2");
        assert_eq!(p.key, "Partition_2");
        assert_eq!(p.get("current_state"), Some(&json!("disarmed")));
    }

    #[test]
    fn test_update_emits_only_differences() {
        let mut storage = storage_with_zones();
        let changes = storage.update_container_object(ElementType::Zone, 1, attrs(json!({"open": true})));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].key, "Front_Door");
        assert_eq!(changes[0].property, "open");
        assert_eq!(changes[0].old_value, Some(json!(false)));
        assert!(changes[0].initial);

        let again = storage.update_container_object(ElementType::Zone, 1, attrs(json!({"open": true})));
        assert!(again.is_empty());
    }

    #[test]
    fn test_private_attributes_are_silent() {
        let mut storage = storage_with_zones();
        let changes = storage.update_container_object(ElementType::Zone, 1, attrs(json!({"_raw": 5})));
        assert!(changes.is_empty());
        let zone = storage.get(ElementType::Zone, 1).unwrap();
        assert_eq!(zone.get("_raw"), Some(&json!(5)));
        assert!(zone.to_json().get("_raw").is_none());
    }

    #[test]
    fn test_missing_element_is_ignored() {
        let mut storage = storage_with_zones();
        let changes = storage.update_container_object(ElementType::Zone, 42, attrs(json!({"open": true})));
        assert!(changes.is_empty());
        assert!(storage.get(ElementType::Zone, 42).is_none());
    }

    #[test]
    fn test_system_submaps_and_power_push() {
        let mut storage = Storage::new(true, false);
        let power = attrs(json!({"power": {"vdc": 13.8, "battery": 13.5, "dc": 13.6}}));
        let changes = storage.update_container_object(ElementType::System, SYSTEM_ID, power.clone());
        assert_eq!(changes.len(), 3);
        assert!(changes.iter().all(|c| c.key == "power"));
        storage.mark_initial_done();

        let changes = storage.update_container_object(ElementType::System, SYSTEM_ID, power);
        assert_eq!(changes.len(), 3);
        assert!(!changes[0].initial);

        let troubles = attrs(json!({"troubles": {"ac_trouble": false}}));
        let changes = storage.update_container_object(ElementType::System, SYSTEM_ID, troubles.clone());
        assert_eq!(changes.len(), 1);
        let changes = storage.update_container_object(ElementType::System, SYSTEM_ID, troubles);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_push_all() {
        let mut storage = Storage::new(false, true);
        storage.set_labels(ElementType::Pgm, vec![(1, "Gate".to_string())]);
        let changes = storage.update_container_object(ElementType::Pgm, 1, attrs(json!({"on": false})));
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn test_select() {
        let storage = storage_with_zones();
        let limits = Limits::new(BTreeMap::from([(ElementType::Zone, vec![1, 3])]));
        assert_eq!(storage.select(ElementType::Zone, &Selector::from("all"), &limits), vec![1, 3]);
        assert_eq!(storage.select(ElementType::Zone, &Selector::from("0"), &Limits::default()), vec![1, 2, 3]);
        assert_eq!(storage.select(ElementType::Zone, &Selector::from("2"), &limits), vec![2]);
        assert_eq!(storage.select(ElementType::Zone, &Selector::from("Office"), &limits), vec![2]);
        assert!(storage.select(ElementType::Zone, &Selector::from("Garage"), &limits).is_empty());
    }

    #[test]
    fn test_relabel_keeps_attributes() {
        let mut storage = storage_with_zones();
        storage.update_container_object(ElementType::Zone, 1, attrs(json!({"open": true})));
        storage.set_labels(ElementType::Zone, vec![(1, "Back Door".to_string())]);
        let zones = storage.container(ElementType::Zone).unwrap();
        assert!(zones.get_by_key("Front_Door").is_none());
        let zone = zones.get_by_key("Back_Door").unwrap();
        assert!(zone.get_bool("open"));
    }

    #[test]
    fn test_clear_restores_system() {
        let mut storage = storage_with_zones();
        storage.mark_initial_done();
        storage.clear();
        assert!(storage.container(ElementType::Zone).unwrap().is_empty());
        assert_eq!(storage.system().unwrap().key, "system");
        assert!(storage.is_initial());
        let labels = storage.labels_snapshot();
        assert_eq!(labels["system"]["1"]["key"], json!("system"));
    }
}
