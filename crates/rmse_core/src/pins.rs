//! Pinned shortcuts: a persisted list of fields surfaced in every session.

use std::fmt;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core_api::{CoreError, CoreErrorCode};
use crate::document::dense_array_mut;
use crate::field::{Field, FieldKey, InventoryKind, inventory_map_mut};
use crate::store::LocalStore;

/// Store key holding the pinned list as JSON text.
pub const PINNED_ITEMS_KEY: &str = "rmsePinnedItems";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinKind {
    Item,
    Weapon,
    Armor,
    Variable,
    Switch,
}

impl PinKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Item => "item",
            Self::Weapon => "weapon",
            Self::Armor => "armor",
            Self::Variable => "variable",
            Self::Switch => "switch",
        }
    }

    /// Accepts singular and plural type names.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.strip_suffix('s').unwrap_or(name) {
            "item" => Some(Self::Item),
            "weapon" => Some(Self::Weapon),
            "armor" => Some(Self::Armor),
            "variable" => Some(Self::Variable),
            "switch" => Some(Self::Switch),
            _ => None,
        }
    }
}

impl fmt::Display for PinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<InventoryKind> for PinKind {
    fn from(kind: InventoryKind) -> Self {
        match kind {
            InventoryKind::Item => Self::Item,
            InventoryKind::Weapon => Self::Weapon,
            InventoryKind::Armor => Self::Armor,
        }
    }
}

/// Ids are stored the way they were pinned: inventory ids as strings, array
/// indices as numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PinId {
    Number(i64),
    Text(String),
}

impl PinId {
    pub fn as_index(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinnedField {
    #[serde(rename = "type")]
    pub kind: PinKind,
    pub id: PinId,
    pub name: String,
}

impl PinnedField {
    /// Pin describing `field`, when the field is of a pinnable kind.
    pub fn for_field(field: &Field) -> Option<Self> {
        let (kind, id) = match &field.key {
            FieldKey::Inventory { kind, id } => ((*kind).into(), PinId::Text(id.to_string())),
            FieldKey::Variable(index) => (PinKind::Variable, PinId::Number(*index as i64)),
            FieldKey::Switch(index) => (PinKind::Switch, PinId::Number(*index as i64)),
            _ => return None,
        };
        Some(Self {
            kind,
            id,
            name: field.label.clone(),
        })
    }

    pub fn field_key(&self) -> Option<FieldKey> {
        let id = self.id.as_index()?;
        Some(match self.kind {
            PinKind::Item => FieldKey::Inventory {
                kind: InventoryKind::Item,
                id,
            },
            PinKind::Weapon => FieldKey::Inventory {
                kind: InventoryKind::Weapon,
                id,
            },
            PinKind::Armor => FieldKey::Inventory {
                kind: InventoryKind::Armor,
                id,
            },
            PinKind::Variable => FieldKey::Variable(usize::try_from(id).ok()?),
            PinKind::Switch => FieldKey::Switch(usize::try_from(id).ok()?),
        })
    }

    fn matches(&self, kind: PinKind, id: &str) -> bool {
        self.kind == kind && self.id.to_string() == id
    }

    /// Field for this pin in `doc`, or `None` when the pin does not apply to
    /// this save. Pinned inventory entries the party lacks are created with
    /// quantity 0 and pinned switches without a value become `false`.
    pub fn resolve(&self, doc: &mut Value) -> Option<Field> {
        let key = self.field_key()?;
        match &key {
            FieldKey::Inventory { kind, id } => {
                // the quantity map must already exist
                doc.get("party")?.get(kind.party_key())?.as_object()?;
                inventory_map_mut(doc, *kind)?
                    .entry(id.to_string())
                    .or_insert_with(|| Value::from(0));
            }
            FieldKey::Variable(index) => {
                let data = dense_array_mut(doc.get_mut("variables")?, "_data")?;
                if *index == 0 || *index >= data.len() {
                    return None;
                }
            }
            FieldKey::Switch(index) => {
                let data = dense_array_mut(doc.get_mut("switches")?, "_data")?;
                if *index == 0 || *index >= data.len() {
                    return None;
                }
                if data[*index].is_null() {
                    data[*index] = Value::Bool(false);
                }
            }
            _ => return None,
        }
        Some(Field::new(key, self.name.clone(), doc))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct StoredPin {
    #[serde(rename = "type")]
    kind: String,
    id: PinId,
    name: Value,
}

/// The ordered pinned list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinList {
    pins: Vec<PinnedField>,
}

impl PinList {
    pub fn new(pins: Vec<PinnedField>) -> Self {
        Self { pins }
    }

    /// Reads the list from `store`. Malformed entries are dropped; a missing or
    /// unreadable list is empty.
    pub fn load(store: &LocalStore) -> Self {
        let Some(text) = store.get(PINNED_ITEMS_KEY) else {
            debug!("no pinned items stored");
            return Self::default();
        };
        let Ok(parsed) = serde_json::from_str::<Value>(text).inspect_err(|e| {
            error!("failed to parse pinned items: {e}");
        }) else {
            return Self::default();
        };
        let Value::Array(entries) = parsed else {
            warn!("stored pinned items are not a list");
            return Self::default();
        };

        let pins: Vec<PinnedField> = entries
            .into_iter()
            .filter_map(|entry| {
                let stored: StoredPin = serde_json::from_value(entry)
                    .inspect_err(|e| debug!("dropping malformed pin: {e}"))
                    .ok()?;
                let kind = PinKind::from_name(&stored.kind)?;
                let name = match stored.name {
                    Value::String(name) => name,
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                Some(PinnedField {
                    kind,
                    id: stored.id,
                    name,
                })
            })
            .collect();
        info!("loaded {} pinned items", pins.len());
        Self { pins }
    }

    pub fn save(&self, store: &mut LocalStore) -> Result<(), CoreError> {
        let text = serde_json::to_string(&self.pins).map_err(|e| {
            CoreError::new(
                CoreErrorCode::WriteFailed,
                format!("failed to serialize pinned items: {e}"),
            )
        })?;
        store.set(PINNED_ITEMS_KEY, text)
    }

    pub fn is_pinned(&self, kind: PinKind, id: &str) -> bool {
        self.pins.iter().any(|pin| pin.matches(kind, id))
    }

    /// Adds the pin unless one with the same type and id exists.
    pub fn add(&mut self, pin: PinnedField) -> bool {
        if self.is_pinned(pin.kind, &pin.id.to_string()) {
            return false;
        }
        self.pins.push(pin);
        true
    }

    pub fn remove(&mut self, kind: PinKind, id: &str) -> bool {
        let before = self.pins.len();
        self.pins.retain(|pin| !pin.matches(kind, id));
        self.pins.len() != before
    }

    /// Pins when absent, unpins when present. Returns whether it is now pinned.
    pub fn toggle(&mut self, pin: PinnedField) -> bool {
        if self.remove(pin.kind, &pin.id.to_string()) {
            return false;
        }
        self.pins.push(pin);
        true
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    /// Pins in display order: by type name, then by name.
    pub fn sorted(&self) -> Vec<&PinnedField> {
        let mut pins: Vec<&PinnedField> = self.pins.iter().collect();
        pins.sort_by(|a, b| {
            a.kind
                .as_str()
                .cmp(b.kind.as_str())
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
        pins
    }
}

/// A pin that applies to the current document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPin {
    pub pin: PinnedField,
    pub field: Field,
}

/// Resolves every pin against `doc` in display order. Pins that do not apply
/// are skipped, never removed from the list.
pub fn resolve_pins(pins: &PinList, doc: &mut Value) -> Vec<ResolvedPin> {
    pins.sorted()
        .into_iter()
        .filter_map(|pin| match pin.resolve(doc) {
            Some(field) => Some(ResolvedPin {
                pin: pin.clone(),
                field,
            }),
            None => {
                debug!("pinned {} {} ({}) is not in this save", pin.kind, pin.id, pin.name);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;

    use super::{PINNED_ITEMS_KEY, PinId, PinKind, PinList, PinnedField, resolve_pins};
    use crate::field::{FieldKey, InventoryKind, ValueKind};
    use crate::store::LocalStore;
    use crate::test_support::temp_test_dir;

    fn pin(kind: PinKind, id: PinId, name: &str) -> PinnedField {
        PinnedField {
            kind,
            id,
            name: name.to_string(),
        }
    }

    #[test]
    fn load_normalises_plurals_and_drops_malformed_entries() {
        let root = temp_test_dir("pins_load");
        let mut store = LocalStore::open(root.join("store.json")).expect("open store");
        store
            .set(
                PINNED_ITEMS_KEY,
                r#"[
                    {"type": "items", "id": "7", "name": "Elixir"},
                    {"type": "switch", "id": 3, "name": "Door"},
                    {"type": "variable", "name": "no id"},
                    {"type": "gem", "id": 1, "name": "Ruby"},
                    "junk",
                    null
                ]"#,
            )
            .expect("seed store");

        let pins = PinList::load(&store);
        assert_eq!(pins.len(), 2);
        assert!(pins.is_pinned(PinKind::Item, "7"));
        assert!(pins.is_pinned(PinKind::Switch, "3"));

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn unparseable_list_is_empty() {
        let root = temp_test_dir("pins_garbage");
        let mut store = LocalStore::open(root.join("store.json")).expect("open store");
        store.set(PINNED_ITEMS_KEY, "{oops").expect("seed store");
        assert!(PinList::load(&store).is_empty());
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn save_then_load_keeps_the_list() {
        let root = temp_test_dir("pins_persist");
        let mut store = LocalStore::open(root.join("store.json")).expect("open store");
        let mut pins = PinList::default();
        assert!(pins.add(pin(PinKind::Weapon, PinId::Text("2".into()), "Axe")));
        assert!(!pins.add(pin(PinKind::Weapon, PinId::Text("2".into()), "Axe again")));
        assert!(pins.add(pin(PinKind::Variable, PinId::Number(4), "Stage")));
        pins.save(&mut store).expect("save pins");

        let stored = store.get(PINNED_ITEMS_KEY).expect("pins stored");
        let value: serde_json::Value = serde_json::from_str(stored).expect("stored JSON");
        assert_eq!(value[0], json!({"type": "weapon", "id": "2", "name": "Axe"}));
        assert_eq!(value[1], json!({"type": "variable", "id": 4, "name": "Stage"}));

        assert_eq!(PinList::load(&store), pins);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn toggle_flips_membership() {
        let mut pins = PinList::default();
        assert!(pins.toggle(pin(PinKind::Switch, PinId::Number(1), "A")));
        assert!(!pins.toggle(pin(PinKind::Switch, PinId::Number(1), "A")));
        assert!(pins.is_empty());
    }

    #[test]
    fn display_order_is_type_then_name() {
        let pins = PinList::new(vec![
            pin(PinKind::Weapon, PinId::Text("1".into()), "Sword"),
            pin(PinKind::Item, PinId::Text("2".into()), "potion"),
            pin(PinKind::Armor, PinId::Text("3".into()), "Cap"),
            pin(PinKind::Item, PinId::Text("1".into()), "Elixir"),
        ]);
        let names: Vec<&str> = pins.sorted().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Cap", "Elixir", "potion", "Sword"]);
    }

    #[test]
    fn resolution_creates_missing_inventory_and_skips_foreign_pins() {
        let mut doc = json!({
            "party": {"_items": {"1": 4}},
            "variables": {"_data": [null, 10]},
            "switches": {"_data": [null, null]},
        });
        let pins = PinList::new(vec![
            pin(PinKind::Item, PinId::Text("9".into()), "Elixir"),
            pin(PinKind::Weapon, PinId::Text("1".into()), "Sword"),
            pin(PinKind::Variable, PinId::Number(1), "Stage"),
            pin(PinKind::Variable, PinId::Number(5), "Gone"),
            pin(PinKind::Switch, PinId::Number(1), "Door"),
        ]);

        let resolved = resolve_pins(&pins, &mut doc);
        let keys: Vec<FieldKey> = resolved.iter().map(|r| r.field.key.clone()).collect();
        assert_eq!(
            keys,
            vec![
                FieldKey::Inventory {
                    kind: InventoryKind::Item,
                    id: 9
                },
                FieldKey::Switch(1),
                FieldKey::Variable(1),
            ]
        );
        assert_eq!(doc["party"]["_items"]["9"], json!(0));
        assert_eq!(doc["switches"]["_data"][1], json!(false));
        assert!(doc["party"].get("_weapons").is_none());
        assert_eq!(resolved[0].field.kind, ValueKind::Number);
        assert_eq!(pins.len(), 5);
    }
}
