use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core_api::{CoreError, CoreErrorCode};
use crate::document::{dense_array, dense_array_mut};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InventoryKind {
    Item,
    Weapon,
    Armor,
}

impl InventoryKind {
    pub const ALL: [Self; 3] = [Self::Item, Self::Weapon, Self::Armor];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Item => "item",
            Self::Weapon => "weapon",
            Self::Armor => "armor",
        }
    }

    /// Key of the quantity map under `party`.
    pub fn party_key(self) -> &'static str {
        match self {
            Self::Item => "_items",
            Self::Weapon => "_weapons",
            Self::Armor => "_armors",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.strip_suffix('s').unwrap_or(name) {
            "item" => Some(Self::Item),
            "weapon" => Some(Self::Weapon),
            "armor" => Some(Self::Armor),
            _ => None,
        }
    }
}

impl fmt::Display for InventoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorStat {
    Hp,
    Mp,
    Tp,
}

impl ActorStat {
    pub const ALL: [Self; 3] = [Self::Hp, Self::Mp, Self::Tp];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hp => "hp",
            Self::Mp => "mp",
            Self::Tp => "tp",
        }
    }

    pub fn record_key(self) -> &'static str {
        match self {
            Self::Hp => "_hp",
            Self::Mp => "_mp",
            Self::Tp => "_tp",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Hp => "Current HP",
            Self::Mp => "Current MP",
            Self::Tp => "Current TP",
        }
    }
}

/// Labels of the `_paramPlus` slots, in engine order.
pub const PARAM_LABELS: [&str; 8] = [
    "Max HP",
    "Max MP",
    "Attack",
    "Defense",
    "Magic Attack",
    "Magic Defense",
    "Agility",
    "Luck",
];

/// Address of one editable value inside the save document.
///
/// The textual form (`party:_gold`, `actor:1:param:2`, `item:7`, ...) is what
/// the CLI accepts and what [`FromStr`] parses.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldKey {
    Party(String),
    ActorCurrent { actor: usize, stat: ActorStat },
    ActorParam { actor: usize, slot: usize },
    Inventory { kind: InventoryKind, id: i64 },
    Variable(usize),
    Switch(usize),
}

impl FieldKey {
    pub fn role(&self) -> FieldRole {
        match self {
            Self::Party(_) => FieldRole::Value,
            Self::ActorCurrent { .. } | Self::ActorParam { .. } => FieldRole::Stat,
            Self::Inventory { .. } => FieldRole::Inventory,
            Self::Variable(_) => FieldRole::Variable,
            Self::Switch(_) => FieldRole::Switch,
        }
    }

    /// Current value at this address. `None` when the address does not exist.
    pub fn read<'a>(&self, doc: &'a Value) -> Option<&'a Value> {
        match self {
            Self::Party(name) => doc.get("party")?.get(name),
            Self::ActorCurrent { actor, stat } => {
                actor_record(doc, *actor)?.get(stat.record_key())
            }
            Self::ActorParam { actor, slot } => {
                actor_record(doc, *actor)?.get("_paramPlus")?.get(*slot)
            }
            Self::Inventory { kind, id } => doc
                .get("party")?
                .get(kind.party_key())?
                .get(id.to_string()),
            Self::Variable(index) => dense_array(doc.get("variables")?, "_data")?.get(*index),
            Self::Switch(index) => dense_array(doc.get("switches")?, "_data")?.get(*index),
        }
    }

    /// Stores `value` at this address, creating the leaf slot when its
    /// container exists. Fails with `UnknownField` when the container is gone.
    pub fn write(&self, doc: &mut Value, value: Value) -> Result<(), CoreError> {
        let slot = match self {
            Self::Party(name) => doc
                .get_mut("party")
                .and_then(Value::as_object_mut)
                .map(|party| party.entry(name.clone()).or_insert(Value::Null)),
            Self::ActorCurrent { actor, stat } => actor_record_mut(doc, *actor)
                .and_then(Value::as_object_mut)
                .map(|record| record.entry(stat.record_key()).or_insert(Value::Null)),
            Self::ActorParam { actor, slot } => actor_record_mut(doc, *actor)
                .and_then(Value::as_object_mut)
                .map(|record| {
                    let params = record
                        .entry("_paramPlus")
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if !params.is_array() {
                        *params = Value::Array(Vec::new());
                    }
                    params
                })
                .and_then(Value::as_array_mut)
                .map(|params| {
                    if params.len() <= *slot {
                        params.resize(*slot + 1, Value::from(0));
                    }
                    &mut params[*slot]
                }),
            Self::Inventory { kind, id } => inventory_map_mut(doc, *kind)
                .map(|map| map.entry(id.to_string()).or_insert(Value::Null)),
            Self::Variable(index) => doc
                .get_mut("variables")
                .and_then(|variables| dense_array_mut(variables, "_data"))
                .and_then(|data| data.get_mut(*index)),
            Self::Switch(index) => doc
                .get_mut("switches")
                .and_then(|switches| dense_array_mut(switches, "_data"))
                .and_then(|data| data.get_mut(*index)),
        };

        match slot {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(CoreError::new(
                CoreErrorCode::UnknownField,
                format!("{self} does not exist in this save"),
            )),
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Party(name) => write!(f, "party:{name}"),
            Self::ActorCurrent { actor, stat } => write!(f, "actor:{actor}:{}", stat.as_str()),
            Self::ActorParam { actor, slot } => write!(f, "actor:{actor}:param:{slot}"),
            Self::Inventory { kind, id } => write!(f, "{kind}:{id}"),
            Self::Variable(index) => write!(f, "variable:{index}"),
            Self::Switch(index) => write!(f, "switch:{index}"),
        }
    }
}

impl FromStr for FieldKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            CoreError::new(
                CoreErrorCode::UnknownField,
                format!("unrecognised field key '{s}'"),
            )
        };
        let parts: Vec<&str> = s.trim().split(':').collect();
        let key = match parts.as_slice() {
            ["party", name] if !name.is_empty() => Self::Party((*name).to_string()),
            ["actor", actor, "param", slot] => Self::ActorParam {
                actor: actor.parse().map_err(|_| invalid())?,
                slot: slot
                    .parse()
                    .ok()
                    .filter(|slot| *slot < PARAM_LABELS.len())
                    .ok_or_else(invalid)?,
            },
            ["actor", actor, stat] => Self::ActorCurrent {
                actor: actor.parse().map_err(|_| invalid())?,
                stat: ActorStat::ALL
                    .into_iter()
                    .find(|candidate| candidate.as_str() == *stat)
                    .ok_or_else(invalid)?,
            },
            ["variable", index] => Self::Variable(index.parse().map_err(|_| invalid())?),
            ["switch", index] => Self::Switch(index.parse().map_err(|_| invalid())?),
            [kind, id] => Self::Inventory {
                kind: InventoryKind::from_name(kind).ok_or_else(invalid)?,
                id: id.parse().map_err(|_| invalid())?,
            },
            _ => return Err(invalid()),
        };
        Ok(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    Number,
    Boolean,
    Text,
}

impl ValueKind {
    /// Kind of an existing value; `None` for null and missing values.
    pub fn of(value: Option<&Value>) -> Option<Self> {
        match value? {
            Value::Number(_) => Some(Self::Number),
            Value::Bool(_) => Some(Self::Boolean),
            Value::String(_) => Some(Self::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldRole {
    Value,
    Stat,
    Inventory,
    Variable,
    Switch,
}

/// One labelled, typed, editable value. The value itself lives in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub key: FieldKey,
    pub label: String,
    pub kind: ValueKind,
    pub role: FieldRole,
}

impl Field {
    /// Builds a field, inferring its kind from the value currently stored.
    pub fn new(key: FieldKey, label: impl Into<String>, doc: &Value) -> Self {
        let role = key.role();
        let kind = match role {
            FieldRole::Switch => ValueKind::Boolean,
            FieldRole::Stat | FieldRole::Inventory | FieldRole::Variable => {
                ValueKind::of(key.read(doc)).unwrap_or(ValueKind::Number)
            }
            FieldRole::Value => ValueKind::of(key.read(doc)).unwrap_or(ValueKind::Text),
        };
        Self {
            key,
            label: label.into(),
            kind,
            role,
        }
    }

    pub fn value<'a>(&self, doc: &'a Value) -> Option<&'a Value> {
        self.key.read(doc)
    }
}

fn actor_record(doc: &Value, actor: usize) -> Option<&Value> {
    dense_array(doc.get("actors")?, "_data")?
        .get(actor)
        .filter(|record| record.is_object())
}

fn actor_record_mut(doc: &mut Value, actor: usize) -> Option<&mut Value> {
    dense_array_mut(doc.get_mut("actors")?, "_data")?
        .get_mut(actor)
        .filter(|record| record.is_object())
}

/// Quantity map for `kind`, created when `party` exists but the map does not.
pub(crate) fn inventory_map_mut(doc: &mut Value, kind: InventoryKind) -> Option<&mut Map<String, Value>> {
    let party = doc.get_mut("party")?.as_object_mut()?;
    let map = party
        .entry(kind.party_key())
        .or_insert_with(|| Value::Object(Map::new()));
    if !map.is_object() {
        *map = Value::Object(Map::new());
    }
    map.as_object_mut()
}
