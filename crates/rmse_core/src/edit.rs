//! Turning raw user input into document values, plus the structural edits the
//! editor offers (adding inventory entries, learning and forgetting skills).

use log::{debug, warn};
use serde_json::Value;

use crate::core_api::{CoreError, CoreErrorCode};
use crate::document::{dense_array_mut, number_value};
use crate::field::{Field, FieldKey, FieldRole, InventoryKind, ValueKind, inventory_map_mut};
use crate::sections::{normalise_skills, quantity_of};

/// A value waiting to be committed into the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEdit {
    pub key: FieldKey,
    pub raw: String,
}

/// Converts `raw` to the value `field` stores.
///
/// Numbers are trimmed and parsed (empty input is 0); integral results are
/// stored as integers and inventory quantities are clamped at 0. Booleans
/// accept `true`/`false` in any case, with `0` and the empty string false and
/// any other text true. Text is stored verbatim.
pub fn coerce_input(field: &Field, raw: &str) -> Result<Value, CoreError> {
    match field.kind {
        ValueKind::Number => {
            let trimmed = raw.trim();
            let mut number = if trimmed.is_empty() {
                0.0
            } else {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|n| n.is_finite())
                    .ok_or_else(|| {
                        CoreError::new(
                            CoreErrorCode::InvalidEdit,
                            format!("'{raw}' is not a number ({})", field.key),
                        )
                    })?
            };
            if field.role == FieldRole::Inventory {
                number = number.max(0.0);
            }
            number_value(number).ok_or_else(|| {
                CoreError::new(
                    CoreErrorCode::InvalidEdit,
                    format!("'{raw}' cannot be stored ({})", field.key),
                )
            })
        }
        ValueKind::Boolean => Ok(Value::Bool(parse_flag(raw))),
        ValueKind::Text => Ok(Value::String(raw.to_string())),
    }
}

fn parse_flag(raw: &str) -> bool {
    let lower = raw.to_lowercase();
    lower == "true" || (!raw.is_empty() && lower != "false" && raw != "0")
}

/// Coerces and stores one edit. On error the document is left untouched.
pub fn commit(doc: &mut Value, field: &Field, raw: &str) -> Result<(), CoreError> {
    let value = coerce_input(field, raw)?;
    if field.value(doc) == Some(&value) {
        return Ok(());
    }
    debug!("{} <- {value}", field.key);
    field.key.write(doc, value)
}

/// Adds one of `id` to the party's `kind` inventory: a held quantity goes up
/// by one, otherwise it becomes 1. The quantity map is created when missing.
pub fn add_inventory_entry(doc: &mut Value, kind: InventoryKind, id: i64) -> Result<i64, CoreError> {
    let map = inventory_map_mut(doc, kind).ok_or_else(|| {
        CoreError::new(
            CoreErrorCode::UnknownField,
            format!("save has no party to add {kind} {id} to"),
        )
    })?;
    let slot = map.entry(id.to_string()).or_insert(Value::Null);
    let held = quantity_of(slot).filter(|q| *q > 0.0);
    let quantity = match held {
        Some(q) => q.trunc() as i64 + 1,
        None => 1,
    };
    *slot = Value::from(quantity);
    Ok(quantity)
}

/// Adds `skill` to the actor's learned skills. Returns false when it was
/// already learned.
pub fn learn_skill(doc: &mut Value, actor: usize, skill: i64) -> Result<bool, CoreError> {
    normalise_skills(doc, actor);
    let record = actor_record_mut(doc, actor)?;
    let skills = record
        .entry("_skills")
        .or_insert_with(|| Value::Array(Vec::new()));
    if !skills.is_array() {
        warn!("actor {actor} had a non-list _skills; replacing it");
        *skills = Value::Array(Vec::new());
    }
    let Some(skills) = skills.as_array_mut() else {
        return Ok(false);
    };
    if skills.iter().any(|learned| learned.as_i64() == Some(skill)) {
        return Ok(false);
    }
    skills.push(Value::from(skill));
    Ok(true)
}

/// Removes `skill` from the actor's learned skills. Returns false when it was
/// not learned.
pub fn forget_skill(doc: &mut Value, actor: usize, skill: i64) -> Result<bool, CoreError> {
    normalise_skills(doc, actor);
    let record = actor_record_mut(doc, actor)?;
    let Some(skills) = record.get_mut("_skills").and_then(Value::as_array_mut) else {
        return Ok(false);
    };
    let before = skills.len();
    skills.retain(|learned| learned.as_i64() != Some(skill));
    Ok(skills.len() != before)
}

fn actor_record_mut(
    doc: &mut Value,
    actor: usize,
) -> Result<&mut serde_json::Map<String, Value>, CoreError> {
    doc.get_mut("actors")
        .and_then(|actors| dense_array_mut(actors, "_data"))
        .and_then(|records| records.get_mut(actor))
        .filter(|_| actor > 0)
        .and_then(Value::as_object_mut)
        .ok_or_else(|| {
            CoreError::new(
                CoreErrorCode::UnknownField,
                format!("actor {actor} does not exist in this save"),
            )
        })
}
