//! Reconstruction of named, typed sections from a decoded save plus its
//! metadata tables.

use std::cmp::Ordering;
use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::{LookupTable, MetadataContext, MetadataKind, NameTable};
use crate::document::{dense_array, dense_array_mut, parse_id, truthy};
use crate::field::{ActorStat, Field, FieldKey, InventoryKind, PARAM_LABELS};

pub const UNKNOWN_ACTOR_NAME: &str = "Unknown Name";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SectionKind {
    Common,
    Characters,
    Items,
    Weapons,
    Armor,
    Variables,
    Switches,
}

impl SectionKind {
    pub const ALL: [Self; 7] = [
        Self::Common,
        Self::Characters,
        Self::Items,
        Self::Weapons,
        Self::Armor,
        Self::Variables,
        Self::Switches,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::Common => "Common",
            Self::Characters => "Characters",
            Self::Items => "Items",
            Self::Weapons => "Weapons",
            Self::Armor => "Armor",
            Self::Variables => "Variables",
            Self::Switches => "Switches",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.title().eq_ignore_ascii_case(name))
            .or_else(|| match name.to_ascii_lowercase().as_str() {
                "characters" | "character" | "actors" | "party" => Some(Self::Characters),
                "armors" => Some(Self::Armor),
                _ => InventoryKind::from_name(name).map(Self::from),
            })
    }

    pub fn inventory_kind(self) -> Option<InventoryKind> {
        match self {
            Self::Items => Some(InventoryKind::Item),
            Self::Weapons => Some(InventoryKind::Weapon),
            Self::Armor => Some(InventoryKind::Armor),
            _ => None,
        }
    }
}

impl From<InventoryKind> for SectionKind {
    fn from(kind: InventoryKind) -> Self {
        match kind {
            InventoryKind::Item => Self::Items,
            InventoryKind::Weapon => Self::Weapons,
            InventoryKind::Armor => Self::Armor,
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// A metadata entry that can be added to the save (an inventory entry the
/// party lacks, or a skill an actor has not learned).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddableEntry {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillEntry {
    pub id: i64,
    pub name: String,
    /// False when the id is missing from the skill table.
    pub resolved: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Character {
    pub actor: usize,
    pub name: String,
    /// Current HP/MP/TP followed by the eight parameter bonuses.
    pub stats: Vec<Field>,
    pub skills: Vec<SkillEntry>,
    pub learnable: Vec<AddableEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub kind: SectionKind,
    pub fields: Vec<Field>,
    pub characters: Vec<Character>,
    pub addable: Vec<AddableEntry>,
}

impl Section {
    fn new(kind: SectionKind) -> Self {
        Self {
            kind,
            fields: Vec::new(),
            characters: Vec::new(),
            addable: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.characters.is_empty() && self.addable.is_empty()
    }

    /// Every field of the section, including character stats.
    pub fn all_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields
            .iter()
            .chain(self.characters.iter().flat_map(|c| c.stats.iter()))
    }
}

/// Derives the ordered sections of `doc`.
///
/// The document is normalised in place where the engine itself would:
/// learned skill ids become integers and switch flags become booleans padded
/// to the name table. Running it again on the result yields the same sections.
pub fn build_sections(doc: &mut Value, context: &MetadataContext) -> Vec<Section> {
    let mut sections = Vec::new();
    if !doc.is_object() {
        return sections;
    }

    let names = context.system_names();
    let candidates = [
        common_section(doc),
        characters_section(doc, &context.lookup(MetadataKind::Skills)),
        inventory_section(doc, InventoryKind::Item, &context.lookup(MetadataKind::Items)),
        inventory_section(doc, InventoryKind::Weapon, &context.lookup(MetadataKind::Weapons)),
        inventory_section(doc, InventoryKind::Armor, &context.lookup(MetadataKind::Armors)),
        variables_section(doc, &names.variables),
        switches_section(doc, &names.switches),
    ];
    for section in candidates.into_iter().flatten() {
        if section.is_empty() {
            debug!("omitting empty {} section", section.kind);
            continue;
        }
        sections.push(section);
    }
    sections
}

fn common_section(doc: &Value) -> Option<Section> {
    let party = doc.get("party")?.as_object()?;
    let mut section = Section::new(SectionKind::Common);
    for (key, label) in [("_gold", "Gold"), ("_steps", "Steps")] {
        if party.contains_key(key) {
            section
                .fields
                .push(Field::new(FieldKey::Party(key.to_string()), label, doc));
        }
    }
    Some(section)
}

fn characters_section(doc: &mut Value, skills: &LookupTable) -> Option<Section> {
    let actor_ids: Vec<usize> = {
        let members = dense_array(doc.get("party")?, "_actors")?;
        let records = dense_array(doc.get("actors")?, "_data")?;
        members
            .iter()
            .filter_map(parse_id)
            .filter_map(|id| usize::try_from(id).ok())
            .filter(|&id| id > 0 && records.get(id).is_some_and(Value::is_object))
            .collect()
    };

    for &actor in &actor_ids {
        normalise_skills(doc, actor);
    }

    let records = dense_array(doc.get("actors")?, "_data")?;
    let mut section = Section::new(SectionKind::Characters);
    for actor in actor_ids {
        let Some(record) = records.get(actor) else {
            continue;
        };
        section.characters.push(character(doc, actor, record, skills));
    }
    Some(section)
}

fn character(doc: &Value, actor: usize, record: &Value, skills: &LookupTable) -> Character {
    let name = record
        .get("_name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .unwrap_or(UNKNOWN_ACTOR_NAME)
        .to_string();

    let mut stats: Vec<Field> = ActorStat::ALL
        .into_iter()
        .map(|stat| Field::new(FieldKey::ActorCurrent { actor, stat }, stat.label(), doc))
        .collect();
    stats.extend(
        PARAM_LABELS
            .iter()
            .enumerate()
            .map(|(slot, label)| Field::new(FieldKey::ActorParam { actor, slot }, *label, doc)),
    );

    let learned: Vec<i64> = record
        .get("_skills")
        .and_then(Value::as_array)
        .map(|ids| ids.iter().filter_map(parse_id).collect())
        .unwrap_or_default();
    let skill_entries = learned
        .iter()
        .map(|&id| match skills.name(id) {
            Some(name) => SkillEntry {
                id,
                name: name.to_string(),
                resolved: true,
            },
            None => SkillEntry {
                id,
                name: format!("Skill ID: {id} (Unknown)"),
                resolved: false,
            },
        })
        .collect();

    let mut learnable: Vec<AddableEntry> = skills
        .iter()
        .filter(|(id, descriptor)| {
            *id > 0 && !descriptor.name.is_empty() && !learned.contains(id)
        })
        .map(|(id, descriptor)| AddableEntry {
            id,
            name: descriptor.name.clone(),
        })
        .collect();
    learnable.sort_by(by_name);

    Character {
        actor,
        name,
        stats,
        skills: skill_entries,
        learnable,
    }
}

/// Rewrites `_skills` as a list of integer ids, dropping entries that are not ids.
pub(crate) fn normalise_skills(doc: &mut Value, actor: usize) {
    let Some(skills) = doc
        .get_mut("actors")
        .and_then(|actors| dense_array_mut(actors, "_data"))
        .and_then(|records| records.get_mut(actor))
        .and_then(|record| record.get_mut("_skills"))
        .and_then(Value::as_array_mut)
    else {
        return;
    };
    let normalised: Vec<Value> = skills
        .iter()
        .filter_map(parse_id)
        .map(Value::from)
        .collect();
    if *skills != normalised {
        *skills = normalised;
    }
}

fn inventory_section(doc: &Value, kind: InventoryKind, table: &LookupTable) -> Option<Section> {
    let party = doc.get("party")?.as_object()?;
    let quantities = party.get(kind.party_key()).and_then(Value::as_object);
    let mut section = Section::new(kind.into());

    if let Some(quantities) = quantities {
        let mut ids: Vec<i64> = quantities
            .iter()
            .filter(|(_, quantity)| !quantity.is_null())
            .filter_map(|(key, _)| match key.trim().parse::<i64>() {
                Ok(id) => Some(id),
                Err(_) => {
                    debug!("skipping non-numeric {kind} key '{key}'");
                    None
                }
            })
            .collect();
        ids.sort_unstable();
        ids.dedup();
        section.fields = ids
            .into_iter()
            .map(|id| {
                let label = table.name(id).map_or_else(|| id.to_string(), str::to_string);
                Field::new(FieldKey::Inventory { kind, id }, label, doc)
            })
            .collect();
    }

    section.addable = table
        .iter()
        .filter(|(id, descriptor)| {
            *id != 0 && !descriptor.name.is_empty() && !descriptor.name.starts_with('-')
        })
        .filter(|(id, _)| {
            let held = quantities.and_then(|q| q.get(&id.to_string()));
            match held {
                None | Some(Value::Null) => true,
                Some(quantity) => quantity_of(quantity).is_some_and(|q| q <= 0.0),
            }
        })
        .map(|(id, descriptor)| AddableEntry {
            id,
            name: descriptor.name.clone(),
        })
        .collect();
    section.addable.sort_by(by_name);

    Some(section)
}

/// Numeric reading of a stored quantity; `None` when it is not a number.
pub(crate) fn quantity_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.trim().is_empty() => Some(0.0),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null => Some(0.0),
        _ => None,
    }
}

fn variables_section(doc: &Value, names: &NameTable) -> Option<Section> {
    let data = dense_array(doc.get("variables")?, "_data")?;
    let mut section = Section::new(SectionKind::Variables);
    for (index, value) in data.iter().enumerate().skip(1) {
        match value {
            Value::Null => continue,
            Value::Array(_) | Value::Object(_) => {
                debug!("skipping non-scalar variable {index}");
                continue;
            }
            _ => {}
        }
        let label = names
            .label(index)
            .map_or_else(|| format!("Variable {index}"), str::to_string);
        section
            .fields
            .push(Field::new(FieldKey::Variable(index), label, doc));
    }
    Some(section)
}

fn switches_section(doc: &mut Value, names: &NameTable) -> Option<Section> {
    let len = {
        let data = dense_array_mut(doc.get_mut("switches")?, "_data")?;
        if data.len() < names.len() {
            data.resize(names.len(), Value::Bool(false));
        }
        for value in data.iter_mut().skip(1) {
            if !value.is_boolean() {
                *value = Value::Bool(truthy(value));
            }
        }
        data.len()
    };

    let mut section = Section::new(SectionKind::Switches);
    for index in 1..len {
        let label = names
            .label(index)
            .map_or_else(|| format!("Switch {index}"), str::to_string);
        section
            .fields
            .push(Field::new(FieldKey::Switch(index), label, doc));
    }
    Some(section)
}

fn by_name(a: &AddableEntry, b: &AddableEntry) -> Ordering {
    a.name
        .to_lowercase()
        .cmp(&b.name.to_lowercase())
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::{AddableEntry, SectionKind, build_sections};
    use crate::context::{MetadataContext, MetadataKind};
    use crate::field::{FieldKey, FieldRole, InventoryKind, ValueKind};

    fn sample_context() -> MetadataContext {
        let mut context = MetadataContext::new();
        context.insert(
            MetadataKind::Items,
            r#"[null, {"id": 1, "name": "Potion"}, {"id": 2, "name": "Ether"}, {"id": 3, "name": "-divider"}]"#,
        );
        context.insert(
            MetadataKind::Weapons,
            r#"[null, {"id": 1, "name": "Sword"}]"#,
        );
        context.insert(
            MetadataKind::Skills,
            r#"[null, {"id": 1, "name": "Attack"}, {"id": 2, "name": "Guard"}, {"id": 3, "name": "Heal"}]"#,
        );
        context.insert(
            MetadataKind::System,
            r#"{"variables": ["", "Quest Stage", ""], "switches": ["", "Met King", "", "Door Open", ""]}"#,
        );
        context
    }

    fn sample_doc() -> Value {
        json!({
            "party": {
                "_gold": 100,
                "_steps": 42,
                "_actors": [1, "2", 9, 0],
                "_items": {"2": 5, "1": 0, "10": 1, "4": null},
                "_weapons": {},
            },
            "actors": {"_data": {"@a": [
                null,
                {"_name": "Harold", "_hp": 120, "_mp": 30, "_tp": 0, "_paramPlus": [0, 0, 5], "_skills": ["1", 3, "x"]},
                {"_hp": 80, "_mp": 10, "_tp": 0},
            ]}},
            "variables": {"_data": [null, 3, null, "door", [1, 2]]},
            "switches": {"_data": [null, 1, null]},
        })
    }

    #[test]
    fn sections_come_out_in_order() {
        let mut doc = sample_doc();
        let kinds: Vec<SectionKind> = build_sections(&mut doc, &sample_context())
            .iter()
            .map(|section| section.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                SectionKind::Common,
                SectionKind::Characters,
                SectionKind::Items,
                SectionKind::Weapons,
                SectionKind::Variables,
                SectionKind::Switches,
            ]
        );
    }

    #[test]
    fn characters_resolve_names_stats_and_skills() {
        let mut doc = sample_doc();
        let sections = build_sections(&mut doc, &sample_context());
        let characters = &sections[1].characters;
        assert_eq!(characters.len(), 2);

        let harold = &characters[0];
        assert_eq!(harold.actor, 1);
        assert_eq!(harold.name, "Harold");
        assert_eq!(harold.stats.len(), 11);
        assert_eq!(harold.stats[0].label, "Current HP");
        assert_eq!(harold.stats[10].label, "Luck");
        assert!(harold.stats.iter().all(|f| f.role == FieldRole::Stat));
        assert_eq!(
            harold.stats[5].key,
            FieldKey::ActorParam { actor: 1, slot: 2 }
        );
        assert_eq!(
            harold.skills.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            vec!["Attack", "Heal"]
        );
        assert_eq!(
            harold.learnable,
            vec![AddableEntry {
                id: 2,
                name: "Guard".to_string()
            }]
        );
        // skill ids were normalised in place
        assert_eq!(doc["actors"]["_data"]["@a"][1]["_skills"], json!([1, 3]));

        assert_eq!(characters[1].name, "Unknown Name");
    }

    #[test]
    fn unknown_skills_get_a_placeholder() {
        let mut doc = json!({
            "party": {"_actors": [1]},
            "actors": {"_data": [null, {"_name": "A", "_skills": [77]}]},
        });
        let sections = build_sections(&mut doc, &MetadataContext::new());
        let skill = &sections[0].characters[0].skills[0];
        assert_eq!(skill.name, "Skill ID: 77 (Unknown)");
        assert!(!skill.resolved);
    }

    #[test]
    fn inventory_fields_are_ordered_and_labelled() {
        let mut doc = sample_doc();
        let sections = build_sections(&mut doc, &sample_context());
        let items = &sections[2];
        let labels: Vec<&str> = items.fields.iter().map(|f| f.label.as_str()).collect();
        assert_eq!(labels, vec!["Potion", "Ether", "10"]);
        assert!(items.fields.iter().all(|f| f.kind == ValueKind::Number));
        // Potion is held at 0, so it can still be added
        assert_eq!(
            items.addable,
            vec![AddableEntry {
                id: 1,
                name: "Potion".to_string()
            }]
        );
    }

    #[test]
    fn addable_entries_skip_hidden_and_zero_ids() {
        let mut context = MetadataContext::new();
        context.insert(
            MetadataKind::Items,
            r#"{"1": {"name": "Potion"}, "2": {"name": "-hidden"}, "0": {"name": "ignored"}}"#,
        );
        let mut doc = json!({"party": {"_items": {}}});
        let sections = build_sections(&mut doc, &context);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].kind, SectionKind::Items);
        assert!(sections[0].fields.is_empty());
        assert_eq!(
            sections[0].addable,
            vec![AddableEntry {
                id: 1,
                name: "Potion".to_string()
            }]
        );
    }

    #[test]
    fn variables_skip_nulls_and_non_scalars() {
        let mut doc = sample_doc();
        let sections = build_sections(&mut doc, &sample_context());
        let variables = &sections[4];
        let summary: Vec<(String, ValueKind)> = variables
            .fields
            .iter()
            .map(|f| (f.label.clone(), f.kind))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Quest Stage".to_string(), ValueKind::Number),
                ("Variable 3".to_string(), ValueKind::Text),
            ]
        );
    }

    #[test]
    fn switches_are_padded_and_coerced() {
        let mut doc = sample_doc();
        let sections = build_sections(&mut doc, &sample_context());
        assert_eq!(
            doc["switches"]["_data"],
            json!([null, true, false, false, false])
        );
        let switches = &sections[5];
        let labels: Vec<&str> = switches.fields.iter().map(|f| f.label.as_str()).collect();
        assert_eq!(labels, vec!["Met King", "Switch 2", "Door Open", "Switch 4"]);
        assert!(
            switches
                .fields
                .iter()
                .all(|f| f.kind == ValueKind::Boolean && f.role == FieldRole::Switch)
        );
    }

    #[test]
    fn rebuilding_an_unmodified_document_is_stable() {
        let mut doc = sample_doc();
        let context = sample_context();
        let first = build_sections(&mut doc, &context);
        let snapshot = doc.clone();
        let second = build_sections(&mut doc, &context);
        assert_eq!(first, second);
        assert_eq!(doc, snapshot);
    }

    #[test]
    fn section_names_parse_loosely() {
        assert_eq!(SectionKind::from_name("items"), Some(SectionKind::Items));
        assert_eq!(SectionKind::from_name("Armors"), Some(SectionKind::Armor));
        assert_eq!(SectionKind::from_name("weapon"), Some(SectionKind::Weapons));
        assert_eq!(SectionKind::from_name("SWITCHES"), Some(SectionKind::Switches));
        assert_eq!(SectionKind::from_name("pinned"), None);
        assert_eq!(
            SectionKind::from(InventoryKind::Armor).inventory_kind(),
            Some(InventoryKind::Armor)
        );
    }
}
