use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, warn};
use serde_json::Value;

use crate::core_api::{CoreError, CoreErrorCode};
use crate::document::parse_id;

/// Game metadata files read next to the save folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetadataKind {
    Items,
    Armors,
    Weapons,
    /// `System.json`, which holds the variable and switch name tables.
    System,
    Skills,
}

impl MetadataKind {
    pub const ALL: [Self; 5] = [
        Self::Items,
        Self::Armors,
        Self::Weapons,
        Self::System,
        Self::Skills,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            Self::Items => "Items.json",
            Self::Armors => "Armors.json",
            Self::Weapons => "Weapons.json",
            Self::System => "System.json",
            Self::Skills => "Skills.json",
        }
    }
}

/// Raw metadata text by kind. Built once per load and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataContext {
    texts: BTreeMap<MetadataKind, String>,
}

impl MetadataContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: MetadataKind, text: impl Into<String>) {
        self.texts.insert(kind, text.into());
    }

    pub fn text(&self, kind: MetadataKind) -> Option<&str> {
        self.texts.get(&kind).map(String::as_str)
    }

    pub fn kinds(&self) -> impl Iterator<Item = MetadataKind> + '_ {
        self.texts.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    /// Parsed id → descriptor table; empty when the file was not loaded.
    pub fn lookup(&self, kind: MetadataKind) -> LookupTable {
        self.text(kind).map(LookupTable::parse).unwrap_or_default()
    }

    pub fn system_names(&self) -> SystemNames {
        self.text(MetadataKind::System)
            .map(NameTable::parse_system)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Descriptor {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupTable {
    entries: BTreeMap<i64, Descriptor>,
}

impl LookupTable {
    /// Accepts the database layouts the engine writes:
    ///
    /// * an array led by `null` (the usual `Items.json` shape): entries keyed by
    ///   their `id`, falling back to the array index, with id 0 dropped;
    /// * any other array: keyed by `id` or index;
    /// * an object keyed by numeric strings.
    ///
    /// Unparseable text yields an empty table.
    pub fn parse(text: &str) -> Self {
        let parsed: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                error!("failed to parse metadata table: {e}");
                return Self::default();
            }
        };

        let mut entries = BTreeMap::new();
        match &parsed {
            Value::Array(items) => {
                let null_led = items.first().is_some_and(Value::is_null);
                for (index, item) in items.iter().enumerate() {
                    if item.is_null() {
                        continue;
                    }
                    let id = item.get("id").and_then(parse_id).unwrap_or(index as i64);
                    if null_led && id == 0 {
                        continue;
                    }
                    entries.insert(id, descriptor(item));
                }
            }
            Value::Object(map) => {
                for (key, item) in map {
                    match key.trim().parse::<i64>() {
                        Ok(id) => {
                            entries.insert(id, descriptor(item));
                        }
                        Err(_) => debug!("dropping non-numeric metadata key '{key}'"),
                    }
                }
            }
            _ => warn!("metadata table is neither an array nor an object"),
        }
        Self { entries }
    }

    pub fn get(&self, id: i64) -> Option<&Descriptor> {
        self.entries.get(&id)
    }

    /// Non-empty name for `id`.
    pub fn name(&self, id: i64) -> Option<&str> {
        self.get(id)
            .map(|descriptor| descriptor.name.as_str())
            .filter(|name| !name.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &Descriptor)> {
        self.entries.iter().map(|(id, descriptor)| (*id, descriptor))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn descriptor(item: &Value) -> Descriptor {
    Descriptor {
        name: item
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    }
}

/// Dense list of names indexed like the save's variable/switch arrays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameTable {
    names: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemNames {
    pub variables: NameTable,
    pub switches: NameTable,
}

impl NameTable {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Reads the `variables` and `switches` tables of `System.json`.
    pub fn parse_system(text: &str) -> SystemNames {
        let parsed: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                error!("failed to parse system metadata: {e}");
                return SystemNames::default();
            }
        };
        SystemNames {
            variables: Self::from_value(parsed.get("variables")),
            switches: Self::from_value(parsed.get("switches")),
        }
    }

    fn from_value(value: Option<&Value>) -> Self {
        let names = value
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|item| item.as_str().unwrap_or_default().to_string())
                    .collect()
            })
            .unwrap_or_default();
        Self { names }
    }

    /// Non-empty name at `index`.
    pub fn label(&self, index: usize) -> Option<&str> {
        self.names
            .get(index)
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Directory holding the metadata for the save at `save_path`: `<save dir>/../data`.
pub fn data_dir_for(save_path: &Path) -> PathBuf {
    let save_dir = save_path.parent().unwrap_or(Path::new(""));
    save_dir.join("..").join("data")
}

/// Loads every metadata file that exists. Missing or unreadable files are
/// reported as `MetadataFileMissing` diagnostics and never abort the load.
pub fn load_context(save_path: &Path) -> (MetadataContext, Vec<CoreError>) {
    let data_dir = data_dir_for(save_path);
    let mut context = MetadataContext::new();
    let mut diagnostics = Vec::new();

    if !data_dir.is_dir() {
        let diagnostic = CoreError::new(
            CoreErrorCode::MetadataFileMissing,
            format!(
                "no data directory for {} (expected {})",
                save_path.display(),
                data_dir.display()
            ),
        );
        warn!("{diagnostic}");
        diagnostics.push(diagnostic);
        return (context, diagnostics);
    }

    for kind in MetadataKind::ALL {
        let path = data_dir.join(kind.file_name());
        match fs::read_to_string(&path) {
            Ok(text) => {
                debug!("loaded {}", path.display());
                context.insert(kind, text);
            }
            Err(e) => {
                let diagnostic = CoreError::io(CoreErrorCode::MetadataFileMissing, &path, e);
                warn!("{diagnostic}");
                diagnostics.push(diagnostic);
            }
        }
    }

    (context, diagnostics)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{LookupTable, MetadataKind, NameTable, load_context};
    use crate::core_api::CoreErrorCode;
    use crate::test_support::temp_test_dir;

    #[test]
    fn null_led_arrays_key_by_id_and_drop_zero() {
        let table = LookupTable::parse(
            r#"[null, {"id": 1, "name": "Potion"}, {"id": 0, "name": "Bogus"}, null, {"name": "No id"}]"#,
        );
        assert_eq!(table.name(1), Some("Potion"));
        assert_eq!(table.get(0), None);
        assert_eq!(table.name(4), Some("No id"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn plain_arrays_keep_index_zero() {
        let table = LookupTable::parse(r#"[{"name": "Zero"}, {"id": 9, "name": "Nine"}]"#);
        assert_eq!(table.name(0), Some("Zero"));
        assert_eq!(table.name(9), Some("Nine"));
    }

    #[test]
    fn object_tables_drop_non_numeric_keys() {
        let table = LookupTable::parse(
            r#"{"1": {"name": "Potion"}, "2": {"name": "-hidden"}, "0": {"name": "ignored"}, "x": {"name": "junk"}}"#,
        );
        assert_eq!(table.len(), 3);
        assert_eq!(table.name(2), Some("-hidden"));
    }

    #[test]
    fn unparseable_text_gives_empty_table() {
        assert!(LookupTable::parse("{not json").is_empty());
        assert!(LookupTable::parse("42").is_empty());
    }

    #[test]
    fn system_names_tolerate_missing_tables() {
        let names = NameTable::parse_system(r#"{"variables": ["", "Quest", null]}"#);
        assert_eq!(names.variables.label(1), Some("Quest"));
        assert_eq!(names.variables.label(0), None);
        assert_eq!(names.variables.label(2), None);
        assert_eq!(names.variables.len(), 3);
        assert!(names.switches.is_empty());
    }

    #[test]
    fn missing_files_become_diagnostics() {
        let root = temp_test_dir("context_partial");
        let data = root.join("data");
        fs::create_dir_all(&data).expect("failed to create data dir");
        fs::create_dir_all(root.join("save")).expect("failed to create save dir");
        fs::write(data.join("Items.json"), "[null]").expect("failed to write items");
        fs::write(data.join("System.json"), "{}").expect("failed to write system");

        let (context, diagnostics) = load_context(&root.join("save").join("file1.rpgsave"));
        assert_eq!(
            context.kinds().collect::<Vec<_>>(),
            vec![MetadataKind::Items, MetadataKind::System]
        );
        assert_eq!(diagnostics.len(), 3);
        assert!(
            diagnostics
                .iter()
                .all(|d| d.code == CoreErrorCode::MetadataFileMissing)
        );

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_data_dir_gives_empty_context() {
        let root = temp_test_dir("context_no_data");
        fs::create_dir_all(root.join("save")).expect("failed to create save dir");

        let (context, diagnostics) = load_context(&root.join("save").join("file1.rpgsave"));
        assert!(context.is_empty());
        assert_eq!(diagnostics.len(), 1);

        let _ = fs::remove_dir_all(&root);
    }
}
