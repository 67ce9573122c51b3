use std::fmt::Write as _;

use rmse_core::core_api::{ProbeReport, Session};
use rmse_core::document::display_value;
use rmse_core::field::{Field, ValueKind};
use rmse_core::pins::{PinId, PinList, ResolvedPin};
use rmse_core::sections::{AddableEntry, Character, Section, SectionKind, SkillEntry};
use serde_json::{Map as JsonMap, Value as JsonValue};

const LABEL_WIDTH: usize = 30;
const VALUE_WIDTH: usize = 12;
const STAT_LABEL_WIDTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextRenderOptions {
    /// Show field keys and the "add" lists.
    pub verbose: bool,
}

/// Which sections to render; empty means all of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionSelection {
    kinds: Vec<SectionKind>,
}

impl SectionSelection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn only(kinds: impl IntoIterator<Item = SectionKind>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
        }
    }

    pub fn includes(&self, kind: SectionKind) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&kind)
    }

    pub fn is_all(&self) -> bool {
        self.kinds.is_empty()
    }
}

pub fn render_json(session: &Session, selection: &SectionSelection) -> JsonValue {
    let mut out = JsonMap::new();
    out.insert(
        "savefile".to_string(),
        JsonValue::String(session.savefile().display().to_string()),
    );
    out.insert(
        "codec".to_string(),
        JsonValue::String(session.codec().kind().to_string()),
    );
    out.insert(
        "sections".to_string(),
        JsonValue::Array(
            session
                .sections()
                .iter()
                .filter(|section| selection.includes(section.kind))
                .map(|section| section_to_json(session, section))
                .collect(),
        ),
    );
    if selection.is_all() {
        out.insert(
            "pinned".to_string(),
            JsonValue::Array(
                session
                    .pinned()
                    .iter()
                    .map(|resolved| pinned_to_json(session, resolved))
                    .collect(),
            ),
        );
    }
    out.insert(
        "diagnostics".to_string(),
        JsonValue::Array(
            session
                .diagnostics()
                .iter()
                .map(|d| JsonValue::String(d.to_string()))
                .collect(),
        ),
    );
    JsonValue::Object(out)
}

fn section_to_json(session: &Session, section: &Section) -> JsonValue {
    let mut m = JsonMap::new();
    m.insert(
        "name".to_string(),
        JsonValue::String(section.kind.title().to_string()),
    );
    m.insert(
        "fields".to_string(),
        JsonValue::Array(
            section
                .fields
                .iter()
                .map(|field| field_to_json(session, field))
                .collect(),
        ),
    );
    if section.kind == SectionKind::Characters {
        m.insert(
            "characters".to_string(),
            JsonValue::Array(
                section
                    .characters
                    .iter()
                    .map(|character| character_to_json(session, character))
                    .collect(),
            ),
        );
    }
    if section.kind.inventory_kind().is_some() {
        m.insert("addable".to_string(), addable_to_json(&section.addable));
    }
    JsonValue::Object(m)
}

fn field_to_json(session: &Session, field: &Field) -> JsonValue {
    let mut m = JsonMap::new();
    m.insert("key".to_string(), JsonValue::String(field.key.to_string()));
    m.insert("label".to_string(), JsonValue::String(field.label.clone()));
    m.insert(
        "kind".to_string(),
        JsonValue::String(kind_name(field.kind).to_string()),
    );
    m.insert(
        "value".to_string(),
        field
            .value(session.document())
            .cloned()
            .unwrap_or(JsonValue::Null),
    );
    JsonValue::Object(m)
}

fn character_to_json(session: &Session, character: &Character) -> JsonValue {
    let mut m = JsonMap::new();
    m.insert("actor".to_string(), JsonValue::from(character.actor));
    m.insert("name".to_string(), JsonValue::String(character.name.clone()));
    m.insert(
        "stats".to_string(),
        JsonValue::Array(
            character
                .stats
                .iter()
                .map(|field| field_to_json(session, field))
                .collect(),
        ),
    );
    m.insert("skills".to_string(), skills_to_json(&character.skills));
    m.insert("learnable".to_string(), addable_to_json(&character.learnable));
    JsonValue::Object(m)
}

fn skills_to_json(skills: &[SkillEntry]) -> JsonValue {
    JsonValue::Array(
        skills
            .iter()
            .map(|s| {
                let mut m = JsonMap::new();
                m.insert("id".to_string(), JsonValue::from(s.id));
                m.insert("name".to_string(), JsonValue::String(s.name.clone()));
                m.insert("resolved".to_string(), JsonValue::Bool(s.resolved));
                JsonValue::Object(m)
            })
            .collect(),
    )
}

fn addable_to_json(entries: &[AddableEntry]) -> JsonValue {
    JsonValue::Array(
        entries
            .iter()
            .map(|e| {
                let mut m = JsonMap::new();
                m.insert("id".to_string(), JsonValue::from(e.id));
                m.insert("name".to_string(), JsonValue::String(e.name.clone()));
                JsonValue::Object(m)
            })
            .collect(),
    )
}

fn pinned_to_json(session: &Session, resolved: &ResolvedPin) -> JsonValue {
    let mut m = JsonMap::new();
    m.insert(
        "type".to_string(),
        JsonValue::String(resolved.pin.kind.to_string()),
    );
    m.insert("id".to_string(), pin_id_to_json(&resolved.pin.id));
    m.insert("name".to_string(), JsonValue::String(resolved.pin.name.clone()));
    m.insert(
        "key".to_string(),
        JsonValue::String(resolved.field.key.to_string()),
    );
    m.insert(
        "value".to_string(),
        resolved
            .field
            .value(session.document())
            .cloned()
            .unwrap_or(JsonValue::Null),
    );
    JsonValue::Object(m)
}

/// Numeric ids render as numbers; anything else stays a string.
fn pin_id_to_json(id: &PinId) -> JsonValue {
    match id.as_index() {
        Some(index) => JsonValue::from(index),
        None => JsonValue::String(id.to_string()),
    }
}

fn kind_name(kind: ValueKind) -> &'static str {
    match kind {
        ValueKind::Number => "number",
        ValueKind::Boolean => "boolean",
        ValueKind::Text => "text",
    }
}

pub fn render_text(session: &Session, selection: &SectionSelection) -> String {
    render_text_with_options(session, selection, TextRenderOptions::default())
}

pub fn render_text_with_options(
    session: &Session,
    selection: &SectionSelection,
    options: TextRenderOptions,
) -> String {
    let mut out = String::new();
    writeln!(
        &mut out,
        "{} ({})",
        session.savefile().display(),
        session.codec().kind()
    )
    .expect("writing to String cannot fail");
    for diagnostic in session.diagnostics() {
        writeln!(&mut out, "  ! {diagnostic}").expect("writing to String cannot fail");
    }

    if selection.is_all() && !session.pinned().is_empty() {
        write_header(&mut out, "Pinned");
        for resolved in session.pinned() {
            write_field_line(&mut out, session, &resolved.field, options, 2, LABEL_WIDTH);
        }
    }

    for section in session
        .sections()
        .iter()
        .filter(|section| selection.includes(section.kind))
    {
        write_header(&mut out, section.kind.title());
        for field in &section.fields {
            write_field_line(&mut out, session, field, options, 2, LABEL_WIDTH);
        }
        for character in &section.characters {
            write_character(&mut out, session, character, options);
        }
        if options.verbose && !section.addable.is_empty() {
            writeln!(
                &mut out,
                "  Add to inventory: {}",
                join_entries(&section.addable)
            )
            .expect("writing to String cannot fail");
        }
    }

    out
}

fn write_header(out: &mut String, title: &str) {
    writeln!(out).expect("writing to String cannot fail");
    writeln!(out, " ::: {title} :::").expect("writing to String cannot fail");
}

fn write_field_line(
    out: &mut String,
    session: &Session,
    field: &Field,
    options: TextRenderOptions,
    indent: usize,
    label_width: usize,
) {
    let value = field
        .value(session.document())
        .map(display_value)
        .unwrap_or_default();
    let mut line = format!(
        "{}{:<lw$} {:>vw$}",
        " ".repeat(indent),
        fit_column(&field.label, label_width),
        fit_column(&value, VALUE_WIDTH),
        lw = label_width,
        vw = VALUE_WIDTH
    );
    if options.verbose {
        write!(&mut line, "  [{}]", field.key).expect("writing to String cannot fail");
    }
    writeln!(out, "{}", line.trim_end()).expect("writing to String cannot fail");
}

fn write_character(
    out: &mut String,
    session: &Session,
    character: &Character,
    options: TextRenderOptions,
) {
    writeln!(out, "  {} (actor {})", character.name, character.actor)
        .expect("writing to String cannot fail");
    for stat in &character.stats {
        write_field_line(out, session, stat, options, 4, STAT_LABEL_WIDTH);
    }

    let skills = if character.skills.is_empty() {
        "(none)".to_string()
    } else {
        character
            .skills
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    writeln!(out, "    Skills: {skills}").expect("writing to String cannot fail");
    if options.verbose && !character.learnable.is_empty() {
        writeln!(out, "    Learnable: {}", join_entries(&character.learnable))
            .expect("writing to String cannot fail");
    }
}

fn join_entries(entries: &[AddableEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{} ({})", e.name, e.id))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn render_probe_text(report: &ProbeReport) -> String {
    let mut out = String::new();
    writeln!(&mut out, "Save:     {}", report.savefile.display())
        .expect("writing to String cannot fail");
    writeln!(&mut out, "Root:     {}", report.rm_root.display())
        .expect("writing to String cannot fail");
    match &report.library {
        Some(library) => writeln!(
            &mut out,
            "Codec:    {} ({})",
            report.codec,
            library.display()
        ),
        None => writeln!(&mut out, "Codec:    {}", report.codec),
    }
    .expect("writing to String cannot fail");
    writeln!(&mut out, "Data:     {}", report.data_dir.display())
        .expect("writing to String cannot fail");
    writeln!(
        &mut out,
        "Metadata: {}",
        if report.metadata_files.is_empty() {
            "(none)".to_string()
        } else {
            report.metadata_files.join(", ")
        }
    )
    .expect("writing to String cannot fail");
    for diagnostic in &report.diagnostics {
        writeln!(&mut out, "  ! {diagnostic}").expect("writing to String cannot fail");
    }
    out
}

/// One line per pin, in display order.
pub fn render_pins_text(pins: &PinList) -> String {
    let mut out = String::new();
    for pin in pins.sorted() {
        writeln!(
            &mut out,
            "{:<9}{:>6}  {}",
            pin.kind.as_str(),
            pin.id.to_string(),
            pin.name
        )
        .expect("writing to String cannot fail");
    }
    out
}

pub fn render_pins_json(pins: &PinList) -> JsonValue {
    JsonValue::Array(
        pins.sorted()
            .into_iter()
            .map(|pin| {
                let mut m = JsonMap::new();
                m.insert("type".to_string(), JsonValue::String(pin.kind.to_string()));
                m.insert("id".to_string(), pin_id_to_json(&pin.id));
                m.insert("name".to_string(), JsonValue::String(pin.name.clone()));
                JsonValue::Object(m)
            })
            .collect(),
    )
}

fn fit_column(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    if width <= 3 {
        return value.chars().take(width).collect();
    }

    let mut out: String = value.chars().take(width - 3).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::fit_column;

    #[test]
    fn long_labels_are_truncated_with_ellipsis() {
        assert_eq!(fit_column("Potion", 10), "Potion");
        assert_eq!(fit_column("Extremely Long Name", 10), "Extreme...");
        assert_eq!(fit_column("abcdef", 2), "ab");
    }
}
