use std::path::{Path, PathBuf};

use log::{error, info, warn};
use serde_json::Value;

use crate::codec::{Codec, select_codec};
use crate::context::{MetadataContext, MetadataKind, data_dir_for, load_context};
use crate::edit::{self, PendingEdit};
use crate::field::{Field, FieldKey, InventoryKind};
use crate::pins::{PinList, ResolvedPin, resolve_pins};
use crate::root::locate_root;
use crate::sections::{Section, SectionKind, build_sections};
use crate::store::write_atomically;

use super::error::{CoreError, CoreErrorCode};
use super::types::{LoadedSave, ProbeReport};

#[derive(Debug, Default, Clone, Copy)]
pub struct Engine;

/// One opened save: the parsed document, its metadata and the editing state.
///
/// Loading another save means opening a new session; nothing is shared.
#[derive(Debug)]
pub struct Session {
    savefile: PathBuf,
    rm_root: PathBuf,
    codec: Codec,
    context: MetadataContext,
    diagnostics: Vec<CoreError>,
    document: Value,
    sections: Vec<Section>,
    pins: PinList,
    pinned: Vec<ResolvedPin>,
    pending: Vec<PendingEdit>,
    rejected: Vec<CoreError>,
}

impl Engine {
    pub fn new() -> Self {
        Self
    }

    /// Locates the game root and codec for `path` without decoding anything.
    pub fn probe(&self, path: &Path) -> Result<ProbeReport, CoreError> {
        let rm_root = find_root(path)?;
        let selection = select_codec(path, &rm_root)?;
        let data_dir = data_dir_for(path);

        let mut diagnostics: Vec<String> = selection
            .diagnostic
            .iter()
            .map(ToString::to_string)
            .collect();
        let mut metadata_files = Vec::new();
        for kind in MetadataKind::ALL {
            if data_dir.join(kind.file_name()).is_file() {
                metadata_files.push(kind.file_name().to_string());
            } else {
                diagnostics.push(
                    CoreError::new(
                        CoreErrorCode::MetadataFileMissing,
                        format!("{} not found in {}", kind.file_name(), data_dir.display()),
                    )
                    .to_string(),
                );
            }
        }

        Ok(ProbeReport {
            savefile: path.to_path_buf(),
            library: selection.codec.library().map(Path::to_path_buf),
            codec: selection.codec.kind(),
            rm_root,
            data_dir,
            metadata_files,
            diagnostics,
        })
    }

    /// Decodes the save at `path` and gathers its metadata.
    pub fn load(&self, path: &Path) -> Result<LoadedSave, CoreError> {
        let rm_root = find_root(path)?;
        let selection = select_codec(path, &rm_root).inspect_err(|e| error!("{e}"))?;
        let json_txt = selection
            .codec
            .decode(path)
            .inspect_err(|e| error!("{e}"))?;

        let mut diagnostics: Vec<CoreError> = selection.diagnostic.into_iter().collect();
        let (context, context_diagnostics) = load_context(path);
        diagnostics.extend(context_diagnostics);

        info!(
            "loaded {} ({} codec, root {})",
            path.display(),
            selection.codec.kind(),
            rm_root.display()
        );
        Ok(LoadedSave {
            savefile: path.to_path_buf(),
            rm_root,
            json_txt,
            context,
            codec: selection.codec,
            diagnostics,
        })
    }

    pub fn open(&self, path: &Path) -> Result<Session, CoreError> {
        self.load(path).and_then(|loaded| self.open_loaded(loaded))
    }

    /// Parses a loaded save and reconstructs its sections.
    pub fn open_loaded(&self, loaded: LoadedSave) -> Result<Session, CoreError> {
        let mut document: Value = serde_json::from_str(&loaded.json_txt).map_err(|e| {
            let err = CoreError::new(
                CoreErrorCode::JsonParseFailed,
                format!("{}: {e}", loaded.savefile.display()),
            );
            error!("{err}");
            err
        })?;
        let sections = build_sections(&mut document, &loaded.context);

        Ok(Session {
            savefile: loaded.savefile,
            rm_root: loaded.rm_root,
            codec: loaded.codec,
            context: loaded.context,
            diagnostics: loaded.diagnostics,
            document,
            sections,
            pins: PinList::default(),
            pinned: Vec::new(),
            pending: Vec::new(),
            rejected: Vec::new(),
        })
    }

    /// Encodes `json_text` with the codec the destination calls for and
    /// writes it. Returns the path written.
    pub fn save(&self, path: &Path, json_text: &str, rm_root: &Path) -> Result<PathBuf, CoreError> {
        if path.as_os_str().is_empty() {
            return Err(CoreError::new(
                CoreErrorCode::NoDestination,
                "no destination chosen for save",
            ));
        }

        let selection = select_codec(path, rm_root).inspect_err(|e| error!("{e}"))?;
        let encoded = selection
            .codec
            .encode(json_text)
            .inspect_err(|e| error!("encoding {} failed: {e}", path.display()))?;
        write_atomically(path, &encoded).inspect_err(|e| error!("{e}"))?;

        info!("saved {} ({} codec)", path.display(), selection.codec.kind());
        Ok(path.to_path_buf())
    }

    /// Writes `json_text` as indented plain JSON, whatever the save's codec.
    pub fn dump(&self, json_text: &str, dest: &Path) -> Result<PathBuf, CoreError> {
        if dest.as_os_str().is_empty() {
            return Err(CoreError::new(
                CoreErrorCode::NoDestination,
                "no destination chosen for dump",
            ));
        }

        let value: Value = serde_json::from_str(json_text).map_err(|e| {
            CoreError::new(CoreErrorCode::JsonParseFailed, format!("dump input: {e}"))
        })?;
        let pretty = serde_json::to_string_pretty(&value).map_err(|e| {
            CoreError::new(CoreErrorCode::WriteFailed, format!("{}: {e}", dest.display()))
        })?;
        write_atomically(dest, &pretty).inspect_err(|e| error!("{e}"))?;

        info!("dumped raw JSON to {}", dest.display());
        Ok(dest.to_path_buf())
    }
}

fn find_root(path: &Path) -> Result<PathBuf, CoreError> {
    locate_root(path).ok_or_else(|| {
        let err = CoreError::new(
            CoreErrorCode::RootNotFound,
            format!("no game root above {}", path.display()),
        );
        error!("{err}");
        err
    })
}

impl Session {
    pub fn savefile(&self) -> &Path {
        &self.savefile
    }

    pub fn rm_root(&self) -> &Path {
        &self.rm_root
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn context(&self) -> &MetadataContext {
        &self.context
    }

    pub fn diagnostics(&self) -> &[CoreError] {
        &self.diagnostics
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, kind: SectionKind) -> Option<&Section> {
        self.sections.iter().find(|section| section.kind == kind)
    }

    /// Pinned fields that apply to this save, in display order.
    pub fn pinned(&self) -> &[ResolvedPin] {
        &self.pinned
    }

    /// Surfaces `pins` in this session. Pins that point at inventory entries
    /// the party lacks create them with quantity 0.
    pub fn apply_pins(&mut self, pins: PinList) -> &[ResolvedPin] {
        self.pins = pins;
        self.pinned = resolve_pins(&self.pins, &mut self.document);
        &self.pinned
    }

    /// Looks `key` up among the section fields and the pinned fields.
    pub fn field(&self, key: &FieldKey) -> Option<&Field> {
        self.sections
            .iter()
            .flat_map(Section::all_fields)
            .chain(self.pinned.iter().map(|resolved| &resolved.field))
            .find(|field| field.key == *key)
    }

    pub fn value(&self, key: &FieldKey) -> Option<&Value> {
        key.read(&self.document)
    }

    /// Queues `raw` for `key`. The value is coerced and written on the next
    /// [`Session::commit`], which [`Session::flatten`] runs first.
    pub fn stage_edit(&mut self, key: FieldKey, raw: impl Into<String>) -> Result<(), CoreError> {
        if self.field(&key).is_none() {
            return Err(CoreError::new(
                CoreErrorCode::UnknownField,
                format!("{key} is not an editable field of {}", self.savefile.display()),
            ));
        }
        self.pending.push(PendingEdit {
            key,
            raw: raw.into(),
        });
        Ok(())
    }

    pub fn pending_edits(&self) -> &[PendingEdit] {
        &self.pending
    }

    /// Edits dropped by the commits so far.
    pub fn rejected_edits(&self) -> &[CoreError] {
        &self.rejected
    }

    /// Writes every pending edit into the document in staging order. Edits
    /// that fail to coerce are dropped, logged and returned; the prior value
    /// stays.
    pub fn commit(&mut self) -> Vec<CoreError> {
        let pending = std::mem::take(&mut self.pending);
        if pending.is_empty() {
            return Vec::new();
        }

        let mut rejected = Vec::new();
        for PendingEdit { key, raw } in pending {
            let Some(field) = self.field(&key).cloned() else {
                rejected.push(CoreError::new(
                    CoreErrorCode::UnknownField,
                    format!("{key} disappeared before commit"),
                ));
                continue;
            };
            if let Err(e) = edit::commit(&mut self.document, &field, &raw) {
                warn!("dropping edit of {}: {e}", field.key);
                rejected.push(e);
            }
        }
        self.rebuild();
        self.rejected.extend(rejected.iter().cloned());
        rejected
    }

    /// Adds one of `id` to the party inventory and returns the new quantity.
    pub fn add_inventory_entry(&mut self, kind: InventoryKind, id: i64) -> Result<i64, CoreError> {
        let quantity = edit::add_inventory_entry(&mut self.document, kind, id)?;
        info!("{kind} {id} quantity now {quantity}");
        self.rebuild();
        Ok(quantity)
    }

    /// Returns false when the actor already knew the skill.
    pub fn add_skill(&mut self, actor: usize, skill: i64) -> Result<bool, CoreError> {
        let added = edit::learn_skill(&mut self.document, actor, skill)?;
        self.rebuild();
        Ok(added)
    }

    /// Returns false when the actor did not know the skill.
    pub fn remove_skill(&mut self, actor: usize, skill: i64) -> Result<bool, CoreError> {
        let removed = edit::forget_skill(&mut self.document, actor, skill)?;
        self.rebuild();
        Ok(removed)
    }

    /// Commits pending edits and serializes the document as compact JSON.
    /// Rejected edits are kept in `rejected_edits` and leave their fields untouched.
    pub fn flatten(&mut self) -> Result<String, CoreError> {
        let rejected = self.commit();
        if !rejected.is_empty() {
            warn!("{} staged edit(s) rejected while flattening", rejected.len());
        }
        serde_json::to_string(&self.document)
            .map_err(|e| CoreError::new(CoreErrorCode::WriteFailed, format!("serialize: {e}")))
    }

    /// Flattens and writes the save, to `dest` or over the loaded file. A new
    /// destination becomes the session's save file.
    pub fn save(&mut self, dest: Option<&Path>) -> Result<PathBuf, CoreError> {
        let json = self.flatten()?;
        let target = dest.unwrap_or(&self.savefile).to_path_buf();
        let written = Engine.save(&target, &json, &self.rm_root)?;
        if written != self.savefile {
            self.codec = select_codec(&written, &self.rm_root)?.codec;
            self.savefile = written.clone();
        }
        Ok(written)
    }

    /// Commits pending edits and writes the document as indented plain JSON.
    pub fn dump(&mut self, dest: &Path) -> Result<PathBuf, CoreError> {
        let json = self.flatten()?;
        Engine.dump(&json, dest)
    }

    fn rebuild(&mut self) {
        self.sections = build_sections(&mut self.document, &self.context);
        self.pinned = resolve_pins(&self.pins, &mut self.document);
    }
}
