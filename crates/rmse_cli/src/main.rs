use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgGroup, Args, Parser, Subcommand};
use log::{debug, warn};
use rmse_core::core_api::{Engine, Session};
use rmse_core::field::{Field, FieldKey, InventoryKind};
use rmse_core::pins::{PinList, PinnedField};
use rmse_core::sections::SectionKind;
use rmse_core::store::LocalStore;
use rmse_render::{
    SectionSelection, TextRenderOptions, render_json, render_pins_json, render_pins_text,
    render_probe_text, render_text_with_options,
};
use serde_json::Value as JsonValue;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Render the save's sections as text or JSON.
    Show {
        #[arg(value_name = "SAVE")]
        path: PathBuf,
        #[arg(long)]
        json: bool,
        #[arg(long = "section", value_name = "KIND", value_parser = parse_section)]
        sections: Vec<SectionKind>,
        #[arg(long)]
        verbose: bool,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Edit fields and write the save back.
    Set {
        #[arg(value_name = "SAVE")]
        path: PathBuf,
        #[arg(
            long = "field",
            value_name = "KEY=VALUE",
            value_parser = parse_assignment,
            required = true,
            allow_hyphen_values = true
        )]
        fields: Vec<(FieldKey, String)>,
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Add one of an item, weapon or armor to the party inventory.
    Add {
        #[arg(value_name = "SAVE")]
        path: PathBuf,
        #[arg(long, value_name = "item|weapon|armor", value_parser = parse_inventory_kind)]
        kind: InventoryKind,
        #[arg(long)]
        id: i64,
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Teach or remove an actor skill.
    #[command(group(ArgGroup::new("skill_action").required(true).args(["learn", "forget"])))]
    Skill {
        #[arg(value_name = "SAVE")]
        path: PathBuf,
        #[arg(long)]
        actor: usize,
        #[arg(long, value_name = "ID")]
        learn: Option<i64>,
        #[arg(long, value_name = "ID")]
        forget: Option<i64>,
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Write the decoded save as indented JSON.
    Dump {
        #[arg(value_name = "SAVE")]
        path: PathBuf,
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Report the game root, codec and metadata without decoding.
    Probe {
        #[arg(value_name = "SAVE")]
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Manage the pinned shortcut list.
    Pins {
        #[command(flatten)]
        store: StoreArgs,
        #[command(subcommand)]
        action: PinsCommand,
    },
}

#[derive(Debug, Subcommand)]
enum PinsCommand {
    List {
        #[arg(long)]
        json: bool,
    },
    Add {
        #[arg(value_name = "KEY", value_parser = parse_field_key)]
        key: FieldKey,
        #[arg(long)]
        name: Option<String>,
        /// Take the pin's name from this save's metadata.
        #[arg(long = "save", value_name = "SAVE")]
        save: Option<PathBuf>,
    },
    Remove {
        #[arg(value_name = "KEY", value_parser = parse_field_key)]
        key: FieldKey,
    },
}

#[derive(Debug, Args)]
struct StoreArgs {
    /// Pin store file (defaults to the user data directory).
    #[arg(id = "store", long = "store", value_name = "PATH", env = "RMSE_PIN_STORE", global = true)]
    path: Option<PathBuf>,
}

impl StoreArgs {
    fn resolve(&self) -> Option<PathBuf> {
        self.path.clone().or_else(default_store_path)
    }
}

fn default_store_path() -> Option<PathBuf> {
    let mut path = dirs::data_dir()?;
    path.push("rmse");
    path.push("store.json");
    Some(path)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Show {
            path,
            json,
            sections,
            verbose,
            store,
        } => run_show(&path, json, sections, verbose, &store),
        Command::Set {
            path,
            fields,
            output,
        } => run_set(&path, fields, output.as_deref()),
        Command::Add {
            path,
            kind,
            id,
            output,
        } => {
            let mut session = open_session(&path);
            let quantity = session.add_inventory_entry(kind, id).unwrap_or_else(|e| {
                eprintln!("Error adding {kind} {id}: {e}");
                process::exit(1);
            });
            println!("{kind} {id}: quantity {quantity}");
            save_session(&mut session, output.as_deref());
        }
        Command::Skill {
            path,
            actor,
            learn,
            forget,
            output,
        } => {
            let mut session = open_session(&path);
            let result = match (learn, forget) {
                (Some(skill), _) => session.add_skill(actor, skill).map(|added| {
                    if added {
                        println!("actor {actor} learned skill {skill}");
                    } else {
                        println!("actor {actor} already knows skill {skill}");
                    }
                }),
                (None, Some(skill)) => session.remove_skill(actor, skill).map(|removed| {
                    if removed {
                        println!("actor {actor} forgot skill {skill}");
                    } else {
                        println!("actor {actor} did not know skill {skill}");
                    }
                }),
                (None, None) => {
                    eprintln!("skill needs --learn ID or --forget ID");
                    process::exit(2);
                }
            };
            result.unwrap_or_else(|e| {
                eprintln!("Error editing skills of actor {actor}: {e}");
                process::exit(1);
            });
            save_session(&mut session, output.as_deref());
        }
        Command::Dump { path, output } => {
            let mut session = open_session(&path);
            let dest = output.unwrap_or_else(|| default_dump_path(&path));
            let written = session.dump(&dest).unwrap_or_else(|e| {
                eprintln!("Error writing {}: {e}", dest.display());
                process::exit(1);
            });
            println!("Wrote {}", written.display());
        }
        Command::Probe { path, json } => {
            let report = Engine::new().probe(&path).unwrap_or_else(|e| {
                eprintln!("Error probing {}: {e}", path.display());
                process::exit(1);
            });
            if json {
                print_json(&serde_json::to_value(&report).unwrap_or_else(|e| {
                    eprintln!("Error rendering JSON output: {e}");
                    process::exit(1);
                }));
            } else {
                print!("{}", render_probe_text(&report));
            }
        }
        Command::Pins { store, action } => run_pins(&store, action),
    }
}

fn run_show(
    path: &Path,
    json: bool,
    sections: Vec<SectionKind>,
    verbose: bool,
    store: &StoreArgs,
) {
    let mut session = open_session(path);
    match store.resolve() {
        Some(store_path) => {
            let store = open_store(&store_path);
            session.apply_pins(PinList::load(&store));
        }
        None => warn!("no data directory; pinned items are not shown"),
    }

    let selection = SectionSelection::only(sections);
    if json {
        print_json(&render_json(&session, &selection));
    } else {
        print!(
            "{}",
            render_text_with_options(&session, &selection, TextRenderOptions { verbose })
        );
    }
}

fn run_set(path: &Path, fields: Vec<(FieldKey, String)>, output: Option<&Path>) {
    let mut session = open_session(path);
    for (key, raw) in fields {
        session.stage_edit(key, raw).unwrap_or_else(|e| {
            eprintln!("Error staging edit: {e}");
            process::exit(1);
        });
    }

    let rejected = session.commit();
    save_session(&mut session, output);
    if !rejected.is_empty() {
        for e in &rejected {
            eprintln!("Rejected edit: {e}");
        }
        process::exit(1);
    }
}

fn run_pins(store: &StoreArgs, action: PinsCommand) {
    let Some(store_path) = store.resolve() else {
        eprintln!("No data directory for the pin store; pass --store <PATH>");
        process::exit(1);
    };
    let mut store = open_store(&store_path);
    let mut pins = PinList::load(&store);

    match action {
        PinsCommand::List { json } => {
            if json {
                print_json(&render_pins_json(&pins));
            } else {
                print!("{}", render_pins_text(&pins));
            }
            return;
        }
        PinsCommand::Add { key, name, save } => {
            let label = match (name, save) {
                (Some(name), _) => name,
                (None, Some(save)) => {
                    let session = open_session(&save);
                    match session.field(&key) {
                        Some(field) => field.label.clone(),
                        None => {
                            eprintln!("{key} does not exist in {}", save.display());
                            process::exit(1);
                        }
                    }
                }
                (None, None) => key.to_string(),
            };
            let shown = key.to_string();
            if pins.add(pin_for_key(key, label)) {
                println!("Pinned {shown}");
            } else {
                println!("{shown} is already pinned");
            }
        }
        PinsCommand::Remove { key } => {
            let pin = pin_for_key(key.clone(), String::new());
            if pins.remove(pin.kind, &pin.id.to_string()) {
                println!("Unpinned {key}");
            } else {
                println!("{key} is not pinned");
            }
        }
    }

    pins.save(&mut store).unwrap_or_else(|e| {
        eprintln!("Error saving pins to {}: {e}", store_path.display());
        process::exit(1);
    });
}

fn pin_for_key(key: FieldKey, label: String) -> PinnedField {
    let field = Field::new(key, label, &JsonValue::Null);
    PinnedField::for_field(&field).unwrap_or_else(|| {
        eprintln!(
            "{} cannot be pinned; only item, weapon, armor, variable and switch keys can",
            field.key
        );
        process::exit(2);
    })
}

fn open_session(path: &Path) -> Session {
    let session = Engine::new().open(path).unwrap_or_else(|e| {
        eprintln!("Error loading save file: {}", path.display());
        eprintln!("  {e}");
        process::exit(1);
    });
    for diagnostic in session.diagnostics() {
        debug!("load diagnostic: {diagnostic}");
    }
    session
}

fn open_store(path: &Path) -> LocalStore {
    LocalStore::open(path).unwrap_or_else(|e| {
        eprintln!("Error opening pin store {}: {e}", path.display());
        process::exit(1);
    })
}

fn save_session(session: &mut Session, output: Option<&Path>) {
    let written = session.save(output).unwrap_or_else(|e| {
        eprintln!("Error saving: {e}");
        process::exit(1);
    });
    println!("Saved {}", written.display());
}

fn print_json(value: &JsonValue) {
    let rendered = serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        eprintln!("Error rendering JSON output: {e}");
        process::exit(1);
    });
    println!("{rendered}");
}

/// `<SAVE>.json` next to the save.
fn default_dump_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".json");
    PathBuf::from(name)
}

fn parse_section(value: &str) -> Result<SectionKind, String> {
    SectionKind::from_name(value).ok_or_else(|| {
        format!(
            "invalid section '{value}', expected one of: common, characters, items, weapons, armor, variables, switches"
        )
    })
}

fn parse_inventory_kind(value: &str) -> Result<InventoryKind, String> {
    InventoryKind::from_name(&value.to_ascii_lowercase())
        .ok_or_else(|| format!("invalid kind '{value}', expected one of: item, weapon, armor"))
}

fn parse_field_key(value: &str) -> Result<FieldKey, String> {
    value.parse::<FieldKey>().map_err(|e| e.message)
}

fn parse_assignment(value: &str) -> Result<(FieldKey, String), String> {
    let Some((key, raw)) = value.split_once('=') else {
        return Err(format!("expected KEY=VALUE, got '{value}'"));
    };
    Ok((parse_field_key(key)?, raw.to_string()))
}
