use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::PathBuf;

use fontshelf::{logging, Config, Library};

/// Parsed command line.
struct Cli {
    config_path: Option<PathBuf>,
    library_root: Option<PathBuf>,
    command: Command,
}

enum Command {
    Sources,
    AddSource(PathBuf),
    RemoveSource(PathBuf),
    Rescan(PathBuf),
    Families,
    Activate(i64, bool),
    Tag {
        family_id: i64,
        column: String,
        values: Vec<String>,
    },
    Facets,
    SyncFacets(PathBuf),
    Reconcile,
    Stats,
    Scans(usize),
}

fn parse_args() -> Result<Cli> {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;
    let mut library_root = None;
    let mut rest: Vec<String> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("fontshelf {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    bail!("--config requires a path argument");
                }
            }
            "--library" | "-l" => {
                if i + 1 < args.len() {
                    library_root = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    bail!("--library requires a directory argument");
                }
            }
            _ => rest.extend(args[i..].iter().cloned()),
        }
        if !rest.is_empty() {
            break;
        }
        i += 1;
    }

    Ok(Cli {
        config_path,
        library_root,
        command: parse_command(&rest)?,
    })
}

fn parse_command(args: &[String]) -> Result<Command> {
    let Some(name) = args.first() else {
        print_help();
        std::process::exit(1);
    };
    let operand = |what: &str| -> Result<&String> {
        args.get(1)
            .with_context(|| format!("{} requires {}", name, what))
    };
    let face_id = || -> Result<i64> {
        operand("a face id")?
            .parse()
            .with_context(|| format!("Invalid face id: {}", args[1]))
    };

    let command = match name.as_str() {
        "sources" => Command::Sources,
        "add-source" => Command::AddSource(PathBuf::from(operand("a path")?)),
        "remove-source" => Command::RemoveSource(PathBuf::from(operand("a path")?)),
        "rescan" => Command::Rescan(PathBuf::from(operand("a path")?)),
        "families" => Command::Families,
        "activate" => Command::Activate(face_id()?, true),
        "deactivate" => Command::Activate(face_id()?, false),
        "tag" => {
            let family_id = operand("a family id")?
                .parse()
                .with_context(|| format!("Invalid family id: {}", args[1]))?;
            let column = args.get(2).context("tag requires a column key")?.clone();
            Command::Tag {
                family_id,
                column,
                values: args[3..].to_vec(),
            }
        }
        "facets" => Command::Facets,
        "sync-facets" => Command::SyncFacets(PathBuf::from(operand("a schema file")?)),
        "reconcile" => Command::Reconcile,
        "stats" => Command::Stats,
        "scans" => {
            let limit = match args.get(1) {
                Some(n) => n.parse().with_context(|| format!("Invalid limit: {}", n))?,
                None => 10,
            };
            Command::Scans(limit)
        }
        other => bail!("Unknown command: {} (see --help)", other),
    };
    Ok(command)
}

fn print_help() {
    println!(
        r#"fontshelf - Font library catalog

USAGE:
    fontshelf [OPTIONS] <COMMAND>

OPTIONS:
    --config, -c PATH    Path to config file
    --library, -l DIR    Library root (overrides library_root in config)
    --version, -V        Show version
    --help, -h           Show this help message

COMMANDS:
    sources                          List sources
    add-source PATH                  Add a font directory and scan it
    remove-source PATH               Disable a source (files are kept)
    rescan PATH                      Rescan a source
    families                         List families with faces and facets
    activate FACE_ID                 Activate a face
    deactivate FACE_ID               Deactivate a face
    tag FAMILY_ID COLUMN [VALUE...]  Set a family's values in a facet column
    facets                           List facet columns
    sync-facets FILE                 Sync facet schema from a .toml or .json file
    reconcile                        Repair drift against OS registrations
    stats                            Show catalog counts
    scans [LIMIT]                    Show recent scans (default 10)

ENVIRONMENT:
    FONTSHELF_CONFIG    Path to config file (overrides default location)
    FONTSHELF_LOG       Log filter (trace, debug, info, warn, error)

See also: fontshelf-daemon --help"#
    );
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = parse_args()?;
    let _ = logging::init_stderr();

    let mut config = match &cli.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(root) = cli.library_root {
        config.library_root = root;
    }

    let library = Library::open(&config.library_root, &config)?;
    run(&library, cli.command)?;
    library.close()
}

fn run(library: &Library, command: Command) -> Result<()> {
    match command {
        Command::Sources => print_json(&library.list_sources()?),
        Command::AddSource(path) => {
            let (source, scan) = library.add_source(&path)?;
            print_json(&serde_json::json!({ "source": source, "scan": scan }))
        }
        Command::RemoveSource(path) => {
            if !library.remove_source(&path)? {
                bail!("{} is not a source", path.display());
            }
            print_json(&serde_json::json!({ "removed": path }))
        }
        Command::Rescan(path) => print_json(&library.rescan_source(&path)?),
        Command::Families => print_json(&library.list_families()?),
        Command::Activate(face_id, desired) => {
            let activated = library.set_face_activated(face_id, desired)?;
            print_json(&serde_json::json!({ "face_id": face_id, "activated": activated }))
        }
        Command::Tag {
            family_id,
            column,
            values,
        } => {
            library.set_family_facet_values(family_id, &column, &values)?;
            print_json(&serde_json::json!({
                "family_id": family_id,
                "column": column,
                "values": values,
            }))
        }
        Command::Facets => print_json(&library.list_facet_columns()?),
        Command::SyncFacets(path) => print_json(&library.sync_facet_schema_file(&path)?),
        Command::Reconcile => print_json(&library.reconcile_activation_state()?),
        Command::Stats => print_json(&library.library_stats()?),
        Command::Scans(limit) => print_json(&library.recent_scans(limit)?),
    }
}
