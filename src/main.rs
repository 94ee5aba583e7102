use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use topology_facts_lib::models::{ObjectRef, Snippet, Value};
use topology_facts_lib::services::{
    api, consistency, human_to_formula, render, spaces_matching, Database, Prover, Valuation,
};

// ─── CLI argument parsing ───────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "topobase")]
#[command(about = "Topobase — a deductive database of topological spaces and their properties")]
struct Cli {
    /// Path to the database snapshot (JSON)
    #[arg(short, long, global = true, default_value = "topobase.json")]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty database snapshot
    Init,

    /// List the spaces matching a formula, e.g. "compact + ~metrizable"
    Search {
        /// Human-form formula: atoms P, ~P, not P, P=V joined by + or |
        query: String,

        /// Match spaces where the formula evaluates to this instead
        #[arg(long, value_enum, default_value = "true")]
        target: Target,
    },

    /// Report every implication that has counterexamples
    Check,

    /// Print one of the read API collections as JSON
    Export {
        #[arg(value_enum)]
        collection: Collection,

        /// First trait index for the traits collection
        #[arg(long, default_value_t = 0)]
        start: usize,

        /// Last trait index (exclusive) for the traits collection
        #[arg(long)]
        end: Option<usize>,
    },

    /// Print the full proof graph of a trait as JSON
    Proof {
        trait_id: u32,
    },

    /// List the traits whose proofs depend on a trait
    Orphans {
        trait_id: u32,
    },

    /// Add a space (writes the database back)
    AddSpace {
        name: String,

        #[arg(long, default_value = "")]
        description: String,
    },

    /// Add a boolean property (writes the database back)
    AddProperty {
        name: String,

        #[arg(long, default_value = "")]
        description: String,
    },

    /// Assert a trait and run the prover (writes the database back)
    AddTrait {
        /// Space name or slug
        space: String,

        /// Property name or slug
        property: String,

        /// Value name, e.g. true or false
        value: String,

        #[arg(long, default_value = "")]
        description: String,
    },

    /// Add an implication after checking for counterexamples (writes the
    /// database back)
    AddImplication {
        /// Human-form antecedent
        antecedent: String,

        /// Human-form consequent
        consequent: String,

        /// Mark the implication as an equivalence
        #[arg(long)]
        reverses: bool,

        #[arg(long, default_value = "")]
        description: String,
    },

    /// Delete a trait, its dependent proofs, and re-derive (writes back)
    DeleteTrait {
        trait_id: u32,
    },

    /// Delete an implication and its dependent proofs (writes back)
    DeleteImplication {
        implication_id: u32,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Target {
    True,
    False,
    Unknown,
}

impl From<Target> for Valuation {
    fn from(t: Target) -> Valuation {
        match t {
            Target::True => Valuation::True,
            Target::False => Valuation::False,
            Target::Unknown => Valuation::Unknown,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Collection {
    Spaces,
    Properties,
    Traits,
    Implications,
}

// ─── Output types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ConsistencyIssue {
    implication_id: u32,
    implication: String,
    counterexamples: Vec<u32>,
}

// ─── Snapshot I/O ───────────────────────────────────────────────────────────

fn load_db(path: &Path) -> Result<Database, String> {
    let json = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read database {}: {}", path.display(), e))?;
    Database::from_json(&json).map_err(|e| e.to_string())
}

fn save_db(path: &Path, db: &Database) -> Result<(), String> {
    fs::write(path, db.to_json_pretty())
        .map_err(|e| format!("Failed to write database {}: {}", path.display(), e))
}

// ─── Commands ───────────────────────────────────────────────────────────────

fn cmd_init(path: &Path) -> Result<(), String> {
    if path.exists() {
        return Err(format!("{} already exists", path.display()));
    }
    save_db(path, &Database::new())?;
    eprintln!("Created empty database at {}", path.display());
    Ok(())
}

fn cmd_search(db: &Database, query: &str, target: Target) -> Result<(), String> {
    let formula = human_to_formula(db, query).map_err(|e| e.to_string())?;
    eprintln!("Matching {}", formula.render(Some(db), false));
    let matches = spaces_matching(db, &formula, target.into(), &db.space_ids());
    for id in matches {
        let space = db.space(id).ok_or_else(|| format!("no space {}", id))?;
        println!("{}\t{}", id, space.name);
    }
    Ok(())
}

fn cmd_check(db: &Database) -> Result<(), String> {
    let errors = consistency::check_consistency(db);
    if errors.is_empty() {
        eprintln!("No errors found.");
        return Ok(());
    }
    let issues: Vec<ConsistencyIssue> = errors
        .iter()
        .map(|(implication, spaces)| {
            Ok(ConsistencyIssue {
                implication_id: *implication,
                implication: db
                    .implication_name(*implication)
                    .map_err(|e| e.to_string())?,
                counterexamples: spaces.clone(),
            })
        })
        .collect::<Result<_, String>>()?;
    let json = serde_json::to_string_pretty(&issues)
        .map_err(|e| format!("JSON serialization error: {}", e))?;
    println!("{}", json);
    Err(format!("{} implications have counterexamples", issues.len()))
}

fn cmd_export(
    db: &Database,
    collection: Collection,
    start: usize,
    end: Option<usize>,
) -> Result<(), String> {
    let json = match collection {
        Collection::Spaces => serde_json::to_string_pretty(&api::spaces(db)),
        Collection::Properties => serde_json::to_string_pretty(&api::properties(db)),
        Collection::Traits => serde_json::to_string_pretty(&api::traits(db, start, end)),
        Collection::Implications => serde_json::to_string_pretty(&api::implications(db)),
    }
    .map_err(|e| format!("JSON serialization error: {}", e))?;
    println!("{}", json);
    Ok(())
}

fn cmd_proof(db: &Database, trait_id: u32) -> Result<(), String> {
    let nodes = render::get_full_proof(db, trait_id).map_err(|e| e.to_string())?;
    let json = serde_json::to_string_pretty(&nodes)
        .map_err(|e| format!("JSON serialization error: {}", e))?;
    println!("{}", json);
    Ok(())
}

fn cmd_orphans(db: &Database, trait_id: u32) -> Result<(), String> {
    for id in Prover::orphans(db, trait_id) {
        println!("{}\t{}", id, db.trait_name(id, true).map_err(|e| e.to_string())?);
    }
    Ok(())
}

fn cmd_add_space(db: &mut Database, name: &str, description: &str) -> Result<(), String> {
    let id = db.add_space(name);
    db.attach_snippet(Snippet::description(ObjectRef::Space(id), description))
        .map_err(|e| e.to_string())?;
    eprintln!("Added space {} ({})", name, id);
    Ok(())
}

fn cmd_add_property(db: &mut Database, name: &str, description: &str) -> Result<(), String> {
    let id = db.add_property(name);
    db.attach_snippet(Snippet::description(ObjectRef::Property(id), description))
        .map_err(|e| e.to_string())?;
    eprintln!("Added property {} ({})", name, id);
    Ok(())
}

fn cmd_add_trait(
    db: &mut Database,
    space: &str,
    property: &str,
    value: &str,
    description: &str,
) -> Result<(), String> {
    let space = db
        .find_space(space)
        .ok_or_else(|| format!("Unknown space: '{}'", space))?
        .id;
    let property = db
        .find_property(property)
        .ok_or_else(|| format!("Unknown property: '{}'", property))?
        .id;
    let value = match value.to_ascii_lowercase().as_str() {
        "true" | "+" => Value::TRUE,
        "false" | "-" | "~" => Value::FALSE,
        other => {
            db.find_value(other)
                .ok_or_else(|| format!("Unknown value: '{}'", other))?
                .id
        }
    };

    let before = db.traits().count();
    let id = Prover::add_trait(db, space, property, value, description)
        .map_err(|e| e.to_string())?;
    let derived = (db.traits().count() - before).saturating_sub(1);
    eprintln!(
        "Added trait {} ({}); derived {} further traits",
        db.trait_name(id, true).map_err(|e| e.to_string())?,
        id,
        derived
    );
    Ok(())
}

fn cmd_add_implication(
    db: &mut Database,
    antecedent: &str,
    consequent: &str,
    reverses: bool,
    description: &str,
) -> Result<(), String> {
    let ant = human_to_formula(db, antecedent).map_err(|e| e.to_string())?;
    let cons = human_to_formula(db, consequent).map_err(|e| e.to_string())?;

    let before = db.traits().count();
    let id = Prover::add_implication(db, ant, cons, description).map_err(|e| e.to_string())?;
    if reverses {
        db.set_reverses(id, true).map_err(|e| e.to_string())?;
    }
    eprintln!(
        "Added implication {} ({}); derived {} new traits",
        db.implication_name(id).map_err(|e| e.to_string())?,
        id,
        db.traits().count() - before
    );
    Ok(())
}

fn cmd_delete_trait(db: &mut Database, trait_id: u32) -> Result<(), String> {
    let orphaned = Prover::remove_trait(db, trait_id).map_err(|e| e.to_string())?;
    eprintln!(
        "Deleted trait {} and {} dependent traits; re-derived the rest",
        trait_id,
        orphaned.len()
    );
    Ok(())
}

fn cmd_delete_implication(db: &mut Database, implication_id: u32) -> Result<(), String> {
    let orphaned = Prover::remove_implication(db, implication_id).map_err(|e| e.to_string())?;
    eprintln!(
        "Deleted implication {} and {} dependent traits; re-derived the rest",
        implication_id,
        orphaned.len()
    );
    Ok(())
}

// ─── Entry point ────────────────────────────────────────────────────────────

fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Commands::Init => cmd_init(&cli.db),
        Commands::Search { query, target } => {
            let db = load_db(&cli.db)?;
            cmd_search(&db, &query, target)
        }
        Commands::Check => {
            let db = load_db(&cli.db)?;
            cmd_check(&db)
        }
        Commands::Export {
            collection,
            start,
            end,
        } => {
            let db = load_db(&cli.db)?;
            cmd_export(&db, collection, start, end)
        }
        Commands::Proof { trait_id } => {
            let db = load_db(&cli.db)?;
            cmd_proof(&db, trait_id)
        }
        Commands::Orphans { trait_id } => {
            let db = load_db(&cli.db)?;
            cmd_orphans(&db, trait_id)
        }
        Commands::AddSpace { name, description } => {
            let mut db = load_db(&cli.db)?;
            cmd_add_space(&mut db, &name, &description)?;
            save_db(&cli.db, &db)
        }
        Commands::AddProperty { name, description } => {
            let mut db = load_db(&cli.db)?;
            cmd_add_property(&mut db, &name, &description)?;
            save_db(&cli.db, &db)
        }
        Commands::AddTrait {
            space,
            property,
            value,
            description,
        } => {
            let mut db = load_db(&cli.db)?;
            cmd_add_trait(&mut db, &space, &property, &value, &description)?;
            save_db(&cli.db, &db)
        }
        Commands::AddImplication {
            antecedent,
            consequent,
            reverses,
            description,
        } => {
            let mut db = load_db(&cli.db)?;
            cmd_add_implication(&mut db, &antecedent, &consequent, reverses, &description)?;
            save_db(&cli.db, &db)
        }
        Commands::DeleteTrait { trait_id } => {
            let mut db = load_db(&cli.db)?;
            cmd_delete_trait(&mut db, trait_id)?;
            save_db(&cli.db, &db)
        }
        Commands::DeleteImplication { implication_id } => {
            let mut db = load_db(&cli.db)?;
            cmd_delete_implication(&mut db, implication_id)?;
            save_db(&cli.db, &db)
        }
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
