//! `wls mapping` subcommands: list, add and remove source-to-destination
//! mappings, and browse a BambooHR project catalogue.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};
use wls_core::{Catalogue, DestProjectId, DestTaskId, MappingEntry, MappingKey, MappingOutcome};
use wls_db::Database;

#[derive(Debug, Subcommand)]
pub enum MappingCommand {
    /// List stored mappings.
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Add or replace a mapping.
    Add(AddArgs),

    /// Remove a mapping.
    Remove {
        /// Clockify project name.
        project: String,

        /// Clockify task name; omit for the project-level mapping.
        #[arg(long)]
        task: Option<String>,
    },

    /// Print the projects and tasks in a BambooHR `timesheetData` JSON file.
    Catalogue {
        /// File containing the `timesheetData` JSON.
        file: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Clockify project name.
    pub project: String,

    /// Clockify task name; omit to map every task of the project.
    #[arg(long)]
    pub task: Option<String>,

    /// BambooHR project id.
    #[arg(long, required_unless_present = "skip", conflicts_with = "skip")]
    pub project_id: Option<u64>,

    /// BambooHR task id.
    #[arg(long, requires = "project_id")]
    pub task_id: Option<u64>,

    /// Never push entries for this project/task.
    #[arg(long)]
    pub skip: bool,

    /// Validate the target against a `timesheetData` JSON file.
    #[arg(long)]
    pub catalogue: Option<PathBuf>,
}

impl AddArgs {
    fn entry(&self) -> Result<MappingEntry> {
        let target = match (self.skip, self.project_id) {
            (true, _) => MappingOutcome::Skip,
            (false, Some(project_id)) => MappingOutcome::Mapped {
                project_id: DestProjectId::new(project_id),
                task_id: self.task_id.map(DestTaskId::new),
            },
            (false, None) => bail!("--project-id is required unless --skip is given"),
        };
        Ok(MappingEntry::new(
            MappingKey::new(self.project.trim(), self.task.as_deref().map(str::trim)),
            target,
        ))
    }
}

pub fn run<W: Write>(writer: &mut W, db: &mut Database, command: &MappingCommand) -> Result<()> {
    match command {
        MappingCommand::List { json } => list(writer, db, *json),
        MappingCommand::Add(args) => add(writer, db, args),
        MappingCommand::Remove { project, task } => remove(writer, db, project, task.as_deref()),
        MappingCommand::Catalogue { file } => catalogue(writer, file),
    }
}

fn list<W: Write>(writer: &mut W, db: &Database, json: bool) -> Result<()> {
    let entries = db.list_mappings().context("failed to list mappings")?;
    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&entries)?)?;
        return Ok(());
    }
    if entries.is_empty() {
        writeln!(writer, "No mappings configured.")?;
        return Ok(());
    }
    for entry in &entries {
        writeln!(writer, "{} -> {}", entry.key(), entry.target)?;
    }
    Ok(())
}

fn add<W: Write>(writer: &mut W, db: &mut Database, args: &AddArgs) -> Result<()> {
    let entry = args.entry()?;
    if let Some(path) = &args.catalogue {
        load_catalogue(path)?
            .check(&entry.target)
            .with_context(|| format!("{} is not a valid target", entry.target))?;
    }

    let replaced = db.upsert_mapping(&entry).context("failed to save mapping")?;
    let verb = if replaced { "Updated" } else { "Added" };
    writeln!(writer, "{verb} mapping {} -> {}", entry.key(), entry.target)?;
    Ok(())
}

fn remove<W: Write>(
    writer: &mut W,
    db: &mut Database,
    project: &str,
    task: Option<&str>,
) -> Result<()> {
    let key = MappingKey::new(project.trim(), task.map(str::trim));
    let removed = db
        .remove_mapping(&key.project, key.task.as_deref())
        .context("failed to remove mapping")?;
    if !removed {
        bail!("no mapping for {key}");
    }
    writeln!(writer, "Removed mapping {key}")?;
    Ok(())
}

fn load_catalogue(path: &Path) -> Result<Catalogue> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Catalogue::parse(&json).with_context(|| format!("failed to parse {}", path.display()))
}

fn catalogue<W: Write>(writer: &mut W, path: &Path) -> Result<()> {
    let catalogue = load_catalogue(path)?;
    if catalogue.projects().is_empty() {
        writeln!(writer, "No projects found.")?;
        return Ok(());
    }
    for project in catalogue.projects() {
        writeln!(writer, "{} ({})", project.name, project.id)?;
        for task in &project.tasks {
            writeln!(writer, "  {} ({})", task.name, task.id)?;
        }
    }
    Ok(())
}
