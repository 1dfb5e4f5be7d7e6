//! `voiceweave project create|list|show|delete|copy-files|reveal`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use voiceweave_core::{
    files, NewProject, ProjectConfig, ProjectId, ProjectRegistry, SourceType, Step,
};

use super::{open_registry, print_json};

/// Manage dubbing projects.
#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// Create a project from a YouTube URL or a local video/audio file.
    Create(CreateArgs),

    /// List recently opened projects (or every project with --all).
    List(ListArgs),

    /// Show one project and mark it as recently opened.
    Show(IdArgs),

    /// Delete a project folder and everything in it.
    Delete(IdArgs),

    /// Copy linked source files into the project's input/ folder.
    CopyFiles(IdArgs),

    /// Open the project folder in the system file browser.
    Reveal(IdArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Source kind: youtube | video | audio.
    #[arg(value_name = "TYPE")]
    pub source_type: SourceType,

    /// YouTube URL or video ID, or a path to a local media file.
    pub source: String,

    /// Target language code (e.g. "es").
    #[arg(long = "lang", short = 'l', value_name = "CODE")]
    pub target_language: String,

    /// Display name; defaults to one derived from the source.
    #[arg(long)]
    pub name: Option<String>,

    /// Emit the created project document as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// List every project under the projects root, not only recent ones.
    #[arg(long)]
    pub all: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct IdArgs {
    /// Project ID.
    pub id: String,

    /// Emit machine-readable JSON (where supported).
    #[arg(long)]
    pub json: bool,
}

pub fn run(cmd: ProjectCommand) -> Result<()> {
    let registry = open_registry()?;
    match cmd {
        ProjectCommand::Create(args) => create(&registry, args),
        ProjectCommand::List(args) => list(&registry, args),
        ProjectCommand::Show(args) => show(&registry, args),
        ProjectCommand::Delete(args) => delete(&registry, args),
        ProjectCommand::CopyFiles(args) => copy_files(&registry, args),
        ProjectCommand::Reveal(args) => reveal(&registry, args),
    }
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

fn create(registry: &ProjectRegistry, args: CreateArgs) -> Result<()> {
    let source = if args.source_type.is_local() {
        let path = PathBuf::from(&args.source);
        path.canonicalize()
            .with_context(|| format!("source file not found: {}", path.display()))?
            .to_string_lossy()
            .into_owned()
    } else {
        args.source
    };

    let project = registry
        .create(NewProject {
            source_type: args.source_type,
            source,
            target_language: args.target_language,
            custom_name: args.name,
        })
        .context("failed to create project")?;

    if args.json {
        return print_json(&project);
    }
    let dir = registry
        .project_dir(&project.id)
        .context("created project has no folder")?;
    println!("✓ Created project '{}' ({})", project.name, project.id);
    println!("  Folder: {}", dir.display());
    Ok(())
}

fn list(registry: &ProjectRegistry, args: ListArgs) -> Result<()> {
    let projects: Vec<ProjectConfig> = if args.all {
        registry
            .list_all()
            .context("failed to scan projects folder")?
            .into_iter()
            .map(|(_, project)| project)
            .collect()
    } else {
        registry.list_recent()
    };

    if args.json {
        return print_json(&projects);
    }
    if projects.is_empty() {
        println!("No projects yet.");
        println!("Run: voiceweave project create <youtube|video|audio> <source> --lang <code>");
        return Ok(());
    }

    let rows: Vec<ProjectRow> = projects.iter().map(ProjectRow::from).collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

fn show(registry: &ProjectRegistry, args: IdArgs) -> Result<()> {
    let id = ProjectId::from(args.id);
    let project = registry
        .open(&id)
        .with_context(|| format!("failed to open project '{id}'"))?;
    if args.json {
        return print_json(&project);
    }

    let dir = registry
        .project_dir(&id)
        .with_context(|| format!("failed to locate project '{id}'"))?;
    println!("{}", project.name.bold());
    println!("  ID:        {}", project.id);
    println!("  Folder:    {}", dir.display());
    println!("  Source:    {}", source_label(&project));
    println!("  Language:  {}", project.target_language.to_uppercase());
    println!("  Created:   {}", project.created.format("%Y-%m-%d %H:%M"));
    println!("  Modified:  {}", project.last_modified.format("%Y-%m-%d %H:%M"));

    println!("  Steps:");
    for step in Step::ALL {
        let marker = if project.completed_steps.get(step) {
            "✓".green()
        } else {
            "·".bright_black()
        };
        println!("    {marker} {step}");
    }
    if project.completed_steps.all_done() {
        println!("  {}", "Dubbing complete.".green().bold());
    }

    let refs = &project.file_references;
    for (label, reference) in [("Video", &refs.video_file), ("Audio", &refs.audio_file)] {
        if let Some(reference) = reference {
            let state = if reference.is_linked {
                "linked".yellow()
            } else {
                "copied".green()
            };
            println!(
                "  {label}:     {} [{state}]",
                files::resolve(&dir, reference).display()
            );
        }
    }
    for (label, path) in [
        ("Segments", &refs.segments_file),
        ("Audio out", &refs.final_audio),
        ("Video out", &refs.final_video),
    ] {
        if let Some(path) = path {
            println!("  {label}: {}", dir.join(path).display());
        }
    }
    Ok(())
}

fn delete(registry: &ProjectRegistry, args: IdArgs) -> Result<()> {
    let id = ProjectId::from(args.id);
    registry
        .delete(&id)
        .with_context(|| format!("failed to delete project '{id}'"))?;
    println!("✓ Deleted project {id}");
    Ok(())
}

fn copy_files(registry: &ProjectRegistry, args: IdArgs) -> Result<()> {
    let id = ProjectId::from(args.id);
    let copied = registry
        .copy_linked_files(&id)
        .with_context(|| format!("failed to copy linked files for '{id}'"))?;
    if copied == 0 {
        println!("Nothing to copy; all source files already live in the project.");
    } else {
        println!("✓ Copied {copied} file(s) into the project");
    }
    Ok(())
}

fn reveal(registry: &ProjectRegistry, args: IdArgs) -> Result<()> {
    let id = ProjectId::from(args.id);
    registry
        .show_in_folder(&id)
        .with_context(|| format!("failed to open folder for '{id}'"))
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

#[derive(Tabled)]
struct ProjectRow {
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "lang")]
    language: String,
    #[tabled(rename = "source")]
    source: String,
    #[tabled(rename = "steps")]
    steps: String,
    #[tabled(rename = "modified")]
    modified: String,
}

impl From<&ProjectConfig> for ProjectRow {
    fn from(project: &ProjectConfig) -> Self {
        let done = Step::ALL
            .iter()
            .filter(|s| project.completed_steps.get(**s))
            .count();
        Self {
            id: project.id.to_string(),
            name: project.name.clone(),
            language: project.target_language.to_uppercase(),
            source: project.source_type.to_string(),
            steps: format!("{done}/{}", Step::ALL.len()),
            modified: project.last_modified.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

fn source_label(project: &ProjectConfig) -> String {
    match project.source_type {
        SourceType::Youtube => project
            .source_url
            .clone()
            .unwrap_or_else(|| project.video_id.clone().unwrap_or_default()),
        SourceType::Video | SourceType::Audio => format!(
            "{} ({})",
            project.original_filename.as_deref().unwrap_or("unknown file"),
            project.source_type
        ),
    }
}
