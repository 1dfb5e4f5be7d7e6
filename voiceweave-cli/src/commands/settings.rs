//! `voiceweave settings show|set-root`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use voiceweave_core::SettingsStore;

use super::print_json;

/// Inspect or change application settings.
#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    /// Print the current settings.
    Show(ShowArgs),

    /// Change the folder new projects are created in.
    SetRoot(SetRootArgs),
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct SetRootArgs {
    /// Projects root directory; created if missing.
    pub path: PathBuf,
}

pub fn run(cmd: SettingsCommand) -> Result<()> {
    let store = SettingsStore::open().context("failed to locate VoiceWeave settings")?;
    match cmd {
        SettingsCommand::Show(args) => show(&store, args),
        SettingsCommand::SetRoot(args) => set_root(&store, args),
    }
}

fn show(store: &SettingsStore, args: ShowArgs) -> Result<()> {
    let settings = store.load().context("failed to read settings")?;
    if args.json {
        return print_json(&settings);
    }

    println!("Settings file:   {}", store.path().display());
    println!("Projects root:   {}", settings.default_projects_path.display());
    println!("Auto cleanup:    {}", settings.auto_cleanup);
    println!("Export location: {}", settings.export_location);
    if let Some(custom) = &settings.custom_export_path {
        println!("Export path:     {custom}");
    }
    println!("Recent projects: {}", settings.recent_projects.len());
    for id in &settings.recent_projects {
        println!("  - {id}");
    }
    Ok(())
}

fn set_root(store: &SettingsStore, args: SetRootArgs) -> Result<()> {
    std::fs::create_dir_all(&args.path)
        .with_context(|| format!("cannot create '{}'", args.path.display()))?;
    let root = args
        .path
        .canonicalize()
        .with_context(|| format!("cannot resolve path '{}'", args.path.display()))?;

    store
        .update(|s| s.default_projects_path = root.clone())
        .context("failed to save settings")?;
    println!("✓ Projects root set to {}", root.display());
    Ok(())
}
