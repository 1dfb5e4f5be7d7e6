pub mod project;
pub mod run;
pub mod settings;

use anyhow::{Context, Result};
use voiceweave_core::ProjectRegistry;

/// Registry backed by the user's settings file.
pub(crate) fn open_registry() -> Result<ProjectRegistry> {
    ProjectRegistry::from_env().context("failed to locate VoiceWeave settings")
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize JSON output")?
    );
    Ok(())
}
