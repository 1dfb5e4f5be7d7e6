//! `voiceweave run <id> [<step>]`: run pipeline stages through the step executor.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use voiceweave_core::{ProjectId, Step};
use voiceweave_pipeline::{
    ExecutorConfig, Orchestrator, PipelineError, PipelineReport, ProcessExecutor, RunOptions,
    StepReport,
};

use super::{open_registry, print_json};

/// Arguments for `voiceweave run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Project ID.
    pub id: String,

    /// Single step to run: download | transcribe | translate | synthesize | combine.
    /// Runs all five in order when omitted.
    pub step: Option<Step>,

    /// Kill a step that runs longer than this many seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Executor program, invoked as `<program> <project_dir> <step>`.
    /// Defaults to the Python pipeline in $VOICEWEAVE_EXECUTOR_DIR.
    #[arg(long, value_name = "PROGRAM")]
    pub executor: Option<PathBuf>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let registry = open_registry()?;
        let config = match &self.executor {
            Some(program) => ExecutorConfig::new(program),
            None => ExecutorConfig::from_env().context("no step executor available")?,
        };
        let orchestrator = Orchestrator::new(&registry, ProcessExecutor::new(config));

        let mut options = RunOptions::default();
        if let Some(secs) = self.timeout {
            options = options.with_timeout(Duration::from_secs(secs));
        }

        let id = ProjectId::from(self.id.clone());
        match self.step {
            Some(step) => self.single(&orchestrator, &id, step, &options),
            None => self.full(&orchestrator, &id, &options),
        }
    }

    fn single(
        &self,
        orchestrator: &Orchestrator<'_, ProcessExecutor>,
        id: &ProjectId,
        step: Step,
        options: &RunOptions,
    ) -> Result<()> {
        let report = match orchestrator.run_step(id, step, options) {
            Ok(report) => report,
            Err(err) => {
                print_captured_stderr(&err);
                return Err(err).with_context(|| format!("step '{step}' could not be run"));
            }
        };

        if self.json {
            print_json(&report)?;
        } else {
            print_step(step, &report);
        }
        if !report.success {
            bail!(
                "step '{step}' failed: {}",
                report.error.as_deref().unwrap_or("unknown error")
            );
        }
        Ok(())
    }

    fn full(
        &self,
        orchestrator: &Orchestrator<'_, ProcessExecutor>,
        id: &ProjectId,
        options: &RunOptions,
    ) -> Result<()> {
        let report = orchestrator.run_full(id, options);
        if self.json {
            print_json(&report)?;
        } else {
            print_pipeline(&report);
        }
        if !report.success {
            let step = report
                .failed_step
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unknown".to_owned());
            bail!(
                "pipeline halted at '{step}': {}",
                report.error.as_deref().unwrap_or("unknown error")
            );
        }
        Ok(())
    }
}

fn print_step(step: Step, report: &StepReport) {
    if report.success {
        let message = report.message.as_deref().unwrap_or("done");
        println!("{} {step}: {message}", "✓".green());
    } else {
        let error = report.error.as_deref().unwrap_or("unknown error");
        println!("{} {step}: {error}", "✗".red());
    }
}

fn print_pipeline(report: &PipelineReport) {
    for record in &report.steps {
        if record.success {
            let message = record.message.as_deref().unwrap_or("done");
            println!("{} {}: {message}", "✓".green(), record.step);
        } else {
            let error = record.error.as_deref().unwrap_or("unknown error");
            println!("{} {}: {error}", "✗".red(), record.step);
        }
    }
    let skipped = Step::ALL.len() - report.steps.len();
    if skipped > 0 {
        println!("{}", format!("  {skipped} step(s) not run").bright_black());
    }
    if report.success {
        println!("{}", "Pipeline completed.".bold());
    }
}

fn print_captured_stderr(err: &PipelineError) {
    if let Some(stderr) = err.captured_stderr().map(str::trim).filter(|s| !s.is_empty()) {
        eprintln!("{}", "executor stderr:".bright_black());
        eprintln!("{stderr}");
    }
}
