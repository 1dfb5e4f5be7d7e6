//! Runs the five stages against a registered project and keeps
//! `completedSteps` in line with what the executor reported.
//!
//! After every executor call the project is reloaded (the executor may have
//! rewritten `project.json`), the stage flag is forced to the reported
//! outcome and the document is written back only when the flag changed. An
//! invocation error leaves the persisted flag alone.
//!
//! A stage is `Running` only for the duration of the call; nothing is
//! persisted for it. A crash mid-stage leaves the flag at its previous value.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use voiceweave_core::{ProjectId, ProjectRegistry, Step};

use crate::error::PipelineError;
use crate::executor::{RunOptions, StepExecutor, StepReport};

/// Outcome of one stage inside a [`PipelineReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub step: Step,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Aggregate result of [`Orchestrator::run_full`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<Step>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub steps: Vec<StepRecord>,
}

impl PipelineReport {
    fn completed(steps: Vec<StepRecord>) -> Self {
        Self {
            success: true,
            failed_step: None,
            error: None,
            message: Some("all steps completed".to_owned()),
            steps,
        }
    }

    fn halted(steps: Vec<StepRecord>) -> Self {
        let last = steps.last();
        Self {
            success: false,
            failed_step: last.map(|r| r.step),
            error: last.and_then(|r| r.error.clone()),
            message: last.and_then(|r| r.message.clone()),
            steps,
        }
    }
}

/// Drives a [`StepExecutor`] over projects held by a [`ProjectRegistry`].
pub struct Orchestrator<'r, E> {
    registry: &'r ProjectRegistry,
    executor: E,
}

impl<'r, E: StepExecutor> Orchestrator<'r, E> {
    pub fn new(registry: &'r ProjectRegistry, executor: E) -> Self {
        Self { registry, executor }
    }

    /// Run one stage. Stage ordering is not enforced here.
    ///
    /// `Ok` carries the executor's report whether it succeeded or not;
    /// `Err` means the stage could not be run or its result not understood.
    pub fn run_step(
        &self,
        id: &ProjectId,
        step: Step,
        options: &RunOptions,
    ) -> Result<StepReport, PipelineError> {
        let dir = self.registry.project_dir(id)?;
        tracing::info!(id = %id, step = %step, "running step");
        let started = Instant::now();

        let report = match self.executor.execute(&dir, step, options) {
            Ok(report) => report,
            Err(err) => {
                tracing::warn!(id = %id, step = %step, error = %err, "step invocation failed");
                return Err(err);
            }
        };

        self.record_outcome(id, step, report.success)?;
        if report.success {
            tracing::info!(
                id = %id,
                step = %step,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "step completed"
            );
        } else {
            tracing::warn!(
                id = %id,
                step = %step,
                error = report.error.as_deref().unwrap_or("unknown error"),
                "step failed"
            );
        }
        Ok(report)
    }

    /// Run every stage in order, halting at the first failure or error.
    pub fn run_full(&self, id: &ProjectId, options: &RunOptions) -> PipelineReport {
        let mut steps = Vec::with_capacity(Step::ALL.len());

        for step in Step::ALL {
            let started_at = Utc::now();
            let outcome = if options.is_cancelled() {
                Err(PipelineError::Cancelled {
                    stdout: String::new(),
                    stderr: String::new(),
                })
            } else {
                self.run_step(id, step, options)
            };

            let record = match outcome {
                Ok(report) => StepRecord {
                    step,
                    success: report.success,
                    error: report.error,
                    message: report.message,
                    started_at,
                    finished_at: Utc::now(),
                },
                Err(err) => StepRecord {
                    step,
                    success: false,
                    error: Some(err.to_string()),
                    message: None,
                    started_at,
                    finished_at: Utc::now(),
                },
            };
            let ok = record.success;
            steps.push(record);
            if !ok {
                tracing::warn!(id = %id, step = %step, "pipeline halted");
                return PipelineReport::halted(steps);
            }
        }

        tracing::info!(id = %id, "pipeline completed");
        PipelineReport::completed(steps)
    }

    fn record_outcome(&self, id: &ProjectId, step: Step, done: bool) -> Result<(), PipelineError> {
        let mut project = self.registry.load(id)?;
        if project.completed_steps.set(step, done) {
            self.registry.update(&mut project)?;
            tracing::debug!(id = %id, step = %step, done, "updated completion flag");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::Path;

    use tempfile::TempDir;
    use voiceweave_core::{paths, NewProject, SettingsStore, SourceType};

    use super::*;

    /// Scripted executor: every stage succeeds unless told otherwise.
    #[derive(Default)]
    struct FakeExecutor {
        failures: HashMap<Step, &'static str>,
        broken: Option<Step>,
        calls: RefCell<Vec<Step>>,
    }

    impl FakeExecutor {
        fn failing_at(step: Step, error: &'static str) -> Self {
            Self {
                failures: HashMap::from([(step, error)]),
                ..Self::default()
            }
        }

        fn broken_at(step: Step) -> Self {
            Self {
                broken: Some(step),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<Step> {
            self.calls.borrow().clone()
        }
    }

    impl StepExecutor for FakeExecutor {
        fn execute(
            &self,
            _project_dir: &Path,
            step: Step,
            _options: &RunOptions,
        ) -> Result<StepReport, PipelineError> {
            self.calls.borrow_mut().push(step);
            if self.broken == Some(step) {
                return Err(PipelineError::MalformedOutput {
                    reason: "missing `success` field".into(),
                    stdout: "{}".into(),
                    stderr: String::new(),
                });
            }
            Ok(match self.failures.get(&step) {
                Some(error) => StepReport::failed(*error),
                None => StepReport::succeeded(format!("{step} done")),
            })
        }
    }

    fn setup() -> (TempDir, ProjectRegistry, ProjectId) {
        let home = TempDir::new().unwrap();
        let registry = ProjectRegistry::new(SettingsStore::at(
            paths::settings_path_at(&home.path().join("config")),
            home.path().join("projects"),
        ));
        let project = registry
            .create(NewProject {
                source_type: SourceType::Youtube,
                source: "https://youtu.be/dQw4w9WgXcQ".into(),
                target_language: "es".into(),
                custom_name: None,
            })
            .unwrap();
        (home, registry, project.id)
    }

    fn flags(registry: &ProjectRegistry, id: &ProjectId) -> Vec<bool> {
        let steps = registry.load(id).unwrap().completed_steps;
        Step::ALL.iter().map(|s| steps.get(*s)).collect()
    }

    #[test]
    fn run_full_completes_every_stage_in_order() {
        let (_home, registry, id) = setup();
        let executor = FakeExecutor::default();
        let report = Orchestrator::new(&registry, &executor).run_full(&id, &RunOptions::default());

        assert!(report.success);
        assert!(report.failed_step.is_none());
        assert_eq!(executor.calls(), Step::ALL.to_vec());
        assert_eq!(report.steps.len(), 5);
        assert_eq!(flags(&registry, &id), vec![true; 5]);
    }

    #[test]
    fn run_full_stops_at_first_business_failure() {
        let (_home, registry, id) = setup();
        let executor = FakeExecutor::failing_at(Step::Translate, "model not installed");
        let report = Orchestrator::new(&registry, &executor).run_full(&id, &RunOptions::default());

        assert!(!report.success);
        assert_eq!(report.failed_step, Some(Step::Translate));
        assert_eq!(report.error.as_deref(), Some("model not installed"));
        assert_eq!(
            executor.calls(),
            vec![Step::Download, Step::Transcribe, Step::Translate]
        );
        assert_eq!(flags(&registry, &id), vec![true, true, false, false, false]);
        assert!(report.steps[0].success && report.steps[1].success);
        assert!(!report.steps[2].success);
    }

    #[test]
    fn run_full_records_invocation_error_as_failure() {
        let (_home, registry, id) = setup();
        let executor = FakeExecutor::broken_at(Step::Download);
        let report = Orchestrator::new(&registry, &executor).run_full(&id, &RunOptions::default());

        assert_eq!(report.failed_step, Some(Step::Download));
        assert!(report.error.unwrap().contains("malformed output"));
        assert_eq!(executor.calls(), vec![Step::Download]);
    }

    #[test]
    fn failed_rerun_resets_flag() {
        let (_home, registry, id) = setup();
        let mut project = registry.load(&id).unwrap();
        project.completed_steps.set(Step::Synthesize, true);
        registry.update(&mut project).unwrap();

        let executor = FakeExecutor::failing_at(Step::Synthesize, "tts crashed");
        let report = Orchestrator::new(&registry, &executor)
            .run_step(&id, Step::Synthesize, &RunOptions::default())
            .unwrap();

        assert!(!report.success);
        assert!(!registry.load(&id).unwrap().completed_steps.synthesize);
    }

    #[test]
    fn invocation_error_leaves_flag_untouched() {
        let (_home, registry, id) = setup();
        let mut project = registry.load(&id).unwrap();
        project.completed_steps.set(Step::Transcribe, true);
        registry.update(&mut project).unwrap();
        let stamped = registry.load(&id).unwrap().last_modified;

        let executor = FakeExecutor::broken_at(Step::Transcribe);
        let err = Orchestrator::new(&registry, &executor)
            .run_step(&id, Step::Transcribe, &RunOptions::default())
            .unwrap_err();

        assert!(matches!(err, PipelineError::MalformedOutput { .. }));
        let after = registry.load(&id).unwrap();
        assert!(after.completed_steps.transcribe);
        assert_eq!(after.last_modified, stamped);
    }

    #[test]
    fn successful_rerun_does_not_rewrite_document() {
        let (_home, registry, id) = setup();
        let executor = FakeExecutor::default();
        let orchestrator = Orchestrator::new(&registry, &executor);
        orchestrator
            .run_step(&id, Step::Download, &RunOptions::default())
            .unwrap();
        let stamped = registry.load(&id).unwrap().last_modified;

        orchestrator
            .run_step(&id, Step::Download, &RunOptions::default())
            .unwrap();
        assert_eq!(registry.load(&id).unwrap().last_modified, stamped);
    }

    #[test]
    fn stages_can_run_out_of_order() {
        let (_home, registry, id) = setup();
        let executor = FakeExecutor::default();
        Orchestrator::new(&registry, &executor)
            .run_step(&id, Step::Combine, &RunOptions::default())
            .unwrap();
        assert_eq!(flags(&registry, &id), vec![false, false, false, false, true]);
    }

    #[test]
    fn cancelled_token_prevents_any_stage() {
        let (_home, registry, id) = setup();
        let executor = FakeExecutor::default();
        let token = crate::CancelToken::new();
        token.cancel();
        let report = Orchestrator::new(&registry, &executor)
            .run_full(&id, &RunOptions::default().with_cancel(token));

        assert!(!report.success);
        assert_eq!(report.failed_step, Some(Step::Download));
        assert!(executor.calls().is_empty());
    }

    #[test]
    fn unknown_project_is_a_registry_error() {
        let (_home, registry, _id) = setup();
        let executor = FakeExecutor::default();
        let orchestrator = Orchestrator::new(&registry, &executor);
        let missing = ProjectId::from("does-not-exist");

        let err = orchestrator
            .run_step(&missing, Step::Download, &RunOptions::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Registry(_)));

        let report = orchestrator.run_full(&missing, &RunOptions::default());
        assert_eq!(report.failed_step, Some(Step::Download));
        assert!(executor.calls().is_empty());
    }

    #[test]
    fn executor_edits_to_document_survive_flag_update() {
        struct WritingExecutor;
        impl StepExecutor for WritingExecutor {
            fn execute(
                &self,
                project_dir: &Path,
                _step: Step,
                _options: &RunOptions,
            ) -> Result<StepReport, PipelineError> {
                let file = paths::project_file(project_dir);
                let mut doc: serde_json::Value =
                    serde_json::from_str(&std::fs::read_to_string(&file).unwrap()).unwrap();
                doc["fileReferences"]["segmentsFile"] = "transcripts/segments.json".into();
                doc["lastModified"] = "2024-05-01T09:30:00.000001".into();
                std::fs::write(&file, doc.to_string()).unwrap();
                Ok(StepReport::succeeded("transcribed"))
            }
        }

        let (_home, registry, id) = setup();
        Orchestrator::new(&registry, WritingExecutor)
            .run_step(&id, Step::Transcribe, &RunOptions::default())
            .unwrap();

        let project = registry.load(&id).unwrap();
        assert!(project.completed_steps.transcribe);
        assert_eq!(
            project.file_references.segments_file.as_deref(),
            Some(Path::new("transcripts/segments.json"))
        );
    }
}
