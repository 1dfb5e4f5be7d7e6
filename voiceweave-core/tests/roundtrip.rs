//! Document compatibility tests for `project.json` and `settings.json`.
//!
//! Step executors read and rewrite `project.json` themselves, so documents
//! written outside this crate must load, and our writes must keep the
//! camelCase layout they expect.

use rstest::rstest;
use serde_json::json;
use voiceweave_core::{
    paths, AppSettings, NewProject, ProjectConfig, ProjectRegistry, SettingsStore, SourceType,
    Step,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn executor_written_document() -> serde_json::Value {
    json!({
        "id": "9f0c2b7d4e5a61f38c2d1e0b7a6f5c4d",
        "name": "Conference keynote",
        "created": "2024-03-01T10:15:30.123456",
        "lastModified": "2024-03-01T11:00:00",
        "version": 1,
        "sourceType": "youtube",
        "sourceUrl": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
        "videoId": "dQw4w9WgXcQ",
        "targetLanguage": "ja",
        "completedSteps": {
            "download": true,
            "transcribe": true,
            "translate": false,
            "synthesize": false,
            "combine": false
        },
        "fileReferences": {
            "videoFile": { "path": "input/video.mp4", "isLinked": false },
            "segmentsFile": "transcripts/segments.json"
        },
        "settings": {
            "transcription": { "source": "whisperx", "enableDiarization": false, "language": "en" },
            "translation": { "mode": "simple", "simpleModel": "m2m100_418m" },
            "audio": {
                "preventOverlaps": true,
                "minGap": 100,
                "globalCrossfade": false,
                "crossfadeDuration": 150,
                "effectsPreset": "voice"
            },
            "cleanup": { "mode": "auto", "keepIntermediateFiles": false }
        },
        "textRules": [{
            "id": "r1",
            "originalText": "AI",
            "replacementText": "IA",
            "language": "es",
            "priority": "high",
            "caseSensitive": true,
            "createdAt": "2024-03-01T10:20:00"
        }],
        "segmentRules": [{
            "id": "s1",
            "type": "speaker",
            "conditions": { "speaker": "SPEAKER_01" },
            "actions": { "voice": "female" },
            "enabled": true,
            "createdAt": "2024-03-01T10:21:00"
        }]
    })
}

// ---------------------------------------------------------------------------
// project.json
// ---------------------------------------------------------------------------

#[test]
fn executor_written_document_loads() {
    let project: ProjectConfig =
        serde_json::from_value(executor_written_document()).expect("deserialize");

    assert_eq!(project.name, "Conference keynote");
    assert!(project.completed_steps.get(Step::Transcribe));
    assert!(!project.completed_steps.get(Step::Translate));
    // Naive executor timestamps are local wall-clock time.
    assert_eq!(
        project
            .created
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%dT%H:%M:%S%.6f")
            .to_string(),
        "2024-03-01T10:15:30.123456"
    );
    assert_eq!(project.text_rules[0].replacement_text, "IA");
    assert_eq!(project.segment_rules[0].kind, "speaker");
    assert_eq!(
        project.segment_rules[0].conditions["speaker"],
        json!("SPEAKER_01")
    );
    assert_eq!(
        project.file_references.segments_file.as_deref(),
        Some(std::path::Path::new("transcripts/segments.json"))
    );
}

#[test]
fn rewritten_document_keeps_camel_case_keys() {
    let project: ProjectConfig =
        serde_json::from_value(executor_written_document()).expect("deserialize");
    let value = serde_json::to_value(&project).expect("serialize");

    for key in [
        "lastModified",
        "sourceType",
        "targetLanguage",
        "completedSteps",
        "fileReferences",
        "textRules",
        "segmentRules",
    ] {
        assert!(value.get(key).is_some(), "missing key {key}");
    }
    assert_eq!(value["fileReferences"]["videoFile"]["isLinked"], json!(false));
    assert_eq!(value["segmentRules"][0]["type"], json!("speaker"));
    assert_eq!(value["settings"]["audio"]["minGap"], json!(100));
}

#[rstest]
#[case::no_steps(json!({}), [false; 5])]
#[case::partial(json!({ "download": true }), [true, false, false, false, false])]
#[case::all(
    json!({ "download": true, "transcribe": true, "translate": true, "synthesize": true, "combine": true }),
    [true; 5]
)]
fn completed_steps_tolerate_missing_flags(
    #[case] steps: serde_json::Value,
    #[case] expected: [bool; 5],
) {
    let mut doc = executor_written_document();
    doc["completedSteps"] = steps;
    let project: ProjectConfig = serde_json::from_value(doc).expect("deserialize");
    let flags: Vec<bool> = Step::ALL
        .iter()
        .map(|s| project.completed_steps.get(*s))
        .collect();
    assert_eq!(flags, expected);
}

#[rstest]
#[case::missing_id("id")]
#[case::missing_target_language("targetLanguage")]
#[case::missing_created("created")]
fn document_without_required_field_is_rejected(#[case] field: &str) {
    let mut doc = executor_written_document();
    doc.as_object_mut().expect("object").remove(field);
    assert!(serde_json::from_value::<ProjectConfig>(doc).is_err());
}

#[test]
fn created_project_loads_back_identical() {
    let home = tempfile::TempDir::new().expect("home");
    let reg = ProjectRegistry::new(SettingsStore::at(
        paths::settings_path_at(&home.path().join("config")),
        home.path().join("projects"),
    ));
    let created = reg
        .create(NewProject {
            source_type: SourceType::Youtube,
            source: "dQw4w9WgXcQ".into(),
            target_language: "pt".into(),
            custom_name: Some("Bare id".into()),
        })
        .expect("create");

    let loaded = reg.load(&created.id).expect("load");
    assert_eq!(loaded, created);
}

// ---------------------------------------------------------------------------
// settings.json
// ---------------------------------------------------------------------------

#[test]
fn settings_document_round_trips() {
    let raw = json!({
        "defaultProjectsPath": "/Users/me/Documents/VoiceWeave",
        "autoCleanup": "manual",
        "showOnboarding": false,
        "recentProjects": ["a", "b"],
        "exportLocation": "custom",
        "customExportPath": "/Volumes/Export"
    });
    let settings: AppSettings = serde_json::from_value(raw.clone()).expect("deserialize");
    assert_eq!(settings.recent_projects.len(), 2);
    assert_eq!(serde_json::to_value(&settings).expect("serialize"), raw);
}
