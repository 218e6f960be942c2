//! Integration tests for the extraction pipeline and batch runner.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{Rgb, RgbImage};
use tempfile::TempDir;

use kartka::batch::{BATCH_FILE, RESULT_FILE};
use kartka::extraction::{NationalityReason, Resolution, REVIEW_DIR, REVIEW_NOTE};
use kartka::llm::{ModelReply, BAD_JSON};
use kartka::persist::read_json;
use kartka::{
    BatchItem, BatchReport, BatchRunner, FieldExtractionPipeline, KartkaError, Pair,
    PipelineOptions, PipelineResult, PipelineStage, ScriptedModel, Variant,
};

const VARIANT_RU: &str = r#"{"variant": "ru", "confidence": 0.95}"#;
const NATIONALITY_MARKED: &str = r#"{"is_jewish": false, "match": "евр.", "confidence": 0.6}"#;
const NATIONALITY_UNSURE: &str = r#"{"is_jewish": false, "match": "???", "confidence": 0.7}"#;
const BAND_SHAPIRO: &str = r#"{"surname": "Шапиро", "initials": {"name": "м", "patronymic": "І"}}"#;
const FIO_SHAPIRO: &str = "Ответ:\n```json\n{\"surname\": \"Шапиро\", \"name\": \"Мойсей\", \
    \"patronymic\": \"Исаакович\", \"raw\": {\"front_text\": \"Шапиро Мойсей Ісакович\"}, \
    \"surname_source\": \"front\", \"confidence\": 0.9}\n```";

/// Helper to write a blank synthetic scan.
fn write_page(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    RgbImage::from_pixel(400, 600, Rgb([235, 235, 235]))
        .save(&path)
        .expect("Failed to write test image");
    path
}

fn scanned_pair(tmp: &TempDir) -> (PathBuf, PathBuf) {
    (
        write_page(tmp.path(), "0001.png"),
        write_page(tmp.path(), "0002.png"),
    )
}

fn pipeline(model: &Arc<ScriptedModel>, options: PipelineOptions) -> FieldExtractionPipeline {
    FieldExtractionPipeline::new(model.clone(), options)
}

// =============================================================================
// Single Pair Tests
// =============================================================================

#[test]
fn test_full_run_with_marker_override() {
    let tmp = TempDir::new().unwrap();
    let (front, list) = scanned_pair(&tmp);
    let outdir = tmp.path().join("out");
    let model = Arc::new(ScriptedModel::new().with_pipeline_replies(
        VARIANT_RU,
        NATIONALITY_MARKED,
        BAND_SHAPIRO,
        FIO_SHAPIRO,
    ));

    let result = pipeline(&model, PipelineOptions::default())
        .run(&front, &list, &outdir)
        .expect("Pipeline failed");

    assert_eq!(result.inputs.front, "0001.png");
    assert_eq!(result.variant.detected, Variant::Ru);
    assert_eq!(result.variant.confidence, Some(0.95));
    assert_eq!(result.llm.endpoint, "mock://scripted");

    let nationality = result.outputs.nationality.parsed().unwrap();
    assert_eq!(nationality.is_jewish, Some(true));
    assert_eq!(nationality.confidence, Some(1.0));
    assert_eq!(
        nationality.reason,
        Some(NationalityReason::ForcedTrueByMarker("евр".into()))
    );
    assert!(!result.needs_manual_review());
    assert!(result.review.is_none());

    let band = &result.outputs.right_band.normalized;
    assert_eq!(band.surname, "Шапиро");
    assert_eq!(band.initials.name, "М");
    assert_eq!(band.initials.patronymic, "И");

    let fio = result.outputs.fio.parsed().unwrap();
    assert_eq!(fio.name.as_deref(), Some("Мойсей"));
    let checks = fio.checks.as_ref().unwrap();
    assert_eq!(checks.resolution, Resolution::OkOrNoConflict);
    assert_eq!(fio.hints.as_ref().unwrap().surname_hint, "Шапиро");

    for file in result.crop_files() {
        assert!(file.exists(), "missing crop {}", file.display());
    }
    assert!(outdir.join("ru_front_nationality.jpg").exists());
    assert!(!outdir.join("ru_front_overlay.jpg").exists());
    assert_eq!(model.remaining(), 0);
}

#[test]
fn test_requests_follow_call_order_and_carry_hints() {
    let tmp = TempDir::new().unwrap();
    let (front, list) = scanned_pair(&tmp);
    let model = Arc::new(ScriptedModel::new().with_pipeline_replies(
        VARIANT_RU,
        NATIONALITY_MARKED,
        BAND_SHAPIRO,
        FIO_SHAPIRO,
    ));

    pipeline(&model, PipelineOptions::default())
        .run(&front, &list, &tmp.path().join("out"))
        .unwrap();

    let requests = model.requests();
    assert_eq!(requests.len(), 4);
    let max_tokens: Vec<usize> = requests.iter().map(|r| r.max_tokens).collect();
    assert_eq!(max_tokens, vec![32, 64, 64, 180]);

    let fio_system = requests[3].system_text().unwrap();
    assert!(fio_system.contains("«Шапиро»"));
    assert!(fio_system.contains("инициал имени «М»"));
    assert!(fio_system.contains("инициал отчества «И»"));

    let body = serde_json::to_value(&requests[1].messages[1]).unwrap();
    let url = body["content"][1]["image_url"]["url"].as_str().unwrap();
    assert!(url.starts_with("data:image/jpeg;base64,"));
}

#[test]
fn test_uncertain_negative_routed_to_review() {
    let tmp = TempDir::new().unwrap();
    let (front, list) = scanned_pair(&tmp);
    let outdir = tmp.path().join("out");
    let model = Arc::new(ScriptedModel::new().with_pipeline_replies(
        r#"{"variant": "ua"}"#,
        NATIONALITY_UNSURE,
        BAND_SHAPIRO,
        FIO_SHAPIRO,
    ));

    let result = pipeline(&model, PipelineOptions::default())
        .run(&front, &list, &outdir)
        .unwrap();

    assert!(result.needs_manual_review());
    let nationality = result.outputs.nationality.parsed().unwrap();
    assert_eq!(nationality.reason, Some(NationalityReason::AsReported));

    let review = result.review.as_ref().expect("review outcome");
    assert_eq!(review.copied.len(), 5);
    assert!(review.advisories.is_empty());
    let review_dir = outdir.join(REVIEW_DIR);
    assert!(review_dir.join("0001.png").exists());
    assert!(review_dir.join("ua_list_surname_band.jpg").exists());
    assert_eq!(
        fs::read_to_string(review_dir.join("README.txt")).unwrap(),
        REVIEW_NOTE
    );
}

#[test]
fn test_initials_conflict_prefers_front_page() {
    let tmp = TempDir::new().unwrap();
    let (front, list) = scanned_pair(&tmp);
    let fio = r#"{"surname": "Иваненко", "name": "Петро", "patronymic": "Семенович",
                  "raw": {"front_text": "Иванов Михаил Степанович"}, "confidence": 0.7}"#;
    let model = Arc::new(ScriptedModel::new().with_pipeline_replies(
        VARIANT_RU,
        NATIONALITY_MARKED,
        r#"{"surname": "Иванов", "initials": {"name": "П", "patronymic": "С"}}"#,
        fio,
    ));

    let result = pipeline(&model, PipelineOptions::default())
        .run(&front, &list, &tmp.path().join("out"))
        .unwrap();

    let fio = result.outputs.fio.parsed().unwrap();
    assert_eq!(fio.surname.as_deref(), Some("Иванов"));
    assert_eq!(fio.name.as_deref(), Some("Михаил"));
    assert_eq!(fio.patronymic.as_deref(), Some("Степанович"));
    assert_eq!(
        fio.checks.as_ref().map(|c| c.resolution),
        Some(Resolution::PreferFrontDueToInitialsConflict)
    );
}

#[test]
fn test_enforce_initials_nulls_patronymic() {
    let tmp = TempDir::new().unwrap();
    let (front, list) = scanned_pair(&tmp);
    let fio = r#"{"surname": "Кац", "name": "Борис", "patronymic": "Львович",
                  "raw": {"front_text": "неразборчиво"}}"#;
    let model = Arc::new(ScriptedModel::new().with_pipeline_replies(
        VARIANT_RU,
        NATIONALITY_MARKED,
        r#"{"surname": "Кац", "initials": {"name": "Б", "patronymic": "М"}}"#,
        fio,
    ));

    let options = PipelineOptions::default().with_enforce_initials(true);
    let result = pipeline(&model, options)
        .run(&front, &list, &tmp.path().join("out"))
        .unwrap();

    let fio = result.outputs.fio.parsed().unwrap();
    assert!(fio.patronymic.is_none());
    assert_eq!(fio.surname.as_deref(), Some("Кац"));
}

#[test]
fn test_malformed_replies_are_kept_not_flagged() {
    let tmp = TempDir::new().unwrap();
    let (front, list) = scanned_pair(&tmp);
    let model = Arc::new(ScriptedModel::new().with_pipeline_replies(
        "не знаю",
        "Национальность неразборчива",
        "{broken",
        "",
    ));

    let result = pipeline(&model, PipelineOptions::default())
        .run(&front, &list, &tmp.path().join("out"))
        .unwrap();

    assert_eq!(result.variant.detected, Variant::Ua);
    match &result.outputs.nationality {
        ModelReply::Malformed(m) => {
            assert_eq!(m.error, BAD_JSON);
            assert_eq!(m.raw_content, "Национальность неразборчива");
        }
        other => panic!("expected malformed reply, got {other:?}"),
    }
    assert!(!result.needs_manual_review());
    assert!(result.outputs.right_band.normalized.surname.is_empty());
    assert!(result.outputs.fio.is_malformed());
}

#[test]
fn test_overlays_written_when_enabled() {
    let tmp = TempDir::new().unwrap();
    let (front, list) = scanned_pair(&tmp);
    let outdir = tmp.path().join("out");
    let model = Arc::new(ScriptedModel::new().with_pipeline_replies(
        VARIANT_RU,
        NATIONALITY_MARKED,
        BAND_SHAPIRO,
        FIO_SHAPIRO,
    ));

    pipeline(&model, PipelineOptions::default().with_overlay(true))
        .run(&front, &list, &outdir)
        .unwrap();

    let overlay = image::open(outdir.join("ru_front_overlay.jpg")).unwrap();
    assert_eq!((overlay.width(), overlay.height()), (400, 600));
    assert!(outdir.join("ru_list_overlay.jpg").exists());
}

#[test]
fn test_progress_visits_every_stage_in_order() {
    let tmp = TempDir::new().unwrap();
    let (front, list) = scanned_pair(&tmp);
    let model = Arc::new(ScriptedModel::new().with_pipeline_replies(
        VARIANT_RU,
        NATIONALITY_MARKED,
        BAND_SHAPIRO,
        FIO_SHAPIRO,
    ));
    let seen = std::sync::Mutex::new(Vec::new());

    pipeline(&model, PipelineOptions::default())
        .run_with_progress(&front, &list, &tmp.path().join("out"), &|stage| {
            seen.lock().unwrap().push(stage)
        })
        .unwrap();

    let seen = seen.into_inner().unwrap();
    assert_eq!(seen.first(), Some(&PipelineStage::Start));
    assert_eq!(seen.last(), Some(&PipelineStage::Done));
    assert_eq!(seen.len(), 9);
    assert!(seen.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_model_failure_aborts_pair_and_keeps_crops() {
    let tmp = TempDir::new().unwrap();
    let (front, list) = scanned_pair(&tmp);
    let outdir = tmp.path().join("out");
    let model = Arc::new(
        ScriptedModel::new()
            .with_reply(VARIANT_RU)
            .with_failure("connection refused"),
    );

    let err = pipeline(&model, PipelineOptions::default())
        .run(&front, &list, &outdir)
        .unwrap_err();

    assert!(matches!(err, KartkaError::Http(_)));
    assert!(outdir.join("ru_front_nationality.jpg").exists());
}

#[test]
fn test_invalid_input_rejected_before_model_calls() {
    let tmp = TempDir::new().unwrap();
    let front = write_page(tmp.path(), "0001.png");
    let garbage = tmp.path().join("0002.jpg");
    fs::write(&garbage, b"definitely not a jpeg").unwrap();
    let model = Arc::new(ScriptedModel::new());
    let pipeline = pipeline(&model, PipelineOptions::default());

    let missing = pipeline.run(&front, &tmp.path().join("nope.jpg"), tmp.path());
    assert!(matches!(missing, Err(KartkaError::InvalidInput(_))));
    let undecodable = pipeline.run(&front, &garbage, tmp.path());
    assert!(matches!(undecodable, Err(KartkaError::Image { .. })));
    assert!(model.requests().is_empty());
}

#[test]
fn test_result_file_round_trips() {
    let tmp = TempDir::new().unwrap();
    let (front, list) = scanned_pair(&tmp);
    let model = Arc::new(ScriptedModel::new().with_pipeline_replies(
        VARIANT_RU,
        NATIONALITY_UNSURE,
        BAND_SHAPIRO,
        FIO_SHAPIRO,
    ));
    let result = pipeline(&model, PipelineOptions::default())
        .run(&front, &list, &tmp.path().join("out"))
        .unwrap();

    let path = tmp.path().join("result.json");
    kartka::persist::write_json_atomic(&path, &result).unwrap();
    let json: serde_json::Value = read_json(&path).unwrap();
    assert_eq!(json["flags"]["needs_manual_review"], true);
    assert_eq!(json["outputs"]["nationality"]["reason"], "as_reported");
    assert_eq!(json["crops"]["header_band"]["pad"], 0.0);

    let back: PipelineResult = read_json(&path).unwrap();
    assert_eq!(back.inputs, result.inputs);
    assert_eq!(back.flags, result.flags);
    assert_eq!(back.crops.front_head_name.pixels, result.crops.front_head_name.pixels);
    assert_eq!(back.outputs.right_band.normalized, result.outputs.right_band.normalized);
    assert_eq!(back.review, result.review);
}

// =============================================================================
// Batch Tests
// =============================================================================

#[test]
fn test_batch_over_sorted_pairs() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("scans");
    fs::create_dir_all(&input).unwrap();
    for name in ["0001.png", "0002.png", "0003.png", "0004.png", "0005.png"] {
        write_page(&input, name);
    }
    let outdir = tmp.path().join("out");
    let model = Arc::new(
        ScriptedModel::new()
            .with_pipeline_replies(VARIANT_RU, NATIONALITY_UNSURE, BAND_SHAPIRO, FIO_SHAPIRO)
            .with_pipeline_replies(VARIANT_RU, NATIONALITY_MARKED, BAND_SHAPIRO, FIO_SHAPIRO),
    );
    let runner = BatchRunner::new(pipeline(&model, PipelineOptions::default()));

    let pairs = runner
        .discover(&input, kartka::PairingMode::Sorted, &outdir)
        .unwrap();
    assert_eq!(pairs.len(), 2);
    let report = runner.run(&pairs, &outdir).unwrap();

    assert_eq!(report.count, 2);
    assert_eq!(report.completed, 2);
    assert_eq!(report.flagged, 1);
    assert!(outdir.join("0001__0002").join(RESULT_FILE).exists());
    assert!(outdir.join("0003__0004").join(RESULT_FILE).exists());

    let copied = outdir.join(REVIEW_DIR).join("0001__0002");
    assert!(copied.join(RESULT_FILE).exists());
    assert!(copied.join("ru_front_head_name.jpg").exists());
    assert!(!outdir.join(REVIEW_DIR).join("0003__0004").exists());

    let saved: BatchReport = read_json(&outdir.join(BATCH_FILE)).unwrap();
    assert_eq!(saved.count, 2);
}

#[test]
fn test_batch_isolates_failed_pairs() {
    let tmp = TempDir::new().unwrap();
    let outdir = tmp.path().join("out");
    let (front, list) = scanned_pair(&tmp);
    let pairs = vec![
        Pair::new(tmp.path().join("missing.png"), list.clone()),
        Pair::new(front, list),
    ];
    let model = Arc::new(ScriptedModel::new().with_pipeline_replies(
        VARIANT_RU,
        NATIONALITY_MARKED,
        BAND_SHAPIRO,
        FIO_SHAPIRO,
    ));

    let report = BatchRunner::new(pipeline(&model, PipelineOptions::default()))
        .run(&pairs, &outdir)
        .unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.completed, 1);
    assert!(matches!(report.items[0], BatchItem::Failed { .. }));
    assert!(matches!(report.items[1], BatchItem::Completed { .. }));
}

#[test]
fn test_parallel_batch_keeps_pair_order() {
    let tmp = TempDir::new().unwrap();
    let outdir = tmp.path().join("out");
    let mut model = ScriptedModel::new();
    let mut pairs = Vec::new();
    for n in 0..4 {
        let front = write_page(tmp.path(), &format!("{n}_a.png"));
        let list = write_page(tmp.path(), &format!("{n}_b.png"));
        pairs.push(Pair::new(front, list));
        // Replies may interleave across workers; every pair still completes.
        model =
            model.with_pipeline_replies(VARIANT_RU, NATIONALITY_MARKED, BAND_SHAPIRO, FIO_SHAPIRO);
    }
    let model = Arc::new(model);

    let report = BatchRunner::new(pipeline(&model, PipelineOptions::default()))
        .with_concurrency(3)
        .run(&pairs, &outdir)
        .unwrap();

    assert_eq!(report.completed, 4);
    let names: Vec<String> = report.items.iter().map(|i| i.pair().dir_name()).collect();
    assert_eq!(names, vec!["0_a__0_b", "1_a__1_b", "2_a__2_b", "3_a__3_b"]);
}
