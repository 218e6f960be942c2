//! Integration tests for page classification and classified pairing.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{Rgb, RgbImage};
use tempfile::TempDir;

use kartka::acquire::{pair_nearest_following, DirectoryClassification, CLASSIFICATION_FILE};
use kartka::batch::BATCH_FILE;
use kartka::persist::read_json;
use kartka::{
    BatchReport, BatchRunner, FieldExtractionPipeline, PageClassifier, PageType, PairingMode,
    PipelineOptions, ScriptedModel,
};

fn write_page(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    RgbImage::from_pixel(300, 420, Rgb([250, 250, 245]))
        .save(&path)
        .expect("Failed to write test image");
    path
}

fn page_type(kind: &str) -> String {
    format!(r#"{{"type": "{kind}", "confidence": 0.9, "reason": "тест"}}"#)
}

/// Scan directory `01 list, 02 front, 03 front, 04 list`.
fn shuffled_scans(dir: &Path) -> ScriptedModel {
    for name in ["01.png", "02.png", "03.png", "04.png"] {
        write_page(dir, name);
    }
    ScriptedModel::new()
        .with_reply(page_type("list"))
        .with_reply(page_type("front"))
        .with_reply(page_type("front"))
        .with_reply(page_type("list"))
}

// =============================================================================
// Classification
// =============================================================================

#[test]
fn test_classify_directory_records_every_file() {
    let tmp = TempDir::new().unwrap();
    let scans = tmp.path().join("scans");
    fs::create_dir_all(&scans).unwrap();
    write_page(&scans, "a_cover.png");
    write_page(&scans, "b_front.jpg");
    write_page(&scans, "c_list.png");
    fs::write(scans.join("d_broken.jpg"), b"truncated").unwrap();
    fs::write(scans.join("notes.txt"), b"not a scan").unwrap();
    let model = ScriptedModel::new()
        .with_reply(page_type("other"))
        .with_reply(page_type("front"))
        .with_reply("```json\n{\"type\": \"list\"}\n```");
    let progress = tmp.path().join("progress").join(CLASSIFICATION_FILE);

    let result = PageClassifier::new(&model)
        .classify_directory(&scans, Some(&progress))
        .unwrap();

    assert_eq!(result.total, 4);
    assert!(result.is_complete());
    assert_eq!(result.front, vec!["b_front.jpg"]);
    assert_eq!(result.list, vec!["c_list.png"]);
    assert_eq!(result.other, vec!["a_cover.png", "d_broken.jpg"]);
    assert_eq!(result.counts.other, 2);

    let names: Vec<&String> = result.files.keys().collect();
    assert_eq!(names, ["a_cover.png", "b_front.jpg", "c_list.png", "d_broken.jpg"]);
    let broken = &result.files["d_broken.jpg"];
    assert_eq!(broken.page_type, PageType::Other);
    assert!(broken.reason.is_some());
    assert_eq!(model.requests().len(), 3);

    let saved: DirectoryClassification = read_json(&progress).unwrap();
    assert_eq!(saved.processed, 4);
    assert_eq!(saved.files.len(), 4);
    let json: serde_json::Value = read_json(&progress).unwrap();
    assert_eq!(json["files"]["b_front.jpg"]["type"], "front");
}

#[test]
fn test_classify_empty_directory() {
    let tmp = TempDir::new().unwrap();
    let model = ScriptedModel::new();
    let result = PageClassifier::new(&model)
        .classify_directory(tmp.path(), None)
        .unwrap();
    assert_eq!(result.total, 0);
    assert!(result.is_complete());
}

#[test]
fn test_classification_feeds_nearest_following() {
    let tmp = TempDir::new().unwrap();
    let model = shuffled_scans(tmp.path());
    let labels = PageClassifier::new(&model)
        .classify_directory(tmp.path(), None)
        .unwrap();

    let paths = |names: &[String]| -> Vec<PathBuf> {
        names.iter().map(|n| tmp.path().join(n)).collect()
    };
    let pairs = pair_nearest_following(&paths(&labels.front), &paths(&labels.list));

    assert_eq!(pairs.len(), 2);
    assert_eq!(pairs[0].dir_name(), "02__04");
    assert!(!pairs[0].fallback);
    assert_eq!(pairs[1].dir_name(), "03__01");
    assert!(pairs[1].fallback);
}

// =============================================================================
// Classified batches
// =============================================================================

#[test]
fn test_classified_batch_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let scans = tmp.path().join("scans");
    fs::create_dir_all(&scans).unwrap();
    let outdir = tmp.path().join("out");
    let fio = r#"{"surname": "Левин", "name": "Арон", "patronymic": "Яковлевич",
                  "raw": {"front_text": "Левин Арон Яковлевич"}}"#;
    let band = r#"{"surname": "Левин", "initials": {"name": "А", "patronymic": "Я"}}"#;
    let nationality = r#"{"is_jewish": true, "match": "еврей", "confidence": 0.8}"#;
    let model = Arc::new(
        shuffled_scans(&scans)
            .with_pipeline_replies(r#"{"variant": "ru"}"#, nationality, band, fio)
            .with_pipeline_replies(r#"{"variant": "ua"}"#, nationality, band, fio),
    );
    let runner = BatchRunner::new(FieldExtractionPipeline::new(
        model.clone(),
        PipelineOptions::default(),
    ));

    let pairs = runner
        .discover(&scans, PairingMode::Classified, &outdir)
        .unwrap();
    let report = runner.run(&pairs, &outdir).unwrap();

    assert!(outdir.join(CLASSIFICATION_FILE).exists());
    assert_eq!(report.completed, 2);
    assert_eq!(report.flagged, 0);
    assert!(outdir.join("02__04").join("ru_front_head_name.jpg").exists());
    assert!(outdir.join("03__01").join("ua_list_surname_band.jpg").exists());
    assert_eq!(model.remaining(), 0);

    let saved: BatchReport = read_json(&outdir.join(BATCH_FILE)).unwrap();
    assert!(saved.items[1].pair().fallback);
}
