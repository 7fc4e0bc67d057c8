use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};

const GROUND_TRUTH: &str = r#"[
  {"class_id": 0, "bbox": [0, 0, 10, 10], "image_id": "a"},
  {"class_id": 1, "bbox": [20, 20, 40, 40], "image_id": "b"}
]"#;

const PREDICTIONS: &str = r#"[
  {"class_id": 0, "confidence": 0.9, "bbox": [0, 0, 10, 10], "image_id": "a"},
  {"class_id": 1, "confidence": 0.8, "bbox": [20, 20, 40, 40], "image_id": "b"}
]"#;

const CONFIG: &str = r#"
[evaluation]
num_classes = 2

[classes]
names = ["person", "bicycle"]
"#;

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn deteval() -> Command {
    let mut cmd = Command::cargo_bin("deteval").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn evaluate_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let preds = write(dir.path(), "preds.json", PREDICTIONS);
    let gts = write(dir.path(), "gts.json", GROUND_TRUTH);
    let config = write(dir.path(), "eval.toml", CONFIG);

    let output = deteval()
        .arg("evaluate")
        .arg("--predictions")
        .arg(&preds)
        .arg("--ground-truth")
        .arg(&gts)
        .arg("--config")
        .arg(&config)
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["overall"]["map50"], 1.0);
    assert_eq!(json["overall"]["num_images"], 2);
    assert_eq!(json["per_class"]["1"]["name"], "bicycle");
    assert_eq!(json["metadata"]["top_k"], 3);
    assert!(json["version"].is_string());
}

#[test]
fn evaluate_human_output() {
    let dir = tempfile::tempdir().unwrap();
    let preds = write(dir.path(), "preds.json", PREDICTIONS);
    let gts = write(dir.path(), "gts.json", GROUND_TRUTH);
    let config = write(dir.path(), "eval.toml", CONFIG);

    deteval()
        .args(["--no-color", "evaluate", "-p"])
        .arg(&preds)
        .arg("-g")
        .arg(&gts)
        .arg("-c")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Overall:"))
        .stdout(predicate::str::contains("mAP50 = 1.0000"))
        .stdout(predicate::str::contains("person"));
}

#[test]
fn command_line_overrides_config() {
    let dir = tempfile::tempdir().unwrap();
    let preds = write(dir.path(), "preds.json", PREDICTIONS);
    let gts = write(dir.path(), "gts.json", GROUND_TRUTH);
    let config = write(dir.path(), "eval.toml", "[evaluation]\nnum_classes = 2\n");

    let output = deteval()
        .arg("evaluate")
        .arg("-p")
        .arg(&preds)
        .arg("-g")
        .arg(&gts)
        .arg("-c")
        .arg(&config)
        .args(["--num-classes", "1", "--top-k", "5", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["metadata"]["num_classes"], 1);
    assert_eq!(json["metadata"]["top_k"], 5);
    // the class-1 records fall outside the single configured class
    assert_eq!(json["metadata"]["rejected"]["predictions"], 1);
    assert_eq!(json["metadata"]["rejected"]["ground_truths"], 1);
}

fn evaluate_json(preds: &Path, gts: &Path, config: &Path) -> serde_json::Value {
    let output = deteval()
        .arg("evaluate")
        .arg("-p")
        .arg(preds)
        .arg("-g")
        .arg(gts)
        .arg("-c")
        .arg(config)
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn undecodable_record_is_skipped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let preds = write(
        dir.path(),
        "preds.json",
        r#"[
  {"class_id": 0, "confidence": 0.9, "bbox": [0, 0, 10, 10], "image_id": "a"},
  {"class_id": -1, "confidence": 0.9, "bbox": [0, 0, 10, 10], "image_id": "a"}
]"#,
    );
    let gts = write(
        dir.path(),
        "gts.json",
        r#"[
  {"class_id": 0, "bbox": [0, 0, 10, 10], "image_id": "a"},
  {"class_id": 0, "bbox": [0, 0, 10], "image_id": "a"}
]"#,
    );
    let config = write(dir.path(), "eval.toml", CONFIG);

    let json = evaluate_json(&preds, &gts, &config);
    assert_eq!(json["metadata"]["rejected"]["predictions"], 1);
    assert_eq!(json["metadata"]["rejected"]["ground_truths"], 1);
    assert_eq!(json["metadata"]["rejected"]["by_reason"]["malformed"], 2);
    assert_eq!(json["overall"]["num_predictions"], 1);
    assert_eq!(json["overall"]["map50"], 1.0);
}

#[test]
fn prediction_without_confidence_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let preds = write(
        dir.path(),
        "preds.json",
        r#"[
  {"class_id": 0, "confidence": 0.4, "bbox": [0, 0, 10, 10], "image_id": "a"},
  {"class_id": 0, "bbox": [50, 50, 60, 60], "image_id": "a"}
]"#,
    );
    let gts = write(dir.path(), "gts.json", GROUND_TRUTH);
    let config = write(dir.path(), "eval.toml", CONFIG);

    let json = evaluate_json(&preds, &gts, &config);
    assert_eq!(json["metadata"]["rejected"]["predictions"], 1);
    assert_eq!(json["metadata"]["rejected"]["by_reason"]["missing_confidence"], 1);
    assert_eq!(json["overall"]["num_predictions"], 1);
    assert_eq!(json["overall"]["precision"], 1.0);
}

#[test]
fn missing_input_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let gts = write(dir.path(), "gts.json", GROUND_TRUTH);
    let config = write(dir.path(), "eval.toml", CONFIG);

    deteval()
        .arg("evaluate")
        .arg("-p")
        .arg(dir.path().join("nope.json"))
        .arg("-g")
        .arg(&gts)
        .arg("-c")
        .arg(&config)
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Error: failed to read"));
}

#[test]
fn malformed_json_fails() {
    let dir = tempfile::tempdir().unwrap();
    let preds = write(dir.path(), "preds.json", "{\"not\": \"a list\"}");
    let gts = write(dir.path(), "gts.json", GROUND_TRUTH);
    let config = write(dir.path(), "eval.toml", CONFIG);

    deteval()
        .arg("evaluate")
        .arg("-p")
        .arg(&preds)
        .arg("-g")
        .arg(&gts)
        .arg("-c")
        .arg(&config)
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("is not a JSON array of detections"));
}

#[test]
fn invalid_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let preds = write(dir.path(), "preds.json", PREDICTIONS);
    let gts = write(dir.path(), "gts.json", GROUND_TRUTH);
    let config = write(
        dir.path(),
        "eval.toml",
        "[evaluation]\nnum_classes = 2\niou_threshold = 1.5\n",
    );

    deteval()
        .arg("evaluate")
        .arg("-p")
        .arg(&preds)
        .arg("-g")
        .arg(&gts)
        .arg("-c")
        .arg(&config)
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("iou_threshold must be in (0, 1]"));
}

#[test]
fn schema_subcommand_prints_json_schema() {
    let output = deteval().arg("schema").output().unwrap();
    assert!(output.status.success());

    let schema: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(schema["title"], "EvaluationResult");
    assert!(schema["definitions"]["ConfusedPair"].is_object());
}

#[test]
fn no_arguments_prints_help() {
    deteval()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}
