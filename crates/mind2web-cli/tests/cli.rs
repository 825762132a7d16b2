// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

use assert_cmd::Command;
use base64::Engine as _;
use predicates::prelude::*;
use std::{
    io::{Cursor, Write},
    path::{Path, PathBuf},
};
use tempfile::TempDir;

const ACTIONS: [&str; 2] = ["[textbox]  From -> TYPE: NYC", "[button]  Search -> CLICK"];

fn screenshot() -> String {
    let mut png = Vec::new();
    image::DynamicImage::new_rgb8(320, 200)
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();
    base64::engine::general_purpose::STANDARD.encode(png)
}

fn candidate(tag: &str) -> String {
    let attributes = serde_json::json!({ "bounding_box_rect": "32,20,64,40" }).to_string();
    serde_json::json!({ "tag": tag, "attributes": attributes }).to_string()
}

/// Write a JSON Lines file with one record per `(uid, index, has_screenshot)`.
fn write_records(dir: &Path, records: &[(&str, usize, bool)]) -> PathBuf {
    let path = dir.join("records.jsonl");
    let mut file = std::fs::File::create(&path).unwrap();
    let image = screenshot();

    for (uid, index, has_screenshot) in records {
        let line = serde_json::json!({
            "action_uid": uid,
            "annotation_id": "ann-1",
            "target_action_index": index.to_string(),
            "screenshot": has_screenshot.then_some(image.as_str()),
            "pos_candidates": [candidate("button"), candidate("svg")],
            "target_action_reprs": ACTIONS[*index],
            "action_reprs": ACTIONS,
            "website": "united",
            "domain": "Travel",
            "subdomain": "Airlines",
            "confirmed_task": "Find a flight from NYC",
        });
        writeln!(file, "{}", line).unwrap();
    }
    path
}

fn mind2web(datasets: &Path) -> Command {
    let mut cmd = Command::cargo_bin("mind2web").unwrap();
    cmd.arg("--datasets-dir").arg(datasets);
    cmd.env_remove("MIND2WEB_CONFIG").env_remove("RUST_LOG");
    cmd
}

fn convert(temp_dir: &TempDir, records: &[(&str, usize, bool)]) -> PathBuf {
    let datasets = temp_dir.path().join("datasets");
    let input = write_records(temp_dir.path(), records);

    mind2web(&datasets)
        .args(["convert", "--name", "flights"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Created dataset flights with 2 samples in 1 sequences",
        ));
    datasets
}

#[test]
fn test_version() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("mind2web")?;
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    Ok(())
}

#[test]
fn test_convert_skips_missing_screenshots() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let datasets = temp_dir.path().join("datasets");
    let input = write_records(temp_dir.path(), &[("uid-0", 0, true), ("uid-1", 1, false)]);

    mind2web(&datasets)
        .args(["convert", "--name", "flights", "--quality", "90"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("with 1 samples"))
        .stderr(predicate::str::contains(
            "Skipping item uid-1 - no screenshot available",
        ));

    let shots = datasets.join("flights").join("screenshots");
    assert!(shots.join("uid-0.jpg").is_file());
    assert!(!shots.join("uid-1.jpg").exists());
    assert!(datasets.join("flights").join("dataset.json").is_file());
    Ok(())
}

#[test]
fn test_convert_custom_screenshots_dir() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let datasets = temp_dir.path().join("datasets");
    let shots = temp_dir.path().join("shots");
    let input = write_records(temp_dir.path(), &[("uid-0", 0, true)]);

    mind2web(&datasets)
        .args(["convert", "--name", "flights", "--screenshots"])
        .arg(&shots)
        .arg(&input)
        .assert()
        .success()
        .stderr(predicate::str::contains(format!(
            "Screenshots written to {}",
            shots.display()
        )));

    assert!(shots.join("uid-0.jpg").is_file());
    Ok(())
}

#[test]
fn test_convert_without_samples_fails() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let datasets = temp_dir.path().join("datasets");
    let input = write_records(temp_dir.path(), &[("uid-0", 0, false)]);

    mind2web(&datasets)
        .args(["convert", "--name", "empty"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("ERROR"))
        .stderr(predicate::str::contains(
            "No valid samples found in the dataset",
        ));

    mind2web(&datasets)
        .arg("datasets")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
    Ok(())
}

#[test]
fn test_convert_limit() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let datasets = temp_dir.path().join("datasets");
    let input = write_records(temp_dir.path(), &[("uid-0", 0, true), ("uid-1", 1, true)]);

    mind2web(&datasets)
        .args(["convert", "--name", "limited", "--limit", "1"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("with 1 samples"));
    Ok(())
}

#[test]
fn test_convert_no_overwrite() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let datasets = convert(&temp_dir, &[("uid-0", 0, true), ("uid-1", 1, true)]);
    let input = temp_dir.path().join("records.jsonl");

    mind2web(&datasets)
        .args(["convert", "--name", "flights", "--no-overwrite"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    Ok(())
}

#[test]
fn test_convert_invalid_quality() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let input = write_records(temp_dir.path(), &[("uid-0", 0, true)]);

    mind2web(&temp_dir.path().join("datasets"))
        .args(["convert", "--quality", "0"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("jpeg_quality"));
    Ok(())
}

#[test]
fn test_datasets_and_info() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let datasets = convert(&temp_dir, &[("uid-0", 0, true), ("uid-1", 1, true)]);

    mind2web(&datasets)
        .arg("datasets")
        .assert()
        .success()
        .stdout(predicate::str::diff("flights\n"));

    mind2web(&datasets)
        .args(["info", "flights"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Samples:       2"))
        .stdout(predicate::str::contains("Saved views:   sequences"))
        .stdout(predicate::str::contains("ground_truth.target_action_reprs"));

    mind2web(&datasets)
        .args(["info", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing"));
    Ok(())
}

#[test]
fn test_sequences() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let datasets = convert(&temp_dir, &[("uid-1", 1, true), ("uid-0", 0, true)]);

    mind2web(&datasets)
        .args(["sequences", "flights"])
        .assert()
        .success()
        .stdout(predicate::str::diff(
            "ann-1 (2 steps)\n    0: From -> TYPE: NYC\n    1: Search -> CLICK\n",
        ));

    mind2web(&datasets)
        .args(["sequences", "flights", "--view", "episodes"])
        .assert()
        .failure();
    Ok(())
}

#[test]
fn test_export() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let datasets = convert(&temp_dir, &[("uid-0", 0, true), ("uid-1", 1, true)]);

    let json = temp_dir.path().join("export").join("samples.json");
    mind2web(&datasets)
        .args(["export", "flights"])
        .arg(&json)
        .assert()
        .success();

    let samples: Vec<serde_json::Value> = serde_json::from_reader(std::fs::File::open(&json)?)?;
    assert_eq!(samples.len(), 2);
    assert_eq!(samples[0]["ground_truth"]["label"], "TYPE");
    assert_eq!(samples[0]["alternative_candidates"]["detections"][0]["label"], "svg");
    assert_eq!(samples[1]["previous_actions"][0], ACTIONS[0]);

    let arrow = temp_dir.path().join("samples.arrow");
    mind2web(&datasets)
        .args(["export", "flights"])
        .arg(&arrow)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 4 rows"));
    assert!(arrow.is_file());

    mind2web(&datasets)
        .args(["export", "flights", "samples.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected .json or .arrow"));
    Ok(())
}

#[test]
fn test_delete() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let datasets = convert(&temp_dir, &[("uid-0", 0, true), ("uid-1", 1, true)]);

    mind2web(&datasets)
        .args(["delete", "flights"])
        .assert()
        .success();
    assert!(!datasets.join("flights").exists());

    mind2web(&datasets)
        .args(["delete", "flights"])
        .assert()
        .failure();
    Ok(())
}
