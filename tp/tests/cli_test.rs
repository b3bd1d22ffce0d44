//! Command-line tests for the `tp` binary
//!
//! Every run gets its own HOME and config so logs and user config stay inside a temp dir.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const OFFLINE_CONFIG: &str = r#"
llm:
  enabled: false
session:
  max-refinements: 5
  currency: USD
"#;

fn fixture_offers() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../demos/offers.json")
}

fn tp(home: &TempDir, config: &str) -> Command {
    let config_path = home.path().join("tripplanner.yml");
    std::fs::write(&config_path, config).expect("Failed to write config");

    let mut cmd = Command::cargo_bin("tp").expect("tp binary");
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_DATA_HOME", home.path().join("data"))
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("NO_COLOR", "1")
        .env_remove("ANTHROPIC_API_KEY")
        .arg("--config")
        .arg(&config_path);
    cmd
}

// =============================================================================
// Budget
// =============================================================================

#[test]
fn test_budget_text() {
    let home = TempDir::new().expect("Failed to create temp dir");
    tp(&home, OFFLINE_CONFIG)
        .args(["budget", "--total", "3000", "--nights", "5", "--travelers", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Budget 3000.00 USD"))
        .stdout(predicate::str::contains("hotels"))
        .stdout(predicate::str::contains("/night"));
}

#[test]
fn test_budget_json_hotel_share() {
    let home = TempDir::new().expect("Failed to create temp dir");
    let output = tp(&home, OFFLINE_CONFIG)
        .args(["budget", "--total", "3000", "--format", "json"])
        .output()
        .expect("run tp");
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    let hotels = json["breakdown"]["categories"]
        .as_array()
        .expect("categories")
        .iter()
        .find(|c| c["category"] == "hotels")
        .expect("hotels category");
    let amount = hotels["amount"].as_f64().expect("amount");
    assert!((900.0..=1050.0).contains(&amount), "hotels {amount}");
}

#[test]
fn test_budget_rejects_non_positive_total() {
    let home = TempDir::new().expect("Failed to create temp dir");
    tp(&home, OFFLINE_CONFIG)
        .args(["budget", "--total", "0"])
        .assert()
        .failure();
}

// =============================================================================
// Plan
// =============================================================================

#[test]
fn test_plan_json_offline() {
    let home = TempDir::new().expect("Failed to create temp dir");
    let output = tp(&home, OFFLINE_CONFIG)
        .args([
            "plan",
            "--from",
            "New York",
            "--to",
            "Rome",
            "--dates",
            "2025-06-01..2025-06-06",
            "--travelers",
            "2",
            "--budget",
            "3000",
            "--format",
            "json",
        ])
        .output()
        .expect("run tp");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(json["state"], "ready");
    assert_eq!(json["plan"]["itinerary"]["days"].as_array().map(Vec::len), Some(6));
    assert_eq!(json["plan"]["quality"]["provider"], "template");
}

#[test]
fn test_plan_refine_and_finalize() {
    let home = TempDir::new().expect("Failed to create temp dir");
    tp(&home, OFFLINE_CONFIG)
        .args([
            "plan",
            "--from",
            "New York",
            "--to",
            "Rome",
            "--dates",
            "2025-06-01..2025-06-06",
            "--travelers",
            "romantic duo",
            "--refine",
            "add Florence",
            "--refine",
            "make it cheaper",
            "--finalize",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Florence"))
        .stdout(predicate::str::contains("Finalized after 2 refinement(s)"));
}

#[test]
fn test_plan_missing_fields_asks_followup() {
    let home = TempDir::new().expect("Failed to create temp dir");
    tp(&home, OFFLINE_CONFIG)
        .args(["plan", "--to", "Rome"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Where are you traveling from?"))
        .stderr(predicate::str::contains("Missing required trip details: origin, dates, travelers"));
}

#[test]
fn test_plan_rejects_bad_dates() {
    let home = TempDir::new().expect("Failed to create temp dir");
    tp(&home, OFFLINE_CONFIG)
        .args(["plan", "--to", "Rome", "--dates", "2025-06-06..2025-06-01"])
        .assert()
        .failure();
}

// =============================================================================
// Providers
// =============================================================================

#[test]
fn test_providers_lists_template() {
    let home = TempDir::new().expect("Failed to create temp dir");
    tp(&home, OFFLINE_CONFIG)
        .arg("providers")
        .assert()
        .success()
        .stdout(predicate::str::contains("template"))
        .stdout(predicate::str::contains("llm").not());
}

#[test]
fn test_providers_with_fixture_inventory() {
    let home = TempDir::new().expect("Failed to create temp dir");
    let config = format!(
        "llm:\n  enabled: false\nproviders:\n  inventory:\n    fixture-path: {}\n",
        fixture_offers().display()
    );
    let output = tp(&home, &config)
        .args(["providers", "--capability", "search_hotels", "--format", "json"])
        .output()
        .expect("run tp");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    let ids: Vec<&str> = json
        .as_array()
        .expect("provider list")
        .iter()
        .filter_map(|p| p["id"].as_str())
        .collect();
    assert_eq!(ids, vec!["fixture"]);
}

#[test]
fn test_unknown_config_path_fails() {
    let home = TempDir::new().expect("Failed to create temp dir");
    let mut cmd = Command::cargo_bin("tp").expect("tp binary");
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_DATA_HOME", home.path().join("data"))
        .args(["--config", "/nonexistent/tripplanner.yml", "providers"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}
