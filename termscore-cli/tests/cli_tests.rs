//! End-to-end tests for the termscore binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Command running in an empty directory so no config file is discovered
fn termscore(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("termscore").unwrap();
    cmd.current_dir(dir.path()).env_remove("TERMSCORE_LOG");
    cmd
}

#[test]
fn test_compare_text_report() {
    let dir = tempfile::tempdir().unwrap();
    termscore(&dir)
        .args(["compare", "trump-1", "biden-1", "--data"])
        .arg(fixture_path("series"))
        .assert()
        .success()
        .stdout(predicate::str::contains("A: Trump (2017–2021)"))
        .stdout(predicate::str::contains("Scorecard: Trump 1, Biden 3"))
        .stdout(predicate::str::contains("Overall: Biden"));
}

#[test]
fn test_compare_defaults_to_configured_selections() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(".termscorerc.json"),
        format!(
            r#"{{"data_dir": {:?}, "default_selections": {{"a": "party-R", "b": "party-D"}}}}"#,
            fixture_path("series").display().to_string()
        ),
    )
    .unwrap();

    termscore(&dir)
        .arg("compare")
        .assert()
        .success()
        .stdout(predicate::str::contains("A: Republicans (1980-present)"))
        .stdout(predicate::str::contains("B: Democrats (1980-present)"));
}

#[test]
fn test_compare_json_with_metric_filter() {
    let dir = tempfile::tempdir().unwrap();
    let output = termscore(&dir)
        .args(["compare", "trump-1", "biden-1", "--format", "json"])
        .args(["--metric", "unemployment", "--metric", "cpi", "--data"])
        .arg(fixture_path("series"))
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let metrics = json["metrics"].as_array().unwrap();
    assert_eq!(metrics.len(), 2);
    assert_eq!(metrics[0]["id"], "cpi");
    assert_eq!(metrics[0]["winner"], "A");
    assert_eq!(metrics[1]["winner"], "B");
    assert_eq!(json["overall_winner"], "none");
    assert_eq!(json["a"]["key"], "trump-1");
    assert_eq!(metrics[1]["a"]["series"].as_array().unwrap().len(), 4);
}

#[test]
fn test_compare_unknown_metric_fails() {
    let dir = tempfile::tempdir().unwrap();
    termscore(&dir)
        .args(["compare", "--metric", "bananas", "--data"])
        .arg(fixture_path("series"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown or excluded metric: bananas"));
}

#[test]
fn test_compare_unknown_selection_is_blank_not_error() {
    let dir = tempfile::tempdir().unwrap();
    termscore(&dir)
        .args(["compare", "nobody-1", "biden-1", "--data"])
        .arg(fixture_path("series"))
        .assert()
        .success()
        .stdout(predicate::str::contains("A: nobody-1"))
        .stdout(predicate::str::contains("Scorecard: nobody-1 0, Biden 0"));
}

#[test]
fn test_terms_lists_parties_first() {
    let dir = tempfile::tempdir().unwrap();
    let output = termscore(&dir).arg("terms").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert!(lines[1].starts_with("party-R"));
    assert!(lines[2].starts_with("party-D"));
    assert!(lines[3].starts_with("trump-2"));
    assert_eq!(lines.len(), 15);
}

#[test]
fn test_terms_with_custom_registry() {
    let dir = tempfile::tempdir().unwrap();
    termscore(&dir)
        .args(["terms", "--format", "json", "--registry"])
        .arg(fixture_path("registry.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"first-1\""))
        .stdout(predicate::str::contains("obama").not());
}

#[test]
fn test_validate_reports_invalid_files() {
    let dir = tempfile::tempdir().unwrap();
    termscore(&dir)
        .args(["validate", "--data"])
        .arg(fixture_path("invalid"))
        .assert()
        .failure()
        .stdout(predicate::str::contains("FAIL  duplicate_year.json"))
        .stdout(predicate::str::contains("ok    gas_prices.json"))
        .stderr(predicate::str::contains("2 of 3 series files invalid"));
}

#[test]
fn test_validate_fixture_series_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    termscore(&dir)
        .args(["validate", "--data"])
        .arg(fixture_path("series"))
        .assert()
        .success()
        .stdout(predicate::str::contains("unemployment rows=18 coverage=2008-2025 gaps=none latest"));
}

#[test]
fn test_normalize_writes_series_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("deficit.json");
    termscore(&dir)
        .args(["normalize", "--rule", "sum", "--fiscal-year-start", "10", "--input"])
        .arg(fixture_path("raw/deficit_monthly.json"))
        .arg("--output")
        .arg(&out)
        .assert()
        .success();

    let content = std::fs::read_to_string(&out).unwrap();
    let json: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(json["meta"]["coverage"]["start"], 2022);
    assert_eq!(json["data"][1]["value"], 1800.0);
    assert_eq!(json["data"][2]["latest"], true);
    assert_eq!(json["data"][2]["month"], 11);

    // The written file is valid input for validate
    termscore(&dir)
        .args(["validate", "--data"])
        .arg(dir.path())
        .assert()
        .success();
}

#[test]
fn test_normalize_splices_fallback_before_primary() {
    let dir = tempfile::tempdir().unwrap();
    let output = termscore(&dir)
        .args(["normalize", "--rule", "mean", "--input"])
        .arg(fixture_path("raw/gas_eia.json"))
        .arg("--fallback")
        .arg(fixture_path("raw/gas_bls.json"))
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["meta"]["coverage"]["start"], 1989);
    let value = |i: usize| json["data"][i]["value"].as_f64().unwrap();
    assert!((value(0) - 0.98).abs() < 1e-9);
    // 1991 comes from the primary source even though the fallback has it too
    assert_eq!(json["data"][2]["year"], 1991);
    assert!((value(2) - 1.12).abs() < 1e-9);
    assert_eq!(json["data"][4]["latest"], true);
    assert!(json["meta"]["notes"]
        .as_str()
        .unwrap()
        .contains("1989-1990 filled from bls_gas"));
}

#[test]
fn test_normalize_combine_requires_method() {
    let dir = tempfile::tempdir().unwrap();
    termscore(&dir)
        .args(["normalize", "--input"])
        .arg(fixture_path("raw/p90.json"))
        .arg("--combine-with")
        .arg(fixture_path("raw/p50.json"))
        .assert()
        .failure();
}

#[test]
fn test_config_validate_and_show() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("termscore.config.json"),
        r#"{"latest_partial": "exclude", "exclude": ["sp500"]}"#,
    )
    .unwrap();

    termscore(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config valid"));

    termscore(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("latest_partial: exclude"))
        .stdout(predicate::str::contains("exclude: sp500"));
}

#[test]
fn test_config_validate_rejects_bad_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(".termscorerc.json"),
        r#"{"max_extrapolation_years": 9}"#,
    )
    .unwrap();

    termscore(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_extrapolation_years"));
}
