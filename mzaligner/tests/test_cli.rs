use std::{error::Error, process::Command};

use assert_cmd::prelude::*;
use predicates::prelude::*;

use mzaligner::{CorrelationReport, FeatureListDocument};

#[test]
fn test_file_missing() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzaligner")?;

    cmd.arg("align").arg("not_real.json").arg("-o").arg("-");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("No such file or directory"));
    Ok(())
}

#[test]
fn test_malformed_tolerance() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzaligner")?;

    cmd.arg("align")
        .arg("not_real.json")
        .args(["-m", "a:10"]);
    cmd.assert().failure().stderr(predicate::str::contains(
        "Failed to parse absolute m/z tolerance",
    ));
    Ok(())
}

#[test]
fn test_align() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzaligner")?;
    cmd.env("RUST_LOG", "info");
    cmd.args([
        "align",
        "./tests/data/sample_a.json",
        "./tests/data/sample_b.json",
        "-o",
        "-",
        "-n",
        "merged",
    ]);
    let output = cmd.output()?;
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Aligned Rows: 3"), "{stderr}");

    let document: FeatureListDocument = serde_json::from_slice(&output.stdout)?;
    assert_eq!(document.name, "merged");
    assert_eq!(document.raw_files.len(), 2);
    let ids: Vec<u32> = document.rows.iter().map(|r| r.id.0).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(document.rows[0].features.len(), 2);
    assert_eq!(document.rows[1].features.len(), 1);
    assert_eq!(document.rows[2].features.len(), 1);
    let method = document.applied_methods.last().unwrap();
    assert_eq!(method.description, "Join aligner");
    Ok(())
}

#[test]
fn test_align_zero_weights() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzaligner")?;
    cmd.args([
        "align",
        "./tests/data/sample_a.json",
        "./tests/data/sample_b.json",
        "--mz-weight",
        "0",
        "--rt-weight",
        "0",
    ]);
    cmd.assert().failure().stderr(predicate::str::contains(
        "Cannot run alignment, all the weight parameters are zero",
    ));
    Ok(())
}

#[test]
fn test_correlate() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzaligner")?;
    cmd.env("RUST_LOG", "info");
    cmd.args(["correlate", "./tests/data/correlate.json", "-j", "2"]);
    let output = cmd.output()?;
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Correlations: 1"), "{stderr}");

    let reports: Vec<CorrelationReport> = serde_json::from_slice(&output.stdout)?;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].feature_list, "correlate");
    let corr = &reports[0].correlations[0];
    let mut ids = [corr.row_a.0, corr.row_b.0];
    ids.sort();
    assert_eq!(ids, [1, 2]);
    assert!(corr.shapes.is_some());
    Ok(())
}
