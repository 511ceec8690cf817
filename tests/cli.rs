//! End-to-end tests of the readgraph binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const READS: &str = ">r1 first\nAAACCCGGG\nTTT\n>r2\nCCCAGGTTTAAA\n>r3\nGGGG\n";
const OVERLAPS: &str = "r2\t12\t0\t9\t+\tr1\t12\t3\t12\t8\t9\t60\tcg:Z:3=1X5=\n";

fn write_inputs(dir: &Path, overlaps: &str) -> (PathBuf, PathBuf) {
    let reads = dir.join("reads.fa");
    let paf = dir.join("overlaps.paf");
    fs::write(&reads, READS).unwrap();
    fs::write(&paf, overlaps).unwrap();
    (reads, paf)
}

fn readgraph() -> Command {
    Command::cargo_bin("readgraph").unwrap()
}

#[test]
fn test_assemble_text_summary() {
    let dir = TempDir::new().unwrap();
    let (reads, paf) = write_inputs(dir.path(), OVERLAPS);
    readgraph()
        .args(["assemble", "-r"])
        .arg(&reads)
        .arg("-p")
        .arg(&paf)
        .assert()
        .success()
        .stdout(predicate::str::contains("Overlaps applied: 1 (skipped 0)"))
        .stdout(predicate::str::is_match(r"Contigs:\s+2\n").unwrap())
        .stdout(predicate::str::is_match(r"Substitutions:\s+1\n").unwrap());
}

#[test]
fn test_assemble_json_and_contigs() {
    let dir = TempDir::new().unwrap();
    let (reads, paf) = write_inputs(dir.path(), OVERLAPS);
    let contigs = dir.path().join("contigs.fa");
    let stats = dir.path().join("stats.json");
    readgraph()
        .args(["assemble", "-r"])
        .arg(&reads)
        .arg("-p")
        .arg(&paf)
        .arg("--contigs")
        .arg(&contigs)
        .args(["--format", "json", "-o"])
        .arg(&stats)
        .assert()
        .success();

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&stats).unwrap()).unwrap();
    assert_eq!(json["contig_count"], 2);
    assert_eq!(json["mutation_count"], 1);
    let fasta = fs::read_to_string(&contigs).unwrap();
    assert!(fasta.contains("AAACCCGGGTTTAAA\n"));
    assert!(fasta.contains("GGGG\n"));
}

#[test]
fn test_assemble_skips_bad_overlaps() {
    let dir = TempDir::new().unwrap();
    let bad = format!("{}r9\t12\t0\t9\t+\tr1\t12\t3\t12\t8\t9\t60\tcg:Z:9=\n", OVERLAPS);
    let (reads, paf) = write_inputs(dir.path(), &bad);
    readgraph()
        .args(["assemble", "-r"])
        .arg(&reads)
        .arg("-p")
        .arg(&paf)
        .assert()
        .success()
        .stdout(predicate::str::contains("Overlaps applied: 1 (skipped 1)"));
}

#[test]
fn test_assemble_strict_fails_on_bad_overlap() {
    let dir = TempDir::new().unwrap();
    let bad = "r2\t12\t0\t9\t+\tr1\t12\t3\t12\t8\t9\t60\tcg:Z:3=1P5=\n";
    let (reads, paf) = write_inputs(dir.path(), bad);
    readgraph()
        .args(["assemble", "--strict", "-r"])
        .arg(&reads)
        .arg("-p")
        .arg(&paf)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid CIGAR"));
}

#[test]
fn test_assemble_missing_file() {
    let dir = TempDir::new().unwrap();
    readgraph()
        .args(["assemble", "-r"])
        .arg(dir.path().join("missing.fa"))
        .arg("-p")
        .arg(dir.path().join("missing.paf"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("File not found"));
}

#[test]
fn test_validate_reports_errors() {
    let dir = TempDir::new().unwrap();
    let bad = format!(
        "{}r2\t12\t0\t9\t+\tr1\t12\t3\t12\t8\t9\t60\tcg:Z:8=\n",
        OVERLAPS
    );
    let (reads, paf) = write_inputs(dir.path(), &bad);
    readgraph()
        .args(["validate", "-r"])
        .arg(&reads)
        .arg("-p")
        .arg(&paf)
        .assert()
        .success()
        .stdout(predicate::str::contains("Overlaps: 2"))
        .stdout(predicate::str::contains("✗ line 2: Invalid overlap"))
        .stdout(predicate::str::contains("Validation failed with 1 errors"));
}

#[test]
fn test_validate_passes() {
    let dir = TempDir::new().unwrap();
    let (reads, paf) = write_inputs(dir.path(), OVERLAPS);
    readgraph()
        .args(["validate", "-r"])
        .arg(&reads)
        .arg("-p")
        .arg(&paf)
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Validation passed"));
}
