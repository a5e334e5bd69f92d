use assert_cmd::Command;
use predicates::str::contains;
use std::error::Error;
use std::fs;
use tempfile::tempdir;

#[test]
fn cli_writes_tone_file() -> Result<(), Box<dyn Error>> {
    let output_dir = tempdir()?;
    let output_path = output_dir.path().join("tone.wav");

    let mut cmd = Command::cargo_bin("tonesynth")?;
    cmd.args(["--frequency", "440", "--sample-rate", "44100", "--duration", "1s"])
        .arg(&output_path);
    cmd.assert().success();

    let bytes = fs::read(&output_path)?;
    assert_eq!(bytes.len(), 88_244);
    assert_eq!(&bytes[0..4], b"RIFF");
    assert_eq!(&bytes[8..12], b"WAVE");
    assert_eq!(u32::from_le_bytes(bytes[24..28].try_into()?), 44_100);

    let peak = i16::from_le_bytes([bytes[44 + 50], bytes[44 + 51]]);
    assert!(peak >= 32_700, "quarter period sample was {peak}");

    output_dir.close()?;
    Ok(())
}

#[test]
fn cli_zero_duration_writes_header_only() -> Result<(), Box<dyn Error>> {
    let output_dir = tempdir()?;
    let output_path = output_dir.path().join("silence.wav");

    let mut cmd = Command::cargo_bin("tonesynth")?;
    cmd.args(["--duration", "0s", "--workers", "2"])
        .arg(&output_path);
    cmd.assert().success();

    assert_eq!(fs::metadata(&output_path)?.len(), 44);

    output_dir.close()?;
    Ok(())
}

#[test]
fn cli_refuses_existing_output_without_overwrite() -> Result<(), Box<dyn Error>> {
    let output_dir = tempdir()?;
    let output_path = output_dir.path().join("existing.wav");
    fs::write(&output_path, b"keep")?;

    let mut cmd = Command::cargo_bin("tonesynth")?;
    cmd.args(["--duration", "1s"]).arg(&output_path);
    cmd.assert()
        .failure()
        .stderr(contains("output file already exists"));
    assert_eq!(fs::read(&output_path)?, b"keep");

    let mut cmd = Command::cargo_bin("tonesynth")?;
    cmd.args(["--duration", "1s", "--overwrite"])
        .arg(&output_path);
    cmd.assert().success();
    assert_eq!(fs::metadata(&output_path)?.len(), 88_244);

    output_dir.close()?;
    Ok(())
}

#[test]
fn cli_reports_invalid_frequency() -> Result<(), Box<dyn Error>> {
    let output_dir = tempdir()?;
    let output_path = output_dir.path().join("tone.wav");

    let mut cmd = Command::cargo_bin("tonesynth")?;
    cmd.args(["--frequency", "30000", "--sample-rate", "44100"])
        .arg(&output_path);
    cmd.assert()
        .failure()
        .stderr(contains("failed to create synthesis configuration"));
    assert!(!output_path.exists());

    output_dir.close()?;
    Ok(())
}

#[test]
fn cli_dry_run_prints_plan_without_creating_files() -> Result<(), Box<dyn Error>> {
    let output_dir = tempdir()?;
    let output_path = output_dir.path().join("planned.wav");

    let mut cmd = Command::cargo_bin("tonesynth")?;
    let assert = cmd
        .args(["--duration", "1s", "--workers", "4", "--dry-run"])
        .arg(&output_path)
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone())?;
    assert!(stdout.contains("(88244 bytes)"));
    assert!(stdout.contains("4 worker(s), 10 sample(s) reserved after the header"));
    assert!(stdout.contains("worker 0: samples 10..11018 (11008 samples)"));
    assert!(stdout.contains("worker 3: samples 33034..44100 (11066 samples)"));

    let mut produced = fs::read_dir(output_dir.path())?;
    assert!(produced.next().is_none(), "dry run should not create files");

    output_dir.close()?;
    Ok(())
}
