use assert_cmd::cargo::cargo_bin_cmd;
use serde::Deserialize;
use std::{error::Error, fs, path::Path};
use tempfile::tempdir;

#[derive(Deserialize)]
struct Evaluation {
    accuracy: f64,
    precision: f64,
    recall: f64,
    f1: f64,
    time_shift_seconds: f64,
}

/// 600 frames at 60 fps with a peak every second from frame 10.
fn write_ground_truth(path: &Path) -> std::io::Result<()> {
    let mut text = String::from("Time,Peaks\n");
    for i in 0..600 {
        let peak = i >= 10 && (i - 10) % 60 == 0;
        text.push_str(&format!("{},{}\n", i as f64 * 1000.0 / 60.0, u8::from(peak)));
    }
    fs::write(path, text)
}

fn run(gt: &Path, detected: &Path) -> Result<Evaluation, Box<dyn Error>> {
    let mut cmd = cargo_bin_cmd!("rppg");
    cmd.args([
        "evaluate",
        "--ground-truth",
        gt.to_str().expect("utf8 path"),
        "--detected",
        detected.to_str().expect("utf8 path"),
    ]);
    let out = cmd.assert().success().get_output().stdout.clone();
    Ok(serde_json::from_slice(&out)?)
}

#[test]
fn exact_detection_scores_perfectly() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let gt = dir.path().join("gt.csv");
    let detected = dir.path().join("peaks.txt");
    write_ground_truth(&gt)?;
    let peaks: String = (10..600).step_by(60).map(|i| format!("{i}\n")).collect();
    fs::write(&detected, peaks)?;

    let eval = run(&gt, &detected)?;
    assert_eq!(eval.accuracy, 1.0);
    assert_eq!(eval.precision, 1.0);
    assert_eq!(eval.recall, 1.0);
    assert_eq!(eval.f1, 1.0);
    assert_eq!(eval.time_shift_seconds, 0.0);
    Ok(())
}

#[test]
fn delayed_detection_reports_shift() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let gt = dir.path().join("gt.csv");
    let detected = dir.path().join("peaks.txt");
    write_ground_truth(&gt)?;
    let peaks: String = (12..600).step_by(60).map(|i| format!("{i}\n")).collect();
    fs::write(&detected, peaks)?;

    let eval = run(&gt, &detected)?;
    assert!((eval.time_shift_seconds - 2.0 / 60.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn no_detected_peaks_fails() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let gt = dir.path().join("gt.csv");
    let detected = dir.path().join("peaks.txt");
    write_ground_truth(&gt)?;
    fs::write(&detected, "# none\n")?;

    let mut cmd = cargo_bin_cmd!("rppg");
    cmd.args([
        "evaluate",
        "--ground-truth",
        gt.to_str().expect("utf8 path"),
        "--detected",
        detected.to_str().expect("utf8 path"),
    ]);
    cmd.assert().failure();
    Ok(())
}
