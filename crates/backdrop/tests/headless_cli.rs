use std::fs;
use std::process::Command;

use serde_json::Value;
use tempfile::TempDir;

fn backdrop(config_dir: &std::path::Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_backdrop"));
    command
        .env_remove("BACKDROP_CONFIG")
        .env("BACKDROP_CONFIG_DIR", config_dir)
        .env("RUST_LOG", "warn");
    command
}

#[test]
fn headless_run_writes_frame_trace() {
    let root = TempDir::new().unwrap();
    let config = root.path().join("backdrop.toml");
    fs::write(
        &config,
        "pattern = \"veil\"\n\n[veil]\nhue_shift = 0.5\nscanline_intensity = 0.1\n",
    )
    .unwrap();

    let output = backdrop(root.path())
        .arg("--config")
        .arg(&config)
        .args(["--headless", "--frames", "5", "--size", "320x200", "--trace", "-"])
        .args(["--set", "speed=2"])
        .output()
        .expect("failed to run backdrop");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let trace: Value = serde_json::from_slice(&output.stdout).expect("trace is JSON");
    assert_eq!(trace["pattern"], "veil");
    assert_eq!(trace["frames_drawn"], 5);
    assert_eq!(trace["viewport"]["width"], 320);

    let draws = trace["recording"]["draws"].as_array().unwrap();
    assert_eq!(draws.len(), 5);
    let last = draws.last().unwrap();
    assert_eq!(last["index_count"], 6);
    assert_eq!(last["uniforms"]["uHueShift"], 0.5);
    assert_eq!(last["uniforms"]["uSpeed"], 2.0);
    assert_eq!(trace["recording"]["releases"], 1);
}

#[test]
fn trace_file_uses_default_config_dir() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("config.toml"), "[lines]\nline_count = 4\n").unwrap();
    let trace_path = root.path().join("trace.json");

    let status = backdrop(root.path())
        .args(["--headless", "--frames", "2", "--trace"])
        .arg(&trace_path)
        .status()
        .expect("failed to run backdrop");
    assert!(status.success());

    let trace: Value = serde_json::from_str(&fs::read_to_string(&trace_path).unwrap()).unwrap();
    assert_eq!(trace["pattern"], "lines");
    assert_eq!(
        trace["recording"]["draws"][1]["uniforms"]["uLineCount"],
        4.0
    );
}

#[test]
fn unknown_parameter_is_rejected() {
    let root = TempDir::new().unwrap();
    let output = backdrop(root.path())
        .args(["--headless", "--frames", "1", "--set", "hueShift=1"])
        .output()
        .expect("failed to run backdrop");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("hueShift"), "stderr: {stderr}");
}

#[test]
fn invalid_config_file_fails() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("config.toml"), "pattern = \"plasma\"\n").unwrap();
    let status = backdrop(root.path())
        .args(["--headless", "--frames", "1"])
        .status()
        .expect("failed to run backdrop");
    assert!(!status.success());
}

#[test]
fn where_prints_config_path() {
    let root = TempDir::new().unwrap();
    let output = backdrop(root.path())
        .arg("where")
        .output()
        .expect("failed to run backdrop where");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let expected = root.path().join("config.toml");
    assert!(stdout.contains(&expected.display().to_string()), "stdout: {stdout}");
    assert!(stdout.contains("missing"));
}

#[test]
fn zero_headless_frames_is_rejected() {
    let root = TempDir::new().unwrap();
    let output = backdrop(root.path())
        .args(["--headless", "--frames", "0"])
        .output()
        .expect("failed to run backdrop");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--frames"));
}
