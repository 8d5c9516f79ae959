use std::fs;

use bgconfig::{BackdropConfig, ConfigError, PatternKind};
use tempfile::TempDir;

#[test]
fn loads_config_from_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("backdrop.toml");
    fs::write(
        &path,
        r#"
pattern = "dark-veil"

[veil]
distortionAmount = 0.9
"#,
    )
    .unwrap();

    let config = BackdropConfig::load(&path).expect("load config");
    assert_eq!(config.pattern, PatternKind::Veil);
    assert_eq!(config.veil.distortion_amount, 0.9);
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");

    assert!(matches!(
        BackdropConfig::load(&path),
        Err(ConfigError::Io { .. })
    ));
    let config = BackdropConfig::load_or_default(&path).unwrap();
    assert_eq!(config, BackdropConfig::default());
}
