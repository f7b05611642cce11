use memview::config::*;
use memview::MemViewError;
use std::io::Write;

#[test]
fn test_view_config_defaults() {
    let config = ViewConfig::default();

    assert_eq!(config.window.page_size, 0x1000);
    assert_eq!(config.window.pages_before, 1);
    assert_eq!(config.window.pages_after, 1);
    assert_eq!(config.populator.step_interval_ms, 10);
    assert_eq!(config.populator.stop_timeout_ms, 2000);
    assert_eq!(config.disasm.instruction_limit, 1024);
}

#[test]
fn test_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "window": {{ "page_size": 16384, "pages_after": 3 }},
            "populator": {{ "step_interval_ms": 0 }}
        }}"#
    )
    .unwrap();

    let config = ViewConfig::from_path(file.path()).unwrap();
    assert_eq!(config.window.page_size, 0x4000);
    assert_eq!(config.window.pages_before, 1);
    assert_eq!(config.window.pages_after, 3);
    assert_eq!(config.populator.step_interval_ms, 0);
    assert_eq!(config.populator.stop_timeout_ms, 2000);
    assert_eq!(config.window.window_for(0x10_5000), (0x10_0000, 0x14000));
}

#[test]
fn test_config_written_and_reloaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("memview.json");
    let mut config = ViewConfig::default();
    config.disasm.instruction_limit = 256;
    config.populator.stop_timeout_ms = 500;
    std::fs::write(&path, config.to_json_pretty().unwrap()).unwrap();

    assert_eq!(ViewConfig::from_path(&path).unwrap(), config);
}

#[test]
fn test_config_errors() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.json");
    assert!(matches!(
        ViewConfig::from_path(&missing),
        Err(MemViewError::Io(_))
    ));

    let bad = dir.path().join("bad.json");
    std::fs::write(&bad, r#"{"disasm": {"instruction_limit": 0}}"#).unwrap();
    assert!(matches!(
        ViewConfig::from_path(&bad),
        Err(MemViewError::Config(_))
    ));
}
