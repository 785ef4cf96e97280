use std::process::Command;

#[test]
fn init_creates_valid_toml() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_diffscope"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(output.status.success(), "diffscope init failed: {}", String::from_utf8_lossy(&output.stderr));

    let config_path = dir.path().join(".diffscope.toml");
    assert!(config_path.exists(), ".diffscope.toml should exist");

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[filter]"));
    assert!(content.contains("[engine]"));

    // Every option is commented out, so the file parses to the defaults
    let config = diffscope_core::DiffConfig::from_toml(&content).unwrap();
    assert_eq!(config.filter.suffix, ".java");
    assert_eq!(config.engine.batch_size, 100);
    assert_eq!(config.revisions.base, "master");
    let _raw: toml::Value = toml::from_str(&content).unwrap();
}

#[test]
fn init_refuses_if_exists() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".diffscope.toml"), "# existing").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_diffscope"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    let content = std::fs::read_to_string(dir.path().join(".diffscope.toml")).unwrap();
    assert_eq!(content, "# existing");
}
