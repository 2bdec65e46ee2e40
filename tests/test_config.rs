use std::io::Write;

use elastci::config::Config;

#[test]
fn test_config_load_precedence() {
    // All the env manipulation lives in one test so parallel test threads
    // cannot race on the variables.
    unsafe {
        std::env::remove_var("ELASTCI_CONFIG");
        std::env::remove_var("ELASTCI_DB");
    }
    let cfg = Config::load();
    assert_eq!(cfg.database_path, "db.db");

    // YAML file via ELASTCI_CONFIG
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("elastci.yaml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "database_path: /data/ci.db").unwrap();
    unsafe {
        std::env::set_var("ELASTCI_CONFIG", &path);
    }
    let cfg = Config::load();
    assert_eq!(cfg.database_path, "/data/ci.db");

    // ELASTCI_DB overrides the file
    unsafe {
        std::env::set_var("ELASTCI_DB", "/tmp/override.db");
    }
    let cfg = Config::load();
    assert_eq!(cfg.database_path, "/tmp/override.db");

    unsafe {
        std::env::remove_var("ELASTCI_CONFIG");
        std::env::remove_var("ELASTCI_DB");
    }
}

#[test]
fn test_config_default_and_clone() {
    let cfg = Config::default();
    assert_eq!(cfg.database_path, "db.db");

    let copy = cfg.clone();
    assert_eq!(copy.database_path, cfg.database_path);
}
