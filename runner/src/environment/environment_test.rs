use super::{write_env_vars, write_vars};
use std::fs;

#[test]
pub fn appends_name_value_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("environment");
    fs::write(&path, "EXISTING=1\n").unwrap();

    let written = write_vars(&path, [("NCCL_DEBUG", "INFO"), ("EMPTY", "")]).unwrap();

    assert_eq!(written, 2);
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "EXISTING=1\nNCCL_DEBUG=INFO\nEMPTY=\n"
    );
}

#[test]
pub fn dumps_process_environment() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("environment");

    let written = write_env_vars(&path).unwrap();
    let content = fs::read_to_string(&path).unwrap();

    // values may span several lines
    assert!(content.lines().count() >= written);
    if let Ok(search_path) = std::env::var("PATH") {
        assert!(content.lines().any(|line| line == format!("PATH={search_path}")));
    }
}

#[test]
pub fn missing_directory_is_an_error() {
    let dir = tempfile::tempdir().unwrap();

    assert!(write_vars(&dir.path().join("missing/environment"), [("A", "b")]).is_err());
}
