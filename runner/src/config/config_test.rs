use super::{check_executable, ConfigErrors, LauncherConfig};
use crate::options::OptionValue;
use std::{fs, os::unix::fs::PermissionsExt, path::PathBuf};

#[test]
pub fn empty_config_uses_defaults() {
    let config = LauncherConfig::parse("{}").unwrap();

    assert_eq!(config, LauncherConfig::default());
    assert_eq!(config.watch.process_name, "orted");
    assert_eq!(config.watch.discovery_timeout, 300);
    assert_eq!(config.environment_file, PathBuf::from("/etc/environment"));
    assert!(!config.preflight_checks());
}

#[test]
pub fn full_config_is_parsed() {
    let config = LauncherConfig::parse(
        r#"
network_interface: ens5
preload_library: /opt/ml/libchangehostname.so
custom_mpi_options: "--NCCL_DEBUG WARN -x FOO"
watch:
  discovery_timeout: 60
  wait_timeout: 3600
completion:
  sentinel: /tmp/done
  hosts: [algo-2, algo-3]
  ssh:
    options: ["-o", "BatchMode=yes"]
    timeout: 30
"#,
    )
    .unwrap();

    assert!(!config.preflight_checks());

    let resolved = config.resolver().resolve(&config.custom_mpi_options).unwrap();
    assert_eq!(resolved.get("NCCL_SOCKET_IFNAME"), Some(&OptionValue::text("ens5")));
    assert_eq!(resolved.get("NCCL_DEBUG"), Some(&OptionValue::text("WARN")));
    assert_eq!(
        resolved.get("LD_PRELOAD"),
        Some(&OptionValue::text("/opt/ml/libchangehostname.so"))
    );
    assert_eq!(resolved.unknown, vec!["-x", "FOO"]);

    assert_eq!(config.watch.poll_interval, 1000);
    assert_eq!(config.completion.hosts, vec!["algo-2", "algo-3"]);
    assert_eq!(config.completion.ssh.timeout, Some(30));

    let watcher = config.watch.watcher(crate::process::SystemProcessTable::new());
    assert_eq!(watcher.process_name(), "orted");
    assert_eq!(config.watch.wait_timeout, Some(3600));
}

#[test]
pub fn unknown_fields_are_rejected() {
    assert!(matches!(
        LauncherConfig::parse("network_interfaces: eth1"),
        Err(ConfigErrors::Parse(_))
    ));
    assert!(matches!(
        LauncherConfig::parse("watch:\n  timeout: 3"),
        Err(ConfigErrors::Parse(_))
    ));
}

#[test]
pub fn missing_file_is_a_read_error() {
    assert!(matches!(
        LauncherConfig::load(&PathBuf::from("/nonexistent/mpisync.yaml")),
        Err(ConfigErrors::Read(_))
    ));
}

#[test]
pub fn preflight_catches_problems() {
    let mut config = LauncherConfig::default();
    config.completion.hosts = vec!["algo-2".to_owned()];
    assert!(config.preflight_checks());

    let mut config = LauncherConfig::default();
    config.completion.sentinel = Some(PathBuf::from("/tmp/done"));
    config.completion.hosts = vec!["-oProxyCommand=false".to_owned()];
    assert!(config.preflight_checks());

    let mut config = LauncherConfig::default();
    config.watch.poll_interval = 0;
    assert!(config.preflight_checks());

    let mut config = LauncherConfig::default();
    config.network_interface = " ".to_owned();
    assert!(config.preflight_checks());

    let mut config = LauncherConfig::default();
    config.completion.ssh.program = PathBuf::from("/nonexistent/ssh");
    assert!(config.preflight_checks());
}

#[test]
pub fn executable_bit_is_checked() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ssh");
    fs::write(&path, "").unwrap();

    fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
    assert!(!check_executable(&path).unwrap());

    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    assert!(check_executable(&path).unwrap());

    assert!(matches!(
        check_executable(&dir.path().join("missing")),
        Err(ConfigErrors::FileNotFound)
    ));
}
