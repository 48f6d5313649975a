use std::{env, fs};

use ambulink_server::config::loader::{load_config, load_config_with_default_path};

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("ambulink.toml");

    let toml_content = r#"
[server]
host = "127.0.0.1"
port = 8081
body_limit_bytes = 2048

[storage]
data_dir = "/var/lib/ambulink"

[logging]
level = "debug"

[llm]
base_url = "http://localhost:9000/v1"
model = "test-model"
temperature = 0.2

[telephony]
enabled = true
account_sid = "AC123"
auth_token = "token"
from_number = "+15550000000"
webhook_base_url = "https://dispatch.example"

[dispatch]
auto_assign = true
channel_capacity = 64
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.server.port, 8081);
    assert_eq!(cfg.storage.data_dir.to_str(), Some("/var/lib/ambulink"));
    assert_eq!(cfg.logging.level, "debug");
    assert_eq!(cfg.llm.model, "test-model");
    assert_eq!(cfg.llm.top_p, 0.1);
    assert!(cfg.telephony.enabled);
    assert_eq!(cfg.telephony.api_base_url, "https://api.twilio.com");
    assert!(cfg.dispatch.auto_assign);
    assert_eq!(cfg.dispatch.channel_capacity, 64);

    // 2) Env override should win over file
    unsafe {
        env::set_var("AMBULINK__DISPATCH__CHANNEL_CAPACITY", "9");
    }
    let cfg_env =
        load_config_with_default_path(Some(&path)).expect("should parse with env overrides");
    assert_eq!(cfg_env.dispatch.channel_capacity, 9);
    unsafe {
        env::remove_var("AMBULINK__DISPATCH__CHANNEL_CAPACITY");
    }

    // 3) Telephony enabled without credentials should error
    let invalid_path = dir.path().join("invalid.toml");
    let invalid_toml = r#"
[telephony]
enabled = true
account_sid = "AC123"
"#;
    fs::write(&invalid_path, invalid_toml).expect("write invalid toml");
    let err = load_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(err.contains("telephony.auth_token"), "{err}");

    // 4) Unknown log level should error
    let bad_level = dir.path().join("bad_level.toml");
    fs::write(&bad_level, "[logging]\nlevel = \"loud\"\n").expect("write toml");
    let err = load_config(bad_level.to_str()).expect_err("expected validation error");
    assert!(err.starts_with("logging.level must be one of"));
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let cfg = load_config(dir.path().join("absent.toml").to_str()).expect("defaults");
    assert_eq!(cfg.server.port, 3000);
    assert_eq!(cfg.storage.data_dir.to_str(), Some("data"));
    assert!(!cfg.telephony.enabled);
}
