// ABOUTME: Tests for configuration loading and validation
// ABOUTME: Verifies TOML parsing, env var overrides, defaults and rejection of bad values

use serial_test::serial;
use std::io::Write;
use teamsim::config::Config;

/// Helper to clear all config-related env vars
fn clear_config_env_vars() {
    std::env::remove_var("TEAMSIM_CONFIG_PATH");
    std::env::remove_var("SERVER_HOST");
    std::env::remove_var("PORT");
    std::env::remove_var("SERVER_PORT");
    std::env::remove_var("CORS_ORIGIN");
    std::env::remove_var("ENV_MAX_STEPS");
    std::env::remove_var("LOG_TO_FILE");
}

/// Write `content` to a fresh config file and point TEAMSIM_CONFIG_PATH at it
fn use_config_file(content: &str) -> tempfile::TempDir {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let mut file = std::fs::File::create(&config_path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    std::env::set_var("TEAMSIM_CONFIG_PATH", config_path.to_str().unwrap());
    temp_dir
}

#[test]
#[serial]
fn test_config_loads_from_toml_file() {
    clear_config_env_vars();
    let _dir = use_config_file(
        r#"
[server]
host = "0.0.0.0"
port = 8080
cors_origin = "http://localhost:5173"

[environment]
max_steps = 25

[logging]
file = true
"#,
    );

    let config = Config::load().unwrap();

    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.cors_origin, "http://localhost:5173");
    assert_eq!(config.environment.max_steps, 25);
    assert!(config.logging.file);

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_empty_config_file_uses_defaults() {
    clear_config_env_vars();
    let _dir = use_config_file("");

    let config = Config::load().unwrap();

    assert_eq!(config, Config::default());
    assert_eq!(config.server.bind_addr(), "127.0.0.1:3001");

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_env_vars_override_file() {
    clear_config_env_vars();
    let _dir = use_config_file("[server]\nport = 8080\n\n[environment]\nmax_steps = 25\n");

    std::env::set_var("SERVER_PORT", "9090");
    std::env::set_var("ENV_MAX_STEPS", "7");
    std::env::set_var("CORS_ORIGIN", "https://example.com");
    std::env::set_var("LOG_TO_FILE", "true");

    let config = Config::load().unwrap();

    assert_eq!(config.server.port, 9090);
    assert_eq!(config.environment.max_steps, 7);
    assert_eq!(config.server.cors_origin, "https://example.com");
    assert!(config.logging.file);

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_server_port_wins_over_port() {
    clear_config_env_vars();
    let _dir = use_config_file("");

    std::env::set_var("PORT", "4000");
    assert_eq!(Config::load().unwrap().server.port, 4000);

    std::env::set_var("SERVER_PORT", "5000");
    assert_eq!(Config::load().unwrap().server.port, 5000);

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_invalid_port_env_var_fails() {
    clear_config_env_vars();
    let _dir = use_config_file("");

    std::env::set_var("PORT", "not-a-port");
    let err = Config::load().unwrap_err();
    assert!(err.to_string().contains("PORT"));

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_zero_max_steps_rejected() {
    clear_config_env_vars();
    let _dir = use_config_file("[environment]\nmax_steps = 0\n");

    let err = Config::load().unwrap_err();
    assert!(err.to_string().contains("max_steps"));

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_malformed_toml_fails() {
    clear_config_env_vars();
    let _dir = use_config_file("[server\nport = ");

    assert!(Config::load().is_err());

    clear_config_env_vars();
}

#[test]
fn test_default_config_renders_as_toml() {
    let config = Config::default();
    let rendered = toml::to_string_pretty(&config).unwrap();
    assert!(rendered.contains("[server]"));
    assert!(rendered.contains("max_steps = 100"));
}

#[test]
#[serial]
fn test_find_config_file_prefers_env_path() {
    clear_config_env_vars();
    let dir = use_config_file("[server]\nport = 8080\n");

    let found = Config::find_config_file().unwrap();
    assert_eq!(found, dir.path().join("config.toml"));

    let config = Config::load_from(Some(&found)).unwrap();
    assert_eq!(config.server.port, 8080);

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_load_from_none_uses_defaults_and_env() {
    clear_config_env_vars();
    std::env::set_var("ENV_MAX_STEPS", "12");

    let config = Config::load_from(None).unwrap();
    assert_eq!(config.server, Config::default().server);
    assert_eq!(config.environment.max_steps, 12);

    clear_config_env_vars();
}
