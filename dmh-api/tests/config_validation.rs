// dmh-api/tests/config_validation.rs
// ============================================================================
// Module: Configuration Validation Tests
// Description: Required-key, override, and fail-closed parsing checks.
// ============================================================================
//! ## Overview
//! Validates component-scoped required keys and the `DMH_` environment
//! override mapping.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions are permitted."
)]

use dmh_api::Component;
use dmh_api::Config;
use dmh_api::ConfigError;
use dmh_core::EnvelopeIdentity;
use dmh_core::ProcessUnit;

fn no_env() -> impl Iterator<Item = (String, String)> {
    std::iter::empty()
}

fn env(pairs: &[(&str, &str)]) -> impl Iterator<Item = (String, String)> {
    pairs
        .iter()
        .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
        .collect::<Vec<_>>()
        .into_iter()
}

fn issuer_toml() -> String {
    r#"
components = ["dmh"]

[state]
file = "/tmp/dmh-state.json"

[remote_vault]
url = "http://keeper:8080"
client_uuid = "client-1"
"#
    .to_string()
}

fn keeper_toml() -> String {
    format!(
        r#"
components = ["vault"]

[vault]
file = "/tmp/dmh-vault.json"
key = "{}"
"#,
        EnvelopeIdentity::generate().encoded_private_key().to_string()
    )
}

#[test]
fn issuer_config_parses_with_defaults() {
    let config = Config::from_toml(&issuer_toml(), no_env()).unwrap();
    assert!(config.has_component(Component::Dmh));
    assert!(!config.has_component(Component::Vault));
    assert_eq!(config.server.bind, "0.0.0.0:8080");
    assert_eq!(config.action.process_unit, ProcessUnit::Hour);
    assert_eq!(config.dispatcher.tick_seconds, 900);
    assert_eq!(config.remote_vault.unwrap().timeout_ms, 5_000);
}

#[test]
fn keeper_config_parses() {
    let config = Config::from_toml(&keeper_toml(), no_env()).unwrap();
    assert!(config.has_component(Component::Vault));
}

#[test]
fn empty_components_is_rejected() {
    let result = Config::from_toml("components = []\n", no_env());
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn issuer_requires_state_file() {
    let toml = r#"
components = ["dmh"]

[remote_vault]
url = "http://keeper:8080"
client_uuid = "client-1"
"#;
    assert!(matches!(Config::from_toml(toml, no_env()), Err(ConfigError::Invalid(_))));
}

#[test]
fn issuer_requires_a_valid_vault_url() {
    let toml = r#"
components = ["dmh"]

[state]
file = "/tmp/dmh-state.json"

[remote_vault]
url = "keeper-without-scheme"
client_uuid = "client-1"
"#;
    assert!(matches!(Config::from_toml(toml, no_env()), Err(ConfigError::Invalid(_))));
}

#[test]
fn issuer_requires_a_client_uuid() {
    let toml = r#"
components = ["dmh"]

[state]
file = "/tmp/dmh-state.json"

[remote_vault]
url = "http://keeper:8080"
client_uuid = ""
"#;
    assert!(matches!(Config::from_toml(toml, no_env()), Err(ConfigError::Invalid(_))));
}

#[test]
fn keeper_requires_a_parseable_master_key() {
    let toml = r#"
components = ["vault"]

[vault]
file = "/tmp/dmh-vault.json"
key = "definitely not a key"
"#;
    assert!(matches!(Config::from_toml(toml, no_env()), Err(ConfigError::Invalid(_))));
}

#[test]
fn process_unit_parses_all_labels() {
    for (label, expected) in [
        ("second", ProcessUnit::Second),
        ("minute", ProcessUnit::Minute),
        ("hour", ProcessUnit::Hour),
    ] {
        let toml = format!("{}\n[action]\nprocess_unit = \"{label}\"\n", issuer_toml());
        let config = Config::from_toml(&toml, no_env()).unwrap();
        assert_eq!(config.action.process_unit, expected);
    }
}

#[test]
fn env_overrides_map_double_underscores_to_tables() {
    let config = Config::from_toml(
        &issuer_toml(),
        env(&[
            ("DMH_REMOTE_VAULT__URL", "http://other-keeper:9090"),
            ("DMH_DISPATCHER__TICK_SECONDS", "1"),
        ]),
    )
    .unwrap();
    assert_eq!(config.remote_vault.as_ref().unwrap().url, "http://other-keeper:9090");
    assert_eq!(config.dispatcher.tick_seconds, 1);
}

#[test]
fn env_overrides_split_lists_on_commas() {
    let mut toml = issuer_toml();
    toml.push_str(&format!(
        "\n[vault]\nfile = \"/tmp/dmh-vault.json\"\nkey = \"{}\"\n",
        EnvelopeIdentity::generate().encoded_private_key().to_string()
    ));
    let config =
        Config::from_toml(&toml, env(&[("DMH_COMPONENTS", "dmh,vault")])).unwrap();
    assert!(config.has_component(Component::Dmh));
    assert!(config.has_component(Component::Vault));

    // A trailing comma leaves a clean single-element list.
    let config = Config::from_toml(&toml, env(&[("DMH_COMPONENTS", "dmh,")])).unwrap();
    assert!(config.has_component(Component::Dmh));
    assert!(!config.has_component(Component::Vault));
}

#[test]
fn config_file_env_var_is_not_an_override() {
    let config = Config::from_toml(
        &issuer_toml(),
        env(&[("DMH_CONFIG_FILE", "/etc/dmh/dmh.toml")]),
    )
    .unwrap();
    assert!(config.has_component(Component::Dmh));
}

#[test]
fn zero_tick_period_is_rejected() {
    let toml = format!("{}\n[dispatcher]\ntick_seconds = 0\n", issuer_toml());
    assert!(matches!(Config::from_toml(&toml, no_env()), Err(ConfigError::Invalid(_))));
}
