//! CLI integration tests for xp-auth

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::fs;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to escape path for TOML on Windows
fn escape_path_for_toml(path: &str) -> String {
    path.replace('\\', "\\\\")
}

/// Temp dir holding a config with a LinkedIn client and a fresh token store
fn setup_test_env() -> (TempDir, String) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let db_path = temp_dir.path().join("data").join("tokens.db");

    let config_content = format!(
        r#"
[store]
path = "{}"

[linkedin]
client_id = "li-client"
client_secret = "li-secret"
redirect_uri = "https://app.example/callback"
"#,
        escape_path_for_toml(&db_path.to_string_lossy())
    );
    fs::write(&config_path, config_content).unwrap();

    (temp_dir, config_path.to_string_lossy().to_string())
}

fn xp_auth(config_path: &str) -> Command {
    let mut cmd = Command::cargo_bin("xp-auth").unwrap();
    cmd.env("CROSSPOST_CONFIG", config_path)
        .env_remove("CROSSPOST_API_BASE")
        .env_remove("CROSSPOST_LINKEDIN_CLIENT_ID")
        .env_remove("CROSSPOST_LINKEDIN_CLIENT_SECRET")
        .env_remove("CROSSPOST_LINKEDIN_REDIRECT_URI")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("xp-auth")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("url"))
        .stdout(predicate::str::contains("exchange"))
        .stdout(predicate::str::contains("login"))
        .stdout(predicate::str::contains("refresh"))
        .stdout(predicate::str::contains("show"));
}

#[test]
fn test_url_prints_authorization_url() {
    let (_temp_dir, config_path) = setup_test_env();

    xp_auth(&config_path)
        .args(["url", "linkedin"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "https://www.linkedin.com/oauth/v2/authorization?",
        ))
        .stdout(predicate::str::contains("client_id=li-client"))
        .stdout(predicate::str::contains("response_type=code"));
}

#[test]
fn test_unknown_platform_rejected() {
    let (_temp_dir, config_path) = setup_test_env();

    xp_auth(&config_path)
        .args(["url", "myspace"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown platform"));
}

#[test]
fn test_unconfigured_platform() {
    let (_temp_dir, config_path) = setup_test_env();

    xp_auth(&config_path)
        .args(["url", "youtube"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("[youtube] section"));
}

#[test]
fn test_show_without_token() {
    let (_temp_dir, config_path) = setup_test_env();

    xp_auth(&config_path)
        .args(["show", "linkedin", "--user", "alice"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("No LinkedIn token stored for user 'alice'"));
}

#[test]
fn test_missing_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("nope.toml");

    xp_auth(&missing.to_string_lossy())
        .args(["url", "linkedin"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Failed to read config file"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_exchange_then_show_redacted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/v2/accessToken"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=AQT-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "li-access-token",
            "expires_in": 5184000,
            "refresh_token": "li-refresh-token"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/userinfo"))
        .and(header("authorization", "Bearer li-access-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sub": "782bbtaQ"})))
        .expect(1)
        .mount(&server)
        .await;

    let (_temp_dir, config_path) = setup_test_env();

    xp_auth(&config_path)
        .env("CROSSPOST_API_BASE", server.uri())
        .args(["exchange", "linkedin", "--user", "alice", "--code", "AQT-code"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Authorized LinkedIn for 'alice'"))
        .stdout(predicate::str::contains("782bbtaQ"));

    xp_auth(&config_path)
        .args(["show", "linkedin", "--user", "alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"subject\": \"782bbtaQ\""))
        .stdout(predicate::str::contains("[REDACTED]"))
        .stdout(predicate::str::contains("li-access-token").not())
        .stdout(predicate::str::contains("li-refresh-token").not());
}
