//! Smoke tests for the `aula` binary.
//!
//! Every test runs with a temporary HOME so the session store and lock
//! files never touch the real user directory. No test needs a live
//! identity provider.

use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =============================================================================
// Test Fixtures
// =============================================================================

struct Env {
    home: TempDir,
}

impl Env {
    fn new() -> Self {
        Self {
            home: TempDir::new().expect("create temp home"),
        }
    }

    /// Write `~/.aula/config.toml` with the given API base URL.
    fn with_config(self, api_base: &str) -> Self {
        self.home
            .child(".aula/config.toml")
            .write_str(&format!(
                r#"
environment = "production"

[auth]
authority = "https://id.example.invalid/realms/aula"
client_id = "aula-cli"

[api]
base_url = "{}"
protected_routes = ["{}/api"]
timeout_secs = 5
"#,
                api_base, api_base
            ))
            .unwrap();
        self
    }

    fn aula(&self) -> Command {
        let mut cmd = Command::cargo_bin("aula").unwrap();
        cmd.env("HOME", self.home.path())
            .env_remove("AULA_CONFIG")
            .env_remove("AULA_LOG")
            .env_remove("XDG_CONFIG_HOME");
        cmd
    }
}

// =============================================================================
// Help and completion
// =============================================================================

#[test]
fn help_lists_commands() {
    Env::new()
        .aula()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("login"))
        .stdout(predicate::str::contains("request"))
        .stdout(predicate::str::contains("status"));
}

#[test]
fn completion_generates_script() {
    Env::new()
        .aula()
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("aula"));
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn config_path_reports_discovered_file() {
    let env = Env::new().with_config("https://api.example.invalid");
    env.aula()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(".aula/config.toml"));
}

#[test]
fn config_show_prints_effective_values() {
    let env = Env::new().with_config("https://api.example.invalid");
    env.aula()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://id.example.invalid/realms/aula"))
        .stdout(predicate::str::contains("aula-cli"))
        .stdout(predicate::str::contains("openid profile email offline_access"))
        .stdout(predicate::str::contains("https://api.example.invalid/api"));
}

#[test]
fn explicit_config_flag_wins() {
    let env = Env::new().with_config("https://api.example.invalid");
    let other = env.home.child("other.toml");
    other
        .write_str("environment = \"development\"\n")
        .unwrap();

    env.aula()
        .args(["config", "show", "--config"])
        .arg(other.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("development"))
        .stdout(predicate::str::contains("auth.authority"));
}

#[test]
fn unknown_config_key_is_rejected() {
    let env = Env::new();
    env.home
        .child(".aula/config.toml")
        .write_str("colour = \"blue\"\n")
        .unwrap();

    env.aula()
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn session_commands_need_identity_provider() {
    Env::new()
        .aula()
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("auth.authority"));
}

// =============================================================================
// Session commands without a session
// =============================================================================

#[test]
fn status_reports_signed_out() {
    let env = Env::new().with_config("https://api.example.invalid");
    env.aula()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not signed in"));

    env.aula()
        .args(["status", "-q"])
        .assert()
        .success()
        .stdout(predicate::str::diff("not_authenticated\n"));
}

#[test]
fn status_json_never_contains_tokens() {
    let env = Env::new().with_config("https://api.example.invalid");
    env.aula()
        .args(["status", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"authenticated\": false"))
        .stdout(predicate::str::contains("token").not());
}

#[test]
fn whoami_requires_session() {
    let env = Env::new().with_config("https://api.example.invalid");
    env.aula()
        .arg("whoami")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not signed in"));
}

#[test]
fn logout_twice_succeeds() {
    let env = Env::new().with_config("https://api.example.invalid");
    for _ in 0..2 {
        env.aula()
            .arg("logout")
            .assert()
            .success()
            .stdout(predicate::str::contains("Signed out."));
    }
}

// =============================================================================
// Requests
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn request_prints_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/public/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"pong": true})))
        .mount(&server)
        .await;

    let env = Env::new().with_config(&server.uri());
    let assert = tokio::task::spawn_blocking(move || {
        env.aula().args(["request", "GET", "public/ping"]).assert()
    })
    .await
    .unwrap();
    assert
        .success()
        .stdout(predicate::str::contains("\"pong\": true"));
}

#[tokio::test(flavor = "multi_thread")]
async fn server_error_shows_generic_notice_and_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("stack trace: boom"))
        .mount(&server)
        .await;

    let env = Env::new().with_config(&server.uri());
    let assert = tokio::task::spawn_blocking(move || {
        env.aula().args(["request", "GET", "api/students"]).assert()
    })
    .await
    .unwrap();
    assert
        .failure()
        .stderr(predicate::str::contains(
            "The server could not complete the request",
        ))
        .stderr(predicate::str::contains("HTTP 500"));
}

#[tokio::test(flavor = "multi_thread")]
async fn unauthorized_without_session_fails_cleanly() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/students"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let env = Env::new().with_config(&server.uri());
    let assert = tokio::task::spawn_blocking(move || {
        env.aula().args(["request", "GET", "api/students"]).assert()
    })
    .await
    .unwrap();
    assert
        .failure()
        .stderr(predicate::str::contains("HTTP 401"))
        .stderr(predicate::str::contains("aula login"));
}

#[test]
fn request_rejects_invalid_body() {
    let env = Env::new().with_config("https://api.example.invalid");
    env.aula()
        .args(["request", "POST", "cycles", "--data", "{not json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--data is not valid JSON"));
}
