use super::*;

use std::collections::HashMap;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join(CONFIG_FILE);
    fs::write(&path, contents).expect("write config");
    (dir, path)
}

#[test]
fn defaults_point_at_the_bench_machine() {
    let settings =
        load_settings_from(Path::new("does-not-exist.toml"), env_from(&[])).expect("settings");

    assert_eq!(settings.backend, Backend::Http);
    assert_eq!(settings.mechanical_url, "http://192.168.47.185");
    assert_eq!(settings.mixer_url, "http://192.168.47.161");
    assert_eq!(settings.poll_interval_ms, 2000);
    assert_eq!(settings.request_timeout_ms, 5000);
    assert_eq!(settings.operators, vec![Credential::bench_operator()]);
}

#[test]
fn file_values_then_env_overrides() {
    let (_dir, path) = write_config(
        r#"
backend = "fake"
mechanical_url = "http://127.0.0.1:8080"
poll_interval_ms = 500

[[operators]]
id = "7"
email = "line@email.com"
password = "secret"
"#,
    );

    let settings = load_settings_from(
        &path,
        env_from(&[
            ("CONSOLE__MIXER_URL", "http://127.0.0.1:8081"),
            ("CONSOLE__POLL_INTERVAL_MS", "750"),
        ]),
    )
    .expect("settings");

    assert_eq!(settings.backend, Backend::Fake);
    assert_eq!(settings.mechanical_url, "http://127.0.0.1:8080");
    assert_eq!(settings.mixer_url, "http://127.0.0.1:8081");
    assert_eq!(settings.poll_interval_ms, 750);
    assert_eq!(settings.operators.len(), 1);
    assert_eq!(settings.operators[0].email, "line@email.com");

    let options = settings.session_options().expect("options");
    assert_eq!(options.poll_interval, Duration::from_millis(750));
    assert_eq!(
        options.endpoints.mixer.base_url().as_str(),
        "http://127.0.0.1:8081/"
    );
}

#[test]
fn request_timeout_is_clamped() {
    let settings = load_settings_from(
        Path::new("does-not-exist.toml"),
        env_from(&[("CONSOLE__REQUEST_TIMEOUT_MS", "30000")]),
    )
    .expect("settings");

    assert_eq!(settings.request_timeout_ms, 5000);
    assert_eq!(settings.request_timeout(), MAX_REQUEST_TIMEOUT);
}

#[test]
fn rejects_bad_values() {
    let missing = Path::new("does-not-exist.toml");
    assert!(load_settings_from(missing, env_from(&[("CONSOLE__BACKEND", "serial")])).is_err());
    assert!(load_settings_from(missing, env_from(&[("CONSOLE__POLL_INTERVAL_MS", "0")])).is_err());
    assert!(
        load_settings_from(missing, env_from(&[("CONSOLE__POLL_INTERVAL_MS", "soon")])).is_err()
    );

    let (_dir, path) = write_config("unknown_key = 1\n");
    assert!(load_settings_from(&path, env_from(&[])).is_err());
}

#[test]
fn invalid_node_url_fails_session_options() {
    let settings = Settings {
        mechanical_url: "not a url".to_string(),
        ..Settings::default()
    };
    assert!(settings.session_options().is_err());
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/console.db"),
        "sqlite://./data/console.db"
    );
    assert_eq!(
        normalize_database_url("  "),
        "sqlite://./data/console.db"
    );
    assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
}

#[test]
fn keeps_windows_absolute_path_with_single_sqlite_colon() {
    assert_eq!(
        normalize_database_url("sqlite:C:\\Users\\op\\console.db"),
        "sqlite:C:/Users/op/console.db"
    );
}

#[test]
fn creates_parent_dir_for_sqlite_url() {
    let dir = tempfile::tempdir().expect("temp dir");
    let db_path = dir.path().join("data").join("console.db");

    prepare_database_url(db_path.to_string_lossy().as_ref()).expect("prepare db url");
    assert!(dir.path().join("data").exists());
}
