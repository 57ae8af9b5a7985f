use super::*;

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn defaults_point_at_local_development_api() {
    let settings = load_settings_from(None, no_env);
    assert_eq!(settings, Settings::default());

    let config = settings.resolve().expect("resolve");
    assert_eq!(
        config.endpoint.personalize_url().as_str(),
        "http://localhost:8000/personalize"
    );
    assert_eq!(config.request_timeout, Duration::from_secs(60));
}

#[test]
fn file_values_override_defaults() {
    let settings = load_settings_from(
        Some("api_url = \"https://api.example.com/\"\nrequest_timeout_secs = 90\n"),
        no_env,
    );
    assert_eq!(settings.api_url, "https://api.example.com/");
    assert_eq!(settings.request_timeout_secs, 90);
}

#[test]
fn environment_overrides_file_and_prefixed_key_wins() {
    let env = |key: &str| match key {
        "API_URL" => Some("http://plain.example".to_string()),
        "APP__API_URL" => Some("http://prefixed.example///".to_string()),
        "APP__REQUEST_TIMEOUT_SECS" => Some(" 5 ".to_string()),
        _ => None,
    };
    let settings = load_settings_from(Some("api_url = \"http://file.example\""), env);
    assert_eq!(settings.api_url, "http://prefixed.example///");
    assert_eq!(settings.request_timeout_secs, 5);

    let config = settings.resolve().expect("resolve");
    assert_eq!(
        config.endpoint.personalize_url().as_str(),
        "http://prefixed.example/personalize"
    );
}

#[test]
fn malformed_file_and_values_are_ignored() {
    let settings = load_settings_from(Some("api_url = [unterminated"), no_env);
    assert_eq!(settings, Settings::default());

    let env = |key: &str| (key == "APP__REQUEST_TIMEOUT_SECS").then(|| "soon".to_string());
    let settings = load_settings_from(Some("request_timeout_secs = -3"), env);
    assert_eq!(settings.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
}

#[test]
fn zero_timeout_resolves_to_default() {
    let settings = Settings {
        api_url: "http://x".to_string(),
        request_timeout_secs: 0,
    };
    let config = settings.resolve().expect("resolve");
    assert_eq!(
        config.request_timeout,
        Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
    );
}

#[test]
fn invalid_api_url_fails_resolution() {
    let settings = Settings {
        api_url: "file:///tmp/api".to_string(),
        request_timeout_secs: 10,
    };
    assert!(settings.resolve().is_err());
}

#[test]
fn explicit_settings_file_must_be_readable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("missing.toml");

    let err = load_settings(Some(&missing)).expect_err("must fail");
    assert!(err.to_string().contains("missing.toml"), "unexpected: {err}");
}

#[test]
fn explicit_settings_file_is_loaded() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("client.toml");
    fs::write(&path, "api_url = \"http://file.example\"\n").expect("write");

    let settings = load_settings(Some(&path)).expect("load");
    if std::env::var("API_URL").is_err() && std::env::var("APP__API_URL").is_err() {
        assert_eq!(settings.api_url, "http://file.example");
    }
}
