use std::path::{Path, PathBuf};
use std::sync::Mutex;

use proxygen::{SetupError, Settings};
use secrecy::ExposeSecret;
use tempfile::TempDir;

/// Environment variable tests mutate process-global state, so we serialize them.
static ENV_LOCK: Mutex<()> = Mutex::new(());

const VARS: &[&str] = &["API_KEY", "PROFILE_DIR", "RULES_DIR", "HOST", "PORT"];

fn with_env<F, R>(vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    for key in VARS {
        // SAFETY: protected by ENV_LOCK
        unsafe { std::env::remove_var(key) };
    }
    for (k, v) in vars {
        // SAFETY: protected by ENV_LOCK
        unsafe { std::env::set_var(k, v) };
    }

    let result = f();

    for key in VARS {
        // SAFETY: protected by ENV_LOCK
        unsafe { std::env::remove_var(key) };
    }
    result
}

#[test]
fn defaults_apply_when_only_api_key_is_set() {
    with_env(&[("API_KEY", "k-123")], || {
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.api_key.expose_secret(), "k-123");
        assert_eq!(settings.profile_dir, PathBuf::from("./data/profiles"));
        assert_eq!(settings.rules_dir, PathBuf::from("./data/rules"));
        assert_eq!(settings.bind_addr(), "0.0.0.0:8000");
    });
}

#[test]
fn explicit_values_override_defaults() {
    with_env(
        &[
            ("API_KEY", "k"),
            ("PROFILE_DIR", "/var/lib/proxygen/profiles"),
            ("RULES_DIR", "/etc/proxygen/rules"),
            ("HOST", "127.0.0.1"),
            ("PORT", "9000"),
        ],
        || {
            let settings = Settings::from_env().unwrap();
            assert_eq!(settings.profile_dir, PathBuf::from("/var/lib/proxygen/profiles"));
            assert_eq!(settings.rules_dir, PathBuf::from("/etc/proxygen/rules"));
            assert_eq!(settings.bind_addr(), "127.0.0.1:9000");
        },
    );
}

#[test]
fn missing_api_key_is_an_error() {
    with_env(&[], || {
        let err = Settings::from_env().unwrap_err();
        assert!(matches!(err, SetupError::MissingEnvVar(ref key) if key == "API_KEY"));
    });
}

#[test]
fn blank_api_key_is_treated_as_missing() {
    with_env(&[("API_KEY", "   ")], || {
        assert!(matches!(
            Settings::from_env(),
            Err(SetupError::MissingEnvVar(_))
        ));
    });
}

#[test]
fn invalid_port_is_rejected() {
    with_env(&[("API_KEY", "k"), ("PORT", "eighty")], || {
        let err = Settings::from_env().unwrap_err();
        assert!(matches!(err, SetupError::InvalidPort { ref value, .. } if value == "eighty"));
    });
}

#[test]
fn debug_output_redacts_api_key() {
    with_env(&[("API_KEY", "super-secret")], || {
        let settings = Settings::from_env().unwrap();
        let debug = format!("{settings:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    });
}

#[test]
fn load_in_reads_dotenv_and_resolves_dirs_against_project() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join(".env"),
        "API_KEY=from-dotenv\nRULES_DIR=/etc/proxygen/rules\n",
    )
    .unwrap();

    with_env(&[], || {
        let settings = Settings::load_in(tmp.path()).unwrap();
        assert_eq!(settings.api_key.expose_secret(), "from-dotenv");
        assert_eq!(settings.profile_dir, tmp.path().join("./data/profiles"));
        assert_eq!(settings.rules_dir, Path::new("/etc/proxygen/rules"));
    });
}
