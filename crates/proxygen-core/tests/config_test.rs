use proxygen_core::ProxygenConfig;
use tempfile::TempDir;

#[test]
fn load_returns_defaults_when_no_config_file() {
    let tmp = TempDir::new().unwrap();
    let config = ProxygenConfig::load(tmp.path()).unwrap();
    let image = &config.image;

    assert_eq!(image.base_image, "python:3.12-slim");
    assert_eq!(image.installer_image, "ghcr.io/astral-sh/uv:0.5.11");
    assert_eq!(image.installer_binaries, vec!["/uv", "/uvx"]);
    assert_eq!(image.installer_dest, "/bin/");
    assert_eq!(image.workdir, "/app");
    assert_eq!(image.manifest, "pyproject.toml");
    assert_eq!(image.lockfile, "uv.lock");
    assert_eq!(image.sync_command, vec!["uv", "sync"]);
    assert!(image.extra_sync_args.is_empty());
    assert_eq!(image.env_dir, ".venv");
    assert_eq!(image.sources, vec!["app"]);
    assert_eq!(image.entry_module, "main.py");
    assert_eq!(image.run_command, vec!["fastapi", "run"]);
    assert!(image.env.is_empty());
}

#[test]
fn load_parses_full_config() {
    let tmp = TempDir::new().unwrap();
    let toml = r#"
[image]
base_image = "python:3.13-alpine"
installer_image = "ghcr.io/astral-sh/uv:0.6.0"
installer_binaries = ["/uv"]
installer_dest = "/usr/local/bin/"
workdir = "/srv"
manifest = "pyproject.toml"
lockfile = "uv.lock"
sync_command = ["uv", "sync"]
extra_sync_args = ["--no-dev"]
env_dir = "venv"
sources = ["app", "templates"]
entry_module = "server.py"
run_command = ["uvicorn-run"]

[image.env]
PYTHONUNBUFFERED = "1"
"#;
    std::fs::write(tmp.path().join("proxygen.toml"), toml).unwrap();

    let config = ProxygenConfig::load(tmp.path()).unwrap();
    let image = &config.image;

    assert_eq!(image.base_image, "python:3.13-alpine");
    assert_eq!(image.installer_binaries, vec!["/uv"]);
    assert_eq!(image.installer_dest, "/usr/local/bin/");
    assert_eq!(image.workdir, "/srv");
    assert_eq!(image.extra_sync_args, vec!["--no-dev"]);
    assert_eq!(image.sources, vec!["app", "templates"]);
    assert_eq!(image.command(), vec!["uvicorn-run", "server.py"]);
    assert_eq!(image.env_bin_dir(), "/srv/venv/bin");
    assert_eq!(image.env["PYTHONUNBUFFERED"], "1");
}

#[test]
fn load_partial_config_fills_defaults() {
    let tmp = TempDir::new().unwrap();
    let toml = r#"
[image]
entry_module = "service.py"
"#;
    std::fs::write(tmp.path().join("proxygen.toml"), toml).unwrap();

    let config = ProxygenConfig::load(tmp.path()).unwrap();

    assert_eq!(config.image.entry_module, "service.py");
    // Defaults preserved
    assert_eq!(config.image.base_image, "python:3.12-slim");
    assert_eq!(config.image.command(), vec!["fastapi", "run", "service.py"]);
}

#[test]
fn load_invalid_toml_returns_parse_error() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("proxygen.toml"), "not valid {{{{ toml").unwrap();

    let result = ProxygenConfig::load(tmp.path());
    assert!(result.is_err());

    let err = result.unwrap_err().to_string();
    assert!(err.contains("parse"));
}

#[test]
fn load_empty_config_returns_defaults() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("proxygen.toml"), "").unwrap();

    let config = ProxygenConfig::load(tmp.path()).unwrap();
    assert_eq!(config.image.workdir, "/app");
}

#[test]
fn env_bin_dir_normalises_slashes() {
    let mut config = ProxygenConfig::default();
    config.image.workdir = "/app/".to_owned();
    config.image.env_dir = "./.venv/".to_owned();

    assert_eq!(config.image.env_bin_dir(), "/app/.venv/bin");
}
