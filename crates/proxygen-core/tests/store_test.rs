use proxygen_core::clash::ProviderSource;
use proxygen_core::schema::proxy_name;
use proxygen_core::{Error, Profile, ProfileStore, RulesStore};
use tempfile::TempDir;

fn profile(yaml: &str) -> Profile {
    serde_yaml_ng::from_str(yaml).unwrap()
}

// ── ProfileStore ──

#[test]
fn open_creates_directory() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("data/profiles");

    let store = ProfileStore::open(&dir).unwrap();

    assert!(dir.is_dir());
    assert_eq!(store.base_path(), dir);
}

#[test]
fn save_then_load_keeps_proxy_order_and_fields() {
    let tmp = TempDir::new().unwrap();
    let store = ProfileStore::open(tmp.path()).unwrap();
    let saved = profile(
        "proxies:\n\
         - {name: zeta, type: ss, server: a.example, port: 443}\n\
         - {name: 香港 01, type: vmess, server: b.example, port: 8443, uuid: abc}\n",
    );

    store.save("home", &saved).unwrap();
    let loaded = store.load("home").unwrap();

    assert_eq!(loaded, saved);
    let names: Vec<_> = loaded.proxies.iter().filter_map(proxy_name).collect();
    assert_eq!(names, ["zeta", "香港 01"]);
}

#[test]
fn saved_file_is_block_style_yaml() {
    let tmp = TempDir::new().unwrap();
    let store = ProfileStore::open(tmp.path()).unwrap();
    store
        .save("home", &profile("proxies:\n- {name: a, type: ss}\n"))
        .unwrap();

    let content = std::fs::read_to_string(tmp.path().join("home.yaml")).unwrap();
    assert!(content.starts_with("proxies:\n"));
    assert!(content.contains("name: a"));
    assert!(!content.contains('{'));
}

#[test]
fn load_missing_profile_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let store = ProfileStore::open(tmp.path()).unwrap();

    let err = store.load("ghost").unwrap_err();
    assert!(matches!(err, Error::ProfileNotFound { ref name } if name == "ghost"));
    assert_eq!(err.to_string(), "Profile 'ghost' does not exist.");
}

#[test]
fn load_corrupt_profile_is_parse_error() {
    let tmp = TempDir::new().unwrap();
    let store = ProfileStore::open(tmp.path()).unwrap();
    std::fs::write(tmp.path().join("bad.yaml"), "proxies: [unclosed").unwrap();

    let err = store.load("bad").unwrap_err();
    assert!(matches!(err, Error::ProfileParse { .. }));
}

#[test]
fn profile_without_proxies_key_is_empty() {
    let tmp = TempDir::new().unwrap();
    let store = ProfileStore::open(tmp.path()).unwrap();
    std::fs::write(tmp.path().join("bare.yaml"), "other: 1\n").unwrap();

    assert!(store.load("bare").unwrap().proxies.is_empty());
}

// ── RulesStore ──

fn rules_store(files: &[(&str, &str)]) -> (TempDir, RulesStore) {
    let tmp = TempDir::new().unwrap();
    for (path, content) in files {
        let full = tmp.path().join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, content).unwrap();
    }
    let store = RulesStore::open(tmp.path()).unwrap();
    (tmp, store)
}

#[test]
fn missing_rules_files_yield_empty_content() {
    let (_tmp, store) = rules_store(&[]);

    assert!(store.proxy_groups().is_empty());
    let rules = store.rules();
    assert!(rules.rules.is_empty());
    assert!(rules.rule_providers.is_empty());
}

#[test]
fn reads_groups_rules_and_providers() {
    let (_tmp, store) = rules_store(&[
        (
            "proxy-groups.yaml",
            "proxy-groups:\n- {name: PROXY, type: select}\n- {name: HK, type: url-test}\n",
        ),
        (
            "rules.yaml",
            "rule-providers:\n  ads: {type: file, path: ./lists/ads.list}\nrules:\n- MATCH,PROXY\n",
        ),
    ]);

    assert_eq!(store.proxy_groups().len(), 2);
    let rules = store.rules();
    assert_eq!(rules.rules.len(), 1);
    assert!(rules.rule_providers.contains_key("ads"));
}

#[test]
fn broken_yaml_degrades_to_empty() {
    let (_tmp, store) = rules_store(&[
        ("proxy-groups.yaml", "proxy-groups: [ {"),
        ("rules.yaml", "- just\n- a list\n"),
    ]);

    assert!(store.proxy_groups().is_empty());
    assert!(store.rules().rules.is_empty());
}

#[test]
fn override_appends_yaml_extension() {
    let (_tmp, store) = rules_store(&[
        ("dns.yaml", "dns: {enable: true}\n"),
        ("tun.YML", "tun: {enable: true}\n"),
    ]);

    assert!(store.override_config("dns").contains_key("dns"));
    assert!(store.override_config(" dns.yaml ").contains_key("dns"));
    assert!(store.override_config("tun.YML").contains_key("tun"));
    assert!(store.override_config("").is_empty());
    assert!(store.override_config("absent").is_empty());
}

#[test]
fn override_refuses_paths_outside_rules_dir() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("secret.yaml"), "secret: 1\n").unwrap();
    let store = RulesStore::open(tmp.path().join("rules")).unwrap();

    assert!(store.override_config("../secret").is_empty());
    assert!(store.override_config("/etc/passwd.yaml").is_empty());
}

#[test]
fn provider_lines_skip_comments_and_blanks() {
    let (_tmp, store) = rules_store(&[(
        "lists/ads.list",
        "# header\n\nDOMAIN-SUFFIX,ads.example\n  DOMAIN,track.example  \n   # indented comment\n",
    )]);

    assert_eq!(
        store.provider_lines("./lists/ads.list"),
        ["DOMAIN-SUFFIX,ads.example", "DOMAIN,track.example"]
    );
    assert_eq!(
        store.provider_lines(" lists/ads.list "),
        ["DOMAIN-SUFFIX,ads.example", "DOMAIN,track.example"]
    );
    assert!(store.provider_lines("lists/missing.list").is_empty());
}

#[test]
fn provider_lines_refuse_paths_outside_rules_dir() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("secret.list"), "DOMAIN,secret.example\n").unwrap();
    let store = RulesStore::open(tmp.path().join("rules")).unwrap();

    assert!(store.provider_lines("../secret.list").is_empty());
    assert!(store.provider_lines("./../secret.list").is_empty());
    assert!(store.provider_lines("/etc/hosts").is_empty());
}
