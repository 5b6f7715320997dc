//! Dependency manifest and lock file validation.
//!
//! The dependency layer must install exactly the locked set, so the inputs
//! are checked before a recipe is rendered or a context assembled: both
//! files present and well-formed, every direct dependency locked at a
//! version its specifier allows.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use proxygen_core::ImageConfig;
use serde::Deserialize;
use sha2::{Digest, Sha256};

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("required build input not found: {path}")]
    Missing { path: PathBuf },

    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("malformed {path}: {detail}")]
    Malformed { path: PathBuf, detail: String },

    #[error("dependency '{name}' is not in the lock file; re-run the resolver and commit the lock")]
    Unlocked { name: String },

    #[error("dependency '{name}' is locked at {locked}, which does not satisfy '{specifier}'")]
    Unsatisfied {
        name: String,
        locked: String,
        specifier: String,
    },
}

#[derive(Deserialize)]
struct ManifestToml {
    project: Option<ProjectSection>,
}

#[derive(Deserialize)]
struct ProjectSection {
    name: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
}

#[derive(Deserialize)]
struct LockToml {
    #[serde(default)]
    package: Vec<RawPackage>,
}

#[derive(Deserialize)]
struct RawPackage {
    name: Option<String>,
    version: Option<String>,
    source: Option<toml::Table>,
    sdist: Option<RawArtifact>,
    #[serde(default)]
    wheels: Vec<RawArtifact>,
}

#[derive(Deserialize)]
struct RawArtifact {
    hash: Option<String>,
}

/// A direct dependency declared in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    /// Normalized distribution name
    pub name: String,
    /// Version specifier, empty when unconstrained
    pub specifier: String,
}

impl Requirement {
    /// Parses a PEP 508 requirement such as `fastapi[standard]>=0.115 ; python_version>'3.8'`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.split(';').next().unwrap_or_default().trim();
        let name_end = line
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
            .unwrap_or(line.len());
        let name = &line[..name_end];
        if name.is_empty() {
            return None;
        }

        let mut rest = line[name_end..].trim_start();
        if rest.starts_with('[') {
            rest = match rest.find(']') {
                Some(end) => rest[end + 1..].trim_start(),
                None => "",
            };
        }
        // Direct URL references carry no version constraint.
        let specifier = if rest.starts_with('@') {
            ""
        } else {
            rest.trim_start_matches('(').trim_end_matches(')').trim()
        };

        Some(Self {
            name: normalize_name(name),
            specifier: specifier.replace(' ', ""),
        })
    }
}

/// Where a locked package comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageSource {
    Registry(String),
    Editable(String),
    Virtual(String),
    Other,
}

/// One pinned entry of the lock file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedPackage {
    pub name: String,
    pub version: String,
    pub source: PackageSource,
    pub hashes: Vec<String>,
}

/// Validated inputs of the dependency layer.
#[derive(Debug, Clone)]
pub struct DependencyLayer {
    project: String,
    requirements: Vec<Requirement>,
    packages: Vec<LockedPackage>,
    cache_key: String,
}

impl DependencyLayer {
    /// Reads and cross-checks the manifest and lock file named in `config`.
    pub fn load(project_dir: &Path, config: &ImageConfig) -> Result<Self, InputError> {
        let manifest_path = project_dir.join(&config.manifest);
        let lock_path = project_dir.join(&config.lockfile);

        let manifest_text = read_input(&manifest_path)?;
        let lock_text = read_input(&lock_path)?;

        let layer = Self::from_sources(&manifest_path, &manifest_text, &lock_path, &lock_text)?;
        tracing::debug!(
            project = %layer.project,
            packages = layer.packages.len(),
            cache_key = %layer.cache_key,
            "dependency inputs validated"
        );
        Ok(layer)
    }

    fn from_sources(
        manifest_path: &Path,
        manifest_text: &str,
        lock_path: &Path,
        lock_text: &str,
    ) -> Result<Self, InputError> {
        let manifest: ManifestToml =
            toml::from_str(manifest_text).map_err(|e| InputError::Parse {
                path: manifest_path.to_path_buf(),
                source: e,
            })?;
        let project = manifest.project.ok_or_else(|| InputError::Malformed {
            path: manifest_path.to_path_buf(),
            detail: "missing [project] table".to_owned(),
        })?;
        let project_name = project.name.ok_or_else(|| InputError::Malformed {
            path: manifest_path.to_path_buf(),
            detail: "missing [project].name".to_owned(),
        })?;
        let project_name = normalize_name(&project_name);

        let requirements = project
            .dependencies
            .iter()
            .map(|dep| {
                Requirement::parse(dep).ok_or_else(|| InputError::Malformed {
                    path: manifest_path.to_path_buf(),
                    detail: format!("unparseable dependency {dep:?}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let lock: LockToml = toml::from_str(lock_text).map_err(|e| InputError::Parse {
            path: lock_path.to_path_buf(),
            source: e,
        })?;
        let packages = lock
            .package
            .into_iter()
            .enumerate()
            .map(|(index, raw)| locked_package(lock_path, index, raw, &project_name))
            .collect::<Result<Vec<_>, _>>()?;

        for requirement in &requirements {
            let locked = packages
                .iter()
                .find(|p| p.name == requirement.name)
                .ok_or_else(|| InputError::Unlocked {
                    name: requirement.name.clone(),
                })?;
            if !specifier_allows(&requirement.specifier, &locked.version) {
                return Err(InputError::Unsatisfied {
                    name: requirement.name.clone(),
                    locked: locked.version.clone(),
                    specifier: requirement.specifier.clone(),
                });
            }
        }

        Ok(Self {
            project: project_name,
            requirements,
            packages,
            cache_key: cache_key(manifest_text.as_bytes(), lock_text.as_bytes()),
        })
    }

    /// Normalized name of the project itself.
    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Every locked package, the project included, in lock order.
    pub fn packages(&self) -> &[LockedPackage] {
        &self.packages
    }

    /// Locked packages the dependency layer installs: everything except the
    /// project's own package.
    pub fn third_party(&self) -> impl Iterator<Item = &LockedPackage> {
        self.packages
            .iter()
            .filter(|p| !is_project_entry(p, &self.project))
    }

    /// Digest identifying the dependency layer's inputs.
    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }
}

/// SHA-256 over the manifest and lock bytes, length-prefixed so the split
/// point between the two files is unambiguous.
pub fn cache_key(manifest: &[u8], lock: &[u8]) -> String {
    let mut hasher = Sha256::new();
    for part in [manifest, lock] {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    format!("{:x}", hasher.finalize())
}

fn read_input(path: &Path) -> Result<String, InputError> {
    if !path.is_file() {
        return Err(InputError::Missing {
            path: path.to_path_buf(),
        });
    }
    std::fs::read_to_string(path).map_err(|e| InputError::Read {
        path: path.to_path_buf(),
        source: e,
    })
}

fn locked_package(
    lock_path: &Path,
    index: usize,
    raw: RawPackage,
    project: &str,
) -> Result<LockedPackage, InputError> {
    let malformed = |detail: String| InputError::Malformed {
        path: lock_path.to_path_buf(),
        detail,
    };

    let name = raw
        .name
        .map(|n| normalize_name(&n))
        .ok_or_else(|| malformed(format!("package #{index} has no name")))?;

    let source = match raw.source {
        Some(table) => source_of(&table),
        None => PackageSource::Other,
    };

    let version = match raw.version {
        Some(version) => version,
        // Dynamic project versions are not recorded in the lock.
        None if name == project => String::new(),
        None => return Err(malformed(format!("package '{name}' has no version"))),
    };

    let hashes = raw
        .sdist
        .into_iter()
        .chain(raw.wheels)
        .filter_map(|a| a.hash)
        .collect();

    Ok(LockedPackage {
        name,
        version,
        source,
        hashes,
    })
}

fn source_of(table: &toml::Table) -> PackageSource {
    let field = |key: &str| table.get(key).and_then(|v| v.as_str()).map(str::to_owned);
    if let Some(url) = field("registry") {
        PackageSource::Registry(url)
    } else if let Some(path) = field("editable") {
        PackageSource::Editable(path)
    } else if let Some(path) = field("virtual") {
        PackageSource::Virtual(path)
    } else {
        PackageSource::Other
    }
}

fn is_project_entry(package: &LockedPackage, project: &str) -> bool {
    package.name == project
        || matches!(&package.source, PackageSource::Editable(p) | PackageSource::Virtual(p) if p == ".")
}

/// PEP 503 normalization: lowercase, runs of `-`, `_`, `.` become `-`.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_separator = false;
    for c in name.trim().chars() {
        if matches!(c, '-' | '_' | '.') {
            in_separator = true;
            continue;
        }
        if in_separator && !out.is_empty() {
            out.push('-');
        }
        in_separator = false;
        out.push(c.to_ascii_lowercase());
    }
    out
}

/// Checks a locked version against a comma-separated specifier.
///
/// Release segments are compared numerically; pre/post/dev suffixes are
/// ignored. Unknown operators are not enforced.
pub fn specifier_allows(specifier: &str, version: &str) -> bool {
    specifier
        .split(',')
        .map(str::trim)
        .filter(|clause| !clause.is_empty())
        .all(|clause| clause_allows(clause, version))
}

fn clause_allows(clause: &str, version: &str) -> bool {
    const OPERATORS: &[&str] = &["===", "~=", "==", "!=", "<=", ">=", "<", ">"];
    let Some(op) = OPERATORS.iter().find(|op| clause.starts_with(**op)) else {
        tracing::warn!(clause, "unrecognised version specifier, not enforced");
        return true;
    };
    let wanted = clause[op.len()..].trim();
    if *op == "===" {
        return wanted == version;
    }

    let have = release(version);
    if let Some(prefix) = wanted.strip_suffix(".*") {
        let prefix = release(prefix);
        let matches = have.len() >= prefix.len() && have[..prefix.len()] == prefix[..];
        return match *op {
            "==" => matches,
            "!=" => !matches,
            _ => true,
        };
    }

    let want = release(wanted);
    let ord = compare(&have, &want);
    match *op {
        "==" => ord == Ordering::Equal,
        "!=" => ord != Ordering::Equal,
        "<=" => ord != Ordering::Greater,
        ">=" => ord != Ordering::Less,
        "<" => ord == Ordering::Less,
        ">" => ord == Ordering::Greater,
        "~=" => {
            // ~=X.Y.Z means >=X.Y.Z and ==X.Y.*
            let prefix = &want[..want.len().saturating_sub(1).max(1).min(want.len())];
            ord != Ordering::Less && have.len() >= prefix.len() && have[..prefix.len()] == *prefix
        }
        _ => true,
    }
}

fn release(version: &str) -> Vec<u64> {
    let version = version.split_once('!').map_or(version, |(_, v)| v);
    version
        .split('.')
        .map_while(|segment| {
            let digits: String = segment.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().ok()
        })
        .collect()
}

fn compare(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            a.get(i)
                .copied()
                .unwrap_or_default()
                .cmp(&b.get(i).copied().unwrap_or_default())
        })
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_requirements() {
        let cases = [
            ("fastapi[standard]>=0.115.0", "fastapi", ">=0.115.0"),
            ("PyYAML", "pyyaml", ""),
            ("pydantic_settings >= 2.0, < 3", "pydantic-settings", ">=2.0,<3"),
            ("rich ; python_version >= '3.8'", "rich", ""),
            ("httpx (>=0.27)", "httpx", ">=0.27"),
            ("pkg @ https://example.com/pkg.whl", "pkg", ""),
        ];
        for (input, name, specifier) in cases {
            let req = Requirement::parse(input).unwrap();
            assert_eq!(req.name, name, "{input}");
            assert_eq!(req.specifier, specifier, "{input}");
        }
        assert!(Requirement::parse(">=1.0").is_none());
    }

    #[test]
    fn normalizes_names() {
        assert_eq!(normalize_name("Pydantic__Settings"), "pydantic-settings");
        assert_eq!(normalize_name("zope.interface"), "zope-interface");
    }

    #[test]
    fn evaluates_specifiers() {
        assert!(specifier_allows("", "1.0"));
        assert!(specifier_allows(">=0.115.0", "0.115.6"));
        assert!(!specifier_allows(">=0.115.0", "0.99.0"));
        assert!(specifier_allows(">=2.0,<3", "2.7.1"));
        assert!(!specifier_allows(">=2.0,<3", "3.0.0"));
        assert!(specifier_allows("==2.*", "2.10.3"));
        assert!(!specifier_allows("==2.*", "3.0"));
        assert!(specifier_allows("!=1.5", "1.6"));
        assert!(specifier_allows("~=1.4.5", "1.4.9"));
        assert!(!specifier_allows("~=1.4.5", "1.5.0"));
        assert!(specifier_allows("~=2.2", "2.9"));
        assert!(!specifier_allows("~=2.2", "3.0"));
        assert!(specifier_allows("==1.0", "1.0.0"));
        assert!(specifier_allows("===1.0+local", "1.0+local"));
        assert!(specifier_allows(">=1.0", "1.1rc1"));
    }

    #[test]
    fn cache_key_separates_inputs() {
        assert_ne!(cache_key(b"ab", b"c"), cache_key(b"a", b"bc"));
        assert_eq!(cache_key(b"a", b"b"), cache_key(b"a", b"b"));
        assert_eq!(cache_key(b"", b"").len(), 64);
    }
}
