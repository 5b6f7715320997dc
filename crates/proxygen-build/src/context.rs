use std::path::{Component, Path, PathBuf};

use ignore::WalkBuilder;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use proxygen_core::ImageConfig;

/// Directory, relative to the project root, that receives the build context.
pub const CONTEXT_DIR: &str = ".proxygen-context";

/// Paths never copied into a context, whatever `.dockerignore` says.
const ALWAYS_EXCLUDED: &[&str] = &[CONTEXT_DIR, ".proxygen", ".git"];

/// Assembles the minimal build context for the generated recipe.
///
/// Only what the recipe's `COPY` instructions reference is copied: the
/// manifest, the lock file, every application source and the entry module.
/// Files matched by a root `.dockerignore` are skipped inside source
/// directories. The Dockerfile is written last.
pub fn assemble(
    project_dir: &Path,
    config: &ImageConfig,
    dockerfile_content: &str,
) -> Result<PathBuf, ContextError> {
    let context_dir = project_dir.join(CONTEXT_DIR);

    if context_dir.exists() {
        std::fs::remove_dir_all(&context_dir).map_err(|e| ContextError::Cleanup {
            path: context_dir.clone(),
            source: e,
        })?;
    }
    std::fs::create_dir_all(&context_dir).map_err(|e| ContextError::Create {
        path: context_dir.clone(),
        source: e,
    })?;

    let ignore = load_dockerignore(project_dir)?;
    let mut copied = 0usize;

    // The dependency layer cannot build without these, so .dockerignore
    // does not apply to them.
    for input in [&config.manifest, &config.lockfile] {
        let relative = relative_input(input)?;
        require(project_dir, &relative)?;
        copy_file(project_dir, &context_dir, &relative)?;
        copied += 1;
    }

    for source in config
        .sources
        .iter()
        .chain(std::iter::once(&config.entry_module))
    {
        let relative = relative_input(source)?;
        let src = require(project_dir, &relative)?;

        if src.is_file() {
            copy_file(project_dir, &context_dir, &relative)?;
            copied += 1;
            continue;
        }

        for entry in WalkBuilder::new(&src).standard_filters(false).build() {
            let entry = entry.map_err(|e| ContextError::Walk {
                path: src.clone(),
                source: e,
            })?;
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let Ok(file) = entry.path().strip_prefix(project_dir) else {
                continue;
            };
            if is_excluded(file) || ignore.matched_path_or_any_parents(file, false).is_ignore() {
                tracing::debug!(path = %file.display(), "excluded from build context");
                continue;
            }
            copy_file(project_dir, &context_dir, file)?;
            copied += 1;
        }
    }

    let dockerfile_path = context_dir.join("Dockerfile");
    std::fs::write(&dockerfile_path, dockerfile_content).map_err(|e| {
        ContextError::WriteDockerfile {
            path: dockerfile_path.clone(),
            source: e,
        }
    })?;

    tracing::info!(
        context = %context_dir.display(),
        files = copied,
        "build context assembled"
    );
    Ok(context_dir)
}

/// Builds the matcher for `.dockerignore`. Patterns are anchored at the
/// project root unless they start with `**/`, as `docker build` reads them.
fn load_dockerignore(project_dir: &Path) -> Result<Gitignore, ContextError> {
    let path = project_dir.join(".dockerignore");
    let mut builder = GitignoreBuilder::new(project_dir);
    if path.is_file() {
        let content = std::fs::read_to_string(&path).map_err(|e| ContextError::Ignore {
            path: path.clone(),
            source: e.into(),
        })?;
        for line in content.lines() {
            let Some(pattern) = anchor_pattern(line) else {
                continue;
            };
            builder
                .add_line(Some(path.clone()), &pattern)
                .map_err(|e| ContextError::Ignore {
                    path: path.clone(),
                    source: e,
                })?;
        }
    }
    builder
        .build()
        .map_err(|e| ContextError::Ignore { path, source: e })
}

fn anchor_pattern(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (negate, pattern) = match line.strip_prefix('!') {
        Some(rest) => ("!", rest.trim()),
        None => ("", line),
    };
    let pattern = pattern.trim_start_matches('/');
    if pattern.is_empty() {
        return None;
    }
    if pattern.starts_with("**/") {
        Some(format!("{negate}{pattern}"))
    } else {
        Some(format!("{negate}/{pattern}"))
    }
}

/// Normalizes a configured input path to a plain relative path.
fn relative_input(raw: &str) -> Result<PathBuf, ContextError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let path = Path::new(trimmed);
    let plain = !trimmed.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !plain {
        return Err(ContextError::InvalidPath(raw.to_owned()));
    }
    Ok(path
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect())
}

fn require(project_dir: &Path, relative: &Path) -> Result<PathBuf, ContextError> {
    let path = project_dir.join(relative);
    if path.exists() {
        Ok(path)
    } else {
        Err(ContextError::MissingSource(path))
    }
}

fn is_excluded(relative: &Path) -> bool {
    ALWAYS_EXCLUDED.iter().any(|ex| relative.starts_with(ex))
}

fn copy_file(project_dir: &Path, context_dir: &Path, relative: &Path) -> Result<(), ContextError> {
    let src = project_dir.join(relative);
    let dst = context_dir.join(relative);

    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ContextError::Create {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    std::fs::copy(&src, &dst).map_err(|e| ContextError::CopyFile {
        path: src,
        source: e,
    })?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("failed to clean up context directory {path}")]
    Cleanup {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to create directory {path}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("build input {0} does not exist")]
    MissingSource(PathBuf),
    #[error("build input path {0:?} must be relative to the project and stay inside it")]
    InvalidPath(String),
    #[error("failed to read {path}")]
    Ignore {
        path: PathBuf,
        source: ignore::Error,
    },
    #[error("failed to walk {path}")]
    Walk {
        path: PathBuf,
        source: ignore::Error,
    },
    #[error("failed to copy file {path}")]
    CopyFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write Dockerfile at {path}")]
    WriteDockerfile {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dockerignore_lines_are_root_anchored() {
        assert_eq!(anchor_pattern("cache").as_deref(), Some("/cache"));
        assert_eq!(anchor_pattern("/build/").as_deref(), Some("/build/"));
        assert_eq!(anchor_pattern("**/*.pyc").as_deref(), Some("**/*.pyc"));
        assert_eq!(anchor_pattern("!keep.txt").as_deref(), Some("!/keep.txt"));
        assert_eq!(anchor_pattern("  # note"), None);
        assert_eq!(anchor_pattern(""), None);
    }

    #[test]
    fn relative_input_strips_dot_and_trailing_slash() {
        assert_eq!(relative_input("./app/").unwrap(), PathBuf::from("app"));
        assert_eq!(relative_input("main.py").unwrap(), PathBuf::from("main.py"));
    }

    #[test]
    fn relative_input_rejects_escapes() {
        assert!(matches!(relative_input("../secret"), Err(ContextError::InvalidPath(_))));
        assert!(matches!(relative_input("/etc"), Err(ContextError::InvalidPath(_))));
        assert!(matches!(relative_input(""), Err(ContextError::InvalidPath(_))));
    }
}
