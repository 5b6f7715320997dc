use proxygen_core::ImageConfig;

/// Resolver flags the dependency layer always carries: install exactly the
/// lock file, and leave the project's own package out of the layer.
pub const FROZEN_SYNC_FLAGS: &[&str] = &["--frozen", "--no-install-project"];

/// Generates a layered Dockerfile whose dependency layer is cached
/// independently of application source.
pub struct DockerfileGenerator<'a> {
    config: &'a ImageConfig,
}

impl<'a> DockerfileGenerator<'a> {
    pub fn new(config: &'a ImageConfig) -> Self {
        Self { config }
    }

    pub fn render(&self) -> String {
        let c = self.config;

        let installer = if c.installer_binaries.is_empty() {
            String::new()
        } else {
            format!(
                "\n# === Dependency manager ===\nCOPY --from={image} {binaries} {dest}\n",
                image = c.installer_image,
                binaries = c.installer_binaries.join(" "),
                dest = c.installer_dest,
            )
        };

        let sources: String = c
            .sources
            .iter()
            .chain(std::iter::once(&c.entry_module))
            .map(|path| {
                let path = path.trim_start_matches("./").trim_end_matches('/');
                copy_line(&[path], &format!("./{path}"))
            })
            .collect();

        let env: String = c
            .env
            .iter()
            .map(|(key, value)| format!("ENV {key}={}\n", env_value(value)))
            .collect();

        format!(
            r#"# === Base runtime ===
FROM {base}
{installer}
WORKDIR {workdir}

# === Dependencies (rebuilt only when manifest or lock file change) ===
{deps}RUN {sync}

# === Application ===
{sources}
# === Runtime environment ===
ENV PATH="{env_bin}:$PATH"
{env}
# === Entry point ===
ENTRYPOINT []
CMD {command}
"#,
            base = c.base_image,
            workdir = c.workdir,
            deps = copy_line(&[c.manifest.as_str(), c.lockfile.as_str()], "./"),
            sync = self.sync_command().join(" "),
            env_bin = c.env_bin_dir(),
            command = exec_form(&c.command()),
        )
    }

    /// Full resolver invocation for the dependency layer.
    ///
    /// Extra arguments can add flags but never duplicate the frozen ones.
    pub fn sync_command(&self) -> Vec<String> {
        let c = self.config;
        c.sync_command
            .iter()
            .cloned()
            .chain(FROZEN_SYNC_FLAGS.iter().map(|f| (*f).to_owned()))
            .chain(
                c.extra_sync_args
                    .iter()
                    .filter(|arg| !FROZEN_SYNC_FLAGS.contains(&arg.as_str()))
                    .cloned(),
            )
            .collect()
    }
}

fn quote(value: &str) -> String {
    serde_json::Value::String(value.to_owned()).to_string()
}

/// A `COPY` instruction, in JSON form when a path would split on whitespace.
fn copy_line(sources: &[&str], dest: &str) -> String {
    let needs_json = sources
        .iter()
        .chain(std::iter::once(&dest))
        .any(|p| p.chars().any(|ch| ch.is_whitespace() || ch == '"'));
    if needs_json {
        let mut args: Vec<String> = sources.iter().map(|s| (*s).to_owned()).collect();
        args.push(dest.to_owned());
        format!("COPY {}\n", exec_form(&args))
    } else {
        format!("COPY {} {dest}\n", sources.join(" "))
    }
}

/// Double-quoted `ENV` value with `$` kept literal.
fn env_value(value: &str) -> String {
    quote(value).replace('$', "\\$")
}

fn exec_form(args: &[String]) -> String {
    let quoted: Vec<String> = args.iter().map(|a| quote(a)).collect();
    format!("[{}]", quoted.join(", "))
}
