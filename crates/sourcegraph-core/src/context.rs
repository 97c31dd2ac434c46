use std::{path::Path, process::Stdio};

use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

pub const DEFAULT_LIBS: &str = "rails,ruby";
pub const DEFAULT_MANIFEST: &str = "Gemfile";

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// File name looked up in each ancestor directory.
    pub manifest_name: String,
    /// Program and arguments that print one dependency name per line when run
    /// inside the manifest's directory.
    pub manifest_command: Vec<String>,
    /// Comma-joined list used when no manifest yields dependencies.
    pub default_libs: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            manifest_name: DEFAULT_MANIFEST.to_string(),
            manifest_command: vec![
                "ruby".to_string(),
                "-rbundler".to_string(),
                "-e".to_string(),
                "Bundler.load.dependencies_for.each{|d|puts d.name}".to_string(),
            ],
            default_libs: DEFAULT_LIBS.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("no manifest command configured")]
    NoCommand,
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{program}` exited with {status}: {stderr}")]
    Status {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("dependency list is not valid UTF-8")]
    Decode(#[from] std::string::FromUtf8Error),
    #[error("no dependencies listed")]
    Empty,
}

/// Derives the library scope of a search from the project a file lives in.
#[derive(Debug, Clone, Default)]
pub struct ContextResolver {
    config: ResolverConfig,
}

impl ContextResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// Walks from the file's directory towards the root and lists the
    /// dependencies of the nearest manifest whose command succeeds.
    pub async fn resolve_libraries(&self, file: Option<&Path>) -> String {
        let Some(file) = file else {
            info!(
                target: "sourcegraph_context",
                libs = %self.config.default_libs,
                "buffer has no file name; using default libs"
            );
            return self.config.default_libs.clone();
        };

        for dir in search_dirs(file) {
            let manifest = dir.join(&self.config.manifest_name);
            if !manifest.exists() {
                continue;
            }

            info!(target: "sourcegraph_context", manifest = %manifest.display(), "found manifest");
            match self.list_dependencies(dir).await {
                Ok(libs) => {
                    info!(target: "sourcegraph_context", libs = ?libs, "searching using libs");
                    return libs.join(",");
                }
                Err(error) => warn!(
                    target: "sourcegraph_context",
                    manifest = %manifest.display(),
                    error = %error,
                    default_libs = %self.config.default_libs,
                    "failed to list dependencies"
                ),
            }
        }

        info!(
            target: "sourcegraph_context",
            file = %file.display(),
            libs = %self.config.default_libs,
            "no usable manifest in any ancestor directory; using default libs"
        );
        self.config.default_libs.clone()
    }

    async fn list_dependencies(&self, dir: &Path) -> Result<Vec<String>, ManifestError> {
        let (program, args) = self
            .config
            .manifest_command
            .split_first()
            .ok_or(ManifestError::NoCommand)?;

        let output = Command::new(program)
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| ManifestError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ManifestError::Status {
                program: program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let libs = parse_dependency_list(&String::from_utf8(output.stdout)?);
        if libs.is_empty() {
            return Err(ManifestError::Empty);
        }
        Ok(libs)
    }
}

/// Directories that may hold the manifest for `file`, nearest first. A bare
/// relative file name starts at the working directory.
fn search_dirs(file: &Path) -> impl Iterator<Item = &Path> {
    file.ancestors().skip(1).map(|dir| {
        if dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            dir
        }
    })
}

fn parse_dependency_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}
