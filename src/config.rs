use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "kiln.toml";

/// Everything `kiln.toml` can say. Every section is optional; a project
/// with no config file at all gets the conventional layout that
/// `kiln new` scaffolds.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub project: ProjectConfig,
    pub styles: StylesConfig,
    pub scripts: ScriptsConfig,
    pub pages: PagesConfig,
    pub watch: WatchConfig,
    pub serve: ServeConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct StylesConfig {
    /// Directory scanned for `.scss` entry files.
    pub src: PathBuf,
    pub out: PathBuf,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ScriptsConfig {
    pub src: PathBuf,
    pub out: PathBuf,
    /// Name of the single concatenated bundle.
    pub bundle: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PagesConfig {
    /// The page whose `cb=<digits>` markers get restamped after a build.
    pub file: PathBuf,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct WatchConfig {
    /// Quiet window after the first event of a burst, in milliseconds.
    /// Zero means react immediately and fold whatever queued up meanwhile.
    pub debounce_ms: u64,
    /// Force the polling backend (containers, NFS mounts).
    pub poll: bool,
    pub poll_interval_ms: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServeConfig {
    pub host: String,
    pub port: u16,
    /// Directory served to the browser. The page and the emitted assets
    /// both live under it in the conventional layout.
    pub root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: ProjectConfig::default(),
            styles: StylesConfig::default(),
            scripts: ScriptsConfig::default(),
            pages: PagesConfig::default(),
            watch: WatchConfig::default(),
            serve: ServeConfig::default(),
        }
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "site".to_string(),
        }
    }
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            src: PathBuf::from("src/scss"),
            out: PathBuf::from("dist"),
        }
    }
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            src: PathBuf::from("src/js"),
            out: PathBuf::from("dist"),
            bundle: "main.js".to_string(),
        }
    }
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("index.html"),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 0,
            poll: false,
            poll_interval_ms: 1000,
        }
    }
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            root: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Re-anchors every relative path onto `root`. Paths that are already
    /// absolute stay put. Lets the pipeline run against a project that is
    /// not the current directory.
    pub fn rebase(mut self, root: &Path) -> Self {
        for path in [
            &mut self.styles.src,
            &mut self.styles.out,
            &mut self.scripts.src,
            &mut self.scripts.out,
            &mut self.pages.file,
            &mut self.serve.root,
        ] {
            if path.is_relative() {
                *path = root.join(&*path);
            }
        }
        self
    }
}

// --- Helper: Load Config ---
/// Missing file is fine (defaults apply); a file that exists but will not
/// parse is an error, because silently ignoring it would mask typos.
pub fn load() -> Result<Config> {
    load_from(Path::new(CONFIG_FILE))
}

pub fn load_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} - check file permissions", path.display()))?;
    let config: Config = toml::from_str(&raw).with_context(|| {
        format!(
            "Failed to parse {} - check for syntax errors (missing quotes, brackets)",
            path.display()
        )
    })?;
    Ok(config)
}
