use anyhow::Result;
use colored::*;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::build::cachebust::{self, CacheToken};
use crate::build::scripts::build_scripts;
use crate::build::styles::build_styles;
use crate::config::Config;
use crate::serve::ReloadHandle;
use crate::ui;

/// Where the scheduler is in its lifecycle. `Watching` only appears in
/// the watch and serve modes, between batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Building,
    Watching,
}

/// One emitted output file, for the post-run summary.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub path: PathBuf,
    pub bytes: u64,
}

/// What a single pipeline run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub artifacts: Vec<Artifact>,
    /// Cache token written into the page, if any marker was present.
    pub token: Option<u64>,
    /// How many markers got rewritten.
    pub stamped: usize,
    pub elapsed: Duration,
}

/// The build scheduler. Owns the config, the current lifecycle phase and
/// the token counter, and optionally a handle to the live-reload channel.
pub struct Pipeline {
    config: Config,
    phase: Phase,
    token: CacheToken,
    reload: Option<ReloadHandle>,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            phase: Phase::Idle,
            token: CacheToken::new(),
            reload: None,
        }
    }

    /// Wires the pipeline to a dev server so finished runs push a reload.
    pub fn with_reload(mut self, reload: ReloadHandle) -> Self {
        self.reload = Some(reload);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    /// Runs one full batch: styles and scripts in parallel, then the
    /// cache-bust stamp, then the reload signal. The join waits for both
    /// steps even when one of them fails, and the stamp never runs after
    /// a failed step.
    pub fn run_once(&mut self) -> Result<RunSummary> {
        self.phase = Phase::Building;
        let result = self.execute();
        self.phase = Phase::Idle;
        result
    }

    fn execute(&mut self) -> Result<RunSummary> {
        let started = Instant::now();
        let config = &self.config;

        let (styles_out, scripts_out) =
            rayon::join(|| build_styles(config), || build_scripts(config));

        let mut artifacts = match (styles_out, scripts_out) {
            (Ok(mut css), Ok(js)) => {
                css.extend(js);
                css
            }
            (Err(e), Ok(_)) => return Err(e),
            (Ok(_), Err(e)) => return Err(e),
            (Err(style_err), Err(script_err)) => {
                // Surface both, propagate the first step's error.
                eprintln!("{} Script step also failed: {script_err:#}", "x".red());
                return Err(style_err);
            }
        };
        artifacts.sort_by(|a, b| a.path.cmp(&b.path));

        let (token, stamped) = cachebust::stamp(&self.config.pages.file, &mut self.token)?;

        if let Some(reload) = &self.reload {
            reload.notify("build");
        }

        Ok(RunSummary {
            artifacts,
            token,
            stamped,
            elapsed: started.elapsed(),
        })
    }

    /// Pushes a reload without rebuilding. Used when the only change in a
    /// batch was the tracked page itself.
    pub fn notify_reload(&self) {
        if let Some(reload) = &self.reload {
            reload.notify("page");
        }
    }
}

pub fn print_summary(summary: &RunSummary) {
    if !summary.artifacts.is_empty() {
        let mut table = ui::Table::new(&["Artifact", "Size"]);
        for artifact in &summary.artifacts {
            table.add_row(vec![
                artifact.path.display().to_string(),
                ui::format_bytes(artifact.bytes),
            ]);
        }
        table.print();
    }
    if let Some(token) = summary.token {
        println!(
            "{} Stamped {} cache marker{} (cb={})",
            "✓".green(),
            summary.stamped,
            if summary.stamped == 1 { "" } else { "s" },
            token
        );
    }
    println!("{} Build finished in {:.2?}", "✓".green(), summary.elapsed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn project(dir: &Path) -> Config {
        let config = Config::default().rebase(dir);
        write(&config.styles.src.join("style.scss"), "body { margin: 0; }\n");
        write(&config.scripts.src.join("app.js"), "boot();\n");
        write(
            &config.pages.file,
            "<link href=\"dist/style.css?cb=0\">\n<script src=\"dist/main.js?cb=0\"></script>\n",
        );
        config
    }

    #[test]
    fn test_run_once_builds_stamps_and_returns_to_idle() {
        let dir = tempfile::tempdir().unwrap();
        let config = project(dir.path());
        let mut pipeline = Pipeline::new(config.clone());
        assert_eq!(pipeline.phase(), Phase::Idle);

        let summary = pipeline.run_once().unwrap();
        assert_eq!(pipeline.phase(), Phase::Idle);
        assert_eq!(summary.artifacts.len(), 2);
        assert_eq!(summary.stamped, 2);

        let token = summary.token.unwrap();
        let html = fs::read_to_string(&config.pages.file).unwrap();
        assert!(html.contains(&format!("style.css?cb={token}")));
        assert!(html.contains(&format!("main.js?cb={token}")));
    }

    #[test]
    fn test_failed_step_skips_stamp_and_returns_to_idle() {
        let dir = tempfile::tempdir().unwrap();
        let config = project(dir.path());
        write(
            &config.styles.src.join("style.scss"),
            "body { color: $nope; }\n",
        );

        let mut pipeline = Pipeline::new(config.clone());
        assert!(pipeline.run_once().is_err());
        assert_eq!(pipeline.phase(), Phase::Idle);

        // Page still carries the placeholder markers.
        let html = fs::read_to_string(&config.pages.file).unwrap();
        assert!(html.contains("cb=0"));
    }

    #[test]
    fn test_consecutive_runs_hand_out_fresh_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let config = project(dir.path());
        let mut pipeline = Pipeline::new(config);

        let first = pipeline.run_once().unwrap().token.unwrap();
        let second = pipeline.run_once().unwrap().token.unwrap();
        assert!(second > first);
    }
}
