//! Build artifact cleanup.
//!
//! `kiln clean` removes the output directories the pipeline writes into.
//! Sources and the tracked page are never touched; a stale `cb=` token in
//! the page simply gets restamped on the next build.

use anyhow::{Context, Result};
use colored::*;

use std::fs;
use std::path::Path;

use crate::config::Config;

pub fn clean(config: &Config) -> Result<()> {
    let mut cleaned = false;

    for dir in [&config.styles.out, &config.scripts.out] {
        // Refuse to treat the project root as an artifact.
        if is_project_root(dir) {
            println!(
                "{} Output directory {} looks like the project root - not removing it",
                "!".yellow(),
                dir.display()
            );
            continue;
        }
        if dir.exists() {
            fs::remove_dir_all(dir)
                .with_context(|| format!("Failed to remove {}", dir.display()))?;
            println!("{} Removed {}", "🗑️".red(), dir.display());
            cleaned = true;
        }
    }

    if cleaned {
        println!("{} Clean complete.", "✓".green());
    } else {
        println!("{} Nothing to clean", "!".yellow());
    }
    Ok(())
}

fn is_project_root(dir: &Path) -> bool {
    dir.as_os_str() == "."
        || dir.as_os_str().is_empty()
        || dir.join(crate::config::CONFIG_FILE).exists()
}
