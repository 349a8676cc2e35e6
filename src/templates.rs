//! Starter site for `kiln new` and `kiln init`.
//!
//! The scaffold is the conventional layout every default in `kiln.toml`
//! points at:
//!
//! - `kiln.toml` - the config, spelled out so it is easy to tweak
//! - `index.html` - one page with `cb=0` markers ready for stamping
//! - `src/scss/` - an entry stylesheet plus a `_theme` partial
//! - `src/js/` - two scripts, to show off bundle order

use anyhow::{Context, Result};
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};

pub fn starter_site(name: &str) -> Vec<(PathBuf, String)> {
    vec![
        (
            PathBuf::from("kiln.toml"),
            format!(
                r#"[project]
name = "{name}"

[styles]
src = "src/scss"
out = "dist"

[scripts]
src = "src/js"
out = "dist"
bundle = "main.js"

[pages]
file = "index.html"

[serve]
host = "127.0.0.1"
port = 3000
"#
            ),
        ),
        (
            PathBuf::from("index.html"),
            format!(
                r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{name}</title>
    <link rel="stylesheet" href="dist/style.css?cb=0">
  </head>
  <body>
    <main class="hero">
      <h1>{name}</h1>
      <p>Edit src/scss or src/js and watch this page rebuild itself.</p>
    </main>
    <script src="dist/main.js?cb=0"></script>
  </body>
</html>
"#
            ),
        ),
        (
            PathBuf::from("src/scss/_theme.scss"),
            r#"$ink: #1f2430;
$paper: #fdfdfb;
$accent: #d95d39;
"#
            .to_string(),
        ),
        (
            PathBuf::from("src/scss/style.scss"),
            r#"@use "theme";

body {
  margin: 0;
  font-family: system-ui, sans-serif;
  color: theme.$ink;
  background: theme.$paper;
}

.hero {
  padding: 4rem 2rem;
  text-align: center;

  h1 {
    color: theme.$accent;
    user-select: none;
  }
}
"#
            .to_string(),
        ),
        (
            PathBuf::from("src/js/app.js"),
            r#"const BANNER = "built with kiln";

document.addEventListener("DOMContentLoaded", () => {
  renderBanner(BANNER);
});
"#
            .to_string(),
        ),
        (
            PathBuf::from("src/js/banner.js"),
            r#"function renderBanner(text) {
  const el = document.querySelector(".hero p");
  if (el) {
    el.setAttribute("title", text);
  }
}
"#
            .to_string(),
        ),
        (
            PathBuf::from(".gitignore"),
            "dist/\n".to_string(),
        ),
    ]
}

/// Writes the starter files under `root`, skipping anything that already
/// exists so re-running `kiln init` never clobbers real work.
pub fn scaffold(root: &Path, name: &str) -> Result<()> {
    for (rel, contents) in starter_site(name) {
        let path = root.join(&rel);
        if path.exists() {
            println!("{} {} exists, skipping", "!".yellow(), path.display());
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}
