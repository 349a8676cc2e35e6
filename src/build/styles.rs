use anyhow::{Context, Result, anyhow};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Features, Targets};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

use super::core::Artifact;
use crate::config::Config;
use crate::sources::SourceGroup;

/// Browser floor for prefixing and syntax lowering, roughly the evergreen
/// set the usual autoprefixer config targets. Versions encode as
/// `major << 16 | minor << 8`.
fn browser_targets() -> Targets {
    Targets {
        browsers: Some(Browsers {
            chrome: Some(90 << 16),
            edge: Some(90 << 16),
            firefox: Some(88 << 16),
            safari: Some(13 << 16),
            ios_saf: Some(13 << 16),
            ..Browsers::default()
        }),
        include: Features::empty(),
        exclude: Features::empty(),
    }
}

/// Compiles every non-partial `.scss` entry under the styles root, then
/// minifies and prefixes the output CSS. All entries compile in memory
/// before anything is written: a batch with one broken file leaves the
/// previous artifacts on disk untouched.
pub fn build_styles(config: &Config) -> Result<Vec<Artifact>> {
    let group = SourceGroup::styles(config);
    let entries: Vec<PathBuf> = group
        .scan()
        .into_iter()
        .filter(|p| !is_partial(p))
        .collect();

    if entries.is_empty() {
        println!(
            "{} No style entries under {} - skipping",
            "!".yellow(),
            group.root().display()
        );
        return Ok(Vec::new());
    }

    let spinner_style = ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        .unwrap()
        .progress_chars("#>-");

    let pb = ProgressBar::new(entries.len() as u64);
    pb.set_style(spinner_style);
    pb.set_message("Compiling styles...");

    let compiled: Vec<(PathBuf, String)> = entries
        .par_iter()
        .map(|src| -> Result<(PathBuf, String)> {
            let stem = src.file_stem().unwrap_or_default().to_string_lossy();
            pb.set_message(format!("Compiling {}", stem));

            let css = compile_one(src, group.root()).map_err(|e| {
                pb.println(format!("{} Error compiling {}:\n{:#}", "x".red(), src.display(), e));
                anyhow!("Style step failed")
            })?;

            pb.inc(1);
            Ok((output_rel(group.root(), src), css))
        })
        .collect::<Result<Vec<_>>>()?;

    pb.finish_with_message("Styles compiled");

    let mut artifacts = Vec::with_capacity(compiled.len());
    for (rel, css) in compiled {
        let out_path = config.styles.out.join(rel);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&out_path, &css)
            .with_context(|| format!("Failed to write {}", out_path.display()))?;
        artifacts.push(Artifact {
            path: out_path,
            bytes: css.len() as u64,
        });
    }

    Ok(artifacts)
}

/// Sass partials start with an underscore. They are reachable through
/// `@use`/`@import` but never compile on their own.
fn is_partial(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy())
        .is_some_and(|n| n.starts_with('_'))
}

/// Output location relative to the out dir, mirroring the source tree:
/// `src/scss/widgets/nav.scss` lands at `<out>/widgets/nav.css`.
fn output_rel(root: &Path, src: &Path) -> PathBuf {
    let rel = src
        .strip_prefix(root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| PathBuf::from(src.file_name().unwrap_or_default()));
    rel.with_extension("css")
}

fn compile_one(src: &Path, load_root: &Path) -> Result<String> {
    let options = grass::Options::default()
        .style(grass::OutputStyle::Expanded)
        .load_path(load_root);
    let css = grass::from_path(src, &options).map_err(|e| anyhow!("{e}"))?;
    postprocess(&css)
}

/// Minify plus vendor prefixing for the target browser floor.
fn postprocess(css: &str) -> Result<String> {
    let targets = browser_targets();
    let mut sheet =
        StyleSheet::parse(css, ParserOptions::default()).map_err(|e| anyhow!("{e}"))?;
    sheet
        .minify(MinifyOptions {
            targets,
            ..MinifyOptions::default()
        })
        .map_err(|e| anyhow!("{e}"))?;
    let out = sheet
        .to_css(PrinterOptions {
            minify: true,
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| anyhow!("{e}"))?;
    Ok(out.code)
}
