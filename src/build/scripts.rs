use anyhow::{Context, Result, anyhow};
use colored::*;
use minify_js::{Session, TopLevelMode, minify};
use std::fs;

use super::core::Artifact;
use crate::config::Config;
use crate::sources::SourceGroup;

/// Concatenates every `.js` source in scan order into one bundle, then
/// minifies it. Concatenation happens fully in memory; the bundle on disk
/// is only replaced once the whole batch minified cleanly.
pub fn build_scripts(config: &Config) -> Result<Vec<Artifact>> {
    let group = SourceGroup::scripts(config);
    let sources = group.scan();

    if sources.is_empty() {
        println!(
            "{} No script sources under {} - skipping",
            "!".yellow(),
            group.root().display()
        );
        return Ok(Vec::new());
    }

    let mut bundle = String::new();
    for src in &sources {
        let code = fs::read_to_string(src)
            .with_context(|| format!("Failed to read {}", src.display()))?;
        bundle.push_str(&code);
        if !code.ends_with('\n') {
            bundle.push('\n');
        }
    }

    let session = Session::new();
    let mut minified = Vec::new();
    minify(&session, TopLevelMode::Global, bundle.as_bytes(), &mut minified).map_err(|e| {
        anyhow!(
            "Minification failed for the {} bundle: {e:?}",
            config.scripts.bundle
        )
    })?;

    fs::create_dir_all(&config.scripts.out)
        .with_context(|| format!("Failed to create {}", config.scripts.out.display()))?;
    let out_path = config.scripts.out.join(&config.scripts.bundle);
    fs::write(&out_path, &minified)
        .with_context(|| format!("Failed to write {}", out_path.display()))?;

    Ok(vec![Artifact {
        path: out_path,
        bytes: minified.len() as u64,
    }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn test_config(dir: &Path) -> Config {
        Config::default().rebase(dir)
    }

    #[test]
    fn test_bundles_in_path_order() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        write(&config.scripts.src.join("b.js"), "second();\n");
        write(&config.scripts.src.join("a.js"), "first();\n");

        let artifacts = build_scripts(&config).unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].path, config.scripts.out.join("main.js"));

        let js = fs::read_to_string(&artifacts[0].path).unwrap();
        let first = js.find("first").unwrap();
        let second = js.find("second").unwrap();
        assert!(first < second, "bundle out of order: {js}");
    }

    #[test]
    fn test_rebundling_unchanged_sources_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        write(&config.scripts.src.join("b.js"), "const b = 2;\n");
        write(&config.scripts.src.join("a.js"), "const a = 1;\n");
        write(&config.scripts.src.join("vendor/lib.js"), "function lib() {}\n");

        build_scripts(&config).unwrap();
        let first = fs::read(config.scripts.out.join("main.js")).unwrap();

        build_scripts(&config).unwrap();
        let second = fs::read(config.scripts.out.join("main.js")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_minifies_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        write(
            &config.scripts.src.join("app.js"),
            "function greet(  name  ) {\n    return \"hi \" + name;\n}\ngreet(\"kiln\");\n",
        );

        let artifacts = build_scripts(&config).unwrap();
        let js = fs::read_to_string(&artifacts[0].path).unwrap();
        assert!(js.len() < 70, "expected minified output, got: {js}");
        assert!(js.contains("greet"));
    }

    #[test]
    fn test_syntax_error_fails_and_preserves_previous_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        write(&config.scripts.src.join("a.js"), "ok();\n");

        build_scripts(&config).unwrap();
        let before = fs::read_to_string(config.scripts.out.join("main.js")).unwrap();

        write(&config.scripts.src.join("b.js"), "function ) broken {\n");
        assert!(build_scripts(&config).is_err());

        let after = fs::read_to_string(config.scripts.out.join("main.js")).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_empty_group_is_successful_noop() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let artifacts = build_scripts(&config).unwrap();
        assert!(artifacts.is_empty());
        assert!(!config.scripts.out.join("main.js").exists());
    }

    #[test]
    fn test_custom_bundle_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.scripts.bundle = "site.min.js".to_string();
        write(&config.scripts.src.join("a.js"), "ping();\n");

        let artifacts = build_scripts(&config).unwrap();
        assert_eq!(artifacts[0].path, config.scripts.out.join("site.min.js"));
    }
}
