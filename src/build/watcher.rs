use anyhow::{Context, Result, bail};
use colored::*;
use notify::{
    Config as NotifyConfig, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode,
    Watcher,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Sender, channel};
use std::time::Duration;

use crate::config::{Config, WatchConfig};

/// What a change batch asks of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Batch {
    /// At least one source file changed: run the full pipeline.
    Rebuild,
    /// Only the tracked page changed: tell the browser, skip the build.
    ReloadOnly,
}

impl Batch {
    pub fn merge(self, other: Batch) -> Batch {
        if self == Batch::Rebuild || other == Batch::Rebuild {
            Batch::Rebuild
        } else {
            Batch::ReloadOnly
        }
    }
}

/// The paths a watch session subscribes to, canonicalized so they can be
/// compared against the absolute paths the backend reports.
pub struct WatchPlan {
    /// Source roots, watched recursively. Any change here is a rebuild.
    roots: Vec<PathBuf>,
    /// The page whose standalone edits only warrant a browser reload.
    tracked: Option<PathBuf>,
    /// Output directories. Changes here are our own writes, never input.
    ignored: Vec<PathBuf>,
}

impl WatchPlan {
    pub fn new(config: &Config, track_page: bool) -> Self {
        let mut roots = Vec::new();
        for dir in [&config.styles.src, &config.scripts.src] {
            match fs::canonicalize(dir) {
                Ok(path) => {
                    if !roots.contains(&path) {
                        roots.push(path);
                    }
                }
                Err(_) => println!(
                    "{} {} does not exist - not watching it",
                    "!".yellow(),
                    dir.display()
                ),
            }
        }

        let tracked = if track_page {
            fs::canonicalize(&config.pages.file).ok()
        } else {
            None
        };

        let ignored = [&config.styles.out, &config.scripts.out]
            .into_iter()
            .filter_map(|dir| resolve_out_dir(dir))
            .collect();

        Self {
            roots,
            tracked,
            ignored,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty() && self.tracked.is_none()
    }

    /// Decides what one backend event means for the pipeline. Pure reads
    /// (editor opens, stat calls) and paths we do not care about map to
    /// nothing at all.
    fn classify(&self, event: &Event) -> Option<Batch> {
        if matches!(event.kind, EventKind::Access(_)) {
            return None;
        }
        let mut batch = None;
        for path in &event.paths {
            if self.ignored.iter().any(|dir| path.starts_with(dir)) {
                continue;
            }
            if self.roots.iter().any(|root| path.starts_with(root)) {
                return Some(Batch::Rebuild);
            }
            if self.tracked.as_deref() == Some(path.as_path()) {
                batch = Some(Batch::ReloadOnly);
            }
        }
        batch
    }
}

/// Out dirs may not exist until the first build has run. Canonicalize the
/// deepest existing ancestor and reattach the missing tail, so a fresh
/// checkout still ignores its own writes.
fn resolve_out_dir(dir: &Path) -> Option<PathBuf> {
    if let Ok(path) = fs::canonicalize(dir) {
        return Some(path);
    }
    let name = dir.file_name()?;
    let parent = match dir.parent() {
        Some(p) if p.as_os_str().is_empty() => Path::new("."),
        Some(p) => p,
        None => return None,
    };
    Some(resolve_out_dir(parent)?.join(name))
}

/// Subscribes to everything in the plan and hands coalesced batches to
/// `on_batch`, forever. The caller does the first build itself; this loop
/// only reacts to changes.
///
/// Batching works in two layers: an optional quiet window after the first
/// event of a burst, then a drain of whatever queued up while we slept or
/// while the previous batch was running. A run can therefore never
/// overlap another, and a burst of saves collapses into one rebuild.
pub fn watch<F>(watch_cfg: &WatchConfig, plan: &WatchPlan, mut on_batch: F) -> Result<()>
where
    F: FnMut(Batch),
{
    if plan.is_empty() {
        bail!(
            "Nothing to watch - no source directories found and no page to track.\n\n\
            💡 Tip: Run 'kiln init' to scaffold the conventional layout."
        );
    }

    let (tx, rx) = channel();
    let mut watcher = backend(tx, watch_cfg)?;

    for root in &plan.roots {
        watcher
            .watch(root, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", root.display()))?;
        println!("{} Watching {} for changes...", "👀".cyan(), root.display());
    }
    if let Some(page) = &plan.tracked {
        let dir = page.parent().unwrap_or(Path::new("."));
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", dir.display()))?;
        println!("{} Tracking {} for reloads...", "👀".cyan(), page.display());
    }

    loop {
        let Ok(event) = rx.recv() else {
            // Every sender is gone, the backend died underneath us.
            bail!("The file watcher stopped unexpectedly");
        };

        let mut batch = match event {
            Ok(ev) => plan.classify(&ev),
            Err(e) => {
                eprintln!("{} Watch error: {e}", "x".red());
                None
            }
        };

        if watch_cfg.debounce_ms > 0 {
            std::thread::sleep(Duration::from_millis(watch_cfg.debounce_ms));
        }
        while let Ok(queued) = rx.try_recv() {
            if let Ok(ev) = queued
                && let Some(kind) = plan.classify(&ev)
            {
                batch = Some(batch.map_or(kind, |b| b.merge(kind)));
            }
        }

        if let Some(kind) = batch {
            on_batch(kind);
        }
    }
}

/// Picks the notification backend. The sender moves into whichever
/// watcher gets built, so a dead backend shows up as a closed channel.
fn backend(
    tx: Sender<std::result::Result<Event, notify::Error>>,
    watch_cfg: &WatchConfig,
) -> Result<Box<dyn Watcher>> {
    let notify_cfg = NotifyConfig::default()
        .with_poll_interval(Duration::from_millis(watch_cfg.poll_interval_ms));

    if watch_cfg.poll {
        println!(
            "{} Polling for changes every {}ms",
            "👀".cyan(),
            watch_cfg.poll_interval_ms
        );
        let poller =
            PollWatcher::new(tx, notify_cfg).context("Failed to start the polling watcher")?;
        return Ok(Box::new(poller));
    }

    match RecommendedWatcher::new(tx.clone(), notify_cfg.clone()) {
        Ok(native) => Ok(Box::new(native)),
        Err(e) => {
            println!(
                "{} Native file notifications unavailable ({e}), falling back to polling",
                "!".yellow()
            );
            let poller =
                PollWatcher::new(tx, notify_cfg).context("Failed to start the polling watcher")?;
            Ok(Box::new(poller))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind};

    fn project(dir: &Path) -> Config {
        let config = Config::default().rebase(dir);
        fs::create_dir_all(&config.styles.src).unwrap();
        fs::create_dir_all(&config.scripts.src).unwrap();
        fs::write(&config.pages.file, "<html></html>").unwrap();
        config
    }

    fn modify(path: PathBuf) -> Event {
        Event::new(EventKind::Modify(ModifyKind::Any)).add_path(path)
    }

    #[test]
    fn test_source_change_classifies_as_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let config = project(dir.path());
        let plan = WatchPlan::new(&config, true);

        let root = fs::canonicalize(&config.styles.src).unwrap();
        assert_eq!(
            plan.classify(&modify(root.join("style.scss"))),
            Some(Batch::Rebuild)
        );
    }

    #[test]
    fn test_page_change_classifies_as_reload_only() {
        let dir = tempfile::tempdir().unwrap();
        let config = project(dir.path());
        let plan = WatchPlan::new(&config, true);

        let page = fs::canonicalize(&config.pages.file).unwrap();
        assert_eq!(plan.classify(&modify(page)), Some(Batch::ReloadOnly));
    }

    #[test]
    fn test_page_not_tracked_in_plain_watch_mode() {
        let dir = tempfile::tempdir().unwrap();
        let config = project(dir.path());
        let plan = WatchPlan::new(&config, false);

        let page = fs::canonicalize(&config.pages.file).unwrap();
        assert_eq!(plan.classify(&modify(page)), None);
    }

    #[test]
    fn test_access_events_and_strangers_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let config = project(dir.path());
        let plan = WatchPlan::new(&config, true);

        let root = fs::canonicalize(&config.styles.src).unwrap();
        let access = Event::new(EventKind::Access(AccessKind::Any)).add_path(root.join("a.scss"));
        assert_eq!(plan.classify(&access), None);

        let stranger = modify(fs::canonicalize(dir.path()).unwrap().join("README.md"));
        assert_eq!(plan.classify(&stranger), None);
    }

    #[test]
    fn test_own_output_dir_is_ignored_even_under_a_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = project(dir.path());
        config.scripts.out = config.scripts.src.join("out");
        fs::create_dir_all(&config.scripts.out).unwrap();
        let plan = WatchPlan::new(&config, true);

        let out = fs::canonicalize(&config.scripts.out).unwrap();
        assert_eq!(plan.classify(&modify(out.join("main.js"))), None);

        let root = fs::canonicalize(&config.scripts.src).unwrap();
        assert_eq!(
            plan.classify(&modify(root.join("app.js"))),
            Some(Batch::Rebuild)
        );
    }

    #[test]
    fn test_out_dir_missing_at_plan_time_is_still_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = project(dir.path());
        config.scripts.out = config.scripts.src.join("out");
        // Fresh checkout: the plan is built before any build has run.
        let plan = WatchPlan::new(&config, true);

        fs::create_dir_all(&config.scripts.out).unwrap();
        let out = fs::canonicalize(&config.scripts.out).unwrap();
        assert_eq!(plan.classify(&modify(out.join("main.js"))), None);

        let root = fs::canonicalize(&config.scripts.src).unwrap();
        assert_eq!(
            plan.classify(&modify(root.join("app.js"))),
            Some(Batch::Rebuild)
        );
    }

    #[test]
    fn test_mixed_event_folds_to_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let config = project(dir.path());
        let plan = WatchPlan::new(&config, true);

        let root = fs::canonicalize(&config.scripts.src).unwrap();
        let page = fs::canonicalize(&config.pages.file).unwrap();
        let event = Event::new(EventKind::Create(CreateKind::Any))
            .add_path(page)
            .add_path(root.join("new.js"));
        assert_eq!(plan.classify(&event), Some(Batch::Rebuild));
    }

    #[test]
    fn test_merge_prefers_rebuild() {
        assert_eq!(Batch::ReloadOnly.merge(Batch::Rebuild), Batch::Rebuild);
        assert_eq!(Batch::Rebuild.merge(Batch::ReloadOnly), Batch::Rebuild);
        assert_eq!(
            Batch::ReloadOnly.merge(Batch::ReloadOnly),
            Batch::ReloadOnly
        );
    }

    #[test]
    fn test_missing_roots_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default().rebase(dir.path());
        // No sources, no page on disk.
        let plan = WatchPlan::new(&config, true);
        assert!(plan.is_empty());
    }
}
