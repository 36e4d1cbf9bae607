//! File system watcher.
//!
//! ```text
//! notify events ──► Debouncer (300ms) ──► handle_changes()
//!                                             │
//!            build --watch                    │            serve
//!   content   rebuild changed files,          │   rebuild the content map
//!             drop outputs of removed ones    │
//!   layouts   reload templates, full build    │   reload templates
//!   static    recopy changed files            │   (served from disk)
//!   config    restart required                │   restart required
//! ```
//!
//! Failures are logged; watching continues.

use crate::{
    build::{BuildOptions, build_file, build_site, copy_static_file},
    config::SiteConfig,
    content::{content_map::ContentMap, sidecar::SIDECAR_SUFFIX, uri::to_output_uri},
    log,
    site::Site,
};
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use parking_lot::RwLock;
use rustc_hash::FxHashSet;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, mpsc},
    time::{Duration, Instant},
};

const DEBOUNCE_MS: u64 = 300;
const REBUILD_COOLDOWN_MS: u64 = 800;

/// What a batch of changes should update.
pub enum WatchTarget {
    /// Rewrite files in the output directory.
    Build(BuildOptions),
    /// Keep the server's content map current.
    Serve(Arc<RwLock<ContentMap>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    Content,
    Layout,
    Static,
    Config,
    Unknown,
}

/// Categorize a changed path by the configured directory it lives in.
pub fn categorize_path(path: &Path, config: &SiteConfig) -> FileCategory {
    let build = &config.build;
    if path == config.config_path {
        FileCategory::Config
    } else if path.starts_with(&build.content) {
        FileCategory::Content
    } else if path.starts_with(&build.layouts) || path.starts_with(&build.partials) {
        FileCategory::Layout
    } else if path.starts_with(&build.static_dir) {
        FileCategory::Static
    } else {
        FileCategory::Unknown
    }
}

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// Content file a changed path belongs to; a sidecar maps to its owner.
fn owning_content_file(path: &Path) -> PathBuf {
    path.to_str()
        .and_then(|path| path.strip_suffix(SIDECAR_SUFFIX))
        .map_or_else(|| path.to_path_buf(), PathBuf::from)
}

/// Batches rapid file events with debouncing and rebuild cooldown.
struct Debouncer {
    pending: FxHashSet<PathBuf>,
    last_event: Option<Instant>,
    last_rebuild: Option<Instant>,
}

impl Debouncer {
    fn new() -> Self {
        Self {
            pending: FxHashSet::default(),
            last_event: None,
            last_rebuild: None,
        }
    }

    fn in_cooldown(&self) -> bool {
        self.last_rebuild
            .is_some_and(|t| t.elapsed() < Duration::from_millis(REBUILD_COOLDOWN_MS))
    }

    fn add(&mut self, event: Event) {
        for path in event.paths {
            if !is_temp_file(&path) {
                self.pending.insert(path);
            }
        }
        self.last_event = Some(Instant::now());
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty()
            && self
                .last_event
                .is_some_and(|t| t.elapsed() >= Duration::from_millis(DEBOUNCE_MS))
    }

    fn take(&mut self) -> Vec<PathBuf> {
        self.last_event = None;
        let mut paths: Vec<PathBuf> = self.pending.drain().collect();
        paths.sort();
        paths
    }

    fn mark_rebuild(&mut self) {
        self.last_rebuild = Some(Instant::now());
    }

    fn timeout(&self) -> Duration {
        if self.pending.is_empty() {
            Duration::from_secs(60)
        } else {
            Duration::from_millis(DEBOUNCE_MS)
        }
    }
}

#[derive(Debug, Default)]
struct Changes {
    config: bool,
    layouts: bool,
    content: Vec<PathBuf>,
    statics: Vec<PathBuf>,
}

fn categorize(paths: &[PathBuf], config: &SiteConfig) -> Changes {
    let mut changes = Changes::default();
    for path in paths {
        match categorize_path(path, config) {
            FileCategory::Config => changes.config = true,
            FileCategory::Layout => changes.layouts = true,
            FileCategory::Content => {
                let file = owning_content_file(path);
                if !changes.content.contains(&file) {
                    changes.content.push(file);
                }
            }
            FileCategory::Static => changes.statics.push(path.clone()),
            FileCategory::Unknown => {}
        }
    }
    changes
}

/// Apply one debounced batch. Returns true when a full rebuild ran.
fn handle_changes(site: &Site, paths: &[PathBuf], target: &WatchTarget) -> bool {
    let changes = categorize(paths, &site.config);

    if changes.config {
        log!("watch"; "config changed, restart to apply it");
    }
    if changes.layouts {
        site.templates.reload();
    }

    match target {
        WatchTarget::Build(options) => rebuild_output(site, &changes, options),
        WatchTarget::Serve(map) => {
            if changes.layouts {
                log!("watch"; "layouts changed");
            }
            if !changes.content.is_empty() {
                let rebuilt = map.write().rebuild(site);
                match rebuilt {
                    Ok(()) => log!("watch"; "content changed, {} pages", map.read().len()),
                    Err(err) => log!("watch"; "content map rebuild failed: {err:#}"),
                }
            }
            false
        }
    }
}

fn rebuild_output(site: &Site, changes: &Changes, options: &BuildOptions) -> bool {
    if changes.layouts {
        log!("watch"; "layouts changed, rebuilding...");
        let options = BuildOptions {
            clean: false,
            ..options.clone()
        };
        return match build_site(site, &options) {
            Ok(_) => true,
            Err(err) => {
                log!("watch"; "full build failed: {err:#}");
                false
            }
        };
    }

    for file in &changes.content {
        if !file.is_file() {
            remove_stale_output(site, file);
            continue;
        }
        match build_file(site, file) {
            Ok(count) => log!(verbose "watch"; "{} ({} files)", file.display(), count),
            Err(err) => log!("watch"; "{err:#}"),
        }
    }
    for file in changes.statics.iter().filter(|file| file.is_file()) {
        if let Err(err) = copy_static_file(site, file) {
            log!("watch"; "{err:#}");
        }
    }
    false
}

/// Delete the output of a removed content file.
///
/// Only the base output URI is known once the sidecar is gone; fan-out and
/// slug-renamed pages stay until `build --clean`.
fn remove_stale_output(site: &Site, file: &Path) {
    let Ok(input_uri) = site.input_uri(file) else {
        return;
    };
    if !site.classify(&input_uri).is_renderable() {
        return;
    }

    let output_uri = to_output_uri(&input_uri, None, site.hooks.transform_uri.as_ref());
    let target = site.output_path(&output_uri);
    if target.is_file() {
        match fs::remove_file(&target) {
            Ok(()) => log!("watch"; "removed {}", output_uri),
            Err(err) => log!("watch"; "failed to remove {}: {err}", target.display()),
        }
    } else {
        log!("watch"; "{} was removed, run `build --clean` to drop its pages", input_uri);
    }
}

fn setup_watchers(watcher: &mut impl Watcher, config: &SiteConfig) -> Result<()> {
    let build = &config.build;
    let dirs = [
        &build.content,
        &build.layouts,
        &build.partials,
        &build.static_dir,
    ];

    for dir in dirs.into_iter().filter(|dir| dir.is_dir()) {
        watcher
            .watch(dir, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", dir.display()))?;
        log!("watch"; "{}", dir.strip_prefix(&config.root).unwrap_or(dir).display());
    }
    if config.config_path.is_file() {
        watcher
            .watch(&config.config_path, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", config.config_path.display()))?;
    }
    Ok(())
}

const fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    )
}

/// Watch the project and apply changes to `target` until the watcher stops.
pub fn watch_for_changes_blocking(site: &Site, target: &WatchTarget) -> Result<()> {
    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx).context("Failed to create file watcher")?;
    setup_watchers(&mut watcher, &site.config)?;

    let mut debouncer = Debouncer::new();

    loop {
        match rx.recv_timeout(debouncer.timeout()) {
            Ok(Ok(event)) if is_relevant(&event) && !debouncer.in_cooldown() => {
                debouncer.add(event);
            }
            Ok(Err(e)) => log!("watch"; "error: {e}"),
            Err(mpsc::RecvTimeoutError::Timeout) if debouncer.ready() => {
                if handle_changes(site, &debouncer.take(), target) {
                    debouncer.mark_rebuild();
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
            _ => {}
        }
    }

    Ok(())
}
