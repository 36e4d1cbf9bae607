//! Batch build.
//!
//! ```text
//! build_site()
//!     │
//!     ├── clean_output()        (--clean)
//!     ├── FileQueue             select_content() in walk order
//!     │       └── build_file()  expand → render → write, one file at a time
//!     ├── copy_static()         static/ → output root
//!     └── write_resources()     built-in files → output/__/
//! ```
//!
//! The first failing file aborts the whole build.

use crate::{
    content::{
        page::expand,
        render::{RenderOutput, render},
        walk::select_content,
    },
    embed::{RESOURCE_PREFIX, RESOURCES},
    log,
    site::Site,
};
use anyhow::{Context, Result};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

#[derive(Debug, Default, Clone)]
pub struct BuildOptions {
    /// Remove the output directory first.
    pub clean: bool,
    /// Glob restricting the content files, relative to the content directory.
    pub pattern: Option<String>,
}

/// Pending input files, consumed front to back.
#[derive(Debug)]
struct FileQueue {
    files: Vec<PathBuf>,
    cursor: usize,
}

impl FileQueue {
    fn new(files: Vec<PathBuf>) -> Self {
        Self { files, cursor: 0 }
    }

    fn pop(&mut self) -> Option<&Path> {
        let file = self.files.get(self.cursor)?;
        self.cursor += 1;
        Some(file)
    }

    fn remaining(&self) -> usize {
        self.files.len() - self.cursor
    }
}

/// Build the site; returns the number of files written.
pub fn build_site(site: &Site, options: &BuildOptions) -> Result<usize> {
    let output = &site.config.build.output;
    if options.clean {
        clean_output(output)?;
    }

    let mut queue = FileQueue::new(select_content(&site.config, options.pattern.as_deref())?);
    log!("build"; "{} content files", queue.remaining());

    let mut written = 0;
    while let Some(file) = queue.pop() {
        written += build_file(site, file)?;
    }

    written += copy_static(site)?;
    write_resources(output)?;

    log!("build"; "done, {} files written", written);
    Ok(written)
}

/// Remove the output directory; an absent directory is fine.
pub fn clean_output(output: &Path) -> Result<()> {
    match fs::remove_dir_all(output) {
        Ok(()) => {
            log!("build"; "cleaned {}", output.display());
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err)
            .with_context(|| format!("failed to clear output directory `{}`", output.display())),
    }
}

/// Expand and render one input file, writing every page it produces.
pub fn build_file(site: &Site, file: &Path) -> Result<usize> {
    let input_uri = site.input_uri(file)?;
    if !site.classify(&input_uri).is_renderable() {
        return Ok(0);
    }

    let mut written = 0;
    for page in expand(site, file)? {
        let page = page?;
        let target = site.output_path(&page.output_uri);

        match render(site, &page)? {
            RenderOutput::Skip => continue,
            RenderOutput::Copy => {
                ensure_parent(&target)?;
                fs::copy(file, &target).with_context(|| {
                    format!("failed to copy {} to {}", file.display(), target.display())
                })?;
            }
            RenderOutput::Rendered(content) => {
                ensure_parent(&target)?;
                fs::write(&target, content)
                    .with_context(|| format!("failed to write {}", target.display()))?;
            }
        }

        log!(verbose "build"; "{} -> {}", page.input_uri, page.output_uri);
        written += 1;
    }
    Ok(written)
}

/// Copy the static directory into the output root.
pub fn copy_static(site: &Site) -> Result<usize> {
    let static_dir = &site.config.build.static_dir;
    if !static_dir.is_dir() {
        return Ok(0);
    }

    let mut copied = 0;
    for entry in WalkDir::new(static_dir).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            copy_static_file(site, entry.path())?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Copy one file from the static directory to its place in the output.
pub fn copy_static_file(site: &Site, path: &Path) -> Result<()> {
    let relative = path
        .strip_prefix(&site.config.build.static_dir)
        .with_context(|| format!("`{}` is not a static file", path.display()))?;
    let target = site.config.build.output.join(relative);

    ensure_parent(&target)?;
    fs::copy(path, &target)
        .with_context(|| format!("failed to copy {} to {}", path.display(), target.display()))?;
    log!(verbose "static"; "{}", relative.display());
    Ok(())
}

/// Emit built-in resources under `output/__/`.
fn write_resources(output: &Path) -> Result<()> {
    let dir = output.join(RESOURCE_PREFIX.trim_matches('/'));
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    for (name, bytes) in RESOURCES {
        fs::write(dir.join(name), bytes)?;
    }
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}
