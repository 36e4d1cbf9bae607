//! Interactive creation of a draft post.

use crate::{config::SiteConfig, log};
use anyhow::{Context, Result, bail};
use chrono::{SecondsFormat, Utc};
use std::{
    fs,
    io::{self, BufRead, Write},
    path::PathBuf,
};

/// Draft posts live here, relative to the content directory.
const DRAFTS_DIR: &str = "posts/drafts";

/// Ask for a slug on stdin and create the post. Ctrl+C aborts with status 1.
pub fn new_post(config: &SiteConfig) -> Result<()> {
    ctrlc::set_handler(|| {
        log!("new"; "aborting...");
        std::process::exit(1);
    })
    .context("Failed to set Ctrl+C handler")?;

    let slug = prompt("What is the post slug? ")?;
    let path = create_post(config, &slug)?;
    log!("new"; "created {}", path.display());
    Ok(())
}

fn prompt(question: &str) -> Result<String> {
    let mut stdout = io::stdout().lock();
    write!(stdout, "{question}")?;
    stdout.flush()?;

    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer)? == 0 {
        bail!("no slug given");
    }
    Ok(answer.trim().to_owned())
}

/// Write `content/posts/drafts/<slug>/<slug>.md` with a frontmatter skeleton.
pub fn create_post(config: &SiteConfig, slug: &str) -> Result<PathBuf> {
    let slug = slug.trim();
    if slug.is_empty() {
        bail!("the slug must not be empty");
    }
    if slug.contains(['/', '\\']) || slug == "." || slug == ".." {
        bail!("the slug `{slug}` must be a single path segment");
    }

    let dir = config.build.content.join(DRAFTS_DIR).join(slug);
    let path = dir.join(format!("{slug}.md"));
    if path.exists() {
        bail!("`{}` already exists", path.display());
    }

    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    fs::write(&path, skeleton(config, slug))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

fn skeleton(config: &SiteConfig, slug: &str) -> String {
    let title = toml::Value::from(slug.replace('-', " "));
    let slug = toml::Value::from(slug);
    let author = toml::Value::from(config.base.author.as_str());
    let date = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

    format!(
        "+++\n\
         title = {title}\n\
         slug = {slug}\n\
         author = {author}\n\
         date = {date}\n\
         categories = []\n\
         tags = []\n\
         draft = true\n\
         +++\n\n"
    )
}
