//! Per-run rendering context.
//!
//! A [`Site`] bundles the loaded configuration with every injectable piece
//! of behavior. Drivers create one and pass it by reference; nothing in the
//! pipeline reads global state.

use crate::{
    config::SiteConfig,
    content::{
        classify::{Classification, classify},
        frontmatter,
        page::Page,
        sidecar::{SidecarLoader, TomlSidecarLoader},
        uri,
    },
    markdown,
    template::Templates,
};
use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use toml::Table;

/// Value of `env` in templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Env {
    Production,
    Development,
}

impl Env {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Development => "development",
        }
    }
}

type TransformUriFn = Box<dyn Fn(&str) -> String + Send + Sync>;
type ValidateFrontmatterFn = Box<dyn Fn(&Path, Table) -> Result<Table> + Send + Sync>;
type DecideLayoutFn = Box<dyn Fn(&Page) -> Option<String> + Send + Sync>;
type RenderMarkdownFn = Box<dyn Fn(&str) -> String + Send + Sync>;

/// Injectable pipeline behavior.
pub struct Hooks {
    /// Rewrites an input URI (without leading `/`) before output naming.
    pub transform_uri: TransformUriFn,
    /// Checks or normalizes a parsed frontmatter table.
    pub validate_frontmatter: ValidateFrontmatterFn,
    /// Picks a layout when the page names none.
    pub decide_layout: DecideLayoutFn,
    pub render_markdown: RenderMarkdownFn,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            transform_uri: Box::new(|uri: &str| uri.to_owned()),
            validate_frontmatter: Box::new(|_: &Path, table: Table| -> Result<Table> { Ok(table) }),
            decide_layout: Box::new(|_: &Page| None::<String>),
            render_markdown: Box::new(markdown::render_markdown),
        }
    }
}

impl Hooks {
    /// Hooks driven by `[[build.rewrite]]` and `[build.frontmatter]`.
    pub fn from_config(config: &SiteConfig) -> Result<Self> {
        let mut hooks = Self::default();

        let rewrites = config
            .build
            .rewrite
            .iter()
            .map(|rewrite| {
                let pattern = Regex::new(&rewrite.pattern)
                    .with_context(|| format!("invalid rewrite pattern `{}`", rewrite.pattern))?;
                Ok((pattern, rewrite.replace.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        if !rewrites.is_empty() {
            hooks.transform_uri = Box::new(move |uri: &str| {
                rewrites.iter().fold(uri.to_owned(), |uri, (pattern, replace)| {
                    pattern.replace_all(&uri, replace.as_str()).into_owned()
                })
            });
        }

        let required = config.build.frontmatter.required.clone();
        if !required.is_empty() {
            hooks.validate_frontmatter = Box::new(move |path: &Path, table: Table| -> Result<Table> {
                frontmatter::check_required(&table, &required)
                    .with_context(|| format!("invalid frontmatter in {}", path.display()))?;
                Ok(table)
            });
        }

        Ok(hooks)
    }
}

pub struct Site {
    pub config: SiteConfig,
    pub env: Env,
    pub hooks: Hooks,
    pub sidecars: Box<dyn SidecarLoader>,
    pub templates: Templates,
}

impl Site {
    pub fn new(config: SiteConfig, env: Env) -> Result<Self> {
        let hooks = Hooks::from_config(&config)?;
        let templates = Templates::new(&config.build.layouts, &config.build.partials);
        Ok(Self {
            config,
            env,
            hooks,
            sidecars: Box::new(TomlSidecarLoader),
            templates,
        })
    }

    /// Input URI of a file under the content directory.
    pub fn input_uri(&self, input_file: &Path) -> Result<String> {
        uri::input_uri_of(&self.config.build.content, input_file).with_context(|| {
            format!(
                "`{}` is not inside the content directory `{}`",
                input_file.display(),
                self.config.build.content.display()
            )
        })
    }

    /// Absolute path of the file behind an input URI.
    pub fn input_file(&self, input_uri: &str) -> PathBuf {
        self.config
            .build
            .content
            .join(input_uri.trim_start_matches('/'))
    }

    /// Absolute path an output URI is written to.
    pub fn output_path(&self, output_uri: &str) -> PathBuf {
        self.config
            .build
            .output
            .join(output_uri.trim_start_matches('/'))
    }

    pub fn classify(&self, input_uri: &str) -> Classification {
        classify(input_uri, &self.config.build.ignore)
    }
}
