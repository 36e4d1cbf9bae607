//! `[build]` section configuration.
//!
//! Contains source/output directories, the directory deny-list, URI
//! rewrite rules and frontmatter requirements.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[build]` section in sauerkraut.toml - build pipeline configuration.
///
/// # Example
/// ```toml
/// [build]
/// content = "content"
/// output = "build"
/// default_layout = "default.html"
///
/// [[build.rewrite]]
/// pattern = "^blog/"
/// replace = "posts/"
///
/// [build.frontmatter]
/// required = ["title"]
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Content source directory.
    #[serde(default = "defaults::build::content")]
    #[educe(Default = defaults::build::content())]
    pub content: PathBuf,

    /// Layout templates directory.
    #[serde(default = "defaults::build::layouts")]
    #[educe(Default = defaults::build::layouts())]
    pub layouts: PathBuf,

    /// Partial templates directory (available to `{% include %}`).
    #[serde(default = "defaults::build::partials")]
    #[educe(Default = defaults::build::partials())]
    pub partials: PathBuf,

    /// Static files copied into the output root as-is.
    #[serde(rename = "static", default = "defaults::build::r#static")]
    #[educe(Default = defaults::build::r#static())]
    pub static_dir: PathBuf,

    /// Build output directory.
    #[serde(default = "defaults::build::output")]
    #[educe(Default = defaults::build::output())]
    pub output: PathBuf,

    /// Layout used when neither the page nor the layout hook names one.
    #[serde(default = "defaults::build::default_layout")]
    #[educe(Default = defaults::build::default_layout())]
    pub default_layout: String,

    /// Directory names never walked (version control, editor metadata).
    #[serde(default = "defaults::build::ignore")]
    #[educe(Default = defaults::build::ignore())]
    pub ignore: Vec<String>,

    /// Regex rewrites applied to input URIs before output naming, in order.
    #[serde(default)]
    pub rewrite: Vec<UriRewrite>,

    /// Frontmatter validation settings.
    #[serde(default)]
    pub frontmatter: FrontmatterConfig,
}

/// One `[[build.rewrite]]` rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UriRewrite {
    pub pattern: String,
    pub replace: String,
}

/// `[build.frontmatter]` - fields every markdown page must define.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FrontmatterConfig {
    pub required: Vec<String>,
}
