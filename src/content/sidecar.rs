//! Per-file sidecars.
//!
//! A sidecar lives next to its content file under the name
//! `<file><SIDECAR_SUFFIX>` and may supply any subset of four capabilities:
//! metadata, head content, a slug mapping (fan-out) and template variables.
//! Absent capabilities are `None`; an empty slug mapping is distinct from an
//! absent one.
//!
//! ```toml
//! slugs = [{ slug = "intro", count = 1 }, { slug = "advanced", count = 2 }]
//!
//! [meta]
//! slug = "renamed"
//! layout = "note.html"
//!
//! [head]
//! title = "Custom title"
//!
//! [variables]
//! color = "red"
//!
//! [slug_variables.intro]
//! color = "blue"
//! ```

use super::toml_to_json;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt, fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

pub const SIDECAR_SUFFIX: &str = ".sk.toml";

/// Template variables of one page instance.
pub type TemplateVariables = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SidecarMeta {
    pub slug: Option<String>,
    pub layout: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SidecarHead {
    pub title: Option<String>,
    /// Raw markup injected into the layout's head.
    pub content: Option<String>,
}

/// One fan-out target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlugEntry {
    pub slug: String,
    pub count: u64,
}

/// Route parameters handed to the template-variables capability.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteParams {
    pub slug: Option<String>,
    pub count: Option<u64>,
}

impl From<&SlugEntry> for RouteParams {
    fn from(entry: &SlugEntry) -> Self {
        Self {
            slug: Some(entry.slug.clone()),
            count: Some(entry.count),
        }
    }
}

type MetaFn = Box<dyn Fn() -> Result<SidecarMeta> + Send + Sync>;
type HeadFn = Box<dyn Fn() -> Result<SidecarHead> + Send + Sync>;
type SlugMappingFn = Box<dyn Fn() -> Result<Vec<SlugEntry>> + Send + Sync>;
type TemplateVariablesFn = Box<dyn Fn(&RouteParams) -> Result<TemplateVariables> + Send + Sync>;

/// Capability bundle resolved once per input file.
#[derive(Default)]
pub struct Sidecar {
    meta: Option<MetaFn>,
    head: Option<HeadFn>,
    slug_mapping: Option<SlugMappingFn>,
    template_variables: Option<TemplateVariablesFn>,
}

impl Sidecar {
    pub fn with_meta(
        mut self,
        f: impl Fn() -> Result<SidecarMeta> + Send + Sync + 'static,
    ) -> Self {
        self.meta = Some(Box::new(f));
        self
    }

    pub fn with_head(
        mut self,
        f: impl Fn() -> Result<SidecarHead> + Send + Sync + 'static,
    ) -> Self {
        self.head = Some(Box::new(f));
        self
    }

    pub fn with_slug_mapping(
        mut self,
        f: impl Fn() -> Result<Vec<SlugEntry>> + Send + Sync + 'static,
    ) -> Self {
        self.slug_mapping = Some(Box::new(f));
        self
    }

    pub fn with_template_variables(
        mut self,
        f: impl Fn(&RouteParams) -> Result<TemplateVariables> + Send + Sync + 'static,
    ) -> Self {
        self.template_variables = Some(Box::new(f));
        self
    }

    pub fn meta(&self) -> Result<Option<SidecarMeta>> {
        self.meta.as_ref().map(|f| f()).transpose()
    }

    pub fn head(&self) -> Result<Option<SidecarHead>> {
        self.head.as_ref().map(|f| f()).transpose()
    }

    /// `Ok(None)` when the capability is absent.
    pub fn slug_mapping(&self) -> Result<Option<Vec<SlugEntry>>> {
        self.slug_mapping.as_ref().map(|f| f()).transpose()
    }

    /// Defaults to an empty mapping when the capability is absent.
    pub fn template_variables(&self, params: &RouteParams) -> Result<TemplateVariables> {
        match &self.template_variables {
            Some(f) => f(params),
            None => Ok(TemplateVariables::new()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.meta.is_none()
            && self.head.is_none()
            && self.slug_mapping.is_none()
            && self.template_variables.is_none()
    }
}

impl fmt::Debug for Sidecar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sidecar")
            .field("meta", &self.meta.is_some())
            .field("head", &self.head.is_some())
            .field("slug_mapping", &self.slug_mapping.is_some())
            .field("template_variables", &self.template_variables.is_some())
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum SidecarError {
    #[error("failed to read sidecar `{0}`")]
    Io(PathBuf, #[source] io::Error),

    #[error("failed to parse sidecar `{0}`")]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("invalid sidecar `{0}`: {1}")]
    Invalid(PathBuf, String),
}

/// Resolves the sidecar of a content file.
pub trait SidecarLoader: Send + Sync {
    /// Returns the empty bundle when the file has no sidecar.
    fn load(&self, input_file: &Path) -> Result<Sidecar>;
}

/// Conventional sidecar location: the input path with [`SIDECAR_SUFFIX`] appended.
pub fn sidecar_path(input_file: &Path) -> PathBuf {
    let mut path = input_file.as_os_str().to_owned();
    path.push(SIDECAR_SUFFIX);
    PathBuf::from(path)
}

/// Loads declarative TOML sidecars.
#[derive(Debug, Default, Clone, Copy)]
pub struct TomlSidecarLoader;

impl SidecarLoader for TomlSidecarLoader {
    fn load(&self, input_file: &Path) -> Result<Sidecar> {
        let path = sidecar_path(input_file);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Sidecar::default()),
            Err(err) => return Err(SidecarError::Io(path, err).into()),
        };

        let file: SidecarFile =
            toml::from_str(&content).map_err(|err| SidecarError::Parse(path.clone(), err))?;
        Ok(file.into_sidecar(&path)?)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SidecarFile {
    meta: Option<SidecarMeta>,
    head: Option<SidecarHead>,
    slugs: Option<Vec<SlugEntry>>,
    variables: Option<toml::Table>,
    slug_variables: Option<BTreeMap<String, toml::Table>>,
}

impl SidecarFile {
    fn into_sidecar(self, path: &Path) -> Result<Sidecar, SidecarError> {
        let mut sidecar = Sidecar::default();

        if let Some(meta) = self.meta {
            sidecar = sidecar.with_meta(move || Ok(meta.clone()));
        }

        if let Some(head) = self.head {
            sidecar = sidecar.with_head(move || Ok(head.clone()));
        }

        let has_variables =
            self.slugs.is_some() || self.variables.is_some() || self.slug_variables.is_some();

        if let Some(slugs) = self.slugs {
            if let Some(entry) = slugs.iter().find(|entry| entry.slug.trim().is_empty()) {
                return Err(SidecarError::Invalid(
                    path.to_path_buf(),
                    format!("empty slug (count = {})", entry.count),
                ));
            }
            sidecar = sidecar.with_slug_mapping(move || Ok(slugs.clone()));
        }

        if has_variables {
            let base = to_variables(self.variables.unwrap_or_default());
            let overrides: BTreeMap<String, TemplateVariables> = self
                .slug_variables
                .unwrap_or_default()
                .into_iter()
                .map(|(slug, table)| (slug, to_variables(table)))
                .collect();

            sidecar = sidecar.with_template_variables(move |params| {
                let mut variables = base.clone();
                if let Some(slug) = &params.slug {
                    if let Some(extra) = overrides.get(slug) {
                        variables.extend(extra.clone());
                    }
                    variables.insert("slug".into(), slug.clone().into());
                }
                if let Some(count) = params.count {
                    variables.insert("count".into(), count.into());
                }
                Ok(variables)
            });
        }

        Ok(sidecar)
    }
}

fn to_variables(table: toml::Table) -> TemplateVariables {
    table
        .into_iter()
        .map(|(key, value)| (key, toml_to_json(value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn load(content: Option<&str>) -> Result<Sidecar> {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("article.md");
        fs::write(&input, "# hi").unwrap();
        if let Some(content) = content {
            fs::write(sidecar_path(&input), content).unwrap();
        }
        TomlSidecarLoader.load(&input)
    }

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            sidecar_path(Path::new("/c/posts/a.md")),
            PathBuf::from("/c/posts/a.md.sk.toml")
        );
    }

    #[test]
    fn test_missing_sidecar_is_empty() {
        let sidecar = load(None).unwrap();
        assert!(sidecar.is_empty());
        assert_eq!(sidecar.meta().unwrap(), None);
        assert_eq!(sidecar.slug_mapping().unwrap(), None);
        assert!(sidecar.template_variables(&RouteParams::default()).unwrap().is_empty());
    }

    #[test]
    fn test_meta_and_head() {
        let sidecar = load(Some(
            r#"
            [meta]
            slug = "renamed"
            layout = "note.html"

            [head]
            title = "Custom"
        "#,
        ))
        .unwrap();

        let meta = sidecar.meta().unwrap().unwrap();
        assert_eq!(meta.slug.as_deref(), Some("renamed"));
        assert_eq!(meta.layout.as_deref(), Some("note.html"));
        let head = sidecar.head().unwrap().unwrap();
        assert_eq!(head.title.as_deref(), Some("Custom"));
        assert_eq!(head.content, None);
        assert_eq!(sidecar.slug_mapping().unwrap(), None);
    }

    #[test]
    fn test_empty_slug_mapping_is_present() {
        let sidecar = load(Some("slugs = []")).unwrap();
        assert_eq!(sidecar.slug_mapping().unwrap(), Some(vec![]));
    }

    #[test]
    fn test_template_variables_per_slug() {
        let sidecar = load(Some(
            r#"
            slugs = [{ slug = "intro", count = 1 }, { slug = "advanced", count = 2 }]

            [variables]
            color = "red"
            size = 3

            [slug_variables.advanced]
            color = "blue"
        "#,
        ))
        .unwrap();

        let slugs = sidecar.slug_mapping().unwrap().unwrap();
        assert_eq!(slugs.len(), 2);

        let intro = sidecar.template_variables(&(&slugs[0]).into()).unwrap();
        assert_eq!(intro["color"], json!("red"));
        assert_eq!(intro["slug"], json!("intro"));
        assert_eq!(intro["count"], json!(1));

        let advanced = sidecar.template_variables(&(&slugs[1]).into()).unwrap();
        assert_eq!(advanced["color"], json!("blue"));
        assert_eq!(advanced["size"], json!(3));
        assert_eq!(advanced["count"], json!(2));
    }

    #[test]
    fn test_parse_error_is_fatal() {
        let err = load(Some("[meta\nslug = ")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SidecarError>(),
            Some(SidecarError::Parse(..))
        ));
        assert!(err.to_string().contains("article.md.sk.toml"));
    }

    #[test]
    fn test_unknown_key_is_fatal() {
        assert!(load(Some("[meta]\ntitle = \"x\"")).is_err());
    }

    #[test]
    fn test_empty_slug_is_rejected() {
        let err = load(Some("slugs = [{ slug = \"\", count = 1 }]")).unwrap_err();
        assert!(err.to_string().contains("empty slug"));
    }

    #[test]
    fn test_programmatic_sidecar() {
        let sidecar = Sidecar::default()
            .with_slug_mapping(|| Ok(vec![SlugEntry { slug: "a".into(), count: 7 }]))
            .with_template_variables(|params| {
                let mut vars = TemplateVariables::new();
                vars.insert("n".into(), json!(params.count.unwrap_or(0) * 2));
                Ok(vars)
            });

        assert!(!sidecar.is_empty());
        let entry = &sidecar.slug_mapping().unwrap().unwrap()[0];
        let vars = sidecar.template_variables(&entry.into()).unwrap();
        assert_eq!(vars["n"], json!(14));
    }
}
