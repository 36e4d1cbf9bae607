//! Layout and partial templates (minijinja).
//!
//! Template names resolve in this order: the project's layouts directory,
//! its partials directory, then the built-in templates. Loaded templates are
//! cached until [`Templates::reload`].

use crate::embed;
use minijinja::{AutoEscape, Environment, ErrorKind, UndefinedBehavior};
use parking_lot::RwLock;
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("failed to find layout \"{name}\" (searched {searched})")]
    NotFound { name: String, searched: String },

    #[error("template error")]
    Render(#[from] minijinja::Error),
}

/// Where a template name resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TemplateSource {
    File(PathBuf),
    Builtin(&'static str),
}

#[derive(Debug)]
pub struct Templates {
    env: RwLock<Environment<'static>>,
    layouts_dir: PathBuf,
    partials_dir: PathBuf,
}

impl Templates {
    pub fn new(layouts_dir: &Path, partials_dir: &Path) -> Self {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        // Page bodies are already markup.
        env.set_auto_escape_callback(|_| AutoEscape::None);

        let (layouts, partials) = (layouts_dir.to_path_buf(), partials_dir.to_path_buf());
        env.set_loader(move |name| match locate(&layouts, &partials, name) {
            Some(TemplateSource::File(path)) => {
                fs::read_to_string(&path).map(Some).map_err(|err| {
                    minijinja::Error::new(
                        ErrorKind::InvalidOperation,
                        format!("failed to read template `{}`", path.display()),
                    )
                    .with_source(err)
                })
            }
            Some(TemplateSource::Builtin(source)) => Ok(Some(source.to_owned())),
            None => Ok(None),
        });

        Self {
            env: RwLock::new(env),
            layouts_dir: layouts_dir.to_path_buf(),
            partials_dir: partials_dir.to_path_buf(),
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        locate(&self.layouts_dir, &self.partials_dir, name).is_some()
    }

    /// Render a named layout; a name found nowhere is [`LayoutError::NotFound`].
    pub fn render<S: Serialize>(&self, name: &str, ctx: S) -> Result<String, LayoutError> {
        if !self.exists(name) {
            return Err(LayoutError::NotFound {
                name: name.to_owned(),
                searched: format!(
                    "`{}`, `{}` and built-in layouts",
                    self.layouts_dir.display(),
                    self.partials_dir.display()
                ),
            });
        }

        let env = self.env.read();
        let template = env.get_template(name)?;
        Ok(template.render(ctx)?)
    }

    /// Render a one-off template source, e.g. an HTML page with interpolations.
    pub fn render_source<S: Serialize>(
        &self,
        name: &str,
        source: &str,
        ctx: S,
    ) -> Result<String, LayoutError> {
        Ok(self.env.read().render_named_str(name, source, ctx)?)
    }

    /// Drop cached templates so edits on disk are picked up.
    pub fn reload(&self) {
        self.env.write().clear_templates();
    }
}

/// Whether a source contains template syntax worth compiling.
pub fn has_template_markers(source: &str) -> bool {
    source.contains("{{") || source.contains("{%")
}

fn locate(layouts_dir: &Path, partials_dir: &Path, name: &str) -> Option<TemplateSource> {
    if name.is_empty() || name.split(['/', '\\']).any(|segment| segment == "..") {
        return None;
    }

    [layouts_dir, partials_dir]
        .into_iter()
        .map(|dir| dir.join(name))
        .find(|path| path.is_file())
        .map(TemplateSource::File)
        .or_else(|| embed::template(name).map(TemplateSource::Builtin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Templates) {
        let dir = TempDir::new().unwrap();
        let layouts = dir.path().join("layouts");
        let partials = dir.path().join("partials");
        fs::create_dir_all(&layouts).unwrap();
        fs::create_dir_all(&partials).unwrap();
        let templates = Templates::new(&layouts, &partials);
        (dir, templates)
    }

    #[test]
    fn test_builtin_default_layout() {
        let (_dir, templates) = setup();
        let html = templates
            .render(
                "default.html",
                context! { title => "X", body => "<p>hi</p>", env => "production" },
            )
            .unwrap();
        assert!(html.contains("<title>X</title>"));
        assert!(html.contains("<p>hi</p>"));
        assert!(!html.contains("overlay.js"));
    }

    #[test]
    fn test_development_env_includes_overlay() {
        let (_dir, templates) = setup();
        let ctx = context! {
            title => "X",
            body => "",
            env => "development",
            page => context! { output_uri => "/a.html" },
        };
        let html = templates.render("default.html", ctx).unwrap();
        assert!(html.contains("/__/overlay.js"));
        assert!(html.contains("data-output-uri=\"/a.html\""));
    }

    #[test]
    fn test_project_layout_with_partial() {
        let (dir, templates) = setup();
        fs::write(
            dir.path().join("layouts/note.html"),
            "<html>{% include \"footer.html\" %}{{ body }}</html>",
        )
        .unwrap();
        fs::write(dir.path().join("partials/footer.html"), "<footer>f</footer>").unwrap();

        let html = templates
            .render("note.html", context! { body => "<b>x</b>" })
            .unwrap();
        assert_eq!(html, "<html><footer>f</footer><b>x</b></html>");
    }

    #[test]
    fn test_project_layout_overrides_builtin() {
        let (dir, templates) = setup();
        fs::write(dir.path().join("layouts/default.html"), "custom {{ title }}").unwrap();
        let html = templates.render("default.html", context! { title => "T" }).unwrap();
        assert_eq!(html, "custom T");
    }

    #[test]
    fn test_missing_layout_names_it() {
        let (_dir, templates) = setup();
        let err = templates.render("nope.html", context! {}).unwrap_err();
        assert!(matches!(&err, LayoutError::NotFound { name, .. } if name == "nope.html"));
        assert!(err.to_string().contains("failed to find layout \"nope.html\""));
    }

    #[test]
    fn test_parent_segments_are_rejected() {
        let (_dir, templates) = setup();
        assert!(!templates.exists("../secret.html"));
    }

    #[test]
    fn test_reload_picks_up_changes() {
        let (dir, templates) = setup();
        let path = dir.path().join("layouts/a.html");
        fs::write(&path, "one").unwrap();
        assert_eq!(templates.render("a.html", context! {}).unwrap(), "one");

        fs::write(&path, "two").unwrap();
        templates.reload();
        assert_eq!(templates.render("a.html", context! {}).unwrap(), "two");
    }

    #[test]
    fn test_render_source() {
        let (_dir, templates) = setup();
        let html = templates
            .render_source("/p.html", "<p>{{ env }}</p>", context! { env => "development" })
            .unwrap();
        assert_eq!(html, "<p>development</p>");
        assert!(has_template_markers("{{ x }}"));
        assert!(has_template_markers("{% if x %}{% endif %}"));
        assert!(!has_template_markers("<p>plain</p>"));
    }
}
