//! Content rendering.
//!
//! Dispatches on the classified kind of a page's input file and produces a
//! [`RenderOutput`]: a finished document, a request to copy the input bytes,
//! or nothing at all.

use super::{
    classify::ContentKind,
    frontmatter::{self, Frontmatter},
    page::Page,
    sidecar::SidecarHead,
    toml_to_json,
};
use crate::{
    site::Site,
    template::has_template_markers,
    utils::html::process_html,
};
use anyhow::{Context, Result};
use minijinja::{Value, context};
use std::{collections::BTreeMap, fs};

/// Result of rendering one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutput {
    /// Copy the input file verbatim.
    Copy,
    /// Produce nothing for this page.
    Skip,
    Rendered(String),
}

pub const FLASHCARDS_LAYOUT: &str = "flashcards.html";

/// Render `page`. Errors name the input file.
pub fn render(site: &Site, page: &Page) -> Result<RenderOutput> {
    let class = site.classify(&page.input_uri);
    if !class.is_renderable() {
        return Ok(RenderOutput::Skip);
    }

    let output = match class.kind {
        ContentKind::Markdown => render_markdown(site, page),
        ContentKind::HtmlOrXml => render_html(site, page),
        ContentKind::DataCard => render_data_card(site, page),
        ContentKind::Passthrough => return Ok(RenderOutput::Copy),
    };
    output.with_context(|| format!("failed to render {}", page.input_file.display()))
}

fn render_markdown(site: &Site, page: &Page) -> Result<RenderOutput> {
    let source = fs::read_to_string(&page.input_file)?;
    let (block, body) = frontmatter::split(&source)?;

    let table = match block {
        Some(block) => frontmatter::parse_table(block)?,
        None => toml::Table::new(),
    };
    let table = (site.hooks.validate_frontmatter)(&page.input_file, table)?;
    let fm = Frontmatter::from_table(table)?;
    if fm.draft {
        return Ok(RenderOutput::Skip);
    }

    let head = page.sidecar.head()?.unwrap_or_default();
    let body = (site.hooks.render_markdown)(body);
    let layout = fm
        .layout
        .clone()
        .or_else(|| (site.hooks.decide_layout)(page))
        .unwrap_or_else(|| site.config.build.default_layout.clone());
    let title = fm
        .title
        .clone()
        .or_else(|| head.title.clone())
        .unwrap_or_else(|| site.config.base.title.clone());

    compose(site, page, &layout, Document {
        title,
        body,
        head,
        frontmatter: Some(&fm),
    })
}

fn render_html(site: &Site, page: &Page) -> Result<RenderOutput> {
    let source = fs::read_to_string(&page.input_file)?;
    let meta = page.sidecar.meta()?.unwrap_or_default();
    let head = page.sidecar.head()?.unwrap_or_default();
    let title = head
        .title
        .clone()
        .unwrap_or_else(|| site.config.base.title.clone());

    let body = if has_template_markers(&source) {
        let ctx = context! {
            page => Value::from_serialize(page),
            env => site.env.as_str(),
            title => &title,
            params => Value::from_serialize(&page.parameters),
        };
        site.templates.render_source(&page.input_uri, &source, ctx)?
    } else {
        source
    };

    let explicit_layout = meta.layout.or_else(|| (site.hooks.decide_layout)(page));
    // Feeds and sitemaps keep their own markup.
    if page.input_uri.ends_with(".xml") && explicit_layout.is_none() {
        return Ok(RenderOutput::Rendered(body));
    }
    let layout = explicit_layout.unwrap_or_else(|| site.config.build.default_layout.clone());

    compose(site, page, &layout, Document {
        title,
        body,
        head,
        frontmatter: None,
    })
}

fn render_data_card(site: &Site, page: &Page) -> Result<RenderOutput> {
    let source = fs::read_to_string(&page.input_file)?;
    let deck: serde_json::Value = serde_json::from_str(&source)?;

    let author = deck
        .get("author")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("anonymous");
    let title = format!("{author}'s flashcards");
    // Keep the payload from closing its <script> element.
    let data = serde_json::to_string(&deck)?.replace("</", "<\\/");

    let ctx = context! {
        title,
        data,
        env => site.env.as_str(),
        page => Value::from_serialize(page),
        site => site_context(site),
    };
    let html = site.templates.render(FLASHCARDS_LAYOUT, ctx)?;
    Ok(RenderOutput::Rendered(process_html(&html)?))
}

struct Document<'a> {
    title: String,
    body: String,
    head: SidecarHead,
    frontmatter: Option<&'a Frontmatter>,
}

/// Wrap a document in its layout and post-process the result.
fn compose(site: &Site, page: &Page, layout: &str, doc: Document<'_>) -> Result<RenderOutput> {
    let mut ctx: BTreeMap<String, Value> = BTreeMap::new();

    for (key, value) in &page.parameters {
        ctx.insert(key.clone(), Value::from_serialize(value));
    }
    if let Some(fm) = doc.frontmatter {
        for (key, value) in &fm.extra {
            ctx.insert(key.clone(), Value::from_serialize(toml_to_json(value.clone())));
        }
    }

    let date = doc.frontmatter.map(Frontmatter::display_date).unwrap_or_default();
    let extra: serde_json::Map<String, serde_json::Value> = site
        .config
        .extra
        .iter()
        .map(|(key, value)| (key.clone(), toml_to_json(value.clone())))
        .collect();

    ctx.extend([
        ("title".to_owned(), Value::from(doc.title)),
        ("body".to_owned(), Value::from(doc.body)),
        ("head".to_owned(), Value::from(doc.head.content.unwrap_or_default())),
        ("layout".to_owned(), Value::from(layout)),
        ("env".to_owned(), Value::from(site.env.as_str())),
        ("page".to_owned(), Value::from_serialize(page)),
        ("frontmatter".to_owned(), Value::from_serialize(doc.frontmatter)),
        ("date".to_owned(), Value::from(date)),
        ("params".to_owned(), Value::from_serialize(&page.parameters)),
        ("site".to_owned(), site_context(site)),
        ("extra".to_owned(), Value::from_serialize(extra)),
    ]);

    let html = site.templates.render(layout, ctx)?;
    Ok(RenderOutput::Rendered(process_html(&html)?))
}

fn site_context(site: &Site) -> Value {
    let base = &site.config.base;
    context! {
        title => &base.title,
        author => &base.author,
        language => &base.language,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        content::{page::expand, sidecar::sidecar_path},
        site::{Env, tests::test_site},
        template::LayoutError,
    };
    use quick_xml::{Reader, events::Event};
    use std::path::PathBuf;

    fn write(site: &Site, uri: &str, content: &str) -> PathBuf {
        let path = site.input_file(uri);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn render_first(site: &Site, file: &std::path::Path) -> Result<RenderOutput> {
        let page = expand(site, file).unwrap().next().unwrap().unwrap();
        render(site, &page)
    }

    fn rendered(output: RenderOutput) -> String {
        match output {
            RenderOutput::Rendered(html) => html,
            other => panic!("expected rendered output, got {other:?}"),
        }
    }

    fn assert_well_formed(html: &str) {
        let mut reader = Reader::from_str(html);
        loop {
            match reader.read_event() {
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => panic!("malformed output: {err}\n{html}"),
            }
        }
    }

    #[test]
    fn test_markdown_title_round_trip() {
        let (_dir, site) = test_site("");
        let file = write(&site, "/notes/a.md", "+++\ntitle = 'X'\n+++\n# Hello\n\nSome *text*.\n");

        let html = rendered(render_first(&site, &file).unwrap());
        assert!(html.contains("<title>X</title>"));
        assert!(html.contains("<em>text</em>"));
        assert!(!html.contains("+++"));
        assert_well_formed(&html);
    }

    #[test]
    fn test_markdown_without_frontmatter_uses_site_title() {
        let (_dir, site) = test_site("[base]\ntitle = \"My Notes\"");
        let file = write(&site, "/a.md", "plain");
        let html = rendered(render_first(&site, &file).unwrap());
        assert!(html.contains("<title>My Notes</title>"));
    }

    #[test]
    fn test_unterminated_frontmatter_names_file() {
        let (_dir, site) = test_site("");
        let file = write(&site, "/notes/bad.md", "+++\ntitle = 'X'\n# no end\n");

        let err = render_first(&site, &file).unwrap_err();
        assert!(err.to_string().contains("bad.md"));
        assert!(format!("{err:#}").contains("unterminated frontmatter"));
    }

    #[test]
    fn test_missing_layout_is_fatal() {
        let (_dir, site) = test_site("");
        let file = write(&site, "/a.md", "+++\nlayout = 'nope.html'\n+++\nx");

        let err = render_first(&site, &file).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LayoutError>(),
            Some(LayoutError::NotFound { name, .. }) if name == "nope.html"
        ));
    }

    #[test]
    fn test_project_layout_receives_context() {
        let (dir, site) = test_site("[extra]\nanalytics = \"UA-1\"");
        let layouts = dir.path().join("layouts");
        fs::create_dir_all(&layouts).unwrap();
        fs::write(
            layouts.join("note.html"),
            "<html><head><title>{{ title }}</title></head>\
             <body data-mood=\"{{ mood }}\" data-id=\"{{ extra.analytics }}\">\
             {{ date }}{{ body }}</body></html>",
        )
        .unwrap();
        let file = write(
            &site,
            "/a.md",
            "+++\ntitle = 'T'\nlayout = 'note.html'\ndate = 2024-03-01T10:00:00Z\nmood = 'calm'\n+++\nhi",
        );

        let html = rendered(render_first(&site, &file).unwrap());
        assert!(html.contains("data-mood=\"calm\""));
        assert!(html.contains("data-id=\"UA-1\""));
        assert!(html.contains("2024-03-01"));
        assert!(html.contains("<p>hi</p>"));
    }

    #[test]
    fn test_decide_layout_hook() {
        let (dir, mut site) = test_site("");
        let layouts = dir.path().join("layouts");
        fs::create_dir_all(&layouts).unwrap();
        fs::write(layouts.join("post.html"), "<article>{{ body }}</article>").unwrap();
        site.hooks.decide_layout = Box::new(|page: &Page| {
            page.input_uri
                .starts_with("/posts/")
                .then(|| "post.html".to_owned())
        });

        let file = write(&site, "/posts/a.md", "x");
        assert!(rendered(render_first(&site, &file).unwrap()).contains("<article>"));
    }

    #[test]
    fn test_draft_frontmatter_is_skipped() {
        let (_dir, site) = test_site("");
        let file = write(&site, "/a.md", "+++\ndraft = true\n+++\nx");
        assert_eq!(render_first(&site, &file).unwrap(), RenderOutput::Skip);
    }

    #[test]
    fn test_non_renderable_paths_are_skipped() {
        let (_dir, site) = test_site("");
        let file = write(&site, "/posts/drafts/a.md", "x");
        assert_eq!(render_first(&site, &file).unwrap(), RenderOutput::Skip);
        let file = write(&site, "/_hidden.md", "x");
        assert_eq!(render_first(&site, &file).unwrap(), RenderOutput::Skip);
    }

    #[test]
    fn test_passthrough_is_copied() {
        let (_dir, site) = test_site("");
        let file = write(&site, "/img/logo.png", "\u{89}PNG");
        assert_eq!(render_first(&site, &file).unwrap(), RenderOutput::Copy);
    }

    #[test]
    fn test_html_with_sidecar_head_and_templating() {
        let (_dir, site) = test_site("");
        let file = write(
            &site,
            "/about/about.html",
            "<p>{{ page.output_uri }} in {{ env }}</p><a href=\"https://x.com\">x</a>",
        );
        fs::write(
            sidecar_path(&file),
            "[head]\ntitle = \"About us\"\ncontent = \"<meta name='x' content='y'>\"",
        )
        .unwrap();

        let html = rendered(render_first(&site, &file).unwrap());
        assert!(html.contains("<title>About us</title>"));
        assert!(html.contains("<p>/about/index.html in production</p>"));
        assert!(html.contains("<meta name='x' content='y'/>"));
        assert!(html.contains("target=\"_blank\""));
    }

    #[test]
    fn test_development_env_injects_overlay() {
        let (_dir, mut site) = test_site("");
        site.env = Env::Development;
        let file = write(&site, "/a.md", "x");
        let html = rendered(render_first(&site, &file).unwrap());
        assert!(html.contains("/__/overlay.js"));
        assert!(html.contains("data-output-uri=\"/a.html\""));
    }

    #[test]
    fn test_xml_without_layout_is_unchanged() {
        let (_dir, site) = test_site("");
        let feed = "<rss><channel><link>https://x.com</link></channel></rss>";
        let file = write(&site, "/feed.xml", feed);
        assert_eq!(
            render_first(&site, &file).unwrap(),
            RenderOutput::Rendered(feed.to_owned())
        );
    }

    #[test]
    fn test_fan_out_parameters_reach_templates() {
        let (_dir, site) = test_site("");
        let file = write(&site, "/posts/article.html", "<p>{{ params.slug }}-{{ params.count }}</p>");
        fs::write(
            sidecar_path(&file),
            r#"slugs = [{ slug = "intro", count = 1 }, { slug = "advanced", count = 2 }]"#,
        )
        .unwrap();

        let bodies: Vec<String> = expand(&site, &file)
            .unwrap()
            .map(|page| rendered(render(&site, &page.unwrap()).unwrap()))
            .collect();
        assert!(bodies[0].contains("<p>intro-1</p>"));
        assert!(bodies[1].contains("<p>advanced-2</p>"));
    }

    #[test]
    fn test_data_card() {
        let (_dir, site) = test_site("");
        let file = write(
            &site,
            "/decks/spanish.cards.json",
            r#"{"author": "Ana", "flashcards": [{"front": "hola", "back": "</script>hi"}]}"#,
        );

        let page = expand(&site, &file).unwrap().next().unwrap().unwrap();
        assert_eq!(page.output_uri, "/decks/spanish.html");
        let html = rendered(render(&site, &page).unwrap());
        assert!(html.contains("<title>Ana's flashcards</title>"));
        assert!(html.contains("\"front\":\"hola\""));
        assert!(html.contains("<\\/script>hi"));
    }

    #[test]
    fn test_data_card_defaults_author() {
        let (_dir, site) = test_site("");
        let file = write(&site, "/deck.cards.json", r#"{"flashcards": []}"#);
        let html = rendered(render_first(&site, &file).unwrap());
        assert!(html.contains("anonymous's flashcards"));
    }

    #[test]
    fn test_invalid_data_card_fails() {
        let (_dir, site) = test_site("");
        let file = write(&site, "/deck.cards.json", "{ not json");
        assert!(render_first(&site, &file).is_err());
    }
}
