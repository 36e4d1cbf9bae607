//! Rendered-page post-processing.
//!
//! One streaming pass over the generated markup:
//! - every `<a>` gets `target="_blank"` for absolute or protocol-relative
//!   hrefs and `target="_self"` otherwise
//! - void elements are emitted self-closed
//! - `script`, `style`, `pre` and `textarea` bodies are copied verbatim
//! - block-level elements go on their own line, indented one tab per level;
//!   inline elements stay in the text flow

use anyhow::Result;
use quick_xml::{
    Reader, Writer,
    events::{BytesEnd, BytesStart, BytesText, Event, attributes::Attribute},
};
use regex::Regex;
use std::{
    borrow::Cow,
    io::{Cursor, Write},
    mem, str,
    sync::LazyLock,
};

static EXTERNAL_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[a-z+]+:)?//").unwrap());

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "pre", "textarea"];

/// Phrasing elements; whitespace around them is visible.
const INLINE_ELEMENTS: &[&str] = &[
    "a", "abbr", "b", "bdi", "bdo", "br", "button", "cite", "code", "data", "del", "dfn", "em",
    "i", "img", "input", "ins", "kbd", "label", "mark", "q", "s", "samp", "select", "small",
    "span", "strong", "sub", "sup", "textarea", "time", "u", "var", "wbr",
];

/// Create a lenient reader for generated HTML.
#[inline]
fn create_html_reader(content: &[u8]) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(content);
    reader.config_mut().trim_text(false);
    reader.config_mut().enable_all_checks(false);
    reader
}

/// Absolute (`https://`, `mailto+x://`) or protocol-relative (`//cdn`) link.
#[inline]
pub fn is_external_link(href: &str) -> bool {
    EXTERNAL_LINK.is_match(href)
}

/// Set anchor targets and pretty-print.
pub fn process_html(html: &str) -> Result<String> {
    let mut out = Formatter::new();
    let mut reader = create_html_reader(html.as_bytes());
    let mut offset = 0;

    loop {
        match reader.read_event()? {
            Event::Start(elem) => {
                let name = element_name(&elem);
                let elem = with_link_target(elem);

                if VOID_ELEMENTS.contains(&name.as_str()) {
                    out.empty(elem, &name)?;
                } else if RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
                    // Markup inside these is not parsed; resume after the close tag.
                    let start = offset + reader.buffer_position() as usize;
                    let (raw, consumed) = split_raw_text(&html[start..], &name);
                    out.raw_text_element(elem, &name, raw)?;

                    offset = start + consumed;
                    reader = create_html_reader(&html.as_bytes()[offset..]);
                } else {
                    out.start(elem, name)?;
                }
            }
            Event::Empty(elem) => {
                let name = element_name(&elem);
                out.empty(with_link_target(elem), &name)?;
            }
            Event::End(elem) => {
                let name = String::from_utf8_lossy(elem.name().as_ref()).to_ascii_lowercase();
                // `</br>` and friends were already closed
                if !VOID_ELEMENTS.contains(&name.as_str()) {
                    out.end(elem, &name)?;
                }
            }
            Event::Text(text) => out.text(str::from_utf8(&text)?)?,
            Event::Eof => break,
            event @ (Event::Comment(_) | Event::DocType(_) | Event::Decl(_) | Event::PI(_)) => {
                out.markup(event)?;
            }
            event => out.inline(event)?,
        }
    }

    out.finish()
}

/// An element opened in the output.
#[derive(Debug)]
struct OpenElement {
    name: String,
    /// Laid out in the text flow rather than on its own line.
    inline: bool,
    /// Contains at least one line-broken child.
    has_blocks: bool,
}

/// Writes events, breaking lines only around block-level elements.
struct Formatter {
    writer: Writer<Cursor<Vec<u8>>>,
    open: Vec<OpenElement>,
    inline_depth: usize,
    /// Whitespace seen since the last write; it becomes one space in inline flow.
    pending_space: bool,
    /// The last write ended a line-broken item.
    at_line_break: bool,
}

impl Formatter {
    fn new() -> Self {
        Self {
            writer: Writer::new(Cursor::new(Vec::new())),
            open: Vec::new(),
            inline_depth: 0,
            pending_space: false,
            at_line_break: true,
        }
    }

    #[inline]
    fn is_inline(&self, name: &str) -> bool {
        self.inline_depth > 0 || INLINE_ELEMENTS.contains(&name)
    }

    /// Newline plus indentation for the current depth; nothing at document start.
    fn newline(&mut self) -> Result<()> {
        let depth = self.open.len();
        let out = self.writer.get_mut();
        if !out.get_ref().is_empty() {
            out.write_all(b"\n")?;
            out.write_all("\t".repeat(depth).as_bytes())?;
        }
        Ok(())
    }

    /// Position the next item: on a new line, or in the flow after any pending space.
    fn place(&mut self, inline: bool) -> Result<()> {
        if inline {
            if mem::take(&mut self.pending_space) && !self.at_line_break {
                self.writer.get_mut().write_all(b" ")?;
            }
        } else {
            self.pending_space = false;
            if let Some(parent) = self.open.last_mut() {
                parent.has_blocks = true;
            }
            self.newline()?;
        }
        self.at_line_break = !inline;
        Ok(())
    }

    fn start(&mut self, elem: BytesStart<'_>, name: String) -> Result<()> {
        let inline = self.is_inline(&name);
        self.place(inline)?;
        self.writer.write_event(Event::Start(elem))?;
        if inline {
            self.inline_depth += 1;
        }
        self.open.push(OpenElement {
            name,
            inline,
            has_blocks: false,
        });
        Ok(())
    }

    fn empty(&mut self, elem: BytesStart<'_>, name: &str) -> Result<()> {
        self.place(self.is_inline(name))?;
        self.writer.write_event(Event::Empty(elem))?;
        Ok(())
    }

    fn end(&mut self, elem: BytesEnd<'_>, name: &str) -> Result<()> {
        let Some(index) = self.open.iter().rposition(|open| open.name == name) else {
            // stray close tag
            self.place(true)?;
            self.writer.write_event(Event::End(elem))?;
            return Ok(());
        };

        // Elements left unclosed inside end here as well.
        let closed = self.open.split_off(index);
        self.inline_depth -= closed.iter().filter(|open| open.inline).count();

        let element = &closed[0];
        if element.inline {
            self.place(true)?;
        } else {
            self.pending_space = false;
            if element.has_blocks {
                self.newline()?;
            }
            self.at_line_break = true;
        }
        self.writer.write_event(Event::End(elem))?;
        Ok(())
    }

    fn raw_text_element(&mut self, elem: BytesStart<'_>, name: &str, raw: &str) -> Result<()> {
        self.place(self.is_inline(name))?;
        self.writer.write_event(Event::Start(elem))?;
        if !raw.is_empty() {
            self.writer.write_event(Event::Text(BytesText::from_escaped(raw)))?;
        }
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            self.pending_space |= !text.is_empty();
            return Ok(());
        }

        let at_line_break = self.at_line_break;
        self.place(true)?;
        let text = collapse_whitespace(text);
        let text = if at_line_break {
            text.trim_start()
        } else {
            &text[..]
        };
        self.writer.write_event(Event::Text(BytesText::from_escaped(text)))?;
        Ok(())
    }

    /// Comments and declarations sit on their own line between blocks.
    fn markup(&mut self, event: Event<'_>) -> Result<()> {
        if self.inline_depth == 0 && self.at_line_break {
            self.place(false)?;
            self.writer.write_event(event)?;
            Ok(())
        } else {
            self.inline(event)
        }
    }

    /// Entity references, CDATA and the like stay in the flow.
    fn inline(&mut self, event: Event<'_>) -> Result<()> {
        self.place(true)?;
        self.writer.write_event(event)?;
        Ok(())
    }

    fn finish(self) -> Result<String> {
        let mut output = String::from_utf8(self.writer.into_inner().into_inner())?;
        output.push('\n');
        Ok(output)
    }
}

#[inline]
fn element_name(elem: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(elem.name().as_ref()).to_ascii_lowercase()
}

/// Rewrite an `<a>` element's `target`; other elements pass through.
fn with_link_target(elem: BytesStart<'_>) -> BytesStart<'_> {
    if !elem.name().as_ref().eq_ignore_ascii_case(b"a") {
        return elem;
    }

    let href = elem
        .html_attributes()
        .flatten()
        .find(|attr| attr.key.as_ref().eq_ignore_ascii_case(b"href"))
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned());
    let target = if href.as_deref().is_some_and(is_external_link) {
        "_blank"
    } else {
        "_self"
    };

    let attrs: Vec<Attribute> = elem
        .html_attributes()
        .flatten()
        .filter(|attr| !attr.key.as_ref().eq_ignore_ascii_case(b"target"))
        .collect();

    let mut anchor = BytesStart::new(element_name(&elem));
    anchor.extend_attributes(attrs);
    anchor.push_attribute(("target", target));
    anchor
}

/// Split `rest` at the closing tag of `name`.
///
/// Returns the raw body and the number of bytes up to and including the
/// closing tag. An unclosed element swallows the rest of the document.
fn split_raw_text<'a>(rest: &'a str, name: &str) -> (&'a str, usize) {
    let close = format!("</{name}");
    let Some(body_len) = rest.to_ascii_lowercase().find(&close) else {
        return (rest, rest.len());
    };

    let consumed = rest[body_len..]
        .find('>')
        .map_or(rest.len(), |gt| body_len + gt + 1);
    (&rest[..body_len], consumed)
}

/// Collapse whitespace runs in text outside raw-text elements.
fn collapse_whitespace(text: &str) -> Cow<'_, str> {
    let needs_collapse = text
        .as_bytes()
        .windows(2)
        .any(|pair| pair[0].is_ascii_whitespace() && pair[1].is_ascii_whitespace())
        || text.contains(['\n', '\t', '\r']);
    if !needs_collapse {
        return Cow::Borrowed(text);
    }

    let mut collapsed = String::with_capacity(text.len());
    if text.starts_with(|c: char| c.is_ascii_whitespace()) {
        collapsed.push(' ');
    }
    collapsed.push_str(&text.split_ascii_whitespace().collect::<Vec<_>>().join(" "));
    if text.ends_with(|c: char| c.is_ascii_whitespace()) {
        collapsed.push(' ');
    }
    Cow::Owned(collapsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_external_link() {
        assert!(is_external_link("https://example.com"));
        assert!(is_external_link("http://example.com/a"));
        assert!(is_external_link("//cdn.example.com/x.js"));
        assert!(is_external_link("git+ssh://host/repo"));
        assert!(!is_external_link("/about"));
        assert!(!is_external_link("about.html"));
        assert!(!is_external_link("#top"));
        assert!(!is_external_link("mailto:a@b.c"));
    }

    #[test]
    fn test_anchor_targets() {
        let html = process_html(
            r#"<p>Go <a href="https://x.com" target="_self">out</a> or <a href="/in">in</a>.</p>"#,
        )
        .unwrap();
        assert!(html.contains(r#"<a href="https://x.com" target="_blank">out</a>"#));
        assert!(html.contains(r#"<a href="/in" target="_self">in</a>"#));
        assert_eq!(html.matches("target=").count(), 2);
    }

    #[test]
    fn test_anchor_without_href() {
        let html = process_html(r#"<a name="top"></a>"#).unwrap();
        assert!(html.contains(r#"<a name="top" target="_self">"#));
    }

    #[test]
    fn test_indentation_and_void_elements() {
        let html = process_html(
            "<!doctype html><html><head><meta charset=\"utf-8\"><title>T</title></head>\
             <body><hr><p>x<br>y</p></body></html>",
        )
        .unwrap();
        assert!(html.contains("\n\t<head>"));
        assert!(html.contains("\n\t\t<meta charset=\"utf-8\"/>"));
        assert!(html.contains("\n\t\t<title>T</title>"));
        assert!(html.contains("\n\t</head>"));
        assert!(html.contains("\n\t\t<hr/>"));
        assert!(html.contains("\n\t\t<p>x<br/>y</p>"));
        assert!(!html.contains("</meta>"));
        assert!(html.ends_with("\n\t</body>\n</html>\n"));
    }

    #[test]
    fn test_adjacent_inline_elements_stay_together() {
        let html = process_html(
            "<p><strong>foo</strong><em>bar</em> and <code>x</code><code>y</code></p>",
        )
        .unwrap();
        assert_eq!(
            html,
            "<p><strong>foo</strong><em>bar</em> and <code>x</code><code>y</code></p>\n"
        );

        let html = process_html(
            "<p>note<sup class=\"footnote\"><a href=\"#fn1\">1</a></sup></p>",
        )
        .unwrap();
        assert!(html.contains(
            "note<sup class=\"footnote\"><a href=\"#fn1\" target=\"_self\">1</a></sup></p>"
        ));
    }

    #[test]
    fn test_line_breaks_between_inline_elements_become_spaces() {
        let html = process_html("<p><em>a</em>\n  <em>b</em>\n</p>").unwrap();
        assert_eq!(html, "<p><em>a</em> <em>b</em></p>\n");
    }

    #[test]
    fn test_block_inside_inline_stays_in_flow() {
        let html = process_html("<div><a href=\"/x\"><div>card</div></a></div>").unwrap();
        assert_eq!(
            html,
            "<div><a href=\"/x\" target=\"_self\"><div>card</div></a></div>\n"
        );

        let html = process_html("<ul><li>a</li><li><p>b</p></li></ul>").unwrap();
        assert_eq!(
            html,
            "<ul>\n\t<li>a</li>\n\t<li>\n\t\t<p>b</p>\n\t</li>\n</ul>\n"
        );
    }

    #[test]
    fn test_raw_text_elements_are_verbatim() {
        let html = process_html(
            "<body><pre>  keep\n   this</pre><script>if (a < b) { x = \"</div>\"; }</script>\
             <p>after</p></body>",
        )
        .unwrap();
        assert!(html.contains("<pre>  keep\n   this</pre>"));
        assert!(html.contains("<script>if (a < b) { x = \"</div>\"; }</script>"));
        assert!(html.contains("<p>after</p>"));
    }

    #[test]
    fn test_whitespace_handling() {
        let html = process_html("<div>\n    <p>a\n   b</p>\n</div>").unwrap();
        assert_eq!(html, "<div>\n\t<p>a b</p>\n</div>\n");

        let html = process_html("<p><em>a</em> <em>b</em></p>").unwrap();
        assert!(html.contains("<em>a</em> <em>b</em>"));
    }

    #[test]
    fn test_entities_survive() {
        let html = process_html("<p>a &amp; b</p>").unwrap();
        assert!(html.contains("a &amp; b"));
    }

    #[test]
    fn test_split_raw_text() {
        assert_eq!(split_raw_text("x</SCRIPT>rest", "script"), ("x", 10));
        assert_eq!(split_raw_text("unclosed", "pre"), ("unclosed", 8));
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("a  b\n"), "a b ");
        assert_eq!(collapse_whitespace("\n\tx"), " x");
        assert_eq!(collapse_whitespace("plain"), "plain");
    }
}
