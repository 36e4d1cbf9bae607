//! Path classification.
//!
//! Decides from an input URI alone whether a file is ignored, a draft, a
//! sidecar, or content, and which renderer handles it. Pure: no filesystem
//! access.

use super::sidecar::SIDECAR_SUFFIX;

/// Renderer selected for a content file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Markdown,
    HtmlOrXml,
    DataCard,
    Passthrough,
}

pub const DATA_CARD_SUFFIX: &str = ".cards.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// An underscore-marked segment or a deny-listed directory.
    pub ignore: bool,
    /// Under a `drafts` directory.
    pub is_draft: bool,
    pub is_sidecar: bool,
    pub kind: ContentKind,
}

impl Classification {
    /// Whether the file may produce output at all.
    pub const fn is_renderable(&self) -> bool {
        !self.ignore && !self.is_draft && !self.is_sidecar
    }
}

/// Classify an input URI (`/`-separated, relative to the content root).
pub fn classify(input_uri: &str, deny_list: &[String]) -> Classification {
    let segments: Vec<&str> = input_uri.split('/').filter(|s| !s.is_empty()).collect();
    let (file_name, dirs) = segments
        .split_last()
        .map_or(("", &[][..]), |(last, rest)| (*last, rest));

    let ignore = dirs
        .iter()
        .any(|dir| is_underscored(dir) || deny_list.iter().any(|deny| deny == dir))
        || is_underscored(file_stem(file_name));
    let is_draft = dirs.contains(&"drafts");
    let is_sidecar = file_name.ends_with(SIDECAR_SUFFIX);

    Classification {
        ignore,
        is_draft,
        is_sidecar,
        kind: content_kind(file_name),
    }
}

/// Whether a directory name must not be walked.
pub fn is_ignored_dir(name: &str, deny_list: &[String]) -> bool {
    is_underscored(name) || deny_list.iter().any(|deny| deny == name)
}

fn content_kind(file_name: &str) -> ContentKind {
    if file_name.ends_with(DATA_CARD_SUFFIX) {
        ContentKind::DataCard
    } else if file_name.ends_with(".md") {
        ContentKind::Markdown
    } else if file_name.ends_with(".html") || file_name.ends_with(".xml") {
        ContentKind::HtmlOrXml
    } else {
        ContentKind::Passthrough
    }
}

#[inline]
fn is_underscored(segment: &str) -> bool {
    segment.starts_with('_') || segment.ends_with('_')
}

/// Name without its last extension (`a.cards.json` -> `a.cards`).
fn file_stem(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(0) | None => file_name,
        Some(dot) => &file_name[..dot],
    }
}
